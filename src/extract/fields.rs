use crate::selector::FieldRule;
use crate::ExtractError;
use scraper::{ElementRef, Selector};

/// A compiled field rule ready to be applied to record fragments
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    selector: Option<Selector>,
    attr: String,
}

impl FieldMatcher {
    /// Compiles a field rule
    ///
    /// An empty expression compiles to a matcher that always yields nothing.
    ///
    /// # Arguments
    ///
    /// * `field` - Field name, used in the error message
    /// * `rule` - The rule to compile
    ///
    /// # Returns
    ///
    /// * `Ok(FieldMatcher)` - The compiled matcher
    /// * `Err(ExtractError::InvalidExpression)` - The CSS expression is malformed
    pub fn compile(field: &'static str, rule: &FieldRule) -> Result<Self, ExtractError> {
        let selector = if rule.is_empty() {
            None
        } else {
            Some(compile_css(field, &rule.exp)?)
        };

        Ok(Self {
            selector,
            attr: rule.attr.clone(),
        })
    }

    /// Extracts the field as text
    ///
    /// Without an attribute this is the trimmed text of every match inside the
    /// fragment; with one it is the attribute of the first match, or empty if
    /// the attribute is absent.
    pub fn text(&self, fragment: ElementRef<'_>) -> String {
        let Some(selector) = &self.selector else {
            return String::new();
        };

        let mut matches = fragment
            .select(selector)
            .filter(|el| el.id() != fragment.id());

        if self.attr.is_empty() {
            let text: String = matches.flat_map(|el| el.text()).collect();
            return text.trim().to_string();
        }

        matches
            .next()
            .and_then(|el| el.value().attr(&self.attr))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Extracts the field as a number, `0.0` when nothing numeric is present
    pub fn number(&self, fragment: ElementRef<'_>) -> f64 {
        extract_float_from_string(&self.text(fragment))
    }

    /// Extracts the non-numeric part of the field, typically a currency symbol
    pub fn currency(&self, fragment: ElementRef<'_>) -> String {
        remove_numbers(&self.text(fragment))
    }
}

/// Compiles a CSS expression, naming the field on failure
pub(crate) fn compile_css(field: &'static str, expression: &str) -> Result<Selector, ExtractError> {
    Selector::parse(expression).map_err(|e| ExtractError::InvalidExpression {
        field,
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Parses the digits and dots of a string as a float
///
/// Every other character is discarded first. Anything that still does not
/// parse yields `0.0`.
///
/// # Examples
///
/// ```
/// use sumi_harvest::extract::extract_float_from_string;
///
/// assert_eq!(extract_float_from_string("£ 1,0011.21 "), 10011.21);
/// assert_eq!(extract_float_from_string("not a number"), 0.0);
/// ```
pub fn extract_float_from_string(value: &str) -> f64 {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

/// Removes digits, decimal and group separators, and whitespace
///
/// # Examples
///
/// ```
/// use sumi_harvest::extract::remove_numbers;
///
/// assert_eq!(remove_numbers("£ 1,0011.21 "), "£");
/// assert_eq!(remove_numbers("USD 34.22"), "USD");
/// ```
pub fn remove_numbers(value: &str) -> String {
    value
        .chars()
        .filter(|c| !(c.is_ascii_digit() || *c == '.' || *c == ',' || c.is_whitespace()))
        .collect()
}
