use super::fields::{compile_css, FieldMatcher};
use super::Item;
use crate::crawler::ItemResult;
use crate::selector::{IdSource, ScrapSelector};
use crate::url::{extract_id_from_url, sanitize_url};
use crate::{ExtractError, SelectorError};
use chrono::{SecondsFormat, Utc};
use scraper::{ElementRef, Html, Selector};

/// A selector with every CSS expression compiled
///
/// Compiling up front means a malformed expression fails the whole page
/// before any record is produced.
#[derive(Debug, Clone)]
pub struct CompiledSelector<'s> {
    selector: &'s ScrapSelector,
    base: Selector,
    id: FieldMatcher,
    link: FieldMatcher,
    image: FieldMatcher,
    title: FieldMatcher,
    description: FieldMatcher,
    price: FieldMatcher,
    categories: FieldMatcher,
    stars: FieldMatcher,
}

impl<'s> CompiledSelector<'s> {
    pub fn compile(selector: &'s ScrapSelector) -> Result<Self, ExtractError> {
        Ok(Self {
            selector,
            base: compile_css("base", &selector.base)?,
            id: FieldMatcher::compile("id", &selector.id)?,
            link: FieldMatcher::compile("link", &selector.link)?,
            image: FieldMatcher::compile("image", &selector.image)?,
            title: FieldMatcher::compile("title", &selector.title)?,
            description: FieldMatcher::compile("description", &selector.description)?,
            price: FieldMatcher::compile("price", &selector.price)?,
            categories: FieldMatcher::compile("categories", &selector.categories)?,
            stars: FieldMatcher::compile("stars", &selector.stars)?,
        })
    }

    /// Extracts one record from every container match, in document order
    pub fn scrap(&self, job_id: &str, document: &Html) -> Vec<ItemResult> {
        let last_scrap = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        document
            .select(&self.base)
            .map(|fragment| {
                let (mut item, error) = self.extract(fragment);
                item.last_scrap = last_scrap.clone();
                ItemResult {
                    job_id: job_id.to_string(),
                    item,
                    error,
                }
            })
            .collect()
    }

    /// Extracts a record from a single fragment
    ///
    /// An identifier failure does not discard the record: it comes back with
    /// an empty id alongside the error.
    pub fn extract(&self, fragment: ElementRef<'_>) -> (Item, Option<ExtractError>) {
        let s = self.selector;
        let scrap_url = s.url.clone();

        let link = sanitize_url(&scrap_url, &self.link.text(fragment), s.link_path_limit);
        let (id, error) = match self.record_id(fragment, &link) {
            Ok(id) => (id, None),
            Err(e) => (String::new(), Some(e)),
        };

        let item = Item {
            id,
            image: sanitize_url(&scrap_url, &self.image.text(fragment), 0),
            title: self.title.text(fragment),
            description: self.description.text(fragment),
            categories: self.categories.text(fragment),
            price: self.price.number(fragment),
            currency: self.price.currency(fragment),
            stars: self.stars.number(fragment),
            link,
            scrap_url,
            scrap_tags: s.scrap_tags.clone(),
            ..Default::default()
        };

        (item, error)
    }

    fn record_id(&self, fragment: ElementRef<'_>, link: &str) -> Result<String, ExtractError> {
        let s = self.selector;
        let ex = &s.id_extractor;

        let id = match s.id_from {
            IdSource::FromField => self.id.text(fragment),
            IdSource::FromUrl => {
                extract_id_from_url(&s.url, ex.url_path_index, &ex.split_string, ex.split_index)?
            }
            IdSource::FromLink => {
                extract_id_from_url(link, ex.url_path_index, &ex.split_string, ex.split_index)?
            }
        };

        Ok(format!("{}{}", s.id_prefix, id))
    }
}

/// Parses `html` and extracts every record the selector describes
///
/// # Arguments
///
/// * `job_id` - Job identifier stamped on every result
/// * `selector` - The page selector (its `url` is the record source URL)
/// * `html` - The page body
///
/// # Returns
///
/// * `Ok(Vec<ItemResult>)` - One result per container match, in document order
/// * `Err(ExtractError)` - A CSS expression of the selector is malformed
pub fn scrap_document(
    job_id: &str,
    selector: &ScrapSelector,
    html: &str,
) -> Result<Vec<ItemResult>, ExtractError> {
    let compiled = CompiledSelector::compile(selector)?;
    let document = Html::parse_document(html);
    Ok(compiled.scrap(job_id, &document))
}

/// Returns the inner HTML of the first container match
///
/// A page without any match yields an empty string.
pub fn base_snippet(selector: &ScrapSelector, html: &str) -> crate::Result<String> {
    if selector.base.trim().is_empty() {
        return Err(SelectorError::MissingBase.into());
    }

    let base = compile_css("base", &selector.base)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&base)
        .next()
        .map(|el| el.inner_html())
        .unwrap_or_default())
}
