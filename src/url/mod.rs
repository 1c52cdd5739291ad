//! URL handling module for Sumi-Harvest
//!
//! This module provides host extraction, link sanitization, and identifier
//! extraction from URL paths.

mod domain;
mod path_id;
mod sanitize;

// Re-export main functions
pub use domain::{extract_host, item_index, split_item_index};
pub use path_id::extract_id_from_url;
pub use sanitize::sanitize_url;

/// Returns the path component of a URL string
///
/// Absolute URLs are parsed; anything else is treated as a relative reference
/// and cut at the first `?` or `#`.
pub(crate) fn url_path(raw: &str) -> String {
    match ::url::Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Renders segments as `{0:a 1:b }` for error messages
pub(crate) fn pretty_segments(segments: &[&str]) -> String {
    let mut out = String::from("{");
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!("{}:{} ", i, segment));
    }
    out.push('}');
    out
}
