//! Record extraction
//!
//! This module turns HTML documents into [`Item`] records by applying a
//! [`ScrapSelector`](crate::selector::ScrapSelector):
//! - Compiling every CSS expression once per page
//! - Locating each record fragment with the `base` expression
//! - Pulling text, attribute, numeric and currency values out of a fragment
//! - Deriving the record identifier from a field, the page URL or the link

mod document;
mod fields;

pub use document::{base_snippet, scrap_document, CompiledSelector};
pub use fields::{extract_float_from_string, remove_numbers, FieldMatcher};

use serde::{Deserialize, Serialize};

/// One extracted record
///
/// Serialized with camelCase keys. Empty text fields and zero numbers are
/// left out of the JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub categories: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub price: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub currency: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub stars: f64,

    // metadata
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scrap_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scrap_tags: String,
    #[serde(skip_serializing_if = "is_zero_version")]
    pub version: i64,
    /// Storage index hint (`host/id`), set during storage fan-out
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index: String,
    /// Capture time, RFC 3339
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_scrap: String,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn is_zero_version(value: &i64) -> bool {
    *value == 0
}
