//! Selector model
//!
//! A [`ScrapSelector`] is the declarative crawl rule an operator writes for a
//! site: where the page lives, which CSS expression locates each record
//! (`base`), and how every record field is pulled out of the matched fragment.
//! Selectors travel as JSON documents with camelCase keys.

mod pagination;

pub use pagination::paginate;

use crate::SelectorError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of page a selector describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    /// A page listing many records, usually linking to detail pages
    #[default]
    List,
    /// A page describing a single record
    Detail,
}

impl SelectorType {
    /// Returns the key fragment used when persisting selectors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Detail => "detail",
        }
    }
}

impl fmt::Display for SelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectorType {
    type Err = String;

    /// Parses a selector type, ignoring case and embedded spaces
    ///
    /// Unknown names fall back to `list`, mirroring how stored selectors are
    /// normalized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if cleaned.eq_ignore_ascii_case("detail") {
            Ok(Self::Detail)
        } else {
            Ok(Self::List)
        }
    }
}

/// Where a record identifier comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum IdSource {
    /// Read from the `id` field rule inside the record fragment
    #[default]
    #[serde(rename = "fromField")]
    FromField,
    /// Derived from the URL of the crawled page
    #[serde(rename = "fromURL")]
    FromUrl,
    /// Derived from the record's extracted link
    #[serde(rename = "fromLink")]
    FromLink,
}

impl FromStr for IdSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "fromfield" | "idfromcss" | "idfromfield" => Ok(Self::FromField),
            "fromurl" | "idfromurl" => Ok(Self::FromUrl),
            "fromlink" | "idfromlink" => Ok(Self::FromLink),
            other => Err(format!("unknown identifier source '{}'", other)),
        }
    }
}

/// A CSS match expression plus an optional attribute to read
///
/// With an empty `attr` the matched text content is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default)]
    pub exp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attr: String,
}

impl FieldRule {
    /// Rule reading the text content of `exp`
    pub fn text(exp: &str) -> Self {
        Self {
            exp: exp.to_string(),
            attr: String::new(),
        }
    }

    /// Rule reading attribute `attr` of the first `exp` match
    pub fn attr(exp: &str, attr: &str) -> Self {
        Self {
            exp: exp.to_string(),
            attr: attr.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exp.is_empty()
    }
}

/// How to cut an identifier out of a URL path
///
/// Negative indices count from the end, so `-1` is the last path segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdExtractor {
    pub url_path_index: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub split_string: String,
    pub split_index: i64,
}

/// Declarative crawl and extraction rule for one site page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapSelector {
    pub url: String,
    pub base: String,
    #[serde(
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub stype: Option<SelectorType>,
    pub recursive: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_param: String,
    pub page_start: i64,
    pub page_incr: i64,
    pub page_limit: i64,

    #[serde(deserialize_with = "deserialize_lenient_or_default")]
    pub id_from: IdSource,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id_prefix: String,
    pub id_extractor: IdExtractor,
    pub id: FieldRule,

    pub link: FieldRule,
    pub link_path_limit: usize,
    pub image: FieldRule,
    pub title: FieldRule,
    pub description: FieldRule,
    pub price: FieldRule,
    pub categories: FieldRule,
    pub stars: FieldRule,

    /// Comma separated fixed tags copied onto every record
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scrap_tags: String,
}

impl ScrapSelector {
    /// Checks the structural invariants of the selector
    ///
    /// A selector needs a container match, and a detail selector can never be
    /// recursive because detail pages have no further list to follow.
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.base.trim().is_empty() {
            return Err(SelectorError::MissingBase);
        }

        if self.stype == Some(SelectorType::Detail) && self.recursive {
            return Err(SelectorError::RecursiveDetail);
        }

        Ok(())
    }

    /// The selector type, defaulting to `list` when unset
    pub fn selector_type(&self) -> SelectorType {
        self.stype.unwrap_or_default()
    }

    /// Returns true if the selector spans several pages
    pub fn is_paginated(&self) -> bool {
        !self.page_param.is_empty()
    }
}

/// Deserializes an optional enum from a possibly empty string
fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn deserialize_lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String> + Default,
{
    Ok(deserialize_lenient(deserializer)?.unwrap_or_default())
}
