//! Sumi-Harvest: a selector-driven record harvester
//!
//! This crate crawls web pages, extracts structured records from them using
//! declarative CSS selector documents, and streams the records to pluggable
//! storage sinks. Selectors and job metadata live in a key-value store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod selector;
pub mod state;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Recursion depth {depth} exceeds the limit of {limit} for {url}")]
    RecursionLimit {
        url: String,
        depth: usize,
        limit: usize,
    },

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true when the error means "no such selector, job or record"
    ///
    /// Callers use this to answer with a not-found status instead of treating
    /// the failure as a transport problem.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) => e.is_not_found(),
            Self::Output(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Selector validation errors
///
/// These are raised synchronously before any page is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("No base selector for the scraping")]
    MissingBase,

    #[error("Invalid selector: a detail selector can not be recursive")]
    RecursiveDetail,

    #[error("Invalid selector URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// Errors produced while extracting a record from a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("The index [{index}] to split the path [{path}] of the url is out of bounds: {segments}")]
    PathIndexOutOfBounds {
        index: i64,
        path: String,
        segments: String,
    },

    #[error("The index [{index}] to split [{segment}] is out of bounds: {parts}")]
    SplitIndexOutOfBounds {
        index: i64,
        segment: String,
        parts: String,
    },

    #[error("Bad CSS selector for {field}: '{expression}' ({message})")]
    InvalidExpression {
        field: &'static str,
        expression: String,
        message: String,
    },
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{DefaultScraper, Engine, ItemResult, ReaderScraper, RecursiveScraper, Scraper};
pub use extract::Item;
pub use selector::{FieldRule, IdExtractor, IdSource, ScrapSelector, SelectorType};
pub use state::JobState;
pub use store::{KeyValueStore, MemoryStore, ScrapData};
