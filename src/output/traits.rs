//! Output sink traits and types
//!
//! This module defines the trait interface for record sinks and the
//! associated error type.

use crate::extract::Item;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while storing a record
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Sink '{sink}' refused the record: {reason}")]
    Rejected { sink: &'static str, reason: String },

    #[error("Request failed: {0}")]
    Http(String),

    #[error("No document at {endpoint}")]
    NotFound { endpoint: String },

    #[error("Search index answered HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),
}

impl OutputError {
    /// Returns true when the requested document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for extracted records
///
/// Sinks are independent: the fan-out calls every sink for every record and
/// a failure in one never affects the others. Implementations must be
/// thread-safe.
#[async_trait]
pub trait ItemSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Stores one record of job `job_id`
    ///
    /// # Arguments
    ///
    /// * `job_id` - The job that produced the record
    /// * `item` - The record, with its index hint already set
    async fn store(&self, job_id: &str, item: &Item) -> OutputResult<()>;
}
