//! Selector persistence and job bookkeeping on top of a [`KeyValueStore`]
//!
//! # Key Layout
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `scrapSelector` | hash | selector JSON by `host:type` |
//! | `scrapJobs:<jobId>` | hash | record JSON by index hint |
//! | `scrapJobs:<jobId>:meta` | hash | `totalHits`, `start`, `finish`, `url`, `items`, `errors`, `lastError` |
//! | `scrapLog` | list | operational log lines, newest first |

use crate::extract::Item;
use crate::selector::{ScrapSelector, SelectorType};
use crate::state::JobState;
use crate::store::traits::{KeyValueStore, StoreError};
use crate::url::extract_host;
use crate::{Result, SelectorError};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const SCRAP_SELECTOR_KEY: &str = "scrapSelector";
const SCRAP_JOBS_KEY_PREFIX: &str = "scrapJobs";
const SCRAP_LOG_KEY: &str = "scrapLog";

/// Retention of the raw per-job record blob
pub const JOB_ITEMS_TTL_SECS: u64 = 60 * 10;
/// Retention of job metadata
pub const JOB_META_TTL_SECS: u64 = 60 * 60 * 24;
/// Index of the last operational log line kept (41 lines)
const SCRAP_LOG_LAST_INDEX: isize = 40;

/// Everything known about a job
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub meta: HashMap<String, String>,
    pub items: Vec<Item>,
}

impl JobReport {
    /// Derives the job state from its metadata
    pub fn state(&self) -> JobState {
        if self.meta.contains_key("finish") {
            JobState::Finished
        } else if self.meta.contains_key("start") {
            JobState::Running
        } else {
            JobState::Created
        }
    }

    /// Number of records stored so far
    pub fn item_count(&self) -> u64 {
        self.meta_count("items")
    }

    /// Number of records that failed extraction
    pub fn error_count(&self) -> u64 {
        self.meta_count("errors")
    }

    fn meta_count(&self, field: &str) -> u64 {
        self.meta
            .get(field)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Store adapter for selectors, jobs and the operational log
#[derive(Clone)]
pub struct ScrapData {
    store: Arc<dyn KeyValueStore>,
}

impl ScrapData {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Validates and persists a selector under its host and type
    ///
    /// A missing or unknown type is stored as `list`.
    pub async fn save_selector(&self, selector: &ScrapSelector) -> Result<()> {
        selector.validate()?;

        let host = extract_host(&selector.url);
        if host.is_empty() {
            return Err(SelectorError::InvalidUrl {
                url: selector.url.clone(),
                message: "no host to file the selector under".to_string(),
            }
            .into());
        }

        let document = serde_json::to_string(selector).map_err(StoreError::from)?;
        let field = selector_field(&host, selector.selector_type());
        self.store.hset(SCRAP_SELECTOR_KEY, &field, &document).await?;

        tracing::debug!("Saved selector {}", field);
        Ok(())
    }

    /// Looks up the persisted selector for the host of `url`
    ///
    /// The returned selector's URL is replaced with `url`.
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapSelector)` - The stored selector
    /// * `Err(HarvestError::Store(StoreError::SelectorNotFound))` - Nothing stored for host and type
    pub async fn selector(&self, url: &str, stype: SelectorType) -> Result<ScrapSelector> {
        let field = selector_field(&extract_host(url), stype);

        let document = self
            .store
            .hget(SCRAP_SELECTOR_KEY, &field)
            .await?
            .filter(|d| !d.is_empty())
            .ok_or(StoreError::SelectorNotFound { key: field })?;

        let mut selector: ScrapSelector =
            serde_json::from_str(&document).map_err(StoreError::from)?;
        selector.url = url.to_string();
        Ok(selector)
    }

    /// Records the start of a job, resetting counters from a previous run
    pub async fn start_job(&self, job_id: &str, selector: &ScrapSelector) -> Result<()> {
        let meta = job_meta_key(job_id);
        let now = Utc::now().timestamp().to_string();

        self.store.hincr_by(&meta, "totalHits", 1).await?;
        self.store.hset(&meta, "start", &now).await?;
        self.store.hset(&meta, "url", &selector.url).await?;

        for field in ["items", "finish", "errors", "lastError"] {
            self.store.hdel(&meta, field).await?;
        }

        self.refresh_expiry(job_id).await
    }

    /// Records the end of a job
    pub async fn finish_job(&self, job_id: &str) -> Result<()> {
        let now = Utc::now().timestamp().to_string();
        self.store.hset(&job_meta_key(job_id), "finish", &now).await?;
        self.refresh_expiry(job_id).await
    }

    /// Counts a failed record against the job and remembers its message
    pub async fn record_item_error(&self, job_id: &str, message: &str) -> Result<()> {
        let meta = job_meta_key(job_id);
        self.store.hincr_by(&meta, "errors", 1).await?;
        self.store.hset(&meta, "lastError", message).await?;
        Ok(())
    }

    /// Stores a record in the job blob under its index hint
    pub async fn store_item(&self, job_id: &str, item: &Item) -> Result<()> {
        let document = serde_json::to_string(item).map_err(StoreError::from)?;

        self.store
            .hset(&job_items_key(job_id), &item.index, &document)
            .await?;
        self.store
            .hincr_by(&job_meta_key(job_id), "items", 1)
            .await?;

        self.refresh_expiry(job_id).await
    }

    /// Returns job metadata and stored records
    ///
    /// Records that no longer deserialize are skipped.
    pub async fn scrap_job(&self, job_id: &str) -> Result<JobReport> {
        let meta = self.store.hgetall(&job_meta_key(job_id)).await?;
        let blobs = self.store.hgetall(&job_items_key(job_id)).await?;

        let items: Vec<Item> = blobs
            .into_iter()
            .filter_map(|(index, blob)| match serde_json::from_str(&blob) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable record {} of job {}: {}", index, job_id, e);
                    None
                }
            })
            .collect();

        if meta.is_empty() && items.is_empty() {
            return Err(StoreError::JobNotFound(job_id.to_string()).into());
        }

        Ok(JobReport { meta, items })
    }

    /// Returns the operational log, newest line first
    ///
    /// The log is trimmed to its last 41 lines before reading.
    pub async fn scrap_log(&self) -> Result<Vec<String>> {
        self.store
            .ltrim(SCRAP_LOG_KEY, 0, SCRAP_LOG_LAST_INDEX)
            .await?;
        Ok(self.store.lrange(SCRAP_LOG_KEY, 0, -1).await?)
    }

    /// Appends a line to the operational log
    pub async fn scrap_log_write(&self, line: &str) -> Result<()> {
        self.store.lpush(SCRAP_LOG_KEY, line).await?;
        Ok(())
    }

    async fn refresh_expiry(&self, job_id: &str) -> Result<()> {
        self.store
            .expire(&job_items_key(job_id), JOB_ITEMS_TTL_SECS)
            .await?;
        self.store
            .expire(&job_meta_key(job_id), JOB_META_TTL_SECS)
            .await?;
        Ok(())
    }
}

fn selector_field(host: &str, stype: SelectorType) -> String {
    format!("{}:{}", host, stype)
}

fn job_items_key(job_id: &str) -> String {
    format!("{}:{}", SCRAP_JOBS_KEY_PREFIX, job_id)
}

fn job_meta_key(job_id: &str) -> String {
    format!("{}:meta", job_items_key(job_id))
}
