//! Job identity, result envelope, and the shared scraping context

use crate::crawler::fetcher::Fetcher;
use crate::extract::Item;
use crate::selector::ScrapSelector;
use crate::state::JobState;
use crate::store::ScrapData;
use crate::{ExtractError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// One record flowing through a job's output channel
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub job_id: String,
    pub item: Item,
    /// Set when the record could not be fully extracted (e.g. no identifier)
    pub error: Option<ExtractError>,
}

/// Receiving end of a job's output; closure marks the end of the job
pub type ItemStream = mpsc::Receiver<ItemResult>;

/// A started job: its identifier and its still-open output
pub type ScrapOutput = (String, ItemStream);

/// Something that turns a selector into a stream of records
///
/// `scrap` returns as soon as the job is started. Selector problems are
/// reported synchronously; everything that happens later (fetch failures,
/// bad records) only shows up in logs, job metadata, or `ItemResult::error`.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrap(&self, selector: ScrapSelector) -> Result<ScrapOutput>;
}

/// How a job was started; decides the job id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Direct,
    Recursive,
    Reader,
}

impl JobMode {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Direct => "D",
            Self::Recursive => "R",
            Self::Reader => "READER",
        }
    }
}

/// Derives a job id from the mode and the selector URL
///
/// The id is the mode prefix followed by the decimal 32-bit FNV-1 hash of
/// the URL, so re-running a crawl of the same URL reuses the job id.
///
/// # Examples
///
/// ```
/// use sumi_harvest::crawler::{generate_job_id, JobMode};
///
/// assert_eq!(generate_job_id(JobMode::Direct, "http://test"), "D2831436655");
/// ```
pub fn generate_job_id(mode: JobMode, url: &str) -> String {
    format!("{}{}", mode.prefix(), fnv1_32(url.as_bytes()))
}

fn fnv1_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(PRIME) ^ u32::from(*byte)
    })
}

/// Tracks a job through `Created -> Running -> Draining -> Finished`
#[derive(Debug)]
pub(crate) struct JobLifecycle {
    job_id: String,
    state: JobState,
}

impl JobLifecycle {
    pub(crate) fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            state: JobState::Created,
        }
    }

    /// Moves the job forward, logging refused transitions
    pub(crate) fn advance(&mut self, next: JobState) {
        match self.state.transition(next) {
            Ok(state) => {
                tracing::debug!("Scrap [{}] {}", self.job_id, state);
                self.state = state;
            }
            Err(e) => tracing::error!("Scrap [{}] {}", self.job_id, e),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> JobState {
        self.state
    }
}

/// Everything a crawl needs from its engine
///
/// Cloning is cheap; all clones share the fetcher, the connection gate
/// and the store.
#[derive(Clone)]
pub struct ScrapContext {
    pub fetcher: Arc<dyn Fetcher>,
    /// Bounds concurrent page fetches across every job of the engine
    pub gate: Arc<Semaphore>,
    pub data: ScrapData,
    /// Capacity of each job's output channel
    pub buffer_size: usize,
}

impl ScrapContext {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        data: ScrapData,
        max_connections: usize,
        buffer_size: usize,
    ) -> Self {
        Self {
            fetcher,
            gate: Arc::new(Semaphore::new(max_connections.max(1))),
            data,
            buffer_size: buffer_size.max(1),
        }
    }
}
