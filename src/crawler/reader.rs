//! Scraping a document that is already in memory
//!
//! Useful for testing selectors against saved pages without any network.

use crate::crawler::job::{generate_job_id, JobLifecycle, JobMode, ScrapOutput, Scraper};
use crate::crawler::orchestrator::{emit_document, finish_job, start_job};
use crate::selector::ScrapSelector;
use crate::state::JobState;
use crate::store::ScrapData;
use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Scraper over a pre-supplied document body
///
/// The selector's URL is only used as the record source URL and for the job
/// id; nothing is fetched and pagination is ignored.
#[derive(Clone)]
pub struct ReaderScraper {
    data: ScrapData,
    body: String,
    buffer_size: usize,
}

impl ReaderScraper {
    pub fn new(data: ScrapData, body: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            data,
            body: body.into(),
            buffer_size: buffer_size.max(1),
        }
    }
}

#[async_trait]
impl Scraper for ReaderScraper {
    async fn scrap(&self, selector: ScrapSelector) -> Result<ScrapOutput> {
        selector.validate()?;

        let job_id = generate_job_id(JobMode::Reader, &selector.url);
        let mut lifecycle = JobLifecycle::new(&job_id);
        tracing::info!("Scrap [{}] from reader started", job_id);

        start_job(&self.data, &job_id, &selector).await;
        lifecycle.advance(JobState::Running);

        let (tx, rx) = mpsc::channel(self.buffer_size);
        let data = self.data.clone();
        let body = self.body.clone();
        let task_job_id = job_id.clone();

        tokio::spawn(async move {
            emit_document(&data, &task_job_id, &selector, &body, &tx).await;

            lifecycle.advance(JobState::Draining);
            drop(tx);

            finish_job(&data, &task_job_id).await;
            lifecycle.advance(JobState::Finished);
        });

        Ok((job_id, rx))
    }
}
