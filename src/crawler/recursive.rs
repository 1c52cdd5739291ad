//! Recursive list -> detail crawling
//!
//! A recursive selector describes a list page. Every record found on it links
//! to a detail page, which is crawled with the detail selector stored for the
//! link's host. The detail records are republished under the list job's id.

use crate::crawler::job::{
    generate_job_id, ItemResult, JobLifecycle, JobMode, ScrapOutput, Scraper,
};
use crate::crawler::orchestrator::{finish_job, start_job};
use crate::selector::{ScrapSelector, SelectorType};
use crate::state::JobState;
use crate::store::ScrapData;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Scraper that follows record links into detail pages
#[derive(Clone)]
pub struct RecursiveScraper {
    base: Arc<dyn Scraper>,
    data: ScrapData,
    buffer_size: usize,
    max_depth: usize,
}

impl RecursiveScraper {
    /// Creates a recursive scraper on top of `base`
    ///
    /// # Arguments
    ///
    /// * `base` - Scraper used for every single (list or detail) crawl
    /// * `data` - Store holding the detail selectors
    /// * `buffer_size` - Capacity of the recursive job's output channel
    /// * `max_depth` - Deepest nested crawl allowed (the list crawl is depth 0)
    pub fn new(base: Arc<dyn Scraper>, data: ScrapData, buffer_size: usize, max_depth: usize) -> Self {
        Self {
            base,
            data,
            buffer_size: buffer_size.max(1),
            max_depth,
        }
    }

    /// Returns the selector to crawl with
    ///
    /// A selector with a container match is used as-is. Otherwise the stored
    /// selector for the URL's host is looked up: with the requested type if
    /// one is given, else `list` first and `detail` if no list selector exists.
    pub async fn resolve_selector(&self, selector: ScrapSelector) -> Result<ScrapSelector> {
        if !selector.base.is_empty() {
            return Ok(selector);
        }

        if let Some(stype) = selector.stype {
            return self.data.selector(&selector.url, stype).await;
        }

        match self.data.selector(&selector.url, SelectorType::List).await {
            Err(e) if e.is_not_found() => {
                self.data
                    .selector(&selector.url, SelectorType::Detail)
                    .await
            }
            other => other,
        }
    }

    fn scrap_at_depth(&self, selector: ScrapSelector, depth: usize) -> BoxFuture<'static, Result<ScrapOutput>> {
        let this = self.clone();
        async move { this.run(selector, depth).await }.boxed()
    }

    async fn run(self, selector: ScrapSelector, depth: usize) -> Result<ScrapOutput> {
        if depth > self.max_depth {
            return Err(HarvestError::RecursionLimit {
                url: selector.url,
                depth,
                limit: self.max_depth,
            });
        }

        let selector = self.resolve_selector(selector).await?;
        selector.validate()?;

        let (base_job_id, base_rx) = self.base.scrap(selector.clone()).await?;
        if !selector.recursive {
            return Ok((base_job_id, base_rx));
        }

        let job_id = generate_job_id(JobMode::Recursive, &selector.url);
        let mut lifecycle = JobLifecycle::new(&job_id);
        tracing::info!(
            "Scrap [{}] recursive started over [{}]",
            job_id,
            base_job_id
        );

        start_job(&self.data, &job_id, &selector).await;
        lifecycle.advance(JobState::Running);

        let (tx, rx) = mpsc::channel(self.buffer_size);
        let parent_job_id = job_id.clone();

        tokio::spawn(async move {
            let tracker = TaskTracker::new();
            let mut base_rx = base_rx;

            while let Some(result) = base_rx.recv().await {
                let this = self.clone();
                let parent_job_id = parent_job_id.clone();
                let tx = tx.clone();
                tracker.spawn(async move {
                    this.scrap_item(&parent_job_id, result, depth, tx).await;
                });
            }

            tracker.close();
            tracker.wait().await;

            lifecycle.advance(JobState::Draining);
            drop(tx);

            finish_job(&self.data, &parent_job_id).await;
            lifecycle.advance(JobState::Finished);
        });

        Ok((job_id, rx))
    }

    /// Crawls the detail page of one list record and forwards its records
    async fn scrap_item(
        &self,
        parent_job_id: &str,
        result: ItemResult,
        depth: usize,
        tx: mpsc::Sender<ItemResult>,
    ) {
        if let Some(e) = result.error {
            tracing::error!(
                "Scrap [{}] list record has an error, not following it: {}",
                parent_job_id,
                e
            );
            return;
        }

        let link = result.item.link;
        let mut detail = match self.data.selector(&link, SelectorType::Detail).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::error!(
                    "Scrap [{}] no detail selector for link {}: {}",
                    parent_job_id,
                    link,
                    e
                );
                return;
            }
        };
        detail.url = link.clone();
        detail.recursive = false;

        let (_, mut nested) = match self.scrap_at_depth(detail, depth + 1).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Scrap [{}] nested crawl of {} refused: {}", parent_job_id, link, e);
                return;
            }
        };

        while let Some(mut nested_result) = nested.recv().await {
            nested_result.job_id = parent_job_id.to_string();
            if tx.send(nested_result).await.is_err() {
                tracing::warn!("Scrap [{}] output receiver dropped", parent_job_id);
                return;
            }
        }
    }
}

#[async_trait]
impl Scraper for RecursiveScraper {
    async fn scrap(&self, selector: ScrapSelector) -> Result<ScrapOutput> {
        self.scrap_at_depth(selector, 0).await
    }
}
