//! Storage fan-out
//!
//! Drains a job's output and hands every good record to every sink.
//! Records carrying an extraction error are counted against the job instead.

use crate::crawler::{ItemStream, Scraper};
use crate::extract::Item;
use crate::output::traits::ItemSink;
use crate::selector::ScrapSelector;
use crate::store::ScrapData;
use crate::url::item_index;
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Counts collected while storing one job's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Records received without an extraction error
    pub records: usize,
    /// Records received with an extraction error
    pub item_errors: usize,
    /// Successful sink writes
    pub stored: usize,
    /// Failed sink writes
    pub failed: usize,
}

/// Runs a scraper and stores everything it produces
#[derive(Clone)]
pub struct ScrapAndStore {
    scraper: Arc<dyn Scraper>,
    data: ScrapData,
    sinks: Vec<Arc<dyn ItemSink>>,
}

impl ScrapAndStore {
    pub fn new(scraper: Arc<dyn Scraper>, data: ScrapData, sinks: Vec<Arc<dyn ItemSink>>) -> Self {
        Self {
            scraper,
            data,
            sinks,
        }
    }

    /// Saves the selector, starts the crawl and stores its records in the
    /// background
    ///
    /// # Returns
    ///
    /// * `Ok((job_id, handle))` - The job id and a handle resolving once every
    ///   record has been stored
    /// * `Err(HarvestError)` - The crawl could not be started
    pub async fn scrap_and_store(
        &self,
        selector: ScrapSelector,
    ) -> Result<(String, JoinHandle<StoreSummary>)> {
        // a selector that cannot be saved may still be crawlable
        if let Err(e) = self.data.save_selector(&selector).await {
            tracing::warn!("Selector for {} not saved: {}", selector.url, e);
        }

        let (job_id, items) = self.scraper.scrap(selector).await?;

        let this = self.clone();
        let handle = tokio::spawn(async move { this.store(items).await });

        Ok((job_id, handle))
    }

    /// Stores every record of `items` until the stream closes
    pub async fn store(&self, mut items: ItemStream) -> StoreSummary {
        let tracker = TaskTracker::new();
        let stored = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let mut summary = StoreSummary::default();

        while let Some(result) = items.recv().await {
            if let Some(e) = result.error {
                summary.item_errors += 1;
                tracing::error!("Scrap [{}] record not stored: {}", result.job_id, e);
                if let Err(store_err) = self
                    .data
                    .record_item_error(&result.job_id, &e.to_string())
                    .await
                {
                    tracing::warn!(
                        "Scrap [{}] failed to record item error: {}",
                        result.job_id,
                        store_err
                    );
                }
                continue;
            }

            summary.records += 1;
            let mut item = result.item;
            item.index = item_index(&item.scrap_url, &item.id);
            let item: Arc<Item> = Arc::new(item);
            let job_id: Arc<str> = Arc::from(result.job_id);

            for sink in &self.sinks {
                let sink = sink.clone();
                let item = item.clone();
                let job_id = job_id.clone();
                let stored = stored.clone();
                let failed = failed.clone();

                tracker.spawn(async move {
                    match sink.store(&job_id, &item).await {
                        Ok(()) => {
                            stored.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::SeqCst);
                            tracing::error!(
                                "Scrap [{}] sink {} failed for {}: {}",
                                job_id,
                                sink.name(),
                                item.id,
                                e
                            );
                        }
                    }
                });
            }
        }

        tracker.close();
        tracker.wait().await;

        summary.stored = stored.load(Ordering::SeqCst);
        summary.failed = failed.load(Ordering::SeqCst);
        tracing::info!(
            "Stored {} record(s): {} sink write(s), {} failure(s), {} record error(s)",
            summary.records,
            summary.stored,
            summary.failed,
            summary.item_errors
        );
        summary
    }
}
