//! Direct crawl orchestration
//!
//! One job per selector: the selector is expanded into pages, every page is
//! fetched and extracted by its own task, and a coordinating task closes the
//! output once all pages are done.

use crate::crawler::job::{
    generate_job_id, ItemResult, JobLifecycle, JobMode, ScrapContext, ScrapOutput, Scraper,
};
use crate::extract::{base_snippet, scrap_document};
use crate::selector::{paginate, ScrapSelector};
use crate::state::JobState;
use crate::store::ScrapData;
use crate::{Result, SelectorError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Operational log line written when a selector has malformed CSS
pub const BAD_CSS_LOG_LINE: &str = "ERROR: bad CSS Selector, please review the syntax";

/// Scraper that fetches every page of a selector concurrently
#[derive(Clone)]
pub struct DefaultScraper {
    context: ScrapContext,
}

impl DefaultScraper {
    pub fn new(context: ScrapContext) -> Self {
        Self { context }
    }

    /// Fetches the selector's page and returns the inner HTML of the first
    /// container match
    pub async fn snippet_base(&self, selector: &ScrapSelector) -> Result<String> {
        if selector.base.trim().is_empty() {
            return Err(SelectorError::MissingBase.into());
        }

        let body = fetch_page(&self.context, &selector.url).await?;
        base_snippet(selector, &body)
    }
}

#[async_trait]
impl Scraper for DefaultScraper {
    async fn scrap(&self, selector: ScrapSelector) -> Result<ScrapOutput> {
        selector.validate()?;
        let pages = paginate(&selector)?;

        let job_id = generate_job_id(JobMode::Direct, &selector.url);
        let mut lifecycle = JobLifecycle::new(&job_id);

        tracing::info!("Scrap [{}] started with {} page(s)", job_id, pages.len());
        start_job(&self.context.data, &job_id, &selector).await;
        lifecycle.advance(JobState::Running);

        let (tx, rx) = mpsc::channel(self.context.buffer_size);
        let tracker = TaskTracker::new();

        for page in pages {
            let context = self.context.clone();
            let job_id = job_id.clone();
            let tx = tx.clone();
            tracker.spawn(async move {
                scrap_page(context, job_id, page, tx).await;
            });
        }
        tracker.close();

        let data = self.context.data.clone();
        let coordinator_job_id = job_id.clone();
        tokio::spawn(async move {
            tracker.wait().await;

            lifecycle.advance(JobState::Draining);
            drop(tx);

            finish_job(&data, &coordinator_job_id).await;
            lifecycle.advance(JobState::Finished);
        });

        Ok((job_id, rx))
    }
}

/// Fetches a page through the engine's connection gate
async fn fetch_page(context: &ScrapContext, url: &str) -> Result<String> {
    // the permit is released as soon as the body is in memory
    let _permit = context
        .gate
        .acquire()
        .await
        .map_err(|e| crate::crawler::FetchError::Client(e.to_string()))?;

    Ok(context.fetcher.fetch(url).await?)
}

async fn scrap_page(
    context: ScrapContext,
    job_id: String,
    page: ScrapSelector,
    tx: mpsc::Sender<ItemResult>,
) {
    tracing::info!("Scrap [{}] GET from {}", job_id, page.url);

    let body = match fetch_page(&context, &page.url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Scrap [{}] failed to fetch {}: {}", job_id, page.url, e);
            return;
        }
    };

    emit_document(&context.data, &job_id, &page, &body, &tx).await;
    tracing::debug!("Scrap [{}] finished page {}", job_id, page.url);
}

/// Extracts every record of `body` and sends them in document order
///
/// A malformed CSS expression drops the whole page and is reported to the
/// operational log.
pub(crate) async fn emit_document(
    data: &ScrapData,
    job_id: &str,
    selector: &ScrapSelector,
    body: &str,
    tx: &mpsc::Sender<ItemResult>,
) {
    let results = match scrap_document(job_id, selector, body) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Scrap [{}] applying selectors to {}: {}", job_id, selector.url, e);
            if let Err(e) = data.scrap_log_write(BAD_CSS_LOG_LINE).await {
                tracing::warn!("Failed to write operational log: {}", e);
            }
            return;
        }
    };

    for result in results {
        if tx.send(result).await.is_err() {
            tracing::warn!("Scrap [{}] output receiver dropped", job_id);
            return;
        }
    }
}

/// Records job start; store failures only degrade bookkeeping
pub(crate) async fn start_job(data: &ScrapData, job_id: &str, selector: &ScrapSelector) {
    if let Err(e) = data.start_job(job_id, selector).await {
        tracing::warn!("Scrap [{}] failed to record job start: {}", job_id, e);
    }
    let line = format!("INFO: Scrap [{}] started {}", job_id, selector.url);
    if let Err(e) = data.scrap_log_write(&line).await {
        tracing::warn!("Failed to write operational log: {}", e);
    }
}

/// Records job finish; store failures only degrade bookkeeping
pub(crate) async fn finish_job(data: &ScrapData, job_id: &str) {
    tracing::info!("Scrap [{}] finished", job_id);
    if let Err(e) = data.finish_job(job_id).await {
        tracing::warn!("Scrap [{}] failed to record job finish: {}", job_id, e);
    }
    let line = format!("INFO: Scrap [{}] finished", job_id);
    if let Err(e) = data.scrap_log_write(&line).await {
        tracing::warn!("Failed to write operational log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchError, Fetcher};
    use crate::selector::FieldRule;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves canned pages and records the peak number of concurrent fetches
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn page(titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .map(|t| format!(r#"<div class="item"><h2>{}</h2></div>"#, t))
            .collect();
        format!("<html><body>{}</body></html>", items)
    }

    fn selector() -> ScrapSelector {
        ScrapSelector {
            url: "http://shop.example/list?p=0".to_string(),
            base: ".item".to_string(),
            id: FieldRule::text("h2"),
            title: FieldRule::text("h2"),
            page_param: "p".to_string(),
            page_start: 0,
            page_incr: 1,
            page_limit: 3,
            ..Default::default()
        }
    }

    fn context(fetcher: Arc<StaticFetcher>, max_connections: usize) -> (ScrapContext, ScrapData) {
        let data = ScrapData::new(Arc::new(MemoryStore::new()));
        (
            ScrapContext::new(fetcher, data.clone(), max_connections, 4),
            data,
        )
    }

    async fn collect(mut rx: crate::crawler::ItemStream) -> Vec<ItemResult> {
        let mut out = Vec::new();
        while let Some(r) = rx.recv().await {
            out.push(r);
        }
        out
    }

    #[tokio::test]
    async fn test_scrap_all_pages() {
        let mut fetcher = StaticFetcher::default();
        fetcher.pages.insert("http://shop.example/list?p=0".into(), page(&["a", "b"]));
        fetcher.pages.insert("http://shop.example/list?p=1".into(), page(&["c"]));
        fetcher.pages.insert("http://shop.example/list?p=2".into(), page(&["d", "e"]));
        let (context, data) = context(Arc::new(fetcher), 10);

        let (job_id, rx) = DefaultScraper::new(context).scrap(selector()).await.unwrap();
        assert!(job_id.starts_with('D'));

        let results = collect(rx).await;
        let mut titles: Vec<_> = results.iter().map(|r| r.item.title.clone()).collect();
        titles.sort();
        assert_eq!(titles, vec!["a", "b", "c", "d", "e"]);
        assert!(results.iter().all(|r| r.job_id == job_id));

        // finish metadata follows channel closure
        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = data.scrap_job(&job_id).await.unwrap();
        assert_eq!(report.state(), JobState::Finished);
    }

    #[tokio::test]
    async fn test_page_order_is_preserved_within_a_page() {
        let mut fetcher = StaticFetcher::default();
        fetcher.pages.insert("http://one.example/".into(), page(&["1", "2", "3", "4"]));
        let (context, _) = context(Arc::new(fetcher), 10);

        let s = ScrapSelector {
            url: "http://one.example/".to_string(),
            base: ".item".to_string(),
            title: FieldRule::text("h2"),
            ..Default::default()
        };
        let (_, rx) = DefaultScraper::new(context).scrap(s).await.unwrap();
        let titles: Vec<_> = collect(rx).await.into_iter().map(|r| r.item.title).collect();
        assert_eq!(titles, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_failed_page_contributes_nothing() {
        let mut fetcher = StaticFetcher::default();
        fetcher.pages.insert("http://shop.example/list?p=0".into(), page(&["a"]));
        fetcher.pages.insert("http://shop.example/list?p=2".into(), page(&["c"]));
        let (context, _) = context(Arc::new(fetcher), 10);

        let (_, rx) = DefaultScraper::new(context).scrap(selector()).await.unwrap();
        assert_eq!(collect(rx).await.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_gate_bounds_fetches() {
        let mut fetcher = StaticFetcher::default();
        for p in 0..8 {
            fetcher
                .pages
                .insert(format!("http://shop.example/list?p={}", p), page(&["x"]));
        }
        let fetcher = Arc::new(fetcher);
        let (context, _) = context(fetcher.clone(), 2);

        let mut s = selector();
        s.page_limit = 8;
        let (_, rx) = DefaultScraper::new(context).scrap(s).await.unwrap();
        assert_eq!(collect(rx).await.len(), 8);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_invalid_selector_creates_no_job() {
        let (context, data) = context(Arc::new(StaticFetcher::default()), 10);
        let mut s = selector();
        s.base = String::new();

        let err = DefaultScraper::new(context).scrap(s.clone()).await.unwrap_err();
        assert!(matches!(err, crate::HarvestError::Selector(SelectorError::MissingBase)));

        let job_id = generate_job_id(JobMode::Direct, &s.url);
        assert!(data.scrap_job(&job_id).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_css_is_logged() {
        let mut fetcher = StaticFetcher::default();
        fetcher.pages.insert("http://one.example/".into(), page(&["1"]));
        let (context, data) = context(Arc::new(fetcher), 10);

        let s = ScrapSelector {
            url: "http://one.example/".to_string(),
            base: ".item".to_string(),
            title: FieldRule::text("h2[[["),
            ..Default::default()
        };
        let (_, rx) = DefaultScraper::new(context).scrap(s).await.unwrap();
        assert!(collect(rx).await.is_empty());

        let log = data.scrap_log().await.unwrap();
        assert!(log.iter().any(|line| line == BAD_CSS_LOG_LINE));
    }

    #[tokio::test]
    async fn test_snippet_base() {
        let mut fetcher = StaticFetcher::default();
        fetcher.pages.insert("http://one.example/".into(), page(&["first", "second"]));
        let (context, _) = context(Arc::new(fetcher), 10);

        let s = ScrapSelector {
            url: "http://one.example/".to_string(),
            base: ".item".to_string(),
            ..Default::default()
        };
        let snippet = DefaultScraper::new(context).snippet_base(&s).await.unwrap();
        assert_eq!(snippet, "<h2>first</h2>");
    }
}
