//! Engine wiring
//!
//! The engine owns everything shared between jobs: the fetcher, the
//! connection gate, the store and the configured sinks. Scrapers handed out
//! by the engine all draw from the same gate.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
use crate::crawler::job::ScrapContext;
use crate::crawler::orchestrator::DefaultScraper;
use crate::crawler::reader::ReaderScraper;
use crate::crawler::recursive::RecursiveScraper;
use crate::output::{build_sinks, ItemSink, ScrapAndStore, StoreSummary};
use crate::selector::ScrapSelector;
use crate::store::{open_store, ScrapData};
use crate::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared crawl engine
#[derive(Clone)]
pub struct Engine {
    context: ScrapContext,
    max_depth: usize,
    sinks: Vec<Arc<dyn ItemSink>>,
}

impl Engine {
    /// Builds an engine from the configuration
    ///
    /// Opens the configured store, builds one HTTP client shared by page
    /// fetches and the search index sink, and creates the configured sinks.
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Ready to crawl
    /// * `Err(HarvestError)` - The store or the HTTP client could not be set up
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.store).await?;
        let data = ScrapData::new(store);

        let client = build_http_client(&config.scraper)
            .map_err(|e| FetchError::Client(e.to_string()))?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_client(client.clone()));

        let context = ScrapContext::new(
            fetcher,
            data.clone(),
            config.scraper.max_connections,
            config.scraper.buffer_size,
        );
        let sinks = build_sinks(&config.output, &data, client);

        tracing::info!(
            "Engine ready: {} connection(s), {} sink(s), recursion depth {}",
            config.scraper.max_connections,
            sinks.len(),
            config.scraper.max_recursion_depth
        );

        Ok(Self {
            context,
            max_depth: config.scraper.max_recursion_depth,
            sinks,
        })
    }

    /// Creates an engine without sinks
    pub fn new(context: ScrapContext, max_depth: usize) -> Self {
        Self {
            context,
            max_depth,
            sinks: Vec::new(),
        }
    }

    /// Replaces the sinks used by [`Engine::scrap_and_store`]
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn ItemSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn context(&self) -> &ScrapContext {
        &self.context
    }

    pub fn data(&self) -> &ScrapData {
        &self.context.data
    }

    /// Scraper crawling a selector's pages without following links
    pub fn scraper(&self) -> DefaultScraper {
        DefaultScraper::new(self.context.clone())
    }

    /// Scraper following record links into detail pages
    pub fn recursive_scraper(&self) -> RecursiveScraper {
        RecursiveScraper::new(
            Arc::new(self.scraper()),
            self.context.data.clone(),
            self.context.buffer_size,
            self.max_depth,
        )
    }

    /// Scraper extracting from `body` instead of fetching
    pub fn reader_scraper(&self, body: impl Into<String>) -> ReaderScraper {
        ReaderScraper::new(self.context.data.clone(), body, self.context.buffer_size)
    }

    /// Crawls recursively and stores every record in all sinks
    ///
    /// # Returns
    ///
    /// * `Ok((job_id, handle))` - The job id and a handle resolving with the
    ///   storage counts once the job's records are all stored
    /// * `Err(HarvestError)` - The crawl could not be started
    pub async fn scrap_and_store(
        &self,
        selector: ScrapSelector,
    ) -> Result<(String, JoinHandle<StoreSummary>)> {
        let fanout = ScrapAndStore::new(
            Arc::new(self.recursive_scraper()),
            self.context.data.clone(),
            self.sinks.clone(),
        );
        fanout.scrap_and_store(selector).await
    }

    /// Fetches the selector's page and returns its first container match
    pub async fn snippet_base(&self, selector: &ScrapSelector) -> Result<String> {
        self.scraper().snippet_base(selector).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, SinkKind};
    use crate::crawler::Scraper;
    use crate::selector::FieldRule;
    use crate::store::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine() -> Engine {
        let data = ScrapData::new(Arc::new(MemoryStore::new()));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_client(reqwest::Client::new()));
        Engine::new(ScrapContext::new(fetcher, data, 4, 8), 2)
    }

    #[tokio::test]
    async fn test_from_config_memory_store() {
        let config = Config {
            output: OutputConfig {
                sinks: vec![SinkKind::Kv],
                ..Default::default()
            },
            ..Default::default()
        };

        let engine = Engine::from_config(&config).await.unwrap();
        assert_eq!(engine.sinks.len(), 1);
        assert_eq!(engine.context().gate.available_permits(), 1000);
    }

    #[tokio::test]
    async fn test_snippet_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<div class="p"><b>first</b></div><div class="p">second</div>"#),
            )
            .mount(&server)
            .await;

        let selector = ScrapSelector {
            url: format!("{}/list", server.uri()),
            base: ".p".to_string(),
            ..Default::default()
        };
        assert_eq!(engine().snippet_base(&selector).await.unwrap(), "<b>first</b>");
    }

    #[tokio::test]
    async fn test_reader_scraper_uses_engine_store() {
        let engine = engine();
        let selector = ScrapSelector {
            url: "http://shop.example/".to_string(),
            base: ".p".to_string(),
            id: FieldRule::text("b"),
            ..Default::default()
        };

        let (job_id, mut rx) = engine
            .reader_scraper(r#"<div class="p"><b>1</b></div>"#)
            .scrap(selector)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.item.id, "1");
        assert!(rx.recv().await.is_none());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(engine.data().scrap_job(&job_id).await.is_ok());
    }
}
