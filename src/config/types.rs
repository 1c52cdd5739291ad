use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fetch and extraction behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// User-Agent header sent with every page request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Connect and round-trip timeout for page requests (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum number of concurrent page fetches across all jobs
    #[serde(rename = "max-connections")]
    pub max_connections: usize,

    /// Capacity of each job's item channel
    #[serde(rename = "buffer-size")]
    pub buffer_size: usize,

    /// Maximum nesting of list -> detail crawls
    #[serde(rename = "max-recursion-depth")]
    pub max_recursion_depth: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "sumi-harvest".to_string(),
            timeout_secs: 5,
            max_connections: 1000,
            buffer_size: 100,
            max_recursion_depth: 2,
        }
    }
}

/// Backend used for selectors, job metadata and the operational log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

/// Selector/job store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL for the redis backend (e.g. "redis://127.0.0.1:6379/0")
    #[serde(rename = "redis-url")]
    pub redis_url: Option<String>,
}

/// Storage sink kinds records can be dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Elastic,
    Kv,
    File,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sinks every extracted record is sent to
    pub sinks: Vec<SinkKind>,

    /// Base URL of the search index
    #[serde(rename = "elastic-url")]
    pub elastic_url: String,

    /// Search index name
    #[serde(rename = "elastic-index")]
    pub elastic_index: String,

    /// Directory for per-record JSON files
    #[serde(rename = "file-dir")]
    pub file_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sinks: vec![SinkKind::Elastic, SinkKind::Kv, SinkKind::File],
            elastic_url: "http://localhost:9200".to_string(),
            elastic_index: "sumiharvest".to_string(),
            file_dir: "/tmp/items".to_string(),
        }
    }
}
