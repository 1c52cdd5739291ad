//! Output module for dispatching extracted records
//!
//! This module handles:
//! - The sink abstraction records are written through
//! - Search index, key-value and file sinks
//! - Fanning a job's record stream out to every configured sink

mod elastic_output;
mod fanout;
mod file_output;
mod kv_output;
mod traits;

pub use elastic_output::ElasticOutput;
pub use fanout::{ScrapAndStore, StoreSummary};
pub use file_output::FileOutput;
pub use kv_output::KvOutput;
pub use traits::{ItemSink, OutputError, OutputResult};

use crate::config::{OutputConfig, SinkKind};
use crate::store::ScrapData;
use reqwest::Client;
use std::sync::Arc;

/// Builds the sinks named by the configuration
///
/// Duplicate sink kinds are only built once.
///
/// # Arguments
///
/// * `config` - The output section of the configuration
/// * `data` - Store adapter used by the key-value sink
/// * `client` - HTTP client shared with the search index sink
pub fn build_sinks(config: &OutputConfig, data: &ScrapData, client: Client) -> Vec<Arc<dyn ItemSink>> {
    let mut kinds: Vec<SinkKind> = Vec::with_capacity(config.sinks.len());
    for kind in &config.sinks {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }

    kinds
        .into_iter()
        .map(|kind| -> Arc<dyn ItemSink> {
            match kind {
                SinkKind::Elastic => Arc::new(ElasticOutput::new(
                    client.clone(),
                    &config.elastic_url,
                    &config.elastic_index,
                )),
                SinkKind::Kv => Arc::new(KvOutput::new(data.clone())),
                SinkKind::File => Arc::new(FileOutput::new(&config.file_dir)),
            }
        })
        .collect()
}
