//! Search index sink
//!
//! Every record is indexed with `PUT {base}/{index}/{host}/{id}`, so the
//! document type is the source site and re-crawls overwrite earlier copies.
//! Records are read back with a document get, a multi-get (`_mget`) or a raw
//! `_search` query against the same `{index}/{host}` type.

use crate::extract::Item;
use crate::output::traits::{ItemSink, OutputError, OutputResult};
use crate::url::extract_host;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Document envelope returned by the search index
///
/// Index acknowledgements, document gets and `_mget` entries all share it.
#[derive(Debug, Default, Deserialize)]
struct ElasticDocument {
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_type", default)]
    doc_type: String,
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_version", default)]
    version: i64,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Item>,
}

impl ElasticDocument {
    /// The stored record, with id and version taken from the index
    fn into_item(self) -> Option<Item> {
        if !self.found {
            return None;
        }

        let mut item = self.source.unwrap_or_default();
        item.id = self.id;
        item.version = self.version;
        Some(item)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MultiGetResponse {
    #[serde(default)]
    docs: Vec<ElasticDocument>,
}

/// [`ItemSink`] writing records to an Elasticsearch-compatible index
#[derive(Debug, Clone)]
pub struct ElasticOutput {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticOutput {
    pub fn new(client: Client, base_url: &str, index: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        }
    }

    /// Builds the document endpoint for a record
    ///
    /// Index, host and id must all be non-empty.
    pub fn endpoint(&self, item: &Item) -> OutputResult<String> {
        self.document_endpoint(&extract_host(&item.scrap_url), &item.id)
    }

    /// Builds `{base}/{index}/{doc_type}/{id}`, refusing empty parts
    fn document_endpoint(&self, doc_type: &str, id: &str) -> OutputResult<String> {
        if self.index.is_empty() || doc_type.is_empty() || id.is_empty() {
            return Err(OutputError::Rejected {
                sink: "elastic",
                reason: format!(
                    "index, type or id is empty (index='{}', type='{}', id='{}')",
                    self.index, doc_type, id
                ),
            });
        }

        Ok(format!("{}/{}/{}/{}", self.base_url, self.index, doc_type, id))
    }

    /// Reads one record back from the index
    ///
    /// # Arguments
    ///
    /// * `host` - The source site, used as document type
    /// * `id` - The record id
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - The record, with `version` set from the index
    /// * `Err(OutputError::NotFound)` - No such document
    pub async fn get(&self, host: &str, id: &str) -> OutputResult<Item> {
        let endpoint = self.document_endpoint(host, id)?;
        let document: ElasticDocument = self
            .read_json(self.client.get(&endpoint), &endpoint)
            .await?;

        document
            .into_item()
            .ok_or(OutputError::NotFound { endpoint })
    }

    /// Reads several records of one site in a single request
    ///
    /// The result is positional: entry `i` belongs to `ids[i]` and is `None`
    /// when that document does not exist.
    pub async fn multi_get(&self, host: &str, ids: &[String]) -> OutputResult<Vec<Option<Item>>> {
        let endpoint = self.document_endpoint(host, "_mget")?;
        let request = self.client.get(&endpoint).json(&json!({ "ids": ids }));

        let response: MultiGetResponse = self.read_json(request, &endpoint).await?;
        Ok(response
            .docs
            .into_iter()
            .map(ElasticDocument::into_item)
            .collect())
    }

    /// Runs a raw query against the records of one site
    ///
    /// Query and response are passed through untouched.
    pub async fn search(&self, host: &str, query: &Value) -> OutputResult<Value> {
        let endpoint = self.document_endpoint(host, "_search")?;
        let request = self.client.get(&endpoint).json(query);
        self.read_json(request, &endpoint).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> OutputResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| OutputError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OutputError::NotFound {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            return Err(OutputError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| OutputError::Http(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ItemSink for ElasticOutput {
    fn name(&self) -> &'static str {
        "elastic"
    }

    async fn store(&self, job_id: &str, item: &Item) -> OutputResult<()> {
        let endpoint = self.endpoint(item)?;

        let response = self
            .client
            .put(&endpoint)
            .json(item)
            .send()
            .await
            .map_err(|e| OutputError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OutputError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let ack: ElasticDocument = response.json().await.unwrap_or_default();
        tracing::info!(
            "Scrap [{}] indexed {} (index: {}, type: {}, id: {}, version: {})",
            job_id,
            endpoint,
            ack.index,
            ack.doc_type,
            ack.id,
            ack.version
        );
        Ok(())
    }
}
