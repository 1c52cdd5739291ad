use crate::extract::Item;
use crate::output::traits::{ItemSink, OutputError, OutputResult};
use crate::store::ScrapData;
use async_trait::async_trait;

/// [`ItemSink`] keeping records in the job blob of the key-value store
///
/// Records land in `scrapJobs:<jobId>` under their index hint and bump the
/// job's `items` counter, which is what job reports read back.
#[derive(Clone)]
pub struct KvOutput {
    data: ScrapData,
}

impl KvOutput {
    pub fn new(data: ScrapData) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ItemSink for KvOutput {
    fn name(&self) -> &'static str {
        "kv"
    }

    async fn store(&self, job_id: &str, item: &Item) -> OutputResult<()> {
        self.data
            .store_item(job_id, item)
            .await
            .map_err(|e| OutputError::Store(e.to_string()))
    }
}
