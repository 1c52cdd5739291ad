use crate::extract::Item;
use crate::output::traits::{ItemSink, OutputError, OutputResult};
use async_trait::async_trait;
use std::path::PathBuf;

/// [`ItemSink`] writing one `<id>.json` file per record
#[derive(Debug, Clone)]
pub struct FileOutput {
    dir: PathBuf,
}

impl FileOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file a record is written to
    ///
    /// Path separators in the id are replaced so every record stays inside
    /// the output directory.
    pub fn file_path(&self, item: &Item) -> PathBuf {
        let name = item.id.replace(['/', '\\'], "_");
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl ItemSink for FileOutput {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn store(&self, job_id: &str, item: &Item) -> OutputResult<()> {
        if item.id.is_empty() {
            return Err(OutputError::Rejected {
                sink: "file",
                reason: format!("record with empty id (link: {})", item.link),
            });
        }

        let document = serde_json::to_vec(item)?;
        let path = self.file_path(item);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, document).await?;

        tracing::debug!("Scrap [{}] wrote {}", job_id, path.display());
        Ok(())
    }
}
