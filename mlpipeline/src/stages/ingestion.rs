//! Fetching the raw dataset.

use super::{Stage, StageContext};
use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::entity::DataIngestionConfig;
use crate::errors::{SourceUnavailableError, StageError};
use crate::utils::{create_directories, ensure_parent};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use tracing::{info, instrument};

/// Copies or downloads the source data to `local_data_file`.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    fn is_remote(&self) -> bool {
        let url = self.config.source_url.as_str();
        url.starts_with("http://") || url.starts_with("https://")
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceUnavailableError> {
        let url = self.config.source_url.as_str();
        if self.is_remote() {
            return self.download(url).await;
        }

        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        tokio::fs::read(path)
            .await
            .map_err(|e| SourceUnavailableError::new(url, e.to_string()))
    }

    #[cfg(feature = "http")]
    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceUnavailableError> {
        let unavailable = |e: reqwest::Error| SourceUnavailableError::new(url, e.to_string());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .build()
            .map_err(unavailable)?;
        let response = client.get(url).send().await.map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(SourceUnavailableError::new(
                url,
                format!("server returned {}", response.status()),
            ));
        }
        let bytes = response.bytes().await.map_err(unavailable)?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "http"))]
    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceUnavailableError> {
        Err(SourceUnavailableError::new(
            url,
            "http sources require the `http` feature",
        ))
    }
}

#[async_trait]
impl Stage for DataIngestion {
    fn kind(&self) -> StageKind {
        StageKind::DataIngestion
    }

    #[instrument(skip_all, fields(source = %self.config.source_url))]
    async fn run(&self, _ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        let target = &self.config.local_data_file;
        create_directories(&[&self.config.root_dir]).await?;

        let cached = self.is_remote()
            && !self.config.force_download
            && tokio::fs::try_exists(target).await.unwrap_or(false);

        let bytes = if cached {
            info!(path = %target.display(), "file already exists, skipping download");
            tokio::fs::metadata(target)
                .await
                .map_err(|e| StageError::io(target, e))?
                .len()
        } else {
            let data = self.fetch().await?;
            if data.is_empty() {
                return Err(SourceUnavailableError::new(&self.config.source_url, "source is empty").into());
            }
            ensure_parent(target).await?;
            tokio::fs::write(target, &data)
                .await
                .map_err(|e| StageError::io(target, e))?;
            info!(path = %target.display(), bytes = data.len(), "data ingested");
            data.len() as u64
        };

        Ok(Artifact::new(ArtifactKind::RawData, StageKind::DataIngestion)
            .with_file("data", target)
            .with_payload(json!({
                "source": self.config.source_url,
                "bytes": bytes,
                "cached": cached,
            })))
    }
}
