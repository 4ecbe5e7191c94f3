use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use sprig_schema::Sha256Digest;

use super::{FetchError, FetchStrategy, StageContext};
use crate::filename_from_url;
use crate::io::{download, extract};

/// Downloads an archive, verifies its SHA256 and expands it in the stage.
#[derive(Debug)]
pub struct UrlFetchStrategy {
    url: String,
    digest: Option<Sha256Digest>,
    client: Client,
    stage: Option<StageContext>,
}

impl UrlFetchStrategy {
    pub fn new(url: &str, digest: Option<Sha256Digest>) -> Self {
        Self {
            url: url.to_string(),
            digest,
            client: Client::new(),
            stage: None,
        }
    }

    /// Share an existing HTTP client instead of creating one.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn stage(&self) -> Result<&StageContext, FetchError> {
        self.stage
            .as_ref()
            .ok_or_else(|| FetchError::NoStage(self.url.clone()))
    }

    /// Where the archive may live in the stage: under this URL's file name,
    /// then under the mirror path's file name.
    fn archive_candidates(&self) -> Result<Vec<PathBuf>, FetchError> {
        let stage = self.stage()?;
        let mut names = vec![filename_from_url(&self.url)];
        if let Some(mirror) = &stage.mirror_path {
            names.push(filename_from_url(mirror));
        }
        Ok(names
            .into_iter()
            .filter(|n| !n.is_empty())
            .map(|n| stage.path.join(n))
            .collect())
    }

    /// The fetched archive, if one is present in the stage.
    pub fn archive_file(&self) -> Option<PathBuf> {
        self.archive_candidates()
            .ok()?
            .into_iter()
            .find(|p| p.is_file())
    }

    fn require_archive(&self) -> Result<PathBuf, FetchError> {
        self.archive_file()
            .ok_or_else(|| FetchError::NotFetched(self.url.clone()))
    }
}

#[async_trait]
impl FetchStrategy for UrlFetchStrategy {
    fn set_stage(&mut self, stage: StageContext) {
        self.stage = Some(stage);
    }

    async fn fetch(&mut self) -> Result<(), FetchError> {
        if let Some(existing) = self.archive_file() {
            tracing::info!(archive = %existing.display(), "already fetched");
            return Ok(());
        }

        let dest = self
            .archive_candidates()?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NotFetched(self.url.clone()))?;

        tracing::info!(url = %self.url, "fetching");
        let actual = download::fetch_to(&self.client, &self.url, &dest).await?;
        tracing::debug!(url = %self.url, sha256 = %actual, "fetched");
        Ok(())
    }

    async fn check(&self) -> Result<(), FetchError> {
        let expected = self
            .digest
            .as_ref()
            .ok_or_else(|| FetchError::NoDigest(self.url.clone()))?;
        let file = self.require_archive()?;
        let actual = download::sha256_file(&file).await?;
        if &actual != expected {
            return Err(FetchError::ChecksumMismatch {
                file,
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    async fn expand(&self) -> Result<(), FetchError> {
        let archive = self.require_archive()?;
        let dest = self.stage()?.path.clone();
        tracing::info!(archive = %archive.display(), "expanding");
        tokio::task::spawn_blocking(move || extract::extract_auto(&archive, &dest)).await??;
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), FetchError> {
        let archive = self.require_archive()?;
        let stage = self.stage()?.path.clone();

        let mut entries = tokio::fs::read_dir(&stage).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == archive {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }

        self.expand().await
    }

    fn archive_url(&self) -> Option<&str> {
        Some(&self.url)
    }

    fn digest(&self) -> Option<&Sha256Digest> {
        self.digest.as_ref()
    }

    fn describe(&self) -> String {
        format!("URL {}", self.url)
    }
}

impl std::fmt::Display for UrlFetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
