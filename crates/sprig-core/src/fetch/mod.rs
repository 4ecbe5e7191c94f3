//! Fetch strategies.
//!
//! A strategy knows how to bring one package version's source into a stage
//! directory: download an archive and verify it, or check out a revision
//! from version control. The stage drives strategies only through the
//! [`FetchStrategy`] trait.

pub mod git;
pub mod url;

use std::path::PathBuf;

use async_trait::async_trait;
use sprig_schema::{Sha256Digest, Version};
use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::package::{Package, PackageError};

pub use git::{GitFetchStrategy, GitRef};
pub use url::UrlFetchStrategy;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}: checksum failed (expected {expected}, got {actual})")]
    ChecksumMismatch {
        file: PathBuf,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("Attempt to check {0} with no digest")]
    NoDigest(String),

    #[error("Nothing has been fetched from {0}")]
    NotFetched(String),

    #[error("Fetch strategy for {0} has no stage")]
    NoStage(String),

    #[error("Command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What a strategy needs to know about the stage it fetches into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    /// The stage directory (possibly a symlink into a temp root).
    pub path: PathBuf,
    /// Relative mirror path of the artifact, when the package has one.
    pub mirror_path: Option<String>,
}

/// The contract between a stage and the thing that fills it.
#[async_trait]
pub trait FetchStrategy: Send + Sync + std::fmt::Debug {
    /// Attach the strategy to a stage directory.
    fn set_stage(&mut self, stage: StageContext);

    /// Bring the artifact into the stage.
    async fn fetch(&mut self) -> Result<(), FetchError>;

    /// Verify what was fetched. Strategies without checksums succeed.
    async fn check(&self) -> Result<(), FetchError>;

    /// Turn the fetched artifact into a source tree inside the stage.
    async fn expand(&self) -> Result<(), FetchError>;

    /// Return the source tree to its just-fetched state.
    async fn reset(&mut self) -> Result<(), FetchError>;

    /// URL of the archive, for strategies that download one.
    fn archive_url(&self) -> Option<&str> {
        None
    }

    /// Expected digest of the archive, if known.
    fn digest(&self) -> Option<&Sha256Digest> {
        None
    }

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// A strategy that simply downloads `url`.
pub fn from_url(url: &str) -> Box<dyn FetchStrategy> {
    Box::new(UrlFetchStrategy::new(url, None))
}

/// The strategy a package version's recipe asks for.
///
/// A version naming a `tag`, `branch` or `commit` is checked out from the
/// recipe's `git` repository, as is any version of a recipe that has a
/// repository but no archive URL. Everything else downloads
/// [`Package::url_for_version`] and checks it against the version's
/// `sha256`.
pub fn for_package_version(
    pkg: &Package,
    version: &Version,
) -> Result<Box<dyn FetchStrategy>, PackageError> {
    let def = pkg.versions().get(version);
    let recipe = &pkg.class().def;

    if let Some(git) = &recipe.git {
        let reference = def.and_then(|d| {
            d.tag
                .clone()
                .map(GitRef::Tag)
                .or_else(|| d.branch.clone().map(GitRef::Branch))
                .or_else(|| d.commit.clone().map(GitRef::Commit))
        });
        if reference.is_some() || !pkg.has_url() {
            return Ok(Box::new(GitFetchStrategy::new(git, reference)));
        }
    }

    let url = pkg.url_for_version(version)?;
    let digest = def.and_then(|d| d.sha256.clone());
    Ok(Box::new(UrlFetchStrategy::new(&url, digest)))
}
