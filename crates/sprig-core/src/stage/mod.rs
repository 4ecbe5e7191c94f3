//! Stages: the on-disk directories source code is fetched into and built in.
//!
//! A stage's lifecycle:
//!
//! ```text
//! Stage::new      creates (or reclaims) the stage directory
//! fetch()         downloads an archive or checks out a repository
//! check()         verifies the download
//! expand_archive  unpacks the archive into the stage
//! restage()       throws away build products and re-expands
//! destroy()       removes the stage
//! ```
//!
//! Named stages (`stage_root/<name>`) persist across runs so an interrupted
//! build does not refetch. Unnamed stages get a unique directory and are
//! meant for one run. With temp staging enabled, the stage's contents live
//! under the first writable temp root and `stage_root/<name>` is a symlink
//! to them.
//!
//! There is no lock: several processes may share a stage root, so setup
//! inspects what is on disk and only replaces what is wrong.

pub mod reconcile;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::StageConfig;
use crate::fetch::{self, FetchError, FetchStrategy, StageContext, UrlFetchStrategy};
use crate::filename_from_url;
use crate::io::download;
use crate::mirror::mirror_urls;
use reconcile::{Observed, Placement, Plan};

/// Prefix of every generated stage or temp directory name.
pub const STAGE_PREFIX: &str = "sprig-stage-";

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to set up stage at {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Insufficient permissions for {0}")]
    Access(PathBuf),

    #[error("Setup failed: no such directory: {0}")]
    Chdir(PathBuf),

    #[error("Attempt to chdir before expanding archive for {0}")]
    NoSource(String),

    #[error("Archive was empty for {0}")]
    EmptySource(String),

    #[error("Failed to restage {name}: {source}")]
    Restage {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("All fetch attempts for {name} failed:\n  {}", attempts.join("\n  "))]
    AllFetchesFailed { name: String, attempts: Vec<String> },

    #[error("Stage {0} has been destroyed")]
    Destroyed(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StageError {
    /// Whether the stage is unusable and the caller should abort.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Setup { .. }
                | Self::Access(_)
                | Self::Chdir(_)
                | Self::NoSource(_)
                | Self::EmptySource(_)
        )
    }
}

/// Progress of a stage through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Created,
    Fetched,
    Expanded,
    Destroyed,
}

/// What to fetch into a stage.
#[derive(Debug)]
pub enum FetchSource {
    Url(String),
    Strategy(Box<dyn FetchStrategy>),
}

impl From<&str> for FetchSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<Box<dyn FetchStrategy>> for FetchSource {
    fn from(strategy: Box<dyn FetchStrategy>) -> Self {
        Self::Strategy(strategy)
    }
}

/// Optional stage parameters.
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Persistent name; `None` creates a uniquely named one-shot stage.
    pub name: Option<String>,
    /// Path of the artifact relative to a mirror root.
    pub mirror_path: Option<String>,
}

impl StageOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            mirror_path: None,
        }
    }

    pub fn with_mirror_path(mut self, mirror_path: impl Into<String>) -> Self {
        self.mirror_path = Some(mirror_path.into());
        self
    }
}

/// A directory that source code is fetched into and built in.
#[derive(Debug)]
pub struct Stage {
    name: String,
    path: PathBuf,
    mirror_path: Option<String>,
    fetcher: Box<dyn FetchStrategy>,
    /// The mirror attempt that succeeded, if the primary was not used.
    mirror_winner: Option<Box<dyn FetchStrategy>>,
    tmp_root: Option<PathBuf>,
    config: Arc<StageConfig>,
    state: StageState,
}

impl Stage {
    /// Create a stage and set up its directory.
    pub fn new(
        source: impl Into<FetchSource>,
        options: StageOptions,
        config: Arc<StageConfig>,
    ) -> Result<Self, StageError> {
        let mut fetcher = match source.into() {
            FetchSource::Url(url) => fetch::from_url(&url),
            FetchSource::Strategy(strategy) => strategy,
        };

        let tmp_root = if config.use_tmp_stage {
            find_tmp_root(&config)
        } else {
            None
        };
        let (name, path) = setup(options.name, &config, tmp_root.as_deref())?;

        fetcher.set_stage(StageContext {
            path: path.clone(),
            mirror_path: options.mirror_path.clone(),
        });

        tracing::debug!(stage = %name, path = %path.display(), "stage ready");
        Ok(Self {
            name,
            path,
            mirror_path: options.mirror_path,
            fetcher,
            mirror_winner: None,
            tmp_root,
            config,
            state: StageState::Created,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stage directory under the stage root (possibly a symlink).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mirror_path(&self) -> Option<&str> {
        self.mirror_path.as_deref()
    }

    /// The temp root the stage's contents live under, if temp staging applied.
    pub fn tmp_root(&self) -> Option<&Path> {
        self.tmp_root.as_deref()
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn fetcher(&self) -> &dyn FetchStrategy {
        self.fetcher.as_ref()
    }

    fn context(&self) -> StageContext {
        StageContext {
            path: self.path.clone(),
            mirror_path: self.mirror_path.clone(),
        }
    }

    fn active(&self) -> &dyn FetchStrategy {
        self.mirror_winner.as_deref().unwrap_or(self.fetcher.as_ref())
    }

    fn active_mut(&mut self) -> &mut dyn FetchStrategy {
        match &mut self.mirror_winner {
            Some(winner) => winner.as_mut(),
            None => self.fetcher.as_mut(),
        }
    }

    fn ensure_live(&self) -> Result<(), StageError> {
        if self.state == StageState::Destroyed {
            return Err(StageError::Destroyed(self.name.clone()));
        }
        Ok(())
    }

    /// Where an archive may sit in the stage: the primary URL's file name,
    /// then the mirror path's.
    fn archive_candidates(&self) -> Vec<PathBuf> {
        let mut names = Vec::new();
        if let Some(url) = self.fetcher.archive_url() {
            names.push(filename_from_url(url));
        }
        if let Some(mirror) = &self.mirror_path {
            names.push(filename_from_url(mirror));
        }
        names
            .into_iter()
            .filter(|n| !n.is_empty())
            .map(|n| self.path.join(n))
            .collect()
    }

    /// The downloaded archive inside the stage.
    ///
    /// Only archive-based fetchers have one. The primary URL's file name is
    /// tried first, then the mirror path's; the first that exists wins.
    pub fn archive_file(&self) -> Option<PathBuf> {
        self.fetcher.archive_url()?;
        self.archive_candidates().into_iter().find(|p| p.exists())
    }

    /// Whether an archive already in the stage matches the expected digest.
    /// Archives without a known digest are trusted.
    async fn archive_matches(&self, archive: &Path) -> bool {
        let Some(expected) = self.fetcher.digest() else {
            return true;
        };
        download::sha256_file(archive)
            .await
            .is_ok_and(|actual| &actual == expected)
    }

    /// Remove any archive left in the stage by a rejected attempt.
    fn discard_archive(&self) {
        for path in self.archive_candidates() {
            if let Err(e) = ignore_missing(fs::remove_file(&path)) {
                tracing::warn!(path = %path.display(), error = %e, "could not remove archive");
            }
        }
    }

    /// The expanded or checked-out source tree, if there is one.
    pub fn source_path(&self) -> Option<PathBuf> {
        first_directory_entry(&self.path)
    }

    /// Change the process working directory to the stage directory.
    pub fn chdir(&self) -> Result<(), StageError> {
        if !self.path.is_dir() {
            return Err(StageError::Chdir(self.path.clone()));
        }
        std::env::set_current_dir(&self.path).map_err(|_| StageError::Chdir(self.path.clone()))
    }

    /// Fetch the source: each configured mirror first, then the primary.
    ///
    /// Attempts run strictly in order and the first success wins. Mirror
    /// attempts carry the primary's expected digest when the primary is an
    /// archive download, and an attempt with a digest only succeeds once its
    /// download verifies. A rejected download is removed before the next
    /// attempt. Failures are logged; if every attempt fails the collected
    /// reasons are returned.
    pub async fn fetch(&mut self) -> Result<(), StageError> {
        self.ensure_live()?;
        self.chdir()?;

        if let Some(archive) = self.archive_file() {
            if self.archive_matches(&archive).await {
                tracing::info!(stage = %self.name, archive = %archive.display(), "already fetched");
                self.state = StageState::Fetched;
                return Ok(());
            }
            tracing::warn!(stage = %self.name, archive = %archive.display(), "discarding archive with bad checksum");
            self.discard_archive();
        }

        let mut attempts = Vec::new();
        if let Some(mirror_path) = &self.mirror_path {
            let digest = self
                .fetcher
                .archive_url()
                .and(self.fetcher.digest())
                .cloned();
            for url in mirror_urls(&self.config.mirrors, mirror_path) {
                let mut mirror: Box<dyn FetchStrategy> =
                    Box::new(UrlFetchStrategy::new(&url, digest.clone()));
                mirror.set_stage(self.context());
                attempts.push(mirror);
            }
        }

        let mut failures = Vec::new();
        for mut attempt in attempts {
            match fetch_verified(attempt.as_mut()).await {
                Ok(()) => {
                    tracing::info!(stage = %self.name, source = %attempt.describe(), "fetched from mirror");
                    self.mirror_winner = Some(attempt);
                    self.state = StageState::Fetched;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(stage = %self.name, source = %attempt.describe(), error = %e, "fetch failed");
                    self.discard_archive();
                    failures.push(format!("{}: {e}", attempt.describe()));
                }
            }
        }

        match fetch_verified(self.fetcher.as_mut()).await {
            Ok(()) => {
                self.mirror_winner = None;
                self.state = StageState::Fetched;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(stage = %self.name, source = %self.fetcher.describe(), error = %e, "fetch failed");
                self.discard_archive();
                failures.push(format!("{}: {e}", self.fetcher.describe()));
                Err(StageError::AllFetchesFailed {
                    name: self.name.clone(),
                    attempts: failures,
                })
            }
        }
    }

    /// Verify the fetched source. A no-op for fetchers without a digest.
    pub async fn check(&self) -> Result<(), StageError> {
        self.ensure_live()?;
        Ok(self.active().check().await?)
    }

    /// Expand the fetched archive inside the stage.
    pub async fn expand_archive(&mut self) -> Result<(), StageError> {
        self.ensure_live()?;
        self.active().expand().await?;
        self.state = StageState::Expanded;
        Ok(())
    }

    /// Throw away the expanded tree and expand again from the fetched
    /// artifact. Nothing is downloaded.
    ///
    /// The stage returns to `Fetched`: its source is back in the state the
    /// fetched artifact produces, with no build products.
    pub async fn restage(&mut self) -> Result<(), StageError> {
        self.ensure_live()?;
        let name = self.name.clone();
        self.active_mut()
            .reset()
            .await
            .map_err(|source| StageError::Restage { name, source })?;
        self.state = StageState::Fetched;
        Ok(())
    }

    /// The source directory, checked to exist and be non-empty.
    pub fn source_dir(&self) -> Result<PathBuf, StageError> {
        let path = self
            .source_path()
            .ok_or_else(|| StageError::NoSource(self.name.clone()))?;
        let empty = fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);
        if empty {
            return Err(StageError::EmptySource(self.name.clone()));
        }
        Ok(path)
    }

    /// Change the process working directory into the source directory.
    pub fn chdir_to_source(&self) -> Result<PathBuf, StageError> {
        let path = self.source_dir()?;
        std::env::set_current_dir(&path).map_err(|_| StageError::Chdir(path.clone()))?;
        Ok(path)
    }

    /// Remove the stage. Safe to call more than once.
    ///
    /// If the process working directory was inside the removed tree it is
    /// moved to the stage root.
    pub fn destroy(&mut self) -> Result<(), StageError> {
        if self.state == StageState::Destroyed {
            return Ok(());
        }

        let resolved = fs::canonicalize(&self.path).ok();
        remove_linked_tree(&self.path)?;
        self.state = StageState::Destroyed;
        tracing::debug!(stage = %self.name, "destroyed");

        let displaced = match std::env::current_dir() {
            Err(_) => true,
            Ok(cwd) => {
                !cwd.exists()
                    || cwd.starts_with(&self.path)
                    || resolved.as_ref().is_some_and(|r| cwd.starts_with(r))
            }
        };
        if displaced {
            let fallback = self
                .path
                .parent()
                .unwrap_or(&self.config.stage_root)
                .to_path_buf();
            std::env::set_current_dir(&fallback).map_err(|_| StageError::Chdir(fallback))?;
        }
        Ok(())
    }
}

/// Fetch with `strategy`, then verify the result when a digest is known.
async fn fetch_verified(strategy: &mut dyn FetchStrategy) -> Result<(), FetchError> {
    strategy.fetch().await?;
    if strategy.digest().is_some() {
        strategy.check().await?;
    }
    Ok(())
}

/// First directory found in `path`, in listing order.
///
/// A stage holds at most the archive plus what it expands to, so the first
/// directory is taken to be the source tree.
pub fn first_directory_entry(path: &Path) -> Option<PathBuf> {
    fs::read_dir(path)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|p| p.is_dir())
}

/// Create the stage directory (or link) and return its name and path.
fn setup(
    name: Option<String>,
    config: &StageConfig,
    tmp_root: Option<&Path>,
) -> Result<(String, PathBuf), StageError> {
    let root = &config.stage_root;
    fs::create_dir_all(root).map_err(|source| StageError::Setup {
        path: root.clone(),
        source,
    })?;
    cleanup_dead_links(root);

    let placement = match tmp_root {
        Some(tmp) => Placement::LinkedToTemp {
            tmp_root: fs::canonicalize(tmp).map_err(|source| StageError::Setup {
                path: tmp.to_path_buf(),
                source,
            })?,
        },
        None => Placement::Direct,
    };

    let mut premade = None;
    let (name, path) = match (name, &placement) {
        (Some(name), _) => {
            let path = root.join(&name);
            (name, path)
        }
        (None, Placement::Direct) => {
            let path = make_temp_dir(root)?;
            let name = dir_name(&path);
            ensure_access(&path)?;
            return Ok((name, path));
        }
        (None, Placement::LinkedToTemp { tmp_root }) => {
            let target = make_temp_dir(tmp_root)?;
            let name = dir_name(&target);
            premade = Some(target);
            (name.clone(), root.join(name))
        }
    };

    let setup_err = |source| StageError::Setup {
        path: path.clone(),
        source,
    };
    let observed = reconcile::observe(&path).map_err(setup_err)?;
    let plan = reconcile::reconcile(&observed, &placement);
    tracing::trace!(path = %path.display(), ?observed, ?plan, "reconciled stage path");

    if plan.unlink && observed != Observed::Dir {
        fs::remove_file(&path).map_err(setup_err)?;
    }
    if plan.create {
        match &placement {
            Placement::Direct => fs::create_dir_all(&path).map_err(setup_err)?,
            Placement::LinkedToTemp { tmp_root } => {
                let target = match premade {
                    Some(target) => target,
                    None => make_temp_dir(tmp_root)?,
                };
                symlink_dir(&target, &path).map_err(setup_err)?;
            }
        }
    } else if plan == Plan::KEEP {
        tracing::debug!(path = %path.display(), "reusing existing stage");
    }

    ensure_access(&path)?;
    Ok((name, path))
}

fn make_temp_dir(parent: &Path) -> Result<PathBuf, StageError> {
    tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .tempdir_in(parent)
        .map(tempfile::TempDir::keep)
        .map_err(|source| StageError::Setup {
            path: parent.to_path_buf(),
            source,
        })
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Remove links directly under the stage root whose targets are gone.
fn cleanup_dead_links(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_link = entry.file_type().is_ok_and(|t| t.is_symlink());
        if is_link && !path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not remove dead stage link");
            }
        }
    }
}

/// The first usable temp root: created if needed and writable.
pub fn find_tmp_root(config: &StageConfig) -> Option<PathBuf> {
    if !config.use_tmp_stage {
        return None;
    }
    config.tmp_dirs.iter().find_map(|dir| {
        match fs::create_dir_all(dir).and_then(|()| tempfile::tempfile_in(dir)) {
            Ok(_) => Some(dir.clone()),
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "temp root unusable");
                None
            }
        }
    })
}

/// Check that `path` is a directory we can list and write into.
pub fn ensure_access(path: &Path) -> Result<(), StageError> {
    let readable = fs::read_dir(path).is_ok();
    let writable = tempfile::tempfile_in(path).is_ok();
    if readable && writable {
        Ok(())
    } else {
        Err(StageError::Access(path.to_path_buf()))
    }
}

/// Remove a directory tree. If `path` is a symlink, the tree it points to is
/// removed first, then the link.
pub fn remove_linked_tree(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.file_type().is_symlink() {
        if let Ok(target) = fs::canonicalize(path) {
            if target.is_dir() {
                ignore_missing(fs::remove_dir_all(&target))?;
            }
        }
        ignore_missing(fs::remove_file(path))
    } else if meta.is_dir() {
        ignore_missing(fs::remove_dir_all(path))
    } else {
        ignore_missing(fs::remove_file(path))
    }
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove every stage under the stage root, following links into temp roots.
pub fn purge(config: &StageConfig) -> io::Result<usize> {
    let entries = match fs::read_dir(&config.stage_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        remove_linked_tree(&entry?.path())?;
        removed += 1;
    }
    tracing::info!(root = %config.stage_root.display(), removed, "purged stages");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn direct(root: &Path) -> Arc<StageConfig> {
        Arc::new(StageConfig::new(root.join("stage")))
    }

    fn with_tmp(root: &Path) -> Arc<StageConfig> {
        let blocker = root.join("blocker");
        fs::write(&blocker, "x").unwrap();
        Arc::new(
            StageConfig::new(root.join("stage"))
                .with_tmp_dirs(vec![blocker.join("tmp"), root.join("tmp")]),
        )
    }

    #[test]
    fn test_named_direct_stage() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(
            "https://example.com/foo-1.0.tar.gz",
            StageOptions::named("foo-1.0"),
            direct(dir.path()),
        )
        .unwrap();

        assert_eq!(stage.name(), "foo-1.0");
        assert_eq!(stage.path(), dir.path().join("stage/foo-1.0"));
        assert!(stage.path().is_dir());
        assert!(!stage.path().is_symlink());
        assert_eq!(stage.state(), StageState::Created);
        assert_eq!(stage.tmp_root(), None);
    }

    #[test]
    fn test_unnamed_direct_stages_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let config = direct(dir.path());
        let a = Stage::new("https://e.x/a.tar.gz", StageOptions::default(), config.clone())
            .unwrap();
        let b = Stage::new("https://e.x/a.tar.gz", StageOptions::default(), config).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.name().starts_with(STAGE_PREFIX));
        assert!(a.path().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_tmp_stage_is_link_into_first_writable_root() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(
            "https://e.x/a.tar.gz",
            StageOptions::named("a-1.0"),
            with_tmp(dir.path()),
        )
        .unwrap();

        assert!(stage.path().is_symlink());
        assert_eq!(stage.tmp_root(), Some(dir.path().join("tmp").as_path()));
        let target = fs::canonicalize(stage.path()).unwrap();
        assert!(target.starts_with(fs::canonicalize(dir.path().join("tmp")).unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_unnamed_tmp_stage_links_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(
            "https://e.x/a.tar.gz",
            StageOptions::default(),
            with_tmp(dir.path()),
        )
        .unwrap();

        let target = fs::canonicalize(stage.path()).unwrap();
        assert_eq!(dir_name(&target), stage.name());
        assert!(stage.name().starts_with(STAGE_PREFIX));
    }

    #[test]
    fn test_falls_back_to_direct_without_writable_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let config = Arc::new(
            StageConfig::new(dir.path().join("stage")).with_tmp_dirs(vec![blocker.join("tmp")]),
        );

        assert_eq!(find_tmp_root(&config), None);
        let stage = Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), config).unwrap();
        assert!(stage.path().is_dir());
        assert!(!stage.path().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_dead_links_are_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("stage");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), root.join("stale")).unwrap();

        let _stage =
            Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), direct(dir.path()))
                .unwrap();
        assert!(fs::symlink_metadata(root.join("stale")).is_err());
    }

    #[test]
    fn test_archive_file_prefers_primary_name() {
        let dir = tempfile::tempdir().unwrap();
        let stage = Stage::new(
            "https://e.x/dl/v1.0.tar.gz",
            StageOptions::named("foo-1.0").with_mirror_path("foo/foo-1.0.tar.gz"),
            direct(dir.path()),
        )
        .unwrap();

        assert_eq!(stage.archive_file(), None);
        fs::write(stage.path().join("foo-1.0.tar.gz"), "m").unwrap();
        assert_eq!(
            stage.archive_file(),
            Some(stage.path().join("foo-1.0.tar.gz"))
        );
        fs::write(stage.path().join("v1.0.tar.gz"), "p").unwrap();
        assert_eq!(stage.archive_file(), Some(stage.path().join("v1.0.tar.gz")));
    }

    #[test]
    fn test_source_dir_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let stage =
            Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), direct(dir.path()))
                .unwrap();

        let err = stage.source_dir().unwrap_err();
        assert!(matches!(err, StageError::NoSource(_)));
        assert!(err.is_fatal());

        fs::create_dir(stage.path().join("a-1.0")).unwrap();
        let err = stage.source_dir().unwrap_err();
        assert!(matches!(err, StageError::EmptySource(_)));
        assert!(err.is_fatal());

        fs::write(stage.path().join("a-1.0/README"), "x").unwrap();
        assert_eq!(stage.source_dir().unwrap(), stage.path().join("a-1.0"));
    }

    #[tokio::test]
    async fn test_restage_without_archive_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage =
            Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), direct(dir.path()))
                .unwrap();
        let err = stage.restage().await.unwrap_err();
        assert!(matches!(err, StageError::Restage { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    #[serial]
    fn test_destroy_moves_out_of_removed_tree() {
        let original = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut stage =
            Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), direct(dir.path()))
                .unwrap();
        fs::create_dir(stage.path().join("src")).unwrap();
        std::env::set_current_dir(stage.path().join("src")).unwrap();

        stage.destroy().unwrap();
        assert!(!stage.path().exists());
        assert_eq!(
            fs::canonicalize(std::env::current_dir().unwrap()).unwrap(),
            fs::canonicalize(dir.path().join("stage")).unwrap()
        );

        stage.destroy().unwrap();
        assert_eq!(stage.state(), StageState::Destroyed);
        std::env::set_current_dir(original).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_follows_links() {
        let dir = tempfile::tempdir().unwrap();
        let config = with_tmp(dir.path());
        let a = Stage::new("https://e.x/a.tar.gz", StageOptions::named("a"), config.clone())
            .unwrap();
        let target = fs::canonicalize(a.path()).unwrap();
        let _b = Stage::new("https://e.x/b.tar.gz", StageOptions::named("b"), config.clone())
            .unwrap();

        assert_eq!(purge(&config).unwrap(), 2);
        assert!(!target.exists());
        assert_eq!(fs::read_dir(&config.stage_root).unwrap().count(), 0);
    }
}
