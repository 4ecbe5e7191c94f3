use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::{FetchError, FetchStrategy, StageContext};

/// Which revision to check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Tag(String),
    Branch(String),
    Commit(String),
}

/// Checks out a git repository into the stage.
///
/// The checkout lands in a subdirectory named after the repository so the
/// stage's source directory is found the same way as for an expanded
/// archive. There is nothing to verify or expand.
#[derive(Debug)]
pub struct GitFetchStrategy {
    url: String,
    reference: Option<GitRef>,
    stage: Option<StageContext>,
}

impl GitFetchStrategy {
    pub fn new(url: &str, reference: Option<GitRef>) -> Self {
        Self {
            url: url.to_string(),
            reference,
            stage: None,
        }
    }

    /// Directory name of the checkout inside the stage.
    pub fn checkout_name(&self) -> String {
        let base = crate::filename_from_url(&self.url);
        let base = base.strip_suffix(".git").unwrap_or(base);
        if base.is_empty() {
            "src".to_string()
        } else {
            base.to_string()
        }
    }

    /// Arguments for the initial `git clone`.
    ///
    /// Tags and branches use a shallow single-branch clone. A commit needs
    /// full history, so it is cloned in full and checked out afterwards.
    pub fn clone_args(&self) -> Vec<String> {
        let mut args = vec!["clone".to_string()];
        match &self.reference {
            Some(GitRef::Tag(r) | GitRef::Branch(r)) => {
                args.extend(["--depth", "1", "--branch"].map(String::from));
                args.push(r.clone());
            }
            Some(GitRef::Commit(_)) | None => {}
        }
        args.push(self.url.clone());
        args.push(self.checkout_name());
        args
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<(), FetchError> {
        run_git(dir, args.iter().map(|a| (*a).to_string()).collect()).await
    }
}

async fn run_git(dir: &Path, args: Vec<String>) -> Result<(), FetchError> {
    let command = format!("git {}", args.join(" "));
    tracing::debug!(%command, dir = %dir.display(), "running");
    let output = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| FetchError::Command {
            command: command.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(FetchError::Command {
            command,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl FetchStrategy for GitFetchStrategy {
    fn set_stage(&mut self, stage: StageContext) {
        self.stage = Some(stage);
    }

    async fn fetch(&mut self) -> Result<(), FetchError> {
        let stage = self
            .stage
            .as_ref()
            .ok_or_else(|| FetchError::NoStage(self.url.clone()))?;
        let checkout = stage.path.join(self.checkout_name());

        if checkout.join(".git").is_dir() {
            tracing::info!(repo = %self.url, "already cloned");
            return Ok(());
        }

        tracing::info!(repo = %self.url, reference = ?self.reference, "cloning");
        run_git(&stage.path, self.clone_args()).await?;

        if let Some(GitRef::Commit(commit)) = &self.reference {
            self.git(&checkout, &["checkout", "--quiet", commit]).await?;
        }
        Ok(())
    }

    async fn check(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn expand(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), FetchError> {
        let stage = self
            .stage
            .as_ref()
            .ok_or_else(|| FetchError::NoStage(self.url.clone()))?;
        let checkout = stage.path.join(self.checkout_name());
        if !checkout.join(".git").is_dir() {
            return Err(FetchError::NotFetched(self.url.clone()));
        }
        self.git(&checkout, &["checkout", "--", "."]).await?;
        self.git(&checkout, &["clean", "-f", "-d", "-x"]).await
    }

    fn describe(&self) -> String {
        match &self.reference {
            Some(GitRef::Tag(t)) => format!("git {} (tag {t})", self.url),
            Some(GitRef::Branch(b)) => format!("git {} (branch {b})", self.url),
            Some(GitRef::Commit(c)) => format!("git {} (commit {c})", self.url),
            None => format!("git {}", self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_args_for_tag() {
        let s = GitFetchStrategy::new(
            "https://github.com/example/libfoo.git",
            Some(GitRef::Tag("v1.0".into())),
        );
        assert_eq!(
            s.clone_args(),
            vec![
                "clone",
                "--depth",
                "1",
                "--branch",
                "v1.0",
                "https://github.com/example/libfoo.git",
                "libfoo"
            ]
        );
    }

    #[test]
    fn test_clone_args_for_commit_is_full_clone() {
        let s = GitFetchStrategy::new(
            "https://github.com/example/libfoo",
            Some(GitRef::Commit("abc123".into())),
        );
        assert_eq!(
            s.clone_args(),
            vec!["clone", "https://github.com/example/libfoo", "libfoo"]
        );
    }

    #[tokio::test]
    async fn test_check_and_expand_are_noops() {
        let s = GitFetchStrategy::new("https://example.com/repo.git", None);
        assert!(s.check().await.is_ok());
        assert!(s.expand().await.is_ok());
        assert_eq!(s.archive_url(), None);
        assert_eq!(s.describe(), "git https://example.com/repo.git");
    }

    #[tokio::test]
    async fn test_reset_without_checkout() {
        let stage = tempfile::tempdir().unwrap();
        let mut s = GitFetchStrategy::new("https://example.com/repo.git", None);
        s.set_stage(StageContext {
            path: stage.path().to_path_buf(),
            mirror_path: None,
        });
        assert!(matches!(s.reset().await, Err(FetchError::NotFetched(_))));
    }
}
