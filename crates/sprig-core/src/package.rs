//! Package instances.
//!
//! A [`Package`] binds a loaded [`RecipeClass`] to one [`Spec`]. It answers
//! questions about that spec (its version, where to download it, what it
//! depends on) and drives a [`Stage`] through fetch, expand and clean.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use sprig_schema::{ArchiveFormat, Spec, Version};
use thiserror::Error;

use crate::config::StageConfig;
use crate::fetch::{self, FetchStrategy};
use crate::recipe::{ProvidesDef, RecipeClass, VersionDef};
use crate::stage::{Stage, StageError, StageOptions};

/// Placeholder in recipe URLs replaced by the requested version.
pub const VERSION_PLACEHOLDER: &str = "{{version}}";

/// A recipe rejected the spec it was asked to build.
#[derive(Error, Debug)]
pub enum ConstructorError {
    #[error("Recipe {recipe} cannot build spec {spec}")]
    NameMismatch { recipe: String, spec: String },

    #[error("Package {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Package {name} has no variant '{variant}'")]
    UnknownVariant { name: String, variant: String },
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Can only do this for a concrete version of {0}")]
    NotConcrete(String),

    #[error(
        "Cannot fetch {name} safely; there is no checksum on file for version {version}. \
         Add a checksum to the package file, or disable checksumming."
    )]
    NoChecksum { name: String, version: Version },

    #[error("Package {0} has no version with a URL")]
    NoUrl(String),

    #[error(transparent)]
    Stage(#[from] StageError),
}

/// One recipe applied to one spec.
#[derive(Debug)]
pub struct Package {
    class: Arc<RecipeClass>,
    spec: Spec,
}

impl Package {
    /// Apply `class` to `spec`, rejecting specs the recipe cannot describe.
    pub fn new(class: Arc<RecipeClass>, spec: Spec) -> Result<Self, ConstructorError> {
        if spec.name != class.name {
            return Err(ConstructorError::NameMismatch {
                recipe: class.name.to_string(),
                spec: spec.to_string(),
            });
        }
        if class.def.depends_on.iter().any(|d| d.name == class.name) {
            return Err(ConstructorError::SelfDependency(class.name.to_string()));
        }
        if let Some(variant) = spec
            .variants
            .keys()
            .find(|v| !class.def.variants.contains_key(*v))
        {
            return Err(ConstructorError::UnknownVariant {
                name: class.name.to_string(),
                variant: variant.clone(),
            });
        }
        Ok(Self { class, spec })
    }

    pub fn name(&self) -> &str {
        self.class.name.as_str()
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn class(&self) -> &Arc<RecipeClass> {
        &self.class
    }

    pub fn homepage(&self) -> &str {
        &self.class.def.homepage
    }

    pub fn versions(&self) -> &BTreeMap<Version, VersionDef> {
        &self.class.def.versions
    }

    pub fn dependencies(&self) -> &[Spec] {
        &self.class.def.depends_on
    }

    pub fn provided(&self) -> &[ProvidesDef] {
        &self.class.def.provides
    }

    /// Whether this package provides the virtual package `vname`.
    pub fn provides(&self, vname: &str) -> bool {
        self.provided().iter().any(|p| p.spec.name == vname)
    }

    /// The single version this package's spec pins.
    pub fn version(&self) -> Result<&Version, PackageError> {
        self.spec
            .version()
            .ok_or_else(|| PackageError::NotConcrete(self.spec.to_string()))
    }

    fn version_urls(&self) -> impl Iterator<Item = (&Version, &str)> {
        self.versions()
            .iter()
            .filter_map(|(v, def)| def.url.as_deref().map(|url| (v, url)))
    }

    /// Whether any archive URL is known, either the recipe's or a version's.
    pub fn has_url(&self) -> bool {
        self.class.def.url.is_some() || self.version_urls().next().is_some()
    }

    /// The URL to download `version` from.
    ///
    /// A version with its own URL uses it as is. Otherwise the URL of the
    /// nearest lower version that has one (falling back to the recipe URL,
    /// then to a higher version's) is adapted to `version`: the
    /// `{{version}}` placeholder is filled in, or the borrowed version's
    /// number is swapped for the requested one.
    pub fn url_for_version(&self, version: &Version) -> Result<String, PackageError> {
        if !self.has_url() {
            return Err(PackageError::NoUrl(self.name().to_string()));
        }
        if let Some(url) = self.versions().get(version).and_then(|d| d.url.clone()) {
            return Ok(url);
        }

        let mut nearest: Option<(Option<&Version>, &str)> =
            self.class.def.url.as_deref().map(|url| (None, url));
        for (v, url) in self.version_urls() {
            if v > version && nearest.is_some() {
                break;
            }
            nearest = Some((Some(v), url));
        }

        let Some((from, url)) = nearest else {
            return Err(PackageError::NoUrl(self.name().to_string()));
        };
        if url.contains(VERSION_PLACEHOLDER) {
            return Ok(url.replace(VERSION_PLACEHOLDER, version.as_str()));
        }
        Ok(match from {
            Some(from) => url.replace(from.as_str(), version.as_str()),
            None => url.to_string(),
        })
    }

    /// Where this package's archive lives under a mirror root:
    /// `<name>/<name>-<version>.<ext>`.
    pub fn mirror_path(&self) -> Result<String, PackageError> {
        let version = self.version()?;
        let ext = self
            .url_for_version(version)
            .ok()
            .and_then(|url| ArchiveFormat::from_path(&url))
            .map_or("tar.gz", ArchiveFormat::extension);
        Ok(format!("{0}/{0}-{version}.{ext}", self.name()))
    }

    /// The fetch strategy for this package's version.
    pub fn fetcher(&self) -> Result<Box<dyn FetchStrategy>, PackageError> {
        fetch::for_package_version(self, self.version()?)
    }

    /// The named stage this package builds in.
    ///
    /// Stage paths derive from the spec, so every call returns a handle on
    /// the same directory.
    pub fn stage(&self, config: Arc<StageConfig>) -> Result<Stage, PackageError> {
        let options =
            StageOptions::named(self.spec.short_name()).with_mirror_path(self.mirror_path()?);
        Ok(Stage::new(self.fetcher()?, options, config)?)
    }

    /// Fetch the source into `stage`, verifying it when `checksum` is set.
    ///
    /// With checksumming on, an archive download for a version without a
    /// digest on file is refused before anything is downloaded.
    pub async fn do_fetch(&self, stage: &mut Stage, checksum: bool) -> Result<(), PackageError> {
        let version = self.version()?;
        let fetcher = stage.fetcher();
        if checksum && fetcher.archive_url().is_some() && fetcher.digest().is_none() {
            return Err(PackageError::NoChecksum {
                name: self.name().to_string(),
                version: version.clone(),
            });
        }

        stage.fetch().await?;
        if checksum {
            stage.check().await?;
        }
        Ok(())
    }

    /// Fetch, expand unless already expanded, and enter the source directory.
    pub async fn do_stage(&self, stage: &mut Stage, checksum: bool) -> Result<PathBuf, PackageError> {
        self.do_fetch(stage, checksum).await?;

        if stage.source_path().is_none() {
            stage.expand_archive().await?;
            tracing::info!(package = %self.name(), path = %stage.path().display(), "created stage");
        } else {
            tracing::info!(package = %self.name(), path = %stage.path().display(), "already staged");
        }
        Ok(stage.chdir_to_source()?)
    }

    /// Discard build products by re-expanding the fetched source.
    pub async fn do_clean_work(&self, stage: &mut Stage) -> Result<(), PackageError> {
        Ok(stage.restage().await?)
    }

    /// Remove the stage entirely.
    pub fn do_clean_dist(&self, stage: &mut Stage) -> Result<(), PackageError> {
        if std::fs::symlink_metadata(stage.path()).is_ok() {
            stage.destroy()?;
        }
        Ok(())
    }
}
