//! Command implementations and the state they share.

pub mod clean;
pub mod find;
pub mod graph;
pub mod info;
pub mod list;
pub mod mirrors;
pub mod providers;
pub mod stage;

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use sprig_core::package::PackageError;
use sprig_core::{Package, PackageRegistry, RegistryError, Settings, StageConfig, StageError};
use sprig_schema::Spec;

use crate::ui::Output;

/// Settings, registry and output handle for one invocation.
#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub registry: PackageRegistry,
    /// Verify archive checksums (config `checksum`, unless `--no-checksum`).
    pub checksum: bool,
    pub output: Output,
}

impl Context {
    pub fn load(checksum: bool) -> Result<Self> {
        let settings = Settings::load().context("Failed to load configuration")?;
        Ok(Self::new(settings, checksum))
    }

    pub fn new(settings: Settings, checksum: bool) -> Self {
        let registry = PackageRegistry::new(&settings.packages_root);
        Self {
            checksum: checksum && settings.checksum,
            registry,
            settings,
            output: Output::new(),
        }
    }

    pub fn stage_config(&self) -> Arc<StageConfig> {
        Arc::new(self.settings.stage.clone())
    }

    /// The package for `spec_str`, pinned to one version.
    ///
    /// A spec without an exact version gets the newest declared version that
    /// satisfies its constraint.
    pub fn concrete_package(&mut self, spec_str: &str) -> Result<Arc<Package>> {
        let mut spec: Spec = spec_str
            .parse()
            .with_context(|| format!("Invalid spec '{spec_str}'"))?;
        spec.normalize();

        if spec.version().is_none() {
            let class = self
                .registry
                .get_class_for_package_name(spec.name.as_str())?;
            let Some(version) = class
                .versions()
                .rev()
                .find(|v| spec.versions.as_ref().is_none_or(|c| c.includes(v)))
                .cloned()
            else {
                bail!("No known version of {} satisfies '{spec}'", spec.name);
            };
            spec = spec.with_version(version);
        }

        Ok(self.registry.get(&spec)?)
    }
}

/// Whether `err` means the run cannot safely continue with other packages.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<RegistryError>()
            .is_some_and(RegistryError::is_fatal)
            || cause
                .downcast_ref::<StageError>()
                .is_some_and(StageError::is_fatal)
            || cause
                .downcast_ref::<PackageError>()
                .is_some_and(|e| matches!(e, PackageError::Stage(s) if s.is_fatal()))
    })
}

/// Run `op` for every spec, reporting recoverable failures and carrying on.
///
/// Stops at the first fatal error. Fails at the end if any spec failed.
pub async fn for_each_spec<F>(ctx: &mut Context, specs: &[String], mut op: F) -> Result<()>
where
    F: AsyncFnMut(&mut Context, &str) -> Result<()>,
{
    let mut failed = 0;
    for spec in specs {
        if let Err(e) = op(ctx, spec).await {
            if is_fatal(&e) {
                return Err(e);
            }
            ctx.output.error(&format!("{spec}: {e:#}"));
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} package(s) failed", specs.len());
    }
    Ok(())
}
