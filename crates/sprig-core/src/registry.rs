//! The package registry.
//!
//! Resolves package requests into [`Package`] instances backed by recipes
//! under a root directory (`<root>/<name>/package.toml`). Recipes are loaded
//! at most once per registry; instances are cached per distinct [`Spec`].
//! Virtual requests are answered through a [`ProviderIndex`] built on first
//! use.
//!
//! A registry is owned by one thread of control and memoizes through
//! `&mut self`; nothing here is invalidated by later filesystem changes.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sprig_schema::{NameError, PackageName, Spec};
use thiserror::Error;

use crate::layout::{InstallLayout, LayoutError};
use crate::package::{ConstructorError, Package};
use crate::provider::ProviderIndex;
use crate::recipe::{RECIPE_FILE, RecipeClass, RecipeLoadError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Package {0} not found.")]
    UnknownPackage(String),

    #[error("Class constructor failed for package '{name}': {source}")]
    FailedConstructor {
        name: String,
        #[source]
        source: ConstructorError,
    },

    #[error("Invalid package name: {0}")]
    InvalidName(#[from] NameError),

    #[error("No cached instance for {0}")]
    NotCached(String),

    #[error(transparent)]
    RecipeLoad(#[from] RecipeLoadError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether the error comes from a recipe that could not be loaded.
    ///
    /// A broken recipe cannot be partially trusted, so callers should stop
    /// rather than carry on with other packages.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RecipeLoad(_))
    }
}

/// Options for [`PackageRegistry::get_with_options`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Discard any cached instance and construct a fresh one.
    pub new: bool,
}

/// Recipe classes and package instances for one recipe root.
#[derive(Debug)]
pub struct PackageRegistry {
    root: PathBuf,
    instances: HashMap<Spec, Arc<Package>>,
    classes: HashMap<PackageName, Arc<RecipeClass>>,
    provider_index: Option<ProviderIndex>,
    names: Option<Vec<PackageName>>,
}

impl PackageRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            instances: HashMap::new(),
            classes: HashMap::new(),
            provider_index: None,
            names: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The package instance for `spec`, constructing it on first request.
    pub fn get(&mut self, spec: &Spec) -> Result<Arc<Package>, RegistryError> {
        self.get_with_options(spec, GetOptions::default())
    }

    pub fn get_with_options(
        &mut self,
        spec: &Spec,
        options: GetOptions,
    ) -> Result<Arc<Package>, RegistryError> {
        if spec.is_virtual {
            return Err(RegistryError::UnknownPackage(spec.to_string()));
        }

        if options.new {
            self.instances.remove(spec);
        }
        if let Some(pkg) = self.instances.get(spec) {
            return Ok(Arc::clone(pkg));
        }

        let class = self.get_class_for_package_name(spec.name.as_str())?;
        let pkg = Package::new(class, spec.clone()).map_err(|source| {
            RegistryError::FailedConstructor {
                name: spec.name.to_string(),
                source,
            }
        })?;

        let pkg = Arc::new(pkg);
        self.instances.insert(spec.clone(), Arc::clone(&pkg));
        tracing::debug!(%spec, "constructed package");
        Ok(pkg)
    }

    /// Drop the cached instance for `spec`.
    pub fn delete(&mut self, spec: &Spec) -> Result<Arc<Package>, RegistryError> {
        self.instances
            .remove(spec)
            .ok_or_else(|| RegistryError::NotCached(spec.to_string()))
    }

    /// Drop every cached instance. Loaded recipes stay cached.
    pub fn purge(&mut self) {
        self.instances.clear();
    }

    /// Installed specs satisfying `constraint`.
    pub fn get_installed(
        &self,
        layout: &dyn InstallLayout,
        constraint: &Spec,
    ) -> Result<Vec<Spec>, RegistryError> {
        Ok(layout
            .all_specs()?
            .into_iter()
            .map(|mut spec| {
                spec.normalize();
                spec
            })
            .filter(|spec| spec.satisfies(constraint))
            .collect())
    }

    /// Installed specs whose package has a recipe here.
    pub fn installed_known_package_specs(
        &self,
        layout: &dyn InstallLayout,
    ) -> Result<Vec<Spec>, RegistryError> {
        Ok(layout
            .all_specs()?
            .into_iter()
            .filter(|spec| self.exists(spec.name.as_str()))
            .collect())
    }

    fn provider_index(&mut self) -> Result<&ProviderIndex, RegistryError> {
        if self.provider_index.is_none() {
            let names = self.all_package_names()?.to_vec();
            let classes = names
                .iter()
                .map(|name| self.get_class_for_package_name(name.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            self.provider_index = Some(ProviderIndex::new(classes.iter().map(Arc::as_ref)));
        }
        Ok(&*self.provider_index.get_or_insert_default())
    }

    /// Every package providing the virtual package `vspec`.
    pub fn providers_for(&mut self, vspec: &Spec) -> Result<BTreeSet<Spec>, RegistryError> {
        let providers = self.provider_index()?.providers_for(vspec);
        if providers.is_empty() {
            return Err(RegistryError::UnknownPackage(vspec.to_string()));
        }
        Ok(providers)
    }

    /// Names of all packages with a recipe under the root, sorted.
    pub fn all_package_names(&mut self) -> Result<&[PackageName], RegistryError> {
        if self.names.is_none() {
            self.names = Some(scan_package_names(&self.root)?);
        }
        Ok(self.names.as_deref().unwrap_or_default())
    }

    /// One instance per known package, at its newest declared version.
    pub fn all_packages(&mut self) -> Result<Vec<Arc<Package>>, RegistryError> {
        let names = self.all_package_names()?.to_vec();
        names
            .into_iter()
            .map(|name| {
                let class = self.get_class_for_package_name(name.as_str())?;
                let mut spec = Spec::named(name);
                if let Some(version) = class.latest_version() {
                    spec = spec.with_version(version.clone());
                }
                self.get(&spec)
            })
            .collect()
    }

    /// Whether a recipe exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        PackageName::new(name).is_ok_and(|name| self.filename_for_package_name(&name).exists())
    }

    pub fn dirname_for_package_name(&self, name: &PackageName) -> PathBuf {
        self.root.join(name)
    }

    pub fn filename_for_package_name(&self, name: &PackageName) -> PathBuf {
        self.dirname_for_package_name(name).join(RECIPE_FILE)
    }

    /// The recipe class for `name`, loading it on first request.
    ///
    /// A missing recipe is an ordinary [`RegistryError::UnknownPackage`].
    /// A recipe that exists but cannot be loaded is a
    /// [`RegistryError::RecipeLoad`], which is fatal.
    pub fn get_class_for_package_name(
        &mut self,
        name: &str,
    ) -> Result<Arc<RecipeClass>, RegistryError> {
        let name = PackageName::new(name)?;
        if let Some(class) = self.classes.get(&name) {
            return Ok(Arc::clone(class));
        }

        let path = self.filename_for_package_name(&name);
        if !path.exists() {
            return Err(RegistryError::UnknownPackage(name.to_string()));
        }

        let class = Arc::new(RecipeClass::load(&name, &path)?);
        self.classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    /// Write the dependency graph of all packages in Graphviz dot format.
    ///
    /// Edges point from a dependency to its dependent, and from a provider
    /// to the virtual package it provides.
    pub fn graph_dependencies(
        &mut self,
        out: &mut dyn Write,
        title: &str,
    ) -> Result<(), RegistryError> {
        writeln!(out, "digraph G {{")?;
        writeln!(out, "  label = \"{title}\"")?;
        writeln!(out, "  labelloc = \"b\"")?;
        writeln!(out, "  rankdir = \"LR\"")?;
        writeln!(out, "  ranksep = \"5\"")?;
        writeln!(out)?;

        let mut edges = Vec::new();
        for pkg in self.all_packages()? {
            writeln!(out, "  \"{0}\" [label=\"{0}\"]", pkg.name())?;
            for dep in pkg.dependencies() {
                edges.push((dep.name.to_string(), pkg.name().to_string()));
            }
            let virtuals: BTreeSet<_> = pkg.provided().iter().map(|p| &p.spec.name).collect();
            for vname in virtuals {
                edges.push((pkg.name().to_string(), vname.to_string()));
            }
        }

        writeln!(out)?;
        for (from, to) in edges {
            writeln!(out, "  \"{from}\" -> \"{to}\"")?;
        }
        writeln!(out, "}}")?;
        Ok(())
    }
}

fn scan_package_names(root: &Path) -> Result<Vec<PackageName>, RegistryError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(root = %root.display(), "package root does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().join(RECIPE_FILE).is_file() {
            continue;
        }
        let file_name = entry.file_name();
        match PackageName::new(&file_name.to_string_lossy()) {
            Ok(name) => names.push(name),
            Err(e) => tracing::warn!(dir = %entry.path().display(), error = %e, "skipping"),
        }
    }
    names.sort();
    Ok(names)
}
