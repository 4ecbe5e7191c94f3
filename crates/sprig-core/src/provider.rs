//! Virtual package providers.
//!
//! Recipes declare the virtual packages they provide (`mpich` provides
//! `mpi@:3` when at version `3:`). The index inverts those declarations so a
//! virtual request can be answered with every concrete provider.

use std::collections::{BTreeMap, BTreeSet};

use sprig_schema::Spec;

use crate::recipe::RecipeClass;

/// Maps virtual package names to the packages that provide them.
#[derive(Debug, Clone, Default)]
pub struct ProviderIndex {
    /// virtual name -> provided spec -> provider specs
    providers: BTreeMap<String, BTreeMap<Spec, BTreeSet<Spec>>>,
}

impl ProviderIndex {
    /// Index every `provides` declaration of `classes`.
    pub fn new<'a>(classes: impl IntoIterator<Item = &'a RecipeClass>) -> Self {
        let mut index = Self::default();
        for class in classes {
            for provided in &class.def.provides {
                let mut provider = Spec::named(class.name.clone());
                provider.versions = provided.when.clone();
                index
                    .providers
                    .entry(provided.spec.name.to_string())
                    .or_default()
                    .entry(provided.spec.clone())
                    .or_default()
                    .insert(provider);
            }
        }
        index
    }

    /// Every provider whose declaration is compatible with `vspec`.
    pub fn providers_for(&self, vspec: &Spec) -> BTreeSet<Spec> {
        self.providers
            .get(vspec.name.as_str())
            .into_iter()
            .flat_map(|by_spec| by_spec.iter())
            .filter(|(provided, _)| provided.satisfies(vspec))
            .flat_map(|(_, providers)| providers.iter().cloned())
            .collect()
    }

    /// Whether `name` is provided by any package.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Names of all virtual packages, sorted.
    pub fn virtual_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
