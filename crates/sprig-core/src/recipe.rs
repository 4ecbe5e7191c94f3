//! Recipe loading.
//!
//! Each package has exactly one recipe, `<root>/<name>/package.toml`, holding
//! a single table named after the package's class name (`libdwarf` is
//! `[Libdwarf]`, `py-numpy` is `[PyNumpy]`). Recipes are user-supplied and
//! cannot be validated ahead of time, so every load failure is fatal.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use sprig_schema::{PackageName, Sha256Digest, Spec, Version, VersionConstraint};
use thiserror::Error;

/// File name of a recipe inside its package directory.
pub const RECIPE_FILE: &str = "package.toml";

/// Prefix of the synthetic module identity every recipe is loaded under.
pub const MODULE_PREFIX: &str = "sprig.packages";

#[derive(Error, Debug)]
pub enum RecipeLoadError {
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("Cannot read recipe {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error while loading {module} ({path}): {source}")]
    Parse {
        module: String,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{module} has no class '{class}'")]
    MissingClass { module: String, class: String },

    #[error("{module}.{class} is not a class")]
    NotAClass { module: String, class: String },

    #[error("Invalid definition of {module}.{class}: {source}")]
    InvalidDefinition {
        module: String,
        class: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Per-version source information.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionDef {
    /// Expected digest of the archive for this version.
    pub sha256: Option<Sha256Digest>,
    /// Archive URL overriding the recipe's URL template.
    pub url: Option<String>,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
}

/// A user-selectable build option.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantDef {
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub description: String,
}

/// A virtual capability this package provides, optionally only for some of
/// its versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidesDef {
    pub spec: Spec,
    pub when: Option<VersionConstraint>,
}

impl<'de> Deserialize<'de> for ProvidesDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Short(Spec),
            Full {
                spec: Spec,
                #[serde(default)]
                when: Option<String>,
            },
        }

        match Raw::deserialize(deserializer)? {
            Raw::Short(spec) => Ok(Self {
                spec: spec.into_virtual(),
                when: None,
            }),
            Raw::Full { spec, when } => {
                let when = when
                    .map(|w| {
                        VersionConstraint::parse(&w).ok_or_else(|| {
                            serde::de::Error::custom(format!("invalid version range '{w}'"))
                        })
                    })
                    .transpose()?;
                Ok(Self {
                    spec: spec.into_virtual(),
                    when,
                })
            }
        }
    }
}

fn default_parallel() -> bool {
    true
}

/// The body of a recipe's class table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDef {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    /// Archive URL template; `{{version}}` is replaced by the version.
    pub url: Option<String>,
    /// Repository for version-control checkouts.
    pub git: Option<String>,
    #[serde(default)]
    pub versions: BTreeMap<Version, VersionDef>,
    #[serde(default)]
    pub depends_on: Vec<Spec>,
    #[serde(default)]
    pub provides: Vec<ProvidesDef>,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantDef>,
    /// Whether the build may run in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

/// A loaded recipe: the class table of one `package.toml`.
#[derive(Debug, Clone)]
pub struct RecipeClass {
    pub name: PackageName,
    /// Synthetic module identity, `sprig.packages.<name>`.
    pub module: String,
    pub class_name: String,
    pub path: PathBuf,
    pub def: RecipeDef,
}

impl RecipeClass {
    /// Load the recipe for `name` from `path`.
    pub fn load(name: &PackageName, path: &Path) -> Result<Self, RecipeLoadError> {
        let module = format!("{MODULE_PREFIX}.{name}");
        let class_name = name.class_name();

        let meta = fs::metadata(path).map_err(|source| RecipeLoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_file() {
            return Err(RecipeLoadError::NotAFile(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| RecipeLoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(%module, path = %path.display(), "loading recipe");
        let mut doc: toml::Table = text.parse().map_err(|source| RecipeLoadError::Parse {
            module: module.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        let value = doc
            .remove(&class_name)
            .ok_or_else(|| RecipeLoadError::MissingClass {
                module: module.clone(),
                class: class_name.clone(),
            })?;
        if !value.is_table() {
            return Err(RecipeLoadError::NotAClass {
                module,
                class: class_name,
            });
        }

        let def = value
            .try_into()
            .map_err(|source| RecipeLoadError::InvalidDefinition {
                module: module.clone(),
                class: class_name.clone(),
                source,
            })?;

        Ok(Self {
            name: name.clone(),
            module,
            class_name,
            path: path.to_path_buf(),
            def,
        })
    }

    /// Declared versions, newest last.
    pub fn versions(&self) -> impl DoubleEndedIterator<Item = &Version> {
        self.def.versions.keys()
    }

    /// The newest declared version.
    pub fn latest_version(&self) -> Option<&Version> {
        self.def.versions.keys().next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBDWARF: &str = r#"
[Libdwarf]
homepage = "http://www.prevanders.net/dwarf.html"
url = "http://www.prevanders.net/libdwarf-{{version}}.tar.gz"
depends_on = ["libelf"]
provides = [{ spec = "dwarf@2", when = "20130729:" }, "debuginfo"]
parallel = false

[Libdwarf.versions."20130729"]
sha256 = "4cc5e48693f7b93b7aa0261e63c0e21d0f5e7a2fb5ea29b02dce7d5ef6f8be06"

[Libdwarf.versions."20130207"]
url = "http://mirror.example/libdwarf-20130207.tar.gz"
"#;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn test_load_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), RECIPE_FILE, LIBDWARF);
        let class = RecipeClass::load(&name("libdwarf"), &path).unwrap();

        assert_eq!(class.module, "sprig.packages.libdwarf");
        assert_eq!(class.class_name, "Libdwarf");
        assert!(!class.def.parallel);
        assert_eq!(class.def.depends_on[0].name, "libelf");
        assert_eq!(class.latest_version().map(Version::as_str), Some("20130729"));
        assert_eq!(class.versions().count(), 2);

        let dwarf = &class.def.provides[0];
        assert!(dwarf.spec.is_virtual);
        assert_eq!(dwarf.spec.name, "dwarf");
        assert_eq!(dwarf.when, VersionConstraint::parse("20130729:"));
        assert_eq!(class.def.provides[1].when, None);
    }

    #[test]
    fn test_missing_class() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), RECIPE_FILE, "[Other]\nurl = \"x\"\n");
        let err = RecipeClass::load(&name("py-numpy"), &path).unwrap_err();
        assert!(
            matches!(err, RecipeLoadError::MissingClass { ref class, .. } if class == "PyNumpy")
        );
    }

    #[test]
    fn test_class_must_be_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), RECIPE_FILE, "Zlib = 3\n");
        assert!(matches!(
            RecipeClass::load(&name("zlib"), &path),
            Err(RecipeLoadError::NotAClass { .. })
        ));
    }

    #[test]
    fn test_parse_and_schema_errors() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write(dir.path(), "broken.toml", "[Zlib\n");
        assert!(matches!(
            RecipeClass::load(&name("zlib"), &broken),
            Err(RecipeLoadError::Parse { .. })
        ));

        let unknown = write(dir.path(), "unknown.toml", "[Zlib]\nbogus = 1\n");
        assert!(matches!(
            RecipeClass::load(&name("zlib"), &unknown),
            Err(RecipeLoadError::InvalidDefinition { .. })
        ));

        let bad_when = write(
            dir.path(),
            "when.toml",
            "[Zlib]\nprovides = [{ spec = \"z\", when = \":\" }]\n",
        );
        assert!(matches!(
            RecipeClass::load(&name("zlib"), &bad_when),
            Err(RecipeLoadError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RecipeClass::load(&name("zlib"), dir.path()),
            Err(RecipeLoadError::NotAFile(_))
        ));
    }
}
