//! Package requests.
//!
//! A [`Spec`] names a package and optionally constrains its version and
//! variants: `name[@constraint][+variant|~variant]*`, e.g. `openmpi@:1.6`,
//! `libelf@0.8.13+debug`. A spec that pins one exact version is *concrete*;
//! a spec flagged virtual names a capability (like `mpi`) rather than a
//! recipe.
//!
//! Equality, hashing and ordering are all defined over one canonical tuple,
//! so a spec can be used directly as a cache key.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::types::{NameError, PackageName};
use crate::version::{Version, VersionConstraint};

const SIGILS: [char; 3] = ['@', '+', '~'];

/// Errors produced when parsing a spec string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// The input was empty or all whitespace.
    #[error("Empty spec")]
    Empty,

    /// The package name part failed validation.
    #[error(transparent)]
    Name(#[from] NameError),

    /// The text after `@` is not a valid version constraint.
    #[error("Invalid version constraint '{text}' in spec '{spec}'")]
    Version {
        /// The full spec string.
        spec: String,
        /// The offending constraint text.
        text: String,
    },

    /// More than one `@` constraint was given.
    #[error("Spec '{0}' has more than one version constraint")]
    DuplicateVersion(String),

    /// A `+` or `~` was not followed by a variant name.
    #[error("Invalid variant '{text}' in spec '{spec}'")]
    Variant {
        /// The full spec string.
        spec: String,
        /// The offending variant text.
        text: String,
    },
}

/// A package request: a name plus optional version and variant constraints.
#[derive(Debug, Clone)]
pub struct Spec {
    /// Package (or virtual capability) name.
    pub name: PackageName,
    /// Version constraint, `None` when any version is acceptable.
    pub versions: Option<VersionConstraint>,
    /// Variant settings, `true` for `+name` and `false` for `~name`.
    pub variants: BTreeMap<String, bool>,
    /// Whether this spec names a virtual capability rather than a recipe.
    pub is_virtual: bool,
}

type SpecKey<'a> = (
    &'a PackageName,
    &'a Option<VersionConstraint>,
    &'a BTreeMap<String, bool>,
    bool,
);

impl Spec {
    /// An unconstrained spec for `name`.
    pub fn named(name: PackageName) -> Self {
        Self {
            name,
            versions: None,
            variants: BTreeMap::new(),
            is_virtual: false,
        }
    }

    /// Parse a spec string.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] describing the first malformed part.
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SpecError::Empty);
        }

        let end = s.find(SIGILS).unwrap_or(s.len());
        let mut spec = Spec::named(PackageName::new(&s[..end])?);

        let mut rest = &s[end..];
        while let Some(sigil) = rest.chars().next() {
            let body = &rest[sigil.len_utf8()..];
            let len = body.find(SIGILS).unwrap_or(body.len());
            let token = &body[..len];

            if sigil == '@' {
                if spec.versions.is_some() {
                    return Err(SpecError::DuplicateVersion(s.to_string()));
                }
                let valid = token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
                spec.versions = valid
                    .then(|| VersionConstraint::parse(token))
                    .flatten()
                    .map(VersionConstraint::normalized);
                if spec.versions.is_none() {
                    return Err(SpecError::Version {
                        spec: s.to_string(),
                        text: token.to_string(),
                    });
                }
            } else {
                let valid = !token.is_empty()
                    && token
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(SpecError::Variant {
                        spec: s.to_string(),
                        text: token.to_string(),
                    });
                }
                spec.variants.insert(token.to_string(), sigil == '+');
            }

            rest = &body[len..];
        }

        Ok(spec)
    }

    /// Pin this spec to exactly `version`.
    pub fn with_version(mut self, version: Version) -> Self {
        self.versions = Some(VersionConstraint::Exact(version));
        self
    }

    /// Mark this spec as naming a virtual capability.
    pub fn into_virtual(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// The pinned version, if the spec is concrete.
    pub fn version(&self) -> Option<&Version> {
        self.versions.as_ref().and_then(VersionConstraint::concrete)
    }

    /// Whether the spec pins a single version of a real package.
    pub fn is_concrete(&self) -> bool {
        !self.is_virtual && self.version().is_some()
    }

    /// Bring the spec into canonical form in place.
    ///
    /// A leading `v` on a pinned version is dropped and a range whose ends
    /// coincide becomes an exact version.
    pub fn normalize(&mut self) {
        self.versions = self.versions.take().map(|vc| match vc {
            VersionConstraint::Exact(v) => {
                let trimmed = v
                    .strip_prefix('v')
                    .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()));
                VersionConstraint::Exact(trimmed.map_or(v.clone(), Version::new))
            }
            range => range.normalized(),
        });
    }

    /// Whether this spec is compatible with the constraint `other`.
    ///
    /// Names must match; version constraints must overlap (an absent
    /// constraint overlaps everything); and every variant `other` sets must
    /// either be unset here or set to the same value.
    pub fn satisfies(&self, other: &Spec) -> bool {
        if self.name != other.name {
            return false;
        }

        let versions_ok = match (&self.versions, &other.versions) {
            (Some(ours), Some(theirs)) => ours.overlaps(theirs),
            _ => true,
        };

        versions_ok
            && other
                .variants
                .iter()
                .all(|(k, v)| self.variants.get(k).is_none_or(|ours| ours == v))
    }

    /// A file-system friendly identifier: `name-version` plus variants.
    ///
    /// ```
    /// use sprig_schema::Spec;
    ///
    /// let spec: Spec = "libelf@0.8.13+debug".parse().unwrap();
    /// assert_eq!(spec.short_name(), "libelf-0.8.13+debug");
    /// ```
    pub fn short_name(&self) -> String {
        let mut out = self.name.to_string();
        if let Some(v) = &self.versions {
            out.push('-');
            out.push_str(&v.to_string().replace(':', "_"));
        }
        out.push_str(&self.variant_suffix());
        out
    }

    fn variant_suffix(&self) -> String {
        self.variants
            .iter()
            .map(|(k, on)| format!("{}{k}", if *on { '+' } else { '~' }))
            .collect()
    }

    fn key(&self) -> SpecKey<'_> {
        (&self.name, &self.versions, &self.variants, self.is_virtual)
    }
}

impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Spec {}

impl Hash for Spec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for Spec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Spec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Spec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(v) = &self.versions {
            write!(f, "@{v}")?;
        }
        f.write_str(&self.variant_suffix())
    }
}

impl std::str::FromStr for Spec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<PackageName> for Spec {
    fn from(name: PackageName) -> Self {
        Self::named(name)
    }
}

impl Serialize for Spec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Spec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
