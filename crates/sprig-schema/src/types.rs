//! Package names and archive formats.
//!
//! A [`PackageName`] is validated once on construction and also yields the
//! class-name mangling recipes are looked up by.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;

/// Errors produced when validating a [`PackageName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name was empty.
    #[error("Package name is empty")]
    Empty,

    /// The name contains a character that cannot appear in a recipe directory name.
    #[error("Invalid package name '{name}': unexpected character '{found}'")]
    InvalidChar {
        /// The rejected name.
        name: String,
        /// The first offending character.
        found: char,
    },
}

/// A validated package name.
///
/// Names map one-to-one onto recipe directories, so they are restricted to
/// ASCII letters, digits, `_` and `-`, and may not begin with `-`. Case is
/// preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Validate and wrap a package name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::Empty`] for an empty string and
    /// [`NameError::InvalidChar`] for anything outside `[A-Za-z0-9_-]` or a
    /// leading `-`.
    pub fn new(name: &str) -> Result<Self, NameError> {
        let mut chars = name.chars();
        let first = chars.next().ok_or(NameError::Empty)?;
        if !(first.is_ascii_alphanumeric() || first == '_') {
            return Err(NameError::InvalidChar {
                name: name.to_string(),
                found: first,
            });
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
            return Err(NameError::InvalidChar {
                name: name.to_string(),
                found: bad,
            });
        }
        Ok(Self(name.to_string()))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the definition table a recipe for this package must contain.
    ///
    /// The name is split on `-` and `_`, each piece is capitalized (first
    /// letter upper, rest lower) and the pieces are joined. Names that do not
    /// start with a letter get a leading `_`.
    ///
    /// ```
    /// use sprig_schema::PackageName;
    ///
    /// assert_eq!(PackageName::new("docbook-xml").unwrap().class_name(), "DocbookXml");
    /// assert_eq!(PackageName::new("3proxy").unwrap().class_name(), "_3proxy");
    /// ```
    pub fn class_name(&self) -> String {
        let mut class: String = self
            .0
            .split(['-', '_'])
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect();

        if !class.starts_with(|c: char| c.is_ascii_alphabetic()) {
            class.insert(0, '_');
        }
        class
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for PackageName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<std::ffi::OsStr> for PackageName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl AsRef<std::path::Path> for PackageName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Archive format of a downloaded source artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zstandard-compressed tar archive (`.tar.zst`).
    #[serde(rename = "tar.zst")]
    TarZst,
    /// Bzip2-compressed tar archive (`.tar.bz2`). Recognized for naming only.
    #[serde(rename = "tar.bz2")]
    TarBz2,
    /// Xz-compressed tar archive (`.tar.xz`). Recognized for naming only.
    #[serde(rename = "tar.xz")]
    TarXz,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL suffix.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::TarBz2 => "tar.bz2",
            Self::TarXz => "tar.xz",
            Self::Tar => "tar",
            Self::Zip => "zip",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["zlib", "docbook-xml", "py_yaml", "3proxy", "_private", "Qt"] {
            assert!(PackageName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(PackageName::new(""), Err(NameError::Empty));
        assert!(matches!(
            PackageName::new("-lead"),
            Err(NameError::InvalidChar { found: '-', .. })
        ));
        assert!(matches!(
            PackageName::new("../etc"),
            Err(NameError::InvalidChar { found: '.', .. })
        ));
        assert!(matches!(
            PackageName::new("a/b"),
            Err(NameError::InvalidChar { found: '/', .. })
        ));
    }

    #[test]
    fn test_class_name_mangling() {
        let cases = [
            ("zlib", "Zlib"),
            ("docbook-xml", "DocbookXml"),
            ("py_yaml", "PyYaml"),
            ("FooBar", "Foobar"),
            ("libdwarf", "Libdwarf"),
            ("3proxy", "_3proxy"),
            ("_private", "Private"),
        ];
        for (name, expected) in cases {
            assert_eq!(PackageName::new(name).unwrap().class_name(), expected);
        }
    }

    #[test]
    fn test_archive_format_detection() {
        assert_eq!(
            ArchiveFormat::from_path("https://x.org/zlib-1.2.8.tar.gz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::from_path("foo.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_path("foo.TAR.BZ2"), Some(ArchiveFormat::TarBz2));
        assert_eq!(ArchiveFormat::from_path("foo.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_path("foo"), None);
    }
}
