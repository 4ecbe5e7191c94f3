//! Versions and version constraints.
//!
//! Versions are compared segment by segment. Segments are separated by `.`,
//! `-` or `_`; numeric segments compare numerically, everything else
//! lexically, and a numeric segment sorts after an alphabetic one. A version
//! *contains* every version it is a segment prefix of, so `1.2` contains
//! `1.2.8`.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Num(u64),
    Alpha(&'a str),
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            (Segment::Num(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Num(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A package version string such as `1.2.8` or `20130729`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Create a version from a string, stored as given.
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.0
            .split(['.', '-', '_'])
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().map_or(Segment::Alpha(s), Segment::Num))
    }

    /// Whether `other` equals this version or extends it with more segments.
    pub fn contains(&self, other: &Version) -> bool {
        let mut theirs = other.segments();
        self.segments().all(|ours| theirs.next().is_some_and(|t| t == ours))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments()
            .cmp(other.segments())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(serde::de::Error::custom("version string is empty"));
        }
        Ok(Self(s))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A constraint on the version of a package.
///
/// Written as `1.2` (exact, prefix-inclusive), `1.2:` (at least), `:1.4`
/// (at most) or `1.2:1.4` (inclusive range). Bounds are prefix-inclusive, so
/// `:1.4` admits `1.4.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionConstraint {
    /// A single version and everything it contains.
    Exact(Version),
    /// An inclusive range with optional ends.
    Range {
        /// Lower bound, if any.
        lo: Option<Version>,
        /// Upper bound, if any.
        hi: Option<Version>,
    },
}

impl VersionConstraint {
    /// Parse a constraint from its textual form.
    ///
    /// Returns `None` when the text is empty, contains more than one `:`, or
    /// is a bare `:`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let Some((lo, hi)) = s.split_once(':') else {
            return Some(Self::Exact(Version::new(s)));
        };
        if hi.contains(':') || (lo.is_empty() && hi.is_empty()) {
            return None;
        }
        let bound = |b: &str| (!b.is_empty()).then(|| Version::new(b));
        Some(Self::Range {
            lo: bound(lo),
            hi: bound(hi),
        })
    }

    /// The single version this constraint pins, if it pins exactly one.
    pub fn concrete(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Range { .. } => None,
        }
    }

    fn bounds(&self) -> (Option<&Version>, Option<&Version>) {
        match self {
            Self::Exact(v) => (Some(v), Some(v)),
            Self::Range { lo, hi } => (lo.as_ref(), hi.as_ref()),
        }
    }

    /// Whether `version` falls inside this constraint.
    pub fn includes(&self, version: &Version) -> bool {
        let (lo, hi) = self.bounds();
        lo.is_none_or(|lo| at_most(lo, version)) && hi.is_none_or(|hi| at_most(version, hi))
    }

    /// Whether some version could satisfy both constraints.
    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        let (a_lo, a_hi) = self.bounds();
        let (b_lo, b_hi) = other.bounds();
        let fits = |lo: Option<&Version>, hi: Option<&Version>| match (lo, hi) {
            (Some(lo), Some(hi)) => at_most(lo, hi),
            _ => true,
        };
        fits(a_lo, b_hi) && fits(b_lo, a_hi)
    }

    /// Canonical form: a range whose ends coincide collapses to an exact version.
    pub fn normalized(self) -> Self {
        match self {
            Self::Range {
                lo: Some(lo),
                hi: Some(hi),
            } if lo == hi => Self::Exact(lo),
            other => other,
        }
    }
}

/// `a <= b`, where an upper bound also admits everything it contains.
fn at_most(a: &Version, b: &Version) -> bool {
    a <= b || b.contains(a)
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Range { lo, hi } => {
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                f.write_str(":")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                Ok(())
            }
        }
    }
}
