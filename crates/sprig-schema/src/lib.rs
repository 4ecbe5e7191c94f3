//! Shared value types for sprig.
//!
//! Everything here is plain data: validated package names, versions and
//! version constraints, the `Spec` request type used as the registry's cache
//! key, and SHA-256 digests. Nothing in this crate touches the filesystem.

pub mod hash;
pub mod spec;
pub mod types;
pub mod version;

pub use hash::*;
pub use spec::{Spec, SpecError};
pub use types::*;
pub use version::{Version, VersionConstraint};
