//! sprig core library.
//!
//! Two halves: the [`registry`] turns package requests into recipe-backed
//! [`Package`] instances (loading each recipe at most once and caching one
//! instance per distinct spec), and the [`stage`] module owns the on-disk
//! lifecycle of the source trees those packages build from.
//!
//! ```text
//! ~/.sprig/
//! ├── config.toml   # settings, stage options, mirrors
//! ├── packages/     # one <name>/package.toml recipe per package
//! ├── stage/        # named stages (often symlinks into a tmp root)
//! └── opt/          # install layout: <name>/<version>/
//! ```

pub mod config;
pub mod fetch;
pub mod io;
pub mod layout;
pub mod mirror;
pub mod package;
pub mod paths;
pub mod provider;
pub mod recipe;
pub mod registry;
pub mod stage;

pub use config::{ConfigSource, Settings, StageConfig};
pub use fetch::{FetchError, FetchStrategy};
pub use layout::{DirectoryLayout, InstallLayout};
pub use package::Package;
pub use paths::*;
pub use registry::{GetOptions, PackageRegistry, RegistryError};
pub use stage::{Stage, StageError};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("sprig-core/", env!("CARGO_PKG_VERSION"));
