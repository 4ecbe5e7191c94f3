//! sprig - build recipes, staged sources
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Command line front end for the sprig core: browse the recipe
//! collection, resolve virtual packages, and drive package stages through
//! fetch, expand and clean.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.sprig/
//! ├── config.toml   # settings and mirrors
//! ├── packages/     # <name>/package.toml recipes
//! ├── stage/        # named stages
//! └── opt/          # installed packages
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sprig")]
#[command(author, version = env!("SPRIG_VERSION"), about = "sprig - build recipes, staged sources")]
pub struct Cli {
    /// Skip checksum verification of downloaded archives
    #[arg(long, global = true, env = "SPRIG_NO_CHECKSUM")]
    pub no_checksum: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available packages
    List,
    /// Show details of a package's recipe
    Info {
        /// Package name
        package: String,
    },
    /// List packages that provide a virtual package
    Providers {
        /// Virtual package spec (e.g. mpi or mpi@2)
        spec: String,
    },
    /// Print the dependency graph in dot format
    Graph {
        /// Graph label
        #[arg(long, default_value = "Dependencies")]
        title: String,
    },
    /// Download source archives
    Fetch {
        /// Package specs (e.g. libelf or libelf@0.8.13)
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Fetch and expand source archives
    Stage {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Discard build products and re-expand the fetched sources
    Restage {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Remove package stages
    Clean {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Remove every stage
    Purge,
    /// List installed packages
    Find {
        /// Only show installs matching this spec
        spec: Option<String>,
    },
    /// List configured mirrors
    Mirrors,
}
