//! Deciding what to do with whatever already sits at a stage path.
//!
//! Another process, or an earlier interrupted run, may have left anything at
//! the path: nothing, a file, a dangling link, a link into a temp root that
//! is no longer in use, or a perfectly good directory. [`observe`] classifies
//! it and [`reconcile`] turns the classification and the desired placement
//! into a [`Plan`]. Only `observe` touches the filesystem.

use std::io;
use std::path::{Path, PathBuf};

/// What exists at the stage path right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Missing,
    /// A file, a link to a file, or anything else that is not a directory.
    NotDir,
    /// A real directory.
    Dir,
    /// A symlink. `target` is the canonical directory it resolves to, or
    /// `None` when the link dangles.
    Link { target: Option<PathBuf> },
}

/// Where the stage's contents should live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A real directory at the stage path.
    Direct,
    /// A directory under `tmp_root` (canonical), linked from the stage path.
    LinkedToTemp { tmp_root: PathBuf },
}

/// Steps needed to bring the stage path in line with its placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Remove the existing entry (a file or link, never a real directory).
    pub unlink: bool,
    /// Create the directory, or the temp directory and the link to it.
    pub create: bool,
}

impl Plan {
    pub const KEEP: Plan = Plan {
        unlink: false,
        create: false,
    };
    pub const CREATE: Plan = Plan {
        unlink: false,
        create: true,
    };
    pub const REPLACE: Plan = Plan {
        unlink: true,
        create: true,
    };
}

/// Classify the entry at `path` without following it more than once.
pub fn observe(path: &Path) -> io::Result<Observed> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Observed::Missing),
        Err(e) => return Err(e),
    };

    if meta.file_type().is_symlink() {
        return Ok(match std::fs::canonicalize(path) {
            Ok(target) if target.is_dir() => Observed::Link {
                target: Some(target),
            },
            Ok(_) => Observed::NotDir,
            Err(_) => Observed::Link { target: None },
        });
    }

    Ok(if meta.is_dir() {
        Observed::Dir
    } else {
        Observed::NotDir
    })
}

/// Decide how to treat the observed entry.
///
/// A plain directory is always kept, even in temp mode: it may hold a
/// previous run's work and is still a usable stage.
pub fn reconcile(observed: &Observed, placement: &Placement) -> Plan {
    match (observed, placement) {
        (Observed::Missing, _) => Plan::CREATE,
        (Observed::NotDir, _) => Plan::REPLACE,
        (Observed::Dir, _) => Plan::KEEP,
        (Observed::Link { .. }, Placement::Direct) => Plan::REPLACE,
        (Observed::Link { target }, Placement::LinkedToTemp { tmp_root }) => {
            match target {
                Some(t) if t.starts_with(tmp_root) => Plan::KEEP,
                _ => Plan::REPLACE,
            }
        }
    }
}
