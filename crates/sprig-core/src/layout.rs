//! Install layout: what has already been installed, and where.

use std::fs;
use std::path::{Path, PathBuf};

use sprig_schema::{PackageName, Spec, Version};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Failed to read install directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Enumerates installed packages.
pub trait InstallLayout {
    /// Specs of everything installed.
    fn all_specs(&self) -> Result<Vec<Spec>, LayoutError>;
}

/// Installs laid out as `<root>/<name>/<version>/`.
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    root: PathBuf,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Install prefix for a concrete spec.
    pub fn path_for_spec(&self, spec: &Spec) -> Option<PathBuf> {
        let version = spec.version()?;
        Some(self.root.join(&spec.name).join(version.as_str()))
    }
}

fn subdirs(path: &Path) -> Result<Vec<(String, PathBuf)>, LayoutError> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LayoutError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut dirs: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    dirs.sort();
    Ok(dirs)
}

impl InstallLayout for DirectoryLayout {
    fn all_specs(&self) -> Result<Vec<Spec>, LayoutError> {
        let mut specs = Vec::new();
        for (name, dir) in subdirs(&self.root)? {
            let Ok(name) = PackageName::new(&name) else {
                tracing::warn!(dir = %dir.display(), "ignoring install directory with invalid name");
                continue;
            };
            for (version, _) in subdirs(&dir)? {
                specs.push(Spec::named(name.clone()).with_version(Version::new(&version)));
            }
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_specs() {
        let dir = tempfile::tempdir().unwrap();
        for p in ["zlib/1.2.8", "zlib/1.2.7", "libelf/0.8.13", ".hidden/1.0"] {
            fs::create_dir_all(dir.path().join(p)).unwrap();
        }
        fs::write(dir.path().join("zlib/notes.txt"), "x").unwrap();

        let layout = DirectoryLayout::new(dir.path());
        let specs: Vec<String> = layout
            .all_specs()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(specs, vec!["libelf@0.8.13", "zlib@1.2.7", "zlib@1.2.8"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path().join("opt"));
        assert!(layout.all_specs().unwrap().is_empty());
        assert_eq!(
            layout.path_for_spec(&"zlib@1.2.8".parse().unwrap()),
            Some(dir.path().join("opt/zlib/1.2.8"))
        );
        assert_eq!(layout.path_for_spec(&"zlib".parse().unwrap()), None);
    }
}
