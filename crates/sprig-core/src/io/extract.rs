//! Archive extraction module
//!
//! Handles tar.gz, tar.zst, plain tar and zip source archives.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use sprig_schema::ArchiveFormat;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Extract a tar.zst archive to a destination directory
pub fn extract_tar_zst(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let zstd_decoder = ZstdDecoder::new(reader)?;

    extract_tar(zstd_decoder, dest_dir)
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Reject absolute paths and `..` so nothing lands outside `dest_dir`.
fn sanitize(dest_dir: &Path, relative: &Path) -> Result<PathBuf, ExtractError> {
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ExtractError::Archive(format!(
            "Invalid path in archive: {}",
            relative.display()
        )));
    }
    Ok(dest_dir.join(relative))
}

/// Extract a tar archive from a reader, returning the relative paths written.
///
/// Entries are unpacked with [`tar::Entry::unpack_in`], which refuses to
/// write through a link that leads outside `dest_dir`.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path: PathBuf = entry.path()?.components().collect();
        if relative_path.as_os_str().is_empty() {
            continue;
        }
        sanitize(dest_dir, &relative_path)?;

        let is_dir = entry.header().entry_type().is_dir();
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Refusing to unpack {} outside {}",
                relative_path.display(),
                dest_dir.display()
            )));
        }
        if !is_dir {
            extracted.push(relative_path);
        }
    }

    Ok(extracted)
}

/// Extract a zip archive
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            continue;
        };
        let absolute_path = dest_dir.join(&relative_path);

        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted.push(relative_path);
    }

    Ok(extracted)
}

/// Extract an archive, detecting the format from its file name.
pub fn extract_auto(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let name = archive_path.to_string_lossy();
    match ArchiveFormat::from_path(&name) {
        Some(ArchiveFormat::TarZst) => extract_tar_zst(archive_path, dest_dir),
        Some(ArchiveFormat::TarGz) => extract_tar_gz(archive_path, dest_dir),
        Some(ArchiveFormat::Tar) => {
            let file = File::open(archive_path)?;
            extract_tar(BufReader::new(file), dest_dir)
        }
        Some(ArchiveFormat::Zip) => extract_zip(archive_path, dest_dir),
        Some(other) => Err(ExtractError::UnsupportedFormat(other.to_string())),
        None => Err(ExtractError::UnsupportedFormat(name.into_owned())),
    }
}
