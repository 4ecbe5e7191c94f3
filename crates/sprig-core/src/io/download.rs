//! Streaming downloads with SHA256 computed on the fly.
//!
//! Bytes land in `<dest>.part` and are renamed into place only once the
//! stream completes, so an interrupted transfer never looks like a finished
//! archive.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use sprig_schema::Sha256Digest;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where a URL points, as far as fetching is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(String),
    Local(PathBuf),
}

impl Location {
    /// Classify a URL. `http(s)://` is remote, `file://` and bare absolute
    /// paths are local.
    pub fn parse(url: &str) -> Result<Self, DownloadError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Self::Remote(url.to_string()))
        } else if let Some(path) = url.strip_prefix("file://") {
            Ok(Self::Local(PathBuf::from(path)))
        } else if url.starts_with('/') {
            Ok(Self::Local(PathBuf::from(url)))
        } else {
            Err(DownloadError::UnsupportedScheme(url.to_string()))
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Fetch `url` into `dest`, returning the digest of what was written.
pub async fn fetch_to(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<Sha256Digest, DownloadError> {
    match Location::parse(url)? {
        Location::Remote(url) => download(client, &url, dest).await,
        Location::Local(path) => copy_local(&path, dest).await,
    }
}

/// Perform a simple, sequential download with streaming hashing.
pub async fn download(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<Sha256Digest, DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let part = part_path(dest);
    let mut file = File::create(&part).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                tokio::fs::remove_file(&part).await.ok();
                return Err(e.into());
            }
        };
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&part, dest).await?;
    tracing::debug!(url, bytes = downloaded, "download complete");

    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

/// Copy a local file into `dest` the same way a download would land.
pub async fn copy_local(src: &Path, dest: &Path) -> Result<Sha256Digest, DownloadError> {
    let part = part_path(dest);
    tokio::fs::copy(src, &part).await?;
    tokio::fs::rename(&part, dest).await?;
    sha256_file(dest).await
}

/// Compute the SHA256 digest of a file.
pub async fn sha256_file(path: &Path) -> Result<Sha256Digest, DownloadError> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_location_parse() {
        assert_eq!(
            Location::parse("https://x.org/a.tar.gz").unwrap(),
            Location::Remote("https://x.org/a.tar.gz".into())
        );
        assert_eq!(
            Location::parse("file:///srv/a.tar.gz").unwrap(),
            Location::Local("/srv/a.tar.gz".into())
        );
        assert!(matches!(
            Location::parse("ftp://x.org/a"),
            Err(DownloadError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_download_hashes_and_renames() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("hello.txt");
        let client = Client::new();
        let digest = download(&client, &format!("{}/hello.txt", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(digest.as_str(), HELLO_SHA);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
        assert!(!dir.path().join("hello.txt.part").exists());
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.tar.gz");
        let result = download(
            &Client::new(),
            &format!("{}/missing.tar.gz", server.url()),
            &dest,
        )
        .await;

        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_copy_local() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "hello").unwrap();
        let dest = dir.path().join("dest.txt");

        let url = format!("file://{}", src.display());
        let digest = fetch_to(&Client::new(), &url, &dest).await.unwrap();
        assert_eq!(digest.as_str(), HELLO_SHA);
        assert_eq!(sha256_file(&dest).await.unwrap(), digest);
    }
}
