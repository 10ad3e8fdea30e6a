use std::io;
use std::path::Path;

use futures_util::StreamExt;
use md5::Context;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("download integrity check failed: expected {expected_md5}, got {actual_md5}")]
    IntegrityMismatch {
        expected_md5: String,
        actual_md5: String,
    },
}

/// Moves file bodies through the pre-signed links handed out by the API.
///
/// Bodies are streamed through a local file and never held in memory whole.
#[derive(Clone)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Streams `href` into `target`, checking the MD5 digest on the way.
    pub async fn download_to_path_checked(
        &self,
        href: &str,
        target: &Path,
        expected_md5: Option<&str>,
    ) -> Result<(), TransferError> {
        let url = Url::parse(href)?;
        let response = self.http.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut digest = Context::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            digest.consume(&chunk);
        }
        file.flush().await?;

        if let Some(expected_md5) = expected_md5 {
            let actual_md5 = format!("{:x}", digest.compute());
            if actual_md5 != expected_md5.to_ascii_lowercase() {
                return Err(TransferError::IntegrityMismatch {
                    expected_md5: expected_md5.to_ascii_lowercase(),
                    actual_md5,
                });
            }
        }
        Ok(())
    }

    pub async fn upload_from_path(
        &self,
        href: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), TransferError> {
        let url = Url::parse(href)?;
        let file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        self.http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new()
    }
}
