//! Download functionality with progress tracking.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use reqwest::blocking::Client;

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::http::create_blocking_client;

/// Progress information during download.
#[derive(Debug, Clone, Copy)]
pub struct DownloadProgress {
    /// Bytes downloaded so far
    pub downloaded: u64,
    /// Total bytes to download (0 when the server did not say)
    pub total: u64,
}

impl DownloadProgress {
    /// Get download progress as a percentage (0-100), if the size is known.
    pub fn percentage(&self) -> Option<f32> {
        if self.total == 0 {
            return None;
        }
        Some((self.downloaded as f32 / self.total as f32) * 100.0)
    }

    /// Get human-readable downloaded size.
    pub fn downloaded_human(&self) -> String {
        format_bytes(self.downloaded)
    }

    /// Get human-readable total size.
    pub fn total_human(&self) -> String {
        format_bytes(self.total)
    }
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Something that can fetch a URL into a local file.
pub trait AssetFetcher {
    /// Download `url` into `dest`, replacing any existing content.
    ///
    /// Returns the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> UpdateResult<u64>;
}

/// Blocking HTTP downloader.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader with the download deadline from the config.
    pub fn new(config: &UpdateConfig) -> UpdateResult<Self> {
        let client = create_blocking_client(config.download_timeout())
            .map_err(|message| UpdateError::Network { message })?;
        Ok(Self::with_client(client))
    }

    /// Create a downloader around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl AssetFetcher for Downloader {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &mut dyn FnMut(DownloadProgress),
    ) -> UpdateResult<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| UpdateError::Network {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UpdateError::Network {
                message: format!("HTTP {} from {}", response.status(), url),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let file = File::create(dest).map_err(|e| {
            UpdateError::io(format!("Failed to create {}", dest.display()), e)
        })?;
        let mut writer = BufWriter::new(file);

        let mut buffer = vec![0u8; 64 * 1024];
        let mut downloaded: u64 = 0;

        // Read and write errors are told apart here; io::copy would merge them.
        loop {
            let n = response.read(&mut buffer).map_err(|e| UpdateError::Network {
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }

            writer.write_all(&buffer[..n]).map_err(|e| {
                UpdateError::io(format!("Failed to write {}", dest.display()), e)
            })?;

            downloaded += n as u64;
            on_progress(DownloadProgress { downloaded, total });
        }

        writer
            .flush()
            .map_err(|e| UpdateError::io(format!("Failed to write {}", dest.display()), e))?;

        tracing::debug!("Downloaded {} to {}", format_bytes(downloaded), dest.display());
        Ok(downloaded)
    }
}
