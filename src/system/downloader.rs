// src/system/downloader.rs

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered HTTP {status}")]
    Status { status: u16 },
    #[error("could not write the download: {0}")]
    Write(#[from] io::Error),
}

/// Fetches one URL into one file. A single attempt, no retries.
pub trait Fetcher {
    /// Downloads `url` into `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Blocking HTTP(S) fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("phpx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        log::debug!("GET {}", url);
        let mut response = client.get(url).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let mut writer = BufWriter::new(File::create(dest)?);
        let written = response.copy_to(&mut writer)?;
        writer.flush()?;
        log::debug!("Downloaded {} bytes to '{}'", written, dest.display());
        Ok(written)
    }
}
