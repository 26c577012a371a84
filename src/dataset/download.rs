//! Download of the official EMNIST archive
//!
//! NIST publishes every EMNIST split inside one zip file of gzip-compressed
//! IDX files. Only the files of the configured split are written out; they
//! stay gzip-compressed and are decoded when loaded.

use std::io::{Cursor, Read};
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use zip::ZipArchive;

use super::emnist::EmnistConfig;
use crate::utils::error::{RecognizerError, Result};

/// Official NIST download location
pub const EMNIST_URL: &str = "https://biometrics.nist.gov/cs_links/EMNIST/gzip.zip";

/// Folder inside the archive holding the split files
const ARCHIVE_DIR: &str = "gzip";

/// Files of the configured split, as stored inside the archive
fn split_files(config: &EmnistConfig) -> Vec<String> {
    let mut files = Vec::new();
    for subset in ["train", "test"] {
        files.push(format!("{}.gz", config.images_file(subset)));
        files.push(format!("{}.gz", config.labels_file(subset)));
    }
    files.push(config.mapping_file());
    files
}

/// Fetch the EMNIST archive and extract the files of `config.split_name`
/// into `config.data_dir`. Files already present are left alone.
pub fn download_emnist(config: &EmnistConfig) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.data_dir)?;

    let missing: Vec<String> = split_files(config)
        .into_iter()
        .filter(|name| !config.data_dir.join(name).exists())
        .collect();
    if missing.is_empty() {
        tracing::info!("EMNIST '{}' already present", config.split_name);
        return Ok(Vec::new());
    }

    let bytes = fetch(EMNIST_URL)?;
    extract_split(&bytes, config)
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    tracing::info!("Downloading {}", url);

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message("Fetching EMNIST archive (~560 MB)");
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let response = reqwest::blocking::Client::builder()
        .timeout(None)
        .build()
        .and_then(|client| client.get(url).send())
        .and_then(|response| response.error_for_status())
        .map_err(|e| RecognizerError::Dataset(format!("Failed to download {url}: {e}")))?;

    let bytes = response
        .bytes()
        .map_err(|e| RecognizerError::Dataset(format!("Failed to read response body: {e}")))?;

    spinner.finish_with_message(format!("Downloaded {} bytes", bytes.len()));
    Ok(bytes.to_vec())
}

/// Write the split files found in a zip archive into `config.data_dir`
pub fn extract_split(archive_bytes: &[u8], config: &EmnistConfig) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| RecognizerError::Dataset(format!("Invalid EMNIST archive: {e}")))?;

    std::fs::create_dir_all(&config.data_dir)?;

    let mut written = Vec::new();
    for name in split_files(config) {
        let dest = config.data_dir.join(&name);
        if dest.exists() {
            continue;
        }

        let entry_name = format!("{ARCHIVE_DIR}/{name}");
        let mut entry = archive.by_name(&entry_name).map_err(|e| {
            RecognizerError::Dataset(format!("{entry_name} missing from archive: {e}"))
        })?;

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        std::fs::write(&dest, content)?;

        tracing::info!("Extracted {}", dest.display());
        written.push(dest);
    }

    Ok(written)
}
