use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use docqa::document_loader::list_pdf_files;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn timestamp_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"^\d{8}_\d{6}_").expect("valid regex"))
}

/// Name an upload is stored under: `YYYYMMDD_HHMMSS_<original>`.
pub fn timestamped_name(original: &str, uploaded_at: NaiveDateTime) -> String {
    format!("{}_{}", uploaded_at.format(TIMESTAMP_FORMAT), original)
}

/// The client's file name, with the upload timestamp removed.
pub fn original_name(stored: &str) -> &str {
    match timestamp_prefix().find(stored) {
        Some(prefix) => &stored[prefix.end()..],
        None => stored,
    }
}

/// Drops any directory part a client put in the file name.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Stored PDF file names, newest first.
pub fn stored_documents(data_dir: &Path) -> Result<Vec<String>> {
    Ok(list_pdf_files(data_dir)?
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .collect())
}

/// Deletes every stored copy of `original`.
pub fn remove_previous_versions(data_dir: &Path, original: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for stored in stored_documents(data_dir)? {
        if original_name(&stored) == original {
            let path = data_dir.join(&stored);
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            log::info!("Removed previous upload: {}", stored);
            removed.push(path);
        }
    }
    Ok(removed)
}

/// Writes an upload into `data_dir`, replacing older copies of the same file.
/// Returns the stored file name.
pub fn store_upload(
    data_dir: &Path,
    original: &str,
    bytes: &[u8],
    uploaded_at: NaiveDateTime,
) -> Result<String> {
    fs::create_dir_all(data_dir).with_context(|| format!("creating {}", data_dir.display()))?;
    remove_previous_versions(data_dir, original)?;

    let stored = timestamped_name(original, uploaded_at);
    let path = data_dir.join(&stored);
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved upload {} ({} bytes)", stored, bytes.len());
    Ok(stored)
}
