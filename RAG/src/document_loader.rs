use crate::models::DocumentRecord;
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns one file into text.
pub type TextExtractor = Arc<dyn Fn(&Path) -> Result<String> + Send + Sync>;

/// PDF files in `dir`, newest first.
///
/// Uploads are stored as `YYYYMMDD_HHMMSS_<name>.pdf`, so a descending sort
/// on the file name puts the most recent upload at the front. A missing
/// directory is treated as empty.
pub fn list_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(files)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Loads every PDF in `dir` with `pdf-extract`.
pub fn load_documents(dir: &Path) -> Result<Vec<DocumentRecord>> {
    load_documents_with(dir, extract_pdf_text)
}

/// Loads every PDF in `dir`, using `extract` to turn a file into text.
///
/// Records come back in the same order as [`list_pdf_files`]; only the first
/// one is flagged `is_latest`. The first extraction error aborts the whole
/// load.
pub fn load_documents_with<F>(dir: &Path, extract: F) -> Result<Vec<DocumentRecord>>
where
    F: Fn(&Path) -> Result<String> + Sync,
{
    let files = list_pdf_files(dir)?;
    log::info!(
        "Found {} PDF files in {}, processing newest first",
        files.len(),
        dir.display()
    );

    let records = files
        .par_iter()
        .enumerate()
        .map(|(position, path)| {
            let file_name = file_name_of(path)?;
            log::info!("Processing PDF: {}", file_name);
            let text = extract(path).with_context(|| format!("failed to parse {}", file_name))?;
            Ok(DocumentRecord::new(text, file_name, position == 0))
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Loaded {} documents", records.len());
    Ok(records)
}

/// Runs [`load_documents_with`] on the blocking pool.
pub async fn load_documents_in_background(
    dir: PathBuf,
    extract: TextExtractor,
) -> Result<Vec<DocumentRecord>> {
    tokio::task::spawn_blocking(move || load_documents_with(&dir, |path| extract(path)))
        .await
        .map_err(|e| anyhow!("document loading task failed: {}", e))?
}

/// Extracts text with `pdf-extract`.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path))) {
        Ok(result) => result.map_err(|e| anyhow!("{}", e)),
        Err(_) => Err(anyhow!("PDF extraction panicked")),
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))
}
