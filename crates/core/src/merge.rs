use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::{ResultDocument, UploadError};

/// File extension of result files picked up from a directory.
pub const SARIF_EXTENSION: &str = "sarif";

/// Resolves a user-supplied results path into the list of files to upload.
///
/// A file is taken as-is. A directory is walked recursively for `*.sarif`
/// files without following symlinks.
pub fn resolve_sarif_paths(sarif_path: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let meta = std::fs::symlink_metadata(sarif_path).map_err(|_| {
        UploadError::InvalidRequest(format!("Path does not exist: {}", sarif_path.display()))
    })?;

    if !meta.is_dir() {
        return Ok(vec![sarif_path.to_path_buf()]);
    }

    let files = find_sarif_files_in_dir(sarif_path)?;
    if files.is_empty() {
        return Err(UploadError::InvalidRequest(format!(
            "No SARIF files found to upload in \"{}\".",
            sarif_path.display()
        )));
    }
    Ok(files)
}

/// Every `*.sarif` file under `dir`, sorted by path within each directory.
pub fn find_sarif_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(source) => UploadError::io(path, source),
                None => UploadError::InvalidRequest(format!(
                    "filesystem loop while searching {}",
                    path.display()
                )),
            }
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(SARIF_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Loads one result file, checking the structure this pipeline relies on.
pub fn read_document(path: &Path) -> Result<ResultDocument, UploadError> {
    let text = std::fs::read_to_string(path).map_err(|e| UploadError::io(path, e))?;
    parse_document(&text).map_err(|e| match e {
        UploadError::InvalidRequest(msg) => {
            UploadError::InvalidRequest(format!("{msg} (in {})", path.display()))
        }
        other => other,
    })
}

/// Parses a SARIF document from text.
///
/// Fails if the JSON is malformed, `runs` is not an array, or any run lacks a
/// `results` array.
pub fn parse_document(text: &str) -> Result<ResultDocument, UploadError> {
    let raw: Value = serde_json::from_str(text).map_err(|e| {
        UploadError::InvalidRequest(format!("Invalid SARIF. JSON syntax error: {e}"))
    })?;

    let Some(runs) = raw.get("runs").and_then(Value::as_array) else {
        return Err(UploadError::invalid_request("Invalid SARIF. Missing 'runs' array."));
    };
    if runs
        .iter()
        .any(|run| !run.get("results").is_some_and(Value::is_array))
    {
        return Err(UploadError::invalid_request(
            "Invalid SARIF. Missing 'results' array in run.",
        ));
    }

    serde_json::from_value(raw)
        .map_err(|e| UploadError::InvalidRequest(format!("Invalid SARIF: {e}")))
}

/// Merges result files into one document, keeping file-then-run order.
pub fn combine_sarif_files(paths: &[PathBuf]) -> Result<ResultDocument, UploadError> {
    let mut combined = ResultDocument::default();

    for path in paths {
        let doc = read_document(path)?;
        let Some(version) = doc.version else {
            return Err(UploadError::MissingVersion {
                path: path.display().to_string(),
            });
        };

        match &combined.version {
            None => combined.version = Some(version),
            Some(existing) if *existing != version => {
                return Err(UploadError::FormatMismatch {
                    first: existing.clone(),
                    second: version,
                });
            }
            Some(_) => {}
        }

        debug!(path = %path.display(), runs = doc.runs.len(), "merging result file");
        combined.runs.extend(doc.runs);
        // Top-level properties such as $schema come from the first file that has them.
        for (key, value) in doc.extra {
            combined.extra.entry(key).or_insert(value);
        }
    }

    Ok(combined)
}
