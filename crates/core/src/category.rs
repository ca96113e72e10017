use std::collections::BTreeMap;

use tracing::debug;

use crate::{ResultDocument, Run, SentinelStore, UploadError};

/// Prefix of the per-category sentinel key.
pub const SENTINEL_PREFIX: &str = "UPLOAD_SARIF_";

/// Maps any value into `[A-Z0-9_]*` so it can be used in a variable name.
///
/// A missing value becomes `_`. Values that differ only in punctuation will
/// collide; that is accepted.
pub fn sanitize(value: Option<&str>) -> String {
    value
        .unwrap_or("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `sanitize(automation id) + "_" + sanitize(tool name)`.
pub fn category_key(run: &Run) -> String {
    format!(
        "{}_{}",
        sanitize(run.automation_id()),
        sanitize(run.tool_name())
    )
}

pub fn sentinel_name(category: &str) -> String {
    format!("{SENTINEL_PREFIX}{category}")
}

/// Claims every category present in `doc`, failing on the first one already
/// claimed earlier in the job.
///
/// Runs sharing a category inside the same document are fine; only a second
/// submission is rejected.
pub fn validate_unique_category(
    doc: &ResultDocument,
    store: &dyn SentinelStore,
) -> Result<(), UploadError> {
    let mut categories: BTreeMap<String, (Option<&str>, Option<&str>)> = BTreeMap::new();
    for run in &doc.runs {
        categories.insert(category_key(run), (run.automation_id(), run.tool_name()));
    }

    for (category, (id, tool)) in categories {
        let key = sentinel_name(&category);
        let claimed = store.try_claim(&key).map_err(|e| UploadError::Sentinel {
            key: key.clone(),
            message: format!("{e:#}"),
        })?;
        if !claimed {
            return Err(UploadError::DuplicateCategory {
                id: id.map(str::to_string),
                tool: tool.map(str::to_string),
            });
        }
        debug!(sentinel = %key, "claimed upload category");
    }
    Ok(())
}
