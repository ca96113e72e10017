use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::{CompressedDocument, UploadError};

/// Body of the upload request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPayload {
    pub commit_oid: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub analysis_key: Option<String>,
    pub analysis_name: Option<String>,
    /// Base64 of the gzipped SARIF document.
    pub sarif: String,
    pub workflow_run_id: u64,
    pub workflow_run_attempt: u32,
    pub checkout_uri: String,
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default)]
    pub tool_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_sha: Option<String>,
}

/// What triggered the analysis, as far as the baseline is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    PullRequest(PullRequestContext),
    Other,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PullRequestContext {
    /// Commit the trigger points at (the merge commit for a pull request).
    pub head_sha: String,
    /// Branch the pull request targets, without `refs/heads/`.
    pub base_branch: Option<String>,
    /// Pull request section of the trigger event payload, when available.
    pub event: Option<PullRequestEvent>,
}

/// The parts of a `pull_request` event this crate reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub pull_request: PullRequestInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub base: PullRequestBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestBase {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
}

impl PullRequestEvent {
    pub fn from_event_file(path: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(path).map_err(|e| UploadError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            UploadError::InvalidRequest(format!(
                "{} is not a pull_request event payload: {e}",
                path.display()
            ))
        })
    }
}

/// Everything needed to build a payload besides the trigger.
#[derive(Debug, Clone)]
pub struct PayloadInputs<'a> {
    pub commit_oid: &'a str,
    pub git_ref: &'a str,
    pub analysis_key: Option<&'a str>,
    pub analysis_name: Option<&'a str>,
    pub compressed: &'a CompressedDocument,
    pub workflow_run_id: u64,
    pub workflow_run_attempt: u32,
    pub checkout_uri: &'a str,
    pub environment: Option<&'a str>,
    pub started_at: Option<&'a str>,
    pub tool_names: &'a [String],
}

pub fn build_payload(
    inputs: &PayloadInputs<'_>,
    trigger: &Trigger,
    merge_base_commit_oid: Option<&str>,
) -> UploadPayload {
    let (base_ref, base_sha) = match trigger {
        Trigger::PullRequest(pr) => resolve_baseline(inputs.commit_oid, pr, merge_base_commit_oid),
        Trigger::Other => (None, None),
    };

    UploadPayload {
        commit_oid: inputs.commit_oid.to_string(),
        git_ref: inputs.git_ref.to_string(),
        analysis_key: inputs.analysis_key.map(str::to_string),
        analysis_name: inputs.analysis_name.map(str::to_string),
        sarif: inputs.compressed.encoded.clone(),
        workflow_run_id: inputs.workflow_run_id,
        workflow_run_attempt: inputs.workflow_run_attempt,
        checkout_uri: inputs.checkout_uri.to_string(),
        environment: inputs.environment.map(str::to_string),
        started_at: inputs.started_at.map(str::to_string),
        tool_names: inputs.tool_names.to_vec(),
        base_ref,
        base_sha,
    }
}

/// Merge base of the merge commit when we analyzed exactly that commit,
/// else the base declared in the event, else nothing.
fn resolve_baseline(
    commit_oid: &str,
    pr: &PullRequestContext,
    merge_base_commit_oid: Option<&str>,
) -> (Option<String>, Option<String>) {
    if let (true, Some(merge_base), Some(branch)) = (
        commit_oid == pr.head_sha,
        merge_base_commit_oid,
        pr.base_branch.as_deref(),
    ) {
        return (
            Some(format!("refs/heads/{branch}")),
            Some(merge_base.to_string()),
        );
    }
    match &pr.event {
        Some(event) => (
            Some(format!("refs/heads/{}", event.pull_request.base.git_ref)),
            Some(event.pull_request.base.sha.clone()),
        ),
        None => (None, None),
    }
}

/// Bytes escaped in a checkout URI path: everything but the unreserved
/// characters, `/`, and the `:` of a drive letter.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b':');

/// `file://` URL of an absolute checkout path. Non-ASCII path segments are
/// UTF-8 percent-encoded.
pub fn checkout_uri(path: &Path) -> String {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let text = path.to_string_lossy().replace('\\', "/");
    let root = if text.starts_with('/') { "" } else { "/" };
    format!("file://{root}{}", utf8_percent_encode(&text, PATH_ESCAPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGE_SHA: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678";
    const MERGE_BASE: &str = "0000000000000000000000000000000000000001";

    fn compressed() -> CompressedDocument {
        CompressedDocument {
            encoded: "H4sIAAAA".into(),
            raw_size: 10,
            result_count: 0,
        }
    }

    fn inputs<'a>(
        commit: &'a str,
        c: &'a CompressedDocument,
        tools: &'a [String],
    ) -> PayloadInputs<'a> {
        PayloadInputs {
            commit_oid: commit,
            git_ref: "refs/pull/7/merge",
            analysis_key: Some(".github/workflows/ci.yml:analyze"),
            analysis_name: Some("CI"),
            compressed: c,
            workflow_run_id: 42,
            workflow_run_attempt: 1,
            checkout_uri: "file:///src",
            environment: Some("{}"),
            started_at: None,
            tool_names: tools,
        }
    }

    fn event(branch: &str, sha: &str) -> PullRequestEvent {
        PullRequestEvent {
            pull_request: PullRequestInfo {
                base: PullRequestBase {
                    git_ref: branch.into(),
                    sha: sha.into(),
                },
            },
        }
    }

    fn pr(with_event: bool) -> Trigger {
        Trigger::PullRequest(PullRequestContext {
            head_sha: MERGE_SHA.into(),
            base_branch: Some("main".into()),
            event: with_event.then(|| event("release", "ffff")),
        })
    }

    #[test]
    fn pass_through_fields_are_verbatim() {
        let c = compressed();
        let tools = vec!["CodeQL".to_string()];
        let payload = build_payload(&inputs(MERGE_SHA, &c, &tools), &Trigger::Other, None);
        assert_eq!(payload.analysis_key.as_deref(), Some(".github/workflows/ci.yml:analyze"));
        assert_eq!(payload.analysis_name.as_deref(), Some("CI"));
        assert_eq!(payload.sarif, "H4sIAAAA");
        assert_eq!(payload.tool_names, tools);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["ref"], "refs/pull/7/merge");
        assert!(json.get("base_ref").is_none());
        assert!(json.get("base_sha").is_none());
    }

    #[test]
    fn merge_commit_with_merge_base_uses_target_branch() {
        let c = compressed();
        let payload = build_payload(&inputs(MERGE_SHA, &c, &[]), &pr(true), Some(MERGE_BASE));
        assert_eq!(payload.base_ref.as_deref(), Some("refs/heads/main"));
        assert_eq!(payload.base_sha.as_deref(), Some(MERGE_BASE));
    }

    #[test]
    fn falls_back_to_event_base_when_not_on_merge_commit() {
        let c = compressed();
        let payload = build_payload(&inputs("deadbeef", &c, &[]), &pr(true), Some(MERGE_BASE));
        assert_eq!(payload.base_ref.as_deref(), Some("refs/heads/release"));
        assert_eq!(payload.base_sha.as_deref(), Some("ffff"));

        let payload = build_payload(&inputs(MERGE_SHA, &c, &[]), &pr(true), None);
        assert_eq!(payload.base_ref.as_deref(), Some("refs/heads/release"));
    }

    #[test]
    fn no_baseline_without_merge_base_or_event() {
        let c = compressed();
        let payload = build_payload(&inputs(MERGE_SHA, &c, &[]), &pr(false), None);
        assert_eq!(payload.base_ref, None);
        assert_eq!(payload.base_sha, None);
    }

    #[test]
    fn other_triggers_never_get_a_baseline() {
        let c = compressed();
        let payload = build_payload(&inputs(MERGE_SHA, &c, &[]), &Trigger::Other, Some(MERGE_BASE));
        assert_eq!(payload.base_ref, None);
        assert_eq!(payload.base_sha, None);
    }

    #[test]
    fn event_file_is_parsed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"action":"opened","pull_request":{"number":7,"base":{"ref":"main","sha":"abc"}}}"#,
        )
        .unwrap();
        assert_eq!(PullRequestEvent::from_event_file(&path).unwrap(), event("main", "abc"));

        std::fs::write(&path, r#"{"ref":"refs/heads/main"}"#).unwrap();
        assert!(PullRequestEvent::from_event_file(&path).is_err());
    }

    #[test]
    fn checkout_uri_is_a_file_url() {
        assert_eq!(
            checkout_uri(Path::new("/home/runner/work/my repo")),
            "file:///home/runner/work/my%20repo"
        );
        assert_eq!(
            checkout_uri(Path::new("/src/a#b?c%d")),
            "file:///src/a%23b%3Fc%25d"
        );
    }

    #[test]
    fn checkout_uri_escapes_non_ascii_and_reserved_characters() {
        assert_eq!(
            checkout_uri(Path::new("/work/café [x]")),
            "file:///work/caf%C3%A9%20%5Bx%5D"
        );
        assert_eq!(
            checkout_uri(Path::new("/work/проект/src")),
            "file:///work/%D0%BF%D1%80%D0%BE%D0%B5%D0%BA%D1%82/src"
        );
    }
}
