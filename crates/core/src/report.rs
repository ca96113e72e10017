use serde::{Deserialize, Serialize};

use crate::{CompressedDocument, SubmissionId};

/// Sizes and counts for one upload, handed to the status reporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadStatusReport {
    /// Size in bytes of the uncompressed SARIF.
    pub raw_upload_size_bytes: Option<usize>,
    /// Size in bytes of the encoded upload.
    pub zipped_upload_size_bytes: Option<usize>,
    pub num_results_in_sarif: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sarif_id: Option<SubmissionId>,
}

impl UploadStatusReport {
    pub fn from_compressed(compressed: &CompressedDocument) -> Self {
        Self {
            raw_upload_size_bytes: Some(compressed.raw_size),
            zipped_upload_size_bytes: Some(compressed.encoded_size()),
            num_results_in_sarif: Some(compressed.result_count),
            sarif_id: None,
        }
    }
}

/// Error details for a failed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub upload_failed_run_error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_failed_run_stack_trace: Option<String>,
}

impl FailureReport {
    /// Message from the outermost error; the cause chain, if any, as the trace.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
        Self {
            upload_failed_run_error: err.to_string(),
            upload_failed_run_stack_trace: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn report_from_compressed_document() {
        let compressed = CompressedDocument {
            encoded: "abcd".into(),
            raw_size: 120,
            result_count: 3,
        };
        let report = UploadStatusReport::from_compressed(&compressed);
        assert_eq!(report.raw_upload_size_bytes, Some(120));
        assert_eq!(report.zipped_upload_size_bytes, Some(4));
        assert_eq!(report.num_results_in_sarif, Some(3));
        assert!(serde_json::to_value(&report).unwrap().get("sarif_id").is_none());
    }

    #[test]
    fn failure_report_keeps_the_cause_chain() {
        let err = Err::<(), _>(crate::UploadError::invalid_request("bad sarif"))
            .context("uploading results")
            .unwrap_err();
        let report = FailureReport::from_error(&err);
        assert_eq!(report.upload_failed_run_error, "uploading results");
        assert_eq!(report.upload_failed_run_stack_trace.as_deref(), Some("bad sarif"));

        let plain = anyhow::anyhow!("plain");
        assert_eq!(FailureReport::from_error(&plain).upload_failed_run_stack_trace, None);
    }
}
