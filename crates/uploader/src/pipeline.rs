use std::path::{Path, PathBuf};

use relay_core::{
    build_payload, checkout_uri, combine_sarif_files, compress_document,
    populate_run_automation_details, resolve_sarif_paths, validate_unique_category,
    FingerprintAnnotator, PayloadInputs, ProcessingExpectation, RepositoryNwo, SentinelStore,
    SubmissionId, Trigger, UploadError, UploadStatusReport,
};
use tracing::{debug, info};

use crate::api::AnalysisApi;
use crate::poller::{wait_for_processing, PollOutcome, PollPolicy};
use crate::uploader::{UploadMode, Uploader};

/// Everything about one submission except the result files themselves.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub repository: RepositoryNwo,
    pub commit_oid: String,
    pub git_ref: String,
    pub analysis_key: String,
    pub category: Option<String>,
    pub analysis_name: Option<String>,
    pub workflow_run_id: u64,
    pub workflow_run_attempt: u32,
    /// Checkout the results refer to; also the fingerprinting root.
    pub source_root: PathBuf,
    /// JSON matrix/environment object of the job.
    pub environment: Option<String>,
    pub started_at: Option<String>,
    pub trigger: Trigger,
    pub merge_base_commit_oid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub status_report: UploadStatusReport,
    /// `None` in dry-run mode.
    pub submission_id: Option<SubmissionId>,
}

/// Wires the pipeline stages to their collaborators.
pub struct Pipeline<'a> {
    pub api: &'a dyn AnalysisApi,
    pub annotator: &'a dyn FingerprintAnnotator,
    pub sentinels: &'a dyn SentinelStore,
    pub mode: UploadMode,
    pub poll_policy: PollPolicy,
}

impl<'a> Pipeline<'a> {
    /// Uploads a results file, or every `*.sarif` under a directory.
    ///
    /// With `consider_invalid_request_config_error`, invalid-input failures
    /// (a missing path, an empty directory, malformed SARIF) are reported as
    /// configuration errors, because the caller knows the path came from the
    /// user.
    pub async fn upload_from_path(
        &self,
        sarif_path: &Path,
        request: &UploadRequest,
        consider_invalid_request_config_error: bool,
    ) -> Result<UploadResult, UploadError> {
        let result = match resolve_sarif_paths(sarif_path) {
            Ok(files) => self.upload_files(&files, request).await,
            Err(e) => Err(e),
        };
        match result {
            Err(e) if consider_invalid_request_config_error => Err(e.into_configuration_error()),
            other => other,
        }
    }

    /// Merges, annotates, checks and uploads `sarif_files` as one submission.
    pub async fn upload_files(
        &self,
        sarif_files: &[PathBuf],
        request: &UploadRequest,
    ) -> Result<UploadResult, UploadError> {
        info!(
            "processing sarif files: {:?}",
            sarif_files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()
        );

        let doc = combine_sarif_files(sarif_files)?;
        let doc = self.annotator.annotate(doc, &request.source_root)?;
        let doc = populate_run_automation_details(
            doc,
            request.category.as_deref(),
            &request.analysis_key,
            request.environment.as_deref(),
        )?;

        let tool_names = doc.tool_names();
        validate_unique_category(&doc, self.sentinels)?;

        let compressed = compress_document(&doc)?;
        let checkout = checkout_uri(&request.source_root);
        let payload = build_payload(
            &PayloadInputs {
                commit_oid: &request.commit_oid,
                git_ref: &request.git_ref,
                analysis_key: Some(&request.analysis_key),
                analysis_name: request.analysis_name.as_deref(),
                compressed: &compressed,
                workflow_run_id: request.workflow_run_id,
                workflow_run_attempt: request.workflow_run_attempt,
                checkout_uri: &checkout,
                environment: request.environment.as_deref(),
                started_at: request.started_at.as_deref(),
                tool_names: &tool_names,
            },
            &request.trigger,
            request.merge_base_commit_oid.as_deref(),
        );

        debug!("raw upload size: {} bytes", compressed.raw_size);
        debug!("base64 zipped upload size: {} bytes", compressed.encoded_size());
        debug!("number of results in upload: {}", compressed.result_count);

        let submission_id = Uploader::new(self.api, self.mode.clone())
            .upload(&payload, &request.repository)
            .await?;

        let mut status_report = UploadStatusReport::from_compressed(&compressed);
        status_report.sarif_id = submission_id.clone();
        Ok(UploadResult {
            status_report,
            submission_id,
        })
    }

    /// Waits for the service to finish processing a submission.
    pub async fn wait_for_processing(
        &self,
        repository: &RepositoryNwo,
        id: &SubmissionId,
        expectation: ProcessingExpectation,
    ) -> Result<PollOutcome, UploadError> {
        wait_for_processing(
            self.api,
            repository,
            id,
            &self.poll_policy,
            expectation.interpreter(),
        )
        .await
    }
}
