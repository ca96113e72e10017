use std::path::{Path, PathBuf};

use relay_core::{RepositoryNwo, SubmissionId, UploadError, UploadPayload};
use tracing::{debug, info};

use crate::api::AnalysisApi;

/// File name of the dry-run artifact inside the temporary directory.
pub const PAYLOAD_FILE_NAME: &str = "payload.json";

/// Where a payload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMode {
    /// Submit to the analysis service.
    Live,
    /// Write the payload to disk and never touch the network. Keeps test
    /// runs from changing a real repository's analysis history.
    DryRun { payload_path: PathBuf },
}

impl UploadMode {
    pub fn dry_run_in(temp_dir: &Path) -> Self {
        Self::DryRun {
            payload_path: temp_dir.join(PAYLOAD_FILE_NAME),
        }
    }
}

pub struct Uploader<'a> {
    api: &'a dyn AnalysisApi,
    mode: UploadMode,
}

impl<'a> Uploader<'a> {
    pub fn new(api: &'a dyn AnalysisApi, mode: UploadMode) -> Self {
        Self { api, mode }
    }

    /// Submits `payload`. Returns `None` in dry-run mode, where nothing is sent.
    pub async fn upload(
        &self,
        payload: &UploadPayload,
        repo: &RepositoryNwo,
    ) -> Result<Option<SubmissionId>, UploadError> {
        info!("uploading results");

        match &self.mode {
            UploadMode::DryRun { payload_path } => {
                info!(
                    "in test mode; results are not uploaded, saving to {}",
                    payload_path.display()
                );
                let json = serde_json::to_vec_pretty(payload)?;
                if let Some(parent) = payload_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| UploadError::io(parent, e))?;
                }
                tokio::fs::write(payload_path, json)
                    .await
                    .map_err(|e| UploadError::io(payload_path, e))?;
                Ok(None)
            }
            UploadMode::Live => {
                let id = self.api.upload_analysis(repo, payload).await?;
                debug!(submission_id = %id, "upload accepted");
                info!("successfully uploaded results");
                Ok(Some(id))
            }
        }
    }
}
