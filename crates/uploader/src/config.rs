use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use relay_core::{EnvFileSentinelStore, InMemorySentinelStore, SentinelStore};
use tracing::warn;

use crate::poller::PollPolicy;

#[derive(Debug, Parser)]
#[command(
    name = "sarif-relay",
    version,
    about = "Upload SARIF results to a code scanning service and wait for processing"
)]
pub struct Cli {
    /// SARIF file, or directory searched recursively for *.sarif files.
    #[arg(long, default_value = "../results")]
    pub sarif_file: PathBuf,

    /// Checkout the results refer to.
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub checkout_path: PathBuf,

    /// Category for the analysis; overrides the computed automation id.
    #[arg(long)]
    pub category: Option<String>,

    /// Destination repository, owner/repo.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Commit the results belong to. Defaults to HEAD of the checkout.
    #[arg(long)]
    pub sha: Option<String>,

    #[arg(long = "ref", env = "GITHUB_REF")]
    pub git_ref: String,

    /// Commit the workflow was triggered for (the merge commit on pull requests).
    #[arg(long, env = "GITHUB_SHA")]
    pub trigger_sha: Option<String>,

    #[arg(long, env = "CODEQL_ACTION_ANALYSIS_KEY")]
    pub analysis_key: String,

    #[arg(long, env = "GITHUB_WORKFLOW")]
    pub analysis_name: Option<String>,

    #[arg(long, env = "GITHUB_RUN_ID", default_value_t = 0)]
    pub workflow_run_id: u64,

    #[arg(long, env = "GITHUB_RUN_ATTEMPT", default_value_t = 1)]
    pub workflow_run_attempt: u32,

    /// JSON object describing the job matrix.
    #[arg(long)]
    pub matrix: Option<String>,

    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    /// Target branch of the pull request.
    #[arg(long, env = "GITHUB_BASE_REF")]
    pub base_ref: Option<String>,

    #[arg(long, env = "CODEQL_WORKFLOW_STARTED_AT")]
    pub started_at: Option<String>,

    /// Job environment file used to record uploaded categories. Without one,
    /// duplicates are only caught within a single invocation.
    #[arg(long, env = "GITHUB_ENV")]
    pub sentinel_file: Option<PathBuf>,

    /// Write the payload to <temp-dir>/payload.json instead of uploading.
    #[arg(long, env = "CODEQL_ACTION_TEST_MODE", default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, env = "RUNNER_TEMP")]
    pub temp_dir: Option<PathBuf>,

    /// Wait for the service to finish processing the upload.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub wait_for_processing: bool,

    /// The upload is a placeholder for a failed build; a processing failure is expected.
    #[arg(long, default_value_t = false)]
    pub unsuccessful_execution: bool,

    /// Treat invalid input (missing path, bad SARIF) as a user error.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub invalid_input_is_user_error: bool,

    #[arg(long, default_value_t = 5)]
    pub poll_interval_seconds: u64,

    #[arg(long, default_value_t = 120)]
    pub poll_timeout_seconds: u64,
}

/// Resolved settings for one run of the uploader.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub sarif_path: PathBuf,
    pub checkout_path: PathBuf,
    pub category: Option<String>,
    pub repository: String,
    pub api_url: String,
    pub token: Option<String>,
    pub sha: Option<String>,
    pub git_ref: String,
    pub trigger_sha: Option<String>,
    pub analysis_key: String,
    pub analysis_name: Option<String>,
    pub workflow_run_id: u64,
    pub workflow_run_attempt: u32,
    pub matrix: Option<String>,
    pub event_name: Option<String>,
    pub event_path: Option<PathBuf>,
    pub base_ref: Option<String>,
    pub started_at: Option<String>,
    pub sentinel_file: Option<PathBuf>,
    pub dry_run: bool,
    pub temp_dir: PathBuf,
    pub wait_for_processing: bool,
    pub unsuccessful_execution: bool,
    pub invalid_input_is_user_error: bool,
    pub poll_policy: PollPolicy,
}

impl UploadConfig {
    pub fn from_cli(cli: Cli) -> Self {
        let temp_dir = cli.temp_dir.unwrap_or_else(std::env::temp_dir);
        Self {
            sarif_path: cli.sarif_file,
            checkout_path: cli.checkout_path,
            category: cli.category.filter(|c| !c.is_empty()),
            repository: cli.repository,
            api_url: cli.api_url,
            token: cli.token.filter(|t| !t.is_empty()),
            sha: cli.sha,
            git_ref: cli.git_ref,
            trigger_sha: cli.trigger_sha,
            analysis_key: cli.analysis_key,
            analysis_name: cli.analysis_name,
            workflow_run_id: cli.workflow_run_id,
            workflow_run_attempt: cli.workflow_run_attempt,
            matrix: cli.matrix.filter(|m| !m.is_empty()),
            event_name: cli.event_name,
            event_path: cli.event_path,
            base_ref: cli.base_ref.filter(|b| !b.is_empty()),
            started_at: cli.started_at,
            sentinel_file: cli.sentinel_file.filter(|p| !p.as_os_str().is_empty()),
            dry_run: cli.dry_run,
            temp_dir,
            wait_for_processing: cli.wait_for_processing,
            unsuccessful_execution: cli.unsuccessful_execution,
            invalid_input_is_user_error: cli.invalid_input_is_user_error,
            poll_policy: PollPolicy {
                interval: Duration::from_secs(cli.poll_interval_seconds),
                timeout: Duration::from_secs(cli.poll_timeout_seconds),
            },
        }
    }

    pub fn is_pull_request(&self) -> bool {
        self.event_name.as_deref() == Some("pull_request")
    }

    /// Store for category claims: the job env file when there is one,
    /// otherwise a store that lives only as long as this invocation.
    pub fn sentinel_store(&self) -> Box<dyn SentinelStore> {
        match &self.sentinel_file {
            Some(path) => Box::new(EnvFileSentinelStore::new(path)),
            None => {
                warn!(
                    "no job environment file (--sentinel-file or GITHUB_ENV); repeated uploads \
                     of a category are only detected within this invocation"
                );
                Box::new(InMemorySentinelStore::new())
            }
        }
    }
}
