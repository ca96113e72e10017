use anyhow::{Context, Result};
use clap::Parser;
use relay_core::{
    FailureReport, PassthroughAnnotator, ProcessingExpectation, PullRequestContext,
    PullRequestEvent, RepositoryNwo, Trigger, UploadStatusReport,
};
use relay_uploader::config::{Cli, UploadConfig};
use relay_uploader::{git, HttpAnalysisApi, Pipeline, PollOutcome, UploadMode, UploadRequest};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = UploadConfig::from_cli(Cli::parse());

    match run(&config).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            let failure = FailureReport::from_error(&e);
            println!("{}", serde_json::to_string_pretty(&failure)?);
            Err(e)
        }
    }
}

async fn run(config: &UploadConfig) -> Result<UploadStatusReport> {
    let repository = RepositoryNwo::parse(&config.repository)?;
    let api = HttpAnalysisApi::new(&config.api_url, config.token.clone())
        .context("building API client")?;

    let commit_oid = match &config.sha {
        Some(sha) => sha.clone(),
        None => git::commit_oid(&config.checkout_path, "HEAD")
            .await
            .context("resolving the analyzed commit")?,
    };

    let (trigger, merge_base_commit_oid) = resolve_trigger(config, &commit_oid).await;

    let request = UploadRequest {
        repository: repository.clone(),
        commit_oid,
        git_ref: config.git_ref.clone(),
        analysis_key: config.analysis_key.clone(),
        category: config.category.clone(),
        analysis_name: config.analysis_name.clone(),
        workflow_run_id: config.workflow_run_id,
        workflow_run_attempt: config.workflow_run_attempt,
        source_root: config.checkout_path.clone(),
        environment: config.matrix.clone(),
        started_at: config.started_at.clone(),
        trigger,
        merge_base_commit_oid,
    };

    let sentinels = config.sentinel_store();
    let mode = if config.dry_run {
        UploadMode::dry_run_in(&config.temp_dir)
    } else {
        UploadMode::Live
    };
    let pipeline = Pipeline {
        api: &api,
        annotator: &PassthroughAnnotator,
        sentinels: sentinels.as_ref(),
        mode,
        poll_policy: config.poll_policy,
    };

    let result = pipeline
        .upload_from_path(&config.sarif_path, &request, config.invalid_input_is_user_error)
        .await
        .context("uploading results")?;

    if let (true, Some(id)) = (config.wait_for_processing, &result.submission_id) {
        let expectation = if config.unsuccessful_execution {
            ProcessingExpectation::UnsuccessfulExecution
        } else {
            ProcessingExpectation::Success
        };
        let outcome = pipeline
            .wait_for_processing(&repository, id, expectation)
            .await
            .context("waiting for processing")?;
        match outcome {
            PollOutcome::Finished { resolution, polls } => {
                info!("processing finished after {polls} checks: {resolution:?}")
            }
            PollOutcome::TimedOut { polls } | PollOutcome::StatusUnavailable { polls } => {
                info!("stopped waiting after {polls} checks; processing continues remotely")
            }
        }
    }

    Ok(result.status_report)
}

/// Pull request context and merge base, when the trigger is a pull request.
async fn resolve_trigger(config: &UploadConfig, commit_oid: &str) -> (Trigger, Option<String>) {
    if !config.is_pull_request() {
        return (Trigger::Other, None);
    }

    let head_sha = config
        .trigger_sha
        .clone()
        .unwrap_or_else(|| commit_oid.to_string());
    let merge_base = git::determine_merge_base_commit(&config.checkout_path, &head_sha).await;

    let event = match &config.event_path {
        Some(path) => match PullRequestEvent::from_event_file(path) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("could not read the pull request event payload: {e}");
                None
            }
        },
        None => None,
    };

    let context = PullRequestContext {
        head_sha,
        base_branch: config.base_ref.clone(),
        event,
    };
    (Trigger::PullRequest(context), merge_base)
}
