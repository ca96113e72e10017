use std::time::Duration;

use relay_core::{
    OutcomeInterpreter, ProcessingStatus, RepositoryNwo, Resolution, SubmissionId, UploadError,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::AnalysisApi;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default wall-clock budget for status checks.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// How long and how often to poll for processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Measured from the first poll; checked before every poll.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// How waiting ended. Only a classified processing failure or a contract
/// violation is an error; everything here is a normal return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A terminal status arrived and was accepted.
    Finished { resolution: Resolution, polls: u32 },
    /// Still pending when the timeout elapsed.
    TimedOut { polls: u32 },
    /// A status request failed; processing continues in the background.
    StatusUnavailable { polls: u32 },
}

/// Polls `id` until it reaches a terminal status or `policy.timeout` elapses.
pub async fn wait_for_processing(
    api: &dyn AnalysisApi,
    repo: &RepositoryNwo,
    id: &SubmissionId,
    policy: &PollPolicy,
    interpreter: &dyn OutcomeInterpreter,
) -> Result<PollOutcome, UploadError> {
    info!(submission_id = %id, "waiting for processing to finish");
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        if started.elapsed() > policy.timeout {
            warn!("timed out waiting for analysis to finish processing; continuing");
            return Ok(PollOutcome::TimedOut { polls });
        }

        polls += 1;
        let response = match api.analysis_status(repo, id).await {
            Ok(r) => r,
            Err(e) if e.is_transport_error() => {
                warn!(
                    "an error occurred checking the status of the delivery: {e}. It should still \
                     be processed in the background, but errors that occur during processing \
                     may not be reported"
                );
                return Ok(PollOutcome::StatusUnavailable { polls });
            }
            Err(e) => return Err(UploadError::UnexpectedStatus(e.to_string())),
        };

        let status = ProcessingStatus::parse(&response.processing_status)?;
        info!("analysis upload status is {status}");

        match status.terminal() {
            None => debug!("analysis processing is still pending"),
            Some(terminal) => {
                let errors = response.errors.unwrap_or_default();
                let resolution = interpreter.interpret(terminal, &errors)?;
                return Ok(PollOutcome::Finished { resolution, polls });
            }
        }

        sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use relay_core::{
        StandardOutcome, StatusResponse, UnsuccessfulExecutionOutcome, UploadPayload,
        DEFAULT_SETUP_CONFLICT_ERROR,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of status responses; the last one repeats.
    struct ScriptedApi {
        script: Mutex<VecDeque<Result<StatusResponse, ApiError>>>,
        calls: AtomicU32,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<StatusResponse, ApiError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn clone_result(r: &Result<StatusResponse, ApiError>) -> Result<StatusResponse, ApiError> {
        match r {
            Ok(s) => Ok(s.clone()),
            Err(_) => Err(ApiError::Network {
                message: "connection reset".into(),
            }),
        }
    }

    #[async_trait]
    impl AnalysisApi for ScriptedApi {
        async fn upload_analysis(
            &self,
            _repo: &RepositoryNwo,
            _payload: &UploadPayload,
        ) -> Result<SubmissionId, ApiError> {
            Ok(SubmissionId("unused".into()))
        }

        async fn analysis_status(
            &self,
            _repo: &RepositoryNwo,
            _id: &SubmissionId,
        ) -> Result<StatusResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                clone_result(script.front().expect("empty script"))
            }
        }
    }

    fn status(s: &str, errors: &[&str]) -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse {
            processing_status: s.into(),
            errors: (!errors.is_empty()).then(|| errors.iter().map(|e| e.to_string()).collect()),
        })
    }

    fn repo() -> RepositoryNwo {
        RepositoryNwo::parse("octo/hello").unwrap()
    }

    fn id() -> SubmissionId {
        SubmissionId("sarif-1".into())
    }

    async fn wait_standard(api: &ScriptedApi) -> Result<PollOutcome, UploadError> {
        wait_for_processing(api, &repo(), &id(), &PollPolicy::default(), &StandardOutcome).await
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_pending_statuses() {
        let api = ScriptedApi::new(vec![
            status("pending", &[]),
            status("pending", &[]),
            status("complete", &[]),
        ]);
        let started = Instant::now();
        let policy = PollPolicy::default();

        let outcome = wait_for_processing(&api, &repo(), &id(), &policy, &StandardOutcome)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Finished {
                resolution: Resolution::Processed,
                polls: 3
            }
        );
        assert_eq!(api.calls(), 3);
        assert!(started.elapsed() < policy.timeout);
        assert!(started.elapsed() >= policy.interval * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_politely() {
        let api = ScriptedApi::new(vec![status("pending", &[])]);
        let policy = PollPolicy {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(20),
        };

        let outcome = wait_for_processing(&api, &repo(), &id(), &policy, &StandardOutcome)
            .await
            .unwrap();

        let PollOutcome::TimedOut { polls } = outcome else {
            panic!("expected a timeout, got {outcome:?}");
        };
        // Polls at 0, 5, 10, 15 and 20s; the check before a poll is `elapsed > timeout`.
        assert_eq!(polls, 5);
        assert_eq!(api.calls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_stop_polling_without_failing() {
        let api = ScriptedApi::new(vec![
            status("pending", &[]),
            Err(ApiError::Server {
                status: 503,
                message: "unavailable".into(),
            }),
            status("complete", &[]),
        ]);

        let outcome = wait_standard(&api).await.unwrap();

        assert_eq!(outcome, PollOutcome::StatusUnavailable { polls: 2 });
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn default_setup_conflict_is_a_configuration_error() {
        let api = ScriptedApi::new(vec![status("failed", &[DEFAULT_SETUP_CONFLICT_ERROR])]);
        let err = wait_standard(&api).await.unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_are_processing_errors() {
        let api = ScriptedApi::new(vec![
            status("pending", &[]),
            status("failed", &["invalid location"]),
        ]);
        let err = wait_standard(&api).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Processing { ref errors } if errors == &["invalid location"]
        ));
        assert!(err.to_string().contains("invalid location"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_aborts() {
        let api = ScriptedApi::new(vec![status("exploded", &[])]);
        let err = wait_standard(&api).await.unwrap_err();
        assert!(matches!(err, UploadError::UnexpectedStatus(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_execution_mode_never_raises() {
        let cases = vec![
            (
                status("failed", &["unsuccessful execution: exit code 1"]),
                Resolution::ExpectedFailure,
            ),
            (status("complete", &[]), Resolution::UnexpectedComplete),
            (
                status("failed", &["unsuccessful execution", "second error"]),
                Resolution::ToleratedFailure {
                    errors: vec!["unsuccessful execution".into(), "second error".into()],
                },
            ),
        ];

        for (response, expected) in cases {
            let api = ScriptedApi::new(vec![status("pending", &[]), response]);
            let outcome = wait_for_processing(
                &api,
                &repo(),
                &id(),
                &PollPolicy::default(),
                &UnsuccessfulExecutionOutcome,
            )
            .await
            .unwrap();
            assert_eq!(
                outcome,
                PollOutcome::Finished {
                    resolution: expected,
                    polls: 2
                }
            );
        }
    }
}
