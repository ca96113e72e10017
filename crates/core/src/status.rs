use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::UploadError;

/// Single processing error meaning the user's advanced setup clashes with
/// default setup on the repository.
pub const DEFAULT_SETUP_CONFLICT_ERROR: &str =
    "CodeQL analyses from advanced configurations cannot be processed when the default setup is enabled";

/// Prefix of the processing error the service reports for a placeholder
/// upload from a failed build.
pub const UNSUCCESSFUL_EXECUTION_PREFIX: &str = "unsuccessful execution";

/// Processing state of one submission. Starts `Pending`, moves exactly once
/// to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Complete,
    Failed,
}

impl ProcessingStatus {
    /// Parses the wire value. Anything outside the three known states breaks
    /// the service contract and is an error.
    pub fn parse(value: &str) -> Result<Self, UploadError> {
        match value {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(UploadError::UnexpectedStatus(other.to_string())),
        }
    }

    pub fn terminal(self) -> Option<TerminalStatus> {
        match self {
            Self::Pending => None,
            Self::Complete => Some(TerminalStatus::Complete),
            Self::Failed => Some(TerminalStatus::Failed),
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Complete,
    Failed,
}

/// Body of the status endpoint, as sent by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub processing_status: String,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

/// How a terminal status was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Processing completed normally.
    Processed,
    /// The expected "unsuccessful execution" failure arrived.
    ExpectedFailure,
    /// `complete` arrived where a failure was expected; a known transient
    /// quirk of the service.
    UnexpectedComplete,
    /// Processing failed in a way that is reported but tolerated.
    ToleratedFailure { errors: Vec<String> },
}

/// Turns a terminal status into success or a classified error.
pub trait OutcomeInterpreter: Send + Sync {
    fn interpret(
        &self,
        status: TerminalStatus,
        errors: &[String],
    ) -> Result<Resolution, UploadError>;
}

/// Interpretation for ordinary uploads: only `complete` is success.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardOutcome;

impl OutcomeInterpreter for StandardOutcome {
    fn interpret(
        &self,
        status: TerminalStatus,
        errors: &[String],
    ) -> Result<Resolution, UploadError> {
        match status {
            TerminalStatus::Complete => Ok(Resolution::Processed),
            TerminalStatus::Failed if is_default_setup_conflict(errors) => {
                Err(UploadError::ProcessingConfiguration {
                    errors: errors.to_vec(),
                })
            }
            TerminalStatus::Failed => Err(UploadError::Processing {
                errors: errors.to_vec(),
            }),
        }
    }
}

/// Interpretation for a placeholder upload after a failed build, where a
/// processing failure is the expected outcome. Never errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsuccessfulExecutionOutcome;

impl OutcomeInterpreter for UnsuccessfulExecutionOutcome {
    fn interpret(
        &self,
        status: TerminalStatus,
        errors: &[String],
    ) -> Result<Resolution, UploadError> {
        match status {
            TerminalStatus::Failed
                if errors.len() == 1 && errors[0].starts_with(UNSUCCESSFUL_EXECUTION_PREFIX) =>
            {
                debug!(
                    "received the expected \"unsuccessful execution\" processing error, \
                     and no other errors"
                );
                Ok(Resolution::ExpectedFailure)
            }
            TerminalStatus::Failed => {
                warn!(
                    "failed to upload a SARIF file for the unsuccessful execution; code scanning \
                     status for the repository may be out of date. Processing errors: {}",
                    errors.join(", ")
                );
                Ok(Resolution::ToleratedFailure {
                    errors: errors.to_vec(),
                })
            }
            TerminalStatus::Complete => {
                debug!(
                    "uploaded a SARIF file for the unsuccessful execution but processing reported \
                     complete; this is a known transient issue and does not leave status stale"
                );
                Ok(Resolution::UnexpectedComplete)
            }
        }
    }
}

/// Which interpretation a caller wants for its upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingExpectation {
    #[default]
    Success,
    UnsuccessfulExecution,
}

impl ProcessingExpectation {
    pub fn interpreter(self) -> &'static dyn OutcomeInterpreter {
        match self {
            Self::Success => &StandardOutcome,
            Self::UnsuccessfulExecution => &UnsuccessfulExecutionOutcome,
        }
    }
}

fn is_default_setup_conflict(errors: &[String]) -> bool {
    errors.len() == 1 && errors[0] == DEFAULT_SETUP_CONFLICT_ERROR
}
