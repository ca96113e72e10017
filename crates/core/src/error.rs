use thiserror::Error;

/// Every way the delivery pipeline can fail.
///
/// Stage-local faults (format, invalid input, duplicate category) abort the
/// pipeline before anything is sent. Processing failures come back from the
/// remote service after upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Two merged inputs declared different SARIF versions.
    #[error("Different SARIF versions encountered: {first} and {second}")]
    FormatMismatch { first: String, second: String },

    /// An input declared no SARIF version at all.
    #[error("SARIF file {path} does not declare a version")]
    MissingVersion { path: String },

    /// Bad input: missing path, empty directory, malformed SARIF, rejected request.
    #[error("{0}")]
    InvalidRequest(String),

    /// A fault the user can fix in their own configuration.
    #[error("{0}")]
    Configuration(String),

    /// A second submission in the same job reused a tool/category pair.
    #[error(
        "Aborting upload: only one upload is allowed per job per tool/category. \
         The easiest fix is to specify a unique value for the `category` input. \
         If .runs[].automationDetails.id is specified in the sarif file, that will take \
         precedence over your configured `category`. Category: ({}) Tool: ({})",
        id.as_deref().unwrap_or("none"),
        tool.as_deref().unwrap_or("none")
    )]
    DuplicateCategory {
        id: Option<String>,
        tool: Option<String>,
    },

    /// Remote processing failed because of the user's setup.
    #[error("Code scanning could not process the submitted SARIF file:\n{}", errors.join("\n"))]
    ProcessingConfiguration { errors: Vec<String> },

    /// Remote processing failed for any other reason.
    #[error("Code scanning could not process the submitted SARIF file:\n{}", errors.join("\n"))]
    Processing { errors: Vec<String> },

    /// The remote service reported a processing status outside the contract.
    #[error("unexpected processing status from the analysis service: {0:?}")]
    UnexpectedStatus(String),

    /// The upload request itself failed.
    #[error("upload request failed: {0}")]
    Request(String),

    /// The sentinel store could not be read or written.
    #[error("sentinel store error for {key}: {message}")]
    Sentinel { key: String, message: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UploadError {
    pub fn invalid_request<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidRequest(e.to_string())
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether the user, not the tool or the service, is at fault.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            UploadError::Configuration(_) | UploadError::ProcessingConfiguration { .. }
        )
    }

    /// Reclassifies a fault in user-supplied input as a configuration error.
    ///
    /// Callers use this when they know the input was user controlled, for
    /// example a results path typed into a workflow file. Invalid requests,
    /// mixed or missing SARIF versions and a reused category all count; the
    /// message is kept. Other kinds pass through unchanged.
    pub fn into_configuration_error(self) -> Self {
        match self {
            UploadError::InvalidRequest(message) => UploadError::Configuration(message),
            e @ (UploadError::FormatMismatch { .. }
            | UploadError::MissingVersion { .. }
            | UploadError::DuplicateCategory { .. }) => UploadError::Configuration(e.to_string()),
            other => other,
        }
    }
}
