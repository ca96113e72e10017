#![forbid(unsafe_code)]

//! Network side of SARIF delivery: the analysis API client, the uploader,
//! the processing-status poller and the pipeline that ties them to the
//! pure stages in `relay-core`.

pub mod api;
pub mod config;
pub mod git;
pub mod pipeline;
pub mod poller;
pub mod uploader;

pub use api::{AnalysisApi, ApiError, HttpAnalysisApi};
pub use pipeline::{Pipeline, UploadRequest, UploadResult};
pub use poller::{wait_for_processing, PollOutcome, PollPolicy};
pub use uploader::{UploadMode, Uploader};
