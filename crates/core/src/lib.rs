#![forbid(unsafe_code)]

//! Pure, synchronous pieces of the SARIF delivery pipeline: merging result
//! files, automation ids, category uniqueness, payload construction and the
//! interpretation of remote processing statuses.

pub mod automation;
pub mod category;
pub mod codec;
pub mod error;
pub mod fingerprint;
pub mod merge;
pub mod model;
pub mod payload;
pub mod report;
pub mod sentinel;
pub mod status;

pub use automation::*;
pub use category::*;
pub use codec::*;
pub use error::*;
pub use fingerprint::*;
pub use merge::*;
pub use model::*;
pub use payload::*;
pub use report::*;
pub use sentinel::*;
pub use status::*;
