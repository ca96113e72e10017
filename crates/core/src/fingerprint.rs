use std::path::Path;

use crate::{ResultDocument, UploadError};

/// Adds stable per-finding fingerprints to a merged document.
///
/// The fingerprinting algorithm lives outside this crate; the pipeline only
/// needs a pure `(document, source root) -> document` step.
pub trait FingerprintAnnotator: Send + Sync {
    fn annotate(&self, doc: ResultDocument, source_root: &Path)
        -> Result<ResultDocument, UploadError>;
}

/// Leaves the document untouched. Used when results already carry
/// fingerprints or none are wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAnnotator;

impl FingerprintAnnotator for PassthroughAnnotator {
    fn annotate(
        &self,
        doc: ResultDocument,
        _source_root: &Path,
    ) -> Result<ResultDocument, UploadError> {
        Ok(doc)
    }
}

impl<F> FingerprintAnnotator for F
where
    F: Fn(ResultDocument, &Path) -> Result<ResultDocument, UploadError> + Send + Sync,
{
    fn annotate(
        &self,
        doc: ResultDocument,
        source_root: &Path,
    ) -> Result<ResultDocument, UploadError> {
        self(doc, source_root)
    }
}
