use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{ResultDocument, UploadError};

/// A document serialized once, then gzipped and base64-encoded for the wire.
#[derive(Debug, Clone)]
pub struct CompressedDocument {
    /// Base64 of the gzip stream.
    pub encoded: String,
    /// Length of the uncompressed JSON in bytes.
    pub raw_size: usize,
    /// Number of findings in the document.
    pub result_count: usize,
}

impl CompressedDocument {
    /// Length of the encoded payload in bytes.
    pub fn encoded_size(&self) -> usize {
        self.encoded.len()
    }
}

pub fn compress_document(doc: &ResultDocument) -> Result<CompressedDocument, UploadError> {
    let json = serde_json::to_vec(doc)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| UploadError::io("<gzip>", e))?;
    let gz = encoder.finish().map_err(|e| UploadError::io("<gzip>", e))?;

    Ok(CompressedDocument {
        encoded: STANDARD.encode(gz),
        raw_size: json.len(),
        result_count: doc.result_count(),
    })
}

/// Inverse of [`compress_document`]; used to inspect dry-run payloads.
pub fn decompress_document(encoded: &str) -> Result<ResultDocument, UploadError> {
    let gz = STANDARD
        .decode(encoded)
        .map_err(|e| UploadError::InvalidRequest(format!("payload is not valid base64: {e}")))?;
    let mut json = Vec::new();
    GzDecoder::new(gz.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| UploadError::io("<gzip>", e))?;
    Ok(serde_json::from_slice(&json)?)
}
