use thiserror::Error;

/// Errors from the bootstrap pipeline (spec §4.7, §7). These never cross an RPC boundary —
/// they're returned directly to the edge process driving the library.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("onboarding token is malformed: {0}")]
    InvalidToken(String),
    #[error("package field {0} is missing or empty")]
    FieldMissing(&'static str),
    #[error("package status is 'issued': not yet delivered")]
    PackageNotDelivered,
    #[error("package status is 'revoked'")]
    PackageRevoked,
    #[error("package status is 'expired'")]
    PackageExpired,
    #[error("package status is 'deleted'")]
    PackageDeleted,
    #[error("mtls bundle is missing: {0}")]
    BundleMissing(String),
    #[error("unsupported bundle format: {0}")]
    UnsupportedFormat(String),
    #[error("archive is missing required file(s): {0}")]
    ArchiveMissingFiles(String),
    #[error("http request to core failed: {0}")]
    Http(String),
    #[error("core returned {status}: {body}")]
    CoreError { status: u16, body: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
