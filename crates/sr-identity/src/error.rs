use thiserror::Error;

/// Errors surfaced by key generation, JWT signing/parsing, and credentials framing.
///
/// Authority-facing callers map these onto the RPC error kinds of spec §7
/// (`INVALID_ARGUMENT` for parse/prefix failures, `INTERNAL` for sign/encode failures).
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("seed is empty")]
    EmptySeed,
    #[error("seed has wrong prefix: expected {expected}, got {actual}")]
    WrongSeedPrefix { expected: char, actual: String },
    #[error("invalid nkey seed: {0}")]
    InvalidSeed(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("failed to sign claims: {0}")]
    Sign(String),
    #[error("malformed JWT: {0}")]
    MalformedJwt(String),
    #[error("JWT signature verification failed")]
    BadSignature,
    #[error("json encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),
}
