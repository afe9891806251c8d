use thiserror::Error;

/// Errors surfaced by authority operations, mapped to `tonic::Status` at the RPC boundary
/// (spec §7).
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("operator already bootstrapped")]
    AlreadyExists,
    #[error("operator not yet bootstrapped")]
    NotInitialized,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Identity(#[from] sr_identity::IdentityError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthorityError> for tonic::Status {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::AlreadyExists => tonic::Status::already_exists(err.to_string()),
            AuthorityError::NotInitialized => {
                tonic::Status::failed_precondition(err.to_string())
            }
            AuthorityError::InvalidArgument(_) => {
                tonic::Status::invalid_argument(err.to_string())
            }
            AuthorityError::Identity(_) => tonic::Status::invalid_argument(err.to_string()),
            AuthorityError::Internal(_) => tonic::Status::internal(err.to_string()),
        }
    }
}

/// Errors from peer-identity extraction and allowlist enforcement (spec §4.6).
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("no peer certificate presented")]
    Unauthenticated,
    #[error("no allowed identities configured")]
    NoAllowedIdentities,
    #[error("peer identity {0} is not on the allowlist")]
    Forbidden(String),
}

impl From<AuthzError> for tonic::Status {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => tonic::Status::unauthenticated(err.to_string()),
            AuthzError::NoAllowedIdentities | AuthzError::Forbidden(_) => {
                tonic::Status::permission_denied(err.to_string())
            }
        }
    }
}
