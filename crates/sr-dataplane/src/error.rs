use thiserror::Error;

/// Errors from the KV engine (spec §4.2, §7).
#[derive(Debug, Error)]
pub enum KvError {
    #[error("key already exists")]
    KeyExists,
    #[error("compare-and-swap mismatch: expected revision {expected}")]
    CasMismatch { expected: u64 },
    #[error("nats connection unavailable: {0}")]
    Unavailable(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Errors from the object engine (spec §4.3, §7).
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object not found")]
    NotFound,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("nats connection unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<async_nats::Error> for KvError {
    fn from(e: async_nats::Error) -> Self {
        KvError::Unavailable(e.to_string())
    }
}

impl From<async_nats::Error> for ObjectError {
    fn from(e: async_nats::Error) -> Self {
        ObjectError::Unavailable(e.to_string())
    }
}

impl From<KvError> for tonic::Status {
    fn from(e: KvError) -> Self {
        match e {
            KvError::KeyExists => tonic::Status::already_exists(e.to_string()),
            KvError::CasMismatch { .. } => tonic::Status::aborted(e.to_string()),
            KvError::Unavailable(_) => tonic::Status::unavailable(e.to_string()),
            KvError::InvalidArgument(_) => tonic::Status::invalid_argument(e.to_string()),
            KvError::Internal(_) => tonic::Status::internal(e.to_string()),
        }
    }
}

impl From<ObjectError> for tonic::Status {
    fn from(e: ObjectError) -> Self {
        match e {
            ObjectError::NotFound => tonic::Status::not_found(e.to_string()),
            ObjectError::InvalidArgument(_) => tonic::Status::invalid_argument(e.to_string()),
            ObjectError::Unavailable(_) => tonic::Status::unavailable(e.to_string()),
            ObjectError::Internal(_) => tonic::Status::internal(e.to_string()),
        }
    }
}
