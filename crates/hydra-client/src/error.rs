use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The control plane could not be reached (connect failure, timeout, connection reset).
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// The control plane refused the request as malformed.
    #[error("control plane rejected request: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The `(job_id, attempt_number)` pair was already submitted.
    #[error("duplicate submission: {0}")]
    Duplicate(String),

    #[error("rpc failed: {0}")]
    Rpc(String),

    #[error("invalid response from control plane: {0}")]
    InvalidResponse(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Transient errors are retried by the transport layer.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }
}

#[cfg(feature = "grpc")]
impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;

        let message = status.message().to_string();
        match status.code() {
            Code::Unavailable
            | Code::DeadlineExceeded
            | Code::Aborted
            | Code::ResourceExhausted
            | Code::Cancelled => ClientError::Unavailable(message),
            Code::InvalidArgument => ClientError::Rejected(message),
            Code::NotFound => ClientError::NotFound(message),
            Code::AlreadyExists => ClientError::Duplicate(message),
            code => ClientError::Rpc(format!("{code:?}: {message}")),
        }
    }
}

#[cfg(feature = "grpc")]
impl From<tonic::transport::Error> for ClientError {
    fn from(err: tonic::transport::Error) -> Self {
        ClientError::Unavailable(err.to_string())
    }
}

#[cfg(feature = "grpc")]
impl From<ClientError> for tonic::Status {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ClientError::Rejected(msg) => tonic::Status::invalid_argument(msg),
            ClientError::NotFound(msg) => tonic::Status::not_found(msg),
            ClientError::Duplicate(msg) => tonic::Status::already_exists(msg),
            ClientError::Rpc(msg) => tonic::Status::internal(msg),
            ClientError::InvalidResponse(msg) => {
                tonic::Status::internal(format!("invalid response: {msg}"))
            }
            ClientError::InvalidConfig(msg) => {
                tonic::Status::internal(format!("invalid configuration: {msg}"))
            }
        }
    }
}
