use thiserror::Error;

/// Reasons a job specification is rejected before anything is submitted.
///
/// Every variant maps to the `InvalidSpecification` failure kind; such errors are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("invalid specification: command must not be empty")]
    EmptyCommand,
    #[error("invalid specification: callable reference must not be empty")]
    EmptyCallable,
    #[error("invalid specification: codec name must not be empty")]
    EmptyCodec,
    #[error("invalid specification: cpu must be at least 1, got {0}")]
    InvalidCpu(u32),
    #[error("invalid specification: memory {value:?} is not a positive size ({reason})")]
    InvalidMemory { value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("failed to decode payload: {0}")]
    Decode(String),
    #[error("unsupported codec: {0}")]
    Unsupported(String),
}
