use hydra_model::{CodecError, FailureKind, RemoteError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("unsupported kind for this runner: {0}")]
    UnsupportedKind(&'static str),
    #[error("no runner for kind {0}")]
    NoRunner(&'static str),
    #[error("exit code: {code}")]
    NonZeroExit { code: i32, stderr: Vec<u8> },
    #[error("terminated by signal")]
    KilledBySignal { stderr: Vec<u8> },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
    #[error("function not registered: {0}")]
    FunctionNotFound(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The function itself returned an error; the message is passed through untouched.
    #[error("{0}")]
    Function(String),
}

pub type ExecResult<T> = Result<T, ExecError>;

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

/// Attempt-level failure reported back to the control plane.
///
/// Problems with the job itself (unknown kind, unknown function, undecodable arguments)
/// are final; everything else is an ordinary attempt failure.
impl From<ExecError> for RemoteError {
    fn from(err: ExecError) -> Self {
        let message = err.to_string();
        match err {
            ExecError::NonZeroExit { code, stderr } => {
                with_stderr(RemoteError::attempt_failed(message).with_exit_code(code), stderr)
            }
            ExecError::KilledBySignal { stderr } => {
                with_stderr(RemoteError::attempt_failed(message), stderr)
            }
            ExecError::Cancelled => RemoteError::new(FailureKind::Cancelled, message),
            ExecError::UnsupportedKind(_)
            | ExecError::NoRunner(_)
            | ExecError::FunctionNotFound(_)
            | ExecError::Codec(CodecError::Decode(_))
            | ExecError::Codec(CodecError::Unsupported(_)) => {
                RemoteError::new(FailureKind::InvalidSpecification, message)
            }
            ExecError::Spawn(_)
            | ExecError::Io(_)
            | ExecError::Codec(CodecError::Encode(_))
            | ExecError::Function(_) => RemoteError::attempt_failed(message),
        }
    }
}

fn with_stderr(err: RemoteError, stderr: Vec<u8>) -> RemoteError {
    if stderr.is_empty() {
        err
    } else {
        err.with_payload(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_and_stderr_reach_the_remote_error() {
        let err = RemoteError::from(ExecError::NonZeroExit {
            code: 3,
            stderr: b"boom\n".to_vec(),
        });
        assert_eq!(err.kind, FailureKind::AttemptFailed);
        assert_eq!(err.message, "exit code: 3");
        assert_eq!(err.exit_code, Some(3));
        assert_eq!(err.payload.as_deref(), Some(&b"boom\n"[..]));
    }

    #[test]
    fn job_level_problems_are_final() {
        let err = RemoteError::from(ExecError::FunctionNotFound("nope".into()));
        assert_eq!(err.kind, FailureKind::InvalidSpecification);

        let err = RemoteError::from(ExecError::Function("ValueError: x".into()));
        assert_eq!(err.kind, FailureKind::AttemptFailed);
        assert_eq!(err.message, "ValueError: x");
    }
}
