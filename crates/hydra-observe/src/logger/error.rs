use thiserror::Error;

/// Failures of [`crate::logger_init`] and of parsing logger settings.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?} in HYDRA_LOG_FORMAT (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("journald output needs the `journald` feature on a Linux host")]
    JournaldUnavailable,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("cannot connect to journald: {0}")]
    JournaldConnect(String),
    #[error("invalid HYDRA_LOG filter {0:?}")]
    InvalidLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_setting() {
        let format = LoggerError::InvalidFormat("yaml".into()).to_string();
        assert!(format.contains("\"yaml\"") && format.contains("HYDRA_LOG_FORMAT"));

        let level = LoggerError::InvalidLevel("loud".into()).to_string();
        assert_eq!(level, "invalid HYDRA_LOG filter \"loud\"");
    }
}
