use serde::{Deserialize, Serialize};

/// Execution state of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptState {
    /// Attempt record exists but nothing was sent yet.
    Pending,
    /// Attempt was accepted by the control plane.
    Submitted,
    /// Attempt is executing on a worker.
    Running,
    /// Attempt completed successfully.
    Succeeded,
    /// Attempt failed (remote error, timeout, cancellation or lost control plane).
    Failed,
}

impl AttemptState {
    /// Returns `true` for states that never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::Failed)
    }

    /// Returns `true` if the attempt is still in flight.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Pending => "pending",
            AttemptState::Submitted => "submitted",
            AttemptState::Running => "running",
            AttemptState::Succeeded => "succeeded",
            AttemptState::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(AttemptState::Succeeded.is_terminal());
        assert!(AttemptState::Failed.is_terminal());

        assert!(!AttemptState::Pending.is_terminal());
        assert!(!AttemptState::Submitted.is_terminal());
        assert!(!AttemptState::Running.is_terminal());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AttemptState::Running).unwrap();
        assert_eq!(json, r#""running""#);

        let back: AttemptState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttemptState::Running);
    }
}
