mod job_id;
pub use job_id::JobId;

mod memory;
pub use memory::MemorySize;

mod resources;
pub use resources::Resources;

mod attempt_state;
pub use attempt_state::AttemptState;

mod failure;
pub use failure::{FailureKind, JobFailure, RemoteError};

mod job_attempt;
pub use job_attempt::JobAttempt;

mod outcome;
pub use outcome::{JobOutcome, OutcomeStatus};

mod time_serde;

/// Attempt number of a job, starting at 1.
pub type AttemptNumber = u32;

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;
