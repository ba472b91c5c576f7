mod kind;
pub use kind::{FunctionCall, JobKind};

mod job_spec;
pub use job_spec::JobSpec;

mod builder;
pub use builder::{JobDefaults, JobSpecBuilder, build_command, build_function};
