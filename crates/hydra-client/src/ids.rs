use hydra_model::JobId;
use uuid::Uuid;

/// Source of job ids issued without the control plane.
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> JobId;
}

/// Random ids shaped `<prefix>-<uuid-v4 simple>`.
#[derive(Debug, Clone)]
pub struct UuidIdGenerator {
    prefix: String,
}

impl UuidIdGenerator {
    pub const DEFAULT_PREFIX: &'static str = "job";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Generator for ids issued locally while the control plane is unreachable.
    pub fn local() -> Self {
        Self::new("job-local")
    }
}

impl Default for UuidIdGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> JobId {
        JobId::new(format!("{}-{}", self.prefix, Uuid::new_v4().simple()))
    }
}
