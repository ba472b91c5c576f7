use serde::{Deserialize, Serialize};

use crate::{JobKind, JobSpecBuilder, Resources, SpecError};

/// Immutable description of a unit of work.
///
/// Only obtainable through [`JobSpecBuilder`] (or deserialization, which re-validates),
/// so every value in circulation satisfies the construction constraints.
/// Retries reuse the same spec.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawJobSpec")]
pub struct JobSpec {
    kind: JobKind,
    resources: Resources,
    max_retries: u32,
}

impl JobSpec {
    /// Default retry budget.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub(crate) fn validated(
        kind: JobKind,
        resources: Resources,
        max_retries: u32,
    ) -> Result<Self, SpecError> {
        match &kind {
            JobKind::Command { command } if command.trim().is_empty() => {
                return Err(SpecError::EmptyCommand);
            }
            JobKind::Function(call) if call.callable.trim().is_empty() => {
                return Err(SpecError::EmptyCallable);
            }
            JobKind::Function(call) if call.codec.trim().is_empty() => {
                return Err(SpecError::EmptyCodec);
            }
            _ => {}
        }
        if resources.cpu() == 0 {
            return Err(SpecError::InvalidCpu(0));
        }

        Ok(Self {
            kind,
            resources,
            max_retries,
        })
    }

    pub fn builder(kind: JobKind) -> JobSpecBuilder {
        JobSpecBuilder::new(kind)
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total number of attempts the retry budget allows (`max_retries + 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobSpec {
    kind: JobKind,
    #[serde(default)]
    resources: Resources,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

fn default_max_retries() -> u32 {
    JobSpec::DEFAULT_MAX_RETRIES
}

impl TryFrom<RawJobSpec> for JobSpec {
    type Error = SpecError;

    fn try_from(raw: RawJobSpec) -> Result<Self, Self::Error> {
        JobSpec::validated(raw.kind, raw.resources, raw.max_retries)
    }
}
