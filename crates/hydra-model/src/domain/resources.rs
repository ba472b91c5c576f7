use serde::{Deserialize, Serialize};

use crate::{MemorySize, SpecError};

/// Resources requested for every attempt of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// Number of CPUs, at least 1.
    cpu: u32,
    /// Memory reservation.
    memory: MemorySize,
}

impl Resources {
    pub fn new(cpu: u32, memory: MemorySize) -> Result<Self, SpecError> {
        if cpu == 0 {
            return Err(SpecError::InvalidCpu(cpu));
        }
        Ok(Self { cpu, memory })
    }

    /// Build from a cpu count and a human-readable memory size such as `"4GB"`.
    pub fn parse(cpu: u32, memory: &str) -> Result<Self, SpecError> {
        Self::new(cpu, MemorySize::parse(memory)?)
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    pub fn memory(&self) -> MemorySize {
        self.memory
    }
}

impl Default for Resources {
    /// One cpu and 512MB.
    fn default() -> Self {
        Self {
            cpu: 1,
            memory: MemorySize::default(),
        }
    }
}
