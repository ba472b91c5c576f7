use crate::{FunctionCall, JobKind, JobSpec, MemorySize, Resources, SpecError};

/// Defaults applied to specs that do not set resources or retries explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefaults {
    pub cpu: u32,
    pub memory: MemorySize,
    pub max_retries: u32,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            cpu: 1,
            memory: MemorySize::default(),
            max_retries: JobSpec::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Fluent builder for [`JobSpec`].
///
/// Construction is pure: nothing is validated until [`JobSpecBuilder::build`],
/// which either returns a complete spec or the first violated constraint.
#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    kind: JobKind,
    cpu: Option<u32>,
    memory: Option<MemoryInput>,
    max_retries: Option<u32>,
    defaults: JobDefaults,
}

#[derive(Debug, Clone)]
enum MemoryInput {
    Parsed(MemorySize),
    Raw(String),
}

impl JobSpecBuilder {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            cpu: None,
            memory: None,
            max_retries: None,
            defaults: JobDefaults::default(),
        }
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self::new(JobKind::Command {
            command: command.into(),
        })
    }

    pub fn function(call: FunctionCall) -> Self {
        Self::new(JobKind::Function(call))
    }

    /// Replace the defaults used for unset fields.
    pub fn defaults(mut self, defaults: JobDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Memory as a human-readable size; parsed at build time.
    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(MemoryInput::Raw(memory.into()));
        self
    }

    pub fn memory_size(mut self, memory: MemorySize) -> Self {
        self.memory = Some(MemoryInput::Parsed(memory));
        self
    }

    pub fn resources(self, resources: Resources) -> Self {
        self.cpu(resources.cpu()).memory_size(resources.memory())
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn build(self) -> Result<JobSpec, SpecError> {
        let memory = match self.memory {
            Some(MemoryInput::Parsed(size)) => size,
            Some(MemoryInput::Raw(raw)) => MemorySize::parse(&raw)?,
            None => self.defaults.memory,
        };
        let resources = Resources::new(self.cpu.unwrap_or(self.defaults.cpu), memory)?;
        let max_retries = self.max_retries.unwrap_or(self.defaults.max_retries);

        JobSpec::validated(self.kind, resources, max_retries)
    }
}

/// Spec for a shell command with default resources and retries.
pub fn build_command(command: impl Into<String>) -> Result<JobSpec, SpecError> {
    JobSpecBuilder::command(command).build()
}

/// Spec for a function call with explicit resources and retry budget.
///
/// `args` and `kwargs` are already encoded with the default codec.
pub fn build_function(
    callable: impl Into<String>,
    args: Vec<u8>,
    kwargs: Vec<u8>,
    resources: Resources,
    max_retries: u32,
) -> Result<JobSpec, SpecError> {
    JobSpecBuilder::function(FunctionCall::new(callable, args, kwargs))
        .resources(resources)
        .max_retries(max_retries)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_uses_defaults() {
        let spec = build_command("echo hi").unwrap();

        assert!(matches!(spec.kind(), JobKind::Command { command } if command == "echo hi"));
        assert_eq!(spec.resources().cpu(), 1);
        assert_eq!(spec.resources().memory().to_string(), "512MB");
        assert_eq!(spec.max_retries(), 3);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert_eq!(build_command("").unwrap_err(), SpecError::EmptyCommand);
        assert_eq!(build_command(" \t ").unwrap_err(), SpecError::EmptyCommand);
    }

    #[test]
    fn function_keeps_supplied_values() {
        let resources = Resources::parse(4, "4GB").unwrap();
        let args = br#"["s3://x"]"#.to_vec();
        let spec =
            build_function("analyze_data", args.clone(), b"{}".to_vec(), resources, 5).unwrap();

        assert_eq!(spec.resources(), &resources);
        assert_eq!(spec.max_retries(), 5);
        match spec.kind() {
            JobKind::Function(call) => {
                assert_eq!(call.callable, "analyze_data");
                assert_eq!(call.args, args);
                assert_eq!(call.codec, "json");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn empty_callable_is_rejected() {
        let err = build_function("", vec![], vec![], Resources::default(), 0).unwrap_err();
        assert_eq!(err, SpecError::EmptyCallable);
    }

    #[test]
    fn empty_codec_is_rejected() {
        let call = FunctionCall::new("f", vec![], vec![]).with_codec(" ");
        let err = JobSpecBuilder::function(call).build().unwrap_err();
        assert_eq!(err, SpecError::EmptyCodec);
    }

    #[test]
    fn invalid_resources_fail_the_whole_build() {
        let err = JobSpecBuilder::command("true").cpu(0).build().unwrap_err();
        assert_eq!(err, SpecError::InvalidCpu(0));

        let err = JobSpecBuilder::command("true").memory("0GB").build().unwrap_err();
        assert!(matches!(err, SpecError::InvalidMemory { .. }));
    }

    #[test]
    fn custom_defaults_apply_to_unset_fields() {
        let defaults = JobDefaults {
            cpu: 2,
            memory: MemorySize::parse("1GB").unwrap(),
            max_retries: 7,
        };
        let spec = JobSpecBuilder::command("true")
            .defaults(defaults)
            .max_retries(0)
            .build()
            .unwrap();

        assert_eq!(spec.resources().cpu(), 2);
        assert_eq!(spec.resources().memory().to_string(), "1GB");
        assert_eq!(spec.max_retries(), 0);
    }

    #[test]
    fn building_does_not_touch_inputs() {
        let resources = Resources::parse(3, "2GB").unwrap();
        let before = resources;
        let _ = build_function("f", vec![1, 2], vec![], resources, 1).unwrap();
        assert_eq!(resources, before);
    }
}
