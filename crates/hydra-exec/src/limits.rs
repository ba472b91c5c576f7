//! POSIX rlimits for shell attempts.
//!
//! On unix the limits are applied in a `pre_exec` hook, after `fork()` and before `execve()`,
//! so the command never runs unrestricted. Elsewhere they are ignored with a warning.
use hydra_model::Resources;
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessLimits {
    /// `RLIMIT_AS`, in bytes.
    pub max_address_space_bytes: Option<u64>,
    /// `RLIMIT_NOFILE`.
    pub max_open_files: Option<u64>,
    /// `RLIMIT_CORE = 0`.
    pub disable_core_dumps: bool,
}

impl ProcessLimits {
    /// Address space capped at the job's requested memory.
    pub fn from_resources(resources: &Resources) -> Self {
        Self {
            max_address_space_bytes: Some(resources.memory().bytes()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_address_space_bytes.is_none()
            && self.max_open_files.is_none()
            && !self.disable_core_dumps
    }
}

pub fn attach_limits(cmd: &mut Command, limits: &ProcessLimits) {
    if limits.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        unix_impl::attach_limits(cmd, limits);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
        tracing::warn!(?limits, "process limits are not supported on this platform; ignoring");
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::ProcessLimits;

    pub fn attach_limits(cmd: &mut Command, limits: &ProcessLimits) {
        let address_space = limits.max_address_space_bytes;
        let open_files = limits.max_open_files;
        let no_core = limits.disable_core_dumps;

        // SAFETY: the hook only calls setrlimit, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(bytes) = address_space {
                    check(libc::setrlimit(libc::RLIMIT_AS, &rlimit(bytes)))?;
                }
                if let Some(files) = open_files {
                    check(libc::setrlimit(libc::RLIMIT_NOFILE, &rlimit(files)))?;
                }
                if no_core {
                    check(libc::setrlimit(libc::RLIMIT_CORE, &rlimit(0)))?;
                }
                Ok(())
            });
        }
    }

    fn rlimit(value: u64) -> libc::rlimit {
        libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        }
    }

    fn check(rc: libc::c_int) -> io::Result<()> {
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_follow_requested_memory() {
        let resources = Resources::parse(2, "256MB").unwrap();
        let limits = ProcessLimits::from_resources(&resources);
        assert_eq!(limits.max_address_space_bytes, Some(256_000_000));
        assert!(!limits.is_empty());
        assert!(ProcessLimits::default().is_empty());
    }
}
