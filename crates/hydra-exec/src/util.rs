use tokio::process::{Child, Command};

cfg_if::cfg_if! {
    if #[cfg(target_family = "windows")] {
        const SHELL: &str = "cmd";
        const SHELL_FLAG: &str = "/C";
    } else {
        const SHELL: &str = "sh";
        const SHELL_FLAG: &str = "-c";
    }
}

/// `sh -c <script>` on unix, `cmd /C <script>` on windows.
pub fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new(SHELL);
    cmd.arg(SHELL_FLAG).arg(script);
    cmd
}

cfg_if::cfg_if! {
    if #[cfg(target_family = "unix")] {
        /// SIGTERM first, then a hard kill.
        pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
            if let Some(id) = child.id() {
                // SAFETY: kill(2) on the pid of a child we still own.
                unsafe {
                    libc::kill(id as libc::pid_t, libc::SIGTERM);
                }
            }
            child.kill().await
        }
    } else {
        pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
            child.kill().await
        }
    }
}
