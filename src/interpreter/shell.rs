//! Shell resolution and subprocess handling

use super::ExecError;
use crate::ast::Shell;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Map a shell to its executable and the arguments preceding the command line.
pub(super) fn shell_args(shell: Shell) -> (&'static str, &'static [&'static str]) {
    match shell {
        Shell::Cmd => ("cmd", &["/C"]),
        Shell::Powershell => ("powershell", &["-NoProfile", "-Command"]),
        Shell::Pwsh => ("pwsh", &["-NoProfile", "-Command"]),
        Shell::Sh => ("sh", &["-c"]),
        Shell::Bash => ("bash", &["-c"]),
    }
}

/// Find the shell's executable on `PATH`.
pub(super) fn locate(shell: Shell) -> Result<PathBuf, ExecError> {
    let (program, _) = shell_args(shell);
    which::which(program).map_err(|source| ExecError::ShellNotFound { shell, source })
}

/// Build the command running `line` under `shell`, with inherited standard streams.
pub(super) fn command(program: &Path, shell: Shell, line: &str) -> Command {
    let (_, args) = shell_args(shell);
    let mut cmd = Command::new(program);
    cmd.args(args);
    push_line(&mut cmd, shell, line);
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}

#[cfg(windows)]
fn push_line(cmd: &mut Command, shell: Shell, line: &str) {
    use std::os::windows::process::CommandExt;
    // cmd.exe does its own parsing of the rest of the command line.
    if shell == Shell::Cmd {
        cmd.raw_arg(line);
    } else {
        cmd.arg(line);
    }
}

#[cfg(not(windows))]
fn push_line(cmd: &mut Command, _shell: Shell, line: &str) {
    cmd.arg(line);
}

/// Exit code of a finished process; signal deaths map to `128 + signal`.
pub(super) fn status_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}

/// Owns a running child; kills and reaps it if dropped before it exited.
pub(super) struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub(super) fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    pub(super) fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    pub(super) fn kill(&mut self) {
        if self.reaped {
            return;
        }
        // The child may already have exited; reaping is what matters.
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_args() {
        assert_eq!(shell_args(Shell::Cmd), ("cmd", &["/C"][..]));
        assert_eq!(shell_args(Shell::Sh), ("sh", &["-c"][..]));
        assert_eq!(
            shell_args(Shell::Pwsh),
            ("pwsh", &["-NoProfile", "-Command"][..])
        );
    }

    #[test]
    fn test_command_arguments() {
        let cmd = command(Path::new("/bin/sh"), Shell::Sh, "echo hi");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec!["-c", "echo hi"]);
        assert_eq!(cmd.get_program(), "/bin/sh");
    }

    #[cfg(unix)]
    #[test]
    fn test_guard_kills_on_drop() {
        let child = Command::new("sh").args(["-c", "sleep 30"]).spawn();
        let Ok(child) = child else { return };
        let pid = child.id();
        drop(ChildGuard::new(child));
        // The process must be gone (reaped) once the guard is dropped.
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .is_ok_and(|s| s.success());
        assert!(!alive);
    }
}
