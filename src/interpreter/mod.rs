//! Label execution engine
//!
//! Runs a [`ResolvedLabel`]'s command lines one by one under the wakefile's shell.
//! Every reference in the body is substituted before the first line starts, so a
//! doomed run never leaves side effects from earlier lines.

mod shell;
mod substitution;

use crate::ast::{Model, Shell, Variables};
use crate::binder::ResolvedLabel;
use shell::ChildGuard;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use substitution::{Scope, substitute};
use tracing::{debug, info, warn};

/// Process environment handed to the engine.
pub type Environ = BTreeMap<String, String>;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exit code reported for an interrupted run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
/// Exit code reported when a line exceeds its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code reported when the shell cannot be started.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("unresolved reference `$${name}` in command {}", .line + 1)]
    UnresolvedReference { name: String, line: usize },

    #[error("command {} exited with code {code}", .line + 1)]
    SubprocessFailure { line: usize, code: i32 },

    #[error("interrupted while running command {}", .line + 1)]
    Interrupted { line: usize },

    #[error("command {} timed out after {}s", .line + 1, .after.as_secs_f64())]
    TimedOut { line: usize, after: Duration },

    #[error("shell `{shell}` was not found: {source}")]
    ShellNotFound {
        shell: Shell,
        #[source]
        source: which::Error,
    },

    #[error("failed to run command {}: {source}", .line + 1)]
    Spawn {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::SubprocessFailure { code, .. } => *code,
            ExecError::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
            ExecError::TimedOut { .. } => TIMEOUT_EXIT_CODE,
            ExecError::ShellNotFound { .. } | ExecError::Spawn { .. } => NOT_FOUND_EXIT_CODE,
            ExecError::UnresolvedReference { .. } => 1,
        }
    }
}

/// Progress of a single run. `line` indexes are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Substituting,
    Running(usize),
    Succeeded,
    Failed { line: usize, code: i32 },
    SubstitutionFailed,
}

pub struct Engine<'a> {
    shell: Shell,
    variables: &'a Variables,
    interrupt: Option<&'a AtomicBool>,
    timeout: Option<Duration>,
    state: RunState,
}

impl<'a> Engine<'a> {
    #[must_use]
    pub fn new(model: &'a Model) -> Self {
        Self {
            shell: model.shell,
            variables: &model.variables,
            interrupt: None,
            timeout: None,
            state: RunState::Pending,
        }
    }

    /// Abort the run, killing the current child, once `flag` becomes `true`.
    #[must_use]
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Kill any line still running after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Substitute every line of the body without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::UnresolvedReference`] for the first reference that
    /// names no param, flag, variable or environment entry, or an unbound param.
    pub fn plan(&self, label: &ResolvedLabel, environ: &Environ) -> Result<Vec<String>, ExecError> {
        let scope = Scope {
            label,
            variables: self.variables,
            environ,
        };
        label
            .body
            .iter()
            .enumerate()
            .map(|(index, line)| {
                substitute(line, &scope)
                    .map_err(|name| ExecError::UnresolvedReference { name, line: index })
            })
            .collect()
    }

    /// Run the label's body, stopping at the first failing line.
    ///
    /// The children inherit `environ` plus every wakefile variable, and the
    /// standard streams of this process.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - a reference cannot be substituted (nothing has run yet)
    /// - the shell cannot be found or started
    /// - a line exits non-zero, is interrupted, or times out
    pub fn run(&mut self, label: &ResolvedLabel, environ: &Environ) -> Result<(), ExecError> {
        self.state = RunState::Substituting;
        let lines = match self.plan(label, environ) {
            Ok(lines) => lines,
            Err(err) => {
                self.state = RunState::SubstitutionFailed;
                return Err(err);
            }
        };

        let result = self.run_lines(&lines, environ);
        self.state = match &result {
            Ok(()) => RunState::Succeeded,
            Err(err) => RunState::Failed {
                line: failed_line(err),
                code: err.exit_code(),
            },
        };
        result
    }

    fn run_lines(&mut self, lines: &[String], environ: &Environ) -> Result<(), ExecError> {
        let program = shell::locate(self.shell)?;
        debug!(shell = %self.shell, program = %program.display(), "shell located");

        let mut env = environ.clone();
        for (name, value) in self.variables {
            env.insert(name.clone(), value.render());
        }

        for (index, line) in lines.iter().enumerate() {
            if self.interrupted() {
                return Err(ExecError::Interrupted { line: index });
            }
            self.state = RunState::Running(index);
            info!(line = index, command = %line, "running");
            self.run_line(&program, index, line, &env)?;
        }
        Ok(())
    }

    fn run_line(
        &self,
        program: &Path,
        index: usize,
        line: &str,
        env: &Environ,
    ) -> Result<(), ExecError> {
        let mut command = shell::command(program, self.shell, line);
        command.env_clear().envs(env);
        let child = command.spawn().map_err(|source| ExecError::Spawn {
            line: index,
            source,
        })?;
        let mut child = ChildGuard::new(child);
        let started = Instant::now();

        loop {
            let status = child.try_wait().map_err(|source| ExecError::Spawn {
                line: index,
                source,
            })?;
            if let Some(status) = status {
                if status.success() {
                    return Ok(());
                }
                if self.interrupted() {
                    return Err(ExecError::Interrupted { line: index });
                }
                let code = shell::status_code(status);
                warn!(line = index, code, "command failed");
                return Err(ExecError::SubprocessFailure { line: index, code });
            }
            if self.interrupted() {
                child.kill();
                return Err(ExecError::Interrupted { line: index });
            }
            if let Some(limit) = self.timeout
                && started.elapsed() >= limit
            {
                child.kill();
                return Err(ExecError::TimedOut {
                    line: index,
                    after: limit,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

fn failed_line(err: &ExecError) -> usize {
    match err {
        ExecError::UnresolvedReference { line, .. }
        | ExecError::SubprocessFailure { line, .. }
        | ExecError::Interrupted { line }
        | ExecError::TimedOut { line, .. }
        | ExecError::Spawn { line, .. } => *line,
        ExecError::ShellNotFound { .. } => 0,
    }
}
