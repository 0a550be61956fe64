//! Command execution and host probes
//!
//! Every OS mutation is a textual command handed to a [`CommandExecutor`].
//! A non-zero exit is a normal result, never an error: the [`Runner`] logs
//! it, adds it to the event's [`RunReport`] and moves on.

pub mod probe;

#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
mod unix;

use tracing::{debug, info, warn};

/// Exit status reported when a command could not be started at all
pub const SPAWN_FAILURE_STATUS: i32 = 1;

/// Combined stdout/stderr and exit status of one command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one textual OS command and reports what happened
pub trait CommandExecutor {
    fn execute(&self, command: &str) -> CommandOutput;
}

/// Executes commands through the host shell
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, command: &str) -> CommandOutput {
        #[cfg(windows)]
        let result = windows::run_shell(command);

        #[cfg(not(windows))]
        let result = unix::run_shell(command);

        match result {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                CommandOutput {
                    output: text,
                    // Killed by a signal: no code, still a failure
                    exit_code: output.status.code().unwrap_or(SPAWN_FAILURE_STATUS),
                }
            }
            Err(e) => CommandOutput {
                output: format!("failed to start command: {}", e),
                exit_code: SPAWN_FAILURE_STATUS,
            },
        }
    }
}

/// Aggregate result of all commands issued for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    pub commands: usize,
    pub failures: usize,
    /// Sum of every exit code, each taken as unsigned so that negative
    /// (NTSTATUS-style) codes cannot cancel out other failures
    pub exit_status: u64,
}

impl RunReport {
    pub fn record(&mut self, output: &CommandOutput) {
        self.commands += 1;
        if !output.success() {
            self.failures += 1;
        }
        self.exit_status = self
            .exit_status
            .saturating_add(u64::from(output.exit_code as u32));
    }

    /// Process exit status for this report
    ///
    /// A failing sum never maps to 0. Windows reports sums that fit in a
    /// positive `i32` as-is and saturates the rest. Other hosts only keep
    /// the low 8 bits, so anything above 255 is reported as 1.
    pub fn process_exit_code(&self) -> i32 {
        match self.exit_status {
            0 => 0,
            n if cfg!(windows) => i32::try_from(n).unwrap_or(i32::MAX),
            n @ 1..=255 => n as i32,
            _ => 1,
        }
    }
}

/// Sequential, best-effort command runner for one event
pub struct Runner<'a> {
    executor: &'a dyn CommandExecutor,
    report: RunReport,
}

impl<'a> Runner<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            report: RunReport::default(),
        }
    }

    /// Run one command, record its exit status and return its output
    pub fn run(&mut self, command: &str) -> CommandOutput {
        debug!("Running: {}", command);
        let result = self.executor.execute(command);
        if !result.success() {
            warn!(
                "Command failed (exit {}): {}: {}",
                result.exit_code,
                command,
                result.output.trim()
            );
        }
        self.report.record(&result);
        result
    }

    /// Run every command in order, continuing past failures
    pub fn run_all<I, C>(&mut self, commands: I)
    where
        I: IntoIterator<Item = C>,
        C: std::fmt::Display,
    {
        for command in commands {
            self.run(&command.to_string());
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn finish(self) -> RunReport {
        info!(
            "Ran {} commands, {} failed, accumulated status {}",
            self.report.commands, self.report.failures, self.report.exit_status
        );
        self.report
    }
}
