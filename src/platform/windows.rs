//! Windows command execution

use std::io;
use std::process::{Command, Output};

/// Run a command line through `cmd /C`
///
/// netsh and route are console programs, so the command text is passed
/// as-is and the shell handles quoting.
pub fn run_shell(command: &str) -> io::Result<Output> {
    Command::new("cmd").args(["/C", command]).output()
}
