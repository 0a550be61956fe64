//! POSIX command execution
//!
//! The planned commands target Windows; this backend exists so the
//! binary can be exercised with `plan` and wrapper scripts elsewhere.

use std::io;
use std::process::{Command, Output};

pub fn run_shell(command: &str) -> io::Result<Output> {
    Command::new("sh").args(["-c", command]).output()
}
