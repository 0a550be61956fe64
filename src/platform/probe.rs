//! Read-only host probes: pre-existing default gateway and Windows version

use super::Runner;
use regex::Regex;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use tracing::{debug, error};

pub const ROUTE_PRINT_COMMAND: &str = "route print";
pub const VERSION_COMMAND: &str = "cmd /c ver";

/// Default route (`0.0.0.0/0`) or half-default (`0.0.0.0/1`) entry
static DEFAULT_ROUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"0\.0\.0\.0\s+(?:0|128)\.0\.0\.0\s+(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")
        .expect("default route pattern is valid")
});

/// `Microsoft Windows [Version 10.0.19045.3570]` -> `10.0`
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.\d+").expect("version pattern is valid"));

/// Find the next hop of the first default route in `route print` output
pub fn parse_default_gateway(route_table: &str) -> Option<Ipv4Addr> {
    DEFAULT_ROUTE_PATTERN
        .captures_iter(route_table)
        .find_map(|caps| caps[1].parse().ok())
}

/// Look up the gateway the host used before the tunnel came up
///
/// `None` means unknown; callers decide what to do without it.
pub fn discover_default_gateway(runner: &mut Runner<'_>) -> Option<Ipv4Addr> {
    let result = runner.run(ROUTE_PRINT_COMMAND);
    let gateway = parse_default_gateway(&result.output);
    match gateway {
        Some(gw) => debug!("Pre-existing default gateway: {}", gw),
        None => error!("Could not determine the pre-existing default gateway"),
    }
    gateway
}

/// Windows version as reported by `ver`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsVersion {
    Known { major: u32, minor: u32 },
    Unknown,
}

impl WindowsVersion {
    pub fn parse(ver_output: &str) -> Self {
        VERSION_PATTERN
            .captures(ver_output)
            .and_then(|caps| {
                Some(WindowsVersion::Known {
                    major: caps[1].parse().ok()?,
                    minor: caps[2].parse().ok()?,
                })
            })
            .unwrap_or(WindowsVersion::Unknown)
    }

    /// Windows 10 and later reject DNS servers they cannot reach yet
    /// unless `validate=no` is given.
    pub fn needs_dns_validation_override(&self) -> bool {
        matches!(self, WindowsVersion::Known { major, .. } if *major >= 10)
    }
}

impl fmt::Display for WindowsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowsVersion::Known { major, minor } => write!(f, "{}.{}", major, minor),
            WindowsVersion::Unknown => f.write_str("unknown"),
        }
    }
}

pub fn probe_windows_version(runner: &mut Runner<'_>) -> WindowsVersion {
    let result = runner.run(VERSION_COMMAND);
    let version = WindowsVersion::parse(&result.output);
    if version == WindowsVersion::Unknown {
        error!("Could not determine Windows version from {:?}", result.output.trim());
    }
    version
}
