//! OpenConnect script mode handler
//!
//! One invocation handles exactly one event:
//!
//! 1. Parse the `reason` and the connection environment
//! 2. On connect: probe gateway and OS version → plan interface and
//!    routes → run the plan
//! 3. On disconnect: plan the teardown → run it
//!
//! # Error Handling
//!
//! A failing command never stops the plan. Every exit status is added to
//! the [`RunReport`], and its sum becomes the process exit status.

use crate::config::Config;
use crate::openconnect::env::{ConnectionContext, EnvError, Reason, reason_from_env_fn};
use crate::platform::probe::{discover_default_gateway, probe_windows_version};
use crate::platform::{CommandExecutor, RunReport, Runner};
use crate::vpn::{Operation, plan_connect, plan_teardown};
use serde::Serialize;
use std::env;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Environment parsing failed: {0}")]
    EnvError(#[from] EnvError),
}

/// Result of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    /// `None` when the reason was not one we act on
    pub reason: Option<Reason>,
    pub report: RunReport,
}

impl EventOutcome {
    pub fn exit_code(&self) -> i32 {
        self.report.process_exit_code()
    }
}

/// Main entry point for script mode
///
/// Reads the process environment and runs the event's plan through
/// `executor`.
pub fn handle_script_mode(
    config: &Config,
    executor: &dyn CommandExecutor,
) -> Result<EventOutcome, ScriptError> {
    handle_event(config, executor, |key| env::var(key))
}

/// Dispatch one event using a custom environment getter
pub fn handle_event<F>(
    config: &Config,
    executor: &dyn CommandExecutor,
    get_var: F,
) -> Result<EventOutcome, ScriptError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let reason = match reason_from_env_fn(&get_var) {
        Ok(reason) => reason,
        Err(EnvError::UnknownReason(other)) => {
            warn!("Ignoring unhandled reason {:?}", other);
            return Ok(EventOutcome {
                reason: None,
                report: RunReport::default(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    info!("Script mode: reason={:?}", reason);

    let report = match reason {
        Reason::PreInit => {
            debug!("Pre-init phase, nothing to do");
            RunReport::default()
        }
        Reason::Connect => {
            let ctx = ConnectionContext::from_env_fn(&get_var)?;
            handle_connect(&ctx, config, executor)
        }
        Reason::Disconnect => {
            let ctx = ConnectionContext::from_env_fn(&get_var)?;
            handle_disconnect(&ctx, executor)
        }
    };

    Ok(EventOutcome {
        reason: Some(reason),
        report,
    })
}

/// Handle VPN connect event
///
/// Probes run first since the plan depends on them; their exit statuses
/// count towards the event's total like any other command.
pub fn handle_connect(
    ctx: &ConnectionContext,
    config: &Config,
    executor: &dyn CommandExecutor,
) -> RunReport {
    let mut runner = Runner::new(executor);

    let default_gateway = discover_default_gateway(&mut runner);
    let version = probe_windows_version(&mut runner);

    info!("Windows version: {}", version);
    info!("VPN gateway: {}", ctx.vpn_gateway);
    info!("Internal address: {}", ctx.ip4_address);
    info!("Internal netmask: {}", ctx.ip4_netmask);
    info!("Internal gateway: {}", ctx.internal_gateway());
    info!("Interface: {}", ctx.interface);
    if let Some(mtu) = ctx.ip4_mtu {
        info!("MTU: {}", mtu);
    }

    let plan = plan_connect(ctx, config, default_gateway, version);
    info!("Configuring interface {} ({} operations)", ctx.interface, plan.len());
    runner.run_all(&plan);

    if let Some(banner) = &ctx.banner {
        info!("--------------------------------------------------");
        for line in banner.lines() {
            info!("{}", line);
        }
        info!("--------------------------------------------------");
    }

    runner.finish()
}

/// Operations planned for one event, without running any of them
#[derive(Debug, Clone, Serialize)]
pub struct EventPlan {
    pub reason: Option<&'static str>,
    pub operations: Vec<Operation>,
}

/// Plan the event described by `get_var` without changing the host
///
/// Connect still runs the read-only probes through `executor`, since the
/// plan depends on their answers.
pub fn plan_event<F>(
    config: &Config,
    executor: &dyn CommandExecutor,
    get_var: F,
) -> Result<EventPlan, ScriptError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let reason = match reason_from_env_fn(&get_var) {
        Ok(reason) => reason,
        Err(EnvError::UnknownReason(_)) => {
            return Ok(EventPlan {
                reason: None,
                operations: vec![],
            });
        }
        Err(e) => return Err(e.into()),
    };

    let operations = match reason {
        Reason::PreInit => vec![],
        Reason::Connect => {
            let ctx = ConnectionContext::from_env_fn(&get_var)?;
            let mut runner = Runner::new(executor);
            let default_gateway = discover_default_gateway(&mut runner);
            let version = probe_windows_version(&mut runner);
            plan_connect(&ctx, config, default_gateway, version)
        }
        Reason::Disconnect => plan_teardown(&ConnectionContext::from_env_fn(&get_var)?),
    };

    Ok(EventPlan {
        reason: Some(reason.as_str()),
        operations,
    })
}

/// Handle VPN disconnect event
pub fn handle_disconnect(ctx: &ConnectionContext, executor: &dyn CommandExecutor) -> RunReport {
    info!("Disconnecting: interface={}", ctx.interface);
    let mut runner = Runner::new(executor);
    runner.run_all(&plan_teardown(ctx));
    runner.finish()
}
