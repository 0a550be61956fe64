//! Network configuration planning
//!
//! Planners are pure: they turn a `ConnectionContext` plus probe
//! results into an ordered list of [`Operation`]s and never touch the OS.

pub mod interface;
pub mod ops;
pub mod routing;
pub mod teardown;

pub use interface::plan_interface;
pub use ops::{Family, Network, Operation, RouteAction, RouteOperation};
pub use routing::{plan_network_routes, plan_protection};
pub use teardown::plan_teardown;

use crate::config::Config;
use crate::openconnect::env::ConnectionContext;
use crate::platform::probe::WindowsVersion;
use std::net::Ipv4Addr;

/// The full connect plan
///
/// The VPN server's host route leads so the tunnel never carries the
/// tunnel's own traffic, then the interface is configured, then the
/// routes that depend on its address.
pub fn plan_connect(
    ctx: &ConnectionContext,
    config: &Config,
    default_gateway: Option<Ipv4Addr>,
    version: WindowsVersion,
) -> Vec<Operation> {
    let mut plan: Vec<Operation> = plan_protection(ctx, config, default_gateway)
        .into_iter()
        .collect();
    plan.extend(plan_interface(ctx, config.redirect_gateway_method, version));
    plan.extend(plan_network_routes(ctx, config, default_gateway));
    plan
}
