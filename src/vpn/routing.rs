//! Route policy for a connect event
//!
//! Exactly one IPv4 strategy applies: split-include routes when the server
//! pushed any, otherwise whatever the redirect-gateway method asks for.
//! Split-exclude routes are independent of that choice. IPv6 gets either
//! the pushed split-include routes or `2000::/3`; IPv6 split-exclude is not
//! supported.

use crate::config::{Config, RedirectGatewayMethod};
use crate::openconnect::env::{ConnectionContext, SplitRoute};
use crate::vpn::interface::TUNNEL_METRIC;
use crate::vpn::ops::{Network, Operation, RouteOperation};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{error, info};

/// Global unicast range, stands in for an IPv6 default route
pub const IPV6_GLOBAL_UNICAST: (Ipv6Addr, u8) = (Ipv6Addr::new(0x2000, 0, 0, 0, 0, 0, 0, 0), 3);

const HALF_MASK: Ipv4Addr = Ipv4Addr::new(128, 0, 0, 0);

/// Host route that keeps traffic to the VPN server off the tunnel
pub fn gateway_protection_route(
    ctx: &ConnectionContext,
    default_gateway: Option<Ipv4Addr>,
) -> RouteOperation {
    with_next_hop(RouteOperation::add(Network::host(ctx.vpn_gateway)), default_gateway)
}

/// Routes carving split-exclude networks back out to the original gateway
pub fn split_exclude_routes(
    ctx: &ConnectionContext,
    default_gateway: Option<Ipv4Addr>,
) -> Vec<RouteOperation> {
    ctx.split_exclude
        .iter()
        .map(|entry| with_next_hop(RouteOperation::add(split_network(entry)), default_gateway))
        .collect()
}

/// Routes that point at the tunnel's internal gateway
///
/// Empty when the address assignment already installed the default route.
pub fn tunnel_routes(ctx: &ConnectionContext, method: RedirectGatewayMethod) -> Vec<RouteOperation> {
    let via = ctx.internal_gateway();

    if !ctx.split_include.is_empty() {
        return ctx
            .split_include
            .iter()
            .map(|entry| {
                RouteOperation::add(split_network(entry))
                    .via(via)
                    .on(ctx.interface.handle())
            })
            .collect();
    }

    match method {
        RedirectGatewayMethod::InterfaceGateway => vec![],
        RedirectGatewayMethod::LowMetricDefaultRoute => vec![
            RouteOperation::add(Network::v4(Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED))
                .via(via)
                .metric(TUNNEL_METRIC),
        ],
        RedirectGatewayMethod::SplitDefaultPair => vec![
            RouteOperation::add(Network::v4(Ipv4Addr::UNSPECIFIED, HALF_MASK)).via(via),
            RouteOperation::add(Network::v4(HALF_MASK, HALF_MASK)).via(via),
        ],
    }
}

/// IPv6 routes through the tunnel; empty without an IPv6 address
pub fn ipv6_routes(ctx: &ConnectionContext) -> Vec<RouteOperation> {
    if ctx.ip6_address.is_none() {
        return vec![];
    }
    let iface = ctx.interface.handle();

    if ctx.ip6_split_include.is_empty() {
        info!("Setting default IPv6 route through VPN");
        let (network, len) = IPV6_GLOBAL_UNICAST;
        return vec![RouteOperation::add(Network::v6(network, len)).on(iface)];
    }

    ctx.ip6_split_include
        .iter()
        .map(|entry| RouteOperation::add(Network::v6(entry.network, entry.prefix_len)).on(iface))
        .collect()
}

/// The VPN server's host route, if it can be issued
pub fn plan_protection(
    ctx: &ConnectionContext,
    config: &Config,
    default_gateway: Option<Ipv4Addr>,
) -> Option<Operation> {
    if default_gateway.is_none() && config.skip_routes_without_gateway {
        error!(
            "Skipping host route for VPN gateway {}: no pre-existing gateway",
            ctx.vpn_gateway
        );
        return None;
    }
    Some(gateway_protection_route(ctx, default_gateway).into())
}

/// Tunnel, split-exclude and IPv6 routes
pub fn plan_network_routes(
    ctx: &ConnectionContext,
    config: &Config,
    default_gateway: Option<Ipv4Addr>,
) -> Vec<Operation> {
    let mut ops: Vec<Operation> = tunnel_routes(ctx, config.redirect_gateway_method)
        .into_iter()
        .map(Operation::from)
        .collect();

    if default_gateway.is_some() || !config.skip_routes_without_gateway {
        ops.extend(
            split_exclude_routes(ctx, default_gateway)
                .into_iter()
                .map(Operation::from),
        );
    } else if !ctx.split_exclude.is_empty() {
        error!(
            "Skipping {} split-exclude routes: no pre-existing gateway",
            ctx.split_exclude.len()
        );
    }

    ops.extend(ipv6_routes(ctx).into_iter().map(Operation::from));
    ops
}

fn split_network(entry: &SplitRoute) -> Network {
    Network::v4(entry.network, entry.mask)
}

fn with_next_hop(route: RouteOperation, next_hop: Option<Ipv4Addr>) -> RouteOperation {
    match next_hop {
        Some(gw) => route.via(gw),
        None => route,
    }
}
