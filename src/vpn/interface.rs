//! Tunnel interface configuration: MTU, metric, addresses, WINS and DNS

use crate::config::RedirectGatewayMethod;
use crate::openconnect::env::ConnectionContext;
use crate::platform::probe::WindowsVersion;
use crate::vpn::ops::{Family, Network, Operation, RouteOperation};

/// Metric used for the tunnel's own default route
pub const TUNNEL_METRIC: u32 = 1;

/// Plan the interface configuration for a connect event
///
/// Order matters: the interface metric must be set before an address with
/// a metric-1 gateway is assigned, and WINS/DNS lists are cleared before
/// servers are added.
pub fn plan_interface(
    ctx: &ConnectionContext,
    method: RedirectGatewayMethod,
    version: WindowsVersion,
) -> Vec<Operation> {
    let iface = ctx.interface.handle();
    let mut ops = Vec::new();

    if let Some(mtu) = ctx.ip4_mtu {
        ops.push(Operation::SetMtu {
            family: Family::Ipv4,
            interface: iface.to_string(),
            mtu,
        });
        if ctx.ip6_address.is_some() {
            ops.push(Operation::SetMtu {
                family: Family::Ipv6,
                interface: iface.to_string(),
                mtu,
            });
        }
    }

    let split = !ctx.split_include.is_empty();

    // Some Windows versions refuse a metric-1 route on an interface
    // whose own metric is higher.
    if !split && method != RedirectGatewayMethod::SplitDefaultPair {
        ops.push(Operation::SetInterfaceMetric {
            interface: iface.to_string(),
            metric: TUNNEL_METRIC,
        });
    }

    let gateway = if split || method != RedirectGatewayMethod::InterfaceGateway {
        None
    } else {
        Some((ctx.internal_gateway(), TUNNEL_METRIC))
    };
    ops.push(Operation::SetAddress {
        interface: iface.to_string(),
        address: ctx.ip4_address,
        netmask: ctx.ip4_netmask,
        gateway,
    });

    // Cleared even when no servers are pushed, so a reused interface never
    // keeps the previous session's resolvers.
    ops.push(Operation::ClearWins {
        interface: iface.to_string(),
    });
    ops.extend(ctx.wins_servers.iter().enumerate().map(|(i, server)| {
        Operation::AddWins {
            interface: iface.to_string(),
            server: *server,
            index: i + 1,
        }
    }));

    for family in [Family::Ipv4, Family::Ipv6] {
        ops.push(Operation::ClearDns {
            family,
            interface: iface.to_string(),
        });
    }
    let skip_validation = version.needs_dns_validation_override();
    ops.extend(ctx.dns_servers.iter().enumerate().map(|(i, server)| {
        Operation::AddDns {
            family: Family::of(server),
            interface: iface.to_string(),
            server: *server,
            index: i + 1,
            skip_validation,
        }
    }));

    if let Some(address) = ctx.ip6_address {
        ops.push(Operation::SetIpv6Address {
            interface: iface.to_string(),
            address,
        });
        if let Some(prefix) = ctx.ip6_netmask.filter(|p| !p.is_host()) {
            ops.push(
                RouteOperation::add(Network::v6(prefix.address, prefix.prefix_len))
                    .on(iface)
                    .into(),
            );
        }
    }

    ops
}
