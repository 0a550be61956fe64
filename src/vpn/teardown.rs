//! Disconnect cleanup
//!
//! Nothing is persisted between events, so teardown is planned from the
//! environment the client passes again at disconnect. Split-include and
//! IPv6 tunnel routes are not deleted: they are scoped to the interface
//! and go away with its address. WINS and DNS lists are left alone.

use crate::openconnect::env::ConnectionContext;
use crate::vpn::ops::Operation;
use crate::vpn::routing::{gateway_protection_route, split_exclude_routes};

/// Plan the undo operations for a disconnect event
pub fn plan_teardown(ctx: &ConnectionContext) -> Vec<Operation> {
    let iface = ctx.interface.handle();
    let mut ops: Vec<Operation> = Vec::new();

    ops.push(gateway_protection_route(ctx, None).inverse().into());

    // gateway=all also drops the default route the address installed
    ops.push(Operation::DeleteAddress {
        interface: iface.to_string(),
        address: ctx.ip4_address,
    });

    if let Some(address) = ctx.ip6_address {
        ops.push(Operation::DeleteIpv6Address {
            interface: iface.to_string(),
            address,
        });
    }

    ops.extend(
        split_exclude_routes(ctx, None)
            .iter()
            .map(|route| Operation::from(route.inverse())),
    );

    ops
}
