//! Planned network-configuration operations
//!
//! Every planner in this crate produces a list of [`Operation`]s. An
//! operation is pure data; its `Display` impl renders the exact Windows
//! command line (`route` / `netsh`) that the executor runs.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address family of a DNS server or subinterface setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }

    fn netsh_context(self) -> &'static str {
        match self {
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    Add,
    Delete,
}

/// Destination network of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum Network {
    Ipv4 { address: Ipv4Addr, mask: Ipv4Addr },
    Ipv6 { address: Ipv6Addr, prefix_len: u8 },
}

impl Network {
    pub fn v4(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Network::Ipv4 { address, mask }
    }

    pub fn v6(address: Ipv6Addr, prefix_len: u8) -> Self {
        Network::Ipv6 {
            address,
            prefix_len,
        }
    }

    /// A single-host IPv4 destination (`/32`)
    pub fn host(address: Ipv4Addr) -> Self {
        Network::v4(address, Ipv4Addr::BROADCAST)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Ipv4 { address, mask } => write!(f, "{} mask {}", address, mask),
            Network::Ipv6 {
                address,
                prefix_len,
            } => write!(f, "{}/{}", address, prefix_len),
        }
    }
}

/// A planned route mutation
///
/// IPv4 routes render as `route add|delete`, IPv6 routes as
/// `netsh interface ipv6 add|delete route` (which requires an interface).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteOperation {
    pub action: RouteAction,
    pub network: Network,
    pub next_hop: Option<Ipv4Addr>,
    /// Interface handle the route is scoped to
    pub interface: Option<String>,
    pub metric: Option<u32>,
}

impl RouteOperation {
    pub fn add(network: Network) -> Self {
        Self {
            action: RouteAction::Add,
            network,
            next_hop: None,
            interface: None,
            metric: None,
        }
    }

    pub fn via(mut self, next_hop: Ipv4Addr) -> Self {
        self.next_hop = Some(next_hop);
        self
    }

    pub fn on(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn metric(mut self, metric: u32) -> Self {
        self.metric = Some(metric);
        self
    }

    /// The delete that undoes this route
    ///
    /// Deletion matches on destination only, so next hop and metric are
    /// dropped. IPv6 deletes keep the interface because netsh needs it.
    pub fn inverse(&self) -> Self {
        let interface = match self.network {
            Network::Ipv4 { .. } => None,
            Network::Ipv6 { .. } => self.interface.clone(),
        };
        Self {
            action: match self.action {
                RouteAction::Add => RouteAction::Delete,
                RouteAction::Delete => RouteAction::Add,
            },
            network: self.network,
            next_hop: None,
            interface,
            metric: None,
        }
    }
}

impl fmt::Display for RouteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            RouteAction::Add => "add",
            RouteAction::Delete => "delete",
        };
        match self.network {
            Network::Ipv4 { .. } => {
                write!(f, "route {} {}", verb, self.network)?;
                if let Some(next_hop) = self.next_hop {
                    write!(f, " {}", next_hop)?;
                }
                if let Some(metric) = self.metric {
                    write!(f, " metric {}", metric)?;
                }
                // `route` only takes numeric interface indexes
                if let Some(index) = self
                    .interface
                    .as_deref()
                    .filter(|i| i.parse::<u32>().is_ok())
                {
                    write!(f, " if {}", index)?;
                }
                Ok(())
            }
            Network::Ipv6 { .. } => {
                write!(f, "netsh interface ipv6 {} route {}", verb, self.network)?;
                if let Some(interface) = &self.interface {
                    write!(f, " {}", NetshInterface(interface))?;
                }
                if self.action == RouteAction::Add {
                    f.write_str(" store=active")?;
                }
                Ok(())
            }
        }
    }
}

/// An interface handle as a netsh argument
///
/// Indexes go through bare; names are quoted so one like `Ethernet 2`
/// stays a single argument.
struct NetshInterface<'a>(&'a str);

impl fmt::Display for NetshInterface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.parse::<u32>().is_ok() {
            f.write_str(self.0)
        } else {
            write!(f, "\"{}\"", self.0)
        }
    }
}

/// One network-configuration mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Route(RouteOperation),
    SetMtu {
        family: Family,
        interface: String,
        mtu: u32,
    },
    SetInterfaceMetric {
        interface: String,
        metric: u32,
    },
    /// Static IPv4 address; with a gateway the OS installs a default route
    SetAddress {
        interface: String,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Option<(Ipv4Addr, u32)>,
    },
    /// Removes the IPv4 address together with all gateways it installed
    DeleteAddress {
        interface: String,
        address: Ipv4Addr,
    },
    SetIpv6Address {
        interface: String,
        address: Ipv6Addr,
    },
    DeleteIpv6Address {
        interface: String,
        address: Ipv6Addr,
    },
    ClearWins {
        interface: String,
    },
    AddWins {
        interface: String,
        server: Ipv4Addr,
        index: usize,
    },
    ClearDns {
        family: Family,
        interface: String,
    },
    AddDns {
        family: Family,
        interface: String,
        server: IpAddr,
        index: usize,
        /// Appends `validate=no` to skip the reachability check
        skip_validation: bool,
    },
}

impl Operation {
    pub fn as_route(&self) -> Option<&RouteOperation> {
        match self {
            Operation::Route(route) => Some(route),
            _ => None,
        }
    }
}

impl From<RouteOperation> for Operation {
    fn from(route: RouteOperation) -> Self {
        Operation::Route(route)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Route(route) => fmt::Display::fmt(route, f),
            Operation::SetMtu {
                family,
                interface,
                mtu,
            } => write!(
                f,
                "netsh interface {} set subinterface {} mtu={} store=active",
                family.netsh_context(),
                NetshInterface(interface),
                mtu
            ),
            Operation::SetInterfaceMetric { interface, metric } => write!(
                f,
                "netsh interface ip set interface {} metric={}",
                NetshInterface(interface),
                metric
            ),
            Operation::SetAddress {
                interface,
                address,
                netmask,
                gateway,
            } => {
                write!(
                    f,
                    "netsh interface ip set address {} static {} {}",
                    NetshInterface(interface),
                    address,
                    netmask
                )?;
                if let Some((gateway, metric)) = gateway {
                    write!(f, " {} {}", gateway, metric)?;
                }
                Ok(())
            }
            Operation::DeleteAddress { interface, address } => write!(
                f,
                "netsh interface ip delete address {} {} gateway=all",
                NetshInterface(interface),
                address
            ),
            Operation::SetIpv6Address { interface, address } => write!(
                f,
                "netsh interface ipv6 set address {} {} store=active",
                NetshInterface(interface),
                address
            ),
            Operation::DeleteIpv6Address { interface, address } => write!(
                f,
                "netsh interface ipv6 delete address {} {}",
                NetshInterface(interface),
                address
            ),
            Operation::ClearWins { interface } => {
                write!(
                    f,
                    "netsh interface ip delete wins {} all",
                    NetshInterface(interface)
                )
            }
            Operation::AddWins {
                interface,
                server,
                index,
            } => write!(
                f,
                "netsh interface ip add wins {} {} index={}",
                NetshInterface(interface),
                server,
                index
            ),
            Operation::ClearDns { family, interface } => write!(
                f,
                "netsh interface {} delete dns {} all",
                family.netsh_context(),
                NetshInterface(interface)
            ),
            Operation::AddDns {
                family,
                interface,
                server,
                index,
                skip_validation,
            } => {
                write!(
                    f,
                    "netsh interface {} add dns {} {} index={}",
                    family.netsh_context(),
                    NetshInterface(interface),
                    server,
                    index
                )?;
                if *skip_validation {
                    f.write_str(" validate=no")?;
                }
                Ok(())
            }
        }
    }
}
