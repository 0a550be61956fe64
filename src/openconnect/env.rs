//! OpenConnect environment variable parsing
//!
//! OpenConnect (and vpnc) pass the connection parameters to the script as a
//! flat set of environment variables. This module turns them into a typed,
//! immutable [`ConnectionContext`] once per invocation.
//!
//! # Key Variables
//!
//! | Variable | Example | Description |
//! |----------|---------|-------------|
//! | `reason` | `connect` | Lifecycle event |
//! | `TUNIDX` | `12` | Tunnel interface index |
//! | `TUNDEV` | `tun0` | Tunnel device name (fallback handle) |
//! | `VPNGATEWAY` | `203.0.113.5` | VPN server address |
//! | `INTERNAL_IP4_ADDRESS` | `10.0.0.100` | Client's VPN IP |
//! | `INTERNAL_IP4_NETMASK` | `255.255.255.0` | VPN netmask |
//! | `INTERNAL_IP4_DNS` | `10.0.0.2 10.0.0.3` | DNS servers, space-separated |
//! | `INTERNAL_IP4_NBNS` | `10.0.0.4` | WINS servers, space-separated |
//! | `INTERNAL_IP6_ADDRESS` | `fd00::100` | Client's IPv6 address |
//! | `CISCO_SPLIT_INC` | `2` | Number of split-include entries |
//!
//! Split lists are encoded as `CISCO_SPLIT_INC_<i>_ADDR`, `_MASK` and
//! `_MASKLEN`; the same layout is used for `CISCO_SPLIT_EXC` and
//! `CISCO_IPV6_SPLIT_INC` (the latter without `_MASK`).

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid IP address in {var}: {value}")]
    InvalidIp { var: String, value: String },
    #[error("Unknown reason: {0}")]
    UnknownReason(String),
}

/// The reason OpenConnect is invoking the script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Pre-initialization (before tunnel is created)
    PreInit,
    /// VPN tunnel established, configure the interface and routes
    Connect,
    /// VPN shutting down, undo what connect configured
    Disconnect,
}

impl std::str::FromStr for Reason {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-init" => Ok(Reason::PreInit),
            "connect" => Ok(Reason::Connect),
            "disconnect" => Ok(Reason::Disconnect),
            _ => Err(EnvError::UnknownReason(s.to_string())),
        }
    }
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::PreInit => "pre-init",
            Reason::Connect => "connect",
            Reason::Disconnect => "disconnect",
        }
    }
}

/// Read the lifecycle event name
pub fn reason_from_env_fn<F>(get_var: F) -> Result<Reason, EnvError>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    get_var("reason")
        .map_err(|_| EnvError::MissingVar("reason".into()))?
        .parse()
}

/// An IPv4 split-tunnel entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRoute {
    pub network: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub prefix_len: Option<u8>,
}

/// An IPv6 split-include entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRoute6 {
    pub network: Ipv6Addr,
    pub prefix_len: u8,
}

/// IPv6 address with prefix, as in `INTERNAL_IP6_NETMASK=fd00::1/64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Prefix {
    pub address: Ipv6Addr,
    pub prefix_len: u8,
}

impl Ipv6Prefix {
    pub fn is_host(&self) -> bool {
        self.prefix_len == 128
    }
}

impl std::str::FromStr for Ipv6Prefix {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or(())?;
        let address = addr.parse().map_err(|_| ())?;
        let prefix_len = len.parse().map_err(|_| ())?;
        if prefix_len > 128 {
            return Err(());
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }
}

/// Tunnel interface handle passed to every netsh command
///
/// `TUNIDX` is preferred; `TUNDEV` is used when the client only
/// reports a device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInterface {
    pub index: Option<u32>,
    pub device: Option<String>,
    handle: String,
}

impl TunnelInterface {
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl std::fmt::Display for TunnelInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.index, &self.device) {
            (Some(idx), Some(dev)) => write!(f, "{} ({})", idx, dev),
            _ => f.write_str(&self.handle),
        }
    }
}

/// Parsed connection parameters for one connect or disconnect event
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub interface: TunnelInterface,
    /// VPN server address, protected by an explicit host route
    pub vpn_gateway: Ipv4Addr,
    pub ip4_address: Ipv4Addr,
    /// Defaults to `255.255.255.255` when absent
    pub ip4_netmask: Ipv4Addr,
    pub ip4_mtu: Option<u32>,
    pub dns_servers: Vec<IpAddr>,
    pub wins_servers: Vec<Ipv4Addr>,
    pub ip6_address: Option<Ipv6Addr>,
    pub ip6_netmask: Option<Ipv6Prefix>,
    pub split_include: Vec<SplitRoute>,
    pub split_exclude: Vec<SplitRoute>,
    pub ip6_split_include: Vec<SplitRoute6>,
    pub banner: Option<String>,
}

impl ConnectionContext {
    /// Parse connection parameters from the current process environment
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_env_fn(|key| env::var(key))
    }

    /// Parse connection parameters using a custom getter (for testing)
    pub fn from_env_fn<F>(get_var: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let get = |key: &str| {
            get_var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let index = get("TUNIDX").and_then(|s| s.parse::<u32>().ok());
        let device = get("TUNDEV");
        let handle = get("TUNIDX")
            .or_else(|| device.clone())
            .ok_or_else(|| EnvError::MissingVar("TUNIDX".into()))?;
        let interface = TunnelInterface {
            index,
            device,
            handle,
        };

        let vpn_gateway = required_ipv4(&get, "VPNGATEWAY")?;
        let ip4_address = required_ipv4(&get, "INTERNAL_IP4_ADDRESS")?;
        let ip4_netmask = optional(&get, "INTERNAL_IP4_NETMASK").unwrap_or(Ipv4Addr::BROADCAST);
        let ip4_mtu = optional(&get, "INTERNAL_IP4_MTU");

        let dns_servers = address_list(&get, "INTERNAL_IP4_DNS");
        let wins_servers = address_list(&get, "INTERNAL_IP4_NBNS");

        let ip6_address = optional(&get, "INTERNAL_IP6_ADDRESS");
        let ip6_netmask = optional(&get, "INTERNAL_IP6_NETMASK");

        let split_include = split_list(&get, "CISCO_SPLIT_INC");
        let split_exclude = split_list(&get, "CISCO_SPLIT_EXC");
        let ip6_split_include = split_list6(&get, "CISCO_IPV6_SPLIT_INC");

        Ok(Self {
            interface,
            vpn_gateway,
            ip4_address,
            ip4_netmask,
            ip4_mtu,
            dns_servers,
            wins_servers,
            ip6_address,
            ip6_netmask,
            split_include,
            split_exclude,
            ip6_split_include,
            banner: get_var("CISCO_BANNER").ok().filter(|b| !b.trim().is_empty()),
        })
    }

    /// First usable address of the internal subnet
    ///
    /// Tunnel routes point at this address rather than at our own.
    pub fn internal_gateway(&self) -> Ipv4Addr {
        let network = u32::from(self.ip4_address) & u32::from(self.ip4_netmask);
        Ipv4Addr::from(network.wrapping_add(1))
    }
}

fn required_ipv4<G>(get: &G, var: &str) -> Result<Ipv4Addr, EnvError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(var).ok_or_else(|| EnvError::MissingVar(var.into()))?;
    value.parse().map_err(|_| EnvError::InvalidIp {
        var: var.into(),
        value,
    })
}

/// Parse an optional variable; malformed values count as absent
fn optional<G, T>(get: &G, var: &str) -> Option<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let value = get(var)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring malformed {}: {:?}", var, value);
            None
        }
    }
}

fn address_list<G, T>(get: &G, var: &str) -> Vec<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(var)
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|s| match s.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!("Ignoring malformed entry in {}: {:?}", var, s);
                None
            }
        })
        .collect()
}

/// Number of entries announced by a count variable; unparseable means none
fn entry_count<G>(get: &G, var: &str) -> usize
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => 0,
        Some(count) => count.parse().unwrap_or_else(|_| {
            warn!("Ignoring {} with non-numeric count {:?}", var, count);
            0
        }),
    }
}

fn split_list<G>(get: &G, prefix: &str) -> Vec<SplitRoute>
where
    G: Fn(&str) -> Option<String>,
{
    (0..entry_count(get, prefix))
        .filter_map(|i| {
            let key = |field: &str| format!("{}_{}_{}", prefix, i, field);
            let network: Ipv4Addr = optional(get, &key("ADDR"))?;
            let prefix_len: Option<u8> = optional::<_, u8>(get, &key("MASKLEN")).filter(|l| *l <= 32);
            let mask = optional(get, &key("MASK")).or_else(|| prefix_len.map(mask_from_prefix));
            match mask {
                Some(mask) => Some(SplitRoute {
                    network,
                    mask,
                    prefix_len,
                }),
                None => {
                    warn!("Skipping {} entry {}: no usable mask", prefix, i);
                    None
                }
            }
        })
        .collect()
}

fn split_list6<G>(get: &G, prefix: &str) -> Vec<SplitRoute6>
where
    G: Fn(&str) -> Option<String>,
{
    (0..entry_count(get, prefix))
        .filter_map(|i| {
            let key = |field: &str| format!("{}_{}_{}", prefix, i, field);
            let network = optional(get, &key("ADDR"))?;
            let prefix_len = optional::<_, u8>(get, &key("MASKLEN")).filter(|l| *l <= 128)?;
            Some(SplitRoute6 {
                network,
                prefix_len,
            })
        })
        .collect()
}

fn mask_from_prefix(len: u8) -> Ipv4Addr {
    match len {
        0 => Ipv4Addr::UNSPECIFIED,
        n => Ipv4Addr::from(u32::MAX << (32 - u32::from(n.min(32)))),
    }
}
