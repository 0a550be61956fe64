//! vpnc-netconf - network configuration script for OpenConnect on Windows
//!
//! OpenConnect hands the tunnel over to a script that configures the
//! host: interface address, routes, DNS and WINS. This crate is that
//! script. It plans every change from the connection environment and runs
//! the plan best-effort, one command at a time.
//!
//! # Architecture
//!
//! - `config`: Deployment configuration (TOML), e.g. redirect-gateway method
//! - `openconnect`: Environment parsing and event dispatch
//! - `platform`: Command execution and host probes
//! - `vpn`: Interface, routing and teardown planners
//!
//! # Usage
//!
//! As an OpenConnect script:
//! ```bash
//! openconnect vpn.example.com -s 'vpnc-netconf.exe'
//! ```

pub mod config;
pub mod openconnect;
pub mod platform;
pub mod vpn;

pub use config::{Config, RedirectGatewayMethod};
pub use openconnect::{ConnectionContext, handle_event, handle_script_mode};
pub use platform::{CommandExecutor, CommandOutput, RunReport, SystemExecutor};
