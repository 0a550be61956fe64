//! OpenConnect integration module
//!
//! OpenConnect (and vpnc) invoke our binary as a script, once per
//! lifecycle event, with environment variables describing the connection.
//!
//! # Usage
//!
//! ```bash
//! openconnect vpn.example.com -s 'vpnc-netconf.exe'
//! ```
//!
//! # Lifecycle
//!
//! The script is called with `reason` set to:
//! - `pre-init`: before the tunnel device exists, nothing to do
//! - `connect`: tunnel is up, configure interface, DNS and routes
//! - `disconnect`: tunnel is going down, undo the connect configuration

pub mod env;
pub mod script;

pub use env::{ConnectionContext, Reason};
pub use script::{EventOutcome, EventPlan, ScriptError, handle_event, handle_script_mode, plan_event};
