//! Node configuration as the runtime will see it
//!
//! The runtime owns the option grammar and reads the argument vector itself.
//! [`NodeConfig`] parses the same grammar on the host side so startup can be
//! logged and checked; the vector is still forwarded verbatim. Parsing is
//! lenient: anything the grammar does not recognise is left to the runtime.

use crate::argv::ArgumentVector;
use crate::error::{HostError, Result};
use clap::Parser;
use std::ffi::c_int;
use std::ops::BitOr;

/// Port the runtime listens on (and connects to) when none is given
pub const DEFAULT_PORT: u16 = 9000;

/// Configuration sources the runtime reads during initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InitFlags(c_int);

impl InitFlags {
    pub const NONE: InitFlags = InitFlags(0);
    /// Parse command line options
    pub const READ_OPTIONS: InitFlags = InitFlags(0b01);
    /// Read the configuration file
    pub const READ_CONFIGURATION: InitFlags = InitFlags(0b10);
    pub const READ_ALL: InitFlags = InitFlags(0b11);

    pub fn bits(self) -> c_int {
        self.0
    }

    pub fn from_bits(bits: c_int) -> Self {
        InitFlags(bits & Self::READ_ALL.0)
    }

    pub fn contains(self, other: InitFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for InitFlags {
    fn default() -> Self {
        InitFlags::READ_ALL
    }
}

impl BitOr for InitFlags {
    type Output = InitFlags;

    fn bitor(self, rhs: InitFlags) -> InitFlags {
        InitFlags(self.0 | rhs.0)
    }
}

/// Host-side view of the runtime's command line options
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "teonet",
    disable_help_flag = true,
    disable_version_flag = true,
    ignore_errors = true
)]
pub struct NodeConfig {
    /// Positional application arguments; the first one is the host name
    #[arg(num_args = 0..)]
    pub positional: Vec<String>,

    /// Runtime prints usage and exits
    #[arg(short = 'h', long = "help")]
    pub help: bool,

    /// Runtime prints its version and exits
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Runtime prints the application name and exits
    #[arg(long = "app_name")]
    pub app_name: bool,

    /// Runtime prints the application description and exits
    #[arg(long = "app_description")]
    pub app_description: bool,

    /// Runtime prints a fresh UUID and exits
    #[arg(long = "uuid")]
    pub uuid: bool,

    /// Port number of this host
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Try the next port when the requested one is busy
    #[arg(long = "port_increment")]
    pub port_increment: bool,

    /// Remote host address to connect to
    #[arg(short = 'a', long = "r_address")]
    pub r_address: Option<String>,

    /// Remote host port
    #[arg(short = 'r', long = "r_port", default_value_t = DEFAULT_PORT)]
    pub r_port: u16,

    /// Network name to join
    #[arg(short = 'n', long = "network")]
    pub network: Option<String>,

    #[arg(long = "hot_keys")]
    pub hot_keys: bool,

    #[arg(long = "show_debug")]
    pub show_debug: bool,

    #[arg(long = "show_debug_vv")]
    pub show_debug_vv: bool,

    #[arg(long = "show_connect")]
    pub show_connect: bool,

    #[arg(long = "show_peers")]
    pub show_peers: bool,

    #[arg(long = "show_tr_udp")]
    pub show_tr_udp: bool,

    /// Connect the VPN at startup
    #[arg(long = "vpn_start")]
    pub vpn_start: bool,

    /// Address of this host's VPN interface
    #[arg(short = 'i', long = "vpn_ip")]
    pub vpn_ip: Option<String>,

    /// MTU of the VPN interface
    #[arg(short = 'm', long = "vpn_mtu")]
    pub vpn_mtu: Option<u32>,

    /// Run the node as a daemon
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Stop a node running as a daemon
    #[arg(short = 'k', long = "kill")]
    pub kill: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            help: false,
            version: false,
            app_name: false,
            app_description: false,
            uuid: false,
            port: DEFAULT_PORT,
            port_increment: false,
            r_address: None,
            r_port: DEFAULT_PORT,
            network: None,
            hot_keys: false,
            show_debug: false,
            show_debug_vv: false,
            show_connect: false,
            show_peers: false,
            show_tr_udp: false,
            vpn_start: false,
            vpn_ip: None,
            vpn_mtu: None,
            daemon: false,
            kill: false,
        }
    }
}

impl NodeConfig {
    /// Parse the options carried by an argument vector
    pub fn from_argv(argv: &ArgumentVector) -> Result<Self> {
        if argv.is_empty() {
            return Ok(Self::default());
        }
        let config = Self::try_parse_from(argv.to_string_lossy_vec()).map_err(|e| {
            HostError::Config {
                message: e.to_string(),
            }
        })?;
        Ok(config.apply_daemon_mode())
    }

    /// Name of this host (first positional argument)
    pub fn host_name(&self) -> Option<&str> {
        self.positional.first().map(String::as_str)
    }

    /// Log level implied by the runtime's debug switches
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        if self.show_debug_vv {
            Some(log::LevelFilter::Trace)
        } else if self.show_debug {
            Some(log::LevelFilter::Debug)
        } else {
            None
        }
    }

    // A daemon has no terminal: console output switches are cleared
    fn apply_daemon_mode(mut self) -> Self {
        if self.daemon {
            self.show_connect = false;
            self.show_debug = false;
            self.hot_keys = false;
        }
        self
    }
}
