// Logging utilities for the Teonet node host
//
// Every log line carries the node name and the component that emitted it,
// so output from the host shell can be told apart from the runtime's own
// console output:
//
//   [teo-go] Teogo started
//   [teo-go][Dispatcher|peer=p1] peer "p1" was connected

use log::{debug, error, info, trace, warn};
use std::fmt::{self, Arguments, Display, Formatter};

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Host,
    Argv,
    Dispatcher,
    Runtime,
    Config,
    CLI,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Host => "Host",
            Component::Argv => "Argv",
            Component::Dispatcher => "Dispatcher",
            Component::Runtime => "Runtime",
            Component::Config => "Config",
            Component::CLI => "CLI",
            Component::Custom(name) => name,
        }
    }
}

/// Node name used before the runtime has parsed the host name
pub const UNNAMED_NODE: &str = "-";

/// Component-specific logger carrying the node name and optional peer context
#[derive(Debug, Clone)]
pub struct Logger {
    component: Component,
    node_name: String,
    parent_component: Option<Component>,
    peer: Option<String>,
}

/// Renders the `[node][Parent.Component|peer=...]` prefix without allocating
pub struct LogPrefix<'a>(&'a Logger);

impl Display for LogPrefix<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let logger = self.0;
        write!(f, "[{}]", logger.node_name)?;

        // The root host logger only shows the node name
        if logger.is_root_host() && logger.peer.is_none() {
            return Ok(());
        }

        f.write_str("[")?;
        match logger.parent_component {
            Some(parent) if parent != Component::Host => {
                write!(f, "{}.{}", parent.as_str(), logger.component.as_str())?
            }
            _ => f.write_str(logger.component.as_str())?,
        }
        if let Some(peer) = &logger.peer {
            write!(f, "|peer={peer}")?;
        }
        f.write_str("]")
    }
}

impl Logger {
    /// Create a root logger for a component and node name
    pub fn new_root(component: Component, node_name: &str) -> Self {
        Self {
            component,
            node_name: node_name.to_string(),
            parent_component: None,
            peer: None,
        }
    }

    /// Create a child logger with the same node name but a different component
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            node_name: self.node_name.clone(),
            parent_component: Some(self.component),
            peer: self.peer.clone(),
        }
    }

    /// Create a logger that tags every line with a peer name
    pub fn with_peer(&self, peer: impl Into<String>) -> Self {
        Self {
            component: self.component,
            node_name: self.node_name.clone(),
            parent_component: self.parent_component,
            peer: Some(peer.into()),
        }
    }

    /// Create a copy of this logger bound to another node name
    ///
    /// The host learns its node name only after the argument vector has been
    /// parsed, so loggers created during startup are renamed afterwards.
    pub fn with_node_name(&self, node_name: &str) -> Self {
        Self {
            component: self.component,
            node_name: node_name.to_string(),
            parent_component: self.parent_component,
            peer: self.peer.clone(),
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Prefix printed in front of every message
    pub fn prefix(&self) -> LogPrefix<'_> {
        LogPrefix(self)
    }

    fn is_root_host(&self) -> bool {
        self.component == Component::Host && self.parent_component.is_none()
    }

    pub fn trace(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Trace) {
            trace!("{} {}", self.prefix(), message.into());
        }
    }

    pub fn trace_args(&self, args: Arguments) {
        if log::log_enabled!(log::Level::Trace) {
            trace!("{} {}", self.prefix(), args);
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Debug) {
            debug!("{} {}", self.prefix(), message.into());
        }
    }

    /// Log a debug message using fmt::Arguments (avoids allocating message String)
    pub fn debug_args(&self, args: Arguments) {
        if log::log_enabled!(log::Level::Debug) {
            debug!("{} {}", self.prefix(), args);
        }
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Info) {
            info!("{} {}", self.prefix(), message.into());
        }
    }

    pub fn info_args(&self, args: Arguments) {
        if log::log_enabled!(log::Level::Info) {
            info!("{} {}", self.prefix(), args);
        }
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Warn) {
            warn!("{} {}", self.prefix(), message.into());
        }
    }

    pub fn warn_args(&self, args: Arguments) {
        if log::log_enabled!(log::Level::Warn) {
            warn!("{} {}", self.prefix(), args);
        }
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Error) {
            error!("{} {}", self.prefix(), message.into());
        }
    }

    pub fn error_args(&self, args: Arguments) {
        if log::log_enabled!(log::Level::Error) {
            error!("{} {}", self.prefix(), args);
        }
    }
}
