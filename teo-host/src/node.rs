//! Node host lifecycle
//!
//! [`NodeHost`] drives one node through `Created → Initialized → Running →
//! Stopped`. It owns everything the runtime borrows: the argument vector, the
//! identity strings and the dispatcher bound to the node handle.

use crate::argv::ArgumentVector;
use crate::callbacks::{
    register_dispatcher, teo_event_dispatch, unregister_own_dispatcher, EventDispatcher,
    LifecycleHandler,
};
use crate::config::{InitFlags, NodeConfig};
use crate::error::{HostError, Result};
use crate::runtime::{NodeHandle, NodeRuntime};
use std::ffi::CString;
use std::sync::Arc;
use teo_common::logging::{Component, Logger, UNNAMED_NODE};
use teo_common::{log_debug, log_error, log_info, log_warn};

/// Host lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Created,
    Initialized,
    Running,
    Stopped,
}

impl HostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Created => "created",
            HostState::Initialized => "initialized",
            HostState::Running => "running",
            HostState::Stopped => "stopped",
        }
    }
}

/// Identity advertised to the network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub application_type: Option<String>,
    pub application_version: Option<String>,
}

/// One node, from initialization to the end of its run loop
pub struct NodeHost<R: NodeRuntime> {
    runtime: R,
    logger: Logger,
    state: HostState,
    argv: Option<ArgumentVector>,
    handle: Option<NodeHandle>,
    dispatcher: Option<Arc<EventDispatcher>>,
    identity: NodeIdentity,
    // The runtime keeps the identity pointers, so every string written stays alive
    retained: Vec<CString>,
    config: Option<NodeConfig>,
}

impl<R: NodeRuntime> NodeHost<R> {
    pub fn new(runtime: R) -> Self {
        Self::with_logger(runtime, Logger::new_root(Component::Host, UNNAMED_NODE))
    }

    pub fn with_logger(runtime: R, logger: Logger) -> Self {
        Self {
            runtime,
            logger,
            state: HostState::Created,
            argv: None,
            handle: None,
            dispatcher: None,
            identity: NodeIdentity::default(),
            retained: Vec::new(),
            config: None,
        }
    }

    /// Initialize the node and bind `handler` to its lifecycle events
    ///
    /// Ownership of `argv` moves into the host. If the runtime rejects the
    /// node the vector is released before the error is returned.
    pub fn init(
        &mut self,
        mut argv: ArgumentVector,
        handler: Arc<dyn LifecycleHandler>,
        flags: InitFlags,
    ) -> Result<NodeHandle> {
        self.expect_state(HostState::Created)?;

        let config = if flags.contains(InitFlags::READ_OPTIONS) {
            NodeConfig::from_argv(&argv).unwrap_or_else(|e| {
                let logger = self.logger.with_component(Component::Config);
                log_warn!(logger, "could not read node options: {}", e);
                NodeConfig::default()
            })
        } else {
            NodeConfig::default()
        };
        if let Some(name) = config.host_name() {
            self.logger = self.logger.with_node_name(name);
        }
        log_debug!(
            self.logger.with_component(Component::Argv),
            "argc={} argv={:?}",
            argv.argc(),
            argv
        );
        log_info!(
            self.logger.with_component(Component::Config),
            "port={} remote={}:{} network={} daemon={}",
            config.port,
            config.r_address.as_deref().unwrap_or("-"),
            config.r_port,
            config.network.as_deref().unwrap_or("-"),
            config.daemon
        );

        let runtime_logger = self.logger.with_component(Component::Runtime);
        let handle = match self.runtime.init(&mut argv, teo_event_dispatch, flags) {
            Ok(handle) => handle,
            Err(e) => {
                log_error!(runtime_logger, "node initialization failed: {}", e);
                return Err(e);
            }
        };

        let dispatcher = Arc::new(EventDispatcher::new(handler, self.logger.clone()));
        if register_dispatcher(handle, Arc::clone(&dispatcher)).is_some() {
            log_warn!(self.logger, "replaced a stale dispatcher for {:p}", handle.as_ptr());
        }

        self.argv = Some(argv);
        self.handle = Some(handle);
        self.dispatcher = Some(dispatcher);
        self.config = Some(config);
        self.state = HostState::Initialized;
        log_debug!(runtime_logger, "node initialized, handle {:p}", handle.as_ptr());
        Ok(handle)
    }

    /// Set the advertised application type (last write wins)
    pub fn set_application_type(&mut self, app_type: &str) -> Result<()> {
        let handle = self.identity_target()?;
        let value = identity_string(app_type)?;
        self.runtime.set_application_type(handle, &value)?;
        self.retained.push(value);
        self.identity.application_type = Some(app_type.to_string());
        log_debug!(self.logger, "application type set to \"{}\"", app_type);
        Ok(())
    }

    /// Set the advertised application version (last write wins)
    pub fn set_application_version(&mut self, version: &str) -> Result<()> {
        let handle = self.identity_target()?;
        let value = identity_string(version)?;
        self.runtime.set_application_version(handle, &value)?;
        self.retained.push(value);
        self.identity.application_version = Some(version.to_string());
        log_debug!(self.logger, "application version set to \"{}\"", version);
        Ok(())
    }

    /// Hand the calling thread to the runtime until it terminates
    ///
    /// Returns the runtime's exit status. The dispatcher and the argument
    /// vector are released whether the run loop ends normally or with an
    /// error.
    pub fn run(&mut self) -> Result<i32> {
        self.expect_state(HostState::Initialized)?;
        let handle = self.handle.ok_or(HostError::InvalidState {
            expected: HostState::Initialized.as_str(),
            actual: self.state.as_str(),
        })?;

        let runtime_logger = self.logger.with_component(Component::Runtime);
        self.state = HostState::Running;
        runtime_logger.info("entering run loop");
        let outcome = self.runtime.run(handle);
        self.state = HostState::Stopped;
        self.release();

        match &outcome {
            Ok(status) => log_info!(runtime_logger, "run loop exited with status {}", status),
            Err(e) => log_error!(runtime_logger, "run loop failed: {}", e),
        }
        outcome
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    /// Node handle, while the node exists (between `init` and the end of `run`)
    pub fn handle(&self) -> Option<NodeHandle> {
        self.handle
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Options parsed from the argument vector at initialization
    pub fn config(&self) -> Option<&NodeConfig> {
        self.config.as_ref()
    }

    pub fn dispatcher(&self) -> Option<&Arc<EventDispatcher>> {
        self.dispatcher.as_ref()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn expect_state(&self, expected: HostState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HostError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    // Identity may only change between init and run
    fn identity_target(&self) -> Result<NodeHandle> {
        match (self.state, self.handle) {
            (HostState::Initialized, Some(handle)) => Ok(handle),
            _ => Err(HostError::InvalidState {
                expected: HostState::Initialized.as_str(),
                actual: self.state.as_str(),
            }),
        }
    }

    // The runtime frees the node when its run loop returns, so the handle
    // is forgotten together with the dispatcher bound to it
    fn release(&mut self) {
        if let (Some(handle), Some(dispatcher)) = (self.handle.take(), self.dispatcher.take()) {
            if !unregister_own_dispatcher(handle, &dispatcher) {
                log_debug!(
                    self.logger,
                    "handle {:p} was already bound to another node",
                    handle.as_ptr()
                );
            }
        }
        if let Some(argv) = self.argv.take() {
            argv.release();
        }
    }
}

impl<R: NodeRuntime> Drop for NodeHost<R> {
    fn drop(&mut self) {
        self.release();
    }
}

fn identity_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|e| HostError::InvalidArgument {
        index: e.nul_position(),
        reason: "identity string holds a NUL byte".to_string(),
    })
}
