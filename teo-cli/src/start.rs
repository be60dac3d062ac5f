//! Start command for teogo
//!
//! Builds the argument vector from the process arguments, initializes the
//! node, advertises its identity and blocks in the run loop.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::sync::{Arc, Mutex};
use teo_common::log_info;
use teo_common::logging::{Component, Logger};
use teo_host::{ArgumentVector, LifecycleHandler, NodeHost, NodeRuntime, PeerDescriptor};

use crate::config::HostConfig;

/// Handler that reports lifecycle changes on the console
pub struct ConsoleHandler<W: Write + Send> {
    out: Mutex<W>,
    logger: Logger,
}

impl<W: Write + Send> ConsoleHandler<W> {
    pub fn new(out: W, logger: Logger) -> Self {
        Self {
            out: Mutex::new(out),
            logger: logger.with_component(Component::CLI),
        }
    }

    fn print(&self, line: std::fmt::Arguments<'_>) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer poisoned"))?;
        out.write_fmt(line).context("Failed to write to console")?;
        out.write_all(b"\n").context("Failed to write to console")?;
        out.flush().context("Failed to flush console")
    }
}

impl<W: Write + Send> LifecycleHandler for ConsoleHandler<W> {
    fn on_started(&self) -> Result<()> {
        self.logger.debug("node reported start");
        self.print(format_args!("Teogo started .... "))
    }

    fn on_peer_connected(&self, peer: &PeerDescriptor) -> Result<()> {
        self.print(format_args!("peer \"{}\" was connected", peer.from))
    }

    fn on_peer_disconnected(&self, peer: &PeerDescriptor) -> Result<()> {
        self.print(format_args!("peer \"{}\" was disconnected", peer.from))
    }
}

pub struct StartCommand {
    config: HostConfig,
    logger: Logger,
}

impl StartCommand {
    pub fn new(config: HostConfig, logger: Logger) -> Self {
        Self { config, logger }
    }

    /// Run a node that reports to stdout
    pub fn run<R: NodeRuntime>(&self, runtime: R, args: Vec<OsString>) -> Result<i32> {
        let handler = Arc::new(ConsoleHandler::new(std::io::stdout(), self.logger.clone()));
        self.run_with_handler(runtime, args, handler)
    }

    /// Run a node, delivering its lifecycle events to `handler`
    pub fn run_with_handler<R: NodeRuntime>(
        &self,
        runtime: R,
        args: Vec<OsString>,
        handler: Arc<dyn LifecycleHandler>,
    ) -> Result<i32> {
        let argv = ArgumentVector::from_args(&args).context("Failed to build argument vector")?;
        log_info!(self.logger, "Starting node with {} arguments", argv.len());

        let mut host = NodeHost::with_logger(runtime, self.logger.clone());
        host.init(argv, handler, self.config.init_flags())
            .context("Failed to initialize node")?;

        host.set_application_type(&self.config.application_type)
            .context("Failed to set application type")?;
        host.set_application_version(&self.config.application_version)
            .context("Failed to set application version")?;
        log_info!(
            self.logger,
            "Advertising {} {}",
            self.config.application_type,
            self.config.application_version
        );

        let status = host.run().context("Node run loop failed")?;
        log_info!(self.logger, "Node stopped with status {}", status);
        Ok(status)
    }
}
