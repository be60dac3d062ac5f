//! teogo - run a Teonet node
//!
//! All arguments except `--host-config <file>` are handed to the node
//! runtime unchanged, e.g. `teogo teo-go -a 10.15.56.61`.

use anyhow::{Context, Result};
use std::process::ExitCode;
use teo_cli::{split_host_args, HostConfig, VERSION};
use teo_common::logging::{Component, Logger, UNNAMED_NODE};
use teo_common::log_debug;

fn main() -> ExitCode {
    match run() {
        Ok(status) => ExitCode::from(u8::try_from(status).unwrap_or(1)),
        Err(e) => {
            eprintln!("teogo: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<i32> {
    let (host_config, args) = split_host_args(std::env::args_os())?;
    let config = HostConfig::load_or_default(host_config.as_deref())
        .context("Failed to load host configuration")?;

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        if let Some(level) = config.level_filter()? {
            builder.filter_level(level);
        }
    }
    builder.init();

    let logger = Logger::new_root(Component::CLI, UNNAMED_NODE);
    log_debug!(logger, "teogo {} starting", VERSION);

    start(config, logger, args)
}

#[cfg(feature = "native")]
fn start(config: HostConfig, logger: Logger, args: Vec<std::ffi::OsString>) -> Result<i32> {
    use teo_cli::StartCommand;
    use teo_host::NativeRuntime;

    StartCommand::new(config, logger).run(NativeRuntime::new(), args)
}

#[cfg(not(feature = "native"))]
fn start(_config: HostConfig, _logger: Logger, _args: Vec<std::ffi::OsString>) -> Result<i32> {
    Err(anyhow::anyhow!(
        "teogo was built without the node runtime; rebuild with `--features native` \
         and TEONET_LIB_DIR pointing at libteonet"
    ))
}
