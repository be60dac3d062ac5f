//! teogo library
//!
//! Everything the `teogo` binary does apart from choosing the runtime, so it
//! can be driven against the simulated runtime in tests.

pub mod config;
pub mod start;

pub use config::HostConfig;
pub use start::{ConsoleHandler, StartCommand};

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::path::PathBuf;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host-only option; everything else belongs to the node
pub const HOST_CONFIG_FLAG: &str = "--host-config";

/// Separate host options from the arguments forwarded to the node
///
/// Removes `--host-config <file>` (or `--host-config=<file>`) and returns the
/// file together with the remaining arguments in their original order. The
/// program name is always forwarded.
pub fn split_host_args<I>(args: I) -> Result<(Option<PathBuf>, Vec<OsString>)>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut forwarded: Vec<OsString> = args.next().into_iter().collect();
    let mut host_config = None;

    while let Some(arg) = args.next() {
        if arg == HOST_CONFIG_FLAG {
            let value = args
                .next()
                .ok_or_else(|| anyhow!("{HOST_CONFIG_FLAG} requires a file argument"))?;
            host_config = Some(PathBuf::from(value));
            continue;
        }
        match arg.to_str().and_then(|s| s.strip_prefix("--host-config=")) {
            Some(value) => host_config = Some(PathBuf::from(value)),
            None => forwarded.push(arg),
        }
    }

    Ok((host_config, forwarded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn node_arguments_pass_through_untouched() {
        let (config, forwarded) =
            split_host_args(os(&["teogo", "teo-go", "-a", "10.15.56.61"])).unwrap();
        assert_eq!(config, None);
        assert_eq!(forwarded, os(&["teogo", "teo-go", "-a", "10.15.56.61"]));
    }

    #[test]
    fn host_config_is_removed_in_both_forms() {
        let (config, forwarded) =
            split_host_args(os(&["teogo", "--host-config", "host.json", "teo-go"])).unwrap();
        assert_eq!(config, Some(PathBuf::from("host.json")));
        assert_eq!(forwarded, os(&["teogo", "teo-go"]));

        let (config, forwarded) =
            split_host_args(os(&["teogo", "teo-go", "--host-config=/etc/teo.json"])).unwrap();
        assert_eq!(config, Some(PathBuf::from("/etc/teo.json")));
        assert_eq!(forwarded, os(&["teogo", "teo-go"]));
    }

    #[test]
    fn host_config_without_value_is_an_error() {
        assert!(split_host_args(os(&["teogo", "--host-config"])).is_err());
    }

    #[test]
    fn empty_input_stays_empty() {
        let (config, forwarded) = split_host_args(Vec::new()).unwrap();
        assert!(config.is_none());
        assert!(forwarded.is_empty());
    }
}
