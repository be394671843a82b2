#![deny(missing_docs)]

use std::ffi::OsString;

use clap::{Parser, Subcommand};
use meshsync_sidecar::ConnectSidecarArgs;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub(super) struct Cli {
    #[command(subcommand)]
    pub(super) commands: Commands,
}

#[derive(Debug, Subcommand)]
pub(super) enum Commands {
    /// Keep the pod's service and its connect proxy registered with the local agent.
    ///
    /// Runs until SIGINT/SIGTERM, then deregisters both services.
    ConnectSidecar(Box<ConnectSidecarArgs>),
}

/// Rewrites single-dash long flags (`-service-config`, `-sync-period=10s`) into the `--flag` form
/// clap understands.
///
/// The injected container spec passes flags in the single-dash form. Short flags (`-h`, `-V`)
/// and anything after a bare `--` are left alone.
pub(super) fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;

    args.into_iter()
        .map(Into::<OsString>::into)
        .enumerate()
        .map(|(index, arg)| {
            if index == 0 || passthrough {
                return arg;
            }

            let normalized = match arg.to_str() {
                Some("--") => {
                    passthrough = true;
                    None
                }
                Some(flag) if is_single_dash_long_flag(flag) => {
                    Some(OsString::from(format!("-{flag}")))
                }
                _ => None,
            };

            normalized.unwrap_or(arg)
        })
        .collect()
}

fn is_single_dash_long_flag(arg: &str) -> bool {
    let Some(name) = arg.strip_prefix('-') else {
        return false;
    };

    let name = name.split_once('=').map_or(name, |(name, _)| name);

    name.len() > 1
        && name
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic())
}
