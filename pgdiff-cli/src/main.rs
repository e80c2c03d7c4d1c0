//! `pgdiff` binary.
//!
//! Reads the same catalog object kind from two Postgres databases and prints the GRANT and
//! REVOKE statements that would make the second one match the first. Logs go to stderr.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use pgdiff::objects::ObjectSelection;
use pgdiff_telemetry::tracing::{init_tracing, init_tracing_with_default_level};
use tracing::Level;

use crate::config::{Args, load_diff_config};
use crate::core::run_diff;
use crate::error::{CliError, CliResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    let args = Args::parse();

    finish(run(args), &mut io::stderr())
}

/// Maps the run result to an exit code, writing the failure report to `out`.
fn finish(result: CliResult<()>, out: &mut impl Write) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Nothing else to report to if stderr itself is gone.
            let _ = out.write_all(err.render_report().as_bytes());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> CliResult<()> {
    let app_name = env!("CARGO_BIN_NAME");
    let _log_flusher = if args.verbose {
        init_tracing_with_default_level(app_name, Level::DEBUG)
    } else {
        init_tracing(app_name)
    }
    .map_err(CliError::config)?;

    let selection = ObjectSelection::parse(&args.object_kind)?;
    let config = load_diff_config(&args)?;

    install_crypto_provider();

    // We start the runtime. Failures are reported once, by `main`.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_diff(config, selection))
}

/// Installs the process-wide rustls provider used by TLS catalog connections.
fn install_crypto_provider() {
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
