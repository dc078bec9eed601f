// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod error;
mod formats;
mod metrics;
mod negotiate;
mod pipeline;
mod stream;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// CSI Capture CLI - Format negotiation and simulated capture tool
#[derive(Parser)]
#[command(name = "csi-capture")]
#[command(version)]
#[command(about = "CSI Capture CLI - Format negotiation and simulated capture tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=trace for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the format catalogue and what the pipeline supports
    Formats(formats::Args),

    /// Negotiate a pixel format against a simulated sensor
    Negotiate(negotiate::Args),

    /// Run a simulated capture session and measure buffer turnaround
    Stream(stream::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Formats(args) => formats::execute(args, cli.json),
        Commands::Negotiate(args) => negotiate::execute(args, cli.json),
        Commands::Stream(args) => stream::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized, csi-capture {}", csi_capture::version());
}
