use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod api;
mod args;
mod cli;
mod duration;
mod error;
mod export;
mod loopback;
mod orchestrator;
mod report;
mod rpc;
mod synth;
#[cfg(test)]
mod testutil;
mod validate;

fn main() -> Result<ExitCode> {
    let inv = cli::Invocation::parse();
    init_tracing(inv.cli.verbose);

    let args = inv.argument_set();
    let url = args.get("url").unwrap_or_default();
    let mut client = rpc::HttpClient::new(url, Duration::from_secs(inv.cli.timeout_secs))
        .with_context(|| format!("setting up client for {url}"))?;

    let opts = orchestrator::RunOptions {
        output_file: inv.cli.output_file.clone(),
    };
    let report = orchestrator::run(&mut client, &args, &opts);
    Ok(ExitCode::from(report.exit_code()))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}
