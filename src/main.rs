mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_diff, run_test};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let fallback = format!("warn,vrt={level},vrt_lib={level}");
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Diff {
            fixture,
            candidate,
            tolerance,
            diff_out,
            no_anti_aliasing,
            format,
            output,
        } => run_diff(
            &raw_args,
            args.config,
            args.verbose,
            fixture,
            candidate,
            tolerance,
            diff_out,
            no_anti_aliasing,
            format,
            output,
        ),
        Commands::Test {
            url,
            snapshot_id,
            viewports,
            element,
            mask,
            suffix,
            fixtures_dir,
            results_dir,
            tolerance,
            quiet_period_ms,
            max_inflight,
            chrome,
            format,
            output,
        } => {
            run_test(
                &raw_args,
                args.config,
                args.verbose,
                url,
                snapshot_id,
                viewports,
                element,
                mask,
                suffix,
                fixtures_dir,
                results_dir,
                tolerance,
                quiet_period_ms,
                max_inflight,
                chrome,
                format,
                output,
            )
            .await
        }
    }
}
