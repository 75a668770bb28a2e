use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mimoplot::{Analysis, Result};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Path to the analysis TOML
    #[arg(long, default_value = "analysis.toml")]
    config: PathBuf,

    /// Only run the named pipeline (repeatable)
    #[arg(long, value_name = "NAME")]
    only: Vec<String>,

    /// Load and lay out every chart without drawing anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// More logging (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: &Args) -> Result<()> {
    let analysis = Analysis::load(&args.config)?;

    for pipeline in analysis.select(&args.only)? {
        if args.dry_run {
            let prepared = pipeline.prepare(&analysis.base)?;
            info!(
                pipeline = %pipeline.name,
                rows = prepared.table.len(),
                statements = prepared.figure.statements().len(),
                "prepared"
            );
        } else {
            pipeline.run(&analysis.base)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
