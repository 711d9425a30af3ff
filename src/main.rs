use anyhow::Result;
use clap::Parser;
use cylinder_ledger::cli::Cli;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` takes precedence; otherwise only warnings, or debug output for
/// this crate with `--verbose`. Logs go to stderr so stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,cylinder_ledger=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.run().await
}
