//! uservars shell
//!
//! Reads commands from stdin and runs them against one session store,
//! the way a host would call the three entry points.

use clap::Parser;
use std::io;
use tracing_subscriber::{fmt, EnvFilter};
use uservars::shell;
use uservars::{session, MissingKeyPolicy, StoreConfig};

/// uservars shell
#[derive(Parser, Debug)]
#[command(name = "uservars")]
#[command(about = "Interactive shell over a session-lifetime user variable store")]
#[command(version)]
struct Args {
    /// Number of entries to presize the store for
    #[arg(short, long, default_value_t = uservars::config::DEFAULT_INITIAL_CAPACITY)]
    capacity: usize,

    /// Make `del` of a missing key an error instead of returning f
    #[arg(long)]
    strict_delete: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log: String,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let policy = if args.strict_delete {
        MissingKeyPolicy::Error
    } else {
        MissingKeyPolicy::Ignore
    };
    let config = StoreConfig::builder()
        .initial_capacity(args.capacity)
        .missing_key_policy(policy)
        .build();
    if let Err(e) = session::configure(config) {
        tracing::error!("Failed to configure store: {}", e);
        std::process::exit(1);
    }

    tracing::info!("uservars shell v{}", uservars::VERSION);

    if let Err(e) = shell::run(io::stdin().lock(), io::stdout().lock()) {
        tracing::error!("Shell error: {}", e);
        std::process::exit(1);
    }

    session::end_session();
}
