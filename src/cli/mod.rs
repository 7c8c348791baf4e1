//! CLI command handlers

pub mod commands;

pub use commands::{batch, concat, detect, extract, flags, join, merge};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber
///
/// `RUST_LOG` wins when set; otherwise the library logs at `info`, or at
/// `debug` with `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "royalbit_sheetmerge=debug"
    } else {
        "royalbit_sheetmerge=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
