use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use fleeting_common::Url;

use crate::paste::DEFAULT_MAX_CONTENT_BYTES;

/// Serves text pastes that expire after a time limit or a number of views.
///
/// Every option can also be set through its environment variable, or a `.env`
/// file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "FLEETING_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Directory of the RocksDB database.
    #[arg(long, env = "FLEETING_DB_PATH", default_value = "database")]
    pub db_path: PathBuf,

    /// Base of the share links handed out on creation.
    #[arg(long, env = "FLEETING_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: Url,

    /// Seconds between sweeps of expired pastes.
    #[arg(
        long,
        env = "FLEETING_SWEEP_INTERVAL_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,

    /// Largest accepted paste, in bytes.
    #[arg(long, env = "FLEETING_MAX_CONTENT_BYTES", default_value_t = DEFAULT_MAX_CONTENT_BYTES)]
    pub max_content_bytes: usize,

    /// Let requests set "now" through the x-test-now-ms header. For
    /// deterministic end-to-end tests; never enable in production.
    #[arg(long, env = "FLEETING_ALLOW_CLOCK_OVERRIDE")]
    pub allow_clock_override: bool,
}
