//! ring-lookup: find the cluster member that owns a key.
//!
//! Asks a coordinator node for its ring membership, cross-checks it with a
//! few peers and prints the owner's address.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ring_lookup::{LookupOptions, LookupResult, ProtocolVersion, RingLookup};
use tracing_subscriber::EnvFilter;

/// Resolve the owner of a key in a consistent-hashing cluster.
#[derive(Parser)]
#[command(name = "ring-lookup", version, about)]
struct Args {
    /// Key to resolve.
    #[arg(short, long)]
    key: String,

    /// Speak the legacy length-prefixed protocol.
    #[arg(long)]
    protocol_v1: bool,

    /// Number of peers to cross-check membership with.
    #[arg(long, default_value_t = 3)]
    peers: usize,

    /// Deadline for the whole lookup, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Coordinator address, as host:port.
    hostport: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // stdout carries only the destination
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ring_lookup=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let version = if args.protocol_v1 {
        ProtocolVersion::V1
    } else {
        ProtocolVersion::V2
    };
    let options = LookupOptions::new(version)
        .with_peer_sample_size(args.peers)
        .with_timeout(Duration::from_millis(args.timeout_ms));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(RingLookup::default().lookup(&args.hostport, &args.key, &options));
    report(&result).emit()
}

const PARTITIONED: &str = "Error: cluster is partitioned. A consistent lookup cannot be provided.";

/// What the binary prints for a lookup outcome.
#[derive(Debug, PartialEq, Eq)]
enum Report {
    /// Destination on stdout, exit 0.
    Destination(String),
    /// Message on stderr, exit 1.
    Failure(String),
}

impl Report {
    fn emit(self) -> ExitCode {
        match self {
            Report::Destination(addr) => {
                println!("{addr}");
                ExitCode::SUCCESS
            }
            Report::Failure(message) => {
                eprintln!("{message}");
                ExitCode::FAILURE
            }
        }
    }
}

/// A partitioned answer is refused even though the library returns one.
fn report(result: &ring_lookup::Result<LookupResult>) -> Report {
    match result {
        Ok(result) if result.is_partitioned() => Report::Failure(PARTITIONED.to_string()),
        Ok(result) => Report::Destination(result.destination.clone()),
        Err(e) => Report::Failure(format!("Error: {e}")),
    }
}
