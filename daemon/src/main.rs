//! Entry point: parses the single `--config` flag (spec §6), loads and
//! validates the JSON config, wires sources/systems/dispatchers together,
//! then runs the dispatcher's message loop on a background thread while
//! the metadata TCP broadcaster owns the main thread, the same split the
//! teacher's service binary uses between its proxy server and its
//! signaling server.

mod error;
mod metadata;
mod server;
mod wiring;

use std::net::SocketAddr;
use std::process::exit;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use mimalloc::MiMalloc;
use recorder_common::Config;
use tokio::runtime::Runtime;

use error::DaemonError;
use server::MetadataHub;
use wiring::Daemon;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Dispatcher housekeeping (autotune re-apply, patch TTL sweep, metadata
/// snapshots) runs on this cadence when no message has arrived to drive it.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "trunk-recorder", about = "Trunked-radio voice-call recorder daemon")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long)]
    config: String,
}

fn main() {
    let args = Args::parse();
    match run(args) {
        Ok(()) => exit(0),
        Err(e) => {
            log::error!("{e}");
            exit(e.exit_code());
        }
    }
}

fn run(args: Args) -> Result<(), DaemonError> {
    let config = Config::load(&args.config)?;

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::Info);
    recorder_common::logger::init(level, config.log_file.as_deref()).map_err(DaemonError::Fatal)?;

    log::info!(
        "loaded config: {} source(s), {} system(s)",
        config.sources.len(),
        config.systems.len()
    );

    let hub = MetadataHub::new(config.instance_id.clone(), config.instance_key.clone());
    let mut daemon = Daemon::build(&config, hub.clone())?;
    daemon.publish_startup_snapshot(&config);
    log::info!("wired {} trunking system(s)", daemon.system_count());

    // The control-channel bit parser is out of scope (spec §1);
    // `Daemon::message_sender` is the seam it would feed through. If it
    // exits, the whole process exits, same rationale as the teacher's
    // proxy-server thread: continuing with no way to learn new grants is
    // pointless.
    thread::spawn(move || {
        daemon.run(TICK_INTERVAL);
        log::error!("dispatcher message loop exited");
        exit(3);
    });

    let Some(port) = config.metadata_port else {
        log::info!("metadata_port not set, JSON metadata broadcaster disabled");
        loop {
            thread::park();
        }
    };
    let bind: SocketAddr = ([0, 0, 0, 0], port).into();
    Runtime::new()
        .map_err(|e| DaemonError::Fatal(e.into()))?
        .block_on(server::start_server(bind, hub))
        .map_err(|e| DaemonError::Fatal(e.into()))?;

    Ok(())
}
