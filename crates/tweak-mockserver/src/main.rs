//! Load-generating mock server: creates `-N` scalar float items with
//! random initial values (seeded by `-S` for reproducible runs), serves
//! them over the Facade's server role, and periodically perturbs a
//! random subset until it receives SIGINT/SIGTERM. Grounded on `seqc`'s
//! `clap`-derive CLI (`compiler/src/main.rs`) for argument parsing and on
//! `runtime/src/diagnostics.rs`'s `signal_hook`-based graceful-shutdown
//! idiom (which installs a `signal_hook::low_level` handler for SIGQUIT)
//! — this binary uses the higher-level, safe `signal_hook::flag::register`
//! instead, since it only needs "has a shutdown signal arrived?", not a
//! full in-handler diagnostic dump.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tweak_facade::Facade;
use tweak_runtime::{tweak_log, ConnectionState, EndpointListeners, Level};

/// Load-generating mock tweak server: publishes `-N` random float items
/// and periodically perturbs them until interrupted.
#[derive(Parser, Debug)]
#[command(name = "tweak-mockserver")]
#[command(about = "Load-generating mock server for the tweak runtime", long_about = None)]
struct Cli {
    /// Transport kind: "nng" (TCP-backed), "rpmsg", or "serial".
    #[arg(short = 't', long = "transport", default_value = "nng")]
    transport_kind: String,

    /// Semicolon-separated key=value endpoint params. "role=server" is
    /// implied and need not be repeated here.
    #[arg(short = 'p', long = "params", default_value = "")]
    params: String,

    /// Endpoint URI, e.g. tcp://0.0.0.0:7777/.
    #[arg(short = 'u', long = "uri")]
    uri: String,

    /// Number of scalar float items to publish.
    #[arg(short = 'N', long = "item-count", default_value_t = 100)]
    item_count: u32,

    /// PRNG seed for reproducible item values and perturbation order.
    #[arg(short = 'S', long = "seed", default_value_t = 0)]
    seed: u64,

    /// Optional log file; a custom tweak_runtime::log sink writes plain
    /// lines there instead of the default tracing-backed stderr sink.
    #[arg(short = 'L', long = "log-file")]
    log_file: Option<PathBuf>,
}

struct MockListeners;

impl EndpointListeners for MockListeners {
    fn on_connection_state(&self, state: ConnectionState) {
        tweak_log!(Level::Debug, "connection state changed: {:?}", state);
    }
    fn on_subscribe(&self, pattern: &str) {
        tweak_log!(Level::Debug, "peer subscribed with pattern {:?}", pattern);
    }
    fn on_features(&self, features: &[String]) {
        tweak_log!(Level::Debug, "peer announced features: {:?}", features);
    }
}

fn install_file_sink(path: &std::path::Path) -> std::io::Result<()> {
    let file = Mutex::new(std::fs::File::create(path)?);
    tweak_runtime::set_sink(Box::new(move |record| {
        use std::io::Write;
        if let Ok(mut f) = file.lock() {
            let _ = writeln!(
                f,
                "{} [{:?}] thread={} {}:{} {}",
                record.timestamp, record.level, record.thread_id, record.function, record.line, record.message
            );
        }
    }));
    Ok(())
}

fn merge_params(params: &str) -> String {
    if params.split(';').any(|p| p.trim().starts_with("role=")) {
        params.to_string()
    } else if params.trim().is_empty() {
        "role=server".to_string()
    } else {
        format!("{};role=server", params)
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_file) = &cli.log_file {
        if let Err(e) = install_file_sink(log_file) {
            eprintln!("tweak-mockserver: cannot open log file {}: {}", log_file.display(), e);
            process::exit(1);
        }
    } else {
        tracing_subscriber::fmt::try_init().ok();
    }

    let params = merge_params(&cli.params);
    let facade = match Facade::new(&cli.transport_kind, &params, &cli.uri, Arc::new(MockListeners)) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("tweak-mockserver: failed to start: {}", e);
            process::exit(1);
        }
    };

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut ids = Vec::with_capacity(cli.item_count as usize);
    for i in 0..cli.item_count {
        let value: f64 = rng.gen_range(-1000.0..1000.0);
        match facade.add_scalar_f64(&format!("/mock/{}", i), "load-generated item", "", value) {
            Ok(id) => ids.push(id),
            Err(e) => {
                eprintln!("tweak-mockserver: failed to add item {}: {}", i, e);
                process::exit(1);
            }
        }
    }
    tweak_log!(Level::Debug, "published {} items, awaiting subscribers", ids.len());

    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(sig, shutdown.clone()) {
            eprintln!("tweak-mockserver: failed to install signal handler: {}", e);
            process::exit(1);
        }
    }

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
        if ids.is_empty() {
            continue;
        }
        let idx = rng.gen_range(0..ids.len());
        let value: f64 = rng.gen_range(-1000.0..1000.0);
        if let Err(e) = facade.set_scalar_f64(ids[idx], value) {
            tweak_log!(Level::Warn, "perturbation write to item {} failed: {}", ids[idx], e);
        }
    }

    tweak_log!(Level::Debug, "shutdown signal received, tearing down");
    facade.destroy();
    process::exit(0);
}
