//! Gateway CLI: dials one upstream tweak server (the "left" leg, always
//! client role) and serves its mirrored items to one downstream client
//! (the "right" leg, always server role), bridging whichever two
//! transport kinds the two sides use. Grounded on `tweak-mockserver`'s own
//! clap-derive CLI and `signal_hook`-based shutdown, since both binaries
//! share the same "serve until interrupted" shape.

use clap::Parser;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tweak_gateway::Bridge;
use tweak_runtime::{Registry, TransportKind};

/// Bridges an upstream tweak server onto a downstream tweak client.
#[derive(Parser, Debug)]
#[command(name = "tweak-gateway")]
#[command(about = "Bridges two tweak endpoints across transport kinds", long_about = None)]
struct Cli {
    /// Upstream transport kind this gateway dials as a client.
    #[arg(long = "left-transport", default_value = "nng")]
    left_transport: String,

    /// Upstream endpoint URI, e.g. tcp://upstream-host:7777/.
    #[arg(long = "left-uri")]
    left_uri: String,

    /// Downstream transport kind this gateway serves as a server.
    #[arg(long = "right-transport", default_value = "nng")]
    right_transport: String,

    /// Downstream-facing listen URI, e.g. tcp://0.0.0.0:7778/.
    #[arg(long = "right-uri")]
    right_uri: String,

    /// Optional log file; reuses tweak_runtime::log's replaceable sink.
    #[arg(short = 'L', long = "log-file")]
    log_file: Option<std::path::PathBuf>,
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

fn main() {
    let cli = Cli::parse();

    if let Some(log_file) = &cli.log_file {
        if let Err(e) = install_file_sink(log_file) {
            eprintln!("tweak-gateway: cannot open log file {}: {}", log_file.display(), e);
            process::exit(1);
        }
    } else {
        tracing_subscriber::fmt::try_init().ok();
    }

    let left_registry = Arc::new(Registry::new());
    let right_registry = Arc::new(Registry::new());
    let bridge = Bridge::new(left_registry.clone(), right_registry.clone());

    let left_kind = TransportKind::parse(&cli.left_transport);
    let right_kind = TransportKind::parse(&cli.right_transport);

    // The right (server) leg's accept blocks until a downstream client
    // dials in, so it runs on its own thread while the main thread dials
    // the upstream left leg.
    let right_bridge_listeners = bridge.right_listeners();
    let right_registry_for_thread = right_registry.clone();
    let right_uri = cli.right_uri.clone();
    let right_handle = std::thread::spawn(move || {
        tweak_runtime::connect(tweak_runtime::Role::Server, &right_kind, &right_uri, right_registry_for_thread, right_bridge_listeners)
    });

    let left = match tweak_runtime::connect(
        tweak_runtime::Role::Client,
        &left_kind,
        &cli.left_uri,
        left_registry.clone(),
        bridge.left_listeners(),
    ) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            eprintln!("tweak-gateway: failed to dial upstream {}: {}", cli.left_uri, e);
            process::exit(1);
        }
    };
    if let Err(e) = left.subscribe("*") {
        eprintln!("tweak-gateway: failed to subscribe upstream: {}", e);
        process::exit(1);
    }

    let right = match right_handle.join() {
        Ok(Ok(endpoint)) => endpoint,
        Ok(Err(e)) => {
            eprintln!("tweak-gateway: failed to serve downstream on {}: {}", cli.right_uri, e);
            process::exit(1);
        }
        Err(_) => {
            eprintln!("tweak-gateway: downstream accept thread panicked");
            process::exit(1);
        }
    };
    bridge.attach_right_endpoint(right);

    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(sig, shutdown.clone()) {
            eprintln!("tweak-gateway: failed to install signal handler: {}", e);
            process::exit(1);
        }
    }

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
    }

    bridge.destroy_right_endpoint();
    left.destroy();
    process::exit(0);
}
