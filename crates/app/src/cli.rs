//! CLI dispatcher for the renderer binary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use sim_link::{message_channel, DiscardSink};

use crate::nd::config::RenderSettings;
use crate::nd::data::shared_transitions;
use crate::nd::server::spawn_control_server;
use crate::nd::{pipeline, telemetry};

#[derive(Debug, Parser)]
#[command(
    name = "terrain-nd",
    version,
    about = "Terrain-awareness navigation-display rasterizer",
    arg_required_else_help = true
)]
struct AppCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the render worker and the control-plane server.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Terrain-map file; omit to start with an empty world.
    #[arg(long)]
    terrain_map: Option<PathBuf>,
    /// Control-plane HTTP port.
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Tile visibility radius, nautical miles.
    #[arg(long, default_value_t = 320.0)]
    visibility_range: f64,
    /// Emit verbose logging.
    #[arg(long)]
    verbose: bool,
}

/// Parse CLI arguments and run the requested subcommand.
pub fn dispatch() -> Result<()> {
    let cli = AppCli::parse();
    match cli.command {
        Command::Serve(args) => serve(args),
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let settings = RenderSettings {
        terrain_map: args.terrain_map,
        visibility_range_nm: args.visibility_range,
        http_port: args.port,
        verbose: args.verbose,
    };
    telemetry::init_tracing(settings.verbose);
    let prometheus = telemetry::init_metrics_recorder().clone();

    let transitions = shared_transitions();
    let shutdown = Arc::new(AtomicBool::new(false));

    let server = spawn_control_server(
        settings.http_port,
        transitions.clone(),
        shutdown.clone(),
        prometheus,
    )
    .context("Failed to start control-plane server")?;
    info!(port = settings.http_port, "control plane listening");

    // The simulator connector attaches to this channel; until one does the
    // worker idles and frames go nowhere.
    let (message_tx, message_rx) = message_channel(32);
    let result = pipeline::run(
        settings,
        message_rx,
        Arc::new(DiscardSink),
        transitions,
        shutdown.clone(),
    );

    // Keep the connector handle alive for the worker's whole lifetime.
    drop(message_tx);
    shutdown.store(true, Ordering::SeqCst);
    // Give in-flight HTTP responses a moment before tearing the server down.
    thread::sleep(Duration::from_millis(100));
    server.stop();
    result
}
