mod app;
mod config;
mod datasource;
mod layout;
mod simulation;
mod toolbar;
mod util;
mod viewport;
mod world;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;
use env_logger::{Builder, Env};

use crate::config::EngineConfig;
use crate::datasource::{CommandTransport, DatasourceKind, FileTransport, Transport};
use crate::world::World;

const WINDOW_SIZE: [f32; 2] = [1440.0, 920.0];

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding `<datasource url stem>.json` payloads.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Program that answers fetches: called as `<program> <url> <params json>`.
    #[arg(long, conflicts_with = "data_dir")]
    fetch_command: Option<String>,

    #[arg(long = "datasource", value_enum, default_values_t = [DatasourceKind::Aggregations])]
    datasources: Vec<DatasourceKind>,

    /// JSON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    Builder::from_env(Env::default().default_filter_or(args.log_level.as_str()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let transport: Arc<dyn Transport> = match &args.fetch_command {
        Some(program) => {
            Arc::new(CommandTransport::new(program.as_str()).with_timeout(config.fetch_timeout()))
        }
        None => Arc::new(FileTransport::new(args.data_dir.clone())),
    };

    let mut world = World::new(config, transport, WINDOW_SIZE);
    for kind in &args.datasources {
        world.add_datasource(*kind);
        if !kind.supports_periodic_updates() {
            world.request(*kind, 0.0);
        }
    }
    log::info!(
        "starting with datasources {:?}",
        world.datasources().kinds()
    );

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size(WINDOW_SIZE),
        ..Default::default()
    };

    eframe::run_native(
        "nodevis",
        options,
        Box::new(move |cc| Ok(Box::new(app::NodevisApp::new(cc, world)))),
    )
    .map_err(|error| anyhow!("failed to run the viewer: {error}"))
}
