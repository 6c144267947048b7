use anyhow::Context;
use chrono::Local;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::SetupRequest;
use log::{info, warn};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::StationConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Wind tunnel wing pressure station")]
struct Args {
    /// Load the station config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use simulated instruments instead of the serial ports
    #[arg(long, default_value_t = false)]
    demo: bool,
    /// Address of the display bridge
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Write log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Measurements averaged per save
    #[arg(long)]
    save_samples: Option<usize>,
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let mut config = match args.config.as_ref() {
        Some(path) => StationConfig::load(path)?,
        None => StationConfig::default(),
    };
    if args.demo {
        config.demo.enabled = true;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(samples) = args.save_samples {
        config.measurements_per_save = samples;
    }
    let bind = config.bind;

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating station runtime")?;

    runtime.block_on(async move {
        let runner = Arc::new(Runner::new(config, Local::now())?);
        info!("measurements will be logged to {}", runner.log_path().display());
        let tasks = runner.spawn_tasks();

        let initial = Arc::clone(&runner);
        let setup = tokio::task::spawn_blocking(move || initial.setup(SetupRequest::default()))
            .await
            .context("joining initial setup")?;
        if let Err(err) = setup {
            warn!("initial setup failed, waiting for POST /setup: {err:#}");
        }

        let server = tokio::spawn(GuiBridge::new(Arc::clone(&runner)).serve(bind));
        info!("station running (Ctrl+C to stop)...");
        signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;

        info!("shutting down");
        server.abort();
        for task in tasks {
            task.abort();
        }
        let closing = Arc::clone(&runner);
        tokio::task::spawn_blocking(move || closing.shutdown())
            .await
            .context("releasing instruments")?;
        Ok::<(), anyhow::Error>(())
    })
}
