use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rollcall::attendance::StatsSource;
use rollcall::config::{self, Config};
use rollcall::{kiosk, AttendanceRecorder, Collaborators, ServiceClient, V4lProvider, WorkflowController};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version, about = "Attendance check-in kiosk - face and ID card verification")]
struct Cli {
    /// Config file (defaults to the system-wide path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Attendance service root, overrides the config file
    #[arg(long, env = "ROLLCALL_BACKEND_URL", global = true)]
    base_url: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive check-in kiosk
    Kiosk {
        /// Camera device (defaults to the configured one)
        #[arg(long)]
        camera: Option<String>,
    },
    /// Print today's attendance statistics
    Stats,
    /// List recorded attendance
    Records,
    /// Check that the attendance service answers
    Ping,
    /// Print the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        cfg.base_url = base_url;
    }

    match cli.command {
        Commands::Kiosk { camera } => {
            if let Some(camera) = camera {
                cfg.camera = camera;
            }
            run_kiosk(&cfg).await
        }
        Commands::Stats => stats(&cfg).await,
        Commands::Records => records(&cfg).await,
        Commands::Ping => ping(&cfg).await,
        Commands::Config { init } => show_config(&cfg, cli.config.as_deref(), init),
    }
}

fn service(cfg: &Config) -> Result<ServiceClient> {
    ServiceClient::from_config(cfg).context("Failed to build HTTP client")
}

async fn run_kiosk(cfg: &Config) -> Result<()> {
    info!("Attendance service: {}", cfg.base_url);
    info!("Camera: {}", cfg.camera);

    let service = service(cfg)?;
    let deps = Collaborators {
        camera: Arc::new(V4lProvider::new(cfg.camera.clone())),
        face: Arc::new(service.face_verifier()),
        id: Arc::new(service.id_verifier()),
        recorder: AttendanceRecorder::new(Arc::new(service.clone())),
        stats: Arc::new(service),
    };

    kiosk::run(WorkflowController::new(deps, cfg.workflow_options())).await
}

async fn stats(cfg: &Config) -> Result<()> {
    let service = service(cfg)?;
    let stats = match service.fetch_stats().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Stats unavailable ({}), showing defaults", e);
            cfg.fallback_stats
        }
    };
    kiosk::print_stats(&stats);
    Ok(())
}

async fn records(cfg: &Config) -> Result<()> {
    let list = service(cfg)?
        .records()
        .await
        .context("Failed to fetch attendance records")?;

    info!("{} record(s)", list.count);
    for r in &list.records {
        println!(
            "{}  {:<24} verified={:<5} confidence={} id={}",
            r.timestamp,
            r.student_name,
            r.verified,
            r.face_match_confidence
                .map_or_else(|| "N/A".to_string(), |c| c.to_string()),
            r.id_card_number.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn ping(cfg: &Config) -> Result<()> {
    let banner = service(cfg)?
        .banner()
        .await
        .with_context(|| format!("Attendance service at {} is not answering", cfg.base_url))?;
    info!("✓ {}", banner.message);
    Ok(())
}

fn show_config(cfg: &Config, path: Option<&std::path::Path>, init: bool) -> Result<()> {
    if init {
        let path = path.unwrap_or(&config::CONFIG_PATH);
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        config::save_config(&Config::default(), Some(path))?;
        info!("✓ Wrote default config to {}", path.display());
        return Ok(());
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
