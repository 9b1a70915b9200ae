//! Gianged Org Chart - department reassignment and manager succession.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use eframe::egui;
use gianged_orgchart as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use app::config::{AppConfig, ConfigLoadResult, LoggingConfig};
use app::db;
use app::orgchart::{Reconciler, health};
use app::store::{DocumentStore, MemoryStore, PgStore};
use app::ui::OrgChartApp;

/// Org chart editor with drag-and-drop reassignment.
#[derive(Parser)]
#[command(name = "gianged-orgchart")]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Use built-in sample data instead of PostgreSQL
    #[arg(long)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Command {
    /// Launch the org chart window
    #[default]
    Gui,
    /// Run one consistency sweep and print what was repaired
    Sweep,
    /// List departments without a valid manager
    Health,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = if cli.dev {
        PathBuf::from("config.toml")
    } else {
        AppConfig::default_path()
    };

    let config = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => config,
        ConfigLoadResult::Missing if cli.demo => AppConfig::default(),
        ConfigLoadResult::Missing => {
            AppConfig::default()
                .save(&config_path)
                .with_context(|| format!("Failed to write default config to {}", config_path.display()))?;
            bail!(
                "No config found. Defaults written to {}; edit the database settings and restart.",
                config_path.display()
            );
        }
        ConfigLoadResult::Invalid(e) => {
            bail!("Config {} is invalid: {}", config_path.display(), e);
        }
    };

    let _log_guard = init_logging(&config.logging)?;
    tracing::info!("Gianged Org Chart starting...");
    tracing::info!("Config path: {:?}", config_path);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let store = rt.block_on(open_store(&config, cli.demo))?;

    match cli.command.unwrap_or_default() {
        Command::Gui => run_gui(config, store, rt),
        Command::Sweep => rt.block_on(run_sweep(store)),
        Command::Health => rt.block_on(run_health(store)),
    }
}

/// Stdout plus an optional daily rolling file.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let (file_layer, guard) = if config.file_enabled {
        let directory = config.resolved_directory();
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
        let appender = tracing_appender::rolling::daily(directory, "gianged-orgchart.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn open_store(config: &AppConfig, demo: bool) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if demo {
        tracing::info!("Demo mode: using sample org chart");
        return Ok(Arc::new(MemoryStore::sample()));
    }

    let conn = db::connect(&config.database)
        .await
        .with_context(|| format!("Failed to connect to database {}", config.database.name))?;

    if let Ok(version) = db::get_version(&conn).await {
        tracing::info!("PostgreSQL: {}", version);
    }
    if let Ok(counts) = db::get_table_counts(&conn).await {
        tracing::info!("Tables: {} departments, {} employees", counts.departments, counts.employees);
    }

    Ok(Arc::new(PgStore::new(conn)))
}

fn run_gui(config: AppConfig, store: Arc<dyn DocumentStore>, rt: tokio::runtime::Runtime) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Gianged Org Chart")
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Gianged Org Chart",
        options,
        Box::new(|cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);
            Ok(Box::new(OrgChartApp::new(store, config, rt)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}

async fn run_sweep(store: Arc<dyn DocumentStore>) -> anyhow::Result<()> {
    let report = Reconciler::new().run_once(store.as_ref()).await?;

    if report.is_clean() {
        println!("All manager references are valid.");
        return Ok(());
    }
    for id in &report.cleared {
        println!("cleared  department {id}");
    }
    for (id, reason) in &report.failed {
        println!("failed   department {id}: {reason}");
    }
    if !report.failed.is_empty() {
        bail!("{} department(s) could not be repaired", report.failed.len());
    }
    Ok(())
}

async fn run_health(store: Arc<dyn DocumentStore>) -> anyhow::Result<()> {
    let snapshot = store.snapshot().await?;
    let warnings = health::check(&snapshot);

    if warnings.is_empty() {
        println!("Every department has a valid manager.");
    }
    for warning in &warnings {
        println!("{warning}");
    }
    Ok(())
}
