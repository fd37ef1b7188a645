use clap::{Parser, Subcommand};
use teaflow_core::Config;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

mod commands;

#[derive(Parser)]
#[command(name = "teaflow", version, about = "TeaFlow gongfu brew engine")]
struct Cli {
    /// Log at debug level (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a steep schedule
    Schedule(commands::schedule::ScheduleArgs),
    /// Record and list brew feedback
    Feedback {
        #[command(subcommand)]
        action: commands::feedback::FeedbackAction,
    },
    /// Per-tea analytics and recommendations
    Analytics {
        #[command(subcommand)]
        action: commands::analytics::AnalyticsAction,
    },
    /// Inspect or reset learned offsets
    Learning {
        #[command(subcommand)]
        action: commands::learning::LearningAction,
    },
    /// Built-in and user tea profiles
    Tea {
        #[command(subcommand)]
        action: commands::tea::TeaAction,
    },
    /// Vessel size helpers
    Vessel {
        #[command(subcommand)]
        action: commands::vessel::VesselAction,
    },
    /// Remembered per-tea brew settings
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// Offline sync queue
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Local cache maintenance
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// `RUST_LOG` first, then `--verbose`, then the configured level.
fn build_env_filter(verbose: bool, configured: &str) -> tracing_subscriber::EnvFilter {
    if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        return filter;
    }
    if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_new(configured)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

fn init_tracing(verbose: bool, configured: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    tracing_subscriber::registry()
        .with(build_env_filter(verbose, configured))
        .with(fmt_layer)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let loaded = Config::load();
    let level = loaded
        .as_ref()
        .map(|c| c.log.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(cli.verbose, &level);
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default configuration");
        Config::default()
    });

    let result = match cli.command {
        Commands::Schedule(args) => commands::schedule::run(args, config),
        Commands::Feedback { action } => commands::feedback::run(action, config),
        Commands::Analytics { action } => commands::analytics::run(action, config),
        Commands::Learning { action } => commands::learning::run(action, config),
        Commands::Tea { action } => commands::tea::run(action, config),
        Commands::Vessel { action } => commands::vessel::run(action),
        Commands::Prefs { action } => commands::prefs::run(action, config),
        Commands::Sync { action } => commands::sync::run(action, config),
        Commands::Cache { action } => commands::cache::run(action, config),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
