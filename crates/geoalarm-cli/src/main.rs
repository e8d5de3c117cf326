use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "geoalarm-cli", version, about = "geoalarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Great-circle distance between two points
    Distance(commands::measure::DistanceArgs),
    /// Evaluate one position against a destination
    Check(commands::measure::CheckArgs),
    /// List the supported proximity thresholds
    Thresholds,
    /// Run a live proximity alarm over a recorded track
    Watch(commands::watch::WatchArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    // stdout carries JSON; logs go to stderr.
    let filter = EnvFilter::try_from_env("GEOALARM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Distance(args) => commands::measure::distance(args),
        Commands::Check(args) => commands::measure::check(args),
        Commands::Thresholds => commands::measure::thresholds(),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
