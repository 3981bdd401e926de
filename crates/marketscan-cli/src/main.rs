mod rules;
mod scan;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::scan::ScanArgs;

#[derive(Debug, Parser)]
#[command(name = "marketscan-cli")]
#[command(about = "Search Allegro, OLX and Vinted listings concurrently")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan one or more marketplaces and print matching listings as they arrive
    Scan {
        #[command(flatten)]
        args: ScanArgs,
    },
    /// Validate extraction rules and list the platforms they cover
    Rules {
        /// Rules file to check instead of `MARKETSCAN_RULES_PATH` or the bundled rules
        #[arg(long)]
        path: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = marketscan_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan { args } => scan::run_scan(&config, &args).await,
        Commands::Rules { path } => {
            rules::run_rules_check(path.as_deref().or(config.rules_path.as_deref()))
        }
    }
}
