//! Teikningar CLI
//!
//! Local execution entry point, meant to be run from cron: `crawl` for a
//! bounded time slice, then `publish`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use teikningar::{
    error::Result,
    models::Config,
    pipeline,
    services::parse_address,
    storage::{
        LocalStorage,
        local::{ADDRESSES_DIR, list_address_keys},
    },
};

/// Teikningar - Reykjavík Drawing Harvester
#[derive(Parser, Debug)]
#[command(
    name = "teikningar",
    version,
    about = "Harvests architectural drawings and publishes them per street address"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "teikningar.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance the crawl, resuming from the status file
    Crawl {
        /// Time budget in seconds (default: crawler.run_for_secs)
        #[arg(long)]
        run_for: Option<u64>,
    },

    /// Publish the finished snapshot to the configured store
    Publish,

    /// Validate the configuration file
    Validate,

    /// Show crawl state and snapshot info
    Info,

    /// Print the address keys a raw address expands to
    Parse {
        /// Raw address as it appears upstream
        address: String,
    },
}

/// Initialize logging; `logging.file` redirects output to a file.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            std::process::id(),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = &config.logging.file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Crawl { run_for } => {
            config.validate()?;
            let budget = Duration::from_secs(run_for.unwrap_or(config.crawler.run_for_secs));
            pipeline::run_crawler(&config, budget).await?;
        }

        Command::Publish => {
            config.validate()?;
            pipeline::run_publisher(&config).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let storage =
                LocalStorage::new(config.data_dir()).with_status_path(config.status_path());
            let state = storage.load_state().await?;

            log::info!("Data directory: {}", storage.root().display());
            log::info!("Phase: {}", state.phase);
            log::info!(
                "Scrape: {}",
                state.scrape_id.as_deref().unwrap_or("none")
            );
            log::info!("Next page: {}", state.next_url.as_deref().unwrap_or("none"));

            if let Some(scrape_id) = &state.scrape_id {
                let dir = storage.scrape_dir(scrape_id).join(ADDRESSES_DIR);
                let count = list_address_keys(&dir).await?.len();
                log::info!("Addresses in current scrape: {count}");
            }
            for (name, dir) in [
                ("Awaiting publish", storage.last_dir()),
                ("Published", storage.uploaded_dir()),
            ] {
                if dir.exists() {
                    let count = list_address_keys(&dir.join(ADDRESSES_DIR)).await?.len();
                    log::info!("{name}: {count} addresses");
                } else {
                    log::info!("{name}: none");
                }
            }
        }

        Command::Parse { address } => {
            for key in parse_address(&address) {
                println!("{key}");
            }
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let config = if config_found {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    init_logging(&config, cli.verbose)?;

    if config_found {
        log::debug!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!("{} not found, using defaults", cli.config.display());
    }

    let result = run(cli, config).await;
    if let Err(e) = &result {
        log::error!("{e}");
    }
    result
}
