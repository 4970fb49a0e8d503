use clap::{Parser, Subcommand};
use lib::config::{self, Settings};

#[derive(Parser)]
#[command(name = "polyglot")]
#[command(about = "Polyglot: translating relay between Discord channels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a template config (channel ids and credentials to fill in).
    Init {
        /// Config file path (default: POLYGLOT_CONFIG_PATH or ~/.polyglot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Validate the configuration and print the routing table.
    Check {
        /// Config file path (default: POLYGLOT_CONFIG_PATH or ~/.polyglot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Connect to Discord and relay messages until stopped.
    Run {
        /// Config file path (default: POLYGLOT_CONFIG_PATH or ~/.polyglot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("polyglot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            init_console_logging();
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            init_console_logging();
            if let Err(e) = run_check(config) {
                log::error!("invalid configuration: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_relay(config).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn init_console_logging() {
    if let Err(e) = lib::logging::init(None) {
        eprintln!("logging setup failed: {:#}", e);
    }
}

fn load_settings(config_path: Option<std::path::PathBuf>) -> anyhow::Result<(Settings, std::path::PathBuf)> {
    let (config, path) = config::load_config(config_path)?;
    let settings = Settings::resolve(&config, &path)?;
    Ok((settings, path))
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    if lib::init::init_config(&path)? {
        println!("wrote template config to {}", path.display());
    } else {
        println!("config already exists at {}", path.display());
    }
    Ok(())
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (settings, path) = load_settings(config_path)?;
    println!("config ok: {}", path.display());
    for &source in settings.routes.channel_ids() {
        let targets: Vec<String> = settings
            .routes
            .routes_for(source)
            .iter()
            .map(|e| format!("{} -> {}", e.language, e.channel_id))
            .collect();
        println!("  {}: {}", source, targets.join(", "));
    }
    Ok(())
}

/// Errors before the log file is known are reported on stderr only.
async fn run_relay(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (settings, path) = match load_settings(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_console_logging();
            return Err(e);
        }
    };
    if let Err(e) = lib::logging::init(settings.log_file.as_deref()) {
        init_console_logging();
        return Err(e);
    }
    log::info!("starting relay with config {}", path.display());
    lib::service::run_relay(settings).await
}
