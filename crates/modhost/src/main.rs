mod cli; // Output rendering for each command

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, warn};
use modhost_core::config::{ConfigFormat, RuntimeConfig};
use modhost_core::Host;

/// Modhost: loads drop-in modules and exercises them from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit without booting
    #[arg(long)]
    ping: bool,

    /// Configuration file (.json, .toml, .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra search root; may be repeated
    #[arg(long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,

    /// Skip the install directory, working directory and its Modules folder
    #[arg(long, global = true)]
    no_default_paths: bool,

    /// Log every load, dispatch and event decision
    #[arg(long, global = true)]
    debug: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Log output format: plain or json
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered modules
    List,
    /// Send input to a module, falling back to others when it gives no answer
    Invoke {
        /// Module name or type name
        name: String,
        /// Input text
        input: String,
        /// Modules tried next, in order
        #[arg(long)]
        fallback: Vec<String>,
        /// Per-module timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Raise a named system signal
    Event {
        name: String,
    },
    /// Report module folders, external resources and configuration files
    Discover,
    /// Summarize folders (defaults to the discovered module folders)
    Scan {
        folders: Vec<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

fn effective_config(args: &CliArgs) -> Result<RuntimeConfig, String> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::load_from_path(path).map_err(|e| e.to_string())?,
        None => RuntimeConfig::default(),
    };
    config.search_paths.extend(args.search_paths.iter().cloned());
    if args.no_default_paths {
        config.use_default_search_paths = false;
    }
    if args.debug {
        config.debug_logging = true;
        config.logging.level = "debug".to_string();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let config = match effective_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(Commands::Config) = args.command {
        return match config.render(ConfigFormat::Json) {
            Ok(rendered) => {
                println!("{}", rendered);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = core_logging::init_from_config(&config.logging) {
        eprintln!("Logging setup failed: {}", e);
    }

    // --- Statically Register Core Modules ---
    let mut host = Host::new(config);
    host.register_static_catalog("core_memory", core_memory::candidates());
    host.register_static_catalog("core_logging", core_logging::candidates());

    let report = match host.boot() {
        Ok(report) => report,
        Err(e) => {
            error!("Boot failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for e in &report.load.errors {
        eprintln!("error: {}", e);
    }

    let manager = host.manager().clone();
    match args.command {
        None => cli::print_boot(&report, args.json),
        Some(Commands::List) => cli::print_modules(&manager.views(), args.json),
        Some(Commands::Invoke {
            name,
            input,
            fallback,
            timeout_ms,
        }) => {
            let candidates: Vec<String> = std::iter::once(name).chain(fallback).collect();
            let timeout = timeout_ms.map(Duration::from_millis);
            let answer = manager.invoke_with_fallback_async(&candidates, &input, timeout).await;
            cli::print_answer(answer.as_deref(), args.json);
        }
        Some(Commands::Event { name }) => {
            let handled = manager.raise_system_event(&name, None);
            cli::print_event(&name, handled, args.json);
        }
        Some(Commands::Discover) => cli::print_environment(&manager.discover_environment(), args.json),
        Some(Commands::Scan { folders }) => {
            let folders = if folders.is_empty() {
                manager.discover_environment().module_folders
            } else {
                folders
            };
            if folders.is_empty() {
                warn!("No folders to scan");
            }
            cli::print_scan(&manager.scan_for_updates(&folders), args.json);
        }
        Some(Commands::Config) => {}
    }

    host.shutdown();
    ExitCode::SUCCESS
}
