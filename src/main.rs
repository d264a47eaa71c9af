mod automation;
mod config;
mod executor;
mod history;
mod platform;
mod resolver;
mod server;
mod service;
mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use automation::HostAutomation;
use config::Config;
use executor::CommandExecutor;
use history::HistoryLedger;
use platform::Platform;
use resolver::Resolver;
use service::CommandService;
use storage::ExecutionResult;

#[derive(Parser)]
#[command(name = "aurex-server", version)]
#[command(about = "Command execution server for the Aurex phone app")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "AUREX_HOST", default_value = "0.0.0.0", global = true)]
    host: String,
    /// Port to bind
    #[arg(long, env = "AUREX_PORT", default_value_t = 8765, global = true)]
    port: u16,
    /// Server config file (optional)
    #[arg(long, env = "AUREX_CONFIG", default_value = "config/server.toml", global = true)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept client connections (default)
    Serve,
    /// Execute one command locally and record it
    Run {
        /// Command text, exactly as a client would send it
        #[arg(required = true)]
        command: String,
    },
    /// Show recently recorded results
    History {
        /// Number of records to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            print_banner();
            let service = Arc::new(build_service(&config).await);
            let listener = server::bind(&cli.host, cli.port).await?;
            info!(host = %cli.host, port = cli.port, "Starting Aurex server");
            server::serve(listener, service, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
            println!("\nServer stopped.");
        }
        Commands::Run { command } => {
            let service = build_service(&config).await;
            match service.handle(&command).await {
                Some(result) => print_result(&result),
                None => println!("{}", "Nothing to run".yellow()),
            }
        }
        Commands::History { limit } => {
            let path = &config.paths.history_file;
            if !path.exists() {
                println!("{}", "No records found".yellow());
                return Ok(());
            }
            let records = history::load_snapshot(path)?;
            let skip = records.len().saturating_sub(limit);
            for record in records.iter().skip(skip) {
                print_result(record);
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn build_service(config: &Config) -> CommandService {
    let platform = Platform::current();
    let custom_commands = config::load_custom_commands(&config.paths.commands_file);
    let resolver = Resolver::new(custom_commands);
    info!(
        platform = platform.name(),
        custom_commands = resolver.custom_command_count(),
        "Command resolver ready"
    );

    let executor = CommandExecutor::new(platform, Arc::new(HostAutomation::new(platform)))
        .with_shell_timeout(Duration::from_secs(config.execution.shell_timeout_secs))
        .with_screenshot_dir(config.paths.screenshot_dir.clone());

    let history_path = config.paths.history_file.clone();
    let history = if config.history.resume {
        HistoryLedger::resume(history_path, config.history.max_entries)
    } else {
        HistoryLedger::new(history_path, config.history.max_entries)
    };
    let entries = history.len().await;
    info!(
        path = %history.path().display(),
        entries,
        "Command history ready"
    );

    CommandService::new(resolver, executor, history)
}

fn print_banner() {
    let rule = "=".repeat(50);
    println!("{}", rule.cyan());
    println!("{}", "Aurex Server - iPhone Command Interface".cyan().bold());
    println!("{}", rule.cyan());
}

fn print_result(result: &ExecutionResult) {
    let stamp = result.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
    let status = if result.success {
        "ok".green().bold()
    } else {
        "failed".red().bold()
    };
    println!("{} {} [{}]", stamp.dimmed(), result.command.cyan(), status);
    if !result.output.is_empty() {
        println!("{}", result.output.trim_end());
    }
    if !result.error.is_empty() {
        println!("{}", result.error.trim_end().red());
    }
}
