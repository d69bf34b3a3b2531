use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

mod api;
mod app;
mod config;
mod explorer;
mod handler;
mod highlight;
mod logging;
mod markdown;
mod model;
mod transcript;
mod tui;
mod ui;

use api::RagClient;
use app::App;
use config::Config;
use model::Mode;

#[derive(Parser, Debug)]
#[command(name = "prag", version)]
#[command(about = "Terminal client for a Portable RAG backend: browse, ingest and ask your documents")]
struct Cli {
    /// Backend base URL (default http://localhost:8000)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Answering engine: local (private) or cloud (turbo)
    #[arg(long, value_enum, global = true)]
    mode: Option<Mode>,
    /// Alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Without a command the interactive interface starts
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List a directory of the backend's document tree
    Browse {
        /// Path relative to the mounted root
        #[arg(default_value = "")]
        path: String,
    },
    /// Index a file or directory into the knowledge base
    Ingest {
        path: String,
    },
    /// Ask a question against the ingested documents
    Ask {
        question: String,
    },
    /// Check that the backend is reachable
    Status,
}

/// File, then environment, then command-line flags.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(apply_flags(config.with_env(), cli))
}

fn apply_flags(mut config: Config, cli: &Cli) -> Config {
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        None => run_tui(config, cli.config).await,
        Some(command) => {
            // Keep stdout clean for command output
            logging::init_stderr(Some(config.log_filter.as_deref().unwrap_or("warn")))?;
            if let Err(err) = run_command(command, &config).await {
                eprintln!("{} {:#}", "error:".red().bold(), err);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn run_tui(config: Config, config_path: Option<PathBuf>) -> Result<()> {
    let _log_guard = match logging::init_file(config.log_filter.as_deref()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("{} logging disabled: {}", "warning:".yellow(), err);
            None
        }
    };
    tracing::info!(api_url = config.api_url(), mode = config.mode.as_str(), "starting");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(tui::TICK_RATE);

    let mut app = App::new(RagClient::new(config.api_url()), config.mode);
    app.config_path = config_path;
    app.start();

    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    tracing::info!("exiting");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

async fn run_command(command: Commands, config: &Config) -> Result<()> {
    let client = RagClient::new(config.api_url());
    match command {
        Commands::Browse { path } => browse(&client, &path).await,
        Commands::Ingest { path } => ingest(&client, &path).await,
        Commands::Ask { question } => ask(&client, &question, config.mode).await,
        Commands::Status => status(&client).await,
    }
}

async fn browse(client: &RagClient, path: &str) -> Result<()> {
    let entries = client.browse(path).await?;
    println!("{}", format!("ROOT/{}", path).bold().blue());
    if entries.is_empty() {
        println!("{}", "(empty)".dimmed());
    }
    for entry in entries {
        if entry.is_dir() {
            println!("{} {}", entry.icon().yellow(), entry.name.bold());
        } else {
            println!("{} {}", entry.icon().green(), entry.name);
        }
    }
    Ok(())
}

async fn ingest(client: &RagClient, path: &str) -> Result<()> {
    println!("Analyzing {}...", path.cyan());
    let report = client.ingest(path).await?;
    println!(
        "{} I memorized {} fragments.",
        "Analysis complete!".green().bold(),
        report.count.to_string().bold()
    );
    Ok(())
}

async fn ask(client: &RagClient, question: &str, mode: Mode) -> Result<()> {
    println!("{}", mode.engine().dimmed());
    let reply = client.chat(question, mode).await?;

    println!("{}", reply.answer);
    if !reply.sources.is_empty() {
        println!("\n{}", "Sources:".bold().blue());
        for source in &reply.sources {
            println!("• {} {}", source.source.yellow(), source.path.dimmed());
        }
    }
    Ok(())
}

async fn status(client: &RagClient) -> Result<()> {
    let status = client.status().await?;
    println!(
        "{} {} {} ({})",
        "●".green(),
        status.status.bold(),
        status.system,
        client.base_url().dimmed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_starts_tui() {
        let cli = Cli::try_parse_from(["prag"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.mode.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["prag", "ask", "What is X?", "--mode", "cloud"]).unwrap();
        assert_eq!(cli.mode, Some(Mode::Cloud));
        assert!(matches!(cli.command, Some(Commands::Ask { ref question }) if question == "What is X?"));
    }

    #[test]
    fn test_browse_defaults_to_root() {
        let cli = Cli::try_parse_from(["prag", "browse"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Browse { ref path }) if path.is_empty()));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["prag", "--mode", "gpu", "status"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from(["prag", "--api-url", "http://gpu-box:8000", "status"]).unwrap();
        let config = apply_flags(
            Config {
                api_url: "http://nas:8000".to_string(),
                mode: Mode::Cloud,
                log_filter: None,
            },
            &cli,
        );
        assert_eq!(config.api_url(), "http://gpu-box:8000");
        assert_eq!(config.mode, Mode::Cloud);
    }
}
