//! CLI entry point for chatpix

mod tui;

use anyhow::Result;
use chatpix_agent::{DisplayEvent, DisplayKind, Router, RouterSettings};
use chatpix_core::config::validate::validate_config;
use chatpix_core::config::{Config, ConfigLoader};
use chatpix_core::logging::{init_logging, WorkerGuard};
use chatpix_core::Conversation;
use chatpix_providers::OpenAIClient;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "chatpix")]
#[command(about = "Chat with a language model or generate images from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the API key and models
    Onboard,
    /// Launch the interactive chat window
    Chat {
        /// Chat model to use
        #[arg(long)]
        model: Option<String>,
    },
    /// Send a single message and print the reply
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Chat model to use
        #[arg(long)]
        model: Option<String>,
    },
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Onboard => {
            run_onboard(&config_loader)?;
        }
        Commands::Chat { model } => {
            let (config, _log_guard) = load_config(&config_loader, cli.verbose)?;
            info!("Starting chat window");
            let router = build_router(&config, model)?;
            tui::run(router, config.chat.system_prompt.clone()).await?;
        }
        Commands::Send { message, model } => {
            let (config, _log_guard) = load_config(&config_loader, cli.verbose)?;
            info!("Sending one-shot message");
            run_send(&config, &message, model).await?;
        }
        Commands::Status => {
            let (config, _log_guard) = load_config(&config_loader, cli.verbose)?;
            info!("Showing status");
            run_status(&config_loader, &config);
        }
    }

    Ok(())
}

/// Load configuration and start logging; the guard must outlive the command
fn load_config(loader: &ConfigLoader, verbose: bool) -> Result<(Config, WorkerGuard)> {
    let config = loader.load()?;
    let guard = init_logging(&config.logging, verbose)?;
    Ok((config, guard))
}

/// Build the router from configuration, failing when no API key is set
fn build_router(config: &Config, model: Option<String>) -> Result<Router> {
    let api_key = config.require_api_key()?;

    let mut settings = RouterSettings::from(config);
    if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
        settings.chat_model = model;
    }

    let client = Arc::new(OpenAIClient::new(
        api_key,
        Some(config.provider.api_base.clone()),
        config.provider.extra_headers.clone(),
    )?);
    info!(
        "Using {} (chat model {}, image model {})",
        client.api_base(),
        settings.chat_model,
        settings.image.model
    );

    Ok(Router::new(client.clone(), client, settings))
}

fn styled(event: &DisplayEvent) -> String {
    let text = style(&event.text);
    match event.kind {
        DisplayKind::User => text.cyan().bold().to_string(),
        DisplayKind::Assistant => text.green().to_string(),
        DisplayKind::Image => text.magenta().to_string(),
        DisplayKind::Notice => text.yellow().to_string(),
        DisplayKind::Error => text.red().to_string(),
    }
}

async fn run_send(config: &Config, message: &str, model: Option<String>) -> Result<()> {
    let router = build_router(config, model)?;
    let mut conversation = Conversation::new(config.chat.system_prompt.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Waiting for a reply...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let turn = router.route(&mut conversation, message).await;
    spinner.finish_and_clear();

    let Some(turn) = turn else {
        warn!("Empty message, nothing sent");
        eprintln!("{}", style("Nothing to send: the message is empty.").dim());
        return Ok(());
    };

    for event in turn.display_events() {
        println!("{}", styled(&event));
    }

    if let Err(failure) = &turn.outcome {
        error!("{} request failed: {}", turn.intent, failure);
        anyhow::bail!("{} request failed: {}", turn.intent, failure);
    }

    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) {
    println!("{}", style("chatpix status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    let file_state = if loader.config_path().exists() {
        style("present").green()
    } else {
        style("missing (using defaults)").dim()
    };
    println!("  Config file: {}", file_state);
    println!("  Log directory: {}", config.logging.dir);
    println!();

    println!("{}", style("Provider:").bold());
    println!("  Endpoint: {}", config.provider.api_base);
    let key_state = if config.require_api_key().is_ok() {
        style("configured").green()
    } else {
        style("not configured").red()
    };
    println!("  API key: {}", key_state);
    println!();

    println!("{}", style("Models:").bold());
    println!("  Chat: {}", config.chat.model);
    println!(
        "  Image: {} ({}, {} per request)",
        config.image.model, config.image.size, config.image.count
    );
}

fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to chatpix!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_path();
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let mut config = Config::default();

    config.provider.api_key = Password::new()
        .with_prompt("Enter your OpenAI API key")
        .interact()?;
    config.provider.api_base = Input::new()
        .with_prompt("API base URL")
        .default(config.provider.api_base.clone())
        .interact_text()?;
    config.chat.model = Input::new()
        .with_prompt("Chat model")
        .default(config.chat.model.clone())
        .interact_text()?;
    config.image.model = Input::new()
        .with_prompt("Image model")
        .default(config.image.model.clone())
        .interact_text()?;

    config.require_api_key()?;
    validate_config(&config)?;
    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Open the chat window", style("chatpix chat").cyan());
    println!(
        "  {} - Send a single message",
        style("chatpix send --message 'Hello!'").cyan()
    );

    Ok(())
}
