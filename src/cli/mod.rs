//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, assembles the chat adapter from
//! configuration and stored preferences, and dispatches to the chosen command.

pub mod chat;
pub mod say;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::backend::http::HttpLoader;
use crate::backend::{BackendLoader, UnconfiguredLoader};
use crate::core::adapter::ChatAdapter;
use crate::core::config::{config_dir, Config};
use crate::core::demo::DemoPacing;
use crate::core::preferences::file::PREFERENCES_FILE_NAME;
use crate::core::preferences::{FileStore, MemoryStore, Settings};
use crate::core::status::ConnectivityStatus;
use crate::utils::logging::LoggingState;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("VERGEN_GIT_SHA"),
    ")"
);

#[derive(Parser)]
#[command(name = "chatbridge", version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat client with an offline demo fallback")]
#[command(
    long_about = "Chatbridge streams chat replies from an OpenAI-compatible backend. \
When no backend is configured or it cannot be reached, replies come from a built-in \
demo generator instead, so the chat loop always answers.\n\n\
Environment Variables:\n\
  CHATBRIDGE_BACKEND_URL   Backend base URL (overrides backend_url in config.toml)\n\
  RUST_LOG                 Diagnostic log filter (defaults to warn, printed on stderr)\n\n\
Chat commands:\n\
  /model <id>       Switch model and reconnect\n\
  /key <value>      Store an API key (used on the next reconnect)\n\
  /key              Remove the stored API key\n\
  /status           Show connectivity, model and key status\n\
  /log <filename>   Enable transcript logging to the specified file\n\
  /log              Toggle transcript logging pause/resume\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Append the conversation transcript to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Keep preferences in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat loop (default)
    Chat,
    /// Send a single prompt and stream the reply to stdout
    Say {
        /// Prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set a preference or configuration value, or print configuration when no value is given
    Set {
        /// One of: model, credential, backend-url
        key: String,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset a preference or configuration value
    Unset {
        /// One of: credential, backend-url
        key: String,
    },
    /// Wait for the backend to initialize and print connectivity status
    Status,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let config = Config::load()?;
            let adapter = build_adapter(&config, args.ephemeral)?;
            let logging = LoggingState::new(args.log)?;
            chat::run_chat(adapter, logging, config.resolved_backend_url()).await
        }
        Commands::Say { prompt } => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                eprintln!("Usage: chatbridge say <prompt>");
                std::process::exit(1);
            }
            let config = Config::load()?;
            let adapter = build_adapter(&config, args.ephemeral)?;
            let logging = LoggingState::new(args.log)?;
            say::run_say(adapter, logging, prompt).await
        }
        Commands::Set { key, value } => {
            let value = value.map(|parts| parts.join(" ")).filter(|v| !v.is_empty());
            handle_set(&key, value, args.ephemeral)
        }
        Commands::Unset { key } => handle_unset(&key, args.ephemeral),
        Commands::Status => {
            let config = Config::load()?;
            let adapter = build_adapter(&config, args.ephemeral)?;
            adapter.wait_until_settled().await;
            print_status(&adapter, &config);
            Ok(())
        }
    }
}

fn handle_set(key: &str, value: Option<String>, ephemeral: bool) -> Result<(), Box<dyn Error>> {
    let Some(value) = value else {
        let config = Config::load()?;
        config.print_all();
        let settings = open_settings(ephemeral)?;
        println!("  model: {}", settings.model());
        println!("  credential: {}", credential_label(settings.has_credential()));
        return Ok(());
    };

    match key {
        "model" => {
            open_settings(ephemeral)?.set_model(&value);
            println!("✅ Set model to: {value}");
        }
        "credential" => {
            open_settings(ephemeral)?.set_credential(Some(&value));
            println!("✅ Stored API key");
        }
        "backend-url" => {
            let mut config = Config::load()?;
            config.backend_url = Some(value.clone());
            config.save()?;
            println!("✅ Set backend-url to: {value}");
        }
        _ => {
            eprintln!("❌ Unknown config key: {key}");
            eprintln!("   Valid keys: model, credential, backend-url");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn handle_unset(key: &str, ephemeral: bool) -> Result<(), Box<dyn Error>> {
    match key {
        "credential" => {
            open_settings(ephemeral)?.set_credential(None);
            println!("✅ Removed API key");
        }
        "backend-url" => {
            let mut config = Config::load()?;
            config.backend_url = None;
            config.save()?;
            println!("✅ Unset backend-url");
        }
        _ => {
            eprintln!("❌ Unknown config key: {key}");
            eprintln!("   Valid keys: credential, backend-url");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Preferences backed by `preferences.toml` next to the config file, or by
/// memory alone for ephemeral sessions.
pub fn open_settings(ephemeral: bool) -> Result<Settings, Box<dyn Error>> {
    if ephemeral {
        return Ok(Settings::new(Arc::new(MemoryStore::new())));
    }
    let path = config_dir()?.join(PREFERENCES_FILE_NAME);
    Ok(Settings::new(Arc::new(FileStore::new(path))))
}

pub fn build_loader(config: &Config) -> Result<Arc<dyn BackendLoader>, Box<dyn Error>> {
    match config.resolved_backend_url() {
        Some(url) => Ok(Arc::new(HttpLoader::with_connect_timeout(
            url,
            config.connect_timeout(),
        )?)),
        None => Ok(Arc::new(UnconfiguredLoader)),
    }
}

/// Starts the adapter; initialization proceeds in the background.
pub fn build_adapter(config: &Config, ephemeral: bool) -> Result<ChatAdapter, Box<dyn Error>> {
    let settings = open_settings(ephemeral)?;
    let loader = build_loader(config)?;
    Ok(ChatAdapter::with_pacing(
        settings,
        loader,
        DemoPacing::from_config(&config.demo),
    ))
}

pub(crate) fn credential_label(has_credential: bool) -> &'static str {
    if has_credential {
        "API key set"
    } else {
        "No key (may use public limits)"
    }
}

pub(crate) fn status_lines(adapter: &ChatAdapter, backend: Option<&str>) -> Vec<String> {
    let status = adapter.status();
    let mut lines = vec![format!("Status: {}", status.label())];
    if status == ConnectivityStatus::Fallback {
        lines.push("  Replies come from the offline demo generator.".to_string());
    }
    lines.push(format!(
        "Backend: {}",
        backend.unwrap_or("(none configured)")
    ));
    if let Some(version) = adapter.sdk_version() {
        lines.push(format!("SDK version: {version}"));
    }
    lines.push(format!("Model: {}", adapter.model()));
    lines.push(format!(
        "Credential: {}",
        credential_label(adapter.has_credential())
    ));
    lines
}

fn print_status(adapter: &ChatAdapter, config: &Config) {
    let backend = config.resolved_backend_url();
    for line in status_lines(adapter, backend.as_deref()) {
        println!("{line}");
    }
}
