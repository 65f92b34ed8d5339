//! Amoeboid - card lookup bot for trading card game chat servers
//!
//! Drives the card service from a terminal: feed it chat messages as a server
//! would, look up cards directly, manage per-server settings and maintain the
//! local card store.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use amoeboid_core::{
    Actor, BotConfig, CardService, Embed, MessageContext, MessageOutcome, Reply, ScryfallBackend,
};

mod cache_cli;
mod settings_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "amoeboid",
    about = "Card lookup bot for trading card game chat servers",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines on stderr
    #[clap(long, global = true)]
    json_logs: bool,

    /// Configuration file (falls back to $AMOEBOID_CONFIG)
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Process a chat message the way the bot would
    Message {
        /// Message text, e.g. "look at [[Lightning Bolt]]"
        content: String,

        /// Server the message was posted in (omit for a direct message)
        #[clap(long)]
        server: Option<String>,

        /// Treat the author as a server administrator
        #[clap(long)]
        admin: bool,

        /// Treat the author as a bot
        #[clap(long)]
        from_bot: bool,

        /// Write any attached image into this directory
        #[clap(long)]
        save_attachment: Option<PathBuf>,
    },

    /// Look up a single card
    Card {
        name: String,

        /// Printing from a specific set
        #[clap(long)]
        set: Option<String>,

        /// Write the card image into this directory
        #[clap(long)]
        save_attachment: Option<PathBuf>,
    },

    /// Show official rulings for a card
    Rulings { name: String },

    /// Show a card's artwork
    Art {
        name: String,

        /// Artwork from a specific set
        #[clap(long)]
        set: Option<String>,
    },

    /// Complete a partial card name
    Autocomplete { partial: String },

    /// Rebuild the fuzzy name index
    Index {
        /// JSON array of card names to index instead of downloading the catalog
        #[clap(long)]
        file: Option<PathBuf>,
    },

    /// View or change per-server settings
    Settings {
        #[clap(subcommand)]
        command: settings_cli::SettingsCommand,
    },

    /// Inspect or clear the card cache
    Cache {
        #[clap(subcommand)]
        command: cache_cli::CacheCommand,
    },
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr so replies on stdout stay machine-readable.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_service(config_path: Option<&Path>) -> Result<CardService> {
    let config = BotConfig::load(config_path)?;
    debug!(
        db = %config.db_path.display(),
        api = %config.api_base_url,
        "Loaded configuration"
    );

    let backend = ScryfallBackend::new(config.api_base_url.clone(), config.request_timeout())?;
    let db_path = config.db_path.clone();
    CardService::open(config, Box::new(backend))
        .with_context(|| format!("Failed to open card store at {}", db_path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.json_logs);

    let service = build_service(cli.config.as_deref())?;

    match cli.command {
        Command::Message {
            content,
            server,
            admin,
            from_bot,
            save_attachment,
        } => {
            let message = MessageContext {
                server_id: server,
                content,
                author_is_bot: from_bot,
            };
            let actor = if admin { Actor::admin() } else { Actor::member() };
            message_command(&service, &message, &actor, save_attachment.as_deref()).await
        }
        Command::Card {
            name,
            set,
            save_attachment,
        } => {
            let reply = service.card_reply(&name, set.as_deref()).await?;
            print_reply(&reply, save_attachment.as_deref())
        }
        Command::Rulings { name } => {
            let reply = service.rulings_for(&name).await?;
            print_reply(&reply, None)
        }
        Command::Art { name, set } => {
            let reply = service.art_reply(&name, set.as_deref()).await?;
            print_reply(&reply, None)
        }
        Command::Autocomplete { partial } => {
            let names = service.get_autocomplete(&partial).await;
            println!("{}", serde_json::to_string_pretty(&names)?);
            Ok(())
        }
        Command::Index { file } => index_command(&service, file.as_deref()).await,
        Command::Settings { command } => command.execute(&service),
        Command::Cache { command } => command.execute(&service),
    }
}

async fn message_command(
    service: &CardService,
    message: &MessageContext,
    actor: &Actor,
    save_attachment: Option<&Path>,
) -> Result<()> {
    match service.handle_message(message).await? {
        MessageOutcome::Ignored => {
            info!("Message ignored");
            Ok(())
        }
        MessageOutcome::Command { name, args } => {
            debug!(command = %name, args = %args, "Routing command");
            match service
                .handle_command(actor, message.server_id.as_deref(), &name, &args)
                .await?
            {
                Some(reply) => print_reply(&reply, save_attachment),
                None => {
                    info!(command = %name, "Unknown command");
                    Ok(())
                }
            }
        }
        MessageOutcome::Reply(reply) => print_reply(&reply, save_attachment),
    }
}

async fn index_command(service: &CardService, file: Option<&Path>) -> Result<()> {
    let stored = match file {
        Some(path) => {
            let names = read_names(path)?;
            service.load_name_corpus(names)?
        }
        None => service
            .refresh_name_corpus()
            .await
            .context("Failed to download the card name catalog")?,
    };

    println!("Indexed {stored} card names");
    Ok(())
}

fn read_names(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read name file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Expected a JSON array of names in {}", path.display()))
}

#[derive(Serialize)]
struct AttachmentView<'a> {
    filename: &'a str,
    bytes: usize,
}

/// JSON shape of a reply on stdout; attachment bytes are summarised
#[derive(Serialize)]
struct ReplyView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<&'a Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentView<'a>>,
}

impl<'a> From<&'a Reply> for ReplyView<'a> {
    fn from(reply: &'a Reply) -> Self {
        Self {
            text: reply.text.as_deref(),
            embed: reply.embed.as_ref(),
            attachment: reply.attachment.as_ref().map(|a| AttachmentView {
                filename: &a.filename,
                bytes: a.bytes.len(),
            }),
        }
    }
}

fn print_reply(reply: &Reply, save_attachment: Option<&Path>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ReplyView::from(reply))?);

    if let (Some(dir), Some(attachment)) = (save_attachment, &reply.attachment) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        let path = dir.join(&attachment.filename);
        fs::write(&path, &attachment.bytes)
            .with_context(|| format!("Failed to write attachment: {}", path.display()))?;
        info!(path = %path.display(), "Saved attachment");
    }
    Ok(())
}
