//! Amoeboid Core - card lookup engine for the Amoeboid chat bot
//!
//! Recognises card mentions in chat messages, resolves them against a local
//! name index, serves them from a SQLite cache that fronts the Scryfall API,
//! and renders replies with embeds and stitched card images.
//!
//! The chat-platform connection itself lives outside this crate; it hands
//! messages to [`CardService`] and sends back the [`Reply`] it gets.

pub mod cache;
pub mod card;
pub mod compositor;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod remote;
pub mod resolver;
pub mod service;
pub mod settings;
pub mod store;

pub use cache::{CacheEntry, CacheLookup, CacheStats, CatalogCache};
pub use card::{CanonicalCard, CardLayout, CardNormalizer, ManaGlyphs, RawCard, Rgb};
pub use config::BotConfig;
pub use error::{AmoeboidError, InputError, Result};
pub use format::{ArtView, Embed, EmbedField};
pub use query::{extract_queries, Query, Wrapping};
pub use remote::{CatalogBackend, FetchedCard, RateLimiter, RemoteCatalogClient, Ruling};
#[cfg(feature = "scryfall")]
pub use remote::ScryfallBackend;
pub use resolver::NameResolver;
pub use service::{Actor, Attachment, CardService, MessageContext, MessageOutcome, Reply};
pub use settings::{GuildSettings, SettingsStore};
pub use store::Database;
