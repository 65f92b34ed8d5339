//! Request-level card service
//!
//! [`CardService`] is built once at startup and shared (behind an `Arc`) by
//! every request handler. It owns the cache, settings store, name index and
//! remote client; nothing here is process-global.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheLookup, CacheStats, CatalogCache};
use crate::card::{CanonicalCard, CardNormalizer, ManaGlyphs, RawCard};
use crate::compositor;
use crate::config::BotConfig;
use crate::error::{AmoeboidError, InputError, Result};
use crate::format::{self, ArtView, Embed};
use crate::query::{extract_queries, Query, Wrapping};
use crate::remote::{CatalogBackend, FetchedCard, RateLimiter, RemoteCatalogClient, Ruling};
use crate::resolver::NameResolver;
use crate::settings::SettingsStore;
use crate::store::Database;

/// Shortest partial name worth completing
pub const MIN_AUTOCOMPLETE_CHARS: usize = 3;

/// Who issued a settings command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor {
    pub is_admin: bool,
}

impl Actor {
    pub fn admin() -> Self {
        Self { is_admin: true }
    }

    pub fn member() -> Self {
        Self { is_admin: false }
    }
}

/// An incoming chat message, as much of it as the service needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    /// `None` for direct messages
    pub server_id: Option<String>,
    pub content: String,
    pub author_is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What to send back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: Option<String>,
    pub embed: Option<Embed>,
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Not for us: a bot author or no mentions
    Ignored,
    /// Starts with the server's prefix; route to the command layer
    Command { name: String, args: String },
    Reply(Reply),
}

pub struct CardService {
    config: BotConfig,
    db: Arc<Database>,
    cache: CatalogCache,
    settings: SettingsStore,
    remote: RemoteCatalogClient,
    normalizer: CardNormalizer,
    resolver: RwLock<Arc<NameResolver>>,
}

impl CardService {
    pub fn new(
        config: BotConfig,
        db: Arc<Database>,
        backend: Box<dyn CatalogBackend>,
    ) -> Result<Self> {
        let cache = CatalogCache::new(Arc::clone(&db), config.refresh_interval());
        let settings = SettingsStore::new(
            Arc::clone(&db),
            config.default_prefix.clone(),
            config.default_wrapping.clone(),
        );
        let remote = RemoteCatalogClient::new(backend, RateLimiter::new(config.request_spacing()));
        let normalizer = CardNormalizer::new(ManaGlyphs::new(config.mana_glyphs.clone()));
        let resolver = NameResolver::load(&db)?;

        info!(
            backend = remote.backend_name(),
            names = resolver.len(),
            refresh_hours = config.refresh_interval_hours,
            "Card service ready"
        );

        Ok(Self {
            config,
            db,
            cache,
            settings,
            remote,
            normalizer,
            resolver: RwLock::new(Arc::new(resolver)),
        })
    }

    /// Open the configured database file and build the service on it
    pub fn open(config: BotConfig, backend: Box<dyn CatalogBackend>) -> Result<Self> {
        let db = Arc::new(Database::open(&config.db_path)?);
        Self::new(config, db, backend)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    fn resolver(&self) -> Arc<NameResolver> {
        let guard = self.resolver.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn corpus_size(&self) -> usize {
        self.resolver().len()
    }

    /// Canonical name to look up for free text
    ///
    /// Without a name index, or when nothing in it is close enough, the text
    /// goes upstream as typed and the catalog's own fuzzy matching decides.
    fn resolve_name(&self, raw_name: &str) -> String {
        let resolver = self.resolver();
        if resolver.is_empty() {
            return raw_name.trim().to_string();
        }
        match resolver.resolve(raw_name) {
            Ok(name) => name,
            Err(_) => {
                debug!(query = %raw_name, "No close name in index; using query as typed");
                raw_name.trim().to_string()
            }
        }
    }

    /// Look up one card: cache first, then the remote catalog
    #[instrument(skip(self), fields(card = %query.raw_name))]
    pub async fn get_card(&self, query: &Query) -> Result<FetchedCard> {
        if query.raw_name.trim().is_empty() {
            return Err(InputError::EmptyQuery.into());
        }
        let name = self.resolve_name(&query.raw_name);

        let lookup = match self.cache.lookup(&name, query) {
            Err(e @ AmoeboidError::MalformedRecord { .. }) => {
                warn!(card = %name, error = %e, "Unreadable cache entry; refetching");
                CacheLookup::Miss
            }
            other => other?,
        };
        let stale = match lookup {
            CacheLookup::Fresh(entry) => return Ok(entry.into()),
            CacheLookup::Stale(entry) => Some(entry),
            CacheLookup::Miss => None,
        };

        match self.remote.fetch_card(&name, query).await {
            Ok(fetched) => {
                if !query.has_parameters() {
                    self.cache
                        .upsert(&fetched.canonical_name, &fetched.record, &fetched.image_bytes)?;
                }
                Ok(fetched)
            }
            Err(e) => match stale {
                Some(entry) if self.config.serve_stale_on_error => {
                    warn!(
                        card = %entry.canonical_name,
                        error = %e,
                        "Refresh failed; serving stale cache entry"
                    );
                    Ok(entry.into())
                }
                _ => Err(e),
            },
        }
    }

    /// Batch lookup in input order; cards that cannot be found are left out
    pub async fn get_cards(&self, queries: &[Query]) -> Result<Vec<FetchedCard>> {
        let mut cards = Vec::with_capacity(queries.len());
        for query in queries {
            match self.get_card(query).await {
                Ok(card) => cards.push(card),
                Err(e) if e.is_per_item() => {
                    warn!(query = %query.raw_name, error = %e, "Skipping card");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(cards)
    }

    /// Batch lookup plus normalization; malformed records are left out
    pub async fn get_canonical_cards(&self, queries: &[Query]) -> Result<Vec<CanonicalCard>> {
        let fetched = self.get_cards(queries).await?;
        let mut cards = Vec::with_capacity(fetched.len());
        for card in fetched {
            match self.normalizer.normalize(&card.record, card.image_bytes) {
                Ok(canonical) => cards.push(canonical),
                Err(e) => warn!(card = %card.canonical_name, error = %e, "Skipping card"),
            }
        }
        Ok(cards)
    }

    pub async fn get_rulings(&self, rulings_uri: &str) -> Vec<Ruling> {
        self.remote.fetch_rulings(rulings_uri).await
    }

    /// Name completions; short or failed lookups yield nothing
    pub async fn get_autocomplete(&self, partial: &str) -> Vec<String> {
        let partial = partial.trim();
        if partial.chars().count() < MIN_AUTOCOMPLETE_CHARS {
            return Vec::new();
        }
        match self.remote.fetch_autocomplete(partial).await {
            Ok(names) => names,
            Err(e) => {
                warn!(partial = %partial, error = %e, "Autocomplete failed");
                Vec::new()
            }
        }
    }

    /// Artwork for a card, optionally from a specific set
    pub async fn get_art(&self, name: &str, set_code: Option<&str>) -> Result<ArtView> {
        let query = Query::new(name).with_set(set_code);
        let fetched = self.get_card(&query).await?;
        let raw = RawCard::from_value(&fetched.record)?;

        let art_url = raw
            .art_crop()
            .ok_or_else(|| AmoeboidError::malformed(&raw.name, "no art crop image"))?
            .to_string();

        Ok(ArtView {
            set_code: query.set_code().map(str::to_string),
            art_url,
            artist: raw.artist().map(str::to_string),
            flavor_text: raw.flavor().map(str::to_string),
            source_uri: raw.scryfall_uri.clone(),
            name: raw.name,
        })
    }

    /// Single-card reply with the card image attached
    pub async fn card_reply(&self, name: &str, set_code: Option<&str>) -> Result<Reply> {
        let query = Query::new(name).with_set(set_code);
        let mut cards = self.get_canonical_cards(std::slice::from_ref(&query)).await?;

        match cards.pop() {
            Some(card) => Ok(single_card_reply(card)),
            None => Ok(Reply::text(format!(
                "No card found named `{}` with those details",
                name.trim()
            ))),
        }
    }

    pub async fn rulings_for(&self, name: &str) -> Result<Reply> {
        let query = Query::new(name);
        let fetched = match self.get_card(&query).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_per_item() => {
                return Ok(Reply::text(format!("Card with name `{}` not found.", name.trim())))
            }
            Err(e) => return Err(e),
        };

        let raw = RawCard::from_value(&fetched.record)?;
        let Some(rulings_uri) = raw.rulings_uri.as_deref() else {
            return Ok(Reply::text(format!("Card with name `{}` not found.", name.trim())));
        };

        let rulings = self.get_rulings(rulings_uri).await;
        if rulings.is_empty() {
            return Ok(Reply::text(format!("Could not find rulings for `{}`.", raw.name)));
        }

        Ok(Reply::embed(format::rulings_embed(
            &raw.name,
            raw.scryfall_uri.as_deref(),
            &rulings,
        )))
    }

    pub async fn art_reply(&self, name: &str, set_code: Option<&str>) -> Result<Reply> {
        match self.get_art(name, set_code).await {
            Ok(art) => Ok(Reply::embed(format::art_embed(&art))),
            Err(AmoeboidError::MalformedRecord { name, .. }) => Ok(Reply::text(format!(
                "No art image found for card with name `{name}`."
            ))),
            Err(e) if e.is_per_item() => Ok(Reply::text(match set_code {
                Some(set) => format!(
                    "No card with name `{}` from set `{}` found.",
                    name.trim(),
                    set.to_uppercase()
                ),
                None => format!("No card with name `{}` found.", name.trim()),
            })),
            Err(e) => Err(e),
        }
    }

    /// React to a chat message
    ///
    /// Input problems (too many mentions, malformed parameters) come back as a
    /// plain-text reply rather than an error.
    #[instrument(skip(self, message), fields(server = ?message.server_id))]
    pub async fn handle_message(&self, message: &MessageContext) -> Result<MessageOutcome> {
        if message.author_is_bot {
            return Ok(MessageOutcome::Ignored);
        }

        let (prefix, wrapping) = match &message.server_id {
            Some(server_id) => {
                let settings = self.settings.get(server_id)?;
                (settings.command_prefix, settings.wrapping_pattern)
            }
            None => (
                self.config.default_prefix.clone(),
                self.config.default_wrapping.clone(),
            ),
        };

        if let Some(rest) = message.content.strip_prefix(prefix.as_str()) {
            let rest = rest.trim();
            let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if !name.is_empty() {
                return Ok(MessageOutcome::Command {
                    name: name.to_lowercase(),
                    args: args.trim().to_string(),
                });
            }
        }

        let wrapping = Wrapping::parse(&wrapping)?;
        if wrapping.mentions(&message.content).is_empty() {
            return Ok(MessageOutcome::Ignored);
        }

        let queries =
            match extract_queries(&message.content, &wrapping, self.config.max_cards_per_message) {
                Ok(queries) => queries,
                Err(e) => {
                    debug!(error = %e, "Rejected message");
                    return Ok(MessageOutcome::Reply(Reply::text(e.to_string())));
                }
            };

        let mut cards = self.get_canonical_cards(&queries).await?;
        let reply = if cards.len() > 1 {
            batch_reply(&cards).unwrap_or_else(|e| {
                warn!(error = %e, "Could not compose batch image");
                Reply::text(retrieved_text(cards.len()))
            })
        } else {
            match cards.pop() {
                Some(card) => single_card_reply(card),
                None => Reply::text("Could not find any cards."),
            }
        };
        Ok(MessageOutcome::Reply(reply))
    }

    /// Run a prefixed command
    ///
    /// Unknown commands yield `None`. User-facing failures (bad input, missing
    /// permission) become text replies.
    pub async fn handle_command(
        &self,
        actor: &Actor,
        server_id: Option<&str>,
        name: &str,
        args: &str,
    ) -> Result<Option<Reply>> {
        let value = Some(args.trim()).filter(|v| !v.is_empty());

        let result = match name {
            "prefix" | "wrapping" => match server_id {
                Some(server_id) => {
                    let text = if name == "prefix" {
                        self.prefix(actor, server_id, value)
                    } else {
                        self.wrapping(actor, server_id, value)
                    };
                    text.map(Reply::text)
                }
                None => Ok(Reply::text("This command can only be used in a server.")),
            },
            "card" => match value {
                Some(value) => {
                    let (card, set) = split_set_argument(value);
                    self.card_reply(card, set).await
                }
                None => Err(InputError::EmptyQuery.into()),
            },
            "art" => match value {
                Some(value) => {
                    let (card, set) = split_set_argument(value);
                    self.art_reply(card, set).await
                }
                None => Err(InputError::EmptyQuery.into()),
            },
            "rulings" => match value {
                Some(value) => self.rulings_for(value).await,
                None => Err(InputError::EmptyQuery.into()),
            },
            _ => return Ok(None),
        };

        match result {
            Ok(reply) => Ok(Some(reply)),
            Err(e) if e.is_user_facing() => Ok(Some(Reply::text(e.to_string()))),
            Err(e) => Err(e),
        }
    }

    /// View or change a server's command prefix
    pub fn prefix(&self, actor: &Actor, server_id: &str, value: Option<&str>) -> Result<String> {
        require_admin(actor, "prefix")?;
        match value {
            None => Ok(format!(
                "The bot's prefix for this server is currently `{}`.",
                self.settings.get_prefix(server_id)?
            )),
            Some(prefix) => {
                self.settings.set_prefix(server_id, prefix)?;
                Ok(format!("Bot prefix changed to `{}`.", prefix.trim()))
            }
        }
    }

    /// View or change a server's mention wrapping
    pub fn wrapping(&self, actor: &Actor, server_id: &str, value: Option<&str>) -> Result<String> {
        require_admin(actor, "wrapping")?;
        match value {
            None => Ok(format!(
                "The bot's wrapping for this server is currently `{}`.",
                self.settings.get_wrapping(server_id)?
            )),
            Some(wrapping) => {
                self.settings.set_wrapping(server_id, wrapping)?;
                Ok(format!("Bot wrapping changed to `{}`.", wrapping.trim()))
            }
        }
    }

    /// Replace the name index with `names`
    pub fn load_name_corpus<I, S>(&self, names: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stored = NameResolver::store_corpus(&self.db, names)?;
        let resolver = NameResolver::load(&self.db)?;
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(resolver);
        Ok(stored)
    }

    /// Rebuild the name index from the remote catalog's full name list
    pub async fn refresh_name_corpus(&self) -> Result<usize> {
        let names = self.remote.fetch_card_names().await?;
        info!(names = names.len(), "Downloaded card name catalog");
        self.load_name_corpus(names)
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.clear()
    }
}

fn require_admin(actor: &Actor, command: &str) -> Result<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(AmoeboidError::PermissionDenied {
            command: command.to_string(),
        })
    }
}

/// `Name; set=abc` style argument for single-card commands
fn split_set_argument(value: &str) -> (&str, Option<&str>) {
    match value.split_once(';') {
        Some((name, rest)) => {
            let set = rest
                .split(';')
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("set"))
                .map(|(_, set)| set.trim())
                .filter(|set| !set.is_empty());
            (name.trim(), set)
        }
        None => (value.trim(), None),
    }
}

fn attachment_filename(stem: &str, bytes: &[u8]) -> String {
    let extension = match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        _ => "jpg",
    };
    format!("{stem}.{extension}")
}

fn single_card_reply(card: CanonicalCard) -> Reply {
    let filename = attachment_filename("card", &card.image_bytes);
    let embed = format::card_embed(&card, Some(&format!("attachment://{filename}")));
    Reply {
        text: None,
        embed: Some(embed),
        attachment: Some(Attachment {
            filename,
            bytes: card.image_bytes,
        }),
    }
}

fn retrieved_text(count: usize) -> String {
    format!("Retrieved {count} cards. Call a single card for more details.")
}

fn batch_reply(cards: &[CanonicalCard]) -> Result<Reply> {
    let images = cards
        .iter()
        .map(|card| compositor::decode(&card.image_bytes))
        .collect::<Result<Vec<_>>>()?;
    let bytes = compositor::encode_png(&compositor::compose_batch(&images))?;

    Ok(Reply {
        text: Some(retrieved_text(cards.len())),
        embed: None,
        attachment: Some(Attachment {
            filename: "cards.png".to_string(),
            bytes,
        }),
    })
}
