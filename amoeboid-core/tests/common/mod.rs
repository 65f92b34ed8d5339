//! Shared fixtures for the integration tests
//!
//! `RecordingBackend` serves canned Scryfall records and counts every call so
//! tests can assert exactly how much network traffic a request caused.

#![allow(dead_code)]

use amoeboid_core::{
    AmoeboidError, BotConfig, CardService, CatalogBackend, Database, Result, Ruling,
};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A small solid PNG
pub fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
    amoeboid_core::compositor::encode_png(&image).unwrap()
}

pub fn normal_card(name: &str, type_line: &str, colors: &[&str]) -> Value {
    let slug = name.to_lowercase().replace(' ', "-");
    json!({
        "object": "card",
        "name": name,
        "layout": "normal",
        "mana_cost": "{R}",
        "type_line": type_line,
        "oracle_text": format!("{name} does something."),
        "color_identity": colors,
        "image_uris": {
            "normal": format!("https://img.test/{slug}.png"),
            "art_crop": format!("https://img.test/{slug}-art.jpg")
        },
        "scryfall_uri": format!("https://scryfall.test/card/{slug}"),
        "rulings_uri": format!("https://api.test/cards/{slug}/rulings"),
        "set": "m10",
        "set_name": "Magic 2010",
        "prices": {"usd": "1.00", "usd_foil": null},
        "legalities": {"modern": "legal", "standard": "not_legal"},
        "artist": "Christopher Moeller"
    })
}

#[derive(Default)]
pub struct RecordingBackend {
    cards: Mutex<HashMap<String, Value>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
    rulings: Mutex<HashMap<String, Vec<Ruling>>>,
    failing: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    /// Register a card and a PNG for every image URL it mentions
    pub fn with_card(self, record: Value) -> Self {
        let name = record["name"].as_str().unwrap_or_default().to_string();
        let mut urls = Vec::new();
        if let Some(url) = record["image_uris"]["normal"].as_str() {
            urls.push(url.to_string());
        }
        if let Some(faces) = record["card_faces"].as_array() {
            for face in faces {
                if let Some(url) = face["image_uris"]["normal"].as_str() {
                    urls.push(url.to_string());
                }
            }
        }
        for (i, url) in urls.into_iter().enumerate() {
            self.images
                .lock()
                .unwrap()
                .insert(url, png(16, 22, 40 + i as u8));
        }
        self.cards.lock().unwrap().insert(name, record);
        self
    }

    /// Serve `bytes` for `url`, replacing any generated image
    pub fn with_image(self, url: &str, bytes: &[u8]) -> Self {
        self.images
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn with_rulings(self, uri: &str, rulings: Vec<Ruling>) -> Self {
        self.rulings.lock().unwrap().insert(uri.to_string(), rulings);
        self
    }

    /// Make every subsequent call fail as a transient error
    pub fn fail_all(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn named_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("named:")).count()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if *self.failing.lock().unwrap() {
            return Err(AmoeboidError::Transient("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogBackend for RecordingBackend {
    async fn named(&self, fuzzy: &str, parameters: &[(String, String)]) -> Result<Value> {
        let mut call = format!("named:{fuzzy}");
        if !parameters.is_empty() {
            let params: Vec<String> = parameters.iter().map(|(k, v)| format!("{k}={v}")).collect();
            call.push('?');
            call.push_str(&params.join("&"));
        }
        self.record(call)?;

        let found = self
            .cards
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(fuzzy.trim()))
            .map(|(_, record)| record.clone());
        found.ok_or_else(|| AmoeboidError::NotFound(fuzzy.to_string()))
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>> {
        self.record(format!("image:{url}"))?;
        let image = self.images.lock().unwrap().get(url).cloned();
        image.ok_or_else(|| AmoeboidError::NotFound(url.to_string()))
    }

    async fn rulings(&self, rulings_uri: &str) -> Result<Vec<Ruling>> {
        self.record(format!("rulings:{rulings_uri}"))?;
        let rulings = self.rulings.lock().unwrap().get(rulings_uri).cloned();
        Ok(rulings.unwrap_or_default())
    }

    async fn autocomplete(&self, partial: &str) -> Result<Vec<String>> {
        self.record(format!("autocomplete:{partial}"))?;
        let needle = partial.to_lowercase();
        let mut names: Vec<String> = self
            .cards
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.to_lowercase().starts_with(&needle))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn card_names(&self) -> Result<Vec<String>> {
        self.record("card_names".to_string())?;
        let mut names: Vec<String> = self.cards.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A service on a throwaway database file, with request spacing disabled
pub struct Harness {
    pub service: CardService,
    pub backend: Arc<RecordingBackend>,
    pub db_path: std::path::PathBuf,
    _temp_dir: TempDir,
}

pub fn harness(backend: RecordingBackend) -> Harness {
    harness_with(backend, BotConfig::default())
}

pub fn harness_with(backend: RecordingBackend, config: BotConfig) -> Harness {
    init_test_logging();

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bot.db");
    let config = BotConfig {
        db_path: db_path.clone(),
        request_spacing_ms: 0,
        ..config
    };

    let backend = Arc::new(backend);
    let db = Arc::new(Database::open(&db_path).unwrap());
    let service = CardService::new(config, db, Box::new(Arc::clone(&backend))).unwrap();

    Harness {
        service,
        backend,
        db_path,
        _temp_dir: temp_dir,
    }
}
