//! Reply formatting
//!
//! Builds platform-neutral embeds; the chat layer maps them onto whatever its
//! message API expects.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::card::{CanonicalCard, Rgb};
use crate::remote::Ruling;

/// Formats listed in the legality field, in display order
pub const TRACKED_FORMATS: &[(&str, &str)] = &[
    ("standard", "Standard"),
    ("pioneer", "Pioneer"),
    ("modern", "Modern"),
    ("legacy", "Legacy"),
    ("vintage", "Vintage"),
    ("commander", "Commander"),
    ("historic", "Historic"),
    ("pauper", "Pauper"),
];

const MAX_DESCRIPTION_CHARS: usize = 2048;
const TRUNCATED_DESCRIPTION_CHARS: usize = 1900;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// A rich reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub color: Option<Rgb>,
    pub fields: Vec<EmbedField>,
    pub image: Option<String>,
    pub footer: Option<String>,
}

impl Embed {
    fn field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push(EmbedField {
            name: name.to_string(),
            value: value.into(),
        });
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Oracle text, then italic flavor, then a link to the card page
///
/// The link is only added when there is text to go with it.
pub fn describe(card: &CanonicalCard) -> String {
    let mut description = card.oracle_text.clone().unwrap_or_default();

    if let Some(flavor) = &card.flavor_text {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&format!("*{flavor}*"));
    }

    if !description.is_empty() {
        description.push_str(&format!("\n\n[View on Scryfall]({})", card.source_uri));
    }
    description
}

pub fn format_prices(prices: &BTreeMap<String, Option<String>>) -> String {
    let price = |key: &str| {
        prices
            .get(key)
            .and_then(Option::as_deref)
            .filter(|value| !value.is_empty())
    };

    let normal = match price("usd") {
        Some(usd) => format!("Normal: {usd} USD"),
        None => "Normal: N/A".to_string(),
    };
    let foil = match price("usd_foil") {
        Some(usd) => format!("Foil: {usd} USD"),
        None => "Foil: N/A".to_string(),
    };
    format!("{normal}\n{foil}")
}

fn legality_glyph(status: Option<&str>) -> &'static str {
    match status {
        Some("legal") => "🟢",
        Some("not_legal") => "🔴",
        Some("restricted") => "🟡",
        Some("banned") => "❌",
        _ => "❓",
    }
}

pub fn format_legalities(legalities: &BTreeMap<String, String>) -> String {
    TRACKED_FORMATS
        .iter()
        .map(|(key, label)| {
            let status = legalities.get(*key).map(String::as_str);
            format!("{label}: {}", legality_glyph(status))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full card embed; `image` is usually an attachment reference
pub fn card_embed(card: &CanonicalCard, image: Option<&str>) -> Embed {
    let description = describe(card);
    let mut embed = Embed {
        title: card.name.clone(),
        url: (!card.source_uri.is_empty()).then(|| card.source_uri.clone()),
        description: (!description.is_empty()).then_some(description),
        color: Some(card.color_identity),
        image: image.map(str::to_string),
        ..Default::default()
    };

    if let Some(cost) = card.formatted_cost_string.as_deref().filter(|c| !c.is_empty()) {
        embed.field("Cost:", cost);
    }
    if let Some(type_line) = &card.type_line {
        embed.field("Type:", type_line.as_str());
    }
    if let Some(loyalty) = &card.loyalty {
        embed.field("Loyalty:", loyalty.as_str());
    }
    if let Some(power) = &card.power {
        let toughness = card.toughness.as_deref().unwrap_or("?");
        embed.field("Stats:", format!("{power}/{toughness}"));
    }
    if let (Some(code), Some(name)) = (&card.set_code, &card.set_name) {
        embed.field("Set:", format!("[{}] {name}", code.to_uppercase()));
    }
    if let Some(prices) = &card.prices {
        embed.field("Prices:", format_prices(prices));
    }
    if let Some(legalities) = &card.legalities {
        embed.field("Legalities:", format_legalities(legalities));
    }

    embed
}

/// Official rulings for a card, newest last, truncated to fit one embed
pub fn rulings_embed(card_name: &str, source_uri: Option<&str>, rulings: &[Ruling]) -> Embed {
    let blocks: String = rulings
        .iter()
        .filter(|ruling| ruling.source == "wotc")
        .map(|ruling| {
            format!(
                "**{}**: {}\n\n",
                ruling.published_at.format("%m/%d/%Y"),
                ruling.comment
            )
        })
        .collect();

    let mut description = blocks.trim().to_string();
    if blocks.chars().count() > MAX_DESCRIPTION_CHARS {
        description = description.chars().take(TRUNCATED_DESCRIPTION_CHARS).collect();
        description.push_str(&format!(
            "...\n\n[View Full Rulings on Scryfall]({})",
            source_uri.unwrap_or_default()
        ));
    }

    Embed {
        title: format!("Rulings for {card_name}"),
        url: source_uri.map(str::to_string),
        description: Some(description),
        ..Default::default()
    }
}

/// Artwork lookup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtView {
    pub name: String,
    pub set_code: Option<String>,
    pub art_url: String,
    pub artist: Option<String>,
    pub flavor_text: Option<String>,
    pub source_uri: Option<String>,
}

pub fn art_embed(art: &ArtView) -> Embed {
    let title = match &art.set_code {
        Some(set) => format!("{} ({})", art.name, set.to_uppercase()),
        None => art.name.clone(),
    };

    Embed {
        title,
        url: art.source_uri.clone(),
        description: art.flavor_text.as_ref().map(|flavor| format!("*{flavor}*")),
        image: Some(art.art_url.clone()),
        footer: Some(format!(
            "{} — ™ and © Wizards of the Coast",
            art.artist.as_deref().unwrap_or("Unknown artist")
        )),
        ..Default::default()
    }
}
