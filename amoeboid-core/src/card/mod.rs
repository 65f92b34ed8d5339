//! Card records: the upstream JSON shape and the canonical entity built from it

mod color;
mod layout;
mod mana;
mod normalize;

pub use color::Rgb;
pub use layout::{CardFace, CardLayout};
pub use mana::ManaGlyphs;
pub use normalize::CardNormalizer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AmoeboidError, Result};

/// Image URLs published for a card or one of its faces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub art_crop: Option<String>,
}

/// One face of a multi-faced upstream record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub flavor_text: Option<String>,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub loyalty: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

/// The catalog's native record, single- or multi-faced
///
/// Only the fields this crate reads are modelled; the full JSON is what gets
/// cached, so nothing upstream sends is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCard {
    pub name: String,
    pub layout: String,
    #[serde(default)]
    pub card_faces: Option<Vec<RawFace>>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub flavor_text: Option<String>,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub loyalty: Option<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default)]
    pub prices: Option<BTreeMap<String, Option<String>>>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub legalities: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub scryfall_uri: Option<String>,
    #[serde(default)]
    pub rulings_uri: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

impl RawCard {
    /// Decode a cached or freshly fetched JSON record
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        serde_json::from_value(value.clone())
            .map_err(|e| AmoeboidError::malformed(name, e.to_string()))
    }

    pub fn faces(&self) -> &[RawFace] {
        self.card_faces.as_deref().unwrap_or_default()
    }

    /// Normal-size image for the whole card, if the record has one
    pub fn normal_image(&self) -> Option<&str> {
        self.image_uris.as_ref()?.normal.as_deref()
    }

    /// Normal-size image of every face, in face order
    pub fn face_images(&self) -> Result<Vec<&str>> {
        if self.faces().is_empty() {
            return Err(AmoeboidError::malformed(
                &self.name,
                "record has neither a card image nor faces",
            ));
        }

        self.faces()
            .iter()
            .map(|face| {
                face.image_uris
                    .as_ref()
                    .and_then(|uris| uris.normal.as_deref())
                    .ok_or_else(|| {
                        AmoeboidError::malformed(
                            &self.name,
                            format!("face `{}` has no normal image", face.name),
                        )
                    })
            })
            .collect()
    }

    /// Cropped artwork, taken from the front face for multi-faced cards
    pub fn art_crop(&self) -> Option<&str> {
        self.image_uris
            .as_ref()
            .and_then(|uris| uris.art_crop.as_deref())
            .or_else(|| {
                self.faces()
                    .first()?
                    .image_uris
                    .as_ref()?
                    .art_crop
                    .as_deref()
            })
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist
            .as_deref()
            .or_else(|| self.faces().first()?.artist.as_deref())
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor_text
            .as_deref()
            .or_else(|| self.faces().first()?.flavor_text.as_deref())
    }
}

/// A card normalized for display, whatever its upstream layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalCard {
    pub name: String,
    pub color_identity: Rgb,
    pub image_url: String,
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    pub oracle_text: Option<String>,
    pub flavor_text: Option<String>,
    pub source_uri: String,
    pub formatted_cost_string: Option<String>,
    pub type_line: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    pub prices: Option<BTreeMap<String, Option<String>>>,
    pub set_code: Option<String>,
    pub set_name: Option<String>,
    pub legalities: Option<BTreeMap<String, String>>,
    pub rulings_uri: Option<String>,
}
