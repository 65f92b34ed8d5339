//! Raw record to [`CanonicalCard`]

use tracing::debug;

use super::{CanonicalCard, CardFace, CardLayout, ManaGlyphs, RawCard, Rgb};
use crate::error::{AmoeboidError, Result};

/// Separator between the texts of two faces
pub const FACE_TEXT_SEPARATOR: &str = "\n----\n";
/// Separator between the costs of two faces
pub const FACE_COST_SEPARATOR: &str = " // ";

/// Builds canonical cards from upstream records
#[derive(Debug, Clone, Default)]
pub struct CardNormalizer {
    glyphs: ManaGlyphs,
}

impl CardNormalizer {
    pub fn new(glyphs: ManaGlyphs) -> Self {
        Self { glyphs }
    }

    pub fn glyphs(&self) -> &ManaGlyphs {
        &self.glyphs
    }

    /// Normalize a cached or fetched JSON record together with its image
    pub fn normalize(
        &self,
        raw_record: &serde_json::Value,
        image_bytes: Vec<u8>,
    ) -> Result<CanonicalCard> {
        let raw = RawCard::from_value(raw_record)?;
        self.normalize_card(&raw, image_bytes)
    }

    pub fn normalize_card(&self, raw: &RawCard, image_bytes: Vec<u8>) -> Result<CanonicalCard> {
        let layout = CardLayout::parse(raw)?;
        debug!(card = %raw.name, layout = layout.kind(), "Normalizing card");

        let mut card = CanonicalCard {
            name: raw.name.clone(),
            color_identity: Rgb::from_identity(&raw.color_identity),
            image_url: String::new(),
            image_bytes,
            oracle_text: None,
            flavor_text: None,
            source_uri: raw.scryfall_uri.clone().unwrap_or_default(),
            formatted_cost_string: None,
            type_line: raw.type_line.clone(),
            power: raw.power.clone(),
            toughness: raw.toughness.clone(),
            loyalty: raw.loyalty.clone(),
            prices: raw.prices.clone(),
            set_code: raw.set.clone(),
            set_name: raw.set_name.clone(),
            legalities: raw.legalities.clone(),
            rulings_uri: raw.rulings_uri.clone(),
        };

        let image_url = match layout {
            CardLayout::Normal(face) => {
                self.apply_single_face(&mut card, &face);
                face.image_url
            }
            CardLayout::Transform { front, .. } => {
                self.apply_single_face(&mut card, &front);
                card.power = front.power;
                card.toughness = front.toughness;
                card.loyalty = front.loyalty;
                front.image_url
            }
            CardLayout::Split {
                left,
                right,
                image_url,
            } => {
                self.apply_joined_faces(&mut card, &left, &right);
                image_url
            }
            CardLayout::ModalDfc { front, back } => {
                self.apply_joined_faces(&mut card, &front, &back);
                front.image_url
            }
        };

        card.image_url = image_url.ok_or_else(|| {
            AmoeboidError::malformed(&raw.name, "no normal image for the displayed face")
        })?;

        Ok(card)
    }

    fn apply_single_face(&self, card: &mut CanonicalCard, face: &CardFace) {
        card.oracle_text = face.oracle_text.clone();
        card.flavor_text = face.flavor_text.clone();
        card.formatted_cost_string = face
            .mana_cost
            .as_deref()
            .map(|cost| self.glyphs.format_cost(cost))
            .filter(|cost| !cost.is_empty());
    }

    fn apply_joined_faces(&self, card: &mut CanonicalCard, first: &CardFace, second: &CardFace) {
        card.oracle_text = join_texts([&first.oracle_text, &second.oracle_text]);
        card.flavor_text = join_texts([&first.flavor_text, &second.flavor_text]);

        let costs: Vec<String> = [&first.mana_cost, &second.mana_cost]
            .into_iter()
            .flatten()
            .filter(|cost| !cost.is_empty())
            .map(|cost| self.glyphs.format_cost(cost))
            .collect();
        let joined = costs.join(FACE_COST_SEPARATOR);
        card.formatted_cost_string = (!joined.is_empty()).then_some(joined);
    }
}

/// Join the present texts; nothing present (or only empty strings) yields `None`
fn join_texts(texts: [&Option<String>; 2]) -> Option<String> {
    let present: Vec<&str> = texts.into_iter().flatten().map(String::as_str).collect();
    let joined = present.join(FACE_TEXT_SEPARATOR);
    (!joined.is_empty()).then_some(joined)
}
