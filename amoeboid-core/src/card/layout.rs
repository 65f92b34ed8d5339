//! Closed set of card layouts
//!
//! Upstream records carry a free-form `layout` tag. Parsing maps it onto one of
//! four shapes and fails on tags it does not know, instead of guessing.

use super::{RawCard, RawFace};
use crate::error::{AmoeboidError, Result};

/// Text, cost, stats and image of a single face
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFace {
    pub oracle_text: Option<String>,
    pub flavor_text: Option<String>,
    pub mana_cost: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    pub image_url: Option<String>,
}

impl From<&RawFace> for CardFace {
    fn from(face: &RawFace) -> Self {
        Self {
            oracle_text: face.oracle_text.clone(),
            flavor_text: face.flavor_text.clone(),
            mana_cost: face.mana_cost.clone(),
            power: face.power.clone(),
            toughness: face.toughness.clone(),
            loyalty: face.loyalty.clone(),
            image_url: face
                .image_uris
                .as_ref()
                .and_then(|uris| uris.normal.clone()),
        }
    }
}

impl From<&RawCard> for CardFace {
    fn from(card: &RawCard) -> Self {
        Self {
            oracle_text: card.oracle_text.clone(),
            flavor_text: card.flavor_text.clone(),
            mana_cost: card.mana_cost.clone(),
            power: card.power.clone(),
            toughness: card.toughness.clone(),
            loyalty: card.loyalty.clone(),
            image_url: card.normal_image().map(str::to_string),
        }
    }
}

/// The layouts a card can be displayed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardLayout {
    /// Everything lives at the top level of the record
    Normal(CardFace),
    /// Two faces on two sides; the front is what gets shown
    Transform { front: CardFace, back: CardFace },
    /// Two halves printed on one side, sharing the card image
    ///
    /// `image_url` is the card-level image when the record has one. Otherwise
    /// it links the left face only, while the fetched image bytes hold both
    /// faces stitched together.
    Split {
        left: CardFace,
        right: CardFace,
        image_url: Option<String>,
    },
    /// Two castable faces on two sides
    ModalDfc { front: CardFace, back: CardFace },
}

impl CardLayout {
    /// Classify an upstream record by its `layout` tag
    pub fn parse(card: &RawCard) -> Result<Self> {
        match card.layout.as_str() {
            "normal" | "saga" | "class" | "case" | "leveler" | "mutate" | "prototype" | "meld"
            | "host" | "augment" | "token" | "emblem" | "planar" | "scheme" | "vanguard" => {
                Ok(Self::Normal(CardFace::from(card)))
            }
            "split" | "flip" | "adventure" => {
                let (left, right) = two_faces(card)?;
                let image_url = card
                    .normal_image()
                    .map(str::to_string)
                    .or_else(|| left.image_url.clone());
                Ok(Self::Split {
                    left,
                    right,
                    image_url,
                })
            }
            "transform" | "double_faced_token" => {
                let (front, back) = two_faces(card)?;
                Ok(Self::Transform { front, back })
            }
            "modal_dfc" => {
                let (front, back) = two_faces(card)?;
                Ok(Self::ModalDfc { front, back })
            }
            other => Err(AmoeboidError::malformed(
                &card.name,
                format!("unsupported layout `{other}`"),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Normal(_) => "normal",
            Self::Transform { .. } => "transform",
            Self::Split { .. } => "split",
            Self::ModalDfc { .. } => "modal_dfc",
        }
    }
}

fn two_faces(card: &RawCard) -> Result<(CardFace, CardFace)> {
    match card.faces() {
        [first, second, ..] => Ok((CardFace::from(first), CardFace::from(second))),
        faces => Err(AmoeboidError::malformed(
            &card.name,
            format!(
                "`{}` layout needs two faces, found {}",
                card.layout,
                faces.len()
            ),
        )),
    }
}
