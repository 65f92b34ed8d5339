//! Representative embed colours for a card's colour identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// An 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(221, 46, 68);
    pub const BLUE: Rgb = Rgb(85, 172, 238);
    pub const GREEN: Rgb = Rgb(120, 177, 89);
    pub const BLACK: Rgb = Rgb(49, 55, 61);
    pub const WHITE: Rgb = Rgb(230, 231, 232);
    /// Colourless and unknown identities
    pub const NEUTRAL: Rgb = Rgb(100, 101, 102);
    /// Any identity with two or more colours
    pub const GOLD: Rgb = Rgb(207, 181, 59);

    /// Map a colour identity (e.g. `["R", "G"]`) to its representative colour
    pub fn from_identity<S: AsRef<str>>(identity: &[S]) -> Self {
        match identity {
            [] => Self::NEUTRAL,
            [single] => match single.as_ref() {
                "R" => Self::RED,
                "U" => Self::BLUE,
                "G" => Self::GREEN,
                "B" => Self::BLACK,
                "W" => Self::WHITE,
                _ => Self::NEUTRAL,
            },
            _ => Self::GOLD,
        }
    }

    /// Packed `0xRRGGBB`, the form chat embeds expect
    pub fn to_u32(self) -> u32 {
        (u32::from(self.0) << 16) | (u32::from(self.1) << 8) | u32::from(self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}
