//! Mana cost formatting
//!
//! `{2}{W}{W}` renders as `**(2)⚪⚪**`. Servers that have uploaded their own
//! symbol emoji can configure a custom glyph table keyed by the token inside
//! the braces; tokens missing from it fall back to the basic mapping.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static MANA_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(.*?)\}").expect("mana symbol pattern is valid"));

fn basic_glyph(token: &str) -> Option<&'static str> {
    match token {
        "R" => Some("🔴"),
        "U" => Some("🔵"),
        "G" => Some("🟢"),
        "B" => Some("🟣"),
        "W" => Some("⚪"),
        "C" => Some("⟡"),
        _ => None,
    }
}

/// Glyph table used when rendering costs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManaGlyphs {
    custom: BTreeMap<String, String>,
}

impl ManaGlyphs {
    pub fn new(custom: BTreeMap<String, String>) -> Self {
        Self { custom }
    }

    pub fn has_custom(&self) -> bool {
        !self.custom.is_empty()
    }

    fn glyph(&self, token: &str) -> String {
        if let Some(custom) = self.custom.get(token) {
            return custom.clone();
        }
        match basic_glyph(token) {
            Some(glyph) => glyph.to_string(),
            None => format!("({token})"),
        }
    }

    /// Render a cost string in bold; an empty or symbol-free cost renders as `""`
    pub fn format_cost(&self, cost: &str) -> String {
        let formatted: String = MANA_SYMBOL
            .captures_iter(cost)
            .filter_map(|caps| caps.get(1))
            .map(|token| self.glyph(token.as_str()))
            .collect();

        if formatted.is_empty() {
            String::new()
        } else {
            format!("**{formatted}**")
        }
    }
}
