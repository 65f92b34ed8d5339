//! Card queries and mention extraction
//!
//! A mention is any text between the left and right markers of a server's
//! wrapping pattern, e.g. `[[Lightning Bolt]]` or `[[Opt; set=xln]]`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::InputError;

/// Parameters forwarded to the remote catalog; everything else is ignored upstream
pub const ACCEPTED_PARAMETERS: &[&str] = &["set"];

static WRAPPING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s*]+\*[^\s*]+$").expect("wrapping validation pattern is valid")
});

/// A single card request: free-text name plus optional disambiguators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub raw_name: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Query {
    pub fn new(raw_name: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into().trim().to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter; blank values are dropped and keys are lower-cased
    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = value.trim();
        let key = key.trim().to_lowercase();
        if !key.is_empty() && !value.is_empty() {
            self.parameters.insert(key, value.to_string());
        }
        self
    }

    /// Convenience for the optional set-code argument of single-card commands
    pub fn with_set(self, set_code: Option<&str>) -> Self {
        match set_code {
            Some(set) => self.with_parameter("set", set),
            None => self,
        }
    }

    /// Queries with parameters select a printing the flat cache cannot represent
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// The subset of parameters the remote catalog understands
    pub fn remote_parameters(&self) -> Vec<(String, String)> {
        self.parameters
            .iter()
            .filter(|(key, _)| ACCEPTED_PARAMETERS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn set_code(&self) -> Option<&str> {
        self.parameters.get("set").map(String::as_str)
    }
}

/// A validated two-part mention delimiter such as `[[*]]`
#[derive(Debug, Clone)]
pub struct Wrapping {
    pub left: String,
    pub right: String,
    matcher: Regex,
}

impl PartialEq for Wrapping {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left && self.right == other.right
    }
}

impl Eq for Wrapping {}

impl Wrapping {
    /// Parse a pattern of the form `<left>*<right>`
    pub fn parse(pattern: &str) -> Result<Self, InputError> {
        if !WRAPPING_PATTERN.is_match(pattern) {
            return Err(InputError::InvalidWrapping(pattern.to_string()));
        }

        let (left, right) = pattern
            .split_once('*')
            .ok_or_else(|| InputError::InvalidWrapping(pattern.to_string()))?;

        let matcher = Regex::new(&format!(
            "{}(.*?){}",
            regex::escape(left),
            regex::escape(right)
        ))
        .map_err(|_| InputError::InvalidWrapping(pattern.to_string()))?;

        Ok(Self {
            left: left.to_string(),
            right: right.to_string(),
            matcher,
        })
    }

    /// The pattern as users type it
    pub fn pattern(&self) -> String {
        format!("{}*{}", self.left, self.right)
    }

    /// Raw text of every mention in `content`, in order of appearance
    pub fn mentions<'a>(&self, content: &'a str) -> Vec<&'a str> {
        self.matcher
            .captures_iter(content)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}

/// Extract card queries from a chat message
///
/// More than `max` mentions rejects the whole message before any lookup happens.
pub fn extract_queries(
    content: &str,
    wrapping: &Wrapping,
    max: usize,
) -> Result<Vec<Query>, InputError> {
    let mentions = wrapping.mentions(content);

    if mentions.len() > max {
        return Err(InputError::TooManyCards { max });
    }

    let mut queries = Vec::with_capacity(mentions.len());
    for mention in mentions {
        if let Some(query) = parse_mention(mention)? {
            queries.push(query);
        }
    }
    Ok(queries)
}

/// Parse `name; key=value; ...`; an empty name yields no query
pub fn parse_mention(mention: &str) -> Result<Option<Query>, InputError> {
    let mut parts = mention.split(';');
    let name = parts.next().unwrap_or_default().trim();

    let mut query = Query::new(name);
    for param in parts {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| InputError::InvalidParameters(param.trim().to_string()))?;
        if key.trim().is_empty() {
            return Err(InputError::InvalidParameters(param.trim().to_string()));
        }
        query = query.with_parameter(key, value);
    }

    if query.raw_name.is_empty() {
        return Ok(None);
    }
    Ok(Some(query))
}
