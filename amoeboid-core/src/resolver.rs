//! Fuzzy card-name resolution
//!
//! The corpus is bulk-loaded once (from an offline card-name dump or the
//! remote catalog) into the `card_names` table and held in memory as a
//! read-only index for the life of the process.

use rusqlite::params;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{AmoeboidError, Result};
use crate::store::Database;

/// Resolves free-text names against a known name corpus
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    names: Vec<String>,
    normalized: Vec<Vec<char>>,
    exact: HashMap<String, usize>,
}

impl NameResolver {
    /// Build an index; duplicate names keep their first position
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver = Self::default();
        for name in names {
            let name: String = name.into();
            let key = normalize(&name);
            if key.is_empty() || resolver.exact.contains_key(&key) {
                continue;
            }
            resolver.exact.insert(key.clone(), resolver.names.len());
            resolver.normalized.push(key.chars().collect());
            resolver.names.push(name.trim().to_string());
        }
        resolver
    }

    /// Load the persisted corpus in insertion order
    pub fn load(db: &Database) -> Result<Self> {
        let names: Vec<String> = db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM card_names ORDER BY position")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })?;

        let resolver = Self::new(names);
        info!(name_count = resolver.len(), "Loaded card name corpus");
        Ok(resolver)
    }

    /// Replace the persisted corpus; returns the number of distinct names stored
    pub fn store_corpus<I, S>(db: &Database, names: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resolver = Self::new(names);

        db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM card_names", [])?;
            {
                let mut insert = tx.prepare(
                    "INSERT OR IGNORE INTO card_names(name, position) VALUES (?1, ?2)",
                )?;
                for (position, name) in resolver.names.iter().enumerate() {
                    insert.execute(params![name, position as i64])?;
                }
            }
            tx.commit()
        })?;

        info!(name_count = resolver.len(), "Stored card name corpus");
        Ok(resolver.len())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Best canonical match for `query`
    ///
    /// Exact (case-insensitive) matches win; otherwise the closest name within
    /// `max(1, len / 3)` edits, ties going to the earlier corpus entry.
    pub fn resolve(&self, query: &str) -> Result<String> {
        let key = normalize(query);
        if key.is_empty() || self.is_empty() {
            return Err(AmoeboidError::NotFound(query.trim().to_string()));
        }

        if let Some(&index) = self.exact.get(&key) {
            return Ok(self.names[index].clone());
        }

        let query_chars: Vec<char> = key.chars().collect();
        let max_distance = max_edits(query_chars.len());

        let mut best: Option<(usize, usize)> = None;
        for (index, candidate) in self.normalized.iter().enumerate() {
            if candidate.len().abs_diff(query_chars.len()) > max_distance {
                continue;
            }
            let distance = levenshtein_distance(&query_chars, candidate);
            if distance > max_distance {
                continue;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
                if distance == 1 {
                    // Nothing short of an exact match beats one edit
                    break;
                }
            }
        }

        match best {
            Some((index, distance)) => {
                debug!(query = %query, resolved = %self.names[index], distance, "Resolved card name");
                Ok(self.names[index].clone())
            }
            None => Err(AmoeboidError::NotFound(query.trim().to_string())),
        }
    }
}

fn max_edits(len: usize) -> usize {
    (len / 3).max(1)
}

/// Lower-case and collapse runs of whitespace
fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Classic two-row edit distance over characters
pub fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn corpus() -> NameResolver {
        NameResolver::new([
            "Lightning Bolt",
            "Lightning Helix",
            "Opt",
            "Counterspell",
            "Fire // Ice",
        ])
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein_distance(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein_distance(&chars("bolt"), &chars("bolt")), 0);
        assert_eq!(levenshtein_distance(&chars("bolt"), &chars("blot")), 2);
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        assert_eq!(corpus().resolve("  lightning   BOLT ").unwrap(), "Lightning Bolt");
    }

    #[test]
    fn test_misspelling_resolves() {
        let resolver = corpus();
        assert_eq!(resolver.resolve("Lightening Bolt").unwrap(), "Lightning Bolt");
        assert_eq!(resolver.resolve("counterspel").unwrap(), "Counterspell");
        assert_eq!(resolver.resolve("fire // ise").unwrap(), "Fire // Ice");
    }

    #[test]
    fn test_too_far_is_not_found() {
        let err = corpus().resolve("Tarmogoyf").unwrap_err();
        assert!(matches!(err, AmoeboidError::NotFound(name) if name == "Tarmogoyf"));
    }

    #[test]
    fn test_empty_corpus_or_query_is_not_found() {
        assert!(NameResolver::default().resolve("Opt").is_err());
        assert!(corpus().resolve("   ").is_err());
    }

    #[test]
    fn test_ties_go_to_insertion_order() {
        let resolver = NameResolver::new(["Bolt A", "Bolt B"]);
        assert_eq!(resolver.resolve("Bolt C").unwrap(), "Bolt A");
    }

    #[test]
    fn test_store_and_load_round_trip_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        let stored =
            NameResolver::store_corpus(&db, ["Opt", "Shock", "opt", "Duress"]).unwrap();
        assert_eq!(stored, 3);

        let loaded = NameResolver::load(&db).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.resolve("shok").unwrap(), "Shock");

        NameResolver::store_corpus(&db, ["Counterspell"]).unwrap();
        assert_eq!(NameResolver::load(&db).unwrap().len(), 1);
    }
}
