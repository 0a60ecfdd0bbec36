use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// Default token-overlap similarity below which no heuristic match is made.
/// Low enough that two-character CJK labels sharing one character still
/// match (1/3 overlap).
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

/// How confidently a raw label was mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// The normalized label matched an alias table entry verbatim.
    Exact,
    /// The label shared enough tokens with a known category.
    Heuristic,
    /// No match; the row must be marked as mapping-failed.
    None,
}

/// Result of mapping one raw label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedCategory {
    pub category: Option<String>,
    pub confidence: MatchConfidence,
}

/// Maps raw merchant/category strings to canonical categories using an
/// alias table plus a token-overlap fallback. Pure; holds no mutable state.
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    /// Normalized alias -> canonical category.
    aliases: HashMap<String, String>,
    /// The closed taxonomy. BTreeSet keeps heuristic iteration, and thereby
    /// tie-breaking, deterministic and alphabetical.
    categories: BTreeSet<String>,
    threshold: f64,
}

impl CategoryMapper {
    /// Builds a mapper from `(alias, canonical)` pairs and the canonical
    /// taxonomy. Canonical names act as exact aliases of themselves.
    pub fn new<A, C>(aliases: A, categories: C, threshold: f64) -> Self
    where
        A: IntoIterator<Item = (String, String)>,
        C: IntoIterator<Item = String>,
    {
        let mut table = HashMap::new();
        let mut taxonomy = BTreeSet::new();
        for category in categories {
            table.insert(normalize(&category), category.clone());
            taxonomy.insert(category);
        }
        for (alias, canonical) in aliases {
            taxonomy.insert(canonical.clone());
            table.insert(normalize(&alias), canonical);
        }
        Self {
            aliases: table,
            categories: taxonomy,
            threshold,
        }
    }

    /// Maps a raw label to a canonical category.
    pub fn map(&self, raw_label: &str) -> MappedCategory {
        let normalized = normalize(raw_label);
        if let Some(canonical) = self.aliases.get(&normalized) {
            return MappedCategory {
                category: Some(canonical.clone()),
                confidence: MatchConfidence::Exact,
            };
        }

        let label_tokens = tokens(&normalized);
        if !label_tokens.is_empty() {
            let mut best: Option<(&String, f64)> = None;
            for category in &self.categories {
                let score = jaccard(&label_tokens, &tokens(&normalize(category)));
                // Strictly-greater keeps the alphabetically first category
                // on score ties.
                if score >= self.threshold && best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((category, score));
                }
            }
            if let Some((category, _)) = best {
                return MappedCategory {
                    category: Some(category.clone()),
                    confidence: MatchConfidence::Heuristic,
                };
            }
        }

        MappedCategory {
            category: None,
            confidence: MatchConfidence::None,
        }
    }
}

/// Lowercases, trims and collapses internal whitespace.
pub(crate) fn normalize(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// ASCII alphanumeric words plus individual non-ASCII characters. CJK
/// labels carry meaning per character, not per space-separated word.
pub(crate) fn tokens(normalized: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut word = String::new();
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            word.push(ch);
        } else {
            if !word.is_empty() {
                out.insert(std::mem::take(&mut word));
            }
            if !ch.is_ascii() {
                out.insert(ch.to_string());
            }
        }
    }
    if !word.is_empty() {
        out.insert(word);
    }
    out
}

pub(crate) fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> CategoryMapper {
        CategoryMapper::new(
            vec![
                ("饮食".to_string(), "餐饮".to_string()),
                ("coffee".to_string(), "餐饮".to_string()),
            ],
            vec!["餐饮".to_string(), "转账".to_string(), "工资".to_string()],
            DEFAULT_SIMILARITY_THRESHOLD,
        )
    }

    #[test]
    fn alias_hits_are_exact() {
        let m = mapper().map("饮食");
        assert_eq!(m.confidence, MatchConfidence::Exact);
        assert_eq!(m.category.as_deref(), Some("餐饮"));
    }

    #[test]
    fn normalization_ignores_case_and_whitespace() {
        let m = mapper().map("  Coffee ");
        assert_eq!(m.confidence, MatchConfidence::Exact);
        assert_eq!(m.category.as_deref(), Some("餐饮"));
    }

    #[test]
    fn canonical_names_map_to_themselves() {
        let m = mapper().map("转账");
        assert_eq!(m.confidence, MatchConfidence::Exact);
        assert_eq!(m.category.as_deref(), Some("转账"));
    }

    #[test]
    fn shared_characters_match_heuristically() {
        // Shares 餐 with 餐饮 but is not an alias.
        let m = mapper().map("餐费");
        assert_eq!(m.confidence, MatchConfidence::Heuristic);
        assert_eq!(m.category.as_deref(), Some("餐饮"));
    }

    #[test]
    fn unmatched_labels_return_none() {
        let m = mapper().map("水电煤");
        assert_eq!(m.confidence, MatchConfidence::None);
        assert_eq!(m.category, None);
    }

    #[test]
    fn score_ties_prefer_alphabetically_first() {
        let m = CategoryMapper::new(
            vec![],
            vec!["dining out".to_string(), "dining in".to_string()],
            0.3,
        );
        // "dining" overlaps both categories with an identical score.
        let mapped = m.map("dining");
        assert_eq!(mapped.confidence, MatchConfidence::Heuristic);
        assert_eq!(mapped.category.as_deref(), Some("dining in"));
    }
}
