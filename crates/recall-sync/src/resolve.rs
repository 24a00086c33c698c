//! Entity resolution: map a raw mention name onto an existing graph node
//! or decide it is a new entity.
//!
//! Matching runs in two stages. An exact lookup on the normalized name is
//! tried first, then a fuzzy scan over active nodes of the same type using
//! string similarity against canonical names and known aliases.

use serde::Deserialize;

use recall_core::{Node, NodeType};
use recall_graph::{GraphStore, StoreError};

/// Resolver tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Minimum similarity for a fuzzy match against an existing node.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Two candidates whose scores differ by less than this are a tie;
    /// the most recently updated node wins and the match is flagged.
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
}

fn default_match_threshold() -> f64 {
    0.85
}

fn default_tie_epsilon() -> f64 {
    0.05
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

/// Outcome of resolving one mention.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The mention refers to an existing node.
    Matched {
        node: Node,
        score: f64,
        /// Surface form to record as a new alias, when it differs from
        /// every name the node already carries.
        new_alias: Option<String>,
        /// True when another candidate scored within the tie window.
        ambiguous: bool,
    },
    /// No existing node is close enough; create one under this name.
    New { canonical_name: String },
}

pub struct EntityResolver {
    config: ResolverConfig,
}

impl EntityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve a raw mention name against active nodes of the given type.
    pub async fn resolve(
        &self,
        store: &dyn GraphStore,
        node_type: NodeType,
        raw_name: &str,
    ) -> Result<Resolution, StoreError> {
        let normalized = normalize(raw_name);

        // Exact canonical-name hit needs no scan.
        if let Some(node) = store.find_active_node(node_type, &normalized).await? {
            let new_alias = alias_for(&node, raw_name);
            return Ok(Resolution::Matched {
                node,
                score: 1.0,
                new_alias,
                ambiguous: false,
            });
        }

        let candidates = store.active_nodes_of_type(node_type).await?;
        let mut scored: Vec<(f64, Node)> = candidates
            .into_iter()
            .map(|node| (candidate_score(&node, &normalized), node))
            .collect();
        // Best score first; within the tie window the most recently
        // updated node is preferred, then id for determinism.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.updated_at.cmp(&a.1.updated_at))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        let Some((best_score, best)) = scored.first().cloned() else {
            return Ok(Resolution::New {
                canonical_name: normalized,
            });
        };
        if best_score < self.config.match_threshold {
            return Ok(Resolution::New {
                canonical_name: normalized,
            });
        }

        let ambiguous = scored
            .get(1)
            .map(|(second, _)| best_score - second < self.config.tie_epsilon)
            .unwrap_or(false);
        if ambiguous {
            tracing::warn!(
                name = raw_name,
                node_type = node_type.as_str(),
                winner = %best.canonical_name,
                score = best_score,
                "Ambiguous entity match, picking most recently updated"
            );
        }

        let new_alias = alias_for(&best, raw_name);
        Ok(Resolution::Matched {
            node: best,
            score: best_score,
            new_alias,
            ambiguous,
        })
    }
}

/// Best similarity of the query against a node's canonical name and aliases.
fn candidate_score(node: &Node, normalized_query: &str) -> f64 {
    let mut best = similarity(normalized_query, &normalize(&node.canonical_name));
    for alias in &node.aliases {
        let s = similarity(normalized_query, &normalize(alias));
        if s > best {
            best = s;
        }
    }
    best
}

fn alias_for(node: &Node, raw_name: &str) -> Option<String> {
    let surface = raw_name.trim();
    let known =
        surface == node.canonical_name || node.aliases.iter().any(|a| a == surface);
    if surface.is_empty() || known {
        None
    } else {
        Some(surface.to_string())
    }
}

// ── Normalization ─────────────────────────────────────────────────

/// Canonical form of a mention name: lowercased, common Latin accents
/// folded, punctuation stripped, whitespace collapsed.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        for folded in fold_char(ch) {
            if folded.is_alphanumeric() {
                out.extend(folded.to_lowercase());
                last_was_space = false;
            } else if (folded.is_whitespace() || folded == '-' || folded == '_')
                && !last_was_space
            {
                out.push(' ');
                last_was_space = true;
            }
            // Other punctuation is dropped.
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Fold a handful of common accented Latin letters to their base form.
fn fold_char(ch: char) -> impl Iterator<Item = char> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    };
    std::iter::once(folded)
}

// ── Similarity ────────────────────────────────────────────────────

/// Similarity in [0, 1]: the better of edit-distance ratio and token
/// overlap, so both typos ("jonh") and reorderings ("smith, john") score
/// high.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let edit = match levenshtein_with_max(a, b, max_len) {
        Some(d) => 1.0 - d as f64 / max_len as f64,
        None => 0.0,
    };
    edit.max(token_jaccard(a, b))
}

/// Jaccard overlap of whitespace-separated tokens.
fn token_jaccard(a: &str, b: &str) -> f64 {
    use std::collections::BTreeSet;
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

/// Levenshtein distance with an early-exit cap. Returns `None` when the
/// distance exceeds `max`.
pub fn levenshtein_with_max(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let d = prev[b.len()];
    (d <= max).then_some(d)
}
