//! Free-text queries: keyword extraction and seed selection.

use std::collections::BTreeSet;

use recall_core::{NodeId, NodeType};
use recall_graph::{GraphStore, StoreError};
use recall_sync::resolve::normalize;

const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "through", "during", "before", "after", "above", "below", "up", "down",
    "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
];

const MAX_KEYWORDS: usize = 5;

/// Pull the content-bearing words out of a free-text query.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for word in query.to_lowercase().split_whitespace() {
        let word = word.trim_matches(|c: char| ".,!?;:".contains(c));
        if word.len() > 2 && !STOP_WORDS.contains(&word) && !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
            if keywords.len() == MAX_KEYWORDS {
                break;
            }
        }
    }
    keywords
}

/// Find seed nodes whose names or aliases contain a query keyword.
///
/// Scans active nodes of every type; ids come back sorted and unique.
pub async fn seeds_for_query(
    store: &dyn GraphStore,
    query: &str,
) -> Result<Vec<NodeId>, StoreError> {
    let keywords = extract_keywords(query);
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let mut seeds: BTreeSet<NodeId> = BTreeSet::new();
    for node_type in NodeType::all() {
        for node in store.active_nodes_of_type(*node_type).await? {
            if matches_any(&node.canonical_name, &node.aliases, &keywords) {
                seeds.insert(node.id);
            }
        }
    }
    tracing::debug!(
        keywords = ?keywords,
        seeds = seeds.len(),
        "Resolved query to seed nodes"
    );
    Ok(seeds.into_iter().collect())
}

fn matches_any(
    canonical_name: &str,
    aliases: &std::collections::BTreeSet<String>,
    keywords: &[String],
) -> bool {
    let names: Vec<String> = std::iter::once(canonical_name)
        .map(String::from)
        .chain(aliases.iter().map(|a| normalize(a)))
        .collect();
    keywords
        .iter()
        .any(|keyword| names.iter().any(|name| name.contains(keyword.as_str())))
}
