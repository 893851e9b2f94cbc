//! Optional history enhancement: pulls semantically similar prior prompts
//! and folds a compact summary of them into the input before Prima
//! Materia runs. Never fatal — callers fall back to the bare input.

use std::collections::HashMap;
use std::sync::Arc;

use alchemy_core::EnhancedContext;
use alchemy_providers::EmbeddingProvider;
use alchemy_storage::{SearchFilter, Store};
use tracing::debug;
use uuid::Uuid;

const SIMILAR_PROMPT_LIMIT: usize = 5;
const MAX_PATTERN_TERMS: usize = 8;

/// Tokenizes `text` into lowercase alphanumeric words of length > 3.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// Extracts the terms that recur most often across `documents`, weighted
/// by how many distinct documents they appear in (a coarse TF-IDF stand-in
/// that doesn't need a corpus-wide idf table).
fn extract_common_patterns(documents: &[String]) -> Vec<String> {
    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    for doc in documents {
        let mut seen = std::collections::HashSet::new();
        for term in tokenize(doc) {
            if seen.insert(term.clone()) {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> =
        doc_freq.into_iter().filter(|(_, count)| *count > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_PATTERN_TERMS).map(|(term, _)| term).collect()
}

/// Computes an `EnhancedContext` for `input` from the most similar prior
/// prompts in `storage`, or `None` if enhancement isn't possible or
/// nothing is similar enough to be useful.
pub async fn enhance(
    storage: &Store,
    embedder: &Arc<dyn EmbeddingProvider>,
    input: &str,
    session_id: Option<Uuid>,
) -> Option<EnhancedContext> {
    let embedding = match embedder.embed(input).await {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "history enhancement: embedding failed, skipping");
            return None;
        }
    };

    let mut filter = SearchFilter::default();
    if let Some(session_id) = session_id {
        filter.session_id = Some(session_id);
    }

    let hits = match storage.semantic_search(&embedding, SIMILAR_PROMPT_LIMIT, &filter).await {
        Ok(hits) if !hits.is_empty() => hits,
        Ok(_) => return None,
        Err(e) => {
            debug!(error = %e, "history enhancement: search failed, skipping");
            return None;
        }
    };

    let similar_prompt_ids: Vec<Uuid> = hits.iter().map(|h| h.prompt.id).collect();
    let documents: Vec<String> = hits.iter().map(|h| h.prompt.content.clone()).collect();
    let patterns = extract_common_patterns(&documents);

    let mut snippets: Vec<String> =
        hits.iter().take(3).map(|h| truncate(&h.prompt.content, 200)).collect();
    if !patterns.is_empty() {
        snippets.push(format!("Recurring themes: {}", patterns.join(", ")));
    }

    Some(EnhancedContext { similar_prompt_ids, snippets })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_common_patterns_picks_recurring_terms() {
        let docs = vec![
            "explain the rust borrow checker".to_string(),
            "explain the rust ownership model".to_string(),
            "write a haiku about autumn".to_string(),
        ];
        let patterns = extract_common_patterns(&docs);
        assert!(patterns.contains(&"explain".to_string()));
        assert!(patterns.contains(&"rust".to_string()));
        assert!(!patterns.contains(&"haiku".to_string()));
    }

    #[test]
    fn extract_common_patterns_empty_when_nothing_recurs() {
        let docs = vec!["alpha beta gamma".to_string(), "delta epsilon zeta".to_string()];
        assert!(extract_common_patterns(&docs).is_empty());
    }
}
