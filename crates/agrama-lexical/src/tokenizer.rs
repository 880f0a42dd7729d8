use std::collections::HashSet;
use std::sync::OnceLock;

/// The stop-list dropped during tokenization. Small and fixed.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

fn stop_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lower-cases, splits on runs of non-alphanumeric characters, and drops
/// stop words. Order is preserved (term frequency counts don't need it, but
/// query scoring iterates terms in query order for determinism).
pub fn tokenize(text: &str) -> Vec<String> {
    let stops = stop_set();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .filter(|tok| !stops.contains(tok))
        .map(String::from)
        .collect()
}
