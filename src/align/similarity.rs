//! Chunk similarity: bounded edit distance and longest common prefix over
//! flattened, truncated token text.
use crate::config::SimilarityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityScorer {
    /// Only the first `truncate_chars` characters are compared.
    pub truncate_chars: usize,
    /// Near-duplicate when the distance is strictly below this.
    pub near_duplicate_distance: usize,
    /// Informative when the prefix is strictly longer than this.
    pub informative_prefix_len: usize,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::from_config(&SimilarityConfig::default())
    }
}

/// Keep at most `max_chars` characters.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Levenshtein distance, two-row formulation.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Levenshtein distance if it is below `bound`, `None` otherwise. Stops as
/// soon as a whole row reaches the bound.
pub fn bounded_levenshtein(a: &str, b: &str, bound: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) >= bound {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        if curr.iter().min().is_some_and(|&m| m >= bound) {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Some(prev[b.len()]).filter(|&d| d < bound)
}

/// Longest common starting substring of `a` and `b`, as a slice of `a`.
pub fn longest_starting_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| {
            let shared = a.chars().count().min(b.chars().count());
            a.char_indices().nth(shared).map_or(a.len(), |(idx, _)| idx)
        });
    &a[..end]
}

fn is_alphabetic(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_alphabetic)
}

impl SimilarityScorer {
    #[must_use]
    pub fn from_config(config: &SimilarityConfig) -> Self {
        Self {
            truncate_chars: config.truncate_chars,
            near_duplicate_distance: config.near_duplicate_distance,
            informative_prefix_len: config.informative_prefix_len,
        }
    }

    /// Edit distance between the truncated texts.
    #[must_use]
    pub fn edit_distance(&self, a: &str, b: &str) -> usize {
        levenshtein(
            truncate(a, self.truncate_chars),
            truncate(b, self.truncate_chars),
        )
    }

    #[must_use]
    pub fn is_near_duplicate(&self, a: &str, b: &str) -> bool {
        bounded_levenshtein(
            truncate(a, self.truncate_chars),
            truncate(b, self.truncate_chars),
            self.near_duplicate_distance,
        )
        .is_some()
    }

    /// Common prefix of the truncated texts.
    #[must_use]
    pub fn common_prefix<'a>(&self, a: &'a str, b: &str) -> &'a str {
        longest_starting_prefix(
            truncate(a, self.truncate_chars),
            truncate(b, self.truncate_chars),
        )
    }

    /// A prefix is informative when it is long, or when it is non-empty and
    /// not a single bare word (quote markers, punctuation, several words).
    #[must_use]
    pub fn is_informative_prefix(&self, prefix: &str) -> bool {
        prefix.chars().count() > self.informative_prefix_len
            || (!prefix.is_empty() && !is_alphabetic(prefix.trim()))
    }

    #[must_use]
    pub fn has_informative_prefix(&self, a: &str, b: &str) -> bool {
        self.is_informative_prefix(self.common_prefix(a, b))
    }
}
