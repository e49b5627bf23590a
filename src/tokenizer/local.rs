/// Local rule-based tokenizer.
///
/// Produces PTB-like tokens (contractions split off, punctuation as separate
/// tokens) and ends a sentence after a run of `.`, `!` or `?` tokens.
/// Deterministic and offline; used in tests and when no CoreNLP server is
/// available.
use std::sync::LazyLock;

use regex::Regex;

use super::{SentenceTokenizer, TokenizerError};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}_]+(?:['’][\p{L}]+)?|\S").expect("valid token regex")
});

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTokenizer;

impl LocalTokenizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Word tokens of `text`, ignoring sentence boundaries.
    pub fn words(text: &str) -> Vec<String> {
        TOKEN_RE
            .find_iter(text)
            .flat_map(|m| split_contraction(m.as_str()))
            .collect()
    }
}

/// `shouldn't` -> `should`, `n't`; `It's` -> `It`, `'s`.
fn split_contraction(word: &str) -> Vec<String> {
    let Some(apos) = word.find(['\'', '’']) else {
        return vec![word.to_string()];
    };
    let (head, tail) = word.split_at(apos);
    let negation = matches!(tail, "'t" | "’t" | "'T" | "’T");
    if negation && head.len() > 1 && head.ends_with(['n', 'N']) {
        let (stem, n) = head.split_at(head.len() - 1);
        return vec![stem.to_string(), format!("{n}{tail}")];
    }
    vec![head.to_string(), tail.to_string()]
}

fn is_terminal(token: &str) -> bool {
    matches!(token, "." | "!" | "?")
}

impl SentenceTokenizer for LocalTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
        let words = Self::words(text);
        let mut sentences = Vec::new();
        let mut current = Vec::new();

        let mut iter = words.into_iter().peekable();
        while let Some(token) = iter.next() {
            let ends = is_terminal(&token) && !iter.peek().is_some_and(|next| is_terminal(next));
            current.push(token);
            if ends {
                sentences.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            sentences.push(current);
        }

        Ok(sentences)
    }
}
