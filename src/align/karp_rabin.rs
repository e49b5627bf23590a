//! Karp-Rabin window matching over token sequences.
//!
//! A window of `window` consecutive tokens is hashed as the base-2
//! polynomial of its concatenated characters (last character least
//! significant), reduced modulo `modulus`. Equal windows always collide;
//! unequal windows may collide too, so callers that need exactness use
//! [`RollingHashMatcher::verified_matches`].
use std::collections::{BTreeMap, HashMap};

use crate::config::MatcherConfig;

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_MODULUS: u64 = 2_124_749_677;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingHashMatcher {
    window: usize,
    modulus: u64,
}

impl Default for RollingHashMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MODULUS)
    }
}

/// `base^exp mod modulus`.
fn pow_mod(mut base: u64, mut exp: usize, modulus: u64) -> u64 {
    let mut acc = 1 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

/// `(a + b) mod modulus`, exact for any `u64` modulus.
fn add_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) + u128::from(b)) % u128::from(modulus)) as u64
}

impl RollingHashMatcher {
    /// # Panics
    ///
    /// If `window` is zero or `modulus` is below 2.
    #[must_use]
    pub fn new(window: usize, modulus: u64) -> Self {
        assert!(window > 0, "window must be positive");
        assert!(modulus > 1, "modulus must exceed 1");
        Self { window, modulus }
    }

    #[must_use]
    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.window, config.modulus)
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Horner hash of a string: `h = 2h + ord(c)` per character.
    fn extend_hash(&self, hash: u64, text: &str) -> u64 {
        text.chars().fold(hash, |h, c| {
            add_mod(mul_mod(h, 2, self.modulus), u64::from(c), self.modulus)
        })
    }

    /// Hash of the concatenation of `tokens`, computed directly.
    pub fn hash_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> u64 {
        tokens
            .iter()
            .fold(0, |h, t| self.extend_hash(h, t.as_ref()))
    }

    /// Hash of every full window, keyed by start index. Windows that would
    /// run past the end are not produced.
    ///
    /// Each step drops the leading token's contribution and appends the next
    /// token, so the whole pass is linear in the number of characters.
    pub fn window_hashes<S: AsRef<str>>(&self, tokens: &[S]) -> BTreeMap<usize, u64> {
        let mut hashes = BTreeMap::new();
        if tokens.len() < self.window {
            return hashes;
        }

        let token_hashes: Vec<u64> = tokens
            .iter()
            .map(|t| self.extend_hash(0, t.as_ref()))
            .collect();
        let token_chars: Vec<usize> = tokens.iter().map(|t| t.as_ref().chars().count()).collect();

        let mut hash = self.hash_tokens(&tokens[..self.window]);
        let mut chars: usize = token_chars[..self.window].iter().sum();
        hashes.insert(0, hash);

        for start in 1..=tokens.len() - self.window {
            let leaving = start - 1;
            let rest = chars - token_chars[leaving];
            let contribution = mul_mod(
                token_hashes[leaving],
                pow_mod(2, rest, self.modulus),
                self.modulus,
            );
            hash = add_mod(hash, self.modulus - contribution, self.modulus);

            let entering = start + self.window - 1;
            hash = add_mod(
                mul_mod(hash, pow_mod(2, token_chars[entering], self.modulus), self.modulus),
                token_hashes[entering],
                self.modulus,
            );
            chars = rest + token_chars[entering];
            hashes.insert(start, hash);
        }

        hashes
    }

    /// Every `(i, j)` whose windows hash equally, sorted lexicographically.
    pub fn collisions<A: AsRef<str>, B: AsRef<str>>(&self, a: &[A], b: &[B]) -> Vec<(usize, usize)> {
        let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::new();
        for (j, hash) in self.window_hashes(b) {
            by_hash.entry(hash).or_default().push(j);
        }

        let mut pairs: Vec<(usize, usize)> = self
            .window_hashes(a)
            .into_iter()
            .flat_map(|(i, hash)| {
                by_hash
                    .get(&hash)
                    .into_iter()
                    .flatten()
                    .map(move |&j| (i, j))
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Collisions whose windows are actually equal token for token.
    pub fn verified_matches<A: AsRef<str>, B: AsRef<str>>(
        &self,
        a: &[A],
        b: &[B],
    ) -> Vec<(usize, usize)> {
        self.collisions(a, b)
            .into_iter()
            .filter(|&(i, j)| {
                a[i..i + self.window]
                    .iter()
                    .zip(&b[j..j + self.window])
                    .all(|(x, y)| x.as_ref() == y.as_ref())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_hash_matches_positional_definition() {
        let matcher = RollingHashMatcher::default();
        // "ab" = 2 * 97 + 98
        assert_eq!(matcher.hash_tokens(&["a", "b"]), 2 * 97 + 98);
        assert_eq!(matcher.hash_tokens(&["ab"]), matcher.hash_tokens(&["a", "b"]));
    }

    #[test]
    fn test_rolling_agrees_with_direct_hash() {
        let matcher = RollingHashMatcher::new(3, DEFAULT_MODULUS);
        let tokens = toks("a b c d e");
        let rolling = matcher.window_hashes(&tokens);
        assert_eq!(rolling.len(), 3);
        for (start, hash) in &rolling {
            assert_eq!(*hash, matcher.hash_tokens(&tokens[*start..*start + 3]));
        }

        let whole = RollingHashMatcher::new(5, DEFAULT_MODULUS);
        assert_eq!(
            whole.window_hashes(&tokens)[&0],
            whole.hash_tokens(&["abcde"])
        );
    }

    #[test]
    fn test_rolling_agrees_on_long_varied_tokens() {
        let matcher = RollingHashMatcher::new(5, 1_000_003);
        let tokens = toks("the reviewers pointed out that équation ( 3 ) does not hold in general , sadly");
        for (start, hash) in matcher.window_hashes(&tokens) {
            assert_eq!(hash, matcher.hash_tokens(&tokens[start..start + 5]), "window {start}");
        }
    }

    #[test]
    fn test_rolling_agrees_with_modulus_near_u64_max() {
        let matcher = RollingHashMatcher::new(5, 18_446_744_073_709_551_557);
        let tokens = toks("we thank the anonymous reviewer for this very careful reading");
        let hashes = matcher.window_hashes(&tokens);
        assert_eq!(hashes.len(), tokens.len() - 4);
        for (start, hash) in &hashes {
            assert_eq!(*hash, matcher.hash_tokens(&tokens[*start..*start + 5]), "window {start}");
        }
        assert!(matcher.verified_matches(&tokens, &tokens).contains(&(3, 3)));
    }

    #[test]
    #[should_panic(expected = "window must be positive")]
    fn test_zero_window_rejected() {
        let _ = RollingHashMatcher::new(0, DEFAULT_MODULUS);
    }

    #[test]
    fn test_short_sequence_has_no_windows() {
        let matcher = RollingHashMatcher::new(7, DEFAULT_MODULUS);
        assert!(matcher.window_hashes(&toks("too short")).is_empty());
        assert!(matcher.collisions(&toks("a b"), &toks("a b")).is_empty());
    }

    #[test]
    fn test_identical_windows_collide() {
        let matcher = RollingHashMatcher::new(7, DEFAULT_MODULUS);
        let window = toks("we thank the reviewer for the comment");
        assert!(matcher.collisions(&window, &window).contains(&(0, 0)));

        let parent = toks("x y z we thank the reviewer for the comment");
        let child = toks("q we thank the reviewer for the comment !");
        assert!(matcher.verified_matches(&parent, &child).contains(&(3, 1)));
    }

    #[test]
    fn test_collisions_sorted() {
        let matcher = RollingHashMatcher::new(1, DEFAULT_MODULUS);
        let pairs = matcher.collisions(&toks("a b a"), &toks("a a"));
        assert_eq!(pairs, vec![(0, 0), (0, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_verified_matches_drop_false_positives() {
        // Modulus 2 makes almost everything collide.
        let matcher = RollingHashMatcher::new(1, 2);
        let a = toks("a b");
        let b = toks("c a");
        assert!(matcher.collisions(&a, &b).len() > matcher.verified_matches(&a, &b).len());
        assert_eq!(matcher.verified_matches(&a, &b), vec![(0, 1)]);
    }
}
