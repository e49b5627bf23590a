/// Retry with exponential backoff around any [`SentenceTokenizer`].
use std::time::Duration;

use tracing::warn;

use super::{SentenceTokenizer, TokenizerError};

pub struct RetryingTokenizer<T> {
    inner: T,
    max_retries: u32,
    backoff: Duration,
}

impl<T: SentenceTokenizer> RetryingTokenizer<T> {
    /// `max_retries` extra attempts after the first, sleeping `backoff`,
    /// then twice as long, and so on.
    pub fn new(inner: T, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

impl<T: SentenceTokenizer> SentenceTokenizer for RetryingTokenizer<T> {
    fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
        let mut delay = self.backoff;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.inner.tokenize(text) {
                Ok(sentences) => return Ok(sentences),
                Err(e) if attempts > self.max_retries => {
                    return Err(TokenizerError::Exhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!("Tokenizer attempt {attempts} failed: {e}; retrying in {delay:?}");
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then echoes the text as one token.
    struct FlakyTokenizer {
        failures: u32,
        calls: AtomicU32,
    }

    impl SentenceTokenizer for FlakyTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(TokenizerError::Request("connection refused".to_string()))
            } else {
                Ok(vec![vec![text.to_string()]])
            }
        }
    }

    fn flaky(failures: u32) -> FlakyTokenizer {
        FlakyTokenizer {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    #[test]
    fn test_recovers_within_budget() {
        let retrying = RetryingTokenizer::new(flaky(2), 3, Duration::ZERO);
        assert_eq!(retrying.tokenize("ok").unwrap(), vec![vec!["ok"]]);
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted() {
        let retrying = RetryingTokenizer::new(flaky(10), 2, Duration::ZERO);
        match retrying.tokenize("never") {
            Err(TokenizerError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, TokenizerError::Request(_)));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_no_retries() {
        let retrying = RetryingTokenizer::new(flaky(1), 0, Duration::ZERO);
        assert!(retrying.tokenize("x").is_err());
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 1);
    }
}
