/// Sentence tokenizer seam and paragraph chunking of super-nodes.
///
/// The tokenizer itself is an external service (CoreNLP) or a local regex
/// fallback; this module only turns a super-node's source texts into ordered
/// chunks with contiguous token offsets.
pub mod corenlp;
pub mod local;
pub mod retry;

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{TokenizerBackend, TokenizerConfig};
use crate::supernode::SuperNode;

/// Reserved token marking a seam between two merged source notes.
pub const DEFAULT_SEPARATOR_TOKEN: &str = "__NEWLINE";

/// Blank-line paragraph boundary.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Errors that can occur while calling the tokenization service.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("service returned status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<TokenizerError>,
    },
}

/// Sentence splitting plus word tokenization.
///
/// Implementations must be `Send + Sync`; one instance is shared by all
/// workers behind an `Arc`.
pub trait SentenceTokenizer: Send + Sync {
    /// Tokenize one paragraph into sentences of tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>, TokenizerError>;

    /// Tokenize several paragraphs, preserving order.
    fn tokenize_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Vec<String>>>, TokenizerError> {
        texts.iter().map(|t| self.tokenize(t)).collect()
    }
}

/// Build the tokenizer selected in the configuration. Remote backends are
/// wrapped in retry-with-backoff.
pub fn from_config(config: &TokenizerConfig) -> Result<Arc<dyn SentenceTokenizer>, TokenizerError> {
    let tokenizer: Arc<dyn SentenceTokenizer> = match config.backend {
        TokenizerBackend::Local => Arc::new(local::LocalTokenizer::new()),
        TokenizerBackend::CoreNlp => {
            let client = corenlp::CoreNlpTokenizer::new(
                &config.url,
                Duration::from_secs(config.timeout_secs),
            )?;
            Arc::new(retry::RetryingTokenizer::new(
                client,
                config.max_retries,
                Duration::from_millis(config.backoff_ms),
            ))
        }
    };
    Ok(tokenizer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Content,
    Separator,
}

/// One paragraph of a super-node after tokenization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub kind: ChunkKind,
    pub sentences: Vec<Vec<String>>,
    /// Token offsets within the owning super-node's flat token sequence.
    pub offsets: Range<usize>,
}

impl Chunk {
    #[must_use]
    pub fn is_separator(&self) -> bool {
        self.kind == ChunkKind::Separator
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.sentences.iter().flatten().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Tokens joined by single spaces.
    #[must_use]
    pub fn flattened(&self) -> String {
        self.tokens().collect::<Vec<_>>().join(" ")
    }
}

/// Split text on blank lines, dropping whitespace-only paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Turns super-node text into chunks through a [`SentenceTokenizer`].
pub struct ChunkTokenizer<'a> {
    tokenizer: &'a dyn SentenceTokenizer,
    separator_token: String,
}

impl<'a> ChunkTokenizer<'a> {
    pub fn new(tokenizer: &'a dyn SentenceTokenizer, separator_token: impl Into<String>) -> Self {
        Self {
            tokenizer,
            separator_token: separator_token.into(),
        }
    }

    /// Chunk the given source texts in order. A separator chunk sits between
    /// the paragraphs of two consecutive non-empty sources.
    pub fn chunk_segments(&self, segments: &[String]) -> Result<Vec<Chunk>, TokenizerError> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut offset = 0;

        for segment in segments {
            let paragraphs = split_paragraphs(segment);
            if paragraphs.is_empty() {
                continue;
            }

            if !chunks.is_empty() {
                let width = 2;
                chunks.push(Chunk {
                    index: chunks.len(),
                    kind: ChunkKind::Separator,
                    sentences: vec![vec![self.separator_token.clone(); width]],
                    offsets: offset..offset + width,
                });
                offset += width;
            }

            for sentences in self.tokenizer.tokenize_batch(&paragraphs)? {
                let len: usize = sentences.iter().map(Vec::len).sum();
                chunks.push(Chunk {
                    index: chunks.len(),
                    kind: ChunkKind::Content,
                    sentences,
                    offsets: offset..offset + len,
                });
                offset += len;
            }
        }

        Ok(chunks)
    }

    /// Tokenize a super-node in place. Only a pending node is tokenized; a
    /// second call is a no-op. On failure the node is marked unprocessed and
    /// keeps no chunks.
    pub fn tokenize_node(&self, node: &mut SuperNode) -> Result<(), TokenizerError> {
        if !node.is_pending() {
            debug!("Super-node {} already tokenized, skipping", node.id);
            return Ok(());
        }

        if node.segments().iter().all(|s| s.trim().is_empty()) {
            warn!("Super-node {} has no text after merge", node.id);
            node.set_chunks(Vec::new());
            return Ok(());
        }

        match self.chunk_segments(node.segments()) {
            Ok(chunks) => {
                node.set_chunks(chunks);
                Ok(())
            }
            Err(e) => {
                node.mark_unprocessed();
                Err(e)
            }
        }
    }
}
