/// CoreNLP server adapter.
///
/// Posts each paragraph to a running CoreNLP server with the `tokenize` and
/// `ssplit` annotators and reads the JSON sentence/token output.
use std::time::Duration;

use serde::Deserialize;

use super::{SentenceTokenizer, TokenizerError};

const PROPERTIES: &str = r#"{"annotators":"tokenize,ssplit","outputFormat":"json"}"#;

#[derive(Deserialize)]
struct CoreNlpDocument {
    #[serde(default)]
    sentences: Vec<CoreNlpSentence>,
}

#[derive(Deserialize)]
struct CoreNlpSentence {
    #[serde(default)]
    tokens: Vec<CoreNlpToken>,
}

#[derive(Deserialize)]
struct CoreNlpToken {
    word: String,
}

pub struct CoreNlpTokenizer {
    client: reqwest::blocking::Client,
    endpoint: reqwest::Url,
}

impl CoreNlpTokenizer {
    /// Create an adapter for the server at `url` (e.g. `http://localhost:9000`).
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TokenizerError> {
        let endpoint = reqwest::Url::parse_with_params(url, &[("properties", PROPERTIES)])
            .map_err(|e| TokenizerError::Request(format!("invalid server url {url}: {e}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("forumqa-tokenizer")
            .build()
            .map_err(|e| TokenizerError::Request(format!("HTTP client build failed: {e}")))?;

        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

fn into_sentences(doc: CoreNlpDocument) -> Vec<Vec<String>> {
    doc.sentences
        .into_iter()
        .map(|s| s.tokens.into_iter().map(|t| t.word).collect::<Vec<_>>())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a CoreNLP JSON response body.
fn parse_response(body: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
    let doc: CoreNlpDocument =
        serde_json::from_str(body).map_err(|e| TokenizerError::InvalidResponse(e.to_string()))?;
    Ok(into_sentences(doc))
}

impl SentenceTokenizer for CoreNlpTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .body(text.to_string())
            .send()
            .map_err(|e| TokenizerError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TokenizerError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .map_err(|e| TokenizerError::InvalidResponse(e.to_string()))?;
        parse_response(&body)
    }
}
