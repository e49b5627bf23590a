/// Import of raw OpenReview note exports.
///
/// A raw note carries its author as a list of signature paths and its text
/// under one of several content keys depending on the invitation type.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Note, NoteId};

/// Content keys that may hold the note body, in lookup order.
const TEXT_KEYS: &[&str] = &["review", "comment", "withdrawal confirmation"];

/// A note as exported by the review platform.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNote {
    pub id: String,
    #[serde(default)]
    pub forum: Option<String>,
    #[serde(default)]
    pub replyto: Option<String>,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub content: Map<String, Value>,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub tcdate: Option<i64>,
}

/// Canonical author name: the last path segment of every signature, sorted
/// and joined with `_`.
///
/// `["ICLR.cc/2019/Conference/Paper12/AnonReviewer2"]` becomes `AnonReviewer2`.
pub fn author_from_signatures(signatures: &[String]) -> String {
    let mut names: Vec<&str> = signatures
        .iter()
        .map(|sig| sig.rsplit('/').next().unwrap_or(sig.as_str()))
        .collect();
    names.sort_unstable();
    names.join("_")
}

impl RawNote {
    /// Note body. The submission itself (no `replyto`) contributes no text.
    #[must_use]
    pub fn text(&self) -> String {
        if self.replyto.is_none() {
            return String::new();
        }
        TEXT_KEYS
            .iter()
            .find_map(|key| self.content.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.tcdate
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn into_note(self) -> Note {
        let text = self.text();
        let creation_time = self.creation_time();
        Note {
            id: NoteId::new(self.id),
            author: author_from_signatures(&self.signatures),
            text,
            reply_to_id: self.replyto.map(NoteId::new),
            creation_time,
        }
    }
}
