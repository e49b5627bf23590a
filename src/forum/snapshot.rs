/// Static dataset snapshot: every split's threads as fetched from the forum.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::openreview::RawNote;
use super::{ForumThread, Note};

/// One thread as stored in a snapshot file. Either already-normalized notes
/// or a raw export from the review platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThreadInput {
    Notes {
        forum_id: String,
        notes: Vec<Note>,
    },
    Raw {
        forum_id: String,
        raw_notes: Vec<RawNote>,
    },
}

impl ThreadInput {
    #[must_use]
    pub fn forum_id(&self) -> &str {
        match self {
            Self::Notes { forum_id, .. } | Self::Raw { forum_id, .. } => forum_id,
        }
    }

    /// Normalize into a pruned [`ForumThread`].
    #[must_use]
    pub fn into_thread(self) -> ForumThread {
        match self {
            Self::Notes { forum_id, notes } => ForumThread::from_notes(forum_id, notes),
            Self::Raw {
                forum_id,
                raw_notes,
            } => {
                let notes = raw_notes.into_iter().map(RawNote::into_note).collect();
                ForumThread::from_notes(forum_id, notes)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSnapshot {
    #[serde(default)]
    pub conference: String,
    pub splits: BTreeMap<String, Vec<ThreadInput>>,
}

impl DatasetSnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&data)
            .with_context(|| format!("invalid snapshot JSON: {}", path.display()))?;
        info!(
            "Loaded snapshot {} ({} splits, {} threads)",
            path.display(),
            snapshot.splits.len(),
            snapshot.splits.values().map(Vec::len).sum::<usize>()
        );
        Ok(snapshot)
    }
}
