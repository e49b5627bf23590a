/// Dataset output records.
///
/// One record is written per split. Nodes carry their flat token sequence,
/// separator markers included, so question and answer offsets index
/// straight into `tokens`.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::align::{Alignment, Answer, Question};
use crate::forum::NoteId;
use crate::supernode::{SuperNode, SupernodeTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NoteId,
    /// Original note ids, in merge order.
    pub included_nodes: Vec<NoteId>,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(default)]
    pub conference: String,
    #[serde(default)]
    pub split: String,
    pub nodes: Vec<NodeRecord>,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
}

#[must_use]
pub fn node_record(node: &SuperNode) -> NodeRecord {
    NodeRecord {
        node_id: node.id.clone(),
        included_nodes: node.source_note_ids().to_vec(),
        tokens: node.tokens(),
    }
}

/// Split a node's flat token sequence back into per-note token runs at the
/// separator markers.
pub fn split_segments<S: AsRef<str>>(tokens: &[S], separator: &str) -> Vec<Vec<String>> {
    tokens
        .split(|t| t.as_ref() == separator)
        .filter(|run| !run.is_empty())
        .map(|run| run.iter().map(|t| t.as_ref().to_string()).collect())
        .collect()
}

/// `{prefix}{conference}_{split}.json`
#[must_use]
pub fn output_path(prefix: &str, conference: &str, split: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}{conference}_{split}.json"))
}

impl OutputRecord {
    pub fn new(conference: impl Into<String>, split: impl Into<String>) -> Self {
        Self {
            conference: conference.into(),
            split: split.into(),
            ..Self::default()
        }
    }

    /// Append one collapsed thread: its nodes in breadth-first order, then its
    /// questions and answers.
    pub fn push_thread(&mut self, tree: &SupernodeTree, alignment: &Alignment) {
        self.nodes.extend(
            tree.bfs_order()
                .iter()
                .filter_map(|id| tree.get(id))
                .map(node_record),
        );
        self.questions.extend(alignment.questions.iter().cloned());
        self.answers.extend(alignment.answers.iter().cloned());
    }

    pub fn node(&self, id: &NoteId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| &n.node_id == id)
    }

    /// Tokens covered by `[start, exclusive_end)` in node `id`.
    pub fn span_tokens(&self, id: &NoteId, start: usize, exclusive_end: usize) -> Option<&[String]> {
        self.node(id)?.tokens.get(start..exclusive_end)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string(self).context("failed to serialize output record")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write output: {}", path.display()))?;
        info!(
            "Wrote {} ({} nodes, {} questions, {} answers)",
            path.display(),
            self.nodes.len(),
            self.questions.len(),
            self.answers.len()
        );
        Ok(())
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read output: {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("invalid output JSON: {}", path.display()))
    }
}
