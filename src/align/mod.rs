//! Parent/child chunk alignment.
//!
//! For every edge of the collapsed tree, each parent chunk that contains a
//! question is compared with each child chunk. A rule that fires names the
//! child chunk that answers all of that parent chunk's questions.
pub mod karp_rabin;
pub mod questions;
pub mod similarity;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AlignmentConfig, Config};
use crate::forum::NoteId;
use crate::supernode::{SuperNode, SupernodeTree};
use crate::tokenizer::Chunk;

use karp_rabin::RollingHashMatcher;
pub use questions::{Question, extract_questions, questions_in_chunk};
use similarity::SimilarityScorer;

/// A span of a child super-node judged to answer a parent question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "supnode_id")]
    pub supernode_id: NoteId,
    pub question: Question,
    pub start: usize,
    pub exclusive_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentRule {
    /// The child chunk requotes the parent chunk almost verbatim; the child
    /// chunk itself is the answer.
    NearDuplicate,
    /// Parent and child share an informative prefix (quote marker,
    /// boilerplate); the next child chunk is the answer.
    BoilerplatePrefix,
    /// A verified Karp-Rabin window is shared; the next child chunk is the
    /// answer.
    VerbatimWindow,
}

/// Questions and answers found in one collapsed thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone)]
pub struct ChunkAligner {
    scorer: SimilarityScorer,
    matcher: RollingHashMatcher,
    rules: AlignmentConfig,
}

impl Default for ChunkAligner {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn content_chunks(node: &SuperNode) -> Vec<&Chunk> {
    node.chunks().iter().filter(|c| !c.is_separator()).collect()
}

impl ChunkAligner {
    #[must_use]
    pub fn new(scorer: SimilarityScorer, matcher: RollingHashMatcher, rules: AlignmentConfig) -> Self {
        Self {
            scorer,
            matcher,
            rules,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SimilarityScorer::from_config(&config.similarity),
            RollingHashMatcher::from_config(&config.matcher),
            config.alignment.clone(),
        )
    }

    /// Decide whether child chunk `j` answers `parent`. Returns the rule
    /// that fired and the index of the answering child chunk.
    ///
    /// The last child chunk is never a match target.
    pub fn match_chunk(
        &self,
        parent: &Chunk,
        children: &[&Chunk],
        j: usize,
    ) -> Option<(AlignmentRule, usize)> {
        if j + 1 >= children.len() {
            return None;
        }
        let child = children[j];
        let parent_text = parent.flattened();
        let child_text = child.flattened();

        if self.rules.near_duplicate_rule
            && !parent_text.is_empty()
            && self.scorer.is_near_duplicate(&parent_text, &child_text)
        {
            return Some((AlignmentRule::NearDuplicate, j));
        }
        if self.rules.boilerplate_prefix_rule
            && self.scorer.has_informative_prefix(&parent_text, &child_text)
        {
            return Some((AlignmentRule::BoilerplatePrefix, j + 1));
        }
        if self.rules.verbatim_window_rule {
            let parent_tokens: Vec<&str> = parent.tokens().collect();
            let child_tokens: Vec<&str> = child.tokens().collect();
            if !self
                .matcher
                .verified_matches(&parent_tokens, &child_tokens)
                .is_empty()
            {
                return Some((AlignmentRule::VerbatimWindow, j + 1));
            }
        }
        None
    }

    /// Answers in `child` to the questions of `parent`, parent chunks outer,
    /// child chunks inner.
    pub fn align_pair(&self, parent: &SuperNode, child: &SuperNode) -> Vec<Answer> {
        let parent_chunks = content_chunks(parent);
        let child_chunks = content_chunks(child);
        let mut answers = Vec::new();

        for parent_chunk in parent_chunks {
            let questions = questions_in_chunk(&parent.id, parent_chunk);
            if questions.is_empty() {
                continue;
            }
            for j in 0..child_chunks.len() {
                let Some((rule, target)) = self.match_chunk(parent_chunk, &child_chunks, j) else {
                    continue;
                };
                let span = &child_chunks[target].offsets;
                debug!(
                    "{rule:?}: {} chunk {} -> {} chunk {}",
                    parent.id, parent_chunk.index, child.id, child_chunks[target].index
                );
                answers.extend(questions.iter().map(|q| Answer {
                    supernode_id: child.id.clone(),
                    question: q.clone(),
                    start: span.start,
                    exclusive_end: span.end,
                }));
            }
        }

        answers
    }

    /// Questions of every node and answers along every edge, in
    /// breadth-first order.
    pub fn align_tree(&self, tree: &SupernodeTree) -> Alignment {
        let mut alignment = Alignment::default();
        for id in tree.bfs_order() {
            if let Some(node) = tree.get(&id) {
                alignment
                    .questions
                    .extend(extract_questions(&node.id, node.chunks()));
            }
        }
        for (parent_id, child_id) in tree.edges() {
            if let (Some(parent), Some(child)) = (tree.get(&parent_id), tree.get(&child_id)) {
                alignment.answers.extend(self.align_pair(parent, child));
            }
        }
        alignment
    }

    /// Verified verbatim windows shared by any parent/child chunk pair of
    /// the two nodes.
    pub fn quoted_windows(&self, parent: &SuperNode, child: &SuperNode) -> usize {
        let child_tokens: Vec<Vec<&str>> = content_chunks(child)
            .into_iter()
            .map(|c| c.tokens().collect())
            .collect();
        content_chunks(parent)
            .into_iter()
            .map(|p| {
                let parent_tokens: Vec<&str> = p.tokens().collect();
                child_tokens
                    .iter()
                    .map(|c| self.matcher.verified_matches(&parent_tokens, c).len())
                    .sum::<usize>()
            })
            .sum()
    }
}
