//! Question detection: a sentence whose last token is exactly `?`.
use serde::{Deserialize, Serialize};

use crate::forum::NoteId;
use crate::tokenizer::Chunk;

/// A question sentence inside a super-node, as token offsets into the node's
/// flat token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "supnode_id")]
    pub supernode_id: NoteId,
    pub start: usize,
    pub exclusive_end: usize,
}

fn is_question(sentence: &[String]) -> bool {
    sentence.last().is_some_and(|t| t == "?")
}

/// Questions of one chunk, in sentence order.
pub fn questions_in_chunk(supernode_id: &NoteId, chunk: &Chunk) -> Vec<Question> {
    let mut offset = chunk.offsets.start;
    let mut questions = Vec::new();
    for sentence in &chunk.sentences {
        if is_question(sentence) {
            questions.push(Question {
                supernode_id: supernode_id.clone(),
                start: offset,
                exclusive_end: offset + sentence.len(),
            });
        }
        offset += sentence.len();
    }
    questions
}

/// Questions of every chunk of a super-node, in order.
pub fn extract_questions(supernode_id: &NoteId, chunks: &[Chunk]) -> Vec<Question> {
    chunks
        .iter()
        .filter(|c| !c.is_separator())
        .flat_map(|c| questions_in_chunk(supernode_id, c))
        .collect()
}
