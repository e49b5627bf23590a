//! Ancestor contexts: for each note, the texts of the notes above it, from
//! the root down to its direct parent.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use super::{ForumError, ForumThread, NoteId, children_index};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextExample {
    pub context: Vec<String>,
    pub text: String,
}

/// Build the context of every note reachable from the root. With
/// `leaves_only`, notes that have replies are left out.
pub fn contextualize(
    thread: &ForumThread,
    leaves_only: bool,
) -> Result<BTreeMap<NoteId, ContextExample>, ForumError> {
    let root = thread.validate()?;
    let children = children_index(&thread.structure);
    let parents: BTreeSet<&NoteId> = thread.structure.values().flatten().collect();

    let mut contexts: BTreeMap<NoteId, Vec<String>> = BTreeMap::new();
    contexts.insert(root.clone(), Vec::new());
    let mut queue: VecDeque<&NoteId> = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let Some(kids) = children.get(current) else {
            continue;
        };
        let mut inherited = contexts.get(current).cloned().unwrap_or_default();
        if let Some(note) = thread.notes.get(current) {
            inherited.push(note.text.clone());
        }
        for kid in kids {
            contexts.insert(kid.clone(), inherited.clone());
            queue.push_back(kid);
        }
    }

    let examples = contexts
        .into_iter()
        .filter(|(id, _)| !leaves_only || !parents.contains(id))
        .filter_map(|(id, context)| {
            let text = thread.notes.get(&id)?.text.clone();
            Some((id, ContextExample { context, text }))
        })
        .collect();
    Ok(examples)
}
