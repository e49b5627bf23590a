//! Raw note graph for one discussion thread.
//!
//! A thread is a `child -> parent` mapping over note ids plus the notes
//! themselves. Exactly one note has no parent (the root); everything else
//! must chain back to it.
pub mod context;
pub mod openreview;
pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a note (and of the super-node headed by that note).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single forum note. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to_id: Option<NoteId>,
    #[serde(default)]
    pub creation_time: DateTime<Utc>,
}

impl Note {
    pub fn new(
        id: impl Into<NoteId>,
        author: impl Into<String>,
        text: impl Into<String>,
        reply_to_id: Option<NoteId>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            reply_to_id,
            creation_time: DateTime::<Utc>::default(),
        }
    }

    #[must_use]
    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = creation_time;
        self
    }
}

/// Merge decision: two notes belong to the same logical comment only if
/// they share an author.
#[must_use]
pub fn same_author(a: &Note, b: &Note) -> bool {
    a.author == b.author
}

/// `child -> parent` mapping for one thread; `None` marks the root.
pub type ForumStructure = BTreeMap<NoteId, Option<NoteId>>;

/// The thread's reply graph is not a tree rooted at a single note.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForumError {
    #[error("thread has no root note")]
    NoRoot,

    #[error("thread has more than one root note: {0:?}")]
    MultipleRoots(Vec<NoteId>),

    #[error("note {child} replies to unknown note {parent}")]
    DanglingParent { child: NoteId, parent: NoteId },

    #[error("note {0} is in the reply structure but missing from the node map")]
    MissingNote(NoteId),

    #[error("notes not reachable from the root (cycle or disconnected): {0:?}")]
    Unreachable(Vec<NoteId>),
}

/// One thread: the pruned reply structure and the notes that occur in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumThread {
    pub forum_id: String,
    pub structure: ForumStructure,
    pub notes: BTreeMap<NoteId, Note>,
}

impl ForumThread {
    /// Build a thread from an explicit structure, keeping only the notes that
    /// occur in it as a key or a parent value.
    pub fn new(
        forum_id: impl Into<String>,
        structure: ForumStructure,
        mut notes: BTreeMap<NoteId, Note>,
    ) -> Self {
        let present = structure_ids(&structure);
        notes.retain(|id, _| present.contains(id));
        Self {
            forum_id: forum_id.into(),
            structure,
            notes,
        }
    }

    /// Build a thread from fetched notes, deriving the structure from each
    /// note's `reply_to_id` and pruning orphaned subtrees.
    pub fn from_notes(forum_id: impl Into<String>, notes: Vec<Note>) -> Self {
        let parents: ForumStructure = notes
            .iter()
            .map(|n| (n.id.clone(), n.reply_to_id.clone()))
            .collect();
        let structure = prune_orphans(&parents);
        let notes = notes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self::new(forum_id, structure, notes)
    }

    /// Find the unique root, failing on zero or several.
    pub fn root(&self) -> Result<&NoteId, ForumError> {
        find_root(&self.structure)
    }

    /// Check that the structure is a tree rooted at its unique root and that
    /// every note in it is present in the node map.
    pub fn validate(&self) -> Result<&NoteId, ForumError> {
        validate_structure(&self.structure, &self.notes)
    }
}

/// All ids mentioned in a structure, as keys or as parents.
fn structure_ids(structure: &ForumStructure) -> BTreeSet<NoteId> {
    structure
        .iter()
        .flat_map(|(child, parent)| std::iter::once(child).chain(parent.iter()))
        .cloned()
        .collect()
}

pub fn find_root(structure: &ForumStructure) -> Result<&NoteId, ForumError> {
    let roots: Vec<&NoteId> = structure
        .iter()
        .filter(|(_, parent)| parent.is_none())
        .map(|(id, _)| id)
        .collect();
    match roots.as_slice() {
        [] => Err(ForumError::NoRoot),
        [root] => Ok(*root),
        many => Err(ForumError::MultipleRoots(
            many.iter().map(|id| (*id).clone()).collect(),
        )),
    }
}

/// Parent -> children index. Children keep the structure's key order.
pub fn children_index(structure: &ForumStructure) -> BTreeMap<NoteId, Vec<NoteId>> {
    let mut children: BTreeMap<NoteId, Vec<NoteId>> = BTreeMap::new();
    for (child, parent) in structure {
        if let Some(parent) = parent {
            children
                .entry(parent.clone())
                .or_default()
                .push(child.clone());
        }
    }
    children
}

/// Validate the tree shape: one root, no dangling parents, every note known,
/// every note reachable from the root.
pub fn validate_structure<'a>(
    structure: &'a ForumStructure,
    notes: &BTreeMap<NoteId, Note>,
) -> Result<&'a NoteId, ForumError> {
    let root = find_root(structure)?;

    for (child, parent) in structure {
        if let Some(parent) = parent {
            if !structure.contains_key(parent) {
                return Err(ForumError::DanglingParent {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
        }
        if !notes.contains_key(child) {
            return Err(ForumError::MissingNote(child.clone()));
        }
    }

    let children = children_index(structure);
    let mut seen: BTreeSet<&NoteId> = BTreeSet::new();
    let mut queue: VecDeque<&NoteId> = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        if let Some(kids) = children.get(current) {
            queue.extend(kids.iter());
        }
    }

    if seen.len() != structure.len() {
        let unreachable = structure
            .keys()
            .filter(|id| !seen.contains(id))
            .cloned()
            .collect();
        return Err(ForumError::Unreachable(unreachable));
    }

    Ok(root)
}

/// Drop every subtree hanging off a parent id that is not itself a note of
/// the thread.
///
/// Such a parent is referenced but never appears as a child, so its whole
/// descendant set can never chain back to the root.
pub fn prune_orphans(parents: &ForumStructure) -> ForumStructure {
    let mut children: BTreeMap<Option<NoteId>, Vec<NoteId>> = BTreeMap::new();
    for (child, parent) in parents {
        children
            .entry(parent.clone())
            .or_default()
            .push(child.clone());
    }

    let mut orphans: Vec<NoteId> = children
        .keys()
        .flatten()
        .filter(|parent| !parents.contains_key(*parent))
        .cloned()
        .collect();

    while let Some(orphan) = orphans.pop() {
        if let Some(kids) = children.remove(&Some(orphan)) {
            orphans.extend(kids);
        }
    }

    let mut pruned = ForumStructure::new();
    for (parent, kids) in children {
        for child in kids {
            let previous = pruned.insert(child, parent.clone());
            debug_assert!(previous.is_none());
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NoteId {
        NoteId::from(s)
    }

    fn structure(edges: &[(&str, Option<&str>)]) -> ForumStructure {
        edges
            .iter()
            .map(|(c, p)| (id(c), p.map(id)))
            .collect()
    }

    fn notes_for(structure: &ForumStructure) -> BTreeMap<NoteId, Note> {
        structure
            .iter()
            .map(|(c, p)| (c.clone(), Note::new(c.clone(), "a", "text", p.clone())))
            .collect()
    }

    #[test]
    fn test_find_root_unique() {
        let s = structure(&[("r", None), ("a", Some("r")), ("b", Some("a"))]);
        assert_eq!(find_root(&s).unwrap(), &id("r"));
    }

    #[test]
    fn test_find_root_none() {
        let s = structure(&[("a", Some("b")), ("b", Some("a"))]);
        assert_eq!(find_root(&s), Err(ForumError::NoRoot));
    }

    #[test]
    fn test_find_root_multiple() {
        let s = structure(&[("r1", None), ("r2", None)]);
        assert!(matches!(
            find_root(&s),
            Err(ForumError::MultipleRoots(ids)) if ids.len() == 2
        ));
    }

    #[test]
    fn test_validate_dangling_parent() {
        let s = structure(&[("r", None), ("a", Some("ghost"))]);
        let notes = notes_for(&s);
        assert_eq!(
            validate_structure(&s, &notes),
            Err(ForumError::DanglingParent {
                child: id("a"),
                parent: id("ghost"),
            })
        );
    }

    #[test]
    fn test_validate_cycle_detached_from_root() {
        let s = structure(&[("r", None), ("a", Some("b")), ("b", Some("a"))]);
        let notes = notes_for(&s);
        assert_eq!(
            validate_structure(&s, &notes),
            Err(ForumError::Unreachable(vec![id("a"), id("b")]))
        );
    }

    #[test]
    fn test_validate_missing_note() {
        let s = structure(&[("r", None), ("a", Some("r"))]);
        let mut notes = notes_for(&s);
        notes.remove(&id("a"));
        assert_eq!(
            validate_structure(&s, &notes),
            Err(ForumError::MissingNote(id("a")))
        );
    }

    #[test]
    fn test_prune_orphans_removes_subtree() {
        let s = structure(&[
            ("r", None),
            ("a", Some("r")),
            ("x", Some("deleted")),
            ("y", Some("x")),
            ("z", Some("y")),
        ]);
        let pruned = prune_orphans(&s);
        assert_eq!(pruned, structure(&[("r", None), ("a", Some("r"))]));
    }

    #[test]
    fn test_prune_orphans_keeps_valid_tree() {
        let s = structure(&[("r", None), ("a", Some("r")), ("b", Some("a"))]);
        assert_eq!(prune_orphans(&s), s);
    }

    #[test]
    fn test_from_notes_restricts_node_map() {
        let notes = vec![
            Note::new("r", "x", "root", None),
            Note::new("a", "y", "reply", Some(id("r"))),
            Note::new("o", "z", "orphan", Some(id("gone"))),
        ];
        let thread = ForumThread::from_notes("f1", notes);
        assert_eq!(thread.structure.len(), 2);
        assert!(!thread.notes.contains_key(&id("o")));
        assert_eq!(thread.validate().unwrap(), &id("r"));
    }

    #[test]
    fn test_same_author() {
        let a = Note::new("1", "alice", "", None);
        let b = Note::new("2", "alice", "", None);
        let c = Note::new("3", "bob", "", None);
        assert!(same_author(&a, &b));
        assert!(!same_author(&a, &c));
    }
}
