//! Super-node construction.
//!
//! A super-node is a maximal run of reply-linked notes written by the same
//! author, treated as one logical comment. The builder folds the note tree
//! into super-nodes and re-derives the parent mapping over the survivors.
//!
//! All nodes live in an id-keyed arena; parent and child links are ids, and
//! every walk uses an explicit work-list.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::forum::{ForumError, ForumStructure, ForumThread, Note, NoteId, children_index};
use crate::forum::{same_author, validate_structure};
use crate::tokenizer::{Chunk, PARAGRAPH_SEPARATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Pending,
    Tokenized,
    /// The tokenization service gave up on this node.
    Unprocessed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperNode {
    pub id: NoteId,
    pub author: String,
    source_note_ids: Vec<NoteId>,
    segments: Vec<String>,
    /// Structural children, in reply order.
    children: Vec<NoteId>,
    chunks: Vec<Chunk>,
    status: TokenStatus,
}

impl SuperNode {
    /// Wrap a single note.
    #[must_use]
    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            author: note.author.clone(),
            source_note_ids: vec![note.id.clone()],
            segments: vec![note.text.clone()],
            children: Vec::new(),
            chunks: Vec::new(),
            status: TokenStatus::Pending,
        }
    }

    /// Merge a same-author reply into this node.
    pub fn absorb(&mut self, note: &Note) {
        debug_assert_eq!(self.author, note.author);
        debug_assert_eq!(self.status, TokenStatus::Pending);
        self.source_note_ids.push(note.id.clone());
        self.segments.push(note.text.clone());
    }

    /// Original note ids, in merge order. The first one is the node's id.
    #[must_use]
    pub fn source_note_ids(&self) -> &[NoteId] {
        &self.source_note_ids
    }

    /// Per-note texts, in merge order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Concatenated text of the non-empty source notes.
    #[must_use]
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }

    #[must_use]
    pub fn children(&self) -> &[NoteId] {
        &self.children
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Flat token sequence, separator tokens included.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flat_map(|c| c.tokens().map(str::to_string))
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> TokenStatus {
        self.status
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TokenStatus::Pending
    }

    #[must_use]
    pub fn is_tokenized(&self) -> bool {
        self.status == TokenStatus::Tokenized
    }

    pub(crate) fn set_chunks(&mut self, chunks: Vec<Chunk>) {
        self.chunks = chunks;
        self.status = TokenStatus::Tokenized;
    }

    pub(crate) fn mark_unprocessed(&mut self) {
        self.chunks.clear();
        self.status = TokenStatus::Unprocessed;
    }
}

/// Collapsed thread: super-node parent mapping plus the arena of nodes.
#[derive(Debug, Clone)]
pub struct SupernodeTree {
    pub root: NoteId,
    pub parents: BTreeMap<NoteId, Option<NoteId>>,
    nodes: BTreeMap<NoteId, SuperNode>,
}

impl SupernodeTree {
    #[must_use]
    pub fn get(&self, id: &NoteId) -> Option<&SuperNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NoteId) -> Option<&mut SuperNode> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<NoteId, SuperNode> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut SuperNode> {
        self.nodes.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in breadth-first order from the root, children in reply order.
    #[must_use]
    pub fn bfs_order(&self) -> Vec<NoteId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root.clone()]);
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&id) {
                queue.extend(node.children.iter().cloned());
            }
            order.push(id);
        }
        order
    }

    /// `(parent, child)` edges in breadth-first order.
    #[must_use]
    pub fn edges(&self) -> Vec<(NoteId, NoteId)> {
        self.bfs_order()
            .into_iter()
            .filter_map(|child| {
                let parent = self.parents.get(&child)?.clone()?;
                Some((parent, child))
            })
            .collect()
    }
}

/// Collapse a thread into super-nodes.
pub fn build_thread(thread: &ForumThread) -> Result<SupernodeTree, ForumError> {
    build(&thread.structure, &thread.notes)
}

/// Collapse `structure` into super-nodes.
///
/// Fails with a [`ForumError`] unless the structure is a tree with a single
/// root whose notes are all present in `notes`.
pub fn build(
    structure: &ForumStructure,
    notes: &BTreeMap<NoteId, Note>,
) -> Result<SupernodeTree, ForumError> {
    let root_id = validate_structure(structure, notes)?;
    let note = |id: &NoteId| notes.get(id).ok_or_else(|| ForumError::MissingNote(id.clone()));

    let mut children = children_index(structure);
    for kids in children.values_mut() {
        kids.sort_by(|a, b| {
            let (na, nb) = (&notes[a], &notes[b]);
            na.creation_time.cmp(&nb.creation_time).then_with(|| a.cmp(b))
        });
    }

    let mut arena: BTreeMap<NoteId, SuperNode> = BTreeMap::new();
    // note id -> id of the super-node that owns it
    let mut owner: BTreeMap<NoteId, NoteId> = BTreeMap::new();

    arena.insert(root_id.clone(), SuperNode::from_note(note(root_id)?));
    owner.insert(root_id.clone(), root_id.clone());

    // Parents are always visited before their replies.
    let mut queue: VecDeque<&NoteId> = VecDeque::from([root_id]);
    while let Some(parent_id) = queue.pop_front() {
        let Some(kids) = children.get(parent_id) else {
            continue;
        };
        let parent_note = note(parent_id)?;
        let parent_owner = owner[parent_id].clone();

        for child_id in kids {
            let child_note = note(child_id)?;
            if same_author(child_note, parent_note) {
                if let Some(head) = arena.get_mut(&parent_owner) {
                    head.absorb(child_note);
                }
                owner.insert(child_id.clone(), parent_owner.clone());
            } else {
                arena.insert(child_id.clone(), SuperNode::from_note(child_note));
                if let Some(head) = arena.get_mut(&parent_owner) {
                    head.children.push(child_id.clone());
                }
                owner.insert(child_id.clone(), child_id.clone());
            }
            queue.push_back(child_id);
        }
    }

    // A head collects children from every note it absorbed; restore reply
    // order across them.
    for node in arena.values_mut() {
        node.children.sort_by(|a, b| {
            let (na, nb) = (&notes[a], &notes[b]);
            na.creation_time.cmp(&nb.creation_time).then_with(|| a.cmp(b))
        });
    }

    let tree = collapse(root_id.clone(), arena);
    check_invariants(&tree);
    debug!(
        "Collapsed {} notes into {} super-nodes",
        structure.len(),
        tree.len()
    );
    Ok(tree)
}

/// Re-walk structural child links from the root to derive the final parent
/// mapping. Nodes never reached are dropped from the arena.
fn collapse(root: NoteId, mut arena: BTreeMap<NoteId, SuperNode>) -> SupernodeTree {
    let mut parents: BTreeMap<NoteId, Option<NoteId>> = BTreeMap::new();
    parents.insert(root.clone(), None);

    let mut queue = VecDeque::from([root.clone()]);
    while let Some(id) = queue.pop_front() {
        let Some(node) = arena.get(&id) else {
            continue;
        };
        for child in &node.children {
            parents.insert(child.clone(), Some(id.clone()));
            queue.push_back(child.clone());
        }
    }

    arena.retain(|id, _| parents.contains_key(id));
    SupernodeTree {
        root,
        parents,
        nodes: arena,
    }
}

/// Construction invariants. A failure here is a builder bug, not bad input.
fn check_invariants(tree: &SupernodeTree) {
    let roots = tree.parents.values().filter(|p| p.is_none()).count();
    assert_eq!(roots, 1, "collapsed tree must have exactly one root");

    for (child, parent) in &tree.parents {
        assert!(tree.nodes.contains_key(child), "{child} missing from arena");
        if let Some(parent) = parent {
            assert!(tree.nodes.contains_key(parent), "{parent} missing from arena");
        }
    }

    for node in tree.nodes.values() {
        for absorbed in node.source_note_ids.iter().skip(1) {
            assert!(
                !tree.parents.contains_key(absorbed),
                "absorbed note {absorbed} is still a live super-node"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NoteId {
        NoteId::from(s)
    }

    /// Build a thread from `(id, author, text, parent)` rows.
    fn thread(rows: &[(&str, &str, &str, Option<&str>)]) -> ForumThread {
        let notes = rows
            .iter()
            .map(|(i, a, t, p)| Note::new(*i, *a, *t, p.map(id)))
            .collect();
        ForumThread::from_notes("forum", notes)
    }

    #[test]
    fn test_chain_merges_in_reply_order() {
        let t = thread(&[
            ("A", "alice", "first", None),
            ("B", "alice", "second", Some("A")),
            ("C", "alice", "third", Some("B")),
        ]);
        let tree = build_thread(&t).unwrap();

        assert_eq!(tree.len(), 1);
        let node = tree.get(&id("A")).unwrap();
        assert_eq!(node.source_note_ids(), &[id("A"), id("B"), id("C")]);
        assert_eq!(node.text(), "first\n\nsecond\n\nthird");
        assert_eq!(tree.parents, BTreeMap::from([(id("A"), None)]));
    }

    #[test]
    fn test_alternating_authors_stay_separate() {
        let t = thread(&[
            ("r", "x", "q?", None),
            ("a", "y", "answer", Some("r")),
            ("b", "x", "follow-up", Some("a")),
        ]);
        let tree = build_thread(&t).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.parents[&id("b")], Some(id("a")));
        assert_eq!(tree.edges(), vec![(id("r"), id("a")), (id("a"), id("b"))]);
    }

    #[test]
    fn test_children_of_absorbed_note_are_reparented() {
        // r(x) <- a(y) <- b(y) <- c(z); b is absorbed into a, c hangs off a.
        let t = thread(&[
            ("r", "x", "root", None),
            ("a", "y", "reply", Some("r")),
            ("b", "y", "more", Some("a")),
            ("c", "z", "third party", Some("b")),
        ]);
        let tree = build_thread(&t).unwrap();

        assert_eq!(tree.get(&id("a")).unwrap().source_note_ids(), &[id("a"), id("b")]);
        assert_eq!(tree.parents[&id("c")], Some(id("a")));
        assert!(!tree.parents.contains_key(&id("b")));
        assert!(tree.parents.values().flatten().all(|p| p != &id("b")));
    }

    #[test]
    fn test_sibling_replies_by_same_author_are_absorbed() {
        let t = thread(&[
            ("r", "x", "root", None),
            ("a", "x", "addendum one", Some("r")),
            ("b", "x", "addendum two", Some("r")),
            ("c", "y", "reviewer", Some("r")),
        ]);
        let tree = build_thread(&t).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.get(&id("r")).unwrap().source_note_ids(),
            &[id("r"), id("a"), id("b")]
        );
        assert_eq!(tree.get(&id("r")).unwrap().children(), &[id("c")]);
    }

    #[test]
    fn test_children_ordered_by_creation_time() {
        use chrono::{TimeZone, Utc};
        let notes = vec![
            Note::new("r", "x", "root", None),
            Note::new("late", "x", "late", Some(id("r")))
                .with_creation_time(Utc.timestamp_opt(200, 0).unwrap()),
            Note::new("early", "x", "early", Some(id("r")))
                .with_creation_time(Utc.timestamp_opt(100, 0).unwrap()),
        ];
        let tree = build_thread(&ForumThread::from_notes("f", notes)).unwrap();
        assert_eq!(
            tree.get(&id("r")).unwrap().source_note_ids(),
            &[id("r"), id("early"), id("late")]
        );
    }

    #[test]
    fn test_tree_invariant_single_root() {
        let t = thread(&[
            ("r", "x", "", None),
            ("a", "y", "", Some("r")),
            ("b", "y", "", Some("a")),
            ("c", "x", "", Some("b")),
            ("d", "x", "", Some("c")),
            ("e", "z", "", Some("r")),
        ]);
        let tree = build_thread(&t).unwrap();

        let roots: Vec<_> = tree.parents.iter().filter(|(_, p)| p.is_none()).collect();
        assert_eq!(roots.len(), 1);
        for absorbed in ["b", "d"] {
            assert!(!tree.parents.contains_key(&id(absorbed)));
            assert!(tree.parents.values().flatten().all(|p| p != &id(absorbed)));
        }
        for (child, parent) in &tree.parents {
            assert!(tree.get(child).is_some());
            if let Some(parent) = parent {
                assert!(tree.get(parent).is_some());
            }
        }
    }

    #[test]
    fn test_malformed_structures_fail() {
        let no_root: ForumStructure = BTreeMap::from([(id("a"), Some(id("b"))), (id("b"), Some(id("a")))]);
        let notes: BTreeMap<NoteId, Note> = ["a", "b"]
            .iter()
            .map(|i| (id(i), Note::new(*i, "x", "", None)))
            .collect();
        assert_eq!(build(&no_root, &notes).unwrap_err(), ForumError::NoRoot);

        let two_roots: ForumStructure = BTreeMap::from([(id("a"), None), (id("b"), None)]);
        assert!(matches!(
            build(&two_roots, &notes),
            Err(ForumError::MultipleRoots(_))
        ));

        let dangling: ForumStructure =
            BTreeMap::from([(id("a"), None), (id("b"), Some(id("ghost")))]);
        assert!(matches!(
            build(&dangling, &notes),
            Err(ForumError::DanglingParent { .. })
        ));
    }

    #[test]
    fn test_bfs_order_follows_reply_time() {
        use chrono::{TimeZone, Utc};
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        // r(x) <- r2(x) absorbed; siblings come from both notes of the head.
        let notes = vec![
            Note::new("r", "x", "root", None),
            Note::new("a", "y", "late reply", Some(id("r"))).with_creation_time(at(500)),
            Note::new("r2", "x", "addendum", Some(id("r"))).with_creation_time(at(100)),
            Note::new("z", "z", "early reply", Some(id("r2"))).with_creation_time(at(200)),
            Note::new("b", "w", "middle reply", Some(id("r"))).with_creation_time(at(300)),
        ];
        let tree = build_thread(&ForumThread::from_notes("f", notes)).unwrap();

        assert_eq!(tree.get(&id("r")).unwrap().children(), &[id("z"), id("b"), id("a")]);
        assert_eq!(tree.bfs_order(), vec![id("r"), id("z"), id("b"), id("a")]);
    }

    #[test]
    fn test_bfs_order_starts_at_root() {
        let t = thread(&[
            ("r", "x", "", None),
            ("b", "y", "", Some("r")),
            ("a", "z", "", Some("r")),
            ("c", "x", "", Some("a")),
        ]);
        let tree = build_thread(&t).unwrap();
        assert_eq!(tree.bfs_order(), vec![id("r"), id("a"), id("b"), id("c")]);
    }
}
