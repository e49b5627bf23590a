/// Thread processing and the bounded worker pool.
///
/// Each thread goes through three phases: restructure into super-nodes
/// (pure), tokenize the super-nodes (blocking service calls), align parent
/// questions with child chunks (pure). Threads are independent, so a split
/// is processed by a pool of blocking workers bounded by a semaphore.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::align::{Alignment, ChunkAligner};
use crate::config::Config;
use crate::forum::snapshot::DatasetSnapshot;
use crate::forum::{ForumError, ForumThread};
use crate::output::{OutputRecord, output_path};
use crate::supernode::{SupernodeTree, build_thread};
use crate::tokenizer::{ChunkTokenizer, SentenceTokenizer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
    pub supernodes: usize,
    /// Notes merged into an earlier note of the same author.
    pub absorbed: usize,
    /// Super-nodes the tokenizer gave up on.
    pub unprocessed: usize,
    /// Verified verbatim windows shared along edges.
    pub quoted_windows: usize,
}

#[derive(Debug, Clone)]
pub struct ProcessedThread {
    pub forum_id: String,
    pub tree: SupernodeTree,
    pub alignment: Alignment,
    pub stats: ThreadStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub threads: usize,
    /// Threads dropped because their reply graph was malformed.
    pub skipped: usize,
    pub supernodes: usize,
    pub absorbed: usize,
    pub unprocessed: usize,
    pub questions: usize,
    pub answers: usize,
    pub quoted_windows: usize,
}

impl SplitSummary {
    fn add(&mut self, processed: &ProcessedThread) {
        self.threads += 1;
        self.supernodes += processed.stats.supernodes;
        self.absorbed += processed.stats.absorbed;
        self.unprocessed += processed.stats.unprocessed;
        self.quoted_windows += processed.stats.quoted_windows;
        self.questions += processed.alignment.questions.len();
        self.answers += processed.alignment.answers.len();
    }
}

/// Run all three phases on one thread.
///
/// A malformed reply graph fails the thread. A tokenizer failure only marks
/// the affected super-node unprocessed; it then yields no questions or
/// answers.
pub fn process_thread(
    thread: &ForumThread,
    tokenizer: &dyn SentenceTokenizer,
    config: &Config,
) -> Result<ProcessedThread, ForumError> {
    let mut tree = build_thread(thread)?;

    let chunker = ChunkTokenizer::new(tokenizer, config.separator_token.clone());
    let mut unprocessed = 0;
    for node in tree.nodes_mut() {
        if let Err(e) = chunker.tokenize_node(node) {
            warn!(
                "Tokenization failed for super-node {} in {}: {e}",
                node.id, thread.forum_id
            );
            unprocessed += 1;
        }
    }

    let aligner = ChunkAligner::from_config(config);
    let alignment = aligner.align_tree(&tree);

    let quoted_windows = tree
        .edges()
        .iter()
        .filter_map(|(p, c)| Some(aligner.quoted_windows(tree.get(p)?, tree.get(c)?)))
        .sum();
    let absorbed = tree
        .nodes()
        .values()
        .map(|n| n.source_note_ids().len() - 1)
        .sum();

    let stats = ThreadStats {
        supernodes: tree.len(),
        absorbed,
        unprocessed,
        quoted_windows,
    };
    debug!(
        "{}: {} super-nodes, {} questions, {} answers, {} quoted windows",
        thread.forum_id,
        stats.supernodes,
        alignment.questions.len(),
        alignment.answers.len(),
        stats.quoted_windows
    );

    Ok(ProcessedThread {
        forum_id: thread.forum_id.clone(),
        tree,
        alignment,
        stats,
    })
}

fn progress_bar(len: usize, split: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {bar:40.cyan/blue} {pos}/{len} threads {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(split.to_string());
    pb
}

/// Process every thread of one split on at most `config.workers` blocking
/// workers and assemble the split's output record in input order.
///
/// Malformed threads are logged and skipped; they never abort the split.
pub async fn run_split(
    threads: Vec<ForumThread>,
    tokenizer: Arc<dyn SentenceTokenizer>,
    config: Arc<Config>,
    conference: &str,
    split: &str,
) -> Result<(OutputRecord, SplitSummary)> {
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let pb = progress_bar(threads.len(), split);
    let mut workers = JoinSet::new();

    for (index, thread) in threads.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("worker pool closed")?;
        let tokenizer = Arc::clone(&tokenizer);
        let config = Arc::clone(&config);
        let pb = pb.clone();
        workers.spawn_blocking(move || {
            let _permit = permit;
            let result = process_thread(&thread, tokenizer.as_ref(), &config);
            pb.inc(1);
            (index, thread.forum_id, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = workers.join_next().await {
        results.push(joined.context("thread worker panicked")?);
    }
    pb.finish_and_clear();
    results.sort_by_key(|(index, _, _)| *index);

    let mut record = OutputRecord::new(conference, split);
    let mut summary = SplitSummary::default();
    for (_, forum_id, result) in results {
        match result {
            Ok(processed) => {
                summary.add(&processed);
                record.push_thread(&processed.tree, &processed.alignment);
            }
            Err(e) => {
                warn!("Skipping thread {forum_id}: {e}");
                summary.skipped += 1;
            }
        }
    }

    info!(
        "Split {split}: {} threads ({} skipped), {} super-nodes, {} questions, {} answers",
        summary.threads,
        summary.skipped,
        summary.supernodes,
        summary.questions,
        summary.answers
    );
    Ok((record, summary))
}

/// Process every split of a snapshot and write one record per split to
/// `{output_prefix}{conference}_{split}.json`.
pub async fn run_dataset(
    snapshot: DatasetSnapshot,
    tokenizer: Arc<dyn SentenceTokenizer>,
    config: Arc<Config>,
    output_prefix: &str,
) -> Result<Vec<(PathBuf, SplitSummary)>> {
    let conference = snapshot.conference;
    let mut written = Vec::with_capacity(snapshot.splits.len());

    for (split, inputs) in snapshot.splits {
        let threads: Vec<ForumThread> = inputs.into_iter().map(|t| t.into_thread()).collect();
        let (record, summary) = run_split(
            threads,
            Arc::clone(&tokenizer),
            Arc::clone(&config),
            &conference,
            &split,
        )
        .await?;

        let path = output_path(output_prefix, &conference, &split);
        record.write_to(&path)?;
        written.push((path, summary));
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{Note, NoteId};
    use crate::tokenizer::TokenizerError;
    use crate::tokenizer::local::LocalTokenizer;

    struct FailingTokenizer;

    impl SentenceTokenizer for FailingTokenizer {
        fn tokenize(&self, _text: &str) -> Result<Vec<Vec<String>>, TokenizerError> {
            Err(TokenizerError::Request("connection refused".into()))
        }
    }

    fn qa_thread(forum_id: &str) -> ForumThread {
        ForumThread::from_notes(
            forum_id,
            vec![
                Note::new("R", "x", "Which optimizer did you use?", None),
                Note::new(
                    "C",
                    "y",
                    "Which optimizer did you use?\n\nAdam.\n\nRegards.",
                    Some(NoteId::from("R")),
                ),
                Note::new("D", "y", "Also tried SGD.", Some(NoteId::from("C"))),
            ],
        )
    }

    fn two_roots(forum_id: &str) -> ForumThread {
        ForumThread::from_notes(
            forum_id,
            vec![
                Note::new("A", "x", "First?", None),
                Note::new("B", "y", "Second?", None),
            ],
        )
    }

    #[test]
    fn test_process_thread_stats() {
        let processed =
            process_thread(&qa_thread("f"), &LocalTokenizer::new(), &Config::default()).unwrap();
        assert_eq!(processed.stats.supernodes, 2);
        assert_eq!(processed.stats.absorbed, 1);
        assert_eq!(processed.stats.unprocessed, 0);
        assert_eq!(processed.alignment.answers.len(), 1);
    }

    #[test]
    fn test_large_modulus_is_processed() {
        let mut config = Config::default();
        config.matcher.modulus = 18_446_744_073_709_551_557;
        config.alignment.verbatim_window_rule = true;
        assert!(config.validate().is_ok());

        let large = process_thread(&qa_thread("f"), &LocalTokenizer::new(), &config).unwrap();
        let default =
            process_thread(&qa_thread("f"), &LocalTokenizer::new(), &Config::default()).unwrap();
        assert_eq!(large.stats.quoted_windows, 2);
        assert_eq!(large.stats, default.stats);
        assert_eq!(large.alignment.answers.len(), 1);
    }

    #[test]
    fn test_tokenizer_failure_marks_nodes_unprocessed() {
        let processed =
            process_thread(&qa_thread("f"), &FailingTokenizer, &Config::default()).unwrap();
        assert_eq!(processed.stats.unprocessed, 2);
        assert!(processed.alignment.questions.is_empty());
        assert!(processed.alignment.answers.is_empty());
    }

    #[test]
    fn test_malformed_thread_fails() {
        let err = process_thread(&two_roots("bad"), &LocalTokenizer::new(), &Config::default())
            .unwrap_err();
        assert!(matches!(err, ForumError::MultipleRoots(_)));
    }

    #[tokio::test]
    async fn test_run_split_skips_malformed_and_keeps_order() {
        let threads = vec![qa_thread("t1"), two_roots("bad"), qa_thread("t2")];
        let mut config = Config::default();
        config.workers = 2;

        let (record, summary) = run_split(
            threads,
            Arc::new(LocalTokenizer::new()),
            Arc::new(config),
            "conf",
            "train",
        )
        .await
        .unwrap();

        assert_eq!(summary.threads, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.answers, 2);
        assert_eq!(record.split, "train");
        assert_eq!(record.nodes.len(), 4);
        let ids: Vec<&str> = record.nodes.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["R", "C", "R", "C"]);
    }
}
