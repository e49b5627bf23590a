//! # forumqa — question/answer spans from threaded discussions
//!
//! Restructures a review forum (nested reply notes) into same-author
//! super-nodes, tokenizes them into paragraph chunks, detects question
//! sentences and aligns parent questions with the child chunks that answer
//! them. The result is a dataset for training question-answering models.
//!
//! ## Architecture
//!
//! - **[`forum`]** — Note graph per thread, orphan pruning, OpenReview import, ancestor contexts
//! - **[`supernode`]** — Same-author reply-chain merging and the collapsed tree
//! - **[`tokenizer`]** — Sentence tokenizer seam (local regex, CoreNLP over HTTP, retry) and chunking
//! - **[`align`]** — Question detection, similarity scoring, Karp-Rabin windows, chunk alignment
//! - **[`output`]** — Dataset output records
//! - **[`pipeline`]** — Per-thread three-phase processing and the bounded worker pool
//! - **[`config`]** — Configuration loading, validation and defaults

pub mod align;
pub mod config;
pub mod forum;
pub mod output;
pub mod pipeline;
pub mod supernode;
pub mod tokenizer;
