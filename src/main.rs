use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use forumqa::config::Config;
use forumqa::forum::context::contextualize;
use forumqa::forum::snapshot::DatasetSnapshot;
use forumqa::pipeline::run_dataset;
use forumqa::tokenizer;

#[derive(Parser, Debug)]
#[command(name = "forumqa", version, about = "Question/answer spans from review discussions")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the QA span dataset, one output file per split
    Build {
        /// Dataset snapshot (JSON)
        #[arg(long)]
        input: PathBuf,

        /// Prefix of the output files; `{prefix}{conference}_{split}.json`
        #[arg(long, default_value = "")]
        output_prefix: String,
    },
    /// Print every note with its ancestor texts as JSON lines
    Context {
        #[arg(long)]
        input: PathBuf,

        /// Only notes without replies
        #[arg(long)]
        leaves_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Build {
            input,
            output_prefix,
        } => build(config, &input, &output_prefix).await,
        Command::Context { input, leaves_only } => context(&input, leaves_only),
    }
}

async fn build(config: Config, input: &std::path::Path, output_prefix: &str) -> Result<()> {
    // 2. Load threads
    let snapshot = DatasetSnapshot::load(input)?;

    // 3. Init tokenizer
    let tokenizer = tokenizer::from_config(&config.tokenizer).context("failed to init tokenizer")?;

    // 4. Process splits
    let written = run_dataset(snapshot, tokenizer, Arc::new(config), output_prefix).await?;
    for (path, summary) in &written {
        info!(
            "{}: {} threads, {} skipped, {} questions, {} answers, {} unprocessed super-nodes",
            path.display(),
            summary.threads,
            summary.skipped,
            summary.questions,
            summary.answers,
            summary.unprocessed
        );
    }
    Ok(())
}

fn context(input: &std::path::Path, leaves_only: bool) -> Result<()> {
    let snapshot = DatasetSnapshot::load(input)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for (split, inputs) in snapshot.splits {
        for input in inputs {
            let thread = input.into_thread();
            let examples = match contextualize(&thread, leaves_only) {
                Ok(examples) => examples,
                Err(e) => {
                    warn!("Skipping thread {}: {e}", thread.forum_id);
                    continue;
                }
            };
            for (note_id, example) in examples {
                let line = serde_json::json!({
                    "split": split,
                    "forum_id": thread.forum_id,
                    "note_id": note_id,
                    "context": example.context,
                    "text": example.text,
                });
                writeln!(out, "{line}").context("failed to write to stdout")?;
            }
        }
    }
    Ok(())
}
