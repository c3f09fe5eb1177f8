//! ncertqa: query NCERT textbook chunks from the command line.
//!
//! Usage:
//!   ncertqa query "What is photosynthesis?" --grade 5 --subject science
//!   ncertqa chat --grade 7
//!   ncertqa stats --json

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use ncertqa_core::config::{resolve_with_base, Config, LogConfig, Settings};
use ncertqa_core::types::{Filters, Grade, Language, Subject};
use ncertqa_retrieval::{compose_question, Conversation, QaEngine, RetrievalResponse};

const NO_ANSWER: &str =
    "I don't have information about this in the NCERT textbooks. Please ask questions related to your NCERT curriculum.";
const MAX_HISTORY: usize = 20;

#[derive(Parser)]
#[command(name = "ncertqa", version, about = "Retrieve cited passages from NCERT textbooks")]
struct Cli {
    /// Directory or file with *.jsonl chunk files (overrides data.chunks_dir)
    #[arg(long, global = true)]
    chunks_dir: Option<PathBuf>,

    /// Explicit config file instead of config.toml + config.<env>.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a single question
    Query {
        question: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// OCR text extracted from an attached image
        #[arg(long)]
        image_text: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session with follow-up questions
    Chat {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Corpus and index statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Clone, Copy)]
struct FilterArgs {
    /// Class 5 to 10, e.g. `7` or `"class 7"`
    #[arg(long)]
    grade: Option<Grade>,
    /// math, science, social science, english or hindi
    #[arg(long)]
    subject: Option<Subject>,
    /// Language code or name, e.g. `hi` or `Hindi`
    #[arg(long)]
    language: Option<Language>,
}

impl From<FilterArgs> for Filters {
    fn from(args: FilterArgs) -> Self {
        Filters { grade: args.grade, subject: args.subject, language: args.language }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_tracing(&settings.log)?;

    let engine = load_engine(settings)?;
    match cli.command {
        Command::Query { question, filters, image_text, top_k, json } => {
            let question = compose_question(&question, image_text.as_deref());
            let top_k = top_k.unwrap_or(engine.settings().retrieval.top_k).max(1);
            let response = engine.retrieve_top_k(&question, &filters.into(), &[], top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Command::Chat { filters } => chat_loop(&engine, filters.into())?,
        Command::Stats { json } => print_stats(&engine, json)?,
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    let mut settings = config.settings().context("reading settings")?;
    if let Some(dir) = &cli.chunks_dir {
        settings.data.chunks_dir = resolve_with_base(std::path::Path::new("."), dir.to_string_lossy());
    }
    Ok(settings)
}

/// `RUST_LOG` wins over `log.level`; logs go to stderr so `--json` output stays clean.
fn init_tracing(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.level))?;
    let layer = if log.json {
        tracing_subscriber::fmt::layer().json().with_writer(io::stderr).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr).boxed()
    };
    tracing_subscriber::registry().with(filter).with(layer).try_init()?;
    Ok(())
}

fn load_engine(settings: Settings) -> Result<QaEngine> {
    let dir = settings.data.chunks_dir.clone();
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Loading chunks from {}", dir.display()));

    let engine = QaEngine::from_settings(settings);
    match &engine {
        Ok(engine) => {
            let stats = engine.stats()?;
            spinner.finish_with_message(format!(
                "Indexed {} chunks ({} rejected) with {}",
                stats.corpus.chunks, stats.corpus.rejected, stats.index.kind
            ));
        }
        Err(_) => spinner.finish_and_clear(),
    }
    engine.with_context(|| format!("building index from {}", dir.display()))
}

fn print_response(response: &RetrievalResponse) {
    if response.is_no_answer() {
        println!("{NO_ANSWER}");
        return;
    }
    println!(
        "Confidence: {} ({:.2}){}",
        response.confidence.level,
        response.confidence.score,
        if response.fallback { ", best available match" } else { "" }
    );
    println!();
    for (i, citation) in response.citations.iter().enumerate() {
        println!("{}. {} [score {:.3}]", i + 1, citation, citation.score);
        println!("   {}", citation.excerpt);
    }
}

fn chat_loop(engine: &QaEngine, filters: Filters) -> Result<()> {
    println!("NCERT chat. Commands: /reset, /stats, /quit");
    let mut conversation = Conversation::new(MAX_HISTORY);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/q" | "/exit" => break,
            "/reset" => {
                conversation.clear();
                println!("Conversation cleared.");
            }
            "/stats" => print_stats(engine, false)?,
            question => {
                let response = engine.ask(&mut conversation, question, &filters)?;
                print_response(&response);
            }
        }
    }
    info!(turns = conversation.len(), "chat ended");
    Ok(())
}

fn print_stats(engine: &QaEngine, json: bool) -> Result<()> {
    let stats = engine.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Chunks: {} ({} rejected)", stats.corpus.chunks, stats.corpus.rejected);
    for (grade, count) in &stats.corpus.per_grade {
        println!("  class {grade}: {count}");
    }
    for (subject, count) in &stats.corpus.per_subject {
        println!("  {subject}: {count}");
    }
    for (language, count) in &stats.corpus.per_language {
        println!("  {language}: {count}");
    }
    println!(
        "Index: {} ({}), {} entries, {} dimensions, generation {}, built in {} ms",
        stats.index.kind, stats.index.tokenizer, stats.index.entries, stats.index.dimensions, stats.generation, stats.build_ms
    );
    Ok(())
}
