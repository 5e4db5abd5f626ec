use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use waveprint::config;
use waveprint::{Crawler, FingerprintParams, IndexStore, Recognizer};

#[derive(Parser)]
#[command(name = "waveprint", about = "Acoustic fingerprint index and search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint every supported audio file under a directory
    Ingest {
        /// Directory to crawl; defaults to TARGET_DIR
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Fingerprint only the first N seconds of each file
        #[arg(long)]
        limit: Option<u32>,
        /// Cap the worker pool below the CPU count
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Match a probe recording against the index and print the report JSON
    Recognize {
        file: PathBuf,
        /// Number of candidates to report; defaults to TOPN
        #[arg(long)]
        topn: Option<usize>,
    },
    /// Print catalogue and index counts
    Stats,
    /// Delete audios (and their fingerprints) by id
    Delete { ids: Vec<i32> },
    /// Drop and recreate the schema
    Empty,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let url = config::database_url()?;
    let store = IndexStore::connect(&url).context("connecting to the index store")?;
    let params = FingerprintParams::from_env()?;

    match cli.command {
        Command::Ingest {
            dir,
            limit,
            workers,
        } => {
            let dir = dir.unwrap_or_else(config::target_dir);
            let mut crawler = Crawler::new(store, params).with_limit(limit);
            if let Some(workers) = workers {
                crawler = crawler.with_max_workers(workers);
            }
            let extensions: Vec<&str> = config::SUPPORTED_EXTENSIONS.to_vec();
            let committed = crawler
                .fingerprint_directory(&dir, &extensions)
                .with_context(|| format!("ingesting {}", dir.display()))?;
            println!("ingested {committed} audio(s)");
        }
        Command::Recognize { file, topn } => {
            let topn = match topn {
                Some(n) => n,
                None => config::topn()?,
            };
            store.setup()?;
            let recognizer = Recognizer::new(store, params, topn);
            let report = recognizer
                .recognize_file(&file)
                .with_context(|| format!("recognizing {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Stats => {
            store.setup()?;
            println!("audios:       {}", store.get_num_audios()?);
            println!("fingerprints: {}", store.get_num_fingerprints()?);
        }
        Command::Delete { ids } => {
            store.delete_audios(&ids, waveprint::db::connector::DEFAULT_BATCH_SIZE)?;
            println!("deleted {} audio(s)", ids.len());
        }
        Command::Empty => {
            store.empty()?;
            println!("index emptied");
        }
    }

    Ok(())
}
