use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ircore::corpus::{load_jsonl, load_tsv};
use ircore::persist::IndexPaths;
use ircore::system::parse_id_ranges;
use ircore::{Document, IrConfig, IrSystem};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, update and query a boolean/phrase search index", long_about = None)]
struct Cli {
    /// Optional JSON config file (see IrConfig)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Metadata TSV (id, _, title)
    #[arg(long, requires = "descriptions", conflicts_with = "jsonl")]
    metadata: Option<PathBuf>,
    /// Descriptions TSV (id, text)
    #[arg(long, requires = "metadata")]
    descriptions: Option<PathBuf>,
    /// JSONL file or directory of .jsonl files
    #[arg(long)]
    jsonl: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh index from a corpus
    Build {
        #[command(flatten)]
        input: Input,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
    },
    /// Append documents to an existing index
    Add {
        #[arg(long)]
        index: PathBuf,
        #[command(flatten)]
        input: Input,
    },
    /// Soft-delete documents, e.g. --ids 1,3-5
    Delete {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        ids: String,
    },
    /// Run a boolean query or a "quoted phrase"
    Search {
        #[arg(long)]
        index: PathBuf,
        /// Print only the number of hits
        #[arg(long, default_value_t = false)]
        count: bool,
        query: String,
    },
    /// Print index statistics as JSON
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => IrConfig::from_file(path).with_context(|| format!("reading config {path:?}"))?,
        None => IrConfig::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Build { input, output } => {
            let docs = read_input(&input)?;
            let mut system = IrSystem::from_corpus(docs, config);
            system.save(&IndexPaths::new(&output))?;
            tracing::info!(output = ?output, documents = system.corpus().len(), "index build complete");
        }
        Commands::Add { index, input } => {
            let paths = IndexPaths::new(&index);
            let mut system = open(&paths, config)?;
            let ids = system.add_documents(read_input(&input)?);
            system.save(&paths)?;
            println!("Added documents {}..{}", ids.start, ids.end);
        }
        Commands::Delete { index, ids } => {
            let paths = IndexPaths::new(&index);
            let mut system = open(&paths, config)?;
            let ranges = parse_id_ranges(&ids)?;
            let marked = system.delete_ranges(&ranges);
            system.save(&paths)?;
            println!("Deleted {marked} documents, {} remaining", system.live_len());
        }
        Commands::Search { index, count, query } => {
            let system = open(&IndexPaths::new(&index), config)?;
            if count {
                println!("{}", system.count(&query)?);
            } else {
                for (doc_id, doc) in system.search(&query)? {
                    println!("{}: {doc_id}", doc.title);
                }
            }
        }
        Commands::Stats { index } => {
            let system = open(&IndexPaths::new(&index), config)?;
            let stats = system.stats();
            let json = serde_json::json!({
                "documents": stats.documents,
                "live_documents": stats.live_documents,
                "pending_deletions": stats.pending_deletions,
                "terms": stats.primary_terms,
                "biwords": stats.primary_biwords,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn open(paths: &IndexPaths, config: IrConfig) -> Result<IrSystem> {
    if !paths.exists() {
        bail!("no index found at {:?}; run `indexer build` first", paths.root);
    }
    IrSystem::load(paths, config).with_context(|| format!("loading index from {:?}", paths.root))
}

fn read_input(input: &Input) -> Result<Vec<Document>> {
    match (&input.metadata, &input.descriptions, &input.jsonl) {
        (Some(meta), Some(desc), None) => Ok(load_tsv(meta, desc)?),
        (None, None, Some(path)) => {
            let mut docs = Vec::new();
            for file in jsonl_files(path) {
                docs.extend(load_jsonl(&file)?);
            }
            Ok(docs)
        }
        _ => bail!("pass either --metadata and --descriptions, or --jsonl"),
    }
}

/// A single file, or every .jsonl file under a directory in path order.
fn jsonl_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
        .collect();
    files.sort();
    files
}
