use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use lorekeeper::commands::{self, QueryArgs};
use lorekeeper::config::{Config, show_config};

#[derive(Parser)]
#[command(name = "lorekeeper")]
#[command(about = "Ingest documents into knowledge bases and answer questions with citations")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, the databases and stored files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration to config.toml
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Manage knowledge bases
    #[command(subcommand)]
    Kb(KbCommands),
    /// Ingest a file into a knowledge base
    Ingest {
        /// Knowledge base ID
        kb: String,
        /// File to ingest
        file: PathBuf,
        /// Declared MIME type, e.g. "application/json"
        #[arg(long)]
        content_type: Option<String>,
        /// JSON object of tags carried onto every chunk
        #[arg(long)]
        meta: Option<String>,
    },
    /// Inspect or delete ingested documents
    #[command(subcommand)]
    Documents(DocumentCommands),
    /// Retrieve the chunks most similar to a question
    Search {
        /// Knowledge base ID
        kb: String,
        question: String,
        #[command(flatten)]
        query: QueryFlags,
    },
    /// Answer a question from retrieved context
    Ask {
        /// Knowledge base ID
        kb: String,
        question: String,
        #[command(flatten)]
        query: QueryFlags,
        /// Text prepended to the system prompt
        #[arg(long)]
        preamble: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
    },
}

#[derive(Subcommand)]
enum KbCommands {
    /// Create a knowledge base
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List knowledge bases
    List,
    /// Delete a knowledge base with its documents and vectors
    Delete { id: String },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// List documents in a knowledge base
    List { kb: String },
    /// Show a document and its chunks
    Show { id: String },
    /// Delete a document with its chunks and vectors
    Delete { id: String },
}

#[derive(Args)]
struct QueryFlags {
    /// Number of chunks to retrieve (1-50)
    #[arg(long)]
    top_k: Option<usize>,
    /// JSON object of payload criteria; arrays match any listed value
    #[arg(long)]
    filter: Option<String>,
}

impl From<QueryFlags> for QueryArgs {
    fn from(flags: QueryFlags) -> Self {
        Self {
            top_k: flags.top_k,
            filter: flags.filter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => Config::default_base_dir()?,
    };
    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                commands::init_config(&config)?;
            }
        }
        Commands::Kb(KbCommands::Create { name, description }) => {
            commands::create_knowledge_base(&config, &name, description).await?;
        }
        Commands::Kb(KbCommands::List) => {
            commands::list_knowledge_bases(&config).await?;
        }
        Commands::Kb(KbCommands::Delete { id }) => {
            commands::delete_knowledge_base(&config, &id).await?;
        }
        Commands::Ingest {
            kb,
            file,
            content_type,
            meta,
        } => {
            commands::ingest_file(&config, &kb, &file, content_type, meta.as_deref()).await?;
        }
        Commands::Documents(DocumentCommands::List { kb }) => {
            commands::list_documents(&config, &kb).await?;
        }
        Commands::Documents(DocumentCommands::Show { id }) => {
            commands::show_document(&config, &id).await?;
        }
        Commands::Documents(DocumentCommands::Delete { id }) => {
            commands::delete_document(&config, &id).await?;
        }
        Commands::Search {
            kb,
            question,
            query,
        } => {
            commands::search(&config, &kb, &question, &query.into()).await?;
        }
        Commands::Ask {
            kb,
            question,
            query,
            preamble,
            temperature,
        } => {
            commands::ask(&config, &kb, &question, &query.into(), preamble, temperature).await?;
        }
    }

    Ok(())
}
