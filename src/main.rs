use clap::{Parser, Subcommand};
use pdf_rag::Result;
use pdf_rag::commands::{
    ask_question, delete_document, ingest_document, list_documents, remediation_hint, run_chat,
    show_health,
};
use pdf_rag::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about your PDFs using a local Ollama server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and embed a PDF into the vector index
    Ingest {
        /// Path to the PDF file
        path: PathBuf,
    },
    /// Ask a single question about the ingested documents
    Ask {
        /// The question
        message: String,
        /// Conversation session id; a new one is generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// Start an interactive chat about the ingested documents
    Chat {
        /// Conversation session id; a new one is generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// List ingested documents
    Documents,
    /// Remove a document from the index
    Delete {
        /// Filename the document was ingested as
        filename: String,
    },
    /// Check Ollama, model and vector database health
    Health,
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { path } => {
            ingest_document(&path).await?;
        }
        Commands::Ask { message, session } => {
            ask_question(&message, session.as_deref()).await?;
        }
        Commands::Chat { session } => {
            run_chat(session).await?;
        }
        Commands::Documents => {
            list_documents().await?;
        }
        Commands::Delete { filename } => {
            delete_document(&filename).await?;
        }
        Commands::Health => {
            show_health().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli.command).await {
        if let Some(hint) = remediation_hint(&err) {
            eprintln!("{}", hint);
        }
        return Err(err.into());
    }

    Ok(())
}
