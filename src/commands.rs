use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::RagError;
use crate::config::Config;
use crate::ollama::{CompletionClient, EmbeddingClient, ModelStatus};
use crate::pipeline::{ChatResult, RagPipeline};
use crate::session::Role;

type OllamaPipeline = RagPipeline<EmbeddingClient, CompletionClient>;

async fn load_pipeline() -> Result<OllamaPipeline> {
    let config = Config::load_default()?;
    debug!("Using data directory {}", config.get_base_dir().display());
    RagPipeline::from_config(&config)
        .await
        .context("Failed to initialize the RAG pipeline")
}

fn spinner(message: String) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Operator hint for errors caused by a missing service or model
#[inline]
pub fn remediation_hint(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RagError>())
        .and_then(RagError::remediation)
        .map(|command| format!("Try running '{}'", command))
}

/// Ingest a PDF file into the vector index
#[inline]
pub async fn ingest_document(path: &Path) -> Result<()> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        bail!("Only PDF files are allowed: {}", path.display());
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Invalid file path: {}", path.display()))?;

    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let pipeline = load_pipeline().await?;

    let bar = spinner(format!("Processing {}", filename));
    let result = pipeline.ingest(content, &filename).await;
    bar.finish_and_clear();
    let result = result?;

    info!("Ingested {} ({} chunks)", result.filename, result.chunks_created);
    println!("{} {}", style("✓").green(), result.message);
    println!("  File: {}", style(&result.filename).cyan());
    println!("  Chunks created: {}", style(result.chunks_created).cyan());

    Ok(())
}

fn print_answer(result: &ChatResult) {
    println!("{}", result.response.trim());

    if !result.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for source in &result.sources {
            println!("  - {}", source);
        }
    }
}

/// Answer a single question
#[inline]
pub async fn ask_question(message: &str, session_id: Option<&str>) -> Result<()> {
    let pipeline = load_pipeline().await?;

    let bar = spinner("Thinking".to_string());
    let result = pipeline.ask(message, session_id).await;
    bar.finish_and_clear();
    let result = result?;

    print_answer(&result);
    eprintln!();
    eprintln!("{}", style(format!("Session: {}", result.session_id)).dim());

    Ok(())
}

/// Interactive chat loop. History lives only as long as the loop.
#[inline]
pub async fn run_chat(session_id: Option<String>) -> Result<()> {
    let pipeline = load_pipeline().await?;
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    eprintln!("{}", style("💬 PDF RAG Chat").bold().cyan());
    eprintln!("{}", style("Commands: /history, /clear, /quit").dim());
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();

        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/clear" => {
                pipeline.clear_history(&session_id);
                eprintln!("{}", style("History cleared").yellow());
            }
            "/history" => {
                for turn in pipeline.get_history(&session_id) {
                    let speaker = match turn.role {
                        Role::User => style("You").bold(),
                        Role::Assistant => style("Assistant").bold().green(),
                    };
                    println!("{}: {}", speaker, turn.content);
                }
            }
            question => {
                let bar = spinner("Thinking".to_string());
                let result = pipeline.ask(question, Some(&session_id)).await;
                bar.finish_and_clear();

                match result {
                    Ok(result) => print_answer(&result),
                    Err(err) => {
                        let err = anyhow::Error::from(err);
                        eprintln!("{} {}", style("Error:").red(), err);
                        if let Some(hint) = remediation_hint(&err) {
                            eprintln!("  {}", style(hint).yellow());
                        }
                    }
                }
                println!();
            }
        }
    }

    Ok(())
}

/// List ingested documents
#[inline]
pub async fn list_documents() -> Result<()> {
    let pipeline = load_pipeline().await?;
    let filenames = pipeline.list_document_filenames().await?;

    if filenames.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'pdf-rag ingest <file.pdf>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", filenames.len());
    for filename in &filenames {
        println!("  📄 {}", filename);
    }

    Ok(())
}

/// Remove every chunk of a document from the index
#[inline]
pub async fn delete_document(filename: &str) -> Result<()> {
    let pipeline = load_pipeline().await?;
    let removed = pipeline.delete_document(filename).await?;

    if removed == 0 {
        bail!("Document not found: {}", filename);
    }

    println!(
        "{} Deleted {} ({} chunks)",
        style("✓").green(),
        filename,
        removed
    );
    Ok(())
}

fn print_model(label: &str, status: &ModelStatus) {
    if status.available {
        println!("   ✅ {}: {} available", label, status.model);
    } else {
        println!("   ❌ {}: {} not available", label, status.model);
        if status.service.is_reachable() {
            println!("      Run 'ollama pull {}'", status.model);
        }
    }
}

/// Report Ollama, model and vector database health
#[inline]
pub async fn show_health() -> Result<()> {
    let config = Config::load_default()?;
    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("Failed to initialize the RAG pipeline")?;

    let report = pipeline.health().await;

    println!("📊 PDF RAG Health Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    if report.service.is_reachable() {
        println!(
            "   ✅ Ollama: Connected ({}:{})",
            config.ollama.host, config.ollama.port
        );
    } else {
        println!("   ❌ Ollama: {}", report.service);
        println!("      Start it with 'ollama serve'");
    }
    print_model("Embedding model", &report.embedding_model);
    print_model("Completion model", &report.completion_model);

    println!("🔍 Vector Database Status:");
    if report.vector_db {
        println!("   ✅ LanceDB: Connected ({})", config.storage.collection);
    } else {
        println!("   ❌ LanceDB: Unavailable");
    }

    println!();
    if report.is_healthy() {
        println!("{}", style("All systems ready").green());
    } else {
        println!("{}", style("Some components need attention").yellow());
    }

    Ok(())
}
