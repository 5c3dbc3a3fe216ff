use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::AssistError;
use crate::agent::{SolutionOrigin, SupportAgent};
use crate::config::{Config, EmbeddingProvider, LlmProvider};
use crate::documents::{LoadReport, find_files, load_documents};
use crate::embeddings::{Embedder, embedder_from_config, split_documents};
use crate::index::{IndexHandle, VectorIndex};
use crate::providers::{OllamaClient, chat_model_from_config};
use crate::rag::{AnswerGenerator, ConversationalPipeline, Retriever};
use crate::search::TavilyClient;
use crate::session::SessionStore;

pub const DEFAULT_SESSION_ID: &str = "default_session";

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Load, chunk and embed every supported document under `docs_path`
#[inline]
pub fn index_documents(
    docs_path: &Path,
    config: &Config,
    embedder: &dyn Embedder,
) -> crate::Result<(VectorIndex, LoadReport)> {
    let files = find_files(docs_path)?;
    if files.is_empty() {
        return Err(AssistError::Document(format!(
            "No supported documents found in {}",
            docs_path.display()
        )));
    }
    info!("Found {} document file(s)", files.len());

    let report = load_documents(&files);

    let chunks = split_documents(&report.documents, &config.chunking)?;
    if chunks.is_empty() {
        return Err(AssistError::Document(format!(
            "Documents in {} contain no text",
            docs_path.display()
        )));
    }
    info!(
        "Split {} document(s) into {} chunk(s)",
        report.documents.len(),
        chunks.len()
    );

    let index = VectorIndex::build(chunks, embedder, config.retrieval.metric)?
        .with_chunking(config.chunking.clone());

    Ok((index, report))
}

/// Build the pipeline that answers from `index`
#[inline]
pub fn build_pipeline(config: &Config, index: VectorIndex) -> crate::Result<ConversationalPipeline> {
    let embedder = embedder_from_config(config)?;
    let model = chat_model_from_config(config)?;
    let retriever = Retriever::new(embedder, Arc::new(IndexHandle::new(index)));
    let sessions = Arc::new(SessionStore::with_limits(config.sessions.limits()));

    Ok(
        ConversationalPipeline::new(retriever, AnswerGenerator::new(model), sessions)
            .with_top_k(config.retrieval.top_k),
    )
}

/// Build (or rebuild) the persisted index
#[inline]
pub async fn build_index(config: &Config, docs: Option<PathBuf>, force: bool) -> Result<()> {
    let index_path = config.index_path();
    let docs_path = docs.unwrap_or_else(|| config.docs_path().to_path_buf());

    if !force {
        match VectorIndex::load(&index_path).await {
            Ok(existing) => {
                println!(
                    "Index already exists at {} ({} chunks). Use --force to rebuild.",
                    index_path.display(),
                    existing.len()
                );
                return Ok(());
            }
            Err(AssistError::NotFound { .. }) => {}
            Err(e) => {
                warn!("Existing index is unreadable, rebuilding: {}", e);
            }
        }
    }

    println!("Indexing documents from {}", docs_path.display());
    let bar = spinner("Embedding documents");

    let embedder = embedder_from_config(config)?;
    let task_config = config.clone();
    let task_docs = docs_path.clone();
    let result = tokio::task::spawn_blocking(move || {
        index_documents(&task_docs, &task_config, embedder.as_ref())
    })
    .await
    .context("Indexing task panicked")?;
    bar.finish_and_clear();

    let (index, report) = result?;

    index
        .save(&index_path)
        .await
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    println!(
        "{} Indexed {} chunk(s) into {}",
        style("✓").green(),
        index.len(),
        index_path.display()
    );
    if !report.skipped.is_empty() {
        println!(
            "{} Skipped {} file(s); run with RUST_LOG=warn for details",
            style("!").yellow(),
            report.skipped.len()
        );
    }
    Ok(())
}

/// Answer one question from the persisted index
#[inline]
pub async fn ask_question(
    config: &Config,
    question: String,
    session_id: Option<String>,
    markdown: bool,
    web: bool,
) -> Result<()> {
    let index_path = config.index_path();
    let index = match VectorIndex::load(&index_path).await {
        Ok(index) => index,
        Err(e @ AssistError::NotFound { .. }) => {
            return Err(anyhow::Error::new(e)
                .context("No index available; run `support-assist index` first"));
        }
        Err(e) => return Err(e.into()),
    };

    let session_id = session_id.unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    let config = config.clone();
    let bar = spinner("Thinking");

    let result = tokio::task::spawn_blocking(move || {
        let pipeline = Arc::new(build_pipeline(&config, index)?);
        let model = Arc::clone(pipeline.generator().model());
        let mut agent = SupportAgent::new(pipeline, model).with_markdown(markdown);

        if web {
            match TavilyClient::from_config(&config) {
                Some(client) => {
                    agent = agent.with_web_search(Arc::new(client), config.search.max_results);
                }
                None => warn!("--web requested but web search is not configured"),
            }
        }

        agent.solve(&session_id, &question)
    })
    .await
    .context("Answer task panicked")?;
    bar.finish_and_clear();

    let solution = result?;
    println!("{}", solution.text);
    if !solution.sources.is_empty() {
        let heading = match solution.origin {
            SolutionOrigin::KnowledgeBase => "Sources:",
            SolutionOrigin::Web => "Web sources:",
        };
        println!();
        println!("{}{}", style(heading).bold(), solution.sources);
    }
    Ok(())
}

/// Report configuration, provider reachability and index state
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Support Assist Status").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Paths:");
    println!("   Config: {}", config.config_file_path().display());
    println!("   Documents: {}", config.docs_path().display());
    println!("   Index: {}", config.index_path().display());
    println!();

    println!("🔍 Index:");
    match VectorIndex::load(&config.index_path()).await {
        Ok(index) => {
            println!("   ✅ {} chunk(s), dimension {}", index.len(), index.dimension());
            println!("   📏 Metric: {}", index.metric());
            if let Some(chunking) = index.chunking() {
                println!(
                    "   ✂️  Chunk size {} with overlap {}",
                    chunking.chunk_size, chunking.chunk_overlap
                );
            }
            println!("   🕒 Built: {}", index.built_at().to_rfc3339());
        }
        Err(AssistError::NotFound { .. }) => {
            println!("   ❌ Not built; run `support-assist index`");
        }
        Err(e) => {
            println!("   ⚠️  Unreadable: {}", e);
        }
    }
    println!();

    let needs_ollama = config.embedding.provider == EmbeddingProvider::Ollama
        || config.llm.provider == LlmProvider::Ollama;
    if needs_ollama {
        println!("🤖 Ollama:");
        let ollama_config = config.clone();
        let health = tokio::task::spawn_blocking(move || {
            OllamaClient::new(&ollama_config)
                .map_err(anyhow::Error::new)
                .and_then(|client| client.health_check())
        })
        .await
        .context("Health check task panicked")?;
        match health {
            Ok(()) => println!(
                "   ✅ Connected ({}:{}), embedding model {}",
                config.ollama.host, config.ollama.port, config.ollama.embedding_model
            ),
            Err(e) => println!("   ❌ Unavailable: {:#}", e),
        }
        println!();
    }

    println!("💬 Answer model:");
    match config.llm.provider {
        LlmProvider::Ollama => println!("   Ollama {}", config.ollama.chat_model),
        LlmProvider::OpenAi => {
            let key_state = if std::env::var(&config.llm.api_key_env).is_ok() {
                "set"
            } else {
                "missing"
            };
            println!("   {} at {}", config.llm.model, config.llm.base_url);
            println!("   🔑 {}: {}", config.llm.api_key_env, key_state);
        }
    }
    println!();

    println!("🌐 Web search:");
    if !config.search.enabled {
        println!("   Disabled");
    } else if TavilyClient::from_config(config).is_some() {
        println!("   ✅ Tavily, {} result(s) per query", config.search.max_results);
    } else {
        println!("   ⚠️  {} is not set", config.search.api_key_env);
    }

    Ok(())
}
