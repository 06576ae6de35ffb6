use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use doc_rag_core::{
    discover_documents, fingerprint_document, AnsweringPipeline, ChatBackend, ChatClient,
    ChatJudge, ChatResponder, ChunkingConfig, CohereReRanker, EvalConfig, EvaluationHarness,
    FailurePolicy, Indexer, IndexerConfig, OpenAiEmbedder, PdfChunkExtractor, QdrantStore,
    QuestionPair, ResponseGenerator, Retriever, RetrieverConfig, VectorStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "rag_chunks")]
    collection: String,

    /// OpenAI-compatible base URL for embeddings
    #[arg(long, default_value = "https://api.openai.com/v1")]
    embedding_url: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Embedding dimensionality; must stay constant per collection
    #[arg(long, default_value = "1536")]
    embedding_dimension: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    openai_api_key: String,

    /// Cohere-compatible base URL for re-ranking
    #[arg(long, default_value = "https://api.cohere.com")]
    rerank_url: String,

    /// Re-ranking model
    #[arg(long, default_value = "rerank-v3.5")]
    rerank_model: String,

    #[arg(long, env = "CO_API_KEY", hide_env_values = true, default_value = "")]
    cohere_api_key: String,

    /// Chat backend for answers and judging
    #[arg(long, value_enum, default_value = "openai")]
    chat_backend: ChatBackendArg,

    /// OpenAI-compatible base URL for chat completions
    #[arg(long, default_value = "https://api.openai.com/v1")]
    chat_url: String,

    /// Chat model
    #[arg(long, default_value = "gpt-4o-mini")]
    chat_model: String,

    #[arg(long, env = "CEREBRAS_API_KEY", hide_env_values = true, default_value = "")]
    cerebras_api_key: String,

    /// Per-call deadline for provider requests, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChatBackendArg {
    Openai,
    Cerebras,
}

impl Cli {
    /// Resolved once at startup; nothing reads provider settings after this.
    fn chat_backend(&self) -> (ChatBackend, &str) {
        match self.chat_backend {
            ChatBackendArg::Openai => (
                ChatBackend::OpenAiCompatible {
                    endpoint: self.chat_url.clone(),
                    model: self.chat_model.clone(),
                },
                self.openai_api_key.as_str(),
            ),
            ChatBackendArg::Cerebras => (
                ChatBackend::Cerebras {
                    model: self.chat_model.clone(),
                },
                self.cerebras_api_key.as_str(),
            ),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every PDF under a folder. Re-running is idempotent.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Concurrent embedding calls.
        #[arg(long, default_value = "8")]
        max_concurrency: usize,
    },
    /// Retrieve chunks and synthesize a cited answer.
    Query {
        #[arg(long)]
        query: String,
        /// Number of chunks to ground the answer on.
        #[arg(long, default_value = "3")]
        top_k: usize,
        /// Print the retrieved chunks instead of calling the chat model.
        #[arg(long, default_value_t = false)]
        retrieval_only: bool,
    },
    /// Drop and recreate the vector store.
    Reset,
    /// Judge the pipeline against a labeled question set.
    Evaluate {
        /// JSON file: array of {"question", "expected_answer"} objects.
        #[arg(long)]
        questions: PathBuf,
        #[arg(long, default_value = "10")]
        max_concurrency: usize,
        /// Abort the run on the first failing question.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let request_timeout = Duration::from_secs(cli.request_timeout_secs);

    let embedder = OpenAiEmbedder::new(
        &cli.embedding_url,
        &cli.openai_api_key,
        &cli.embedding_model,
        cli.embedding_dimension,
    );
    let reranker = CohereReRanker::new(&cli.rerank_url, &cli.cohere_api_key, &cli.rerank_model);
    let store = QdrantStore::new(&cli.qdrant_url, &cli.collection, cli.embedding_dimension);
    let (chat_backend, chat_api_key) = cli.chat_backend();
    let chat = ChatClient::new(chat_backend.endpoint(), chat_api_key, chat_backend.model());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "doc-rag boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            max_concurrency,
        } => {
            let documents = discover_documents(&folder);
            if documents.is_empty() {
                warn!(folder = %folder.display(), "no pdf files found");
                println!("0 entries indexed (no documents found)");
                return Ok(());
            }

            for document in &documents {
                let fingerprint = fingerprint_document(document)?;
                info!(
                    document_id = %fingerprint.document_id,
                    filename = %fingerprint.filename,
                    checksum = %fingerprint.checksum,
                    "discovered document"
                );
            }

            let indexer = Indexer::new(
                PdfChunkExtractor::new(ChunkingConfig::default()),
                embedder,
                store,
                IndexerConfig {
                    max_concurrency,
                    request_timeout,
                },
            )?;

            info!(folder = %folder.display(), document_count = documents.len(), "indexing");
            let written = indexer.index(&documents).await?;
            println!("{written} entries indexed at {}", Utc::now().to_rfc3339());
        }
        Command::Query {
            query,
            top_k,
            retrieval_only,
        } => {
            let retriever = Retriever::new(
                embedder,
                reranker,
                store,
                RetrieverConfig {
                    top_k,
                    request_timeout,
                    ..RetrieverConfig::default()
                },
            )?;

            if retrieval_only {
                let results = retriever.search(&query).await?;
                if results.is_empty() {
                    println!("no results (empty index?)");
                }
                for result in results {
                    println!(
                        "[{:.4}] {} (page {:?})",
                        result.relevance_score, result.source_key, result.page_no
                    );
                    println!("  {}", result.content);
                }
                return Ok(());
            }

            let responder = ChatResponder::new(chat.clone());
            let results = retriever.search(&query).await?;
            let answer = responder.generate(&query, &results).await?;
            println!("{answer}");
        }
        Command::Reset => {
            store.reset().await.map_err(anyhow::Error::from)?;
            println!("store reset: collection {}", cli.collection);
        }
        Command::Evaluate {
            questions,
            max_concurrency,
            fail_fast,
        } => {
            let raw = tokio::fs::read_to_string(&questions).await?;
            let pairs: Vec<QuestionPair> = serde_json::from_str(&raw)?;

            let retriever = Retriever::new(
                embedder,
                reranker,
                store,
                RetrieverConfig {
                    request_timeout,
                    ..RetrieverConfig::default()
                },
            )?;
            let pipeline = AnsweringPipeline::new(retriever, ChatResponder::new(chat.clone()));
            let judge = ChatJudge::new(chat);

            let harness = EvaluationHarness::new(
                pipeline,
                judge,
                EvalConfig {
                    max_concurrency,
                    policy: if fail_fast {
                        FailurePolicy::FailFast
                    } else {
                        FailurePolicy::BestEffort
                    },
                    request_timeout: Duration::from_secs(cli.request_timeout_secs.max(60) * 2),
                },
            )?;

            let report = harness.evaluate(&pairs).await?;

            for record in &report.records {
                let mark = if record.is_correct { "PASS" } else { "FAIL" };
                println!("[{mark}] #{} {}", record.index, record.question);
                if let Some(reasoning) = &record.reasoning {
                    println!("       {reasoning}");
                }
            }

            match report.score {
                Some(score) => println!(
                    "run {}: score {:.3} over {} questions",
                    report.run_id,
                    score,
                    report.records.len()
                ),
                None => println!("run {}: no data (empty question set)", report.run_id),
            }
        }
    }

    Ok(())
}
