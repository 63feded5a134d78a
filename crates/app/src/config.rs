use clap::Args;
use ragchat_core::completion::{DEFAULT_INFERENCE_URL, DEFAULT_MODEL, DEFAULT_ROUTER_URL};
use ragchat_core::stores::pinecone::DEFAULT_CONTROL_URL;
use ragchat_core::{
    ChatOrchestrator, CompletionModel, Database, EmbeddingService, HuggingFaceCompletionModel,
    HuggingFaceEmbedder, IngestionOptions, LocalFileStore, PineconeStore, ResponseGenerator,
    VectorStore, DEFAULT_EMBEDDING_MODEL, DEFAULT_TOP_K,
};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Settings shared by every subcommand. Each one can also come from the
/// environment.
#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "ragchat.db", global = true)]
    pub database_path: PathBuf,

    /// Directory that receives uploaded files
    #[arg(long, env = "MEDIA_ROOT", default_value = "media", global = true)]
    pub media_root: PathBuf,

    /// Hugging Face access token; without it answers use canned replies
    #[arg(long, env = "HF_TOKEN", hide_env_values = true, global = true)]
    pub hf_token: Option<String>,

    /// Chat completion model
    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Feature-extraction model used for embeddings
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub embedding_model: String,

    /// Timeout in seconds for every outbound request
    #[arg(long, env = "HF_TIMEOUT", default_value_t = 90, global = true)]
    pub hf_timeout: u64,

    /// OpenAI-compatible router base URL
    #[arg(long, env = "HF_ROUTER_URL", default_value = DEFAULT_ROUTER_URL, global = true)]
    pub hf_router_url: String,

    /// Inference API base URL for embeddings and text generation
    #[arg(long, env = "HF_INFERENCE_URL", default_value = DEFAULT_INFERENCE_URL, global = true)]
    pub hf_inference_url: String,

    /// Pinecone API key; without it retrieval reads from the database only
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pub pinecone_api_key: Option<String>,

    #[arg(long, env = "PINECONE_INDEX_NAME", default_value = "rag-chat-index", global = true)]
    pub pinecone_index_name: String,

    /// Data-plane host; skips the control-plane lookup when set
    #[arg(long, env = "PINECONE_INDEX_HOST", global = true)]
    pub pinecone_index_host: Option<String>,

    #[arg(long, env = "PINECONE_CONTROL_URL", default_value = DEFAULT_CONTROL_URL, global = true)]
    pub pinecone_control_url: String,

    /// Number of passages retrieved per message
    #[arg(long, default_value_t = DEFAULT_TOP_K, global = true)]
    pub top_k: usize,
}

pub async fn build_orchestrator(args: &ServiceArgs) -> anyhow::Result<ChatOrchestrator> {
    let client = Client::builder()
        .timeout(Duration::from_secs(args.hf_timeout))
        .build()?;

    let database = Arc::new(Database::open(&args.database_path)?);
    info!(path = %args.database_path.display(), "opened database");

    let embedder = HuggingFaceEmbedder::new(
        &args.hf_inference_url,
        &args.embedding_model,
        args.hf_token.clone(),
        client.clone(),
    );
    let vectors = connect_vector_store(args, client.clone()).await;
    let generator = ResponseGenerator::new(completion_model(args, client))?;

    Ok(ChatOrchestrator::new(
        database,
        LocalFileStore::new(&args.media_root),
        EmbeddingService::new(Arc::new(embedder)),
        vectors,
        generator,
        IngestionOptions::default(),
    )
    .with_top_k(args.top_k))
}

fn completion_model(args: &ServiceArgs, client: Client) -> Option<Arc<dyn CompletionModel>> {
    let Some(token) = args.hf_token.as_deref().filter(|token| !token.trim().is_empty()) else {
        warn!("HF_TOKEN not set, answers will use fallback responses");
        return None;
    };

    info!(model = %args.model, "completion model configured");
    Some(Arc::new(HuggingFaceCompletionModel::new(
        &args.model,
        token,
        &args.hf_router_url,
        &args.hf_inference_url,
        client,
    )))
}

async fn connect_vector_store(args: &ServiceArgs, client: Client) -> VectorStore {
    let Some(api_key) = args
        .pinecone_api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
    else {
        warn!("PINECONE_API_KEY not set, vector store disabled");
        return VectorStore::unavailable();
    };

    if let Some(host) = &args.pinecone_index_host {
        info!(host, "using configured pinecone host");
        return VectorStore::new(Arc::new(PineconeStore::with_host(host, api_key, client)));
    }

    match PineconeStore::connect(
        &args.pinecone_control_url,
        api_key,
        &args.pinecone_index_name,
        client,
    )
    .await
    {
        Ok(store) => {
            info!(index = %args.pinecone_index_name, "connected to pinecone");
            VectorStore::new(Arc::new(store))
        }
        Err(error) => {
            warn!(%error, "pinecone unavailable, vector store disabled");
            VectorStore::unavailable()
        }
    }
}
