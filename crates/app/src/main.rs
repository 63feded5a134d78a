mod app;
mod config;
mod error;
mod routes;

use chrono::Utc;
use clap::{Parser, Subcommand};
use ragchat_core::{discover_pdf_files, Chat, ChatOrchestrator};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::AppState;
use config::{build_orchestrator, ServiceArgs};

#[derive(Parser)]
#[command(name = "ragchat", version, about = "Chat with your PDF documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Upload one PDF, or every PDF under a folder, into a chat.
    Ingest {
        /// Chat that receives the documents; created when missing.
        #[arg(long)]
        chat: String,
        /// PDF file or folder searched recursively.
        #[arg(long)]
        path: PathBuf,
    },
    /// Send a message to a chat and print the reply with its sources.
    Ask {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        message: String,
        /// Answer without document retrieval.
        #[arg(long, default_value_t = false)]
        no_rag: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "ragchat boot"
    );

    let orchestrator = build_orchestrator(&cli.service).await?;

    match cli.command {
        Command::Serve { bind } => serve(orchestrator, app_version, bind).await?,
        Command::Ingest { chat, path } => ingest(&orchestrator, &chat, &path).await?,
        Command::Ask {
            chat,
            message,
            no_rag,
        } => {
            let reply = orchestrator.send_message(&chat, &message, !no_rag).await?;
            println!("{}", reply.response);
            for (position, source) in reply.sources.iter().enumerate() {
                println!(
                    "[source {}] page={} score={:.4}",
                    position + 1,
                    source.page,
                    source.score
                );
                println!("  {}", source.text.replace('\n', " "));
            }
        }
    }

    Ok(())
}

async fn serve(orchestrator: ChatOrchestrator, version: &str, bind: SocketAddr) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        orchestrator,
        version: version.to_string(),
    });
    let app = routes::build_router(state).layer(TraceLayer::new_for_http());

    info!("Listening on {bind}");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
}

async fn ingest(orchestrator: &ChatOrchestrator, chat_id: &str, path: &Path) -> anyhow::Result<()> {
    ensure_chat(orchestrator, chat_id)?;

    let files = discover_pdf_files(path);
    if files.is_empty() {
        println!("no pdf files found under {}", path.display());
        return Ok(());
    }

    let mut ingested = 0usize;
    for file in &files {
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = tokio::fs::read(file).await?;

        match orchestrator.upload_document(chat_id, &filename, &data).await {
            Ok(outcome) => {
                ingested += 1;
                println!(
                    "{} -> {} ({} pages, {} chunks, vectors stored: {})",
                    file.display(),
                    outcome.document.id,
                    outcome.report.page_count,
                    outcome.report.chunk_count,
                    outcome.report.vectors_stored
                );
            }
            Err(error) => warn!(path = %file.display(), %error, "skipped pdf"),
        }
    }

    println!(
        "{ingested} of {} documents ingested at {}",
        files.len(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}

fn ensure_chat(orchestrator: &ChatOrchestrator, chat_id: &str) -> anyhow::Result<()> {
    let database = orchestrator.database();
    if database.get_chat(chat_id)?.is_none() {
        database.insert_chat(&Chat {
            id: chat_id.to_string(),
            title: chat_id.to_string(),
            created_at: Utc::now(),
        })?;
        info!(chat_id, "created chat");
    }
    Ok(())
}
