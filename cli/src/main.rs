mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use advisor_core::{
    AppAction, AppState, AppUpdate, ChatBackend, FfiApp, HistoryQuery, HttpChatBackend,
    MessageDeliveryState, MessageRole, ThreadErrorKind,
};
use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use render::TranscriptPrinter;

#[derive(Debug, Parser)]
#[command(name = "advisor-chat")]
#[command(about = "Terminal client for the advisor chat thread")]
struct Cli {
    /// Data directory (advisor_config.json, advisor.log)
    #[arg(long, default_value = ".advisor-chat")]
    data_dir: PathBuf,

    /// Base URL of the chat API, e.g. https://api.example.com/v1
    #[arg(long, env = "ADVISOR_API_BASE_URL")]
    api_base_url: String,

    /// Bearer token for the chat API
    #[arg(long, env = "ADVISOR_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one page of history (newest first, as the server returns it)
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Send a message through the sync core and print the reconciled thread
    Send {
        #[arg(long)]
        content: String,

        /// How long to wait for the server copy (and reply) to show up in history
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },

    /// Delete the whole conversation server-side. Calls the API directly, without the
    /// sync core; use `/clear` inside `chat` for the core's clear flow.
    Clear,

    /// Interactive session. Type to send; /older, /refresh, /clear, /quit.
    Chat,
}

impl Command {
    /// Log-safe name (never includes message content).
    fn tag(&self) -> &'static str {
        match self {
            Command::History { .. } => "history",
            Command::Send { .. } => "send",
            Command::Clear => "clear",
            Command::Chat => "chat",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("create data dir {}", cli.data_dir.display()))?;

    let backend = HttpChatBackend::new(
        &cli.api_base_url,
        cli.token.clone(),
        Duration::from_secs(cli.timeout),
    )
    .map_err(|e| anyhow!("build http client: {e}"))?;

    tracing::debug!(
        command = cli.cmd.tag(),
        base_url = backend.base_url(),
        "dispatching command"
    );
    match &cli.cmd {
        Command::History { limit, offset } => cmd_history(&backend, *limit, *offset).await,
        Command::Send { content, wait_secs } => {
            cmd_send(&cli, backend, content, *wait_secs).await
        }
        Command::Clear => cmd_clear(&backend).await,
        Command::Chat => cmd_chat(&cli, backend).await,
    }
}

fn print(v: serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(&v).expect("json encode"));
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn cmd_history(backend: &HttpChatBackend, limit: u32, offset: u32) -> anyhow::Result<()> {
    let msgs = backend
        .fetch_history(HistoryQuery { limit, offset })
        .await
        .context("fetch history")?;
    let out: Vec<serde_json::Value> = msgs
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "role": m.role.as_str(),
                "content": m.content,
                "created_at_ms": m.created_at_ms,
            })
        })
        .collect();
    print(json!({
        "messages": out,
        "has_more": msgs.len() as u32 >= limit,
    }));
    Ok(())
}

fn message_content(raw: &str) -> anyhow::Result<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(anyhow!("message is empty"));
    }
    Ok(content)
}

fn start_core(cli: &Cli, backend: HttpChatBackend) -> Arc<FfiApp> {
    let data_dir = cli.data_dir.to_string_lossy().to_string();
    FfiApp::with_backend(data_dir, Arc::new(backend))
}

/// Confirmed (server-side) user messages with exactly this content.
fn confirmed_copies(state: &AppState, content: &str) -> usize {
    state
        .thread
        .messages
        .iter()
        .filter(|m| {
            m.role == MessageRole::User
                && m.delivery == MessageDeliveryState::Sent
                && m.content == content
        })
        .count()
}

async fn cmd_send(
    cli: &Cli,
    backend: HttpChatBackend,
    content: &str,
    wait_secs: u64,
) -> anyhow::Result<()> {
    let content = message_content(content)?;
    let app = start_core(cli, backend);
    let updates = app.updates();
    app.dispatch(AppAction::OpenThread);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    // Copies already in history before our send, set once the first page is in.
    let mut baseline: Option<usize> = None;
    let mut last = app.state();
    while let Ok(Ok(update)) = tokio::time::timeout_at(deadline, updates.recv_async()).await {
        let AppUpdate::FullState(state) = update;
        if baseline.is_none() && state.rev > 0 && !state.busy.loading_initial {
            baseline = Some(confirmed_copies(&state, content));
            app.dispatch(AppAction::SendMessage {
                content: content.to_string(),
            });
        }
        last = state;
        let Some(before) = baseline else { continue };
        if last.thread.is_sending {
            continue;
        }
        if let Some(err) = last.last_error.as_ref().filter(|e| e.kind == ThreadErrorKind::Send) {
            return Err(anyhow!("send failed: {}", err.message));
        }
        if confirmed_copies(&last, content) > before && !last.busy.loading_initial {
            break;
        }
    }

    let confirmed = baseline.is_some_and(|before| confirmed_copies(&last, content) > before);
    if !confirmed {
        tracing::warn!(
            wait_secs,
            sent = baseline.is_some(),
            "message not confirmed by history before the deadline"
        );
    }
    let out: Vec<serde_json::Value> = last
        .thread
        .messages
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "role": m.role.as_str(),
                "content": m.content,
                "pending": m.delivery == MessageDeliveryState::Pending,
            })
        })
        .collect();
    print(json!({
        "confirmed": confirmed,
        "messages": out,
    }));
    Ok(())
}

async fn cmd_clear(backend: &HttpChatBackend) -> anyhow::Result<()> {
    backend.clear_history().await.context("clear history")?;
    print(json!({ "cleared": true }));
    Ok(())
}

enum Input {
    Empty,
    Older,
    Refresh,
    Clear,
    Quit,
    Message(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Empty,
        "/older" => Input::Older,
        "/refresh" => Input::Refresh,
        "/clear" => Input::Clear,
        "/quit" | "/exit" => Input::Quit,
        text => Input::Message(text.to_string()),
    }
}

/// Runs the full core (optimistic send, paging, reconciliation) and prints the transcript
/// as snapshots arrive.
async fn cmd_chat(cli: &Cli, backend: HttpChatBackend) -> anyhow::Result<()> {
    let app = start_core(cli, backend);
    let updates = app.updates();
    let printer = tokio::spawn(async move {
        let mut transcript = TranscriptPrinter::default();
        while let Ok(AppUpdate::FullState(state)) = updates.recv_async().await {
            for line in transcript.render(&state) {
                println!("{line}");
            }
        }
    });

    app.dispatch(AppAction::OpenThread);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Older => app.dispatch(AppAction::ScrolledToTop),
            Input::Refresh => app.dispatch(AppAction::RefreshHistory),
            Input::Clear => app.dispatch(AppAction::ClearConversation),
            Input::Quit => break,
            Input::Message(content) => {
                app.dispatch(AppAction::ClearToast);
                app.dispatch(AppAction::SendMessage { content });
            }
        }
    }

    printer.abort();
    Ok(())
}
