//! chat-stream CLI - talk to the chat assistant from a terminal.
//!
//! This is the main binary entry point. See the `chat_stream` library for
//! the core functionality.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chat_stream::constants::TEMP_ATTACHMENT_PREFIX;
use chat_stream::server::types::{Attachment, AttachmentSource, ChatMessage, Role};
use chat_stream::{
    ApiClient, Callbacks, Config, Connector, Conversation, Fragment, StreamEvent, StreamRequest,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "chat-stream")]
#[command(about = "Streaming chat client for the assistant server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the reply to stdout
    Send {
        /// Message text
        message: String,
        /// Continue an existing conversation
        #[arg(long)]
        chat_id: Option<String>,
        /// Upload a file and attach it (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Interactive conversation that keeps its session id between messages
    Chat,
    /// Print a page of message history
    History {
        /// Only messages older than this message id
        #[arg(long)]
        before: Option<String>,
        /// Page size (defaults to the configured history page size)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show the effective configuration
    Config,
}

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    // Use CHAT_STREAM_LOG_FILE so logs don't interleave with streamed output
    if let Ok(path) = std::env::var("CHAT_STREAM_LOG_FILE") {
        match std::fs::File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Failed to create log file at {path}: {e}; logging to stderr"),
        }
    }

    builder.init();
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

fn role_label(message: &ChatMessage) -> &'static str {
    match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

fn print_messages(messages: &[ChatMessage]) {
    for message in messages {
        let id = message.id.as_deref().unwrap_or("-");
        println!("[{id}] {}: {}", role_label(message), message.content);
        for attachment in &message.attachments {
            println!(
                "    attachment {} ({})",
                attachment.file_name.as_deref().unwrap_or(&attachment.id),
                attachment.url
            );
        }
    }
}

async fn run_send(
    config: &Config,
    message: String,
    chat_id: Option<String>,
    attachments: Vec<PathBuf>,
) -> Result<()> {
    let mut attachment_ids = Vec::with_capacity(attachments.len());
    if !attachments.is_empty() {
        let api = ApiClient::from_config(config)?;
        for path in attachments {
            let source = AttachmentSource::Path {
                path: path.clone(),
                file_name: None,
            };
            let id = api
                .upload_attachment(config.token.as_deref(), &source)
                .await
                .with_context(|| format!("Failed to upload {}", path.display()))?;
            attachment_ids.push(Some(id));
        }
    }

    let request = StreamRequest::new(message, chat_id.unwrap_or_default())
        .with_token(config.token.clone())
        .with_attachment_ids(attachment_ids);

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let listener = Callbacks::new(|fragment| {
        match fragment {
            Fragment::Text(text) => {
                print!("{text}");
                flush_stdout();
            }
            Fragment::SessionNotice(id) => eprintln!("session: {id}"),
        }
        Ok(())
    })
    .with_close(|| println!())
    .with_error(move |e| {
        let _ = error_tx.send(e.clone());
    });

    let stream = Connector::from_config(config)
        .open(&request, listener)
        .await
        .context("Failed to connect to AI stream")?;
    stream.wait().await;

    if let Ok(e) = error_rx.try_recv() {
        return Err(e).context("Stream failed");
    }
    Ok(())
}

fn print_reply(conversation: &Conversation) {
    if let Some(reply) = conversation.transcript().last() {
        println!("{}", reply.content);
    }
}

async fn run_chat(config: &Config) -> Result<()> {
    let conversation = Conversation::from_config(config);
    let mut pending: Vec<Attachment> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type a message. Commands: /attach <path>, /more, /clear, /quit");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if let Some(path) = line.strip_prefix("/attach ") {
            let path = path.trim();
            pending.push(Attachment {
                id: format!("{TEMP_ATTACHMENT_PREFIX}{}", uuid::Uuid::new_v4().simple()),
                url: path.to_string(),
                mime_type: None,
                file_name: None,
            });
            println!("(attached {path})");
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                conversation.clear();
                println!("(conversation cleared)");
                continue;
            }
            "/more" => {
                match conversation.load_more().await {
                    Ok(_) => print_messages(conversation.transcript().messages()),
                    Err(e) => eprintln!("{e:#}"),
                }
                continue;
            }
            _ => {}
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        match conversation
            .send(line, std::mem::take(&mut pending), Some(tx))
            .await
        {
            Ok(Some(stream)) => {
                while let Some(event) = rx.recv().await {
                    match event {
                        StreamEvent::Fragment(Fragment::Text(text)) => {
                            print!("{text}");
                            flush_stdout();
                        }
                        StreamEvent::Fragment(Fragment::SessionNotice(_)) => {}
                        StreamEvent::Error(_) => {
                            println!();
                            print_reply(&conversation);
                        }
                        StreamEvent::Closed => break,
                    }
                }
                println!();
                stream.wait().await;
            }
            Ok(None) => {}
            Err(_) => print_reply(&conversation),
        }
    }

    Ok(())
}

async fn run_history(config: &Config, before: Option<String>, limit: Option<u32>) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let page = api
        .recent_messages(
            config.token.as_deref(),
            before.as_deref(),
            limit.unwrap_or(config.history_page_size),
        )
        .await?;

    if page.messages.is_empty() {
        println!("No more messages.");
    } else {
        print_messages(&page.messages);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Send {
            message,
            chat_id,
            attachments,
        } => run_send(&config, message, chat_id, attachments).await?,
        Commands::Chat => run_chat(&config).await?,
        Commands::History { before, limit } => run_history(&config, before, limit).await?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            match config.stream_url() {
                Some(url) => println!("stream endpoint: {url}"),
                None => println!("stream endpoint: (not configured, set CHAT_STREAM_BASE_URL)"),
            }
        }
    }

    Ok(())
}
