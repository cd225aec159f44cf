//! Terminal front end for the chat client
//!
//! Plain lines are sent as prompts; lines starting with `/` are commands.

use chat_client::capabilities::SystemClipboard;
use chat_client::llm::all_tiers;
use chat_client::markup::{self, InlineNode};
use chat_client::{
    spawn_client, Capabilities, ChatHandle, ClientConfig, ClientEvent, ConversationId,
    HttpGateway, LoggingService, Message, ModelTier,
};
use crossterm::style::Stylize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /new               start a new conversation
  /list              list conversations
  /switch N          switch to conversation N
  /delete N          delete conversation N
  /clear yes         delete every conversation
  /show              print the active conversation
  /regen             regenerate the last reply
  /edit N TEXT       replace message N with TEXT
  /copy N            copy message N to the clipboard
  /model [ID]        show or select the model
  /temp X            set the sampling temperature
  /quit              exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        gateway = %config.gateway_url,
        model = %config.default_model,
        history_window = config.history_window,
        "Configuration loaded"
    );

    let gateway = HttpGateway::new(&config.gateway_url, config.request_timeout)?;
    let service = LoggingService::new(Arc::new(gateway));

    let mut capabilities = Capabilities::none();
    match SystemClipboard::new() {
        Ok(clipboard) => capabilities = capabilities.with_clipboard(Arc::new(clipboard)),
        Err(e) => tracing::warn!(error = %e, "Clipboard unavailable"),
    }

    let handle = spawn_client(&config, service, capabilities);
    let printer = tokio::spawn(print_events(handle.clone(), handle.subscribe()));

    println!("{HELP}");
    show_conversation(&handle).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('/') {
            handle.send(line).await?;
            continue;
        }
        if !run_command(&handle, line).await? {
            break;
        }
    }

    printer.abort();
    Ok(())
}

/// Execute one slash command; returns false on `/quit`
async fn run_command(handle: &ChatHandle, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default().trim();
    let rest = parts.next().unwrap_or_default().trim();

    match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => println!("{HELP}"),
        "/new" => handle.new_conversation().await?,
        "/list" => list_conversations(handle).await?,
        "/switch" => match conversation_at(handle, arg).await? {
            Some(id) => {
                handle.select_conversation(id).await?;
                show_conversation(handle).await?;
            }
            None => println!("{}", "No such conversation".yellow()),
        },
        "/delete" => match conversation_at(handle, arg).await? {
            Some(id) => handle.delete_conversation(id).await?,
            None => println!("{}", "No such conversation".yellow()),
        },
        "/clear" => {
            if arg == "yes" {
                handle.clear_all(true).await?;
            } else {
                println!("{}", "Type /clear yes to delete every conversation".yellow());
            }
        }
        "/show" => show_conversation(handle).await?,
        "/regen" => handle.regenerate().await?,
        "/edit" => match arg.parse::<usize>() {
            Ok(index) => handle.save_edit(index, rest).await?,
            Err(_) => println!("{}", "Usage: /edit N TEXT".yellow()),
        },
        "/copy" => match arg.parse::<usize>() {
            Ok(index) => handle.copy_message(index).await?,
            Err(_) => println!("{}", "Usage: /copy N".yellow()),
        },
        "/model" => select_model(handle, arg).await?,
        "/temp" => match arg.parse::<f32>() {
            Ok(temperature) => handle.set_temperature(temperature).await?,
            Err(_) => println!("{}", "Usage: /temp X".yellow()),
        },
        _ => println!("{}", format!("Unknown command {command}").yellow()),
    }
    Ok(true)
}

/// Resolve a 1-based position in the sidebar listing
async fn conversation_at(
    handle: &ChatHandle,
    position: &str,
) -> Result<Option<ConversationId>, Box<dyn std::error::Error>> {
    let Ok(position) = position.parse::<usize>() else {
        return Ok(None);
    };
    let snapshot = handle.snapshot().await?;
    Ok(position
        .checked_sub(1)
        .and_then(|i| snapshot.conversations.get(i))
        .map(|c| c.id))
}

async fn list_conversations(handle: &ChatHandle) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = handle.snapshot().await?;
    for (i, conversation) in snapshot.conversations.iter().enumerate() {
        let marker = if snapshot.active_id == Some(conversation.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}. {} ({} messages, {})",
            i + 1,
            conversation.title,
            conversation.message_count,
            conversation.model.label()
        );
    }
    Ok(())
}

async fn select_model(handle: &ChatHandle, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if id.is_empty() {
        let current = handle.snapshot().await?.model;
        for tier in all_tiers() {
            let marker = if *tier == current { "*" } else { " " };
            println!("{marker} {} ({})", tier.id(), tier.label());
        }
        return Ok(());
    }
    match ModelTier::from_id(id) {
        Some(model) => handle.select_model(model).await?,
        None => println!("{}", format!("Unknown model {id}").yellow()),
    }
    Ok(())
}

async fn show_conversation(handle: &ChatHandle) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = handle.snapshot().await?;
    for (i, message) in snapshot.messages.iter().enumerate() {
        let marker = if snapshot.copied_index == Some(i) {
            " (copied)"
        } else {
            ""
        };
        println!("{}{marker}", speaker(i, message));
        println!("{}", render(&markup::parse(&message.text)));
    }
    Ok(())
}

fn speaker(index: usize, message: &Message) -> String {
    let edited = if message.edited { " (edited)" } else { "" };
    let label = format!("[{index}] {:?}{edited}", message.role);
    if message.is_user() {
        label.green().to_string()
    } else {
        label.blue().to_string()
    }
}

fn render(nodes: &[InlineNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            InlineNode::Text(text) => out.push_str(text),
            InlineNode::Bold(children) => {
                let _ = write!(out, "{}", render(children).bold());
            }
            InlineNode::Italic(children) => {
                let _ = write!(out, "{}", render(children).italic());
            }
            InlineNode::Code(code) => {
                let _ = write!(out, "{}", code.as_str().cyan());
            }
            InlineNode::LineBreak => out.push('\n'),
        }
    }
    out
}

/// Reply being printed as it is revealed
struct LiveReply {
    conversation_id: ConversationId,
    index: usize,
    printed: usize,
}

impl LiveReply {
    fn print_through(&mut self, text: &str) {
        if let Some(delta) = text.get(self.printed..) {
            print!("{delta}");
            let _ = std::io::stdout().flush();
            self.printed = text.len();
        }
    }
}

async fn print_events(handle: ChatHandle, mut events: broadcast::Receiver<ClientEvent>) {
    let mut live: Option<LiveReply> = None;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Printer fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            ClientEvent::MessagesChanged {
                conversation_id,
                messages,
            } => {
                if let Some(reply) = live.as_mut() {
                    if reply.conversation_id == conversation_id {
                        if let Some(message) = messages.get(reply.index) {
                            reply.print_through(&message.text);
                        }
                    }
                    continue;
                }
                // An empty trailing reply is the reveal placeholder
                if let Some(last) = messages.last() {
                    if !last.is_user() && last.text.is_empty() {
                        print!("{} ", "assistant>".blue());
                        live = Some(LiveReply {
                            conversation_id,
                            index: messages.len() - 1,
                            printed: 0,
                        });
                    }
                }
            }
            ClientEvent::MessageUpdated { index, message } => {
                if let Some(reply) = live.as_mut().filter(|r| r.index == index) {
                    reply.print_through(&message.text);
                }
            }
            ClientEvent::TurnFinished { conversation_id } => {
                if live.take().is_some() {
                    println!();
                } else if let Ok(snapshot) = handle.snapshot().await {
                    // Failed turns skip the reveal
                    let last = snapshot.messages.last().filter(|m| !m.is_user());
                    if let (true, Some(last)) = (snapshot.active_id == Some(conversation_id), last) {
                        println!("{} {}", "assistant>".blue(), last.text);
                    }
                }
            }
            ClientEvent::Notice(notice) => println!("{}", notice.yellow()),
            ClientEvent::CopiedChanged(Some(index)) => {
                println!("{}", format!("Copied message {index}").dark_grey());
            }
            _ => {}
        }
    }
}
