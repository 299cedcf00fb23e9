use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use crate::client::OllamaClient;
use crate::config::Settings;
use crate::history::UuidIds;
use crate::session::ChatSession;
use crate::storage::{ChatStore, JsonFileStore};
use crate::stream::{DelimitedSplitter, Utf8ChunkDecoder};

const STDIN_BUFFER_SIZE: usize = 8192;

#[derive(Parser)]
#[command(name = "ollama-chat")]
#[command(version)]
#[command(about = "Chat with Ollama models from the terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List models installed on the server
    Models,
    /// List stored chats, newest first
    Chats,
    /// Print the active conversation of a chat
    Show { id: String },
    /// Send a prompt and stream the reply
    Send {
        /// Continue this chat instead of starting a new one
        #[arg(long)]
        chat: Option<String>,
        #[arg(long)]
        model: Option<String>,
        prompt: String,
    },
    /// Ask for another version of a chat's last reply
    Regenerate { id: String },
    /// Set a chat's title
    Rename { id: String, title: String },
    /// Delete a chat
    Delete { id: String },
    /// Split stdin into frames and print each as a JSON string
    Split {
        /// Frame delimiter; `\n`, `\r`, `\t` and `\\` escapes are understood
        #[arg(long, default_value = "\\n")]
        delimiter: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Models) => list_models().await?,
        Some(Commands::Chats) => list_chats()?,
        Some(Commands::Show { id }) => show_chat(&id)?,
        Some(Commands::Send { chat, model, prompt }) => {
            send_prompt(chat.as_deref(), model.as_deref(), &prompt).await?
        }
        Some(Commands::Regenerate { id }) => regenerate(&id).await?,
        Some(Commands::Rename { id, title }) => rename_chat(&id, &title)?,
        Some(Commands::Delete { id }) => delete_chat(&id)?,
        Some(Commands::Split { delimiter }) => split_stdin(&unescape_delimiter(&delimiter)).await?,
        None => {
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Result<JsonFileStore> {
    let data_dir = settings.data_dir()?;
    JsonFileStore::open(&data_dir)
        .with_context(|| format!("Failed to open chat store in {}", data_dir.display()))
}

fn client(settings: &Settings) -> Result<OllamaClient> {
    OllamaClient::from_settings(settings).context("Failed to create Ollama client")
}

/// Streamed reply text goes straight to stdout
fn print_delta(delta: &str) {
    print!("{}", delta);
    let _ = std::io::stdout().flush();
}

/// Resolves on Ctrl-C. Without a signal handler the reply runs to the end.
async fn ctrl_c_pressed() {
    if tokio::signal::ctrl_c().await.is_err() {
        futures::future::pending::<()>().await;
    }
}

async fn list_models() -> Result<()> {
    let settings = Settings::load()?;
    let models = client(&settings)?
        .list_models()
        .await
        .with_context(|| format!("Failed to list models from {}", settings.api_base_url()))?;

    if models.is_empty() {
        println!("No models installed");
    }
    for model in models {
        match model.details.and_then(|d| d.parameter_size) {
            Some(size) => println!("{}  ({})", model.name, size),
            None => println!("{}", model.name),
        }
    }
    Ok(())
}

fn list_chats() -> Result<()> {
    let settings = Settings::load()?;
    let chats = open_store(&settings)?.get_chats()?;

    if chats.is_empty() {
        println!("No chats yet");
        return Ok(());
    }
    for chat in chats {
        let updated = DateTime::from_timestamp_millis(chat.timestamp)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", chat.id, updated, chat.title);
    }
    Ok(())
}

fn show_chat(id: &str) -> Result<()> {
    let settings = Settings::load()?;
    let store = open_store(&settings)?;
    let session = ChatSession::open(&store, id, UuidIds)?;
    let history = session.history();

    println!("{}", session.chat().title);
    println!("================================");
    for node in history.active_path()? {
        let siblings = history.siblings(&node.id)?;
        let version = match siblings.iter().position(|s| *s == node.id) {
            Some(index) if siblings.len() > 1 => format!(" [{}/{}]", index + 1, siblings.len()),
            _ => String::new(),
        };
        println!();
        println!("{}{}:", node.message.role.as_str(), version);
        println!("{}", node.message.content_str());
    }
    Ok(())
}

async fn send_prompt(chat_id: Option<&str>, model: Option<&str>, prompt: &str) -> Result<()> {
    let settings = Settings::load()?;
    let store = open_store(&settings)?;
    let client = client(&settings)?;

    let mut session = match chat_id {
        Some(id) => ChatSession::open(&store, id, UuidIds)?,
        None => {
            let Some(model) = model.or(settings.default_model.as_deref()) else {
                bail!("No model selected: pass --model or set default_model in the config file");
            };
            ChatSession::create(&store, model, UuidIds)?
        }
    };
    if let Some(model) = model {
        session.set_model(model)?;
    }
    let mut session =
        session.with_title_auto_generate(settings.title_auto_generate).with_options(settings.options_json());

    eprintln!("chat {}", session.chat().id);
    session.submit_prompt_until(&client, prompt, ctrl_c_pressed(), print_delta).await?;
    println!();
    Ok(())
}

async fn regenerate(id: &str) -> Result<()> {
    let settings = Settings::load()?;
    let store = open_store(&settings)?;
    let client = client(&settings)?;

    let mut session = ChatSession::open(&store, id, UuidIds)?.with_options(settings.options_json());
    session.regenerate_response_until(&client, ctrl_c_pressed(), print_delta).await?;
    println!();
    Ok(())
}

fn rename_chat(id: &str, title: &str) -> Result<()> {
    let settings = Settings::load()?;
    let store = open_store(&settings)?;
    ChatSession::open(&store, id, UuidIds)?.rename(title)?;
    println!("Renamed {}", id);
    Ok(())
}

fn delete_chat(id: &str) -> Result<()> {
    let settings = Settings::load()?;
    let store = open_store(&settings)?;
    ChatSession::open(&store, id, UuidIds)?.delete()?;
    println!("Deleted {}", id);
    Ok(())
}

async fn split_stdin(delimiter: &str) -> Result<()> {
    let mut splitter = DelimitedSplitter::new(delimiter).context("Invalid delimiter")?;
    let mut decoder = Utf8ChunkDecoder::new();
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; STDIN_BUFFER_SIZE];

    loop {
        let n = stdin.read(&mut buf).await.context("Failed to read stdin")?;
        if n == 0 {
            break;
        }
        for frame in splitter.feed(&decoder.decode(&buf[..n]))? {
            print_frame(&frame)?;
        }
    }

    if let Some(rest) = decoder.finish() {
        for frame in splitter.feed(&rest)? {
            print_frame(&frame)?;
        }
    }
    if let Some(tail) = splitter.finish() {
        print_frame(&tail)?;
    }
    Ok(())
}

fn print_frame(frame: &str) -> Result<()> {
    println!("{}", serde_json::to_string(frame)?);
    Ok(())
}

fn unescape_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
