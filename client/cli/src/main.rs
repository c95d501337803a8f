//! Chat Client - Terminal Surface
//!
//! Line-oriented chat with a streaming agent backend. Replies stream in as
//! they are produced; when streaming fails the turn is retried once without
//! streaming.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session against the configured backend
//! chat-client
//!
//! # Custom endpoint and a fresh conversation
//! chat-client --endpoint https://agents.example.com/api/v1 --new-conversation
//!
//! # Let the agent open the conversation
//! chat-client --init
//!
//! # One-shot question, then exit
//! chat-client --message "Show my schedule for today"
//!
//! # Verbose logging (written to stderr)
//! RUST_LOG=debug chat-client
//! ```
//!
//! # Commands
//!
//! - `/reset`: start a new conversation
//! - `/history`: print the conversation so far
//! - `/quit`: exit
//! - `1`..`3`: send a starter prompt
//! - Ctrl-C: abandon the running turn, or exit at the prompt

mod render;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{info, warn};

use chat_client_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use chat_client_core::profile::{LOADING_GREETING, STARTER_PROMPTS};
use chat_client_core::{
    access_gate, greeting, ChatClient, ChatUpdate, ClientConfig, GateDecision, ProfileClient,
};

use render::{starter_menu, transcript, Renderer, PROMPT};

/// Chat Client - streaming chat with an agent backend
#[derive(Parser, Debug)]
#[command(name = "chat-client")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Agent API base URL
    #[arg(short = 'e', long, value_name = "URL")]
    endpoint: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "CHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Session cookie used for the profile lookup
    #[arg(long, value_name = "COOKIE")]
    session_cookie: Option<String>,

    /// Fixed participant ID
    #[arg(short = 'u', long, value_name = "ID")]
    user_id: Option<String>,

    /// Client-local storage file
    #[arg(long, value_name = "FILE")]
    storage: Option<PathBuf>,

    /// Bearer credential
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Ask the agent to open the conversation
    #[arg(long)]
    init: bool,

    /// Forget the stored conversation before starting
    #[arg(short = 'n', long)]
    new_conversation: bool,

    /// Send one message, print the reply, and exit
    #[arg(short = 'm', long, value_name = "TEXT")]
    message: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.endpoint {
            overrides = overrides.with_endpoint_url(url.clone());
        }
        if let Some(ref cookie) = self.session_cookie {
            overrides = overrides.with_session_cookie(cookie.clone());
        }
        if let Some(ref id) = self.user_id {
            overrides = overrides.with_participant_id(id.clone());
        }
        if let Some(ref path) = self.storage {
            overrides = overrides.with_storage_path(path.clone());
        }
        if let Some(ref token) = self.token {
            overrides = overrides.with_token(token.clone());
        }
        overrides
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they never interleave with the conversation.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chat_client={level},chat_client_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn write_out(text: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Print the personalised greeting
///
/// The profile lookup never blocks the chat: any failure just means no
/// personalisation.
async fn greet(config: &ClientConfig) -> Result<()> {
    write_out(LOADING_GREETING).await?;

    let profile = match ProfileClient::from_config(config) {
        Ok(client) => client.validate(config.auth.session_cookie.as_deref()).await,
        Err(e) => {
            warn!(error = %e, "Profile lookup unavailable");
            None
        }
    };

    let mut line = format!("\r{}", greeting(profile.as_ref(), Utc::now()));
    if let Some(name) = profile.as_ref().and_then(|p| p.display_name()) {
        line.push_str(&format!(" ({name})"));
    }
    line.push('\n');
    write_out(&line).await
}

/// Forward chat updates to the terminal until the client is dropped
fn spawn_renderer(
    mut rx: mpsc::UnboundedReceiver<ChatUpdate>,
    default_label: String,
    show_prompt: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = Renderer::new(default_label);
        while let Some(update) = rx.recv().await {
            if !show_prompt && update == ChatUpdate::Busy(false) {
                continue;
            }
            if let Some(text) = renderer.render(&update) {
                if let Err(e) = write_out(&text).await {
                    warn!(error = %e, "Failed to write to stdout");
                    break;
                }
            }
        }
    })
}

/// Map a starter number to its prompt text
fn starter_prompt(input: &str) -> Option<&'static str> {
    let index: usize = input.parse().ok()?;
    STARTER_PROMPTS
        .get(index.checked_sub(1)?)
        .map(|p| p.prompt)
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Quit,
    Reset,
    History,
    Send(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    match input.trim() {
        "" => Command::Empty,
        "/quit" | "/exit" => Command::Quit,
        "/reset" => Command::Reset,
        "/history" => Command::History,
        text => Command::Send(starter_prompt(text).unwrap_or(text)),
    }
}

/// What the prompt received next
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Interrupt,
    Eof,
}

/// Wait for the next input line or an interrupt, whichever comes first
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> Result<Input>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => {
            Ok(match line.context("Failed to read input")? {
                Some(line) => Input::Line(line),
                None => Input::Eof,
            })
        }
        _ = interrupt => Ok(Input::Interrupt),
    }
}

/// Submit one turn, abandoning it on Ctrl-C
async fn run_turn(client: &mut ChatClient, text: &str) -> Result<()> {
    let interrupted = tokio::select! {
        result = client.submit(text) => {
            result.context("Failed to submit message")?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("Turn interrupted");
        client.cancel_turn();
    }
    Ok(())
}

async fn repl(client: &mut ChatClient) -> Result<()> {
    // After an init turn the renderer has already shown the prompt
    if client.session().messages().is_empty() {
        write_out(&starter_menu(&STARTER_PROMPTS)).await?;
        write_out(PROMPT).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Interrupt => {
                info!("Interrupted at the prompt");
                write_out("\n").await?;
                break;
            }
            Input::Eof => break,
        };

        match parse_command(&line) {
            Command::Empty => write_out(PROMPT).await?,
            Command::Quit => break,
            Command::Reset => {
                client.reset_conversation();
                write_out("New conversation started.\n").await?;
                write_out(&starter_menu(&STARTER_PROMPTS)).await?;
                write_out(PROMPT).await?;
            }
            Command::History => {
                write_out(&transcript(client.session().visible_messages())).await?;
                write_out(PROMPT).await?;
            }
            Command::Send(text) => run_turn(client, text).await?,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config =
        load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        endpoint = %config.api.endpoint_url,
        "Configuration loaded"
    );

    if config.auth.require_session {
        if let GateDecision::Redirect(path) =
            access_gate("/", config.auth.session_cookie.as_deref())
        {
            anyhow::bail!("A session is required (redirected to {path}); pass --session-cookie");
        }
    }

    greet(&config).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut client = ChatClient::from_config(&config)
        .context("Failed to create chat client")?
        .with_updates(tx);
    if config.identity.participant_id.is_none() {
        info!(participant_id = %client.participant_id(), "Using generated participant ID");
    }
    if args.new_conversation {
        client.reset_conversation();
    }

    let one_shot = args.message.is_some();
    let render_task = spawn_renderer(rx, config.chat.progress_label.clone(), !one_shot);

    if args.init {
        client
            .initiate()
            .await
            .context("Failed to open the conversation")?;
    }

    match args.message {
        Some(ref text) => run_turn(&mut client, text).await?,
        None => repl(&mut client).await?,
    }

    // Closing the channel lets the renderer drain and stop
    drop(client);
    render_task.await.context("Renderer task failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_starter_prompt_selection() {
        assert_eq!(
            starter_prompt("1"),
            Some("Show me recent leads from this week")
        );
        assert_eq!(starter_prompt("3"), Some("Create an estimate for a project"));
        assert_eq!(starter_prompt("0"), None);
        assert_eq!(starter_prompt("4"), None);
        assert_eq!(starter_prompt("hello"), None);
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command(" /reset "), Command::Reset);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("2"), Command::Send("Show my schedule for today"));
        assert_eq!(parse_command(" hi there "), Command::Send("hi there"));
    }

    #[tokio::test]
    async fn test_interrupt_at_idle_prompt_ends_input() {
        // Keep the writer alive so reading stays pending
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        let input = next_input(&mut lines, async { Ok::<(), std::io::Error>(()) }).await.unwrap();
        assert_eq!(input, Input::Interrupt);
    }

    #[tokio::test]
    async fn test_lines_read_until_eof() {
        let mut lines = BufReader::new(&b"/quit\n"[..]).lines();

        let first = next_input(&mut lines, std::future::pending()).await.unwrap();
        assert_eq!(first, Input::Line("/quit".to_string()));
        let second = next_input(&mut lines, std::future::pending()).await.unwrap();
        assert_eq!(second, Input::Eof);
    }

    #[test]
    fn test_overrides_from_args() {
        let args = Args::parse_from([
            "chat-client",
            "--endpoint",
            "https://agents.example.com/api/v1",
            "--user-id",
            "user_cli",
            "--token",
            "tok",
        ]);
        let mut config = ClientConfig::default();
        args.overrides().apply(&mut config);

        assert_eq!(config.api.endpoint_url, "https://agents.example.com/api/v1");
        assert_eq!(config.identity.participant_id.as_deref(), Some("user_cli"));
        assert_eq!(config.auth.token.as_deref(), Some("tok"));
        assert_eq!(
            config.source(),
            chat_client_core::ConfigSource::Cli
        );
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["chat-client"]);
        assert!(!args.init);
        assert!(args.message.is_none());
        let mut config = ClientConfig::default();
        args.overrides().apply(&mut config);
        assert_eq!(config.source(), chat_client_core::ConfigSource::Default);
    }
}
