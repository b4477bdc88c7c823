//! Command-line interface for the documentation agent.

mod error;

use std::io::{self, BufRead, Write};

use chrono::Local;
use clap::{Parser, Subcommand};
use runtime::config::{ENV_API_KEY, ENV_API_VERSION, ENV_DEPLOYMENT, ENV_ENDPOINT, ENV_MCP_PACKAGE};
use runtime::{
    Backend, Credentials, EmptyToolHost, McpSettings, McpToolHost, Session, ToolCallRecord,
    ToolHost, ToolOutcome, TurnResult,
};
use serde_json::Value;

use error::Result;

const SYSTEM_PROMPT: &str = "You are an AWS documentation assistant. Use the available tools to \
search and read AWS documentation before answering, and ground your answers in what the \
documentation actually says. When you rely on a page, include its URL.";

#[derive(Parser)]
#[command(name = "skipper")]
#[command(about = "AWS documentation agent backed by Azure OpenAI and MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and exit
    Ask {
        /// The question to ask
        question: String,

        /// Skip the tool provider and answer from the model alone
        #[arg(long)]
        no_tools: bool,
    },
    /// Start an interactive chat session (default)
    Chat,
    /// List the tools offered by the documentation server
    Tools,
    /// Show the active configuration
    Settings,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so piped answers stay clean.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ask { question, no_tools }) => cmd_ask(&question, no_tools).await,
        Some(Commands::Chat) | None => cmd_chat().await,
        Some(Commands::Tools) => cmd_tools().await,
        Some(Commands::Settings) => cmd_settings(),
    }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_ask(question: &str, no_tools: bool) -> Result<()> {
    let credentials = Credentials::from_env()?;

    if no_tools {
        let session = Session::create(&credentials, EmptyToolHost, SYSTEM_PROMPT);
        render_result(&session.run(question).await);
        return Ok(());
    }

    match connect_host().await {
        Ok(host) => {
            let session = Session::create(&credentials, host, SYSTEM_PROMPT);
            render_result(&session.run(question).await);
            session.into_host().close().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "tool provider unavailable, answering without tools");
            let session = Session::create(&credentials, EmptyToolHost, SYSTEM_PROMPT);
            render_result(&session.run(question).await);
        }
    }

    Ok(())
}

async fn cmd_chat() -> Result<()> {
    println!("skipper v{}", env!("CARGO_PKG_VERSION"));

    let credentials = Credentials::from_env()?;

    match connect_host().await {
        Ok(host) => {
            println!("Tool provider: {}", host.server_name());
            let session = Session::create(&credentials, host, SYSTEM_PROMPT);
            print_banner(&session);
            let outcome = chat_loop(&session).await;
            session.into_host().close().await;
            outcome
        }
        Err(e) => {
            tracing::warn!(error = %e, "tool provider unavailable, answering without tools");
            let session = Session::create(&credentials, EmptyToolHost, SYSTEM_PROMPT);
            print_banner(&session);
            chat_loop(&session).await
        }
    }
}

async fn cmd_tools() -> Result<()> {
    let settings = McpSettings::from_env();
    println!("Connecting to {}...", settings.package);

    let connection = mcp::Connection::open(settings.server_config()).await?;
    let info = connection.server_info();
    println!(
        "Connected: {} v{}\n",
        info.server_info.name,
        info.server_info.version.as_deref().unwrap_or("unknown"),
    );

    let tools = match connection.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            connection.close().await;
            return Err(e.into());
        }
    };

    if tools.is_empty() {
        println!("The server offers no tools.");
    } else {
        for tool in &tools {
            println!("{}", tool.name);
            if let Some(description) = &tool.description {
                for line in description.lines().take(2) {
                    println!("    {line}");
                }
            }
        }
        println!("\n{} tool(s).", tools.len());
    }

    connection.close().await;
    Ok(())
}

/// Prints each setting individually so a partially configured environment
/// still shows what is missing. The API key value is never printed.
fn cmd_settings() -> Result<()> {
    let display = |name: &str| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "(not set)".to_string())
    };
    let key_state = if std::env::var(ENV_API_KEY).is_ok_and(|v| !v.trim().is_empty()) {
        "(set)"
    } else {
        "(not set)"
    };

    println!("{ENV_ENDPOINT:<34} {}", display(ENV_ENDPOINT));
    println!("{ENV_API_KEY:<34} {key_state}");
    println!("{ENV_DEPLOYMENT:<34} {}", display(ENV_DEPLOYMENT));
    println!("{ENV_API_VERSION:<34} {}", display(ENV_API_VERSION));
    println!("{ENV_MCP_PACKAGE:<34} {}", McpSettings::from_env().package);
    Ok(())
}

// ─── Session plumbing ────────────────────────────────────────────────────────

async fn connect_host() -> std::result::Result<McpToolHost, mcp::Error> {
    let settings = McpSettings::from_env();
    McpToolHost::connect(settings.server_config()).await
}

fn print_banner<B: Backend, H: ToolHost>(session: &Session<B, H>) {
    let settings = session.describe_settings();
    println!("Session ID: {}", session.id());
    println!(
        "Deployment: {} (api version {})",
        settings.deployment, settings.api_version
    );
    println!("Tools: {}", settings.tool_count);
    println!("Type 'quit' or Ctrl+D to exit.\n");
}

async fn chat_loop<B: Backend, H: ToolHost>(session: &Session<B, H>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        render_result(&session.run(input).await);
    }

    println!("\nSession ended.");
    Ok(())
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn render_result(result: &TurnResult) {
    if !result.tool_calls.is_empty() {
        println!("\nTool calls ({}):", result.tool_calls.len());
        for record in &result.tool_calls {
            render_tool_call(record);
        }
    }

    match &result.error {
        Some(error) => eprintln!("\nTurn failed: {error}"),
        None => {
            let time = Local::now().format("%H:%M:%S");
            println!("\n[{time}] {}", result.answer_text);
        }
    }

    println!(
        "Tokens: {} prompt + {} completion = {} total\n",
        result.usage.prompt_tokens, result.usage.completion_tokens, result.usage.total_tokens
    );
}

fn render_tool_call(record: &ToolCallRecord) {
    println!(
        "  [{}] {} ({} ms)",
        record.sequence_index, record.tool_name, record.duration_ms
    );
    println!("      arguments: {}", record.arguments);
    match &record.result {
        ToolOutcome::Success { output } => {
            println!("      result: {}", truncate(&preview(output), 200));
        }
        ToolOutcome::Failed { error } => {
            println!("      failed: {error}");
        }
    }
}

fn preview(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate("hello", 200), "hello");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        let text = "é".repeat(300);
        let cut = truncate(&text, 200);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }

    #[test]
    fn preview_unwraps_plain_strings() {
        assert_eq!(preview(&Value::String("plain".into())), "plain");
        assert_eq!(preview(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }
}
