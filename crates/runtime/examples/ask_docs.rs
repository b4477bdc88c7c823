//! Manual smoke run against real Azure OpenAI and the AWS docs MCP server.
//!
//! Needs the AZURE_OPENAI_* variables set and `uvx` on PATH:
//! cargo run --example ask_docs

use runtime::{Credentials, McpSettings, McpToolHost, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Credentials::from_env()?;
    let settings = McpSettings::from_env();

    println!("Connecting to {} via uvx...", settings.package);
    let host = McpToolHost::connect(settings.server_config()).await?;
    println!("Provider: {}", host.server_name());

    let session = Session::create(
        &credentials,
        host,
        "You are an AWS documentation assistant. Use the available tools to \
         answer questions accurately, and cite the pages you used.",
    );
    for tool in session.tools() {
        println!("  tool: {}", tool.name);
    }

    let result = session.run("What is Amazon S3?").await;

    for record in &result.tool_calls {
        println!(
            "[{}] {} ({} ms)",
            record.sequence_index, record.tool_name, record.duration_ms
        );
    }
    if let Some(error) = &result.error {
        println!("turn failed: {error}");
    } else {
        println!("\n{}", result.answer_text);
    }
    println!(
        "\ntokens: {} prompt + {} completion = {}",
        result.usage.prompt_tokens, result.usage.completion_tokens, result.usage.total_tokens
    );

    session.into_host().close().await;
    Ok(())
}
