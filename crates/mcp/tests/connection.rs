//! Connection lifecycle tests against scripted fake providers.
//!
//! Each fake is a small shell script that reads JSON-RPC requests line by
//! line from stdin and prints canned responses. Request ids are assigned
//! sequentially starting at 1, so the scripts hardcode them.

use std::path::PathBuf;
use std::time::Duration;

use mcp::{Connection, Error, ServerConfig};

const INIT_RESPONSE: &str = concat!(
    "read -r line\n",
    r#"printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{"listChanged":false}},"serverInfo":{"name":"fake-docs","version":"0.1.0"}}}'"#,
    "\nread -r line\n",
);

struct Script {
    path: PathBuf,
}

impl Script {
    fn new(name: &str, body: &str) -> Self {
        let path =
            std::env::temp_dir().join(format!("mcp-fake-{name}-{}.sh", std::process::id()));
        std::fs::write(&path, body).unwrap();
        Self { path }
    }

    /// A provider that completes the initialize handshake, then runs `rest`.
    fn initialized(name: &str, rest: &str) -> Self {
        Self::new(name, &format!("{INIT_RESPONSE}{rest}\n"))
    }

    fn config(&self) -> ServerConfig {
        ServerConfig::new("fake", "sh")
            .arg(self.path.display().to_string())
            .timeout(Duration::from_secs(5))
    }
}

impl Drop for Script {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[tokio::test]
async fn open_list_call_close() {
    let script = Script::initialized(
        "happy",
        concat!(
            "read -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"search_documentation","description":"Search AWS documentation","inputSchema":{"type":"object","properties":{"search_phrase":{"type":"string"}}}}]}}'"#,
            "\nread -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"S3 is object storage."}],"isError":false}}'"#,
        ),
    );

    let connection = Connection::open(script.config()).await.unwrap();
    assert_eq!(connection.server_info().server_info.name, "fake-docs");
    assert_eq!(connection.name(), "fake");
    assert!(format!("{connection:?}").contains("fake-docs"));

    let tools = connection.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "search_documentation");

    let result = connection
        .call_tool(
            "search_documentation",
            Some(serde_json::json!({"search_phrase": "S3"})),
        )
        .await
        .unwrap();
    assert_eq!(result.text(), "S3 is object storage.");

    connection.close().await;
    connection.close().await;

    let err = connection.list_tools().await.unwrap_err();
    assert!(matches!(err, Error::Closed), "got {err:?}");
}

#[tokio::test]
async fn open_fails_when_command_missing() {
    let config = ServerConfig::new("missing", "definitely-not-a-real-binary-1f9a");
    let err = Connection::open(config).await.unwrap_err();
    assert!(matches!(err, Error::Spawn(_)), "got {err:?}");
}

#[tokio::test]
async fn open_fails_when_handshake_rejected() {
    let script = Script::new(
        "reject",
        concat!(
            "read -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"unsupported protocol"}}'"#,
            "\n",
        ),
    );
    let err = Connection::open(script.config()).await.unwrap_err();
    assert!(matches!(err, Error::JsonRpc(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_catalog_is_distinguished() {
    let script = Script::initialized(
        "badcatalog",
        concat!(
            "read -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":"nope"}}'"#,
        ),
    );

    let connection = Connection::open(script.config()).await.unwrap();
    let err = connection.list_tools().await.unwrap_err();
    assert!(matches!(err, Error::MalformedCatalog(_)), "got {err:?}");
    connection.close().await;
}

#[tokio::test]
async fn tool_error_flag_becomes_error() {
    let script = Script::initialized(
        "toolerr",
        concat!(
            "read -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"no such page"}],"isError":true}}'"#,
        ),
    );

    let connection = Connection::open(script.config()).await.unwrap();
    let err = connection
        .call_tool("read_documentation", Some(serde_json::json!({"url": "x"})))
        .await
        .unwrap_err();
    match err {
        Error::ToolCallFailed(message) => assert_eq!(message, "no such page"),
        other => panic!("got {other:?}"),
    }
    connection.close().await;
}

#[tokio::test]
async fn notifications_are_skipped() {
    let script = Script::initialized(
        "notify",
        concat!(
            "read -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"indexing"}}'"#,
            "\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}'"#,
        ),
    );

    let connection = Connection::open(script.config()).await.unwrap();
    let tools = connection.list_tools().await.unwrap();
    assert!(tools.is_empty());
    connection.close().await;
}

#[tokio::test]
async fn cancelled_call_does_not_poison_the_connection() {
    let script = Script::initialized(
        "cancel",
        concat!(
            "read -r line\n",
            "sleep 1\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}'"#,
            "\nread -r line\n",
            r#"printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"tools":[{"name":"search_documentation","inputSchema":{"type":"object"}}]}}'"#,
        ),
    );

    let connection = Connection::open(script.config()).await.unwrap();

    // Give up on the first call while the provider is still preparing its
    // reply. The reply lands in the pipe anyway.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(300), connection.list_tools()).await;
    assert!(abandoned.is_err());

    // The next exchange must skip the stale id-2 reply and pick up its own.
    let tools = connection.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "search_documentation");
    connection.close().await;
}

#[tokio::test]
async fn slow_provider_times_out() {
    let script = Script::initialized("slow", "read -r line\nsleep 5");
    let config = script.config().timeout(Duration::from_secs(1));

    let connection = Connection::open(config).await.unwrap();
    let err = connection.list_tools().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
    connection.close().await;
}

#[tokio::test]
async fn provider_exit_is_reported() {
    let script = Script::initialized("exits", "exit 0");

    let connection = Connection::open(script.config()).await.unwrap();
    let err = connection.list_tools().await.unwrap_err();
    // Depending on timing the write may hit a broken pipe before the read
    // sees EOF.
    assert!(
        matches!(err, Error::ServerExited | Error::Transport(_)),
        "got {err:?}"
    );
    connection.close().await;
}
