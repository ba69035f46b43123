//! Child-process JSON-RPC tool client.
//!
//! Supervises a long-lived tool-server subprocess and exposes an in-process
//! `call` surface over line-delimited JSON-RPC 2.0. A dedicated reader task
//! demultiplexes responses by request id; the writer is serialized behind a
//! mutex and request ids are allocated under that lock so id order matches
//! wire order. The reader never takes the writer lock.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ToolServerSettings;
use crate::error::{CorralError, Result};
use crate::version;

use super::protocol::{
    CallToolParams, ClientInfo, CODE_CALL_TIMEOUT, CODE_INVALID_PARAMS, DIRECT_RESPONSE,
    InitializeParams, PROTOCOL_VERSION, RpcMessage, ToolKind, ToolOutput,
};

/// How long `stop()` waits for the child to exit after stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tool client lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    NotStarted,
    Initializing,
    Ready,
    Closing,
    Closed,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

type PendingMap = HashMap<u64, oneshot::Sender<RpcMessage>>;

/// Client for the co-resident tool server.
pub struct ToolClient {
    settings: ToolServerSettings,
    state: Arc<StdMutex<ClientState>>,
    next_id: AtomicU64,
    // Correlation table; guarded separately from the writer so the reader
    // task never contends with in-flight writes.
    pending: Arc<StdMutex<PendingMap>>,
    writer: AsyncMutex<Option<ChildStdin>>,
    child: AsyncMutex<Option<Child>>,
}

impl ToolClient {
    pub fn new(settings: ToolServerSettings) -> Self {
        Self {
            settings,
            state: Arc::new(StdMutex::new(ClientState::NotStarted)),
            next_id: AtomicU64::new(1),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            writer: AsyncMutex::new(None),
            child: AsyncMutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("tool client state poisoned")
    }

    /// True once the initialize handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.state() == ClientState::Ready
    }

    /// Spawn the tool server and run the initialize handshake.
    ///
    /// Calling `start` on a client that is already initializing or ready is
    /// a no-op; a closed client cannot be restarted.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("tool client state poisoned");
            match *state {
                ClientState::NotStarted => *state = ClientState::Initializing,
                ClientState::Initializing | ClientState::Ready => return Ok(()),
                ClientState::Closing | ClientState::Closed => {
                    return Err(CorralError::StartupFailed(
                        "tool client already closed".to_string(),
                    ));
                }
            }
        }

        let command = self.resolve_command()?;
        info!(command = %command.join(" "), "starting tool server process");

        let mut cmd = Command::new(&command[0]);
        cmd.args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            self.mark_closed();
            CorralError::StartupFailed(format!("failed to spawn {}: {}", command[0], e))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            self.mark_closed();
            CorralError::StartupFailed("tool server stdin not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            self.mark_closed();
            CorralError::StartupFailed("tool server stdout not captured".to_string())
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        *self.writer.lock().await = Some(stdin);
        *self.child.lock().await = Some(child);

        tokio::spawn(read_loop(
            stdout,
            Arc::clone(&self.pending),
            Arc::clone(&self.state),
        ));

        // Initialize handshake, bounded by the startup timeout.
        let params = serde_json::to_value(InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({ "tools": {} }),
            client_info: ClientInfo {
                name: "corral".to_string(),
                version: version::VERSION.to_string(),
            },
        })?;

        let handshake = async {
            let rx = self.send_request("initialize", params).await?.1;
            rx.await.map_err(|_| CorralError::ConnectionClosed)
        };

        match timeout(self.settings.startup_timeout, handshake).await {
            Ok(Ok(msg)) if msg.error.is_none() => {
                *self.state.lock().expect("tool client state poisoned") = ClientState::Ready;
                info!("tool server initialized");
                Ok(())
            }
            Ok(Ok(msg)) => {
                let detail = msg
                    .error
                    .map(|e| format!("{} ({})", e.message, e.code))
                    .unwrap_or_else(|| "unknown error".to_string());
                self.terminate().await;
                Err(CorralError::StartupFailed(format!(
                    "initialize rejected: {}",
                    detail
                )))
            }
            Ok(Err(e)) => {
                self.terminate().await;
                Err(CorralError::StartupFailed(e.to_string()))
            }
            Err(_) => {
                self.terminate().await;
                Err(CorralError::StartupFailed(format!(
                    "initialize timed out after {:?}",
                    self.settings.startup_timeout
                )))
            }
        }
    }

    /// Invoke a tool by name.
    ///
    /// `direct_response` is a reserved method that never reaches the child:
    /// the canned reply is taken from the `response` argument.
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<ToolOutput> {
        if name == DIRECT_RESPONSE {
            return direct_response(&arguments);
        }

        if self.state() != ClientState::Ready {
            return Err(CorralError::ConnectionClosed);
        }

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;

        let (id, rx) = self.send_request("tools/call", params).await?;

        tokio::select! {
            resp = rx => match resp {
                Ok(msg) => decode_call_response(msg),
                // Reader exited with this call outstanding.
                Err(_) => Err(CorralError::ConnectionClosed),
            },
            _ = cancel.cancelled() => {
                self.forget(id);
                Err(CorralError::Cancelled)
            }
            _ = tokio::time::sleep(self.settings.call_timeout) => {
                self.forget(id);
                Err(CorralError::Tool {
                    code: CODE_CALL_TIMEOUT,
                    message: format!("tool call timed out after {:?}", self.settings.call_timeout),
                })
            }
        }
    }

    /// Close stdin, wait bounded for a graceful exit, then kill.
    /// Repeated calls are no-ops.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().expect("tool client state poisoned");
            match *state {
                ClientState::NotStarted | ClientState::Closing | ClientState::Closed => {
                    *state = ClientState::Closed;
                    return;
                }
                _ => *state = ClientState::Closing,
            }
        }

        // Dropping stdin signals EOF; a well-behaved server exits on it.
        self.writer.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "tool server exited"),
                Ok(Err(e)) => warn!(error = %e, "failed waiting for tool server"),
                Err(_) => {
                    warn!("tool server did not exit in time, killing");
                    let _ = child.kill().await;
                }
            }
        }

        // The reader fails outstanding calls when it sees EOF; drain here as
        // well in case it was never spawned.
        self.pending
            .lock()
            .expect("tool client pending map poisoned")
            .clear();
        *self.state.lock().expect("tool client state poisoned") = ClientState::Closed;
        info!("tool client stopped");
    }

    /// Register a pending entry and write one request frame.
    ///
    /// The id is allocated while the writer lock is held so that id order
    /// matches wire order.
    async fn send_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(u64, oneshot::Receiver<RpcMessage>)> {
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard
            .as_mut()
            .ok_or(CorralError::ConnectionClosed)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("tool client pending map poisoned")
            .insert(id, tx);

        let line = RpcMessage::request(id, method, params).to_line();
        debug!(id, method, "sending tool request");

        let write_result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = write_result {
            self.forget(id);
            warn!(id, error = %e, "tool request write failed");
            return Err(CorralError::ConnectionClosed);
        }

        Ok((id, rx))
    }

    /// Remove a pending entry; a late reply for that id is then discarded
    /// by the reader.
    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .expect("tool client pending map poisoned")
            .remove(&id);
    }

    fn mark_closed(&self) {
        *self.state.lock().expect("tool client state poisoned") = ClientState::Closed;
    }

    /// Kill the child after a failed startup.
    async fn terminate(&self) {
        self.writer.lock().await.take();
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
        }
        self.mark_closed();
    }

    fn resolve_command(&self) -> Result<Vec<String>> {
        if !self.settings.command.is_empty() {
            return Ok(self.settings.command.clone());
        }
        // Default: this executable in tool-server mode.
        let exe = std::env::current_exe().map_err(|e| {
            CorralError::StartupFailed(format!("failed to resolve current executable: {}", e))
        })?;
        Ok(vec![
            exe.to_string_lossy().to_string(),
            "tool-server".to_string(),
        ])
    }
}

/// The `direct_response` fast path: echo the `response` argument back.
fn direct_response(arguments: &serde_json::Map<String, Value>) -> Result<ToolOutput> {
    match arguments.get("response").and_then(Value::as_str) {
        Some(response) if !response.is_empty() => Ok(ToolOutput {
            content: response.to_string(),
            kind: ToolKind::Direct,
        }),
        _ => Err(CorralError::Tool {
            code: CODE_INVALID_PARAMS,
            message: "missing or invalid response parameter".to_string(),
        }),
    }
}

/// Map a correlated response frame to a tool output.
fn decode_call_response(msg: RpcMessage) -> Result<ToolOutput> {
    if let Some(err) = msg.error {
        return Err(CorralError::Tool {
            code: err.code,
            message: err.message,
        });
    }
    match msg.result {
        Some(result) => ToolOutput::from_call_result(&result).ok_or_else(|| {
            CorralError::Internal("tool result carried no text content".to_string())
        }),
        None => Err(CorralError::Internal(
            "tool response carried neither result nor error".to_string(),
        )),
    }
}

/// Dedicated reader: parses inbound frames, fulfills pending entries, and on
/// EOF or error fails every outstanding call and marks the client closed.
async fn read_loop(
    stdout: ChildStdout,
    pending: Arc<StdMutex<PendingMap>>,
    state: Arc<StdMutex<ClientState>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let msg = match RpcMessage::from_line(&line) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "discarding unparsable tool server frame");
                        continue;
                    }
                };
                let slot = msg.id.and_then(|id| {
                    pending
                        .lock()
                        .expect("tool client pending map poisoned")
                        .remove(&id)
                });
                match slot {
                    // Receiver may have timed out or been cancelled; the
                    // frame is then dropped on the floor.
                    Some(tx) => {
                        let _ = tx.send(msg);
                    }
                    None => debug!(id = ?msg.id, "dropping unsolicited tool server frame"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "tool server read failed");
                break;
            }
        }
    }

    // Connection is gone: every outstanding call fails ConnectionClosed
    // (the oneshot receivers observe the dropped senders).
    pending
        .lock()
        .expect("tool client pending map poisoned")
        .clear();
    *state.lock().expect("tool client state poisoned") = ClientState::Closed;
    info!("tool server reader exited");
}

/// Forward tool-server stderr lines through tracing.
async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        debug!(source = "tool-server", "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings_for(script: &str) -> ToolServerSettings {
        ToolServerSettings {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            startup_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
        }
    }

    fn args(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_direct_response_bypasses_child() {
        // No child is ever spawned for the reserved method.
        let client = ToolClient::new(settings_for("exit 1"));
        let output = client
            .call(
                DIRECT_RESPONSE,
                args(&[("response", json!("hello there"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.content, "hello there");
        assert_eq!(output.kind, ToolKind::Direct);
        assert_eq!(client.state(), ClientState::NotStarted);
    }

    #[tokio::test]
    async fn test_direct_response_requires_response_param() {
        let client = ToolClient::new(settings_for("exit 1"));
        let err = client
            .call(
                DIRECT_RESPONSE,
                args(&[("message", json!("wrong key"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CorralError::Tool { code, .. } if code == CODE_INVALID_PARAMS
        ));
    }

    #[tokio::test]
    async fn test_call_before_start_fails() {
        let client = ToolClient::new(settings_for("exit 1"));
        let err = client
            .call("search", args(&[]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_initialize_and_call() {
        // Scripted responder: ids are deterministic (1 = initialize,
        // 2 = first call). Holds the pipe open until stdin closes.
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05"}}\n'
read line
printf '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"Current weather in Berlin"}]}}\n'
cat >/dev/null
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();
        assert!(client.is_ready());

        let output = client
            .call(
                "get_weather",
                args(&[("city", json!("Berlin"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.kind, ToolKind::Weather);
        assert!(output.content.contains("Berlin"));

        client.stop().await;
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_tool_error_envelope() {
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
read line
printf '{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"missing city parameter"}}\n'
cat >/dev/null
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();

        let err = client
            .call("get_weather", args(&[]), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CorralError::Tool { code, message } => {
                assert_eq!(code, -32602);
                assert!(message.contains("missing city"));
            }
            other => panic!("expected Tool error, got {:?}", other),
        }
        client.stop().await;
    }

    #[tokio::test]
    async fn test_unsolicited_frames_are_dropped() {
        // A frame with an unknown id must not affect the real call.
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
read line
printf '{"jsonrpc":"2.0","id":99,"result":{"content":[{"type":"text","text":"stray"}]}}\n'
printf '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"Search results for rust:"}]}}\n'
cat >/dev/null
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();

        let output = client
            .call(
                "search",
                args(&[("query", json!("rust"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.kind, ToolKind::Search);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_child_exit_fails_outstanding_call() {
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
read line
exit 0
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();

        let err = client
            .call(
                "search",
                args(&[("query", json!("rust"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CorralError::ConnectionClosed));

        // The reader marks the client closed right after failing pendings.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.state(), ClientState::Closed);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_call_timeout_removes_pending() {
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
cat >/dev/null
"#;
        let mut settings = settings_for(script);
        settings.call_timeout = Duration::from_millis(200);
        let client = ToolClient::new(settings);
        client.start().await.unwrap();

        let err = client
            .call(
                "search",
                args(&[("query", json!("rust"))]),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CorralError::Tool { code, .. } if code == CODE_CALL_TIMEOUT
        ));
        // The correlation entry was removed with the timeout.
        assert!(client.pending.lock().unwrap().is_empty());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_cancellation_aborts_call() {
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
cat >/dev/null
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();

        let cancel = CancellationToken::new();
        let call = client.call("search", args(&[("query", json!("x"))]), cancel.clone());
        let abort = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        };
        let (result, _) = tokio::join!(call, abort);
        assert!(matches!(result.unwrap_err(), CorralError::Cancelled));
        assert!(client.pending.lock().unwrap().is_empty());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_startup_failure_on_bad_command() {
        let mut settings = ToolServerSettings::default();
        settings.command = vec!["/nonexistent/tool-server-binary".to_string()];
        let client = ToolClient::new(settings);
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, CorralError::StartupFailed(_)));
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_startup_timeout() {
        // Server never answers initialize.
        let mut settings = settings_for("cat >/dev/null");
        settings.startup_timeout = Duration::from_millis(200);
        let client = ToolClient::new(settings);
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, CorralError::StartupFailed(_)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        // `cat` echoes the initialize request back; the echoed frame carries
        // the matching id, which is enough for the handshake.
        let client = ToolClient::new(settings_for("cat"));
        client.start().await.unwrap();
        client.stop().await;
        client.stop().await;
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let script = r#"
read line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
read line
printf '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"a"}]}}\n'
read line
printf '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"b"}]}}\n'
cat >/dev/null
"#;
        let client = ToolClient::new(settings_for(script));
        client.start().await.unwrap();
        let first = client
            .call("search", args(&[("query", json!("a"))]), CancellationToken::new())
            .await
            .unwrap();
        let second = client
            .call("search", args(&[("query", json!("b"))]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.content, "a");
        assert_eq!(second.content, "b");
        client.stop().await;
    }
}
