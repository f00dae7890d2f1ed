//! JSON-lines channel between the host UI and the engine.
//!
//! Each stdin line is either a control message or a connectivity signal:
//!
//! ```json
//! {"type": "PREWARM_GROUP", "groupId": "m42", "resourceUrls": ["/api/modules/m42"]}
//! {"type": "CONNECTIVITY", "online": false}
//! ```
//!
//! Each handled line produces one reply line on stdout. Engine diagnostics
//! are forwarded on the same stream as they happen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_client::{ControlMessage, ControlOutcome, Engine};
use tether_core::Diagnostic;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::error::{ErrorReply, HostError};

/// Host-side signals that are not UI control messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum HostSignal {
    Connectivity { online: bool },
}

#[derive(Debug, Clone, PartialEq)]
enum Inbound {
    Signal(HostSignal),
    Control(ControlMessage),
}

/// One line written back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok { result: ControlOutcome },
    Connectivity { online: bool },
    Diagnostic { event: Diagnostic },
    Error { error: ErrorReply },
}

fn parse(line: &str) -> Result<Inbound, HostError> {
    let value: Value = serde_json::from_str(line)?;
    match value.get("type").and_then(Value::as_str) {
        Some("CONNECTIVITY") => Ok(Inbound::Signal(serde_json::from_value(value)?)),
        Some(_) => Ok(Inbound::Control(serde_json::from_value(value)?)),
        None => Err(HostError::InvalidMessage("missing message type".into())),
    }
}

/// Dispatches channel lines to the engine.
#[derive(Clone)]
pub struct ChannelHandler {
    engine: Arc<Engine>,
}

impl ChannelHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Handle one line. Blank lines produce no reply.
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let reply = match self.dispatch(line).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "channel message failed");
                Reply::Error { error: e.into() }
            }
        };
        Some(reply)
    }

    async fn dispatch(&self, line: &str) -> Result<Reply, HostError> {
        match parse(line)? {
            Inbound::Signal(HostSignal::Connectivity { online }) => {
                self.engine.set_online(online);
                Ok(Reply::Connectivity { online })
            }
            Inbound::Control(message) => {
                let result = self.engine.handle_message(message).await?;
                Ok(Reply::Ok { result })
            }
        }
    }

    /// Read lines until EOF, writing one reply per handled line plus any
    /// diagnostics emitted meanwhile.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut events = self.engine.diagnostics().subscribe();

        loop {
            let reply = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => match self.handle_line(&line).await {
                        Some(reply) => reply,
                        None => continue,
                    },
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => Reply::Diagnostic { event },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "diagnostics lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            write_reply(&mut writer, &reply).await?;
        }

        writer.flush().await
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(reply).map_err(std::io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
