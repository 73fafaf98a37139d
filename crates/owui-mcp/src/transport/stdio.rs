//! Stdio Transport
//!
//! Standard MCP transport over stdin/stdout. stdout carries protocol
//! messages only; logs go to stderr.

use super::{McpHandler, Transport};
use crate::protocol::{decode_request, JsonRpcError};
use crate::{McpResponse, Session};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Stdio transport - reads JSON-RPC from stdin, writes to stdout
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!("Starting MCP stdio transport");

        let session = Session::new();
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();

        serve_connection(handler.as_ref(), &session, stdin, stdout).await?;

        info!("Stdio transport shutting down");
        Ok(())
    }
}

/// Line-delimited JSON-RPC loop over any reader/writer pair.
///
/// Requests are handled one at a time so responses keep request order.
/// EOF closes the session.
pub async fn serve_connection<H, R, W>(handler: &H, session: &Session, mut reader: R, mut writer: W) -> Result<()>
where
    H: McpHandler + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read request line")?;
        if read == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!(request = %line, "Received request");

                match decode_request(line) {
                    Ok(request) => handler.handle_request(session, request).await,
                    Err(error_response) => {
                        warn!("Rejected malformed message");
                        Some(error_response)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Rejected message that is not valid UTF-8");
                Some(McpResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Invalid UTF-8: {}", e)),
                ))
            }
        };

        let Some(response) = response else {
            continue;
        };

        let response_json = serde_json::to_string(&response)?;
        debug!(response = %response_json, "Sending response");

        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    session.close();
    Ok(())
}
