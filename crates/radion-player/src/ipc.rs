/// mpv control-socket client.
///
/// Every call opens a fresh connection, writes one JSON command line,
/// optionally reads one reply, and closes.  No connection is kept between
/// calls, so a restarted or briefly busy engine never leaves a stale handle
/// behind.  Each round trip is bounded by `timeout`.
///
/// Platform notes:
/// - Unix:    Unix domain socket at `address`
/// - Windows: Named pipe `\\.\pipe\<name>`
use std::time::Duration;

use radion_proto::protocol::EngineCommand;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("cannot connect to mpv socket {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mpv socket write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("mpv socket read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("mpv socket closed before replying")]
    Closed,
    #[error("mpv socket round trip exceeded {0:?}")]
    Timeout(Duration),
}

/// Cheap to clone; holds only the address and limits.
#[derive(Debug, Clone)]
pub struct IpcClient {
    address: String,
    timeout: Duration,
    response_buffer: usize,
}

impl IpcClient {
    pub fn new(address: impl Into<String>, timeout: Duration, response_buffer: usize) -> Self {
        Self {
            address: address.into(),
            timeout,
            response_buffer: response_buffer.max(1),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fire-and-forget write.  Failures are logged and reported as `false`.
    pub async fn send(&self, command: &EngineCommand) -> bool {
        match self.write_command(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("ipc: {} ({})", e, command.to_line().trim());
                false
            }
        }
    }

    /// Write `command` and return the raw reply with null padding stripped.
    pub async fn query(&self, command: &EngineCommand) -> Result<Vec<u8>, IpcError> {
        let line = command.to_line();
        let limit = self.response_buffer;
        let reply = self
            .bounded(async {
                let mut stream = self.connect().await?;
                write_line(&mut stream, &line).await?;
                read_reply(&mut stream, limit).await
            })
            .await?;
        debug!("ipc: {} -> {} bytes", line.trim(), reply.len());
        Ok(reply)
    }

    /// True once the engine accepts connections.
    pub async fn probe(&self) -> bool {
        self.bounded(self.connect()).await.is_ok()
    }

    async fn write_command(&self, command: &EngineCommand) -> Result<(), IpcError> {
        let line = command.to_line();
        self.bounded(async {
            let mut stream = self.connect().await?;
            write_line(&mut stream, &line).await
        })
        .await?;
        debug!("ipc: sent {}", line.trim());
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, IpcError>
    where
        F: std::future::Future<Output = Result<T, IpcError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| IpcError::Timeout(self.timeout))?
    }

    #[cfg(unix)]
    async fn connect(&self) -> Result<UnixStream, IpcError> {
        UnixStream::connect(&self.address)
            .await
            .map_err(|source| IpcError::Connect {
                address: self.address.clone(),
                source,
            })
    }

    #[cfg(windows)]
    async fn connect(&self) -> Result<tokio::net::windows::named_pipe::NamedPipeClient, IpcError> {
        ClientOptions::new()
            .open(&self.address)
            .map_err(|source| IpcError::Connect {
                address: self.address.clone(),
                source,
            })
    }
}

async fn write_line<S>(stream: &mut S, line: &str) -> Result<(), IpcError>
where
    S: AsyncWrite + Unpin,
{
    stream
        .write_all(line.as_bytes())
        .await
        .map_err(IpcError::Write)?;
    stream.flush().await.map_err(IpcError::Write)
}

/// Read into a buffer of `limit` bytes until it holds a complete reply line,
/// fills up, or the engine closes the connection.
async fn read_reply<S>(stream: &mut S, limit: usize) -> Result<Vec<u8>, IpcError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = stream
            .read(&mut buf[filled..])
            .await
            .map_err(IpcError::Read)?;
        if n == 0 {
            break;
        }
        filled += n;
        if holds_reply(&buf[..filled]) {
            break;
        }
    }
    if filled == 0 {
        return Err(IpcError::Closed);
    }
    buf.truncate(filled);
    let end = buf.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    buf.truncate(end);
    Ok(buf)
}

/// A complete line that is not an unsolicited `{"event": ...}` push.
fn holds_reply(bytes: &[u8]) -> bool {
    // the last segment has no terminator yet
    let complete = bytes.iter().filter(|b| **b == b'\n').count();
    bytes
        .split(|b| *b == b'\n')
        .take(complete)
        .any(|line| !line.is_empty() && !line.starts_with(b"{\"event\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_detection_ignores_events_and_partial_lines() {
        assert!(!holds_reply(b"{\"data\":"));
        assert!(!holds_reply(b"{\"event\":\"idle\"}\n"));
        assert!(!holds_reply(b"{\"event\":\"idle\"}\n{\"data\":1"));
        assert!(holds_reply(b"{\"event\":\"idle\"}\n{\"data\":1}\n"));
        assert!(holds_reply(b"{\"error\":\"success\"}\n"));
    }

    #[tokio::test]
    async fn read_reply_strips_null_padding() {
        let mut input: &[u8] = b"{\"error\":\"success\"}\n\0\0\0";
        let reply = read_reply(&mut input, 64).await.unwrap();
        assert_eq!(reply, b"{\"error\":\"success\"}\n");
    }

    #[tokio::test]
    async fn read_reply_stops_at_buffer_size() {
        let mut input: &[u8] = b"0123456789abcdef";
        let reply = read_reply(&mut input, 8).await.unwrap();
        assert_eq!(reply, b"01234567");
    }

    #[tokio::test]
    async fn read_reply_on_closed_stream() {
        let mut input: &[u8] = b"";
        assert!(matches!(
            read_reply(&mut input, 8).await,
            Err(IpcError::Closed)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn absent_socket_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        let client = IpcClient::new(path.to_string_lossy(), Duration::from_millis(200), 1024);
        assert!(!client.probe().await);
        assert!(!client.send(&EngineCommand::Stop).await);
        assert!(matches!(
            client.query(&EngineCommand::GetMetadata).await,
            Err(IpcError::Connect { .. })
        ));
    }
}
