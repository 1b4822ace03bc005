//! # Connection Handling
//!
//! Accept loop and per-connection request loop.
//!
//! ## Design Principles
//!
//! 1. **Pipelining**: Every complete request in the read buffer is answered
//!    before the next read, replies are flushed in one write.
//! 2. **Buffer Reuse**: One read and one write buffer per connection.
//! 3. **Local Failures**: A protocol error closes only the offending connection.

use std::fmt::Write as _;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use socket2::{Domain, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ekv_common::{EkvResult, Frame, FrameDecoder};
use ekv_engine::{KVEngine, MemoryEngine};

use crate::metrics::Metrics;

const READ_BUFFER_CAPACITY: usize = 16 * 1024;
const LISTEN_BACKLOG: i32 = 1024;

/// State shared by every connection.
pub struct ServerState {
    engine: Arc<MemoryEngine>,
    metrics: Metrics,
}

impl ServerState {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        ServerState {
            engine,
            metrics: Metrics::new(),
        }
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs one request and records it.
    pub fn dispatch(&self, args: &[Bytes]) -> Frame {
        let started = Instant::now();
        self.metrics.record_command_start();

        let reply = match args.first() {
            Some(name) if name.eq_ignore_ascii_case(b"info") => match self.info() {
                Ok(text) => Frame::Bulk(Bytes::from(text)),
                Err(err) => Frame::error(format!("ERR {err}")),
            },
            _ => ekv_engine::execute(self.engine.as_ref(), args),
        };

        let failed = matches!(reply, Frame::Error(_));
        self.metrics.record_command_end(started.elapsed(), failed);
        reply
    }

    fn info(&self) -> EkvResult<String> {
        let mut out = String::from("# Server\r\n");
        out.push_str("engine:edgekv-memory\r\n");
        let _ = write!(out, "server_version:{}\r\n", env!("CARGO_PKG_VERSION"));
        out.push_str("\r\n");
        out.push_str(&self.metrics.render_info());
        let _ = write!(out, "\r\n# Keyspace\r\ndb0:keys={}\r\n", self.engine.len()?);
        Ok(out)
    }
}

/// Binds a listener with `SO_REUSEADDR` so restarts do not wait on `TIME_WAIT`.
pub fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

/// Accepts connections until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                return Ok(());
            }
            accept = listener.accept() => {
                let (stream, peer) = accept?;
                state.metrics.record_connection();
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, state).await {
                        tracing::debug!(%peer, error = %err, "connection closed with error");
                    }
                });
            }
        }
    }
}

/// Serves one client until it disconnects or sends a malformed request.
pub async fn handle_connection(mut stream: TcpStream, state: Arc<ServerState>) -> EkvResult<()> {
    stream.set_nodelay(true)?;
    let mut read_buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    let mut write_buf = BytesMut::new();
    let mut decoder = FrameDecoder::new();

    loop {
        loop {
            let frame = match decoder.decode(&mut read_buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    Frame::error(format!("ERR Protocol error: {err}")).encode(&mut write_buf);
                    stream.write_all(&write_buf).await?;
                    return Err(err);
                }
            };
            let reply = match request_args(frame) {
                Some(args) => state.dispatch(&args),
                None => Frame::error("ERR Protocol error: expected an array of bulk strings"),
            };
            reply.encode(&mut write_buf);
        }

        if !write_buf.is_empty() {
            stream.write_all(&write_buf).await?;
            write_buf.clear();
        }

        if stream.read_buf(&mut read_buf).await? == 0 {
            return Ok(());
        }
    }
}

fn request_args(frame: Frame) -> Option<Vec<Bytes>> {
    let Frame::Array(items) = frame else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Frame::Bulk(bytes) => Some(bytes),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn info_reports_engine_and_keyspace() {
        let state = ServerState::new(Arc::new(MemoryEngine::new()));
        state.dispatch(&args(&["SET", "a", "1"]));
        state.dispatch(&args(&["NOPE"]));

        let Frame::Bulk(info) = state.dispatch(&args(&["info"])) else {
            panic!("INFO must reply with a bulk string");
        };
        let info = String::from_utf8(info.to_vec()).unwrap();
        assert!(info.contains("engine:edgekv-memory"));
        assert!(info.contains("db0:keys=1"));
        assert!(info.contains("total_error_replies:1"));
        // INFO itself is counted once it completes.
        assert_eq!(state.metrics().snapshot().commands_total, 3);
    }

    #[test]
    fn request_args_require_bulk_array() {
        let frame = Frame::Array(vec![Frame::bulk("GET"), Frame::bulk("k")]);
        assert_eq!(request_args(frame).unwrap(), args(&["GET", "k"]));
        assert!(request_args(Frame::Simple("PING".into())).is_none());
        assert!(request_args(Frame::Array(vec![Frame::Integer(1)])).is_none());
    }
}
