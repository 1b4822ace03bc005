//! # RESP Connection
//!
//! A single long-lived TCP connection to the backing store.
//!
//! ## Design Principles
//!
//! 1. **Shared Handle**: One `Connection` is shared by every in-flight
//!    operation; an async mutex pairs each request with its reply.
//! 2. **Buffer Reuse**: Read and write buffers live for the connection's
//!    lifetime.
//! 3. **Single Shot**: No retries, reconnects or timeouts. A broken connection
//!    reports errors until the caller builds a new one.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use ekv_common::{Command, EkvError, EkvResult, Frame, FrameDecoder};

use crate::config::ClientConfig;
use crate::executor::Executor;

const READ_BUFFER_CAPACITY: usize = 16 * 1024;
const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

struct Inner {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    decoder: FrameDecoder,
    // Replies the store still owes, including those of callers that went away.
    unread_replies: usize,
    // A request was cut off mid-write or a reply could not be parsed.
    broken: bool,
}

impl Inner {
    async fn write_command(&mut self, command: &Command) -> EkvResult<()> {
        self.write_buf.clear();
        command.encode(&mut self.write_buf);
        self.broken = true;
        self.stream.write_all(&self.write_buf).await?;
        self.broken = false;
        self.unread_replies += 1;
        Ok(())
    }

    async fn read_reply(&mut self) -> EkvResult<Frame> {
        loop {
            match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(frame)) => {
                    self.unread_replies -= 1;
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(err) => {
                    self.decoder.reset();
                    self.broken = true;
                    return Err(err);
                }
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(EkvError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "store closed the connection",
                )));
            }
        }
    }
}

/// RESP client connection implementing `Executor`.
pub struct Connection {
    inner: Mutex<Inner>,
    peer: String,
}

impl Connection {
    /// Connects, authenticates and selects the configured database.
    pub async fn connect(config: &ClientConfig) -> EkvResult<Self> {
        let peer = config.addr();
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .inspect_err(|err| tracing::warn!(peer = %peer, error = %err, "store connect failed"))?;
        stream.set_nodelay(true)?;
        SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_IDLE))?;

        let connection = Connection {
            inner: Mutex::new(Inner {
                stream,
                read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
                write_buf: BytesMut::new(),
                decoder: FrameDecoder::new(),
                unread_replies: 0,
                broken: false,
            }),
            peer,
        };

        if let Some(password) = &config.password {
            let auth = match &config.username {
                Some(user) => Command::new("AUTH").arg(user).arg(password),
                None => Command::new("AUTH").arg(password),
            };
            expect_ok(connection.call(auth).await?, "AUTH")?;
        }
        if config.db != 0 {
            expect_ok(
                connection.call(Command::new("SELECT").arg(config.db.to_string())).await?,
                "SELECT",
            )?;
        }

        tracing::debug!(peer = %connection.peer, db = config.db, "connected to store");
        Ok(connection)
    }

    /// `host:port` of the store.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

fn expect_ok(reply: Frame, command: &str) -> EkvResult<()> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(EkvError::protocol(format!("{command} answered with {}", reply.kind())))
    }
}

#[async_trait]
impl Executor for Connection {
    async fn execute(&self, command: Command) -> EkvResult<Frame> {
        let mut inner = self.inner.lock().await;
        if inner.broken {
            return Err(EkvError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "reply stream is out of sync with the store",
            )));
        }
        // Replies to cancelled requests arrive first, in order.
        while inner.unread_replies > 0 {
            let stale = inner.read_reply().await?;
            tracing::debug!(peer = %self.peer, reply = stale.kind(), "discarded reply of abandoned request");
        }

        tracing::debug!(peer = %self.peer, command = %command.name(), "execute");
        inner.write_command(&command).await?;
        inner.read_reply().await
    }
}
