//! Per-connection request loop.

use crate::bridge::EventBridge;
use crate::hub::{IdleHub, Subscription};
use encore_core::Backend;
use encore_protocol::{
    encode, Dispatcher, Frame, Outcome, ProtocolSettings, SessionId, SessionState, Subsystem,
};
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tokio::sync::{oneshot, watch};

/// State shared by every connection.
pub struct Shared {
    pub dispatcher: Arc<Dispatcher>,
    pub hub: Arc<IdleHub>,
    pub timeout: Duration,
}

impl Shared {
    /// Wires `backend` events into a fresh hub and builds the dispatcher.
    pub fn new(backend: Backend, protocol: ProtocolSettings, timeout: Duration) -> Self {
        let hub = Arc::new(IdleHub::new());
        backend
            .events
            .subscribe(Arc::new(EventBridge::new(Arc::clone(&hub))));
        let dispatcher = Dispatcher::new(backend, protocol, hub.clone());
        Self {
            dispatcher: Arc::new(dispatcher),
            hub,
            timeout,
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hangup {
    ClientClosed,
    CloseCommand,
    TimedOut,
    IdleViolation,
    Rejected,
    Shutdown,
}

enum Flow {
    Continue,
    Hangup(Hangup),
}

/// One input line with the terminator removed.
enum Line {
    Text(String),
    Eof,
    Garbage,
}

/// Buffered line reader that survives being cancelled mid-line.
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> io::Result<Line> {
        // read_until keeps partial input in `buf` if the future is dropped.
        let read = self.inner.read_until(b'\n', &mut self.buf).await?;
        if read == 0 || self.buf.last() != Some(&b'\n') {
            return Ok(Line::Eof);
        }
        let mut raw = std::mem::take(&mut self.buf);
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        Ok(match String::from_utf8(raw) {
            Ok(text) => Line::Text(text),
            Err(_) => Line::Garbage,
        })
    }
}

/// Every command starts with a lowercase letter in the first column;
/// anything else (an HTTP request line, an indented command) is not a client
/// we understand. Blank lines pass so the dispatcher can report them.
fn plausible(line: &str) -> bool {
    let trimmed = line.trim_start_matches([' ', '\t']);
    trimmed.is_empty() || line.starts_with(|c: char| c.is_ascii_lowercase())
}

struct Connection<S> {
    id: SessionId,
    peer: String,
    reader: LineReader<tokio::io::ReadHalf<S>>,
    writer: WriteHalf<S>,
    state: SessionState,
    shared: Arc<Shared>,
}

/// Serves one client until it leaves, misbehaves, times out, or the server
/// shuts down.
pub async fn serve<S>(
    stream: S,
    id: SessionId,
    peer: String,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<Hangup>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    let state = shared.dispatcher.open_session(id);
    shared.hub.register(id);
    let mut conn = Connection {
        id,
        peer,
        reader: LineReader::new(read),
        writer: write,
        state,
        shared,
    };
    tracing::debug!(session = id, peer = %conn.peer, "client connected");

    let result = conn.run(&mut shutdown).await;

    conn.shared.hub.deregister(id);
    conn.shared.dispatcher.close_session(&conn.state);
    match &result {
        Ok(reason) => tracing::debug!(session = id, peer = %conn.peer, ?reason, "client disconnected"),
        Err(e) => tracing::debug!(session = id, peer = %conn.peer, error = %e, "connection failed"),
    }
    result
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) -> io::Result<Hangup> {
        let greeting = format!("{}\n", Dispatcher::greeting());
        self.writer.write_all(greeting.as_bytes()).await?;
        self.writer.flush().await?;

        loop {
            let timeout = self.shared.timeout;
            let line = tokio::select! {
                _ = shutdown.changed() => return Ok(Hangup::Shutdown),
                read = tokio::time::timeout(timeout, self.reader.next_line()) => match read {
                    Err(_) => {
                        tracing::debug!(session = self.id, ?timeout, "inactivity timeout");
                        return Ok(Hangup::TimedOut);
                    }
                    Ok(line) => line?,
                },
            };
            let line = match line {
                Line::Text(line) => line,
                Line::Eof => return Ok(Hangup::ClientClosed),
                Line::Garbage => {
                    tracing::debug!(session = self.id, "request is not valid UTF-8");
                    return Ok(Hangup::Rejected);
                }
            };
            if !plausible(&line) {
                tracing::debug!(session = self.id, peer = %self.peer, "request does not look like a command");
                return Ok(Hangup::Rejected);
            }
            tracing::debug!(session = self.id, request = %line, "request");

            let outcome = self.shared.dispatcher.handle_line(&mut self.state, &line);
            match outcome {
                Outcome::Respond(frames) => self.send(&frames).await?,
                Outcome::Pending => {}
                Outcome::Close => return Ok(Hangup::CloseCommand),
                Outcome::Idle(wanted) => {
                    if let Flow::Hangup(reason) = self.idle(wanted, shutdown).await? {
                        return Ok(reason);
                    }
                }
            }
        }
    }

    async fn send(&mut self, frames: &[Frame]) -> io::Result<()> {
        if let Some(Frame::Line(last)) = frames.last() {
            tracing::debug!(session = self.id, response = %last, frames = frames.len(), "response");
        }
        self.writer.write_all(&encode(frames)).await?;
        self.writer.flush().await
    }

    /// Parks until a wanted subsystem changes or the client sends `noidle`.
    /// Idle sessions are not subject to the inactivity timeout.
    async fn idle(
        &mut self,
        wanted: BTreeSet<Subsystem>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> io::Result<Flow> {
        let mut wake: oneshot::Receiver<BTreeSet<Subsystem>> =
            match self.shared.hub.subscribe(self.id, wanted) {
                Subscription::Ready(changed) => {
                    self.send(&Dispatcher::idle_reply(&changed)).await?;
                    return Ok(Flow::Continue);
                }
                Subscription::Parked(rx) => rx,
            };
        tracing::trace!(session = self.id, "idling");

        let line = tokio::select! {
            _ = shutdown.changed() => return Ok(Flow::Hangup(Hangup::Shutdown)),
            changed = &mut wake => {
                return match changed {
                    Ok(changed) => {
                        self.send(&Dispatcher::idle_reply(&changed)).await?;
                        Ok(Flow::Continue)
                    }
                    Err(_) => Ok(Flow::Hangup(Hangup::Shutdown)),
                };
            }
            line = self.reader.next_line() => line?,
        };

        let mut changed = self.shared.hub.unsubscribe(self.id);
        // A wakeup may have fired just before the client's line arrived.
        if let Ok(fired) = wake.try_recv() {
            changed.extend(fired);
        }

        match line {
            Line::Text(line) if line == "noidle" => {
                tracing::debug!(session = self.id, request = %line, "request");
                self.send(&Dispatcher::idle_reply(&changed)).await?;
                Ok(Flow::Continue)
            }
            Line::Text(line) => {
                tracing::debug!(session = self.id, request = %line, "command sent while idle; closing");
                Ok(Flow::Hangup(Hangup::IdleViolation))
            }
            Line::Eof => Ok(Flow::Hangup(Hangup::ClientClosed)),
            Line::Garbage => Ok(Flow::Hangup(Hangup::Rejected)),
        }
    }
}
