//! Per-connection I/O tasks.
//!
//! Each admitted connection gets two tasks: a writer draining the player's
//! outbound queue onto the socket, and a reader turning inbound lines into
//! action dispatches. Pushes from world operations only ever enqueue, so a
//! slow client never stalls the thread that produced the notification.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::ids::PlayerId;
use crate::player::Player;
use crate::protocol::{parse_command, Outbound};

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024;

/// Buffered reader splitting a byte stream on `\n`.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_line_len: usize,
    eof: bool,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_MAX_LINE_LEN),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            eof: false,
        }
    }

    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Read one line without its `\n` or `\r\n` terminator.
    ///
    /// An unterminated line left when the peer closes is returned as a last
    /// line; after that `Ok(None)` signals the end of the stream. Lines longer
    /// than the configured maximum are an `InvalidData` error.
    pub async fn read_line(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(i) = memchr(b'\n', &self.buf) {
                if i > self.max_line_len {
                    return Err(too_long());
                }
                let raw = self.buf.split_to(i + 1).freeze();
                return Ok(Some(trim_crlf(raw)));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split().freeze();
                return Ok(Some(trim_crlf(rest)));
            }

            if self.buf.len() > self.max_line_len {
                return Err(too_long());
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }
}

fn too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "line too long")
}

fn trim_crlf(mut line: Bytes) -> Bytes {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    line.truncate(end);
    line
}

/// Drain `rx` onto `writer` one line per notification. Ends, closing the
/// write half, once every sender is gone or the peer stops accepting data.
pub(crate) async fn write_loop<W>(mut writer: W, mut rx: UnboundedReceiver<Outbound>, player: PlayerId)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    while let Some(msg) = rx.recv().await {
        let mut line = msg.to_string();
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(target: "net", "Write to player {} failed: {}", player, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!(target: "net", "Writer for player {} finished", player);
}

/// Feed inbound lines to the player's action dispatcher until the peer goes
/// away or the player is destroyed, then tear the player down.
pub(crate) async fn read_loop(player: Arc<Player>, mut lines: LineReader<BoxedReader>) {
    let player = Disconnect(player);
    loop {
        if !player.is_alive() {
            break;
        }
        let line = tokio::select! {
            line = lines.read_line() => line,
            _ = player.stopped() => break,
        };
        match line {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                let Some((trigger, arg)) = parse_command(&text) else {
                    continue;
                };
                let Some(server) = player.server() else {
                    break;
                };
                server.do_action(trigger, player.id(), arg);
            }
            Ok(None) => {
                debug!(target: "net", "Player {} disconnected", player.id());
                break;
            }
            Err(e) => {
                warn!(target: "net", "Reading from player {} failed: {}", player.id(), e);
                break;
            }
        }
    }
}

/// Tears the player down when the reader ends, including by unwinding.
struct Disconnect(Arc<Player>);

impl std::ops::Deref for Disconnect {
    type Target = Arc<Player>;

    fn deref(&self) -> &Arc<Player> {
        &self.0
    }
}

impl Drop for Disconnect {
    fn drop(&mut self) {
        self.0.disconnected();
    }
}
