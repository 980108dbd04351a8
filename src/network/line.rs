// src/network/line.rs
//! Newline-framed text channel
//!
//! Every message of the swarm protocol is one ASCII line. [`LineChannel`]
//! pairs a buffered line reader with a writer over any async byte stream,
//! so the same code runs over TCP and over in-memory pipes in tests.

use std::io;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::UnboundedReceiver;

/// Line reader half of a [`LineChannel`]
pub type LineReader<R> = Lines<BufReader<R>>;

/// Bidirectional line-oriented channel
pub struct LineChannel<R, W> {
    lines: LineReader<R>,
    writer: W,
}

impl LineChannel<OwnedReadHalf, OwnedWriteHalf> {
    /// Wraps a connected TCP stream
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        LineChannel::new(reader, writer)
    }
}

impl<S: AsyncRead + AsyncWrite> LineChannel<ReadHalf<S>, WriteHalf<S>> {
    /// Wraps any bidirectional stream (e.g. `tokio::io::duplex`)
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        LineChannel::new(reader, writer)
    }
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Builds a channel from separate reader and writer halves
    pub fn new(reader: R, writer: W) -> Self {
        LineChannel {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Writes `line` followed by `\n` and flushes
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        write_line(&mut self.writer, line).await
    }

    /// Reads the next line without its terminator
    ///
    /// Returns `Ok(None)` at end of stream. Cancel safe, so it can be
    /// raced in `tokio::select!`.
    pub async fn recv_line(&mut self) -> io::Result<Option<String>> {
        let line = self.lines.next_line().await?;
        Ok(line.map(strip_cr))
    }

    /// Splits the channel so reading and writing can move to separate tasks
    pub fn into_parts(self) -> (LineReader<R>, W) {
        (self.lines, self.writer)
    }
}

/// Reads the next line from a split reader, as [`LineChannel::recv_line`] does
pub async fn next_line<R: AsyncRead + Unpin>(lines: &mut LineReader<R>) -> io::Result<Option<String>> {
    Ok(lines.next_line().await?.map(strip_cr))
}

/// Drains `outbound` into `writer` until every sender is gone
///
/// This task is the only writer of its connection. Writing `bye` ends the
/// task after the line is flushed, and the write side is shut down.
pub async fn write_lines<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: UnboundedReceiver<String>,
) -> io::Result<()> {
    while let Some(line) = outbound.recv().await {
        write_line(&mut writer, &line).await?;
        if line.eq_ignore_ascii_case("bye") {
            break;
        }
    }
    writer.shutdown().await
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}
