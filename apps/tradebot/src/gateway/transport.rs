//! The physical connection: a reader task feeding frames inward and a writer
//! task draining the outbound request queue.
//!
//! Frames are newline-delimited JSON objects.

use std::io;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tradebot_common::Request;

use crate::error::{BotError, Result};

use super::signal::Quit;

/// Capacity of the outbound request queue. Producers wait once it is full.
pub const REQUEST_CAPACITY: usize = 10;

/// Capacity of the raw inbound frame queue between reader and dispatcher.
pub const FRAME_CAPACITY: usize = 16;

/// Longest inbound frame accepted, not counting the newline. Longer lines
/// are discarded.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Producer side of the outbound request queue.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::Sender<Request>,
}

/// Create the bounded outbound request queue.
pub fn request_channel() -> (RequestSender, mpsc::Receiver<Request>) {
    let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
    (RequestSender { tx }, rx)
}

impl RequestSender {
    /// Queue a request for the writer. Waits while the queue is full; never
    /// drops.
    pub async fn send(&self, request: Request) -> Result<()> {
        tracing::debug!("-> {request}");
        self.tx.send(request).await.map_err(|_| BotError::SessionClosed)
    }

    /// Queue without waiting. Fails if the queue is full or closed.
    pub(crate) fn try_send(&self, request: Request) -> Result<()> {
        tracing::debug!("-> {request}");
        self.tx.try_send(request).map_err(|_| BotError::SessionClosed)
    }
}

/// Read frames off the connection and hand them to the dispatcher until the
/// connection closes or quit is signalled. Frames that are oversized or not
/// UTF-8 are logged and skipped.
pub async fn run_reader<R>(reader: R, frames: mpsc::Sender<String>, quit: Quit) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    let result = loop {
        let frame = tokio::select! {
            _ = quit.wait() => break Ok(()),
            frame = read_frame(&mut reader, &mut buf) => frame,
        };

        match frame {
            Ok(RawFrame::Line) => match String::from_utf8(std::mem::take(&mut buf)) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if frames.send(line).await.is_err() {
                        break Ok(());
                    }
                }
                Err(e) => tracing::warn!(%e, "skipping frame that is not utf-8"),
            },
            Ok(RawFrame::Oversized) => {
                tracing::warn!(limit = MAX_FRAME_LEN, "skipping oversized frame");
            }
            Ok(RawFrame::Eof) => {
                tracing::info!("connection closed by server");
                break Ok(());
            }
            Err(e) => {
                tracing::error!(?e, "connection read error");
                break Err(BotError::Io(e));
            }
        }
    };

    tracing::debug!("reader exited");
    result
}

#[derive(Debug, PartialEq, Eq)]
enum RawFrame {
    /// `buf` holds one line, newline stripped.
    Line,
    Oversized,
    Eof,
}

/// Read the next line into `buf`, reading at most `MAX_FRAME_LEN` bytes of
/// it into memory.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<RawFrame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_FRAME_LEN as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(RawFrame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(RawFrame::Line);
    }
    if buf.len() > MAX_FRAME_LEN {
        buf.clear();
        discard_line(reader).await?;
        return Ok(RawFrame::Oversized);
    }
    // Last line before EOF, without a newline.
    Ok(RawFrame::Line)
}

/// Skip input up to and including the next newline.
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        let len = available.len();
        if len == 0 {
            return Ok(());
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => reader.consume(len),
        }
    }
}

/// Write queued requests to the connection in the order they were queued.
pub async fn run_writer<W>(mut writer: W, mut requests: mpsc::Receiver<Request>, quit: Quit) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = quit.wait() => break,
            request = requests.recv() => {
                let Some(request) = request else { break };
                let mut frame = serde_json::to_vec(&request)?;
                frame.push(b'\n');
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    tracing::error!(?e, "connection write error");
                    quit.trigger();
                    return Err(e);
                }
            }
        }
    }

    let _ = writer.shutdown().await;
    tracing::debug!("writer exited");
    Ok(())
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
