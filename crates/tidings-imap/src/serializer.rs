//! Outbound wire serialization.
//!
//! A [`Serializer`] accepts pre-encoded request tokens, literal payload
//! chunks, and explicit flush requests. Commands only ever talk to this
//! trait; [`StreamSerializer`] is the buffered implementation over any Tokio
//! writer.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Default buffer size for writing.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Sink for outbound request tokens.
///
/// Tokens may be buffered until [`flush`](Serializer::flush) is called.
/// Failures are plain I/O errors so they propagate to the session unchanged.
pub trait Serializer: Send {
    /// Appends an already-encoded token (atom, quoted string, literal marker).
    fn push_raw(&mut self, token: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Appends a single separator.
    fn push_space(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        self.push_raw(b" ")
    }

    /// Terminates the current line.
    fn push_eol(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        self.push_raw(b"\r\n")
    }

    /// Writes raw literal bytes with no framing.
    fn push_literal_data(&mut self, data: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Writes out everything buffered so far and flushes the transport.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Buffered serializer over an async writer.
pub struct StreamSerializer<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W> StreamSerializer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new serializer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Returns the bytes queued but not yet written.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Gets a reference to the underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the serializer and returns the inner writer.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_buffered(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        Ok(())
    }
}

impl<W> Serializer for StreamSerializer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn push_raw(&mut self, token: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(token);
        Ok(())
    }

    async fn push_literal_data(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_buffered().await?;
        self.writer.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.write_buffered().await?;
        self.writer.flush().await
    }
}

impl<W> std::fmt::Debug for StreamSerializer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSerializer")
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_tokens_are_buffered_until_flush() {
        let mut ser = StreamSerializer::new(Vec::new());
        ser.push_raw(b"A001").await.unwrap();
        ser.push_space().await.unwrap();
        ser.push_raw(b"NOOP").await.unwrap();
        ser.push_eol().await.unwrap();

        assert!(ser.get_ref().is_empty());
        assert_eq!(ser.buffered(), b"A001 NOOP\r\n");

        ser.flush().await.unwrap();
        assert!(ser.buffered().is_empty());
        assert_eq!(ser.into_inner(), b"A001 NOOP\r\n");
    }

    #[tokio::test]
    async fn test_literal_data_writes_through() {
        let mock = Builder::new()
            .write(b"A001 APPEND INBOX {5}\r\n")
            .write(b"hello")
            .write(b"\r\n")
            .build();
        let mut ser = StreamSerializer::new(mock);

        ser.push_raw(b"A001 APPEND INBOX {5}").await.unwrap();
        ser.push_eol().await.unwrap();
        ser.flush().await.unwrap();
        ser.push_literal_data(b"hello").await.unwrap();
        ser.push_eol().await.unwrap();
        ser.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();
        let mut ser = StreamSerializer::new(mock);

        ser.push_raw(b"A001 NOOP\r\n").await.unwrap();
        let err = ser.flush().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
