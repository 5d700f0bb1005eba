//! Literal continuation handshake and chunked upload.
//!
//! After a literal's `{n}` marker is flushed the sender parks on a
//! [`LiteralGate`] until the session relays the server's `+` continuation.
//! The payload is then streamed in chunks sized from the response timeout,
//! so that a slow link still produces timer-resetting progress inside every
//! timeout window.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::Literal;
use crate::serializer::Serializer;
use crate::{Error, Result};

/// Ceiling for the chunk size, in kilobytes.
const MAX_CHUNK_KB: u64 = 1024;

/// Returns the literal chunk size in bytes for a response timeout.
///
/// Assuming roughly 1 KB/s of throughput, the chunk size in kilobytes is the
/// largest power of two not exceeding the timeout in whole seconds (minimum
/// 1 KB, capped at 1 MB).
///
/// ```
/// use std::time::Duration;
/// use tidings_imap::command::literal_chunk_size;
///
/// assert_eq!(literal_chunk_size(Duration::from_secs(30)), 16 * 1024);
/// assert_eq!(literal_chunk_size(Duration::from_secs(60)), 32 * 1024);
/// ```
#[must_use]
pub fn literal_chunk_size(response_timeout: Duration) -> usize {
    let secs = response_timeout.as_secs();
    let kb = if secs == 0 {
        1
    } else {
        (1_u64 << secs.ilog2()).min(MAX_CHUNK_KB)
    };
    usize::try_from(kb * 1024).unwrap_or(usize::MAX)
}

/// Single-permit gate a suspended literal send waits on.
#[derive(Debug)]
pub(crate) struct LiteralGate {
    ready: Notify,
    pending: AtomicUsize,
    cancel: CancellationToken,
}

impl LiteralGate {
    pub(crate) fn new(literals: usize) -> Self {
        Self {
            ready: Notify::new(),
            pending: AtomicUsize::new(literals),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns `true` while a literal still waits to be streamed.
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0 && !self.cancel.is_cancelled()
    }

    /// Lets the suspended sender proceed. The permit is kept if nobody is
    /// waiting yet.
    pub(crate) fn open(&self) {
        self.ready.notify_one();
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for the continuation. Returns `false` if the gate was cancelled.
    pub(crate) async fn wait(&self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = self.ready.notified() => true,
        }
    }

    pub(crate) fn finish_one(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// Streams exactly `literal.len()` bytes, calling `on_chunk` with the running
/// total after every chunk. The source reader is dropped on every exit path.
pub(crate) async fn stream<S, F>(
    ser: &mut S,
    literal: &Literal,
    chunk_size: usize,
    cancel: &CancellationToken,
    mut on_chunk: F,
) -> Result<u64>
where
    S: Serializer,
    F: FnMut(u64),
{
    let mut reader = literal.open().await?.take(literal.len());
    let mut buf = vec![0_u8; chunk_size];
    let mut sent = 0_u64;

    loop {
        let n = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled("literal upload cancelled".to_string())),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled("literal upload cancelled".to_string())),
            written = ser.push_literal_data(&buf[..n]) => written?,
        }
        sent += n as u64;
        on_chunk(sent);
    }

    if sent != literal.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("literal source ended after {sent} of {} bytes", literal.len()),
        )
        .into());
    }
    Ok(sent)
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
    use proptest::prelude::*;

    use super::*;
    use crate::serializer::StreamSerializer;

    #[test]
    fn test_chunk_size_examples() {
        assert_eq!(literal_chunk_size(Duration::from_secs(30)), 16 * 1024);
        assert_eq!(literal_chunk_size(Duration::from_secs(60)), 32 * 1024);
        assert_eq!(literal_chunk_size(Duration::from_secs(1)), 1024);
        assert_eq!(literal_chunk_size(Duration::from_secs(32)), 32 * 1024);
        assert_eq!(literal_chunk_size(Duration::ZERO), 1024);
        assert_eq!(literal_chunk_size(Duration::from_secs(86_400)), 1024 * 1024);
    }

    proptest! {
        #[test]
        fn prop_chunk_size_is_largest_power_of_two(secs in 1_u64..1024) {
            let kb = (literal_chunk_size(Duration::from_secs(secs)) / 1024) as u64;
            prop_assert!(kb.is_power_of_two());
            prop_assert!(kb <= secs);
            prop_assert!(kb * 2 > secs);
        }
    }

    #[tokio::test]
    async fn test_gate_keeps_early_permit() {
        let gate = LiteralGate::new(1);
        gate.open();
        assert!(gate.wait().await);
    }

    #[tokio::test]
    async fn test_cancelled_gate_releases_waiter() {
        let gate = LiteralGate::new(1);
        gate.cancel();
        assert!(!gate.wait().await);
        assert!(!gate.is_pending());
    }

    #[test]
    fn test_pending_count() {
        let gate = LiteralGate::new(2);
        assert!(gate.is_pending());
        gate.finish_one();
        assert!(gate.is_pending());
        gate.finish_one();
        assert!(!gate.is_pending());
        gate.finish_one();
        assert!(!gate.is_pending());
    }

    #[tokio::test]
    async fn test_stream_in_chunks() {
        let literal = Literal::new(vec![b'x'; 2500]);
        let mut ser = StreamSerializer::new(Vec::new());
        let mut progress = Vec::new();

        let sent = stream(&mut ser, &literal, 1024, &CancellationToken::new(), |n| {
            progress.push(n);
        })
        .await
        .unwrap();

        assert_eq!(sent, 2500);
        assert_eq!(progress, vec![1024, 2048, 2500]);
        assert_eq!(ser.into_inner().len(), 2500);
    }

    #[tokio::test]
    async fn test_stream_stops_when_cancelled() {
        let literal = Literal::new(vec![b'x'; 10]);
        let mut ser = StreamSerializer::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = stream(&mut ser, &literal, 1024, &cancel, |_| {}).await;
        assert!(matches!(result, Err(Error::Cancelled(_))));
        assert!(ser.into_inner().is_empty());
    }
}
