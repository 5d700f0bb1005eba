//! IMAP IDLE command support (RFC 2177).
//!
//! IDLE is the one command whose `send_wait` does real work: it holds the
//! pipeline open from the server's `+ idling` continuation until the caller
//! asks to leave, then writes `DONE`.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{Command, Completion};
use crate::serializer::Serializer;
use crate::{Error, Result};

const WAITING: u8 = 0;
const IDLING: u8 = 1;
const DONE: u8 = 2;

/// Signals shared between the session (continuation) and the caller (exit).
///
/// The phase only moves forward: waiting for `+`, idling, done.
#[derive(Debug, Default)]
pub(crate) struct IdleGate {
    started: Notify,
    exit: CancellationToken,
    phase: AtomicU8,
}

impl IdleGate {
    /// Marks the server as idling. The response timer stays quiet until
    /// `DONE` is written.
    ///
    /// Returns `false` if IDLE was already accepted or finished.
    pub(crate) fn start(&self) -> bool {
        let started = self
            .phase
            .compare_exchange(WAITING, IDLING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if started {
            self.started.notify_one();
        }
        started
    }

    pub(crate) fn is_idling(&self) -> bool {
        self.phase.load(Ordering::Acquire) == IDLING
    }

    fn finish(&self) {
        self.phase.store(DONE, Ordering::Release);
    }

    pub(crate) fn request_exit(&self) {
        self.exit.cancel();
    }
}

impl Command {
    /// Asks a running IDLE command to send `DONE`.
    ///
    /// May be called before the server has accepted IDLE; `DONE` is then
    /// written as soon as the continuation arrives.
    ///
    /// # Errors
    ///
    /// Returns a usage error if this is not an IDLE command.
    pub fn exit_idle(&self) -> Result<()> {
        let Some(idle) = &self.inner.idle else {
            return Err(Error::Usage(format!("{self} is not an IDLE command")));
        };
        tracing::debug!(command = %self, "exit from IDLE requested");
        idle.request_exit();
        Ok(())
    }

    /// Returns `true` while the server has accepted IDLE and `DONE` has not
    /// been written yet.
    #[must_use]
    pub fn is_idling(&self) -> bool {
        self.inner.idle.as_ref().is_some_and(IdleGate::is_idling)
    }

    pub(super) async fn hold_idle<S: Serializer>(
        &self,
        idle: &IdleGate,
        ser: &mut S,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // The server must see the request before it can answer with `+`.
        ser.flush().await?;

        let mut rx = self.inner.completion.subscribe();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::Cancelled(format!("waiting for {self} to start was cancelled")));
            }
            _ = rx.wait_for(Completion::is_signalled) => return Ok(()),
            () = idle.started.notified() => {}
        }
        tracing::debug!(command = %self, "server is idling");

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::Cancelled(format!("{self} was cancelled while idling")));
            }
            _ = rx.wait_for(Completion::is_signalled) => return Ok(()),
            () = idle.exit.cancelled() => {}
        }

        ser.push_raw(b"DONE").await?;
        ser.push_eol().await?;
        ser.flush().await?;
        idle.finish();
        self.restart_timer();
        tracing::debug!(command = %self, "sent DONE");
        Ok(())
    }
}
