//! IMAP command engine.
//!
//! A [`Command`] is one request/response cycle: the caller builds it, the
//! session tags and sends it, feeds it server traffic, and the caller waits
//! for the outcome.
//!
//! ```text
//! Created ── assign_tag ──→ Tagged ── send ──→ Sending ──→ AwaitingCompletion
//!                                                │                 │
//!                                     literal {n} + continuation   │
//!                                                                  ▼
//!                                      Completed | Cancelled | TimedOut
//! ```
//!
//! The two drivers only meet through set-once state: the completion channel
//! (status and cancellation cause, each written at most once) and the
//! literal gate. `Command` is a cheap handle, so the session and the caller
//! can each hold a clone.

mod builders;
mod idle;
mod literal;
mod parameter;
mod tag_generator;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::CommandConfig;
use crate::response::{ContinuationResponse, ServerData, StatusResponse};
use crate::serializer::Serializer;
use crate::timer::ResponseTimer;
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

use idle::IdleGate;
use literal::LiteralGate;

pub use literal::literal_chunk_size;
pub use parameter::{Literal, Parameter};
pub use tag_generator::TagGenerator;

static UNASSIGNED: Tag = Tag::Unassigned;

const PHASE_UNSENT: u8 = 0;
const PHASE_SENDING: u8 = 1;
const PHASE_SENT: u8 = 2;

/// Observable lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Built, no tag yet.
    Created,
    /// Tag assigned, not sent.
    Tagged,
    /// Request line being written (possibly parked on a continuation).
    Sending,
    /// Fully sent, waiting for the tagged status.
    AwaitingCompletion,
    /// Tagged status received.
    Completed,
    /// Disconnected, cancelled, or failed on a protocol violation.
    Cancelled,
    /// No traffic within the response timeout.
    TimedOut,
}

impl CommandState {
    /// Returns `true` for the terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::TimedOut)
    }
}

/// Why a command was cancelled. Converted into an [`Error`] for each waiter.
#[derive(Debug, Clone)]
enum Cause {
    NotConnected(String),
    TimedOut(Duration),
    Cancelled(String),
    Protocol(String),
}

impl From<Cause> for Error {
    fn from(cause: Cause) -> Self {
        match cause {
            Cause::NotConnected(reason) => Self::NotConnected(reason),
            Cause::TimedOut(after) => Self::Timeout(after),
            Cause::Cancelled(reason) => Self::Cancelled(reason),
            Cause::Protocol(reason) => Self::Server(reason),
        }
    }
}

/// Value carried by the completion channel.
#[derive(Debug, Clone, Default)]
struct Completion {
    status: Option<StatusResponse>,
    cause: Option<Cause>,
}

impl Completion {
    const fn is_signalled(&self) -> bool {
        self.status.is_some() || self.cause.is_some()
    }
}

struct Inner {
    tag: OnceLock<Tag>,
    name: String,
    args: Vec<Parameter>,
    completion: watch::Sender<Completion>,
    phase: AtomicU8,
    /// Present only when `args` holds a literal.
    literal: Option<LiteralGate>,
    /// Present only for IDLE.
    idle: Option<IdleGate>,
    timer: ResponseTimer,
}

/// A single outbound IMAP request and its completion lifecycle.
#[derive(Clone)]
pub struct Command {
    inner: Arc<Inner>,
}

impl Command {
    /// Creates a command with the default configuration.
    ///
    /// ```
    /// use tidings_imap::{Command, CommandState};
    ///
    /// let cmd = Command::new("SELECT", ["INBOX".into()]);
    /// assert_eq!(cmd.state(), CommandState::Created);
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = Parameter>) -> Self {
        Self::with_config(name, args, &CommandConfig::default())
    }

    /// Creates a command with explicit settings.
    ///
    /// Commands carrying a literal argument get a literal gate; all others
    /// never allocate one.
    #[must_use]
    pub fn with_config(
        name: impl Into<String>,
        args: impl IntoIterator<Item = Parameter>,
        config: &CommandConfig,
    ) -> Self {
        Self::build(name.into(), args.into_iter().collect(), config, false)
    }

    fn build(name: String, args: Vec<Parameter>, config: &CommandConfig, idle: bool) -> Self {
        let literals = args.iter().filter(|arg| arg.is_literal()).count();
        let (completion, _) = watch::channel(Completion::default());
        Self {
            inner: Arc::new(Inner {
                tag: OnceLock::new(),
                name,
                args,
                completion,
                phase: AtomicU8::new(PHASE_UNSENT),
                literal: (literals > 0).then(|| LiteralGate::new(literals)),
                idle: idle.then(IdleGate::default),
                timer: ResponseTimer::new(config.response_timeout),
            }),
        }
    }

    /// Returns the tag, or [`Tag::Unassigned`].
    #[must_use]
    pub fn tag(&self) -> &Tag {
        self.inner.tag.get().unwrap_or(&UNASSIGNED)
    }

    /// Returns the command verb.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` if the verb matches, ignoring case.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.inner.name.eq_ignore_ascii_case(name)
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[Parameter] {
        &self.inner.args
    }

    /// Returns the current response timeout.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.inner.timer.interval()
    }

    /// Changes the response timeout. A running countdown keeps its deadline;
    /// the new value applies from the next reset. Literal chunks streamed
    /// afterwards are sized from the new value.
    pub fn reconfigure(&self, response_timeout: Duration) {
        tracing::debug!(command = %self, ?response_timeout, "response timeout changed");
        self.inner.timer.set_interval(response_timeout);
    }

    /// Returns the tagged status, once received.
    #[must_use]
    pub fn status(&self) -> Option<StatusResponse> {
        self.inner.completion.borrow().status.clone()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CommandState {
        let completion = self.inner.completion.borrow();
        match (&completion.cause, &completion.status) {
            (Some(Cause::TimedOut(_)), _) => CommandState::TimedOut,
            (Some(_), _) => CommandState::Cancelled,
            (None, Some(_)) => CommandState::Completed,
            (None, None) => match self.inner.phase.load(Ordering::Acquire) {
                PHASE_SENDING => CommandState::Sending,
                PHASE_SENT => CommandState::AwaitingCompletion,
                _ if self.tag().is_assigned() => CommandState::Tagged,
                _ => CommandState::Created,
            },
        }
    }

    /// Assigns the tag. Done by the session, exactly once.
    ///
    /// # Errors
    ///
    /// Returns a usage error if `tag` is unassigned or the command already
    /// has a tag.
    pub fn assign_tag(&self, tag: Tag) -> Result<()> {
        if !tag.is_assigned() {
            return Err(Error::Usage(format!(
                "cannot assign an unassigned tag to {}",
                self.inner.name
            )));
        }
        self.inner.tag.set(tag).map_err(|rejected| {
            Error::Usage(format!(
                "{self} is already tagged, cannot reassign to {rejected}"
            ))
        })?;
        tracing::debug!(command = %self, "tag assigned");
        Ok(())
    }

    /// Writes the request line.
    ///
    /// Starts the response timer, then writes the tag, the verb and each
    /// argument. A literal argument flushes its `{n}` marker, waits for the
    /// server's continuation, and streams the payload in chunks, resetting the
    /// timer after each. The final CRLF is buffered; flushing it is left to
    /// the session so that requests can be pipelined.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the command is untagged or was already sent,
    /// I/O errors from the serializer unchanged, the recorded cause if the
    /// command is cancelled while parked on a continuation, and
    /// [`Error::Cancelled`] if `cancel` fires.
    pub async fn send<S: Serializer>(&self, ser: &mut S, cancel: &CancellationToken) -> Result<()> {
        let Tag::Assigned(tag) = self.tag() else {
            return Err(Error::Usage(format!(
                "{} cannot be sent without a tag",
                self.inner.name
            )));
        };
        if let Some(err) = self.cancellation_error() {
            return Err(err);
        }
        if self
            .inner
            .phase
            .compare_exchange(PHASE_UNSENT, PHASE_SENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Usage(format!("{self} has already been sent")));
        }

        self.restart_timer();
        tracing::debug!(command = %self, "sending");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled(format!("sending {self} was cancelled"))),
            result = self.write_request(ser, tag) => result,
        };
        self.inner.phase.store(PHASE_SENT, Ordering::Release);
        result
    }

    /// Runs after the session has sent the request line and before it sends
    /// the next queued command. A no-op for everything except IDLE, which
    /// holds the pipeline until [`exit_idle`](Self::exit_idle) is called or
    /// the command completes.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the serializer, or [`Error::Cancelled`] if
    /// `cancel` fires.
    pub async fn send_wait<S: Serializer>(
        &self,
        ser: &mut S,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match &self.inner.idle {
            Some(idle) => self.hold_idle(idle, ser, cancel).await,
            None => Ok(()),
        }
    }

    /// Waits until the command completes or is cancelled.
    ///
    /// Any number of callers may wait; all resume together.
    ///
    /// # Errors
    ///
    /// Returns the recorded cause (disconnect, timeout, cancellation,
    /// protocol violation), a server error for a missing or malformed
    /// status, a server error for BAD, the classified error for NO, or
    /// [`Error::Cancelled`] if `cancel` fires first.
    pub async fn wait_until_complete(&self, cancel: &CancellationToken) -> Result<()> {
        let mut rx = self.inner.completion.subscribe();
        let completion = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::Cancelled(format!("waiting for {self} was cancelled")));
            }
            completion = rx.wait_for(Completion::is_signalled) => match completion {
                Ok(completion) => completion.clone(),
                Err(_) => return Err(Error::NotConnected(format!("{self} was dropped"))),
            },
        };

        if let Some(cause) = completion.cause {
            return Err(cause.into());
        }
        let status = self.check_status(completion.status)?;
        if status.status == Status::Bad {
            return Err(Error::Server(format!("{} failed: {status}", self.inner.name)));
        }
        self.failure(&status).map_or(Ok(()), Err)
    }

    /// Maps a NO or BAD status onto an error. OK, or no status yet, is
    /// never an error.
    ///
    /// # Errors
    ///
    /// Returns the error class for the status and its response code.
    pub fn throw_on_error(&self) -> Result<()> {
        self.status()
            .and_then(|status| self.failure(&status))
            .map_or(Ok(()), Err)
    }

    /// Delivers the tagged status. Called by the session.
    ///
    /// # Errors
    ///
    /// Returns a server error for a duplicate status (the literal send is
    /// cancelled) or for a status that is not a completion.
    pub fn completed(&self, status: StatusResponse) -> Result<()> {
        let description = status.to_string();
        let accepted = self.inner.completion.send_if_modified(|completion| {
            if completion.status.is_some() {
                false
            } else {
                completion.status = Some(status);
                true
            }
        });
        // Any status ends the exchange, so a send still parked on `+` is released.
        self.cancel_literal();
        if !accepted {
            tracing::warn!(command = %self, response = %description, "duplicate status response");
            return Err(Error::Server(format!(
                "duplicate status response for {self}: {description}"
            )));
        }

        self.inner.timer.stop();
        tracing::debug!(command = %self, response = %description, "completed");
        self.check_status(self.status()).map(|_| ())
    }

    /// Records a lost connection and releases every waiter.
    pub fn disconnected(&self, reason: &str) {
        tracing::warn!(command = %self, reason, "disconnected");
        self.cancel_with(Cause::NotConnected(reason.to_string()));
    }

    /// Cancels the command on behalf of the caller and releases every waiter.
    pub fn cancel(&self, reason: &str) {
        tracing::debug!(command = %self, reason, "cancelled");
        self.cancel_with(Cause::Cancelled(reason.to_string()));
    }

    /// Delivers untagged data. Treated as liveness only.
    ///
    /// # Errors
    ///
    /// Returns a server error if the command already completed.
    pub fn data_received(&self, data: &ServerData) -> Result<()> {
        if self.is_completed() {
            self.cancel_literal();
            return Err(Error::Server(format!(
                "{self}: server data after completion: {}",
                data.line
            )));
        }
        self.restart_timer();
        tracing::trace!(command = %self, data = %data.line, "server data");
        Ok(())
    }

    /// Delivers a continuation request, releasing a send parked on a literal.
    ///
    /// # Errors
    ///
    /// Returns a server error if the command already completed, or if no
    /// literal or IDLE start is pending; the latter also cancels the command.
    pub fn continuation_requested(&self, continuation: &ContinuationResponse) -> Result<()> {
        if self.is_completed() {
            self.cancel_literal();
            return Err(Error::Server(format!(
                "{self}: continuation after completion"
            )));
        }

        let text = continuation.text.as_deref().unwrap_or_default();
        if let Some(idle) = &self.inner.idle {
            if idle.start() {
                self.inner.timer.disarm();
                tracing::debug!(command = %self, text, "IDLE accepted");
                return Ok(());
            }
        } else if let Some(gate) = self.inner.literal.as_ref().filter(|gate| gate.is_pending()) {
            self.restart_timer();
            tracing::debug!(command = %self, text, "continuation");
            gate.open();
            return Ok(());
        }

        let reason = format!("{self}: continuation requested with nothing pending");
        tracing::warn!(command = %self, "continuation with nothing pending");
        self.cancel_with(Cause::Protocol(reason.clone()));
        Err(Error::Server(reason))
    }

    async fn write_request<S: Serializer>(&self, ser: &mut S, tag: &str) -> Result<()> {
        ser.push_raw(tag.as_bytes()).await?;
        ser.push_space().await?;
        ser.push_raw(self.inner.name.as_bytes()).await?;

        let mut buf = Vec::new();
        for arg in &self.inner.args {
            ser.push_space().await?;
            if let Parameter::Literal(literal) = arg {
                self.send_literal(ser, literal).await?;
            } else {
                buf.clear();
                arg.encode(&mut buf)?;
                ser.push_raw(&buf).await?;
            }
        }
        ser.push_eol().await?;
        Ok(())
    }

    async fn send_literal<S: Serializer>(&self, ser: &mut S, literal: &Literal) -> Result<()> {
        let Some(gate) = &self.inner.literal else {
            return Err(Error::Usage(format!("{self} has no literal gate")));
        };

        let len = literal.len();
        ser.push_raw(format!("{{{len}}}").as_bytes()).await?;
        ser.push_eol().await?;
        ser.flush().await?;
        tracing::debug!(command = %self, len, "waiting for literal continuation");

        if !gate.wait().await {
            return Err(self.literal_cancelled());
        }

        let chunk_size = literal_chunk_size(self.response_timeout());
        let streamed = literal::stream(ser, literal, chunk_size, gate.token(), |sent| {
            self.restart_timer();
            tracing::trace!(command = %self, sent, len, "literal chunk");
        })
        .await;
        gate.finish_one();

        match streamed {
            Ok(_) => Ok(()),
            Err(Error::Cancelled(_)) => Err(self.literal_cancelled()),
            Err(err) => Err(err),
        }
    }

    fn literal_cancelled(&self) -> Error {
        self.cancellation_error()
            .unwrap_or_else(|| Error::Cancelled(format!("literal send for {self} was cancelled")))
    }

    fn failure(&self, status: &StatusResponse) -> Option<Error> {
        if !matches!(status.status, Status::No | Status::Bad) {
            return None;
        }
        let message = format!("{} failed: {status}", self.inner.name);
        Some(match &status.code {
            Some(ResponseCode::AuthenticationFailed) => Error::Unauthenticated(message),
            Some(ResponseCode::Unavailable) => Error::Unavailable(message),
            Some(
                ResponseCode::AlreadyExists
                | ResponseCode::AuthorizationFailed
                | ResponseCode::Cannot
                | ResponseCode::Limit
                | ResponseCode::NoPerm
                | ResponseCode::NonExistent
                | ResponseCode::OverQuota,
            ) => Error::Server(message),
            _ if status.status == Status::No => Error::Operational(message),
            _ => Error::Server(message),
        })
    }

    fn check_status(&self, status: Option<StatusResponse>) -> Result<StatusResponse> {
        match status {
            None => Err(Error::Server(format!(
                "{self}: no command response was received"
            ))),
            Some(status) if !status.status.is_completion() => Err(Error::Server(format!(
                "{self}: status response is not a completion: {status}"
            ))),
            Some(status) => Ok(status),
        }
    }

    fn is_completed(&self) -> bool {
        self.inner.completion.borrow().status.is_some()
    }

    fn cancellation_error(&self) -> Option<Error> {
        self.inner
            .completion
            .borrow()
            .cause
            .clone()
            .map(Error::from)
    }

    fn cancel_literal(&self) {
        if let Some(gate) = &self.inner.literal {
            gate.cancel();
        }
    }

    /// Records the first cause, stops the timer and cancels any literal
    /// upload. Returns `true` if this call recorded the cause.
    fn cancel_with(&self, cause: Cause) -> bool {
        let recorded = self.inner.completion.send_if_modified(|completion| {
            if completion.is_signalled() {
                false
            } else {
                completion.cause = Some(cause);
                true
            }
        });
        self.inner.timer.stop();
        self.cancel_literal();
        recorded
    }

    fn restart_timer(&self) {
        if self.inner.idle.as_ref().is_some_and(IdleGate::is_idling) {
            return;
        }
        let owner = Arc::downgrade(&self.inner);
        self.inner.timer.restart(move || on_timeout(&owner));
    }
}

fn on_timeout(owner: &Weak<Inner>) {
    let Some(inner) = owner.upgrade() else {
        return;
    };
    let command = Command { inner };
    let after = command.response_timeout();
    if command.cancel_with(Cause::TimedOut(after)) {
        tracing::warn!(command = %command, ?after, "timed out");
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tag(), self.inner.name)?;
        let redact = self.has_name("LOGIN");
        for (i, arg) in self.inner.args.iter().enumerate() {
            if redact && i > 0 {
                f.write_str(" <redacted>")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("tag", self.tag())
            .field("name", &self.inner.name)
            .field("args", &self.inner.args.len())
            .field("state", &self.state())
            .field("response_timeout", &self.response_timeout())
            .field("timer_armed", &self.inner.timer.is_armed())
            .finish_non_exhaustive()
    }
}
