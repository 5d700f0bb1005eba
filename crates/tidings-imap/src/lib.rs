//! # tidings-imap
//!
//! The command engine of an IMAP client: one object per outbound request,
//! covering serialization, the literal continuation handshake, per-command
//! response timeouts and the mapping of NO/BAD status codes into errors.
//!
//! ## Features
//!
//! - **Set-once lifecycle**: tags, statuses and cancellation causes are each
//!   written exactly once; duplicates are rejected as protocol violations
//! - **Literal flow control**: payloads wait for the server's `+`, then stream
//!   in chunks sized from the response timeout
//! - **Any number of waiters**: every caller of `wait_until_complete` resumes
//!   on completion, disconnect, cancellation or timeout
//! - **IDLE support**: RFC 2177 via `send_wait`/`exit_idle`
//! - **Error taxonomy**: RFC 5530 response codes mapped onto [`Error`]
//!
//! The socket, the response parser and the routing of responses to commands
//! belong to the session; this crate only defines the seams it plugs into
//! ([`Serializer`], [`StatusResponse`], [`ServerData`],
//! [`ContinuationResponse`]).
//!
//! ## Quick Start
//!
//! ```
//! use tidings_imap::{
//!     Command, Serializer, Status, StatusResponse, StreamSerializer, TagGenerator,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> tidings_imap::Result<()> {
//!     let tags = TagGenerator::default();
//!     let cancel = CancellationToken::new();
//!     let mut wire = StreamSerializer::new(Vec::new());
//!
//!     let cmd = Command::select("INBOX");
//!     cmd.assign_tag(tags.next())?;
//!     cmd.send(&mut wire, &cancel).await?;
//!     wire.flush().await?;
//!     assert_eq!(wire.get_ref().as_slice(), b"A0000 SELECT INBOX\r\n");
//!
//!     // The session parses the reply and routes it back.
//!     cmd.completed(StatusResponse::new(cmd.tag().clone(), Status::Ok))?;
//!     cmd.wait_until_complete(&cancel).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: the command state machine, parameters and literals
//! - [`config`]: per-command settings
//! - [`response`]: server messages delivered to a command
//! - [`serializer`]: outbound wire writer
//! - [`types`]: tags, status kinds and response codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
mod error;
pub mod response;
pub mod serializer;
mod timer;
pub mod types;

pub use command::{Command, CommandState, Literal, Parameter, TagGenerator, literal_chunk_size};
pub use config::{CommandConfig, CommandConfigBuilder, DEFAULT_RESPONSE_TIMEOUT};
pub use error::{Error, Result};
pub use response::{ContinuationResponse, ServerData, StatusResponse};
pub use serializer::{Serializer, StreamSerializer};
pub use types::{ResponseCode, Status, Tag};
