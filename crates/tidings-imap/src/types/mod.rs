//! Core IMAP types.
//!
//! This module defines the small protocol vocabulary the command engine
//! works with, following RFC 3501 (`IMAP4rev1`) and RFC 5530 response codes.

mod identifiers;
mod response_code;
mod status;

pub use identifiers::Tag;
pub use response_code::ResponseCode;
pub use status::Status;
