//! Command arguments and their wire encoding.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::{Error, Result};

/// A typed command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Unquoted atom, written verbatim.
    Atom(String),
    /// Quoted string; `"` and `\` are escaped on the wire.
    Quoted(String),
    /// Non-negative number.
    Number(u64),
    /// The NIL atom.
    Nil,
    /// Parenthesized list of parameters. May not contain literals.
    List(Vec<Self>),
    /// Length-prefixed payload that needs a continuation before sending.
    Literal(Literal),
}

impl Parameter {
    /// Creates an atom.
    #[must_use]
    pub fn atom(s: impl Into<String>) -> Self {
        Self::Atom(s.into())
    }

    /// Creates a quoted string.
    #[must_use]
    pub fn quoted(s: impl Into<String>) -> Self {
        Self::Quoted(s.into())
    }

    /// Creates a parenthesized list.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Picks the cheapest valid encoding for a string: an atom when safe,
    /// a quoted string when it only needs escaping, a literal otherwise.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.bytes().any(needs_literal) {
            Self::Literal(Literal::new(s))
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            Self::Quoted(s)
        } else {
            Self::Atom(s)
        }
    }

    /// Returns `true` if this is a literal.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Encodes a non-literal parameter into `buf`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Atom(s) => buf.extend_from_slice(s.as_bytes()),
            Self::Quoted(s) => write_quoted(buf, s),
            Self::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
            Self::Nil => buf.extend_from_slice(b"NIL"),
            Self::List(items) => {
                buf.push(b'(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    if item.is_literal() {
                        return Err(Error::Usage(
                            "literals are not supported inside lists".to_string(),
                        ));
                    }
                    item.encode(buf)?;
                }
                buf.push(b')');
            }
            Self::Literal(_) => {
                return Err(Error::Usage(
                    "literal must be streamed by its command".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Parameter {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<u32> for Parameter {
    fn from(n: u32) -> Self {
        Self::Number(u64::from(n))
    }
}

impl From<u64> for Parameter {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<Literal> for Parameter {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{{{}}}", literal.len()),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            other => {
                let mut buf = Vec::new();
                other.encode(&mut buf).map_err(|_| std::fmt::Error)?;
                f.write_str(&String::from_utf8_lossy(&buf))
            }
        }
    }
}

/// Writes a quoted string, escaping `"` and `\`.
fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

/// Returns true if the byte cannot appear in a quoted string.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b > 0x7F
}

/// Payload of a literal argument.
///
/// The length is fixed when the literal is built; exactly that many bytes
/// are streamed once the server sends its continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    len: u64,
    source: LiteralSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LiteralSource {
    Memory(Bytes),
    File(PathBuf),
}

impl Literal {
    /// Creates a literal from in-memory data.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            len: data.len() as u64,
            source: LiteralSource::Memory(data),
        }
    }

    /// Creates a literal backed by a file. The file is opened again when the
    /// payload is streamed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub async fn from_file(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(Self {
            len,
            source: LiteralSource::File(path),
        })
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens a reader over the payload.
    pub(crate) async fn open(&self) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match &self.source {
            LiteralSource::Memory(data) => Ok(Box::new(io::Cursor::new(data.clone()))),
            LiteralSource::File(path) => Ok(Box::new(tokio::fs::File::open(path).await?)),
        }
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
    use proptest::prelude::*;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn encoded(p: &Parameter) -> String {
        let mut buf = Vec::new();
        p.encode(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_string_picks_atom() {
        assert_eq!(Parameter::string("INBOX"), Parameter::atom("INBOX"));
        assert_eq!(encoded(&Parameter::from("user@example.com")), "user@example.com");
    }

    #[test]
    fn test_string_picks_quoted() {
        assert_eq!(encoded(&Parameter::from("pass word")), "\"pass word\"");
        assert_eq!(encoded(&Parameter::from("")), "\"\"");
        assert_eq!(encoded(&Parameter::from("a\"b\\c")), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_string_picks_literal() {
        let p = Parameter::from("line one\r\nline two");
        assert!(p.is_literal());
        assert_eq!(p.to_string(), "{18}");

        let p = Parameter::from("Grüße");
        assert!(p.is_literal());
    }

    #[test]
    fn test_list_and_scalars() {
        let p = Parameter::list([
            Parameter::atom("\\Seen"),
            Parameter::Number(42),
            Parameter::Nil,
        ]);
        assert_eq!(encoded(&p), "(\\Seen 42 NIL)");
        assert_eq!(p.to_string(), "(\\Seen 42 NIL)");
    }

    #[test]
    fn test_literal_inside_list_is_rejected() {
        let p = Parameter::list([Parameter::Literal(Literal::new("x"))]);
        let mut buf = Vec::new();
        assert!(matches!(p.encode(&mut buf), Err(Error::Usage(_))));
    }

    #[tokio::test]
    async fn test_memory_literal_reads_back() {
        let literal = Literal::new(&b"hello"[..]);
        assert_eq!(literal.len(), 5);
        let mut out = Vec::new();
        literal.open().await.unwrap().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_file_literal() {
        let path = std::env::temp_dir().join(format!("tidings-literal-{}", std::process::id()));
        tokio::fs::write(&path, b"From: a@b\r\n\r\nbody").await.unwrap();

        let literal = Literal::from_file(&path).await.unwrap();
        assert_eq!(literal.len(), 17);
        let mut out = Vec::new();
        literal.open().await.unwrap().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"From: a@b\r\n\r\nbody");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    proptest! {
        #[test]
        fn prop_quoted_round_trips(s in "[ -~]{0,40}") {
            let p = Parameter::string(s.clone());
            prop_assert!(!p.is_literal());
            let wire = encoded(&p);
            let decoded = if let Some(inner) = wire.strip_prefix('"').and_then(|w| w.strip_suffix('"')) {
                let mut out = String::new();
                let mut chars = inner.chars();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        out.extend(chars.next());
                    } else {
                        out.push(c);
                    }
                }
                out
            } else {
                wire.clone()
            };
            prop_assert_eq!(decoded, s);
        }
    }
}
