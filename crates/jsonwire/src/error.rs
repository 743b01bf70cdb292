//! Error taxonomy: syntactic, semantic, and I/O failures.
//!
//! Syntactic errors mean the JSON text violated the grammar and carry the
//! byte offset of the offending input. Semantic errors mean a type mismatch
//! while marshaling and carry the operation, the JSON kind involved, and
//! the target Rust type. I/O errors wrap the source or sink error verbatim,
//! tagged with the direction. There is no panic path; every failure
//! surfaces as a typed [`Error`].

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::token::Kind;

/// Any error produced by this crate.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The input violated the JSON grammar.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// A value could not be marshaled to or from the token stream.
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    /// The underlying byte source or sink failed.
    #[error("{op} error: {err}")]
    Io {
        /// Which direction failed.
        op: IoOp,
        /// The wrapped error. Shared so the error stays cloneable for
        /// replay from the peek cache and for encoder poisoning.
        err: Arc<io::Error>,
    },
    /// Clean end of input at the top level.
    #[error("end of JSON input")]
    Eof,
}

impl Error {
    pub(crate) fn io(op: IoOp, err: io::Error) -> Error {
        Error::Io { op, err: Arc::new(err) }
    }

    /// Whether this is the clean end-of-input marker.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }

    /// Whether this is an I/O error that may succeed if the operation is
    /// retried after the underlying source or sink makes progress.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Io { err, .. } => {
                matches!(err.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
            }
            _ => false,
        }
    }

    /// The input byte offset, for syntactic errors.
    #[must_use]
    pub fn byte_offset(&self) -> Option<u64> {
        match self {
            Error::Syntax(e) => Some(e.byte_offset),
            _ => None,
        }
    }
}

/// Direction tag for [`Error::Io`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoOp {
    /// Reading from a byte source.
    Read,
    /// Writing to a byte sink.
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoOp::Read => "read",
            IoOp::Write => "write",
        })
    }
}

/// JSON text that violated the grammar.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at byte offset {byte_offset}")]
pub struct SyntaxError {
    /// Offset of the offending byte from the start of the stream.
    pub byte_offset: u64,
    /// What went wrong.
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub(crate) fn new(byte_offset: u64, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError { byte_offset, kind }
    }
}

/// Renders a byte the way error messages quote it: printable ASCII as the
/// character itself, everything else as a hex escape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteDisplay(pub u8);

impl fmt::Display for ByteDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() || self.0 == b' ' {
            write!(f, "'{}'", self.0 as char)
        } else {
            write!(f, "'\\x{:02x}'", self.0)
        }
    }
}

/// The reason behind a [`SyntaxError`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    /// A literal such as `null` diverged from its spelling.
    #[error("invalid character {} within literal {literal} (expecting {})", ByteDisplay(*.found), ByteDisplay(*.expect))]
    InvalidLiteral {
        /// The byte found.
        found: u8,
        /// Which literal was being read.
        literal: &'static str,
        /// The byte the spelling demanded.
        expect: u8,
    },
    /// A byte that cannot start a value.
    #[error("invalid character {} at start of value", ByteDisplay(*.0))]
    InvalidStartOfValue(u8),
    /// A malformed number.
    #[error("invalid character {} within number", ByteDisplay(*.0))]
    InvalidNumber(u8),
    /// An unescaped control character inside a string.
    #[error("invalid character {} within string (expecting non-control character)", ByteDisplay(*.0))]
    InvalidStringChar(u8),
    /// A backslash followed by a byte that opens no escape sequence.
    #[error("invalid escape sequence '\\{}' within string", ByteDisplay(*.0))]
    InvalidEscape(u8),
    /// A `\uXXXX` escape with bad hex digits or an unpaired surrogate.
    #[error("invalid unicode escape sequence within string")]
    InvalidUnicodeEscape,
    /// A byte sequence that is not valid UTF-8.
    #[error("invalid UTF-8 within string")]
    InvalidUtf8,
    /// An object member name repeated within one object.
    #[error("duplicate name {name:?} in object")]
    DuplicateName {
        /// The repeated name, unescaped.
        name: Box<str>,
    },
    /// A separator or delimiter where the grammar expected another.
    #[error("invalid character {} {context}", ByteDisplay(*.found))]
    InvalidDelim {
        /// The byte found.
        found: u8,
        /// Where it appeared, e.g. `"after object name (expecting ':')"`.
        context: &'static str,
    },
    /// A close delimiter that does not match the open container.
    #[error("mismatched close delimiter {}", ByteDisplay(*.0))]
    MismatchedDelim(u8),
    /// A token kind the grammar does not permit at this position.
    #[error("unexpected {kind} token {context}")]
    UnexpectedKind {
        /// The kind found.
        kind: Kind,
        /// Where it appeared.
        context: &'static str,
    },
    /// A close delimiter where a value was requested. Distinct from
    /// end-of-input; interleaved token/value callers use this to detect
    /// container termination.
    #[error("unexpected end delimiter {} in value position", ByteDisplay(*.0))]
    EndOfContainer(u8),
    /// Input ended inside a token or an unclosed container.
    #[error("unexpected end of JSON input")]
    UnexpectedEof,
    /// Nesting exceeded the implementation bound.
    #[error("exceeded maximum nesting depth")]
    DepthLimit,
    /// Indentation options may hold only spaces and tabs.
    #[error("indent strings may contain only spaces and tabs")]
    InvalidIndent,
}

impl SyntaxErrorKind {
    pub(crate) fn at(self, byte_offset: u64) -> SyntaxError {
        SyntaxError::new(byte_offset, self)
    }
}

/// Which marshaling direction an operation ran in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Encoding a value into JSON.
    Marshal,
    /// Decoding JSON into a value.
    Unmarshal,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Marshal => "marshal",
            Action::Unmarshal => "unmarshal",
        })
    }
}

/// A type mismatch while marshaling or unmarshaling.
///
/// Rendered as, e.g.,
/// `cannot unmarshal JSON string into i32: value out of range`.
#[derive(Clone, Debug)]
pub struct SemanticError {
    /// Which direction failed.
    pub action: Action,
    /// The JSON kind involved, when one was at hand.
    pub json_kind: Option<Kind>,
    /// The Rust type being marshaled or unmarshaled.
    pub rust_type: &'static str,
    /// Human-readable detail.
    pub reason: Option<Box<str>>,
    /// A wrapped underlying error, if any.
    pub source: Option<Box<Error>>,
}

impl SemanticError {
    pub(crate) fn new(action: Action, rust_type: &'static str) -> SemanticError {
        SemanticError { action, json_kind: None, rust_type, reason: None, source: None }
    }

    pub(crate) fn with_kind(mut self, kind: Kind) -> SemanticError {
        self.json_kind = Some(kind);
        self
    }

    pub(crate) fn with_reason(mut self, reason: impl Into<Box<str>>) -> SemanticError {
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn with_source(mut self, source: Error) -> SemanticError {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Marshal => {
                write!(f, "cannot marshal {}", self.rust_type)?;
                if let Some(kind) = self.json_kind {
                    write!(f, " into JSON {kind}")?;
                }
            }
            Action::Unmarshal => {
                f.write_str("cannot unmarshal")?;
                if let Some(kind) = self.json_kind {
                    write!(f, " JSON {kind}")?;
                }
                write!(f, " into {}", self.rust_type)?;
            }
        }
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SemanticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}
