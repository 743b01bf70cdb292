//! Streaming JSON decoder.
//!
//! The decoder reads tokens and raw values from a byte source, validating
//! structure through the shared state machine. It is resumable: every
//! scanner reports how far it got before running out of buffered input, so
//! a refill continues where the scan stopped instead of restarting the
//! token. A source that yields one byte per read therefore costs O(n)
//! total, not O(n²).
//!
//! Failure semantics: syntactic errors preserve decoder state (the caller
//! may inspect [`input_offset`] and keep reading at a higher level); I/O
//! errors are wrapped and, for sources that signal interruption, the same
//! operation may be retried after the source makes progress.
//!
//! [`input_offset`]: Decoder::input_offset

use std::io;
use std::sync::Arc;

use crate::error::{Error, IoOp, SyntaxError, SyntaxErrorKind};
use crate::intern::InternCache;
use crate::options::DecodeOptions;
use crate::pointer;
use crate::scan::{self, Literal, ValueFlags};
use crate::state::StateMachine;
use crate::token::{Kind, Token};
use crate::value::RawValue;

/// A streaming decoder over a byte source.
///
/// # Examples
///
/// ```
/// use jsonwire::{Decoder, Kind};
///
/// let mut dec = Decoder::from_slice(br#"{"a": [1, 2]}"#);
/// assert_eq!(dec.peek_kind(), Kind::OBJECT_START);
/// dec.read_token().unwrap();
/// assert_eq!(dec.read_token().unwrap().as_str(), Some("a"));
/// assert_eq!(dec.read_value().unwrap().as_bytes(), b"[1, 2]");
/// dec.read_token().unwrap();
/// assert!(dec.read_token().unwrap_err().is_eof());
/// ```
pub struct Decoder<'r> {
    rd: Option<Box<dyn io::Read + 'r>>,
    buf: Vec<u8>,
    /// Index of the next unread byte in `buf`.
    pos: usize,
    /// Stream offset of `buf[0]`.
    base: u64,
    eof: bool,
    opts: DecodeOptions,
    machine: StateMachine,
    peeked: Option<Kind>,
    peek_err: Option<Error>,
    /// Low-water mark the buffer compactor must not discard past, used to
    /// keep a whole raw value resident while it is being scanned.
    retain_from: Option<usize>,
    // Span and shape of the most recently consumed token.
    tok_span: (usize, usize),
    tok_kind: Kind,
    tok_in_scratch: bool,
    scratch: Vec<u8>,
    intern: InternCache,
}

impl<'r> Decoder<'r> {
    /// Creates a decoder reading from `rd` with default options.
    pub fn new(rd: impl io::Read + 'r) -> Decoder<'r> {
        Decoder::with_options(rd, DecodeOptions::default())
    }

    /// Creates a decoder reading from `rd`.
    pub fn with_options(rd: impl io::Read + 'r, opts: DecodeOptions) -> Decoder<'r> {
        Decoder::build(Some(Box::new(rd)), Vec::new(), opts)
    }

    /// Creates a decoder over an in-memory buffer with default options.
    #[must_use]
    pub fn from_slice(b: &[u8]) -> Decoder<'static> {
        Decoder::from_slice_with_options(b, DecodeOptions::default())
    }

    /// Creates a decoder over an in-memory buffer.
    #[must_use]
    pub fn from_slice_with_options(b: &[u8], opts: DecodeOptions) -> Decoder<'static> {
        let mut dec = Decoder::build(None, b.to_vec(), opts);
        dec.eof = true;
        dec
    }

    fn build(rd: Option<Box<dyn io::Read + 'r>>, buf: Vec<u8>, opts: DecodeOptions) -> Decoder<'r> {
        let track_names = !opts.allow_duplicate_names;
        Decoder {
            rd,
            buf,
            pos: 0,
            base: 0,
            eof: false,
            opts,
            machine: StateMachine::new(track_names),
            peeked: None,
            peek_err: None,
            retain_from: None,
            tok_span: (0, 0),
            tok_kind: Kind::INVALID,
            tok_in_scratch: false,
            scratch: Vec::new(),
            intern: InternCache::default(),
        }
    }

    /// The options this decoder was built with.
    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.opts
    }

    /// Total bytes of input consumed so far.
    #[must_use]
    pub fn input_offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Current nesting depth; 0 at the top level.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.machine.depth() - 1
    }

    /// JSON Pointer (RFC 6901) to the most recently handled value. Object
    /// names appear unescaped when duplicate-name detection is on,
    /// otherwise member indices are used.
    #[must_use]
    pub fn stack_pointer(&self) -> String {
        pointer::stack_pointer(&self.machine)
    }

    /// Reports the kind of the next token without consuming it.
    ///
    /// Returns [`Kind::INVALID`] if the next token cannot be read; the
    /// error is cached and replayed by the next [`read_token`] or
    /// [`read_value`] call, exactly once.
    ///
    /// [`read_token`]: Decoder::read_token
    /// [`read_value`]: Decoder::read_value
    pub fn peek_kind(&mut self) -> Kind {
        if let Some(k) = self.peeked {
            return k;
        }
        if self.peek_err.is_some() {
            return Kind::INVALID;
        }
        self.retain_from = None;
        self.compact();
        match self.scan_prefix() {
            Ok((_, kind)) => {
                self.peeked = Some(kind);
                kind
            }
            Err(err) => {
                self.peek_err = Some(err);
                Kind::INVALID
            }
        }
    }

    /// Consumes and returns the next token.
    ///
    /// String and number payloads reference the decoder's buffer and are
    /// invalidated by the next read; use [`Token::into_owned`] to keep
    /// them. Returns [`Error::Eof`] at a clean end of input.
    pub fn read_token(&mut self) -> Result<Token<'_>, Error> {
        self.take_peeked()?;
        self.retain_from = None;
        self.compact();
        self.advance()?;
        Ok(self.materialize())
    }

    /// Consumes one complete JSON value (literal, number, string, or
    /// balanced container) and returns its bytes.
    ///
    /// Calling this when the next grammatical element is a container's
    /// close delimiter yields a [`SyntaxErrorKind::EndOfContainer`] error,
    /// distinct from end-of-input, without consuming anything; interleaved
    /// token/value callers use it to detect container termination.
    pub fn read_value(&mut self) -> Result<&RawValue, Error> {
        let span = self.consume_value()?;
        Ok(RawValue::from_bytes(&self.buf[span.0..span.1]))
    }

    /// Consumes one complete JSON value without retaining its bytes.
    pub fn skip_value(&mut self) -> Result<(), Error> {
        self.consume_value().map(drop)
    }

    fn consume_value(&mut self) -> Result<(usize, usize), Error> {
        self.take_peeked()?;
        self.retain_from = None;
        self.compact();
        let (start, kind) = self.scan_prefix()?;
        if matches!(kind, Kind::OBJECT_END | Kind::ARRAY_END) {
            return Err(SyntaxErrorKind::EndOfContainer(kind.as_byte())
                .at(self.base + start as u64)
                .into());
        }
        // Keep the whole value resident across refills.
        self.retain_from = Some(start);
        let depth0 = self.machine.depth();
        let saved_machine = self.machine.clone();
        let saved_pos = self.pos;
        let result = (|| -> Result<(), Error> {
            self.advance()?;
            while self.machine.depth() > depth0 {
                self.advance()?;
            }
            Ok(())
        })();
        self.retain_from = None;
        match result {
            Ok(()) => Ok((start, self.pos)),
            Err(err) => {
                if err.is_retriable() {
                    // Roll back so the caller may retry the whole value
                    // once the source makes progress.
                    self.machine = saved_machine;
                    self.pos = saved_pos;
                }
                Err(err)
            }
        }
    }

    fn take_peeked(&mut self) -> Result<(), Error> {
        self.peeked = None;
        match self.peek_err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drops consumed bytes from the front of the buffer, respecting the
    /// retain mark. Only called between scans; never while locals index
    /// into the buffer.
    fn compact(&mut self) {
        let keep = match self.retain_from {
            Some(r) => r.min(self.pos),
            None => self.pos,
        };
        if keep > 0 {
            self.buf.drain(..keep);
            self.base += keep as u64;
            self.pos -= keep;
            if let Some(r) = &mut self.retain_from {
                *r -= keep;
            }
        }
    }

    /// Reads more bytes from the source, appending to the buffer. Returns
    /// `false` at end of input.
    fn fetch(&mut self) -> Result<bool, Error> {
        if self.eof {
            return Ok(false);
        }
        let Some(rd) = &mut self.rd else {
            self.eof = true;
            return Ok(false);
        };
        let mut chunk = [0u8; 4096];
        match rd.read(&mut chunk) {
            Ok(0) => {
                self.eof = true;
                Ok(false)
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(err) => Err(Error::io(IoOp::Read, err)),
        }
    }

    fn syntax(&self, at: usize, kind: SyntaxErrorKind) -> Error {
        Error::Syntax(SyntaxError::new(self.base + at as u64, kind))
    }

    /// Consumes whitespace and any grammatical separator without moving
    /// `pos`, returning the index and kind of the next token. Validates
    /// that the token kind and the separator agree with the state machine.
    fn scan_prefix(&mut self) -> Result<(usize, Kind), Error> {
        let mut cur = self.pos;
        let mut delim: u8 = 0;
        let mut delim_pos = 0usize;
        let mut ws_seen = false;
        loop {
            // Whitespace, refilling as needed.
            loop {
                match self.buf.get(cur) {
                    Some(&c) if matches!(c, b' ' | b'\t' | b'\n' | b'\r') => {
                        cur += 1;
                        ws_seen = true;
                    }
                    Some(_) => break,
                    None => {
                        if self.fetch()? {
                            continue;
                        }
                        if delim != 0 {
                            return Err(self.syntax(
                                delim_pos,
                                SyntaxErrorKind::InvalidDelim {
                                    found: delim,
                                    context: "before end of input",
                                },
                            ));
                        }
                        if self.machine.depth() == 1 {
                            return Err(Error::Eof);
                        }
                        return Err(self.syntax(cur, SyntaxErrorKind::UnexpectedEof));
                    }
                }
            }
            let c = self.buf[cur];
            if c == b',' || c == b':' {
                if delim != 0 {
                    return Err(self.syntax(
                        cur,
                        SyntaxErrorKind::InvalidDelim { found: c, context: "after separator" },
                    ));
                }
                delim = c;
                delim_pos = cur;
                cur += 1;
                continue;
            }
            let kind = Kind::from_byte(c);
            if kind == Kind::INVALID {
                return Err(self.syntax(cur, SyntaxErrorKind::InvalidStartOfValue(c)));
            }
            let need = self.machine.need_delim(kind).map_err(|k| self.syntax(cur, k))?;
            self.check_separator(kind, need, delim, delim_pos, cur, ws_seen)?;
            return Ok((cur, kind));
        }
    }

    fn check_separator(
        &self,
        kind: Kind,
        need: u8,
        delim: u8,
        delim_pos: usize,
        cur: usize,
        ws_seen: bool,
    ) -> Result<(), Error> {
        let last = self.machine.last();
        match need {
            0 => {
                if delim != 0 {
                    return Err(self.syntax(
                        delim_pos,
                        SyntaxErrorKind::InvalidDelim { found: delim, context: "before next token" },
                    ));
                }
            }
            b' ' => {
                // Top-level values are separated by whitespace; commas are
                // rejected outright.
                if delim != 0 {
                    return Err(self.syntax(
                        delim_pos,
                        SyntaxErrorKind::InvalidDelim {
                            found: delim,
                            context: "between top-level values",
                        },
                    ));
                }
                if !ws_seen {
                    return Err(self.syntax(
                        cur,
                        SyntaxErrorKind::InvalidDelim {
                            found: kind.as_byte(),
                            context: "after top-level value (expecting whitespace)",
                        },
                    ));
                }
            }
            b',' => {
                if delim != b',' {
                    let context = if last.is_object() {
                        "after object value (expecting ',' or '}')"
                    } else {
                        "after array element (expecting ',' or ']')"
                    };
                    let (pos, found) =
                        if delim == 0 { (cur, kind.as_byte()) } else { (delim_pos, delim) };
                    return Err(self.syntax(pos, SyntaxErrorKind::InvalidDelim { found, context }));
                }
            }
            b':' => {
                if delim != b':' {
                    let (pos, found) =
                        if delim == 0 { (cur, kind.as_byte()) } else { (delim_pos, delim) };
                    return Err(self.syntax(
                        pos,
                        SyntaxErrorKind::InvalidDelim {
                            found,
                            context: "after object name (expecting ':')",
                        },
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Scans, validates, and commits exactly one token. On success `pos`
    /// sits just past the token and the token's span is recorded for
    /// materialization. On error nothing is committed (syntax errors point
    /// at the offending byte; the read position stays at the previous
    /// commit point).
    fn advance(&mut self) -> Result<Kind, Error> {
        let (start, kind) = self.scan_prefix()?;
        let mut in_scratch = false;
        let end = match kind {
            Kind::NULL | Kind::TRUE | Kind::FALSE => start + self.scan_literal(start, kind)?,
            Kind::NUMBER => start + self.scan_number(start)?,
            Kind::STRING => {
                let (n, flags) = self.scan_string(start)?;
                // Member names feed duplicate detection and the pointer
                // stack before the machine commits.
                if self.machine.last().needs_name() && self.machine.track_names() {
                    let name = self.name_at(start, start + n, flags);
                    if !self.machine.record_name(Arc::clone(&name)) {
                        return Err(self.syntax(
                            start,
                            SyntaxErrorKind::DuplicateName { name: name.as_ref().into() },
                        ));
                    }
                }
                in_scratch = !flags.is_verbatim();
                if in_scratch {
                    self.scratch.clear();
                    scan::append_unquoted(&mut self.scratch, &self.buf[start..start + n]);
                }
                start + n
            }
            _ => {
                // Structural delimiter.
                self.machine.commit(kind).map_err(|k| self.syntax(start, k))?;
                self.pos = start + 1;
                self.tok_span = (start, start + 1);
                self.tok_kind = kind;
                self.tok_in_scratch = false;
                return Ok(kind);
            }
        };
        self.machine.commit(kind).map_err(|k| self.syntax(start, k))?;
        self.pos = end;
        self.tok_span = (start, end);
        self.tok_kind = kind;
        self.tok_in_scratch = in_scratch;
        Ok(kind)
    }

    fn scan_literal(&mut self, start: usize, kind: Kind) -> Result<usize, Error> {
        let lit = match kind {
            Kind::TRUE => Literal::True,
            Kind::FALSE => Literal::False,
            _ => Literal::Null,
        };
        loop {
            match scan::consume_literal(&self.buf[start..], lit) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind == SyntaxErrorKind::UnexpectedEof => {
                    if !self.fetch()? {
                        return Err(self.syntax(start + e.pos, SyntaxErrorKind::UnexpectedEof));
                    }
                }
                Err(e) => return Err(self.syntax(start + e.pos, e.kind)),
            }
        }
    }

    fn scan_number(&mut self, start: usize) -> Result<usize, Error> {
        let fast = scan::consume_simple_number(&self.buf[start..]);
        if fast > 0 {
            return Ok(fast);
        }
        let mut n = 0;
        let mut state = scan::NumberState::default();
        loop {
            match scan::consume_number_resumable(&self.buf[start..], n, state) {
                Ok(s) if s.done => return Ok(s.n),
                Ok(s) => {
                    n = s.n;
                    state = s.state;
                    if !self.fetch()? {
                        if state.terminal() {
                            return Ok(n);
                        }
                        return Err(self.syntax(start + n, SyntaxErrorKind::UnexpectedEof));
                    }
                }
                Err(e) => return Err(self.syntax(start + e.pos, e.kind)),
            }
        }
    }

    fn scan_string(&mut self, start: usize) -> Result<(usize, ValueFlags), Error> {
        let fast = scan::consume_simple_string(&self.buf[start..]);
        if fast > 0 {
            return Ok((fast, ValueFlags::default()));
        }
        let mut flags = ValueFlags::default();
        let mut n = 0;
        let validate = !self.opts.allow_invalid_utf8;
        loop {
            match scan::consume_string_resumable(&self.buf[start..], n, &mut flags, validate) {
                Ok(s) if s.done => return Ok((s.n, flags)),
                Ok(s) => {
                    n = s.n;
                    if !self.fetch()? {
                        return Err(self.syntax(start + n, SyntaxErrorKind::UnexpectedEof));
                    }
                }
                Err(e) => return Err(self.syntax(start + e.pos, e.kind)),
            }
        }
    }

    /// The unescaped member name for the string token at `[start, end)`.
    fn name_at(&mut self, start: usize, end: usize, flags: ValueFlags) -> Arc<str> {
        if flags.is_verbatim() {
            let bytes = &self.buf[start + 1..end - 1];
            match core::str::from_utf8(bytes) {
                Ok(s) => self.intern.intern(s),
                Err(_) => Arc::from(String::from_utf8_lossy(bytes)),
            }
        } else {
            self.scratch.clear();
            scan::append_unquoted(&mut self.scratch, &self.buf[start..end]);
            match core::str::from_utf8(&self.scratch) {
                Ok(s) => self.intern.intern(s),
                Err(_) => Arc::from(String::from_utf8_lossy(&self.scratch)),
            }
        }
    }

    /// Builds the public token for the most recent [`advance`] commit.
    fn materialize(&self) -> Token<'_> {
        let (start, end) = self.tok_span;
        match self.tok_kind {
            Kind::NULL => Token::NULL,
            Kind::TRUE => Token::TRUE,
            Kind::FALSE => Token::FALSE,
            Kind::STRING => {
                if self.tok_in_scratch {
                    Token::from_raw_str(&self.scratch)
                } else {
                    Token::from_raw_str(&self.buf[start + 1..end - 1])
                }
            }
            Kind::NUMBER => {
                let bytes = &self.buf[start..end];
                // Safety: the number grammar admits only ASCII bytes.
                let text = unsafe { core::str::from_utf8_unchecked(bytes) };
                Token::from_raw_number(text)
            }
            Kind::OBJECT_START => Token::OBJECT_START,
            Kind::OBJECT_END => Token::OBJECT_END,
            Kind::ARRAY_START => Token::ARRAY_START,
            _ => Token::ARRAY_END,
        }
    }
}

impl std::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("offset", &self.input_offset())
            .field("depth", &self.stack_depth())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Kind> {
        let mut dec = Decoder::from_slice(input.as_bytes());
        let mut out = Vec::new();
        loop {
            match dec.read_token() {
                Ok(t) => out.push(t.kind()),
                Err(e) if e.is_eof() => return out,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[test]
    fn token_walk() {
        assert_eq!(
            kinds(r#"{"a": 1, "b": [true, null]}"#),
            vec![
                Kind::OBJECT_START,
                Kind::STRING,
                Kind::NUMBER,
                Kind::STRING,
                Kind::ARRAY_START,
                Kind::TRUE,
                Kind::NULL,
                Kind::ARRAY_END,
                Kind::OBJECT_END,
            ]
        );
    }

    #[test]
    fn top_level_values_need_whitespace() {
        assert_eq!(kinds("1 2 3"), vec![Kind::NUMBER; 3]);
        let mut dec = Decoder::from_slice(b"1,2");
        dec.read_token().unwrap();
        let err = dec.read_token().unwrap_err();
        assert_eq!(err.byte_offset(), Some(1));
        let mut dec = Decoder::from_slice(b"\"a\"\"b\"");
        dec.read_token().unwrap();
        assert!(matches!(dec.read_token().unwrap_err(), Error::Syntax(_)));
    }

    #[test]
    fn peeked_error_replays_once() {
        let mut dec = Decoder::from_slice(b"[x]");
        assert_eq!(dec.peek_kind(), Kind::ARRAY_START);
        dec.read_token().unwrap();
        assert_eq!(dec.peek_kind(), Kind::INVALID);
        let err = dec.read_token().unwrap_err();
        assert_eq!(err.byte_offset(), Some(1));
        // The cached error was replayed; a fresh scan reproduces it.
        let err = dec.read_token().unwrap_err();
        assert_eq!(err.byte_offset(), Some(1));
    }

    #[test]
    fn value_position_close_is_distinct_from_eof() {
        let mut dec = Decoder::from_slice(b"[1]");
        dec.read_token().unwrap();
        dec.read_value().unwrap();
        let err = dec.read_value().unwrap_err();
        match err {
            Error::Syntax(e) => {
                assert_eq!(e.kind, SyntaxErrorKind::EndOfContainer(b']'));
                assert_eq!(e.byte_offset, 2);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
        // The close delimiter was not consumed.
        assert_eq!(dec.read_token().unwrap().kind(), Kind::ARRAY_END);
    }

    #[test]
    fn duplicate_names_rejected_at_the_quote() {
        let mut dec = Decoder::from_slice(br#"{"a":1,"a":2}"#);
        dec.read_token().unwrap();
        dec.read_token().unwrap();
        dec.read_token().unwrap();
        let err = dec.read_token().unwrap_err();
        assert_eq!(err.byte_offset(), Some(7));

        let opts = DecodeOptions { allow_duplicate_names: true, ..DecodeOptions::default() };
        let mut dec = Decoder::from_slice_with_options(br#"{"a":1,"a":2}"#, opts);
        while !matches!(dec.read_token(), Err(ref e) if e.is_eof()) {}
    }

    #[test]
    fn escapes_and_interning() {
        let mut dec = Decoder::from_slice(br#"{"key": "val\nue"}"#);
        dec.read_token().unwrap();
        assert_eq!(dec.read_token().unwrap().as_str(), Some("key"));
        assert_eq!(dec.read_token().unwrap().as_str(), Some("val\nue"));
    }

    #[test]
    fn stack_introspection() {
        let mut dec = Decoder::from_slice(br#"{"a": {"b": [10, 20]}}"#);
        for _ in 0..6 {
            dec.read_token().unwrap();
        }
        assert_eq!(dec.stack_depth(), 3);
        assert_eq!(dec.stack_pointer(), "/a/b/0");
    }

    #[test]
    fn invalid_utf8_offset() {
        let mut input = Vec::from(&b"\"living"[..]);
        input.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        input.push(b'"');
        let mut dec = Decoder::from_slice(&input);
        let err = dec.read_token().unwrap_err();
        assert_eq!(err.byte_offset(), Some(9));

        let opts = DecodeOptions { allow_invalid_utf8: true, ..DecodeOptions::default() };
        let mut dec = Decoder::from_slice_with_options(&input, opts);
        let tok = dec.read_token().unwrap();
        let mut want = Vec::from(&b"living"[..]);
        want.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(tok.as_bytes(), Some(&want[..]));
    }
}
