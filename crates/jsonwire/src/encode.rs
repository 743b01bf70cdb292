//! Streaming JSON encoder.
//!
//! The encoder writes tokens and raw values to a byte sink, consulting the
//! shared state machine for which separator bytes each token needs and
//! whether it is grammatically permitted at all. Grammar violations leave
//! the encoder usable (nothing is emitted and no state mutates); sink
//! failures poison it, and every subsequent call returns the same error.

use std::io;
use std::sync::Arc;

use crate::error::{Action, Error, IoOp, SemanticError, SyntaxError, SyntaxErrorKind};
use crate::options::EncodeOptions;
use crate::pointer;
use crate::scan;
use crate::state::{StateMachine, MAX_NESTING_DEPTH};
use crate::token::{Kind, Token};
use crate::value::{RawValue, RawValueBuf, Reformatter};

const FLUSH_THRESHOLD: usize = 4096;

/// A streaming encoder over a byte sink.
///
/// # Examples
///
/// ```
/// use jsonwire::{Encoder, Token};
///
/// let mut enc = Encoder::new_buffer();
/// enc.write_token(&Token::OBJECT_START).unwrap();
/// enc.write_token(&Token::string("answer")).unwrap();
/// enc.write_token(&Token::int(42)).unwrap();
/// enc.write_token(&Token::OBJECT_END).unwrap();
/// assert_eq!(enc.output(), b"{\"answer\":42}\n");
/// ```
pub struct Encoder<'w> {
    wr: Option<Box<dyn io::Write + 'w>>,
    buf: Vec<u8>,
    /// Bytes already handed to the sink.
    flushed: u64,
    opts: EncodeOptions,
    opts_err: Option<Error>,
    machine: StateMachine,
    sticky: Option<Error>,
    unused: Vec<u8>,
}

impl<'w> Encoder<'w> {
    /// Creates an encoder writing to `wr` with default options.
    pub fn new(wr: impl io::Write + 'w) -> Encoder<'w> {
        Encoder::with_options(wr, EncodeOptions::default())
    }

    /// Creates an encoder writing to `wr`.
    pub fn with_options(wr: impl io::Write + 'w, opts: EncodeOptions) -> Encoder<'w> {
        Encoder::build(Some(Box::new(wr)), opts)
    }

    /// Creates an encoder accumulating into an internal buffer; read it
    /// back with [`output`](Encoder::output) or
    /// [`into_bytes`](Encoder::into_bytes).
    #[must_use]
    pub fn new_buffer() -> Encoder<'static> {
        Encoder::new_buffer_with_options(EncodeOptions::default())
    }

    /// Creates a buffer-backed encoder with the given options.
    #[must_use]
    pub fn new_buffer_with_options(opts: EncodeOptions) -> Encoder<'static> {
        Encoder::build(None, opts)
    }

    fn build(wr: Option<Box<dyn io::Write + 'w>>, opts: EncodeOptions) -> Encoder<'w> {
        let opts_err = (!opts.indent_is_valid())
            .then(|| Error::Syntax(SyntaxErrorKind::InvalidIndent.at(0)));
        let track_names = !opts.allow_duplicate_names;
        Encoder {
            wr,
            buf: Vec::new(),
            flushed: 0,
            opts,
            opts_err,
            machine: StateMachine::new(track_names),
            sticky: None,
            unused: Vec::new(),
        }
    }

    /// The options this encoder was built with.
    #[must_use]
    pub fn options(&self) -> &EncodeOptions {
        &self.opts
    }

    /// Bytes produced so far and not yet handed to the sink. For a
    /// buffer-backed encoder this is the entire output.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes a buffer-backed encoder, returning its output.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Total bytes of output produced so far.
    #[must_use]
    pub fn output_offset(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Current nesting depth; 0 at the top level.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.machine.depth() - 1
    }

    /// JSON Pointer (RFC 6901) to the most recently written value.
    #[must_use]
    pub fn stack_pointer(&self) -> String {
        pointer::stack_pointer(&self.machine)
    }

    /// Hands buffered output to the sink and flushes it.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.flush_buf()?;
        if let Some(wr) = &mut self.wr {
            if let Err(err) = wr.flush() {
                let err = Error::io(IoOp::Write, err);
                self.sticky = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    /// A scratch buffer adjacent to the encoder's own, letting callers
    /// assemble a raw value and hand it to
    /// [`write_owned_value`](Encoder::write_owned_value) without a fresh
    /// allocation.
    pub fn take_unused_buffer(&mut self) -> RawValueBuf {
        let mut v = std::mem::take(&mut self.unused);
        v.clear();
        RawValueBuf::from(v)
    }

    /// Writes a raw value and reclaims its allocation as the unused
    /// buffer.
    pub fn write_owned_value(&mut self, v: RawValueBuf) -> Result<(), Error> {
        let result = self.write_value(&v);
        let inner = v.into_bytes();
        if inner.capacity() > self.unused.capacity() {
            self.unused = inner;
        }
        result
    }

    /// Writes one token, emitting whatever separator and indentation the
    /// grammar position requires first.
    pub fn write_token(&mut self, t: &Token<'_>) -> Result<(), Error> {
        self.check_poisoned()?;
        let kind = t.kind();
        if let Some((v, bits)) = t.float_payload() {
            if !v.is_finite() {
                let rust_type = if bits == 32 { "f32" } else { "f64" };
                let reason =
                    if v.is_nan() { "float value is NaN" } else { "float value is infinite" };
                return Err(SemanticError::new(Action::Marshal, rust_type)
                    .with_kind(Kind::NUMBER)
                    .with_reason(reason)
                    .into());
            }
        }
        let delim = self.need_delim(kind)?;
        // Names feed duplicate detection before anything is emitted, so a
        // rejected token leaves the output untouched.
        if kind == Kind::STRING && self.machine.last().needs_name() && self.machine.track_names() {
            let name = name_of(t);
            if !self.machine.record_name(Arc::clone(&name)) {
                return Err(self.syntax(SyntaxErrorKind::DuplicateName {
                    name: name.as_ref().into(),
                }));
            }
        }
        let rewind = self.buf.len();
        self.emit_prefix(kind, delim);
        if let Err(kind) = t.append_body(&mut self.buf, &self.opts) {
            self.buf.truncate(rewind);
            return Err(self.syntax(kind));
        }
        self.commit(kind)
    }

    /// Validates and writes one complete raw value, reformatting it to the
    /// encoder's whitespace options (compacted, or re-indented when
    /// indentation is configured).
    pub fn write_value(&mut self, v: &RawValue) -> Result<(), Error> {
        self.check_poisoned()?;
        let kind = v.kind();
        if kind == Kind::INVALID {
            let b = v.as_bytes().first().copied().unwrap_or(0);
            return Err(self.syntax(SyntaxErrorKind::InvalidStartOfValue(b)));
        }
        let delim = self.need_delim(kind)?;
        // Reformat into scratch first: validation failures must leave the
        // output untouched.
        let mut scratch = std::mem::take(&mut self.unused);
        scratch.clear();
        let decode = crate::options::DecodeOptions {
            allow_duplicate_names: self.opts.allow_duplicate_names,
            allow_invalid_utf8: self.opts.allow_invalid_utf8,
        };
        let reformatter = if self.opts.indents() {
            Reformatter::indenter(&self.opts, &decode, self.machine.depth() - 1)
        } else {
            Reformatter::compactor(&decode)
        };
        if let Err(err) = reformatter.reformat_complete(&mut scratch, v.as_bytes()) {
            self.unused = scratch;
            return Err(Error::Syntax(err));
        }
        if kind == Kind::STRING && self.machine.last().needs_name() && self.machine.track_names() {
            let mut content = Vec::new();
            scan::append_unquoted(&mut content, &scratch);
            let name: Arc<str> = Arc::from(String::from_utf8_lossy(&content));
            if !self.machine.record_name(Arc::clone(&name)) {
                self.unused = scratch;
                return Err(self.syntax(SyntaxErrorKind::DuplicateName {
                    name: name.as_ref().into(),
                }));
            }
        }
        self.emit_prefix(kind, delim);
        self.buf.extend_from_slice(&scratch);
        self.unused = scratch;
        self.machine.commit_element();
        self.finish_token()
    }

    fn check_poisoned(&self) -> Result<(), Error> {
        if let Some(err) = &self.sticky {
            return Err(err.clone());
        }
        if let Some(err) = &self.opts_err {
            return Err(err.clone());
        }
        Ok(())
    }

    fn need_delim(&self, kind: Kind) -> Result<u8, Error> {
        let delim = self.machine.need_delim(kind).map_err(|k| self.syntax(k))?;
        if matches!(kind, Kind::OBJECT_START | Kind::ARRAY_START)
            && self.machine.depth() >= MAX_NESTING_DEPTH
        {
            return Err(self.syntax(SyntaxErrorKind::DepthLimit));
        }
        Ok(delim)
    }

    fn syntax(&self, kind: SyntaxErrorKind) -> Error {
        Error::Syntax(SyntaxError::new(self.output_offset(), kind))
    }

    fn emit_prefix(&mut self, kind: Kind, delim: u8) {
        let depth = self.machine.depth();
        let last = self.machine.last();
        match delim {
            b',' => {
                self.buf.push(b',');
                if self.opts.indents() {
                    self.append_indent(depth - 1);
                }
            }
            b':' => {
                self.buf.push(b':');
                if self.opts.indents() {
                    self.buf.push(b' ');
                }
            }
            b' ' => {
                // Between top-level values. When the trailing newline is
                // suppressed, a space keeps bare literals separable.
                if self.opts.omit_top_level_newline {
                    self.buf.push(b' ');
                }
            }
            _ => {
                if self.opts.indents() && depth > 1 {
                    match kind {
                        Kind::OBJECT_END | Kind::ARRAY_END => {
                            if last.length() > 0 {
                                self.append_indent(depth - 2);
                            }
                        }
                        _ => {
                            if last.length() == 0 {
                                self.append_indent(depth - 1);
                            }
                        }
                    }
                }
            }
        }
    }

    fn append_indent(&mut self, levels: usize) {
        self.buf.push(b'\n');
        self.buf.extend_from_slice(self.opts.indent_prefix.as_bytes());
        for _ in 0..levels {
            self.buf.extend_from_slice(self.opts.indent.as_bytes());
        }
    }

    /// State transition plus end-of-token bookkeeping. `need_delim` has
    /// already vetted the kind, so the machine transition cannot fail.
    fn commit(&mut self, kind: Kind) -> Result<(), Error> {
        let committed = self.machine.commit(kind);
        debug_assert!(committed.is_ok(), "kind was vetted by need_delim");
        self.finish_token()
    }

    fn finish_token(&mut self) -> Result<(), Error> {
        if self.machine.depth() == 1 && !self.opts.omit_top_level_newline {
            self.buf.push(b'\n');
        }
        if self.wr.is_some() && (self.machine.depth() == 1 || self.buf.len() >= FLUSH_THRESHOLD) {
            self.flush_buf()?;
        }
        Ok(())
    }

    fn flush_buf(&mut self) -> Result<(), Error> {
        let Some(wr) = &mut self.wr else {
            return Ok(());
        };
        if self.buf.is_empty() {
            return Ok(());
        }
        match wr.write_all(&self.buf) {
            Ok(()) => {
                self.flushed += self.buf.len() as u64;
                self.buf.clear();
                Ok(())
            }
            Err(err) => {
                let err = Error::io(IoOp::Write, err);
                self.sticky = Some(err.clone());
                Err(err)
            }
        }
    }
}

fn name_of(t: &Token<'_>) -> Arc<str> {
    match t.as_str() {
        Some(s) => Arc::from(s),
        None => Arc::from(String::from_utf8_lossy(t.as_bytes().unwrap_or_default())),
    }
}

impl std::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("offset", &self.output_offset())
            .field("depth", &self.stack_depth())
            .field("poisoned", &self.sticky.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts_indent(indent: &str) -> EncodeOptions {
        EncodeOptions { indent: indent.into(), ..EncodeOptions::default() }
    }

    #[test]
    fn writes_object_with_separators() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::OBJECT_START).unwrap();
        enc.write_token(&Token::string("a")).unwrap();
        enc.write_token(&Token::int(1)).unwrap();
        enc.write_token(&Token::string("b")).unwrap();
        enc.write_token(&Token::ARRAY_START).unwrap();
        enc.write_token(&Token::bool(true)).unwrap();
        enc.write_token(&Token::NULL).unwrap();
        enc.write_token(&Token::ARRAY_END).unwrap();
        enc.write_token(&Token::OBJECT_END).unwrap();
        assert_eq!(enc.output(), br#"{"a":1,"b":[true,null]}
"#);
    }

    #[test]
    fn indentation_layout() {
        let mut enc = Encoder::new_buffer_with_options(opts_indent("\t"));
        enc.write_token(&Token::OBJECT_START).unwrap();
        enc.write_token(&Token::string("a")).unwrap();
        enc.write_token(&Token::ARRAY_START).unwrap();
        enc.write_token(&Token::int(1)).unwrap();
        enc.write_token(&Token::int(2)).unwrap();
        enc.write_token(&Token::ARRAY_END).unwrap();
        enc.write_token(&Token::string("b")).unwrap();
        enc.write_token(&Token::OBJECT_START).unwrap();
        enc.write_token(&Token::OBJECT_END).unwrap();
        enc.write_token(&Token::OBJECT_END).unwrap();
        let want = "{\n\t\"a\": [\n\t\t1,\n\t\t2\n\t],\n\t\"b\": {}\n}\n";
        assert_eq!(enc.output(), want.as_bytes());
    }

    #[test]
    fn grammar_violations_leave_encoder_usable() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::OBJECT_START).unwrap();
        // A number cannot appear in name position.
        assert!(enc.write_token(&Token::int(1)).is_err());
        enc.write_token(&Token::string("a")).unwrap();
        enc.write_token(&Token::int(1)).unwrap();
        enc.write_token(&Token::OBJECT_END).unwrap();
        assert_eq!(enc.output(), b"{\"a\":1}\n");
    }

    #[test]
    fn rejects_non_finite_floats() {
        let mut enc = Encoder::new_buffer();
        let err = enc.write_token(&Token::float(f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("NaN"), "{err}");
        let err = enc.write_token(&Token::float32(f32::INFINITY)).unwrap_err();
        assert!(err.to_string().contains("infinite"), "{err}");
        enc.write_token(&Token::float(1.5)).unwrap();
        assert_eq!(enc.output(), b"1.5\n");
    }

    #[test]
    fn duplicate_names_rejected_before_output() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::OBJECT_START).unwrap();
        enc.write_token(&Token::string("a")).unwrap();
        enc.write_token(&Token::int(1)).unwrap();
        let err = enc.write_token(&Token::string("a")).unwrap_err();
        assert!(err.to_string().contains("duplicate name"), "{err}");
        enc.write_token(&Token::string("b")).unwrap();
        enc.write_token(&Token::int(2)).unwrap();
        enc.write_token(&Token::OBJECT_END).unwrap();
        assert_eq!(enc.output(), b"{\"a\":1,\"b\":2}\n");
    }

    #[test]
    fn write_value_reformats_to_options() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::ARRAY_START).unwrap();
        enc.write_value(RawValue::from_bytes(b" { \"a\" : [ 1 , 2 ] } ")).unwrap();
        enc.write_value(RawValue::from_bytes(b"null")).unwrap();
        enc.write_token(&Token::ARRAY_END).unwrap();
        assert_eq!(enc.output(), b"[{\"a\":[1,2]},null]\n");
    }

    #[test]
    fn write_value_rejects_invalid_values() {
        let mut enc = Encoder::new_buffer();
        assert!(enc.write_value(RawValue::from_bytes(b"[1,]")).is_err());
        assert!(enc.write_value(RawValue::from_bytes(b"")).is_err());
        // Still usable.
        enc.write_value(RawValue::from_bytes(b"true")).unwrap();
        assert_eq!(enc.output(), b"true\n");
    }

    #[test]
    fn write_value_as_member_name() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::OBJECT_START).unwrap();
        enc.write_value(RawValue::from_bytes(br#""k""#)).unwrap();
        enc.write_token(&Token::int(7)).unwrap();
        let err = enc.write_value(RawValue::from_bytes(br#""k""#)).unwrap_err();
        assert!(err.to_string().contains("duplicate name"), "{err}");
        enc.write_token(&Token::OBJECT_END).unwrap();
        assert_eq!(enc.output(), b"{\"k\":7}\n");
    }

    #[test]
    fn sink_errors_poison_the_encoder() {
        struct FailingSink;
        impl io::Write for FailingSink {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut enc = Encoder::new(FailingSink);
        let err = enc.write_token(&Token::int(1)).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        let err = enc.write_token(&Token::int(2)).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn top_level_values_newline_separated() {
        let mut enc = Encoder::new_buffer();
        enc.write_token(&Token::int(1)).unwrap();
        enc.write_token(&Token::int(2)).unwrap();
        assert_eq!(enc.output(), b"1\n2\n");
    }

    #[test]
    fn unused_buffer_round_trips() {
        let mut enc = Encoder::new_buffer();
        let mut scratch = enc.take_unused_buffer();
        scratch.as_mut_vec().extend_from_slice(b"[1,2]");
        enc.write_owned_value(scratch).unwrap();
        assert_eq!(enc.output(), b"[1,2]\n");
    }
}
