//! Raw JSON values and the operations over them.
//!
//! [`RawValue`] is a borrowed byte slice holding one complete JSON value;
//! [`RawValueBuf`] is its owned counterpart, like `str` and `String`. A
//! raw value is not guaranteed valid until validated; the mutating
//! operations re-validate as they go.
//!
//! One recursive reformatting routine backs `is_valid`, `compact`,
//! `indent`, `canonicalize`, and the encoder's `write_value`.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use bstr::BStr;
use fxhash::FxHashSet;

use crate::error::{Error, SyntaxError, SyntaxErrorKind};
use crate::escape;
use crate::number;
use crate::options::{DecodeOptions, EncodeOptions};
use crate::scan::{self, Literal, ValueFlags};
use crate::state::MAX_NESTING_DEPTH;
use crate::token::Kind;

/// A borrowed byte slice holding one complete JSON value.
///
/// # Examples
///
/// ```
/// use jsonwire::{Kind, RawValue};
///
/// let v = RawValue::from_bytes(br#" {"a": 1} "#);
/// assert_eq!(v.kind(), Kind::OBJECT_START);
/// assert!(v.is_valid(&Default::default()));
/// ```
#[repr(transparent)]
pub struct RawValue([u8]);

impl RawValue {
    /// Wraps a byte slice without validating it.
    #[must_use]
    pub fn from_bytes(b: &[u8]) -> &RawValue {
        // Safety: RawValue is a transparent wrapper around [u8].
        unsafe { &*(std::ptr::from_ref::<[u8]>(b) as *const RawValue) }
    }

    /// Wraps string bytes without validating them as JSON.
    #[must_use]
    pub fn from_str_unchecked(s: &str) -> &RawValue {
        RawValue::from_bytes(s.as_bytes())
    }

    /// The underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The kind of the value, judged from its first non-whitespace byte.
    #[must_use]
    pub fn kind(&self) -> Kind {
        let n = scan::consume_whitespace(&self.0);
        self.0.get(n).map_or(Kind::INVALID, |&b| Kind::from_byte(b))
    }

    /// Whether the bytes hold exactly one valid JSON value (with optional
    /// surrounding whitespace) under `opts`.
    #[must_use]
    pub fn is_valid(&self, opts: &DecodeOptions) -> bool {
        self.validate(opts).is_ok()
    }

    /// Validates the bytes, reporting the first grammar violation.
    pub fn validate(&self, opts: &DecodeOptions) -> Result<(), Error> {
        let mut sink = Vec::new();
        let fmt = Reformatter::validator(opts);
        fmt.reformat_complete(&mut sink, &self.0).map_err(Error::Syntax)
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawValue({:?})", BStr::new(&self.0))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BStr::new(&self.0))
    }
}

impl PartialEq for RawValue {
    fn eq(&self, other: &RawValue) -> bool {
        self.0 == other.0
    }
}

impl Eq for RawValue {}

impl ToOwned for RawValue {
    type Owned = RawValueBuf;

    fn to_owned(&self) -> RawValueBuf {
        RawValueBuf(self.0.to_vec())
    }
}

/// An owned, growable raw JSON value.
///
/// Dereferences to [`RawValue`]. Carries the in-place reformatting
/// operations.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawValueBuf(Vec<u8>);

impl RawValueBuf {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> RawValueBuf {
        RawValueBuf(Vec::new())
    }

    /// The underlying vector, for assembling a value in place.
    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }

    /// Consumes the buffer, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Rewrites the value with all optional whitespace removed,
    /// validating it in the process.
    pub fn compact(&mut self, opts: &DecodeOptions) -> Result<(), Error> {
        self.reformat(Reformatter::compactor(opts))
    }

    /// Rewrites the value with the given indentation, validating it in
    /// the process. `indent` and `prefix` may contain only spaces and
    /// tabs.
    pub fn indent(&mut self, prefix: &str, indent: &str) -> Result<(), Error> {
        let enc = EncodeOptions {
            indent: indent.to_string(),
            indent_prefix: prefix.to_string(),
            ..EncodeOptions::default()
        };
        if !enc.indent_is_valid() {
            return Err(Error::Syntax(SyntaxErrorKind::InvalidIndent.at(0)));
        }
        let decode = DecodeOptions::default();
        self.reformat(Reformatter::indenter(&enc, &decode, 0))
    }

    /// Rewrites the value into RFC 8785 canonical form: members sorted by
    /// UTF-16 code units of their names, shortest numbers, minimal string
    /// escaping, no optional whitespace.
    pub fn canonicalize(&mut self) -> Result<(), Error> {
        let decode = DecodeOptions::default();
        self.reformat(Reformatter::canonicalizer(&decode))
    }

    fn reformat(&mut self, fmt: Reformatter<'_>) -> Result<(), Error> {
        let mut out = Vec::with_capacity(self.0.len());
        fmt.reformat_complete(&mut out, &self.0).map_err(Error::Syntax)?;
        self.0 = out;
        Ok(())
    }
}

impl Deref for RawValueBuf {
    type Target = RawValue;

    fn deref(&self) -> &RawValue {
        RawValue::from_bytes(&self.0)
    }
}

impl Borrow<RawValue> for RawValueBuf {
    fn borrow(&self) -> &RawValue {
        self
    }
}

impl From<Vec<u8>> for RawValueBuf {
    fn from(v: Vec<u8>) -> RawValueBuf {
        RawValueBuf(v)
    }
}

impl From<&str> for RawValueBuf {
    fn from(s: &str) -> RawValueBuf {
        RawValueBuf(s.as_bytes().to_vec())
    }
}

impl FromStr for RawValueBuf {
    type Err = Error;

    /// Parses (and validates) one JSON value from text.
    fn from_str(s: &str) -> Result<RawValueBuf, Error> {
        let buf = RawValueBuf::from(s);
        buf.validate(&DecodeOptions::default())?;
        Ok(buf)
    }
}

impl fmt::Debug for RawValueBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl fmt::Display for RawValueBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Validate,
    Compact,
    Indent,
    Canonical,
}

/// The one walker behind validation and the three rewrites. Also used by
/// `Encoder::write_value` to re-indent a value mid-stream.
pub(crate) struct Reformatter<'a> {
    mode: Mode,
    enc: Option<&'a EncodeOptions>,
    validate_utf8: bool,
    reject_duplicates: bool,
    /// Indent level of the value's first line (nonzero when the encoder
    /// splices a value into an already-nested output).
    base_depth: usize,
}

impl<'a> Reformatter<'a> {
    pub(crate) fn validator(opts: &DecodeOptions) -> Reformatter<'a> {
        Reformatter {
            mode: Mode::Validate,
            enc: None,
            validate_utf8: !opts.allow_invalid_utf8,
            reject_duplicates: !opts.allow_duplicate_names,
            base_depth: 0,
        }
    }

    pub(crate) fn compactor(opts: &DecodeOptions) -> Reformatter<'a> {
        Reformatter {
            mode: Mode::Compact,
            enc: None,
            validate_utf8: !opts.allow_invalid_utf8,
            reject_duplicates: !opts.allow_duplicate_names,
            base_depth: 0,
        }
    }

    pub(crate) fn indenter(
        enc: &'a EncodeOptions,
        opts: &DecodeOptions,
        base_depth: usize,
    ) -> Reformatter<'a> {
        Reformatter {
            mode: Mode::Indent,
            enc: Some(enc),
            validate_utf8: !opts.allow_invalid_utf8,
            reject_duplicates: !opts.allow_duplicate_names,
            base_depth,
        }
    }

    pub(crate) fn canonicalizer(opts: &DecodeOptions) -> Reformatter<'a> {
        Reformatter {
            mode: Mode::Canonical,
            enc: None,
            validate_utf8: !opts.allow_invalid_utf8,
            reject_duplicates: !opts.allow_duplicate_names,
            base_depth: 0,
        }
    }

    /// Reformats one complete value; trailing content other than
    /// whitespace is an error. Offsets in the error are relative to `src`.
    pub(crate) fn reformat_complete(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
    ) -> Result<(), SyntaxError> {
        let pos = self.value(dst, src, scan::consume_whitespace(src), self.base_depth)?;
        let tail = pos + scan::consume_whitespace(&src[pos..]);
        if tail != src.len() {
            return Err(SyntaxErrorKind::InvalidDelim {
                found: src[tail],
                context: "after top-level value",
            }
            .at(tail as u64));
        }
        Ok(())
    }

    fn err(at: usize, kind: SyntaxErrorKind) -> SyntaxError {
        kind.at(at as u64)
    }

    fn write(&self, dst: &mut Vec<u8>, bytes: &[u8]) {
        if self.mode != Mode::Validate {
            dst.extend_from_slice(bytes);
        }
    }

    fn newline(&self, dst: &mut Vec<u8>, depth: usize) {
        if self.mode != Mode::Indent {
            return;
        }
        let Some(enc) = self.enc else { return };
        dst.push(b'\n');
        dst.extend_from_slice(enc.indent_prefix.as_bytes());
        for _ in 0..depth {
            dst.extend_from_slice(enc.indent.as_bytes());
        }
    }

    /// Reformats the value starting at `src[pos]` (no leading
    /// whitespace), returning the position just past it.
    fn value(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        pos: usize,
        depth: usize,
    ) -> Result<usize, SyntaxError> {
        if depth - self.base_depth >= MAX_NESTING_DEPTH {
            return Err(Self::err(pos, SyntaxErrorKind::DepthLimit));
        }
        let Some(&c) = src.get(pos) else {
            return Err(Self::err(pos, SyntaxErrorKind::UnexpectedEof));
        };
        match c {
            b'n' | b't' | b'f' => {
                let lit = match c {
                    b'n' => Literal::Null,
                    b't' => Literal::True,
                    _ => Literal::False,
                };
                let n = scan::consume_literal(&src[pos..], lit)
                    .map_err(|e| Self::err(pos + e.pos, e.kind))?;
                self.write(dst, lit.bytes());
                Ok(pos + n)
            }
            b'-' | b'0'..=b'9' => {
                let s = scan::consume_number(&src[pos..])
                    .map_err(|e| Self::err(pos + e.pos, e.kind))?;
                if !s.done && !s.state.terminal() {
                    return Err(Self::err(pos + s.n, SyntaxErrorKind::UnexpectedEof));
                }
                let text = &src[pos..pos + s.n];
                if self.mode == Mode::Canonical {
                    // RFC 8785 renders every number as the shortest
                    // double-precision form.
                    let (v, _) = scan::parse_float(text, 64);
                    number::append_f64(dst, v);
                } else {
                    self.write(dst, text);
                }
                Ok(pos + s.n)
            }
            b'"' => {
                let (n, _) = self.string(dst, src, pos, None)?;
                Ok(n)
            }
            b'{' => self.object(dst, src, pos, depth),
            b'[' => self.array(dst, src, pos, depth),
            b'}' | b']' => Err(Self::err(pos, SyntaxErrorKind::EndOfContainer(c))),
            _ => Err(Self::err(pos, SyntaxErrorKind::InvalidStartOfValue(c))),
        }
    }

    /// Scans the string at `src[pos]` and writes its reformatted form.
    /// When `name_out` is given, also produces the unescaped content (for
    /// duplicate detection and canonical sorting).
    fn string(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        pos: usize,
        name_out: Option<&mut Vec<u8>>,
    ) -> Result<(usize, ValueFlags), SyntaxError> {
        let mut flags = ValueFlags::default();
        let scan = scan::consume_string(&src[pos..], &mut flags, self.validate_utf8)
            .map_err(|e| Self::err(pos + e.pos, e.kind))?;
        if !scan.done {
            return Err(Self::err(pos + scan.n, SyntaxErrorKind::UnexpectedEof));
        }
        let raw = &src[pos..pos + scan.n];
        if self.mode == Mode::Canonical && !flags.is_canonical() {
            // Unescape, then requote with the minimal escape set.
            let mut content = Vec::with_capacity(raw.len());
            scan::append_unquoted(&mut content, raw);
            let opts = EncodeOptions { allow_invalid_utf8: true, ..EncodeOptions::default() };
            escape::append_quoted(dst, &content, &opts).map_err(|kind| Self::err(pos, kind))?;
        } else {
            self.write(dst, raw);
        }
        if let Some(out) = name_out {
            scan::append_unquoted(out, raw);
        }
        Ok((pos + scan.n, flags))
    }

    fn object(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        pos: usize,
        depth: usize,
    ) -> Result<usize, SyntaxError> {
        let mut cur = pos + 1;
        self.write_byte(dst, b'{');
        cur += scan::consume_whitespace(&src[cur..]);
        if src.get(cur) == Some(&b'}') {
            self.write_byte(dst, b'}');
            return Ok(cur + 1);
        }
        let mut seen: Option<FxHashSet<Box<[u8]>>> =
            self.reject_duplicates.then(FxHashSet::default);
        // Canonical mode buffers members for sorting.
        let mut members: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut first = true;
        loop {
            if src.get(cur).is_none() {
                return Err(Self::err(cur, SyntaxErrorKind::UnexpectedEof));
            }
            if !first && self.mode != Mode::Canonical {
                self.write_byte(dst, b',');
            }
            first = false;
            let name_pos = cur;
            let mut name = Vec::new();
            let mut member_dst = Vec::new();
            // Member name.
            if src.get(cur) != Some(&b'"') {
                let found = src[cur];
                return Err(Self::err(
                    cur,
                    SyntaxErrorKind::UnexpectedKind {
                        kind: Kind::from_byte(found),
                        context: "in object (expecting name or '}')",
                    },
                ));
            }
            let target: &mut Vec<u8> =
                if self.mode == Mode::Canonical { &mut member_dst } else { &mut *dst };
            self.newline(target, depth + 1);
            let (after_name, _) = self.string(target, src, cur, Some(&mut name))?;
            cur = after_name;
            if let Some(seen) = &mut seen {
                if !seen.insert(name.clone().into_boxed_slice()) {
                    let display = String::from_utf8_lossy(&name).into_owned();
                    return Err(Self::err(
                        name_pos,
                        SyntaxErrorKind::DuplicateName { name: display.into() },
                    ));
                }
            }
            // Colon.
            cur += scan::consume_whitespace(&src[cur..]);
            match src.get(cur) {
                Some(&b':') => cur += 1,
                Some(&c) => {
                    return Err(Self::err(
                        cur,
                        SyntaxErrorKind::InvalidDelim {
                            found: c,
                            context: "after object name (expecting ':')",
                        },
                    ));
                }
                None => return Err(Self::err(cur, SyntaxErrorKind::UnexpectedEof)),
            }
            self.write_colon(target);
            // Value.
            cur += scan::consume_whitespace(&src[cur..]);
            cur = self.value(target, src, cur, depth + 1)?;
            if self.mode == Mode::Canonical {
                members.push((name, member_dst));
            }
            // Comma or close.
            cur += scan::consume_whitespace(&src[cur..]);
            match src.get(cur) {
                Some(&b',') => {
                    cur += 1;
                    cur += scan::consume_whitespace(&src[cur..]);
                }
                Some(&b'}') => {
                    cur += 1;
                    break;
                }
                Some(&c) => {
                    return Err(Self::err(
                        cur,
                        SyntaxErrorKind::InvalidDelim {
                            found: c,
                            context: "after object value (expecting ',' or '}')",
                        },
                    ));
                }
                None => return Err(Self::err(cur, SyntaxErrorKind::UnexpectedEof)),
            }
        }
        if self.mode == Mode::Canonical {
            // RFC 8785: sort members by UTF-16 code units of their names.
            members.sort_by(|(a, _), (b, _)| utf16_cmp(a, b));
            for (i, (_, body)) in members.iter().enumerate() {
                if i > 0 {
                    dst.push(b',');
                }
                dst.extend_from_slice(body);
            }
        }
        self.newline(dst, depth);
        self.write_byte(dst, b'}');
        Ok(cur)
    }

    fn array(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        pos: usize,
        depth: usize,
    ) -> Result<usize, SyntaxError> {
        let mut cur = pos + 1;
        self.write_byte(dst, b'[');
        cur += scan::consume_whitespace(&src[cur..]);
        if src.get(cur) == Some(&b']') {
            self.write_byte(dst, b']');
            return Ok(cur + 1);
        }
        let mut first = true;
        loop {
            if !first {
                self.write_byte(dst, b',');
            }
            first = false;
            self.newline(dst, depth + 1);
            cur = self.value(dst, src, cur, depth + 1)?;
            cur += scan::consume_whitespace(&src[cur..]);
            match src.get(cur) {
                Some(&b',') => {
                    cur += 1;
                    cur += scan::consume_whitespace(&src[cur..]);
                }
                Some(&b']') => {
                    cur += 1;
                    break;
                }
                Some(&c) => {
                    return Err(Self::err(
                        cur,
                        SyntaxErrorKind::InvalidDelim {
                            found: c,
                            context: "after array element (expecting ',' or ']')",
                        },
                    ));
                }
                None => return Err(Self::err(cur, SyntaxErrorKind::UnexpectedEof)),
            }
        }
        self.newline(dst, depth);
        self.write_byte(dst, b']');
        Ok(cur)
    }

    fn write_byte(&self, dst: &mut Vec<u8>, b: u8) {
        if self.mode != Mode::Validate {
            dst.push(b);
        }
    }

    fn write_colon(&self, dst: &mut Vec<u8>) {
        match self.mode {
            Mode::Validate => {}
            Mode::Indent => dst.extend_from_slice(b": "),
            _ => dst.push(b':'),
        }
    }
}

/// Compares two UTF-8 byte strings by their UTF-16 code units.
fn utf16_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let au = String::from_utf8_lossy(a);
    let bu = String::from_utf8_lossy(b);
    au.encode_utf16().cmp(bu.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(s: &str) -> RawValueBuf {
        RawValueBuf::from(s)
    }

    #[test]
    fn validate_accepts_and_rejects() {
        let opts = DecodeOptions::default();
        for good in [r#"null"#, r#"[1,2,3]"#, r#"{"a":{"b":[]}}"#, r#" "x" "#, "-0.5e2"] {
            assert!(buf(good).is_valid(&opts), "{good}");
        }
        for bad in ["", "01", "[1,]", r#"{"a" 1}"#, "nul", "[1 2]", "{]", "1 2"] {
            assert!(!buf(bad).is_valid(&opts), "{bad}");
        }
    }

    #[test]
    fn compact_strips_whitespace() {
        let mut v = buf(" [ 1 , [ 2 ,\t3 ] , { \"a\" : null } ] ");
        v.compact(&DecodeOptions::default()).unwrap();
        assert_eq!(v.as_bytes(), br#"[1,[2,3],{"a":null}]"#);
    }

    #[test]
    fn indent_lays_out_members() {
        let mut v = buf(r#"{"a":[1,2],"b":{}}"#);
        v.indent("", "\t").unwrap();
        let want = "{\n\t\"a\": [\n\t\t1,\n\t\t2\n\t],\n\t\"b\": {}\n}";
        assert_eq!(v.as_bytes(), want.as_bytes());
    }

    #[test]
    fn indent_rejects_bad_indent_strings() {
        let mut v = buf("1");
        assert!(v.indent("", "ab").is_err());
    }

    #[test]
    fn canonicalize_sorts_and_normalizes() {
        let mut v = buf(r#"{"b": 2e1, "a": "é", "aa": 1.0}"#);
        v.canonicalize().unwrap();
        assert_eq!(
            String::from_utf8(v.into_bytes()).unwrap(),
            "{\"a\":\"\u{e9}\",\"aa\":1,\"b\":20}"
        );
    }

    #[test]
    fn duplicate_names_rejected_during_reformat() {
        let mut v = buf(r#"{"a":1,"a":2}"#);
        let err = v.compact(&DecodeOptions::default()).unwrap_err();
        assert_eq!(err.byte_offset(), Some(7));
        let opts = DecodeOptions { allow_duplicate_names: true, ..DecodeOptions::default() };
        let mut v = buf(r#"{"a":1,"a":2}"#);
        v.compact(&opts).unwrap();
    }

    #[test]
    fn display_and_debug_are_readable() {
        let v = buf(r#"{"a":1}"#);
        assert_eq!(v.to_string(), r#"{"a":1}"#);
        assert!(format!("{v:?}").starts_with("RawValue("));
    }
}
