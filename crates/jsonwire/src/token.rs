//! Lexical JSON tokens and their one-byte kind classification.
//!
//! A [`Token`] is one lexical item: a literal, a number, a string, or a
//! single structural delimiter. Tokens read from a [`Decoder`] may borrow
//! their payload from the decoder's internal buffer; the borrow is tied to
//! the decoder, so the payload cannot outlive the next read. Call
//! [`Token::into_owned`] to detach a token from the decoder.
//!
//! [`Decoder`]: crate::Decoder

use core::fmt;

use crate::scan;

/// One-byte classification of a token or raw value, matching the first byte
/// of its grammar production.
///
/// # Examples
///
/// ```
/// use jsonwire::Kind;
///
/// assert_eq!(Kind::from_byte(b'-'), Kind::NUMBER);
/// assert_eq!(Kind::from_byte(b'7'), Kind::NUMBER);
/// assert_eq!(Kind::from_byte(b'x'), Kind::INVALID);
/// assert_eq!(Kind::STRING.as_byte(), b'"');
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Kind(u8);

impl Kind {
    /// Unknown or invalid kind. This is the kind reported by
    /// [`Decoder::peek_kind`](crate::Decoder::peek_kind) when the input is
    /// erroneous.
    pub const INVALID: Kind = Kind(0);
    /// The literal `null`.
    pub const NULL: Kind = Kind(b'n');
    /// The literal `false`.
    pub const FALSE: Kind = Kind(b'f');
    /// The literal `true`.
    pub const TRUE: Kind = Kind(b't');
    /// A string.
    pub const STRING: Kind = Kind(b'"');
    /// A number. All numbers normalize to `'0'` regardless of first digit.
    pub const NUMBER: Kind = Kind(b'0');
    /// Object begin delimiter `{`.
    pub const OBJECT_START: Kind = Kind(b'{');
    /// Object end delimiter `}`.
    pub const OBJECT_END: Kind = Kind(b'}');
    /// Array begin delimiter `[`.
    pub const ARRAY_START: Kind = Kind(b'[');
    /// Array end delimiter `]`.
    pub const ARRAY_END: Kind = Kind(b']');

    /// Classifies the first byte of a token, normalizing digits and `-` to
    /// [`Kind::NUMBER`]. Unrecognized bytes map to [`Kind::INVALID`].
    #[must_use]
    pub fn from_byte(b: u8) -> Kind {
        match b {
            b'n' => Kind::NULL,
            b'f' => Kind::FALSE,
            b't' => Kind::TRUE,
            b'"' => Kind::STRING,
            b'-' | b'0'..=b'9' => Kind::NUMBER,
            b'{' => Kind::OBJECT_START,
            b'}' => Kind::OBJECT_END,
            b'[' => Kind::ARRAY_START,
            b']' => Kind::ARRAY_END,
            _ => Kind::INVALID,
        }
    }

    /// The representative byte of this kind (`0` for [`Kind::INVALID`]).
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Human-readable name of the kind, used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Kind::NULL => "null",
            Kind::FALSE => "false",
            Kind::TRUE => "true",
            Kind::STRING => "string",
            Kind::NUMBER => "number",
            Kind::OBJECT_START => "object start",
            Kind::OBJECT_END => "object end",
            Kind::ARRAY_START => "array start",
            Kind::ARRAY_END => "array end",
            _ => "invalid",
        }
    }

    /// Whether the kind begins a value (anything but a close delimiter or
    /// [`Kind::INVALID`]).
    #[must_use]
    pub fn starts_value(self) -> bool {
        !matches!(self, Kind::INVALID | Kind::OBJECT_END | Kind::ARRAY_END)
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("Kind(invalid)")
        } else {
            write!(f, "Kind({:?})", self.0 as char)
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One lexical JSON item.
///
/// The representation is opaque; construct tokens through the associated
/// constants and constructors, and inspect them through the accessors.
/// Primitive tokens are allocation-free.
///
/// The default token is the null token.
///
/// # Examples
///
/// ```
/// use jsonwire::{Kind, Token};
///
/// assert_eq!(Token::default(), Token::NULL);
/// assert_eq!(Token::bool(true).kind(), Kind::TRUE);
/// assert_eq!(Token::string("hi").as_str(), Some("hi"));
/// assert_eq!(Token::int(-3).kind(), Kind::NUMBER);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Token<'a> {
    repr: Repr<'a>,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum Repr<'a> {
    #[default]
    Null,
    Bool(bool),
    /// Unescaped string content. Not guaranteed to be valid UTF-8 when the
    /// decoder was configured to allow invalid UTF-8.
    Str(&'a [u8]),
    StrOwned(Box<[u8]>),
    /// Raw JSON number text, already validated against the number grammar.
    Num(&'a str),
    NumOwned(Box<str>),
    I64(i64),
    U64(u64),
    F64(f64),
    F32(f32),
    Delim(u8),
}

impl<'a> Token<'a> {
    /// The `null` token.
    pub const NULL: Token<'static> = Token { repr: Repr::Null };
    /// The `true` token.
    pub const TRUE: Token<'static> = Token { repr: Repr::Bool(true) };
    /// The `false` token.
    pub const FALSE: Token<'static> = Token { repr: Repr::Bool(false) };
    /// The `{` delimiter token.
    pub const OBJECT_START: Token<'static> = Token { repr: Repr::Delim(b'{') };
    /// The `}` delimiter token.
    pub const OBJECT_END: Token<'static> = Token { repr: Repr::Delim(b'}') };
    /// The `[` delimiter token.
    pub const ARRAY_START: Token<'static> = Token { repr: Repr::Delim(b'[') };
    /// The `]` delimiter token.
    pub const ARRAY_END: Token<'static> = Token { repr: Repr::Delim(b']') };

    /// A boolean token.
    #[must_use]
    pub const fn bool(v: bool) -> Token<'static> {
        Token { repr: Repr::Bool(v) }
    }

    /// A string token borrowing `s`. The content is the unescaped text; the
    /// encoder applies whatever escaping its options require.
    #[must_use]
    pub const fn string(s: &str) -> Token<'_> {
        Token { repr: Repr::Str(s.as_bytes()) }
    }

    /// A string token owning its content.
    #[must_use]
    pub fn owned_string(s: impl Into<String>) -> Token<'static> {
        Token { repr: Repr::StrOwned(s.into().into_bytes().into_boxed_slice()) }
    }

    /// A signed integer number token.
    #[must_use]
    pub const fn int(v: i64) -> Token<'static> {
        Token { repr: Repr::I64(v) }
    }

    /// An unsigned integer number token.
    #[must_use]
    pub const fn uint(v: u64) -> Token<'static> {
        Token { repr: Repr::U64(v) }
    }

    /// A 64-bit floating point number token. Non-finite values are rejected
    /// by the encoder, not here.
    #[must_use]
    pub const fn float(v: f64) -> Token<'static> {
        Token { repr: Repr::F64(v) }
    }

    /// A 32-bit floating point number token. Formatting preserves the
    /// shortest 32-bit round-trip representation.
    #[must_use]
    pub const fn float32(v: f32) -> Token<'static> {
        Token { repr: Repr::F32(v) }
    }

    /// A string token borrowing raw (possibly non-UTF-8) content bytes.
    pub(crate) const fn from_raw_str(b: &[u8]) -> Token<'_> {
        Token { repr: Repr::Str(b) }
    }

    /// A number token borrowing validated raw number text.
    pub(crate) const fn from_raw_number(s: &str) -> Token<'_> {
        Token { repr: Repr::Num(s) }
    }

    /// The kind of this token.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match &self.repr {
            Repr::Null => Kind::NULL,
            Repr::Bool(true) => Kind::TRUE,
            Repr::Bool(false) => Kind::FALSE,
            Repr::Str(_) | Repr::StrOwned(_) => Kind::STRING,
            Repr::Num(_)
            | Repr::NumOwned(_)
            | Repr::I64(_)
            | Repr::U64(_)
            | Repr::F64(_)
            | Repr::F32(_) => Kind::NUMBER,
            Repr::Delim(b) => Kind::from_byte(*b),
        }
    }

    /// The boolean payload, if this is a boolean token.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.repr {
            Repr::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The unescaped string content, if this is a string token holding
    /// valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.string_bytes()?).ok()
    }

    /// The unescaped string content as raw bytes, if this is a string
    /// token. Invalid UTF-8 is preserved verbatim when the decoder allows
    /// it.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.string_bytes()
    }

    fn string_bytes(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::Str(b) => Some(b),
            Repr::StrOwned(b) => Some(&b[..]),
            _ => None,
        }
    }

    /// The raw number text, if this token was read from input.
    #[must_use]
    pub fn number_text(&self) -> Option<&str> {
        match &self.repr {
            Repr::Num(s) => Some(s),
            Repr::NumOwned(s) => Some(&s[..]),
            _ => None,
        }
    }

    /// The numeric payload as `f64`, parsing raw text on demand.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match &self.repr {
            Repr::I64(v) => Some(*v as f64),
            Repr::U64(v) => Some(*v as f64),
            Repr::F64(v) => Some(*v),
            Repr::F32(v) => Some(f64::from(*v)),
            Repr::Num(s) => Some(scan::parse_float(s.as_bytes(), 64).0),
            Repr::NumOwned(s) => Some(scan::parse_float(s.as_bytes(), 64).0),
            _ => None,
        }
    }

    /// The numeric payload as `i64`, if it is an integer in range. Raw text
    /// with a fraction or exponent yields `None`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match &self.repr {
            Repr::I64(v) => Some(*v),
            Repr::U64(v) => i64::try_from(*v).ok(),
            Repr::Num(s) => parse_i64(s),
            Repr::NumOwned(s) => parse_i64(s),
            _ => None,
        }
    }

    /// The numeric payload as `u64`, if it is a non-negative integer in
    /// range.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match &self.repr {
            Repr::U64(v) => Some(*v),
            Repr::I64(v) => u64::try_from(*v).ok(),
            Repr::Num(s) => parse_u64(s),
            Repr::NumOwned(s) => parse_u64(s),
            _ => None,
        }
    }

    /// Detaches the token from whatever buffer it borrows, cloning the
    /// payload if necessary.
    #[must_use]
    pub fn into_owned(self) -> Token<'static> {
        let repr = match self.repr {
            Repr::Null => Repr::Null,
            Repr::Bool(v) => Repr::Bool(v),
            Repr::Str(b) => Repr::StrOwned(b.to_vec().into_boxed_slice()),
            Repr::StrOwned(b) => Repr::StrOwned(b),
            Repr::Num(s) => Repr::NumOwned(s.into()),
            Repr::NumOwned(s) => Repr::NumOwned(s),
            Repr::I64(v) => Repr::I64(v),
            Repr::U64(v) => Repr::U64(v),
            Repr::F64(v) => Repr::F64(v),
            Repr::F32(v) => Repr::F32(v),
            Repr::Delim(b) => Repr::Delim(b),
        };
        Token { repr }
    }

    /// Writes the token body (no separators, no indentation) into `dst`.
    /// Strings are escaped per `opts`; integer and float payloads are
    /// formatted here. Returns `false` for non-finite floats.
    pub(crate) fn append_body(
        &self,
        dst: &mut Vec<u8>,
        opts: &crate::options::EncodeOptions,
    ) -> Result<(), crate::error::SyntaxErrorKind> {
        use crate::{escape, number};
        match &self.repr {
            Repr::Null => dst.extend_from_slice(b"null"),
            Repr::Bool(true) => dst.extend_from_slice(b"true"),
            Repr::Bool(false) => dst.extend_from_slice(b"false"),
            Repr::Str(b) => escape::append_quoted(dst, b, opts)?,
            Repr::StrOwned(b) => escape::append_quoted(dst, b, opts)?,
            Repr::Num(s) => dst.extend_from_slice(s.as_bytes()),
            Repr::NumOwned(s) => dst.extend_from_slice(s.as_bytes()),
            Repr::I64(v) => number::append_i64(dst, *v),
            Repr::U64(v) => number::append_u64(dst, *v),
            Repr::F64(v) => number::append_f64(dst, *v),
            Repr::F32(v) => number::append_f32(dst, *v),
            Repr::Delim(b) => dst.push(*b),
        }
        Ok(())
    }

    /// The float payload and its bit width, for the encoder's non-finite
    /// check.
    pub(crate) fn float_payload(&self) -> Option<(f64, u32)> {
        match self.repr {
            Repr::F64(v) => Some((v, 64)),
            Repr::F32(v) => Some((f64::from(v), 32)),
            _ => None,
        }
    }
}

fn parse_i64(s: &str) -> Option<i64> {
    let b = s.as_bytes();
    let (neg, digits) = match b.first() {
        Some(&b'-') => (true, &b[1..]),
        _ => (false, b),
    };
    let (mag, ok) = scan::parse_dec_uint(digits);
    if !ok {
        return None;
    }
    if neg {
        // -2^63 has a magnitude one past i64::MAX.
        if mag == 1 << 63 {
            return Some(i64::MIN);
        }
        i64::try_from(mag).ok().map(|v| -v)
    } else {
        i64::try_from(mag).ok()
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    let b = s.as_bytes();
    if b.first() == Some(&b'-') {
        // -0 is a valid JSON integer equal to zero.
        return if b == b"-0" { Some(0) } else { None };
    }
    let (mag, ok) = scan::parse_dec_uint(b);
    ok.then_some(mag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_token_is_null() {
        assert_eq!(Token::default(), Token::NULL);
        assert_eq!(Token::default().kind(), Kind::NULL);
    }

    #[test]
    fn kinds_normalize() {
        for b in b"0123456789-".iter().copied() {
            assert_eq!(Kind::from_byte(b), Kind::NUMBER);
        }
        assert_eq!(Kind::from_byte(b'{'), Kind::OBJECT_START);
        assert_eq!(Kind::from_byte(0xFF), Kind::INVALID);
    }

    #[test]
    fn integer_accessors() {
        let t = Token::from_raw_number("-9223372036854775808");
        assert_eq!(t.as_i64(), Some(i64::MIN));
        assert_eq!(t.as_u64(), None);
        let t = Token::from_raw_number("18446744073709551615");
        assert_eq!(t.as_u64(), Some(u64::MAX));
        assert_eq!(t.as_i64(), None);
        let t = Token::from_raw_number("1.5");
        assert_eq!(t.as_i64(), None);
        assert_eq!(t.as_f64(), Some(1.5));
        assert_eq!(Token::from_raw_number("-0").as_u64(), Some(0));
    }

    #[test]
    fn owned_tokens_detach() {
        let text = String::from("hello");
        let t = Token::string(&text).into_owned();
        drop(text);
        assert_eq!(t.as_str(), Some("hello"));
    }
}
