//! Scanner primitives: pure, resumable functions over byte slices.
//!
//! Every consumer reports how far it got before running out of input, so
//! the decoder can refill its buffer and resume instead of rescanning from
//! the start of the token. This keeps one-byte-at-a-time sources linear.
//!
//! Positions in [`ScanErr`] are relative to the slice handed in; callers
//! add their own base offset.

use crate::error::SyntaxErrorKind;

/// A scanner failure at a position relative to the scanned slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ScanErr {
    pub pos: usize,
    pub kind: SyntaxErrorKind,
}

impl ScanErr {
    fn at(pos: usize, kind: SyntaxErrorKind) -> ScanErr {
        ScanErr { pos, kind }
    }
}

/// Consumes leading JSON whitespace: space, tab, line feed, carriage
/// return. Non-breaking space is not whitespace.
pub(crate) fn consume_whitespace(b: &[u8]) -> usize {
    let mut n = 0;
    while let Some(&c) = b.get(n) {
        if matches!(c, b' ' | b'\t' | b'\n' | b'\r') {
            n += 1;
        } else {
            break;
        }
    }
    n
}

/// Which literal a literal scan is matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Literal {
    Null,
    True,
    False,
}

impl Literal {
    pub(crate) fn bytes(self) -> &'static [u8] {
        match self {
            Literal::Null => b"null",
            Literal::True => b"true",
            Literal::False => b"false",
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::True => "true",
            Literal::False => "false",
        }
    }
}

/// Consumes one of the literals `null`, `true`, or `false`.
///
/// On success returns the literal's length. A mismatched byte yields an
/// invalid-character error at the divergence point; running out of input
/// yields [`SyntaxErrorKind::UnexpectedEof`] at the slice end, which the
/// caller resolves by refilling and retrying (literals are short enough
/// that restarting is linear).
pub(crate) fn consume_literal(b: &[u8], lit: Literal) -> Result<usize, ScanErr> {
    let want = lit.bytes();
    for (i, &expect) in want.iter().enumerate() {
        match b.get(i) {
            None => return Err(ScanErr::at(i, SyntaxErrorKind::UnexpectedEof)),
            Some(&got) if got != expect => {
                return Err(ScanErr::at(
                    i,
                    SyntaxErrorKind::InvalidLiteral { found: got, literal: lit.name(), expect },
                ));
            }
            Some(_) => {}
        }
    }
    Ok(want.len())
}

/// Resumable number-scan state. The states map one-to-one onto positions
/// in the JSON number grammar; the terminal states are those where the
/// number may validly end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum NumberState {
    #[default]
    Start,
    Sign,
    Zero,
    IntDigits,
    FracDot,
    FracDigits,
    ExpMark,
    ExpSign,
    ExpDigits,
}

impl NumberState {
    pub(crate) fn terminal(self) -> bool {
        matches!(
            self,
            NumberState::Zero
                | NumberState::IntDigits
                | NumberState::FracDigits
                | NumberState::ExpDigits
        )
    }
}

/// Result of a number scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NumberScan {
    /// Bytes consumed so far.
    pub n: usize,
    /// Grammar position after the consumed bytes.
    pub state: NumberState,
    /// `true` when the scan stopped at a byte that cannot extend the
    /// number; `false` when it ran out of input and may be resumed.
    pub done: bool,
}

/// Scans a JSON number from the start of `b`.
pub(crate) fn consume_number(b: &[u8]) -> Result<NumberScan, ScanErr> {
    consume_number_resumable(b, 0, NumberState::Start)
}

/// Resumes a number scan at `b[n..]` in grammar position `state`.
///
/// Stops without error at the first byte that cannot extend the number; if
/// the state is then non-terminal the caller reports the byte (or EOF) as
/// the error, since only the caller knows whether more input exists.
pub(crate) fn consume_number_resumable(
    b: &[u8],
    mut n: usize,
    mut state: NumberState,
) -> Result<NumberScan, ScanErr> {
    loop {
        let Some(&c) = b.get(n) else {
            return Ok(NumberScan { n, state, done: false });
        };
        state = match (state, c) {
            (NumberState::Start, b'-') => NumberState::Sign,
            (NumberState::Start | NumberState::Sign, b'0') => NumberState::Zero,
            (NumberState::Start | NumberState::Sign, b'1'..=b'9') => NumberState::IntDigits,
            (NumberState::IntDigits, b'0'..=b'9') => NumberState::IntDigits,
            (NumberState::Zero | NumberState::IntDigits, b'.') => NumberState::FracDot,
            (NumberState::FracDot | NumberState::FracDigits, b'0'..=b'9') => {
                NumberState::FracDigits
            }
            (NumberState::Zero | NumberState::IntDigits | NumberState::FracDigits, b'e' | b'E') => {
                NumberState::ExpMark
            }
            (NumberState::ExpMark, b'+' | b'-') => NumberState::ExpSign,
            (NumberState::ExpMark | NumberState::ExpSign | NumberState::ExpDigits, b'0'..=b'9') => {
                NumberState::ExpDigits
            }
            _ => {
                if state.terminal() {
                    return Ok(NumberScan { n, state, done: true });
                }
                return Err(ScanErr::at(n, SyntaxErrorKind::InvalidNumber(c)));
            }
        };
        n += 1;
    }
}

/// Fast path: an unsigned integer without sign, fraction, or exponent,
/// terminated by a byte that cannot extend a number. Returns 0 when the
/// fast path does not apply.
pub(crate) fn consume_simple_number(b: &[u8]) -> usize {
    let mut n = 0;
    match b.first() {
        Some(&b'0') => n = 1,
        Some(&(b'1'..=b'9')) => {
            n = 1;
            while matches!(b.get(n), Some(&(b'0'..=b'9'))) {
                n += 1;
            }
        }
        _ => return 0,
    }
    match b.get(n) {
        // Terminator must be visible and must not extend the number.
        Some(&(b'.' | b'e' | b'E' | b'0'..=b'9')) | None => 0,
        Some(_) => n,
    }
}

/// Per-value flags accumulated while scanning a string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ValueFlags(u8);

impl ValueFlags {
    const NON_VERBATIM: u8 = 1 << 0;
    const NON_CANONICAL: u8 = 1 << 1;

    /// No escape sequences: the content bytes can be sliced out verbatim.
    pub(crate) fn is_verbatim(self) -> bool {
        self.0 & Self::NON_VERBATIM == 0
    }

    /// Already in the form a canonical encoder would produce.
    pub(crate) fn is_canonical(self) -> bool {
        self.0 & Self::NON_CANONICAL == 0
    }

    pub(crate) fn set_non_verbatim(&mut self) {
        self.0 |= Self::NON_VERBATIM;
    }

    pub(crate) fn set_non_canonical(&mut self) {
        self.0 |= Self::NON_CANONICAL;
    }
}

/// Result of a string scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StringScan {
    /// Bytes consumed, including the closing quote when `done`.
    /// When not `done`, this is a safe resume point: it never splits an
    /// escape sequence or a UTF-8 sequence.
    pub n: usize,
    pub done: bool,
}

/// Scans a complete JSON string starting at `b[0] == '"'`.
pub(crate) fn consume_string(
    b: &[u8],
    flags: &mut ValueFlags,
    validate_utf8: bool,
) -> Result<StringScan, ScanErr> {
    consume_string_resumable(b, 0, flags, validate_utf8)
}

/// Resumes a string scan at byte `n` (a safe resume point from an earlier
/// call, or 0 to start at the opening quote).
pub(crate) fn consume_string_resumable(
    b: &[u8],
    mut n: usize,
    flags: &mut ValueFlags,
    validate_utf8: bool,
) -> Result<StringScan, ScanErr> {
    if n == 0 {
        match b.first() {
            None => return Ok(StringScan { n: 0, done: false }),
            Some(&b'"') => n = 1,
            Some(&c) => return Err(ScanErr::at(0, SyntaxErrorKind::InvalidStartOfValue(c))),
        }
    }
    loop {
        let Some(&c) = b.get(n) else {
            return Ok(StringScan { n, done: false });
        };
        match c {
            b'"' => return Ok(StringScan { n: n + 1, done: true }),
            b'\\' => {
                flags.set_non_verbatim();
                match consume_escape(b, n, flags, validate_utf8)? {
                    Some(next) => n = next,
                    // Incomplete escape: resume at the backslash.
                    None => return Ok(StringScan { n, done: false }),
                }
            }
            0x00..=0x1F => return Err(ScanErr::at(n, SyntaxErrorKind::InvalidStringChar(c))),
            0x20..=0x7F => n += 1,
            _ => match check_utf8(&b[n..]) {
                Utf8Status::Valid(len) => n += len,
                Utf8Status::Short => return Ok(StringScan { n, done: false }),
                Utf8Status::Invalid => {
                    if validate_utf8 {
                        return Err(ScanErr::at(n, SyntaxErrorKind::InvalidUtf8));
                    }
                    flags.set_non_canonical();
                    n += 1;
                }
            },
        }
    }
}

/// Consumes the escape sequence whose backslash sits at `b[n]`.
///
/// Returns `Ok(Some(next))` on success, `Ok(None)` when the sequence is
/// truncated by the end of the slice (resume at the backslash).
fn consume_escape(
    b: &[u8],
    n: usize,
    flags: &mut ValueFlags,
    validate_utf8: bool,
) -> Result<Option<usize>, ScanErr> {
    let Some(&e) = b.get(n + 1) else {
        return Ok(None);
    };
    match e {
        b'"' | b'\\' | b'b' | b'f' | b'n' | b'r' | b't' => Ok(Some(n + 2)),
        b'/' => {
            // A canonical encoder leaves '/' unescaped.
            flags.set_non_canonical();
            Ok(Some(n + 2))
        }
        b'u' => {
            if b.len() < n + 6 {
                return Ok(None);
            }
            let Some(hi) = parse_hex_uint16(&b[n + 2..]) else {
                return Err(ScanErr::at(n, SyntaxErrorKind::InvalidUnicodeEscape));
            };
            flags.set_non_canonical();
            match hi {
                0xD800..=0xDBFF => {
                    // A high surrogate must pair with `\u` + low surrogate.
                    let unpaired = |validate: bool| {
                        if validate {
                            Err(ScanErr::at(n, SyntaxErrorKind::InvalidUnicodeEscape))
                        } else {
                            Ok(Some(n + 6))
                        }
                    };
                    match (b.get(n + 6), b.get(n + 7)) {
                        (None, _) | (Some(&b'\\'), None) => Ok(None),
                        (Some(&b'\\'), Some(&b'u')) => {
                            if b.len() < n + 12 {
                                return Ok(None);
                            }
                            match parse_hex_uint16(&b[n + 8..]) {
                                Some(lo) if (0xDC00..=0xDFFF).contains(&lo) => Ok(Some(n + 12)),
                                _ => unpaired(validate_utf8),
                            }
                        }
                        _ => unpaired(validate_utf8),
                    }
                }
                0xDC00..=0xDFFF => {
                    if validate_utf8 {
                        Err(ScanErr::at(n, SyntaxErrorKind::InvalidUnicodeEscape))
                    } else {
                        Ok(Some(n + 6))
                    }
                }
                _ => Ok(Some(n + 6)),
            }
        }
        _ => Err(ScanErr::at(n + 1, SyntaxErrorKind::InvalidEscape(e))),
    }
}

/// Fast path: a complete string of ASCII graphic characters with no
/// escapes, closing quote visible. Returns 0 when the fast path does not
/// apply.
pub(crate) fn consume_simple_string(b: &[u8]) -> usize {
    if b.first() != Some(&b'"') {
        return 0;
    }
    let mut n = 1;
    while let Some(&c) = b.get(n) {
        match c {
            b'"' => return n + 1,
            // Space through tilde, minus the two special bytes.
            0x20..=0x7E if c != b'\\' => n += 1,
            _ => return 0,
        }
    }
    0
}

/// Validation status of the UTF-8 sequence starting at `b[0]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Utf8Status {
    Valid(usize),
    Invalid,
    /// Truncated but so far valid; more input may complete it.
    Short,
}

/// Checks one UTF-8 sequence at the start of `b`, rejecting overlong
/// forms, surrogates, and values above U+10FFFF.
pub(crate) fn check_utf8(b: &[u8]) -> Utf8Status {
    let Some(&b0) = b.first() else {
        return Utf8Status::Short;
    };
    let (len, low0, high0) = match b0 {
        0x00..=0x7F => return Utf8Status::Valid(1),
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return Utf8Status::Invalid,
    };
    for i in 1..len {
        let Some(&c) = b.get(i) else {
            return Utf8Status::Short;
        };
        let (low, high) = if i == 1 { (low0, high0) } else { (0x80, 0xBF) };
        if c < low || c > high {
            return Utf8Status::Invalid;
        }
    }
    Utf8Status::Valid(len)
}

/// Parses exactly four hex digits at the start of `b`.
pub(crate) fn parse_hex_uint16(b: &[u8]) -> Option<u16> {
    if b.len() < 4 {
        return None;
    }
    let mut v: u16 = 0;
    for &c in &b[..4] {
        let digit = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => return None,
        };
        v = (v << 4) | u16::from(digit);
    }
    Some(v)
}

/// Parses a decimal unsigned integer covering all of `b`.
///
/// Returns `(value, true)` on success. On any non-digit byte (or empty
/// input) returns `(0, false)`. On overflow returns `(u64::MAX, false)`:
/// saturation lets the caller tell overflow apart from a syntax error.
pub(crate) fn parse_dec_uint(b: &[u8]) -> (u64, bool) {
    if b.is_empty() {
        return (0, false);
    }
    let mut v: u64 = 0;
    let mut overflow = false;
    for &c in b {
        if !c.is_ascii_digit() {
            return (0, false);
        }
        let d = u64::from(c - b'0');
        v = match v.checked_mul(10).and_then(|v| v.checked_add(d)) {
            Some(v) => v,
            None => {
                overflow = true;
                u64::MAX
            }
        };
        if overflow {
            // Keep consuming digits so trailing garbage still reports as a
            // syntax failure rather than overflow.
            v = u64::MAX;
        }
    }
    if overflow { (u64::MAX, false) } else { (v, true) }
}

/// Parses valid JSON number text as a 32- or 64-bit float.
///
/// Out-of-range magnitudes saturate to the largest finite value of the
/// requested width; this never errors for grammatical input.
pub(crate) fn parse_float(b: &[u8], bits: u32) -> (f64, bool) {
    let Ok(s) = core::str::from_utf8(b) else {
        return (0.0, false);
    };
    if bits == 32 {
        let Ok(v) = s.parse::<f32>() else {
            return (0.0, false);
        };
        let v = if v.is_infinite() { f32::MAX.copysign(v) } else { v };
        (f64::from(v), true)
    } else {
        let Ok(v) = s.parse::<f64>() else {
            return (0.0, false);
        };
        let v = if v.is_infinite() { f64::MAX.copysign(v) } else { v };
        (v, true)
    }
}

/// Appends the unescaped content of the quoted string `src` (including its
/// surrounding quotes) to `dst`.
///
/// `src` must already have passed [`consume_string`]; escape errors cannot
/// occur here. Unpaired surrogate escapes decode to U+FFFD; invalid UTF-8
/// bytes are copied through verbatim.
pub(crate) fn append_unquoted(dst: &mut Vec<u8>, src: &[u8]) {
    let inner = match (src.first(), src.last()) {
        (Some(&b'"'), Some(&b'"')) if src.len() >= 2 => &src[1..src.len() - 1],
        _ => src,
    };
    let mut i = 0;
    while i < inner.len() {
        let c = inner[i];
        if c != b'\\' {
            // Copy the longest escape-free run in one go.
            let start = i;
            while i < inner.len() && inner[i] != b'\\' {
                i += 1;
            }
            dst.extend_from_slice(&inner[start..i]);
            continue;
        }
        let Some(&e) = inner.get(i + 1) else {
            dst.push(c);
            break;
        };
        match e {
            b'"' | b'\\' | b'/' => dst.push(e),
            b'b' => dst.push(0x08),
            b'f' => dst.push(0x0C),
            b'n' => dst.push(b'\n'),
            b'r' => dst.push(b'\r'),
            b't' => dst.push(b'\t'),
            b'u' => {
                let hi = parse_hex_uint16(&inner[i + 2..]).unwrap_or(0xFFFD);
                match hi {
                    0xD800..=0xDBFF => {
                        let lo = (inner.get(i + 6..i + 8) == Some(&b"\\u"[..]))
                            .then(|| parse_hex_uint16(&inner[i + 8..]))
                            .flatten();
                        match lo {
                            Some(lo @ 0xDC00..=0xDFFF) => {
                                let cp = 0x10000
                                    + ((u32::from(hi) - 0xD800) << 10)
                                    + (u32::from(lo) - 0xDC00);
                                push_char(dst, char::from_u32(cp).unwrap_or('\u{FFFD}'));
                                i += 12;
                                continue;
                            }
                            _ => push_char(dst, '\u{FFFD}'),
                        }
                    }
                    0xDC00..=0xDFFF => push_char(dst, '\u{FFFD}'),
                    _ => push_char(dst, char::from_u32(u32::from(hi)).unwrap_or('\u{FFFD}')),
                }
                i += 6;
                continue;
            }
            _ => dst.push(e),
        }
        i += 2;
    }
}

fn push_char(dst: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    dst.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn whitespace_is_exactly_four_bytes() {
        assert_eq!(consume_whitespace(b" \t\r\n x"), 4);
        // U+00A0 (non-breaking space) is not JSON whitespace.
        assert_eq!(consume_whitespace("\u{00A0}".as_bytes()), 0);
    }

    #[rstest]
    #[case(b"null", Literal::Null, Ok(4))]
    #[case(b"nul", Literal::Null, Err((3, false)))]
    #[case(b"nuXl", Literal::Null, Err((2, true)))]
    #[case(b"true,", Literal::True, Ok(4))]
    #[case(b"false}", Literal::False, Ok(5))]
    fn literals(
        #[case] input: &[u8],
        #[case] lit: Literal,
        #[case] want: Result<usize, (usize, bool)>,
    ) {
        match (consume_literal(input, lit), want) {
            (Ok(n), Ok(w)) => assert_eq!(n, w),
            (Err(e), Err((pos, mismatch))) => {
                assert_eq!(e.pos, pos);
                assert_eq!(
                    matches!(e.kind, SyntaxErrorKind::InvalidLiteral { .. }),
                    mismatch,
                    "{e:?}"
                );
            }
            (got, want) => panic!("got {got:?}, want {want:?}"),
        }
    }

    #[rstest]
    #[case(b"0,", 1)]
    #[case(b"-0,", 2)]
    #[case(b"123]", 3)]
    #[case(b"-123 ", 4)]
    #[case(b"0.5}", 3)]
    #[case(b"1e9,", 3)]
    #[case(b"1E+9,", 4)]
    #[case(b"1.25e-3 ", 7)]
    fn numbers_good(#[case] input: &[u8], #[case] n: usize) {
        let scan = consume_number(input).unwrap();
        assert!(scan.done);
        assert_eq!(scan.n, n);
    }

    #[rstest]
    #[case(b"-x", 1)]
    #[case(b"1.x", 2)]
    #[case(b"1ex", 2)]
    #[case(b"1e+x", 3)]
    #[case(b"+1", 0)]
    #[case(b".5", 0)]
    fn numbers_bad(#[case] input: &[u8], #[case] pos: usize) {
        let err = consume_number(input).unwrap_err();
        assert_eq!(err.pos, pos);
    }

    #[test]
    fn number_resumes_across_buffers() {
        // "12" then "3.5" then "e2," fed in pieces.
        let scan = consume_number(b"12").unwrap();
        assert!(!scan.done);
        let scan = consume_number_resumable(b"123.5", scan.n, scan.state).unwrap();
        assert!(!scan.done);
        let scan = consume_number_resumable(b"123.5e2,", scan.n, scan.state).unwrap();
        assert!(scan.done);
        assert_eq!(scan.n, 7);
    }

    #[test]
    fn number_leading_zero_stops_early() {
        let scan = consume_number(b"01").unwrap();
        assert!(scan.done);
        assert_eq!(scan.n, 1);
    }

    #[test]
    fn simple_number_fast_path() {
        assert_eq!(consume_simple_number(b"12345,"), 5);
        assert_eq!(consume_simple_number(b"0,"), 1);
        assert_eq!(consume_simple_number(b"12345"), 0); // no terminator visible
        assert_eq!(consume_simple_number(b"12.5,"), 0);
        assert_eq!(consume_simple_number(b"-1,"), 0);
        assert_eq!(consume_simple_number(b"01,"), 0);
    }

    #[test]
    fn strings_track_flags() {
        let mut flags = ValueFlags::default();
        let scan = consume_string(b"\"abc\"", &mut flags, true).unwrap();
        assert!(scan.done);
        assert_eq!(scan.n, 5);
        assert!(flags.is_verbatim() && flags.is_canonical());

        let mut flags = ValueFlags::default();
        let scan = consume_string(br#""a\nb""#, &mut flags, true).unwrap();
        assert!(scan.done);
        assert!(!flags.is_verbatim());
        assert!(flags.is_canonical());

        let mut flags = ValueFlags::default();
        consume_string(br#""a\/b""#, &mut flags, true).unwrap();
        assert!(!flags.is_canonical());
    }

    #[test]
    fn string_surrogate_pairs() {
        let mut flags = ValueFlags::default();
        let scan = consume_string(br#""\ud83d\ude00""#, &mut flags, true).unwrap();
        assert!(scan.done);
        assert_eq!(scan.n, 14);
        assert!(!flags.is_canonical());

        let mut flags = ValueFlags::default();
        let err = consume_string(br#""\ud83d!""#, &mut flags, true).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidUnicodeEscape);

        // Unpaired surrogates pass when UTF-8 validation is off.
        let mut flags = ValueFlags::default();
        let scan = consume_string(br#""\ud83d!""#, &mut flags, false).unwrap();
        assert!(scan.done);
    }

    #[test]
    fn string_resume_points_are_safe() {
        let input = "\"ab\u{e9}cd\"".as_bytes();
        // Feed the input one byte at a time, resuming each round.
        let mut flags = ValueFlags::default();
        let mut n = 0;
        for end in 1..=input.len() {
            let scan = consume_string_resumable(&input[..end], n, &mut flags, true).unwrap();
            n = scan.n;
            if scan.done {
                assert_eq!(end, input.len());
                assert_eq!(n, input.len());
                return;
            }
        }
        panic!("string never completed");
    }

    #[test]
    fn string_invalid_utf8_position() {
        // "living" followed by DE AD BE EF: DE AD is a valid two-byte
        // sequence, BE is a bare continuation byte at offset 9.
        let mut input = Vec::from(&b"\"living"[..]);
        input.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        input.push(b'"');
        let mut flags = ValueFlags::default();
        let err = consume_string(&input, &mut flags, true).unwrap_err();
        assert_eq!(err.pos, 9);
        assert_eq!(err.kind, SyntaxErrorKind::InvalidUtf8);

        let mut flags = ValueFlags::default();
        let scan = consume_string(&input, &mut flags, false).unwrap();
        assert!(scan.done);
        assert!(!flags.is_canonical());
    }

    #[test]
    fn simple_string_fast_path() {
        assert_eq!(consume_simple_string(b"\"abc\""), 5);
        assert_eq!(consume_simple_string(b"\"\""), 2);
        assert_eq!(consume_simple_string(br#""a\n""#), 0);
        assert_eq!(consume_simple_string("\"é\"".as_bytes()), 0);
        assert_eq!(consume_simple_string(b"\"abc"), 0);
    }

    #[test]
    fn hex_and_dec_parsing() {
        assert_eq!(parse_hex_uint16(b"00e9"), Some(0x00E9));
        assert_eq!(parse_hex_uint16(b"FFFF"), Some(0xFFFF));
        assert_eq!(parse_hex_uint16(b"00g9"), None);
        assert_eq!(parse_hex_uint16(b"0e"), None);

        assert_eq!(parse_dec_uint(b"0"), (0, true));
        assert_eq!(parse_dec_uint(b"18446744073709551615"), (u64::MAX, true));
        assert_eq!(parse_dec_uint(b"18446744073709551616"), (u64::MAX, false));
        assert_eq!(parse_dec_uint(b"12x"), (0, false));
        assert_eq!(parse_dec_uint(b""), (0, false));
    }

    #[test]
    fn float_parsing_saturates() {
        assert_eq!(parse_float(b"1.5", 64), (1.5, true));
        assert_eq!(parse_float(b"1e999", 64), (f64::MAX, true));
        assert_eq!(parse_float(b"-1e999", 64), (-f64::MAX, true));
        assert_eq!(parse_float(b"1e39", 32), (f64::from(f32::MAX), true));
    }

    #[test]
    fn unquote_decodes_escapes() {
        let mut out = Vec::new();
        append_unquoted(&mut out, br#""a\n\u00e9\ud83d\ude00b""#);
        assert_eq!(out, "a\n\u{e9}\u{1F600}b".as_bytes());

        let mut out = Vec::new();
        append_unquoted(&mut out, br#""\ud800x""#);
        assert_eq!(out, "\u{FFFD}x".as_bytes());
    }

    #[test]
    fn utf8_checker_rejects_overlongs_and_surrogates() {
        assert_eq!(check_utf8(&[0xC0, 0xAF]), Utf8Status::Invalid);
        assert_eq!(check_utf8(&[0xED, 0xA0, 0x80]), Utf8Status::Invalid); // U+D800
        assert_eq!(check_utf8(&[0xF4, 0x90, 0x80, 0x80]), Utf8Status::Invalid);
        assert_eq!(check_utf8(&[0xE2, 0x82]), Utf8Status::Short);
        assert_eq!(check_utf8("€".as_bytes()), Utf8Status::Valid(3));
    }
}
