//! String escaping for the encoder.
//!
//! Every control character, `"`, and `\` must be escaped; `/` is left
//! verbatim. `<`, `>`, and `&` are escaped only under the HTML-safe option,
//! U+2028/U+2029 only under the JS-safe option. Invalid UTF-8 either errors
//! (the default) or is replaced with U+FFFD.

use crate::error::SyntaxErrorKind;
use crate::options::EncodeOptions;
use crate::scan::{self, Utf8Status};

// Bytes that always force the slow path: controls, '"', '\', and anything
// past ASCII. The table is indexed by the byte value.
static NEEDS_ESCAPE: [bool; 256] = {
    let mut t = [false; 256];
    let mut i = 0;
    while i < 256 {
        t[i] = i < 0x20 || i == b'"' as usize || i == b'\\' as usize || i >= 0x80;
        i += 1;
    }
    t
};

fn escape_needed(b: u8, opts: &EncodeOptions) -> bool {
    NEEDS_ESCAPE[b as usize] || (opts.escape_for_html && matches!(b, b'<' | b'>' | b'&'))
}

/// Appends `src` as a quoted JSON string, escaping per `opts`.
///
/// `src` holds the raw (unescaped) content. Fails with
/// [`SyntaxErrorKind::InvalidUtf8`] on invalid UTF-8 unless the options
/// allow it, in which case the offending bytes become U+FFFD. On error
/// `dst` is rewound to its original length.
pub(crate) fn append_quoted(
    dst: &mut Vec<u8>,
    src: &[u8],
    opts: &EncodeOptions,
) -> Result<(), SyntaxErrorKind> {
    let rewind = dst.len();
    dst.push(b'"');
    let mut i = 0;
    while i < src.len() {
        // Longest run that needs no attention at all.
        let start = i;
        while i < src.len() && !escape_needed(src[i], opts) {
            i += 1;
        }
        dst.extend_from_slice(&src[start..i]);
        let Some(&c) = src.get(i) else { break };
        if c < 0x80 {
            append_escaped_ascii(dst, c);
            i += 1;
            continue;
        }
        match scan::check_utf8(&src[i..]) {
            Utf8Status::Valid(len) => {
                // U+2028 (E2 80 A8) and U+2029 (E2 80 A9) are the only
                // multi-byte characters with an escape of their own.
                if opts.escape_for_js
                    && len == 3
                    && src[i] == 0xE2
                    && src[i + 1] == 0x80
                    && (src[i + 2] == 0xA8 || src[i + 2] == 0xA9)
                {
                    let low = if src[i + 2] == 0xA8 { b'8' } else { b'9' };
                    dst.extend_from_slice(b"\\u202");
                    dst.push(low);
                } else {
                    dst.extend_from_slice(&src[i..i + len]);
                }
                i += len;
            }
            Utf8Status::Invalid | Utf8Status::Short => {
                if !opts.allow_invalid_utf8 {
                    dst.truncate(rewind);
                    return Err(SyntaxErrorKind::InvalidUtf8);
                }
                dst.extend_from_slice("\u{FFFD}".as_bytes());
                i += 1;
            }
        }
    }
    dst.push(b'"');
    Ok(())
}

fn append_escaped_ascii(dst: &mut Vec<u8>, c: u8) {
    match c {
        b'"' => dst.extend_from_slice(b"\\\""),
        b'\\' => dst.extend_from_slice(b"\\\\"),
        0x08 => dst.extend_from_slice(b"\\b"),
        0x0C => dst.extend_from_slice(b"\\f"),
        b'\n' => dst.extend_from_slice(b"\\n"),
        b'\r' => dst.extend_from_slice(b"\\r"),
        b'\t' => dst.extend_from_slice(b"\\t"),
        _ => {
            const HEX: &[u8; 16] = b"0123456789abcdef";
            dst.extend_from_slice(b"\\u00");
            dst.push(HEX[usize::from(c >> 4)]);
            dst.push(HEX[usize::from(c & 0xF)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(src: &[u8], opts: &EncodeOptions) -> Result<String, SyntaxErrorKind> {
        let mut out = Vec::new();
        append_quoted(&mut out, src, opts)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    #[test]
    fn minimal_escapes() {
        let opts = EncodeOptions::default();
        assert_eq!(quote(b"a/b", &opts).unwrap(), r#""a/b""#);
        assert_eq!(quote(b"a\"b\\c", &opts).unwrap(), "\"a\\\"b\\\\c\"");
        assert_eq!(quote(b"\x08\x0C\n\r\t", &opts).unwrap(), "\"\\b\\f\\n\\r\\t\"");
        assert_eq!(quote(b"\x00\x1f", &opts).unwrap(), "\"\\u0000\\u001f\"");
        assert_eq!(quote("\u{e9}".as_bytes(), &opts).unwrap(), "\"\u{e9}\"");
    }

    #[test]
    fn html_and_js_supersets() {
        let mut opts = EncodeOptions::default();
        assert_eq!(quote(b"<&>", &opts).unwrap(), r#""<&>""#);
        opts.escape_for_html = true;
        assert_eq!(quote(b"<&>", &opts).unwrap(), "\"\\u003c\\u0026\\u003e\"");

        let mut opts = EncodeOptions::default();
        assert_eq!(quote("\u{2028}".as_bytes(), &opts).unwrap(), "\"\u{2028}\"");
        opts.escape_for_js = true;
        assert_eq!(quote("\u{2028}\u{2029}".as_bytes(), &opts).unwrap(), "\"\\u2028\\u2029\"");
    }

    #[test]
    fn invalid_utf8_policy() {
        let mut opts = EncodeOptions::default();
        assert_eq!(quote(b"a\xFFb", &opts), Err(SyntaxErrorKind::InvalidUtf8));
        opts.allow_invalid_utf8 = true;
        assert_eq!(quote(b"a\xFFb", &opts).unwrap(), "\"a\u{FFFD}b\"");
    }
}
