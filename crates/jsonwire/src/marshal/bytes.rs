//! Binary data as base64 (or hex) JSON strings.
//!
//! `Vec<u8>` marshals as an array of numbers through the generic sequence
//! implementation; the [`ByteBuf`] and [`ByteArray`] wrappers opt into the
//! string encodings. The default alphabet is standard base64 with
//! padding; fields may select `format:base64url` or `format:hex`.

use std::any::type_name;
use std::fmt;
use std::ops::{Deref, DerefMut};

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;

use crate::error::{Action, Error, SemanticError};
use crate::marshal::{FieldFormat, MarshalJson, MarshalState, UnmarshalJson, UnmarshalState};
use crate::token::{Kind, Token};

/// A growable byte string that marshals as base64.
///
/// # Examples
///
/// ```
/// use jsonwire::ByteBuf;
///
/// let b = ByteBuf::from(vec![1, 2, 3]);
/// assert_eq!(jsonwire::marshal(&b).unwrap(), br#""AQID""#);
/// let back: ByteBuf = jsonwire::unmarshal(br#""AQID""#).unwrap();
/// assert_eq!(back.as_slice(), [1, 2, 3]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuf(pub Vec<u8>);

impl ByteBuf {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> ByteBuf {
        ByteBuf(Vec::new())
    }

    /// Consumes the wrapper, returning the bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for ByteBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for ByteBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl From<Vec<u8>> for ByteBuf {
    fn from(v: Vec<u8>) -> ByteBuf {
        ByteBuf(v)
    }
}

impl From<&[u8]> for ByteBuf {
    fn from(v: &[u8]) -> ByteBuf {
        ByteBuf(v.to_vec())
    }
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuf({:?})", bstr::BStr::new(&self.0))
    }
}

/// A fixed-length byte array that marshals as base64 and demands an
/// exact-length match when decoding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ByteArray<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for ByteArray<N> {
    fn default() -> ByteArray<N> {
        ByteArray([0; N])
    }
}

impl<const N: usize> Deref for ByteArray<N> {
    type Target = [u8; N];

    fn deref(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> DerefMut for ByteArray<N> {
    fn deref_mut(&mut self) -> &mut [u8; N] {
        &mut self.0
    }
}

impl<const N: usize> From<[u8; N]> for ByteArray<N> {
    fn from(v: [u8; N]) -> ByteArray<N> {
        ByteArray(v)
    }
}

impl<const N: usize> fmt::Debug for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({:?})", bstr::BStr::new(&self.0))
    }
}

/// The string encoding a byte field uses.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    Base64,
    Base64Url,
    Hex,
}

impl Alphabet {
    fn name(self) -> &'static str {
        match self {
            Alphabet::Base64 => "base64",
            Alphabet::Base64Url => "base64url",
            Alphabet::Hex => "hex",
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Alphabet::Base64 => STANDARD.encode(bytes),
            Alphabet::Base64Url => URL_SAFE.encode(bytes),
            Alphabet::Hex => hex_encode(bytes),
        }
    }

    fn decode(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Alphabet::Base64 => STANDARD.decode(text).map_err(|e| e.to_string()),
            Alphabet::Base64Url => URL_SAFE.decode(text).map_err(|e| e.to_string()),
            Alphabet::Hex => hex_decode(text),
        }
    }
}

fn alphabet_for<T: ?Sized>(
    action: Action,
    format: Option<FieldFormat>,
) -> Result<Alphabet, Error> {
    match format {
        None | Some(FieldFormat::Base64) => Ok(Alphabet::Base64),
        Some(FieldFormat::Base64Url) => Ok(Alphabet::Base64Url),
        Some(FieldFormat::Hex) => Ok(Alphabet::Hex),
        Some(f) => Err(SemanticError::new(action, type_name::<T>())
            .with_reason(format!("format {:?} not applicable", f.name()))
            .into()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[usize::from(b >> 4)] as char);
        out.push(HEX[usize::from(b & 0xF)] as char);
    }
    out
}

fn hex_decode(text: &str) -> Result<Vec<u8>, String> {
    let b = text.as_bytes();
    if b.len() % 2 != 0 {
        return Err("odd-length hex string".to_string());
    }
    let digit = |c: u8| -> Result<u8, String> {
        match c {
            b'0'..=b'9' => Ok(c - b'0'),
            b'a'..=b'f' => Ok(c - b'a' + 10),
            b'A'..=b'F' => Ok(c - b'A' + 10),
            _ => Err(format!("invalid hex digit {:?}", c as char)),
        }
    };
    let mut out = Vec::with_capacity(b.len() / 2);
    for pair in b.chunks_exact(2) {
        out.push((digit(pair[0])? << 4) | digit(pair[1])?);
    }
    Ok(out)
}

fn marshal_bytes<T: ?Sized>(
    bytes: &[u8],
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    let alphabet = alphabet_for::<T>(Action::Marshal, st.take_format())?;
    let text = alphabet.encode(bytes);
    st.enc.write_token(&Token::string(&text))
}

fn unmarshal_bytes<T: ?Sized>(st: &mut UnmarshalState<'_, '_>) -> Result<Option<Vec<u8>>, Error> {
    let alphabet = alphabet_for::<T>(Action::Unmarshal, st.take_format())?;
    let tok = st.dec.read_token()?;
    match tok.kind() {
        Kind::NULL => Ok(None),
        Kind::STRING => {
            let Some(text) = tok.as_str() else {
                return Err(SemanticError::new(Action::Unmarshal, type_name::<T>())
                    .with_kind(Kind::STRING)
                    .with_reason("string content is not valid UTF-8")
                    .into());
            };
            match alphabet.decode(text) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(detail) => Err(SemanticError::new(Action::Unmarshal, type_name::<T>())
                    .with_kind(Kind::STRING)
                    .with_reason(format!("invalid {} string: {detail}", alphabet.name()))
                    .into()),
            }
        }
        kind => {
            Err(SemanticError::new(Action::Unmarshal, type_name::<T>()).with_kind(kind).into())
        }
    }
}

impl MarshalJson for ByteBuf {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        marshal_bytes::<ByteBuf>(&self.0, st)
    }

    fn json_is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl UnmarshalJson for ByteBuf {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        match unmarshal_bytes::<ByteBuf>(st)? {
            Some(bytes) => self.0 = bytes,
            None => self.0.clear(),
        }
        Ok(())
    }
}

impl<const N: usize> MarshalJson for ByteArray<N> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        marshal_bytes::<ByteArray<N>>(&self.0, st)
    }

    fn json_is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl<const N: usize> UnmarshalJson for ByteArray<N> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        // Peek at the format before the shared path consumes it, so the
        // length-mismatch message can name the encoding in use.
        let encoding = match st.format {
            Some(FieldFormat::Base64Url) => "base64url",
            Some(FieldFormat::Hex) => "hex",
            _ => "base64",
        };
        match unmarshal_bytes::<ByteArray<N>>(st)? {
            Some(bytes) => {
                if bytes.len() != N {
                    return Err(SemanticError::new(Action::Unmarshal, type_name::<ByteArray<N>>())
                        .with_kind(Kind::STRING)
                        .with_reason(format!(
                            "decoded {encoding} length of {} mismatches array length of {}",
                            bytes.len(),
                            N
                        ))
                        .into());
                }
                self.0.copy_from_slice(&bytes);
            }
            None => self.0 = [0; N],
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal, unmarshal};

    #[test]
    fn byte_buffers_use_base64() {
        let b = ByteBuf::from(&b"hello world"[..]);
        let out = marshal(&b).unwrap();
        assert_eq!(out, br#""aGVsbG8gd29ybGQ=""#);
        let back: ByteBuf = unmarshal(&out).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn byte_array_length_must_match_exactly() {
        let a: ByteArray<3> = unmarshal(br#""AQID""#).unwrap();
        assert_eq!(a.0, [1, 2, 3]);
        let err = unmarshal::<ByteArray<2>>(br#""AQID""#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cannot unmarshal JSON string"), "{msg}");
        assert!(msg.contains("decoded base64 length of 3 mismatches array length of 2"), "{msg}");
        let err = unmarshal::<ByteArray<4>>(br#""AQID""#).unwrap_err();
        assert!(err.to_string().contains("mismatches array length of 4"), "{err}");
    }

    #[test]
    fn null_clears_bytes() {
        let mut b = ByteBuf::from(vec![1]);
        crate::unmarshal_into(b"null", &mut b).unwrap();
        assert!(b.is_empty());
        let a: ByteArray<2> = unmarshal(b"null").unwrap();
        assert_eq!(a.0, [0, 0]);
    }

    #[test]
    fn invalid_base64_is_semantic() {
        let err = unmarshal::<ByteBuf>(br#""!!!""#).unwrap_err();
        assert!(err.to_string().contains("invalid base64"), "{err}");
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(hex_encode(&[0xDE, 0xAD]), "dead");
        assert_eq!(hex_decode("DEad").unwrap(), [0xDE, 0xAD]);
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }
}
