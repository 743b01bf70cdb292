//! Marshaling for the primitive kinds: booleans, integers, floats,
//! characters, and strings.

use std::any::type_name;
use std::borrow::Cow;

use crate::error::{Action, Error, SemanticError};
use crate::marshal::{MarshalJson, MarshalState, UnmarshalJson, UnmarshalState};
use crate::scan;
use crate::token::{Kind, Token};

fn mismatch<T: ?Sized>(action: Action, kind: Kind) -> Error {
    SemanticError::new(action, type_name::<T>()).with_kind(kind).into()
}

impl MarshalJson for bool {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("bool")?;
        st.enc.write_token(&Token::bool(*self))
    }

    fn json_is_zero(&self) -> bool {
        !*self
    }
}

impl UnmarshalJson for bool {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("bool")?;
        let tok = st.dec.read_token()?;
        *self = match tok.kind() {
            Kind::NULL | Kind::FALSE => false,
            Kind::TRUE => true,
            kind => return Err(mismatch::<bool>(Action::Unmarshal, kind)),
        };
        Ok(())
    }
}

/// Outcome of reading integer text: the magnitude and sign, or which of
/// the two failure classes applies.
enum IntText {
    Value { neg: bool, mag: u64 },
    NotInteger,
    OutOfRange,
}

fn parse_int_text(text: &str) -> IntText {
    let b = text.as_bytes();
    let (neg, digits) = match b.first() {
        Some(&b'-') => (true, &b[1..]),
        _ => (false, b),
    };
    match scan::parse_dec_uint(digits) {
        (mag, true) => IntText::Value { neg, mag },
        // Saturation distinguishes too-long digit strings from text that
        // is not an integer at all.
        (u64::MAX, false) => IntText::OutOfRange,
        _ => IntText::NotInteger,
    }
}

/// Validates that a stringified payload is exactly one JSON number.
fn whole_number(text: &str) -> bool {
    match scan::consume_number(text.as_bytes()) {
        Ok(s) => s.n == text.len() && s.state.terminal(),
        Err(_) => false,
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl MarshalJson for $t {
            fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                if st.stringify {
                    let mut buf = itoa::Buffer::new();
                    st.enc.write_token(&Token::string(buf.format(*self)))
                } else {
                    st.enc.write_token(&Token::int(i64::from(*self)))
                }
            }

            fn json_is_zero(&self) -> bool {
                *self == 0
            }
        }

        impl UnmarshalJson for $t {
            fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                let stringify = st.stringify;
                let tok = st.dec.read_token()?;
                let text: Cow<'_, str> = match tok.kind() {
                    Kind::NULL => {
                        *self = 0;
                        return Ok(());
                    }
                    Kind::NUMBER => tok.number_text().unwrap_or("0").into(),
                    Kind::STRING if stringify => {
                        let Some(s) = tok.as_str() else {
                            return Err(mismatch::<$t>(Action::Unmarshal, Kind::STRING));
                        };
                        if !whole_number(s) {
                            return Err(SemanticError::new(Action::Unmarshal, stringify!($t))
                                .with_kind(Kind::STRING)
                                .with_reason(format!("cannot parse {s:?} as an integer"))
                                .into());
                        }
                        s.to_owned().into()
                    }
                    kind => return Err(mismatch::<$t>(Action::Unmarshal, kind)),
                };
                *self = match parse_int_text(&text) {
                    IntText::Value { neg, mag } => {
                        let wide = if neg { -(mag as i128) } else { mag as i128 };
                        <$t>::try_from(wide).map_err(|_| range_err::<$t>(&text))?
                    }
                    IntText::OutOfRange => return Err(range_err::<$t>(&text)),
                    IntText::NotInteger => {
                        return Err(SemanticError::new(Action::Unmarshal, stringify!($t))
                            .with_kind(Kind::NUMBER)
                            .with_reason("number has a fraction or exponent")
                            .into());
                    }
                };
                Ok(())
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl MarshalJson for $t {
            fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                if st.stringify {
                    let mut buf = itoa::Buffer::new();
                    st.enc.write_token(&Token::string(buf.format(*self)))
                } else {
                    st.enc.write_token(&Token::uint(u64::from(*self)))
                }
            }

            fn json_is_zero(&self) -> bool {
                *self == 0
            }
        }

        impl UnmarshalJson for $t {
            fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                let stringify = st.stringify;
                let tok = st.dec.read_token()?;
                let text: Cow<'_, str> = match tok.kind() {
                    Kind::NULL => {
                        *self = 0;
                        return Ok(());
                    }
                    Kind::NUMBER => tok.number_text().unwrap_or("0").into(),
                    Kind::STRING if stringify => {
                        let Some(s) = tok.as_str() else {
                            return Err(mismatch::<$t>(Action::Unmarshal, Kind::STRING));
                        };
                        if !whole_number(s) {
                            return Err(SemanticError::new(Action::Unmarshal, stringify!($t))
                                .with_kind(Kind::STRING)
                                .with_reason(format!("cannot parse {s:?} as an integer"))
                                .into());
                        }
                        s.to_owned().into()
                    }
                    kind => return Err(mismatch::<$t>(Action::Unmarshal, kind)),
                };
                *self = match parse_int_text(&text) {
                    IntText::Value { neg: true, mag: 0 } => 0,
                    IntText::Value { neg: true, .. } => return Err(range_err::<$t>(&text)),
                    IntText::Value { neg: false, mag } => {
                        <$t>::try_from(mag).map_err(|_| range_err::<$t>(&text))?
                    }
                    IntText::OutOfRange => return Err(range_err::<$t>(&text)),
                    IntText::NotInteger => {
                        return Err(SemanticError::new(Action::Unmarshal, stringify!($t))
                            .with_kind(Kind::NUMBER)
                            .with_reason("number has a fraction or exponent")
                            .into());
                    }
                };
                Ok(())
            }
        }
    )*};
}

fn range_err<T>(text: &str) -> Error {
    SemanticError::new(Action::Unmarshal, type_name::<T>())
        .with_kind(Kind::NUMBER)
        .with_reason(format!("value {text} out of range"))
        .into()
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

// The platform-width types route through their fixed-width siblings.
impl MarshalJson for isize {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        (*self as i64).marshal_json(st)
    }

    fn json_is_zero(&self) -> bool {
        *self == 0
    }
}

impl UnmarshalJson for isize {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let mut wide: i64 = 0;
        wide.unmarshal_json(st)?;
        *self = isize::try_from(wide).map_err(|_| range_err::<isize>(&wide.to_string()))?;
        Ok(())
    }
}

impl MarshalJson for usize {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        (*self as u64).marshal_json(st)
    }

    fn json_is_zero(&self) -> bool {
        *self == 0
    }
}

impl UnmarshalJson for usize {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let mut wide: u64 = 0;
        wide.unmarshal_json(st)?;
        *self = usize::try_from(wide).map_err(|_| range_err::<usize>(&wide.to_string()))?;
        Ok(())
    }
}

macro_rules! impl_float {
    ($t:ty, $bits:expr, $token:path) => {
        impl MarshalJson for $t {
            fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                if st.stringify {
                    if !self.is_finite() {
                        let reason = if self.is_nan() {
                            "float value is NaN"
                        } else {
                            "float value is infinite"
                        };
                        return Err(SemanticError::new(Action::Marshal, stringify!($t))
                            .with_kind(Kind::NUMBER)
                            .with_reason(reason)
                            .into());
                    }
                    let mut buf = ryu::Buffer::new();
                    let text = buf.format_finite(*self);
                    let text = text.strip_suffix(".0").unwrap_or(text);
                    st.enc.write_token(&Token::string(text))
                } else {
                    // The encoder rejects non-finite payloads.
                    st.enc.write_token(&$token(*self))
                }
            }

            fn json_is_zero(&self) -> bool {
                *self == 0.0
            }
        }

        impl UnmarshalJson for $t {
            fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
                st.reject_format(stringify!($t))?;
                let stringify = st.stringify;
                let tok = st.dec.read_token()?;
                match tok.kind() {
                    Kind::NULL => *self = 0.0,
                    Kind::NUMBER => {
                        let text = tok.number_text().unwrap_or("0");
                        let (v, _) = scan::parse_float(text.as_bytes(), $bits);
                        *self = v as $t;
                    }
                    Kind::STRING if stringify => {
                        let Some(s) = tok.as_str() else {
                            return Err(mismatch::<$t>(Action::Unmarshal, Kind::STRING));
                        };
                        *self = match s {
                            "NaN" => <$t>::NAN,
                            "Infinity" => <$t>::INFINITY,
                            "-Infinity" => <$t>::NEG_INFINITY,
                            _ if whole_number(s) => {
                                let (v, _) = scan::parse_float(s.as_bytes(), $bits);
                                v as $t
                            }
                            _ => {
                                return Err(SemanticError::new(
                                    Action::Unmarshal,
                                    stringify!($t),
                                )
                                .with_kind(Kind::STRING)
                                .with_reason(format!("cannot parse {s:?} as a number"))
                                .into());
                            }
                        };
                    }
                    kind => return Err(mismatch::<$t>(Action::Unmarshal, kind)),
                }
                Ok(())
            }
        }
    };
}

impl_float!(f64, 64, Token::float);
impl_float!(f32, 32, Token::float32);

impl MarshalJson for str {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("str")?;
        st.enc.write_token(&Token::string(self))
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl MarshalJson for String {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        self.as_str().marshal_json(st)
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl UnmarshalJson for String {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("String")?;
        let tok = st.dec.read_token()?;
        match tok.kind() {
            Kind::NULL => self.clear(),
            Kind::STRING => {
                let Some(s) = tok.as_str() else {
                    return Err(SemanticError::new(Action::Unmarshal, "String")
                        .with_kind(Kind::STRING)
                        .with_reason("string content is not valid UTF-8")
                        .into());
                };
                self.clear();
                self.push_str(s);
            }
            kind => return Err(mismatch::<String>(Action::Unmarshal, kind)),
        }
        Ok(())
    }
}

impl MarshalJson for Cow<'_, str> {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        self.as_ref().marshal_json(st)
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl UnmarshalJson for Cow<'_, str> {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let mut s = String::new();
        s.unmarshal_json(st)?;
        *self = Cow::Owned(s);
        Ok(())
    }
}

impl MarshalJson for char {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("char")?;
        let mut tmp = [0u8; 4];
        st.enc.write_token(&Token::string(self.encode_utf8(&mut tmp)))
    }

    fn json_is_zero(&self) -> bool {
        *self == '\0'
    }
}

impl UnmarshalJson for char {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("char")?;
        let tok = st.dec.read_token()?;
        match tok.kind() {
            Kind::NULL => *self = '\0',
            Kind::STRING => {
                let mut chars = tok.as_str().unwrap_or_default().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => *self = c,
                    _ => {
                        return Err(SemanticError::new(Action::Unmarshal, "char")
                            .with_kind(Kind::STRING)
                            .with_reason("expected a one-character string")
                            .into());
                    }
                }
            }
            kind => return Err(mismatch::<char>(Action::Unmarshal, kind)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{marshal, unmarshal, unmarshal_with, MarshalOptions};

    #[test]
    fn integer_extremes_round_trip() {
        for (input, want) in [
            ("-9223372036854775808", i64::MIN),
            ("9223372036854775807", i64::MAX),
        ] {
            let v: i64 = unmarshal(input.as_bytes()).unwrap();
            assert_eq!(v, want);
            assert_eq!(marshal(&v).unwrap(), input.as_bytes());
        }
        let v: u64 = unmarshal(b"18446744073709551615").unwrap();
        assert_eq!(v, u64::MAX);
    }

    #[test]
    fn one_past_the_extremes_is_a_range_error() {
        for input in ["-9223372036854775809", "9223372036854775808"] {
            let err = unmarshal::<i64>(input.as_bytes()).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }
        let err = unmarshal::<u64>(b"18446744073709551616").unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        let err = unmarshal::<u8>(b"256").unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn fractions_into_integers_name_the_type() {
        let err = unmarshal::<i32>(b"1.5").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("i32") && msg.contains("fraction"), "{msg}");
        let err = unmarshal::<i32>(b"1e2").unwrap_err();
        assert!(err.to_string().contains("fraction or exponent"), "{err}");
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(unmarshal::<i64>(b"-0").unwrap(), 0);
        assert_eq!(unmarshal::<u32>(b"-0").unwrap(), 0);
    }

    #[test]
    fn stringified_numbers() {
        let opts = MarshalOptions { stringify_numbers: true, ..MarshalOptions::default() };
        assert_eq!(crate::marshal_with(&42_i32, &opts).unwrap(), b"\"42\"");
        let v: i32 = unmarshal_with(b"\"-7\"", &opts).unwrap();
        assert_eq!(v, -7);
        let err = unmarshal_with::<i32>(b"\"x\"", &opts).unwrap_err();
        assert!(err.to_string().contains("cannot parse"), "{err}");
    }

    #[test]
    fn float_saturation_and_shortness() {
        let v: f64 = unmarshal(b"1e999").unwrap();
        assert_eq!(v, f64::MAX);
        let v: f32 = unmarshal(b"-1e999").unwrap();
        assert_eq!(v, f32::MIN);
        assert_eq!(marshal(&0.1_f64).unwrap(), b"0.1");
        assert_eq!(marshal(&1.0_f64).unwrap(), b"1");
    }

    #[test]
    fn non_finite_floats_reject() {
        assert!(marshal(&f64::NAN).is_err());
        assert!(marshal(&f32::INFINITY).is_err());
        let opts = MarshalOptions { stringify_numbers: true, ..MarshalOptions::default() };
        assert!(crate::marshal_with(&f64::NAN, &opts).is_err());
        let v: f64 = unmarshal_with(b"\"NaN\"", &opts).unwrap();
        assert!(v.is_nan());
    }

    #[test]
    fn null_clears_primitives() {
        assert_eq!(unmarshal::<i32>(b"null").unwrap(), 0);
        assert!(!unmarshal::<bool>(b"null").unwrap());
        assert_eq!(unmarshal::<String>(b"null").unwrap(), "");
    }

    #[test]
    fn strings_and_chars() {
        assert_eq!(marshal(&String::from("a\"b")).unwrap(), br#""a\"b""#);
        assert_eq!(unmarshal::<String>(b"\"caf\\u00e9\"").unwrap(), "caf\u{e9}");
        assert_eq!(unmarshal::<char>(br#""x""#).unwrap(), 'x');
        assert!(unmarshal::<char>(br#""xy""#).is_err());
    }

    #[test]
    fn kind_mismatches_are_semantic() {
        let err = unmarshal::<bool>(b"\"true\"").unwrap_err();
        assert!(err.to_string().contains("cannot unmarshal JSON string"), "{err}");
        let err = unmarshal::<String>(b"3").unwrap_err();
        assert!(err.to_string().contains("cannot unmarshal JSON number"), "{err}");
    }
}
