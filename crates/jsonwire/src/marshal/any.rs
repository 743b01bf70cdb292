//! The dynamic JSON value tree, the polymorphic target of last resort.
//!
//! When decoding into a [`Value::Null`], the concrete variant is seeded by
//! the JSON kind: strings become [`Value::String`], numbers
//! [`Value::Number`] (an `f64`), objects a map of `String` to `Value`,
//! arrays a vector, and `true`/`false` [`Value::Boolean`]. A non-null
//! existing value keeps its variant where merging makes sense: objects
//! merge member-by-member recursively; everything else replaces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Action, Error, SemanticError};
use crate::marshal::{MarshalJson, MarshalState, UnmarshalJson, UnmarshalState};
use crate::token::{Kind, Token};

/// A JSON object as a map of member names to dynamic values.
pub type Map = BTreeMap<String, Value>;

/// A JSON array of dynamic values.
pub type Array = Vec<Value>;

/// Any JSON value.
///
/// # Examples
///
/// ```
/// use jsonwire::{Map, Value};
///
/// let mut map = Map::new();
/// map.insert("key".to_string(), Value::String("value".into()));
/// let v = Value::Object(map);
/// assert_eq!(v.to_string(), r#"{"key":"value"}"#);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Map),
}

impl Value {
    /// Returns `true` if the value is [`Null`](Value::Null).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric payload, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The array payload, if any.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The object payload, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up an object member.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(name))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Value {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Value {
        Value::Object(v)
    }
}

impl fmt::Display for Value {
    /// Renders the value as compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = crate::marshal::marshal(self).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

impl FromStr for Value {
    type Err = Error;

    fn from_str(s: &str) -> Result<Value, Error> {
        crate::marshal::unmarshal(s.as_bytes())
    }
}

impl MarshalJson for Value {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("Value")?;
        match self {
            Value::Null => st.enc.write_token(&Token::NULL),
            Value::Boolean(b) => st.enc.write_token(&Token::bool(*b)),
            Value::Number(n) => st.enc.write_token(&Token::float(*n)),
            Value::String(s) => st.enc.write_token(&Token::string(s)),
            Value::Array(a) => {
                st.enc.write_token(&Token::ARRAY_START)?;
                for v in a {
                    v.marshal_json(st)?;
                }
                st.enc.write_token(&Token::ARRAY_END)
            }
            Value::Object(m) => {
                st.enc.write_token(&Token::OBJECT_START)?;
                for (name, v) in m {
                    st.enc.write_token(&Token::string(name))?;
                    v.marshal_json(st)?;
                }
                st.enc.write_token(&Token::OBJECT_END)
            }
        }
    }

    fn json_is_zero(&self) -> bool {
        self.is_null()
    }

    fn marshal_json_members(&self, st: &mut MarshalState<'_, '_>) -> Option<Result<(), Error>> {
        let Value::Object(m) = self else {
            return None;
        };
        let mut write = || -> Result<(), Error> {
            for (name, v) in m {
                st.enc.write_token(&Token::string(name))?;
                v.marshal_json(st)?;
            }
            Ok(())
        };
        Some(write())
    }
}

impl UnmarshalJson for Value {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        st.reject_format("Value")?;
        match st.dec.peek_kind() {
            Kind::NULL => {
                st.dec.read_token()?;
                *self = Value::Null;
            }
            Kind::TRUE | Kind::FALSE => {
                let tok = st.dec.read_token()?;
                *self = Value::Boolean(tok.as_bool().unwrap_or_default());
            }
            Kind::NUMBER => {
                let tok = st.dec.read_token()?;
                *self = Value::Number(tok.as_f64().unwrap_or_default());
            }
            Kind::STRING => {
                let tok = st.dec.read_token()?;
                match tok.as_str() {
                    Some(s) => *self = Value::String(s.to_owned()),
                    None => {
                        return Err(SemanticError::new(Action::Unmarshal, "Value")
                            .with_kind(Kind::STRING)
                            .with_reason("string content is not valid UTF-8")
                            .into());
                    }
                }
            }
            Kind::OBJECT_START => {
                st.dec.read_token()?;
                // Preserve an existing object and merge into it.
                if !matches!(self, Value::Object(_)) {
                    *self = Value::Object(Map::new());
                }
                if let Value::Object(map) = self {
                    loop {
                        if st.dec.peek_kind() == Kind::OBJECT_END {
                            st.dec.read_token()?;
                            break;
                        }
                        let name = {
                            let tok = st.dec.read_token()?;
                            tok.as_str().map(str::to_owned)
                        };
                        let Some(name) = name else {
                            return Err(SemanticError::new(Action::Unmarshal, "Value")
                                .with_reason("member name is not valid UTF-8")
                                .into());
                        };
                        map.entry(name).or_insert(Value::Null).unmarshal_json(st)?;
                    }
                }
            }
            Kind::ARRAY_START => {
                st.dec.read_token()?;
                // Arrays replace: reset to empty and append.
                let mut array = match std::mem::take(self) {
                    Value::Array(mut a) => {
                        a.clear();
                        a
                    }
                    _ => Array::new(),
                };
                loop {
                    if st.dec.peek_kind() == Kind::ARRAY_END {
                        st.dec.read_token()?;
                        break;
                    }
                    let mut elem = Value::Null;
                    elem.unmarshal_json(st)?;
                    array.push(elem);
                }
                *self = Value::Array(array);
            }
            _ => {
                // Surface whatever the decoder is unhappy about.
                st.dec.read_token()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal, unmarshal, unmarshal_into};

    #[test]
    fn kind_seeded_decoding() {
        let v: Value = unmarshal(br#"{"a": [1, "x", true, null]}"#).unwrap();
        let Value::Object(m) = &v else { panic!("expected object, got {v:?}") };
        let a = m["a"].as_array().unwrap();
        assert_eq!(a[0], Value::Number(1.0));
        assert_eq!(a[1], Value::String("x".into()));
        assert_eq!(a[2], Value::Boolean(true));
        assert_eq!(a[3], Value::Null);
    }

    #[test]
    fn display_round_trips_compactly() {
        let v: Value = unmarshal(br#" { "b" : 1 , "a" : [ ] } "#).unwrap();
        assert_eq!(v.to_string(), r#"{"a":[],"b":1}"#);
        let parsed: Value = v.to_string().parse().unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn objects_merge_and_scalars_replace() {
        let mut v: Value = unmarshal(br#"{"keep": 1, "swap": {"x": 1}}"#).unwrap();
        unmarshal_into(br#"{"swap": {"y": 2}, "new": "s"}"#, &mut v).unwrap();
        assert_eq!(v.get("keep"), Some(&Value::Number(1.0)));
        let swap = v.get("swap").unwrap();
        assert_eq!(swap.get("x"), Some(&Value::Number(1.0)));
        assert_eq!(swap.get("y"), Some(&Value::Number(2.0)));
        assert_eq!(v.get("new"), Some(&Value::String("s".into())));

        unmarshal_into(b"null", &mut v).unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn marshal_emits_every_variant() {
        let v = Value::Array(vec![
            Value::Null,
            Value::Boolean(false),
            Value::Number(2.5),
            Value::String("s".into()),
            Value::Object(Map::new()),
        ]);
        assert_eq!(marshal(&v).unwrap(), br#"[null,false,2.5,"s",{}]"#);
    }

    #[test]
    fn non_finite_numbers_fail_to_marshal() {
        assert!(marshal(&Value::Number(f64::NAN)).is_err());
    }
}
