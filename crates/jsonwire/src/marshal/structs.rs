//! The struct marshaling engine behind `json_struct!`.
//!
//! Encoding walks the field list in declaration order, honoring the
//! omission options; decoding looks each member name up in the shape's
//! name index, falling back to case-insensitive matches, inline fields,
//! the unknown-members sink, and finally the configured unknown-member
//! policy.

use std::any::type_name;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::error::{Action, Error, SemanticError};
use crate::marshal::fields::{StructField, StructFields};
use crate::marshal::{MarshalJson, MarshalState, SeenSet, UnmarshalJson, UnmarshalState};
use crate::options::EncodeOptions;
use crate::token::{Kind, Token};
use crate::value::{RawValue, RawValueBuf};
use crate::Encoder;

/// Writes `v` as a complete JSON object.
pub fn marshal_struct_value<T: ?Sized>(
    v: &T,
    fields: &StructFields<T>,
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    let _ = st.take_format();
    st.enc.write_token(&Token::OBJECT_START)?;
    marshal_struct_members(v, fields, st)?;
    st.enc.write_token(&Token::OBJECT_END)
}

/// Writes `v`'s members into an already-open object.
pub fn marshal_struct_members<T: ?Sized>(
    v: &T,
    fields: &StructFields<T>,
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    let _ = st.take_format();
    for f in &fields.fields {
        if f.opts.unknown {
            if st.opts.discard_unknown_members {
                continue;
            }
            splice_members(v, f, st)?;
            continue;
        }
        if f.opts.inline {
            splice_members(v, f, st)?;
            continue;
        }
        let fv = (f.get)(v);
        if f.opts.omitzero && fv.json_is_zero() {
            continue;
        }
        if f.opts.omitempty {
            let encoded = encode_field(fv, f, st)?;
            if is_json_empty(&encoded) {
                continue;
            }
            st.enc.write_token(&Token::string(&f.name))?;
            st.enc.write_value(RawValue::from_bytes(&encoded))?;
            continue;
        }
        st.enc.write_token(&Token::string(&f.name))?;
        let saved = (st.stringify, st.format);
        st.stringify |= f.opts.string;
        st.format = f.opts.format;
        let result = fv.marshal_json(st);
        (st.stringify, st.format) = saved;
        result?;
    }
    Ok(())
}

fn splice_members<T: ?Sized>(
    v: &T,
    f: &StructField<T>,
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    match (f.get)(v).marshal_json_members(st) {
        Some(result) => result,
        None => Err(SemanticError::new(Action::Marshal, type_name::<T>())
            .with_reason(format!("inline field {:?} is not an object type", f.name))
            .into()),
    }
}

/// Encodes one field into a scratch buffer, for the `omitempty` probe.
fn encode_field<T: ?Sized>(
    fv: &dyn MarshalJson,
    f: &StructField<T>,
    st: &mut MarshalState<'_, '_>,
) -> Result<Vec<u8>, Error> {
    let enc_opts = EncodeOptions {
        indent: String::new(),
        indent_prefix: String::new(),
        omit_top_level_newline: true,
        ..st.opts.encode.clone()
    };
    let mut enc = Encoder::new_buffer_with_options(enc_opts);
    let seen: &mut SeenSet = &mut *st.seen;
    let mut sub = MarshalState {
        enc: &mut enc,
        opts: st.opts,
        stringify: st.stringify || f.opts.string,
        format: f.opts.format,
        seen,
    };
    fv.marshal_json(&mut sub)?;
    Ok(enc.into_bytes())
}

/// The redesigned `omitempty`: a member is dropped when its value encodes
/// to a JSON-empty value.
fn is_json_empty(encoded: &[u8]) -> bool {
    matches!(encoded, b"null" | b"\"\"" | b"{}" | b"[]")
}

/// Whether every field is zero, making the struct itself zero for an
/// enclosing `omitzero`.
pub fn struct_is_zero<T: ?Sized>(v: &T, fields: &StructFields<T>) -> bool {
    fields.fields.iter().all(|f| (f.get)(v).json_is_zero())
}

/// Reads a complete JSON object (or null) into `v`, merging.
pub fn unmarshal_struct_value<T: Default>(
    v: &mut T,
    fields: &StructFields<T>,
    st: &mut UnmarshalState<'_, '_>,
) -> Result<(), Error> {
    let _ = st.take_format();
    if st.dec.peek_kind() == Kind::NULL {
        st.dec.read_token()?;
        *v = T::default();
        return Ok(());
    }
    let kind = st.dec.read_token()?.kind();
    if kind != Kind::OBJECT_START {
        return Err(SemanticError::new(Action::Unmarshal, type_name::<T>())
            .with_kind(kind)
            .with_reason("expected an object")
            .into());
    }
    loop {
        if st.dec.peek_kind() == Kind::OBJECT_END {
            st.dec.read_token()?;
            return Ok(());
        }
        let looked_up = {
            let tok = st.dec.read_token()?;
            let Some(name) = tok.as_str() else {
                return Err(SemanticError::new(Action::Unmarshal, type_name::<T>())
                    .with_kind(Kind::STRING)
                    .with_reason("member name is not valid UTF-8")
                    .into());
            };
            match fields.lookup(name, st.opts.match_case_insensitive_names) {
                Some(i) => Ok(i),
                None => Err(name.to_owned()),
            }
        };
        match looked_up {
            Ok(i) => unmarshal_field(v, &fields.fields[i], st)?,
            Err(name) => unmarshal_unclaimed(v, fields, &name, st)?,
        }
    }
}

fn unmarshal_field<T: ?Sized>(
    v: &mut T,
    f: &StructField<T>,
    st: &mut UnmarshalState<'_, '_>,
) -> Result<(), Error> {
    let saved = (st.stringify, st.format);
    st.stringify |= f.opts.string;
    st.format = f.opts.format;
    let result = (f.get_mut)(v).unmarshal_json(st);
    (st.stringify, st.format) = saved;
    result
}

/// Handles a member no named field claims: inline fields get first
/// refusal, then the unknown sink, then the unknown-member policy.
fn unmarshal_unclaimed<T: ?Sized>(
    v: &mut T,
    fields: &StructFields<T>,
    name: &str,
    st: &mut UnmarshalState<'_, '_>,
) -> Result<(), Error> {
    for &i in &fields.inline {
        let f = &fields.fields[i];
        if f.opts.unknown {
            continue;
        }
        if let Some(result) = (f.get_mut)(v).unmarshal_json_member(name, st) {
            return result;
        }
    }
    if st.opts.reject_unknown_members {
        return Err(SemanticError::new(Action::Unmarshal, type_name::<T>())
            .with_reason(format!("unknown member name {name:?}"))
            .into());
    }
    if let Some(i) = fields.unknown {
        let f = &fields.fields[i];
        if let Some(sink) = (f.get_mut)(v).unknown_member_sink() {
            let raw = st.dec.read_value()?.to_owned();
            sink.0.insert(name.to_owned(), raw);
            return Ok(());
        }
    }
    st.dec.skip_value()
}

/// The inline hook's engine: offers `name` to this struct's own fields.
pub fn unmarshal_struct_member<T: ?Sized>(
    v: &mut T,
    fields: &StructFields<T>,
    name: &str,
    st: &mut UnmarshalState<'_, '_>,
) -> Option<Result<(), Error>> {
    if let Some(i) = fields.lookup(name, st.opts.match_case_insensitive_names) {
        return Some(unmarshal_field(v, &fields.fields[i], st));
    }
    for &i in &fields.inline {
        let f = &fields.fields[i];
        if f.opts.unknown {
            continue;
        }
        if let Some(result) = (f.get_mut)(v).unmarshal_json_member(name, st) {
            return Some(result);
        }
    }
    None
}

/// Collects object members no struct field claims, preserving their raw
/// values; fields of this type take the `unknown` tag option.
///
/// Marshals back as an object (or splices inline when tagged `unknown`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnknownMembers(pub BTreeMap<String, RawValueBuf>);

impl Deref for UnknownMembers {
    type Target = BTreeMap<String, RawValueBuf>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for UnknownMembers {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl MarshalJson for UnknownMembers {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        st.enc.write_token(&Token::OBJECT_START)?;
        write_members(self, st)?;
        st.enc.write_token(&Token::OBJECT_END)
    }

    fn json_is_zero(&self) -> bool {
        self.0.is_empty()
    }

    fn marshal_json_members(&self, st: &mut MarshalState<'_, '_>) -> Option<Result<(), Error>> {
        Some(write_members(self, st))
    }
}

fn write_members(m: &UnknownMembers, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
    for (name, value) in &m.0 {
        st.enc.write_token(&Token::string(name))?;
        st.enc.write_value(value)?;
    }
    Ok(())
}

impl UnmarshalJson for UnknownMembers {
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        if st.dec.peek_kind() == Kind::NULL {
            st.dec.read_token()?;
            self.0.clear();
            return Ok(());
        }
        let kind = st.dec.read_token()?.kind();
        if kind != Kind::OBJECT_START {
            return Err(SemanticError::new(Action::Unmarshal, "UnknownMembers")
                .with_kind(kind)
                .with_reason("expected an object")
                .into());
        }
        loop {
            if st.dec.peek_kind() == Kind::OBJECT_END {
                st.dec.read_token()?;
                return Ok(());
            }
            let name = {
                let tok = st.dec.read_token()?;
                tok.as_str().map(str::to_owned)
            };
            let Some(name) = name else {
                return Err(SemanticError::new(Action::Unmarshal, "UnknownMembers")
                    .with_reason("member name is not valid UTF-8")
                    .into());
            };
            let raw = st.dec.read_value()?.to_owned();
            self.0.insert(name, raw);
        }
    }

    fn unmarshal_json_member(
        &mut self,
        name: &str,
        st: &mut UnmarshalState<'_, '_>,
    ) -> Option<Result<(), Error>> {
        let raw = match st.dec.read_value() {
            Ok(v) => v.to_owned(),
            Err(e) => return Some(Err(e)),
        };
        self.0.insert(name.to_owned(), raw);
        Some(Ok(()))
    }

    fn unknown_member_sink(&mut self) -> Option<&mut UnknownMembers> {
        Some(self)
    }
}
