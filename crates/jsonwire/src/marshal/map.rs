//! Marshaling for map types.
//!
//! Keys pass through their own marshaler with stringify-numbers forced
//! on, so integer-keyed maps produce JSON-string member names. Hash maps
//! emit members in unspecified order unless the `deterministic` option
//! buffers and sorts them; tree maps iterate in key order, which is
//! already reproducible. Decoding merges into existing entries, so a
//! later duplicate key wins.

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::error::{Action, Error, SemanticError};
use crate::marshal::{MarshalJson, MarshalState, PtrKind, UnmarshalJson, UnmarshalState};
use crate::options::EncodeOptions;
use crate::token::{Kind, Token};
use crate::value::RawValue;
use crate::Encoder;

fn mismatch<T: ?Sized>(kind: Kind) -> Error {
    SemanticError::new(Action::Unmarshal, type_name::<T>()).with_kind(kind).into()
}

/// Writes one member: the key with stringify forced, then the value.
fn marshal_member(
    key: &dyn MarshalJson,
    value: &dyn MarshalJson,
    st: &mut MarshalState<'_, '_>,
) -> Result<(), Error> {
    let saved = st.stringify;
    st.stringify = true;
    let result = key.marshal_json(st);
    st.stringify = saved;
    result?;
    value.marshal_json(st)
}

/// Encodes one value into a standalone compact buffer, for deterministic
/// member sorting.
fn encode_detached(
    value: &dyn MarshalJson,
    st: &mut MarshalState<'_, '_>,
    stringify: bool,
) -> Result<Vec<u8>, Error> {
    let enc_opts = EncodeOptions {
        indent: String::new(),
        indent_prefix: String::new(),
        omit_top_level_newline: true,
        ..st.opts.encode.clone()
    };
    let mut enc = Encoder::new_buffer_with_options(enc_opts);
    let mut sub = MarshalState {
        enc: &mut enc,
        opts: st.opts,
        stringify,
        format: None,
        seen: &mut *st.seen,
    };
    value.marshal_json(&mut sub)?;
    Ok(enc.into_bytes())
}

impl<K, V> MarshalJson for BTreeMap<K, V>
where
    K: MarshalJson + Ord,
    V: MarshalJson,
{
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        let key = (PtrKind::Map, std::ptr::from_ref(self).cast::<()>() as usize);
        let entered = st.enter_cycle(key, type_name::<Self>())?;
        let result = (|| {
            st.enc.write_token(&Token::OBJECT_START)?;
            for (k, v) in self {
                marshal_member(k, v, st)?;
            }
            st.enc.write_token(&Token::OBJECT_END)
        })();
        st.exit_cycle(key, entered);
        result
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }

    fn marshal_json_absent(st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        absent_map(st)
    }

    fn marshal_json_members(&self, st: &mut MarshalState<'_, '_>) -> Option<Result<(), Error>> {
        let mut write = || -> Result<(), Error> {
            for (k, v) in self {
                marshal_member(k, v, st)?;
            }
            Ok(())
        };
        Some(write())
    }
}

impl<K, V, S> MarshalJson for HashMap<K, V, S>
where
    K: MarshalJson + Eq + Hash,
    V: MarshalJson,
    S: BuildHasher,
{
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        let key = (PtrKind::Map, std::ptr::from_ref(self).cast::<()>() as usize);
        let entered = st.enter_cycle(key, type_name::<Self>())?;
        let result = (|| {
            st.enc.write_token(&Token::OBJECT_START)?;
            if st.opts.deterministic {
                let mut members = Vec::with_capacity(self.len());
                for (k, v) in self {
                    let name = encode_detached(k, st, true)?;
                    let value = encode_detached(v, st, st.stringify)?;
                    members.push((name, value));
                }
                members.sort_by(|(a, _), (b, _)| a.cmp(b));
                for (name, value) in &members {
                    st.enc.write_value(RawValue::from_bytes(name))?;
                    st.enc.write_value(RawValue::from_bytes(value))?;
                }
            } else {
                for (k, v) in self {
                    marshal_member(k, v, st)?;
                }
            }
            st.enc.write_token(&Token::OBJECT_END)
        })();
        st.exit_cycle(key, entered);
        result
    }

    fn json_is_zero(&self) -> bool {
        self.is_empty()
    }

    fn marshal_json_absent(st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        absent_map(st)
    }
}

fn absent_map(st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
    use crate::marshal::FieldFormat;
    let as_null = match st.take_format() {
        Some(FieldFormat::EmitNull) => true,
        Some(FieldFormat::EmitEmpty) => false,
        _ => st.opts.format_nil_map_as_null,
    };
    if as_null {
        st.enc.write_token(&Token::NULL)
    } else {
        st.enc.write_token(&Token::OBJECT_START)?;
        st.enc.write_token(&Token::OBJECT_END)
    }
}

/// Reads one member key with stringify forced on.
fn unmarshal_key<K: UnmarshalJson + Default>(
    st: &mut UnmarshalState<'_, '_>,
) -> Result<K, Error> {
    let saved = st.stringify;
    st.stringify = true;
    let mut key = K::default();
    let result = key.unmarshal_json(st);
    st.stringify = saved;
    result?;
    Ok(key)
}

impl<K, V> UnmarshalJson for BTreeMap<K, V>
where
    K: UnmarshalJson + Default + Ord,
    V: UnmarshalJson + Default,
{
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        if st.dec.peek_kind() == Kind::NULL {
            st.dec.read_token()?;
            self.clear();
            return Ok(());
        }
        let kind = st.dec.read_token()?.kind();
        if kind != Kind::OBJECT_START {
            return Err(mismatch::<Self>(kind));
        }
        loop {
            if st.dec.peek_kind() == Kind::OBJECT_END {
                st.dec.read_token()?;
                return Ok(());
            }
            let key = unmarshal_key::<K>(st)?;
            // Merge into any existing entry; a later duplicate wins.
            self.entry(key).or_default().unmarshal_json(st)?;
        }
    }
}

impl<K, V, S> UnmarshalJson for HashMap<K, V, S>
where
    K: UnmarshalJson + Default + Eq + Hash,
    V: UnmarshalJson + Default,
    S: BuildHasher,
{
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error> {
        let _ = st.take_format();
        if st.dec.peek_kind() == Kind::NULL {
            st.dec.read_token()?;
            self.clear();
            return Ok(());
        }
        let kind = st.dec.read_token()?.kind();
        if kind != Kind::OBJECT_START {
            return Err(mismatch::<Self>(kind));
        }
        loop {
            if st.dec.peek_kind() == Kind::OBJECT_END {
                st.dec.read_token()?;
                return Ok(());
            }
            let key = unmarshal_key::<K>(st)?;
            self.entry(key).or_default().unmarshal_json(st)?;
        }
    }
}
