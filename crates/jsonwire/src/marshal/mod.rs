//! Type-directed marshaling between application values and the token
//! stream.
//!
//! The [`MarshalJson`] and [`UnmarshalJson`] traits carry the per-type
//! encode/decode logic; implementations exist for every primitive and
//! composite shape the wire format can express, and the [`json_struct!`]
//! macro derives them for structs from per-field tag strings.
//!
//! Unmarshaling merges: JSON null clears the target, JSON objects merge
//! into existing structs, maps, and dynamic values recursively, and
//! everything else replaces. Sequences reset to length zero and append,
//! reusing capacity.
//!
//! [`json_struct!`]: crate::json_struct

pub mod any;
pub mod bytes;
pub mod fields;
mod macros;
mod map;
mod prim;
mod seq;
pub mod structs;
pub(crate) mod tag;

use std::io;

use fxhash::FxHashSet;

use crate::error::{Action, Error, SemanticError, SyntaxErrorKind};
use crate::options::{EncodeOptions, MarshalOptions};
use crate::token::Token;
use crate::{Decoder, Encoder};

/// Nesting depth past which cycle detection engages. Shallow structures
/// pay nothing.
pub(crate) const START_CYCLE_DETECTION_DEPTH: usize = 1000;

/// What class of indirection a tracked pointer came from. Paired with the
/// address, this is the cycle set's key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PtrKind {
    Seq,
    Map,
    Ptr,
}

pub(crate) type SeenSet = FxHashSet<(PtrKind, usize)>;

/// Formats a field may select with the `format:value` tag option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    /// Standard base64 with padding (the default for byte fields).
    Base64,
    /// URL-safe base64.
    Base64Url,
    /// Lowercase hexadecimal.
    Hex,
    /// Render an absent collection as `null`.
    EmitNull,
    /// Render an absent collection as `[]`/`{}`.
    EmitEmpty,
}

impl FieldFormat {
    pub(crate) fn parse(s: &str) -> Option<FieldFormat> {
        match s {
            "base64" => Some(FieldFormat::Base64),
            "base64url" => Some(FieldFormat::Base64Url),
            "hex" => Some(FieldFormat::Hex),
            "emitnull" => Some(FieldFormat::EmitNull),
            "emitempty" => Some(FieldFormat::EmitEmpty),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            FieldFormat::Base64 => "base64",
            FieldFormat::Base64Url => "base64url",
            FieldFormat::Hex => "hex",
            FieldFormat::EmitNull => "emitnull",
            FieldFormat::EmitEmpty => "emitempty",
        }
    }
}

/// Encode-direction context handed to [`MarshalJson::marshal_json`].
pub struct MarshalState<'a, 'w> {
    pub(crate) enc: &'a mut Encoder<'w>,
    pub(crate) opts: &'a MarshalOptions,
    /// Numbers render as JSON strings while set; struct fields tagged
    /// `string` switch it on for their subtree.
    pub(crate) stringify: bool,
    /// One-shot format override for the immediate value.
    pub(crate) format: Option<FieldFormat>,
    pub(crate) seen: &'a mut SeenSet,
}

impl<'a, 'w> MarshalState<'a, 'w> {
    /// The encoder being written to.
    pub fn encoder(&mut self) -> &mut Encoder<'w> {
        &mut *self.enc
    }

    /// The option bundle for this operation.
    #[must_use]
    pub fn options(&self) -> &MarshalOptions {
        self.opts
    }

    /// Whether the stringify-numbers option is in effect here.
    #[must_use]
    pub fn stringify(&self) -> bool {
        self.stringify
    }

    pub(crate) fn take_format(&mut self) -> Option<FieldFormat> {
        self.format.take()
    }

    /// Fails if a `format` option reached a type with no use for it.
    pub(crate) fn reject_format(&mut self, rust_type: &'static str) -> Result<(), Error> {
        match self.format.take() {
            None => Ok(()),
            Some(f) => Err(SemanticError::new(Action::Marshal, rust_type)
                .with_reason(format!("format {:?} not applicable", f.name()))
                .into()),
        }
    }

    /// Tracks one pointer-like traversal once nesting is deep enough for
    /// cycles to be a concern. Returns whether the entry was recorded (and
    /// must be released by [`exit_cycle`](MarshalState::exit_cycle)).
    pub(crate) fn enter_cycle(
        &mut self,
        key: (PtrKind, usize),
        rust_type: &'static str,
    ) -> Result<bool, Error> {
        if self.enc.stack_depth() < START_CYCLE_DETECTION_DEPTH {
            return Ok(false);
        }
        if !self.seen.insert(key) {
            return Err(SemanticError::new(Action::Marshal, rust_type)
                .with_reason("encountered a cycle")
                .into());
        }
        Ok(true)
    }

    pub(crate) fn exit_cycle(&mut self, key: (PtrKind, usize), entered: bool) {
        if entered {
            self.seen.remove(&key);
        }
    }
}

/// Decode-direction context handed to [`UnmarshalJson::unmarshal_json`].
pub struct UnmarshalState<'a, 'r> {
    pub(crate) dec: &'a mut Decoder<'r>,
    pub(crate) opts: &'a MarshalOptions,
    pub(crate) stringify: bool,
    pub(crate) format: Option<FieldFormat>,
}

impl<'a, 'r> UnmarshalState<'a, 'r> {
    /// The decoder being read from.
    pub fn decoder(&mut self) -> &mut Decoder<'r> {
        &mut *self.dec
    }

    /// The option bundle for this operation.
    #[must_use]
    pub fn options(&self) -> &MarshalOptions {
        self.opts
    }

    /// Whether the stringify-numbers option is in effect here.
    #[must_use]
    pub fn stringify(&self) -> bool {
        self.stringify
    }

    pub(crate) fn take_format(&mut self) -> Option<FieldFormat> {
        self.format.take()
    }

    pub(crate) fn reject_format(&mut self, rust_type: &'static str) -> Result<(), Error> {
        match self.format.take() {
            None => Ok(()),
            Some(f) => Err(SemanticError::new(Action::Unmarshal, rust_type)
                .with_reason(format!("format {:?} not applicable", f.name()))
                .into()),
        }
    }
}

/// A value that can render itself onto the token stream.
pub trait MarshalJson {
    /// Writes this value as exactly one JSON value.
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error>;

    /// The zero test behind the `omitzero` field option.
    fn json_is_zero(&self) -> bool {
        false
    }

    /// How an absent `Option<Self>` renders. Collections emit `[]`/`{}`
    /// here unless the options or a field format say `null`; everything
    /// else emits `null`.
    fn marshal_json_absent(st: &mut MarshalState<'_, '_>) -> Result<(), Error>
    where
        Self: Sized,
    {
        let _ = st.take_format();
        st.enc.write_token(&Token::NULL)
    }

    /// Inline hook: writes this value's members into an already-open
    /// object, without braces. `None` means the type cannot be inlined.
    #[doc(hidden)]
    fn marshal_json_members(&self, st: &mut MarshalState<'_, '_>) -> Option<Result<(), Error>> {
        let _ = st;
        None
    }
}

impl<T: MarshalJson + ?Sized> MarshalJson for &T {
    fn marshal_json(&self, st: &mut MarshalState<'_, '_>) -> Result<(), Error> {
        (**self).marshal_json(st)
    }

    fn json_is_zero(&self) -> bool {
        (**self).json_is_zero()
    }
}

/// A value that can rebuild or merge itself from the token stream.
pub trait UnmarshalJson {
    /// Consumes exactly one JSON value, merging it into `self`.
    fn unmarshal_json(&mut self, st: &mut UnmarshalState<'_, '_>) -> Result<(), Error>;

    /// Inline hook: offers one object member to this value. `Some` means
    /// the member (including its value) was consumed; `None` means the
    /// name is not recognized and nothing was read.
    #[doc(hidden)]
    fn unmarshal_json_member(
        &mut self,
        name: &str,
        st: &mut UnmarshalState<'_, '_>,
    ) -> Option<Result<(), Error>> {
        let _ = (name, st);
        None
    }

    /// Hook letting the struct engine find the `unknown` members sink.
    #[doc(hidden)]
    fn unknown_member_sink(&mut self) -> Option<&mut structs::UnknownMembers> {
        None
    }
}

/// Marshals `v` into a byte vector with default options.
///
/// # Examples
///
/// ```
/// let out = jsonwire::marshal(&vec![1, 2, 3]).unwrap();
/// assert_eq!(out, b"[1,2,3]");
/// ```
pub fn marshal<T: MarshalJson + ?Sized>(v: &T) -> Result<Vec<u8>, Error> {
    marshal_with(v, &MarshalOptions::default())
}

/// Marshals `v` into a byte vector.
pub fn marshal_with<T: MarshalJson + ?Sized>(
    v: &T,
    opts: &MarshalOptions,
) -> Result<Vec<u8>, Error> {
    let mut enc = Encoder::new_buffer_with_options(single_value_options(opts));
    let mut seen = SeenSet::default();
    let mut st = MarshalState {
        enc: &mut enc,
        opts,
        stringify: opts.stringify_numbers,
        format: None,
        seen: &mut seen,
    };
    v.marshal_json(&mut st)?;
    Ok(enc.into_bytes())
}

/// Marshals `v` to a byte sink.
pub fn marshal_write<T: MarshalJson + ?Sized>(w: impl io::Write, v: &T) -> Result<(), Error> {
    marshal_write_with(w, v, &MarshalOptions::default())
}

/// Marshals `v` to a byte sink with the given options.
pub fn marshal_write_with<T: MarshalJson + ?Sized>(
    w: impl io::Write,
    v: &T,
    opts: &MarshalOptions,
) -> Result<(), Error> {
    let mut enc = Encoder::with_options(w, single_value_options(opts));
    let mut seen = SeenSet::default();
    let mut st = MarshalState {
        enc: &mut enc,
        opts,
        stringify: opts.stringify_numbers,
        format: None,
        seen: &mut seen,
    };
    v.marshal_json(&mut st)?;
    enc.flush()
}

fn single_value_options(opts: &MarshalOptions) -> EncodeOptions {
    let mut enc = opts.encode.clone();
    enc.omit_top_level_newline = true;
    enc
}

/// Unmarshals one JSON value from `b` into a fresh `T`.
///
/// # Examples
///
/// ```
/// let v: Vec<i32> = jsonwire::unmarshal(b"[1,2,3]").unwrap();
/// assert_eq!(v, [1, 2, 3]);
/// ```
pub fn unmarshal<T: UnmarshalJson + Default>(b: &[u8]) -> Result<T, Error> {
    unmarshal_with(b, &MarshalOptions::default())
}

/// Unmarshals one JSON value from `b` into a fresh `T` with the given
/// options.
pub fn unmarshal_with<T: UnmarshalJson + Default>(
    b: &[u8],
    opts: &MarshalOptions,
) -> Result<T, Error> {
    let mut v = T::default();
    unmarshal_into_with(b, &mut v, opts)?;
    Ok(v)
}

/// Unmarshals one JSON value from `b` into an existing value, merging.
pub fn unmarshal_into<T: UnmarshalJson + ?Sized>(b: &[u8], v: &mut T) -> Result<(), Error> {
    unmarshal_into_with(b, v, &MarshalOptions::default())
}

/// Unmarshals one JSON value from `b` into an existing value with the
/// given options.
pub fn unmarshal_into_with<T: UnmarshalJson + ?Sized>(
    b: &[u8],
    v: &mut T,
    opts: &MarshalOptions,
) -> Result<(), Error> {
    let mut dec = Decoder::from_slice_with_options(b, opts.decode.clone());
    unmarshal_from_decoder(&mut dec, v, opts)
}

/// Unmarshals one JSON value from a byte source into a fresh `T`.
pub fn unmarshal_read<T: UnmarshalJson + Default>(r: impl io::Read) -> Result<T, Error> {
    unmarshal_read_with(r, &MarshalOptions::default())
}

/// Unmarshals one JSON value from a byte source with the given options.
pub fn unmarshal_read_with<T: UnmarshalJson + Default>(
    r: impl io::Read,
    opts: &MarshalOptions,
) -> Result<T, Error> {
    let mut v = T::default();
    let mut dec = Decoder::with_options(r, opts.decode.clone());
    unmarshal_from_decoder(&mut dec, &mut v, opts)?;
    Ok(v)
}

fn unmarshal_from_decoder<T: UnmarshalJson + ?Sized>(
    dec: &mut Decoder<'_>,
    v: &mut T,
    opts: &MarshalOptions,
) -> Result<(), Error> {
    let mut st =
        UnmarshalState { dec, opts, stringify: opts.stringify_numbers, format: None };
    v.unmarshal_json(&mut st)?;
    // Only trailing whitespace may remain.
    match st.dec.read_token() {
        Err(err) if err.is_eof() => Ok(()),
        Err(err) => Err(err),
        Ok(tok) => {
            let found = tok.kind().as_byte();
            let offset = st.dec.input_offset();
            Err(Error::Syntax(
                SyntaxErrorKind::InvalidDelim { found, context: "after top-level value" }
                    .at(offset),
            ))
        }
    }
}

/// Convenience: the result of a marshal as a `String` (output is always
/// UTF-8 when the invalid-UTF-8 option is off).
pub fn marshal_to_string<T: MarshalJson + ?Sized>(v: &T) -> Result<String, Error> {
    let bytes = marshal(v)?;
    String::from_utf8(bytes).map_err(|_| {
        SemanticError::new(Action::Marshal, "String")
            .with_reason("output is not valid UTF-8")
            .into()
    })
}
