//! A streaming JSON codec in two layers.
//!
//! The text layer reads and writes JSON strictly per RFC 8259 as a
//! sequence of lexical tokens and raw values: [`Decoder`] and [`Encoder`]
//! share one push-down state machine, so token-level and whole-value
//! operations interleave freely in either direction. The marshal layer
//! composes on top, mapping application values to and from the token
//! stream through the [`MarshalJson`] and [`UnmarshalJson`] traits and the
//! [`json_struct!`] macro.
//!
//! # Examples
//!
//! Whole values:
//!
//! ```
//! jsonwire::json_struct! {
//!     #[derive(Debug, Default, PartialEq)]
//!     struct Server {
//!         host: String => "host",
//!         port: u16 => "port",
//!         tags: Vec<String> => "tags,omitempty",
//!     }
//! }
//!
//! let s: Server = jsonwire::unmarshal(br#"{"host": "db1", "port": 5432}"#).unwrap();
//! assert_eq!(s.port, 5432);
//! assert_eq!(jsonwire::marshal(&s).unwrap(), br#"{"host":"db1","port":5432}"#);
//! ```
//!
//! Token streaming:
//!
//! ```
//! use jsonwire::{Decoder, Kind};
//!
//! let mut dec = Decoder::from_slice(br#"{"rows": [{"id": 1}, {"id": 2}]}"#);
//! dec.read_token().unwrap(); // {
//! dec.read_token().unwrap(); // "rows"
//! dec.read_token().unwrap(); // [
//! let mut rows = 0;
//! while dec.peek_kind() == Kind::OBJECT_START {
//!     dec.skip_value().unwrap();
//!     rows += 1;
//! }
//! assert_eq!(rows, 2);
//! ```

mod decode;
mod encode;
mod error;
mod escape;
mod intern;
pub mod marshal;
mod number;
mod options;
mod pointer;
mod scan;
mod state;
mod token;
mod value;

#[cfg(test)]
mod tests;

pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{Action, Error, IoOp, SemanticError, SyntaxError, SyntaxErrorKind};
pub use marshal::any::{Array, Map, Value};
pub use marshal::bytes::{ByteArray, ByteBuf};
pub use marshal::fields::{FieldOptions, RawField, StructFields};
pub use marshal::structs::UnknownMembers;
pub use marshal::{
    marshal, marshal_to_string, marshal_with, marshal_write, marshal_write_with, unmarshal,
    unmarshal_into, unmarshal_into_with, unmarshal_read, unmarshal_read_with, unmarshal_with,
    FieldFormat, MarshalJson, MarshalState, UnmarshalJson, UnmarshalState,
};
pub use options::{DecodeOptions, EncodeOptions, MarshalOptions};
pub use token::{Kind, Token};
pub use value::{RawValue, RawValueBuf};
