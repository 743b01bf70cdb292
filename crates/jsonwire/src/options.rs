//! Configuration for the encoder, the decoder, and the marshal layer.
//!
//! All options default to the strictest behavior: duplicate names rejected,
//! invalid UTF-8 rejected, minimal escaping, no indentation.

/// Options for a [`Decoder`](crate::Decoder).
#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    /// Whether to permit repeated member names within one object.
    ///
    /// When `false`, a repeated name is a syntactic error located at the
    /// duplicate name's opening quote.
    ///
    /// # Default
    ///
    /// `false`
    pub allow_duplicate_names: bool,

    /// Whether to accept strings whose bytes are not valid UTF-8.
    ///
    /// When `true`, invalid bytes are preserved verbatim in the decoded
    /// string content and unpaired surrogate escapes decode to U+FFFD.
    ///
    /// # Default
    ///
    /// `false`
    pub allow_invalid_utf8: bool,
}

/// Options for an [`Encoder`](crate::Encoder).
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    /// Whether to permit writing repeated member names within one object.
    ///
    /// # Default
    ///
    /// `false`
    pub allow_duplicate_names: bool,

    /// Whether to accept string content that is not valid UTF-8. Invalid
    /// bytes are replaced with U+FFFD on output.
    ///
    /// # Default
    ///
    /// `false`
    pub allow_invalid_utf8: bool,

    /// Whether to additionally escape `<`, `>`, and `&` so output can be
    /// embedded in HTML without further processing.
    ///
    /// # Default
    ///
    /// `false`
    pub escape_for_html: bool,

    /// Whether to additionally escape U+2028 and U+2029, which are valid in
    /// JSON strings but not in pre-ES2019 JavaScript source.
    ///
    /// # Default
    ///
    /// `false`
    pub escape_for_js: bool,

    /// Indentation unit. When non-empty, each object member and array
    /// element begins on a new line prefixed by [`indent_prefix`] followed
    /// by one copy of `indent` per nesting level. May contain only spaces
    /// and tabs. Empty disables indentation.
    ///
    /// [`indent_prefix`]: EncodeOptions::indent_prefix
    ///
    /// # Default
    ///
    /// `""`
    pub indent: String,

    /// Prefix emitted before the per-level indentation on each new line.
    /// May contain only spaces and tabs.
    ///
    /// # Default
    ///
    /// `""`
    pub indent_prefix: String,

    /// Suppress the newline normally emitted after each top-level value.
    /// Set by the marshal entry points, which produce exactly one value.
    pub(crate) omit_top_level_newline: bool,
}

impl EncodeOptions {
    /// Whether indentation is active.
    #[must_use]
    pub fn indents(&self) -> bool {
        !self.indent.is_empty()
    }

    pub(crate) fn indent_is_valid(&self) -> bool {
        let ok = |s: &str| s.bytes().all(|b| b == b' ' || b == b'\t');
        ok(&self.indent) && ok(&self.indent_prefix)
    }
}

/// The option bundle consulted by the marshal layer, carried alongside the
/// text-level options for the encoder or decoder it drives.
///
/// One bundle serves both directions, mirroring how the per-field tag
/// options overlay it during a single field's subtree.
#[derive(Clone, Debug, Default)]
pub struct MarshalOptions {
    /// Encode numeric values as JSON strings, and accept JSON strings
    /// holding numbers when decoding. Struct fields tagged `string` switch
    /// this on for their own subtree.
    ///
    /// # Default
    ///
    /// `false`
    pub stringify_numbers: bool,

    /// Marshal an absent (`None`) sequence as `null` instead of `[]`.
    ///
    /// # Default
    ///
    /// `false`
    pub format_nil_slice_as_null: bool,

    /// Marshal an absent (`None`) map as `null` instead of `{}`.
    ///
    /// # Default
    ///
    /// `false`
    pub format_nil_map_as_null: bool,

    /// Emit hash-map members in a reproducible order (sorted by encoded
    /// member name). Without this, hash-map member order is unspecified.
    ///
    /// # Default
    ///
    /// `false`
    pub deterministic: bool,

    /// Match object member names to struct fields case-insensitively even
    /// for fields not tagged `nocase`.
    ///
    /// # Default
    ///
    /// `false`
    pub match_case_insensitive_names: bool,

    /// Drop members stored in an `unknown` field instead of re-emitting
    /// them when marshaling.
    ///
    /// # Default
    ///
    /// `false`
    pub discard_unknown_members: bool,

    /// Reject object members that match no struct field instead of
    /// skipping them.
    ///
    /// # Default
    ///
    /// `false`
    pub reject_unknown_members: bool,

    /// Text-level options for the encoder.
    pub encode: EncodeOptions,

    /// Text-level options for the decoder.
    pub decode: DecodeOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_validation() {
        let mut opts = EncodeOptions::default();
        assert!(opts.indent_is_valid());
        assert!(!opts.indents());
        opts.indent = "\t".into();
        assert!(opts.indent_is_valid());
        assert!(opts.indents());
        opts.indent = "  x".into();
        assert!(!opts.indent_is_valid());
    }
}
