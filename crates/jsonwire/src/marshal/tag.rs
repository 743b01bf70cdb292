//! Parser for per-field configuration strings.
//!
//! A tag is a comma-separated list. The first token is the JSON member
//! name: empty means "use the Rust field name", a lone `-` means "ignore
//! this field". Names may be bare identifiers, Unicode letter sequences,
//! or single-quoted strings with C-style escapes (allowing punctuation,
//! commas, and quotes inside names). The remaining tokens are option
//! keywords: `nocase`, `inline`, `unknown` (implies `inline`), `omitzero`,
//! `omitempty`, `string`, and `format:value`.

use thiserror::Error;

/// A malformed tag string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("unterminated single-quoted string")]
    UnterminatedString,
    #[error("invalid character {0:?} at start of option")]
    InvalidOptionStart(char),
    #[error("invalid character {0:?} within tag")]
    InvalidCharacter(char),
    #[error("duplicate option {0:?}")]
    DuplicateOption(&'static str),
    #[error("option {0:?} spelled {1:?}; option names are case-sensitive")]
    MiscasedOption(&'static str, String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("option {0:?} may not be quoted")]
    QuotedOption(String),
    #[error("format option requires a value")]
    FormatMissingValue,
}

/// The member name a tag selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TagName {
    /// `-`: the field does not participate.
    Ignore,
    /// No name given; use the Rust field name.
    Default,
    Named(String),
}

/// The parsed form of one tag string. Option flags mirror
/// [`FieldOptions`](crate::marshal::fields::FieldOptions); `format` stays
/// a string here and is resolved by the field builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ParsedTag {
    pub name: Option<String>,
    pub ignored: bool,
    pub nocase: bool,
    pub inline: bool,
    pub unknown: bool,
    pub omitzero: bool,
    pub omitempty: bool,
    pub string: bool,
    pub format: Option<String>,
}

const OPTIONS: [&str; 6] = ["nocase", "inline", "unknown", "omitzero", "omitempty", "string"];

pub(crate) fn parse_tag(tag: &str) -> Result<ParsedTag, TagError> {
    let mut out = ParsedTag::default();
    if tag == "-" {
        out.ignored = true;
        return Ok(out);
    }
    let mut rest = tag;
    // Member name.
    if !rest.is_empty() && !rest.starts_with(',') {
        let (name, _, tail) = scan_token(rest)?;
        out.name = match tag_name(name) {
            TagName::Ignore => {
                out.ignored = true;
                return Ok(out);
            }
            TagName::Default => None,
            TagName::Named(n) => Some(n),
        };
        rest = tail;
    }
    // Options.
    while !rest.is_empty() {
        let Some(tail) = rest.strip_prefix(',') else {
            let c = rest.chars().next().unwrap_or('\u{FFFD}');
            return Err(TagError::InvalidCharacter(c));
        };
        rest = tail;
        let Some(first) = rest.chars().next() else {
            return Err(TagError::InvalidOptionStart(','));
        };
        if !(first == '\'' || first == '_' || first.is_alphabetic()) {
            return Err(TagError::InvalidOptionStart(first));
        }
        let (word, quoted, tail) = scan_token(rest)?;
        rest = tail;
        if quoted {
            // Bare option keywords must stay bare; quoting them suggests a
            // name was intended where an option belongs.
            if OPTIONS.contains(&word.as_str()) || word == "format" {
                return Err(TagError::QuotedOption(word));
            }
            return Err(TagError::UnknownOption(word));
        }
        if word == "format" {
            let Some(tail) = rest.strip_prefix(':') else {
                return Err(TagError::FormatMissingValue);
            };
            rest = tail;
            if rest.is_empty() || rest.starts_with(',') {
                return Err(TagError::FormatMissingValue);
            }
            let (value, _, tail) = scan_token(rest)?;
            rest = tail;
            if out.format.is_some() {
                return Err(TagError::DuplicateOption("format"));
            }
            out.format = Some(value);
            continue;
        }
        let flag = match word.as_str() {
            "nocase" => Some(&mut out.nocase),
            "inline" => Some(&mut out.inline),
            "unknown" => Some(&mut out.unknown),
            "omitzero" => Some(&mut out.omitzero),
            "omitempty" => Some(&mut out.omitempty),
            "string" => Some(&mut out.string),
            _ => None,
        };
        let Some(flag) = flag else {
            return Err(unknown_option(word));
        };
        if *flag {
            // Find the canonical spelling for the message.
            let canon = OPTIONS
                .iter()
                .find(|&&o| o == word)
                .copied()
                .unwrap_or("option");
            return Err(TagError::DuplicateOption(canon));
        }
        *flag = true;
    }
    if out.unknown {
        out.inline = true;
    }
    Ok(out)
}

fn tag_name(name: String) -> TagName {
    match name.as_str() {
        "-" => TagName::Ignore,
        "" => TagName::Default,
        _ => TagName::Named(name),
    }
}

/// Catches the casing mutants of known options (`OmitEmpty`,
/// `omit_empty`) so typos fail loudly instead of silently parsing as an
/// unknown name.
fn unknown_option(word: String) -> TagError {
    let folded: String =
        word.chars().filter(|&c| c != '_' && c != '-').flat_map(char::to_lowercase).collect();
    for known in OPTIONS.iter().chain(std::iter::once(&"format")) {
        if folded == *known {
            return TagError::MiscasedOption(known, word);
        }
    }
    TagError::UnknownOption(word)
}

/// Scans one token: a single-quoted string with C-style escapes, or a
/// run of letters, digits, and underscores. Returns the token's value,
/// whether it was quoted, and the rest of the input.
fn scan_token(s: &str) -> Result<(String, bool, &str), TagError> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, '\'')) => {
            let mut value = String::new();
            let mut escaped = false;
            for (i, c) in chars {
                if escaped {
                    value.push(match c {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => other,
                    });
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '\'' {
                    return Ok((value, true, &s[i + 1..]));
                } else {
                    value.push(c);
                }
            }
            Err(TagError::UnterminatedString)
        }
        Some((_, c)) if c == '-' && s.len() == c.len_utf8() => Ok(("-".to_string(), false, "")),
        Some((_, c)) if c.is_alphabetic() || c == '_' => {
            let mut end = s.len();
            for (i, c) in s.char_indices() {
                if !(c.is_alphanumeric() || c == '_') {
                    end = i;
                    break;
                }
            }
            Ok((s[..end].to_string(), false, &s[end..]))
        }
        Some((_, c)) => Err(TagError::InvalidCharacter(c)),
        None => Ok((String::new(), false, "")),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn names() {
        assert!(parse_tag("-").unwrap().ignored);
        assert_eq!(parse_tag("").unwrap().name, None);
        assert_eq!(parse_tag("renamed").unwrap().name, Some("renamed".into()));
        assert_eq!(parse_tag("'a,b'").unwrap().name, Some("a,b".into()));
        assert_eq!(parse_tag(r"'it\'s'").unwrap().name, Some("it's".into()));
        assert_eq!(parse_tag("'-'").unwrap().name, Some("-".into()));
        assert_eq!(parse_tag("né").unwrap().name, Some("né".into()));
    }

    #[test]
    fn option_combinations() {
        let t = parse_tag("name,omitzero,string,nocase").unwrap();
        assert_eq!(t.name, Some("name".into()));
        assert!(t.omitzero && t.string && t.nocase);
        assert!(!t.omitempty && !t.inline);

        let t = parse_tag(",omitempty").unwrap();
        assert_eq!(t.name, None);
        assert!(t.omitempty);

        // unknown implies inline.
        let t = parse_tag("extra,unknown").unwrap();
        assert!(t.unknown && t.inline);
    }

    #[test]
    fn format_values() {
        let t = parse_tag("data,format:base64url").unwrap();
        assert_eq!(t.format.as_deref(), Some("base64url"));
        let t = parse_tag("data,format:'base64url'").unwrap();
        assert_eq!(t.format.as_deref(), Some("base64url"));
    }

    #[rstest]
    #[case("'unterminated", TagError::UnterminatedString)]
    #[case("a,'nocase'", TagError::QuotedOption("nocase".into()))]
    #[case("a,omitzero,omitzero", TagError::DuplicateOption("omitzero"))]
    #[case("a,OmitEmpty", TagError::MiscasedOption("omitempty", "OmitEmpty".into()))]
    #[case("a,omit_empty", TagError::MiscasedOption("omitempty", "omit_empty".into()))]
    #[case("a,bogus", TagError::UnknownOption("bogus".into()))]
    #[case("a,format", TagError::FormatMissingValue)]
    #[case("a,format:", TagError::FormatMissingValue)]
    #[case("a,9fine", TagError::InvalidOptionStart('9'))]
    fn rejected_tags(#[case] tag: &str, #[case] want: TagError) {
        assert_eq!(parse_tag(tag).unwrap_err(), want);
    }

    #[test]
    fn stray_characters_rejected() {
        assert!(matches!(parse_tag("a b"), Err(TagError::InvalidCharacter(' '))));
        assert!(matches!(parse_tag("a,,string"), Err(TagError::InvalidOptionStart(','))));
    }
}
