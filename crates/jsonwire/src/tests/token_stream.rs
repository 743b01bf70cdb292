//! Token- and value-level streaming behavior.

use crate::tests::OneByteReader;
use crate::{
    Decoder, DecodeOptions, EncodeOptions, Encoder, Error, Kind, RawValueBuf, SyntaxErrorKind,
    Token,
};

#[test]
fn object_token_walk_with_offsets() {
    let mut dec = Decoder::from_slice(br#"{"0":0,"1":1}"#);
    let mut kinds = Vec::new();
    loop {
        match dec.read_token() {
            Ok(tok) => kinds.push(tok.kind()),
            Err(err) => {
                assert!(err.is_eof(), "{err}");
                break;
            }
        }
    }
    assert_eq!(
        kinds,
        vec![
            Kind::OBJECT_START,
            Kind::STRING,
            Kind::NUMBER,
            Kind::STRING,
            Kind::NUMBER,
            Kind::OBJECT_END,
        ]
    );
    assert_eq!(dec.input_offset(), 13);
}

#[test]
fn nested_arrays_compact() {
    let mut dec = Decoder::from_slice(b"[ [ [ [ [ ] ] ] ] ]");
    let mut value = dec.read_value().unwrap().to_owned();
    value.compact(&DecodeOptions::default()).unwrap();
    assert_eq!(value.as_bytes(), b"[[[[[]]]]]");
}

#[test]
fn interleaved_tokens_and_values() {
    let mut dec = Decoder::from_slice(br#"{"rows": [[1], [2, 3]], "done": true}"#);
    assert_eq!(dec.read_token().unwrap().kind(), Kind::OBJECT_START);
    assert_eq!(dec.read_token().unwrap().as_str(), Some("rows"));
    assert_eq!(dec.read_token().unwrap().kind(), Kind::ARRAY_START);
    let mut rows = Vec::new();
    loop {
        match dec.read_value() {
            Ok(v) => rows.push(v.to_owned()),
            Err(Error::Syntax(e)) if matches!(e.kind, SyntaxErrorKind::EndOfContainer(_)) => {
                break;
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].as_bytes(), b"[2, 3]");
    assert_eq!(dec.read_token().unwrap().kind(), Kind::ARRAY_END);
    assert_eq!(dec.read_token().unwrap().as_str(), Some("done"));
    assert_eq!(dec.read_token().unwrap().kind(), Kind::TRUE);
    assert_eq!(dec.read_token().unwrap().kind(), Kind::OBJECT_END);
}

#[test]
fn one_byte_reads_complete_in_linear_time() {
    // A long string plus nested structure; a restart-from-zero scanner
    // would go quadratic here and time the test out.
    let mut doc = String::from(r#"{"blob": ""#);
    doc.push_str(&"abcdefgh".repeat(8 * 1024));
    doc.push_str(r#"", "tail": [1, 2, 3]}"#);

    let mut dec = Decoder::new(OneByteReader::new(doc.as_bytes()));
    let value = dec.read_value().unwrap().to_owned();
    assert_eq!(value.as_bytes(), doc.as_bytes());

    // And the same through the token interface.
    let mut dec = Decoder::new(OneByteReader::new(doc.as_bytes()));
    let mut count = 0;
    loop {
        match dec.read_token() {
            Ok(_) => count += 1,
            Err(err) => {
                assert!(err.is_eof(), "{err}");
                break;
            }
        }
    }
    assert_eq!(count, 10);
    assert_eq!(dec.input_offset(), doc.len() as u64);
}

#[test]
fn token_stream_reencodes_to_equivalent_stream() {
    let inputs: &[&str] = &[
        r#"{"a": 1, "b": [true, null, "x\ny"], "c": {"d": -0.5e2}}"#,
        r#"[[],{},"",0,-1,1.5,null,true,false]"#,
        r#""plain""#,
    ];
    for input in inputs {
        let first = read_all(input.as_bytes());
        let reencoded = write_all(&first);
        let second = read_all(&reencoded);
        assert_eq!(first, second, "{input}");
    }
}

fn read_all(input: &[u8]) -> Vec<Token<'static>> {
    let mut dec = Decoder::from_slice(input);
    let mut tokens = Vec::new();
    loop {
        match dec.read_token() {
            Ok(tok) => tokens.push(tok.into_owned()),
            Err(err) => {
                assert!(err.is_eof(), "{err}");
                return tokens;
            }
        }
    }
}

fn write_all(tokens: &[Token<'static>]) -> Vec<u8> {
    let opts = EncodeOptions { omit_top_level_newline: true, ..EncodeOptions::default() };
    let mut enc = Encoder::new_buffer_with_options(opts);
    for tok in tokens {
        enc.write_token(tok).unwrap();
    }
    enc.into_bytes()
}

#[test]
fn compact_matches_token_reencoding() {
    let input = br#" { "a" : [ 1 , 2 ] , "b" : "x" } "#;
    let mut value = RawValueBuf::from(std::str::from_utf8(input).unwrap());
    value.compact(&DecodeOptions::default()).unwrap();
    let tokens = read_all(input);
    assert_eq!(value.as_bytes(), write_all(&tokens));
}

#[test]
fn whitespace_separated_top_level_stream() {
    let mut dec = Decoder::from_slice(b"1 \"two\"\nnull\t[3]");
    assert_eq!(dec.read_token().unwrap().as_i64(), Some(1));
    assert_eq!(dec.read_token().unwrap().as_str(), Some("two"));
    assert_eq!(dec.read_token().unwrap().kind(), Kind::NULL);
    assert_eq!(dec.read_value().unwrap().as_bytes(), b"[3]");
    assert!(dec.read_token().unwrap_err().is_eof());
}

#[test]
fn encoder_decoder_pointer_agreement() {
    let input = br#"{"a": {"list": [10, 20, 30]}}"#;
    let mut dec = Decoder::from_slice(input);
    for _ in 0..8 {
        dec.read_token().unwrap();
    }
    assert_eq!(dec.stack_pointer(), "/a/list/2");

    let mut enc = Encoder::new_buffer();
    enc.write_token(&Token::OBJECT_START).unwrap();
    enc.write_token(&Token::string("a")).unwrap();
    enc.write_token(&Token::OBJECT_START).unwrap();
    enc.write_token(&Token::string("list")).unwrap();
    enc.write_token(&Token::ARRAY_START).unwrap();
    for v in [10, 20, 30] {
        enc.write_token(&Token::int(v)).unwrap();
    }
    assert_eq!(enc.stack_pointer(), "/a/list/2");
}
