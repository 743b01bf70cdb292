//! Reader/writer integration: streams of top-level values, retriable
//! sources, and sink-backed marshaling.

use std::io;

use crate::tests::OneByteReader;
use crate::{
    marshal_write, unmarshal_read, Decoder, Encoder, Error, Kind, MarshalOptions, Token, Value,
};

#[test]
fn whole_stream_of_values_decodes() {
    let input = b"{\"n\": 1}\n{\"n\": 2}\n{\"n\": 3}\n";
    let mut dec = Decoder::new(OneByteReader::new(input));
    let mut seen = Vec::new();
    loop {
        match dec.read_value() {
            Ok(v) => seen.push(v.to_owned()),
            Err(err) => {
                assert!(err.is_eof(), "{err}");
                break;
            }
        }
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].as_bytes(), b"{\"n\": 3}");
}

#[test]
fn encoder_reproduces_a_value_stream() {
    let mut sink = Vec::new();
    {
        let mut enc = Encoder::new(&mut sink);
        for i in 0..3 {
            enc.write_token(&Token::OBJECT_START).unwrap();
            enc.write_token(&Token::string("n")).unwrap();
            enc.write_token(&Token::int(i)).unwrap();
            enc.write_token(&Token::OBJECT_END).unwrap();
        }
        enc.flush().unwrap();
    }
    assert_eq!(sink, b"{\"n\":0}\n{\"n\":1}\n{\"n\":2}\n");
}

/// A source that reports an interruption before every productive read.
struct InterruptingReader<'a> {
    inner: OneByteReader<'a>,
    interrupt_next: bool,
}

impl io::Read for InterruptingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupt_next {
            self.interrupt_next = false;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        self.interrupt_next = true;
        self.inner.read(buf)
    }
}

#[test]
fn interrupted_reads_are_retriable() {
    let input = br#"{"a": [1, 2, 3], "b": "xyz"}"#;
    let mut dec =
        Decoder::new(InterruptingReader { inner: OneByteReader::new(input), interrupt_next: true });
    let mut tokens = 0;
    loop {
        match dec.read_token() {
            Ok(_) => tokens += 1,
            Err(err) if err.is_retriable() => continue,
            Err(err) => {
                assert!(err.is_eof(), "{err}");
                break;
            }
        }
    }
    assert_eq!(tokens, 10);
    assert_eq!(dec.input_offset(), input.len() as u64);
}

#[test]
fn read_value_retries_after_interruption() {
    let input = br#"[10, [20, 30], {"k": null}]"#;
    let mut dec =
        Decoder::new(InterruptingReader { inner: OneByteReader::new(input), interrupt_next: true });
    let value = loop {
        match dec.read_value() {
            Ok(v) => break v.to_owned(),
            Err(err) => {
                assert!(err.is_retriable(), "{err}");
            }
        }
    };
    assert_eq!(value.as_bytes(), &input[..]);
}

#[test]
fn unmarshal_read_and_marshal_write_round_trip() {
    let doc: Value = unmarshal_read(OneByteReader::new(br#"{"x": [1, 2], "y": "z"}"#)).unwrap();
    let mut sink = Vec::new();
    marshal_write(&mut sink, &doc).unwrap();
    assert_eq!(sink, br#"{"x":[1,2],"y":"z"}"#);
}

#[test]
fn unmarshal_rejects_trailing_values() {
    let err = crate::unmarshal::<Value>(b"1 2").unwrap_err();
    assert!(err.to_string().contains("after top-level value"), "{err}");
    let v: Value = crate::unmarshal(b"1 \t\n").unwrap();
    assert_eq!(v, Value::Number(1.0));
}

#[test]
fn options_thread_through_the_read_entry_points() {
    let mut input = Vec::from(&br#"{"s": ""#[..]);
    input.extend_from_slice(&[0xFF]);
    input.extend_from_slice(br#""}"#);
    assert!(unmarshal_read::<Value>(OneByteReader::new(&input)).is_err());
    let opts = MarshalOptions {
        decode: crate::DecodeOptions { allow_invalid_utf8: true, ..Default::default() },
        ..MarshalOptions::default()
    };
    // The raw bytes stay invalid UTF-8, so a String target still refuses.
    let err = crate::unmarshal_read_with::<Value>(OneByteReader::new(&input), &opts).unwrap_err();
    assert!(matches!(err, Error::Semantic(_)), "{err}");
}

#[test]
fn peek_drives_heterogeneous_stream_dispatch() {
    let mut dec = Decoder::from_slice(b"1 \"two\" [3] {\"four\": 4} true");
    let mut shapes = Vec::new();
    loop {
        let kind = dec.peek_kind();
        if kind == Kind::INVALID {
            let err = dec.read_token().unwrap_err();
            assert!(err.is_eof(), "{err}");
            break;
        }
        match kind {
            Kind::OBJECT_START | Kind::ARRAY_START => {
                dec.skip_value().unwrap();
            }
            _ => {
                dec.read_token().unwrap();
            }
        }
        shapes.push(kind);
    }
    assert_eq!(
        shapes,
        vec![Kind::NUMBER, Kind::STRING, Kind::ARRAY_START, Kind::OBJECT_START, Kind::TRUE]
    );
}
