//! Number formatting for the encoder.
//!
//! Integers append directly in base 10 via `itoa`. Floats go through `ryu`
//! for the shortest representation that round-trips at their bit width,
//! then drop a trailing `.0` so integral values render bare. Exponents are
//! lowercase `e` with no leading `+` on the mantissa.

pub(crate) fn append_i64(dst: &mut Vec<u8>, v: i64) {
    let mut buf = itoa::Buffer::new();
    dst.extend_from_slice(buf.format(v).as_bytes());
}

pub(crate) fn append_u64(dst: &mut Vec<u8>, v: u64) {
    let mut buf = itoa::Buffer::new();
    dst.extend_from_slice(buf.format(v).as_bytes());
}

pub(crate) fn append_f64(dst: &mut Vec<u8>, v: f64) {
    let mut buf = ryu::Buffer::new();
    append_shortest(dst, buf.format_finite(v));
}

pub(crate) fn append_f32(dst: &mut Vec<u8>, v: f32) {
    let mut buf = ryu::Buffer::new();
    append_shortest(dst, buf.format_finite(v));
}

// ryu renders integral values with a ".0" suffix; JSON wants fractions
// only when needed.
fn append_shortest(dst: &mut Vec<u8>, s: &str) {
    let s = s.strip_suffix(".0").unwrap_or(s);
    dst.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_str(v: f64) -> String {
        let mut out = Vec::new();
        append_f64(&mut out, v);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn integers() {
        let mut out = Vec::new();
        append_i64(&mut out, i64::MIN);
        out.push(b' ');
        append_u64(&mut out, u64::MAX);
        assert_eq!(out, b"-9223372036854775808 18446744073709551615");
    }

    #[test]
    fn floats_are_shortest_form() {
        assert_eq!(f64_str(1.0), "1");
        assert_eq!(f64_str(-0.0), "-0");
        assert_eq!(f64_str(0.1), "0.1");
        assert_eq!(f64_str(1e300), "1e300");
        assert_eq!(f64_str(f64::MAX), "1.7976931348623157e308");
    }

    #[test]
    fn float32_round_trips_at_its_width() {
        let mut out = Vec::new();
        append_f32(&mut out, 0.1_f32);
        assert_eq!(out, b"0.1");
    }

    #[test]
    fn formatted_floats_reparse_exactly() {
        for v in [0.0, 1.5, -2.25, 1e-7, 123456.789, f64::MAX, 5e-324] {
            let s = f64_str(v);
            assert_eq!(s.parse::<f64>().unwrap(), v, "{s}");
        }
    }
}
