//! Text-side tokenizer over a [`ByteChannel`].
//!
//! The wire format is mostly printable text, but the same byte-code space is
//! shared with the binary escapes in [`crate::binary`]. As a consequence,
//! [`read_int`] can fall through into the binary decoder when a raw type-code
//! byte sits where the grammar expects a textual integer. This is an artifact
//! of the original format rather than a deliberate feature, but peers depend
//! on it, so it is preserved exactly and not extended to other token readers.

use std::io::Read;

use objwire_channel::{ByteChannel, ChannelError};

use crate::binary;
use crate::error::{DecodeError, Result};
use crate::graph::PointerTable;
use crate::value::Value;

/// Bytes that terminate a bareword, in addition to whitespace.
pub const WORD_DELIMITERS: &[u8] = b"()[]{};,:|#";

/// True for the blanks the wire format skips between tokens.
pub fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_word_delimiter(byte: u8) -> bool {
    WORD_DELIMITERS.contains(&byte)
}

/// Binary type codes that [`read_int`] silently accepts in place of digits.
fn is_binary_int_code(byte: u8) -> bool {
    matches!(byte, 0x01..=0x08 | 0x0B | 0x0C | 0x16 | 0x17)
}

/// Consume blanks up to the next non-blank byte.
pub fn skip_blanks<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    loop {
        let byte = chan.read_byte()?;
        if !is_blank(byte) {
            chan.unread(&[byte]);
            return Ok(());
        }
    }
}

/// Consume the remainder of a `#` line comment, including the newline.
pub fn skip_comment_to_eol<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    loop {
        if chan.read_byte()? == b'\n' {
            return Ok(());
        }
    }
}

/// Consume blanks and `#` line comments.
pub fn skip_blanks_and_comments<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    loop {
        let byte = chan.read_byte()?;
        if byte == b'#' {
            skip_comment_to_eol(chan)?;
        } else if !is_blank(byte) {
            chan.unread(&[byte]);
            return Ok(());
        }
    }
}

/// Consume blanks, comments and the `,` `;` element separators.
pub fn skip_blanks_comments_separators<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    loop {
        let byte = chan.read_byte()?;
        if byte == b'#' {
            skip_comment_to_eol(chan)?;
        } else if !is_blank(byte) && byte != b',' && byte != b';' {
            chan.unread(&[byte]);
            return Ok(());
        }
    }
}

/// Read a bareword: bytes up to the next blank or delimiter.
///
/// The terminating byte is left on the channel. EOF after at least one byte
/// ends the word cleanly.
pub fn read_word<T: Read>(chan: &mut ByteChannel<T>) -> Result<String> {
    let mut word = Vec::new();
    loop {
        let byte = match chan.read_byte() {
            Ok(byte) => byte,
            Err(ChannelError::Truncated { .. }) if !word.is_empty() => break,
            Err(err) => return Err(err.into()),
        };
        if is_blank(byte) || is_word_delimiter(byte) {
            chan.unread(&[byte]);
            break;
        }
        word.push(byte);
    }
    if word.is_empty() {
        let found = chan.peek()?;
        return Err(DecodeError::UnexpectedByte {
            found,
            expected: "word",
        });
    }
    String::from_utf8(word).map_err(|_| DecodeError::BadUtf8("word"))
}

/// Read a `"`-delimited string with backslash escapes.
pub fn read_quoted_string<T: Read>(chan: &mut ByteChannel<T>) -> Result<String> {
    expect_byte(chan, b'"', "opening quote")?;
    let mut bytes = Vec::new();
    loop {
        match chan.read_byte()? {
            b'"' => break,
            b'\\' => bytes.push(unescape(chan.read_byte()?)),
            byte => bytes.push(byte),
        }
    }
    String::from_utf8(bytes).map_err(|_| DecodeError::BadUtf8("quoted string"))
}

fn unescape(byte: u8) -> u8 {
    match byte {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'0' => 0,
        other => other,
    }
}

/// Read one textual integer.
///
/// Quirk preserved from the original wire contract: if the next byte is a
/// binary integer type code the read delegates to the binary decoder and
/// returns whatever value results, which may not be an integer at all once
/// pointers are involved. Callers that genuinely need an integer go through
/// [`read_int_i64`] / [`read_int_u64`].
pub fn read_int<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    skip_blanks_and_comments(chan)?;
    if is_binary_int_code(chan.peek()?) {
        return binary::decode(chan, table);
    }
    let token = read_numeric_token(chan)?;
    token
        .parse::<i64>()
        .map(Value::int)
        .map_err(|_| DecodeError::ExpectedInt(token))
}

/// Read a textual integer and narrow it to i64.
pub fn read_int_i64<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<i64> {
    let value = read_int(chan, table)?;
    value
        .as_i64()
        .ok_or_else(|| DecodeError::ExpectedInt(format!("{value:?}")))
}

/// Read a textual integer and narrow it to u64.
pub fn read_int_u64<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<u64> {
    let value = read_int(chan, table)?;
    value
        .as_u64()
        .ok_or_else(|| DecodeError::ExpectedInt(format!("{value:?}")))
}

/// Read one textual floating point number.
pub fn read_float<T: Read>(chan: &mut ByteChannel<T>) -> Result<f64> {
    skip_blanks_and_comments(chan)?;
    let token = read_numeric_token(chan)?;
    token
        .parse::<f64>()
        .map_err(|_| DecodeError::ExpectedFloat(token))
}

/// Accumulate the characters of a decimal number: sign, digits, `.`,
/// exponent. The first byte outside the number is left on the channel.
pub(crate) fn read_numeric_token<T: Read>(chan: &mut ByteChannel<T>) -> Result<String> {
    let mut token = Vec::new();
    let mut prev = 0u8;
    loop {
        let byte = match chan.read_byte() {
            Ok(byte) => byte,
            Err(ChannelError::Truncated { .. }) if !token.is_empty() => break,
            Err(err) => return Err(err.into()),
        };
        let accept = byte.is_ascii_digit()
            || byte == b'.'
            || byte == b'e'
            || byte == b'E'
            || ((byte == b'+' || byte == b'-')
                && (token.is_empty() || prev == b'e' || prev == b'E'));
        if !accept {
            chan.unread(&[byte]);
            break;
        }
        prev = byte;
        token.push(byte);
    }
    if token.is_empty() {
        let found = chan.peek()?;
        return Err(DecodeError::UnexpectedByte {
            found,
            expected: "number",
        });
    }
    String::from_utf8(token).map_err(|_| DecodeError::BadUtf8("number"))
}

fn expect_byte<T: Read>(
    chan: &mut ByteChannel<T>,
    expected_byte: u8,
    expected: &'static str,
) -> Result<()> {
    let found = chan.read_byte()?;
    if found != expected_byte {
        return Err(DecodeError::UnexpectedByte { found, expected });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::value::{FloatWidth, IntWidth};

    fn chan(bytes: &[u8]) -> ByteChannel<Cursor<Vec<u8>>> {
        ByteChannel::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn skips_blanks_and_comments() {
        let mut c = chan(b"  \t# a comment\n  \r\nword");
        skip_blanks_and_comments(&mut c).unwrap();
        assert_eq!(read_word(&mut c).unwrap(), "word");
    }

    #[test]
    fn separators_are_skipped_with_blanks() {
        let mut c = chan(b" , ; # trailing\n next");
        skip_blanks_comments_separators(&mut c).unwrap();
        assert_eq!(c.peek().unwrap(), b'n');
    }

    #[test]
    fn word_stops_at_delimiters() {
        for delim in WORD_DELIMITERS {
            let mut c = chan(&[b"abc".as_ref(), &[*delim], b"rest"].concat());
            assert_eq!(read_word(&mut c).unwrap(), "abc");
            assert_eq!(c.peek().unwrap(), *delim);
        }
    }

    #[test]
    fn word_stops_at_whitespace_and_eof() {
        let mut c = chan(b"alpha beta");
        assert_eq!(read_word(&mut c).unwrap(), "alpha");
        skip_blanks(&mut c).unwrap();
        assert_eq!(read_word(&mut c).unwrap(), "beta");
    }

    #[test]
    fn quoted_string_unescapes() {
        let mut c = chan(b"\"line\\none \\\"two\\\" \\\\ end\"");
        assert_eq!(
            read_quoted_string(&mut c).unwrap(),
            "line\none \"two\" \\ end"
        );
    }

    #[test]
    fn reads_signed_integers() {
        let mut table = PointerTable::new();
        let mut c = chan(b"  -42 ");
        assert_eq!(read_int(&mut c, &mut table).unwrap(), Value::int(-42));
    }

    #[test]
    fn read_int_rejects_fractions() {
        let mut table = PointerTable::new();
        let mut c = chan(b"3.5");
        assert!(matches!(
            read_int(&mut c, &mut table),
            Err(DecodeError::ExpectedInt(_))
        ));
    }

    #[test]
    fn read_int_falls_through_to_binary_codec() {
        // 0x07 = little-endian i32 scalar; a raw control byte where digits
        // were expected yields a binary-decoded value.
        let mut wire = vec![0x07];
        wire.extend_from_slice(&123456i32.to_le_bytes());
        let mut table = PointerTable::new();
        let mut c = chan(&wire);

        let value = read_int(&mut c, &mut table).unwrap();
        assert_eq!(
            value,
            Value::Int {
                value: 123456,
                width: IntWidth::W32,
                signed: true,
            }
        );
    }

    #[test]
    fn read_int_u64_rejects_negative() {
        let mut table = PointerTable::new();
        let mut c = chan(b"-1");
        assert!(matches!(
            read_int_u64(&mut c, &mut table),
            Err(DecodeError::ExpectedInt(_))
        ));
    }

    #[test]
    fn reads_floats_with_exponents() {
        let mut c = chan(b" -1.25e-3,");
        assert_eq!(read_float(&mut c).unwrap(), -1.25e-3);
        assert_eq!(c.peek().unwrap(), b',');
    }

    #[test]
    fn float_width_of_textual_reads_is_w64() {
        match Value::float(0.5) {
            Value::Float { width, .. } => assert_eq!(width, FloatWidth::W64),
            other => panic!("unexpected value {other:?}"),
        }
    }
}
