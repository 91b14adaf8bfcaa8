//! Binary type-code dispatch for scalars and typed flat sequences.
//!
//! Every binary value starts with one tag byte. Scalar tags come in
//! little-endian/big-endian pairs; sequence headers carry their own
//! endianness and dimensionality. Printable tags hand off to the text side:
//! `"` strings, `*` pointers, `{` dicts, `(` tuples, `0`/`1` bools, letters
//! for named objects, digits and signs for textual numbers.

use std::io::Read;

use objwire_channel::ByteChannel;
use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::graph::{self, PointerTable};
use crate::lexer;
use crate::object;
use crate::value::{Array, ArrayData, ElemType, FloatWidth, IntWidth, Value};

pub const TAG_I8: u8 = 0x01;
pub const TAG_U8: u8 = 0x02;
pub const TAG_I16_LE: u8 = 0x03;
pub const TAG_I16_BE: u8 = 0x04;
pub const TAG_U16_LE: u8 = 0x05;
pub const TAG_U16_BE: u8 = 0x06;
pub const TAG_I32_LE: u8 = 0x07;
pub const TAG_I32_BE: u8 = 0x08;
pub const TAG_U32_LE: u8 = 0x0B;
pub const TAG_U32_BE: u8 = 0x0C;
pub const TAG_F32_LE: u8 = 0x0E;
pub const TAG_F32_BE: u8 = 0x0F;
pub const TAG_F64_LE: u8 = 0x10;
pub const TAG_F64_BE: u8 = 0x11;
pub const TAG_SEQ_1D_LE: u8 = 0x12;
pub const TAG_SEQ_1D_BE: u8 = 0x13;
pub const TAG_SEQ_2D_LE: u8 = 0x14;
pub const TAG_SEQ_2D_BE: u8 = 0x15;
pub const TAG_I64_LE: u8 = 0x16;
pub const TAG_I64_BE: u8 = 0x17;

/// Element type code for sequences whose elements are decoded one by one.
pub const TAG_ELEM_GENERIC: u8 = 0xFF;

/// Upper bound on the raw byte length of one sequence. Shape dimensions
/// come from the peer; a header declaring more than this is malformed, not
/// a reason to attempt the allocation.
pub const MAX_SEQUENCE_BYTES: usize = 1 << 30;

/// Decode one value, dispatching on its leading byte.
pub fn decode<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    lexer::skip_blanks_and_comments(chan)?;
    let tag = chan.read_byte()?;
    trace!(tag, "decoding value");
    match tag {
        TAG_I8 => Ok(int_value(read_raw(chan, 1, false)? as i8 as i64, IntWidth::W8, true)),
        TAG_U8 => Ok(int_value(read_raw(chan, 1, false)? as i64, IntWidth::W8, false)),
        TAG_I16_LE | TAG_I16_BE => {
            let raw = read_raw(chan, 2, tag == TAG_I16_BE)?;
            Ok(int_value(raw as i16 as i64, IntWidth::W16, true))
        }
        TAG_U16_LE | TAG_U16_BE => {
            let raw = read_raw(chan, 2, tag == TAG_U16_BE)?;
            Ok(int_value(raw as i64, IntWidth::W16, false))
        }
        TAG_I32_LE | TAG_I32_BE => {
            let raw = read_raw(chan, 4, tag == TAG_I32_BE)?;
            Ok(int_value(raw as i32 as i64, IntWidth::W32, true))
        }
        TAG_U32_LE | TAG_U32_BE => {
            let raw = read_raw(chan, 4, tag == TAG_U32_BE)?;
            Ok(int_value(raw as i64, IntWidth::W32, false))
        }
        TAG_I64_LE | TAG_I64_BE => {
            let raw = read_raw(chan, 8, tag == TAG_I64_BE)?;
            Ok(int_value(raw as i64, IntWidth::W64, true))
        }
        TAG_F32_LE | TAG_F32_BE => {
            let raw = read_raw(chan, 4, tag == TAG_F32_BE)? as u32;
            Ok(Value::Float {
                value: f32::from_bits(raw) as f64,
                width: FloatWidth::W32,
            })
        }
        TAG_F64_LE | TAG_F64_BE => {
            let raw = read_raw(chan, 8, tag == TAG_F64_BE)?;
            Ok(Value::Float {
                value: f64::from_bits(raw),
                width: FloatWidth::W64,
            })
        }
        TAG_SEQ_1D_LE | TAG_SEQ_1D_BE | TAG_SEQ_2D_LE | TAG_SEQ_2D_BE => {
            decode_sequence(chan, table, tag)
        }
        b'"' => {
            chan.unread(b"\"");
            Ok(Value::Str(lexer::read_quoted_string(chan)?))
        }
        b'*' => {
            chan.unread(b"*");
            graph::decode_pointer(chan, table)
        }
        b'{' => {
            chan.unread(b"{");
            graph::decode_dict(chan, table)
        }
        b'(' => {
            chan.unread(b"(");
            graph::decode_tuple(chan, table)
        }
        b'0' | b'1' => {
            // A lone 0/1 is a boolean; with a numeric continuation it is the
            // first digit of a number.
            if number_continues(chan)? {
                chan.unread(&[tag]);
                decode_text_number(chan)
            } else {
                Ok(Value::Bool(tag == b'1'))
            }
        }
        b'2'..=b'9' | b'-' | b'+' | b'.' => {
            chan.unread(&[tag]);
            decode_text_number(chan)
        }
        byte if byte.is_ascii_alphabetic() || byte == b'_' => {
            chan.unread(&[byte]);
            object::decode_object(chan, table)
        }
        other => Err(DecodeError::UnexpectedTag(other)),
    }
}

fn int_value(value: i64, width: IntWidth, signed: bool) -> Value {
    Value::Int {
        value,
        width,
        signed,
    }
}

/// Read `n` raw bytes, zero-extended into a u64 honouring the byte order.
fn read_raw<T: Read>(chan: &mut ByteChannel<T>, n: usize, big_endian: bool) -> Result<u64> {
    let bytes = chan.read_exact_bytes(n)?;
    let mut padded = [0u8; 8];
    if big_endian {
        padded[8 - n..].copy_from_slice(&bytes);
        Ok(u64::from_be_bytes(padded))
    } else {
        padded[..n].copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(padded))
    }
}

fn number_continues<T: Read>(chan: &mut ByteChannel<T>) -> Result<bool> {
    match chan.peek() {
        Ok(byte) => Ok(byte.is_ascii_digit() || matches!(byte, b'.' | b'e' | b'E')),
        Err(objwire_channel::ChannelError::Truncated { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn decode_text_number<T: Read>(chan: &mut ByteChannel<T>) -> Result<Value> {
    let token = lexer::read_numeric_token(chan)?;
    if token.bytes().any(|b| matches!(b, b'.' | b'e' | b'E')) {
        token
            .parse::<f64>()
            .map(Value::float)
            .map_err(|_| DecodeError::ExpectedFloat(token))
    } else {
        token
            .parse::<i64>()
            .map(Value::int)
            .map_err(|_| DecodeError::ExpectedInt(token))
    }
}

fn elem_type_from_tag(tag: u8) -> Result<ElemType> {
    Ok(match tag {
        TAG_I8 => ElemType::I8,
        TAG_U8 => ElemType::U8,
        TAG_I16_LE | TAG_I16_BE => ElemType::I16,
        TAG_U16_LE | TAG_U16_BE => ElemType::U16,
        TAG_I32_LE | TAG_I32_BE => ElemType::I32,
        TAG_U32_LE | TAG_U32_BE => ElemType::U32,
        TAG_I64_LE | TAG_I64_BE => ElemType::I64,
        TAG_F32_LE | TAG_F32_BE => ElemType::F32,
        TAG_F64_LE | TAG_F64_BE => ElemType::F64,
        TAG_ELEM_GENERIC => ElemType::Generic,
        other => return Err(DecodeError::UnexpectedTag(other)),
    })
}

fn elem_tag(elem: ElemType, big_endian: bool) -> u8 {
    match (elem, big_endian) {
        (ElemType::I8, _) => TAG_I8,
        (ElemType::U8, _) => TAG_U8,
        (ElemType::I16, false) => TAG_I16_LE,
        (ElemType::I16, true) => TAG_I16_BE,
        (ElemType::U16, false) => TAG_U16_LE,
        (ElemType::U16, true) => TAG_U16_BE,
        (ElemType::I32, false) => TAG_I32_LE,
        (ElemType::I32, true) => TAG_I32_BE,
        (ElemType::U32, false) => TAG_U32_LE,
        (ElemType::U32, true) => TAG_U32_BE,
        (ElemType::I64, false) => TAG_I64_LE,
        (ElemType::I64, true) => TAG_I64_BE,
        (ElemType::F32, false) => TAG_F32_LE,
        (ElemType::F32, true) => TAG_F32_BE,
        (ElemType::F64, false) => TAG_F64_LE,
        (ElemType::F64, true) => TAG_F64_BE,
        (ElemType::Generic, _) => TAG_ELEM_GENERIC,
    }
}

fn decode_sequence<T: Read>(
    chan: &mut ByteChannel<T>,
    table: &mut PointerTable,
    header: u8,
) -> Result<Value> {
    let dims = if header == TAG_SEQ_2D_LE || header == TAG_SEQ_2D_BE {
        2
    } else {
        1
    };
    let big_endian = header == TAG_SEQ_1D_BE || header == TAG_SEQ_2D_BE;

    let elem = elem_type_from_tag(chan.read_byte()?)?;

    let mut shape = Vec::with_capacity(dims);
    for _ in 0..dims {
        let raw = read_raw(chan, 4, big_endian)? as u32 as i32;
        if raw < 0 {
            return Err(DecodeError::Malformed(format!(
                "negative sequence dimension {raw}"
            )));
        }
        shape.push(raw as usize);
    }
    let count = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| DecodeError::Malformed(format!("sequence shape {shape:?} overflows")))?;
    trace!(?shape, ?elem, big_endian, "decoding sequence");

    if elem == ElemType::Generic {
        if dims == 2 {
            return Err(DecodeError::Unsupported("generic 2-D sequence"));
        }
        // Capacity is a hint, not a trusted field; undershooting only costs
        // a regrow, while the per-element decode bounds the real length.
        let mut values = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            values.push(decode(chan, table)?);
        }
        return Ok(Value::Array(Array {
            elem,
            shape,
            data: ArrayData::Generic(values),
        }));
    }

    let byte_len = count
        .checked_mul(elem.size())
        .filter(|&len| len <= MAX_SEQUENCE_BYTES)
        .ok_or_else(|| {
            DecodeError::Malformed(format!(
                "sequence of {count} {elem:?} elements exceeds the size bound"
            ))
        })?;
    let raw = chan.read_exact_bytes(byte_len)?;
    let data = match elem {
        ElemType::I8 => ArrayData::I8(raw.iter().map(|b| *b as i8).collect()),
        ElemType::U8 => ArrayData::U8(raw.to_vec()),
        ElemType::I16 => ArrayData::I16(convert(&raw, big_endian, i16::from_le_bytes, i16::from_be_bytes)),
        ElemType::U16 => ArrayData::U16(convert(&raw, big_endian, u16::from_le_bytes, u16::from_be_bytes)),
        ElemType::I32 => ArrayData::I32(convert(&raw, big_endian, i32::from_le_bytes, i32::from_be_bytes)),
        ElemType::U32 => ArrayData::U32(convert(&raw, big_endian, u32::from_le_bytes, u32::from_be_bytes)),
        ElemType::I64 => ArrayData::I64(convert(&raw, big_endian, i64::from_le_bytes, i64::from_be_bytes)),
        ElemType::F32 => ArrayData::F32(convert(&raw, big_endian, f32::from_le_bytes, f32::from_be_bytes)),
        ElemType::F64 => ArrayData::F64(convert(&raw, big_endian, f64::from_le_bytes, f64::from_be_bytes)),
        ElemType::Generic => unreachable!("handled above"),
    };

    Ok(Value::Array(Array { elem, shape, data }))
}

/// Reinterpret a raw buffer as host-order elements, swapping if the stream's
/// declared byte order differs.
fn convert<const N: usize, E>(
    raw: &[u8],
    big_endian: bool,
    from_le: fn([u8; N]) -> E,
    from_be: fn([u8; N]) -> E,
) -> Vec<E> {
    raw.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            if big_endian {
                from_be(bytes)
            } else {
                from_le(bytes)
            }
        })
        .collect()
}

/// Encode one scalar in its binary form. The inverse of the scalar arm of
/// [`decode`].
pub fn encode_scalar(value: &Value, big_endian: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match value {
        Value::Int {
            value,
            width,
            signed,
        } => {
            let size = width.size();
            let tag = match (width, signed) {
                (IntWidth::W8, true) => TAG_I8,
                (IntWidth::W8, false) => TAG_U8,
                (IntWidth::W16, true) => elem_tag(ElemType::I16, big_endian),
                (IntWidth::W16, false) => elem_tag(ElemType::U16, big_endian),
                (IntWidth::W32, true) => elem_tag(ElemType::I32, big_endian),
                (IntWidth::W32, false) => elem_tag(ElemType::U32, big_endian),
                (IntWidth::W64, true) => elem_tag(ElemType::I64, big_endian),
                (IntWidth::W64, false) => {
                    return Err(DecodeError::Unsupported("unsigned 64-bit scalar"))
                }
            };
            out.push(tag);
            let bytes = if big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            if big_endian {
                out.extend_from_slice(&bytes[8 - size..]);
            } else {
                out.extend_from_slice(&bytes[..size]);
            }
        }
        Value::Float { value, width } => match width {
            FloatWidth::W32 => {
                out.push(elem_tag(ElemType::F32, big_endian));
                let bits = *value as f32;
                out.extend_from_slice(&if big_endian {
                    bits.to_be_bytes()
                } else {
                    bits.to_le_bytes()
                });
            }
            FloatWidth::W64 => {
                out.push(elem_tag(ElemType::F64, big_endian));
                out.extend_from_slice(&if big_endian {
                    value.to_be_bytes()
                } else {
                    value.to_le_bytes()
                });
            }
        },
        other => {
            return Err(DecodeError::Malformed(format!(
                "not a binary scalar: {other:?}"
            )))
        }
    }
    Ok(out)
}

/// Encode an array as a typed sequence. The inverse of [`decode`]'s sequence
/// arm; generic elements are written in their textual form.
pub fn encode_sequence(array: &Array, big_endian: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let header = match (array.shape.len(), big_endian) {
        (1, false) => TAG_SEQ_1D_LE,
        (1, true) => TAG_SEQ_1D_BE,
        (2, false) => TAG_SEQ_2D_LE,
        (2, true) => TAG_SEQ_2D_BE,
        (dims, _) => {
            return Err(DecodeError::Malformed(format!(
                "{dims}-dimensional sequence"
            )))
        }
    };
    out.push(header);
    out.push(elem_tag(array.elem, big_endian));
    for dim in &array.shape {
        let dim = i32::try_from(*dim)
            .map_err(|_| DecodeError::Malformed(format!("sequence dimension {dim} overflows")))?;
        out.extend_from_slice(&if big_endian {
            dim.to_be_bytes()
        } else {
            dim.to_le_bytes()
        });
    }

    fn put<const N: usize, E: Copy>(
        out: &mut Vec<u8>,
        values: &[E],
        big_endian: bool,
        to_le: fn(E) -> [u8; N],
        to_be: fn(E) -> [u8; N],
    ) {
        for v in values {
            out.extend_from_slice(&if big_endian { to_be(*v) } else { to_le(*v) });
        }
    }

    match &array.data {
        ArrayData::I8(v) => out.extend(v.iter().map(|b| *b as u8)),
        ArrayData::U8(v) => out.extend_from_slice(v),
        ArrayData::I16(v) => put(&mut out, v, big_endian, i16::to_le_bytes, i16::to_be_bytes),
        ArrayData::U16(v) => put(&mut out, v, big_endian, u16::to_le_bytes, u16::to_be_bytes),
        ArrayData::I32(v) => put(&mut out, v, big_endian, i32::to_le_bytes, i32::to_be_bytes),
        ArrayData::U32(v) => put(&mut out, v, big_endian, u32::to_le_bytes, u32::to_be_bytes),
        ArrayData::I64(v) => put(&mut out, v, big_endian, i64::to_le_bytes, i64::to_be_bytes),
        ArrayData::F32(v) => put(&mut out, v, big_endian, f32::to_le_bytes, f32::to_be_bytes),
        ArrayData::F64(v) => put(&mut out, v, big_endian, f64::to_le_bytes, f64::to_be_bytes),
        ArrayData::Generic(values) => {
            for v in values {
                out.extend_from_slice(crate::encode::encode(v).as_bytes());
                out.push(b' ');
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn decode_bytes(bytes: &[u8]) -> Value {
        let mut chan = ByteChannel::new(Cursor::new(bytes.to_vec()));
        let mut table = PointerTable::new();
        decode(&mut chan, &mut table).unwrap()
    }

    #[test]
    fn scalar_roundtrip_all_widths_and_orders() {
        let scalars = [
            int_value(-5, IntWidth::W8, true),
            int_value(200, IntWidth::W8, false),
            int_value(-30000, IntWidth::W16, true),
            int_value(60000, IntWidth::W16, false),
            int_value(-2_000_000_000, IntWidth::W32, true),
            int_value(4_000_000_000, IntWidth::W32, false),
            int_value(-9_000_000_000_000_000_000, IntWidth::W64, true),
            Value::Float {
                value: 1.5,
                width: FloatWidth::W32,
            },
            Value::Float {
                value: -2.25e300,
                width: FloatWidth::W64,
            },
        ];
        for big_endian in [false, true] {
            for scalar in &scalars {
                let wire = encode_scalar(scalar, big_endian).unwrap();
                assert_eq!(&decode_bytes(&wire), scalar, "big_endian={big_endian}");
            }
        }
    }

    #[test]
    fn u8_tag_zero_extends() {
        assert_eq!(
            decode_bytes(&[TAG_U8, 0xFF]),
            int_value(255, IntWidth::W8, false)
        );
    }

    #[test]
    fn sequence_1d_roundtrips_both_orders() {
        let array = Array {
            elem: ElemType::I32,
            shape: vec![4],
            data: ArrayData::I32(vec![1, -2, 300_000, -40]),
        };
        for big_endian in [false, true] {
            let wire = encode_sequence(&array, big_endian).unwrap();
            assert_eq!(decode_bytes(&wire), Value::Array(array.clone()));
        }
    }

    #[test]
    fn sequence_2d_is_row_major() {
        let array = Array {
            elem: ElemType::F64,
            shape: vec![2, 3],
            data: ArrayData::F64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        };
        let wire = encode_sequence(&array, true).unwrap();
        match decode_bytes(&wire) {
            Value::Array(decoded) => {
                assert_eq!(decoded.shape, vec![2, 3]);
                assert_eq!(decoded.data, array.data);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn generic_1d_elements_decode_recursively() {
        let mut wire = vec![TAG_SEQ_1D_LE, TAG_ELEM_GENERIC];
        wire.extend_from_slice(&3i32.to_le_bytes());
        wire.extend_from_slice(b"42 \"hi\" ");
        wire.extend_from_slice(&encode_scalar(&int_value(7, IntWidth::W32, true), false).unwrap());

        match decode_bytes(&wire) {
            Value::Array(array) => {
                assert_eq!(
                    array.data,
                    ArrayData::Generic(vec![
                        Value::int(42),
                        Value::str("hi"),
                        int_value(7, IntWidth::W32, true),
                    ])
                );
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn generic_2d_is_rejected() {
        let mut wire = vec![TAG_SEQ_2D_LE, TAG_ELEM_GENERIC];
        wire.extend_from_slice(&1i32.to_le_bytes());
        wire.extend_from_slice(&1i32.to_le_bytes());

        let mut chan = ByteChannel::new(Cursor::new(wire));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::Unsupported(_))
        ));
    }

    #[test]
    fn overflowing_2d_shape_is_malformed_not_fatal() {
        // i32::MAX x i32::MAX f64 elements overflows any byte count.
        let mut wire = vec![TAG_SEQ_2D_LE, TAG_F64_LE];
        wire.extend_from_slice(&i32::MAX.to_le_bytes());
        wire.extend_from_slice(&i32::MAX.to_le_bytes());

        let mut chan = ByteChannel::new(Cursor::new(wire));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_1d_sequence_is_malformed_not_fatal() {
        // Within usize, but past the raw byte bound: no allocation attempt.
        let mut wire = vec![TAG_SEQ_1D_LE, TAG_F64_LE];
        wire.extend_from_slice(&i32::MAX.to_le_bytes());

        let mut chan = ByteChannel::new(Cursor::new(wire));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn huge_generic_count_fails_on_the_first_missing_element() {
        let mut wire = vec![TAG_SEQ_1D_LE, TAG_ELEM_GENERIC];
        wire.extend_from_slice(&i32::MAX.to_le_bytes());

        let mut chan = ByteChannel::new(Cursor::new(wire));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::Channel(_))
        ));
    }

    #[test]
    fn lone_zero_and_one_are_bools() {
        assert_eq!(decode_bytes(b"1 "), Value::Bool(true));
        assert_eq!(decode_bytes(b"0"), Value::Bool(false));
    }

    #[test]
    fn digits_with_continuation_are_numbers() {
        assert_eq!(decode_bytes(b"10 "), Value::int(10));
        assert_eq!(decode_bytes(b"0.5 "), Value::float(0.5));
        assert_eq!(decode_bytes(b"-3"), Value::int(-3));
        assert_eq!(decode_bytes(b"2e2 "), Value::float(200.0));
    }

    #[test]
    fn quoted_string_tag() {
        assert_eq!(decode_bytes(b"\"text\""), Value::str("text"));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut chan = ByteChannel::new(Cursor::new(vec![0x1Au8]));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::UnexpectedTag(0x1A))
        ));
    }

    #[test]
    fn truncated_scalar_reports_channel_error() {
        let mut chan = ByteChannel::new(Cursor::new(vec![TAG_I32_LE, 0x01]));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode(&mut chan, &mut table),
            Err(DecodeError::Channel(_))
        ));
    }
}
