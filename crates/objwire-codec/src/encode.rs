//! Outbound textual serializer for the tagged value model.
//!
//! Numbers print in shortest round-trip decimal form, booleans as `0`/`1`
//! (the binary-compatible text convention of the wire), sequences as
//! space-joined runs without brackets.

use std::fmt::Write;

use crate::value::{Array, ArrayData, FloatWidth, Value};

/// Encode one value into its outbound textual form.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Encode call arguments as a single space-joined run.
pub fn encode_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_value(&mut out, arg);
    }
    out
}

/// Append the textual form of `value` to `out`.
pub fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("*0"),
        Value::Bool(true) => out.push('1'),
        Value::Bool(false) => out.push('0'),
        Value::Int { value, .. } => {
            let _ = write!(out, "{value}");
        }
        Value::Float { value, width } => match width {
            // Narrow before formatting so an f32 prints its own shortest
            // form, not the noise of its f64 widening.
            FloatWidth::W32 => {
                let _ = write!(out, "{}", *value as f32);
            }
            FloatWidth::W64 => {
                let _ = write!(out, "{value}");
            }
        },
        Value::Str(s) => write_quoted(out, s),
        Value::Array(array) => write_array(out, array),
        Value::Dict(pairs) => {
            out.push_str("{ ");
            for (i, (key, val)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, key);
                out.push_str(": ");
                write_value(out, val);
            }
            out.push_str(" }");
        }
        Value::Tuple(elements) => {
            out.push_str("( ");
            for element in elements {
                write_value(out, element);
                out.push(' ');
            }
            out.push(')');
        }
        Value::Object(object) => {
            out.push_str(&object.classname);
            out.push('(');
            for (i, (key, val)) in object.options.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{key} = ");
                write_value(out, val);
            }
            out.push(')');
        }
    }
}

/// Sequences are written as space-joined elements, row-major, without
/// enclosing brackets.
fn write_array(out: &mut String, array: &Array) {
    let mut first = true;
    let mut sep = |out: &mut String| {
        if !first {
            out.push(' ');
        }
        first = false;
    };
    match &array.data {
        ArrayData::I8(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::U8(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::I16(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::U16(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::I32(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::U32(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::I64(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::F32(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::F64(v) => {
            for e in v {
                sep(out);
                let _ = write!(out, "{e}");
            }
        }
        ArrayData::Generic(values) => {
            for value in values {
                sep(out);
                write_value(out, value);
            }
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use objwire_channel::ByteChannel;

    use super::*;
    use crate::binary;
    use crate::graph::PointerTable;
    use crate::value::{ElemType, IntWidth, Object, Options};

    fn decode_text(text: &str) -> Value {
        let mut chan = ByteChannel::new(Cursor::new(format!("{text} ").into_bytes()));
        let mut table = PointerTable::new();
        binary::decode(&mut chan, &mut table).unwrap()
    }

    #[test]
    fn scalars_and_strings() {
        assert_eq!(encode(&Value::int(-17)), "-17");
        assert_eq!(encode(&Value::float(0.25)), "0.25");
        assert_eq!(encode(&Value::Bool(true)), "1");
        assert_eq!(encode(&Value::Bool(false)), "0");
        assert_eq!(encode(&Value::Null), "*0");
        assert_eq!(
            encode(&Value::str("say \"hi\"\nplease")),
            "\"say \\\"hi\\\"\\nplease\""
        );
    }

    #[test]
    fn f32_prints_its_own_shortest_form() {
        let v = Value::Float {
            value: 0.1f32 as f64,
            width: FloatWidth::W32,
        };
        assert_eq!(encode(&v), "0.1");
    }

    #[test]
    fn arrays_are_space_joined_without_brackets() {
        let array = Array {
            elem: ElemType::I32,
            shape: vec![3],
            data: ArrayData::I32(vec![1, 2, 3]),
        };
        assert_eq!(encode(&Value::Array(array)), "1 2 3");
    }

    #[test]
    fn args_join_with_single_spaces() {
        let args = [Value::int(1), Value::str("x"), Value::Bool(false)];
        assert_eq!(encode_args(&args), "1 \"x\" 0");
        assert_eq!(encode_args(&[]), "");
    }

    #[test]
    fn object_form_round_trips_through_the_decoder() {
        let mut options = Options::new();
        options.push("nstages", Value::int(10));
        options.push("expdir", Value::str("out"));
        let value = Value::Object(Object {
            classname: "Trainer".to_string(),
            options,
        });

        let text = encode(&value);
        assert_eq!(text, "Trainer(nstages = 10, expdir = \"out\")");
        assert_eq!(decode_text(&text), value);
    }

    #[test]
    fn dict_and_tuple_round_trip_through_the_decoder() {
        let dict = Value::Dict(vec![
            (Value::str("a"), Value::int(2)),
            (Value::str("b"), Value::int(3)),
        ]);
        assert_eq!(decode_text(&encode(&dict)), dict);

        let tuple = Value::Tuple(vec![Value::int(5), Value::str("t")]);
        assert_eq!(decode_text(&encode(&tuple)), tuple);
    }

    #[test]
    fn textual_ints_round_trip_at_w64() {
        match decode_text(&encode(&Value::int(99))) {
            Value::Int { value, width, .. } => {
                assert_eq!(value, 99);
                assert_eq!(width, IntWidth::W64);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }
}
