//! `ClassName( ... )` object forms and the object factory.
//!
//! Three container classes get bespoke wire syntax: `Storage` wraps a typed
//! sequence, `TVec` is a length/offset view into a storage, `TMat` a
//! row-major matrix view. Every other classname decodes as an ordered
//! `key = value` option list.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use objwire_channel::ByteChannel;
use tracing::trace;

use crate::binary;
use crate::error::{DecodeError, Result};
use crate::graph::{self, PointerTable};
use crate::lexer;
use crate::value::{Array, ArrayData, Object, Options, Value};

/// Decode one named object, or a pointer to one.
pub fn decode_object<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    lexer::skip_blanks_and_comments(chan)?;
    if chan.peek()? == b'*' {
        return graph::decode_pointer(chan, table);
    }

    let classname = lexer::read_word(chan)?;
    lexer::skip_blanks(chan)?;
    expect(chan, b'(', "'(' after classname")?;
    trace!(classname, "decoding object");

    match classname.as_str() {
        "Storage" => decode_storage_body(chan, table),
        "TVec" => decode_tvec_body(chan, table),
        "TMat" => decode_tmat_body(chan, table),
        _ => decode_generic_body(chan, table, classname),
    }
}

/// `Storage( <sequence> )`: wraps exactly one sequence decode.
fn decode_storage_body<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    lexer::skip_blanks_and_comments(chan)?;
    if chan.peek()? == b')' {
        chan.read_byte()?;
        return Ok(Value::Array(Array::empty()));
    }
    let inner = binary::decode(chan, table)?;
    let array = match inner {
        Value::Array(array) => array,
        other => {
            return Err(DecodeError::Malformed(format!(
                "Storage holds a sequence, got {other:?}"
            )))
        }
    };
    close_paren(chan)?;
    Ok(Value::Array(array))
}

/// `TVec( length offset <storage> )`: the logical vector is
/// `storage[offset .. offset+length]`; a Null storage is an empty vector.
fn decode_tvec_body<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    let length = read_extent(chan, table, "TVec length")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let offset = read_extent(chan, table, "TVec offset")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let storage = binary::decode(chan, table)?;
    close_paren(chan)?;

    if storage.is_null() {
        return Ok(Value::Array(Array::empty()));
    }
    let storage = match storage {
        Value::Array(array) => array,
        other => {
            return Err(DecodeError::Malformed(format!(
                "TVec storage must be a Storage or Null, got {other:?}"
            )))
        }
    };
    let data = storage.data.slice(offset, length).ok_or_else(|| {
        DecodeError::Malformed(format!(
            "TVec slice [{offset}, {}) outside storage of {}",
            offset + length,
            storage.len()
        ))
    })?;
    Ok(Value::Array(Array::vector(storage.elem, data)))
}

/// `TMat( length width mod offset <storage> )`: row `i` is
/// `storage[offset + i*mod .. +width]`, yielding a row-major 2-D array.
fn decode_tmat_body<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    let length = read_extent(chan, table, "TMat length")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let width = read_extent(chan, table, "TMat width")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let stride = read_extent(chan, table, "TMat mod")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let offset = read_extent(chan, table, "TMat offset")?;
    lexer::skip_blanks_comments_separators(chan)?;
    let storage = binary::decode(chan, table)?;
    close_paren(chan)?;

    if storage.is_null() {
        return Ok(Value::Array(Array {
            elem: crate::value::ElemType::Generic,
            shape: vec![0, width],
            data: ArrayData::Generic(Vec::new()),
        }));
    }
    let storage = match storage {
        Value::Array(array) => array,
        other => {
            return Err(DecodeError::Malformed(format!(
                "TMat storage must be a Storage or Null, got {other:?}"
            )))
        }
    };
    let mut data = ArrayData::empty(storage.elem);
    for row in 0..length {
        let start = offset + row * stride;
        let slice = storage.data.slice(start, width).ok_or_else(|| {
            DecodeError::Malformed(format!(
                "TMat row {row} at [{start}, {}) outside storage of {}",
                start + width,
                storage.len()
            ))
        })?;
        data.extend(slice);
    }
    Ok(Value::Array(Array {
        elem: storage.elem,
        shape: vec![length, width],
        data,
    }))
}

fn decode_generic_body<T: Read>(
    chan: &mut ByteChannel<T>,
    table: &mut PointerTable,
    classname: String,
) -> Result<Value> {
    let mut options = Options::new();
    loop {
        lexer::skip_blanks_comments_separators(chan)?;
        if chan.peek()? == b')' {
            chan.read_byte()?;
            break;
        }
        let key = lexer::read_word(chan)?;
        lexer::skip_blanks(chan)?;
        expect(chan, b'=', "'=' after option name")?;
        let value = binary::decode(chan, table)?;
        options.push(key, value);
    }
    Ok(Value::Object(Object { classname, options }))
}

fn read_extent<T: Read>(
    chan: &mut ByteChannel<T>,
    table: &mut PointerTable,
    what: &'static str,
) -> Result<usize> {
    let raw = lexer::read_int_i64(chan, table)?;
    usize::try_from(raw).map_err(|_| DecodeError::Malformed(format!("negative {what}: {raw}")))
}

fn close_paren<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    lexer::skip_blanks_and_comments(chan)?;
    expect(chan, b')', "')' closing object")
}

fn expect<T: Read>(chan: &mut ByteChannel<T>, byte: u8, expected: &'static str) -> Result<()> {
    let found = chan.read_byte()?;
    if found != byte {
        return Err(DecodeError::UnexpectedByte { found, expected });
    }
    Ok(())
}

/// A constructed remote-object proxy, produced by the [`ObjectFactory`].
pub trait DynObject: fmt::Debug {
    fn classname(&self) -> &str;
}

/// Flat element storage, the built-in `Storage` class.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageObject {
    pub data: Array,
}

impl DynObject for StorageObject {
    fn classname(&self) -> &str {
        "Storage"
    }
}

/// A vector view over a storage, the built-in `TVec` class.
#[derive(Debug, Clone, PartialEq)]
pub struct TVecObject {
    pub elements: Array,
}

impl DynObject for TVecObject {
    fn classname(&self) -> &str {
        "TVec"
    }
}

/// Fallback for classes without a registered builder.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericObject {
    pub classname: String,
    pub options: Options,
}

impl DynObject for GenericObject {
    fn classname(&self) -> &str {
        &self.classname
    }
}

/// Builds a [`DynObject`] from a classname and its decoded options.
pub type BuildFn = fn(&str, &Options) -> Result<Box<dyn DynObject>>;

/// Maps decoded classnames to constructors.
///
/// `Storage`, `TVec` and the generic fallback are built in; callers register
/// further classes with [`ObjectFactory::register`].
pub struct ObjectFactory {
    builders: HashMap<String, BuildFn>,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        let mut factory = Self {
            builders: HashMap::new(),
        };
        factory.register("Storage", build_storage);
        factory.register("TVec", build_tvec);
        factory
    }
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder for `classname`, replacing any previous one.
    pub fn register(&mut self, classname: impl Into<String>, build: BuildFn) {
        self.builders.insert(classname.into(), build);
    }

    /// Construct an object, falling back to [`GenericObject`] for classes
    /// without a registered builder.
    pub fn build(&self, classname: &str, options: &Options) -> Result<Box<dyn DynObject>> {
        match self.builders.get(classname) {
            Some(build) => build(classname, options),
            None => Ok(Box::new(GenericObject {
                classname: classname.to_string(),
                options: options.clone(),
            })),
        }
    }
}

fn build_storage(_classname: &str, options: &Options) -> Result<Box<dyn DynObject>> {
    let data = match options.get("data") {
        Some(Value::Array(array)) => array.clone(),
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "Storage data must be a sequence, got {other:?}"
            )))
        }
        None => Array::empty(),
    };
    Ok(Box::new(StorageObject { data }))
}

fn build_tvec(_classname: &str, options: &Options) -> Result<Box<dyn DynObject>> {
    let elements = match options.get("data") {
        Some(Value::Array(array)) => array.clone(),
        Some(Value::Null) | None => Array::empty(),
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "TVec data must be a sequence or Null, got {other:?}"
            )))
        }
    };
    Ok(Box::new(TVecObject { elements }))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::value::ElemType;

    fn decode_text(text: &[u8]) -> Value {
        let mut chan = ByteChannel::new(Cursor::new(text.to_vec()));
        let mut table = PointerTable::new();
        decode_object(&mut chan, &mut table).unwrap()
    }

    fn storage_wire(values: &[i32]) -> Vec<u8> {
        let array = Array {
            elem: ElemType::I32,
            shape: vec![values.len()],
            data: ArrayData::I32(values.to_vec()),
        };
        let mut wire = b"Storage( ".to_vec();
        wire.extend(binary::encode_sequence(&array, false).unwrap());
        wire.extend_from_slice(b" )");
        wire
    }

    #[test]
    fn storage_wraps_a_sequence() {
        let value = decode_text(&storage_wire(&[5, 6, 7]));
        assert_eq!(
            value,
            Value::Array(Array {
                elem: ElemType::I32,
                shape: vec![3],
                data: ArrayData::I32(vec![5, 6, 7]),
            })
        );
    }

    #[test]
    fn tvec_slices_its_storage() {
        let mut wire = b"TVec( 2 1 ".to_vec();
        wire.extend(storage_wire(&[10, 20, 30, 40]));
        wire.extend_from_slice(b" )");

        let value = decode_text(&wire);
        assert_eq!(
            value,
            Value::Array(Array {
                elem: ElemType::I32,
                shape: vec![2],
                data: ArrayData::I32(vec![20, 30]),
            })
        );
    }

    #[test]
    fn tvec_with_null_storage_is_empty() {
        let value = decode_text(b"TVec( 0 0 *0 )");
        assert_eq!(value, Value::Array(Array::empty()));
    }

    #[test]
    fn tvec_slice_out_of_bounds_is_malformed() {
        let mut wire = b"TVec( 5 0 ".to_vec();
        wire.extend(storage_wire(&[1, 2]));
        wire.extend_from_slice(b" )");

        let mut chan = ByteChannel::new(Cursor::new(wire));
        let mut table = PointerTable::new();
        assert!(matches!(
            decode_object(&mut chan, &mut table),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn tmat_gathers_strided_rows() {
        // 2 rows of width 2, stride 3, offset 1 over 1..=7.
        let mut wire = b"TMat( 2 2 3 1 ".to_vec();
        wire.extend(storage_wire(&[1, 2, 3, 4, 5, 6, 7]));
        wire.extend_from_slice(b" )");

        let value = decode_text(&wire);
        assert_eq!(
            value,
            Value::Array(Array {
                elem: ElemType::I32,
                shape: vec![2, 2],
                data: ArrayData::I32(vec![2, 3, 5, 6]),
            })
        );
    }

    #[test]
    fn generic_object_keeps_option_order() {
        let value = decode_text(b"Learner( nstages = 10, seed = 42 verbosity = 1 )");
        match value {
            Value::Object(object) => {
                assert_eq!(object.classname, "Learner");
                let keys: Vec<&str> = object.options.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["nstages", "seed", "verbosity"]);
                assert_eq!(object.options.get("seed"), Some(&Value::int(42)));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn object_position_accepts_pointers() {
        let mut chan = ByteChannel::new(Cursor::new(b"*1->Thing( x = 2 ) *1 ".to_vec()));
        let mut table = PointerTable::new();
        let first = decode_object(&mut chan, &mut table).unwrap();
        let second = decode_object(&mut chan, &mut table).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn factory_builds_builtins_and_falls_back() {
        let factory = ObjectFactory::new();

        let mut options = Options::new();
        options.push(
            "data",
            Value::Array(Array::vector(ElemType::U8, ArrayData::U8(vec![1, 2]))),
        );
        let storage = factory.build("Storage", &options).unwrap();
        assert_eq!(storage.classname(), "Storage");

        let tvec = factory.build("TVec", &Options::new()).unwrap();
        assert_eq!(tvec.classname(), "TVec");

        let mut other = Options::new();
        other.push("lr", Value::float(0.1));
        let generic = factory.build("SGDOptimizer", &other).unwrap();
        assert_eq!(generic.classname(), "SGDOptimizer");
    }

    #[test]
    fn factory_accepts_new_registrations() {
        #[derive(Debug)]
        struct Flag;
        impl DynObject for Flag {
            fn classname(&self) -> &str {
                "Flag"
            }
        }
        fn build_flag(_: &str, _: &Options) -> crate::error::Result<Box<dyn DynObject>> {
            Ok(Box::new(Flag))
        }

        let mut factory = ObjectFactory::new();
        factory.register("Flag", build_flag);
        let built = factory.build("Flag", &Options::new()).unwrap();
        assert_eq!(built.classname(), "Flag");
    }
}
