//! The tagged value model shared by the decoder and serializer.

/// Width of an integer value, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Size of one value of this width, in bytes.
    pub fn size(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }
}

/// Width of a floating point value, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    W32,
    W64,
}

/// Element type of a typed flat sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    F32,
    F64,
    /// Each element is independently decoded (wire code 0xFF).
    Generic,
}

impl ElemType {
    /// Size of one element in bytes. Generic elements have no fixed size.
    pub fn size(self) -> usize {
        match self {
            ElemType::I8 | ElemType::U8 => 1,
            ElemType::I16 | ElemType::U16 => 2,
            ElemType::I32 | ElemType::U32 | ElemType::F32 => 4,
            ElemType::I64 | ElemType::F64 => 8,
            ElemType::Generic => 0,
        }
    }
}

/// Flat element buffer of an [`Array`], typed by [`ElemType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Generic(Vec<Value>),
}

impl ArrayData {
    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::I8(v) => v.len(),
            ArrayData::U8(v) => v.len(),
            ArrayData::I16(v) => v.len(),
            ArrayData::U16(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::Generic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the sub-range `[start, start+len)`.
    pub fn slice(&self, start: usize, len: usize) -> Option<ArrayData> {
        fn sub<E: Clone>(v: &[E], start: usize, len: usize) -> Option<Vec<E>> {
            v.get(start..start + len).map(<[E]>::to_vec)
        }
        Some(match self {
            ArrayData::I8(v) => ArrayData::I8(sub(v, start, len)?),
            ArrayData::U8(v) => ArrayData::U8(sub(v, start, len)?),
            ArrayData::I16(v) => ArrayData::I16(sub(v, start, len)?),
            ArrayData::U16(v) => ArrayData::U16(sub(v, start, len)?),
            ArrayData::I32(v) => ArrayData::I32(sub(v, start, len)?),
            ArrayData::U32(v) => ArrayData::U32(sub(v, start, len)?),
            ArrayData::I64(v) => ArrayData::I64(sub(v, start, len)?),
            ArrayData::F32(v) => ArrayData::F32(sub(v, start, len)?),
            ArrayData::F64(v) => ArrayData::F64(sub(v, start, len)?),
            ArrayData::Generic(v) => ArrayData::Generic(sub(v, start, len)?),
        })
    }

    /// Append `other` to this buffer. Fails on a type mismatch.
    pub fn extend(&mut self, other: ArrayData) -> bool {
        match (self, other) {
            (ArrayData::I8(a), ArrayData::I8(b)) => a.extend(b),
            (ArrayData::U8(a), ArrayData::U8(b)) => a.extend(b),
            (ArrayData::I16(a), ArrayData::I16(b)) => a.extend(b),
            (ArrayData::U16(a), ArrayData::U16(b)) => a.extend(b),
            (ArrayData::I32(a), ArrayData::I32(b)) => a.extend(b),
            (ArrayData::U32(a), ArrayData::U32(b)) => a.extend(b),
            (ArrayData::I64(a), ArrayData::I64(b)) => a.extend(b),
            (ArrayData::F32(a), ArrayData::F32(b)) => a.extend(b),
            (ArrayData::F64(a), ArrayData::F64(b)) => a.extend(b),
            (ArrayData::Generic(a), ArrayData::Generic(b)) => a.extend(b),
            _ => return false,
        }
        true
    }

    /// Element at `index`, widened to a [`Value`].
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            ArrayData::I8(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W8,
                signed: true,
            },
            ArrayData::U8(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W8,
                signed: false,
            },
            ArrayData::I16(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W16,
                signed: true,
            },
            ArrayData::U16(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W16,
                signed: false,
            },
            ArrayData::I32(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W32,
                signed: true,
            },
            ArrayData::U32(v) => Value::Int {
                value: *v.get(index)? as i64,
                width: IntWidth::W32,
                signed: false,
            },
            ArrayData::I64(v) => Value::Int {
                value: *v.get(index)?,
                width: IntWidth::W64,
                signed: true,
            },
            ArrayData::F32(v) => Value::Float {
                value: *v.get(index)? as f64,
                width: FloatWidth::W32,
            },
            ArrayData::F64(v) => Value::Float {
                value: *v.get(index)?,
                width: FloatWidth::W64,
            },
            ArrayData::Generic(v) => v.get(index)?.clone(),
        })
    }

    /// An empty buffer of the given element type.
    pub fn empty(elem: ElemType) -> ArrayData {
        match elem {
            ElemType::I8 => ArrayData::I8(Vec::new()),
            ElemType::U8 => ArrayData::U8(Vec::new()),
            ElemType::I16 => ArrayData::I16(Vec::new()),
            ElemType::U16 => ArrayData::U16(Vec::new()),
            ElemType::I32 => ArrayData::I32(Vec::new()),
            ElemType::U32 => ArrayData::U32(Vec::new()),
            ElemType::I64 => ArrayData::I64(Vec::new()),
            ElemType::F32 => ArrayData::F32(Vec::new()),
            ElemType::F64 => ArrayData::F64(Vec::new()),
            ElemType::Generic => ArrayData::Generic(Vec::new()),
        }
    }
}

/// A typed flat sequence plus its shape (1 or 2 dimensions, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub elem: ElemType,
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

impl Array {
    /// A 1-D array over the given buffer.
    pub fn vector(elem: ElemType, data: ArrayData) -> Self {
        Self {
            elem,
            shape: vec![data.len()],
            data,
        }
    }

    /// An empty vector with no declared element type.
    pub fn empty() -> Self {
        Self::vector(ElemType::Generic, ArrayData::Generic(Vec::new()))
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Insertion-ordered option map of a decoded object.
///
/// Order is observable on the wire and must survive a round trip, so this is
/// a pair list rather than a hash map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Options(Vec<(String, Value)>);

impl Options {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.0.push((key.into(), value));
    }

    /// Value of the first option named `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named remote object as decoded from `ClassName( key = value ... )`.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub classname: String,
    pub options: Options,
}

/// One decoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int {
        value: i64,
        width: IntWidth,
        signed: bool,
    },
    Float {
        value: f64,
        width: FloatWidth,
    },
    Str(String),
    Array(Array),
    /// Insertion-ordered key/value pairs.
    Dict(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Object(Object),
}

impl Value {
    /// A 64-bit signed integer, the width textual integers decode to.
    pub fn int(value: i64) -> Self {
        Value::Int {
            value,
            width: IntWidth::W64,
            signed: true,
        }
    }

    /// A 64-bit float, the width textual numbers decode to.
    pub fn float(value: f64) -> Self {
        Value::Float {
            value,
            width: FloatWidth::W64,
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    /// The integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The integer payload as unsigned, if non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int { value, .. } => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// The numeric payload widened to f64, for ints and floats alike.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int { value, .. } => Some(*value as f64),
            Value::Float { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
