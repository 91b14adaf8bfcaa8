//! Hybrid text/binary value codec for the objwire remote-object protocol.
//!
//! The wire format mixes human-readable tokens with embedded raw binary
//! escapes. One byte-code space covers both: printable ASCII starts words,
//! quoted strings, numbers and delimiters, while low control bytes select
//! binary scalar and sequence encodings in either byte order.
//!
//! - [`lexer`] — blank/comment skipping and token reading
//! - [`binary`] — type-code dispatch for scalars and typed sequences
//! - [`graph`] — pointer back-references, dicts and tuples
//! - [`object`] — `ClassName( key=value ... )` forms and the object factory
//! - [`encode`] — the outbound textual serializer

pub mod binary;
pub mod encode;
pub mod error;
pub mod graph;
pub mod lexer;
pub mod object;
pub mod value;

pub use encode::{encode, encode_args};
pub use error::{DecodeError, Result};
pub use graph::PointerTable;
pub use object::{DynObject, ObjectFactory};
pub use value::{Array, ArrayData, ElemType, FloatWidth, IntWidth, Object, Options, Value};
