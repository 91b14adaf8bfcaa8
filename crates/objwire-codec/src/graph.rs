//! Pointer back-references, dicts and tuples.
//!
//! A `*id` token refers to a value by numeric id. The first occurrence must
//! define the value with `*id-><value>`; later occurrences yield the cached
//! value without consuming further bytes (beyond one optional separator).
//! The table lives for one exchange: the session clears it at each call
//! boundary.

use std::collections::HashMap;
use std::io::Read;

use objwire_channel::{ByteChannel, ChannelError};
use tracing::trace;

use crate::binary;
use crate::error::{DecodeError, Result};
use crate::lexer;
use crate::value::Value;

#[derive(Debug, Clone)]
enum Entry {
    /// Id seen, definition not complete yet.
    Pending,
    Resolved(Value),
}

/// Maps pointer ids to previously decoded values.
///
/// Id 0 always denotes `Null` and is never stored. Owned by the session and
/// passed explicitly through every decode call; clearing is an explicit
/// operation at call boundaries, never an implicit side effect.
#[derive(Debug, Default)]
pub struct PointerTable {
    entries: HashMap<u64, Entry>,
}

impl PointerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries. Called by the session at each call start.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The resolved value for `id`, if the table has one.
    pub fn get(&self, id: u64) -> Option<&Value> {
        match self.entries.get(&id) {
            Some(Entry::Resolved(value)) => Some(value),
            _ => None,
        }
    }

    fn mark_pending(&mut self, id: u64) {
        self.entries.insert(id, Entry::Pending);
    }

    fn resolve(&mut self, id: u64, value: Value) {
        self.entries.insert(id, Entry::Resolved(value));
    }
}

/// Decode a `*id` pointer, defining it from the stream when unseen.
pub fn decode_pointer<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    expect(chan, b'*', "pointer '*'")?;
    let id = lexer::read_int_u64(chan, table)?;
    if id == 0 {
        return Ok(Value::Null);
    }

    match table.entries.get(&id) {
        Some(Entry::Resolved(value)) => {
            let value = value.clone();
            consume_one_separator(chan)?;
            trace!(id, "pointer hit");
            Ok(value)
        }
        Some(Entry::Pending) => Err(DecodeError::PointerViolation(format!(
            "id {id} referenced before its definition completed"
        ))),
        None => {
            let arrow = chan.read_exact_bytes(2)?;
            if arrow.as_ref() != b"->" {
                return Err(DecodeError::PointerViolation(format!(
                    "expected \"->\" after new id {id}, got {:?}",
                    arrow.as_ref()
                )));
            }
            table.mark_pending(id);
            let value = binary::decode(chan, table)?;
            table.resolve(id, value.clone());
            trace!(id, "pointer defined");
            Ok(value)
        }
    }
}

/// After a resolved pointer reference, at most one separator byte is eaten.
fn consume_one_separator<T: Read>(chan: &mut ByteChannel<T>) -> Result<()> {
    match chan.peek() {
        Ok(byte) if lexer::is_blank(byte) || byte == b',' || byte == b';' => {
            chan.read_byte()?;
            Ok(())
        }
        Ok(_) => Ok(()),
        // A pointer reference may sit at the very end of the stream.
        Err(ChannelError::Truncated { .. }) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Decode a `{ key : value , ... }` dict into insertion-ordered pairs.
pub fn decode_dict<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    expect(chan, b'{', "dict '{'")?;
    let mut pairs = Vec::new();
    loop {
        lexer::skip_blanks_comments_separators(chan)?;
        if chan.peek()? == b'}' {
            chan.read_byte()?;
            break;
        }
        let key = binary::decode(chan, table)?;
        lexer::skip_blanks_and_comments(chan)?;
        expect(chan, b':', "':' between dict key and value")?;
        let value = binary::decode(chan, table)?;
        pairs.push((key, value));
    }
    Ok(Value::Dict(pairs))
}

/// Decode a `( a b ... )` tuple.
pub fn decode_tuple<T: Read>(chan: &mut ByteChannel<T>, table: &mut PointerTable) -> Result<Value> {
    expect(chan, b'(', "tuple '('")?;
    let mut elements = Vec::new();
    loop {
        lexer::skip_blanks_comments_separators(chan)?;
        if chan.peek()? == b')' {
            chan.read_byte()?;
            break;
        }
        elements.push(binary::decode(chan, table)?);
    }
    Ok(Value::Tuple(elements))
}

fn expect<T: Read>(chan: &mut ByteChannel<T>, byte: u8, expected: &'static str) -> Result<()> {
    let found = chan.read_byte()?;
    if found != byte {
        return Err(DecodeError::UnexpectedByte { found, expected });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn chan(bytes: &[u8]) -> ByteChannel<Cursor<Vec<u8>>> {
        ByteChannel::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn pointer_zero_is_null() {
        let mut table = PointerTable::new();
        let mut c = chan(b"*0 ");
        assert_eq!(decode_pointer(&mut c, &mut table).unwrap(), Value::Null);
        assert!(table.is_empty());
    }

    #[test]
    fn pointer_defines_then_reuses_without_redecoding() {
        let mut table = PointerTable::new();
        let mut c = chan(b"*5->\"shared\" *5 *5,tail");

        let first = decode_pointer(&mut c, &mut table).unwrap();
        assert_eq!(first, Value::str("shared"));
        assert_eq!(table.get(5), Some(&Value::str("shared")));

        lexer::skip_blanks(&mut c).unwrap();
        let second = decode_pointer(&mut c, &mut table).unwrap();
        assert_eq!(second, first);

        // The second reference consumed the id plus one separator only.
        let third = decode_pointer(&mut c, &mut table).unwrap();
        assert_eq!(third, first);
        assert_eq!(c.read_exact_bytes(4).unwrap().as_ref(), b"tail");
    }

    #[test]
    fn missing_arrow_is_a_violation() {
        let mut table = PointerTable::new();
        let mut c = chan(b"*7 \"x\"");
        assert!(matches!(
            decode_pointer(&mut c, &mut table),
            Err(DecodeError::PointerViolation(_))
        ));
    }

    #[test]
    fn reference_to_pending_id_is_a_violation() {
        // A self-referential definition: *3->(*3) must fail while 3 is
        // still pending.
        let mut table = PointerTable::new();
        let mut c = chan(b"*3->( *3 )");
        assert!(matches!(
            decode_pointer(&mut c, &mut table),
            Err(DecodeError::PointerViolation(_))
        ));
    }

    #[test]
    fn shared_reference_inside_a_tuple() {
        let mut table = PointerTable::new();
        let mut c = chan(b"( *2->9 *2 )");
        let value = decode_tuple(&mut c, &mut table).unwrap();
        assert_eq!(value, Value::Tuple(vec![Value::int(9), Value::int(9)]));
    }

    #[test]
    fn dict_preserves_insertion_order() {
        let mut table = PointerTable::new();
        let mut c = chan(b"{ \"a\" : 1 , \"b\" : 2 }");
        let value = decode_dict(&mut c, &mut table).unwrap();
        match value {
            Value::Dict(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].0, Value::str("a"));
                assert_eq!(pairs[1].0, Value::str("b"));
                assert_eq!(pairs[1].1, Value::int(2));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn empty_dict_and_tuple() {
        let mut table = PointerTable::new();
        assert_eq!(
            decode_dict(&mut chan(b"{ }"), &mut table).unwrap(),
            Value::Dict(Vec::new())
        );
        assert_eq!(
            decode_tuple(&mut chan(b"()"), &mut table).unwrap(),
            Value::Tuple(Vec::new())
        );
    }

    #[test]
    fn tuple_accepts_separator_variants() {
        let mut table = PointerTable::new();
        let mut c = chan(b"( 1 , 2 ; 3 )");
        assert_eq!(
            decode_tuple(&mut c, &mut table).unwrap(),
            Value::Tuple(vec![Value::int(1), Value::int(2), Value::int(3)])
        );
    }

    #[test]
    fn clear_forgets_resolved_ids() {
        let mut table = PointerTable::new();
        let mut c = chan(b"*4->1 ");
        decode_pointer(&mut c, &mut table).unwrap();
        assert_eq!(table.len(), 1);
        table.clear();
        assert!(table.get(4).is_none());
    }
}
