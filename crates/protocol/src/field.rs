//! Typed fields and their byte layout
//!
//! Every field is written as its 2-byte little-endian ident followed by a
//! kind-specific body:
//!
//! | kind       | body                                              |
//! |------------|---------------------------------------------------|
//! | `Int1/2/4` | 1, 2 or 4 value bytes                             |
//! | `Fixed(N)` | exactly N raw bytes                               |
//! | `Password` | length word L, then **2·L** bytes                 |
//! | `String`   | length word, then Latin-1 bytes                   |
//! | `Bytes16`  | length word, then raw bytes                       |
//! | `Bytes32`  | 4-byte length, then raw bytes                     |
//! | `Record`   | element count, then self-identifying fields       |
//! | `Arrays`   | array count; each array is a count then fields    |
//!
//! Decoding needs the [`Registry`](crate::Registry) to resolve element kinds;
//! encoding does not.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use lobby_core::{Result, ServerError};
use std::net::Ipv4Addr;

/// Shape of a field's body, as registered for its ident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int1,
    Int2,
    Int4,
    Fixed(usize),
    Password,
    String,
    Bytes16,
    Bytes32,
    Record,
    Arrays,
}

impl FieldKind {
    /// Default value of this kind, the body an empty field is encoded with
    pub fn construct(self) -> FieldValue {
        match self {
            FieldKind::Int1 => FieldValue::Int1(0),
            FieldKind::Int2 => FieldValue::Int2(0),
            FieldKind::Int4 => FieldValue::Int4(0),
            FieldKind::Fixed(n) => FieldValue::Fixed(vec![0; n]),
            FieldKind::Password => FieldValue::Password(Vec::new()),
            FieldKind::String => FieldValue::String(String::new()),
            FieldKind::Bytes16 => FieldValue::Bytes16(Vec::new()),
            FieldKind::Bytes32 => FieldValue::Bytes32(Vec::new()),
            FieldKind::Record => FieldValue::Record(Vec::new()),
            FieldKind::Arrays => FieldValue::Arrays(RecordArrays::Structured(Vec::new())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int1(u8),
    Int2(u16),
    Int4(u32),
    Fixed(Vec<u8>),
    /// Raw password bytes. The on-wire length word is half the byte count.
    Password(Vec<u8>),
    String(String),
    Bytes16(Vec<u8>),
    Bytes32(Vec<u8>),
    Record(Vec<Field>),
    Arrays(RecordArrays),
}

/// Body of an array-of-arrays field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordArrays {
    Structured(Vec<Vec<Field>>),
    /// Replays a range of a reference capture in place of the body
    Verbatim(Verbatim),
}

/// An immutable slice of the capture blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbatim {
    pub offset: usize,
    pub bytes: Bytes,
}

/// One `(ident, value)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub ident: u16,
    pub value: FieldValue,
}

impl Field {
    pub fn new(ident: u16, value: FieldValue) -> Self {
        Self { ident, value }
    }

    pub fn int1(ident: u16, value: u8) -> Self {
        Self::new(ident, FieldValue::Int1(value))
    }

    pub fn int2(ident: u16, value: u16) -> Self {
        Self::new(ident, FieldValue::Int2(value))
    }

    pub fn int4(ident: u16, value: u32) -> Self {
        Self::new(ident, FieldValue::Int4(value))
    }

    pub fn string(ident: u16, value: impl Into<String>) -> Self {
        Self::new(ident, FieldValue::String(value.into()))
    }

    pub fn password(ident: u16, value: impl Into<Vec<u8>>) -> Self {
        Self::new(ident, FieldValue::Password(value.into()))
    }

    pub fn address(ident: u16, addr: Ipv4Addr) -> Self {
        Self::new(ident, FieldValue::Fixed(addr.octets().to_vec()))
    }

    /// A record of the given ident holding `fields`
    pub fn record(ident: u16, fields: Vec<Field>) -> Self {
        Self::new(ident, FieldValue::Record(fields))
    }

    pub fn arrays(ident: u16, arrays: Vec<Vec<Field>>) -> Self {
        Self::new(ident, FieldValue::Arrays(RecordArrays::Structured(arrays)))
    }

    pub fn verbatim(ident: u16, verbatim: Verbatim) -> Self {
        Self::new(ident, FieldValue::Arrays(RecordArrays::Verbatim(verbatim)))
    }

    /// Elements of a record, empty for any other kind
    pub fn fields(&self) -> &[Field] {
        match &self.value {
            FieldValue::Record(fields) => fields,
            _ => &[],
        }
    }

    /// First element with the given ident
    pub fn get(&self, ident: u16) -> Option<&Field> {
        self.fields().iter().find(|f| f.ident == ident)
    }

    pub fn has(&self, ident: u16) -> bool {
        self.get(ident).is_some()
    }

    /// Integer element of any width, widened to u32
    pub fn get_int(&self, ident: u16) -> Option<u32> {
        match self.get(ident)?.value {
            FieldValue::Int1(v) => Some(v as u32),
            FieldValue::Int2(v) => Some(v as u32),
            FieldValue::Int4(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_str(&self, ident: u16) -> Option<&str> {
        match &self.get(ident)?.value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a fixed, password or length-prefixed element
    pub fn get_bytes(&self, ident: u16) -> Option<&[u8]> {
        match &self.get(ident)?.value {
            FieldValue::Fixed(b)
            | FieldValue::Password(b)
            | FieldValue::Bytes16(b)
            | FieldValue::Bytes32(b) => Some(b),
            _ => None,
        }
    }

    pub fn get_arrays(&self, ident: u16) -> Option<&[Vec<Field>]> {
        match &self.get(ident)?.value {
            FieldValue::Arrays(RecordArrays::Structured(arrays)) => Some(arrays),
            _ => None,
        }
    }

    /// Append the wire form of this field to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.ident);
        match &self.value {
            FieldValue::Int1(v) => buf.put_u8(*v),
            FieldValue::Int2(v) => buf.put_u16_le(*v),
            FieldValue::Int4(v) => buf.put_u32_le(*v),
            FieldValue::Fixed(bytes) => buf.put_slice(bytes),
            FieldValue::Password(bytes) => {
                // Odd lengths cannot be expressed; pad to the next word.
                let words = bytes.len().div_ceil(2);
                buf.put_u16_le(words as u16);
                buf.put_slice(bytes);
                if bytes.len() % 2 == 1 {
                    buf.put_u8(0);
                }
            }
            FieldValue::String(s) => {
                let latin1 = encode_latin1(s);
                buf.put_u16_le(latin1.len() as u16);
                buf.put_slice(&latin1);
            }
            FieldValue::Bytes16(bytes) => {
                buf.put_u16_le(bytes.len() as u16);
                buf.put_slice(bytes);
            }
            FieldValue::Bytes32(bytes) => {
                buf.put_u32_le(bytes.len() as u32);
                buf.put_slice(bytes);
            }
            FieldValue::Record(fields) => {
                buf.put_u16_le(fields.len() as u16);
                for field in fields {
                    field.encode(buf);
                }
            }
            FieldValue::Arrays(RecordArrays::Structured(arrays)) => {
                buf.put_u16_le(arrays.len() as u16);
                for array in arrays {
                    buf.put_u16_le(array.len() as u16);
                    for field in array {
                        field.encode(buf);
                    }
                }
            }
            FieldValue::Arrays(RecordArrays::Verbatim(verbatim)) => {
                buf.put_slice(&verbatim.bytes);
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Latin-1 encoding; characters outside U+0000..=U+00FF become `?`
pub fn encode_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Byte cursor that remembers where it is, so errors can carry offsets
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ServerError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16_le())
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    /// Read the next ident without consuming it
    pub fn peek_u16(&self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(ServerError::Truncated {
                offset: self.pos,
                needed: 2 - self.remaining(),
            });
        }
        Ok(u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]))
    }
}
