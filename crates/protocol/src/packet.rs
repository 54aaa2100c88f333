//! Packetizer: top-level records plus the seq/ack trailer
//!
//! # Format
//! A packet is one or more top-level records, optionally followed by a
//! trailer of `seq: u32, ack: u32` (little-endian). How many records there
//! are and whether the trailer is present depends only on the first ident:
//!
//! | first record    | records | trailer |
//! |-----------------|---------|---------|
//! | `HELLO`         | 1       | never   |
//! | `MENU_SNAPSHOT` | 1 + 11  | yes     |
//! | anything else   | 1       | yes     |
//!
//! The client relies on these positions exactly; there is no record count on
//! the wire.

use crate::field::{Field, Reader};
use crate::ident::{HELLO, MENU_SNAPSHOT, MENU_SNAPSHOT_FOLLOWUPS};
use crate::registry::Registry;
use bytes::{BufMut, Bytes, BytesMut};
use lobby_core::{Result, ServerError};

/// Size of the seq/ack trailer
pub const TRAILER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub seq: u32,
    pub ack: u32,
}

/// One decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub records: Vec<Field>,
    pub trailer: Option<Trailer>,
}

impl Packet {
    /// Ident of the first record, the one dispatch keys on
    pub fn ident(&self) -> u16 {
        self.records.first().map(|r| r.ident).unwrap_or_default()
    }

    pub fn seq(&self) -> Option<u32> {
        self.trailer.map(|t| t.seq)
    }
}

/// Whether a packet starting with `ident` goes out without a trailer
#[inline]
pub fn is_trailer_exempt(ident: u16) -> bool {
    ident == HELLO
}

/// Parse one reassembled message
pub fn decode_packet(registry: &Registry, bytes: &[u8]) -> Result<Packet> {
    let mut reader = Reader::new(bytes);
    let first = reader.peek_u16()?;

    if is_trailer_exempt(first) {
        // Whatever follows a hello is not ours to read
        let hello = registry.decode(HELLO, &mut reader)?;
        return Ok(Packet {
            records: vec![hello],
            trailer: None,
        });
    }

    let mut records = vec![registry.decode(first, &mut reader)?];
    if first == MENU_SNAPSHOT {
        for _ in 0..MENU_SNAPSHOT_FOLLOWUPS.len() {
            records.push(registry.decode_next(&mut reader)?);
        }
    }

    let trailer = Trailer {
        seq: reader.read_u32()?,
        ack: reader.read_u32()?,
    };

    if !reader.is_empty() {
        return Err(ServerError::ProtocolViolation(format!(
            "{} trailing bytes after packet {:#06x}",
            reader.remaining(),
            first
        )));
    }

    Ok(Packet {
        records,
        trailer: Some(trailer),
    })
}

/// Outgoing half of one direction of a connection.
///
/// Owns the local sequence counter: every trailered packet takes the next
/// value, exempt packets leave it untouched, so observed seqs run `0..N`.
#[derive(Debug, Default)]
pub struct PacketEncoder {
    next_seq: u32,
}

impl PacketEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Concatenate `records` and append `(seq, ack)` unless exempt.
    ///
    /// `ack` is the last sequence number received from the peer.
    pub fn encode(&mut self, records: &[Field], ack: u32) -> Result<Bytes> {
        let first = records
            .first()
            .ok_or_else(|| ServerError::InvalidData("packet without records".into()))?;

        let mut buf = BytesMut::new();
        for record in records {
            record.encode(&mut buf);
        }

        if !is_trailer_exempt(first.ident) {
            buf.put_u32_le(self.next_seq);
            buf.put_u32_le(ack);
            self.next_seq = self.next_seq.wrapping_add(1);
        }

        Ok(buf.freeze())
    }
}
