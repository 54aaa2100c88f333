//! Chunk framing over TCP
//!
//! # Format
//! Each chunk is a 2-byte little-endian length L followed by its payload:
//! - `L == 0`: the payload is exactly `max_chunk` bytes and more chunks follow
//! - `L != 0`: the payload is L bytes and it ends the message
//!
//! A message is the concatenation of its chunk payloads. Messages are never
//! empty.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use lobby_core::ServerError;
use tokio_util::codec::{Decoder, Encoder};

/// Chunk size limit on control channels
pub const DEFAULT_MAX_CHUNK: usize = 0xFFFF;

/// Chunk size limit on the game client channel, kept under a typical MTU
pub const CLIENT_MAX_CHUNK: usize = 1450;

/// Reassembles chunks into messages and splits messages into chunks
#[derive(Debug)]
pub struct ChunkCodec {
    max_chunk: usize,
    partial: BytesMut,
}

impl ChunkCodec {
    /// `max_chunk` is clamped to `1..=0xFFFF`, the range a length word can carry
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.clamp(1, DEFAULT_MAX_CHUNK),
            partial: BytesMut::new(),
        }
    }

    pub fn client() -> Self {
        Self::new(CLIENT_MAX_CHUNK)
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK)
    }
}

impl Decoder for ChunkCodec {
    type Item = BytesMut;
    type Error = ServerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ServerError> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let len = u16::from_le_bytes([src[0], src[1]]) as usize;
            let (size, last) = if len == 0 {
                (self.max_chunk, false)
            } else {
                (len, true)
            };

            if size > self.max_chunk {
                return Err(ServerError::ProtocolViolation(format!(
                    "chunk of {} bytes exceeds limit {}",
                    size, self.max_chunk
                )));
            }

            if src.len() < 2 + size {
                src.reserve(2 + size - src.len());
                return Ok(None);
            }

            src.advance(2);
            let chunk = src.split_to(size);
            self.partial.extend_from_slice(&chunk);

            if last {
                return Ok(Some(std::mem::take(&mut self.partial)));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ServerError> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() && self.partial.is_empty() => Ok(None),
            // The peer went away in the middle of a message
            None => Err(ServerError::ConnectionReset),
        }
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = ServerError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), ServerError> {
        if item.is_empty() {
            return Err(ServerError::InvalidData("cannot frame an empty message".into()));
        }

        let chunks = item.len().div_ceil(self.max_chunk);
        dst.reserve(item.len() + 2 * chunks);

        let mut rest = &item[..];
        while rest.len() > self.max_chunk {
            dst.put_u16_le(0);
            dst.put_slice(&rest[..self.max_chunk]);
            rest = &rest[self.max_chunk..];
        }
        dst.put_u16_le(rest.len() as u16);
        dst.put_slice(rest);
        Ok(())
    }
}
