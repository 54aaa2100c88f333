//! Reference capture replay
//!
//! Some menu payloads are only partly understood. Instead of encoding them
//! field by field, their bodies are cut from a packet capture loaded once at
//! startup and replayed byte for byte.

use crate::field::Verbatim;
use crate::ident::*;
use bytes::Bytes;
use lobby_core::{Result, ServerError};
use std::path::Path;

/// Where each menu data body lives in the capture: `(record, offset, len)`
pub const MENU_CAPTURE_TABLE: [(u16, usize, usize); 8] = [
    (MENU_DATA_1, 0x0000, 0x01c4),
    (MENU_DATA_2, 0x01c4, 0x0a31),
    (MENU_DATA_3, 0x0bf5, 0x0092),
    (MENU_DATA_4, 0x0c87, 0x0410),
    (MENU_DATA_5, 0x1097, 0x0066),
    (MENU_DATA_6, 0x10fd, 0x02d8),
    (MENU_DATA_7, 0x13d5, 0x0120),
    (MENU_DATA_8, 0x14f5, 0x004c),
];

/// Immutable capture bytes, cheap to clone
#[derive(Debug, Clone)]
pub struct CaptureBlob {
    bytes: Bytes,
}

impl CaptureBlob {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            ServerError::Config(format!("cannot read capture {}: {}", path.display(), e))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The range `offset..offset + len`, without copying
    pub fn slice(&self, offset: usize, len: usize) -> Result<Verbatim> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                ServerError::Config(format!(
                    "capture range {:#x}+{:#x} exceeds blob of {} bytes",
                    offset,
                    len,
                    self.bytes.len()
                ))
            })?;
        Ok(Verbatim {
            offset,
            bytes: self.bytes.slice(offset..end),
        })
    }

    /// Resolve every entry of [`MENU_CAPTURE_TABLE`].
    ///
    /// Any out-of-range entry fails the whole lookup.
    pub fn menu_ranges(&self) -> Result<Vec<(u16, Verbatim)>> {
        MENU_CAPTURE_TABLE
            .iter()
            .map(|&(ident, offset, len)| Ok((ident, self.slice(offset, len)?)))
            .collect()
    }
}
