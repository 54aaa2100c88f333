//! # Lobby Protocol Library
//!
//! Byte-exact implementation of the game's login/menu protocol and the JSON
//! control channel spoken by launchers, the auth bot and the firewall daemon.
//!
//! ## Architecture
//!
//! Bytes move through the layers in this order on the way in, and in reverse
//! on the way out:
//!
//! ### 1. Framing ([`framing`])
//! A `tokio_util` codec that reassembles length-prefixed chunks into whole
//! messages. A zero length means "full chunk, more follow".
//!
//! ### 2. Packetizer ([`packet`])
//! Splits a message into top-level records and the optional seq/ack trailer.
//! Record count and trailer presence depend on the first record's ident:
//! - `HELLO` (0x01bc): one record, no trailer
//! - `MENU_SNAPSHOT` (0x0033): twelve records, then the trailer
//! - anything else: one record, then the trailer
//!
//! ### 3. Wire codec ([`field`], [`registry`])
//! Typed fields keyed by a 2-byte ident. Containers resolve their elements
//! through the [`Registry`], so an unregistered ident fails decoding.
//!
//! ### 4. Capture replay ([`capture`])
//! Menu payloads that are only partly understood are replayed verbatim from a
//! reference capture.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use lobby_protocol::{decode_packet, ident, records, PacketEncoder, Registry};
//!
//! let registry = Registry::standard();
//! let mut encoder = PacketEncoder::new();
//!
//! let bytes = encoder.encode(&[records::login_status(ident::status::BAD_PASSWORD)], 0)?;
//! let packet = decode_packet(&registry, &bytes)?;
//! assert_eq!(packet.ident(), ident::LOGIN);
//! # Ok::<(), lobby_core::ServerError>(())
//! ```
//!
//! ## Protocol Quirks
//!
//! These are reproduced exactly; the client desynchronizes otherwise:
//! - password fields carry a length word of half their byte count
//! - the hello exchange never carries a trailer and takes no sequence number
//! - a menu snapshot is always followed by exactly eleven records

pub mod capture;
pub mod control;
pub mod field;
pub mod framing;
pub mod ident;
pub mod packet;
pub mod records;
pub mod registry;

pub use capture::CaptureBlob;
pub use field::{Field, FieldKind, FieldValue, Reader, RecordArrays, Verbatim};
pub use framing::{ChunkCodec, CLIENT_MAX_CHUNK, DEFAULT_MAX_CHUNK};
pub use packet::{decode_packet, Packet, PacketEncoder, Trailer};
pub use registry::Registry;
