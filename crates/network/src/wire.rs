//! What travels inside the frames of each kind of connection
//!
//! Game clients speak the binary packet format; every other peer speaks JSON
//! control messages. A [`PeerKind`] bundles the decoder, the encoder and the
//! framing parameters for one kind so the actor code stays generic.

use crate::event::Inbound;
use crate::peer::{ClientOut, Peer, PeerHandle};
use crate::ratelimit::RateLimit;
use bytes::Bytes;
use lobby_core::Result;
use lobby_protocol::control::{
    decode_json, encode_json, AuthBotToHub, FirewallToHub, HubToAuthBot, HubToFirewall,
    HubToLauncher, LauncherToHub,
};
use lobby_protocol::{decode_packet, PacketEncoder, Registry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Turns one reassembled message into a hub request
pub trait MessageReader: Send + 'static {
    fn read(&mut self, message: &[u8]) -> Result<Inbound>;
}

/// Turns one queued message into the bytes of a frame
pub trait MessageWriter<M>: Send + 'static {
    fn write(&mut self, message: M) -> Result<Bytes>;
}

/// Everything the actor pair needs to know about one kind of connection
pub trait PeerKind: Clone + Send + Sync + 'static {
    type Out: Send + 'static;
    type Reader: MessageReader;
    type Writer: MessageWriter<Self::Out>;

    fn max_chunk(&self) -> usize;
    fn rate_limit(&self) -> Option<RateLimit>;
    fn reader(&self) -> Self::Reader;
    fn writer(&self) -> Self::Writer;
    fn peer(handle: PeerHandle<Self::Out>) -> Peer;
}

// ---------------------------------------------------------------------------
// Game clients
// ---------------------------------------------------------------------------

pub struct PacketReader {
    registry: Arc<Registry>,
}

impl MessageReader for PacketReader {
    fn read(&mut self, message: &[u8]) -> Result<Inbound> {
        Ok(Inbound::Client(decode_packet(&self.registry, message)?))
    }
}

/// Owns the sequence counter of the server → client direction
#[derive(Default)]
pub struct PacketWriter {
    encoder: PacketEncoder,
}

impl MessageWriter<ClientOut> for PacketWriter {
    fn write(&mut self, message: ClientOut) -> Result<Bytes> {
        self.encoder.encode(&message.records, message.ack)
    }
}

#[derive(Clone)]
pub struct PlayerKind {
    pub registry: Arc<Registry>,
    pub max_chunk: usize,
    pub rate_limit: Option<RateLimit>,
}

impl PeerKind for PlayerKind {
    type Out = ClientOut;
    type Reader = PacketReader;
    type Writer = PacketWriter;

    fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    fn reader(&self) -> PacketReader {
        PacketReader {
            registry: Arc::clone(&self.registry),
        }
    }

    fn writer(&self) -> PacketWriter {
        PacketWriter::default()
    }

    fn peer(handle: PeerHandle<ClientOut>) -> Peer {
        Peer::Player(handle)
    }
}

// ---------------------------------------------------------------------------
// Control peers
// ---------------------------------------------------------------------------

pub struct JsonReader<T> {
    _in: PhantomData<fn() -> T>,
}

impl<T> Default for JsonReader<T> {
    fn default() -> Self {
        Self { _in: PhantomData }
    }
}

impl<T> MessageReader for JsonReader<T>
where
    T: DeserializeOwned + Into<Inbound> + 'static,
{
    fn read(&mut self, message: &[u8]) -> Result<Inbound> {
        Ok(decode_json::<T>(message)?.into())
    }
}

#[derive(Default)]
pub struct JsonWriter;

impl<M: Serialize + Send + 'static> MessageWriter<M> for JsonWriter {
    fn write(&mut self, message: M) -> Result<Bytes> {
        encode_json(&message)
    }
}

macro_rules! json_kind {
    ($(#[$doc:meta])* $name:ident, $in:ty, $out:ty, $variant:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub max_chunk: usize,
            pub rate_limit: Option<RateLimit>,
        }

        impl PeerKind for $name {
            type Out = $out;
            type Reader = JsonReader<$in>;
            type Writer = JsonWriter;

            fn max_chunk(&self) -> usize {
                self.max_chunk
            }

            fn rate_limit(&self) -> Option<RateLimit> {
                self.rate_limit
            }

            fn reader(&self) -> JsonReader<$in> {
                JsonReader::default()
            }

            fn writer(&self) -> JsonWriter {
                JsonWriter
            }

            fn peer(handle: PeerHandle<$out>) -> Peer {
                Peer::$variant(handle)
            }
        }
    };
}

json_kind!(
    /// Game-server launchers connecting in
    LauncherKind, LauncherToHub, HubToLauncher, GameServer
);
json_kind!(
    /// The auth bot connecting in
    AuthBotKind, AuthBotToHub, HubToAuthBot, AuthBot
);
json_kind!(
    /// The firewall daemon, dialed out to
    FirewallKind, FirewallToHub, HubToFirewall, Firewall
);
