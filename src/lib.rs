//! In-place, bit-exact codec for VITA-49 (VRT) packets and VRL frames.
//!
//! vrtkit reads and writes VITA 49.0 / 49.0b radio transport packets directly
//! in their wire buffers: every accessor decodes from the bytes on demand and
//! every mutation re-encodes in place, growing or shrinking the packet when
//! optional fields come and go.
//!
//! # Features
//!
//! - **Packets**: data, extension data, context and extension context packets
//!   with header, prologue, trailer and payload accessors
//! - **Context fields**: every CIF0/CIF1/CIF2/CIF3 field, with CIF7 attributes
//! - **Payloads**: sample packing for every 49.0b payload format
//! - **VRL frames**: framing, CRC and packet walking
//! - **Stream state**: aggregation of context and trailer events per stream
//! - **Captures**: readers and writers for bare and framed streams, plus an
//!   async replay connection
//!
//! ## Example
//!
//! ```rust
//! use vrtkit::{ContextPacket, DataPacket, PacketType, PayloadFormat, TimeStamp};
//!
//! let mut context = ContextPacket::default();
//! context.set_stream_identifier(0x100)?;
//! context.set_timestamp(TimeStamp::utc(1_700_000_000, 0)?)?;
//! context.set_bandwidth(Some(20.0e6))?;
//! context.set_sample_rate(Some(25.0e6))?;
//! assert_eq!(context.bandwidth(), Some(20.0e6));
//!
//! let mut data = DataPacket::default().with_format(PayloadFormat::INT16);
//! data.set_packet_type(PacketType::Data)?;
//! data.set_stream_identifier(0x100)?;
//! data.set_data_i16(&[1, -1, 2, -2])?;
//! assert_eq!(data.data_as_i16()?, vec![1, -1, 2, -2]);
//! # Ok::<(), vrtkit::VrtError>(())
//! ```

// Core types and error handling
pub mod codec;
mod config;
mod error;
pub mod fields;
pub mod packet;
pub mod record;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Framing, aggregation and captures
pub mod factory;
pub mod frame;
pub mod io;
pub mod state;

// Stream monitoring
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;

// Core exports
pub use config::{MAX_FRAME_LENGTH, ProtocolVersion, VrtConfig};
pub use error::*;
pub use fields::{FieldType, FieldValue, HasFields, Value};
pub use packet::{
    ClassIdentifier, ContextPacket, DataItemFormat, DataPacket, FieldId, Indicator, PackingMethod, PacketType,
    PayloadFormat, RealComplex, StateEventBits, TimeStamp, TsfMode, TsiMode, VrtPacket,
};
pub use record::{ContextAssocLists, Ephemeris, Geolocation, GeoSentences, Record};

// Framing and aggregation exports
pub use factory::{AnyPacket, ClassRegistry, DefaultPacketFactory, PacketFactory};
pub use frame::VrlFrame;
pub use io::{VrtReader, VrtWriter, WriteMode};
pub use state::{StreamSnapshot, StreamState, Triggers, Update};

// Main async API exports
pub use connection::ReplayConnection;
pub use provider::PacketSource;
pub use providers::{Pacing, ReplayProvider};
