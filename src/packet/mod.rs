//! VRT packets: the generic packet core and the data and context views.
//!
//! [`VrtPacket`] decodes the header and optional header fields. The
//! [`DataPacket`] and [`ContextPacket`] views dereference to it and add the
//! trailer and sample arrays, or the CIF planes and named context fields.

pub(crate) mod buffer;
mod class_id;
pub mod context;
mod core;
mod data;
pub mod pack;
mod payload_format;
pub(crate) mod splice;
mod state_event;
mod timestamp;
mod types;

pub use class_id::ClassIdentifier;
pub use context::{Attribute, CIF7_CURRENT_VALUE, CifPlane, ContextPacket, FieldId, FieldOffset};
pub use self::core::VrtPacket;
pub use data::DataPacket;
pub use payload_format::{DataItemFormat, PackingMethod, PayloadFormat, RealComplex};
pub use state_event::{ENABLE_MASK, INDICATOR_MASK, Indicator, StateEventBits};
pub use timestamp::{GPS_EPOCH_UTC, ONE_SEC, TimeStamp};
pub use types::{HEADER_WORD_LENGTH, MAX_PACKET_LENGTH, PacketType, TRAILER_LENGTH, TsfMode, TsiMode};

pub(crate) use self::core::CIF_ENABLE_MASK;
