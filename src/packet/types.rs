//! Header-level enumerations shared by every packet view.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the fixed header word in bytes.
pub const HEADER_WORD_LENGTH: usize = 4;
/// Largest packet length the 16-bit size field can declare, in bytes.
pub const MAX_PACKET_LENGTH: usize = 0xFFFF * 4;
/// Length of the data packet trailer in bytes.
pub const TRAILER_LENGTH: usize = 4;

/// VRT packet type from the top nibble of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// IF data without a stream identifier.
    UnidentifiedData,
    /// IF data with a stream identifier.
    Data,
    /// Extension data without a stream identifier.
    UnidentifiedExtData,
    /// Extension data with a stream identifier.
    ExtData,
    /// IF context.
    Context,
    /// Extension context.
    ExtContext,
    /// A type code this crate does not decode (6..=15).
    Reserved(u8),
}

impl PacketType {
    /// Decode the 4-bit type code.
    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0 => PacketType::UnidentifiedData,
            1 => PacketType::Data,
            2 => PacketType::UnidentifiedExtData,
            3 => PacketType::ExtData,
            4 => PacketType::Context,
            5 => PacketType::ExtContext,
            other => PacketType::Reserved(other),
        }
    }

    /// The 4-bit type code.
    pub fn code(self) -> u8 {
        match self {
            PacketType::UnidentifiedData => 0,
            PacketType::Data => 1,
            PacketType::UnidentifiedExtData => 2,
            PacketType::ExtData => 3,
            PacketType::Context => 4,
            PacketType::ExtContext => 5,
            PacketType::Reserved(code) => code & 0x0F,
        }
    }

    /// Data packet types (the ones that may carry a trailer).
    pub fn is_data(self) -> bool {
        matches!(
            self,
            PacketType::UnidentifiedData
                | PacketType::Data
                | PacketType::UnidentifiedExtData
                | PacketType::ExtData
        )
    }

    /// Context packet types (the ones that carry CIF words).
    pub fn is_context(self) -> bool {
        matches!(self, PacketType::Context | PacketType::ExtContext)
    }

    /// Whether packets of this type carry a stream identifier.
    pub fn has_stream_id(self) -> bool {
        matches!(
            self,
            PacketType::Data | PacketType::ExtData | PacketType::Context | PacketType::ExtContext
        )
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::UnidentifiedData => f.write_str("UnidentifiedData"),
            PacketType::Data => f.write_str("Data"),
            PacketType::UnidentifiedExtData => f.write_str("UnidentifiedExtData"),
            PacketType::ExtData => f.write_str("ExtData"),
            PacketType::Context => f.write_str("Context"),
            PacketType::ExtContext => f.write_str("ExtContext"),
            PacketType::Reserved(code) => write!(f, "Reserved({code})"),
        }
    }
}

/// Integer timestamp mode (TSI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TsiMode {
    /// No integer timestamp.
    #[default]
    None,
    /// Seconds since 1970-01-01 (POSIX, no leap seconds).
    Utc,
    /// Seconds since 1980-01-06 (GPS, includes leap seconds).
    Gps,
    /// Application defined.
    Other,
}

impl TsiMode {
    /// Decode the 2-bit TSI code.
    pub fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => TsiMode::None,
            1 => TsiMode::Utc,
            2 => TsiMode::Gps,
            _ => TsiMode::Other,
        }
    }

    /// The 2-bit TSI code.
    pub fn code(self) -> u8 {
        match self {
            TsiMode::None => 0,
            TsiMode::Utc => 1,
            TsiMode::Gps => 2,
            TsiMode::Other => 3,
        }
    }
}

/// Fractional timestamp mode (TSF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TsfMode {
    /// No fractional timestamp.
    #[default]
    None,
    /// Sample count within the integer second.
    SampleCount,
    /// Picoseconds within the integer second.
    RealTime,
    /// Free-running sample count.
    FreeRunning,
}

impl TsfMode {
    /// Decode the 2-bit TSF code.
    pub fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => TsfMode::None,
            1 => TsfMode::SampleCount,
            2 => TsfMode::RealTime,
            _ => TsfMode::FreeRunning,
        }
    }

    /// The 2-bit TSF code.
    pub fn code(self) -> u8 {
        match self {
            TsfMode::None => 0,
            TsfMode::SampleCount => 1,
            TsfMode::RealTime => 2,
            TsfMode::FreeRunning => 3,
        }
    }
}
