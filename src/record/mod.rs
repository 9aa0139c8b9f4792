//! Embedded records carried in context packet payloads.
//!
//! Records are plain values: reading one copies it out of the packet and
//! changing the copy has no effect until it is written back through the
//! packet's setter.

mod assoc_lists;
mod ephemeris;
mod geo_sentences;
mod geolocation;

pub use assoc_lists::ContextAssocLists;
pub use ephemeris::{EPHEMERIS_ADJUNCT_LENGTH, EPHEMERIS_LENGTH, Ephemeris};
pub use geo_sentences::GeoSentences;
pub use geolocation::{GEOLOCATION_LENGTH, Geolocation};

use crate::codec::{fits_fixed, from_fixed32, pack_i32, pack_u32, pack_u64, to_fixed32, unpack_i32, unpack_u32, unpack_u64};
use crate::config::VrtConfig;
use crate::packet::{TimeStamp, TsfMode, TsiMode};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};

/// Sentinel stored for a null 32-bit fixed-point value.
pub const NULL_FIXED32: i32 = 0x7FFF_FFFF;
/// Sentinel for an unspecified integer timestamp.
pub const UNSPECIFIED_TSI: u32 = 0xFFFF_FFFF;
/// Sentinel for an unspecified fractional timestamp.
pub const UNSPECIFIED_TSF: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// A sub-structure embeddable in a packet payload.
pub trait Record: Sized {
    /// Encoded length in bytes under `config`.
    fn byte_length(&self, config: &VrtConfig) -> usize;

    /// Decode a record starting at `offset`.
    fn read_from(buf: &[u8], offset: usize, config: &VrtConfig) -> Result<Self>;

    /// Encode the record at `offset`; `buf` must hold [`byte_length`](Self::byte_length) bytes there.
    fn write_to(&self, buf: &mut [u8], offset: usize, config: &VrtConfig) -> Result<()>;

    /// Encode into a new buffer.
    fn to_bytes(&self, config: &VrtConfig) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; self.byte_length(config)];
        self.write_to(&mut bytes, 0, config)?;
        Ok(bytes)
    }
}

pub(crate) fn ensure_room(buf: &[u8], offset: usize, length: usize) -> Result<()> {
    let needed = offset.saturating_add(length);
    if needed > buf.len() {
        return Err(VrtError::BufferTooShort { needed, available: buf.len() });
    }
    Ok(())
}

pub(crate) fn word(buf: &[u8], offset: usize) -> Result<u32> {
    unpack_u32(buf, offset).ok_or(VrtError::BufferTooShort { needed: offset + 4, available: buf.len() })
}

/// Read a nullable 32-bit fixed-point value.
pub(crate) fn read_fixed(buf: &[u8], offset: usize, radix: u32) -> Result<Option<f64>> {
    let raw = unpack_i32(buf, offset).ok_or(VrtError::BufferTooShort { needed: offset + 4, available: buf.len() })?;
    Ok((raw != NULL_FIXED32).then(|| from_fixed32(raw, radix)))
}

/// Check a nullable fixed-point value against its legal range.
pub(crate) fn check_fixed(field: &str, value: Option<f64>, radix: u32, range: (f64, f64)) -> Result<()> {
    let Some(value) = value else { return Ok(()) };
    let (low, high) = range;
    if !fits_fixed(value, 32, radix) || to_fixed32(value, radix) == NULL_FIXED32 || value < low || value > high {
        return Err(VrtError::invalid_argument(field, format!("{value} is outside [{low}, {high}]")));
    }
    Ok(())
}

pub(crate) fn write_fixed(buf: &mut [u8], offset: usize, value: Option<f64>, radix: u32) {
    pack_i32(buf, offset, value.map(|v| to_fixed32(v, radix)).unwrap_or(NULL_FIXED32));
}

/// Timestamp of a position fix: modes plus optionally unspecified values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixTime {
    pub tsi: TsiMode,
    pub tsf: TsfMode,
    /// Integer seconds; `None` when unspecified.
    pub integer: Option<u32>,
    /// Fractional value; `None` when unspecified.
    pub fractional: Option<u64>,
}

impl FixTime {
    /// A fix time from a fully specified timestamp.
    pub fn from_timestamp(timestamp: TimeStamp) -> Self {
        FixTime {
            tsi: timestamp.tsi(),
            tsf: timestamp.tsf(),
            integer: timestamp.seconds(),
            fractional: timestamp.fractional(),
        }
    }

    /// The fix time as a timestamp, when every present part is specified.
    pub fn timestamp(&self) -> Option<TimeStamp> {
        let seconds = if self.tsi == TsiMode::None { 0 } else { self.integer? };
        let fractional = if self.tsf == TsfMode::None { 0 } else { self.fractional? };
        TimeStamp::new(self.tsi, self.tsf, seconds, fractional).ok()
    }

    /// Decode from a first word (modes in bits 27-24) and the following 3 words.
    pub(crate) fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let first = word(buf, offset)?;
        let tsi = TsiMode::from_code(((first >> 26) & 0x3) as u8);
        let tsf = TsfMode::from_code(((first >> 24) & 0x3) as u8);
        let integer = word(buf, offset + 4)?;
        let fractional = unpack_u64(buf, offset + 8)
            .ok_or(VrtError::BufferTooShort { needed: offset + 16, available: buf.len() })?;
        Ok(FixTime {
            tsi,
            tsf,
            integer: (tsi != TsiMode::None && integer != UNSPECIFIED_TSI).then_some(integer),
            fractional: (tsf != TsfMode::None && fractional != UNSPECIFIED_TSF).then_some(fractional),
        })
    }

    /// Mode bits for the first word.
    pub(crate) fn mode_bits(&self) -> u32 {
        ((self.tsi.code() as u32) << 26) | ((self.tsf.code() as u32) << 24)
    }

    /// Write the integer and fractional words at `offset` (the second word of the record).
    pub(crate) fn write_values(&self, buf: &mut [u8], offset: usize) {
        pack_u32(buf, offset, self.integer.unwrap_or(UNSPECIFIED_TSI));
        pack_u64(buf, offset + 4, self.fractional.unwrap_or(UNSPECIFIED_TSF));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fixed_values() {
        let mut buf = [0u8; 4];
        write_fixed(&mut buf, 0, None, 22);
        assert_eq!(read_fixed(&buf, 0, 22).unwrap(), None);
        write_fixed(&mut buf, 0, Some(-45.5), 22);
        assert_eq!(read_fixed(&buf, 0, 22).unwrap(), Some(-45.5));
        assert!(read_fixed(&buf, 2, 22).is_err());
    }

    #[test]
    fn fixed_range_checks() {
        assert!(check_fixed("latitude", Some(91.0), 22, (-90.0, 90.0)).is_err());
        assert!(check_fixed("altitude", Some(1.0e9), 5, (f64::MIN, f64::MAX)).is_err());
        assert!(check_fixed("latitude", None, 22, (-90.0, 90.0)).is_ok());
    }

    #[test]
    fn unspecified_fix_time() {
        let mut buf = [0u8; 16];
        pack_u32(&mut buf, 0, 0x0A00_0000);
        let time = FixTime { tsi: TsiMode::Gps, tsf: TsfMode::RealTime, integer: None, fractional: Some(5) };
        time.write_values(&mut buf, 4);
        let back = FixTime::read(&buf, 0).unwrap();
        assert_eq!(back, time);
        assert_eq!(back.timestamp(), None);
    }
}
