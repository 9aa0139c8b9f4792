//! Wire encodings of context field values.
//!
//! Each codec is a zero-sized marker naming how the current-value instance of
//! a field is stored. Decoding gets exactly the stored bytes of that instance
//! and returns `None` when they are malformed.

use crate::codec::{
    fits_fixed, from_fixed16, from_fixed32, from_fixed64, pack_i32, pack_i64, pack_u64, to_fixed16,
    to_fixed32, to_fixed64, unpack_i32, unpack_i64, unpack_u32, unpack_u64,
};
use crate::config::VrtConfig;
use crate::fields::FieldValue;
use crate::packet::{PayloadFormat, StateEventBits};
use crate::record::Record;
use crate::{Result, VrtError};
use std::marker::PhantomData;

pub(crate) trait FieldCodec {
    type Value: FieldValue + Clone;

    fn decode(bytes: &[u8], config: &VrtConfig) -> Option<Self::Value>;

    fn encode(value: &Self::Value, config: &VrtConfig) -> Result<Vec<u8>>;
}

fn out_of_range(value: impl std::fmt::Display, what: &str) -> VrtError {
    VrtError::invalid_argument(what, format!("{value} is out of range"))
}

fn word_bytes(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Frequency in Hz: 64-bit fixed point, radix 20.
pub(crate) struct Hz;

impl FieldCodec for Hz {
    type Value = f64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<f64> {
        unpack_i64(bytes, 0).map(|bits| from_fixed64(bits, 20))
    }

    fn encode(value: &f64, _config: &VrtConfig) -> Result<Vec<u8>> {
        if !fits_fixed(*value, 64, 20) {
            return Err(out_of_range(value, "frequency"));
        }
        let mut bytes = vec![0; 8];
        pack_i64(&mut bytes, 0, to_fixed64(*value, 20));
        Ok(bytes)
    }
}

/// Frequency that may not be negative (bandwidth, sample rate).
pub(crate) struct PositiveHz;

impl FieldCodec for PositiveHz {
    type Value = f64;

    fn decode(bytes: &[u8], config: &VrtConfig) -> Option<f64> {
        Hz::decode(bytes, config)
    }

    fn encode(value: &f64, config: &VrtConfig) -> Result<Vec<u8>> {
        if *value < 0.0 {
            return Err(out_of_range(value, "frequency"));
        }
        Hz::encode(value, config)
    }
}

/// 16-bit fixed point in the low half of a word; the upper half is reserved.
pub(crate) struct Fixed16<const RADIX: u32>;

impl<const RADIX: u32> FieldCodec for Fixed16<RADIX> {
    type Value = f64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<f64> {
        unpack_u32(bytes, 0).map(|word| from_fixed16(word as u16 as i16, RADIX))
    }

    fn encode(value: &f64, _config: &VrtConfig) -> Result<Vec<u8>> {
        if !fits_fixed(*value, 16, RADIX) {
            return Err(out_of_range(value, "16-bit fixed-point value"));
        }
        Ok(word_bytes(to_fixed16(*value, RADIX) as u16 as u32))
    }
}

/// 32-bit fixed point.
pub(crate) struct Fixed32<const RADIX: u32>;

impl<const RADIX: u32> FieldCodec for Fixed32<RADIX> {
    type Value = f64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<f64> {
        unpack_i32(bytes, 0).map(|bits| from_fixed32(bits, RADIX))
    }

    fn encode(value: &f64, _config: &VrtConfig) -> Result<Vec<u8>> {
        if !fits_fixed(*value, 32, RADIX) {
            return Err(out_of_range(value, "32-bit fixed-point value"));
        }
        let mut bytes = vec![0; 4];
        pack_i32(&mut bytes, 0, to_fixed32(*value, RADIX));
        Ok(bytes)
    }
}

/// Two 16-bit fixed-point values sharing a word, upper half first.
pub(crate) struct Pair16<const RADIX: u32>;

impl<const RADIX: u32> FieldCodec for Pair16<RADIX> {
    type Value = [f64; 2];

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<[f64; 2]> {
        let word = unpack_u32(bytes, 0)?;
        Some([from_fixed16((word >> 16) as u16 as i16, RADIX), from_fixed16(word as u16 as i16, RADIX)])
    }

    fn encode(value: &[f64; 2], _config: &VrtConfig) -> Result<Vec<u8>> {
        for half in value {
            if !fits_fixed(*half, 16, RADIX) {
                return Err(out_of_range(half, "16-bit fixed-point value"));
            }
        }
        let upper = to_fixed16(value[0], RADIX) as u16 as u32;
        let lower = to_fixed16(value[1], RADIX) as u16 as u32;
        Ok(word_bytes((upper << 16) | lower))
    }
}

/// Gain as `[stage 1, stage 2]` in dB; stage 2 is stored in the upper half.
pub(crate) struct Gain;

impl FieldCodec for Gain {
    type Value = [f64; 2];

    fn decode(bytes: &[u8], config: &VrtConfig) -> Option<[f64; 2]> {
        Pair16::<7>::decode(bytes, config).map(|[stage2, stage1]| [stage1, stage2])
    }

    fn encode(value: &[f64; 2], config: &VrtConfig) -> Result<Vec<u8>> {
        Pair16::<7>::encode(&[value[1], value[0]], config)
    }
}

pub(crate) struct U32;

impl FieldCodec for U32 {
    type Value = u32;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<u32> {
        unpack_u32(bytes, 0)
    }

    fn encode(value: &u32, _config: &VrtConfig) -> Result<Vec<u8>> {
        Ok(word_bytes(*value))
    }
}

pub(crate) struct U64;

impl FieldCodec for U64 {
    type Value = u64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<u64> {
        unpack_u64(bytes, 0)
    }

    fn encode(value: &u64, _config: &VrtConfig) -> Result<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }
}

pub(crate) struct I64;

impl FieldCodec for I64 {
    type Value = i64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<i64> {
        unpack_i64(bytes, 0)
    }

    fn encode(value: &i64, _config: &VrtConfig) -> Result<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }
}

/// Device identifier: 24-bit OUI in the first word, 16-bit device code in the
/// low half of the second. The 64-bit value is `0x00OOOOOO_0000DDDD`.
pub(crate) struct DeviceId;

const DEVICE_ID_MASK: u64 = 0x00FF_FFFF_0000_FFFF;

impl FieldCodec for DeviceId {
    type Value = u64;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<u64> {
        unpack_u64(bytes, 0).map(|bits| bits & DEVICE_ID_MASK)
    }

    fn encode(value: &u64, _config: &VrtConfig) -> Result<Vec<u8>> {
        if value & !DEVICE_ID_MASK != 0 {
            return Err(VrtError::invalid_argument(
                "device identifier",
                format!("{value:#018x} sets bits outside the OUI and device code"),
            ));
        }
        let mut bytes = vec![0; 8];
        pack_u64(&mut bytes, 0, *value);
        Ok(bytes)
    }
}

/// Opaque fixed-size bytes.
pub(crate) struct Opaque<const N: usize>;

impl<const N: usize> FieldCodec for Opaque<N> {
    type Value = [u8; N];

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<[u8; N]> {
        bytes.get(..N)?.try_into().ok()
    }

    fn encode(value: &[u8; N], _config: &VrtConfig) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }
}

/// Self-sizing structure whose first word's low 24 bits count its words.
pub(crate) struct SizedStructure;

impl FieldCodec for SizedStructure {
    type Value = Vec<u8>;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<Vec<u8>> {
        let words = (unpack_u32(bytes, 0)? & 0x00FF_FFFF) as usize;
        bytes.get(..4 * words).map(<[u8]>::to_vec)
    }

    fn encode(value: &Vec<u8>, _config: &VrtConfig) -> Result<Vec<u8>> {
        let words = unpack_u32(value, 0).map(|w| (w & 0x00FF_FFFF) as usize).unwrap_or(0);
        if words == 0 || words * 4 != value.len() {
            return Err(VrtError::invalid_argument(
                "structure",
                format!("size word declares {words} words for {} bytes", value.len()),
            ));
        }
        Ok(value.clone())
    }
}

pub(crate) struct StateEvents;

impl FieldCodec for StateEvents {
    type Value = StateEventBits;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<StateEventBits> {
        unpack_u32(bytes, 0).map(StateEventBits::from_bits)
    }

    fn encode(value: &StateEventBits, _config: &VrtConfig) -> Result<Vec<u8>> {
        Ok(word_bytes(value.bits()))
    }
}

pub(crate) struct Format;

impl FieldCodec for Format {
    type Value = PayloadFormat;

    fn decode(bytes: &[u8], _config: &VrtConfig) -> Option<PayloadFormat> {
        unpack_u64(bytes, 0).and_then(|bits| PayloadFormat::from_bits(bits).ok())
    }

    fn encode(value: &PayloadFormat, _config: &VrtConfig) -> Result<Vec<u8>> {
        value.validate()?;
        Ok(value.bits().to_be_bytes().to_vec())
    }
}

/// An embedded [`Record`], copied out on read.
pub(crate) struct RecordField<R>(PhantomData<R>);

impl<R: Record + FieldValue + Clone> FieldCodec for RecordField<R> {
    type Value = R;

    fn decode(bytes: &[u8], config: &VrtConfig) -> Option<R> {
        R::read_from(bytes, 0, config).ok()
    }

    fn encode(value: &R, config: &VrtConfig) -> Result<Vec<u8>> {
        value.to_bytes(config)
    }
}
