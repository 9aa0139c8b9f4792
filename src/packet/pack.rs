//! Conversion between packed data items and native sample arrays.
//!
//! Items sit in the most significant bits of their packing field; event and
//! channel tags fill the least significant bits. Processing-efficient fields
//! never straddle a 32-bit word (fields wider than 32 bits take a whole 64-bit
//! word); link-efficient fields are packed back to back. Values outside an
//! item's range saturate.

use super::payload_format::{DataItemFormat, PackingMethod, PayloadFormat};
use crate::codec::{from_half, read_bits, sign_extend, to_half, write_bits};
use crate::{Result, VrtError};

/// A native sample type that data items convert to and from.
pub trait Sample: Copy + Default + 'static {
    /// Whether fixed-point fraction bits are applied on conversion.
    const IS_FLOAT: bool;
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_i64(value: i64) -> Self;
    fn to_i64(self) -> i64;
}

macro_rules! int_sample {
    ($($t:ty),*) => {$(
        impl Sample for $t {
            const IS_FLOAT: bool = false;
            #[inline]
            fn from_f64(value: f64) -> Self { value.round() as $t }
            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
            #[inline]
            fn from_i64(value: i64) -> Self { value.clamp(<$t>::MIN as i64, <$t>::MAX as i64) as $t }
            #[inline]
            fn to_i64(self) -> i64 { self as i64 }
        }
    )*};
}

macro_rules! float_sample {
    ($($t:ty),*) => {$(
        impl Sample for $t {
            const IS_FLOAT: bool = true;
            #[inline]
            fn from_f64(value: f64) -> Self { value as $t }
            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
            #[inline]
            fn from_i64(value: i64) -> Self { value as $t }
            #[inline]
            fn to_i64(self) -> i64 { self.round() as i64 }
        }
    )*};
}

int_sample!(i8, i16, i32, i64);
float_sample!(f32, f64);

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Bit offset of packing field `index` from the start of the payload.
#[inline]
pub fn field_bit_offset(format: &PayloadFormat, index: usize) -> usize {
    let field = format.field_size as usize;
    match format.packing {
        PackingMethod::LinkEfficient => index * field,
        PackingMethod::ProcessingEfficient if field <= 32 => {
            let per_word = 32 / field;
            (index / per_word) * 32 + (index % per_word) * field
        }
        PackingMethod::ProcessingEfficient => index * 64,
    }
}

/// Number of items held by `payload_bytes` less `pad_bits` trailing pad bits.
pub fn item_count(format: &PayloadFormat, payload_bytes: usize, pad_bits: usize) -> usize {
    let bits = (payload_bytes * 8).saturating_sub(pad_bits);
    let field = format.field_size as usize;
    match format.packing {
        PackingMethod::LinkEfficient => bits / field,
        PackingMethod::ProcessingEfficient if field <= 32 => (bits / 32) * (32 / field) + (bits % 32) / field,
        PackingMethod::ProcessingEfficient => bits / 64,
    }
}

/// Payload bytes needed for `items` items, padded to a whole 32-bit word.
pub fn packed_length(format: &PayloadFormat, items: usize) -> usize {
    let field = format.field_size as usize;
    let bits = match format.packing {
        PackingMethod::LinkEfficient => items * field,
        PackingMethod::ProcessingEfficient if field <= 32 => items.div_ceil(32 / field) * 32,
        PackingMethod::ProcessingEfficient => items * 64,
    };
    bits.div_ceil(32) * 4
}

/// Trailing pad bits left after packing `items` items (link-efficient only).
pub fn pad_bits(format: &PayloadFormat, items: usize) -> usize {
    match format.packing {
        PackingMethod::LinkEfficient => packed_length(format, items) * 8 - items * format.field_size as usize,
        PackingMethod::ProcessingEfficient => 0,
    }
}

fn decode_vrt_float(raw: u64, size: u32, exponent_bits: u32, signed: bool) -> f64 {
    let exponent = (raw & mask(exponent_bits)) as i32;
    let mantissa_bits = size - exponent_bits;
    let mantissa_raw = raw >> exponent_bits;
    let mantissa = if signed {
        sign_extend(mantissa_raw, mantissa_bits) as f64 / 2f64.powi(mantissa_bits as i32 - 1)
    } else {
        mantissa_raw as f64 / 2f64.powi(mantissa_bits as i32)
    };
    mantissa * 2f64.powi(exponent)
}

fn encode_vrt_float(value: f64, size: u32, exponent_bits: u32, signed: bool) -> u64 {
    let mantissa_bits = size - exponent_bits;
    let (scale, low, high) = if signed {
        let half = 1i64 << (mantissa_bits - 1);
        (half as f64, -half, half - 1)
    } else {
        let full = mask(mantissa_bits).min(i64::MAX as u64) as i64;
        (2f64.powi(mantissa_bits as i32), 0, full)
    };
    let max_exponent = mask(exponent_bits) as i32;
    let mut exponent = 0;
    let mut mantissa = (value * scale).round();
    while exponent < max_exponent && !(low as f64..=high as f64).contains(&mantissa) {
        exponent += 1;
        mantissa = (value / 2f64.powi(exponent) * scale).round();
    }
    let mantissa = (mantissa as i64).clamp(low, high) as u64 & mask(mantissa_bits);
    (mantissa << exponent_bits) | exponent as u64
}

#[inline]
fn decode<T: Sample>(raw: u64, format: &PayloadFormat) -> T {
    let size = format.item_size as u32;
    match format.item_format {
        DataItemFormat::SignedInt => {
            let value = sign_extend(raw, size);
            if T::IS_FLOAT && format.fraction_size > 0 {
                T::from_f64(value as f64 / (1u64 << format.fraction_size) as f64)
            } else {
                T::from_i64(value)
            }
        }
        DataItemFormat::UnsignedInt => {
            if T::IS_FLOAT && format.fraction_size > 0 {
                T::from_f64(raw as f64 / (1u64 << format.fraction_size) as f64)
            } else {
                T::from_i64(raw.min(i64::MAX as u64) as i64)
            }
        }
        DataItemFormat::IeeeHalf => T::from_f64(from_half(raw as u16) as f64),
        DataItemFormat::IeeeSingle => T::from_f64(f32::from_bits(raw as u32) as f64),
        DataItemFormat::IeeeDouble => T::from_f64(f64::from_bits(raw)),
        DataItemFormat::SignedVrt(e) => T::from_f64(decode_vrt_float(raw, size, e as u32, true)),
        DataItemFormat::UnsignedVrt(e) => T::from_f64(decode_vrt_float(raw, size, e as u32, false)),
    }
}

#[inline]
fn encode<T: Sample>(value: T, format: &PayloadFormat) -> u64 {
    let size = format.item_size as u32;
    let fixed = |value: T| -> i128 {
        if T::IS_FLOAT {
            (value.to_f64() * (1u64 << format.fraction_size) as f64).round() as i128
        } else {
            value.to_i64() as i128
        }
    };
    match format.item_format {
        DataItemFormat::SignedInt => {
            let limit = 1i128 << (size - 1);
            (fixed(value).clamp(-limit, limit - 1) as u64) & mask(size)
        }
        DataItemFormat::UnsignedInt => fixed(value).clamp(0, mask(size) as i128) as u64,
        DataItemFormat::IeeeHalf => to_half(value.to_f64() as f32) as u64,
        DataItemFormat::IeeeSingle => (value.to_f64() as f32).to_bits() as u64,
        DataItemFormat::IeeeDouble => value.to_f64().to_bits(),
        DataItemFormat::SignedVrt(e) => encode_vrt_float(value.to_f64(), size, e as u32, true),
        DataItemFormat::UnsignedVrt(e) => encode_vrt_float(value.to_f64(), size, e as u32, false),
    }
}

macro_rules! dense_unpack {
    ($payload:expr, $count:expr, $n:expr, $raw:ty, $map:expr) => {
        $payload
            .chunks_exact($n)
            .take($count)
            .map(|chunk| {
                let mut bytes = [0u8; $n];
                bytes.copy_from_slice(chunk);
                $map(<$raw>::from_be_bytes(bytes))
            })
            .collect()
    };
}

/// Unpack `count` items from `payload`.
pub fn unpack<T: Sample>(payload: &[u8], format: &PayloadFormat, count: usize) -> Result<Vec<T>> {
    format.validate()?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let needed_bits = field_bit_offset(format, count - 1) + format.field_size as usize;
    let needed = needed_bits.div_ceil(8);
    if needed > payload.len() {
        return Err(VrtError::BufferTooShort { needed, available: payload.len() });
    }

    let plain_int = format.fraction_size == 0 || !T::IS_FLOAT;
    if format.is_dense() {
        match (format.item_format, format.item_size) {
            (DataItemFormat::SignedInt, 8) if plain_int => {
                return Ok(payload[..count].iter().map(|&b| T::from_i64(b as i8 as i64)).collect());
            }
            (DataItemFormat::SignedInt, 16) if plain_int => {
                return Ok(dense_unpack!(payload, count, 2, i16, |v: i16| T::from_i64(v as i64)));
            }
            (DataItemFormat::SignedInt, 32) if plain_int => {
                return Ok(dense_unpack!(payload, count, 4, i32, |v: i32| T::from_i64(v as i64)));
            }
            (DataItemFormat::SignedInt, 64) if plain_int => {
                return Ok(dense_unpack!(payload, count, 8, i64, T::from_i64));
            }
            (DataItemFormat::IeeeSingle, 32) => {
                return Ok(dense_unpack!(payload, count, 4, f32, |v: f32| T::from_f64(v as f64)));
            }
            (DataItemFormat::IeeeDouble, 64) => {
                return Ok(dense_unpack!(payload, count, 8, f64, T::from_f64));
            }
            (_, 4) => {
                return Ok(payload
                    .iter()
                    .flat_map(|&b| [(b >> 4) as u64, (b & 0x0F) as u64])
                    .take(count)
                    .map(|raw| decode::<T>(raw, format))
                    .collect());
            }
            (_, 1) => {
                return Ok(payload
                    .iter()
                    .flat_map(|&b| (0..8).rev().map(move |shift| ((b >> shift) & 1) as u64))
                    .take(count)
                    .map(|raw| decode::<T>(raw, format))
                    .collect());
            }
            _ => {}
        }
    }

    let size = format.item_size as u32;
    (0..count)
        .map(|index| {
            let bit = field_bit_offset(format, index);
            read_bits(payload, bit, size)
                .map(|raw| decode::<T>(raw, format))
                .ok_or(VrtError::BufferTooShort { needed, available: payload.len() })
        })
        .collect()
}

/// Pack `values` into a zero-padded payload of [`packed_length`] bytes.
pub fn pack<T: Sample>(values: &[T], format: &PayloadFormat) -> Result<Vec<u8>> {
    format.validate()?;
    let length = packed_length(format, values.len());
    let plain_int = format.fraction_size == 0 || !T::IS_FLOAT;

    if format.is_dense() {
        let mut out = Vec::with_capacity(length);
        match (format.item_format, format.item_size) {
            (DataItemFormat::SignedInt, 16) if plain_int => {
                out.extend(values.iter().flat_map(|v| (v.to_i64().clamp(-32768, 32767) as i16).to_be_bytes()));
            }
            (DataItemFormat::SignedInt, 32) if plain_int => {
                out.extend(
                    values.iter().flat_map(|v| (v.to_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32).to_be_bytes()),
                );
            }
            (DataItemFormat::IeeeSingle, 32) => {
                out.extend(values.iter().flat_map(|v| (v.to_f64() as f32).to_be_bytes()));
            }
            (DataItemFormat::IeeeDouble, 64) => {
                out.extend(values.iter().flat_map(|v| v.to_f64().to_be_bytes()));
            }
            _ => {}
        }
        if !out.is_empty() || values.is_empty() {
            out.resize(length, 0);
            return Ok(out);
        }
    }

    let mut out = vec![0u8; length];
    let size = format.item_size as u32;
    for (index, value) in values.iter().enumerate() {
        write_bits(&mut out, field_bit_offset(format, index), size, encode(*value, format));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::payload_format::RealComplex;
    use proptest::prelude::*;

    #[test]
    fn processing_efficient_fields_do_not_straddle_words() {
        let mut format = PayloadFormat::new(DataItemFormat::SignedInt, 12).unwrap();
        assert_eq!(field_bit_offset(&format, 1), 12);
        assert_eq!(field_bit_offset(&format, 2), 32);
        assert_eq!(packed_length(&format, 3), 8);
        assert_eq!(item_count(&format, 8, 0), 4);

        format.packing = PackingMethod::LinkEfficient;
        assert_eq!(field_bit_offset(&format, 2), 24);
        assert_eq!(packed_length(&format, 3), 8);
        assert_eq!(pad_bits(&format, 3), 28);
        assert_eq!(item_count(&format, 8, 28), 3);
    }

    #[test]
    fn int16_fast_path() {
        let values = [1i16, -2, 300, i16::MIN];
        let bytes = pack(&values, &PayloadFormat::INT16).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0xFF, 0xFE]);
        let back: Vec<i16> = unpack(&bytes, &PayloadFormat::INT16, 4).unwrap();
        assert_eq!(back, values);
        let wide: Vec<f64> = unpack(&bytes, &PayloadFormat::INT16, 4).unwrap();
        assert_eq!(wide, vec![1.0, -2.0, 300.0, -32768.0]);
    }

    #[test]
    fn nibble_and_bit_fast_paths() {
        let nibbles = [0x12u8, 0xF0];
        let signed: Vec<i8> = unpack(&nibbles, &PayloadFormat::INT4, 4).unwrap();
        assert_eq!(signed, vec![1, 2, -1, 0]);
        let unsigned: Vec<i8> = unpack(&nibbles, &PayloadFormat::UINT4, 3).unwrap();
        assert_eq!(unsigned, vec![1, 2, 15]);

        let bits: Vec<i32> = unpack(&[0b1010_0001], &PayloadFormat::UINT1, 8).unwrap();
        assert_eq!(bits, vec![1, 0, 1, 0, 0, 0, 0, 1]);

        let packed = pack(&[1i32, 0, 1, 0, 0, 0, 0, 1], &PayloadFormat::UINT1).unwrap();
        assert_eq!(packed, vec![0b1010_0001, 0, 0, 0]);
    }

    #[test]
    fn tagged_fields_skip_tags() {
        let mut format = PayloadFormat::INT8;
        format.channel_tag_size = 4;
        format.field_size = 12;
        let bytes = pack(&[5i8, -3], &format).unwrap();
        let back: Vec<i8> = unpack(&bytes, &format, 2).unwrap();
        assert_eq!(back, vec![5, -3]);
    }

    #[test]
    fn fixed_point_fraction() {
        let mut format = PayloadFormat::INT16;
        format.fraction_size = 8;
        let bytes = pack(&[1.5f64, -0.25], &format).unwrap();
        assert_eq!(&bytes[..2], &[0x01, 0x80]);
        let back: Vec<f64> = unpack(&bytes, &format, 2).unwrap();
        assert_eq!(back, vec![1.5, -0.25]);
    }

    #[test]
    fn vrt_float_items() {
        let format = PayloadFormat::new(DataItemFormat::SignedVrt(4), 16).unwrap();
        let values = [0.5f64, -3.0, 100.0, 0.0];
        let bytes = pack(&values, &format).unwrap();
        let back: Vec<f64> = unpack(&bytes, &format, 4).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() <= a.abs() * 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn saturates_out_of_range_values() {
        let bytes = pack(&[1000i32, -1000], &PayloadFormat::INT8).unwrap();
        let back: Vec<i32> = unpack(&bytes, &PayloadFormat::INT8, 2).unwrap();
        assert_eq!(back, vec![127, -128]);
    }

    #[test]
    fn short_payload_is_an_error() {
        let err = unpack::<f32>(&[0u8; 4], &PayloadFormat::FLOAT32, 2).unwrap_err();
        assert!(matches!(err, VrtError::BufferTooShort { needed: 8, available: 4 }));
    }

    proptest! {
        #[test]
        fn generic_path_round_trips(
            size in 2u8..=33,
            link in any::<bool>(),
            raw in proptest::collection::vec(any::<i32>(), 0..40),
        ) {
            let mut format = PayloadFormat::new(DataItemFormat::SignedInt, size).unwrap()
                .with_real_complex(RealComplex::Real);
            if link {
                format.packing = PackingMethod::LinkEfficient;
            }
            let limit = 1i64 << (size - 1);
            let values: Vec<i64> = raw.iter().map(|v| (*v as i64).rem_euclid(2 * limit) - limit).collect();
            let bytes = pack(&values, &format).unwrap();
            prop_assert_eq!(bytes.len(), packed_length(&format, values.len()));
            let back: Vec<i64> = unpack(&bytes, &format, values.len()).unwrap();
            prop_assert_eq!(back, values);
        }

        #[test]
        fn float_items_round_trip(values in proptest::collection::vec(-1.0e6f32..1.0e6, 0..32)) {
            let bytes = pack(&values, &PayloadFormat::FLOAT32).unwrap();
            let back: Vec<f32> = unpack(&bytes, &PayloadFormat::FLOAT32, values.len()).unwrap();
            prop_assert_eq!(back, values);
        }
    }
}
