//! Big-endian scalar codec.
//!
//! Stateless helpers that read and write fixed-width integers, IEEE floats,
//! VITA-49 fixed-point values, strings and arbitrary bit ranges at a byte
//! offset. Readers return `None` when the buffer is too short, so accessors
//! over malformed buffers degrade to "absent" instead of panicking. Writers
//! expect the caller to have laid out the buffer already and index directly.

macro_rules! scalar_codec {
    ($(($unpack:ident, $pack:ident, $t:ty, $n:expr)),* $(,)?) => {
        $(
            #[doc = concat!("Read a big-endian `", stringify!($t), "` at `offset`.")]
            #[inline]
            pub fn $unpack(buf: &[u8], offset: usize) -> Option<$t> {
                let bytes = buf.get(offset..offset.checked_add($n)?)?;
                let mut raw = [0u8; $n];
                raw.copy_from_slice(bytes);
                Some(<$t>::from_be_bytes(raw))
            }

            #[doc = concat!("Write a big-endian `", stringify!($t), "` at `offset`.")]
            #[inline]
            pub fn $pack(buf: &mut [u8], offset: usize, value: $t) {
                buf[offset..offset + $n].copy_from_slice(&value.to_be_bytes());
            }
        )*
    };
}

scalar_codec!(
    (unpack_u8, pack_u8, u8, 1),
    (unpack_i8, pack_i8, i8, 1),
    (unpack_u16, pack_u16, u16, 2),
    (unpack_i16, pack_i16, i16, 2),
    (unpack_u32, pack_u32, u32, 4),
    (unpack_i32, pack_i32, i32, 4),
    (unpack_u64, pack_u64, u64, 8),
    (unpack_i64, pack_i64, i64, 8),
    (unpack_f32, pack_f32, f32, 4),
    (unpack_f64, pack_f64, f64, 8),
);

/// Convert a 64-bit fixed-point value with `radix` fractional bits to `f64`.
#[inline]
pub fn from_fixed64(bits: i64, radix: u32) -> f64 {
    bits as f64 / (1u64 << radix) as f64
}

/// Convert `value` to a 64-bit fixed-point value with `radix` fractional bits.
///
/// Rounds to nearest; values outside the representable range saturate.
#[inline]
pub fn to_fixed64(value: f64, radix: u32) -> i64 {
    (value * (1u64 << radix) as f64).round() as i64
}

/// Convert a 32-bit fixed-point value with `radix` fractional bits to `f64`.
#[inline]
pub fn from_fixed32(bits: i32, radix: u32) -> f64 {
    bits as f64 / (1u64 << radix) as f64
}

/// Convert `value` to a 32-bit fixed-point value with `radix` fractional bits.
#[inline]
pub fn to_fixed32(value: f64, radix: u32) -> i32 {
    (value * (1u64 << radix) as f64).round() as i32
}

/// Convert a 16-bit fixed-point value with `radix` fractional bits to `f64`.
#[inline]
pub fn from_fixed16(bits: i16, radix: u32) -> f64 {
    bits as f64 / (1u32 << radix) as f64
}

/// Convert `value` to a 16-bit fixed-point value with `radix` fractional bits.
#[inline]
pub fn to_fixed16(value: f64, radix: u32) -> i16 {
    (value * (1u32 << radix) as f64).round() as i16
}

/// Whether `value` fits a signed fixed-point field of `bits` width and `radix`.
pub fn fits_fixed(value: f64, bits: u32, radix: u32) -> bool {
    if !value.is_finite() {
        return false;
    }
    let scaled = (value * (1u64 << radix) as f64).round();
    let limit = (1u128 << (bits - 1)) as f64;
    scaled >= -limit && scaled < limit
}

/// Read an ASCII string of at most `len` bytes, stopping at the first NUL.
pub fn unpack_ascii(buf: &[u8], offset: usize, len: usize) -> Option<String> {
    let bytes = buf.get(offset..offset.checked_add(len)?)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Some(bytes[..end].iter().map(|&b| if b.is_ascii() { b as char } else { '?' }).collect())
}

/// Write `text` as ASCII into `len` bytes, NUL padding the remainder.
///
/// Non-ASCII characters are replaced with `?`; text longer than `len` is cut.
pub fn pack_ascii(buf: &mut [u8], offset: usize, len: usize, text: &str) {
    let field = &mut buf[offset..offset + len];
    field.fill(0);
    for (slot, ch) in field.iter_mut().zip(text.chars()) {
        *slot = if ch.is_ascii() { ch as u8 } else { b'?' };
    }
}

/// Read a UTF-8 string of at most `len` bytes, stopping at the first NUL.
pub fn unpack_utf8(buf: &[u8], offset: usize, len: usize) -> Option<String> {
    let bytes = buf.get(offset..offset.checked_add(len)?)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Write `text` as UTF-8 into `len` bytes without splitting a character.
pub fn pack_utf8(buf: &mut [u8], offset: usize, len: usize, text: &str) {
    let field = &mut buf[offset..offset + len];
    field.fill(0);
    let mut end = text.len().min(len);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].copy_from_slice(&text.as_bytes()[..end]);
}

/// Read `width` bits (1..=64) starting at absolute bit offset `bit` (MSB first).
pub fn read_bits(buf: &[u8], bit: usize, width: u32) -> Option<u64> {
    debug_assert!((1..=64).contains(&width));
    let end_bit = bit.checked_add(width as usize)?;
    let first = bit / 8;
    let last = end_bit.div_ceil(8);
    let bytes = buf.get(first..last)?;

    let mut lane = [0u8; 16];
    lane[16 - bytes.len()..].copy_from_slice(bytes);
    let value = u128::from_be_bytes(lane);

    let right_shift = last * 8 - end_bit;
    let mask = if width == 64 { u64::MAX as u128 } else { (1u128 << width) - 1 };
    Some(((value >> right_shift) & mask) as u64)
}

/// Write the low `width` bits of `value` at absolute bit offset `bit` (MSB first).
pub fn write_bits(buf: &mut [u8], bit: usize, width: u32, value: u64) {
    debug_assert!((1..=64).contains(&width));
    let end_bit = bit + width as usize;
    let first = bit / 8;
    let last = end_bit.div_ceil(8);
    let bytes = &mut buf[first..last];

    let mut lane = [0u8; 16];
    lane[16 - bytes.len()..].copy_from_slice(bytes);
    let current = u128::from_be_bytes(lane);

    let right_shift = last * 8 - end_bit;
    let mask = if width == 64 { u64::MAX as u128 } else { (1u128 << width) - 1 };
    let updated = (current & !(mask << right_shift)) | (((value as u128) & mask) << right_shift);
    let out = updated.to_be_bytes();
    let len = bytes.len();
    bytes.copy_from_slice(&out[16 - len..]);
}

/// Sign-extend the low `width` bits of `raw`.
#[inline]
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

/// Decode an IEEE-754 binary16 value.
pub fn from_half(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0f32 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1F) as i32;
    let mantissa = (bits & 0x03FF) as f32;
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        0x1F if mantissa == 0.0 => sign * f32::INFINITY,
        0x1F => f32::NAN,
        e => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(e - 15),
    }
}

/// Encode an IEEE-754 binary16 value (round to nearest, saturating to infinity).
pub fn to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    if value.is_nan() {
        return sign | 0x7E00;
    }
    let abs = value.abs();
    if abs >= 65520.0 {
        return sign | 0x7C00;
    }
    if abs < 2f32.powi(-14) {
        // subnormal range, step 2^-24
        let mantissa = (abs / 2f32.powi(-24)).round() as u16;
        return sign | mantissa;
    }
    let exponent = abs.log2().floor() as i32;
    let mut mantissa = ((abs / 2f32.powi(exponent) - 1.0) * 1024.0).round() as u32;
    let mut biased = exponent + 15;
    if mantissa == 1024 {
        mantissa = 0;
        biased += 1;
    }
    sign | ((biased as u16) << 10) | mantissa as u16
}
