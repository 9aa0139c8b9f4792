//! Data payload format descriptor (64 bits).
//!
//! Word 1: packing method (31), real/complex type (30-29), data item format
//! (28-24), sample-component repeat (23), event tag size (22-20), channel tag
//! size (19-16), data item fraction size (15-12), item packing field size - 1
//! (11-6), data item size - 1 (5-0). Word 2: repeat count - 1 (31-16) and
//! vector size - 1 (15-0).

use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How item packing fields are laid out in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PackingMethod {
    /// Fields never straddle a 32-bit word (64-bit for fields over 32 bits).
    #[default]
    ProcessingEfficient,
    /// Fields are packed back to back.
    LinkEfficient,
}

/// Real or complex samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RealComplex {
    #[default]
    Real,
    ComplexCartesian,
    ComplexPolar,
}

impl RealComplex {
    /// Items per sample.
    pub fn items_per_sample(self) -> usize {
        match self {
            RealComplex::Real => 1,
            RealComplex::ComplexCartesian | RealComplex::ComplexPolar => 2,
        }
    }
}

/// Encoding of one data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataItemFormat {
    /// Two's complement fixed point.
    #[default]
    SignedInt,
    /// VRT floating point with a 1..=6 bit exponent, signed mantissa.
    SignedVrt(u8),
    /// IEEE-754 binary16.
    IeeeHalf,
    /// IEEE-754 binary32.
    IeeeSingle,
    /// IEEE-754 binary64.
    IeeeDouble,
    /// Unsigned fixed point.
    UnsignedInt,
    /// VRT floating point with a 1..=6 bit exponent, unsigned mantissa.
    UnsignedVrt(u8),
}

impl DataItemFormat {
    /// Decode the 5-bit item format code.
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code & 0x1F {
            0x00 => DataItemFormat::SignedInt,
            c @ 0x01..=0x06 => DataItemFormat::SignedVrt(c),
            0x0D => DataItemFormat::IeeeHalf,
            0x0E => DataItemFormat::IeeeSingle,
            0x0F => DataItemFormat::IeeeDouble,
            0x10 => DataItemFormat::UnsignedInt,
            c @ 0x11..=0x16 => DataItemFormat::UnsignedVrt(c - 0x10),
            c => {
                return Err(VrtError::invalid_argument("data item format", format!("code {c:#04x} is reserved")));
            }
        })
    }

    /// The 5-bit item format code.
    pub fn code(self) -> u8 {
        match self {
            DataItemFormat::SignedInt => 0x00,
            DataItemFormat::SignedVrt(e) => e,
            DataItemFormat::IeeeHalf => 0x0D,
            DataItemFormat::IeeeSingle => 0x0E,
            DataItemFormat::IeeeDouble => 0x0F,
            DataItemFormat::UnsignedInt => 0x10,
            DataItemFormat::UnsignedVrt(e) => 0x10 | e,
        }
    }

    /// Whether items decode to floating point values.
    pub fn is_float(self) -> bool {
        !matches!(self, DataItemFormat::SignedInt | DataItemFormat::UnsignedInt)
    }

    /// Whether items are signed.
    pub fn is_signed(self) -> bool {
        !matches!(self, DataItemFormat::UnsignedInt | DataItemFormat::UnsignedVrt(_))
    }

    /// Fixed item size imposed by the format, if any.
    pub fn required_size(self) -> Option<u32> {
        match self {
            DataItemFormat::IeeeHalf => Some(16),
            DataItemFormat::IeeeSingle => Some(32),
            DataItemFormat::IeeeDouble => Some(64),
            _ => None,
        }
    }
}

/// Data payload format.
///
/// ```rust
/// use vrtkit::PayloadFormat;
///
/// let format = PayloadFormat::INT16;
/// assert_eq!(format.bits(), 0x0000_03CF_0000_0000);
/// assert_eq!(PayloadFormat::from_bits(format.bits()).unwrap(), format);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadFormat {
    pub packing: PackingMethod,
    pub real_complex: RealComplex,
    pub item_format: DataItemFormat,
    /// Sample-component repeat indicator.
    pub repeating: bool,
    /// Event tag bits per field (0..=7).
    pub event_tag_size: u8,
    /// Channel tag bits per field (0..=15).
    pub channel_tag_size: u8,
    /// Fraction bits of fixed-point items (0..=15).
    pub fraction_size: u8,
    /// Bits per item packing field (1..=64).
    pub field_size: u8,
    /// Bits per data item (1..=64).
    pub item_size: u8,
    /// Repeat count (1..=65536).
    pub repeat_count: u32,
    /// Vector size (1..=65536).
    pub vector_size: u32,
}

impl PayloadFormat {
    const fn simple(item_format: DataItemFormat, size: u8) -> Self {
        PayloadFormat {
            packing: PackingMethod::ProcessingEfficient,
            real_complex: RealComplex::Real,
            item_format,
            repeating: false,
            event_tag_size: 0,
            channel_tag_size: 0,
            fraction_size: 0,
            field_size: size,
            item_size: size,
            repeat_count: 1,
            vector_size: 1,
        }
    }

    pub const INT4: PayloadFormat = PayloadFormat::simple(DataItemFormat::SignedInt, 4);
    pub const INT8: PayloadFormat = PayloadFormat::simple(DataItemFormat::SignedInt, 8);
    pub const INT16: PayloadFormat = PayloadFormat::simple(DataItemFormat::SignedInt, 16);
    pub const INT32: PayloadFormat = PayloadFormat::simple(DataItemFormat::SignedInt, 32);
    pub const INT64: PayloadFormat = PayloadFormat::simple(DataItemFormat::SignedInt, 64);
    pub const UINT1: PayloadFormat = PayloadFormat::simple(DataItemFormat::UnsignedInt, 1);
    pub const UINT4: PayloadFormat = PayloadFormat::simple(DataItemFormat::UnsignedInt, 4);
    pub const UINT8: PayloadFormat = PayloadFormat::simple(DataItemFormat::UnsignedInt, 8);
    pub const UINT16: PayloadFormat = PayloadFormat::simple(DataItemFormat::UnsignedInt, 16);
    pub const FLOAT32: PayloadFormat = PayloadFormat::simple(DataItemFormat::IeeeSingle, 32);
    pub const DOUBLE64: PayloadFormat = PayloadFormat::simple(DataItemFormat::IeeeDouble, 64);

    /// A real, untagged format with field size equal to item size.
    pub fn new(item_format: DataItemFormat, item_size: u8) -> Result<Self> {
        let format = PayloadFormat::simple(item_format, item_size);
        format.validate()?;
        Ok(format)
    }

    /// Builder-style real/complex type.
    pub fn with_real_complex(mut self, real_complex: RealComplex) -> Self {
        self.real_complex = real_complex;
        self
    }

    /// Builder-style packing method.
    pub fn with_packing(mut self, packing: PackingMethod) -> Self {
        self.packing = packing;
        self
    }

    /// Check the field ranges and the field/item size relationship.
    pub fn validate(&self) -> Result<()> {
        let bad = |field: &str, details: String| Err(VrtError::invalid_argument(field, details));
        if !(1..=64).contains(&self.item_size) {
            return bad("data item size", format!("{} is outside 1..=64", self.item_size));
        }
        if !(1..=64).contains(&self.field_size) {
            return bad("item packing field size", format!("{} is outside 1..=64", self.field_size));
        }
        if self.event_tag_size > 7 || self.channel_tag_size > 15 || self.fraction_size > 15 {
            return bad("tag sizes", "event <= 7, channel <= 15 and fraction <= 15 bits".to_string());
        }
        let used = self.item_size as u32 + self.event_tag_size as u32 + self.channel_tag_size as u32;
        if used > self.field_size as u32 {
            return bad(
                "item packing field size",
                format!("{} bits cannot hold {used} bits of item and tags", self.field_size),
            );
        }
        if let Some(required) = self.item_format.required_size().filter(|r| *r != self.item_size as u32) {
            return bad("data item size", format!("{:?} items are {required} bits", self.item_format));
        }
        if let DataItemFormat::SignedVrt(e) | DataItemFormat::UnsignedVrt(e) = self.item_format {
            if !(1..=6).contains(&e) || e >= self.item_size {
                return bad("data item size", format!("{} bits cannot hold a {e} bit exponent", self.item_size));
            }
        }
        if !(1..=65536).contains(&self.repeat_count) || !(1..=65536).contains(&self.vector_size) {
            return bad("repeat/vector size", "must be in 1..=65536".to_string());
        }
        Ok(())
    }

    /// Decode the 64-bit form.
    pub fn from_bits(bits: u64) -> Result<Self> {
        let word1 = (bits >> 32) as u32;
        let word2 = bits as u32;
        let real_complex = match (word1 >> 29) & 0x3 {
            0 => RealComplex::Real,
            1 => RealComplex::ComplexCartesian,
            2 => RealComplex::ComplexPolar,
            _ => return Err(VrtError::invalid_argument("real/complex type", "code 3 is reserved")),
        };
        let format = PayloadFormat {
            packing: if word1 & (1 << 31) != 0 { PackingMethod::LinkEfficient } else { PackingMethod::ProcessingEfficient },
            real_complex,
            item_format: DataItemFormat::from_code(((word1 >> 24) & 0x1F) as u8)?,
            repeating: word1 & (1 << 23) != 0,
            event_tag_size: ((word1 >> 20) & 0x7) as u8,
            channel_tag_size: ((word1 >> 16) & 0xF) as u8,
            fraction_size: ((word1 >> 12) & 0xF) as u8,
            field_size: ((word1 >> 6) & 0x3F) as u8 + 1,
            item_size: (word1 & 0x3F) as u8 + 1,
            repeat_count: (word2 >> 16) + 1,
            vector_size: (word2 & 0xFFFF) + 1,
        };
        format.validate()?;
        Ok(format)
    }

    /// The 64-bit form.
    pub fn bits(&self) -> u64 {
        let word1 = ((self.packing == PackingMethod::LinkEfficient) as u32) << 31
            | (match self.real_complex {
                RealComplex::Real => 0,
                RealComplex::ComplexCartesian => 1,
                RealComplex::ComplexPolar => 2,
            }) << 29
            | (self.item_format.code() as u32) << 24
            | (self.repeating as u32) << 23
            | (self.event_tag_size as u32 & 0x7) << 20
            | (self.channel_tag_size as u32 & 0xF) << 16
            | (self.fraction_size as u32 & 0xF) << 12
            | ((self.field_size as u32).wrapping_sub(1) & 0x3F) << 6
            | ((self.item_size as u32).wrapping_sub(1) & 0x3F);
        let word2 = (self.repeat_count.wrapping_sub(1) & 0xFFFF) << 16 | (self.vector_size.wrapping_sub(1) & 0xFFFF);
        ((word1 as u64) << 32) | word2 as u64
    }

    /// Bits occupied by one sample (all its items, including field padding).
    pub fn bits_per_sample(&self) -> u32 {
        self.field_size as u32 * self.real_complex.items_per_sample() as u32
    }

    /// Whether fields carry no tags and no padding.
    pub fn is_dense(&self) -> bool {
        self.field_size == self.item_size && self.event_tag_size == 0 && self.channel_tag_size == 0
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {}/{} bits", self.real_complex, self.item_format, self.item_size, self.field_size)?;
        if self.packing == PackingMethod::LinkEfficient {
            f.write_str(" link-efficient")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn well_known_encodings() {
        assert_eq!(PayloadFormat::INT16.bits(), 0x0000_03CF_0000_0000);
        assert_eq!(PayloadFormat::FLOAT32.bits(), 0x0E00_07DF_0000_0000);
        let complex = PayloadFormat::INT16.with_real_complex(RealComplex::ComplexCartesian);
        assert_eq!(complex.bits() >> 61, 1);
        assert_eq!(complex.bits_per_sample(), 32);
    }

    #[test]
    fn rejects_inconsistent_sizes() {
        let mut format = PayloadFormat::INT8;
        format.event_tag_size = 2;
        assert!(format.validate().is_err());
        format.field_size = 10;
        assert!(format.validate().is_ok());

        assert!(PayloadFormat::new(DataItemFormat::IeeeSingle, 16).is_err());
        assert!(PayloadFormat::new(DataItemFormat::SignedVrt(6), 6).is_err());
        assert!(DataItemFormat::from_code(0x08).is_err());
    }

    proptest! {
        #[test]
        fn bits_round_trip(
            link in any::<bool>(),
            complex in 0usize..3,
            size in 1u8..=32,
            tags in 0u8..=7,
            repeat in 1u32..=65536,
            vector in 1u32..=65536,
        ) {
            let format = PayloadFormat {
                packing: if link { PackingMethod::LinkEfficient } else { PackingMethod::ProcessingEfficient },
                real_complex: [RealComplex::Real, RealComplex::ComplexCartesian, RealComplex::ComplexPolar][complex],
                item_format: DataItemFormat::SignedInt,
                repeating: repeat > 1,
                event_tag_size: tags,
                channel_tag_size: 0,
                fraction_size: 0,
                field_size: size + tags,
                item_size: size,
                repeat_count: repeat,
                vector_size: vector,
            };
            prop_assert_eq!(PayloadFormat::from_bits(format.bits()).unwrap(), format);
        }
    }
}
