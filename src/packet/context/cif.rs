//! Context Indicator Field planes and the offset resolver.
//!
//! Fields are stored after the CIF words, plane by plane (CIF0, CIF1, CIF2,
//! CIF3) and within a plane in descending bit order. The offset of a field is
//! the sum of the lengths of every present field stored before it. Fixed
//! lengths are summed with popcounts against per-plane length-class masks;
//! only the self-describing variable-length fields need a read from the
//! buffer. Nothing is cached: every lookup recomputes from the current words.
//!
//! All offsets here are relative to the end of the packet header, so CIF0 is
//! at 0 and the first field follows the last CIF word.

use crate::codec::unpack_u32;
use crate::config::VrtConfig;
use crate::packet::VrtPacket;
use crate::record::{ContextAssocLists, Ephemeris, GeoSentences};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// One of the CIF words of a context packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CifPlane {
    Cif0,
    Cif1,
    Cif2,
    Cif3,
    /// Field attributes rather than fields.
    Cif7,
}

impl CifPlane {
    /// Planes that carry fields, in storage order.
    pub const FIELD_PLANES: [CifPlane; 4] = [CifPlane::Cif0, CifPlane::Cif1, CifPlane::Cif2, CifPlane::Cif3];

    /// CIF0 bit enabling this word; `None` for CIF0 itself.
    pub const fn enable_bit(self) -> Option<u32> {
        match self {
            CifPlane::Cif0 => None,
            CifPlane::Cif1 => Some(1),
            CifPlane::Cif2 => Some(2),
            CifPlane::Cif3 => Some(3),
            CifPlane::Cif7 => Some(7),
        }
    }

    /// Bits of this word that must be zero.
    pub const fn reserved_mask(self) -> u32 {
        match self {
            CifPlane::Cif7 => CIF7_RESERVED,
            plane => layout(plane).reserved,
        }
    }
}

impl fmt::Display for CifPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            CifPlane::Cif0 => 0,
            CifPlane::Cif1 => 1,
            CifPlane::Cif2 => 2,
            CifPlane::Cif3 => 3,
            CifPlane::Cif7 => 7,
        };
        write!(f, "CIF{n}")
    }
}

/// A context field: a CIF plane and the bit announcing it.
///
/// Only the named constants exist, so every identifier is in the plane's
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    plane: CifPlane,
    bit: u8,
}

impl FieldId {
    pub(crate) const fn new(plane: CifPlane, bit: u8) -> Self {
        FieldId { plane, bit }
    }

    pub const fn plane(self) -> CifPlane {
        self.plane
    }

    pub const fn bit(self) -> u8 {
        self.bit
    }

    /// The field's bit as a mask of its CIF word.
    pub const fn mask(self) -> u32 {
        1 << self.bit
    }

    /// Whether the stored length is read from the field itself.
    pub const fn is_variable(self) -> bool {
        layout(self.plane).variable & self.mask() != 0
    }

    /// Stored length of fixed-size fields.
    pub const fn fixed_length(self) -> Option<usize> {
        layout(self.plane).fixed_length(self.mask())
    }
}

/// Result of resolving a field offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOffset {
    /// The field is present at this offset.
    Present(usize),
    /// The field is absent and would be inserted at this offset.
    Absent(usize),
}

impl FieldOffset {
    /// The offset, whether or not the field is present.
    pub fn offset(self) -> usize {
        match self {
            FieldOffset::Present(offset) | FieldOffset::Absent(offset) => offset,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, FieldOffset::Present(_))
    }

    /// Signed form: non-negative when present, `-offset` when absent.
    ///
    /// An absent field at offset 0 cannot be told apart from a present one;
    /// that offset is CIF0 itself, which is never a field.
    pub fn as_signed(self) -> i64 {
        match self {
            FieldOffset::Present(offset) => offset as i64,
            FieldOffset::Absent(offset) => -(offset as i64),
        }
    }
}

/// Bits of the words above `bit`: `!(m ^ (m - 1))` for `m = 1 << bit`.
#[inline]
pub(crate) const fn bits_above(bit: u8) -> u32 {
    let m = 1u32 << bit;
    !(m ^ m.wrapping_sub(1))
}

const fn mask_of(bits: &[u8]) -> u32 {
    let mut mask = 0;
    let mut i = 0;
    while i < bits.len() {
        mask |= 1 << bits[i];
        i += 1;
    }
    mask
}

const fn span_of(high: u8, low: u8) -> u32 {
    let top = if high == 31 { u32::MAX } else { (1 << (high + 1)) - 1 };
    top & !((1 << low) - 1)
}

/// Length classes of one CIF plane.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneLayout {
    b4: u32,
    b8: u32,
    b16: u32,
    b44: u32,
    b52: u32,
    variable: u32,
    reserved: u32,
}

impl PlaneLayout {
    /// Bits that announce a stored field.
    pub(crate) const fn storage(&self) -> u32 {
        self.b4 | self.b8 | self.b16 | self.b44 | self.b52 | self.variable
    }

    const fn fixed_length(&self, mask: u32) -> Option<usize> {
        if self.b4 & mask != 0 {
            Some(4)
        } else if self.b8 & mask != 0 {
            Some(8)
        } else if self.b16 & mask != 0 {
            Some(16)
        } else if self.b44 & mask != 0 {
            Some(44)
        } else if self.b52 & mask != 0 {
            Some(52)
        } else {
            None
        }
    }

    /// Total length of the fixed-size fields in `word`.
    #[inline]
    fn fixed_bytes(&self, word: u32) -> usize {
        4 * (word & self.b4).count_ones() as usize
            + 8 * (word & self.b8).count_ones() as usize
            + 16 * (word & self.b16).count_ones() as usize
            + 44 * (word & self.b44).count_ones() as usize
            + 52 * (word & self.b52).count_ones() as usize
    }
}

const CIF0_LAYOUT: PlaneLayout = PlaneLayout {
    b4: mask_of(&[30, 24, 23, 22, 19, 18, 16, 10]),
    b8: mask_of(&[29, 28, 27, 26, 25, 21, 20, 17, 15]),
    b16: 0,
    b44: mask_of(&[14, 13]),
    b52: 0,
    // ephemerides grow by an adjunct under V49b
    variable: mask_of(&[12, 11, 9, 8]),
    reserved: mask_of(&[6, 5, 4, 0]),
};

const CIF1_LAYOUT: PlaneLayout = PlaneLayout {
    b4: mask_of(&[31, 30, 29, 27, 26, 25, 24, 20, 19, 18, 17, 16, 14, 6, 4, 3, 2]),
    b8: mask_of(&[15, 13, 5, 1]),
    b16: 0,
    b44: 0,
    b52: mask_of(&[10]),
    variable: mask_of(&[28, 11, 9, 7]),
    reserved: mask_of(&[23, 22, 21, 12, 8, 0]),
};

const CIF2_LAYOUT: PlaneLayout = PlaneLayout {
    b4: span_of(31, 25) | mask_of(&[23]) | span_of(21, 3),
    b8: 0,
    b16: mask_of(&[24, 22]),
    b44: 0,
    b52: 0,
    variable: 0,
    reserved: span_of(2, 0),
};

const CIF3_LAYOUT: PlaneLayout = PlaneLayout {
    b4: span_of(7, 1),
    b8: mask_of(&[31, 30, 17, 16]) | span_of(27, 20),
    b16: 0,
    b44: 0,
    b52: 0,
    variable: 0,
    reserved: mask_of(&[29, 28, 19, 18, 0]) | span_of(15, 8),
};

const EMPTY_LAYOUT: PlaneLayout =
    PlaneLayout { b4: 0, b8: 0, b16: 0, b44: 0, b52: 0, variable: 0, reserved: 0 };

/// CIF7 current-value attribute.
pub const CIF7_CURRENT_VALUE: u32 = 1 << 31;
/// CIF7 attributes stored at the field's own size (current value included).
const CIF7_SAME_SIZE: u32 = 0xFFE0_0000;
/// CIF7 attributes stored as one word (probability, belief).
const CIF7_ONE_WORD: u32 = 0x0018_0000;
const CIF7_RESERVED: u32 = 0x0007_FFFF;

pub(crate) const fn layout(plane: CifPlane) -> PlaneLayout {
    match plane {
        CifPlane::Cif0 => CIF0_LAYOUT,
        CifPlane::Cif1 => CIF1_LAYOUT,
        CifPlane::Cif2 => CIF2_LAYOUT,
        CifPlane::Cif3 => CIF3_LAYOUT,
        CifPlane::Cif7 => EMPTY_LAYOUT,
    }
}

/// A field attribute announced in CIF7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    CurrentValue,
    Mean,
    Median,
    StandardDeviation,
    Maximum,
    Minimum,
    Precision,
    Accuracy,
    FirstDerivative,
    SecondDerivative,
    ThirdDerivative,
    Probability,
    Belief,
}

impl Attribute {
    /// The attribute's CIF7 bit.
    pub const fn bit(self) -> u32 {
        31 - self as u32
    }

    /// Whether instances take one word rather than the field's own size.
    pub const fn is_one_word(self) -> bool {
        matches!(self, Attribute::Probability | Attribute::Belief)
    }
}

/// The CIF words of a context packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct CifWords {
    pub cif0: u32,
    pub cif1: Option<u32>,
    pub cif2: Option<u32>,
    pub cif3: Option<u32>,
    pub cif7: Option<u32>,
}

impl CifWords {
    pub(crate) fn get(&self, plane: CifPlane) -> Option<u32> {
        match plane {
            CifPlane::Cif0 => Some(self.cif0),
            CifPlane::Cif1 => self.cif1,
            CifPlane::Cif2 => self.cif2,
            CifPlane::Cif3 => self.cif3,
            CifPlane::Cif7 => self.cif7,
        }
    }

    /// Length of the CIF words in bytes.
    pub(crate) fn length(&self) -> usize {
        4 * (1 + [self.cif1, self.cif2, self.cif3, self.cif7].iter().flatten().count())
    }

    /// Offset of `plane`'s word, whether or not it is present.
    pub(crate) fn word_offset(&self, plane: CifPlane) -> usize {
        let before: &[Option<u32>] = match plane {
            CifPlane::Cif0 => &[],
            CifPlane::Cif1 => &[],
            CifPlane::Cif2 => &[self.cif1],
            CifPlane::Cif3 => &[self.cif1, self.cif2],
            CifPlane::Cif7 => &[self.cif1, self.cif2, self.cif3],
        };
        let skip = if plane == CifPlane::Cif0 { 0 } else { 4 };
        skip + 4 * before.iter().flatten().count()
    }

    /// Whether any plane announces a stored field.
    pub(crate) fn has_fields(&self) -> bool {
        CifPlane::FIELD_PLANES
            .iter()
            .any(|plane| self.get(*plane).is_some_and(|word| word & layout(*plane).storage() != 0))
    }
}

/// Stored length of one instance of the variable field at `plane`/`bit`,
/// read from `bytes` at `at`.
pub(crate) fn stored_length(plane: CifPlane, bit: u8, bytes: &[u8], at: usize, config: &VrtConfig) -> Result<usize> {
    match (plane, bit) {
        (CifPlane::Cif0, 12 | 11) => Ephemeris::stored_length(bytes, at, config),
        (CifPlane::Cif0, 9) => GeoSentences::stored_length(bytes, at),
        (CifPlane::Cif0, 8) => ContextAssocLists::stored_length(bytes, at),
        (CifPlane::Cif1, _) => {
            let words = unpack_u32(bytes, at)
                .ok_or(VrtError::BufferTooShort { needed: at + 4, available: bytes.len() })?
                & 0x00FF_FFFF;
            if words == 0 {
                return Err(VrtError::invalid_packet(format!("{plane} bit {bit} declares an empty structure")));
            }
            Ok(4 * words as usize)
        }
        _ => {
            debug_assert!(false, "no variable field at {plane} bit {bit}");
            Err(VrtError::invalid_packet(format!("no variable field at {plane} bit {bit}")))
        }
    }
}

/// Offset resolution over one packet's current bytes.
pub(crate) struct Resolver<'p> {
    bytes: &'p [u8],
    base: usize,
    config: VrtConfig,
    words: CifWords,
}

impl<'p> Resolver<'p> {
    pub(crate) fn new(packet: &'p VrtPacket<'_>) -> Self {
        let bytes = packet.as_bytes();
        let base = packet.header_length();
        let word_at = |offset: usize| unpack_u32(bytes, base + offset).unwrap_or(0);
        let cif0 = word_at(0);
        let mut words = CifWords { cif0, ..CifWords::default() };
        let mut next = 4;
        let mut take = |plane: CifPlane| {
            let enabled = plane.enable_bit().is_some_and(|bit| cif0 & (1 << bit) != 0);
            enabled.then(|| {
                let word = word_at(next);
                next += 4;
                word
            })
        };
        words.cif1 = take(CifPlane::Cif1);
        words.cif2 = take(CifPlane::Cif2);
        words.cif3 = take(CifPlane::Cif3);
        words.cif7 = take(CifPlane::Cif7);
        Resolver { bytes, base, config: packet.config(), words }
    }

    pub(crate) fn words(&self) -> CifWords {
        self.words
    }

    pub(crate) fn base(&self) -> usize {
        self.base
    }

    /// Attribute multipliers: (instances at the field's size, one-word instances).
    pub(crate) fn attributes(&self) -> (usize, usize) {
        match self.words.cif7 {
            Some(cif7) => {
                ((cif7 & CIF7_SAME_SIZE).count_ones() as usize, (cif7 & CIF7_ONE_WORD).count_ones() as usize)
            }
            None => (1, 0),
        }
    }

    fn variable_length(&self, plane: CifPlane, bit: u8, position: usize) -> Result<usize> {
        stored_length(plane, bit, self.bytes, self.base + position, &self.config)
    }

    /// Bytes taken by the fields of `plane` announced in `word`, with the
    /// plane's first field at `start`.
    fn plane_span(&self, plane: CifPlane, start: usize, word: u32) -> Result<usize> {
        let layout = layout(plane);
        let (same, one_word) = self.attributes();
        let word = word & layout.storage();
        let fixed = word & !layout.variable;
        let fixed_footprint = |w: u32| same * layout.fixed_bytes(w) + 4 * one_word * w.count_ones() as usize;

        let mut span = fixed_footprint(fixed);
        let mut variable = word & layout.variable;
        let mut variable_bytes = 0;
        while variable != 0 {
            let bit = 31 - variable.leading_zeros() as u8;
            variable &= !(1 << bit);
            let position = start + fixed_footprint(fixed & bits_above(bit)) + variable_bytes;
            let length = self.variable_length(plane, bit, position)?;
            variable_bytes += same * length + 4 * one_word;
        }
        span += variable_bytes;
        Ok(span)
    }

    /// Offset of the first field of `plane`.
    fn plane_start(&self, plane: CifPlane) -> Result<usize> {
        let mut start = self.words.length();
        for lower in CifPlane::FIELD_PLANES.iter().take_while(|p| **p < plane) {
            if let Some(word) = self.words.get(*lower) {
                start += self.plane_span(*lower, start, word)?;
            }
        }
        Ok(start)
    }

    /// Offset of `field`, or where it would be inserted.
    pub(crate) fn offset(&self, field: FieldId) -> Result<FieldOffset> {
        let start = self.plane_start(field.plane)?;
        let Some(word) = self.words.get(field.plane) else {
            return Ok(FieldOffset::Absent(start));
        };
        let offset = start + self.plane_span(field.plane, start, word & bits_above(field.bit))?;
        trace!(plane = %field.plane, bit = field.bit, offset, "Resolved field offset");
        Ok(if word & field.mask() != 0 { FieldOffset::Present(offset) } else { FieldOffset::Absent(offset) })
    }

    /// Stored length of one instance of `field`, which is present at `offset`.
    pub(crate) fn instance_length(&self, field: FieldId, offset: usize) -> Result<usize> {
        match field.fixed_length() {
            Some(length) => Ok(length),
            None => self.variable_length(field.plane, field.bit, offset),
        }
    }

    /// Offset of `attribute` within a field of `length` bytes, when announced.
    pub(crate) fn attribute_offset(&self, attribute: Attribute, length: usize) -> Option<usize> {
        let bit = attribute.bit();
        let cif7 = match self.words.cif7 {
            Some(cif7) => cif7,
            None => return (attribute == Attribute::CurrentValue).then_some(0),
        };
        if cif7 & (1 << bit) == 0 {
            return None;
        }
        let above = bits_above(bit as u8);
        Some(length * (cif7 & CIF7_SAME_SIZE & above).count_ones() as usize
            + 4 * (cif7 & CIF7_ONE_WORD & above).count_ones() as usize)
    }

    /// Offset just past the last field.
    pub(crate) fn fields_end(&self) -> Result<usize> {
        let start = self.plane_start(CifPlane::Cif3)?;
        Ok(match self.words.cif3 {
            Some(word) => start + self.plane_span(CifPlane::Cif3, start, word)?,
            None => start,
        })
    }

    /// Offset and span of every field of `plane`.
    pub(crate) fn plane_extent(&self, plane: CifPlane) -> Result<(usize, usize)> {
        let start = self.plane_start(plane)?;
        let span = match self.words.get(plane) {
            Some(word) => self.plane_span(plane, start, word)?,
            None => 0,
        };
        Ok((start, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_mask_trick() {
        assert_eq!(bits_above(31), 0);
        assert_eq!(bits_above(29), 0xC000_0000);
        assert_eq!(bits_above(0), 0xFFFF_FFFE);
    }

    #[test]
    fn layouts_partition_each_word() {
        let flags = mask_of(&[31, 7, 3, 2, 1]);
        for plane in CifPlane::FIELD_PLANES {
            let l = layout(plane);
            let classes = [l.b4, l.b8, l.b16, l.b44, l.b52, l.variable, l.reserved];
            let mut seen = 0u32;
            for class in classes {
                assert_eq!(seen & class, 0, "{plane} classes overlap");
                seen |= class;
            }
            let expected = if plane == CifPlane::Cif0 { !flags } else { u32::MAX };
            assert_eq!(seen, expected, "{plane} leaves bits unclassified");
        }
    }

    #[test]
    fn fixed_lengths() {
        assert_eq!(FieldId::new(CifPlane::Cif0, 29).fixed_length(), Some(8));
        assert_eq!(FieldId::new(CifPlane::Cif0, 14).fixed_length(), Some(44));
        assert_eq!(FieldId::new(CifPlane::Cif1, 10).fixed_length(), Some(52));
        assert_eq!(FieldId::new(CifPlane::Cif2, 24).fixed_length(), Some(16));
        assert!(FieldId::new(CifPlane::Cif0, 9).is_variable());
        assert_eq!(FieldId::new(CifPlane::Cif0, 9).fixed_length(), None);
    }

    #[test]
    fn word_offsets_follow_enables() {
        let words = CifWords { cif0: 0b1000_1010, cif1: Some(0), cif3: Some(0), cif7: Some(0), ..Default::default() };
        assert_eq!(words.length(), 16);
        assert_eq!(words.word_offset(CifPlane::Cif1), 4);
        assert_eq!(words.word_offset(CifPlane::Cif2), 8);
        assert_eq!(words.word_offset(CifPlane::Cif3), 8);
        assert_eq!(words.word_offset(CifPlane::Cif7), 12);
    }

    #[test]
    fn signed_offsets() {
        assert_eq!(FieldOffset::Present(12).as_signed(), 12);
        assert_eq!(FieldOffset::Absent(12).as_signed(), -12);
        assert!(!FieldOffset::Absent(4).is_present());
    }
}
