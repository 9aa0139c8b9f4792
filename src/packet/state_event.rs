//! Enable/indicator bit pairs shared by the context state/event field and the
//! data packet trailer.
//!
//! Bits 31..20 are enables and bits 19..8 the matching indicators (enable bit
//! minus 12). An indicator only means something while its enable is set, so
//! reads return `None` for a cleared enable. The low byte is owned by the
//! container: user-defined bits in the context field, the associated context
//! packet count in the trailer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset between an enable bit and its indicator bit.
const INDICATOR_SHIFT: u32 = 12;
/// All twelve enable bits.
pub const ENABLE_MASK: u32 = 0xFFF0_0000;
/// All twelve indicator bits.
pub const INDICATOR_MASK: u32 = 0x000F_FF00;

/// A named enable/indicator pair, identified by its enable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    CalibratedTime,
    ValidData,
    ReferenceLock,
    /// AGC (set) or MGC (clear) active.
    Agc,
    DetectedSignal,
    SpectralInversion,
    OverRange,
    /// Sample discontinuity since the previous packet.
    SampleLoss,
    User3,
    User2,
    User1,
    User0,
}

impl Indicator {
    /// All indicators in wire order (highest enable bit first).
    pub const ALL: [Indicator; 12] = [
        Indicator::CalibratedTime,
        Indicator::ValidData,
        Indicator::ReferenceLock,
        Indicator::Agc,
        Indicator::DetectedSignal,
        Indicator::SpectralInversion,
        Indicator::OverRange,
        Indicator::SampleLoss,
        Indicator::User3,
        Indicator::User2,
        Indicator::User1,
        Indicator::User0,
    ];

    /// Bit position of the enable flag.
    pub const fn enable_bit(self) -> u32 {
        31 - self as u32
    }

    /// Bit position of the indicator flag.
    pub const fn indicator_bit(self) -> u32 {
        self.enable_bit() - INDICATOR_SHIFT
    }

    /// Field name used by reflection and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Indicator::CalibratedTime => "CalibratedTimeStamp",
            Indicator::ValidData => "DataValid",
            Indicator::ReferenceLock => "ReferenceLocked",
            Indicator::Agc => "AGC",
            Indicator::DetectedSignal => "SignalDetected",
            Indicator::SpectralInversion => "InvertedSpectrum",
            Indicator::OverRange => "OverRange",
            Indicator::SampleLoss => "Discontinuous",
            Indicator::User3 => "UserDefined11",
            Indicator::User2 => "UserDefined10",
            Indicator::User1 => "UserDefined9",
            Indicator::User0 => "UserDefined8",
        }
    }
}

/// A 32-bit state/event word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StateEventBits(u32);

impl StateEventBits {
    /// Wrap a raw word.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw word.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Enable bits (31..20).
    pub const fn enables(self) -> u32 {
        self.0 & ENABLE_MASK
    }

    /// `None` when the enable is clear, otherwise the indicator value.
    pub fn get(self, indicator: Indicator) -> Option<bool> {
        (self.0 & (1 << indicator.enable_bit()) != 0).then(|| self.0 & (1 << indicator.indicator_bit()) != 0)
    }

    /// Set (`Some`) or disable (`None`) an indicator. Disabling also clears it.
    pub fn set(&mut self, indicator: Indicator, value: Option<bool>) {
        let enable = 1 << indicator.enable_bit();
        let flag = 1 << indicator.indicator_bit();
        self.0 &= !(enable | flag);
        if let Some(value) = value {
            self.0 |= enable;
            if value {
                self.0 |= flag;
            }
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, indicator: Indicator, value: Option<bool>) -> Self {
        self.set(indicator, value);
        self
    }

    /// The low byte owned by the container.
    pub const fn low_byte(self) -> u8 {
        self.0 as u8
    }

    /// Replace the low byte.
    pub fn set_low_byte(&mut self, value: u8) {
        self.0 = (self.0 & !0xFF) | value as u32;
    }

    /// Whether the enable/indicator pairs agree, ignoring the low byte.
    ///
    /// With `exact == false` a cleared enable compares equal regardless of its
    /// indicator bit.
    pub fn same_indicators(self, other: StateEventBits, exact: bool) -> bool {
        if exact {
            return (self.0 ^ other.0) & (ENABLE_MASK | INDICATOR_MASK) == 0;
        }
        Indicator::ALL.iter().all(|&i| self.get(i) == other.get(i))
    }

    /// Merge the enabled pairs of `incoming`, leaving the rest untouched.
    ///
    /// Returns the enable bits whose resolved value changed.
    pub fn merge_enabled(&mut self, incoming: StateEventBits) -> u32 {
        let mut changed = 0;
        for indicator in Indicator::ALL {
            let Some(value) = incoming.get(indicator) else { continue };
            if self.get(indicator) != Some(value) {
                changed |= 1 << indicator.enable_bit();
                self.set(indicator, Some(value));
            }
        }
        changed
    }
}

impl fmt::Display for StateEventBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for indicator in Indicator::ALL {
            if let Some(value) = self.get(indicator) {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{}={}", indicator.name(), value)?;
                first = false;
            }
        }
        if first {
            f.write_str("<none>")?;
        }
        Ok(())
    }
}
