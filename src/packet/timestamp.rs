//! Timestamp value object.
//!
//! A VRT timestamp is two independent fields: an integer-seconds part whose
//! epoch is chosen by the TSI mode and a 64-bit fractional part whose unit is
//! chosen by the TSF mode. [`TimeStamp`] carries both modes so arithmetic can
//! carry correctly between the two parts.

use super::types::{TsfMode, TsiMode};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Picoseconds per second.
pub const ONE_SEC: u64 = 1_000_000_000_000;

/// GPS epoch (1980-01-06) as POSIX seconds.
pub const GPS_EPOCH_UTC: u32 = 315_964_800;

/// POSIX times at which a leap second was inserted since the GPS epoch.
const LEAP_SECONDS: [u32; 18] = [
    362_793_600,
    394_329_600,
    425_865_600,
    489_024_000,
    567_993_600,
    631_152_000,
    662_688_000,
    709_948_800,
    741_484_800,
    773_020_800,
    820_454_400,
    867_715_200,
    915_148_800,
    1_136_073_600,
    1_230_768_000,
    1_341_100_800,
    1_435_708_800,
    1_483_228_800,
];

/// Leap seconds elapsed between the GPS epoch and the POSIX time `utc`.
fn leap_seconds_at_utc(utc: u32) -> u32 {
    LEAP_SECONDS.iter().filter(|&&t| utc >= t).count() as u32
}

/// Leap seconds elapsed between the GPS epoch and the GPS time `gps`.
fn leap_seconds_at_gps(gps: u32) -> u32 {
    LEAP_SECONDS
        .iter()
        .enumerate()
        .filter(|(i, t)| gps as u64 >= (**t - GPS_EPOCH_UTC) as u64 + *i as u64 + 1)
        .count() as u32
}

/// A VRT timestamp: integer mode + seconds, fractional mode + value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStamp {
    tsi: TsiMode,
    tsf: TsfMode,
    seconds: u32,
    fractional: u64,
    sample_rate: Option<f64>,
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::NONE
    }
}

impl TimeStamp {
    /// A timestamp with neither field present.
    pub const NONE: TimeStamp = TimeStamp {
        tsi: TsiMode::None,
        tsf: TsfMode::None,
        seconds: 0,
        fractional: 0,
        sample_rate: None,
    };

    /// Build a timestamp from its modes and raw field values.
    ///
    /// Values for absent fields must be zero and real-time fractions must be
    /// below one second.
    pub fn new(tsi: TsiMode, tsf: TsfMode, seconds: u32, fractional: u64) -> Result<Self> {
        if tsi == TsiMode::None && seconds != 0 {
            return Err(VrtError::invalid_argument(
                "timestamp",
                "integer seconds given without an integer timestamp mode",
            ));
        }
        if tsf == TsfMode::None && fractional != 0 {
            return Err(VrtError::invalid_argument(
                "timestamp",
                "fractional value given without a fractional timestamp mode",
            ));
        }
        if tsf == TsfMode::RealTime && fractional >= ONE_SEC {
            return Err(VrtError::invalid_argument(
                "timestamp",
                format!("{fractional} ps is not below one second"),
            ));
        }
        Ok(Self { tsi, tsf, seconds, fractional, sample_rate: None })
    }

    /// Build a timestamp from decoded wire fields without range checks.
    pub(crate) fn from_fields(tsi: TsiMode, tsf: TsfMode, seconds: u32, fractional: u64) -> Self {
        Self { tsi, tsf, seconds, fractional, sample_rate: None }
    }

    /// UTC seconds plus real-time picoseconds.
    pub fn utc(seconds: u32, picoseconds: u64) -> Result<Self> {
        Self::new(TsiMode::Utc, TsfMode::RealTime, seconds, picoseconds)
    }

    /// GPS seconds plus real-time picoseconds.
    pub fn gps(seconds: u32, picoseconds: u64) -> Result<Self> {
        Self::new(TsiMode::Gps, TsfMode::RealTime, seconds, picoseconds)
    }

    /// Attach the sample rate used for sample-count arithmetic.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Integer timestamp mode.
    pub fn tsi(&self) -> TsiMode {
        self.tsi
    }

    /// Fractional timestamp mode.
    pub fn tsf(&self) -> TsfMode {
        self.tsf
    }

    /// Integer seconds, `None` when the integer field is absent.
    pub fn seconds(&self) -> Option<u32> {
        (self.tsi != TsiMode::None).then_some(self.seconds)
    }

    /// Fractional value, `None` when the fractional field is absent.
    pub fn fractional(&self) -> Option<u64> {
        (self.tsf != TsfMode::None).then_some(self.fractional)
    }

    /// Picoseconds within the second for real-time timestamps.
    pub fn picoseconds(&self) -> Option<u64> {
        (self.tsf == TsfMode::RealTime).then_some(self.fractional)
    }

    /// Sample rate attached for sample-count arithmetic.
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    /// Whether neither field is present.
    pub fn is_none(&self) -> bool {
        self.tsi == TsiMode::None && self.tsf == TsfMode::None
    }

    /// Fractional units per integer second, when the two parts carry.
    fn fractional_period(&self) -> Result<Option<u64>> {
        match self.tsf {
            TsfMode::RealTime => Ok(Some(ONE_SEC)),
            TsfMode::SampleCount if self.tsi != TsiMode::None => {
                let rate = self.sample_rate.ok_or_else(|| {
                    VrtError::unsupported("timestamp arithmetic", "sample-count timestamp has no sample rate")
                })?;
                Ok(Some(rate.round() as u64))
            }
            _ => Ok(None),
        }
    }

    /// Add a signed number of fractional units, carrying into the seconds.
    ///
    /// Without an integer part the fraction wraps and the carry is dropped.
    fn add_fractional_units(self, delta: i128) -> Result<Self> {
        let mut out = self;
        match self.fractional_period()? {
            Some(period) if period > 0 => {
                let total = self.seconds as i128 * period as i128 + self.fractional as i128 + delta;
                let seconds = total.div_euclid(period as i128);
                let fractional = total.rem_euclid(period as i128);
                out.seconds = if self.tsi == TsiMode::None {
                    0
                } else {
                    u32::try_from(seconds).map_err(|_| {
                        VrtError::invalid_argument("timestamp", "integer seconds out of range")
                    })?
                };
                out.fractional = fractional as u64;
            }
            _ => {
                let fractional = self.fractional as i128 + delta;
                out.fractional = u64::try_from(fractional).map_err(|_| {
                    VrtError::invalid_argument("timestamp", "fractional value out of range")
                })?;
            }
        }
        Ok(out)
    }

    /// Add whole seconds to the integer part.
    pub fn add_seconds(self, seconds: i64) -> Result<Self> {
        if self.tsi == TsiMode::None {
            return Err(VrtError::unsupported("add_seconds", "timestamp has no integer part"));
        }
        let total = self.seconds as i64 + seconds;
        let seconds = u32::try_from(total)
            .map_err(|_| VrtError::invalid_argument("timestamp", "integer seconds out of range"))?;
        Ok(Self { seconds, ..self })
    }

    /// Add a signed picosecond offset.
    ///
    /// Real-time timestamps carry into the seconds. Sample-count and
    /// free-running timestamps convert through the attached sample rate.
    /// Timestamps without a fractional part accept whole seconds only.
    pub fn add_picoseconds(self, picoseconds: i64) -> Result<Self> {
        match self.tsf {
            TsfMode::RealTime => self.add_fractional_units(picoseconds as i128),
            TsfMode::SampleCount | TsfMode::FreeRunning => {
                let rate = self.sample_rate.ok_or_else(|| {
                    VrtError::unsupported("add_picoseconds", "sample-count timestamp has no sample rate")
                })?;
                let samples = (picoseconds as f64 * rate / ONE_SEC as f64).round() as i128;
                self.add_fractional_units(samples)
            }
            TsfMode::None => {
                if picoseconds % ONE_SEC as i64 != 0 {
                    return Err(VrtError::unsupported(
                        "add_picoseconds",
                        "timestamp has no fractional part for sub-second offsets",
                    ));
                }
                self.add_seconds(picoseconds / ONE_SEC as i64)
            }
        }
    }

    /// The timestamp expected after `elapsed_samples` at `sample_rate`.
    pub fn next_expected(self, elapsed_samples: u64, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(VrtError::invalid_argument("sample rate", format!("{sample_rate} is not positive")));
        }
        match self.tsf {
            TsfMode::RealTime => {
                let picoseconds = (elapsed_samples as f64 * ONE_SEC as f64 / sample_rate).round();
                self.add_fractional_units(picoseconds as i128)
            }
            TsfMode::SampleCount | TsfMode::FreeRunning => {
                self.with_sample_rate(sample_rate).add_fractional_units(elapsed_samples as i128)
            }
            TsfMode::None => {
                let seconds = elapsed_samples as f64 / sample_rate;
                if seconds.fract() != 0.0 {
                    return Err(VrtError::unsupported(
                        "next_expected",
                        "timestamp has no fractional part for sub-second offsets",
                    ));
                }
                self.add_seconds(seconds as i64)
            }
        }
    }

    /// Signed picoseconds from `earlier` to `self` for comparable real-time stamps.
    pub fn picoseconds_since(&self, earlier: &TimeStamp) -> Option<i128> {
        if self.tsi != earlier.tsi || self.tsf != TsfMode::RealTime || earlier.tsf != TsfMode::RealTime {
            return None;
        }
        let seconds = self.seconds as i128 - earlier.seconds as i128;
        Some(seconds * ONE_SEC as i128 + self.fractional as i128 - earlier.fractional as i128)
    }

    /// Convert a UTC timestamp to GPS time; GPS timestamps are returned as is.
    pub fn to_gps(self) -> Result<Self> {
        match self.tsi {
            TsiMode::Gps => Ok(self),
            TsiMode::Utc => {
                if self.seconds < GPS_EPOCH_UTC {
                    return Err(VrtError::invalid_argument("timestamp", "UTC time precedes the GPS epoch"));
                }
                let seconds = self.seconds - GPS_EPOCH_UTC + leap_seconds_at_utc(self.seconds);
                Ok(Self { tsi: TsiMode::Gps, seconds, ..self })
            }
            _ => Err(VrtError::unsupported("to_gps", format!("{:?} integer timestamp", self.tsi))),
        }
    }

    /// Convert a GPS timestamp to UTC time; UTC timestamps are returned as is.
    pub fn to_utc(self) -> Result<Self> {
        match self.tsi {
            TsiMode::Utc => Ok(self),
            TsiMode::Gps => {
                let seconds = (self.seconds as u64 + GPS_EPOCH_UTC as u64)
                    .checked_sub(leap_seconds_at_gps(self.seconds) as u64)
                    .and_then(|s| u32::try_from(s).ok())
                    .ok_or_else(|| VrtError::invalid_argument("timestamp", "UTC seconds out of range"))?;
                Ok(Self { tsi: TsiMode::Utc, seconds, ..self })
            }
            _ => Err(VrtError::unsupported("to_utc", format!("{:?} integer timestamp", self.tsi))),
        }
    }
}

impl PartialOrd for TimeStamp {
    /// Timestamps order only within the same pair of modes.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.tsi != other.tsi || self.tsf != other.tsf {
            return None;
        }
        Some((self.seconds, self.fractional).cmp(&(other.seconds, other.fractional)))
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let epoch = match self.tsi {
            TsiMode::None => None,
            TsiMode::Utc => Some("UTC"),
            TsiMode::Gps => Some("GPS"),
            TsiMode::Other => Some("other"),
        };
        match (epoch, self.tsf) {
            (None, TsfMode::None) => f.write_str("<no timestamp>"),
            (Some(epoch), TsfMode::RealTime) => {
                write!(f, "{}.{:012} {}", self.seconds, self.fractional, epoch)
            }
            (Some(epoch), TsfMode::None) => write!(f, "{} {}", self.seconds, epoch),
            (Some(epoch), tsf) => write!(f, "{} {} + {} ({:?})", self.seconds, epoch, self.fractional, tsf),
            (None, tsf) => write!(f, "{} ({:?})", self.fractional, tsf),
        }
    }
}
