//! Formatted GPS / INS geolocation record (44 bytes).

use super::{FixTime, Record, check_fixed, ensure_room, read_fixed, word, write_fixed};
use crate::codec::pack_u32;
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};

/// Encoded length of a geolocation record.
pub const GEOLOCATION_LENGTH: usize = 44;

const ANGLE_RADIX: u32 = 22;
const ALTITUDE_RADIX: u32 = 5;
const SPEED_RADIX: u32 = 16;

/// Position fix: latitude/longitude in degrees, altitude in metres (WGS-84),
/// speed in m/s, angles in degrees. Every value is nullable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geolocation {
    /// 24-bit OUI of the GPS/INS manufacturer.
    pub manufacturer_oui: u32,
    pub time: FixTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub speed_over_ground: Option<f64>,
    pub heading_angle: Option<f64>,
    pub track_angle: Option<f64>,
    pub magnetic_variation: Option<f64>,
}

impl Geolocation {
    fn validate(&self) -> Result<()> {
        if self.manufacturer_oui > 0x00FF_FFFF {
            return Err(VrtError::invalid_argument(
                "manufacturer OUI",
                format!("{:#x} does not fit in 24 bits", self.manufacturer_oui),
            ));
        }
        check_fixed("latitude", self.latitude, ANGLE_RADIX, (-90.0, 90.0))?;
        check_fixed("longitude", self.longitude, ANGLE_RADIX, (-180.0, 180.0))?;
        check_fixed("altitude", self.altitude, ALTITUDE_RADIX, (f64::MIN, f64::MAX))?;
        check_fixed("speed over ground", self.speed_over_ground, SPEED_RADIX, (0.0, f64::MAX))?;
        check_fixed("heading angle", self.heading_angle, ANGLE_RADIX, (0.0, 360.0))?;
        check_fixed("track angle", self.track_angle, ANGLE_RADIX, (0.0, 360.0))?;
        check_fixed("magnetic variation", self.magnetic_variation, ANGLE_RADIX, (-180.0, 180.0))
    }
}

impl Record for Geolocation {
    fn byte_length(&self, _config: &VrtConfig) -> usize {
        GEOLOCATION_LENGTH
    }

    fn read_from(buf: &[u8], offset: usize, _config: &VrtConfig) -> Result<Self> {
        ensure_room(buf, offset, GEOLOCATION_LENGTH)?;
        Ok(Geolocation {
            manufacturer_oui: word(buf, offset)? & 0x00FF_FFFF,
            time: FixTime::read(buf, offset)?,
            latitude: read_fixed(buf, offset + 16, ANGLE_RADIX)?,
            longitude: read_fixed(buf, offset + 20, ANGLE_RADIX)?,
            altitude: read_fixed(buf, offset + 24, ALTITUDE_RADIX)?,
            speed_over_ground: read_fixed(buf, offset + 28, SPEED_RADIX)?,
            heading_angle: read_fixed(buf, offset + 32, ANGLE_RADIX)?,
            track_angle: read_fixed(buf, offset + 36, ANGLE_RADIX)?,
            magnetic_variation: read_fixed(buf, offset + 40, ANGLE_RADIX)?,
        })
    }

    fn write_to(&self, buf: &mut [u8], offset: usize, _config: &VrtConfig) -> Result<()> {
        self.validate()?;
        ensure_room(buf, offset, GEOLOCATION_LENGTH)?;
        pack_u32(buf, offset, self.time.mode_bits() | self.manufacturer_oui);
        self.time.write_values(buf, offset + 4);
        write_fixed(buf, offset + 16, self.latitude, ANGLE_RADIX);
        write_fixed(buf, offset + 20, self.longitude, ANGLE_RADIX);
        write_fixed(buf, offset + 24, self.altitude, ALTITUDE_RADIX);
        write_fixed(buf, offset + 28, self.speed_over_ground, SPEED_RADIX);
        write_fixed(buf, offset + 32, self.heading_angle, ANGLE_RADIX);
        write_fixed(buf, offset + 36, self.track_angle, ANGLE_RADIX);
        write_fixed(buf, offset + 40, self.magnetic_variation, ANGLE_RADIX);
        Ok(())
    }
}

const FIELD_NAMES: [&str; 8] = [
    "ManufacturerIdentifier",
    "Latitude",
    "Longitude",
    "Altitude",
    "SpeedOverGround",
    "HeadingAngle",
    "TrackAngle",
    "MagneticVariation",
];

impl Geolocation {
    fn value_slot(&mut self, index: usize) -> Option<&mut Option<f64>> {
        Some(match index {
            1 => &mut self.latitude,
            2 => &mut self.longitude,
            3 => &mut self.altitude,
            4 => &mut self.speed_over_ground,
            5 => &mut self.heading_angle,
            6 => &mut self.track_angle,
            7 => &mut self.magnetic_variation,
            _ => return None,
        })
    }
}

impl HasFields for Geolocation {
    fn field_count(&self) -> usize {
        FIELD_NAMES.len()
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        FIELD_NAMES.get(index).copied()
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        match index {
            0 => Some(FieldType::UInt32),
            1..=7 => Some(FieldType::Float64),
            _ => None,
        }
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        if index == 0 {
            return Some(self.manufacturer_oui.into_value());
        }
        let mut copy = *self;
        copy.value_slot(index).and_then(|slot| *slot).map(FieldValue::into_value)
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        let name = self.field_name(index).ok_or_else(|| no_such_field(index, FIELD_NAMES.len()))?;
        if index == 0 {
            self.manufacturer_oui = expect_value::<u32>(name, value)?.unwrap_or(0);
            return Ok(());
        }
        let value = expect_value::<f64>(name, value)?;
        if let Some(slot) = self.value_slot(index) {
            *slot = value;
        }
        Ok(())
    }
}
