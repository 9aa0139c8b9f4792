//! ECEF / relative ephemeris record (52 bytes, 88 with the adjunct).

use super::{FixTime, Record, check_fixed, ensure_room, read_fixed, word, write_fixed};
use crate::codec::pack_u32;
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};

/// Encoded length without the adjunct.
pub const EPHEMERIS_LENGTH: usize = 52;
/// Length of the V49b adjunct (rotational velocity, translational and rotational acceleration).
pub const EPHEMERIS_ADJUNCT_LENGTH: usize = 36;

const ADJUNCT_FLAG: u32 = 1 << 31;
const POSITION_RADIX: u32 = 5;
const ANGLE_RADIX: u32 = 22;
const VELOCITY_RADIX: u32 = 16;

type Triple = [Option<f64>; 3];

/// Ephemeris: position (m), attitude (degrees), velocity (m/s), and the
/// optional adjunct of rotational velocity (degrees/s), translational
/// acceleration (m/s^2) and rotational acceleration (degrees/s^2).
///
/// The adjunct is written only under V49b and only when one of its values is
/// non-null.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ephemeris {
    pub manufacturer_oui: u32,
    pub time: FixTime,
    pub position: Triple,
    pub attitude: Triple,
    pub velocity: Triple,
    pub rotational_velocity: Triple,
    pub acceleration: Triple,
    pub rotational_acceleration: Triple,
}

impl Ephemeris {
    /// Whether any adjunct value is non-null.
    pub fn has_adjunct_values(&self) -> bool {
        [self.rotational_velocity, self.acceleration, self.rotational_acceleration]
            .iter()
            .flatten()
            .any(Option::is_some)
    }

    fn writes_adjunct(&self, config: &VrtConfig) -> bool {
        config.version.is_v49b() && self.has_adjunct_values()
    }

    /// Length of the ephemeris record stored at `offset`.
    pub fn stored_length(buf: &[u8], offset: usize, config: &VrtConfig) -> Result<usize> {
        let first = word(buf, offset)?;
        Ok(if config.version.is_v49b() && first & ADJUNCT_FLAG != 0 {
            EPHEMERIS_LENGTH + EPHEMERIS_ADJUNCT_LENGTH
        } else {
            EPHEMERIS_LENGTH
        })
    }

    fn validate(&self, config: &VrtConfig) -> Result<()> {
        if self.manufacturer_oui > 0x00FF_FFFF {
            return Err(VrtError::invalid_argument(
                "manufacturer OUI",
                format!("{:#x} does not fit in 24 bits", self.manufacturer_oui),
            ));
        }
        let any = (f64::MIN, f64::MAX);
        let angle = (-360.0, 360.0);
        for value in self.position {
            check_fixed("ephemeris position", value, POSITION_RADIX, any)?;
        }
        for value in self.attitude {
            check_fixed("ephemeris attitude", value, ANGLE_RADIX, angle)?;
        }
        for value in self.velocity {
            check_fixed("ephemeris velocity", value, VELOCITY_RADIX, any)?;
        }
        if self.writes_adjunct(config) {
            for value in self.rotational_velocity.iter().chain(&self.rotational_acceleration) {
                check_fixed("ephemeris rotation", *value, ANGLE_RADIX, any)?;
            }
            for value in self.acceleration {
                check_fixed("ephemeris acceleration", value, VELOCITY_RADIX, any)?;
            }
        }
        Ok(())
    }
}

fn read_triple(buf: &[u8], offset: usize, radix: u32) -> Result<Triple> {
    Ok([
        read_fixed(buf, offset, radix)?,
        read_fixed(buf, offset + 4, radix)?,
        read_fixed(buf, offset + 8, radix)?,
    ])
}

fn write_triple(buf: &mut [u8], offset: usize, values: &Triple, radix: u32) {
    for (i, value) in values.iter().enumerate() {
        write_fixed(buf, offset + 4 * i, *value, radix);
    }
}

impl Record for Ephemeris {
    fn byte_length(&self, config: &VrtConfig) -> usize {
        if self.writes_adjunct(config) { EPHEMERIS_LENGTH + EPHEMERIS_ADJUNCT_LENGTH } else { EPHEMERIS_LENGTH }
    }

    fn read_from(buf: &[u8], offset: usize, config: &VrtConfig) -> Result<Self> {
        let length = Self::stored_length(buf, offset, config)?;
        ensure_room(buf, offset, length)?;
        let mut ephemeris = Ephemeris {
            manufacturer_oui: word(buf, offset)? & 0x00FF_FFFF,
            time: FixTime::read(buf, offset)?,
            position: read_triple(buf, offset + 16, POSITION_RADIX)?,
            attitude: read_triple(buf, offset + 28, ANGLE_RADIX)?,
            velocity: read_triple(buf, offset + 40, VELOCITY_RADIX)?,
            ..Ephemeris::default()
        };
        if length > EPHEMERIS_LENGTH {
            ephemeris.rotational_velocity = read_triple(buf, offset + 52, ANGLE_RADIX)?;
            ephemeris.acceleration = read_triple(buf, offset + 64, VELOCITY_RADIX)?;
            ephemeris.rotational_acceleration = read_triple(buf, offset + 76, ANGLE_RADIX)?;
        }
        Ok(ephemeris)
    }

    fn write_to(&self, buf: &mut [u8], offset: usize, config: &VrtConfig) -> Result<()> {
        self.validate(config)?;
        let adjunct = self.writes_adjunct(config);
        ensure_room(buf, offset, self.byte_length(config))?;
        let flag = if adjunct { ADJUNCT_FLAG } else { 0 };
        pack_u32(buf, offset, flag | self.time.mode_bits() | self.manufacturer_oui);
        self.time.write_values(buf, offset + 4);
        write_triple(buf, offset + 16, &self.position, POSITION_RADIX);
        write_triple(buf, offset + 28, &self.attitude, ANGLE_RADIX);
        write_triple(buf, offset + 40, &self.velocity, VELOCITY_RADIX);
        if adjunct {
            write_triple(buf, offset + 52, &self.rotational_velocity, ANGLE_RADIX);
            write_triple(buf, offset + 64, &self.acceleration, VELOCITY_RADIX);
            write_triple(buf, offset + 76, &self.rotational_acceleration, ANGLE_RADIX);
        }
        Ok(())
    }
}

const FIELD_NAMES: [&str; 19] = [
    "ManufacturerIdentifier",
    "PositionX",
    "PositionY",
    "PositionZ",
    "AttitudeAlpha",
    "AttitudeBeta",
    "AttitudePhi",
    "VelocityX",
    "VelocityY",
    "VelocityZ",
    "RotationalVelocityAlpha",
    "RotationalVelocityBeta",
    "RotationalVelocityPhi",
    "AccelerationX",
    "AccelerationY",
    "AccelerationZ",
    "RotationalAccelerationAlpha",
    "RotationalAccelerationBeta",
    "RotationalAccelerationPhi",
];

impl Ephemeris {
    fn triples_mut(&mut self) -> [&mut Triple; 6] {
        [
            &mut self.position,
            &mut self.attitude,
            &mut self.velocity,
            &mut self.rotational_velocity,
            &mut self.acceleration,
            &mut self.rotational_acceleration,
        ]
    }

    fn triples(&self) -> [&Triple; 6] {
        [
            &self.position,
            &self.attitude,
            &self.velocity,
            &self.rotational_velocity,
            &self.acceleration,
            &self.rotational_acceleration,
        ]
    }
}

impl HasFields for Ephemeris {
    fn field_count(&self) -> usize {
        FIELD_NAMES.len()
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        FIELD_NAMES.get(index).copied()
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        match index {
            0 => Some(FieldType::UInt32),
            1..=18 => Some(FieldType::Float64),
            _ => None,
        }
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(self.manufacturer_oui.into_value()),
            1..=18 => self.triples()[(index - 1) / 3][(index - 1) % 3].map(FieldValue::into_value),
            _ => None,
        }
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        let name = self.field_name(index).ok_or_else(|| no_such_field(index, FIELD_NAMES.len()))?;
        if index == 0 {
            self.manufacturer_oui = expect_value::<u32>(name, value)?.unwrap_or(0);
        } else {
            let value = expect_value::<f64>(name, value)?;
            self.triples_mut()[(index - 1) / 3][(index - 1) % 3] = value;
        }
        Ok(())
    }
}
