//! GPS ASCII record: manufacturer OUI, word count, then NMEA sentences.

use super::{Record, ensure_room, word};
use crate::codec::{pack_ascii, pack_u32, unpack_ascii};
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};

/// Free-form GPS sentences (typically NMEA-0183), NUL padded to a word.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeoSentences {
    pub manufacturer_oui: u32,
    pub sentences: String,
}

impl GeoSentences {
    /// Length of the record stored at `offset` (8 + 4 * word count).
    pub fn stored_length(buf: &[u8], offset: usize) -> Result<usize> {
        Ok(8 + 4 * word(buf, offset + 4)? as usize)
    }

    fn text_words(&self) -> usize {
        self.sentences.len().div_ceil(4)
    }
}

impl Record for GeoSentences {
    fn byte_length(&self, _config: &VrtConfig) -> usize {
        8 + 4 * self.text_words()
    }

    fn read_from(buf: &[u8], offset: usize, _config: &VrtConfig) -> Result<Self> {
        let length = Self::stored_length(buf, offset)?;
        ensure_room(buf, offset, length)?;
        Ok(GeoSentences {
            manufacturer_oui: word(buf, offset)? & 0x00FF_FFFF,
            sentences: unpack_ascii(buf, offset + 8, length - 8).unwrap_or_default(),
        })
    }

    fn write_to(&self, buf: &mut [u8], offset: usize, config: &VrtConfig) -> Result<()> {
        if self.manufacturer_oui > 0x00FF_FFFF {
            return Err(VrtError::invalid_argument(
                "manufacturer OUI",
                format!("{:#x} does not fit in 24 bits", self.manufacturer_oui),
            ));
        }
        if !self.sentences.is_ascii() {
            return Err(VrtError::invalid_argument("GPS sentences", "text must be ASCII"));
        }
        if self.sentences.contains('\0') {
            return Err(VrtError::invalid_argument("GPS sentences", "text must not contain NUL"));
        }
        let length = self.byte_length(config);
        ensure_room(buf, offset, length)?;
        pack_u32(buf, offset, self.manufacturer_oui);
        pack_u32(buf, offset + 4, self.text_words() as u32);
        pack_ascii(buf, offset + 8, length - 8, &self.sentences);
        Ok(())
    }
}

impl HasFields for GeoSentences {
    fn field_count(&self) -> usize {
        2
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        ["ManufacturerIdentifier", "Sentences"].get(index).copied()
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        [FieldType::UInt32, FieldType::String].get(index).copied()
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(self.manufacturer_oui.into_value()),
            1 => Some(self.sentences.clone().into_value()),
            _ => None,
        }
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        match index {
            0 => self.manufacturer_oui = expect_value("ManufacturerIdentifier", value)?.unwrap_or(0),
            1 => self.sentences = expect_value("Sentences", value)?.unwrap_or_default(),
            _ => return Err(no_such_field(index, 2)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_whole_words() {
        let config = VrtConfig::default();
        let record = GeoSentences { manufacturer_oui: 0x000102, sentences: "$GPGGA,1*5A".to_string() };
        let bytes = record.to_bytes(&config).unwrap();
        assert_eq!(bytes.len(), 8 + 12);
        assert_eq!(bytes[19], 0);
        assert_eq!(GeoSentences::stored_length(&bytes, 0).unwrap(), 20);
        assert_eq!(GeoSentences::read_from(&bytes, 0, &config).unwrap(), record);
    }

    #[test]
    fn rejects_non_ascii() {
        let record = GeoSentences { manufacturer_oui: 0, sentences: "caf\u{e9}".to_string() };
        assert!(record.to_bytes(&VrtConfig::default()).is_err());
    }

    #[test]
    fn rejects_embedded_nul() {
        let record = GeoSentences { manufacturer_oui: 0, sentences: "$GP\0GGA".to_string() };
        assert!(matches!(record.to_bytes(&VrtConfig::default()), Err(VrtError::InvalidArgument { .. })));

        let mut context = crate::ContextPacket::default();
        assert!(context.set_gps_ascii(Some(record)).is_err());
        assert_eq!(context.gps_ascii(), None);
    }
}
