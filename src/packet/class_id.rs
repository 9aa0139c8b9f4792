//! Class identifier value type.

use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 56-bit class identifier: 24-bit OUI, information class code, packet class code.
///
/// The 64-bit form is `0x00OOOOOO_IIII_PPPP`; the top byte must be zero.
///
/// ```rust
/// use vrtkit::ClassIdentifier;
///
/// let id = ClassIdentifier::from_bits(0xFFFFFA20110002).unwrap();
/// assert_eq!(id.to_string(), "FF-FF-FA:2011.0002");
/// assert_eq!("FF-FF-FA:2011.0002".parse::<ClassIdentifier>().unwrap(), id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassIdentifier {
    oui: u32,
    information_class: u16,
    packet_class: u16,
}

impl ClassIdentifier {
    /// Create a class identifier; `oui` must fit in 24 bits.
    pub fn new(oui: u32, information_class: u16, packet_class: u16) -> Result<Self> {
        if oui > 0x00FF_FFFF {
            return Err(VrtError::invalid_argument(
                "class identifier OUI",
                format!("{oui:#x} does not fit in 24 bits"),
            ));
        }
        Ok(Self { oui, information_class, packet_class })
    }

    /// Decode the 64-bit form; the top byte must be zero.
    pub fn from_bits(bits: u64) -> Result<Self> {
        if bits >> 56 != 0 {
            return Err(VrtError::invalid_argument(
                "class identifier",
                format!("{bits:#x} has a nonzero top byte"),
            ));
        }
        Ok(Self {
            oui: (bits >> 32) as u32,
            information_class: (bits >> 16) as u16,
            packet_class: bits as u16,
        })
    }

    /// The 64-bit form.
    pub fn bits(&self) -> u64 {
        ((self.oui as u64) << 32) | ((self.information_class as u64) << 16) | self.packet_class as u64
    }

    /// Organizationally unique identifier (24 bits).
    pub fn oui(&self) -> u32 {
        self.oui
    }

    /// Information class code.
    pub fn information_class(&self) -> u16 {
        self.information_class
    }

    /// Packet class code.
    pub fn packet_class(&self) -> u16 {
        self.packet_class
    }
}

impl fmt::Display for ClassIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}-{:02X}-{:02X}:{:04X}.{:04X}",
            (self.oui >> 16) & 0xFF,
            (self.oui >> 8) & 0xFF,
            self.oui & 0xFF,
            self.information_class,
            self.packet_class
        )
    }
}

impl FromStr for ClassIdentifier {
    type Err = VrtError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VrtError::invalid_argument("class identifier", format!("cannot parse {s:?}"));

        let (oui_text, codes) = s.split_once(':').ok_or_else(invalid)?;
        let (icc_text, pcc_text) = codes.split_once('.').ok_or_else(invalid)?;

        let mut oui = 0u32;
        let mut octets = 0;
        for part in oui_text.split('-') {
            if part.len() != 2 {
                return Err(invalid());
            }
            oui = (oui << 8) | u32::from_str_radix(part, 16).map_err(|_| invalid())?;
            octets += 1;
        }
        if octets != 3 || icc_text.len() != 4 || pcc_text.len() != 4 {
            return Err(invalid());
        }

        let icc = u16::from_str_radix(icc_text, 16).map_err(|_| invalid())?;
        let pcc = u16::from_str_radix(pcc_text, 16).map_err(|_| invalid())?;
        ClassIdentifier::new(oui, icc, pcc)
    }
}
