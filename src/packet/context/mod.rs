//! Context packets: the CIF words and the fields they announce.
//!
//! A [`ContextPacket`] is a typed view over a [`VrtPacket`] of a context
//! type. Nothing is parsed up front: every accessor resolves its field's
//! offset from the current CIF words, so fields can be added and removed in
//! place without invalidating anything.
//!
//! ```rust
//! use vrtkit::{ContextPacket, FieldId};
//!
//! let mut context = ContextPacket::default();
//! context.set_bandwidth(Some(1.0e6)).unwrap();
//! assert_eq!(context.bandwidth(), Some(1.0e6));
//! assert!(context.field_offset(FieldId::BANDWIDTH).unwrap().is_present());
//!
//! context.set_bandwidth(None).unwrap();
//! assert_eq!(context.packet_length(), 12);
//! ```

mod cif;
mod encoding;
mod named;

pub use cif::{Attribute, CIF7_CURRENT_VALUE, CifPlane, FieldId, FieldOffset};

use self::cif::{Resolver, stored_length};
use self::encoding::FieldCodec;
use super::core::HEADER_FIELDS;
use crate::codec::pack_u32;
use crate::config::VrtConfig;
use crate::fields::{FieldType, HasFields, Value, expect_value, no_such_field};
use crate::packet::{Indicator, PacketType, TimeStamp, VrtPacket};
use crate::{Result, VrtError};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// CIF0 bit 31: some field differs from the previous context packet.
const CHANGE_INDICATOR: u32 = 1 << 31;

/// A context or extension context packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPacket<'a> {
    packet: VrtPacket<'a>,
}

impl Default for ContextPacket<'static> {
    fn default() -> Self {
        Self::new(VrtConfig::default())
    }
}

impl ContextPacket<'static> {
    /// An empty context packet: header, zero stream identifier and CIF0.
    pub fn new(config: VrtConfig) -> Self {
        ContextPacket { packet: VrtPacket::blank(PacketType::Context, config) }
    }
}

impl<'a> Deref for ContextPacket<'a> {
    type Target = VrtPacket<'a>;

    fn deref(&self) -> &Self::Target {
        &self.packet
    }
}

impl DerefMut for ContextPacket<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.packet
    }
}

impl<'a> TryFrom<VrtPacket<'a>> for ContextPacket<'a> {
    type Error = VrtError;

    fn try_from(packet: VrtPacket<'a>) -> Result<Self> {
        Self::from_packet(packet)
    }
}

impl<'a> ContextPacket<'a> {
    /// Wrap a generic packet, which must be of a context type.
    pub fn from_packet(packet: VrtPacket<'a>) -> Result<Self> {
        Self::try_wrap(packet).map_err(|packet| VrtError::WrongPacketType {
            expected: "Context or ExtContext".to_string(),
            found: packet.packet_type().to_string(),
        })
    }

    /// Wrap a generic packet of a context type, handing any other packet back.
    pub fn try_wrap(packet: VrtPacket<'a>) -> std::result::Result<Self, VrtPacket<'a>> {
        if !packet.packet_type().is_context() {
            return Err(packet);
        }
        Ok(ContextPacket { packet })
    }

    /// Borrow `bytes` as a read-only context packet.
    pub fn view(bytes: &'a [u8], config: VrtConfig) -> Result<Self> {
        Self::from_packet(VrtPacket::view(bytes, config)?)
    }

    /// The underlying generic packet.
    pub fn into_packet(self) -> VrtPacket<'a> {
        self.packet
    }

    /// Convert into an owned packet, copying only when borrowed.
    pub fn into_owned(self) -> ContextPacket<'static> {
        ContextPacket { packet: self.packet.into_owned() }
    }

    /// Change between the context types; other types are rejected.
    pub fn set_packet_type(&mut self, packet_type: PacketType) -> Result<()> {
        if !packet_type.is_context() {
            return Err(VrtError::WrongPacketType {
                expected: "Context or ExtContext".to_string(),
                found: packet_type.to_string(),
            });
        }
        self.packet.set_packet_type(packet_type)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.packet)
    }

    /// CIF0, always present.
    pub fn cif0(&self) -> u32 {
        self.resolver().words().cif0
    }

    pub fn cif1(&self) -> Option<u32> {
        self.resolver().words().cif1
    }

    pub fn cif2(&self) -> Option<u32> {
        self.resolver().words().cif2
    }

    pub fn cif3(&self) -> Option<u32> {
        self.resolver().words().cif3
    }

    /// The attribute word; `None` when only current values are stored.
    pub fn cif7(&self) -> Option<u32> {
        self.resolver().words().cif7
    }

    /// The word of `plane`, when present.
    pub fn cif_word(&self, plane: CifPlane) -> Option<u32> {
        self.resolver().words().get(plane)
    }

    /// Offset of `field` relative to the end of the header, or where it
    /// would be inserted.
    ///
    /// Fails only when a variable-length field stored before it cannot be
    /// measured.
    pub fn field_offset(&self, field: FieldId) -> Result<FieldOffset> {
        self.resolver().offset(field)
    }

    /// Whether the bit announcing `field` is set.
    pub fn has_field(&self, field: FieldId) -> bool {
        self.cif_word(field.plane()).is_some_and(|word| word & field.mask() != 0)
    }

    /// Every present field in storage order.
    pub fn present_fields(&self) -> Vec<FieldId> {
        let words = self.resolver().words();
        FieldId::ALL
            .iter()
            .copied()
            .filter(|field| words.get(field.plane()).is_some_and(|word| word & field.mask() != 0))
            .collect()
    }

    /// Offset just past the last field, relative to the end of the header.
    pub fn fields_end(&self) -> Result<usize> {
        self.resolver().fields_end()
    }

    /// Stored bytes of the current value of `field`.
    pub fn field_bytes(&self, field: FieldId) -> Option<&[u8]> {
        self.attribute_bytes(field, Attribute::CurrentValue)
    }

    /// Stored bytes of one attribute instance of `field`.
    pub fn attribute_bytes(&self, field: FieldId, attribute: Attribute) -> Option<&[u8]> {
        let resolver = self.resolver();
        let FieldOffset::Present(offset) = resolver.offset(field).ok()? else {
            return None;
        };
        let length = resolver.instance_length(field, offset).ok()?;
        let start = resolver.base() + offset + resolver.attribute_offset(attribute, length)?;
        let width = if attribute.is_one_word() { 4 } else { length };
        self.packet.as_bytes().get(start..start + width)
    }

    pub(crate) fn read_field<C: FieldCodec>(&self, field: FieldId) -> Option<C::Value> {
        C::decode(self.field_bytes(field)?, &self.packet.config())
    }

    pub(crate) fn write_field<C: FieldCodec>(&mut self, field: FieldId, value: Option<&C::Value>) -> Result<()> {
        let config = self.packet.config();
        let bytes = value.map(|value| C::encode(value, &config)).transpose()?;
        self.set_field_bytes(field, bytes.as_deref())
    }

    fn check_field_bytes(&self, field: FieldId, bytes: &[u8]) -> Result<()> {
        let declared = match field.fixed_length() {
            Some(length) => length,
            None => stored_length(field.plane(), field.bit(), bytes, 0, &self.packet.config())?,
        };
        if declared != bytes.len() {
            return Err(VrtError::invalid_argument(
                field.name(),
                format!("{} bytes given but the field stores {declared}", bytes.len()),
            ));
        }
        Ok(())
    }

    /// Set the raw current value of `field`; `None` removes the field with
    /// every attribute instance.
    ///
    /// Inserting into an absent plane enables that plane first.
    pub fn set_field_bytes(&mut self, field: FieldId, bytes: Option<&[u8]>) -> Result<()> {
        const OP: &str = "set_field";
        self.packet.buffer_mut(OP)?;
        let resolver = self.resolver();
        let words = resolver.words();
        let base = resolver.base();
        let end = resolver.fields_end()?;
        let available = self.packet.as_bytes().len().saturating_sub(base);
        if end > available {
            return Err(VrtError::invalid_packet(format!(
                "fields take {end} bytes after the header but the packet holds {available}"
            )));
        }
        let current = resolver.offset(field)?;
        let stored = match current {
            FieldOffset::Present(offset) => Some(resolver.instance_length(field, offset)?),
            FieldOffset::Absent(_) => None,
        };
        let (same, one_word) = resolver.attributes();
        let footprint = move |length: usize| same * length + 4 * one_word;

        let Some(bytes) = bytes else {
            let Some(length) = stored else {
                return Ok(());
            };
            let span = footprint(length);
            self.packet.splice_at(OP, base + current.offset(), span, false)?;
            self.update_cif(field.plane(), |word| word & !field.mask())?;
            debug!(field = field.name(), bytes = span, "Removed context field");
            return Ok(());
        };

        self.check_field_bytes(field, bytes)?;
        if words.cif7.is_some_and(|cif7| cif7 & CIF7_CURRENT_VALUE == 0) {
            return Err(VrtError::unsupported(OP, "CIF7 does not announce current values"));
        }

        let offset = match stored {
            Some(length) if length == bytes.len() => current.offset(),
            Some(length) => {
                if words.cif7.is_some() {
                    return Err(VrtError::unsupported(
                        OP,
                        format!("{} cannot change length while CIF7 attributes are stored", field.name()),
                    ));
                }
                let offset = current.offset();
                if bytes.len() > length {
                    self.packet.check_growth((bytes.len() - length) as isize)?;
                    self.packet.splice_at(OP, base + offset + length, bytes.len() - length, true)?;
                } else {
                    self.packet.splice_at(OP, base + offset + bytes.len(), length - bytes.len(), false)?;
                }
                offset
            }
            None => {
                let span = footprint(bytes.len());
                let add_plane = words.get(field.plane()).is_none();
                self.packet.check_growth((span + 4 * add_plane as usize) as isize)?;
                if add_plane {
                    self.add_cif(field.plane(), true)?;
                }
                let offset = self.resolver().offset(field)?.offset();
                self.packet.splice_at(OP, base + offset, span, true)?;
                self.update_cif(field.plane(), |word| word | field.mask())?;
                debug!(field = field.name(), bytes = span, "Inserted context field");
                offset
            }
        };
        let buf = self.packet.buffer_mut(OP)?;
        buf[base + offset..base + offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Rewrite the word of `plane`, which must be present.
    fn update_cif(&mut self, plane: CifPlane, f: impl FnOnce(u32) -> u32) -> Result<()> {
        let resolver = self.resolver();
        let words = resolver.words();
        let at = resolver.base() + words.word_offset(plane);
        let word = words
            .get(plane)
            .ok_or_else(|| VrtError::invalid_packet(format!("{plane} is not present")))?;
        let buf = self.packet.buffer_mut("update_cif")?;
        pack_u32(buf, at, f(word));
        Ok(())
    }

    /// Add or remove the word of `plane`.
    ///
    /// Removing a field plane removes its fields too. CIF7 can only be
    /// removed while it announces nothing but current values, or while no
    /// fields are present. Adding or removing a word that is already in the
    /// requested state does nothing.
    pub fn add_cif(&mut self, plane: CifPlane, present: bool) -> Result<()> {
        const OP: &str = "add_cif";
        let Some(enable_bit) = plane.enable_bit() else {
            return Err(VrtError::invalid_argument("plane", "CIF0 is always present"));
        };
        self.packet.buffer_mut(OP)?;
        let resolver = self.resolver();
        let words = resolver.words();
        let base = resolver.base();
        if words.get(plane).is_some() == present {
            return Ok(());
        }
        let word_at = base + words.word_offset(plane);

        if present {
            self.packet.check_growth(4)?;
            self.packet.splice_at(OP, word_at, 4, true)?;
            if plane == CifPlane::Cif7 {
                let buf = self.packet.buffer_mut(OP)?;
                pack_u32(buf, word_at, CIF7_CURRENT_VALUE);
            }
            self.update_cif(CifPlane::Cif0, |cif0| cif0 | (1 << enable_bit))?;
        } else {
            if plane == CifPlane::Cif7 {
                if words.cif7 != Some(CIF7_CURRENT_VALUE) && words.has_fields() {
                    return Err(VrtError::unsupported(
                        OP,
                        "CIF7 attributes can only be dropped while no fields are present",
                    ));
                }
            } else {
                let (start, span) = resolver.plane_extent(plane)?;
                if span > 0 {
                    self.packet.splice_at(OP, base + start, span, false)?;
                }
            }
            self.packet.splice_at(OP, word_at, 4, false)?;
            self.update_cif(CifPlane::Cif0, |cif0| cif0 & !(1 << enable_bit))?;
        }
        debug!(%plane, present, "Changed CIF word");
        Ok(())
    }

    pub fn add_cif1(&mut self, present: bool) -> Result<()> {
        self.add_cif(CifPlane::Cif1, present)
    }

    pub fn add_cif2(&mut self, present: bool) -> Result<()> {
        self.add_cif(CifPlane::Cif2, present)
    }

    pub fn add_cif3(&mut self, present: bool) -> Result<()> {
        self.add_cif(CifPlane::Cif3, present)
    }

    /// Add CIF7 announcing current values only, or remove it.
    pub fn add_cif7(&mut self, present: bool) -> Result<()> {
        self.add_cif(CifPlane::Cif7, present)
    }

    /// Replace the CIF7 attribute word, adding CIF7 when absent.
    ///
    /// Attributes change every field's footprint, so this is only allowed
    /// while no fields are present.
    pub fn set_cif7(&mut self, word: u32) -> Result<()> {
        let reserved = word & CifPlane::Cif7.reserved_mask();
        if reserved != 0 {
            return Err(VrtError::invalid_argument("CIF7", format!("reserved bits {reserved:#010x} set")));
        }
        let words = self.resolver().words();
        if words.cif7 == Some(word) {
            return Ok(());
        }
        if words.has_fields() {
            return Err(VrtError::unsupported("set_cif7", "attributes can only change while no fields are present"));
        }
        self.add_cif7(true)?;
        self.update_cif(CifPlane::Cif7, |_| word)
    }

    /// Whether the sender flagged a change since its previous context packet.
    pub fn change_indicator(&self) -> bool {
        self.cif0() & CHANGE_INDICATOR != 0
    }

    pub fn set_change_indicator(&mut self, changed: bool) -> Result<()> {
        self.update_cif(CifPlane::Cif0, |cif0| {
            if changed { cif0 | CHANGE_INDICATOR } else { cif0 & !CHANGE_INDICATOR }
        })
    }

    /// One state/event indicator; `None` when the field or its enable bit
    /// is absent.
    pub fn indicator(&self, indicator: Indicator) -> Option<bool> {
        self.state_event_indicators()?.get(indicator)
    }

    /// Set one state/event indicator, adding the field when needed.
    pub fn set_indicator(&mut self, indicator: Indicator, value: Option<bool>) -> Result<()> {
        let current = self.state_event_indicators();
        if value.is_none() && current.is_none() {
            return Ok(());
        }
        let mut bits = current.unwrap_or_default();
        bits.set(indicator, value);
        self.set_state_event_indicators(Some(bits))
    }

    /// Prepare a copy of this packet for resending at `timestamp`.
    ///
    /// Clears the change indicator, drops the over-range count, and drops
    /// the over-range and sample-loss indicators, none of which describe the
    /// resent interval.
    pub fn reset_for_resend(&mut self, timestamp: TimeStamp) -> Result<()> {
        self.packet.buffer_mut("reset_for_resend")?;
        self.packet.set_timestamp(timestamp)?;
        self.set_change_indicator(false)?;
        self.set_over_range_count(None)?;
        if let Some(mut bits) = self.state_event_indicators() {
            bits.set(Indicator::OverRange, None);
            bits.set(Indicator::SampleLoss, None);
            self.set_state_event_indicators(Some(bits))?;
        }
        Ok(())
    }

    /// This packet's timestamp plus its timestamp adjustment.
    ///
    /// The adjustment is applied to the context packet's own timestamp.
    /// VITA-49 defines it against the paired data packets, so callers
    /// pairing streams should apply [`timestamp_adjustment`](Self::timestamp_adjustment)
    /// to the data timestamps themselves.
    pub fn adjusted_timestamp(&self) -> Option<TimeStamp> {
        let timestamp = self.packet.timestamp();
        if timestamp.is_none() {
            return None;
        }
        match self.timestamp_adjustment() {
            Some(adjustment) => timestamp.add_picoseconds(adjustment).ok(),
            None => Some(timestamp),
        }
    }

    /// Check the packet structure and the field layout.
    ///
    /// Extends [`VrtPacket::check_valid`] with the reserved bits of each CIF
    /// word and the field footprint, which must fit the packet (exactly, in
    /// strict mode).
    pub fn check_valid(&self, strict: bool, expected_length: Option<usize>) -> Result<()> {
        let packet_type = self.packet.packet_type();
        if !packet_type.is_context() {
            return Err(VrtError::invalid_packet(format!("{packet_type} is not a context type")));
        }
        self.packet.check_valid(strict, expected_length)?;

        let resolver = self.resolver();
        let words = resolver.words();
        for plane in [CifPlane::Cif0, CifPlane::Cif1, CifPlane::Cif2, CifPlane::Cif3, CifPlane::Cif7] {
            if let Some(reserved) = words.get(plane).map(|word| word & plane.reserved_mask()).filter(|r| *r != 0) {
                return Err(VrtError::invalid_packet(format!("{plane} reserved bits {reserved:#010x} set")));
            }
        }

        let end = resolver
            .fields_end()
            .map_err(|e| VrtError::invalid_packet(format!("field layout cannot be measured: {e}")))?;
        let available = self.packet.packet_length().saturating_sub(resolver.base());
        if end > available || (strict && end != available) {
            return Err(VrtError::invalid_packet(format!(
                "fields take {end} bytes after the header but the packet holds {available}"
            )));
        }
        Ok(())
    }

    /// Whether [`check_valid`](Self::check_valid) passes under the configured strictness.
    pub fn is_valid(&self) -> bool {
        self.check_valid(self.packet.config().strict, None).is_ok()
    }
}

/// Reflected fields: the header fields, the change indicator, then every
/// named context field in storage order.
impl HasFields for ContextPacket<'_> {
    fn field_count(&self) -> usize {
        HEADER_FIELDS.len() + 1 + FieldId::ALL.len()
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.field_name(index),
            Some(0) => Some("ChangeIndicator"),
            Some(i) => FieldId::ALL.get(i - 1).map(|field| field.name()),
        }
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.field_type(index),
            Some(0) => Some(FieldType::Bool),
            Some(i) => FieldId::ALL.get(i - 1).and_then(|field| field.value_type()),
        }
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.get_field(index),
            Some(0) => Some(Value::Bool(self.change_indicator())),
            Some(i) => FieldId::ALL.get(i - 1).and_then(|field| self.field_value(*field)),
        }
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.set_field(index, value),
            Some(0) => self.set_change_indicator(expect_value("ChangeIndicator", value)?.unwrap_or(false)),
            Some(i) => {
                let field = FieldId::ALL.get(i - 1).ok_or_else(|| no_such_field(index, self.field_count()))?;
                self.set_field_value(*field, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolVersion;
    use crate::packet::{ONE_SEC, StateEventBits};
    use crate::record::{ContextAssocLists, Ephemeris, GeoSentences, Geolocation};
    use proptest::prelude::*;

    fn lengths_agree(packet: &ContextPacket<'_>) -> bool {
        packet.packet_length() == packet.prologue_length() + packet.payload_length() + packet.trailer_length()
    }

    #[test]
    fn bandwidth_round_trip() {
        let mut context = ContextPacket::default();
        context.set_bandwidth(Some(1.0e6)).unwrap();
        let value = context.bandwidth().unwrap();
        assert!((value - 1.0e6).abs() <= 1.0e6 * 2f64.powi(-44));
        assert_eq!(context.field_offset(FieldId::BANDWIDTH).unwrap(), FieldOffset::Present(4));
        assert!(context.check_valid(true, None).is_ok());

        assert!(context.set_bandwidth(Some(-1.0)).is_err());
        assert!(context.bandwidth().is_some());
    }

    #[test]
    fn fields_keep_storage_order() {
        let mut context = ContextPacket::default();
        context.set_sample_rate(Some(2.5e6)).unwrap();
        context.set_reference_point_identifier(Some(42)).unwrap();
        context.set_temperature(Some(21.5)).unwrap();

        assert_eq!(context.field_offset(FieldId::REFERENCE_POINT_ID).unwrap(), FieldOffset::Present(4));
        assert_eq!(context.field_offset(FieldId::SAMPLE_RATE).unwrap(), FieldOffset::Present(8));
        assert_eq!(context.field_offset(FieldId::TEMPERATURE).unwrap(), FieldOffset::Present(16));
        assert_eq!(context.field_offset(FieldId::GAIN).unwrap(), FieldOffset::Absent(8));
        assert_eq!(context.field_offset(FieldId::GAIN).unwrap().as_signed(), -8);
        assert_eq!(context.present_fields(), vec![FieldId::REFERENCE_POINT_ID, FieldId::SAMPLE_RATE, FieldId::TEMPERATURE]);
        assert_eq!(context.reference_point_identifier(), Some(42));
        assert_eq!(context.temperature(), Some(21.5));
    }

    #[test]
    fn corrupt_record_lengths_fail_setters() {
        let mut context = ContextPacket::default();
        context
            .set_gps_ascii(Some(GeoSentences { manufacturer_oui: 0x12_3456, sentences: "$GPGGA".to_string() }))
            .unwrap();
        context.set_phase_offset(Some(0.5)).unwrap();
        let FieldOffset::Present(at) = context.field_offset(FieldId::GPS_ASCII).unwrap() else {
            panic!("GPS ASCII should be present");
        };
        let mut bytes = context.into_packet().into_bytes();
        let count_at = 8 + at + 4;
        bytes[count_at..count_at + 4].copy_from_slice(&100u32.to_be_bytes());

        let mut corrupt = ContextPacket::from_packet(VrtPacket::from_vec(bytes.clone(), VrtConfig::default()).unwrap())
            .unwrap();
        assert!(!corrupt.is_valid());
        assert!(corrupt.set_phase_offset(Some(0.25)).unwrap_err().is_structural());
        assert!(corrupt.set_phase_offset(None).is_err());
        assert!(corrupt.set_bandwidth(Some(1.0e6)).is_err());
        assert_eq!(corrupt.as_bytes(), &bytes[..]);
    }

    #[test]
    fn add_cif_is_idempotent() {
        let mut context = ContextPacket::default();
        context.add_cif1(true).unwrap();
        let once = context.as_bytes().to_vec();
        context.add_cif1(true).unwrap();
        assert_eq!(context.as_bytes(), &once[..]);
        assert_eq!(context.cif1(), Some(0));
        assert_eq!(context.cif0() & 0b10, 0b10);

        context.add_cif1(false).unwrap();
        context.add_cif1(false).unwrap();
        assert_eq!(context.cif1(), None);
        assert_eq!(context.packet_length(), 12);
    }

    #[test]
    fn higher_plane_fields_enable_their_word() {
        let mut context = ContextPacket::default();
        context.set_bandwidth(Some(5.0e6)).unwrap();
        context.set_network_id(Some(9)).unwrap();
        assert_eq!(context.cif3(), Some(FieldId::NETWORK_ID.mask()));
        assert_eq!(context.field_offset(FieldId::NETWORK_ID).unwrap(), FieldOffset::Present(8 + 8));

        context.set_phase_offset(Some(0.5)).unwrap();
        assert_eq!(context.cif1(), Some(FieldId::PHASE_OFFSET.mask()));
        assert_eq!(context.field_offset(FieldId::PHASE_OFFSET).unwrap(), FieldOffset::Present(12 + 8));
        assert_eq!(context.field_offset(FieldId::NETWORK_ID).unwrap(), FieldOffset::Present(12 + 8 + 4));
        assert_eq!(context.network_id(), Some(9));
        assert_eq!(context.phase_offset(), Some(0.5));

        context.add_cif1(false).unwrap();
        assert_eq!(context.phase_offset(), None);
        assert_eq!(context.network_id(), Some(9));
        assert_eq!(context.bandwidth(), Some(5.0e6));
        assert!(context.check_valid(true, None).is_ok());
    }

    #[test]
    fn insert_then_remove_restores_bytes() {
        let mut context = ContextPacket::default();
        context.set_rf_reference_frequency(Some(100.0e6)).unwrap();
        context.set_over_range_count(Some(3)).unwrap();
        let before = context.as_bytes().to_vec();

        context.set_gain(Some([10.0, -2.5])).unwrap();
        assert_eq!(context.gain(), Some([10.0, -2.5]));
        context.set_gain(None).unwrap();
        assert_eq!(context.as_bytes(), &before[..]);
    }

    #[test]
    fn variable_fields_resize_in_place() {
        let mut context = ContextPacket::default();
        context.set_ephemeris_reference_identifier(Some(77)).unwrap();
        context.set_temperature(Some(40.0)).unwrap();
        let short = GeoSentences { manufacturer_oui: 0x12_3456, sentences: "$GPGGA,1".to_string() };
        context.set_gps_ascii(Some(short.clone())).unwrap();
        assert_eq!(context.gps_ascii(), Some(short));
        assert_eq!(context.field_bytes(FieldId::GPS_ASCII).map(<[u8]>::len), Some(16));

        let long = GeoSentences { manufacturer_oui: 1, sentences: "$GPGGA,123519,4807.038,N*47".to_string() };
        context.set_gps_ascii(Some(long.clone())).unwrap();
        assert_eq!(context.gps_ascii(), Some(long));

        let lists = ContextAssocLists { source: vec![1, 2, 3], ..Default::default() };
        context.set_context_association_lists(Some(lists.clone())).unwrap();
        assert_eq!(context.context_association_lists(), Some(lists));
        assert_eq!(context.ephemeris_reference_identifier(), Some(77));
        assert_eq!(context.temperature(), Some(40.0));
        assert!(context.check_valid(true, None).is_ok());
    }

    #[test]
    fn records_round_trip_through_fields() {
        let mut context = ContextPacket::new(VrtConfig::v49b());
        let fix = Geolocation { latitude: Some(45.5), longitude: Some(-122.25), ..Default::default() };
        context.set_formatted_gps(Some(fix)).unwrap();
        assert_eq!(context.formatted_gps(), Some(fix));
        assert_eq!(context.field_bytes(FieldId::FORMATTED_GPS).map(<[u8]>::len), Some(44));

        let ephemeris = Ephemeris { position: [Some(1000.0), Some(-20.5), None], ..Default::default() };
        context.set_ecef_ephemeris(Some(ephemeris)).unwrap();
        assert_eq!(context.ecef_ephemeris(), Some(ephemeris));
        assert_eq!(context.formatted_gps(), Some(fix));
    }

    #[test]
    fn cif1_structures_check_their_size_word() {
        let mut context = ContextPacket::default();
        let mut structure = vec![0u8; 12];
        structure[3] = 3;
        context.set_index_list(Some(structure.clone())).unwrap();
        assert_eq!(context.index_list(), Some(structure));
        context.set_buffer_size(Some(4096)).unwrap();
        assert_eq!(context.field_offset(FieldId::BUFFER_SIZE).unwrap(), FieldOffset::Present(8 + 12));

        assert!(context.set_field_bytes(FieldId::ARRAY_OF_CIFS, Some(&[0, 0, 0, 2])).is_err());
        assert!(context.set_field_bytes(FieldId::BANDWIDTH, Some(&[0; 4])).is_err());
    }

    #[test]
    fn cif7_attributes_multiply_footprints() {
        let mut context = ContextPacket::default();
        let mean = 1 << Attribute::Mean.bit();
        let belief = 1 << Attribute::Belief.bit();
        context.set_cif7(CIF7_CURRENT_VALUE | mean | belief).unwrap();
        context.set_bandwidth(Some(1.0e3)).unwrap();
        context.set_temperature(Some(10.0)).unwrap();

        // each 8-byte bandwidth: current, mean, one-word belief
        assert_eq!(context.field_offset(FieldId::TEMPERATURE).unwrap(), FieldOffset::Present(8 + 20));
        assert_eq!(context.attribute_bytes(FieldId::BANDWIDTH, Attribute::Mean).map(<[u8]>::len), Some(8));
        assert_eq!(context.attribute_bytes(FieldId::BANDWIDTH, Attribute::Belief).map(<[u8]>::len), Some(4));
        assert_eq!(context.attribute_bytes(FieldId::BANDWIDTH, Attribute::Median), None);
        assert_eq!(context.bandwidth(), Some(1.0e3));
        assert!(context.check_valid(true, None).is_ok());

        assert!(context.set_cif7(CIF7_CURRENT_VALUE).unwrap_err().is_unsupported());
        assert!(context.add_cif7(false).unwrap_err().is_unsupported());
    }

    #[test]
    fn cif7_without_current_value_refuses_setters() {
        let mut context = ContextPacket::default();
        context.set_cif7(1 << Attribute::Maximum.bit()).unwrap();
        assert!(context.set_bandwidth(Some(1.0)).unwrap_err().is_unsupported());
        assert!(context.set_cif7(0x0000_0001).is_err());
        context.add_cif7(false).unwrap();
        assert_eq!(context.cif7(), None);
        context.set_bandwidth(Some(1.0)).unwrap();
    }

    #[test]
    fn reset_for_resend_clears_interval_state() {
        let mut context = ContextPacket::default();
        context.set_change_indicator(true).unwrap();
        context.set_over_range_count(Some(12)).unwrap();
        context.set_indicator(Indicator::OverRange, Some(true)).unwrap();
        context.set_indicator(Indicator::SampleLoss, Some(false)).unwrap();
        context.set_indicator(Indicator::ReferenceLock, Some(true)).unwrap();

        let resend = TimeStamp::utc(1_000, 5).unwrap();
        context.reset_for_resend(resend).unwrap();
        assert_eq!(context.timestamp(), resend);
        assert!(!context.change_indicator());
        assert_eq!(context.over_range_count(), None);
        assert_eq!(context.indicator(Indicator::OverRange), None);
        assert_eq!(context.indicator(Indicator::SampleLoss), None);
        assert_eq!(context.indicator(Indicator::ReferenceLock), Some(true));
        assert!(context.check_valid(true, None).is_ok());
    }

    #[test]
    fn adjusted_timestamp_uses_own_timestamp() {
        let mut context = ContextPacket::default();
        assert_eq!(context.adjusted_timestamp(), None);
        context.set_timestamp(TimeStamp::gps(100, 500).unwrap()).unwrap();
        assert_eq!(context.adjusted_timestamp(), Some(TimeStamp::gps(100, 500).unwrap()));
        context.set_timestamp_adjustment(Some(-1_000)).unwrap();
        assert_eq!(context.adjusted_timestamp(), Some(TimeStamp::gps(99, ONE_SEC - 500).unwrap()));
    }

    #[test]
    fn validity_covers_field_footprint() {
        let mut context = ContextPacket::default();
        context.set_sample_rate(Some(1.0e6)).unwrap();
        let mut bytes = context.into_packet().into_bytes();
        // announce bandwidth without storing it
        bytes[8] |= 0x20;
        let broken = ContextPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(broken.check_valid(false, None).unwrap_err().to_string().contains("fields take"));

        bytes[8] &= !0x20;
        bytes[11] |= 0x01;
        let reserved = ContextPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(reserved.check_valid(false, None).unwrap_err().to_string().contains("reserved bits"));
    }

    #[test]
    fn views_and_types() {
        let context = ContextPacket::default();
        let bytes = context.into_packet().into_bytes();
        let mut view = ContextPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(matches!(view.set_bandwidth(Some(1.0)), Err(VrtError::ReadOnly { .. })));
        assert!(matches!(view.add_cif2(true), Err(VrtError::ReadOnly { .. })));

        let data = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        assert!(matches!(ContextPacket::from_packet(data), Err(VrtError::WrongPacketType { .. })));

        let mut owned = view.into_owned();
        assert!(matches!(owned.set_packet_type(PacketType::Data), Err(VrtError::WrongPacketType { .. })));
        owned.set_packet_type(PacketType::ExtContext).unwrap();
        assert_eq!(owned.packet_type(), PacketType::ExtContext);
    }

    #[test]
    fn reflection_walks_the_field_table() {
        let mut context = ContextPacket::new(VrtConfig { version: ProtocolVersion::V49b, ..VrtConfig::default() });
        let index = context.field_index("Bandwidth").unwrap();
        assert_eq!(context.field_type(index), Some(FieldType::Float64));
        context.set_field(index, Some(Value::Float64(2.0e6))).unwrap();
        assert_eq!(context.bandwidth(), Some(2.0e6));
        assert_eq!(context.get_field_by_name("Bandwidth"), Some(Value::Float64(2.0e6)));

        context.set_field_by_name("StateEventIndicators", Some(Value::StateEvents(StateEventBits::default()))).unwrap();
        assert!(context.has_field(FieldId::STATE_EVENTS));
        context.set_field_by_name("ChangeIndicator", Some(Value::Bool(true))).unwrap();
        assert!(context.change_indicator());
        assert!(context.set_field(index, Some(Value::UInt32(1))).is_err());
        assert_eq!(context.field_count(), 4 + FieldId::ALL.len());
    }

    const SAMPLE_FIELDS: [FieldId; 8] = [
        FieldId::BANDWIDTH,
        FieldId::REFERENCE_LEVEL,
        FieldId::DEVICE_ID,
        FieldId::GPS_ASCII,
        FieldId::AUX_FREQUENCY,
        FieldId::CONTROLLEE_UUID,
        FieldId::AGE,
        FieldId::NETWORK_ID,
    ];

    fn sample_bytes(field: FieldId) -> Vec<u8> {
        if field == FieldId::GPS_ASCII {
            let mut bytes = vec![0u8; 12];
            bytes[7] = 1;
            bytes[8..12].copy_from_slice(b"$GP,");
            return bytes;
        }
        let length = field.fixed_length().unwrap_or(4);
        (0..length).map(|i| (i as u8).wrapping_mul(7) & 0x7F).collect()
    }

    proptest! {
        #[test]
        fn first_field_follows_the_prologue(ops in proptest::collection::vec((0usize..8, any::<bool>()), 1..24)) {
            let mut context = ContextPacket::default();
            for (index, present) in ops {
                let field = SAMPLE_FIELDS[index];
                let bytes = sample_bytes(field);
                context.set_field_bytes(field, present.then_some(&bytes[..])).unwrap();

                prop_assert!(lengths_agree(&context));
                prop_assert!(context.check_valid(true, None).is_ok());
                if let Some(first) = context.present_fields().first() {
                    let offset = context.field_offset(*first).unwrap();
                    prop_assert_eq!(offset, FieldOffset::Present(context.prologue_length() - context.header_length()));
                }
                prop_assert_eq!(context.field_bytes(field).is_some(), present);
                if present {
                    prop_assert_eq!(context.field_bytes(field), Some(&bytes[..]));
                }
            }
        }
    }
}
