//! Data packets: the trailer and payload sample arrays.
//!
//! Data packets do not describe their own payload, so a [`DataPacket`]
//! carries the [`PayloadFormat`] it was built with (usually looked up by
//! class identifier, see [`ClassRegistry`](crate::ClassRegistry)).
//!
//! ```rust
//! use vrtkit::{DataPacket, PayloadFormat, VrtConfig};
//!
//! let mut packet = DataPacket::new(VrtConfig::default()).with_format(PayloadFormat::INT16);
//! packet.set_data_i16(&[1, -2, 3]).unwrap();
//! assert_eq!(packet.payload_length(), 8);
//! assert_eq!(packet.data_length(), Some(4));
//! assert_eq!(packet.data_as_i16().unwrap(), vec![1, -2, 3, 0]);
//! ```

use super::core::HEADER_FIELDS;
use super::pack::{self, Sample};
use super::payload_format::PayloadFormat;
use super::state_event::{Indicator, StateEventBits};
use super::timestamp::{ONE_SEC, TimeStamp};
use super::types::{PacketType, TRAILER_LENGTH, TsfMode};
use super::VrtPacket;
use crate::codec::{pack_u32, unpack_u32};
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Trailer bit 7: the associated context packet count is valid.
const CONTEXT_COUNT_ENABLE: u32 = 1 << 7;
const CONTEXT_COUNT_MASK: u32 = 0x7F;

/// A data or extension data packet with an optional payload format.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket<'a> {
    packet: VrtPacket<'a>,
    format: Option<PayloadFormat>,
}

impl Default for DataPacket<'static> {
    fn default() -> Self {
        Self::new(VrtConfig::default())
    }
}

impl DataPacket<'static> {
    /// An empty unidentified data packet: a bare header word.
    ///
    /// Switch to [`PacketType::Data`] before setting a stream identifier.
    pub fn new(config: VrtConfig) -> Self {
        DataPacket { packet: VrtPacket::blank(PacketType::UnidentifiedData, config), format: None }
    }
}

impl<'a> Deref for DataPacket<'a> {
    type Target = VrtPacket<'a>;

    fn deref(&self) -> &Self::Target {
        &self.packet
    }
}

impl DerefMut for DataPacket<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.packet
    }
}

impl<'a> TryFrom<VrtPacket<'a>> for DataPacket<'a> {
    type Error = VrtError;

    fn try_from(packet: VrtPacket<'a>) -> Result<Self> {
        Self::from_packet(packet)
    }
}

fn wrong_type(found: PacketType) -> VrtError {
    VrtError::WrongPacketType { expected: "a data type".to_string(), found: found.to_string() }
}

impl<'a> DataPacket<'a> {
    /// Wrap a generic packet, which must be of a data type.
    pub fn from_packet(packet: VrtPacket<'a>) -> Result<Self> {
        Self::try_wrap(packet).map_err(|packet| wrong_type(packet.packet_type()))
    }

    /// Wrap a generic packet of a data type, handing any other packet back.
    pub fn try_wrap(packet: VrtPacket<'a>) -> std::result::Result<Self, VrtPacket<'a>> {
        if !packet.packet_type().is_data() {
            return Err(packet);
        }
        Ok(DataPacket { packet, format: None })
    }

    /// Borrow `bytes` as a read-only data packet.
    pub fn view(bytes: &'a [u8], config: VrtConfig) -> Result<Self> {
        Self::from_packet(VrtPacket::view(bytes, config)?)
    }

    /// Attach the payload format used by the sample accessors.
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn payload_format(&self) -> Option<PayloadFormat> {
        self.format
    }

    /// Replace the payload format; the payload bytes are not touched.
    pub fn set_payload_format(&mut self, format: Option<PayloadFormat>) -> Result<()> {
        if let Some(format) = &format {
            format.validate()?;
        }
        self.format = format;
        Ok(())
    }

    pub fn into_packet(self) -> VrtPacket<'a> {
        self.packet
    }

    /// Convert into an owned packet, copying only when borrowed.
    pub fn into_owned(self) -> DataPacket<'static> {
        DataPacket { packet: self.packet.into_owned(), format: self.format }
    }

    /// Change between the data types; other types are rejected.
    pub fn set_packet_type(&mut self, packet_type: PacketType) -> Result<()> {
        if !packet_type.is_data() {
            return Err(wrong_type(packet_type));
        }
        self.packet.set_packet_type(packet_type)
    }

    /// The raw trailer word.
    pub fn trailer(&self) -> Option<u32> {
        if !self.packet.has_trailer() {
            return None;
        }
        let bytes = self.packet.as_bytes();
        unpack_u32(bytes, bytes.len().checked_sub(TRAILER_LENGTH)?)
    }

    fn write_trailer(&mut self, f: impl FnOnce(u32) -> u32) -> Result<()> {
        let word = self.trailer().unwrap_or(0);
        let buf = self.packet.framed_buffer_mut("set_trailer")?;
        let at = buf.len() - TRAILER_LENGTH;
        pack_u32(buf, at, f(word));
        Ok(())
    }

    /// Add an all-zero trailer or remove the trailer.
    pub fn set_trailer_present(&mut self, present: bool) -> Result<()> {
        if self.packet.has_trailer() == present {
            return Ok(());
        }
        let end = self.packet.packet_length();
        if present {
            self.packet.check_growth(TRAILER_LENGTH as isize)?;
            self.packet.splice_at("set_trailer_present", end, TRAILER_LENGTH, true)?;
            self.packet.set_trailer_bit(true)?;
        } else {
            self.packet.framed_buffer_mut("set_trailer_present")?;
            self.packet.set_trailer_bit(false)?;
            self.packet.splice_at("set_trailer_present", end - TRAILER_LENGTH, TRAILER_LENGTH, false)?;
        }
        debug!(present, "Changed trailer presence");
        Ok(())
    }

    /// The trailer's enable/indicator pairs and low byte.
    pub fn state_event_bits(&self) -> Option<StateEventBits> {
        self.trailer().map(StateEventBits::from_bits)
    }

    /// One trailer indicator; `None` when the trailer or the enable is absent.
    pub fn indicator(&self, indicator: Indicator) -> Option<bool> {
        self.state_event_bits()?.get(indicator)
    }

    /// Set one trailer indicator, adding the trailer when needed.
    pub fn set_indicator(&mut self, indicator: Indicator, value: Option<bool>) -> Result<()> {
        if value.is_none() && !self.packet.has_trailer() {
            return Ok(());
        }
        self.packet.buffer_mut("set_indicator")?;
        self.set_trailer_present(true)?;
        self.write_trailer(|word| {
            let mut bits = StateEventBits::from_bits(word);
            bits.set(indicator, value);
            bits.bits()
        })
    }

    pub fn calibrated_time(&self) -> Option<bool> {
        self.indicator(Indicator::CalibratedTime)
    }

    pub fn data_valid(&self) -> Option<bool> {
        self.indicator(Indicator::ValidData)
    }

    pub fn reference_lock(&self) -> Option<bool> {
        self.indicator(Indicator::ReferenceLock)
    }

    pub fn over_range(&self) -> Option<bool> {
        self.indicator(Indicator::OverRange)
    }

    /// Whether samples were lost before this packet.
    pub fn sample_loss(&self) -> Option<bool> {
        self.indicator(Indicator::SampleLoss)
    }

    /// Number of context packets associated with this packet, when the E bit
    /// is set.
    pub fn associated_context_count(&self) -> Option<u8> {
        let word = self.trailer()?;
        (word & CONTEXT_COUNT_ENABLE != 0).then_some((word & CONTEXT_COUNT_MASK) as u8)
    }

    /// Set (adding the trailer) or clear the associated context packet count.
    pub fn set_associated_context_count(&mut self, count: Option<u8>) -> Result<()> {
        if let Some(count) = count.filter(|count| *count as u32 > CONTEXT_COUNT_MASK) {
            return Err(VrtError::invalid_argument("context packet count", format!("{count} does not fit in 7 bits")));
        }
        if count.is_none() && !self.packet.has_trailer() {
            return Ok(());
        }
        self.packet.buffer_mut("set_associated_context_count")?;
        self.set_trailer_present(true)?;
        self.write_trailer(|word| {
            let word = word & !(CONTEXT_COUNT_ENABLE | CONTEXT_COUNT_MASK);
            match count {
                Some(count) => word | CONTEXT_COUNT_ENABLE | count as u32,
                None => word,
            }
        })
    }

    /// Compare trailers.
    ///
    /// Exact comparison requires the same presence and identical words.
    /// Otherwise a missing trailer reads as all zero, disabled indicators
    /// compare equal whatever their indicator bit, and the user-defined bits
    /// are ignored.
    pub fn trailer_equals(&self, other: &DataPacket<'_>, exact: bool) -> bool {
        if exact {
            return self.trailer() == other.trailer();
        }
        let mine = self.state_event_bits().unwrap_or_default();
        let theirs = other.state_event_bits().unwrap_or_default();
        mine.same_indicators(theirs, false) && self.associated_context_count() == other.associated_context_count()
    }

    fn format(&self, operation: &str) -> Result<PayloadFormat> {
        self.format.ok_or_else(|| VrtError::unsupported(operation, "no payload format is attached"))
    }

    /// Data items in the payload; `None` without a payload format.
    pub fn scalar_data_length(&self) -> Option<usize> {
        let format = self.format?;
        Some(pack::item_count(&format, self.packet.payload_length(), self.packet.pad_bit_count() as usize))
    }

    /// Samples in the payload (complex samples count once).
    pub fn data_length(&self) -> Option<usize> {
        let format = self.format?;
        Some(self.scalar_data_length()? / format.real_complex.items_per_sample())
    }

    /// Unpack every data item as `T`.
    pub fn data_as<T: Sample>(&self) -> Result<Vec<T>> {
        let format = self.format("data_as")?;
        let count = pack::item_count(&format, self.packet.payload_length(), self.packet.pad_bit_count() as usize);
        pack::unpack(self.packet.payload(), &format, count)
    }

    /// Replace the payload with `values`, resizing the packet.
    ///
    /// Link-efficient payloads record their trailing pad bits where the
    /// packet can carry them.
    pub fn set_data<T: Sample>(&mut self, values: &[T]) -> Result<()> {
        let format = self.format("set_data")?;
        let packed = pack::pack(values, &format)?;
        let delta = packed.len() as isize - self.packet.payload_length() as isize;
        self.packet.buffer_mut("set_data")?;
        self.packet.check_growth(delta)?;
        let pad = pack::pad_bits(&format, values.len()) as u32;
        let bits_per_sample = format.bits_per_sample();
        let recordable = self.packet.config().version.is_v49b() && self.packet.has_class_identifier();
        if pad >= bits_per_sample && !recordable {
            return Err(VrtError::unsupported(
                "set_data",
                format!("{pad} pad bits need an explicit count, which requires V49b and a class identifier"),
            ));
        }
        self.packet.set_payload_length(packed.len())?;
        self.packet.payload_mut()?.copy_from_slice(&packed);
        self.packet.set_pad_bit_count(pad as u8, bits_per_sample)?;
        debug!(items = values.len(), bytes = packed.len(), "Wrote packet data");
        Ok(())
    }

    pub fn data_as_f64(&self) -> Result<Vec<f64>> {
        self.data_as()
    }

    pub fn data_as_f32(&self) -> Result<Vec<f32>> {
        self.data_as()
    }

    pub fn data_as_i64(&self) -> Result<Vec<i64>> {
        self.data_as()
    }

    pub fn data_as_i32(&self) -> Result<Vec<i32>> {
        self.data_as()
    }

    pub fn data_as_i16(&self) -> Result<Vec<i16>> {
        self.data_as()
    }

    pub fn data_as_i8(&self) -> Result<Vec<i8>> {
        self.data_as()
    }

    pub fn set_data_f64(&mut self, values: &[f64]) -> Result<()> {
        self.set_data(values)
    }

    pub fn set_data_f32(&mut self, values: &[f32]) -> Result<()> {
        self.set_data(values)
    }

    pub fn set_data_i64(&mut self, values: &[i64]) -> Result<()> {
        self.set_data(values)
    }

    pub fn set_data_i32(&mut self, values: &[i32]) -> Result<()> {
        self.set_data(values)
    }

    pub fn set_data_i16(&mut self, values: &[i16]) -> Result<()> {
        self.set_data(values)
    }

    pub fn set_data_i8(&mut self, values: &[i8]) -> Result<()> {
        self.set_data(values)
    }

    /// Timestamp expected on the next packet of the stream.
    pub fn next_timestamp(&self, sample_rate: f64) -> Result<TimeStamp> {
        let samples = self
            .data_length()
            .ok_or_else(|| VrtError::unsupported("next_timestamp", "no payload format is attached"))?;
        self.packet.timestamp().next_expected(samples as u64, sample_rate)
    }

    /// Samples between `expected` and this packet's timestamp.
    ///
    /// Zero means no loss, positive means samples were dropped, negative
    /// means the packets overlap (usually a wrong rate or format).
    pub fn lost_samples(&self, expected: TimeStamp, sample_rate: f64) -> Result<i64> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(VrtError::invalid_argument("sample rate", format!("{sample_rate} is not positive")));
        }
        let actual = self.packet.timestamp();
        if let Some(picoseconds) = actual.picoseconds_since(&expected) {
            return Ok((picoseconds as f64 * sample_rate / ONE_SEC as f64).round() as i64);
        }
        let counted = matches!(actual.tsf(), TsfMode::SampleCount | TsfMode::FreeRunning);
        match (actual.fractional(), expected.fractional()) {
            (Some(now), Some(then)) if counted && actual.tsf() == expected.tsf() && actual.tsi() == expected.tsi() => {
                let seconds = if actual.tsf() == TsfMode::SampleCount {
                    actual.seconds().unwrap_or(0) as i64 - expected.seconds().unwrap_or(0) as i64
                } else {
                    0
                };
                Ok((seconds as f64 * sample_rate).round() as i64 + now as i64 - then as i64)
            }
            _ => Err(VrtError::unsupported("lost_samples", format!("cannot compare {actual} with {expected}"))),
        }
    }

    /// Check the packet structure.
    ///
    /// Extends [`VrtPacket::check_valid`]: in strict mode a packet with a
    /// payload format must hold whole samples.
    pub fn check_valid(&self, strict: bool, expected_length: Option<usize>) -> Result<()> {
        let packet_type = self.packet.packet_type();
        if !packet_type.is_data() {
            return Err(VrtError::invalid_packet(format!("{packet_type} is not a data type")));
        }
        self.packet.check_valid(strict, expected_length)?;
        if let Some(format) = self.format.filter(|_| strict) {
            let payload = self.packet.payload_length();
            let items = pack::item_count(&format, payload, self.packet.pad_bit_count() as usize);
            if items % format.real_complex.items_per_sample() != 0 || pack::packed_length(&format, items) != payload {
                return Err(VrtError::invalid_packet(format!(
                    "payload of {payload} bytes does not hold whole {format} samples"
                )));
            }
        }
        Ok(())
    }

    /// Whether [`check_valid`](Self::check_valid) passes under the configured strictness.
    pub fn is_valid(&self) -> bool {
        self.check_valid(self.packet.config().strict, None).is_ok()
    }
}

const TRAILER_FIELD: &str = "AssociatedContextCount";

/// Reflected fields: the header fields, the twelve trailer indicators, then
/// the associated context packet count.
impl HasFields for DataPacket<'_> {
    fn field_count(&self) -> usize {
        HEADER_FIELDS.len() + Indicator::ALL.len() + 1
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.field_name(index),
            Some(i) if i < Indicator::ALL.len() => Some(Indicator::ALL[i].name()),
            Some(i) if i == Indicator::ALL.len() => Some(TRAILER_FIELD),
            Some(_) => None,
        }
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.field_type(index),
            Some(i) if i < Indicator::ALL.len() => Some(FieldType::Bool),
            Some(i) if i == Indicator::ALL.len() => Some(FieldType::UInt8),
            Some(_) => None,
        }
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.get_field(index),
            Some(i) if i < Indicator::ALL.len() => self.indicator(Indicator::ALL[i]).map(FieldValue::into_value),
            Some(i) if i == Indicator::ALL.len() => self.associated_context_count().map(FieldValue::into_value),
            Some(_) => None,
        }
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        match index.checked_sub(HEADER_FIELDS.len()) {
            None => self.packet.set_field(index, value),
            Some(i) if i < Indicator::ALL.len() => {
                let indicator = Indicator::ALL[i];
                self.set_indicator(indicator, expect_value(indicator.name(), value)?)
            }
            Some(i) if i == Indicator::ALL.len() => {
                self.set_associated_context_count(expect_value(TRAILER_FIELD, value)?)
            }
            Some(_) => Err(no_such_field(index, self.field_count())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ClassIdentifier, PackingMethod, RealComplex, TsiMode};

    fn lengths_agree(packet: &DataPacket<'_>) -> bool {
        packet.packet_length() == packet.prologue_length() + packet.payload_length() + packet.trailer_length()
    }

    #[test]
    fn trailer_is_all_or_nothing() {
        let mut packet = DataPacket::default();
        assert_eq!(packet.trailer(), None);
        assert_eq!(packet.indicator(Indicator::ValidData), None);

        packet.set_indicator(Indicator::ValidData, Some(true)).unwrap();
        assert_eq!(packet.trailer_length(), 4);
        assert_eq!(packet.data_valid(), Some(true));
        assert_eq!(packet.over_range(), None);
        packet.set_associated_context_count(Some(5)).unwrap();
        assert_eq!(packet.associated_context_count(), Some(5));
        assert!(packet.set_associated_context_count(Some(128)).is_err());
        assert!(lengths_agree(&packet));

        packet.set_trailer_present(false).unwrap();
        assert_eq!(packet.packet_length(), 8);
        assert_eq!(packet.associated_context_count(), None);
        packet.set_indicator(Indicator::OverRange, None).unwrap();
        assert!(!packet.has_trailer());
    }

    #[test]
    fn samples_resize_the_payload_before_the_trailer() {
        let mut packet = DataPacket::new(VrtConfig::default()).with_format(PayloadFormat::FLOAT32);
        packet.set_indicator(Indicator::CalibratedTime, Some(true)).unwrap();
        packet.set_data_f32(&[0.5, -1.25, 3.0]).unwrap();
        assert_eq!(packet.payload_length(), 12);
        assert_eq!(packet.data_as_f32().unwrap(), vec![0.5, -1.25, 3.0]);
        assert_eq!(packet.calibrated_time(), Some(true));
        assert!(lengths_agree(&packet));

        packet.set_data_f64(&[]).unwrap();
        assert_eq!(packet.payload_length(), 0);
        assert_eq!(packet.data_length(), Some(0));
        assert!(packet.check_valid(true, None).is_ok());
    }

    #[test]
    fn complex_samples_count_once() {
        let format = PayloadFormat::INT16.with_real_complex(RealComplex::ComplexCartesian);
        let mut packet = DataPacket::default().with_format(format);
        packet.set_data_i32(&[1, -1, 2, -2]).unwrap();
        assert_eq!(packet.scalar_data_length(), Some(4));
        assert_eq!(packet.data_length(), Some(2));
        assert_eq!(packet.data_as_i64().unwrap(), vec![1, -1, 2, -2]);
    }

    #[test]
    fn sub_byte_items() {
        let mut packet = DataPacket::default().with_format(PayloadFormat::INT4);
        packet.set_data_i8(&[1, -2, 7, -8, 0, 3, -1, 2]).unwrap();
        assert_eq!(packet.payload_length(), 4);
        assert_eq!(packet.data_as_i8().unwrap(), vec![1, -2, 7, -8, 0, 3, -1, 2]);

        let mut bits = DataPacket::default().with_format(PayloadFormat::UINT1);
        let values: Vec<i16> = (0..32).map(|i| i % 3 % 2).collect();
        bits.set_data_i16(&values).unwrap();
        assert_eq!(bits.data_as_i16().unwrap(), values);
    }

    #[test]
    fn link_efficient_pad_bits() {
        let format = PayloadFormat::new(crate::packet::DataItemFormat::SignedInt, 12)
            .unwrap()
            .with_packing(PackingMethod::LinkEfficient);
        let mut packet = DataPacket::new(VrtConfig::v49b()).with_format(format);
        packet.set_class_identifier(Some(ClassIdentifier::new(0x12_3456, 1, 1).unwrap())).unwrap();
        packet.set_data_i16(&[100, -100, 2047]).unwrap();
        // 36 bits in two words leaves 28 pad bits
        assert_eq!(packet.payload_length(), 8);
        assert_eq!(packet.pad_bit_count(), 28);
        assert_eq!(packet.data_as_i16().unwrap(), vec![100, -100, 2047]);
    }

    #[test]
    fn missing_format_is_unsupported() {
        let packet = DataPacket::default();
        assert_eq!(packet.data_length(), None);
        assert!(packet.data_as_f64().unwrap_err().is_unsupported());
        assert!(packet.next_timestamp(1.0e6).unwrap_err().is_unsupported());
    }

    #[test]
    fn sample_accounting() {
        let mut packet = DataPacket::default().with_format(PayloadFormat::INT16);
        packet.set_timestamp(TimeStamp::utc(100, 0).unwrap()).unwrap();
        packet.set_data_i16(&[0; 1000]).unwrap();

        let next = packet.next_timestamp(1.0e6).unwrap();
        assert_eq!(next, TimeStamp::utc(100, 1_000_000_000).unwrap());

        assert_eq!(packet.lost_samples(TimeStamp::utc(100, 0).unwrap(), 1.0e6).unwrap(), 0);
        // expected earlier than actual: samples were dropped
        assert_eq!(packet.lost_samples(TimeStamp::utc(99, ONE_SEC - 5_000_000).unwrap(), 1.0e6).unwrap(), 5);
        // expected later than actual: overlap
        assert_eq!(packet.lost_samples(TimeStamp::utc(100, 2_000_000).unwrap(), 1.0e6).unwrap(), -2);
        assert!(packet.lost_samples(TimeStamp::gps(100, 0).unwrap(), 1.0e6).is_err());
        assert!(packet.lost_samples(TimeStamp::utc(100, 0).unwrap(), 0.0).is_err());
    }

    #[test]
    fn sample_count_timestamps() {
        let mut packet = DataPacket::default().with_format(PayloadFormat::INT8);
        let stamp = TimeStamp::new(TsiMode::Gps, TsfMode::SampleCount, 10, 40).unwrap();
        packet.set_timestamp(stamp).unwrap();
        let expected = TimeStamp::new(TsiMode::Gps, TsfMode::SampleCount, 9, 90).unwrap();
        assert_eq!(packet.lost_samples(expected, 100.0).unwrap(), 50);
    }

    #[test]
    fn trailer_bit_without_room_is_rejected() {
        let header: u32 = (1 << 26) | 1;
        let bytes = header.to_be_bytes().to_vec();
        let mut packet = DataPacket::from_packet(VrtPacket::from_vec(bytes.clone(), VrtConfig::default()).unwrap())
            .unwrap();
        assert!(packet.has_trailer());
        assert!(packet.set_indicator(Indicator::Agc, Some(true)).unwrap_err().is_structural());
        assert!(packet.set_trailer_present(false).unwrap_err().is_structural());
        assert_eq!(packet.as_bytes(), &bytes[..]);
    }

    #[test]
    fn trailer_comparison() {
        let mut a = DataPacket::default();
        let mut b = DataPacket::default();
        assert!(a.trailer_equals(&b, true));

        b.set_trailer_present(true).unwrap();
        assert!(a.trailer_equals(&b, false));
        assert!(!a.trailer_equals(&b, true));

        a.set_indicator(Indicator::Agc, Some(false)).unwrap();
        assert!(!a.trailer_equals(&b, false));
        b.set_indicator(Indicator::Agc, Some(false)).unwrap();
        assert!(a.trailer_equals(&b, true));
    }

    #[test]
    fn type_locked_view() {
        let context = VrtPacket::new(PacketType::Context, VrtConfig::default()).unwrap();
        assert!(matches!(DataPacket::from_packet(context), Err(VrtError::WrongPacketType { .. })));
        let mut packet = DataPacket::default();
        assert!(matches!(packet.set_packet_type(PacketType::Context), Err(VrtError::WrongPacketType { .. })));
        packet.set_packet_type(PacketType::UnidentifiedData).unwrap();
        assert_eq!(packet.stream_identifier(), None);

        let bytes = packet.into_packet().into_bytes();
        let mut view = DataPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(matches!(view.set_trailer_present(true), Err(VrtError::ReadOnly { .. })));
    }

    #[test]
    fn reflection_covers_the_trailer() {
        let mut packet = DataPacket::default();
        assert_eq!(packet.field_count(), 3 + 12 + 1);
        packet.set_field_by_name("DataValid", Some(Value::Bool(true))).unwrap();
        assert_eq!(packet.data_valid(), Some(true));
        packet.set_field_by_name(TRAILER_FIELD, Some(Value::UInt8(9))).unwrap();
        assert_eq!(packet.get_field_by_name(TRAILER_FIELD), Some(Value::UInt8(9)));
        assert_eq!(packet.get_field_by_name("AGC"), None);
    }
}
