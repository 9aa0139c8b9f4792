//! Generic VRT packet: header fields, lengths and validity.
//!
//! [`VrtPacket`] owns (or borrows) the raw bytes and never caches anything
//! derived from them. Every accessor decodes the header word on each call, so
//! the packet stays consistent while optional fields are spliced in and out.
//!
//! ```rust
//! use vrtkit::{PacketType, VrtPacket};
//!
//! let mut packet = VrtPacket::default();
//! assert_eq!(packet.packet_type(), PacketType::UnidentifiedData);
//! assert_eq!(packet.packet_length(), 4);
//!
//! packet.set_class_identifier(Some("FF-FF-FA:2011.0002".parse().unwrap())).unwrap();
//! assert_eq!(packet.class_id().as_deref(), Some("FF-FF-FA:2011.0002"));
//! assert_eq!(packet.packet_length(), 12);
//! ```

use super::buffer::Storage;
use super::class_id::ClassIdentifier;
use super::splice::{LengthHeader, splice};
use super::timestamp::TimeStamp;
use super::types::{HEADER_WORD_LENGTH, MAX_PACKET_LENGTH, PacketType, TRAILER_LENGTH, TsfMode, TsiMode};
use crate::codec::{pack_u32, pack_u64, unpack_u32, unpack_u64};
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use tracing::debug;

const CLASS_ID_BIT: u32 = 1 << 27;
const TRAILER_BIT: u32 = 1 << 26;
const TSM_BIT: u32 = 1 << 24;
const TIMESTAMP_MODE_MASK: u32 = 0x00F0_0000;
const PACKET_COUNT_MASK: u32 = 0x000F_0000;
/// CIF0 bits enabling the CIF1, CIF2, CIF3 and CIF7 words.
pub(crate) const CIF_ENABLE_MASK: u32 = (1 << 1) | (1 << 2) | (1 << 3) | (1 << 7);
const PAD_BITS_SHIFT: u32 = 27;

/// A single VRT packet over owned or borrowed bytes.
#[derive(Debug, Clone)]
pub struct VrtPacket<'a> {
    storage: Storage<'a>,
    config: VrtConfig,
}

impl Default for VrtPacket<'static> {
    /// An unidentified data packet holding only the header word.
    fn default() -> Self {
        Self::blank(PacketType::UnidentifiedData, VrtConfig::default())
    }
}

impl PartialEq for VrtPacket<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl VrtPacket<'static> {
    pub(crate) fn blank(packet_type: PacketType, config: VrtConfig) -> Self {
        let words = 1 + packet_type.has_stream_id() as usize + packet_type.is_context() as usize;
        let mut bytes = vec![0u8; words * 4];
        pack_u32(&mut bytes, 0, ((packet_type.code() as u32) << 28) | words as u32);
        Self { storage: Storage::Owned(bytes), config }
    }

    /// Create an empty packet of the given type.
    ///
    /// Types carrying a stream identifier get a zero stream identifier; context
    /// types get an empty CIF0 word.
    pub fn new(packet_type: PacketType, config: VrtConfig) -> Result<Self> {
        if let PacketType::Reserved(code) = packet_type {
            return Err(VrtError::invalid_argument("packet type", format!("type code {code} is reserved")));
        }
        Ok(Self::blank(packet_type, config))
    }

    /// Copy a packet out of `bytes`, truncating to the declared length.
    pub fn from_bytes(bytes: &[u8], config: VrtConfig) -> Result<Self> {
        let declared = declared_length(bytes)?;
        let take = declared.max(HEADER_WORD_LENGTH).min(bytes.len());
        Ok(Self { storage: Storage::Owned(bytes[..take].to_vec()), config })
    }

    /// Take ownership of `bytes`, truncating to the declared length.
    pub fn from_vec(mut bytes: Vec<u8>, config: VrtConfig) -> Result<Self> {
        let declared = declared_length(&bytes)?;
        bytes.truncate(declared.max(HEADER_WORD_LENGTH));
        Ok(Self { storage: Storage::Owned(bytes), config })
    }
}

fn declared_length(bytes: &[u8]) -> Result<usize> {
    let header = unpack_u32(bytes, 0).ok_or(VrtError::BufferTooShort {
        needed: HEADER_WORD_LENGTH,
        available: bytes.len(),
    })?;
    Ok((header & 0xFFFF) as usize * 4)
}

impl<'a> VrtPacket<'a> {
    /// Borrow `bytes` as a read-only packet.
    ///
    /// The whole slice is kept so strict validation can detect trailing bytes.
    pub fn view(bytes: &'a [u8], config: VrtConfig) -> Result<Self> {
        declared_length(bytes)?;
        Ok(Self { storage: Storage::View(bytes), config })
    }

    /// The configuration used for validation and encoding.
    pub fn config(&self) -> VrtConfig {
        self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: VrtConfig) {
        self.config = config;
    }

    /// Whether mutators on this packet fail with [`VrtError::ReadOnly`].
    pub fn is_read_only(&self) -> bool {
        self.storage.is_read_only()
    }

    /// The packet bytes, limited to the declared packet length.
    pub fn as_bytes(&self) -> &[u8] {
        let bytes = self.storage.as_slice();
        &bytes[..self.packet_length().min(bytes.len())]
    }

    /// Consume the packet and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let length = self.packet_length();
        let mut bytes = self.storage.into_vec();
        bytes.truncate(length);
        bytes
    }

    /// An owned copy of this packet.
    pub fn to_owned_packet(&self) -> VrtPacket<'static> {
        VrtPacket { storage: Storage::Owned(self.as_bytes().to_vec()), config: self.config }
    }

    /// Convert into an owned packet, copying only when borrowed.
    pub fn into_owned(self) -> VrtPacket<'static> {
        if self.is_read_only() {
            return self.to_owned_packet();
        }
        let config = self.config;
        VrtPacket { storage: Storage::Owned(self.into_bytes()), config }
    }

    #[inline]
    pub(crate) fn header(&self) -> u32 {
        unpack_u32(self.storage.as_slice(), 0).unwrap_or(0)
    }

    /// Mutable buffer for `operation`; fails on views and on buffers whose
    /// size disagrees with the header.
    pub(crate) fn buffer_mut(&mut self, operation: &str) -> Result<&mut Vec<u8>> {
        let declared = self.packet_length();
        let buf = self.storage.writable(operation)?;
        if buf.len() != declared {
            return Err(VrtError::invalid_packet(format!(
                "buffer holds {} bytes but header declares {declared}",
                buf.len()
            )));
        }
        Ok(buf)
    }

    /// Like [`buffer_mut`](Self::buffer_mut), also requiring the prologue and
    /// trailer announced by the header to fit in the declared length.
    pub(crate) fn framed_buffer_mut(&mut self, operation: &str) -> Result<&mut Vec<u8>> {
        self.buffer_mut(operation)?;
        let needed = self.prologue_length() + self.trailer_length();
        let declared = self.packet_length();
        if needed > declared {
            return Err(VrtError::invalid_packet(format!(
                "prologue and trailer need {needed} bytes but header declares {declared}"
            )));
        }
        self.buffer_mut(operation)
    }

    pub(crate) fn splice_at(&mut self, operation: &str, offset: usize, bytes: usize, insert: bool) -> Result<()> {
        let buf = self.buffer_mut(operation)?;
        splice(buf, offset, bytes, insert, LengthHeader::Packet)
    }

    pub(crate) fn update_header(&mut self, operation: &str, f: impl FnOnce(u32) -> u32) -> Result<()> {
        let buf = self.buffer_mut(operation)?;
        let header = unpack_u32(buf, 0).unwrap_or(0);
        pack_u32(buf, 0, f(header));
        Ok(())
    }

    /// Reject growth past the 16-bit size field before any mutation.
    pub(crate) fn check_growth(&self, delta: isize) -> Result<()> {
        let new_length = self.packet_length() as isize + delta;
        if new_length > MAX_PACKET_LENGTH as isize {
            return Err(VrtError::invalid_argument(
                "length",
                format!("{new_length} bytes exceeds the maximum of {MAX_PACKET_LENGTH}"),
            ));
        }
        Ok(())
    }

    /// Packet type from the top nibble of the header.
    pub fn packet_type(&self) -> PacketType {
        PacketType::from_code((self.header() >> 28) as u8)
    }

    /// Change the packet type.
    ///
    /// The stream identifier is spliced in or out as the new type requires.
    /// The trailer bit and TSM bit are cleared and any trailer bytes dropped,
    /// since their meaning depends on the type. Switching between data and
    /// context types adds an empty CIF0 word or drops the CIF words, so the
    /// rest of the payload is carried over uninterpreted.
    pub fn set_packet_type(&mut self, packet_type: PacketType) -> Result<()> {
        if let PacketType::Reserved(code) = packet_type {
            return Err(VrtError::invalid_argument("packet type", format!("type code {code} is reserved")));
        }
        let old = self.packet_type();
        self.buffer_mut("set_packet_type")?;

        let trailer = self.trailer_length();
        let old_sid = old.has_stream_id();
        let new_sid = packet_type.has_stream_id();
        let cif_words = if old.is_context() && !packet_type.is_context() { self.cif_words_length() } else { 0 };
        let add_cif0 = packet_type.is_context() && !old.is_context();
        let delta = (new_sid as isize - old_sid as isize) * 4 - trailer as isize - cif_words as isize
            + add_cif0 as isize * 4;
        self.check_growth(delta)?;

        let header_length = self.header_length();
        if trailer > 0 {
            let end = self.packet_length() - trailer;
            self.splice_at("set_packet_type", end, trailer, false)?;
        }
        if cif_words > 0 {
            self.splice_at("set_packet_type", header_length, cif_words, false)?;
        }
        if old_sid != new_sid {
            self.splice_at("set_packet_type", HEADER_WORD_LENGTH, 4, new_sid)?;
        }
        if add_cif0 {
            let new_header_length = header_length + new_sid as usize * 4 - old_sid as usize * 4;
            self.splice_at("set_packet_type", new_header_length, 4, true)?;
        }
        self.update_header("set_packet_type", |h| {
            (h & !(0xF000_0000 | TRAILER_BIT | TSM_BIT)) | ((packet_type.code() as u32) << 28)
        })?;
        debug!(from = %old, to = %packet_type, "Changed packet type");
        Ok(())
    }

    /// Whether the class identifier field is present.
    pub fn has_class_identifier(&self) -> bool {
        self.header() & CLASS_ID_BIT != 0
    }

    /// Whether a trailer is present (data packets only).
    pub fn has_trailer(&self) -> bool {
        self.packet_type().is_data() && self.header() & TRAILER_BIT != 0
    }

    /// Timestamp mode bit (context packets only; `None` for data packets).
    pub fn tsm(&self) -> Option<bool> {
        self.packet_type().is_context().then(|| self.header() & TSM_BIT != 0)
    }

    /// Set the timestamp mode bit of a context packet.
    pub fn set_tsm(&mut self, tsm: bool) -> Result<()> {
        if !self.packet_type().is_context() {
            return Err(VrtError::unsupported("set_tsm", "only context packets carry a timestamp mode"));
        }
        self.update_header("set_tsm", |h| if tsm { h | TSM_BIT } else { h & !TSM_BIT })
    }

    /// 4-bit rolling packet count.
    pub fn packet_count(&self) -> u8 {
        ((self.header() & PACKET_COUNT_MASK) >> 16) as u8
    }

    /// Set the 4-bit packet count.
    pub fn set_packet_count(&mut self, count: u8) -> Result<()> {
        if count > 0x0F {
            return Err(VrtError::invalid_argument("packet count", format!("{count} does not fit in 4 bits")));
        }
        self.update_header("set_packet_count", |h| (h & !PACKET_COUNT_MASK) | ((count as u32) << 16))
    }

    /// Declared packet length in bytes.
    pub fn packet_length(&self) -> usize {
        (self.header() & 0xFFFF) as usize * 4
    }

    fn class_id_offset(&self) -> usize {
        HEADER_WORD_LENGTH + if self.packet_type().has_stream_id() { 4 } else { 0 }
    }

    fn tsi_offset(&self) -> usize {
        self.class_id_offset() + if self.has_class_identifier() { 8 } else { 0 }
    }

    fn tsf_offset(&self) -> usize {
        self.tsi_offset() + if self.tsi_mode() != TsiMode::None { 4 } else { 0 }
    }

    /// Length of the header including optional fields.
    pub fn header_length(&self) -> usize {
        self.tsf_offset() + if self.tsf_mode() != TsfMode::None { 8 } else { 0 }
    }

    /// Length of the CIF words that follow the header of a context packet.
    pub(crate) fn cif_words_length(&self) -> usize {
        if !self.packet_type().is_context() {
            return 0;
        }
        let cif0 = unpack_u32(self.storage.as_slice(), self.header_length()).unwrap_or(0);
        4 + 4 * (cif0 & CIF_ENABLE_MASK).count_ones() as usize
    }

    /// Header plus packet-specific prologue (the CIF words of context packets).
    pub fn prologue_length(&self) -> usize {
        self.header_length() + self.cif_words_length()
    }

    /// Trailer length in bytes (0 or 4).
    pub fn trailer_length(&self) -> usize {
        if self.has_trailer() { TRAILER_LENGTH } else { 0 }
    }

    /// Payload length: packet length less prologue and trailer.
    pub fn payload_length(&self) -> usize {
        self.packet_length().saturating_sub(self.prologue_length() + self.trailer_length())
    }

    /// Grow (zero-filled) or truncate the payload to `length` bytes.
    pub fn set_payload_length(&mut self, length: usize) -> Result<()> {
        if length % 4 != 0 {
            return Err(VrtError::invalid_argument(
                "payload length",
                format!("{length} bytes is not a whole number of words"),
            ));
        }
        self.framed_buffer_mut("set_payload_length")?;
        let current = self.payload_length();
        let start = self.prologue_length();
        if length > current {
            self.splice_at("set_payload_length", start + current, length - current, true)
        } else {
            self.splice_at("set_payload_length", start + length, current - length, false)
        }
    }

    /// The payload bytes (limited to what the buffer holds).
    pub fn payload(&self) -> &[u8] {
        let bytes = self.as_bytes();
        let start = self.prologue_length().min(bytes.len());
        let end = (start + self.payload_length()).min(bytes.len());
        &bytes[start..end]
    }

    /// Mutable payload bytes.
    pub fn payload_mut(&mut self) -> Result<&mut [u8]> {
        let start = self.prologue_length();
        let end = start + self.payload_length();
        let buf = self.framed_buffer_mut("payload_mut")?;
        Ok(&mut buf[start..end])
    }

    /// Stream identifier for types that carry one.
    pub fn stream_identifier(&self) -> Option<u32> {
        if self.packet_type().has_stream_id() { unpack_u32(self.as_bytes(), HEADER_WORD_LENGTH) } else { None }
    }

    /// Set the stream identifier; unsupported for unidentified types.
    pub fn set_stream_identifier(&mut self, stream_id: u32) -> Result<()> {
        let packet_type = self.packet_type();
        if !packet_type.has_stream_id() {
            return Err(VrtError::unsupported(
                "set_stream_identifier",
                format!("{packet_type} packets have no stream identifier"),
            ));
        }
        let buf = self.buffer_mut("set_stream_identifier")?;
        pack_u32(buf, HEADER_WORD_LENGTH, stream_id);
        Ok(())
    }

    fn class_id_words(&self) -> Option<(u32, u32)> {
        if !self.has_class_identifier() {
            return None;
        }
        let offset = self.class_id_offset();
        let bytes = self.as_bytes();
        Some((unpack_u32(bytes, offset)?, unpack_u32(bytes, offset + 4)?))
    }

    /// The class identifier, without the pad-bit count sharing its first word.
    pub fn class_identifier(&self) -> Option<ClassIdentifier> {
        let (w1, w2) = self.class_id_words()?;
        ClassIdentifier::new(w1 & 0x00FF_FFFF, (w2 >> 16) as u16, w2 as u16).ok()
    }

    /// The class identifier in `OO-OO-OO:IIII.PPPP` form.
    pub fn class_id(&self) -> Option<String> {
        self.class_identifier().map(|id| id.to_string())
    }

    /// Set or remove the class identifier.
    ///
    /// Removing it fails while a nonzero pad-bit count is encoded alongside;
    /// clear the pad-bit count first.
    pub fn set_class_identifier(&mut self, class_id: Option<ClassIdentifier>) -> Result<()> {
        let offset = self.class_id_offset();
        let present = self.has_class_identifier();
        match class_id {
            Some(id) => {
                if !present {
                    self.check_growth(8)?;
                    self.splice_at("set_class_identifier", offset, 8, true)?;
                    self.update_header("set_class_identifier", |h| h | CLASS_ID_BIT)?;
                }
                let buf = self.buffer_mut("set_class_identifier")?;
                let pad = unpack_u32(buf, offset).unwrap_or(0) & 0xF800_0000;
                pack_u32(buf, offset, pad | id.oui());
                pack_u32(buf, offset + 4, ((id.information_class() as u32) << 16) | id.packet_class() as u32);
                Ok(())
            }
            None if !present => Ok(()),
            None => {
                let pad = self.raw_pad_bits();
                if pad != 0 {
                    return Err(VrtError::invalid_argument(
                        "class identifier",
                        format!("cannot remove while a pad-bit count of {pad} is encoded"),
                    ));
                }
                self.splice_at("set_class_identifier", offset, 8, false)?;
                self.update_header("set_class_identifier", |h| h & !CLASS_ID_BIT)
            }
        }
    }

    fn raw_pad_bits(&self) -> u8 {
        self.class_id_words().map(|(w1, _)| (w1 >> PAD_BITS_SHIFT) as u8).unwrap_or(0)
    }

    /// Pad-bit count at the end of the payload (V49b only; 0 otherwise).
    pub fn pad_bit_count(&self) -> u8 {
        if self.config.version.is_v49b() { self.raw_pad_bits() } else { 0 }
    }

    /// Record the number of pad bits at the end of the payload.
    ///
    /// A count smaller than one sample (`bits_per_sample`) is implicit: the
    /// receiver can infer it, so it is only written when a class identifier is
    /// present and V49b is configured. An explicit count requires both.
    /// Context packets carry no pad bits.
    pub fn set_pad_bit_count(&mut self, bits: u8, bits_per_sample: u32) -> Result<()> {
        if bits > 31 {
            return Err(VrtError::invalid_argument("pad bit count", format!("{bits} does not fit in 5 bits")));
        }
        if self.packet_type().is_context() {
            if bits == 0 {
                return Ok(());
            }
            return Err(VrtError::unsupported("set_pad_bit_count", "context packets carry no pad bits"));
        }
        let explicit = bits as u32 >= bits_per_sample;
        if !(self.config.version.is_v49b() && self.has_class_identifier()) {
            if explicit && bits != 0 {
                return Err(VrtError::unsupported(
                    "set_pad_bit_count",
                    "explicit pad-bit counts require V49b and a class identifier",
                ));
            }
            return Ok(());
        }
        let offset = self.class_id_offset();
        let buf = self.buffer_mut("set_pad_bit_count")?;
        let word = unpack_u32(buf, offset).unwrap_or(0);
        pack_u32(buf, offset, (word & 0x07FF_FFFF) | ((bits as u32) << PAD_BITS_SHIFT));
        Ok(())
    }

    /// Integer timestamp mode.
    pub fn tsi_mode(&self) -> TsiMode {
        TsiMode::from_code(((self.header() >> 22) & 0x3) as u8)
    }

    /// Fractional timestamp mode.
    pub fn tsf_mode(&self) -> TsfMode {
        TsfMode::from_code(((self.header() >> 20) & 0x3) as u8)
    }

    /// The packet timestamp (both parts absent gives [`TimeStamp::NONE`]).
    pub fn timestamp(&self) -> TimeStamp {
        let tsi = self.tsi_mode();
        let tsf = self.tsf_mode();
        let bytes = self.as_bytes();
        let seconds = if tsi != TsiMode::None { unpack_u32(bytes, self.tsi_offset()).unwrap_or(0) } else { 0 };
        let fractional = if tsf != TsfMode::None { unpack_u64(bytes, self.tsf_offset()).unwrap_or(0) } else { 0 };
        TimeStamp::from_fields(tsi, tsf, seconds, fractional)
    }

    /// Set the timestamp, splicing the integer then fractional fields before
    /// the mode bits change.
    pub fn set_timestamp(&mut self, timestamp: TimeStamp) -> Result<()> {
        let want_tsi = timestamp.tsi() != TsiMode::None;
        let want_tsf = timestamp.tsf() != TsfMode::None;
        let have_tsi = self.tsi_mode() != TsiMode::None;
        let have_tsf = self.tsf_mode() != TsfMode::None;

        self.buffer_mut("set_timestamp")?;
        let delta = (want_tsi as isize - have_tsi as isize) * 4 + (want_tsf as isize - have_tsf as isize) * 8;
        self.check_growth(delta)?;

        let tsi_offset = self.tsi_offset();
        if want_tsi != have_tsi {
            self.splice_at("set_timestamp", tsi_offset, 4, want_tsi)?;
        }
        let tsf_offset = tsi_offset + if want_tsi { 4 } else { 0 };
        if want_tsf != have_tsf {
            self.splice_at("set_timestamp", tsf_offset, 8, want_tsf)?;
        }

        let modes = ((timestamp.tsi().code() as u32) << 22) | ((timestamp.tsf().code() as u32) << 20);
        self.update_header("set_timestamp", |h| (h & !TIMESTAMP_MODE_MASK) | modes)?;

        let buf = self.buffer_mut("set_timestamp")?;
        if let Some(seconds) = timestamp.seconds() {
            pack_u32(buf, tsi_offset, seconds);
        }
        if let Some(fractional) = timestamp.fractional() {
            pack_u64(buf, tsf_offset, fractional);
        }
        Ok(())
    }

    pub(crate) fn set_trailer_bit(&mut self, present: bool) -> Result<()> {
        self.update_header("set_trailer_present", |h| if present { h | TRAILER_BIT } else { h & !TRAILER_BIT })
    }

    /// Check the packet structure.
    ///
    /// Checks run in order and stop at the first failure: packet type,
    /// reserved header bits, class identifier reserved bits, minimum size,
    /// `expected_length` (when given), and buffer capacity. In strict mode the
    /// buffer must hold exactly the declared length.
    pub fn check_valid(&self, strict: bool, expected_length: Option<usize>) -> Result<()> {
        let header = self.header();
        let packet_type = self.packet_type();
        if let PacketType::Reserved(code) = packet_type {
            return Err(VrtError::invalid_packet(format!("reserved packet type {code}")));
        }

        let reserved = if packet_type.is_context() { (1 << 26) | (1 << 25) } else { (1 << 25) | (1 << 24) };
        if header & reserved != 0 {
            return Err(VrtError::invalid_packet(format!(
                "reserved header bits {:#010x} set",
                header & reserved
            )));
        }

        if let Some((w1, _)) = self.class_id_words() {
            let v49b = self.config.version.is_v49b();
            let mask = if v49b { 0x0700_0000 } else { 0xFF00_0000 };
            if w1 & mask != 0 {
                return Err(VrtError::invalid_packet(format!(
                    "class identifier reserved bits {:#010x} set",
                    w1 & mask
                )));
            }
            if v49b && packet_type.is_context() && w1 >> PAD_BITS_SHIFT != 0 {
                return Err(VrtError::invalid_packet("pad-bit count set on a context packet"));
            }
        }

        let length = self.packet_length();
        let minimum = self.prologue_length() + self.trailer_length();
        if length < minimum {
            return Err(VrtError::invalid_packet(format!(
                "packet length {length} is below the minimum of {minimum}"
            )));
        }

        if let Some(expected) = expected_length.filter(|expected| *expected != length) {
            return Err(VrtError::invalid_packet(format!(
                "packet length {length} does not match the expected {expected}"
            )));
        }

        let stored = self.storage.len();
        if stored < length || (strict && stored != length) {
            return Err(VrtError::invalid_packet(format!(
                "buffer holds {stored} bytes but header declares {length}"
            )));
        }
        Ok(())
    }

    /// Whether [`check_valid`](Self::check_valid) passes under the configured strictness.
    pub fn is_valid(&self) -> bool {
        self.check_valid(self.config.strict, None).is_ok()
    }
}

/// Reflected header fields shared by every packet type.
pub(crate) const HEADER_FIELDS: [(&str, FieldType); 3] = [
    ("StreamIdentifier", FieldType::UInt32),
    ("ClassIdentifier", FieldType::ClassIdentifier),
    ("TimeStamp", FieldType::TimeStamp),
];

impl HasFields for VrtPacket<'_> {
    fn field_count(&self) -> usize {
        HEADER_FIELDS.len()
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        HEADER_FIELDS.get(index).map(|(name, _)| *name)
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        HEADER_FIELDS.get(index).map(|(_, field_type)| *field_type)
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        match index {
            0 => self.stream_identifier().map(FieldValue::into_value),
            1 => self.class_identifier().map(FieldValue::into_value),
            2 => Some(self.timestamp()).filter(|ts| !ts.is_none()).map(FieldValue::into_value),
            _ => None,
        }
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        let (name, _) = HEADER_FIELDS.get(index).ok_or_else(|| no_such_field(index, HEADER_FIELDS.len()))?;
        match index {
            0 => match expect_value::<u32>(name, value)? {
                Some(stream_id) => self.set_stream_identifier(stream_id),
                None => Err(VrtError::unsupported("set_field", "the stream identifier cannot be removed")),
            },
            1 => self.set_class_identifier(expect_value(name, value)?),
            _ => self.set_timestamp(expect_value(name, value)?.unwrap_or(TimeStamp::NONE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolVersion;
    use proptest::prelude::*;

    fn lengths_agree(packet: &VrtPacket<'_>) -> bool {
        packet.packet_length() == packet.prologue_length() + packet.payload_length() + packet.trailer_length()
    }

    #[test]
    fn short_declared_length_fails_payload_writes() {
        // Both timestamp modes need 12 bytes but only two words are declared.
        let header: u32 = (1 << 22) | (1 << 20) | 2;
        let mut bytes = header.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0; 4]);
        let mut packet = VrtPacket::from_vec(bytes.clone(), VrtConfig::default()).unwrap();
        assert_eq!(packet.payload_length(), 0);
        assert!(packet.payload_mut().unwrap_err().is_structural());
        assert!(packet.set_payload_length(8).unwrap_err().is_structural());
        assert_eq!(packet.as_bytes(), &bytes[..]);
    }

    #[test]
    fn default_packet_is_bare_header() {
        let packet = VrtPacket::default();
        assert_eq!(packet.packet_length(), 4);
        assert_eq!(packet.packet_type(), PacketType::UnidentifiedData);
        assert!(!packet.has_trailer());
        assert!(packet.is_valid());
    }

    #[test]
    fn class_identifier_round_trip() {
        let mut packet = VrtPacket::default();
        let id = ClassIdentifier::from_bits(0xFFFFFA20110002).unwrap();
        packet.set_class_identifier(Some(id)).unwrap();
        assert_eq!(packet.class_id().as_deref(), Some("FF-FF-FA:2011.0002"));
        assert_eq!(packet.class_identifier(), Some(id));
        packet.set_class_identifier(None).unwrap();
        assert_eq!(packet.class_identifier(), None);
        assert_eq!(packet.packet_length(), 4);
    }

    #[test]
    fn class_identifier_removal_guards_pad_bits() {
        let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::v49b()).unwrap();
        packet.set_class_identifier(Some(ClassIdentifier::new(0x123456, 1, 2).unwrap())).unwrap();
        packet.set_pad_bit_count(12, 16).unwrap();
        assert_eq!(packet.pad_bit_count(), 12);

        let before = packet.as_bytes().to_vec();
        assert!(packet.set_class_identifier(None).is_err());
        assert_eq!(packet.as_bytes(), &before[..]);

        packet.set_pad_bit_count(0, 16).unwrap();
        packet.set_class_identifier(None).unwrap();
        assert!(!packet.has_class_identifier());
    }

    #[test]
    fn pad_bit_rules() {
        let mut v49 = VrtPacket::new(PacketType::Data, VrtConfig::v49()).unwrap();
        // implicit counts are silently not recorded
        v49.set_pad_bit_count(4, 8).unwrap();
        assert_eq!(v49.pad_bit_count(), 0);
        assert!(v49.set_pad_bit_count(8, 8).unwrap_err().is_unsupported());

        let mut context = VrtPacket::new(PacketType::Context, VrtConfig::v49b()).unwrap();
        assert!(context.set_pad_bit_count(3, 8).unwrap_err().is_unsupported());
        assert!(VrtPacket::default().set_pad_bit_count(32, 8).is_err());
    }

    #[test]
    fn timestamp_fields_splice_in_order() {
        let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        packet.set_stream_identifier(0xDEADBEEF).unwrap();
        let ts = TimeStamp::utc(1_700_000_000, 250).unwrap();
        packet.set_timestamp(ts).unwrap();
        assert_eq!(packet.packet_length(), 20);
        assert_eq!(packet.timestamp(), ts);
        assert_eq!(packet.stream_identifier(), Some(0xDEADBEEF));

        let integer_only = TimeStamp::new(TsiMode::Gps, TsfMode::None, 99, 0).unwrap();
        packet.set_timestamp(integer_only).unwrap();
        assert_eq!(packet.packet_length(), 12);
        assert_eq!(packet.timestamp(), integer_only);

        packet.set_timestamp(TimeStamp::NONE).unwrap();
        assert_eq!(packet.packet_length(), 8);
        assert!(packet.timestamp().is_none());
    }

    #[test]
    fn packet_type_change_resplices_stream_id() {
        let mut packet = VrtPacket::default();
        packet.set_timestamp(TimeStamp::utc(5, 6).unwrap()).unwrap();
        packet.set_payload_length(8).unwrap();
        packet.set_trailer_bit(true).unwrap();
        packet.splice_at("test", 24, 4, true).unwrap();
        assert_eq!(packet.trailer_length(), 4);

        packet.set_packet_type(PacketType::Data).unwrap();
        assert_eq!(packet.packet_type(), PacketType::Data);
        assert!(!packet.has_trailer());
        assert_eq!(packet.stream_identifier(), Some(0));
        assert_eq!(packet.timestamp(), TimeStamp::utc(5, 6).unwrap());
        assert_eq!(packet.payload_length(), 8);
        assert!(lengths_agree(&packet));

        packet.set_packet_type(PacketType::Context).unwrap();
        assert_eq!(packet.prologue_length(), 24);
        assert_eq!(packet.payload_length(), 8);
        assert!(packet.is_valid());

        packet.set_packet_type(PacketType::UnidentifiedData).unwrap();
        assert_eq!(packet.packet_length(), 4 + 12 + 8);
        assert!(lengths_agree(&packet));
    }

    #[test]
    fn views_are_read_only() {
        let owned = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        let bytes = owned.into_bytes();
        let mut view = VrtPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(view.is_read_only());
        assert!(matches!(view.set_stream_identifier(1), Err(VrtError::ReadOnly { .. })));
        let mut copy = view.to_owned_packet();
        copy.set_stream_identifier(1).unwrap();
        assert_eq!(copy.stream_identifier(), Some(1));
    }

    #[test]
    fn check_valid_reports_first_failure() {
        let packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        let mut bytes = packet.into_bytes();
        assert!(VrtPacket::view(&bytes, VrtConfig::default()).unwrap().check_valid(true, Some(8)).is_ok());

        let err = VrtPacket::view(&bytes, VrtConfig::default()).unwrap().check_valid(false, Some(12)).unwrap_err();
        assert!(err.to_string().contains("expected"));

        bytes.extend_from_slice(&[0; 4]);
        let padded = VrtPacket::view(&bytes, VrtConfig::default()).unwrap();
        assert!(padded.check_valid(false, None).is_ok());
        assert!(padded.check_valid(true, None).is_err());

        bytes[0] |= 0x02; // reserved bit 25
        let err = VrtPacket::view(&bytes, VrtConfig::default()).unwrap().check_valid(false, None).unwrap_err();
        assert!(err.to_string().contains("reserved header bits"));

        bytes[0] &= !0x02;
        let truncated = VrtPacket::view(&bytes[..4], VrtConfig::default()).unwrap();
        let err = truncated.check_valid(false, None).unwrap_err();
        assert!(err.to_string().contains("buffer holds 4 bytes"));
    }

    #[test]
    fn class_id_reserved_bits_depend_on_version() {
        let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::v49b()).unwrap();
        packet.set_class_identifier(Some(ClassIdentifier::new(1, 2, 3).unwrap())).unwrap();
        packet.set_pad_bit_count(4, 8).unwrap();
        assert!(packet.is_valid());

        packet.set_config(VrtConfig { version: ProtocolVersion::V49, ..VrtConfig::default() });
        let err = packet.check_valid(false, None).unwrap_err();
        assert!(err.to_string().contains("class identifier reserved bits"));
    }

    #[test]
    fn header_fields_reflect() {
        let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        assert_eq!(packet.field_index("TimeStamp"), Some(2));
        packet.set_field_by_name("StreamIdentifier", Some(Value::UInt32(7))).unwrap();
        assert_eq!(packet.stream_identifier(), Some(7));
        assert_eq!(packet.get_field(2), None);
        let ts = TimeStamp::gps(10, 0).unwrap();
        packet.set_field(2, Some(Value::TimeStamp(ts))).unwrap();
        assert_eq!(packet.get_field(2), Some(Value::TimeStamp(ts)));
        assert!(packet.set_field(0, Some(Value::Bool(true))).is_err());
        assert!(packet.set_field(3, None).is_err());
    }

    #[test]
    fn short_input_is_rejected() {
        let err = VrtPacket::from_bytes(&[0x10, 0x00], VrtConfig::default()).unwrap_err();
        assert!(matches!(err, VrtError::BufferTooShort { needed: 4, available: 2 }));
    }

    #[derive(Debug, Clone)]
    enum Mutation {
        Type(u8),
        Class(Option<u64>),
        Stamp(u8, u8),
        Payload(usize),
        Count(u8),
    }

    fn mutation() -> impl Strategy<Value = Mutation> {
        prop_oneof![
            (0u8..6).prop_map(Mutation::Type),
            proptest::option::of(0u64..0x00FF_FFFF_FFFF_FFFF).prop_map(Mutation::Class),
            (0u8..4, 0u8..4).prop_map(|(i, f)| Mutation::Stamp(i, f)),
            (0usize..16).prop_map(|w| Mutation::Payload(w * 4)),
            (0u8..16).prop_map(Mutation::Count),
        ]
    }

    proptest! {
        #[test]
        fn length_invariant_holds_after_every_mutation(ops in proptest::collection::vec(mutation(), 1..24)) {
            let mut packet = VrtPacket::default();
            for op in ops {
                match op {
                    Mutation::Type(code) => packet.set_packet_type(PacketType::from_code(code)).unwrap(),
                    Mutation::Class(bits) => {
                        let id = bits.map(|b| ClassIdentifier::from_bits(b).unwrap());
                        packet.set_class_identifier(id).unwrap()
                    }
                    Mutation::Stamp(i, f) => {
                        let tsi = TsiMode::from_code(i);
                        let tsf = TsfMode::from_code(f);
                        let seconds = if tsi == TsiMode::None { 0 } else { 42 };
                        let fractional = if tsf == TsfMode::None { 0 } else { 7 };
                        packet.set_timestamp(TimeStamp::new(tsi, tsf, seconds, fractional).unwrap()).unwrap()
                    }
                    Mutation::Payload(len) => packet.set_payload_length(len).unwrap(),
                    Mutation::Count(count) => packet.set_packet_count(count).unwrap(),
                }
                prop_assert!(lengths_agree(&packet));
                prop_assert_eq!(packet.as_bytes().len(), packet.packet_length());
                prop_assert!(packet.check_valid(true, None).is_ok());
            }
        }
    }
}
