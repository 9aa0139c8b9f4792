//! VRL frames: a sync word, a frame counter and a word count, then whole VRT
//! packets, then a CRC32 (or the "VEND" no-CRC sentinel).
//!
//! ```text
//! word 0   0x56524C50 ("VRLP")
//! word 1   frame count (31..20) | frame length in words (19..0)
//! ...      packet, packet, ...
//! last     CRC32 over everything before it, or 0x56454E44 ("VEND")
//! ```
//!
//! ```rust
//! use vrtkit::{PacketType, VrlFrame, VrtConfig, VrtPacket};
//!
//! let config = VrtConfig::default();
//! let packets = vec![VrtPacket::new(PacketType::Data, config).unwrap(); 3];
//!
//! let mut frame = VrlFrame::new(config);
//! let packed = frame.set_contained_packets(frame.frame_length() + 16, &packets).unwrap();
//! assert_eq!(packed, 2);
//! assert!(frame.is_valid());
//! assert_eq!(frame.contained_packets().unwrap().len(), 2);
//! ```

use crate::codec::{pack_u32, unpack_u32};
use crate::config::{MAX_FRAME_LENGTH, VrtConfig};
use crate::packet::buffer::Storage;
use crate::packet::splice::{LengthHeader, splice};
use crate::packet::{HEADER_WORD_LENGTH, VrtPacket};
use crate::{Result, VrtError};
use tracing::{debug, trace};

/// Frame alignment word, ASCII "VRLP".
pub const FRAME_ALIGNMENT_WORD: u32 = 0x5652_4C50;
/// Trailer value meaning "no CRC present", ASCII "VEND".
pub const NO_CRC: u32 = 0x5645_4E44;
/// Header and trailer of an empty frame.
pub const MIN_FRAME_LENGTH: usize = FRAME_HEADER_LENGTH + FRAME_TRAILER_LENGTH;
/// Largest frame counter value (12 bits).
pub const MAX_FRAME_COUNT: u16 = 0x0FFF;

const FRAME_HEADER_LENGTH: usize = 8;
const FRAME_TRAILER_LENGTH: usize = 4;
const LENGTH_MASK: u32 = 0x000F_FFFF;

/// A VRL frame over owned or borrowed bytes.
#[derive(Debug, Clone)]
pub struct VrlFrame<'a> {
    storage: Storage<'a>,
    config: VrtConfig,
}

impl Default for VrlFrame<'static> {
    fn default() -> Self {
        Self::new(VrtConfig::default())
    }
}

impl PartialEq for VrlFrame<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl VrlFrame<'static> {
    /// An empty frame with frame count 0.
    ///
    /// The trailer holds a CRC when `config.crc` is set and "VEND" otherwise.
    pub fn new(config: VrtConfig) -> Self {
        let mut bytes = vec![0u8; MIN_FRAME_LENGTH];
        pack_u32(&mut bytes, 0, FRAME_ALIGNMENT_WORD);
        pack_u32(&mut bytes, 4, (MIN_FRAME_LENGTH / 4) as u32);
        let crc = if config.crc { crc32fast::hash(&bytes[..FRAME_HEADER_LENGTH]) } else { NO_CRC };
        pack_u32(&mut bytes, FRAME_HEADER_LENGTH, crc);
        Self { storage: Storage::Owned(bytes), config }
    }

    /// Copy a frame out of `bytes`, truncating to the declared length.
    pub fn from_bytes(bytes: &[u8], config: VrtConfig) -> Result<Self> {
        let declared = declared_length(bytes)?;
        let take = declared.max(FRAME_HEADER_LENGTH).min(bytes.len());
        Ok(Self { storage: Storage::Owned(bytes[..take].to_vec()), config })
    }

    /// Take ownership of `bytes`, truncating to the declared length.
    pub fn from_vec(mut bytes: Vec<u8>, config: VrtConfig) -> Result<Self> {
        let declared = declared_length(&bytes)?;
        bytes.truncate(declared.max(FRAME_HEADER_LENGTH));
        Ok(Self { storage: Storage::Owned(bytes), config })
    }
}

/// Declared frame length in bytes, read from word 1.
fn declared_length(bytes: &[u8]) -> Result<usize> {
    let word = unpack_u32(bytes, 4).ok_or(VrtError::BufferTooShort {
        needed: FRAME_HEADER_LENGTH,
        available: bytes.len(),
    })?;
    Ok((word & LENGTH_MASK) as usize * 4)
}

/// Whether `bytes` starts with the VRL frame alignment word.
pub fn is_frame_start(bytes: &[u8]) -> bool {
    unpack_u32(bytes, 0) == Some(FRAME_ALIGNMENT_WORD)
}

impl<'a> VrlFrame<'a> {
    /// Borrow `bytes` as a read-only frame.
    pub fn view(bytes: &'a [u8], config: VrtConfig) -> Result<Self> {
        declared_length(bytes)?;
        Ok(Self { storage: Storage::View(bytes), config })
    }

    pub fn config(&self) -> VrtConfig {
        self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.storage.is_read_only()
    }

    /// The frame bytes, limited to the declared frame length.
    pub fn as_bytes(&self) -> &[u8] {
        let bytes = self.storage.as_slice();
        &bytes[..self.frame_length().min(bytes.len())]
    }

    /// Consume the frame and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let length = self.frame_length();
        let mut bytes = self.storage.into_vec();
        bytes.truncate(length);
        bytes
    }

    /// Convert into an owned frame, copying only when borrowed.
    pub fn into_owned(self) -> VrlFrame<'static> {
        let config = self.config;
        VrlFrame { storage: Storage::Owned(self.into_bytes()), config }
    }

    fn word(&self, offset: usize) -> u32 {
        unpack_u32(self.storage.as_slice(), offset).unwrap_or(0)
    }

    /// Declared frame length in bytes.
    pub fn frame_length(&self) -> usize {
        (self.word(4) & LENGTH_MASK) as usize * 4
    }

    /// The 12-bit rolling frame counter.
    pub fn frame_count(&self) -> u16 {
        (self.word(4) >> 20) as u16
    }

    /// Set the frame counter and refresh the trailer.
    pub fn set_frame_count(&mut self, count: u16) -> Result<()> {
        if count > MAX_FRAME_COUNT {
            return Err(VrtError::invalid_argument(
                "frame count",
                format!("{count} exceeds the 12-bit maximum of {MAX_FRAME_COUNT}"),
            ));
        }
        let word = self.word(4);
        let buf = self.writable("set_frame_count")?;
        pack_u32(buf, 4, (word & LENGTH_MASK) | ((count as u32) << 20));
        self.seal()
    }

    fn writable(&mut self, operation: &str) -> Result<&mut Vec<u8>> {
        let length = self.frame_length();
        let buf = self.storage.writable(operation)?;
        if buf.len() != length || length < MIN_FRAME_LENGTH {
            return Err(VrtError::invalid_frame(format!(
                "cannot {operation}: buffer holds {} bytes but header declares {length}",
                buf.len()
            )));
        }
        Ok(buf)
    }

    fn trailer_offset(&self) -> usize {
        self.frame_length().saturating_sub(FRAME_TRAILER_LENGTH)
    }

    /// The trailer word: a CRC32 or [`NO_CRC`].
    pub fn crc(&self) -> u32 {
        self.word(self.trailer_offset())
    }

    /// CRC32 over the header and contained packets.
    pub fn compute_crc(&self) -> u32 {
        let bytes = self.storage.as_slice();
        let end = self.trailer_offset().min(bytes.len());
        crc32fast::hash(&bytes[..end])
    }

    /// Whether the trailer is [`NO_CRC`] or matches the frame contents.
    pub fn is_crc_valid(&self) -> bool {
        let crc = self.crc();
        crc == NO_CRC || crc == self.compute_crc()
    }

    /// Write the CRC of the current contents into the trailer.
    pub fn update_crc(&mut self) -> Result<()> {
        let crc = self.compute_crc();
        let at = self.trailer_offset();
        pack_u32(self.writable("update_crc")?, at, crc);
        Ok(())
    }

    /// Replace the CRC with [`NO_CRC`].
    pub fn clear_crc(&mut self) -> Result<()> {
        let at = self.trailer_offset();
        pack_u32(self.writable("clear_crc")?, at, NO_CRC);
        Ok(())
    }

    /// Refresh the trailer after a mutation, following `config.crc`.
    fn seal(&mut self) -> Result<()> {
        if self.config.crc { self.update_crc() } else { self.clear_crc() }
    }

    /// Borrowing walk over the contained packets.
    ///
    /// Each item is a read-only view limited to the packet's declared length.
    /// The walk yields one error and stops when a packet declares fewer than
    /// four bytes, overruns the trailer, or leaves a partial word.
    pub fn packet_views(&self) -> PacketViews<'_> {
        let bytes = self.storage.as_slice();
        let end = self.trailer_offset().min(bytes.len()).max(FRAME_HEADER_LENGTH);
        PacketViews { bytes, offset: FRAME_HEADER_LENGTH, end, config: self.config, done: false }
    }

    /// Owned copies of every contained packet, or the first walk error.
    pub fn contained_packets(&self) -> Result<Vec<VrtPacket<'static>>> {
        self.packet_views().map(|view| view.map(VrtPacket::into_owned)).collect()
    }

    /// Number of contained packets, or the first walk error.
    pub fn contained_packet_count(&self) -> Result<usize> {
        self.packet_views().try_fold(0, |count, view| view.map(|_| count + 1))
    }

    /// Replace the contents with as many leading `packets` as fit in
    /// `max_frame_length` bytes, keeping their order and never splitting one.
    ///
    /// Returns the number of packets stored. The frame count is kept and the
    /// trailer is refreshed. Every packet up to the first one that does not
    /// fit must hold exactly its declared length; otherwise the frame is left
    /// untouched.
    pub fn set_contained_packets(&mut self, max_frame_length: usize, packets: &[VrtPacket<'_>]) -> Result<usize> {
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&max_frame_length) {
            return Err(VrtError::invalid_argument(
                "max frame length",
                format!("{max_frame_length} is outside [{MIN_FRAME_LENGTH}, {MAX_FRAME_LENGTH}]"),
            ));
        }

        let mut length = MIN_FRAME_LENGTH;
        let mut count = 0;
        for (index, packet) in packets.iter().enumerate() {
            let bytes = packet.as_bytes();
            if bytes.len() < 4 || bytes.len() % 4 != 0 || bytes.len() != packet.packet_length() {
                return Err(VrtError::invalid_argument(
                    "packet",
                    format!(
                        "packet {index} holds {} bytes but declares {}",
                        bytes.len(),
                        packet.packet_length()
                    ),
                ));
            }
            let next = length + bytes.len();
            if next > max_frame_length {
                break;
            }
            length = next;
            count += 1;
        }

        let old_body = self.trailer_offset().saturating_sub(FRAME_HEADER_LENGTH);
        let new_body = length - MIN_FRAME_LENGTH;
        let buf = self.writable("set_contained_packets")?;
        splice(buf, FRAME_HEADER_LENGTH, old_body, false, LengthHeader::Frame)?;
        splice(buf, FRAME_HEADER_LENGTH, new_body, true, LengthHeader::Frame)?;

        let mut offset = FRAME_HEADER_LENGTH;
        for packet in &packets[..count] {
            let bytes = packet.as_bytes();
            buf[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += bytes.len();
        }
        self.seal()?;
        debug!(count, offered = packets.len(), length, "Packed packets into VRL frame");
        Ok(count)
    }

    /// Check the frame structure.
    ///
    /// Checks run in order: alignment word, declared length bounds,
    /// `expected_length` (when given), buffer capacity (exact in strict mode),
    /// CRC, and a packet walk that must land exactly on the trailer.
    pub fn check_valid(&self, strict: bool, expected_length: Option<usize>) -> Result<()> {
        let bytes = self.storage.as_slice();
        if !is_frame_start(bytes) {
            return Err(VrtError::invalid_frame(format!(
                "alignment word {:#010x} is not VRLP",
                self.word(0)
            )));
        }

        let length = self.frame_length();
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&length) {
            return Err(VrtError::invalid_frame(format!(
                "frame length {length} is outside [{MIN_FRAME_LENGTH}, {MAX_FRAME_LENGTH}]"
            )));
        }

        if let Some(expected) = expected_length.filter(|expected| *expected != length) {
            return Err(VrtError::invalid_frame(format!(
                "frame length {length} does not match the expected {expected}"
            )));
        }

        let stored = bytes.len();
        if stored < length || (strict && stored != length) {
            return Err(VrtError::invalid_frame(format!(
                "buffer holds {stored} bytes but header declares {length}"
            )));
        }

        if !self.is_crc_valid() {
            return Err(VrtError::invalid_frame(format!(
                "CRC {:#010x} does not match computed {:#010x}",
                self.crc(),
                self.compute_crc()
            )));
        }

        for view in self.packet_views() {
            view?;
        }
        Ok(())
    }

    /// Whether [`check_valid`](Self::check_valid) passes under the configured strictness.
    pub fn is_valid(&self) -> bool {
        self.check_valid(self.config.strict, None).is_ok()
    }
}

/// Iterator returned by [`VrlFrame::packet_views`].
#[derive(Debug, Clone)]
pub struct PacketViews<'f> {
    bytes: &'f [u8],
    offset: usize,
    end: usize,
    config: VrtConfig,
    done: bool,
}

impl<'f> PacketViews<'f> {
    fn fail(&mut self, reason: String) -> Option<Result<VrtPacket<'f>>> {
        self.done = true;
        Some(Err(VrtError::invalid_frame(reason)))
    }
}

impl<'f> Iterator for PacketViews<'f> {
    type Item = Result<VrtPacket<'f>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.end {
            return None;
        }
        let offset = self.offset;
        if self.end - offset < HEADER_WORD_LENGTH {
            return self.fail(format!("{} stray bytes before the trailer", self.end - offset));
        }
        let length = (unpack_u32(self.bytes, offset).unwrap_or(0) & 0xFFFF) as usize * 4;
        if length < HEADER_WORD_LENGTH {
            return self.fail(format!("packet at {offset} declares length {length}"));
        }
        if offset + length > self.end {
            return self.fail(format!(
                "packet at {offset} with length {length} overruns the trailer at {}",
                self.end
            ));
        }
        self.offset += length;
        trace!(offset, length, "Walked VRL packet");
        match VrtPacket::view(&self.bytes[offset..offset + length], self.config) {
            Ok(view) => Some(Ok(view)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    fn data_packet(payload_words: usize, stream_id: u32) -> VrtPacket<'static> {
        let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
        packet.set_stream_identifier(stream_id).unwrap();
        packet.set_payload_length(payload_words * 4).unwrap();
        packet
    }

    #[test]
    fn empty_frame_is_valid() {
        let frame = VrlFrame::default();
        assert_eq!(frame.frame_length(), MIN_FRAME_LENGTH);
        assert_eq!(frame.frame_count(), 0);
        assert!(frame.is_valid());
        assert!(frame.contained_packets().unwrap().is_empty());
        assert_eq!(frame.crc(), frame.compute_crc());

        let plain = VrlFrame::new(VrtConfig { crc: false, ..VrtConfig::default() });
        assert_eq!(plain.crc(), NO_CRC);
        assert!(plain.is_crc_valid());
    }

    #[test]
    fn truncated_packets_leave_the_frame_untouched() {
        let mut frame = VrlFrame::default();
        frame.set_contained_packets(MAX_FRAME_LENGTH, &[data_packet(1, 7)]).unwrap();
        let before = frame.as_bytes().to_vec();

        let bytes = data_packet(2, 9).into_bytes();
        assert_eq!(bytes.len(), 16);
        for cut in [14, 12] {
            let view = VrtPacket::view(&bytes[..cut], VrtConfig::default()).unwrap();
            let err = frame.set_contained_packets(MAX_FRAME_LENGTH, &[data_packet(1, 8), view]).unwrap_err();
            assert!(matches!(err, VrtError::InvalidArgument { .. }), "{err}");
            assert_eq!(frame.as_bytes(), &before[..]);
            assert!(frame.is_valid());
        }
    }

    #[test]
    fn two_packets_fill_the_declared_length() {
        let packets = [data_packet(3, 1), data_packet(5, 2)];
        let mut frame = VrlFrame::default();
        assert_eq!(frame.set_contained_packets(MAX_FRAME_LENGTH, &packets).unwrap(), 2);

        let total: usize = packets.iter().map(VrtPacket::packet_length).sum();
        assert_eq!(frame.frame_length(), total + MIN_FRAME_LENGTH);
        assert!(frame.check_valid(true, Some(total + MIN_FRAME_LENGTH)).is_ok());

        let bytes = frame.as_bytes().to_vec();
        let truncated = VrlFrame::view(&bytes[..bytes.len() - 1], VrtConfig::default()).unwrap();
        assert!(!truncated.is_valid());

        let copies = frame.contained_packets().unwrap();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[1].stream_identifier(), Some(2));
        assert_eq!(copies[0], packets[0]);
    }

    #[test]
    fn packing_is_greedy_and_whole() {
        let packets = [data_packet(2, 1), data_packet(2, 2), data_packet(2, 3)];
        let each = packets[0].packet_length();
        let mut frame = VrlFrame::default();
        let budget = MIN_FRAME_LENGTH + 2 * each + each / 2;
        assert_eq!(frame.set_contained_packets(budget, &packets).unwrap(), 2);
        assert_eq!(frame.frame_length(), MIN_FRAME_LENGTH + 2 * each);

        // Repacking replaces the previous contents.
        assert_eq!(frame.set_contained_packets(MAX_FRAME_LENGTH, &packets[2..]).unwrap(), 1);
        assert_eq!(frame.contained_packet_count().unwrap(), 1);
        assert!(frame.is_valid());

        assert!(frame.set_contained_packets(MIN_FRAME_LENGTH - 4, &packets).is_err());
    }

    #[test]
    fn corrupt_walks_fail_as_a_whole() {
        let packets = [data_packet(1, 1), data_packet(1, 2)];
        let mut frame = VrlFrame::new(VrtConfig { crc: false, ..VrtConfig::default() });
        frame.set_contained_packets(MAX_FRAME_LENGTH, &packets).unwrap();
        let mut bytes = frame.into_bytes();

        // Second packet claims one more word than the frame holds.
        let second = FRAME_HEADER_LENGTH + packets[0].packet_length();
        let words = crate::codec::unpack_u16(&bytes, second + 2).unwrap();
        crate::codec::pack_u16(&mut bytes, second + 2, words + 1);
        let frame = VrlFrame::view(&bytes, VrtConfig::default()).unwrap();
        assert!(frame.contained_packets().is_err());
        assert!(!frame.is_valid());

        // A zero-length packet can never advance the walk.
        crate::codec::pack_u16(&mut bytes, second + 2, 0);
        let frame = VrlFrame::view(&bytes, VrtConfig::default()).unwrap();
        let results: Vec<_> = frame.packet_views().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn crc_tracks_contents() {
        let mut frame = VrlFrame::default();
        frame.set_contained_packets(MAX_FRAME_LENGTH, &[data_packet(2, 9)]).unwrap();
        assert!(frame.is_crc_valid());

        let mut bytes = frame.as_bytes().to_vec();
        bytes[FRAME_HEADER_LENGTH + 4] ^= 0x01;
        let damaged = VrlFrame::from_vec(bytes, VrtConfig::default()).unwrap();
        assert!(!damaged.is_crc_valid());
        let err = damaged.check_valid(false, None).unwrap_err();
        assert!(err.is_structural());

        let mut repaired = damaged.clone();
        repaired.update_crc().unwrap();
        assert!(repaired.is_valid());
        repaired.clear_crc().unwrap();
        assert_eq!(repaired.crc(), NO_CRC);
        assert!(repaired.is_valid());
    }

    #[test]
    fn frame_count_is_twelve_bits() {
        let mut frame = VrlFrame::default();
        frame.set_frame_count(0xABC).unwrap();
        assert_eq!(frame.frame_count(), 0xABC);
        assert_eq!(frame.frame_length(), MIN_FRAME_LENGTH);
        assert!(frame.is_valid());
        assert!(frame.set_frame_count(0x1000).is_err());
        assert_eq!(frame.frame_count(), 0xABC);
    }

    #[test]
    fn views_are_read_only() {
        let bytes = VrlFrame::default().into_bytes();
        let mut view = VrlFrame::view(&bytes, VrtConfig::default()).unwrap();
        assert!(view.is_read_only());
        assert!(matches!(view.set_frame_count(1), Err(VrtError::ReadOnly { .. })));
        assert!(matches!(
            view.set_contained_packets(MAX_FRAME_LENGTH, &[]),
            Err(VrtError::ReadOnly { .. })
        ));
        assert!(view.clone().into_owned().set_frame_count(1).is_ok());
    }

    #[test]
    fn bad_alignment_word() {
        let mut bytes = VrlFrame::default().into_bytes();
        bytes[0] = 0;
        let frame = VrlFrame::from_vec(bytes, VrtConfig::default()).unwrap();
        assert!(!is_frame_start(frame.as_bytes()));
        assert!(matches!(frame.check_valid(false, None), Err(VrtError::InvalidFrame { .. })));
    }
}
