//! In-place insertion and removal of field-sized gaps.
//!
//! Every optional-field mutator goes through [`splice`]: it opens a
//! zero-filled gap (or closes one) at a byte offset and keeps the length
//! header of the enclosing structure in step with the buffer size.

use super::types::MAX_PACKET_LENGTH;
use crate::codec::{pack_u16, pack_u32, unpack_u32};
use crate::{Result, VrtError};
use tracing::trace;

/// Where the length of the spliced structure is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthHeader {
    /// VRT packet: 16-bit word count in bytes 2..4.
    Packet,
    /// VRL frame: 20-bit word count in the low bits of word 1.
    Frame,
    /// No length header (free-standing records).
    None,
}

impl LengthHeader {
    fn max_length(self) -> usize {
        match self {
            LengthHeader::Packet => MAX_PACKET_LENGTH,
            LengthHeader::Frame => crate::config::MAX_FRAME_LENGTH,
            LengthHeader::None => usize::MAX,
        }
    }

    fn write(self, buf: &mut [u8], length: usize) {
        match self {
            LengthHeader::Packet => pack_u16(buf, 2, (length / 4) as u16),
            LengthHeader::Frame => {
                let word = unpack_u32(buf, 4).unwrap_or(0);
                pack_u32(buf, 4, (word & 0xFFF0_0000) | ((length / 4) as u32 & 0x000F_FFFF));
            }
            LengthHeader::None => {}
        }
    }
}

/// Insert (or remove) `byte_count` bytes at `offset` and update the length header.
///
/// Inserted bytes are zero. All arguments are validated before the buffer is
/// touched, so a failed call leaves the buffer unchanged. A single
/// reservation is made before inserting.
pub fn splice(
    buf: &mut Vec<u8>,
    offset: usize,
    byte_count: usize,
    insert: bool,
    header: LengthHeader,
) -> Result<()> {
    if byte_count == 0 {
        return Ok(());
    }
    if header != LengthHeader::None && byte_count % 4 != 0 {
        return Err(VrtError::invalid_argument(
            "splice length",
            format!("{byte_count} bytes is not a whole number of words"),
        ));
    }

    if insert {
        if offset > buf.len() {
            return Err(VrtError::invalid_argument(
                "splice offset",
                format!("offset {offset} is past the end of a {} byte buffer", buf.len()),
            ));
        }
        let new_length = buf.len() + byte_count;
        if new_length > header.max_length() {
            return Err(VrtError::invalid_argument(
                "length",
                format!("{new_length} bytes exceeds the maximum of {}", header.max_length()),
            ));
        }
        buf.reserve_exact(byte_count);
        buf.splice(offset..offset, std::iter::repeat_n(0u8, byte_count));
    } else {
        let end = offset.checked_add(byte_count).filter(|end| *end <= buf.len()).ok_or_else(|| {
            VrtError::invalid_argument(
                "splice range",
                format!("{byte_count} bytes at {offset} exceeds a {} byte buffer", buf.len()),
            )
        })?;
        buf.drain(offset..end);
    }

    let length = buf.len();
    header.write(buf, length);
    trace!(offset, byte_count, insert, length, "Spliced buffer");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn packet(words: usize) -> Vec<u8> {
        let mut buf = vec![0xAAu8; words * 4];
        pack_u16(&mut buf, 0, 0x1000);
        pack_u16(&mut buf, 2, words as u16);
        buf
    }

    #[test]
    fn insert_zero_fills_and_updates_length() {
        let mut buf = packet(2);
        splice(&mut buf, 4, 8, true, LengthHeader::Packet).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[4..12], &[0u8; 8]);
        assert_eq!(&buf[12..16], &[0xAA; 4]);
        assert_eq!(crate::codec::unpack_u16(&buf, 2), Some(4));
    }

    #[test]
    fn remove_updates_length() {
        let mut buf = packet(3);
        splice(&mut buf, 4, 4, false, LengthHeader::Packet).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(crate::codec::unpack_u16(&buf, 2), Some(2));
    }

    #[test]
    fn frame_length_keeps_frame_count() {
        let mut buf = vec![0u8; 12];
        pack_u32(&mut buf, 4, 0xABC0_0003);
        splice(&mut buf, 8, 4, true, LengthHeader::Frame).unwrap();
        assert_eq!(unpack_u32(&buf, 4), Some(0xABC0_0004));
    }

    #[test]
    fn invalid_requests_leave_buffer_untouched() {
        let mut buf = packet(2);
        let before = buf.clone();
        assert!(splice(&mut buf, 4, 3, true, LengthHeader::Packet).is_err());
        assert!(splice(&mut buf, 12, 4, true, LengthHeader::Packet).is_err());
        assert!(splice(&mut buf, 4, 8, false, LengthHeader::Packet).is_err());
        assert!(splice(&mut buf, 4, MAX_PACKET_LENGTH, true, LengthHeader::Packet).is_err());
        assert_eq!(buf, before);
    }

    proptest! {
        #[test]
        fn insert_then_remove_restores_buffer(
            words in 1usize..32,
            at_word in 0usize..32,
            gap_words in 1usize..8,
        ) {
            let mut buf = packet(words);
            let before = buf.clone();
            let offset = (at_word % words + 1).min(words) * 4;
            splice(&mut buf, offset, gap_words * 4, true, LengthHeader::Packet).unwrap();
            prop_assert!(buf[offset..offset + gap_words * 4].iter().all(|b| *b == 0));
            splice(&mut buf, offset, gap_words * 4, false, LengthHeader::Packet).unwrap();
            prop_assert_eq!(buf, before);
        }
    }
}
