//! Capture writer.

use crate::config::VrtConfig;
use crate::frame::{MAX_FRAME_COUNT, VrlFrame};
use crate::packet::VrtPacket;
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, trace, warn};

/// How packets are laid out in the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
    /// Packets back to back.
    #[default]
    Bare,
    /// Packets wrapped in VRL frames.
    Framed,
}

/// Writes packets to a byte stream.
///
/// In [`WriteMode::Framed`] every frame takes the next value of a rolling
/// 12-bit frame counter and carries a CRC when `config.crc` is set.
pub struct VrtWriter<W: Write> {
    inner: W,
    config: VrtConfig,
    mode: WriteMode,
    frame_count: u16,
    frames_written: u64,
    packets_written: u64,
}

impl VrtWriter<BufWriter<File>> {
    /// Create (or truncate) a capture file.
    pub fn create<P: AsRef<Path>>(path: P, config: VrtConfig, mode: WriteMode) -> Result<Self> {
        let file = File::create(&path)
            .map_err(|e| VrtError::File { path: path.as_ref().to_path_buf(), source: e })?;
        debug!(path = %path.as_ref().display(), ?mode, "Created VRT capture");
        Ok(Self::new(BufWriter::new(file), config, mode))
    }
}

impl<W: Write> VrtWriter<W> {
    pub fn new(inner: W, config: VrtConfig, mode: WriteMode) -> Self {
        Self { inner, config, mode, frame_count: 0, frames_written: 0, packets_written: 0 }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Counter value the next frame will carry.
    pub fn next_frame_count(&self) -> u16 {
        self.frame_count
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Write one packet, in its own frame when framing.
    pub fn write_packet(&mut self, packet: &VrtPacket<'_>) -> Result<()> {
        match self.mode {
            WriteMode::Bare => {
                packet.check_valid(self.config.strict, None)?;
                self.inner.write_all(packet.as_bytes())?;
                self.packets_written += 1;
                trace!(length = packet.packet_length(), "Wrote packet");
                Ok(())
            }
            WriteMode::Framed => self.write_frames(std::slice::from_ref(packet)).map(|_| ()),
        }
    }

    /// Write `packets` in order, filling each frame up to
    /// `config.max_frame_length`. In bare mode this writes them back to back.
    ///
    /// Returns the number of frames written. Every packet is checked before
    /// anything is written.
    pub fn write_frames(&mut self, packets: &[VrtPacket<'_>]) -> Result<usize> {
        for packet in packets {
            packet.check_valid(self.config.strict, None)?;
        }
        if self.mode == WriteMode::Bare {
            for packet in packets {
                self.write_packet(packet)?;
            }
            return Ok(0);
        }

        let mut remaining = packets;
        let mut frames = 0;
        while !remaining.is_empty() {
            let mut frame = VrlFrame::new(self.config);
            frame.set_frame_count(self.frame_count)?;
            let packed = frame.set_contained_packets(self.config.max_frame_length, remaining)?;
            if packed == 0 {
                return Err(VrtError::invalid_argument(
                    "packet length",
                    format!(
                        "{} byte packet does not fit in a {} byte frame",
                        remaining[0].packet_length(),
                        self.config.max_frame_length
                    ),
                ));
            }
            self.inner.write_all(frame.as_bytes())?;
            trace!(count = self.frame_count, packets = packed, length = frame.frame_length(), "Wrote VRL frame");
            self.frame_count = (self.frame_count + 1) & MAX_FRAME_COUNT;
            self.frames_written += 1;
            self.packets_written += packed as u64;
            remaining = &remaining[packed..];
            frames += 1;
        }
        Ok(frames)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> W {
        if let Err(err) = self.inner.flush() {
            warn!(%err, "Flush failed while releasing VRT writer");
        }
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{MIN_FRAME_LENGTH, NO_CRC, is_frame_start};
    use crate::io::VrtReader;
    use crate::packet::PacketType;
    use std::io::Cursor;

    fn packets(count: usize, payload_words: usize) -> Vec<VrtPacket<'static>> {
        (0..count)
            .map(|i| {
                let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
                packet.set_stream_identifier(i as u32).unwrap();
                packet.set_payload_length(payload_words * 4).unwrap();
                packet
            })
            .collect()
    }

    #[test]
    fn bare_output_is_the_packets() {
        let input = packets(3, 2);
        let mut writer = VrtWriter::new(Vec::new(), VrtConfig::default(), WriteMode::Bare);
        assert_eq!(writer.write_frames(&input).unwrap(), 0);
        assert_eq!(writer.packets_written(), 3);
        let output = writer.into_inner();
        let expected: Vec<u8> = input.iter().flat_map(|p| p.as_bytes().to_vec()).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn frames_split_at_the_configured_length() {
        let input = packets(5, 2);
        let each = input[0].packet_length();
        let config = VrtConfig { max_frame_length: MIN_FRAME_LENGTH + 2 * each, ..VrtConfig::default() };
        let mut writer = VrtWriter::new(Vec::new(), config, WriteMode::Framed);
        assert_eq!(writer.write_frames(&input).unwrap(), 3);
        assert_eq!(writer.next_frame_count(), 3);
        let output = writer.into_inner();
        assert!(is_frame_start(&output));

        let mut reader = VrtReader::new(Cursor::new(output), config);
        let read: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(read, input);
        assert_eq!(reader.frames_read(), 3);
        assert_eq!(reader.crc_errors(), 0);
    }

    #[test]
    fn frame_counter_rolls_over() {
        let mut writer = VrtWriter::new(Vec::new(), VrtConfig::default(), WriteMode::Framed);
        writer.frame_count = MAX_FRAME_COUNT;
        let input = packets(2, 0);
        writer.write_packet(&input[0]).unwrap();
        writer.write_packet(&input[1]).unwrap();
        assert_eq!(writer.next_frame_count(), 1);

        let output = writer.into_inner();
        let first = VrlFrame::view(&output, VrtConfig::default()).unwrap();
        assert_eq!(first.frame_count(), MAX_FRAME_COUNT);
        let second = VrlFrame::view(&output[first.frame_length()..], VrtConfig::default()).unwrap();
        assert_eq!(second.frame_count(), 0);
    }

    #[test]
    fn crc_follows_config() {
        let config = VrtConfig { crc: false, ..VrtConfig::default() };
        let mut writer = VrtWriter::new(Vec::new(), config, WriteMode::Framed);
        writer.write_packet(&packets(1, 1)[0]).unwrap();
        let frame = VrlFrame::from_vec(writer.into_inner(), config).unwrap();
        assert_eq!(frame.crc(), NO_CRC);
        assert!(frame.is_valid());
    }

    #[test]
    fn oversized_and_invalid_packets_are_rejected() {
        let config = VrtConfig { max_frame_length: MIN_FRAME_LENGTH + 8, ..VrtConfig::default() };
        let mut writer = VrtWriter::new(Vec::new(), config, WriteMode::Framed);
        assert!(matches!(
            writer.write_frames(&packets(1, 4)),
            Err(VrtError::InvalidArgument { .. })
        ));

        let mut bytes = packets(1, 1).remove(0).into_bytes();
        bytes.truncate(8);
        let truncated = VrtPacket::view(&bytes, config).unwrap();
        assert!(writer.write_packet(&truncated).is_err());
        assert_eq!(writer.packets_written(), 0);
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.vrl");
        let input = packets(4, 3);
        {
            let mut writer = VrtWriter::create(&path, VrtConfig::default(), WriteMode::Framed).unwrap();
            writer.write_frames(&input).unwrap();
            writer.flush().unwrap();
        }
        let read: Vec<_> = VrtReader::open(&path, VrtConfig::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(read, input);
    }
}
