//! Capture reader.

use crate::config::VrtConfig;
use crate::factory::{AnyPacket, PacketFactory};
use crate::frame::{FRAME_ALIGNMENT_WORD, MAX_FRAME_COUNT, MIN_FRAME_LENGTH, VrlFrame};
use crate::packet::{HEADER_WORD_LENGTH, VrtPacket};
use crate::{Result, VrtError};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Reads owned packets from a stream of bare VRT packets and VRL frames.
///
/// Frames with a bad CRC are logged and their packets still returned; frames
/// whose packet walk fails, and truncated packets, are errors.
pub struct VrtReader<R> {
    inner: R,
    config: VrtConfig,
    pending: VecDeque<VrtPacket<'static>>,
    next_frame_count: Option<u16>,
    frames_read: u64,
    packets_read: u64,
    crc_errors: u64,
}

impl VrtReader<BufReader<File>> {
    /// Open a capture file.
    pub fn open<P: AsRef<Path>>(path: P, config: VrtConfig) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| VrtError::File { path: path.as_ref().to_path_buf(), source: e })?;
        debug!(path = %path.as_ref().display(), "Opened VRT capture");
        Ok(Self::new(BufReader::new(file), config))
    }
}

impl<R: Read> VrtReader<R> {
    pub fn new(inner: R, config: VrtConfig) -> Self {
        Self {
            inner,
            config,
            pending: VecDeque::new(),
            next_frame_count: None,
            frames_read: 0,
            packets_read: 0,
            crc_errors: 0,
        }
    }

    /// VRL frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Packets returned so far.
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Frames whose CRC did not match.
    pub fn crc_errors(&self) -> u64 {
        self.crc_errors
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The next packet, or `None` at a clean end of stream.
    pub fn read_packet(&mut self) -> Result<Option<VrtPacket<'static>>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                self.packets_read += 1;
                return Ok(Some(packet));
            }
            let Some(word) = self.read_word()? else {
                return Ok(None);
            };
            if u32::from_be_bytes(word) == FRAME_ALIGNMENT_WORD {
                self.read_frame(word)?;
                continue;
            }

            let length = (u32::from_be_bytes(word) & 0xFFFF) as usize * 4;
            if length < HEADER_WORD_LENGTH {
                return Err(VrtError::parse("capture", "packet declares a length of zero"));
            }
            let bytes = self.read_rest(word, length)?;
            self.packets_read += 1;
            return VrtPacket::from_vec(bytes, self.config).map(Some);
        }
    }

    /// The next packet wrapped by `factory`.
    pub fn read_with<F: PacketFactory + ?Sized>(&mut self, factory: &F) -> Result<Option<AnyPacket>> {
        Ok(self.read_packet()?.map(|packet| factory.build(packet)))
    }

    fn read_frame(&mut self, first: [u8; 4]) -> Result<()> {
        let Some(second) = self.read_word()? else {
            return Err(VrtError::parse("capture", "stream ends inside a VRL frame header"));
        };
        let length = (u32::from_be_bytes(second) & 0x000F_FFFF) as usize * 4;
        if length < MIN_FRAME_LENGTH {
            return Err(VrtError::parse("capture", format!("VRL frame declares length {length}")));
        }
        let mut bytes = Vec::with_capacity(length);
        bytes.extend_from_slice(&first);
        bytes.extend_from_slice(&second);
        bytes.resize(length, 0);
        self.fill(&mut bytes[8..])?;

        let frame = VrlFrame::from_vec(bytes, self.config)?;
        self.frames_read += 1;
        if !frame.is_crc_valid() {
            self.crc_errors += 1;
            warn!(
                frame = self.frames_read,
                crc = frame.crc(),
                computed = frame.compute_crc(),
                "VRL frame CRC mismatch"
            );
        }
        let count = frame.frame_count();
        if let Some(expected) = self.next_frame_count.filter(|expected| *expected != count) {
            warn!(expected, count, "VRL frame count gap");
        }
        self.next_frame_count = Some((count + 1) & MAX_FRAME_COUNT);

        self.pending.extend(frame.contained_packets()?);
        Ok(())
    }

    /// A whole word, `None` at a clean end of stream.
    fn read_word(&mut self) -> Result<Option<[u8; 4]>> {
        let mut word = [0u8; 4];
        let mut filled = 0;
        while filled < word.len() {
            match self.inner.read(&mut word[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            4 => Ok(Some(word)),
            n => Err(VrtError::parse("capture", format!("stream ends after {n} bytes of a header word"))),
        }
    }

    fn read_rest(&mut self, first: [u8; 4], length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        bytes[..4].copy_from_slice(&first);
        self.fill(&mut bytes[4..])?;
        Ok(bytes)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let expected = buf.len();
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                VrtError::parse("capture", format!("stream ends with up to {expected} bytes missing"))
            }
            _ => e.into(),
        })
    }
}

impl<R: Read> Iterator for VrtReader<R> {
    type Item = Result<VrtPacket<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_packet().transpose()
    }
}
