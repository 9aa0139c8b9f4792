//! Reading and writing VRT captures.
//!
//! A capture is a byte stream of bare VRT packets, of VRL frames, or of a mix
//! of both. [`VrtReader`] tells them apart by the frame alignment word and
//! yields owned packets either way. [`VrtWriter`] writes bare packets or wraps
//! them in VRL frames with a rolling frame counter.
//!
//! ```rust
//! use std::io::Cursor;
//! use vrtkit::io::{VrtReader, VrtWriter, WriteMode};
//! use vrtkit::{PacketType, VrtConfig, VrtPacket};
//!
//! let config = VrtConfig::default();
//! let packet = VrtPacket::new(PacketType::Data, config).unwrap();
//!
//! let mut writer = VrtWriter::new(Vec::new(), config, WriteMode::Framed);
//! writer.write_packet(&packet).unwrap();
//! let capture = writer.into_inner();
//!
//! let packets: Vec<_> = VrtReader::new(Cursor::new(capture), config)
//!     .collect::<vrtkit::Result<_>>()
//!     .unwrap();
//! assert_eq!(packets, vec![packet]);
//! ```

mod reader;
mod writer;

pub use reader::VrtReader;
pub use writer::{VrtWriter, WriteMode};
