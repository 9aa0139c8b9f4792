//! Packet and capture builders shared by unit tests and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use std::path::{Path, PathBuf};

use crate::config::VrtConfig;
use crate::io::{VrtWriter, WriteMode};
use crate::packet::{ContextPacket, DataPacket, Indicator, PacketType, PayloadFormat, TimeStamp, VrtPacket};
use crate::Result;

/// A context packet for `stream_id` at `seconds` UTC carrying a bandwidth.
pub fn context_packet(stream_id: u32, seconds: u32, bandwidth: f64) -> Result<ContextPacket<'static>> {
    let mut packet = ContextPacket::default();
    packet.set_stream_identifier(stream_id)?;
    packet.set_timestamp(TimeStamp::utc(seconds, 0)?)?;
    packet.set_bandwidth(Some(bandwidth))?;
    Ok(packet)
}

/// An INT16 data packet for `stream_id` at `seconds` UTC.
pub fn data_packet(stream_id: u32, seconds: u32, samples: &[i16]) -> Result<DataPacket<'static>> {
    let mut packet = DataPacket::default().with_format(PayloadFormat::INT16);
    packet.set_packet_type(PacketType::Data)?;
    packet.set_stream_identifier(stream_id)?;
    packet.set_timestamp(TimeStamp::utc(seconds, 0)?)?;
    packet.set_data_i16(samples)?;
    Ok(packet)
}

/// Like [`data_packet`], with the over-range indicator reported.
pub fn over_range_packet(stream_id: u32, seconds: u32, over_range: bool) -> Result<DataPacket<'static>> {
    let mut packet = data_packet(stream_id, seconds, &[0; 4])?;
    packet.set_indicator(Indicator::OverRange, Some(over_range))?;
    Ok(packet)
}

/// Encode `packets` as a capture.
pub fn capture(packets: &[VrtPacket<'_>], mode: WriteMode) -> Result<Vec<u8>> {
    let mut writer = VrtWriter::new(Vec::new(), VrtConfig::default(), mode);
    writer.write_frames(packets)?;
    Ok(writer.into_inner())
}

/// Write `packets` as a capture file named `name` under `dir`.
pub fn write_capture(dir: &Path, name: &str, packets: &[VrtPacket<'_>], mode: WriteMode) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut writer = VrtWriter::create(&path, VrtConfig::default(), mode)?;
    writer.write_frames(packets)?;
    writer.flush()?;
    Ok(path)
}
