//! Source trait for packet streams.

use crate::Result;
use crate::packet::VrtPacket;

/// An asynchronous source of VRT packets.
///
/// Sources handle their own pacing: a replay source sleeps between packets,
/// a network source would wait on its socket.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// The next packet.
    ///
    /// Returns:
    /// - `Ok(Some(packet))` - a packet arrived
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - the source failed; the caller may retry
    async fn next_packet(&mut self) -> Result<Option<VrtPacket<'static>>>;

    /// Nominal packets per second, if the source is paced at a fixed rate.
    fn packet_rate(&self) -> Option<f64> {
        None
    }
}
