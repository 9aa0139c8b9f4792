//! Replay provider for VRT capture files

use std::io::Cursor;
use std::path::Path;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, trace};

use crate::config::VrtConfig;
use crate::io::VrtReader;
use crate::packet::{TimeStamp, VrtPacket};
use crate::provider::PacketSource;
use crate::{Result, VrtError};

/// How a replay spaces its packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// As fast as the consumer reads.
    Unpaced,
    /// A fixed number of packets per second.
    Rate(f64),
    /// Follow the packet timestamps, scaled by a speed multiplier.
    TimeStamps { speed: f64 },
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::TimeStamps { speed: 1.0 }
    }
}

/// Replays a capture held in memory.
pub struct ReplayProvider {
    reader: VrtReader<Cursor<Vec<u8>>>,
    pacing: Pacing,
    interval: Option<Interval>,
    /// First timestamped packet and when it was released.
    origin: Option<(TimeStamp, Instant)>,
    total_bytes: usize,
}

impl ReplayProvider {
    /// Load a capture file for replay.
    pub fn open<P: AsRef<Path>>(path: P, config: VrtConfig) -> Result<Self> {
        let bytes = std::fs::read(&path)
            .map_err(|e| VrtError::File { path: path.as_ref().to_path_buf(), source: e })?;
        info!("Opened VRT capture {} ({} bytes)", path.as_ref().display(), bytes.len());
        Ok(Self::from_bytes(bytes, config))
    }

    /// Replay a capture already in memory.
    pub fn from_bytes(bytes: Vec<u8>, config: VrtConfig) -> Self {
        let total_bytes = bytes.len();
        Self {
            reader: VrtReader::new(Cursor::new(bytes), config),
            pacing: Pacing::default(),
            interval: None,
            origin: None,
            total_bytes,
        }
    }

    /// Builder-style [`set_pacing`](Self::set_pacing).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.set_pacing(pacing);
        self
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Change the pacing. Rates and speeds are clamped to a usable range.
    pub fn set_pacing(&mut self, pacing: Pacing) {
        self.pacing = match pacing {
            Pacing::Unpaced => Pacing::Unpaced,
            Pacing::Rate(rate) => Pacing::Rate(rate.clamp(0.001, 1.0e6)),
            Pacing::TimeStamps { speed } => Pacing::TimeStamps { speed: speed.clamp(0.1, 10.0) },
        };
        self.interval = None;
        self.origin = None;
        debug!("Replay pacing set to {:?}", self.pacing);
    }

    /// Fraction of the capture consumed so far.
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.reader.get_ref().position() as f64 / self.total_bytes as f64
    }

    /// Wait until `packet` is due.
    async fn pace(&mut self, packet: &VrtPacket<'_>) {
        match self.pacing {
            Pacing::Unpaced => {}
            Pacing::Rate(rate) => {
                let ticker = self.interval.get_or_insert_with(|| {
                    let mut ticker = interval(Duration::from_secs_f64(1.0 / rate));
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker
                });
                ticker.tick().await;
            }
            Pacing::TimeStamps { speed } => {
                let timestamp = packet.timestamp();
                if timestamp.is_none() {
                    return;
                }
                let Some((first, started)) = self.origin else {
                    self.origin = Some((timestamp, Instant::now()));
                    return;
                };
                match timestamp.picoseconds_since(&first) {
                    Some(elapsed) if elapsed > 0 => {
                        let due = started + Duration::from_secs_f64(elapsed as f64 / 1.0e12 / speed);
                        sleep_until(due).await;
                    }
                    Some(_) => {}
                    None => self.origin = Some((timestamp, Instant::now())),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PacketSource for ReplayProvider {
    async fn next_packet(&mut self) -> Result<Option<VrtPacket<'static>>> {
        let Some(packet) = self.reader.read_packet()? else {
            debug!(
                "Reached end of replay after {} packets in {} frames",
                self.reader.packets_read(),
                self.reader.frames_read()
            );
            return Ok(None);
        };
        self.pace(&packet).await;
        trace!(
            "Packet {}: type={}, length={}",
            self.reader.packets_read(),
            packet.packet_type(),
            packet.packet_length()
        );
        Ok(Some(packet))
    }

    fn packet_rate(&self) -> Option<f64> {
        match self.pacing {
            Pacing::Rate(rate) => Some(rate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{VrtWriter, WriteMode};
    use crate::packet::PacketType;

    fn capture(seconds: &[u32]) -> Vec<u8> {
        let config = VrtConfig::default();
        let mut writer = VrtWriter::new(Vec::new(), config, WriteMode::Framed);
        for (i, second) in seconds.iter().enumerate() {
            let mut packet = VrtPacket::new(PacketType::Data, config).unwrap();
            packet.set_stream_identifier(i as u32).unwrap();
            packet.set_timestamp(TimeStamp::utc(*second, 0).unwrap()).unwrap();
            writer.write_packet(&packet).unwrap();
        }
        writer.into_inner()
    }

    #[tokio::test(start_paused = true)]
    async fn timestamps_set_the_pace() {
        let mut provider = ReplayProvider::from_bytes(capture(&[100, 101, 103]), VrtConfig::default());
        let start = Instant::now();
        let mut ids = Vec::new();
        while let Some(packet) = provider.next_packet().await.unwrap() {
            ids.push(packet.stream_identifier());
        }
        assert_eq!(ids, vec![Some(0), Some(1), Some(2)]);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(provider.progress(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_scales_the_pace() {
        let mut provider = ReplayProvider::from_bytes(capture(&[0, 4]), VrtConfig::default())
            .with_pacing(Pacing::TimeStamps { speed: 2.0 });
        let start = Instant::now();
        while provider.next_packet().await.unwrap().is_some() {}
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_rate_pacing() {
        let mut provider = ReplayProvider::from_bytes(capture(&[5, 5, 5, 5, 5]), VrtConfig::default())
            .with_pacing(Pacing::Rate(10.0));
        assert_eq!(provider.packet_rate(), Some(10.0));
        let start = Instant::now();
        let mut count = 0;
        while provider.next_packet().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn unpaced_replay_and_missing_files() {
        let mut provider =
            ReplayProvider::from_bytes(capture(&[1, 2]), VrtConfig::default()).with_pacing(Pacing::Unpaced);
        assert!(provider.next_packet().await.unwrap().is_some());
        assert!(provider.next_packet().await.unwrap().is_some());
        assert!(provider.next_packet().await.unwrap().is_none());

        assert!(ReplayProvider::open("/nonexistent/capture.vrl", VrtConfig::default()).is_err());
        assert_eq!(Pacing::default(), Pacing::TimeStamps { speed: 1.0 });
    }
}
