//! Driver spawns and manages the packet processing task

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::VrtConfig;
use crate::factory::{AnyPacket, PacketFactory};
use crate::provider::PacketSource;
use crate::state::{StreamSnapshot, StreamState, Triggers};

/// Provider errors tolerated in a row before the driver gives up.
const MAX_ERRORS: u32 = 10;

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Latest packet read from the source
    pub packets: watch::Receiver<Option<Arc<AnyPacket>>>,
    /// Latest triggered stream snapshot
    pub states: watch::Receiver<Option<Arc<StreamSnapshot>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Runs a [`PacketSource`] and keeps one [`StreamState`] per stream id.
///
/// Every packet is published on the packet channel. A snapshot is published
/// on the state channel whenever a packet fires the stream's triggers, and
/// once more for every stream when the source is exhausted. Both senders are
/// dropped when the task ends, which ends any `WatchStream` built on them.
pub struct Driver;

impl Driver {
    /// Spawn the driver task for `source`.
    pub fn spawn<S>(
        source: S,
        factory: Arc<dyn PacketFactory>,
        triggers: Triggers,
        config: VrtConfig,
    ) -> DriverChannels
    where
        S: PacketSource,
    {
        let (packet_tx, packet_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let task = StreamTask { factory, triggers, config, states: HashMap::new(), packet_tx, state_tx };
        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            task.run(source, cancel_task).await;
        });

        DriverChannels { packets: packet_rx, states: state_rx, cancel }
    }
}

struct StreamTask {
    factory: Arc<dyn PacketFactory>,
    triggers: Triggers,
    config: VrtConfig,
    states: HashMap<Option<u32>, StreamState>,
    packet_tx: watch::Sender<Option<Arc<AnyPacket>>>,
    state_tx: watch::Sender<Option<Arc<StreamSnapshot>>>,
}

impl StreamTask {
    async fn run<S: PacketSource>(mut self, mut source: S, cancel: CancellationToken) {
        info!("Packet reader task started");
        let mut packet_count = 0u64;
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Packet reader cancelled");
                    break;
                }
                result = source.next_packet() => result,
            };

            match result {
                Ok(Some(packet)) => {
                    packet_count += 1;
                    error_count = 0;
                    let packet = self.factory.build(packet);
                    trace!(
                        "Packet {}: type={}, stream={:?}",
                        packet_count,
                        packet.packet_type(),
                        packet.stream_identifier()
                    );
                    self.track(&packet);

                    if self.packet_tx.send(Some(Arc::new(packet))).is_err() && self.state_tx.is_closed() {
                        debug!("All receivers dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Packet source ended after {} packets", packet_count);
                    self.publish_final();
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Packet source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many packet source errors, shutting down");
                        self.publish_final();
                        break;
                    }

                    // 50ms, 100ms, 200ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("Packet reader task ended (processed {} packets, {} streams)", packet_count, self.states.len());
    }

    /// Fold `packet` into its stream's state, publishing a snapshot on trigger.
    fn track(&mut self, packet: &AnyPacket) {
        let stream_id = packet.stream_identifier();
        let state = self.states.entry(stream_id).or_insert_with(|| {
            debug!("Tracking new stream {:?}", stream_id);
            let mut state = StreamState::new(self.config);
            state.set_triggers(self.triggers.clone());
            state
        });

        let result = match packet {
            AnyPacket::Context(context) => state.update_context(context),
            AnyPacket::Data(data) => state.update_data(data),
            AnyPacket::Other(_) => Ok(false),
        };
        match result {
            Ok(true) => {
                let snapshot = Self::snapshot_of(stream_id, state);
                let _ = self.state_tx.send(Some(Arc::new(snapshot)));
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to update stream {:?}: {}", stream_id, e),
        }
    }

    fn publish_final(&self) {
        let mut ids: Vec<_> = self.states.keys().copied().collect();
        ids.sort_unstable();
        for stream_id in ids {
            if let Some(state) = self.states.get(&stream_id) {
                let _ = self.state_tx.send(Some(Arc::new(Self::snapshot_of(stream_id, state))));
            }
        }
    }

    fn snapshot_of(stream_id: Option<u32>, state: &StreamState) -> StreamSnapshot {
        let mut snapshot = state.snapshot();
        snapshot.stream_id = stream_id;
        snapshot
    }
}
