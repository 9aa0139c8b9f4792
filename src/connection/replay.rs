//! Replay connection for VRT captures

use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::VrtConfig;
use crate::driver::Driver;
use crate::factory::{AnyPacket, DefaultPacketFactory, PacketFactory};
use crate::provider::PacketSource;
use crate::providers::replay::ReplayProvider;
use crate::state::{StreamSnapshot, Triggers};

/// How long [`ReplayConnection::open`] waits for the first packet.
const FIRST_PACKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Replays a capture and tracks the state of every stream in it.
///
/// ```no_run
/// # async fn run() -> vrtkit::Result<()> {
/// use futures::StreamExt;
/// use vrtkit::{ReplayConnection, VrtConfig};
///
/// let connection = ReplayConnection::open("capture.vrl", VrtConfig::default()).await?;
/// let mut updates = connection.state_updates();
/// while let Some(snapshot) = updates.next().await {
///     println!("stream {:?}: {:?}", snapshot.stream_id, snapshot.update.fields);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ReplayConnection {
    packets: watch::Receiver<Option<Arc<AnyPacket>>>,
    states: watch::Receiver<Option<Arc<StreamSnapshot>>>,
    packet_rate: Option<f64>,
    cancel: CancellationToken,
}

impl ReplayConnection {
    /// Replay a capture file, paced by its timestamps, tracking every field.
    pub async fn open<P: AsRef<Path>>(path: P, config: VrtConfig) -> Result<Self> {
        let provider = ReplayProvider::open(path, config)?;
        Ok(Self::open_with(provider, Arc::new(DefaultPacketFactory), Triggers::all(), config).await)
    }

    /// Monitor any packet source.
    ///
    /// Waits for the first packet before returning so subscriptions start
    /// with data. An empty source returns as soon as it ends.
    pub async fn open_with<S: PacketSource>(
        source: S,
        factory: Arc<dyn PacketFactory>,
        triggers: Triggers,
        config: VrtConfig,
    ) -> Self {
        let packet_rate = source.packet_rate();
        let channels = Driver::spawn(source, factory, triggers, config);

        let mut first = channels.packets.clone();
        let waited = first.wait_for(|packet| packet.is_some());
        match tokio::time::timeout(FIRST_PACKET_TIMEOUT, async { waited.await.map(|_| ()) }).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => debug!("Packet source ended before its first packet"),
            Err(_) => warn!("Timeout waiting for first packet"),
        }

        info!("Replay connection opened");
        Self { packets: channels.packets, states: channels.states, packet_rate, cancel: channels.cancel }
    }

    /// Packets as they are read. Slow consumers skip to the latest packet.
    pub fn packets(&self) -> BoxStream<'static, Arc<AnyPacket>> {
        WatchStream::new(self.packets.clone()).filter_map(|packet| async move { packet }).boxed()
    }

    /// Snapshots of streams whose triggers fired, then a final snapshot of
    /// every stream when the source ends. Slow consumers skip to the latest.
    pub fn state_updates(&self) -> BoxStream<'static, Arc<StreamSnapshot>> {
        WatchStream::new(self.states.clone()).filter_map(|snapshot| async move { snapshot }).boxed()
    }

    /// The most recent snapshot, if any stream has reported.
    pub fn current_state(&self) -> Option<Arc<StreamSnapshot>> {
        self.states.borrow().clone()
    }

    /// The most recent packet.
    pub fn latest_packet(&self) -> Option<Arc<AnyPacket>> {
        self.packets.borrow().clone()
    }

    /// Fixed packet rate of the source, if it has one.
    pub fn packet_rate(&self) -> Option<f64> {
        self.packet_rate
    }

    /// Stop the replay. Open streams end once the driver task exits.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ReplayConnection {
    fn drop(&mut self) {
        debug!("Dropping replay connection");
        self.cancel.cancel();
    }
}
