//! Running "current known state" of one stream.
//!
//! [`StreamState`] merges every context packet it sees into an aggregate
//! [`ContextPacket`], field by field, and folds data packet trailers into the
//! same state/event word. Each merge reports whether it *triggered*: whether a
//! changed field or indicator is one the caller asked to watch.
//!
//! ```rust
//! use vrtkit::{ContextPacket, FieldId, StreamState, Triggers};
//!
//! let mut packet = ContextPacket::default();
//! packet.set_bandwidth(Some(1.0e6)).unwrap();
//!
//! let mut state = StreamState::default();
//! state.set_triggers(Triggers::none().with_field(FieldId::BANDWIDTH));
//! assert!(state.update_context(&packet).unwrap());
//! // Change indicator clear and already initialized: nothing to do.
//! assert!(!state.update_context(&packet).unwrap());
//! assert_eq!(state.context().bandwidth(), Some(1.0e6));
//! ```

use crate::config::VrtConfig;
use crate::fields::Value;
use crate::packet::{ContextPacket, DataPacket, ENABLE_MASK, FieldId, Indicator, StateEventBits, TimeStamp};
use crate::Result;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// Which changes count as significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triggers {
    fields: BTreeSet<FieldId>,
    events: u32,
}

impl Triggers {
    /// Nothing triggers.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every field and every indicator triggers.
    pub fn all() -> Self {
        Self { fields: FieldId::ALL.iter().copied().collect(), events: ENABLE_MASK }
    }

    pub fn with_field(mut self, field: FieldId) -> Self {
        self.fields.insert(field);
        self
    }

    pub fn with_indicator(mut self, indicator: Indicator) -> Self {
        self.events |= 1 << indicator.enable_bit();
        self
    }

    pub fn contains_field(&self, field: FieldId) -> bool {
        self.fields.contains(&field)
    }

    /// Watched indicators as enable bits.
    pub fn events(&self) -> u32 {
        self.events
    }

    fn fires(&self, update: &Update) -> bool {
        update.events & self.events != 0 || update.fields.iter().any(|field| self.fields.contains(field))
    }
}

/// What the most recent merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Context fields whose stored bytes changed, in storage order.
    pub fields: Vec<FieldId>,
    /// Enable bits of indicators whose value changed.
    pub events: u32,
    pub triggered: bool,
}

impl Update {
    /// Whether anything differed from the aggregate.
    pub fn is_updated(&self) -> bool {
        !self.fields.is_empty() || self.events != 0
    }
}

/// Merged state of one stream. Not `Sync`: decoded values are cached behind a
/// `RefCell`.
#[derive(Debug)]
pub struct StreamState {
    context: ContextPacket<'static>,
    initialized: bool,
    triggers: Triggers,
    cache: RefCell<HashMap<FieldId, Option<Value>>>,
    last_update: Update,
    last_updated: Option<TimeStamp>,
    last_changed: Option<TimeStamp>,
    over_range_samples: Option<u64>,
    over_range_packets: Option<u64>,
    discontinuous_packets: Option<u64>,
    context_packets: u64,
    data_packets: u64,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new(VrtConfig::default())
    }
}

impl StreamState {
    /// An empty, uninitialized state that triggers on every change.
    pub fn new(config: VrtConfig) -> Self {
        Self {
            context: ContextPacket::new(config),
            initialized: false,
            triggers: Triggers::all(),
            cache: RefCell::new(HashMap::new()),
            last_update: Update::default(),
            last_updated: None,
            last_changed: None,
            over_range_samples: None,
            over_range_packets: None,
            discontinuous_packets: None,
            context_packets: 0,
            data_packets: 0,
        }
    }

    /// A state initialized from `packet`.
    pub fn from_context(packet: &ContextPacket<'_>) -> Result<Self> {
        let mut state = Self::new(packet.config());
        state.update_context(packet)?;
        Ok(state)
    }

    pub fn triggers(&self) -> &Triggers {
        &self.triggers
    }

    pub fn set_triggers(&mut self, triggers: Triggers) {
        self.triggers = triggers;
    }

    /// Whether a context packet has been merged.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The aggregate context packet.
    pub fn context(&self) -> &ContextPacket<'static> {
        &self.context
    }

    pub fn stream_identifier(&self) -> Option<u32> {
        self.context.stream_identifier()
    }

    /// Decoded value of `field`, cached until the field next changes.
    pub fn field(&self, field: FieldId) -> Option<Value> {
        self.cache
            .borrow_mut()
            .entry(field)
            .or_insert_with(|| self.context.field_value(field))
            .clone()
    }

    /// Merged state/event word.
    pub fn state_events(&self) -> Option<StateEventBits> {
        self.context.state_event_indicators()
    }

    pub fn indicator(&self, indicator: Indicator) -> Option<bool> {
        self.state_events().and_then(|bits| bits.get(indicator))
    }

    /// Changes made by the most recent merge.
    pub fn last_update(&self) -> &Update {
        &self.last_update
    }

    /// Timestamp of the most recent packet merged.
    pub fn last_updated(&self) -> Option<TimeStamp> {
        self.last_updated
    }

    /// Timestamp of the most recent packet that changed something or set
    /// its change indicator.
    pub fn last_changed(&self) -> Option<TimeStamp> {
        self.last_changed
    }

    /// Sum of the over-range counts reported by context packets.
    pub fn over_range_samples(&self) -> Option<u64> {
        self.over_range_samples
    }

    /// Data packets whose trailer reported over-range.
    pub fn over_range_packets(&self) -> Option<u64> {
        self.over_range_packets
    }

    /// Data packets whose trailer reported a sample discontinuity.
    pub fn discontinuous_packets(&self) -> Option<u64> {
        self.discontinuous_packets
    }

    pub fn context_packets(&self) -> u64 {
        self.context_packets
    }

    pub fn data_packets(&self) -> u64 {
        self.data_packets
    }

    /// Merge a context packet. Returns whether the merge triggered.
    ///
    /// Once initialized, a packet with a clear change indicator only advances
    /// [`last_updated`](Self::last_updated).
    pub fn update_context(&mut self, packet: &ContextPacket<'_>) -> Result<bool> {
        let timestamp = Some(packet.timestamp()).filter(|ts| !ts.is_none());
        self.context_packets += 1;
        if timestamp.is_some() {
            self.last_updated = timestamp;
        }
        if self.initialized && !packet.change_indicator() {
            trace!(stream_id = ?packet.stream_identifier(), "Unchanged context packet");
            self.last_update = Update::default();
            return Ok(false);
        }

        if let Some(stream_id) = packet.stream_identifier().filter(|id| Some(*id) != self.context.stream_identifier()) {
            self.context.set_stream_identifier(stream_id)?;
        }
        if packet.class_identifier() != self.context.class_identifier() {
            self.context.set_class_identifier(packet.class_identifier())?;
        }
        if let Some(timestamp) = timestamp {
            self.context.set_timestamp(timestamp)?;
        }

        let mut update = Update::default();
        for field in packet.present_fields() {
            if field == FieldId::STATE_EVENTS {
                if let Some(incoming) = packet.state_event_indicators() {
                    update.events |= self.merge_events(incoming, true)?;
                }
                continue;
            }
            let Some(bytes) = packet.field_bytes(field) else { continue };
            if self.context.field_bytes(field) == Some(bytes) {
                continue;
            }
            self.context.set_field_bytes(field, Some(bytes))?;
            self.cache.get_mut().remove(&field);
            update.fields.push(field);
        }
        if let Some(count) = packet.over_range_count() {
            *self.over_range_samples.get_or_insert(0) += u64::from(count);
        }

        if update.is_updated() || packet.change_indicator() {
            self.last_changed = timestamp.or(self.last_changed);
        }
        update.triggered = self.triggers.fires(&update);
        debug!(
            stream_id = ?self.stream_identifier(),
            fields = update.fields.len(),
            events = update.events,
            triggered = update.triggered,
            "Merged context packet"
        );
        self.initialized = true;
        let triggered = update.triggered;
        self.last_update = update;
        Ok(triggered)
    }

    /// Merge a data packet's trailer and count its over-range and
    /// discontinuity reports. Returns whether the merge triggered.
    pub fn update_data(&mut self, packet: &DataPacket<'_>) -> Result<bool> {
        let timestamp = Some(packet.timestamp()).filter(|ts| !ts.is_none());
        self.data_packets += 1;
        if timestamp.is_some() {
            self.last_updated = timestamp;
        }
        let Some(bits) = packet.state_event_bits() else {
            self.last_update = Update::default();
            return Ok(false);
        };

        if let Some(over_range) = bits.get(Indicator::OverRange) {
            *self.over_range_packets.get_or_insert(0) += u64::from(over_range);
        }
        if let Some(discontinuous) = bits.get(Indicator::SampleLoss) {
            *self.discontinuous_packets.get_or_insert(0) += u64::from(discontinuous);
        }

        let mut update = Update { events: self.merge_events(bits, false)?, ..Update::default() };
        if update.is_updated() {
            self.last_changed = timestamp.or(self.last_changed);
        }
        update.triggered = self.triggers.fires(&update);
        if update.is_updated() {
            trace!(events = update.events, "Merged data trailer");
        }
        let triggered = update.triggered;
        self.last_update = update;
        Ok(triggered)
    }

    /// Enable-gated merge into the aggregate word. Returns the changed enables.
    fn merge_events(&mut self, incoming: StateEventBits, user_bits: bool) -> Result<u32> {
        let previous = self.context.state_event_indicators();
        let mut merged = previous.unwrap_or_default();
        let changed = merged.merge_enabled(incoming);
        if user_bits {
            merged.set_low_byte(incoming.low_byte());
        }
        if previous != Some(merged) {
            self.context.set_state_event_indicators(Some(merged))?;
            self.cache.get_mut().remove(&FieldId::STATE_EVENTS);
        }
        Ok(changed)
    }

    /// An immutable copy for publishing across tasks.
    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            stream_id: self.stream_identifier(),
            context: self.context.clone(),
            update: self.last_update.clone(),
            last_updated: self.last_updated,
            last_changed: self.last_changed,
            over_range_samples: self.over_range_samples,
            over_range_packets: self.over_range_packets,
            discontinuous_packets: self.discontinuous_packets,
            context_packets: self.context_packets,
            data_packets: self.data_packets,
        }
    }
}

/// Point-in-time copy of a [`StreamState`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub stream_id: Option<u32>,
    pub context: ContextPacket<'static>,
    pub update: Update,
    pub last_updated: Option<TimeStamp>,
    pub last_changed: Option<TimeStamp>,
    pub over_range_samples: Option<u64>,
    pub over_range_packets: Option<u64>,
    pub discontinuous_packets: Option<u64>,
    pub context_packets: u64,
    pub data_packets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ONE_SEC, PacketType};

    fn context(seconds: u32, bandwidth: f64) -> ContextPacket<'static> {
        let mut packet = ContextPacket::default();
        packet.set_stream_identifier(0x42).unwrap();
        packet.set_timestamp(TimeStamp::utc(seconds, 0).unwrap()).unwrap();
        packet.set_bandwidth(Some(bandwidth)).unwrap();
        packet.set_sample_rate(Some(2.0e6)).unwrap();
        packet
    }

    fn data(seconds: u32, bits: StateEventBits) -> DataPacket<'static> {
        let mut packet = DataPacket::default();
        packet.set_packet_type(PacketType::Data).unwrap();
        packet.set_timestamp(TimeStamp::utc(seconds, 0).unwrap()).unwrap();
        for indicator in Indicator::ALL {
            packet.set_indicator(indicator, bits.get(indicator)).unwrap();
        }
        packet
    }

    #[test]
    fn repeated_unchanged_packet_does_not_trigger() {
        let packet = context(100, 1.0e6);
        let mut state = StreamState::default();
        assert!(state.update_context(&packet).unwrap());
        assert_eq!(state.last_update().fields, vec![FieldId::BANDWIDTH, FieldId::SAMPLE_RATE]);

        let again = context(101, 1.0e6);
        assert!(!state.update_context(&again).unwrap());
        assert!(!state.last_update().is_updated());
        assert_eq!(state.last_updated().and_then(|ts| ts.seconds()), Some(101));
        assert_eq!(state.last_changed().and_then(|ts| ts.seconds()), Some(100));
        assert_eq!(state.context_packets(), 2);
    }

    #[test]
    fn changes_merge_field_by_field() {
        let mut state = StreamState::from_context(&context(1, 1.0e6)).unwrap();
        assert_eq!(state.stream_identifier(), Some(0x42));

        let mut partial = ContextPacket::default();
        partial.set_stream_identifier(0x42).unwrap();
        partial.set_change_indicator(true).unwrap();
        partial.set_bandwidth(Some(5.0e6)).unwrap();
        partial.set_temperature(Some(21.5)).unwrap();
        assert!(state.update_context(&partial).unwrap());

        let merged = state.context();
        assert_eq!(merged.bandwidth(), Some(5.0e6));
        assert_eq!(merged.sample_rate(), Some(2.0e6));
        assert_eq!(merged.temperature(), Some(21.5));
        assert_eq!(state.last_update().fields, vec![FieldId::BANDWIDTH, FieldId::TEMPERATURE]);
        assert!(merged.is_valid());
    }

    #[test]
    fn updated_is_not_triggered() {
        let mut state = StreamState::default();
        state.set_triggers(Triggers::none().with_field(FieldId::BANDWIDTH));
        assert!(state.update_context(&context(1, 1.0e6)).unwrap());

        let mut rate = context(2, 1.0e6);
        rate.set_change_indicator(true).unwrap();
        rate.set_sample_rate(Some(4.0e6)).unwrap();
        assert!(!state.update_context(&rate).unwrap());
        assert!(state.last_update().is_updated());
        assert_eq!(state.last_changed().and_then(|ts| ts.seconds()), Some(2));
    }

    #[test]
    fn change_indicator_alone_advances_last_changed() {
        let mut state = StreamState::from_context(&context(1, 1.0e6)).unwrap();
        let mut same = context(7, 1.0e6);
        same.set_change_indicator(true).unwrap();
        assert!(!state.update_context(&same).unwrap());
        assert_eq!(state.last_changed().and_then(|ts| ts.seconds()), Some(7));
    }

    #[test]
    fn events_merge_only_enabled_bits() {
        let mut packet = context(1, 1.0e6);
        packet
            .set_state_event_indicators(Some(
                StateEventBits::default().with(Indicator::ReferenceLock, Some(true)),
            ))
            .unwrap();
        let mut state = StreamState::from_context(&packet).unwrap();
        state.set_triggers(Triggers::none().with_indicator(Indicator::OverRange));

        let report = StateEventBits::default().with(Indicator::OverRange, Some(true));
        assert!(state.update_data(&data(2, report)).unwrap());
        assert_eq!(state.indicator(Indicator::ReferenceLock), Some(true));
        assert_eq!(state.indicator(Indicator::OverRange), Some(true));

        let lock_lost = StateEventBits::default().with(Indicator::ReferenceLock, Some(false));
        assert!(!state.update_data(&data(3, lock_lost)).unwrap());
        assert_eq!(state.indicator(Indicator::ReferenceLock), Some(false));
        assert_eq!(state.indicator(Indicator::OverRange), Some(true));
        assert_eq!(state.last_update().events, 1 << Indicator::ReferenceLock.enable_bit());
    }

    #[test]
    fn counters_start_at_zero_once_reported() {
        let mut state = StreamState::default();
        let mut plain = DataPacket::default();
        plain.set_payload_length(8).unwrap();
        state.update_data(&plain).unwrap();
        assert_eq!(state.over_range_packets(), None);
        assert_eq!(state.discontinuous_packets(), None);

        let quiet = StateEventBits::default().with(Indicator::OverRange, Some(false));
        state.update_data(&data(1, quiet)).unwrap();
        assert_eq!(state.over_range_packets(), Some(0));
        assert_eq!(state.discontinuous_packets(), None);

        let loud = quiet.with(Indicator::OverRange, Some(true)).with(Indicator::SampleLoss, Some(true));
        state.update_data(&data(2, loud)).unwrap();
        state.update_data(&data(3, loud)).unwrap();
        assert_eq!(state.over_range_packets(), Some(2));
        assert_eq!(state.discontinuous_packets(), Some(2));
        assert_eq!(state.data_packets(), 4);

        let mut counted = context(4, 1.0e6);
        counted.set_over_range_count(Some(17)).unwrap();
        state.update_context(&counted).unwrap();
        assert_eq!(state.over_range_samples(), Some(17));
    }

    #[test]
    fn cached_values_follow_changes() {
        let mut state = StreamState::from_context(&context(1, 1.0e6)).unwrap();
        assert_eq!(state.field(FieldId::BANDWIDTH), Some(Value::Float64(1.0e6)));
        assert_eq!(state.field(FieldId::BANDWIDTH), Some(Value::Float64(1.0e6)));

        let mut next = context(2, 3.0e6);
        next.set_change_indicator(true).unwrap();
        state.update_context(&next).unwrap();
        assert_eq!(state.field(FieldId::BANDWIDTH), Some(Value::Float64(3.0e6)));
        assert_eq!(state.field(FieldId::TEMPERATURE), None);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.stream_id, Some(0x42));
        assert_eq!(snapshot.context.bandwidth(), Some(3.0e6));
        assert_eq!(snapshot.last_updated.and_then(|ts| ts.seconds()), Some(2));
    }

    #[test]
    fn timestamps_advance_per_packet() {
        let mut state = StreamState::from_context(&context(10, 1.0e6)).unwrap();
        let later = TimeStamp::utc(10, 0).unwrap().add_picoseconds(ONE_SEC as i64 / 2).unwrap();
        let mut packet = data(0, StateEventBits::default());
        packet.set_timestamp(later).unwrap();
        state.update_data(&packet).unwrap();
        assert_eq!(state.last_updated(), Some(later));
        assert_eq!(state.last_changed().and_then(|ts| ts.seconds()), Some(10));
    }
}
