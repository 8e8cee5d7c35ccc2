use crate::{
    aligner::{Alignment, DomainAligner, StreamDomain},
    config::{ReadMode, ReaderConfig},
    connection::Connection,
    descriptor::{DataDescriptor, DomainDescriptor, SampleType},
    error::{ReaderError, Result},
    packet::EventPacket,
    sample::Sample,
    signal::{SignalReader, SyncState},
    types::StreamId,
};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Synchronization state machine of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No common clock resolved yet.
    Unsynchronized,
    /// The common clock is resolved; waiting for data on every stream to
    /// fix the start.
    Synchronizing,
    /// Reads deliver aligned common samples.
    Synchronized,
    /// An event sits at a stream head and awaits acknowledgement.
    EventPaused,
    /// Terminal.
    Invalid,
}

/// What must survive a resynchronization.
#[derive(Debug, Clone)]
struct Resume {
    alignment: Alignment,
    position: i64,
}

/// All mutable synchronization state, guarded by the coordinator's lock.
#[derive(Debug)]
pub struct CoordinatorState {
    pub streams: Vec<SignalReader>,
    pub phase: Phase,
    pub aligner: DomainAligner,
    pub read_mode: ReadMode,
    pub value_read_type: SampleType,
    pub min_read_count: usize,
    /// Native samples each stream buffers before it stops pulling packets.
    pub buffer_size: Option<usize>,
    pub alignment: Option<Alignment>,
    /// Common-tick domain value the current synchronization started at.
    pub common_start: Option<i64>,
    /// Common-tick domain value of the next common sample.
    pub position: Option<i64>,
    /// Common samples delivered or skipped, in current common-delta terms.
    pub consumed_common: u64,
    pub active: bool,
    /// A stream was detached; reads fail until one is attached again.
    pub repair_pending: bool,
    pub destroyed: bool,
    invalid_reason: Option<ReaderError>,
    resume: Option<Resume>,
    next_stream_id: u64,
}

impl CoordinatorState {
    pub fn new(config: &ReaderConfig, value_read_type: SampleType) -> Self {
        Self {
            streams: Vec::new(),
            phase: Phase::Unsynchronized,
            aligner: DomainAligner {
                required_common_sample_rate: config.required_common_sample_rate,
                allow_different_sample_rates: config.allow_different_sample_rates,
                start_on_full_unit_of_domain: config.start_on_full_unit_of_domain,
                strict: config.strict,
            },
            read_mode: config.read_mode,
            value_read_type,
            min_read_count: config.min_read_count,
            buffer_size: config.buffer_size,
            alignment: None,
            common_start: None,
            position: None,
            consumed_common: 0,
            active: true,
            repair_pending: false,
            destroyed: false,
            invalid_reason: None,
            resume: None,
            next_stream_id: 0,
        }
    }

    pub fn position_of(&self, id: StreamId) -> Option<usize> {
        self.streams.iter().position(|stream| stream.id() == id)
    }

    /// Validates and adds a stream. The caller binds the connection.
    pub fn attach(
        &mut self,
        connection: Box<dyn Connection>,
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    ) -> Result<StreamId> {
        if self.phase == Phase::Invalid {
            return Err(self.invalid_error());
        }

        let id = StreamId(self.next_stream_id);
        let mut reader =
            SignalReader::new(id, connection, value, domain).with_capacity(self.buffer_size);

        if reader.value_descriptor().is_some() {
            reader.configure(self.read_mode, self.value_read_type)?;
        }
        if let Some(domain) = reader.domain_descriptor() {
            self.check_domain_compatible(domain)?;
        }

        self.next_stream_id += 1;
        self.streams.push(reader);
        self.repair_pending = false;
        self.begin_resync();
        debug!(stream = %id, streams = self.streams.len(), "stream attached");
        Ok(id)
    }

    /// Checks `domain` against the already attached streams.
    fn check_domain_compatible(&self, domain: &DomainDescriptor) -> Result<()> {
        let candidate = match StreamDomain::from_descriptor(domain) {
            Ok(candidate) => candidate,
            Err(err) if self.aligner.strict => return Err(err),
            Err(_) => return Ok(()),
        };

        let mut domains: Vec<StreamDomain> = self
            .streams
            .iter()
            .filter_map(|stream| stream.domain_descriptor())
            .filter_map(|descriptor| StreamDomain::from_descriptor(descriptor).ok())
            .collect();
        domains.push(candidate);
        self.aligner.resolve(&domains).map(|_| ())
    }

    /// Removes a stream. Reads fail until the stream set is repaired.
    pub fn detach(&mut self, id: StreamId) -> Result<SignalReader> {
        let index = self
            .position_of(id)
            .ok_or_else(|| ReaderError::invalid_argument(format!("{id} is not attached")))?;
        let reader = self.streams.remove(index);
        reader.unbind();
        self.repair_pending = true;
        self.begin_resync();
        debug!(stream = %id, streams = self.streams.len(), "stream detached");
        Ok(reader)
    }

    pub fn invalidate(&mut self, reason: ReaderError) {
        if self.phase != Phase::Invalid {
            warn!(%reason, "reader invalidated");
            self.phase = Phase::Invalid;
            self.invalid_reason = Some(reason);
        }
    }

    fn invalid_error(&self) -> ReaderError {
        self.invalid_reason
            .clone()
            .unwrap_or_else(|| ReaderError::invalid_state("reader was invalidated"))
    }

    /// Fails when no read may proceed.
    pub fn check_readable(&self) -> Result<()> {
        if self.destroyed {
            return Err(ReaderError::invalid_state("reader is being destroyed"));
        }
        if self.phase == Phase::Invalid {
            return Err(self.invalid_error());
        }
        if self.repair_pending || self.streams.is_empty() {
            return Err(ReaderError::invalid_state(
                "a stream was detached; attach a stream to resume reading",
            ));
        }
        Ok(())
    }

    pub fn drain_all(&mut self) {
        for stream in &mut self.streams {
            stream.drain();
        }
    }

    pub fn drain(&mut self, id: StreamId) {
        if let Some(index) = self.position_of(id) {
            self.streams[index].drain();
        }
    }

    /// Events sitting at stream heads, keyed by stream position.
    pub fn events_at_head(&self) -> IndexMap<usize, EventPacket> {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(index, stream)| Some((index, stream.front_event()?.clone())))
            .collect()
    }

    pub fn has_event_at_head(&self) -> bool {
        self.streams.iter().any(|stream| stream.peek_is_event())
    }

    /// Marks the reader paused on events, if any are at a head.
    pub fn pause_on_events(&mut self) -> Option<IndexMap<usize, EventPacket>> {
        let events = self.events_at_head();
        if events.is_empty() {
            return None;
        }
        if self.phase == Phase::Synchronized {
            debug!(streams = ?events.keys().collect::<Vec<_>>(), "paused on events");
            self.phase = Phase::EventPaused;
        }
        Some(events)
    }

    /// Drops data that can never be delivered because its stream's
    /// descriptors are unusable, so the next descriptor change reaches the
    /// head.
    pub fn discard_unreadable(&mut self) {
        for stream in &mut self.streams {
            if stream.is_readable() {
                continue;
            }
            let mut dropped = stream.discard_until_event();
            while !stream.peek_is_event() && stream.drain() > 0 {
                dropped += stream.discard_until_event();
            }
            if dropped > 0 {
                debug!(stream = %stream.id(), dropped, "discarded samples of unreadable stream");
            }
        }
    }

    /// Drops samples left ahead of an event that are too few to complete a
    /// common sample, so the event reaches the head.
    pub fn discard_incomplete(&mut self) {
        if self.phase != Phase::Synchronized {
            return;
        }
        for stream in &mut self.streams {
            let Some(sync) = stream.sync_state() else {
                continue;
            };
            let available = stream.available();
            if available == 0 || available as u64 >= sync.divider || !stream.has_pending_event() {
                continue;
            }
            let dropped = stream.discard_until_event();
            debug!(
                stream = %stream.id(),
                dropped,
                divider = sync.divider,
                "discarded incomplete common sample before event"
            );
        }
    }

    /// The first stream fault, if any.
    pub fn fault(&self) -> Option<ReaderError> {
        self.streams
            .iter()
            .find_map(|stream| stream.fault().cloned())
    }

    /// Forgets the per-stream alignment while remembering the position so
    /// progress carries over.
    fn begin_resync(&mut self) {
        if let (Some(alignment), Some(position)) = (self.alignment.take(), self.position) {
            self.resume = Some(Resume {
                alignment,
                position,
            });
        }
        for stream in &mut self.streams {
            stream.set_sync_state(None);
        }
        if self.phase != Phase::Invalid {
            self.phase = Phase::Unsynchronized;
        }
    }

    /// Resolves the common clock. Returns `false` while some stream has
    /// no usable domain yet.
    fn ensure_alignment(&mut self) -> Result<bool> {
        if self.alignment.is_some() {
            return Ok(true);
        }

        let mut domains = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            let Some(descriptor) = stream.domain_descriptor() else {
                return Ok(false);
            };
            match StreamDomain::from_descriptor(descriptor) {
                Ok(domain) => domains.push(domain),
                Err(err) if self.aligner.strict => return Err(err),
                Err(_) => return Ok(false),
            }
        }

        let alignment = self.aligner.resolve(&domains)?;
        if let Some(capacity) = self.buffer_size
            && let Some(divider) = alignment.dividers().into_iter().max()
            && divider > capacity as u64
        {
            return Err(ReaderError::configuration(format!(
                "buffer size {capacity} cannot hold one common sample of {divider} native samples"
            )));
        }

        if let Some(resume) = &self.resume {
            let elapsed = resume.alignment.common_delta as i128 * self.consumed_common as i128;
            let elapsed = i64::try_from(elapsed)
                .map_err(|_| ReaderError::overflow("re-expressing consumed samples"))?;
            let elapsed = alignment.rescale_from(&resume.alignment, elapsed)?;
            let consumed = (elapsed / alignment.common_delta) as u64;
            if consumed != self.consumed_common {
                debug!(
                    before = self.consumed_common,
                    after = consumed,
                    "re-expressed consumed common samples"
                );
            }
            self.consumed_common = consumed;
        }

        debug!(
            common_delta = alignment.common_delta,
            resolution = %alignment.common_resolution,
            dividers = ?alignment.dividers(),
            "resolved common domain"
        );
        self.alignment = Some(alignment);
        self.phase = Phase::Synchronizing;
        Ok(true)
    }

    /// Attempts to establish the common start. Samples preceding it are
    /// discarded and counted as skipped. Returns whether the reader is
    /// synchronized.
    pub fn try_synchronize(&mut self) -> Result<bool> {
        match self.phase {
            Phase::Synchronized | Phase::EventPaused => return Ok(true),
            Phase::Invalid => return Err(self.invalid_error()),
            Phase::Unsynchronized | Phase::Synchronizing => {}
        }
        if self.streams.is_empty() || !self.ensure_alignment()? {
            return Ok(false);
        }
        let Some(alignment) = self.alignment.as_ref() else {
            return Ok(false);
        };

        let mut heads = Vec::with_capacity(self.streams.len());
        for (index, stream) in self.streams.iter().enumerate() {
            let Some(head) = stream.head_domain_value() else {
                return Ok(false);
            };
            heads.push(alignment.to_common(index, head)?);
        }

        let not_before = match &self.resume {
            Some(resume) => Some(alignment.convert_from(&resume.alignment, resume.position)?),
            None => None,
        };
        let Some(start) = self.aligner.common_start(alignment, &heads, not_before) else {
            return Ok(false);
        };

        let thresholds = (0..self.streams.len())
            .map(|index| alignment.to_stream_ceil(index, start))
            .collect::<Result<Vec<_>>>()?;

        let mut ready = true;
        for (stream, threshold) in self.streams.iter_mut().zip(thresholds) {
            let mut dropped = stream.discard_before(threshold);
            // A bounded buffer may hold only samples before the start.
            while stream.available() == 0 && !stream.peek_is_event() && stream.drain() > 0 {
                dropped += stream.discard_before(threshold);
            }
            if dropped > 0 {
                debug!(stream = %stream.id(), dropped, "discarded samples before common start");
            }
            ready &= stream.available() > 0;
        }
        if !ready {
            return Ok(false);
        }

        for (index, stream) in self.streams.iter_mut().enumerate() {
            let head = stream.head_domain_value().unwrap_or_default();
            let native_start = alignment.to_common(index, head)?;
            let stream_alignment = alignment.streams[index];
            stream.set_sync_state(Some(SyncState {
                native_delta: stream_alignment.native_delta,
                native_start,
                divider: stream_alignment.divider,
            }));
        }

        debug!(
            start,
            common_delta = alignment.common_delta,
            dividers = ?alignment.dividers(),
            "synchronized"
        );
        self.common_start = Some(start);
        self.position = Some(start);
        self.resume = None;
        self.phase = Phase::Synchronized;
        Ok(true)
    }

    /// `min_i floor(available_i / divider_i)`, or 0 when not synchronized
    /// or an event is at a head.
    pub fn available_common_count(&self) -> usize {
        if self.phase != Phase::Synchronized || self.has_event_at_head() {
            return 0;
        }
        self.streams
            .iter()
            .map(|stream| match stream.sync_state() {
                Some(sync) => stream.available() / sync.divider as usize,
                None => 0,
            })
            .min()
            .unwrap_or(0)
    }

    pub fn should_notify(&self) -> bool {
        self.active
            && (self.has_event_at_head() || self.available_common_count() >= self.min_read_count)
    }

    /// Consumes `count` common samples from every stream, writing values
    /// and domain values into the given per-stream buffers. Returns the
    /// common-tick offset of the first delivered sample.
    pub fn deliver<V: Sample, D: Sample>(
        &mut self,
        count: usize,
        mut values: Option<&mut [&mut [V]]>,
        mut domains: Option<&mut [&mut [D]]>,
    ) -> Option<i64> {
        let offset = self.position;
        if count == 0 {
            return offset;
        }

        for (index, stream) in self.streams.iter_mut().enumerate() {
            let Some(sync) = stream.sync_state() else {
                debug_assert!(false, "delivering from an unsynchronized stream");
                continue;
            };
            let native = count * sync.divider as usize;
            let values = values.as_deref_mut().map(|buffers| &mut buffers[index][..native]);
            let domains = domains.as_deref_mut().map(|buffers| &mut buffers[index][..native]);
            let consumed = stream.consume_with_domain(native, values, domains);
            debug_assert_eq!(consumed, native, "stream {index} delivered a partial block");
        }

        if let Some(alignment) = &self.alignment {
            self.position = offset.map(|offset| offset + count as i64 * alignment.common_delta);
        }
        self.consumed_common += count as u64;
        offset
    }

    /// Pops every event at a stream head and applies it. Descriptor
    /// changes and gaps trigger resynchronization that keeps progress.
    pub fn acknowledge_events(&mut self) -> IndexMap<usize, EventPacket> {
        let mut acknowledged = IndexMap::new();
        let mut resync = false;

        for index in 0..self.streams.len() {
            let Some(event) = self.streams[index].pop_event() else {
                continue;
            };

            match &event {
                EventPacket::DataDescriptorChanged { value, domain } => {
                    resync |= self.apply_descriptor_change(index, value.clone(), domain.clone());
                }
                EventPacket::ImplicitDomainGapDetected { gap_diff } => {
                    debug!(stream = index, gap_diff, "domain gap acknowledged");
                    resync = true;
                }
            }
            acknowledged.insert(index, event);
        }

        if resync {
            self.begin_resync();
        } else if self.phase == Phase::EventPaused && !self.has_event_at_head() {
            self.phase = Phase::Synchronized;
        }
        acknowledged
    }

    /// Returns whether the domain changed.
    fn apply_descriptor_change(
        &mut self,
        index: usize,
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    ) -> bool {
        let (read_mode, read_type, strict) =
            (self.read_mode, self.value_read_type, self.aligner.strict);
        let stream = &mut self.streams[index];

        if let Some(value) = value {
            stream.set_value_descriptor(value);
        }
        let domain_changed = match domain {
            Some(domain) => {
                let changed = stream.domain_descriptor() != Some(&domain);
                stream.set_domain_descriptor(domain);
                changed
            }
            None => false,
        };

        stream.revalidate(read_mode, read_type, strict);
        if let Some(fault) = stream.fault() {
            warn!(stream = %stream.id(), %fault, "incompatible descriptor acknowledged");
        } else if domain_changed {
            debug!(stream = %stream.id(), "domain descriptor changed");
        }
        domain_changed
    }

    pub fn is_synchronized(&self) -> bool {
        matches!(self.phase, Phase::Synchronized | Phase::EventPaused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::{DeliveryMode, Producer, channel},
        descriptor::{Ratio, SampleType},
        packet::Packet,
    };

    fn millis() -> Ratio {
        Ratio::new(1, 1000).unwrap()
    }

    fn create_state(deltas: &[i64]) -> (CoordinatorState, Vec<Producer>) {
        let mut state = CoordinatorState::new(&ReaderConfig::default(), SampleType::Float64);
        let producers = deltas
            .iter()
            .map(|&delta| {
                let (producer, queue) = channel(DeliveryMode::Direct);
                state
                    .attach(
                        Box::new(queue),
                        Some(DataDescriptor::new(SampleType::Float64)),
                        Some(DomainDescriptor::linear(delta, 0, millis())),
                    )
                    .unwrap();
                producer
            })
            .collect();
        (state, producers)
    }

    fn ramp(offset: i64, len: usize) -> Packet {
        Packet::data(offset, (0..len).map(|v| v as f64).collect::<Vec<_>>())
    }

    #[test]
    fn test_state_unsynchronized_until_every_stream_has_data() {
        let (mut state, producers) = create_state(&[1, 1]);
        producers[0].send(ramp(0, 10)).unwrap();
        state.drain_all();

        assert!(!state.try_synchronize().unwrap());
        assert_eq!(state.phase, Phase::Synchronizing);
        assert_eq!(state.available_common_count(), 0);

        producers[1].send(ramp(0, 10)).unwrap();
        state.drain_all();
        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.available_common_count(), 10);
    }

    #[test]
    fn test_state_staggered_start_discards_leading_samples() {
        let (mut state, producers) = create_state(&[1, 1]);
        producers[0].send(ramp(0, 10)).unwrap();
        producers[1].send(ramp(4, 10)).unwrap();
        state.drain_all();

        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.streams[0].skipped(), 4);
        assert_eq!(state.streams[1].skipped(), 0);
        assert_eq!(state.position, Some(4));
        assert_eq!(state.available_common_count(), 6);
    }

    #[test]
    fn test_state_discard_exhausting_a_stream_waits() {
        let (mut state, producers) = create_state(&[1, 1]);
        producers[0].send(ramp(0, 3)).unwrap();
        producers[1].send(ramp(10, 3)).unwrap();
        state.drain_all();

        assert!(!state.try_synchronize().unwrap());
        assert_eq!(state.streams[0].available(), 0);

        producers[0].send(ramp(3, 10)).unwrap();
        state.drain_all();
        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.position, Some(10));
        assert_eq!(state.available_common_count(), 3);
    }

    #[test]
    fn test_state_dividers_limit_availability() {
        let (mut state, producers) = create_state(&[1, 2]);
        producers[0].send(ramp(0, 9)).unwrap();
        producers[1].send(ramp(0, 10)).unwrap();
        state.drain_all();

        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.streams[0].sync_state().unwrap().divider, 2);
        assert_eq!(state.streams[1].sync_state().unwrap().divider, 1);
        // floor(9 / 2) = 4, 10 / 1 = 10
        assert_eq!(state.available_common_count(), 4);
    }

    #[test]
    fn test_state_deliver_advances_position() {
        let (mut state, producers) = create_state(&[1, 2]);
        producers[0].send(ramp(0, 8)).unwrap();
        producers[1].send(ramp(0, 4)).unwrap();
        state.drain_all();
        state.try_synchronize().unwrap();

        let offset = state.deliver::<f64, i64>(3, None, None);
        assert_eq!(offset, Some(0));
        assert_eq!(state.position, Some(6));
        assert_eq!(state.consumed_common, 3);
        assert_eq!(state.streams[0].consumed_since_sync(), 6);
        assert_eq!(state.streams[1].consumed_since_sync(), 3);
    }

    #[test]
    fn test_state_event_pause_and_acknowledge() {
        let (mut state, producers) = create_state(&[1, 1]);
        producers[0].send(ramp(0, 4)).unwrap();
        producers[1].send(ramp(0, 4)).unwrap();
        producers[1]
            .send(EventPacket::ImplicitDomainGapDetected { gap_diff: 0 })
            .unwrap();
        producers[1].send(ramp(4, 4)).unwrap();
        producers[0].send(ramp(4, 4)).unwrap();
        state.drain_all();
        state.try_synchronize().unwrap();

        state.deliver::<f64, i64>(4, None, None);
        let events = state.pause_on_events().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events.contains_key(&1));
        assert_eq!(state.phase, Phase::EventPaused);
        assert_eq!(state.available_common_count(), 0);

        let acknowledged = state.acknowledge_events();
        assert_eq!(acknowledged.len(), 1);
        assert_eq!(state.phase, Phase::Unsynchronized);

        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.position, Some(4));
        assert_eq!(state.consumed_common, 4);
        assert_eq!(state.available_common_count(), 4);
    }

    #[test]
    fn test_state_incomplete_sample_before_event_is_discarded() {
        let (mut state, producers) = create_state(&[1, 2]);
        producers[0].send(ramp(0, 5)).unwrap();
        producers[0]
            .send(EventPacket::ImplicitDomainGapDetected { gap_diff: 5 })
            .unwrap();
        producers[0].send(ramp(10, 20)).unwrap();
        producers[1].send(ramp(0, 30)).unwrap();
        state.drain_all();
        assert!(state.try_synchronize().unwrap());
        assert_eq!(state.available_common_count(), 2);

        state.discard_incomplete();
        assert_eq!(state.streams[0].skipped(), 0);

        // One native sample is left and the divider is two.
        state.deliver::<f64, i64>(2, None, None);
        state.discard_incomplete();
        assert_eq!(state.streams[0].skipped(), 1);
        assert!(state.has_event_at_head());
        assert!(state.pause_on_events().is_some());
    }

    #[test]
    fn test_state_buffer_smaller_than_divider_rejected() {
        let config = ReaderConfig::default().with_buffer_size(1);
        let mut state = CoordinatorState::new(&config, SampleType::Float64);
        for delta in [1, 2] {
            let (_producer, queue) = channel(DeliveryMode::Direct);
            state
                .attach(
                    Box::new(queue),
                    None,
                    Some(DomainDescriptor::linear(delta, 0, millis())),
                )
                .unwrap();
        }
        assert!(matches!(
            state.try_synchronize(),
            Err(ReaderError::Configuration { .. })
        ));
    }

    #[test]
    fn test_state_detach_requires_repair() {
        let (mut state, _producers) = create_state(&[1, 1]);
        let id = state.streams[1].id();
        state.detach(id).unwrap();
        assert!(matches!(
            state.check_readable(),
            Err(ReaderError::InvalidState { .. })
        ));
        assert!(state.detach(id).is_err());

        let (_producer, queue) = channel(DeliveryMode::Direct);
        state
            .attach(
                Box::new(queue),
                Some(DataDescriptor::new(SampleType::Float64)),
                Some(DomainDescriptor::linear(1, 0, millis())),
            )
            .unwrap();
        assert!(state.check_readable().is_ok());
    }

    #[test]
    fn test_state_attach_rejects_mismatched_rate() {
        let mut state = CoordinatorState::new(&ReaderConfig::same_rate(), SampleType::Float64);
        let (_p1, q1) = channel(DeliveryMode::Direct);
        let (_p2, q2) = channel(DeliveryMode::Direct);
        state
            .attach(
                Box::new(q1),
                None,
                Some(DomainDescriptor::linear(1, 0, millis())),
            )
            .unwrap();
        let result = state.attach(
            Box::new(q2),
            None,
            Some(DomainDescriptor::linear(2, 0, millis())),
        );
        assert!(matches!(result, Err(ReaderError::Configuration { .. })));
        assert_eq!(state.streams.len(), 1);
    }

    #[test]
    fn test_state_invalidate_is_terminal() {
        let (mut state, _producers) = create_state(&[1]);
        state.invalidate(ReaderError::invalid_state("test"));
        assert_eq!(state.phase, Phase::Invalid);
        assert!(state.check_readable().is_err());
        assert!(state.try_synchronize().is_err());

        let (_producer, queue) = channel(DeliveryMode::Direct);
        assert!(state.attach(Box::new(queue), None, None).is_err());
    }
}
