//! Per-stream adapter between a [Connection] and the coordinator.

use crate::{
    buffer::PacketBuffer,
    config::ReadMode,
    connection::Connection,
    descriptor::{DataDescriptor, DomainDescriptor, DomainRule, SampleType},
    error::{ReaderError, Result},
    packet::EventPacket,
    sample::{Conversion, Sample},
    types::StreamId,
};
use tracing::trace;

/// Alignment of one stream onto the common domain.
///
/// Once synchronized, `divider * native_delta == common_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Native sample period in common ticks.
    pub native_delta: i64,
    /// Common-tick domain value of the first sample read after
    /// synchronization.
    pub native_start: i64,
    /// Native samples per common sample.
    pub divider: u64,
}

/// Reads one inbound stream: tracks the cursor in the current packet and
/// converts samples on copy-out.
pub struct SignalReader {
    id: StreamId,
    connection: Box<dyn Connection>,
    buffer: PacketBuffer,
    capacity: Option<usize>,
    value_descriptor: Option<DataDescriptor>,
    domain_descriptor: Option<DomainDescriptor>,
    conversion: Conversion,
    sync: Option<SyncState>,
    consumed_since_sync: u64,
    skipped: u64,
    fault: Option<ReaderError>,
}

impl std::fmt::Debug for SignalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalReader")
            .field("id", &self.id)
            .field("buffer", &self.buffer)
            .field("sync", &self.sync)
            .field("consumed_since_sync", &self.consumed_since_sync)
            .field("skipped", &self.skipped)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

impl SignalReader {
    pub fn new(
        id: StreamId,
        connection: Box<dyn Connection>,
        value_descriptor: Option<DataDescriptor>,
        domain_descriptor: Option<DomainDescriptor>,
    ) -> Self {
        Self {
            id,
            connection,
            buffer: PacketBuffer::new(),
            capacity: None,
            value_descriptor,
            domain_descriptor,
            conversion: Conversion::Unscaled,
            sync: None,
            consumed_since_sync: 0,
            skipped: 0,
            fault: None,
        }
    }

    /// Limits the native samples held locally. Packets beyond it stay in
    /// the connection until reads make room.
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Moves packets queued on the connection into the local FIFO until it
    /// holds `capacity` samples.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self
            .capacity
            .is_none_or(|capacity| self.buffer.queued_samples() < capacity)
        {
            let Some(packet) = self.connection.dequeue() else {
                break;
            };
            self.buffer.push(packet);
            count += 1;
        }
        if count > 0 {
            trace!(stream = %self.id, packets = count, "drained connection");
        }
        count
    }

    /// Native samples queued and not yet consumed, up to the first event.
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    pub fn peek_is_event(&self) -> bool {
        self.buffer.front_event().is_some()
    }

    /// Whether an event is queued anywhere in the local FIFO.
    pub fn has_pending_event(&self) -> bool {
        self.buffer.has_event()
    }

    pub fn front_event(&self) -> Option<&EventPacket> {
        self.buffer.front_event()
    }

    pub fn pop_event(&mut self) -> Option<EventPacket> {
        self.buffer.pop_event()
    }

    pub fn value_descriptor(&self) -> Option<&DataDescriptor> {
        self.value_descriptor.as_ref()
    }

    pub fn domain_descriptor(&self) -> Option<&DomainDescriptor> {
        self.domain_descriptor.as_ref()
    }

    pub fn set_value_descriptor(&mut self, descriptor: DataDescriptor) {
        self.value_descriptor = Some(descriptor);
    }

    pub fn set_domain_descriptor(&mut self, descriptor: DomainDescriptor) {
        self.domain_descriptor = Some(descriptor);
    }

    /// Chooses how values are converted for the given read mode and read
    /// type.
    pub fn configure(&mut self, read_mode: ReadMode, read_type: SampleType) -> Result<()> {
        let descriptor = self.value_descriptor.as_ref().ok_or(ReaderError::NotAssigned {
            stream: self.id.0 as usize,
            what: "value",
        })?;

        self.conversion = match read_mode {
            ReadMode::RawValues if descriptor.sample_type != read_type => {
                return Err(ReaderError::configuration(format!(
                    "{} delivers {:?} but raw reads require {:?}",
                    self.id, descriptor.sample_type, read_type
                )));
            }
            ReadMode::RawValues | ReadMode::Unscaled => Conversion::Unscaled,
            ReadMode::Scaled => descriptor
                .post_scaling
                .map_or(Conversion::Unscaled, Conversion::Scaled),
        };
        Ok(())
    }

    /// Re-checks the current descriptors and records why the stream cannot
    /// be read, if it cannot. Domain problems only count in strict mode.
    pub fn revalidate(&mut self, read_mode: ReadMode, read_type: SampleType, strict: bool) {
        let value_fault = match self.value_descriptor {
            Some(_) => self.configure(read_mode, read_type).err(),
            None => None,
        };
        let domain_fault = match &self.domain_descriptor {
            Some(domain) if strict => domain.linear_parameters().err(),
            _ => None,
        };
        self.fault = value_fault.or(domain_fault);
    }

    /// Why the stream cannot currently be read.
    pub fn fault(&self) -> Option<&ReaderError> {
        self.fault.as_ref()
    }

    /// Whether queued samples can ever be delivered under the current
    /// descriptors. A stream still waiting for its domain descriptor counts
    /// as readable.
    pub fn is_readable(&self) -> bool {
        self.fault.is_none()
            && self
                .domain_descriptor
                .as_ref()
                .is_none_or(|domain| domain.linear_parameters().is_ok())
    }

    /// Drops the samples queued ahead of the next event; they count as
    /// skipped.
    pub fn discard_until_event(&mut self) -> usize {
        let dropped = self.buffer.drop_until_event();
        self.skipped += dropped as u64;
        dropped
    }

    /// `(delta, start)` of the linear domain, or why there is none.
    pub fn linear_domain(&self) -> Result<(i64, i64)> {
        self.domain_descriptor
            .as_ref()
            .ok_or(ReaderError::NotAssigned {
                stream: self.id.0 as usize,
                what: "domain",
            })?
            .linear_parameters()
    }

    /// Domain value, in stream ticks, of the next unconsumed sample.
    pub fn head_domain_value(&self) -> Option<i64> {
        let (delta, start) = self.linear_domain().ok()?;
        let (packet, cursor) = self.buffer.front_data()?;
        Some(packet.offset + start + cursor as i64 * delta)
    }

    pub fn sync_state(&self) -> Option<SyncState> {
        self.sync
    }

    pub fn set_sync_state(&mut self, sync: Option<SyncState>) {
        self.sync = sync;
        self.consumed_since_sync = 0;
    }

    pub fn consumed_since_sync(&self) -> u64 {
        self.consumed_since_sync
    }

    /// Samples discarded to reach a synchronization start.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Copies `count` converted samples into `dest`.
    pub fn consume<V: Sample>(&mut self, count: usize, dest: &mut [V]) -> usize {
        self.consume_with_domain::<V, i64>(count, Some(dest), None)
    }

    /// Consumes `count` samples without copying them.
    pub fn skip(&mut self, count: usize) -> usize {
        self.consume_with_domain::<f64, i64>(count, None, None)
    }

    /// Consumes up to `count` samples, writing values and domain values
    /// (stream ticks) into whichever destinations are given. Never crosses
    /// an event packet.
    pub fn consume_with_domain<V: Sample, D: Sample>(
        &mut self,
        count: usize,
        mut values: Option<&mut [V]>,
        mut domains: Option<&mut [D]>,
    ) -> usize {
        let (delta, start) = match self.domain_descriptor.as_ref().map(|d| d.rule) {
            Some(DomainRule::Linear { delta, start }) => (delta, start),
            Some(DomainRule::Constant(value)) => (0, value),
            _ => (0, 0),
        };
        let conversion = self.conversion;

        let consumed = self.buffer.consume_with(count, |packet, range, written| {
            let len = range.len();
            if let Some(values) = values.as_deref_mut() {
                packet
                    .values
                    .convert_into(range.clone(), &mut values[written..written + len], conversion);
            }
            if let Some(domains) = domains.as_deref_mut() {
                let base = packet.offset as i128 + start as i128;
                for (index, out) in range.zip(domains[written..written + len].iter_mut()) {
                    *out = D::from_i128(base + index as i128 * delta as i128);
                }
            }
        });

        self.consumed_since_sync += consumed as u64;
        consumed
    }

    /// Discards samples whose domain value (stream ticks) precedes
    /// `threshold`; they count as skipped.
    pub fn discard_before(&mut self, threshold: i64) -> usize {
        let Ok((delta, start)) = self.linear_domain() else {
            return 0;
        };
        let dropped = self.buffer.drop_before(threshold, start, delta);
        self.skipped += dropped as u64;
        dropped
    }

    pub fn unbind(&self) {
        self.connection.unbind();
    }
}
