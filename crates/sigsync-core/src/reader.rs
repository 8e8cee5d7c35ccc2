use crate::{
    config::{ReaderConfig, TimeoutType},
    connection::Connection,
    coordinator::{DataAvailableCallback, Shared, SynchronizationCoordinator},
    descriptor::{DataDescriptor, DomainDescriptor, Ratio},
    error::{ReaderError, Result},
    packet::EventPacket,
    sample::Sample,
    state::CoordinatorState,
    types::{ReadResult, StreamId},
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::{
    marker::PhantomData,
    time::{Duration, Instant},
};
use tracing::{debug, trace};

/// Lifecycle control of a reader.
pub trait ReaderControl {
    /// Deactivated readers return `Ok` with no samples and wake blocked
    /// reads. Data keeps queuing.
    fn set_active(&self, active: bool);

    fn is_active(&self) -> bool;

    /// Registers the callback fired when at least `min_read_count` common
    /// samples or an event became available.
    fn set_on_data_available(&self, callback: Option<DataAvailableCallback>);

    /// Terminal: every later read fails.
    fn invalidate(&self, reason: ReaderError);
}

/// Introspection of the common domain. Everything is `None` until the
/// common domain is resolved.
pub trait DomainInfo {
    fn is_synchronized(&self) -> bool;

    /// Seconds per common tick.
    fn tick_resolution(&self) -> Option<Ratio>;

    /// Wall-clock instant of common tick zero.
    fn origin(&self) -> Option<DateTime<Utc>>;

    /// Common-tick domain value at which synchronization started.
    fn offset(&self) -> Option<i64>;

    /// Common samples per second.
    fn common_sample_rate(&self) -> Option<f64>;
}

/// Reads time-aligned blocks of samples from several streams.
///
/// `V` is the value read type and `D` the domain read type. Each read
/// fills one value buffer per stream, in attach order; stream `i` receives
/// `count * divider_i` samples for `count` common samples.
pub struct MultiReader<V: Sample = f64, D: Sample = i64> {
    coordinator: SynchronizationCoordinator,
    timeout_type: TimeoutType,
    _types: PhantomData<fn() -> (V, D)>,
}

/// Releases the single read slot of a reader.
struct ReadSlot<'a>(&'a Shared);

impl<'a> ReadSlot<'a> {
    fn acquire(shared: &'a Shared) -> Option<Self> {
        shared.begin_read().then_some(Self(shared))
    }
}

impl Drop for ReadSlot<'_> {
    fn drop(&mut self) {
        self.0.end_read();
    }
}

impl<V: Sample, D: Sample> MultiReader<V, D> {
    pub(crate) fn new(config: &ReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coordinator: SynchronizationCoordinator::new(config, V::SAMPLE_TYPE),
            timeout_type: config.timeout_type,
            _types: PhantomData,
        })
    }

    /// Adds a stream. Descriptors given here are validated at once; streams
    /// may also announce them in-band with a descriptor-changed event.
    pub fn attach(
        &self,
        connection: impl Connection + 'static,
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    ) -> Result<StreamId> {
        self.attach_boxed(Box::new(connection), value, domain)
    }

    pub(crate) fn attach_boxed(
        &self,
        connection: Box<dyn Connection>,
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    ) -> Result<StreamId> {
        self.coordinator.attach(connection, value, domain)
    }

    /// Removes a stream. Reads fail until another stream is attached.
    pub fn detach(&self, id: StreamId) -> Result<()> {
        self.coordinator.detach(id)
    }

    pub fn stream_count(&self) -> usize {
        self.coordinator.shared().lock().streams.len()
    }

    /// Common samples a read could deliver right now.
    pub fn available_count(&self) -> usize {
        let mut state = self.coordinator.shared().lock();
        state.drain_all();
        if let Err(err) = state.try_synchronize() {
            trace!(%err, "not synchronizable");
        }
        state.discard_incomplete();
        state.available_common_count()
    }

    /// Reads up to `count` common samples into `values`, one buffer per
    /// stream. Blocks up to `timeout` while nothing can be delivered.
    pub fn read(&self, values: &mut [&mut [V]], count: usize, timeout: Duration) -> ReadResult {
        self.read_request(Some(values), None, count, timeout)
    }

    /// Like [read](Self::read), additionally writing each sample's domain
    /// value in stream ticks.
    pub fn read_with_domain(
        &self,
        values: &mut [&mut [V]],
        domains: &mut [&mut [D]],
        count: usize,
        timeout: Duration,
    ) -> ReadResult {
        self.read_request(Some(values), Some(domains), count, timeout)
    }

    /// Discards up to `count` common samples without copying. Never blocks.
    pub fn skip_samples(&self, count: usize) -> ReadResult {
        self.read_request(None, None, count, Duration::ZERO)
    }

    /// Pops every event at a stream head and applies it, leaving the
    /// event-paused state. Returns the events keyed by stream position.
    pub fn acknowledge_events(&self) -> IndexMap<usize, EventPacket> {
        let shared = self.coordinator.shared();
        let mut state = shared.lock();
        state.drain_all();
        let events = state.acknowledge_events();
        if !events.is_empty() {
            debug!(count = events.len(), "events acknowledged");
        }
        if let Err(err) = state.try_synchronize() {
            debug!(%err, "resynchronization failed");
        }
        shared.notify_waiters();
        events
    }

    fn read_request(
        &self,
        mut values: Option<&mut [&mut [V]]>,
        mut domains: Option<&mut [&mut [D]]>,
        count: usize,
        timeout: Duration,
    ) -> ReadResult {
        let shared = self.coordinator.shared();
        let Some(_slot) = ReadSlot::acquire(shared) else {
            return ReadResult::fail(ReaderError::ConcurrentRead);
        };

        let deadline = Instant::now().checked_add(timeout);
        let mut state = shared.lock();

        loop {
            state.drain_all();
            state.discard_unreadable();
            state.discard_incomplete();

            if let Err(err) = state.check_readable() {
                return ReadResult::fail(err);
            }
            if !state.active {
                return ReadResult::ok(0, state.position);
            }
            if let Some(events) = state.pause_on_events() {
                return ReadResult::event(events);
            }
            if let Some(fault) = state.fault() {
                return ReadResult::fail(fault);
            }
            let synchronized = match state.try_synchronize() {
                Ok(synchronized) => synchronized,
                Err(err) => return ReadResult::fail(err),
            };
            if let Err(err) = check_buffers(&state, values.as_deref(), count, "value")
                .and_then(|()| check_buffers(&state, domains.as_deref(), count, "domain"))
            {
                return ReadResult::fail(err);
            }

            let available = if synchronized {
                state.available_common_count()
            } else {
                0
            };
            let ready = match self.timeout_type {
                TimeoutType::Any => available > 0,
                TimeoutType::All => available >= count,
            };
            let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);

            if count == 0 || ready || expired {
                let delivered = count.min(available);
                let offset =
                    state.deliver(delivered, values.as_deref_mut(), domains.as_deref_mut());
                trace!(requested = count, delivered, ?offset, "read");
                return ReadResult::ok(delivered, offset);
            }

            state = shared.wait_until(state, deadline);
        }
    }
}

/// One buffer per stream, each long enough for `count` common samples once
/// the dividers are known.
fn check_buffers<T>(
    state: &CoordinatorState,
    buffers: Option<&[&mut [T]]>,
    count: usize,
    what: &str,
) -> Result<()> {
    let Some(buffers) = buffers else {
        return Ok(());
    };
    if buffers.len() != state.streams.len() {
        return Err(ReaderError::invalid_argument(format!(
            "{} {what} buffers given for {} streams",
            buffers.len(),
            state.streams.len()
        )));
    }
    for (index, (buffer, stream)) in buffers.iter().zip(&state.streams).enumerate() {
        let Some(sync) = stream.sync_state() else {
            continue;
        };
        let required = count.saturating_mul(sync.divider as usize);
        if buffer.len() < required {
            return Err(ReaderError::invalid_argument(format!(
                "{what} buffer {index} holds {} samples, {required} required",
                buffer.len()
            )));
        }
    }
    Ok(())
}

impl<V: Sample, D: Sample> ReaderControl for MultiReader<V, D> {
    fn set_active(&self, active: bool) {
        self.coordinator.set_active(active);
    }

    fn is_active(&self) -> bool {
        self.coordinator.shared().lock().active
    }

    fn set_on_data_available(&self, callback: Option<DataAvailableCallback>) {
        self.coordinator.set_on_data_available(callback);
    }

    fn invalidate(&self, reason: ReaderError) {
        self.coordinator.invalidate(reason);
    }
}

impl<V: Sample, D: Sample> DomainInfo for MultiReader<V, D> {
    fn is_synchronized(&self) -> bool {
        self.coordinator.shared().lock().is_synchronized()
    }

    fn tick_resolution(&self) -> Option<Ratio> {
        let state = self.coordinator.shared().lock();
        state
            .alignment
            .as_ref()
            .map(|alignment| alignment.common_resolution)
    }

    fn origin(&self) -> Option<DateTime<Utc>> {
        let state = self.coordinator.shared().lock();
        state.alignment.as_ref().and_then(|alignment| alignment.origin)
    }

    fn offset(&self) -> Option<i64> {
        let state = self.coordinator.shared().lock();
        state.is_synchronized().then_some(state.common_start).flatten()
    }

    fn common_sample_rate(&self) -> Option<f64> {
        let state = self.coordinator.shared().lock();
        state
            .alignment
            .as_ref()
            .map(|alignment| alignment.common_sample_rate())
    }
}
