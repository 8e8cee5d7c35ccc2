//! The lock, wait condition and callback slot shared between producers and
//! the reader.

use crate::{
    config::ReaderConfig,
    connection::{ArrivalNotifier, Connection},
    descriptor::{DataDescriptor, DomainDescriptor, SampleType},
    error::{ReaderError, Result},
    state::CoordinatorState,
    types::StreamId,
};
use std::{
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};
use tracing::{debug, instrument, trace};

/// Invoked when enough common samples or an event became available.
pub type DataAvailableCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct Shared {
    state: Mutex<CoordinatorState>,
    cond: Condvar,
    callback: Mutex<Option<DataAvailableCallback>>,
    callback_in_flight: AtomicBool,
    reading: AtomicBool,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer-side entry point: pulls the stream's packets, wakes blocked
    /// reads and fires the data-available callback.
    pub(crate) fn on_arrival(&self, stream: StreamId) {
        let notify = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.drain(stream);
            if let Err(err) = state.try_synchronize() {
                debug!(%stream, %err, "synchronization attempt failed");
            }
            state.discard_incomplete();
            self.cond.notify_all();
            state.should_notify()
        };

        if notify {
            self.fire_callback();
        }
    }

    fn fire_callback(&self) {
        let Some(callback) = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return;
        };

        let Some(_in_flight) = InFlight::enter(&self.callback_in_flight) else {
            trace!("data-available callback already in flight");
            return;
        };
        callback();
    }

    /// Blocks until notified or `deadline` passes. `None` waits for a
    /// notification only.
    pub(crate) fn wait_until<'a>(
        &self,
        guard: MutexGuard<'a, CoordinatorState>,
        deadline: Option<Instant>,
    ) -> MutexGuard<'a, CoordinatorState> {
        match deadline {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                let (guard, _) = self
                    .cond
                    .wait_timeout(guard, timeout)
                    .unwrap_or_else(PoisonError::into_inner);
                guard
            }
            None => self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub(crate) fn notify_waiters(&self) {
        self.cond.notify_all();
    }

    /// Marks a read as running. Returns `false` if one already is.
    pub(crate) fn begin_read(&self) -> bool {
        self.reading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_read(&self) {
        self.reading.store(false, Ordering::Release);
    }
}

/// Holds the callback flag while a callback runs; cleared even if the
/// callback panics.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the streams of one reader and serializes every access to them.
pub struct SynchronizationCoordinator {
    shared: Arc<Shared>,
}

impl SynchronizationCoordinator {
    pub fn new(config: &ReaderConfig, value_read_type: SampleType) -> Self {
        let shared = Shared {
            state: Mutex::new(CoordinatorState::new(config, value_read_type)),
            cond: Condvar::new(),
            callback: Mutex::new(None),
            callback_in_flight: AtomicBool::new(false),
            reading: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Validates the stream's descriptors against the attached streams and
    /// binds its connection. Packets already queued are pulled at once.
    #[instrument(skip_all)]
    pub fn attach(
        &self,
        connection: Box<dyn Connection>,
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    ) -> Result<StreamId> {
        let id = {
            let mut state = self.shared.lock();
            let id = state.attach(connection, value, domain)?;
            let notifier = ArrivalNotifier::new(Arc::downgrade(&self.shared), id);
            if let Some(stream) = state.streams.last() {
                stream.connection().bind(notifier);
            }
            id
        };
        self.shared.on_arrival(id);
        Ok(id)
    }

    pub fn detach(&self, id: StreamId) -> Result<()> {
        let mut state = self.shared.lock();
        state.detach(id)?;
        self.shared.cond.notify_all();
        Ok(())
    }

    pub fn invalidate(&self, reason: ReaderError) {
        let mut state = self.shared.lock();
        state.invalidate(reason);
        self.shared.cond.notify_all();
    }

    /// Inactive readers keep queuing data but reads return immediately and
    /// the callback stays silent.
    pub fn set_active(&self, active: bool) {
        let notify = {
            let mut state = self.shared.lock();
            if state.active != active {
                debug!(active, "reader activity changed");
            }
            state.active = active;
            self.shared.cond.notify_all();
            state.should_notify()
        };
        if notify {
            self.shared.fire_callback();
        }
    }

    pub fn set_on_data_available(&self, callback: Option<DataAvailableCallback>) {
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }
}

impl Drop for SynchronizationCoordinator {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.destroyed = true;
        self.shared.cond.notify_all();
        for stream in &state.streams {
            stream.unbind();
        }
    }
}
