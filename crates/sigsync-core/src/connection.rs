//! The boundary between producers and the reader.
//!
//! The reader only needs [Connection]: something it can dequeue packets
//! from and bind an [ArrivalNotifier] to. [channel] provides an in-process
//! implementation backed by a flume queue, with a per-stream choice of
//! [DeliveryMode] for the arrival notification.

use crate::{
    coordinator::Shared,
    error::{ReaderError, Result},
    packet::Packet,
    types::StreamId,
};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::runtime::Handle;

/// A per-stream FIFO of packets fed by a producer.
pub trait Connection: Send {
    /// Removes the packet at the head of the queue, if any.
    fn dequeue(&self) -> Option<Packet>;

    /// Registers the notifier the producer side calls after enqueuing.
    fn bind(&self, notifier: ArrivalNotifier);

    /// Drops the registered notifier.
    fn unbind(&self);
}

/// Tells a reader that packets were enqueued on one of its streams.
///
/// Holds only a weak reference, so a notifier outliving its reader is
/// harmless.
#[derive(Debug, Clone)]
pub struct ArrivalNotifier {
    shared: Weak<Shared>,
    stream: StreamId,
}

impl ArrivalNotifier {
    pub(crate) fn new(shared: Weak<Shared>, stream: StreamId) -> Self {
        Self { shared, stream }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn notify(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_arrival(self.stream);
        }
    }
}

/// The thread an arrival notification runs on.
#[derive(Debug, Clone, Default)]
pub enum DeliveryMode {
    /// The producer's thread runs the notification inside `send`.
    #[default]
    Direct,
    /// The notification is dispatched to the blocking pool of a tokio
    /// runtime. Notifications coalesce while one is pending.
    Scheduled(Handle),
}

#[derive(Debug)]
struct Link {
    mode: DeliveryMode,
    notifier: Mutex<Option<ArrivalNotifier>>,
    slot_tx: flume::Sender<()>,
    slot_rx: flume::Receiver<()>,
}

impl Link {
    fn notifier(&self) -> Option<ArrivalNotifier> {
        self.notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_notifier(&self, notifier: Option<ArrivalNotifier>) {
        *self.notifier.lock().unwrap_or_else(PoisonError::into_inner) = notifier;
    }
}

/// Creates a connected producer/queue pair with an unbounded queue.
pub fn channel(mode: DeliveryMode) -> (Producer, PacketQueue) {
    connect(mode, flume::unbounded())
}

/// Creates a producer/queue pair holding at most `capacity` packets the
/// reader has not pulled yet. [Producer::send] fails with
/// [ReaderError::QueueFull] beyond that.
pub fn bounded_channel(mode: DeliveryMode, capacity: usize) -> (Producer, PacketQueue) {
    connect(mode, flume::bounded(capacity))
}

fn connect(
    mode: DeliveryMode,
    (tx, rx): (flume::Sender<Packet>, flume::Receiver<Packet>),
) -> (Producer, PacketQueue) {
    let (slot_tx, slot_rx) = flume::bounded(1);
    let link = Arc::new(Link {
        mode,
        notifier: Mutex::new(None),
        slot_tx,
        slot_rx,
    });

    let producer = Producer {
        tx,
        link: link.clone(),
    };
    let queue = PacketQueue { rx, link };
    (producer, queue)
}

/// The sending half of [channel].
#[derive(Debug, Clone)]
pub struct Producer {
    tx: flume::Sender<Packet>,
    link: Arc<Link>,
}

impl Producer {
    /// Enqueues a packet and notifies the bound reader. Never blocks; a
    /// full bounded queue rejects the packet.
    pub fn send(&self, packet: impl Into<Packet>) -> Result<()> {
        self.tx.try_send(packet.into()).map_err(|err| match err {
            flume::TrySendError::Full(_) => ReaderError::QueueFull {
                capacity: self.tx.capacity().unwrap_or_default(),
            },
            flume::TrySendError::Disconnected(_) => {
                ReaderError::invalid_state("packet queue was dropped")
            }
        })?;
        self.notify();
        Ok(())
    }

    /// Number of packets not yet dequeued by the reader.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    fn notify(&self) {
        match &self.link.mode {
            DeliveryMode::Direct => {
                if let Some(notifier) = self.link.notifier() {
                    notifier.notify();
                }
            }
            DeliveryMode::Scheduled(handle) => {
                // A full slot means a notification is already pending and
                // will observe this packet.
                if self.link.slot_tx.try_send(()).is_err() {
                    return;
                }
                let link = self.link.clone();
                handle.spawn_blocking(move || {
                    let _ = link.slot_rx.try_recv();
                    if let Some(notifier) = link.notifier() {
                        notifier.notify();
                    }
                });
            }
        }
    }
}

/// The receiving half of [channel], attached to a reader.
#[derive(Debug)]
pub struct PacketQueue {
    rx: flume::Receiver<Packet>,
    link: Arc<Link>,
}

impl Connection for PacketQueue {
    fn dequeue(&self) -> Option<Packet> {
        self.rx.try_recv().ok()
    }

    fn bind(&self, notifier: ArrivalNotifier) {
        self.link.set_notifier(Some(notifier));
    }

    fn unbind(&self) {
        self.link.set_notifier(None);
    }
}
