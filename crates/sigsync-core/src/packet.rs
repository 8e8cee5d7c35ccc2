use crate::{
    descriptor::{DataDescriptor, DomainDescriptor},
    sample::SampleData,
};

/// A unit of data delivered through a stream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Data(DataPacket),
    Event(EventPacket),
}

impl Packet {
    pub fn data(offset: i64, values: impl Into<SampleData>) -> Self {
        Packet::Data(DataPacket::new(offset, values))
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Packet::Event(_))
    }
}

/// A block of consecutive samples. The domain value of sample `n` is
/// `offset + rule.start + n * rule.delta` in the stream's domain ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    pub offset: i64,
    pub values: SampleData,
}

impl DataPacket {
    pub fn new(offset: i64, values: impl Into<SampleData>) -> Self {
        Self {
            offset,
            values: values.into(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }
}

/// In-band events. They are never consumed implicitly by a read.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPacket {
    /// Either descriptor may be absent when it did not change.
    DataDescriptorChanged {
        value: Option<DataDescriptor>,
        domain: Option<DomainDescriptor>,
    },
    /// The producer detected a discontinuity of `gap_diff` domain ticks.
    ImplicitDomainGapDetected { gap_diff: i64 },
}

impl EventPacket {
    pub const DATA_DESCRIPTOR_CHANGED: &'static str = "DATA_DESCRIPTOR_CHANGED";
    pub const IMPLICIT_DOMAIN_GAP_DETECTED: &'static str = "IMPLICIT_DOMAIN_GAP_DETECTED";

    pub fn id(&self) -> &'static str {
        match self {
            EventPacket::DataDescriptorChanged { .. } => Self::DATA_DESCRIPTOR_CHANGED,
            EventPacket::ImplicitDomainGapDetected { .. } => Self::IMPLICIT_DOMAIN_GAP_DETECTED,
        }
    }
}

impl From<EventPacket> for Packet {
    fn from(event: EventPacket) -> Self {
        Packet::Event(event)
    }
}

impl From<DataPacket> for Packet {
    fn from(packet: DataPacket) -> Self {
        Packet::Data(packet)
    }
}
