use crate::packet::{DataPacket, EventPacket, Packet};
use std::{collections::VecDeque, ops::Range};

/// A FIFO of packets dequeued from one connection, with a read cursor
/// inside the head data packet.
///
/// Reading never crosses an event packet: samples after an event only
/// become available once the event at the head has been popped.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    packets: VecDeque<Packet>,
    /// Samples already consumed from the head data packet.
    cursor: usize,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets held, including partially consumed ones.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Appends a packet. Empty data packets carry nothing and are ignored.
    pub fn push(&mut self, packet: Packet) {
        if let Packet::Data(data) = &packet
            && data.sample_count() == 0
        {
            return;
        }
        self.packets.push_back(packet);
    }

    /// Samples queued before the first event packet.
    pub fn available(&self) -> usize {
        let mut total = 0;
        for packet in &self.packets {
            match packet {
                Packet::Data(data) => total += data.sample_count(),
                Packet::Event(_) => break,
            }
        }
        total - self.cursor
    }

    /// Samples held across all data packets, events included.
    pub fn queued_samples(&self) -> usize {
        let total: usize = self
            .packets
            .iter()
            .map(|packet| match packet {
                Packet::Data(data) => data.sample_count(),
                Packet::Event(_) => 0,
            })
            .sum();
        total - self.cursor
    }

    pub fn has_event(&self) -> bool {
        self.packets.iter().any(Packet::is_event)
    }

    /// The event at the head of the queue, if any.
    pub fn front_event(&self) -> Option<&EventPacket> {
        match self.packets.front()? {
            Packet::Event(event) => Some(event),
            Packet::Data(_) => None,
        }
    }

    /// Pops the head packet only when it is an event.
    pub fn pop_event(&mut self) -> Option<EventPacket> {
        self.front_event()?;
        match self.packets.pop_front() {
            Some(Packet::Event(event)) => Some(event),
            _ => None,
        }
    }

    /// The head data packet and the index of its next unconsumed sample.
    pub fn front_data(&self) -> Option<(&DataPacket, usize)> {
        match self.packets.front()? {
            Packet::Data(data) => Some((data, self.cursor)),
            Packet::Event(_) => None,
        }
    }

    /// Consumes up to `count` samples, calling `sink` once per touched
    /// packet with the consumed sample range and the number of samples
    /// handed out before it. Returns the number consumed, which is short
    /// when an event or the end of the queue is reached.
    pub fn consume_with<F>(&mut self, count: usize, mut sink: F) -> usize
    where
        F: FnMut(&DataPacket, Range<usize>, usize),
    {
        let mut consumed = 0;

        while consumed < count {
            let Some(Packet::Data(data)) = self.packets.front() else {
                break;
            };

            let remaining = data.sample_count() - self.cursor;
            let take = remaining.min(count - consumed);
            sink(data, self.cursor..self.cursor + take, consumed);
            consumed += take;

            if take == remaining {
                self.packets.pop_front();
                self.cursor = 0;
            } else {
                self.cursor += take;
            }
        }

        consumed
    }

    /// Drops every sample queued before the first event and returns the
    /// number dropped.
    pub fn drop_until_event(&mut self) -> usize {
        let mut count = 0;
        while let Some((data, cursor)) = self.front_data() {
            count += data.sample_count() - cursor;
            self.packets.pop_front();
            self.cursor = 0;
        }
        count
    }

    /// Drops samples whose domain value is below `threshold` and returns
    /// the number of dropped samples. Stops at the first event.
    pub fn drop_before(&mut self, threshold: i64, start: i64, delta: i64) -> usize {
        let mut count = 0;

        loop {
            let Some((data, cursor)) = self.front_data() else {
                break;
            };

            let first = data.offset + start;
            // Index of the first sample with value >= threshold.
            let keep_from = if threshold <= first {
                0
            } else {
                let distance = (threshold - first) as u64;
                distance.div_ceil(delta as u64) as usize
            };
            let keep_from = keep_from.max(cursor);
            let len = data.sample_count();

            if keep_from >= len {
                count += len - cursor;
                self.packets.pop_front();
                self.cursor = 0;
            } else {
                count += keep_from - cursor;
                self.cursor = keep_from;
                break;
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::EventPacket;

    fn data(offset: i64, len: usize) -> Packet {
        Packet::data(offset, (0..len).map(|v| v as f64).collect::<Vec<_>>())
    }

    fn gap() -> Packet {
        Packet::Event(EventPacket::ImplicitDomainGapDetected { gap_diff: 10 })
    }

    #[test]
    fn test_buffer_available_stops_at_event() {
        let mut buffer = PacketBuffer::new();
        assert_eq!(buffer.available(), 0);

        buffer.push(data(0, 4));
        buffer.push(data(4, 3));
        buffer.push(gap());
        buffer.push(data(20, 5));

        assert_eq!(buffer.available(), 7);
        assert_eq!(buffer.queued_samples(), 12);
        assert!(buffer.has_event());
        assert_eq!(buffer.len(), 4);
        assert!(buffer.front_event().is_none());
    }

    #[test]
    fn test_buffer_ignores_empty_data_packets() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffer_consume_across_packets() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 4));
        buffer.push(data(4, 3));

        let mut ranges = Vec::new();
        let consumed = buffer.consume_with(6, |packet, range, written| {
            ranges.push((packet.offset, range, written));
        });

        assert_eq!(consumed, 6);
        assert_eq!(ranges, vec![(0, 0..4, 0), (4, 0..2, 4)]);
        assert_eq!(buffer.available(), 1);
        assert_eq!(buffer.front_data().unwrap().1, 2);
    }

    #[test]
    fn test_buffer_consume_stops_at_event() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 4));
        buffer.push(gap());
        buffer.push(data(20, 5));

        let consumed = buffer.consume_with(10, |_, _, _| {});
        assert_eq!(consumed, 4);
        assert!(buffer.front_event().is_some());
        assert_eq!(buffer.available(), 0);

        // Consuming again does not skip the event.
        assert_eq!(buffer.consume_with(10, |_, _, _| {}), 0);
        assert!(buffer.pop_event().is_some());
        assert_eq!(buffer.available(), 5);
    }

    #[test]
    fn test_buffer_pop_event_keeps_data() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 2));
        assert!(buffer.pop_event().is_none());
        assert_eq!(buffer.available(), 2);
    }

    #[test]
    fn test_buffer_drop_before_within_packet() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(100, 10));

        // delta 2: values 100, 102, ..., 118
        let dropped = buffer.drop_before(105, 0, 2);
        assert_eq!(dropped, 3);
        assert_eq!(buffer.available(), 7);
    }

    #[test]
    fn test_buffer_drop_before_whole_packets() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 4));
        buffer.push(data(4, 4));
        buffer.push(data(8, 4));

        let dropped = buffer.drop_before(9, 0, 1);
        assert_eq!(dropped, 9);
        assert_eq!(buffer.len(), 1);
        let expected = DataPacket::new(8, vec![0.0f64, 1.0, 2.0, 3.0]);
        assert_eq!(buffer.front_data().unwrap(), (&expected, 1));
    }

    #[test]
    fn test_buffer_drop_until_event() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 4));
        buffer.push(data(4, 4));
        buffer.push(gap());
        buffer.push(data(100, 4));

        buffer.consume_with(1, |_, _, _| {});
        assert_eq!(buffer.drop_until_event(), 7);
        assert!(buffer.front_event().is_some());
        assert_eq!(buffer.drop_until_event(), 0);
    }

    #[test]
    fn test_buffer_drop_before_respects_cursor_and_events() {
        let mut buffer = PacketBuffer::new();
        buffer.push(data(0, 4));
        buffer.push(gap());
        buffer.push(data(100, 4));

        buffer.consume_with(1, |_, _, _| {});
        let dropped = buffer.drop_before(1000, 0, 1);
        assert_eq!(dropped, 3);
        assert!(buffer.front_event().is_some());
    }
}
