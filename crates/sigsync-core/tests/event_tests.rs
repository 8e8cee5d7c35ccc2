mod common;

use common::*;
use sigsync_core::{
    DomainDescriptor, DomainInfo, EventPacket, Ratio, ReadStatus, ReaderConfig, ReaderError, Unit,
};
use std::time::Duration;

fn domain_changed(domain: DomainDescriptor) -> EventPacket {
    EventPacket::DataDescriptorChanged {
        value: None,
        domain: Some(domain),
    }
}

fn metres() -> DomainDescriptor {
    domain(1).with_unit(Unit::new("m", "length"))
}

#[test]
fn test_gap_resynchronizes_past_the_gap() {
    init_tracing();
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 1]).build();
    producers[0].send(ramp(0, 1, 10)).unwrap();
    producers[0]
        .send(EventPacket::ImplicitDomainGapDetected { gap_diff: 10 })
        .unwrap();
    producers[0].send(ramp(20, 1, 10)).unwrap();
    producers[1].send(ramp(0, 1, 30)).unwrap();

    let mut bufs = buffers(&[10, 10]);
    assert_eq!(read_into(&reader, &mut bufs, 10, Duration::ZERO).count, 10);

    let result = read_into(&reader, &mut bufs, 10, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Event);
    assert_eq!(
        result.events[&0],
        EventPacket::ImplicitDomainGapDetected { gap_diff: 10 }
    );

    let acknowledged = reader.acknowledge_events();
    assert_eq!(acknowledged.keys().copied().collect::<Vec<_>>(), vec![0]);

    // Stream 1 drops the ten samples stream 0 never produced.
    let result = read_into(&reader, &mut bufs, 10, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 10);
    assert_eq!(result.offset, Some(20));
    assert_ramps(&bufs, &[10, 10], &[20.0, 20.0], &[1, 1]);
}

#[test]
fn test_event_behind_incomplete_common_sample_surfaces() {
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 2]).build();
    producers[0].send(ramp(0, 1, 5)).unwrap();
    producers[0]
        .send(EventPacket::ImplicitDomainGapDetected { gap_diff: 5 })
        .unwrap();
    producers[0].send(ramp(10, 1, 20)).unwrap();
    producers[1].send(ramp(0, 2, 30)).unwrap();

    let mut bufs = buffers(&[20, 10]);
    let result = read_into(&reader, &mut bufs, 10, Duration::from_millis(20));
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 2);

    // Stream 0 has one sample left but needs two per common sample.
    let result = read_into(&reader, &mut bufs, 10, Duration::from_millis(20));
    assert_eq!(result.status, ReadStatus::Event);
    assert!(result.events.contains_key(&0));
    reader.acknowledge_events();

    let result = read_into(&reader, &mut bufs, 5, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 5);
    assert_eq!(result.offset, Some(10));
    assert_ramps(&bufs, &[10, 5], &[10.0, 10.0], &[1, 2]);
}

#[test]
fn test_resolution_change_keeps_position() {
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 1]).build();
    producers[0].send(ramp(0, 1, 10)).unwrap();
    // Same 1 kHz rate, now counted in half-millisecond ticks.
    producers[0]
        .send(domain_changed(DomainDescriptor::linear(
            2,
            0,
            Ratio::new(1, 2000).unwrap(),
        )))
        .unwrap();
    producers[0].send(ramp(20, 2, 10)).unwrap();
    producers[1].send(ramp(0, 1, 20)).unwrap();

    let mut bufs = buffers(&[10, 10]);
    let result = read_into(&reader, &mut bufs, 10, Duration::ZERO);
    assert_eq!(result.offset, Some(0));
    assert!(read_into(&reader, &mut bufs, 10, Duration::ZERO).is_event());

    reader.acknowledge_events();
    assert_eq!(reader.tick_resolution(), Some(Ratio::new(1, 2000).unwrap()));

    // Ten samples consumed so far are twenty ticks in the new resolution.
    let result = read_into(&reader, &mut bufs, 5, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 5);
    assert_eq!(result.offset, Some(20));
    assert_ramps(&bufs, &[5, 5], &[20.0, 10.0], &[2, 1]);
    assert_eq!(reader.common_sample_rate(), Some(1000.0));
}

#[test]
fn test_rate_change_recomputes_dividers() {
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 1]).build();
    producers[0].send(ramp(0, 1, 4)).unwrap();
    producers[0].send(domain_changed(domain(2))).unwrap();
    producers[0].send(ramp(4, 2, 10)).unwrap();
    producers[1].send(ramp(0, 1, 40)).unwrap();

    let mut bufs = buffers(&[4, 4]);
    assert_eq!(read_into(&reader, &mut bufs, 4, Duration::ZERO).count, 4);
    assert!(reader.skip_samples(1).is_event());
    reader.acknowledge_events();

    // Stream 0 is now the 500 Hz one; stream 1 delivers two per common sample.
    let mut bufs = buffers(&[3, 6]);
    let result = read_into(&reader, &mut bufs, 3, Duration::ZERO);
    assert_eq!(result.count, 3);
    assert_eq!(result.offset, Some(4));
    assert_ramps(&bufs, &[3, 6], &[4.0, 4.0], &[2, 1]);
}

#[test]
fn test_strict_incompatible_domain_fails_until_repaired() {
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 1]).build();
    producers[0].send(ramp(0, 1, 5)).unwrap();
    producers[0].send(domain_changed(metres())).unwrap();
    producers[0].send(ramp(5, 1, 5)).unwrap();
    producers[1].send(ramp(0, 1, 20)).unwrap();

    let mut bufs = buffers(&[5, 5]);
    assert_eq!(read_into(&reader, &mut bufs, 5, Duration::ZERO).count, 5);
    assert!(read_into(&reader, &mut bufs, 5, Duration::ZERO).is_event());
    reader.acknowledge_events();

    for _ in 0..2 {
        let result = read_into(&reader, &mut bufs, 5, Duration::ZERO);
        assert_eq!(result.status, ReadStatus::Fail);
        assert!(matches!(result.error, Some(ReaderError::Configuration { .. })));
    }

    producers[0].send(domain_changed(domain(1))).unwrap();
    producers[0].send(ramp(10, 1, 5)).unwrap();
    assert!(read_into(&reader, &mut bufs, 5, Duration::ZERO).is_event());
    reader.acknowledge_events();

    let result = read_into(&reader, &mut bufs, 5, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 5);
    assert_eq!(result.offset, Some(10));
    assert_ramps(&bufs, &[5, 5], &[10.0, 10.0], &[1, 1]);
}

#[test]
fn test_relaxed_incompatible_domain_reads_nothing() {
    let config = ReaderConfig::default().with_strict(false);
    let (reader, producers) = ReaderBuilder::new().config(config).streams(&[1, 1]).build();
    producers[0].send(domain_changed(metres())).unwrap();
    producers[0].send(ramp(0, 1, 5)).unwrap();
    producers[1].send(ramp(0, 1, 5)).unwrap();

    let mut bufs = buffers(&[5, 5]);
    assert!(read_into(&reader, &mut bufs, 5, Duration::ZERO).is_event());
    reader.acknowledge_events();

    let result = read_into(&reader, &mut bufs, 5, Duration::from_millis(20));
    assert_eq!(result.status, ReadStatus::Ok);
    assert_eq!(result.count, 0);
    assert!(!reader.is_synchronized());
}

#[test]
fn test_events_on_several_streams_reported_together() {
    let (reader, producers) = ReaderBuilder::new().streams(&[1, 1, 1]).build();
    for producer in &producers {
        producer.send(ramp(0, 1, 4)).unwrap();
    }
    producers[0]
        .send(EventPacket::ImplicitDomainGapDetected { gap_diff: 1 })
        .unwrap();
    producers[2].send(domain_changed(domain(1))).unwrap();

    let mut bufs = buffers(&[4, 4, 4]);
    assert_eq!(read_into(&reader, &mut bufs, 4, Duration::ZERO).count, 4);

    let result = read_into(&reader, &mut bufs, 4, Duration::ZERO);
    assert_eq!(result.status, ReadStatus::Event);
    assert_eq!(result.events.keys().copied().collect::<Vec<_>>(), vec![0, 2]);

    assert_eq!(reader.acknowledge_events().len(), 2);
    assert_eq!(reader.available_count(), 0);
}
