use sigsync_core::{
    DataDescriptor, DeliveryMode, DomainDescriptor, DomainInfo, MultiReader, MultiReaderBuilder,
    Packet, Producer, Ratio, ReadStatus, ReaderConfig, SampleType, channel,
};
use std::time::Duration;
use tokio::runtime::Handle;

const PACKET_MS: i64 = 100;

/// Feed a sine at `rate_hz` in packets of 100 ms, starting `start_ms` late.
async fn produce(
    producer: Producer,
    rate_hz: i64,
    start_ms: i64,
    packets: usize,
) -> eyre::Result<()> {
    let delta = 1000 / rate_hz;
    let len = (PACKET_MS / delta) as usize;

    for packet in 0..packets {
        let offset = start_ms + packet as i64 * PACKET_MS;
        let values: Vec<f32> = (0..len)
            .map(|k| ((offset + k as i64 * delta) as f32 / 1000.0 * std::f32::consts::TAU).sin())
            .collect();
        producer.send(Packet::data(offset, values))?;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let millis = Ratio::new(1, 1000)?;
    let mode = DeliveryMode::Scheduled(Handle::current());

    // A 1 kHz and a 250 Hz stream in millisecond ticks.
    let (fast_tx, fast_rx) = channel(mode.clone());
    let (slow_tx, slow_rx) = channel(mode);

    let reader: MultiReader<f32> = MultiReaderBuilder::new()
        .with_config(ReaderConfig::default().with_min_read_count(25))
        .add_input_with_descriptors(
            fast_rx,
            DataDescriptor::new(SampleType::Float32).with_name("fast"),
            DomainDescriptor::linear(1, 0, millis),
        )
        .add_input_with_descriptors(
            slow_rx,
            DataDescriptor::new(SampleType::Float32).with_name("slow"),
            DomainDescriptor::linear(4, 0, millis),
        )
        .build()?;

    // The slow stream starts 30 ms late; the reader drops the fast
    // stream's first 30 samples.
    let fast = tokio::spawn(produce(fast_tx, 1000, 0, 10));
    let slow = tokio::spawn(produce(slow_tx, 250, 30, 10));

    let reader = tokio::task::spawn_blocking(move || {
        let mut fast = vec![0.0f32; 4 * 50];
        let mut slow = vec![0.0f32; 50];
        let mut total = 0;

        loop {
            let result = reader.read(
                &mut [&mut fast[..], &mut slow[..]],
                50,
                Duration::from_millis(200),
            );
            match result.status {
                ReadStatus::Ok if result.count == 0 => break,
                ReadStatus::Ok => {
                    total += result.count;
                    println!(
                        "read {} common samples at tick {:?}: fast[0] = {:.3}, slow[0] = {:.3}",
                        result.count, result.offset, fast[0], slow[0]
                    );
                }
                ReadStatus::Event => {
                    println!("events: {:?}", reader.acknowledge_events());
                }
                ReadStatus::Fail | ReadStatus::Unknown => {
                    println!("read failed: {:?}", result.error);
                    break;
                }
            }
        }

        println!(
            "{total} common samples at {:?} Hz, synchronized from tick {:?}",
            reader.common_sample_rate(),
            reader.offset()
        );
        reader
    })
    .await?;

    fast.await??;
    slow.await??;
    drop(reader);
    Ok(())
}
