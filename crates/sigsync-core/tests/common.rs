use sigsync_core::{
    DataDescriptor, DeliveryMode, DomainDescriptor, MultiReader, MultiReaderBuilder, Packet,
    Producer, Ratio, ReadResult, ReaderConfig, SampleType, bounded_channel, channel,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn millis() -> Ratio {
    Ratio::new(1, 1000).unwrap()
}

/// A linear domain in millisecond ticks.
pub fn domain(delta: i64) -> DomainDescriptor {
    DomainDescriptor::linear(delta, 0, millis())
}

/// Samples whose values equal their domain value, so a read can be checked
/// for alignment by value.
pub fn ramp(offset: i64, delta: i64, len: usize) -> Packet {
    let values: Vec<f64> = (0..len as i64).map(|k| (offset + k * delta) as f64).collect();
    Packet::data(offset, values)
}

/// ReaderBuilder for readers over in-process channels
pub struct ReaderBuilder {
    config: ReaderConfig,
    domains: Vec<DomainDescriptor>,
    mode: DeliveryMode,
    capacity: Option<usize>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            config: ReaderConfig::default(),
            domains: Vec::new(),
            mode: DeliveryMode::Direct,
            capacity: None,
        }
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    #[allow(dead_code)]
    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Queues holding at most `capacity` unread packets.
    #[allow(dead_code)]
    pub fn bounded(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Adds one millisecond-tick stream per delta.
    pub fn streams(mut self, deltas: &[i64]) -> Self {
        self.domains.extend(deltas.iter().map(|&delta| domain(delta)));
        self
    }

    #[allow(dead_code)]
    pub fn stream_with_domain(mut self, domain: DomainDescriptor) -> Self {
        self.domains.push(domain);
        self
    }

    pub fn build(self) -> (MultiReader, Vec<Producer>) {
        let mut builder = MultiReaderBuilder::new().with_config(self.config);
        let mut producers = Vec::new();
        for domain in self.domains {
            let (producer, queue) = match self.capacity {
                Some(capacity) => bounded_channel(self.mode.clone(), capacity),
                None => channel(self.mode.clone()),
            };
            builder = builder.add_input_with_descriptors(
                queue,
                DataDescriptor::new(SampleType::Float64),
                domain,
            );
            producers.push(producer);
        }
        (builder.build().unwrap(), producers)
    }
}

/// Destination buffers of the given lengths.
pub fn buffers(lens: &[usize]) -> Vec<Vec<f64>> {
    lens.iter().map(|&len| vec![f64::NAN; len]).collect()
}

/// Read into owned buffers.
pub fn read_into(
    reader: &MultiReader,
    buffers: &mut [Vec<f64>],
    count: usize,
    timeout: Duration,
) -> ReadResult {
    let mut slices: Vec<&mut [f64]> = buffers.iter_mut().map(|buffer| &mut buffer[..]).collect();
    reader.read(&mut slices, count, timeout)
}

/// Assert that the first `count` values of every buffer continue each
/// stream's ramp from `expected_first`.
#[allow(dead_code)]
pub fn assert_ramps(
    buffers: &[Vec<f64>],
    counts: &[usize],
    expected_first: &[f64],
    deltas: &[i64],
) {
    for (index, buffer) in buffers.iter().enumerate() {
        for k in 0..counts[index] {
            let expected = expected_first[index] + (k as i64 * deltas[index]) as f64;
            assert_eq!(
                buffer[k], expected,
                "stream {index} sample {k}: expected {expected}, got {}",
                buffer[k]
            );
        }
    }
}
