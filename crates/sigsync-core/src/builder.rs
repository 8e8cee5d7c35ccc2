use crate::{
    config::ReaderConfig,
    connection::Connection,
    descriptor::{DataDescriptor, DomainDescriptor},
    error::{ReaderError, Result},
    reader::MultiReader,
    sample::Sample,
};
use std::marker::PhantomData;
use tracing::debug;

struct Input {
    connection: Box<dyn Connection>,
    value: Option<DataDescriptor>,
    domain: Option<DomainDescriptor>,
}

/// Collects the inputs and configuration of a [MultiReader].
///
/// ```rust
/// use sigsync_core::{
///     DataDescriptor, DeliveryMode, DomainDescriptor, MultiReader, MultiReaderBuilder, Ratio,
///     ReaderConfig, SampleType, channel,
/// };
///
/// # fn main() -> sigsync_core::Result<()> {
/// let (_producer, queue) = channel(DeliveryMode::Direct);
/// let domain = DomainDescriptor::linear(1, 0, Ratio::new(1, 1000)?);
///
/// let reader: MultiReader<f32> = MultiReaderBuilder::new()
///     .with_config(ReaderConfig::same_rate())
///     .add_input_with_descriptors(queue, DataDescriptor::new(SampleType::Float32), domain)
///     .build()?;
/// assert_eq!(reader.stream_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MultiReaderBuilder<V: Sample = f64, D: Sample = i64> {
    config: ReaderConfig,
    inputs: Vec<Input>,
    _types: PhantomData<fn() -> (V, D)>,
}

impl<V: Sample, D: Sample> Default for MultiReaderBuilder<V, D> {
    fn default() -> Self {
        Self {
            config: ReaderConfig::default(),
            inputs: Vec::new(),
            _types: PhantomData,
        }
    }
}

impl<V: Sample, D: Sample> MultiReaderBuilder<V, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a stream whose descriptors arrive in-band.
    pub fn add_input(mut self, connection: impl Connection + 'static) -> Self {
        self.inputs.push(Input {
            connection: Box::new(connection),
            value: None,
            domain: None,
        });
        self
    }

    /// Adds a stream with known descriptors, validated by
    /// [build](Self::build).
    pub fn add_input_with_descriptors(
        mut self,
        connection: impl Connection + 'static,
        value: DataDescriptor,
        domain: DomainDescriptor,
    ) -> Self {
        self.inputs.push(Input {
            connection: Box::new(connection),
            value: Some(value),
            domain: Some(domain),
        });
        self
    }

    /// Creates the reader and attaches every input in order. Fails if no
    /// input was added, the configuration is invalid or an input is
    /// rejected.
    pub fn build(self) -> Result<MultiReader<V, D>> {
        if self.inputs.is_empty() {
            return Err(ReaderError::configuration("at least one input is required"));
        }

        let reader = MultiReader::new(&self.config)?;
        let count = self.inputs.len();
        for input in self.inputs {
            reader.attach_boxed(input.connection, input.value, input.domain)?;
        }
        debug!(streams = count, read_mode = ?self.config.read_mode, "multi reader built");
        Ok(reader)
    }
}
