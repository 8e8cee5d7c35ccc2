use crate::error::{ReaderError, Result};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// How values are converted on copy-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Apply the value descriptor's post-scaling, then convert.
    #[default]
    Scaled,
    /// Convert raw values without post-scaling.
    Unscaled,
    /// Copy raw values; the read type must equal the native sample type.
    RawValues,
}

/// When a blocking read may return before its timeout elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutType {
    /// Return as soon as any common sample can be delivered.
    #[default]
    Any,
    /// Wait until the full requested count can be delivered.
    All,
}

/// Configuration of a [MultiReader](crate::MultiReader).
///
/// The value and domain read types are the reader's type parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub read_mode: ReadMode,
    pub timeout_type: TimeoutType,
    /// Common sample rate in Hz. `None` derives it from the streams.
    pub required_common_sample_rate: Option<u64>,
    /// Round the synchronization start up to a multiple of the common delta.
    pub start_on_full_unit_of_domain: bool,
    /// Common samples required before the data-available callback fires.
    pub min_read_count: usize,
    /// Native samples each stream buffers before the reader stops pulling
    /// from its connection. `None` is unbounded.
    pub buffer_size: Option<usize>,
    /// Accept streams whose native sample rates differ.
    pub allow_different_sample_rates: bool,
    /// Reject domains the aligner cannot reason about when attaching.
    pub strict: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::Scaled,
            timeout_type: TimeoutType::Any,
            required_common_sample_rate: None,
            start_on_full_unit_of_domain: false,
            min_read_count: 1,
            buffer_size: None,
            allow_different_sample_rates: true,
            strict: true,
        }
    }
}

impl ReaderConfig {
    /// Every stream must share one sample rate.
    pub fn same_rate() -> Self {
        Self {
            allow_different_sample_rates: false,
            ..Self::default()
        }
    }

    /// Streams may differ in rate, aligned onto an explicit common rate.
    pub fn multi_rate(common_sample_rate: u64) -> Self {
        Self {
            required_common_sample_rate: Some(common_sample_rate),
            ..Self::default()
        }
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read reader config: {}", path.display()))?;

        let config: ReaderConfig = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse reader config: {}", path.display()))?;

        config
            .validate()
            .wrap_err_with(|| format!("Invalid reader config: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_read_count == 0 {
            return Err(ReaderError::configuration(
                "min_read_count must be greater than zero",
            ));
        }
        if self.buffer_size == Some(0) {
            return Err(ReaderError::configuration(
                "buffer_size must be greater than zero",
            ));
        }
        if self.required_common_sample_rate == Some(0) {
            return Err(ReaderError::configuration(
                "required_common_sample_rate must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn with_timeout_type(mut self, timeout_type: TimeoutType) -> Self {
        self.timeout_type = timeout_type;
        self
    }

    pub fn with_required_common_sample_rate(mut self, rate: u64) -> Self {
        self.required_common_sample_rate = Some(rate);
        self
    }

    pub fn with_start_on_full_unit_of_domain(mut self, enabled: bool) -> Self {
        self.start_on_full_unit_of_domain = enabled;
        self
    }

    pub fn with_min_read_count(mut self, min_read_count: usize) -> Self {
        self.min_read_count = min_read_count;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    pub fn with_allow_different_sample_rates(mut self, allow: bool) -> Self {
        self.allow_different_sample_rates = allow;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
