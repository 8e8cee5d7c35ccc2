//! Value and domain descriptors attached to a signal.
//!
//! A stream carries two descriptors: the [DataDescriptor] for its values and
//! the [DomainDescriptor] for the implicit domain (time) axis. The domain
//! descriptor is what the aligner reasons about.

use crate::error::{ReaderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native sample representation of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl SampleType {
    pub fn is_integral(self) -> bool {
        !matches!(self, SampleType::Float32 | SampleType::Float64)
    }
}

/// A reduced rational number with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    numerator: i64,
    denominator: i64,
}

impl Ratio {
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(ReaderError::configuration("ratio denominator is zero"));
        }
        let sign: i128 = if denominator < 0 { -1 } else { 1 };
        let divisor = gcd(numerator.unsigned_abs(), denominator.unsigned_abs()).max(1) as i128;
        let reduce = |value: i64| {
            i64::try_from(sign * value as i128 / divisor)
                .map_err(|_| ReaderError::overflow("normalizing a ratio"))
        };
        Ok(Self {
            numerator: reduce(numerator)?,
            denominator: reduce(denominator)?,
        })
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    pub fn is_positive(&self) -> bool {
        self.numerator > 0
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple, `None` when the result does not fit.
pub(crate) fn lcm(a: u64, b: u64) -> Option<u64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}

/// Physical unit of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub symbol: String,
    pub quantity: String,
}

impl Unit {
    pub fn new(symbol: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: quantity.into(),
        }
    }

    pub fn seconds() -> Self {
        Self::new("s", "time")
    }

    /// Whether domain ticks of this unit can be converted into seconds.
    pub fn is_seconds(&self) -> bool {
        self.symbol == "s" && (self.quantity.is_empty() || self.quantity == "time")
    }
}

/// Rule generating the domain value of each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainRule {
    /// Sample `n` has the value `packet offset + start + n * delta`.
    Linear { delta: i64, start: i64 },
    /// Every sample carries its own domain value.
    Explicit,
    /// Every sample has the same domain value.
    Constant(i64),
}

/// Linear post-scaling applied to raw values in [ReadMode::Scaled](crate::ReadMode::Scaled).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScaling {
    pub scale: f64,
    pub offset: f64,
}

impl LinearScaling {
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }
}

/// Describes the values of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDescriptor {
    pub sample_type: SampleType,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub post_scaling: Option<LinearScaling>,
    #[serde(default)]
    pub name: Option<String>,
}

impl DataDescriptor {
    pub fn new(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            unit: None,
            post_scaling: None,
            name: None,
        }
    }

    pub fn with_post_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.post_scaling = Some(LinearScaling { scale, offset });
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Describes the domain (time axis) of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    pub sample_type: SampleType,
    pub unit: Unit,
    pub rule: DomainRule,
    /// Seconds per domain tick.
    pub tick_resolution: Ratio,
    /// Wall-clock instant of domain value zero.
    #[serde(default)]
    pub origin: Option<DateTime<Utc>>,
    /// Identifies the clock the domain is ultimately derived from.
    #[serde(default)]
    pub reference_domain_id: Option<String>,
}

impl DomainDescriptor {
    /// A linear `Int64` domain in seconds.
    pub fn linear(delta: i64, start: i64, tick_resolution: Ratio) -> Self {
        Self {
            sample_type: SampleType::Int64,
            unit: Unit::seconds(),
            rule: DomainRule::Linear { delta, start },
            tick_resolution,
            origin: None,
            reference_domain_id: None,
        }
    }

    pub fn with_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_reference_domain(mut self, id: impl Into<String>) -> Self {
        self.reference_domain_id = Some(id.into());
        self
    }

    pub fn with_rule(mut self, rule: DomainRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Returns `(delta, start)` when the aligner can reason about this
    /// domain.
    pub fn linear_parameters(&self) -> Result<(i64, i64)> {
        if !self.unit.is_seconds() {
            return Err(ReaderError::configuration(format!(
                "domain unit '{}' ({}) is not convertible to seconds",
                self.unit.symbol, self.unit.quantity
            )));
        }
        if !self.tick_resolution.is_positive() {
            return Err(ReaderError::configuration(format!(
                "tick resolution {} is not positive",
                self.tick_resolution
            )));
        }
        match self.rule {
            DomainRule::Linear { delta, start } if delta > 0 => Ok((delta, start)),
            DomainRule::Linear { delta, .. } => Err(ReaderError::configuration(format!(
                "linear domain delta {delta} is not positive"
            ))),
            DomainRule::Explicit => Err(ReaderError::configuration(
                "explicit domain rule cannot be synchronized",
            )),
            DomainRule::Constant(_) => Err(ReaderError::configuration(
                "constant domain rule cannot be synchronized",
            )),
        }
    }
}
