//! Resolution of a common virtual clock across streams.
//!
//! Every stream's domain is expressed in a common tick resolution (the
//! rational GCD of all tick resolutions), so native periods become integers
//! in common ticks. The common delta is the LCM of those periods, or an
//! explicitly required rate, and each stream's divider is the integer ratio
//! between the two.

use crate::{
    descriptor::{DomainDescriptor, Ratio, gcd, lcm},
    error::{ReaderError, Result},
};
use chrono::{DateTime, Utc};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// The domain parameters of one stream the aligner reasons about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDomain {
    pub delta: i64,
    pub start: i64,
    pub resolution: Ratio,
    pub origin: Option<DateTime<Utc>>,
    pub reference_domain_id: Option<String>,
}

impl StreamDomain {
    pub fn from_descriptor(descriptor: &DomainDescriptor) -> Result<Self> {
        let (delta, start) = descriptor.linear_parameters()?;
        Ok(Self {
            delta,
            start,
            resolution: descriptor.tick_resolution,
            origin: descriptor.origin,
            reference_domain_id: descriptor.reference_domain_id.clone(),
        })
    }
}

/// How one stream maps onto the common clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamAlignment {
    /// Common ticks per native tick.
    pub scale: i64,
    /// Common-tick value of the stream's domain value zero.
    pub origin_offset: i64,
    /// Native sample period in common ticks.
    pub native_delta: i64,
    /// Native samples per common sample.
    pub divider: u64,
}

/// The resolved common clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// Seconds per common tick.
    pub common_resolution: Ratio,
    /// Common sample period in common ticks.
    pub common_delta: i64,
    /// Wall-clock instant of common tick zero.
    pub origin: Option<DateTime<Utc>>,
    pub streams: Vec<StreamAlignment>,
}

impl Alignment {
    /// Converts a native domain value of `stream` into common ticks.
    pub fn to_common(&self, stream: usize, ticks: i64) -> Result<i64> {
        let alignment = &self.streams[stream];
        let value = alignment.origin_offset as i128 + ticks as i128 * alignment.scale as i128;
        narrow(value, "converting a domain value to common ticks")
    }

    /// The smallest native domain value of `stream` at or after `common`.
    pub fn to_stream_ceil(&self, stream: usize, common: i64) -> Result<i64> {
        let alignment = &self.streams[stream];
        let relative = common as i128 - alignment.origin_offset as i128;
        narrow(
            ceil_div(relative, alignment.scale as i128),
            "converting common ticks to a domain value",
        )
    }

    /// Common samples per second.
    pub fn common_sample_rate(&self) -> f64 {
        let seconds = self.common_resolution.as_f64() * self.common_delta as f64;
        1.0 / seconds
    }

    pub fn dividers(&self) -> Vec<u64> {
        self.streams.iter().map(|stream| stream.divider).collect()
    }

    /// Re-expresses a domain value in `previous` common ticks in this
    /// alignment's common ticks, rounding down.
    pub fn convert_from(&self, previous: &Alignment, value: i64) -> Result<i64> {
        let scaled = self.rescale_from(previous, value)? as i128;
        let shift = match (previous.origin, self.origin) {
            (Some(old), Some(new)) => origin_offset(old, new, self.common_resolution)? as i128,
            _ => 0,
        };
        narrow(scaled + shift, "re-expressing the common position")
    }

    /// Re-expresses a span of `previous` common ticks in this alignment's
    /// common ticks, rounding down.
    pub fn rescale_from(&self, previous: &Alignment, ticks: i64) -> Result<i64> {
        let from = previous.common_resolution;
        let to = self.common_resolution;
        narrow(
            floor_div(
                ticks as i128 * from.numerator() as i128 * to.denominator() as i128,
                from.denominator() as i128 * to.numerator() as i128,
            ),
            "re-expressing a common duration",
        )
    }
}

/// Computes [Alignment]s and synchronization start points.
#[derive(Debug, Clone, Default)]
pub struct DomainAligner {
    pub required_common_sample_rate: Option<u64>,
    pub allow_different_sample_rates: bool,
    pub start_on_full_unit_of_domain: bool,
    pub strict: bool,
}

impl DomainAligner {
    pub fn resolve(&self, domains: &[StreamDomain]) -> Result<Alignment> {
        if domains.is_empty() {
            return Err(ReaderError::configuration("at least one stream is required"));
        }
        if self.strict {
            check_reference_domains(domains)?;
        }

        let common_resolution = common_resolution(domains)?;

        let scales = domains
            .iter()
            .map(|domain| scale_between(domain.resolution, common_resolution))
            .collect::<Result<Vec<_>>>()?;

        let native_deltas = domains
            .iter()
            .zip(&scales)
            .map(|(domain, &scale)| {
                domain
                    .delta
                    .checked_mul(scale)
                    .ok_or_else(|| ReaderError::overflow("scaling a native delta"))
            })
            .collect::<Result<Vec<_>>>()?;

        if !self.allow_different_sample_rates
            && native_deltas.iter().any(|&delta| delta != native_deltas[0])
        {
            return Err(ReaderError::configuration(format!(
                "streams have different sample rates (periods {native_deltas:?} in units of {common_resolution} s)"
            )));
        }

        let common_delta = match self.required_common_sample_rate {
            Some(rate) => required_delta(rate, common_resolution, &native_deltas)?,
            None => native_deltas.iter().try_fold(1u64, |acc, &delta| {
                lcm(acc, delta as u64)
                    .ok_or_else(|| ReaderError::overflow("computing the common delta"))
            })?,
        };
        let common_delta = i64::try_from(common_delta)
            .map_err(|_| ReaderError::overflow("computing the common delta"))?;

        let origin = domains.iter().filter_map(|domain| domain.origin).min();

        let streams = domains
            .iter()
            .zip(scales.iter().zip(&native_deltas))
            .map(|(domain, (&scale, &native_delta))| {
                let origin_offset = match (domain.origin, origin) {
                    (Some(own), Some(reference)) => {
                        origin_offset(own, reference, common_resolution)?
                    }
                    _ => 0,
                };
                Ok(StreamAlignment {
                    scale,
                    origin_offset,
                    native_delta,
                    divider: (common_delta / native_delta) as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Alignment {
            common_resolution,
            common_delta,
            origin,
            streams,
        })
    }

    /// The first common instant, no earlier than any head nor `not_before`,
    /// that lies on every stream's sample grid. `heads` are the common-tick
    /// values of each stream's first available sample.
    ///
    /// When the grids never meet, the coarsest stream's grid decides.
    pub fn common_start(
        &self,
        alignment: &Alignment,
        heads: &[i64],
        not_before: Option<i64>,
    ) -> Option<i64> {
        let latest = heads.iter().copied().max()?;
        let earliest = not_before.map_or(latest, |floor| latest.max(floor));

        let grids: Vec<Grid> = heads
            .iter()
            .zip(&alignment.streams)
            .map(|(&head, stream)| Grid {
                phase: head.rem_euclid(stream.native_delta),
                period: stream.native_delta,
            })
            .collect();

        if self.start_on_full_unit_of_domain {
            let full_unit = Grid {
                phase: 0,
                period: alignment.common_delta,
            };
            let with_unit = grids.iter().copied().chain([full_unit]);
            if let Some(start) = first_shared_point(with_unit, earliest) {
                return Some(start);
            }
        }
        if let Some(start) = first_shared_point(grids.iter().copied(), earliest) {
            return Some(start);
        }

        let coarsest = grids.iter().max_by_key(|grid| grid.period)?;
        Some(coarsest.next_at_or_after(earliest))
    }
}

/// Instants `phase + k * period` in common ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grid {
    phase: i64,
    period: i64,
}

impl Grid {
    fn next_at_or_after(&self, from: i64) -> i64 {
        from + (self.phase - from).rem_euclid(self.period)
    }
}

/// The first instant at or after `from` on every grid, if the grids meet.
/// Periods divide the common delta, so the merged period fits in 64 bits.
fn first_shared_point(grids: impl IntoIterator<Item = Grid>, from: i64) -> Option<i64> {
    let (phase, period) = grids
        .into_iter()
        .try_fold((0i128, 1i128), |(phase, period), grid| {
            merge_grids(phase, period, grid.phase as i128, grid.period as i128)
        })?;
    let start = from as i128 + (phase - from as i128).rem_euclid(period);
    i64::try_from(start).ok()
}

/// Solves `x = r1 (mod m1)` and `x = r2 (mod m2)` together.
fn merge_grids(r1: i128, m1: i128, r2: i128, m2: i128) -> Option<(i128, i128)> {
    let (g, inverse, _) = extended_gcd(m1, m2);
    let diff = r2 - r1;
    if diff % g != 0 {
        return None;
    }
    let step = m2 / g;
    let k = ((diff / g) % step * (inverse % step)).rem_euclid(step);
    let period = m1 / g * m2;
    Some(((r1 + m1 * k).rem_euclid(period), period))
}

/// Returns `(g, x, y)` with `a * x + b * y = g`.
fn extended_gcd(a: i128, b: i128) -> (i128, i128, i128) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x, y) = extended_gcd(b, a % b);
        (g, y, x - (a / b) * y)
    }
}

fn check_reference_domains(domains: &[StreamDomain]) -> Result<()> {
    let mut ids = domains
        .iter()
        .filter_map(|domain| domain.reference_domain_id.as_deref());
    if let Some(first) = ids.next()
        && let Some(other) = ids.find(|id| *id != first)
    {
        return Err(ReaderError::configuration(format!(
            "streams use different reference domains ('{first}' and '{other}')"
        )));
    }
    Ok(())
}

/// GCD of all tick resolutions: gcd(numerators) / lcm(denominators).
fn common_resolution(domains: &[StreamDomain]) -> Result<Ratio> {
    let mut numerator = 0u64;
    let mut denominator = 1u64;
    for domain in domains {
        numerator = gcd(numerator, domain.resolution.numerator() as u64);
        denominator = lcm(denominator, domain.resolution.denominator() as u64)
            .ok_or_else(|| ReaderError::overflow("computing the common tick resolution"))?;
    }
    let denominator = i64::try_from(denominator)
        .map_err(|_| ReaderError::overflow("computing the common tick resolution"))?;
    Ratio::new(numerator as i64, denominator)
}

/// Common ticks per native tick. Exact because `to` divides `from`.
fn scale_between(from: Ratio, to: Ratio) -> Result<i64> {
    let numerator = from.numerator() as i128 * to.denominator() as i128;
    let denominator = from.denominator() as i128 * to.numerator() as i128;
    debug_assert_eq!(numerator % denominator, 0);
    narrow(numerator / denominator, "scaling a tick resolution")
}

/// Common delta for an explicit rate; it must be an integer number of
/// common ticks and a multiple of every native period.
fn required_delta(rate: u64, resolution: Ratio, native_deltas: &[i64]) -> Result<u64> {
    let per_sample = rate as i128 * resolution.numerator() as i128;
    let ticks = resolution.denominator() as i128;
    if per_sample == 0 || ticks % per_sample != 0 {
        return Err(ReaderError::configuration(format!(
            "common sample rate {rate} Hz is not representable with tick resolution {resolution}"
        )));
    }
    let common_delta = u64::try_from(ticks / per_sample)
        .map_err(|_| ReaderError::overflow("computing the required common delta"))?;

    if let Some(delta) = native_deltas
        .iter()
        .find(|&&delta| common_delta % delta as u64 != 0)
    {
        return Err(ReaderError::configuration(format!(
            "common sample rate {rate} Hz is not an integer sub-multiple of a stream with period {delta} (units of {resolution} s)"
        )));
    }
    Ok(common_delta)
}

/// Offset of `origin` relative to `reference`, in ticks of `resolution`.
fn origin_offset(
    origin: DateTime<Utc>,
    reference: DateTime<Utc>,
    resolution: Ratio,
) -> Result<i64> {
    let nanos = (origin - reference)
        .num_nanoseconds()
        .ok_or_else(|| ReaderError::overflow("computing an origin offset"))?;
    let ticks = floor_div(
        nanos as i128 * resolution.denominator() as i128,
        resolution.numerator() as i128 * NANOS_PER_SECOND,
    );
    narrow(ticks, "computing an origin offset")
}

fn floor_div(a: i128, b: i128) -> i128 {
    a.div_euclid(b)
}

fn ceil_div(a: i128, b: i128) -> i128 {
    -((-a).div_euclid(b))
}

fn narrow(value: i128, context: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| ReaderError::overflow(context))
}
