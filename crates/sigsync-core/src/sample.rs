//! Sample storage and type conversion on copy-out.

use crate::descriptor::{LinearScaling, SampleType};
use std::ops::Range;

/// A primitive type samples can be read into.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    const SAMPLE_TYPE: SampleType;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;

    fn to_i128(self) -> i128;

    /// Saturates at the bounds of `Self`.
    fn from_i128(value: i128) -> Self;
}

macro_rules! impl_integer_sample {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const SAMPLE_TYPE: SampleType = SampleType::$variant;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                fn to_i128(self) -> i128 {
                    self as i128
                }

                fn from_i128(value: i128) -> Self {
                    value.clamp(<$ty>::MIN as i128, <$ty>::MAX as i128) as $ty
                }
            }
        )*
    };
}

macro_rules! impl_float_sample {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const SAMPLE_TYPE: SampleType = SampleType::$variant;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                fn to_i128(self) -> i128 {
                    self as i128
                }

                fn from_i128(value: i128) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_integer_sample!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

impl_float_sample!(f32 => Float32, f64 => Float64);

/// How raw values are turned into the read type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Conversion {
    /// Plain numeric conversion.
    Unscaled,
    /// Post-scaling applied in `f64` before converting.
    Scaled(LinearScaling),
}

/// Raw values of one data packet in their native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
}

macro_rules! dispatch {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            SampleData::Float32($values) => $body,
            SampleData::Float64($values) => $body,
            SampleData::Int8($values) => $body,
            SampleData::Int16($values) => $body,
            SampleData::Int32($values) => $body,
            SampleData::Int64($values) => $body,
            SampleData::UInt8($values) => $body,
            SampleData::UInt16($values) => $body,
            SampleData::UInt32($values) => $body,
            SampleData::UInt64($values) => $body,
        }
    };
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for SampleData {
                fn from(values: Vec<$ty>) -> Self {
                    SampleData::$variant(values)
                }
            }
        )*
    };
}

impl_from_vec!(
    f32 => Float32,
    f64 => Float64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

impl SampleData {
    pub fn len(&self) -> usize {
        dispatch!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleData::Float32(_) => SampleType::Float32,
            SampleData::Float64(_) => SampleType::Float64,
            SampleData::Int8(_) => SampleType::Int8,
            SampleData::Int16(_) => SampleType::Int16,
            SampleData::Int32(_) => SampleType::Int32,
            SampleData::Int64(_) => SampleType::Int64,
            SampleData::UInt8(_) => SampleType::UInt8,
            SampleData::UInt16(_) => SampleType::UInt16,
            SampleData::UInt32(_) => SampleType::UInt32,
            SampleData::UInt64(_) => SampleType::UInt64,
        }
    }

    /// Copies `range` into `dest`, converting every value to `T`.
    pub(crate) fn convert_into<T: Sample>(
        &self,
        range: Range<usize>,
        dest: &mut [T],
        conversion: Conversion,
    ) {
        debug_assert_eq!(range.len(), dest.len());
        dispatch!(self, values => convert_slice(&values[range], dest, conversion))
    }
}

fn convert_slice<S: Sample, T: Sample>(src: &[S], dest: &mut [T], conversion: Conversion) {
    let integral = S::SAMPLE_TYPE.is_integral() && T::SAMPLE_TYPE.is_integral();
    for (out, &value) in dest.iter_mut().zip(src) {
        *out = match conversion {
            Conversion::Scaled(scaling) => T::from_f64(scaling.apply(value.to_f64())),
            Conversion::Unscaled if integral => T::from_i128(value.to_i128()),
            Conversion::Unscaled => T::from_f64(value.to_f64()),
        };
    }
}
