//! Numeric capabilities the operator bodies are generic over.
//!
//! The bounds come from `num-traits`; only the overflow rule for addition is
//! local, since floats overflow to infinity rather than failing.

use std::fmt;

use num_traits::{CheckedAdd, NumCast, PrimInt, ToPrimitive, Zero};

use crate::data::Element;
use crate::error::Fallible;

pub trait Number: Element + Copy + fmt::Display + Zero + NumCast + ToPrimitive {
    /// `None` on integer overflow or a non-finite float result.
    fn bounded_add(self, other: Self) -> Option<Self>;
}

pub trait Float: Number + num_traits::Float {}

impl<T: Number + num_traits::Float> Float for T {}

pub trait Integer: Number + PrimInt {}

impl<T: Number + PrimInt> Integer for T {}

macro_rules! impl_float {
    ($($ty:ty),+) => {$(
        impl Number for $ty {
            fn bounded_add(self, other: Self) -> Option<Self> {
                let sum = self + other;
                sum.is_finite().then_some(sum)
            }
        }
    )+};
}

macro_rules! impl_integer {
    ($($ty:ty),+) => {$(
        impl Number for $ty {
            fn bounded_add(self, other: Self) -> Option<Self> {
                CheckedAdd::checked_add(&self, &other)
            }
        }
    )+};
}

impl_float!(f32, f64);
impl_integer!(i32, i64, u32, u64);

pub(crate) fn to_f64<T: Number>(value: T) -> Fallible<f64> {
    ToPrimitive::to_f64(&value)
        .ok_or_else(|| err!(FailedFunction, "{value} has no f64 representation"))
}

pub(crate) fn from_f64<T: Number>(value: f64) -> Fallible<T> {
    <T as NumCast>::from(value)
        .ok_or_else(|| err!(FailedFunction, "{value} is not representable as {}", T::PRIMITIVE))
}

pub(crate) fn to_i128<T: Integer>(value: T) -> Fallible<i128> {
    ToPrimitive::to_i128(&value)
        .ok_or_else(|| err!(FailedFunction, "{value} has no i128 representation"))
}

/// Nearest representable value, clamping at the type bounds.
pub(crate) fn saturating_cast<T: Integer>(value: i128) -> T {
    <T as NumCast>::from(value).unwrap_or_else(|| {
        if value < 0 {
            T::min_value()
        } else {
            T::max_value()
        }
    })
}
