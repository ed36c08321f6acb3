use std::marker::PhantomData;

use crate::core::{Function, Kernel, Transformation};
use crate::data::Value;
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::traits::{to_f64, Number};

pub(crate) fn checked_sum<T: Number>(items: &[T]) -> Fallible<T> {
    items.iter().try_fold(T::zero(), |acc, &item| {
        acc.bounded_add(item)
            .ok_or_else(|| err!(FailedFunction, "sum of {} records overflowed", items.len()))
    })
}

struct BoundedSum<T>(PhantomData<T>);

impl<T: Number> Kernel for BoundedSum<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        checked_sum(arg.downcast_vec::<T>()?).map(T::into_value)
    }
}

/// Sum of records bounded to `[lower, upper]`.
///
/// Adding or removing one record moves the sum by at most `max(|lower|, |upper|)`.
pub fn make_bounded_sum<T: Number>(lower: T, upper: T) -> Fallible<Transformation> {
    let bounded = ScalarDomain::interval(lower, upper)?;
    let sensitivity = to_f64(lower)?.abs().max(to_f64(upper)?.abs());
    Transformation::new(
        Domain::vector(bounded),
        Domain::atom::<T>(),
        Function::new(BoundedSum::<T>(PhantomData)),
        Metric::Symmetric,
        Metric::Absolute(T::PRIMITIVE),
        Relation::constant(sensitivity)?,
    )
}
