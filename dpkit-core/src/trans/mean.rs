use std::marker::PhantomData;

use crate::core::{Function, Kernel, Transformation};
use crate::data::Value;
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::trans::sum::checked_sum;
use crate::traits::{from_f64, to_f64, Float};

struct BoundedMean<T> {
    n: u32,
    _element: PhantomData<T>,
}

impl<T: Float> Kernel for BoundedMean<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let total = checked_sum(arg.downcast_vec::<T>()?)?;
        Ok(from_f64::<T>(to_f64(total)? / self.n as f64)?.into_value())
    }
}

/// Mean of exactly `n` records bounded to `[lower, upper]`.
///
/// Under `HammingDistance` one changed record moves the mean by `(upper - lower) / n`.
/// Under `SymmetricDistance` a change costs two units (one removal, one
/// addition), so each unit moves it by half that.
pub fn make_bounded_mean<T: Float>(
    lower: T,
    upper: T,
    n: u32,
    input_metric: Metric,
) -> Fallible<Transformation> {
    if n == 0 {
        return fallible!(NumericDomainError, "dataset size n must be positive");
    }
    let bounded = ScalarDomain::interval(lower, upper)?;
    let range = to_f64(upper)? - to_f64(lower)?;
    let constant = match input_metric {
        Metric::Symmetric => range / (2.0 * n as f64),
        Metric::Hamming => range / n as f64,
        other => {
            return fallible!(
                DomainMismatch,
                "bounded mean is defined under SymmetricDistance or HammingDistance, not {other}"
            )
        }
    };
    Transformation::new(
        Domain::sized_vector(bounded, n as usize),
        Domain::atom::<T>(),
        Function::new(BoundedMean::<T> {
            n,
            _element: PhantomData,
        }),
        input_metric,
        Metric::Absolute(T::PRIMITIVE),
        Relation::constant(constant)?,
    )
}
