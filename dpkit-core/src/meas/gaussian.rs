use std::marker::PhantomData;

use crate::core::{Function, Kernel, Measurement};
use crate::data::Value;
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::meas::check_scale;
use crate::metrics::{Measure, Metric};
use crate::relation::Relation;
use crate::samplers::{sample_gaussian, NoiseSource};
use crate::traits::{from_f64, to_f64, Float};

struct Gaussian<T> {
    scale: f64,
    source: NoiseSource,
    _carrier: PhantomData<T>,
}

impl<T: Float> Kernel for Gaussian<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let mut rng = self.source.rng();
        let mut noisy =
            |x: T| from_f64::<T>(to_f64(x)? + sample_gaussian(&mut rng, self.scale)?);
        match arg {
            Value::Vec(_) => {
                let released = arg
                    .downcast_vec::<T>()?
                    .iter()
                    .map(|&x| noisy(x))
                    .collect::<Fallible<Vec<T>>>()?;
                Ok(Value::from(released))
            }
            _ => Ok(noisy(*arg.downcast_ref::<T>()?)?.into_value()),
        }
    }
}

fn gaussian<T: Float>(
    domain: Domain,
    metric: Metric,
    scale: f64,
    source: NoiseSource,
) -> Fallible<Measurement> {
    check_scale(scale)?;
    Measurement::new(
        domain.clone(),
        domain,
        Function::new(Gaussian::<T> {
            scale,
            source,
            _carrier: PhantomData,
        }),
        metric,
        Measure::ZeroConcentratedDivergence(T::PRIMITIVE),
        Relation::map(move |d_in| {
            let ratio = d_in / scale;
            Ok(ratio * ratio / 2.0)
        }),
    )
}

/// Gaussian noise on a scalar; `ρ = (d_in / scale)² / 2`.
pub fn make_base_gaussian<T: Float>(scale: f64, source: NoiseSource) -> Fallible<Measurement> {
    gaussian::<T>(
        Domain::atom::<T>(),
        Metric::Absolute(T::PRIMITIVE),
        scale,
        source,
    )
}

/// Independent Gaussian noise on every coordinate, accounted under L2.
pub fn make_base_gaussian_vec<T: Float>(scale: f64, source: NoiseSource) -> Fallible<Measurement> {
    gaussian::<T>(
        Domain::vector(ScalarDomain::All(T::PRIMITIVE)),
        Metric::L2(T::PRIMITIVE),
        scale,
        source,
    )
}
