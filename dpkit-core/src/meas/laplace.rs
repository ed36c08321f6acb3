use std::marker::PhantomData;

use crate::core::{Function, Kernel, Measurement};
use crate::data::Value;
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::meas::check_scale;
use crate::metrics::{Measure, Metric};
use crate::relation::Relation;
use crate::samplers::{sample_laplace, NoiseSource};
use crate::traits::{from_f64, to_f64, Float};

struct Laplace<T> {
    scale: f64,
    source: NoiseSource,
    _carrier: PhantomData<T>,
}

impl<T: Float> Kernel for Laplace<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let mut rng = self.source.rng();
        let mut noisy = |x: T| from_f64::<T>(to_f64(x)? + sample_laplace(&mut rng, self.scale));
        match arg {
            Value::Vec(_) => Ok(Value::from(
                arg.downcast_vec::<T>()?
                    .iter()
                    .map(|&x| noisy(x))
                    .collect::<Fallible<Vec<T>>>()?,
            )),
            _ => Ok(noisy(*arg.downcast_ref::<T>()?)?.into_value()),
        }
    }
}

fn laplace<T: Float>(
    domain: Domain,
    metric: Metric,
    scale: f64,
    source: NoiseSource,
) -> Fallible<Measurement> {
    check_scale(scale)?;
    Measurement::new(
        domain.clone(),
        domain,
        Function::new(Laplace::<T> {
            scale,
            source,
            _carrier: PhantomData,
        }),
        metric,
        Measure::MaxDivergence(T::PRIMITIVE),
        Relation::constant(1.0 / scale)?,
    )
}

/// Laplace noise on a scalar; `ε = d_in / scale`.
pub fn make_base_laplace<T: Float>(scale: f64, source: NoiseSource) -> Fallible<Measurement> {
    laplace::<T>(
        Domain::atom::<T>(),
        Metric::Absolute(T::PRIMITIVE),
        scale,
        source,
    )
}

/// Independent Laplace noise on every coordinate; `ε = d_in / scale` under L1.
pub fn make_base_laplace_vec<T: Float>(scale: f64, source: NoiseSource) -> Fallible<Measurement> {
    laplace::<T>(
        Domain::vector(ScalarDomain::All(T::PRIMITIVE)),
        Metric::L1(T::PRIMITIVE),
        scale,
        source,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnyObject;
    use crate::error::ErrorKind;

    #[test]
    fn epsilon_is_sensitivity_over_scale() {
        let m = make_base_laplace::<f64>(0.5, NoiseSource::Seeded(11)).unwrap();
        assert!(m.check(&AnyObject::of(1.0), &AnyObject::of(2.0)).unwrap());
        assert!(!m.check(&AnyObject::of(1.0), &AnyObject::of(1.99)).unwrap());
        assert_eq!(m.map(&AnyObject::of(1.0)).unwrap(), AnyObject::of(2.0));
    }

    #[test]
    fn vector_release_keeps_shape() {
        let m = make_base_laplace_vec::<f32>(1.0, NoiseSource::Seeded(5)).unwrap();
        let out = m.invoke(&AnyObject::vec(vec![0.0_f32; 4])).unwrap();
        assert_eq!(out.downcast_vec::<f32>().unwrap().len(), 4);
    }

    #[test]
    fn scale_must_be_positive() {
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = make_base_laplace::<f64>(scale, NoiseSource::Entropy).unwrap_err();
            assert_eq!(err.kind, ErrorKind::NumericDomainError);
        }
    }
}
