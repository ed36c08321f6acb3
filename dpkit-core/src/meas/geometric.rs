use std::marker::PhantomData;

use crate::core::{Function, Kernel, Measurement};
use crate::data::Value;
use crate::dom::Domain;
use crate::error::Fallible;
use crate::meas::check_scale;
use crate::metrics::{Measure, Metric};
use crate::relation::Relation;
use crate::samplers::{geometric_probability, sample_geometric, NoiseSource};
use crate::traits::{saturating_cast, to_i128, Integer};
use crate::types::Primitive;

struct Geometric<T> {
    scale: f64,
    source: NoiseSource,
    _carrier: PhantomData<T>,
}

impl<T: Integer> Kernel for Geometric<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let x = *arg.downcast_ref::<T>()?;
        let noise = sample_geometric(&mut self.source.rng(), self.scale)?;
        Ok(saturating_cast::<T>(to_i128(x)? + i128::from(noise)).into_value())
    }
}

/// Two-sided geometric noise on an integer, saturating at the carrier's
/// bounds; `ε = d_in / scale`.
///
/// Scales large enough that the one-sided draws cannot be represented are
/// rejected rather than released without noise.
pub fn make_base_geometric<T: Integer>(scale: f64, source: NoiseSource) -> Fallible<Measurement> {
    check_scale(scale)?;
    geometric_probability(scale)?;
    Measurement::new(
        Domain::atom::<T>(),
        Domain::atom::<T>(),
        Function::new(Geometric::<T> {
            scale,
            source,
            _carrier: PhantomData,
        }),
        Metric::Absolute(T::PRIMITIVE),
        Measure::MaxDivergence(Primitive::F64),
        Relation::constant(1.0 / scale)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnyObject;
    use crate::error::ErrorKind;

    #[test]
    fn unsigned_release_saturates_at_zero() {
        let m = make_base_geometric::<u32>(4.0, NoiseSource::Seeded(4)).unwrap();
        for _ in 0..10 {
            let out = m.invoke(&AnyObject::of(0_u32)).unwrap();
            assert!(out.downcast_ref::<u32>().is_ok());
        }
        assert_eq!(m.map(&AnyObject::of(5_u32)).unwrap(), AnyObject::of(1.25));
    }

    #[test]
    fn huge_scale_is_rejected_instead_of_releasing_exactly() {
        let err = make_base_geometric::<i64>(1e17, NoiseSource::Seeded(7)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericDomainError);

        let m = make_base_geometric::<i64>(1e6, NoiseSource::Entropy).unwrap();
        let exact = (0..20)
            .filter(|_| m.invoke(&AnyObject::of(1234_i64)).unwrap() == AnyObject::of(1234_i64))
            .count();
        assert!(exact < 20, "every release matched the input");
    }
}
