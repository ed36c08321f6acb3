use std::cmp::Ordering;

use crate::core::{Function, Kernel, Transformation};
use crate::data::Value;
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::traits::Number;

struct Clamp<T> {
    lower: T,
    upper: T,
}

impl<T: Number> Clamp<T> {
    fn apply(&self, item: T) -> T {
        match item.partial_cmp(&self.lower) {
            None | Some(Ordering::Less) => self.lower,
            _ if item > self.upper => self.upper,
            _ => item,
        }
    }
}

impl<T: Number> Kernel for Clamp<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        match arg {
            Value::Vec(_) => Ok(Value::from(
                arg.downcast_vec::<T>()?
                    .iter()
                    .map(|&item| self.apply(item))
                    .collect::<Vec<T>>(),
            )),
            _ => Ok(self.apply(*arg.downcast_ref::<T>()?).into_value()),
        }
    }
}

/// Clamp every record into `[lower, upper]`. NaN records map to `lower`.
pub fn make_clamp<T: Number>(lower: T, upper: T) -> Fallible<Transformation> {
    let bounded = ScalarDomain::interval(lower, upper)?;
    Transformation::new(
        Domain::vector(ScalarDomain::All(T::PRIMITIVE)),
        Domain::vector(bounded),
        Function::new(Clamp { lower, upper }),
        Metric::Symmetric,
        Metric::Symmetric,
        Relation::constant(1.0)?,
    )
}

/// Clamp a single value into `[lower, upper]`. Clamping never moves two values
/// further apart, so the stability constant is 1 under `AbsoluteDistance`.
pub fn make_clamp_scalar<T: Number>(lower: T, upper: T) -> Fallible<Transformation> {
    let bounded = ScalarDomain::interval(lower, upper)?;
    Transformation::new(
        Domain::atom::<T>(),
        Domain::Scalar(bounded),
        Function::new(Clamp { lower, upper }),
        Metric::Absolute(T::PRIMITIVE),
        Metric::Absolute(T::PRIMITIVE),
        Relation::constant(1.0)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnyObject;

    #[test]
    fn clamps_out_of_range_and_nan_records() {
        let t = make_clamp(0.0, 10.0).unwrap();
        let out = t
            .invoke(&AnyObject::vec(vec![-1.0, 4.0, 11.0, f64::NAN]))
            .unwrap();
        assert_eq!(out, AnyObject::vec(vec![0.0, 4.0, 10.0, 0.0]));
    }

    #[test]
    fn integer_clamp() {
        let t = make_clamp(-2_i64, 2).unwrap();
        let out = t.invoke(&AnyObject::vec(vec![-9_i64, 1, 9])).unwrap();
        assert_eq!(out, AnyObject::vec(vec![-2_i64, 1, 2]));
        assert!(make_clamp(3_i64, 2).is_err());
    }

    #[test]
    fn scalar_clamp_keeps_absolute_distance() {
        let t = make_clamp_scalar(-1.0_f32, 1.0).unwrap();
        assert_eq!(t.invoke(&AnyObject::of(3.0_f32)).unwrap(), AnyObject::of(1.0_f32));
        assert_eq!(t.invoke(&AnyObject::of(f32::NAN)).unwrap(), AnyObject::of(-1.0_f32));
        assert_eq!(t.invoke(&AnyObject::of(0.25_f32)).unwrap(), AnyObject::of(0.25_f32));
        assert_eq!(t.map(&AnyObject::of(0.5_f32)).unwrap(), AnyObject::of(0.5_f32));
        assert!(make_clamp_scalar(2_u64, 1).is_err());
    }
}
