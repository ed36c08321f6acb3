use std::marker::PhantomData;

use num_traits::{NumCast, ToPrimitive};

use crate::core::{Function, Kernel, Transformation};
use crate::data::{Element, Value};
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::types::Primitive;

/// `item` as a value of `to`, or `None` when it has no representation there.
///
/// Numbers convert through `NumCast` and fail when out of range or NaN.
/// Strings parse after trimming. Booleans count as 0 and 1.
pub(crate) fn cast_scalar(item: &Value, to: Primitive) -> Option<Value> {
    if item.primitive() == Some(to) {
        return Some(item.clone());
    }
    match item {
        Value::String(text) => parse_scalar(text.trim(), to),
        _ if to == Primitive::String => Some(Value::String(match item {
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            other => other.to_string(),
        })),
        Value::Bool(flag) => numeric_cast(<u8 as From<bool>>::from(*flag), to),
        Value::I32(v) => numeric_cast(*v, to),
        Value::I64(v) => numeric_cast(*v, to),
        Value::U32(v) => numeric_cast(*v, to),
        Value::U64(v) => numeric_cast(*v, to),
        Value::F32(v) => numeric_cast(*v, to),
        Value::F64(v) => numeric_cast(*v, to),
        Value::Vec(_) | Value::Tuple(_) => None,
    }
}

fn numeric_cast<N: ToPrimitive + Copy>(item: N, to: Primitive) -> Option<Value> {
    if to == Primitive::Bool {
        return item.to_f64().map(|v| Value::Bool(v != 0.0));
    }
    dispatch_numeric!(to, |TO| { <TO as NumCast>::from(item).map(Element::into_value) }, None)
}

fn parse_scalar(text: &str, to: Primitive) -> Option<Value> {
    dispatch_element!(to, |TO| { text.parse::<TO>().ok().map(Element::into_value) })
}

struct Cast<TO>(PhantomData<TO>);

impl<TO: Element + Default> Kernel for Cast<TO> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let Value::Vec(vector) = arg else {
            return fallible!(InvalidType, "cast expects a vector, found {}", arg.ty());
        };
        let cast = (0..vector.len())
            .map(|index| {
                vector
                    .get(index)
                    .and_then(|item| cast_scalar(&item, TO::PRIMITIVE))
                    .and_then(|value| TO::from_value(&value).cloned())
                    .unwrap_or_default()
            })
            .collect::<Vec<TO>>();
        Ok(Value::from(cast))
    }
}

/// Cast every record from `TI` to `TO`, row by row.
///
/// Records without a representation in `TO` become `TO::default()`, so the
/// output has the same length as the input.
pub fn make_cast_vec<TI: Element, TO: Element + Default>(
    metric: Metric,
) -> Fallible<Transformation> {
    if !matches!(metric, Metric::Symmetric | Metric::Hamming) {
        return fallible!(DomainMismatch, "cast is defined under dataset metrics, not {metric}");
    }
    Transformation::new(
        Domain::vector(ScalarDomain::All(TI::PRIMITIVE)),
        Domain::vector(ScalarDomain::All(TO::PRIMITIVE)),
        Function::new(Cast::<TO>(PhantomData)),
        metric,
        metric,
        Relation::constant(1.0)?,
    )
}
