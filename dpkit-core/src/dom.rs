//! Domains: the carrier type of a value plus the constraints an operator
//! relies on.

use std::cmp::Ordering;
use std::fmt;

use crate::data::{Element, Value, Vector};
use crate::error::Fallible;
use crate::types::{Primitive, Type};

#[derive(Clone, Debug, PartialEq)]
pub enum ScalarDomain {
    All(Primitive),
    /// Closed interval; both bounds share the carrier primitive.
    Interval { lower: Value, upper: Value },
}

impl ScalarDomain {
    pub fn interval<T: Element>(lower: T, upper: T) -> Fallible<Self> {
        match lower.partial_cmp(&upper) {
            Some(Ordering::Less | Ordering::Equal) => Ok(ScalarDomain::Interval {
                lower: lower.into_value(),
                upper: upper.into_value(),
            }),
            _ => fallible!(
                NumericDomainError,
                "lower bound {lower:?} must not exceed upper bound {upper:?}"
            ),
        }
    }

    pub fn primitive(&self) -> Primitive {
        match self {
            ScalarDomain::All(primitive) => *primitive,
            ScalarDomain::Interval { lower, .. } => lower.primitive().unwrap_or(Primitive::F64),
        }
    }

    pub fn bounds(&self) -> Option<(&Value, &Value)> {
        match self {
            ScalarDomain::All(_) => None,
            ScalarDomain::Interval { lower, upper } => Some((lower, upper)),
        }
    }

    fn member(&self, value: &Value) -> bool {
        if value.primitive() != Some(self.primitive()) {
            return false;
        }
        match self.bounds() {
            None => true,
            Some((lower, upper)) => {
                matches!(
                    lower.partial_cmp_scalar(value),
                    Some(Ordering::Less | Ordering::Equal)
                ) && matches!(
                    value.partial_cmp_scalar(upper),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
        }
    }

    fn contains_all(&self, vector: &Vector) -> bool {
        if vector.primitive() != self.primitive() {
            return false;
        }
        match self.bounds() {
            None => true,
            Some((lower, upper)) => with_vector!(vector, |items| within(items, lower, upper)),
        }
    }
}

fn within<T: Element>(items: &[T], lower: &Value, upper: &Value) -> bool {
    let (Some(lower), Some(upper)) = (T::from_value(lower), T::from_value(upper)) else {
        return false;
    };
    items.iter().all(|item| {
        matches!(lower.partial_cmp(item), Some(Ordering::Less | Ordering::Equal))
            && matches!(item.partial_cmp(upper), Some(Ordering::Less | Ordering::Equal))
    })
}

impl fmt::Display for ScalarDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarDomain::All(primitive) => write!(f, "AllDomain({primitive})"),
            ScalarDomain::Interval { lower, upper } => {
                write!(f, "IntervalDomain({}, [{lower}, {upper}])", self.primitive())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    Scalar(ScalarDomain),
    Vector {
        element: ScalarDomain,
        size: Option<usize>,
    },
    Tuple(Vec<Domain>),
}

impl Domain {
    /// The unconstrained domain of a type.
    pub fn all(ty: &Type) -> Self {
        match ty {
            Type::Scalar(primitive) => Domain::Scalar(ScalarDomain::All(*primitive)),
            Type::Vec(primitive) => Domain::Vector {
                element: ScalarDomain::All(*primitive),
                size: None,
            },
            Type::Tuple(items) => Domain::Tuple(items.iter().map(Domain::all).collect()),
        }
    }

    pub fn atom<T: Element>() -> Self {
        Domain::Scalar(ScalarDomain::All(T::PRIMITIVE))
    }

    pub fn vector(element: ScalarDomain) -> Self {
        Domain::Vector {
            element,
            size: None,
        }
    }

    pub fn sized_vector(element: ScalarDomain, size: usize) -> Self {
        Domain::Vector {
            element,
            size: Some(size),
        }
    }

    pub fn carrier_type(&self) -> Type {
        match self {
            Domain::Scalar(scalar) => Type::Scalar(scalar.primitive()),
            Domain::Vector { element, .. } => Type::Vec(element.primitive()),
            Domain::Tuple(items) => Type::Tuple(items.iter().map(Domain::carrier_type).collect()),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Domain::Vector { .. })
    }

    /// Element or scalar primitive; `None` for tuples.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Domain::Scalar(scalar) => Some(scalar.primitive()),
            Domain::Vector { element, .. } => Some(element.primitive()),
            Domain::Tuple(_) => None,
        }
    }

    pub fn member(&self, value: &Value) -> bool {
        match (self, value) {
            (Domain::Scalar(scalar), value) => scalar.member(value),
            (Domain::Vector { element, size }, Value::Vec(vector)) => {
                size.map_or(true, |size| size == vector.len()) && element.contains_all(vector)
            }
            (Domain::Tuple(domains), Value::Tuple(items)) => {
                domains.len() == items.len()
                    && domains.iter().zip(items).all(|(domain, item)| domain.member(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Scalar(scalar) => write!(f, "{scalar}"),
            Domain::Vector {
                element,
                size: None,
            } => write!(f, "VectorDomain({element})"),
            Domain::Vector {
                element,
                size: Some(size),
            } => write!(f, "VectorDomain({element}, size={size})"),
            Domain::Tuple(items) => {
                f.write_str("TupleDomain(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn interval_rejects_inverted_bounds() {
        assert_eq!(
            ScalarDomain::interval(10.0, 0.0).unwrap_err().kind,
            ErrorKind::NumericDomainError
        );
        assert_eq!(
            ScalarDomain::interval(f64::NAN, 0.0).unwrap_err().kind,
            ErrorKind::NumericDomainError
        );
    }

    #[test]
    fn vector_membership_checks_size_and_bounds() {
        let bounded = ScalarDomain::interval(0.0, 10.0).unwrap();
        let domain = Domain::sized_vector(bounded, 3);
        assert!(domain.member(&Value::from(vec![0.0, 5.0, 10.0])));
        assert!(!domain.member(&Value::from(vec![0.0, 5.0])));
        assert!(!domain.member(&Value::from(vec![0.0, 5.0, 10.5])));
        assert!(!domain.member(&Value::from(vec![0.0, f64::NAN, 1.0])));
        assert!(!domain.member(&Value::from(vec![0_i32, 5, 10])));
        assert_eq!(
            domain.to_string(),
            "VectorDomain(IntervalDomain(f64, [0.0, 10.0]), size=3)"
        );
    }

    #[test]
    fn all_domain_matches_the_type() {
        let ty: Type = "(f64, Vec<i32>)".parse().unwrap();
        let domain = Domain::all(&ty);
        assert_eq!(domain.carrier_type(), ty);
        assert!(domain.member(&Value::Tuple(vec![
            Value::F64(1.0),
            Value::from(vec![1_i32])
        ])));
    }
}
