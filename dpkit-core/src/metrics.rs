//! Input/output metrics and privacy measures.

use std::fmt;

use crate::dom::Domain;
use crate::error::Fallible;
use crate::types::{Primitive, TypeExpr};

/// Distance between neighbouring datasets or between outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Size of the symmetric difference of two datasets.
    Symmetric,
    /// Number of positions at which equal-size datasets differ.
    Hamming,
    Absolute(Primitive),
    L1(Primitive),
    L2(Primitive),
}

impl Metric {
    pub fn name(&self) -> String {
        match self {
            Metric::Symmetric => "SymmetricDistance".into(),
            Metric::Hamming => "HammingDistance".into(),
            Metric::Absolute(p) => format!("AbsoluteDistance<{p}>"),
            Metric::L1(p) => format!("L1Distance<{p}>"),
            Metric::L2(p) => format!("L2Distance<{p}>"),
        }
    }

    /// Primitive distances under this metric are expressed in.
    pub fn distance_type(&self) -> Primitive {
        match self {
            Metric::Symmetric | Metric::Hamming => Primitive::U32,
            Metric::Absolute(p) | Metric::L1(p) | Metric::L2(p) => *p,
        }
    }

    /// Distances under this metric only take whole values.
    pub fn is_integral(&self) -> bool {
        self.distance_type().is_integer()
    }

    pub fn parse(expr: &TypeExpr) -> Fallible<Self> {
        let TypeExpr::Path { name, args } = expr else {
            return fallible!(InvalidType, "expected a metric name, found {expr}");
        };
        let numeric = |args: &[TypeExpr]| -> Fallible<Primitive> {
            match args {
                [TypeExpr::Path { name, args }] if args.is_empty() => Primitive::parse(name)
                    .filter(Primitive::is_numeric)
                    .ok_or_else(|| err!(InvalidType, "{expr} needs a numeric distance type")),
                _ => fallible!(InvalidType, "{expr} takes one numeric type argument"),
            }
        };
        match name.as_str() {
            "SymmetricDistance" if args.is_empty() => Ok(Metric::Symmetric),
            "HammingDistance" if args.is_empty() => Ok(Metric::Hamming),
            "AbsoluteDistance" => numeric(args).map(Metric::Absolute),
            "L1Distance" => numeric(args).map(Metric::L1),
            "L2Distance" => numeric(args).map(Metric::L2),
            _ => fallible!(InvalidType, "unrecognized metric {expr}"),
        }
    }

    /// Whether this metric is defined on values of `domain`.
    pub fn check_compatible(&self, domain: &Domain) -> Fallible<()> {
        let compatible = match self {
            Metric::Symmetric | Metric::Hamming => domain.is_vector(),
            Metric::Absolute(p) => {
                matches!(domain, Domain::Scalar(_)) && domain.primitive() == Some(*p)
            }
            Metric::L1(p) | Metric::L2(p) => {
                counts_of(domain).is_some_and(|counts| counts.primitive() == Some(*p))
            }
        };
        if compatible {
            Ok(())
        } else {
            fallible!(DomainMismatch, "{self} is not defined on {domain}")
        }
    }
}

/// The vector a sensitivity metric measures: the domain itself, or the counts
/// of a `(keys, counts)` pair.
fn counts_of(domain: &Domain) -> Option<&Domain> {
    match domain {
        Domain::Vector { .. } => Some(domain),
        Domain::Tuple(parts) => match parts.as_slice() {
            [keys, counts] if keys.is_vector() && counts.is_vector() => Some(counts),
            _ => None,
        },
        Domain::Scalar(_) => None,
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// How privacy loss is quantified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Pure ε-differential privacy.
    MaxDivergence(Primitive),
    /// ρ-zero-concentrated differential privacy.
    ZeroConcentratedDivergence(Primitive),
}

impl Measure {
    pub fn name(&self) -> String {
        match self {
            Measure::MaxDivergence(p) => format!("MaxDivergence<{p}>"),
            Measure::ZeroConcentratedDivergence(p) => format!("ZeroConcentratedDivergence<{p}>"),
        }
    }

    pub fn distance_type(&self) -> Primitive {
        match self {
            Measure::MaxDivergence(p) | Measure::ZeroConcentratedDivergence(p) => *p,
        }
    }

    pub fn parse(expr: &TypeExpr) -> Fallible<Self> {
        let (name, primitive) = match expr {
            TypeExpr::Path { name, args } => match args.as_slice() {
                [TypeExpr::Path { name: arg, args }] if args.is_empty() => (
                    name.as_str(),
                    Primitive::parse(arg).filter(Primitive::is_float),
                ),
                _ => (name.as_str(), None),
            },
            TypeExpr::Tuple(_) => return fallible!(InvalidType, "expected a measure, found {expr}"),
        };
        let Some(primitive) = primitive else {
            return fallible!(InvalidType, "{expr} takes one float type argument");
        };
        match name {
            "MaxDivergence" => Ok(Measure::MaxDivergence(primitive)),
            "ZeroConcentratedDivergence" => Ok(Measure::ZeroConcentratedDivergence(primitive)),
            _ => fallible!(InvalidType, "unrecognized measure {expr}"),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
