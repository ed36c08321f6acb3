//! Name-keyed table of operator constructors.
//!
//! Boundary crates never call the generic `make_*` functions directly: they
//! pass a constructor name, a type-argument list such as `"<f64>"` and the
//! parameters as values. [`construct`] resolves the type arguments, coerces
//! the parameters and dispatches to the monomorphized constructor.

use serde::Serialize;
use tracing::debug;

use crate::core::{Measurement, Transformation};
use crate::data::Value;
use crate::error::{ErrorContext, Fallible};
use crate::meas::{
    make_base_gaussian, make_base_gaussian_vec, make_base_geometric, make_base_laplace,
    make_base_laplace_vec,
};
use crate::metrics::Metric;
use crate::samplers::NoiseSource;
use crate::trans::{
    make_bounded_mean, make_bounded_sum, make_cast_vec, make_clamp, make_clamp_scalar, make_count,
    make_count_by, make_count_by_categories, make_identity,
};
use crate::types::{parse_type_args, Primitive, Type, TypeExpr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Trans,
    Meas,
}

impl Module {
    pub const fn name(&self) -> &'static str {
        match self {
            Module::Trans => "trans",
            Module::Meas => "meas",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Returns {
    Transformation,
    Measurement,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Parameter {
    pub name: &'static str,
    /// A type parameter of the constructor, `Vec<..>` of one, or a primitive
    /// name.
    pub rust_type: &'static str,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Constructor {
    pub module: Module,
    pub name: &'static str,
    pub type_params: &'static [&'static str],
    pub params: &'static [Parameter],
    pub returns: Returns,
}

const fn param(name: &'static str, rust_type: &'static str) -> Parameter {
    Parameter { name, rust_type }
}

const BOUNDS: &[Parameter] = &[param("lower", "T"), param("upper", "T")];
const SCALE: &[Parameter] = &[param("scale", "f64")];
const HISTOGRAM: &[&str] = &["MI", "MO", "TI", "TO"];

pub static CONSTRUCTORS: &[Constructor] = &[
    Constructor {
        module: Module::Trans,
        name: "make_identity",
        type_params: &["M", "T"],
        params: &[],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_clamp",
        type_params: &["T"],
        params: BOUNDS,
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_clamp_scalar",
        type_params: &["T"],
        params: BOUNDS,
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_cast_vec",
        type_params: &["M", "TI", "TO"],
        params: &[],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_bounded_sum",
        type_params: &["T"],
        params: BOUNDS,
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_bounded_mean",
        type_params: &["MI", "T"],
        params: &[param("lower", "T"), param("upper", "T"), param("n", "u32")],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_count",
        type_params: &["TIA"],
        params: &[],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_count_by_categories",
        type_params: HISTOGRAM,
        params: &[param("categories", "Vec<TI>")],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Trans,
        name: "make_count_by",
        type_params: HISTOGRAM,
        params: &[param("n", "u32")],
        returns: Returns::Transformation,
    },
    Constructor {
        module: Module::Meas,
        name: "make_base_laplace",
        type_params: &["T"],
        params: SCALE,
        returns: Returns::Measurement,
    },
    Constructor {
        module: Module::Meas,
        name: "make_base_laplace_vec",
        type_params: &["T"],
        params: SCALE,
        returns: Returns::Measurement,
    },
    Constructor {
        module: Module::Meas,
        name: "make_base_gaussian",
        type_params: &["T"],
        params: SCALE,
        returns: Returns::Measurement,
    },
    Constructor {
        module: Module::Meas,
        name: "make_base_gaussian_vec",
        type_params: &["T"],
        params: SCALE,
        returns: Returns::Measurement,
    },
    Constructor {
        module: Module::Meas,
        name: "make_base_geometric",
        type_params: &["T"],
        params: SCALE,
        returns: Returns::Measurement,
    },
];

impl Constructor {
    pub fn find(name: &str) -> Fallible<&'static Constructor> {
        CONSTRUCTORS
            .iter()
            .find(|ctor| ctor.name == name)
            .ok_or_else(|| err!(InvalidType, "unknown constructor {name:?}"))
    }

    /// Parse `type_args` against this constructor's type parameters.
    pub fn bind(&self, type_args: &str) -> Fallible<Vec<TypeExpr>> {
        if self.type_params.is_empty() && type_args.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_type_args(type_args, self.type_params.len())
    }

    /// Concrete type of every parameter under the bound type arguments.
    pub fn param_types(&self, args: &[TypeExpr]) -> Fallible<Vec<Type>> {
        self.params
            .iter()
            .map(|param| self.resolve(param.rust_type, args))
            .collect()
    }

    fn resolve(&self, rust_type: &str, args: &[TypeExpr]) -> Fallible<Type> {
        let bound = |name: &str| {
            let index = self.type_params.iter().position(|t| *t == name)?;
            Some(scalar(&args[index]))
        };
        if let Some(primitive) = bound(rust_type) {
            return primitive.map(Type::Scalar);
        }
        let element = rust_type
            .strip_prefix("Vec<")
            .and_then(|rest| rest.strip_suffix('>'));
        if let Some(primitive) = element.and_then(bound) {
            return primitive.map(Type::Vec);
        }
        rust_type
            .parse::<Type>()
            .with_context(|| format!("parameter type {rust_type}"))
    }
}

/// A freshly constructed operator of either kind.
#[derive(Clone, Debug)]
pub enum Operator {
    Transformation(Transformation),
    Measurement(Measurement),
}

impl Operator {
    pub fn into_transformation(self) -> Fallible<Transformation> {
        match self {
            Operator::Transformation(t) => Ok(t),
            Operator::Measurement(_) => {
                fallible!(InvalidType, "expected a transformation, found a measurement")
            }
        }
    }

    pub fn into_measurement(self) -> Fallible<Measurement> {
        match self {
            Operator::Measurement(m) => Ok(m),
            Operator::Transformation(_) => {
                fallible!(InvalidType, "expected a measurement, found a transformation")
            }
        }
    }
}

fn scalar(expr: &TypeExpr) -> Fallible<Primitive> {
    match Type::try_from(expr)? {
        Type::Scalar(primitive) => Ok(primitive),
        other => fallible!(InvalidType, "expected a primitive type argument, found {other}"),
    }
}

/// Build the constructor `name` with the given type arguments and parameters.
pub fn construct(
    name: &str,
    type_args: &str,
    params: &[Value],
    source: NoiseSource,
) -> Fallible<Operator> {
    build(name, type_args, params, source).with_context(|| name.to_string())
}

fn build(name: &str, type_args: &str, params: &[Value], source: NoiseSource) -> Fallible<Operator> {
    let ctor = Constructor::find(name)?;
    let args = ctor.bind(type_args)?;
    let types = ctor.param_types(&args)?;
    if params.len() != types.len() {
        return fallible!(
            InvalidType,
            "expected {} parameter(s), found {}",
            types.len(),
            params.len()
        );
    }
    let params = params
        .iter()
        .zip(&types)
        .map(|(value, ty)| match ty {
            Type::Scalar(primitive) => value.coerce(*primitive),
            _ if value.ty() == *ty => Ok(value.clone()),
            _ => fallible!(InvalidType, "expected {ty}, found {}", value.ty()),
        })
        .collect::<Fallible<Vec<_>>>()?;
    debug!(constructor = name, type_args, "constructing operator");

    let unsupported = |what: &str| err!(InvalidType, "{name} does not support {what}");
    let scale = || -> Fallible<f64> { params[0].downcast_ref::<f64>().copied() };

    Ok(match ctor.name {
        "make_identity" => {
            let metric = Metric::parse(&args[0])?;
            let ty = Type::try_from(&args[1])?;
            Operator::Transformation(make_identity(&ty, metric)?)
        }
        "make_clamp" => {
            let t = scalar(&args[0])?;
            Operator::Transformation(dispatch_numeric!(t, |T| {
                make_clamp::<T>(*params[0].downcast_ref()?, *params[1].downcast_ref()?)?
            }, return Err(unsupported(t.name()))))
        }
        "make_clamp_scalar" => {
            let t = scalar(&args[0])?;
            Operator::Transformation(dispatch_numeric!(t, |T| {
                make_clamp_scalar::<T>(*params[0].downcast_ref()?, *params[1].downcast_ref()?)?
            }, return Err(unsupported(t.name()))))
        }
        "make_cast_vec" => {
            let metric = Metric::parse(&args[0])?;
            let (ti, to) = (scalar(&args[1])?, scalar(&args[2])?);
            Operator::Transformation(dispatch_element!(ti, |TI| {
                dispatch_element!(to, |TO| { make_cast_vec::<TI, TO>(metric)? })
            }))
        }
        "make_bounded_sum" => {
            let t = scalar(&args[0])?;
            Operator::Transformation(dispatch_numeric!(t, |T| {
                make_bounded_sum::<T>(*params[0].downcast_ref()?, *params[1].downcast_ref()?)?
            }, return Err(unsupported(t.name()))))
        }
        "make_bounded_mean" => {
            let metric = Metric::parse(&args[0])?;
            let t = scalar(&args[1])?;
            let n = *params[2].downcast_ref::<u32>()?;
            Operator::Transformation(dispatch_float!(t, |T| {
                make_bounded_mean::<T>(
                    *params[0].downcast_ref()?,
                    *params[1].downcast_ref()?,
                    n,
                    metric,
                )?
            }, return Err(unsupported(t.name()))))
        }
        "make_count" => {
            let t = scalar(&args[0])?;
            Operator::Transformation(dispatch_element!(t, |T| { make_count::<T>()? }))
        }
        "make_count_by_categories" => {
            let (mi, mo) = (Metric::parse(&args[0])?, Metric::parse(&args[1])?);
            let (ti, to) = (scalar(&args[2])?, scalar(&args[3])?);
            Operator::Transformation(dispatch_hashable!(ti, |TI| {
                let categories = params[0].downcast_vec::<TI>()?.to_vec();
                dispatch_numeric!(to, |TO| {
                    make_count_by_categories::<TI, TO>(categories, mi, mo)?
                }, return Err(unsupported(to.name())))
            }, return Err(unsupported(ti.name()))))
        }
        "make_count_by" => {
            let (mi, mo) = (Metric::parse(&args[0])?, Metric::parse(&args[1])?);
            let (ti, to) = (scalar(&args[2])?, scalar(&args[3])?);
            let n = *params[0].downcast_ref::<u32>()?;
            Operator::Transformation(dispatch_hashable!(ti, |TI| {
                dispatch_numeric!(to, |TO| {
                    make_count_by::<TI, TO>(n, mi, mo)?
                }, return Err(unsupported(to.name())))
            }, return Err(unsupported(ti.name()))))
        }
        "make_base_laplace" => {
            let t = scalar(&args[0])?;
            Operator::Measurement(dispatch_float!(t, |T| {
                make_base_laplace::<T>(scale()?, source)?
            }, return Err(unsupported(t.name()))))
        }
        "make_base_laplace_vec" => {
            let t = scalar(&args[0])?;
            Operator::Measurement(dispatch_float!(t, |T| {
                make_base_laplace_vec::<T>(scale()?, source)?
            }, return Err(unsupported(t.name()))))
        }
        "make_base_gaussian" => {
            let t = scalar(&args[0])?;
            Operator::Measurement(dispatch_float!(t, |T| {
                make_base_gaussian::<T>(scale()?, source)?
            }, return Err(unsupported(t.name()))))
        }
        "make_base_gaussian_vec" => {
            let t = scalar(&args[0])?;
            Operator::Measurement(dispatch_float!(t, |T| {
                make_base_gaussian_vec::<T>(scale()?, source)?
            }, return Err(unsupported(t.name()))))
        }
        "make_base_geometric" => {
            let t = scalar(&args[0])?;
            Operator::Measurement(dispatch_integer!(t, |T| {
                make_base_geometric::<T>(scale()?, source)?
            }, return Err(unsupported(t.name()))))
        }
        other => return Err(unsupported(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnyObject;
    use crate::error::ErrorKind;

    #[test]
    fn every_entry_is_constructible() {
        let cases: &[(&str, &str, Vec<Value>)] = &[
            ("make_identity", "<SymmetricDistance, Vec<f64>>", vec![]),
            ("make_clamp", "<f64>", vec![Value::F64(0.0), Value::F64(1.0)]),
            ("make_bounded_sum", "<i32>", vec![Value::I64(0), Value::I64(10)]),
            (
                "make_bounded_mean",
                "<SymmetricDistance, f64>",
                vec![Value::F64(0.0), Value::F64(10.0), Value::I64(10)],
            ),
            ("make_count", "<String>", vec![]),
            ("make_clamp_scalar", "<i32>", vec![Value::I32(-1), Value::I32(1)]),
            ("make_cast_vec", "<HammingDistance, String, f32>", vec![]),
            (
                "make_count_by_categories",
                "<SymmetricDistance, L1Distance<u32>, String, u32>",
                vec![Value::from(vec!["a".to_string(), "b".to_string()])],
            ),
            (
                "make_count_by",
                "<HammingDistance, L2Distance<f64>, i64, f64>",
                vec![Value::U32(10)],
            ),
            ("make_base_laplace", "<f64>", vec![Value::F64(1.0)]),
            ("make_base_laplace_vec", "<f32>", vec![Value::F64(1.0)]),
            ("make_base_gaussian", "<f64>", vec![Value::F64(1.0)]),
            ("make_base_gaussian_vec", "<f64>", vec![Value::F64(1.0)]),
            ("make_base_geometric", "<i64>", vec![Value::I64(2)]),
        ];
        assert_eq!(cases.len(), CONSTRUCTORS.len());
        for (name, args, params) in cases {
            construct(name, args, params, NoiseSource::Seeded(0))
                .unwrap_or_else(|err| panic!("{name}: {err}"));
        }
    }

    #[test]
    fn bounded_sum_from_the_table() {
        let t = construct(
            "make_bounded_sum",
            "<i32>",
            &[Value::I32(0), Value::I32(10)],
            NoiseSource::Entropy,
        )
        .unwrap()
        .into_transformation()
        .unwrap();
        let out = t.invoke(&AnyObject::vec(vec![1_i32, 2, 3])).unwrap();
        assert_eq!(out, AnyObject::of(6_i32));
    }

    #[test]
    fn unsupported_type_arguments_are_invalid_type() {
        let err = construct("make_base_laplace", "<i32>", &[Value::F64(1.0)], NoiseSource::Entropy)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);
        assert!(err.message.starts_with("make_base_laplace: "));

        let err = construct("make_clamp", "<f64>", &[Value::F64(0.0)], NoiseSource::Entropy)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);

        let err = construct("make_nothing", "<f64>", &[], NoiseSource::Entropy).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);
    }

    #[test]
    fn generic_parameters_resolve_to_type_arguments() {
        let ctor = Constructor::find("make_bounded_mean").unwrap();
        let args = ctor.bind("<HammingDistance, f32>").unwrap();
        assert_eq!(
            ctor.param_types(&args).unwrap(),
            vec![
                Type::Scalar(Primitive::F32),
                Type::Scalar(Primitive::F32),
                Type::Scalar(Primitive::U32)
            ]
        );

        let ctor = Constructor::find("make_count_by_categories").unwrap();
        let args = ctor
            .bind("<SymmetricDistance, L1Distance<i32>, bool, i32>")
            .unwrap();
        assert_eq!(ctor.param_types(&args).unwrap(), vec![Type::Vec(Primitive::Bool)]);
    }

    #[test]
    fn vector_parameters_must_match_exactly() {
        let err = construct(
            "make_count_by_categories",
            "<SymmetricDistance, L1Distance<u32>, i64, u32>",
            &[Value::from(vec![1_i32, 2])],
            NoiseSource::Entropy,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);

        let t = construct(
            "make_count_by_categories",
            "<SymmetricDistance, L1Distance<u32>, i64, u32>",
            &[Value::from(vec![1_i64, 2])],
            NoiseSource::Entropy,
        )
        .unwrap()
        .into_transformation()
        .unwrap();
        let out = t.invoke(&AnyObject::vec(vec![2_i64, 2, 7])).unwrap();
        assert_eq!(out, AnyObject::vec(vec![0_u32, 2, 1]));
    }

    #[test]
    fn float_keys_cannot_be_counted_by() {
        let err = construct(
            "make_count_by",
            "<SymmetricDistance, L1Distance<u32>, f64, u32>",
            &[Value::U32(3)],
            NoiseSource::Entropy,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidType);
    }
}
