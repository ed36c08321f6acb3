use crate::core::{Function, Kernel, Transformation};
use crate::data::Value;
use crate::dom::Domain;
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::types::Type;

struct Identity;

impl Kernel for Identity {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        Ok(arg.clone())
    }
}

/// Pass values of `ty` through unchanged under `metric`.
pub fn make_identity(ty: &Type, metric: Metric) -> Fallible<Transformation> {
    let domain = Domain::all(ty);
    Transformation::new(
        domain.clone(),
        domain,
        Function::new(Identity),
        metric,
        metric,
        Relation::constant(1.0)?,
    )
}
