//! Transformations and measurements.
//!
//! Both operators pair a [`Function`] with the domains and metrics it is
//! defined on and a [`Relation`] certifying its stability (transformations) or
//! privacy loss (measurements). Invocation is pure from the caller's point of
//! view: the input object is borrowed and a fresh object is returned.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::data::{AnyObject, Value};
use crate::dom::Domain;
use crate::error::{ErrorContext, Fallible};
use crate::metrics::{Measure, Metric};
use crate::relation::Relation;

/// The body of an operator. One implementer per operator family; chaining
/// and composition build implementers that close over their constituents.
pub trait Kernel: Send + Sync {
    fn invoke(&self, arg: &Value) -> Fallible<Value>;
}

#[derive(Clone)]
pub struct Function(Arc<dyn Kernel>);

impl Function {
    pub fn new(kernel: impl Kernel + 'static) -> Self {
        Self(Arc::new(kernel))
    }

    pub fn eval(&self, arg: &Value) -> Fallible<Value> {
        self.0.invoke(arg)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function(..)")
    }
}

#[derive(Clone, Debug)]
pub struct Transformation {
    pub input_domain: Domain,
    pub output_domain: Domain,
    pub function: Function,
    pub input_metric: Metric,
    pub output_metric: Metric,
    pub stability_relation: Relation,
}

impl Transformation {
    pub fn new(
        input_domain: Domain,
        output_domain: Domain,
        function: Function,
        input_metric: Metric,
        output_metric: Metric,
        stability_relation: Relation,
    ) -> Fallible<Self> {
        input_metric.check_compatible(&input_domain)?;
        output_metric.check_compatible(&output_domain)?;
        debug!(
            input = %input_domain,
            output = %output_domain,
            metric_in = %input_metric,
            metric_out = %output_metric,
            "transformation constructed"
        );
        Ok(Self {
            input_domain,
            output_domain,
            function,
            input_metric,
            output_metric,
            stability_relation,
        })
    }

    pub fn invoke(&self, arg: &AnyObject) -> Fallible<AnyObject> {
        run(&self.function, &self.input_domain, &self.output_domain, arg)
            .context("transformation invoke")
    }

    pub fn check(&self, d_in: &AnyObject, d_out: &AnyObject) -> Fallible<bool> {
        self.stability_relation
            .eval(distance(d_in)?, distance(d_out)?)
            .context("stability check")
    }

    /// Smallest output distance certified for `d_in`, in the output metric's
    /// distance type.
    pub fn map(&self, d_in: &AnyObject) -> Fallible<AnyObject> {
        let bound = self.stability_relation.minimal(distance(d_in)?)?;
        Value::from_distance(bound, self.output_metric.distance_type()).map(AnyObject::new)
    }
}

#[derive(Clone, Debug)]
pub struct Measurement {
    pub input_domain: Domain,
    pub output_domain: Domain,
    pub function: Function,
    pub input_metric: Metric,
    pub output_measure: Measure,
    pub privacy_relation: Relation,
}

impl Measurement {
    pub fn new(
        input_domain: Domain,
        output_domain: Domain,
        function: Function,
        input_metric: Metric,
        output_measure: Measure,
        privacy_relation: Relation,
    ) -> Fallible<Self> {
        input_metric.check_compatible(&input_domain)?;
        debug!(
            input = %input_domain,
            metric_in = %input_metric,
            measure = %output_measure,
            "measurement constructed"
        );
        Ok(Self {
            input_domain,
            output_domain,
            function,
            input_metric,
            output_measure,
            privacy_relation,
        })
    }

    pub fn invoke(&self, arg: &AnyObject) -> Fallible<AnyObject> {
        run(&self.function, &self.input_domain, &self.output_domain, arg)
            .context("measurement invoke")
    }

    pub fn check(&self, d_in: &AnyObject, d_out: &AnyObject) -> Fallible<bool> {
        self.privacy_relation
            .eval(distance(d_in)?, distance(d_out)?)
            .context("privacy check")
    }

    pub fn map(&self, d_in: &AnyObject) -> Fallible<AnyObject> {
        let bound = self.privacy_relation.minimal(distance(d_in)?)?;
        Value::from_distance(bound, self.output_measure.distance_type()).map(AnyObject::new)
    }
}

fn run(
    function: &Function,
    input_domain: &Domain,
    output_domain: &Domain,
    arg: &AnyObject,
) -> Fallible<AnyObject> {
    let expected = input_domain.carrier_type();
    if arg.ty() != &expected {
        return fallible!(
            DomainMismatch,
            "expected input of type {expected}, found {}",
            arg.ty()
        );
    }
    if !input_domain.member(arg.value()) {
        return fallible!(DomainMismatch, "input is not a member of {input_domain}");
    }
    let output = function.eval(arg.value())?;
    let produced = output.ty();
    if produced != output_domain.carrier_type() {
        return fallible!(
            FailedFunction,
            "function produced {produced}, expected {}",
            output_domain.carrier_type()
        );
    }
    Ok(AnyObject::new(output))
}

fn distance(object: &AnyObject) -> Fallible<f64> {
    object.value().as_f64().ok_or_else(|| {
        err!(InvalidType, "distance must be a numeric scalar, found {}", object.ty())
    })
}
