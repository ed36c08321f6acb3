//! Chaining and composition of operators.

use tracing::{debug, warn};

use crate::core::{Function, Kernel, Measurement, Transformation};
use crate::data::Value;
use crate::dom::Domain;
use crate::error::{ErrorContext, Fallible};
use crate::metrics::Metric;
use crate::relation::Relation;

struct Chain {
    outer: Function,
    inner: Function,
}

impl Kernel for Chain {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        self.outer.eval(&self.inner.eval(arg)?)
    }
}

struct Composition {
    first: Function,
    second: Function,
}

impl Kernel for Composition {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        Ok(Value::Tuple(vec![
            self.first.eval(arg)?,
            self.second.eval(arg)?,
        ]))
    }
}

fn check_junction(
    output_domain: &Domain,
    output_metric: &Metric,
    input_domain: &Domain,
    input_metric: &Metric,
) -> Fallible<()> {
    if output_domain != input_domain {
        warn!(%output_domain, %input_domain, "chain rejected: domains differ");
        return fallible!(
            DomainMismatch,
            "output domain {output_domain} does not match input domain {input_domain}"
        );
    }
    if output_metric != input_metric {
        warn!(%output_metric, %input_metric, "chain rejected: metrics differ");
        return fallible!(
            DomainMismatch,
            "output metric {output_metric} does not match input metric {input_metric}"
        );
    }
    Ok(())
}

/// `t1 ∘ t0`.
pub fn make_chain_tt(t1: &Transformation, t0: &Transformation) -> Fallible<Transformation> {
    check_junction(
        &t0.output_domain,
        &t0.output_metric,
        &t1.input_domain,
        &t1.input_metric,
    )
    .context("make_chain_tt")?;
    debug!(input = %t0.input_domain, output = %t1.output_domain, "chaining transformations");
    Transformation::new(
        t0.input_domain.clone(),
        t1.output_domain.clone(),
        Function::new(Chain {
            outer: t1.function.clone(),
            inner: t0.function.clone(),
        }),
        t0.input_metric,
        t1.output_metric,
        Relation::chain(
            &t1.stability_relation,
            &t0.stability_relation,
            t0.output_metric.is_integral(),
        ),
    )
}

/// `m1 ∘ t0`.
pub fn make_chain_mt(m1: &Measurement, t0: &Transformation) -> Fallible<Measurement> {
    check_junction(
        &t0.output_domain,
        &t0.output_metric,
        &m1.input_domain,
        &m1.input_metric,
    )
    .context("make_chain_mt")?;
    debug!(input = %t0.input_domain, measure = %m1.output_measure, "chaining measurement");
    Measurement::new(
        t0.input_domain.clone(),
        m1.output_domain.clone(),
        Function::new(Chain {
            outer: m1.function.clone(),
            inner: t0.function.clone(),
        }),
        t0.input_metric,
        m1.output_measure,
        Relation::chain(
            &m1.privacy_relation,
            &t0.stability_relation,
            t0.output_metric.is_integral(),
        ),
    )
}

/// `t1 ∘ m0`: run `t1` on each release of `m0`.
///
/// The result keeps `m0`'s privacy relation. `t1`'s metrics and stability
/// relation play no part; only the domains have to line up.
pub fn make_postprocess(t1: &Transformation, m0: &Measurement) -> Fallible<Measurement> {
    if m0.output_domain != t1.input_domain {
        warn!(
            output_domain = %m0.output_domain,
            input_domain = %t1.input_domain,
            "postprocess rejected: domains differ"
        );
        return fallible!(
            DomainMismatch,
            "make_postprocess: output domain {} does not match input domain {}",
            m0.output_domain,
            t1.input_domain
        );
    }
    debug!(input = %m0.input_domain, output = %t1.output_domain, "post-processing measurement");
    Measurement::new(
        m0.input_domain.clone(),
        t1.output_domain.clone(),
        Function::new(Chain {
            outer: t1.function.clone(),
            inner: m0.function.clone(),
        }),
        m0.input_metric,
        m0.output_measure,
        m0.privacy_relation.clone(),
    )
}

/// Release both measurements on the same input. The privacy loss is the sum
/// of the components' minimal losses.
pub fn make_composition(m0: &Measurement, m1: &Measurement) -> Fallible<Measurement> {
    if m0.input_domain != m1.input_domain {
        warn!(
            first = %m0.input_domain,
            second = %m1.input_domain,
            "composition rejected: domains differ"
        );
        return fallible!(
            DomainMismatch,
            "make_composition: input domains {} and {} differ",
            m0.input_domain,
            m1.input_domain
        );
    }
    if m0.input_metric != m1.input_metric {
        return fallible!(
            DomainMismatch,
            "make_composition: input metrics {} and {} differ",
            m0.input_metric,
            m1.input_metric
        );
    }
    if m0.output_measure != m1.output_measure {
        return fallible!(
            DomainMismatch,
            "make_composition: output measures {} and {} differ",
            m0.output_measure,
            m1.output_measure
        );
    }
    debug!(input = %m0.input_domain, measure = %m0.output_measure, "composing measurements");
    Measurement::new(
        m0.input_domain.clone(),
        Domain::Tuple(vec![m0.output_domain.clone(), m1.output_domain.clone()]),
        Function::new(Composition {
            first: m0.function.clone(),
            second: m1.function.clone(),
        }),
        m0.input_metric,
        m0.output_measure,
        Relation::sum(&m0.privacy_relation, &m1.privacy_relation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnyObject;
    use crate::error::ErrorKind;
    use crate::meas::laplace::make_base_laplace;
    use crate::samplers::NoiseSource;
    use crate::trans::count::make_count;
    use crate::trans::sum::make_bounded_sum;
    use crate::trans::clamp::{make_clamp, make_clamp_scalar};

    #[test]
    fn clamp_then_sum() {
        let clamp = make_clamp::<f64>(0.0, 10.0).unwrap();
        let sum = make_bounded_sum::<f64>(0.0, 10.0).unwrap();
        let chained = make_chain_tt(&sum, &clamp).unwrap();
        let out = chained
            .invoke(&AnyObject::vec(vec![-5.0, 3.0, 12.0]))
            .unwrap();
        assert_eq!(out, AnyObject::of(13.0));
        assert!(chained
            .check(&AnyObject::of(1_u32), &AnyObject::of(10.0))
            .unwrap());
    }

    #[test]
    fn measurement_on_wrong_domain_is_rejected() {
        let count = make_count::<f64>().unwrap();
        let laplace = make_base_laplace::<f64>(1.0, NoiseSource::Seeded(7)).unwrap();
        let err = make_chain_mt(&laplace, &count).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DomainMismatch);
        assert!(err.message.starts_with("make_chain_mt: "));
    }

    #[test]
    fn composition_returns_both_releases() {
        let m0 = make_base_laplace::<f64>(1.0, NoiseSource::Seeded(1)).unwrap();
        let m1 = make_base_laplace::<f64>(2.0, NoiseSource::Seeded(2)).unwrap();
        let both = make_composition(&m0, &m1).unwrap();
        let out = both.invoke(&AnyObject::of(0.0)).unwrap();
        assert_eq!(out.ty().descriptor(), "(f64, f64)");
        assert_eq!(
            both.map(&AnyObject::of(1.0)).unwrap(),
            AnyObject::of(1.5)
        );
    }

    #[test]
    fn postprocess_keeps_the_privacy_relation() {
        let laplace = make_base_laplace::<f64>(0.5, NoiseSource::Seeded(3)).unwrap();
        let clamp = make_clamp_scalar::<f64>(-1.0, 1.0).unwrap();
        let clamped = make_postprocess(&clamp, &laplace).unwrap();
        let out = clamped.invoke(&AnyObject::of(100.0)).unwrap();
        assert_eq!(out, AnyObject::of(1.0));
        assert_eq!(
            clamped.map(&AnyObject::of(1.0)).unwrap(),
            laplace.map(&AnyObject::of(1.0)).unwrap()
        );
        assert_eq!(clamped.output_domain, clamp.output_domain);
    }

    #[test]
    fn postprocess_needs_matching_domains() {
        let laplace = make_base_laplace::<f64>(1.0, NoiseSource::Seeded(3)).unwrap();
        let clamp = make_clamp::<f64>(0.0, 1.0).unwrap();
        let err = make_postprocess(&clamp, &laplace).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DomainMismatch);
    }
}
