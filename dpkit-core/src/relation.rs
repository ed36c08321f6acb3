//! Stability and privacy relations.
//!
//! A relation answers "given inputs at most `d_in` apart, is `d_out` a valid
//! bound on the output distance (or privacy loss)?". Relations whose minimal
//! bound is known in closed form keep it, so chaining and composition can pick
//! the tightest intermediate distance without searching.

use std::fmt;
use std::sync::Arc;

use crate::error::Fallible;

type MapFn = dyn Fn(f64) -> Fallible<f64> + Send + Sync;
type PredicateFn = dyn Fn(f64, f64) -> Fallible<bool> + Send + Sync;

/// Upper bound on bisection steps when searching a predicate's minimal bound.
const BISECTION_STEPS: usize = 64;

#[derive(Clone)]
pub enum Relation {
    /// Minimal bound is `c * d_in`.
    Constant(f64),
    /// Minimal bound is `f(d_in)`.
    Map(Arc<MapFn>),
    /// Opaque test, assumed monotone in `d_out`.
    Predicate(Arc<PredicateFn>),
}

impl Relation {
    pub fn constant(c: f64) -> Fallible<Self> {
        if !c.is_finite() || c < 0.0 {
            return fallible!(NumericDomainError, "relation constant {c} must be finite and >= 0");
        }
        Ok(Relation::Constant(c))
    }

    pub fn map<F>(f: F) -> Self
    where
        F: Fn(f64) -> Fallible<f64> + Send + Sync + 'static,
    {
        Relation::Map(Arc::new(f))
    }

    pub fn predicate<F>(p: F) -> Self
    where
        F: Fn(f64, f64) -> Fallible<bool> + Send + Sync + 'static,
    {
        Relation::Predicate(Arc::new(p))
    }

    /// Whether `d_out` bounds the output for inputs `d_in` apart.
    pub fn eval(&self, d_in: f64, d_out: f64) -> Fallible<bool> {
        validate_distance("d_in", d_in)?;
        validate_distance("d_out", d_out)?;
        match self {
            Relation::Predicate(p) => p(d_in, d_out),
            _ => Ok(d_out >= self.minimal(d_in)?),
        }
    }

    /// The tightest `d_out` this relation certifies for `d_in`.
    pub fn minimal(&self, d_in: f64) -> Fallible<f64> {
        validate_distance("d_in", d_in)?;
        let bound = match self {
            Relation::Constant(c) => c * d_in,
            Relation::Map(f) => f(d_in)?,
            Relation::Predicate(p) => search(p.as_ref(), d_in)?,
        };
        if bound.is_nan() || bound < 0.0 {
            return fallible!(
                NumericDomainError,
                "relation produced invalid bound {bound} for d_in = {d_in}"
            );
        }
        if bound.is_infinite() {
            return fallible!(
                NumericDomainError,
                "relation bound overflowed for d_in = {d_in}"
            );
        }
        Ok(bound)
    }

    /// Relation of `outer ∘ inner`, routing `d_in` through the tightest
    /// intermediate distance `inner` certifies. `integral_mid` rounds that
    /// distance up when the intermediate metric only takes whole values.
    pub fn chain(outer: &Relation, inner: &Relation, integral_mid: bool) -> Relation {
        match (outer, inner) {
            (Relation::Constant(c1), Relation::Constant(c0)) if !integral_mid => {
                Relation::Constant(c1 * c0)
            }
            (Relation::Predicate(_), _) => {
                let (outer, inner) = (outer.clone(), inner.clone());
                Relation::predicate(move |d_in, d_out| {
                    let d_mid = midpoint(&inner, d_in, integral_mid)?;
                    outer.eval(d_mid, d_out)
                })
            }
            _ => {
                let (outer, inner) = (outer.clone(), inner.clone());
                Relation::map(move |d_in| outer.minimal(midpoint(&inner, d_in, integral_mid)?))
            }
        }
    }

    /// Additive composition. Each part's minimal bound is computed on its own
    /// and then added, so the total never rounds below the sum of the parts.
    pub fn sum(first: &Relation, second: &Relation) -> Relation {
        let (first, second) = (first.clone(), second.clone());
        Relation::map(move |d_in| Ok(first.minimal(d_in)? + second.minimal(d_in)?))
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Constant(c) => f.debug_tuple("Constant").field(c).finish(),
            Relation::Map(_) => f.write_str("Map(..)"),
            Relation::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

fn validate_distance(name: &str, distance: f64) -> Fallible<()> {
    if distance.is_nan() || distance < 0.0 {
        return fallible!(InvalidDistance, "{name} = {distance} must be non-negative");
    }
    Ok(())
}

fn midpoint(inner: &Relation, d_in: f64, integral: bool) -> Fallible<f64> {
    let d_mid = inner.minimal(d_in)?;
    Ok(if integral { d_mid.ceil() } else { d_mid })
}

/// Smallest `d_out` accepted by a monotone predicate: doubling until the
/// predicate passes, then bisecting. Returns the upper end of the final
/// bracket so the result is always certified.
fn search(p: &PredicateFn, d_in: f64) -> Fallible<f64> {
    if p(d_in, 0.0)? {
        return Ok(0.0);
    }
    let mut lo = 0.0;
    let mut hi = 1.0_f64;
    while !p(d_in, hi)? {
        lo = hi;
        hi *= 2.0;
        if hi.is_infinite() {
            return fallible!(
                RelationViolated,
                "no finite bound is certifiable for d_in = {d_in}"
            );
        }
    }
    for _ in 0..BISECTION_STEPS {
        let mid = lo + (hi - lo) / 2.0;
        if mid <= lo || mid >= hi {
            break;
        }
        if p(d_in, mid)? {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(hi)
}
