use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::marker::PhantomData;

use num_traits::NumCast;

use crate::core::{Function, Kernel, Transformation};
use crate::data::{Element, Value};
use crate::dom::{Domain, ScalarDomain};
use crate::error::Fallible;
use crate::metrics::Metric;
use crate::relation::Relation;
use crate::traits::Number;
use crate::types::Primitive;

struct Count<T>(PhantomData<T>);

impl<T: Element> Kernel for Count<T> {
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let len = arg.downcast_vec::<T>()?.len();
        Ok(Value::U32(u32::try_from(len).unwrap_or(u32::MAX)))
    }
}

/// Number of records, saturating at `u32::MAX`.
pub fn make_count<TIA: Element>() -> Fallible<Transformation> {
    Transformation::new(
        Domain::vector(ScalarDomain::All(TIA::PRIMITIVE)),
        Domain::atom::<u32>(),
        Function::new(Count::<TIA>(PhantomData)),
        Metric::Symmetric,
        Metric::Absolute(Primitive::U32),
        Relation::constant(1.0)?,
    )
}

/// Stability of a histogram: one added or removed record moves one count by
/// one, one changed record moves two counts by one each.
fn histogram_constant(input_metric: Metric, output_metric: Metric) -> Fallible<f64> {
    match (input_metric, output_metric) {
        (Metric::Symmetric, Metric::L1(_) | Metric::L2(_)) => Ok(1.0),
        (Metric::Hamming, Metric::L1(_)) => Ok(2.0),
        (Metric::Hamming, Metric::L2(_)) => Ok(std::f64::consts::SQRT_2),
        (input, output) => fallible!(
            DomainMismatch,
            "histograms map SymmetricDistance or HammingDistance to L1Distance or \
             L2Distance, not {input} to {output}"
        ),
    }
}

fn to_count<TO: Number>(count: usize) -> Fallible<TO> {
    <TO as NumCast>::from(count)
        .ok_or_else(|| err!(FailedFunction, "count {count} does not fit in {}", TO::PRIMITIVE))
}

struct CountByCategories<TI, TO> {
    categories: Vec<TI>,
    _count: PhantomData<TO>,
}

impl<TI, TO> Kernel for CountByCategories<TI, TO>
where
    TI: Element + Hash + Eq,
    TO: Number,
{
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let index = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, category)| (category, i))
            .collect::<HashMap<_, _>>();
        let mut counts = vec![0_usize; self.categories.len() + 1];
        for record in arg.downcast_vec::<TI>()? {
            counts[index.get(record).copied().unwrap_or(self.categories.len())] += 1;
        }
        let counts = counts.into_iter().map(to_count).collect::<Fallible<Vec<TO>>>()?;
        Ok(Value::from(counts))
    }
}

/// Count the records equal to each of `categories`. The output has one extra
/// trailing entry counting every record outside the categories.
pub fn make_count_by_categories<TI, TO>(
    categories: Vec<TI>,
    input_metric: Metric,
    output_metric: Metric,
) -> Fallible<Transformation>
where
    TI: Element + Hash + Eq,
    TO: Number,
{
    let constant = histogram_constant(input_metric, output_metric)?;
    if categories.iter().collect::<HashSet<_>>().len() != categories.len() {
        return fallible!(NumericDomainError, "categories must be distinct");
    }
    let size = categories.len() + 1;
    Transformation::new(
        Domain::vector(ScalarDomain::All(TI::PRIMITIVE)),
        Domain::sized_vector(ScalarDomain::All(TO::PRIMITIVE), size),
        Function::new(CountByCategories::<TI, TO> {
            categories,
            _count: PhantomData,
        }),
        input_metric,
        output_metric,
        Relation::constant(constant)?,
    )
}

struct CountBy<TI, TO>(PhantomData<(TI, TO)>);

impl<TI, TO> Kernel for CountBy<TI, TO>
where
    TI: Element + Ord,
    TO: Number,
{
    fn invoke(&self, arg: &Value) -> Fallible<Value> {
        let mut counts = BTreeMap::<&TI, usize>::new();
        for record in arg.downcast_vec::<TI>()? {
            *counts.entry(record).or_default() += 1;
        }
        let keys = counts.keys().map(|&key| key.clone()).collect::<Vec<TI>>();
        let counts = counts.into_values().map(to_count).collect::<Fallible<Vec<TO>>>()?;
        Ok(Value::Tuple(vec![Value::from(keys), Value::from(counts)]))
    }
}

/// Count every distinct record of a dataset of known size `n`.
///
/// Releases `(keys, counts)` with the keys in ascending order. The set of keys
/// itself depends on the data, so only the counts are measured by
/// `output_metric`.
pub fn make_count_by<TI, TO>(
    n: u32,
    input_metric: Metric,
    output_metric: Metric,
) -> Fallible<Transformation>
where
    TI: Element + Ord,
    TO: Number,
{
    if n == 0 {
        return fallible!(NumericDomainError, "dataset size n must be positive");
    }
    let constant = histogram_constant(input_metric, output_metric)?;
    Transformation::new(
        Domain::sized_vector(ScalarDomain::All(TI::PRIMITIVE), n as usize),
        Domain::Tuple(vec![
            Domain::vector(ScalarDomain::All(TI::PRIMITIVE)),
            Domain::vector(ScalarDomain::All(TO::PRIMITIVE)),
        ]),
        Function::new(CountBy::<TI, TO>(PhantomData)),
        input_metric,
        output_metric,
        Relation::constant(constant)?,
    )
}
