//! Pipeline files: a chain of catalog constructors, the dataset to release
//! and the distances to check it under.

use std::fs;
use std::path::Path;

use dpkit_core::config::{parse_str, resolve_format};
use dpkit_core::{
    construct, dispatch_element, err, fallible, make_chain_mt, make_chain_tt, AnyObject,
    ConfigError, ConfigFormat, Fallible, Measurement, NoiseSource, Operator, Primitive,
    Transformation, Type, Value,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// A scalar as written in TOML or YAML.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(v) => Value::Bool(*v),
            Literal::Int(v) => Value::I64(*v),
            Literal::Float(v) => Value::F64(*v),
            Literal::Text(v) => Value::String(v.clone()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Step {
    pub constructor: String,
    #[serde(default)]
    pub type_args: String,
    #[serde(default)]
    pub params: Vec<Literal>,
}

impl Step {
    fn build(&self, source: NoiseSource) -> Fallible<Operator> {
        let params: Vec<Value> = self.params.iter().map(Literal::to_value).collect();
        construct(&self.constructor, &self.type_args, &params, source)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Dataset {
    #[serde(rename = "type")]
    pub ty: String,
    pub values: Vec<Literal>,
}

impl Dataset {
    pub fn to_object(&self) -> Fallible<AnyObject> {
        let ty: Type = self.ty.parse()?;
        let values = |primitive: Primitive| {
            self.values
                .iter()
                .map(|literal| literal.to_value().coerce(primitive))
                .collect::<Fallible<Vec<_>>>()
        };
        match ty {
            Type::Vec(primitive) => {
                let values = values(primitive)?;
                dispatch_element!(primitive, |T| {
                    values
                        .iter()
                        .map(|value| value.downcast_ref::<T>().cloned())
                        .collect::<Fallible<Vec<T>>>()
                        .map(AnyObject::vec)
                })
            }
            Type::Scalar(primitive) => match values(primitive)?.as_slice() {
                [value] => Ok(AnyObject::new(value.clone())),
                other => fallible!(
                    LengthMismatch,
                    "{ty} dataset needs one value, found {}",
                    other.len()
                ),
            },
            Type::Tuple(_) => fallible!(InvalidType, "datasets cannot be tuples, found {ty}"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineSpec {
    /// Applied in order; every step but the last is a transformation.
    pub steps: Vec<Step>,
    pub dataset: Dataset,
    pub d_in: Literal,
    pub d_out: Literal,
}

#[derive(Debug, PartialEq)]
pub enum Release {
    Released { output: AnyObject },
    /// `required` is the smallest `d_out` the pipeline can certify.
    Rejected { d_out: Value, required: AnyObject },
}

pub fn load_pipeline(path: &Path, format: ConfigFormat) -> Result<PipelineSpec, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pipeline: PipelineSpec = parse_str(&contents, resolve_format(path, format))?;
    if pipeline.steps.is_empty() {
        return Err(ConfigError::Validation("pipeline has no steps".into()));
    }
    Ok(pipeline)
}

impl PipelineSpec {
    /// Chain every step into one measurement.
    pub fn build(&self, source: NoiseSource) -> Fallible<Measurement> {
        let (last, rest) = self
            .steps
            .split_last()
            .ok_or_else(|| err!(InvalidType, "pipeline has no steps"))?;
        let mut chain: Option<Transformation> = None;
        for step in rest {
            let next = step.build(source)?.into_transformation()?;
            chain = Some(match chain {
                Some(previous) => make_chain_tt(&next, &previous)?,
                None => next,
            });
        }
        let measurement = last.build(source)?.into_measurement()?;
        debug!(steps = self.steps.len(), "pipeline built");
        match chain {
            Some(transformation) => make_chain_mt(&measurement, &transformation),
            None => Ok(measurement),
        }
    }

    /// Check the budget, then invoke only when the check passes.
    pub fn release(&self, source: NoiseSource) -> Fallible<Release> {
        let measurement = self.build(source)?;
        let d_in = AnyObject::new(self.d_in.to_value());
        let d_out = AnyObject::new(self.d_out.to_value());
        if !measurement.check(&d_in, &d_out)? {
            let required = measurement.map(&d_in)?;
            warn!(d_out = %d_out.render(), required = %required.render(), "privacy check rejected");
            return Ok(Release::Rejected {
                d_out: d_out.into_value(),
                required,
            });
        }
        let output = measurement.invoke(&self.dataset.to_object()?)?;
        info!(output = %output.render(), "pipeline released");
        Ok(Release::Released { output })
    }
}
