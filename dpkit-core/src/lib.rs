//! Privacy-accounted transformation and measurement core.
//!
//! Values travel through the engine as type-erased [`data::AnyObject`]s whose
//! tag is always derived from the payload. Operators pair a function with
//! domains, metrics and a [`relation::Relation`] that certifies how far apart
//! outputs (or how large a privacy loss) neighbouring inputs can produce.
//! [`comb`] chains and composes operators, [`catalog`] is the name-keyed table
//! of constructors the boundary crates build from.

#[macro_use]
pub mod error;
#[macro_use]
pub mod data;

pub mod catalog;
pub mod comb;
pub mod config;
pub mod core;
pub mod dom;
pub mod meas;
pub mod metrics;
pub mod relation;
pub mod samplers;
pub mod traits;
pub mod trans;
pub mod types;

pub use crate::catalog::{construct, Constructor, Operator, CONSTRUCTORS};
pub use crate::comb::{make_chain_mt, make_chain_tt, make_composition, make_postprocess};
pub use crate::config::{load_config, ConfigError, ConfigFormat, EngineConfig};
pub use crate::core::{Function, Kernel, Measurement, Transformation};
pub use crate::data::{AnyObject, Value, Vector};
pub use crate::dom::Domain;
pub use crate::error::{Error, ErrorContext, ErrorKind, Fallible};
pub use crate::metrics::{Measure, Metric};
pub use crate::relation::Relation;
pub use crate::samplers::NoiseSource;
pub use crate::types::{Primitive, Type, TypeExpr};
