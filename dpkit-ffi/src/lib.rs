//! C ABI over `dpkit-core`.
//!
//! Every exported function is `dpkit_<module>__<name>` and returns an
//! [`ffi::FfiResult`]. Objects and operators cross as opaque `u64` handles
//! owned by the [`lifecycle::Registry`]; strings, slices and errors cross as
//! pointers the registry tracks until the matching `*_free` call.
//! `dpkit_core__bootstrap` describes the whole surface as JSON.

pub mod bridge;
pub mod ffi;
pub mod lifecycle;
pub mod logging;
pub mod manifest;

pub mod core;
pub mod data;
pub mod meas;
pub mod trans;

pub use crate::ffi::{FfiError, FfiResult, FfiSlice};
pub use crate::lifecycle::{
    registry, Handle, MeasurementHandle, ObjectHandle, Registry, TransformationHandle,
};
pub use crate::manifest::{manifest, manifest_json, Manifest};
