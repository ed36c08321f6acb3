//! `dpkit_meas__*`: noise-adding measurement constructors.
#![allow(non_snake_case)]

use std::ffi::c_char;

use dpkit_core::Value;

use crate::ffi::{boundary, construct_operator, FfiResult, Param};
use crate::lifecycle::{registry, MeasurementHandle};

fn build(name: &'static str, scale: f64, T: *const c_char) -> FfiResult<MeasurementHandle> {
    boundary(name, || {
        let params = [Param::Concrete(Value::F64(scale))];
        let measurement = construct_operator(name, &[("T", T)], &params)?.into_measurement()?;
        registry().insert_measurement(measurement)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_meas__make_base_laplace(
    scale: f64,
    T: *const c_char,
) -> FfiResult<MeasurementHandle> {
    build("make_base_laplace", scale, T)
}

#[no_mangle]
pub extern "C" fn dpkit_meas__make_base_laplace_vec(
    scale: f64,
    T: *const c_char,
) -> FfiResult<MeasurementHandle> {
    build("make_base_laplace_vec", scale, T)
}

#[no_mangle]
pub extern "C" fn dpkit_meas__make_base_gaussian(
    scale: f64,
    T: *const c_char,
) -> FfiResult<MeasurementHandle> {
    build("make_base_gaussian", scale, T)
}

#[no_mangle]
pub extern "C" fn dpkit_meas__make_base_gaussian_vec(
    scale: f64,
    T: *const c_char,
) -> FfiResult<MeasurementHandle> {
    build("make_base_gaussian_vec", scale, T)
}

#[no_mangle]
pub extern "C" fn dpkit_meas__make_base_geometric(
    scale: f64,
    T: *const c_char,
) -> FfiResult<MeasurementHandle> {
    build("make_base_geometric", scale, T)
}
