//! `dpkit_trans__*`: transformation constructors.
#![allow(non_snake_case)]

use std::ffi::{c_char, c_void};

use dpkit_core::Value;

use crate::ffi::{boundary, construct_operator, FfiResult, Param};
use crate::lifecycle::{registry, ObjectHandle, TransformationHandle};

fn build(
    name: &'static str,
    type_names: &[(&str, *const c_char)],
    params: &[Param],
) -> FfiResult<TransformationHandle> {
    boundary(name, || {
        let transformation =
            construct_operator(name, type_names, params)?.into_transformation()?;
        registry().insert_transformation(transformation)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_identity(
    M: *const c_char,
    T: *const c_char,
) -> FfiResult<TransformationHandle> {
    build("make_identity", &[("M", M), ("T", T)], &[])
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_clamp(
    lower: *const c_void,
    upper: *const c_void,
    T: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_clamp",
        &[("T", T)],
        &[Param::Generic(lower), Param::Generic(upper)],
    )
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_clamp_scalar(
    lower: *const c_void,
    upper: *const c_void,
    T: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_clamp_scalar",
        &[("T", T)],
        &[Param::Generic(lower), Param::Generic(upper)],
    )
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_cast_vec(
    M: *const c_char,
    TI: *const c_char,
    TO: *const c_char,
) -> FfiResult<TransformationHandle> {
    build("make_cast_vec", &[("M", M), ("TI", TI), ("TO", TO)], &[])
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_bounded_sum(
    lower: *const c_void,
    upper: *const c_void,
    T: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_bounded_sum",
        &[("T", T)],
        &[Param::Generic(lower), Param::Generic(upper)],
    )
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_bounded_mean(
    lower: *const c_void,
    upper: *const c_void,
    n: u32,
    MI: *const c_char,
    T: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_bounded_mean",
        &[("MI", MI), ("T", T)],
        &[
            Param::Generic(lower),
            Param::Generic(upper),
            Param::Concrete(Value::U32(n)),
        ],
    )
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_count(TIA: *const c_char) -> FfiResult<TransformationHandle> {
    build("make_count", &[("TIA", TIA)], &[])
}

/// `categories` is an object of type `Vec<TI>`; it is copied, so the caller
/// may free it afterwards.
#[no_mangle]
pub extern "C" fn dpkit_trans__make_count_by_categories(
    categories: ObjectHandle,
    MI: *const c_char,
    MO: *const c_char,
    TI: *const c_char,
    TO: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_count_by_categories",
        &[("MI", MI), ("MO", MO), ("TI", TI), ("TO", TO)],
        &[Param::Object(categories)],
    )
}

#[no_mangle]
pub extern "C" fn dpkit_trans__make_count_by(
    n: u32,
    MI: *const c_char,
    MO: *const c_char,
    TI: *const c_char,
    TO: *const c_char,
) -> FfiResult<TransformationHandle> {
    build(
        "make_count_by",
        &[("MI", MI), ("MO", MO), ("TI", TI), ("TO", TO)],
        &[Param::Concrete(Value::U32(n))],
    )
}
