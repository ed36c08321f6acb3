//! `dpkit_core__*`: combinators, operator calls and lifecycle.

use std::ffi::{c_char, c_void};

use dpkit_core::{make_chain_mt, make_chain_tt, make_composition, make_postprocess};
use tracing::warn;

use crate::ffi::{boundary, unit, FfiError, FfiResult};
use crate::lifecycle::{registry, MeasurementHandle, ObjectHandle, TransformationHandle};
use crate::manifest::manifest_json;

#[no_mangle]
pub extern "C" fn dpkit_core__make_chain_tt(
    transformation1: TransformationHandle,
    transformation0: TransformationHandle,
) -> FfiResult<TransformationHandle> {
    boundary("make_chain_tt", || {
        let registry = registry();
        let t1 = registry.transformation(transformation1)?;
        let t0 = registry.transformation(transformation0)?;
        registry.insert_transformation(make_chain_tt(&t1, &t0)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__make_chain_mt(
    measurement1: MeasurementHandle,
    transformation0: TransformationHandle,
) -> FfiResult<MeasurementHandle> {
    boundary("make_chain_mt", || {
        let registry = registry();
        let m1 = registry.measurement(measurement1)?;
        let t0 = registry.transformation(transformation0)?;
        registry.insert_measurement(make_chain_mt(&m1, &t0)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__make_composition(
    measurement0: MeasurementHandle,
    measurement1: MeasurementHandle,
) -> FfiResult<MeasurementHandle> {
    boundary("make_composition", || {
        let registry = registry();
        let m0 = registry.measurement(measurement0)?;
        let m1 = registry.measurement(measurement1)?;
        registry.insert_measurement(make_composition(&m0, &m1)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__make_postprocess(
    transformation1: TransformationHandle,
    measurement0: MeasurementHandle,
) -> FfiResult<MeasurementHandle> {
    boundary("make_postprocess", || {
        let registry = registry();
        let t1 = registry.transformation(transformation1)?;
        let m0 = registry.measurement(measurement0)?;
        registry.insert_measurement(make_postprocess(&t1, &m0)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__transformation_invoke(
    this: TransformationHandle,
    arg: ObjectHandle,
) -> FfiResult<ObjectHandle> {
    boundary("transformation_invoke", || {
        let registry = registry();
        let transformation = registry.transformation(this)?;
        let arg = registry.object(arg)?;
        registry.insert_object(transformation.invoke(&arg)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__transformation_check(
    this: TransformationHandle,
    d_in: ObjectHandle,
    d_out: ObjectHandle,
) -> FfiResult<bool> {
    boundary("transformation_check", || {
        let registry = registry();
        let transformation = registry.transformation(this)?;
        let (d_in, d_out) = (registry.object(d_in)?, registry.object(d_out)?);
        let certified = transformation.check(&d_in, &d_out)?;
        if !certified {
            warn!(d_in = %d_in.render(), d_out = %d_out.render(), "stability check rejected");
        }
        Ok(certified)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__transformation_map(
    this: TransformationHandle,
    d_in: ObjectHandle,
) -> FfiResult<ObjectHandle> {
    boundary("transformation_map", || {
        let registry = registry();
        let transformation = registry.transformation(this)?;
        let d_out = transformation.map(&*registry.object(d_in)?)?;
        registry.insert_object(d_out)
    })
}

/// Descriptor of the carrier type the transformation accepts, e.g. `"Vec<f64>"`.
#[no_mangle]
pub extern "C" fn dpkit_core__transformation_input_type(
    this: TransformationHandle,
) -> FfiResult<*mut c_char> {
    boundary("transformation_input_type", || {
        let registry = registry();
        let transformation = registry.transformation(this)?;
        registry.insert_string(transformation.input_domain.carrier_type().descriptor())
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__transformation_free(
    this: TransformationHandle,
) -> FfiResult<*mut c_void> {
    boundary("transformation_free", || {
        registry().free_transformation(this)?;
        Ok(unit())
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__measurement_invoke(
    this: MeasurementHandle,
    arg: ObjectHandle,
) -> FfiResult<ObjectHandle> {
    boundary("measurement_invoke", || {
        let registry = registry();
        let measurement = registry.measurement(this)?;
        let arg = registry.object(arg)?;
        registry.insert_object(measurement.invoke(&arg)?)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__measurement_check(
    this: MeasurementHandle,
    d_in: ObjectHandle,
    d_out: ObjectHandle,
) -> FfiResult<bool> {
    boundary("measurement_check", || {
        let registry = registry();
        let measurement = registry.measurement(this)?;
        let (d_in, d_out) = (registry.object(d_in)?, registry.object(d_out)?);
        let certified = measurement.check(&d_in, &d_out)?;
        if !certified {
            warn!(d_in = %d_in.render(), d_out = %d_out.render(), "privacy check rejected");
        }
        Ok(certified)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__measurement_map(
    this: MeasurementHandle,
    d_in: ObjectHandle,
) -> FfiResult<ObjectHandle> {
    boundary("measurement_map", || {
        let registry = registry();
        let measurement = registry.measurement(this)?;
        let d_out = measurement.map(&*registry.object(d_in)?)?;
        registry.insert_object(d_out)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_core__measurement_free(
    this: MeasurementHandle,
) -> FfiResult<*mut c_void> {
    boundary("measurement_free", || {
        registry().free_measurement(this)?;
        Ok(unit())
    })
}

/// Release an error record. Returns `false` for null, unknown or already
/// freed records.
#[no_mangle]
pub extern "C" fn dpkit_core__error_free(this: *mut FfiError) -> bool {
    registry().free_error(this)
}

/// JSON manifest of every exported function. Free with `dpkit_data__str_free`.
#[no_mangle]
pub extern "C" fn dpkit_core__bootstrap() -> FfiResult<*mut c_char> {
    boundary("bootstrap", || registry().insert_string(manifest_json()?))
}
