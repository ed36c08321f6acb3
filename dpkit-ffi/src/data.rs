//! `dpkit_data__*`: moving values across the boundary.

use std::ffi::{c_char, c_void};

use dpkit_core::{fallible, AnyObject, Type};

use crate::bridge::{lift, lower};
use crate::ffi::{boundary, to_str, unit, FfiResult, FfiSlice};
use crate::lifecycle::{registry, ObjectHandle};

/// Copy the slice into a new object of type `T`.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn dpkit_data__slice_as_object(
    raw: *const FfiSlice,
    T: *const c_char,
) -> FfiResult<ObjectHandle> {
    boundary("slice_as_object", || {
        let ty: Type = to_str(T, "T")?.parse()?;
        if raw.is_null() {
            return fallible!(NullArgument, "raw is null");
        }
        let registry = registry();
        let value = lift(unsafe { &*raw }, &ty, registry.limits().max_elements)?;
        registry.insert_object(AnyObject::new(value))
    })
}

#[no_mangle]
pub extern "C" fn dpkit_data__object_type(this: ObjectHandle) -> FfiResult<*mut c_char> {
    boundary("object_type", || {
        let registry = registry();
        let object = registry.object(this)?;
        registry.insert_string(object.ty().descriptor())
    })
}

/// Borrowing view of the object's payload. The view stays valid after the
/// object itself is freed, until `dpkit_data__slice_free`.
#[no_mangle]
pub extern "C" fn dpkit_data__object_as_slice(this: ObjectHandle) -> FfiResult<*mut FfiSlice> {
    boundary("object_as_slice", || {
        let registry = registry();
        let record = lower(registry.object(this)?, registry.limits().max_elements)?;
        registry.insert_slice(record)
    })
}

#[no_mangle]
pub extern "C" fn dpkit_data__object_free(this: ObjectHandle) -> FfiResult<*mut c_void> {
    boundary("object_free", || {
        registry().free_object(this)?;
        Ok(unit())
    })
}

#[no_mangle]
pub extern "C" fn dpkit_data__slice_free(this: *mut FfiSlice) -> FfiResult<*mut c_void> {
    boundary("slice_free", || {
        registry().free_slice(this)?;
        Ok(unit())
    })
}

#[no_mangle]
pub extern "C" fn dpkit_data__str_free(this: *mut c_char) -> FfiResult<*mut c_void> {
    boundary("str_free", || {
        registry().free_string(this)?;
        Ok(unit())
    })
}

#[no_mangle]
pub extern "C" fn dpkit_data__to_string(this: ObjectHandle) -> FfiResult<*mut c_char> {
    boundary("to_string", || {
        let registry = registry();
        let rendered = registry.object(this)?.render();
        registry.insert_string(rendered)
    })
}
