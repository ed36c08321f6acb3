//! Conversion between flat `(ptr, len)` slices and type-erased objects.
//!
//! `len` always counts elements. Scalars are read from a pointer to their
//! native representation (`String` from a NUL-terminated C string), vectors
//! from a contiguous array (`Vec<String>` from an array of C-string
//! pointers), and tuples from an array of element pointers where compound
//! elements point at a nested [`FfiSlice`].

use std::ffi::{c_char, c_void, CStr, CString};
use std::mem;
use std::slice;
use std::sync::Arc;

use dpkit_core::data::Element;
use dpkit_core::{
    dispatch_numeric, err, fallible, AnyObject, Fallible, Primitive, Type, Value, Vector,
};

use crate::ffi::FfiSlice;

/// Interpret `slice` as a value of `ty`, copying it into engine memory.
///
/// The caller guarantees that `slice` describes live memory laid out as `ty`
/// requires for the duration of the call.
pub fn lift(slice: &FfiSlice, ty: &Type, max_elements: usize) -> Fallible<Value> {
    match ty {
        Type::Scalar(primitive) => {
            if slice.len != 1 {
                return fallible!(LengthMismatch, "{ty} expects length 1, found {}", slice.len);
            }
            read_scalar(slice.ptr, *primitive)
        }
        Type::Vec(primitive) => lift_vec(slice, *primitive, max_elements),
        Type::Tuple(items) => {
            if slice.len != items.len() {
                return fallible!(
                    LengthMismatch,
                    "{ty} expects length {}, found {}",
                    items.len(),
                    slice.len
                );
            }
            if slice.ptr.is_null() {
                return fallible!(NullArgument, "tuple slice pointer is null");
            }
            let pointers =
                unsafe { slice::from_raw_parts(slice.ptr.cast::<*const c_void>(), slice.len) };
            items
                .iter()
                .zip(pointers)
                .map(|(ty, ptr)| lift_element(*ptr, ty, max_elements))
                .collect::<Fallible<Vec<_>>>()
                .map(Value::Tuple)
        }
    }
}

fn lift_element(ptr: *const c_void, ty: &Type, max_elements: usize) -> Fallible<Value> {
    match ty {
        Type::Scalar(primitive) => read_scalar(ptr, *primitive),
        Type::Vec(_) | Type::Tuple(_) => {
            if ptr.is_null() {
                return fallible!(NullArgument, "tuple element of type {ty} is null");
            }
            lift(unsafe { &*ptr.cast::<FfiSlice>() }, ty, max_elements)
        }
    }
}

/// Read one scalar of `primitive` from `ptr`.
pub fn read_scalar(ptr: *const c_void, primitive: Primitive) -> Fallible<Value> {
    if ptr.is_null() {
        return fallible!(NullArgument, "pointer to {primitive} is null");
    }
    unsafe {
        Ok(match primitive {
            Primitive::Bool => Value::Bool(read_bool(ptr.cast::<u8>().read_unaligned())?),
            Primitive::I32 => Value::I32(ptr.cast::<i32>().read_unaligned()),
            Primitive::I64 => Value::I64(ptr.cast::<i64>().read_unaligned()),
            Primitive::U32 => Value::U32(ptr.cast::<u32>().read_unaligned()),
            Primitive::U64 => Value::U64(ptr.cast::<u64>().read_unaligned()),
            Primitive::F32 => Value::F32(ptr.cast::<f32>().read_unaligned()),
            Primitive::F64 => Value::F64(ptr.cast::<f64>().read_unaligned()),
            Primitive::String => Value::String(read_c_str(ptr.cast::<c_char>())?),
        })
    }
}

fn read_bool(byte: u8) -> Fallible<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => fallible!(InvalidType, "bool byte must be 0 or 1, found {other}"),
    }
}

unsafe fn read_c_str(ptr: *const c_char) -> Fallible<String> {
    if ptr.is_null() {
        return fallible!(NullArgument, "string pointer is null");
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|err| err!(InvalidType, "string is not valid UTF-8: {err}"))
}

fn lift_vec(slice: &FfiSlice, primitive: Primitive, max_elements: usize) -> Fallible<Value> {
    let len = slice.len;
    if len > max_elements {
        return fallible!(LimitExceeded, "{len} elements exceed the limit of {max_elements}");
    }
    if len == 0 {
        return Ok(Value::Vec(dpkit_core::dispatch_element!(primitive, |T| {
            T::into_vector(Vec::new())
        })));
    }
    if slice.ptr.is_null() {
        return fallible!(NullArgument, "slice of {len} elements has a null pointer");
    }
    match primitive {
        Primitive::Bool => {
            let bytes = unsafe { slice::from_raw_parts(slice.ptr.cast::<u8>(), len) };
            let mut items = Vec::new();
            items.try_reserve_exact(len)?;
            for byte in bytes {
                items.push(read_bool(*byte)?);
            }
            Ok(Value::from(items))
        }
        Primitive::String => {
            let pointers = unsafe { slice::from_raw_parts(slice.ptr.cast::<*const c_char>(), len) };
            let mut items = Vec::new();
            items.try_reserve_exact(len)?;
            for ptr in pointers {
                items.push(unsafe { read_c_str(*ptr) }?);
            }
            Ok(Value::from(items))
        }
        numeric => dispatch_numeric!(numeric, |T| { copy_numeric::<T>(slice.ptr, len) }, {
            fallible!(InvalidType, "{numeric} is not a numeric primitive")
        }),
    }
}

/// Copy `len` numbers from `ptr`, which need not be aligned for `T`.
fn copy_numeric<T: Element + Copy>(ptr: *const c_void, len: usize) -> Fallible<Value> {
    let bytes = len
        .checked_mul(mem::size_of::<T>())
        .filter(|bytes| *bytes <= isize::MAX as usize);
    if bytes.is_none() {
        return fallible!(
            LengthMismatch,
            "{len} elements of {} overflow the address space",
            T::PRIMITIVE
        );
    }
    let mut items = Vec::new();
    items.try_reserve_exact(len)?;
    let source = ptr.cast::<T>();
    if source as usize % mem::align_of::<T>() == 0 {
        items.extend_from_slice(unsafe { slice::from_raw_parts(source, len) });
    } else {
        items.extend((0..len).map(|i| unsafe { source.add(i).read_unaligned() }));
    }
    Ok(Value::from(items))
}

/// Storage a lowered slice needs beyond the object's own payload.
#[derive(Default)]
struct Scratch {
    strings: Vec<CString>,
    pointers: Vec<Vec<*const c_void>>,
    slices: Vec<Box<FfiSlice>>,
}

/// A slice handed to the caller, together with everything it points into.
pub struct SliceRecord {
    slice: FfiSlice,
    _owner: Arc<AnyObject>,
    _scratch: Scratch,
}

// Every pointer in the record addresses the held object or the record's
// own scratch buffers, none of which are mutated after construction.
unsafe impl Send for SliceRecord {}

impl SliceRecord {
    pub fn slice(&self) -> &FfiSlice {
        &self.slice
    }
}

/// View `object` as a flat slice. Primitive scalars and vectors are not
/// copied; the record keeps the object alive for as long as it exists.
pub fn lower(object: Arc<AnyObject>, max_elements: usize) -> Fallible<Box<SliceRecord>> {
    let mut scratch = Scratch::default();
    let slice = lower_value(object.value(), &mut scratch, max_elements)?;
    Ok(Box::new(SliceRecord {
        slice,
        _owner: object,
        _scratch: scratch,
    }))
}

fn lower_value(value: &Value, scratch: &mut Scratch, max_elements: usize) -> Fallible<FfiSlice> {
    fn scalar<T>(value: &T) -> FfiSlice {
        FfiSlice::new((value as *const T).cast(), 1)
    }
    fn array<T>(items: &[T]) -> FfiSlice {
        FfiSlice::new(items.as_ptr().cast(), items.len())
    }

    Ok(match value {
        Value::Bool(v) => scalar(v),
        Value::I32(v) => scalar(v),
        Value::I64(v) => scalar(v),
        Value::U32(v) => scalar(v),
        Value::U64(v) => scalar(v),
        Value::F32(v) => scalar(v),
        Value::F64(v) => scalar(v),
        Value::String(text) => FfiSlice::new(c_string(text, scratch)?.cast(), 1),
        Value::Vec(vector) => {
            if vector.len() > max_elements {
                return fallible!(
                    LimitExceeded,
                    "{} elements exceed the limit of {max_elements}",
                    vector.len()
                );
            }
            match vector {
                Vector::Bool(items) => array(items),
                Vector::I32(items) => array(items),
                Vector::I64(items) => array(items),
                Vector::U32(items) => array(items),
                Vector::U64(items) => array(items),
                Vector::F32(items) => array(items),
                Vector::F64(items) => array(items),
                Vector::String(items) => {
                    let mut pointers = Vec::new();
                    pointers.try_reserve_exact(items.len())?;
                    for text in items {
                        pointers.push(c_string(text, scratch)?.cast::<c_void>());
                    }
                    let slice = array(&pointers);
                    scratch.pointers.push(pointers);
                    slice
                }
            }
        }
        Value::Tuple(items) => {
            let mut pointers = Vec::new();
            pointers.try_reserve_exact(items.len())?;
            for item in items {
                let ptr = match item {
                    Value::Vec(_) | Value::Tuple(_) => {
                        let nested = Box::new(lower_value(item, scratch, max_elements)?);
                        let ptr = (&*nested as *const FfiSlice).cast::<c_void>();
                        scratch.slices.push(nested);
                        ptr
                    }
                    _ => lower_value(item, scratch, max_elements)?.ptr,
                };
                pointers.push(ptr);
            }
            let slice = array(&pointers);
            scratch.pointers.push(pointers);
            slice
        }
    })
}

fn c_string(text: &str, scratch: &mut Scratch) -> Fallible<*const c_char> {
    let text = CString::new(text)
        .map_err(|err| err!(InvalidType, "string contains an interior NUL: {err}"))?;
    let ptr = text.as_ptr();
    scratch.strings.push(text);
    Ok(ptr)
}
