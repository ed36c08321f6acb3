//! C-ABI result, error and slice records, plus the wrapper every exported
//! function runs inside.

use std::any::Any;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use dpkit_core::{
    construct, err, fallible, Constructor, Error, ErrorContext, ErrorKind, Fallible, Operator, Type,
    Value,
};
use tracing::{debug, warn};

use crate::bridge::read_scalar;
use crate::lifecycle::{registry, ObjectHandle};

/// Non-owning `(pointer, element count)` view.
#[repr(C)]
#[derive(Debug)]
pub struct FfiSlice {
    pub ptr: *const c_void,
    pub len: usize,
}

impl FfiSlice {
    pub fn new(ptr: *const c_void, len: usize) -> Self {
        Self { ptr, len }
    }
}

/// Error record handed to the caller. `backtrace` is null when none was
/// captured.
#[repr(C)]
#[derive(Debug)]
pub struct FfiError {
    pub variant: *const c_char,
    pub message: *const c_char,
    pub backtrace: *const c_char,
}

#[repr(C, u32)]
#[derive(Debug)]
pub enum FfiResult<T> {
    Ok(T),
    Err(*mut FfiError),
}

impl<T> FfiResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, FfiResult::Ok(_))
    }
}

/// Owns the strings an [`FfiError`] points into.
pub(crate) struct ErrorRecord {
    pub(crate) error: FfiError,
    _variant: CString,
    _message: CString,
    _backtrace: Option<CString>,
}

// The raw pointers in `error` address the CStrings owned by the same record.
unsafe impl Send for ErrorRecord {}

impl ErrorRecord {
    pub(crate) fn new(error: Error) -> Box<Self> {
        let variant = c_string(error.kind.as_str());
        let message = c_string(&error.message);
        let backtrace = error.backtrace.as_deref().map(c_string);
        Box::new(Self {
            error: FfiError {
                variant: variant.as_ptr(),
                message: message.as_ptr(),
                backtrace: backtrace.as_ref().map_or(ptr::null(), |bt| bt.as_ptr()),
            },
            _variant: variant,
            _message: message,
            _backtrace: backtrace,
        })
    }
}

/// Lossy conversion that drops interior NULs rather than failing.
fn c_string(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

/// Run `body`, converting both `Err` and panics into an error record.
pub(crate) fn boundary<T>(name: &'static str, body: impl FnOnce() -> Fallible<T>) -> FfiResult<T> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| {
        fallible!(FailedFunction, "panic in {name}: {}", panic_message(&*payload))
    });
    match outcome {
        Ok(value) => FfiResult::Ok(value),
        Err(err) => {
            match err.kind {
                ErrorKind::DomainMismatch
                | ErrorKind::InvalidHandle
                | ErrorKind::FailedFunction => warn!(
                    function = name,
                    kind = %err.kind,
                    message = %err.message,
                    "boundary call failed"
                ),
                _ => debug!(
                    function = name,
                    kind = %err.kind,
                    message = %err.message,
                    "boundary call failed"
                ),
            }
            FfiResult::Err(registry().insert_error(err))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

/// Borrow a NUL-terminated UTF-8 argument.
pub(crate) fn to_str<'a>(text: *const c_char, name: &str) -> Fallible<&'a str> {
    if text.is_null() {
        return fallible!(NullArgument, "{name} is null");
    }
    unsafe { CStr::from_ptr(text) }
        .to_str()
        .map_err(|err| err!(InvalidType, "{name} is not valid UTF-8: {err}"))
}

/// `"<A, B>"` from separately passed type-argument names.
pub(crate) fn type_args(names: &[(&str, *const c_char)]) -> Fallible<String> {
    let names = names
        .iter()
        .map(|(param, text)| to_str(*text, param))
        .collect::<Fallible<Vec<_>>>()?;
    Ok(format!("<{}>", names.join(", ")))
}

/// A constructor parameter as it arrives at the boundary.
pub(crate) enum Param {
    /// Pointer to a value of one of the constructor's type parameters.
    Generic(*const c_void),
    Concrete(Value),
    /// Registered object carrying a compound parameter such as a category list.
    Object(ObjectHandle),
}

/// Build constructor `name` from separately passed type arguments and raw
/// parameters, using the registry's noise source.
pub(crate) fn construct_operator(
    name: &str,
    type_names: &[(&str, *const c_char)],
    params: &[Param],
) -> Fallible<Operator> {
    let (type_args, params) = (|| -> Fallible<(String, Vec<Value>)> {
        let type_args = type_args(type_names)?;
        let ctor = Constructor::find(name)?;
        let types = ctor.param_types(&ctor.bind(&type_args)?)?;
        let params = params
            .iter()
            .zip(types)
            .map(|(param, ty)| match (param, ty) {
                (Param::Generic(ptr), Type::Scalar(primitive)) => read_scalar(*ptr, primitive),
                (Param::Generic(_), ty) => {
                    fallible!(InvalidType, "{ty} must be passed as an object handle")
                }
                (Param::Concrete(value), _) => Ok(value.clone()),
                (Param::Object(handle), _) => Ok(registry().object(*handle)?.value().clone()),
            })
            .collect::<Fallible<Vec<_>>>()?;
        Ok((type_args, params))
    })()
    .with_context(|| name.to_string())?;
    construct(name, &type_args, &params, registry().noise_source())
}

/// Null payload for calls that only report success.
pub(crate) fn unit() -> *mut c_void {
    ptr::null_mut()
}
