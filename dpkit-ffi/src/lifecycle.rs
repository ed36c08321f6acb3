//! Ownership of everything the boundary hands out.
//!
//! Objects and operators live in generation-checked [`HandleTable`]s and cross
//! the boundary as opaque `u64` handles, so a stale or doubly freed handle is
//! reported as `InvalidHandle` instead of touching freed memory. Errors, slice
//! records and strings have to be real pointers (the caller reads through
//! them); the registry keeps every address it issued and refuses to free one
//! it does not know.

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::{Arc, OnceLock};

use dpkit_core::config::{LimitsSection, MAX_HANDLES};
use dpkit_core::{
    err, fallible, AnyObject, EngineConfig, Error, Fallible, Measurement, NoiseSource,
    Transformation,
};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::bridge::SliceRecord;
use crate::ffi::{ErrorRecord, FfiError, FfiSlice};
use crate::logging;

/// Opaque, non-zero handle: `(index + 1) | generation << 32`.
#[repr(transparent)]
pub struct Handle<T> {
    raw: u64,
    _kind: PhantomData<fn() -> T>,
}

pub type ObjectHandle = Handle<Arc<AnyObject>>;
pub type TransformationHandle = Handle<Transformation>;
pub type MeasurementHandle = Handle<Measurement>;

impl<T> Handle<T> {
    pub const NULL: Self = Self::from_raw(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn raw(&self) -> u64 {
        self.raw
    }

    fn encode(index: usize, generation: u32) -> Self {
        Self::from_raw((index as u64 + 1) | (generation as u64) << 32)
    }

    fn decode(&self) -> Fallible<(usize, u32)> {
        if self.raw == 0 {
            return fallible!(NullArgument, "handle is null");
        }
        let index = (self.raw & 0xffff_ffff) as usize;
        if index == 0 {
            return fallible!(InvalidHandle, "handle {:#x} was never issued", self.raw);
        }
        Ok((index - 1, (self.raw >> 32) as u32))
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.raw)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot table whose handles go stale as soon as their value is removed.
pub struct HandleTable<T> {
    kind: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
    limit: usize,
}

impl<T> HandleTable<T> {
    /// `limit` is capped at [`MAX_HANDLES`] so every index fits its handle bits.
    pub fn new(kind: &'static str, limit: usize) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            limit: limit.min(MAX_HANDLES),
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, value: T) -> Fallible<Handle<T>> {
        if self.live >= self.limit {
            return fallible!(
                LimitExceeded,
                "{} live {} handles (limit {})",
                self.live,
                self.kind,
                self.limit
            );
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.try_reserve(1)?;
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.live += 1;
        let handle = Handle::encode(index, slot.generation);
        trace!(kind = self.kind, handle = handle.raw, "handle issued");
        Ok(handle)
    }

    pub fn get(&self, handle: Handle<T>) -> Fallible<&T> {
        let (index, generation) = handle.decode()?;
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| self.stale(handle))
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Fallible<T> {
        let (index, generation) = handle.decode()?;
        let taken = match self.slots.get_mut(index) {
            Some(slot) if slot.generation == generation => slot.value.take(),
            _ => None,
        };
        let Some(value) = taken else {
            return Err(self.stale(handle));
        };
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        trace!(kind = self.kind, handle = handle.raw, "handle freed");
        Ok(value)
    }

    fn stale(&self, handle: Handle<T>) -> Error {
        err!(
            InvalidHandle,
            "{} handle {:#x} is stale, freed or unknown",
            self.kind,
            handle.raw
        )
    }
}

/// Error record handed out once the error table is full. It is never freed, so
/// `dpkit_core__error_free` reports it as unknown.
struct StaticError(FfiError);

// Points only at static, NUL-terminated strings.
unsafe impl Sync for StaticError {}

static ERRORS_EXHAUSTED: StaticError = StaticError(FfiError {
    variant: b"LimitExceeded\0".as_ptr().cast(),
    message: b"too many live error records; free earlier errors first\0"
        .as_ptr()
        .cast(),
    backtrace: ptr::null(),
});

/// Process-wide owner of every resource issued across the boundary.
pub struct Registry {
    limits: LimitsSection,
    noise: NoiseSource,
    objects: Mutex<HandleTable<Arc<AnyObject>>>,
    transformations: Mutex<HandleTable<Transformation>>,
    measurements: Mutex<HandleTable<Measurement>>,
    slices: Mutex<HashMap<usize, Box<SliceRecord>>>,
    errors: Mutex<HashMap<usize, Box<ErrorRecord>>>,
    strings: Mutex<HashMap<usize, CString>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The registry behind the C ABI, configured from `DPKIT_CONFIG` on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let config = EngineConfig::from_env().unwrap_or_else(|err| {
            warn!(error = %err, "falling back to default engine configuration");
            EngineConfig::default()
        });
        logging::init(&config.logging);
        Registry::new(&config)
    })
}

impl Registry {
    pub fn new(config: &EngineConfig) -> Self {
        let limit = config.limits.max_handles;
        Self {
            limits: config.limits.clone(),
            noise: config.noise_source(),
            objects: Mutex::new(HandleTable::new("object", limit)),
            transformations: Mutex::new(HandleTable::new("transformation", limit)),
            measurements: Mutex::new(HandleTable::new("measurement", limit)),
            slices: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            strings: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &LimitsSection {
        &self.limits
    }

    pub fn noise_source(&self) -> NoiseSource {
        self.noise
    }

    pub fn insert_object(&self, object: AnyObject) -> Fallible<ObjectHandle> {
        self.objects.lock().insert(Arc::new(object))
    }

    pub fn object(&self, handle: ObjectHandle) -> Fallible<Arc<AnyObject>> {
        self.objects.lock().get(handle).cloned()
    }

    /// Releases the handle. Slices lowered from the object keep its payload
    /// alive until they are freed themselves.
    pub fn free_object(&self, handle: ObjectHandle) -> Fallible<()> {
        self.objects.lock().remove(handle).map(drop)
    }

    pub fn insert_transformation(&self, t: Transformation) -> Fallible<TransformationHandle> {
        self.transformations.lock().insert(t)
    }

    pub fn transformation(&self, handle: TransformationHandle) -> Fallible<Transformation> {
        self.transformations.lock().get(handle).cloned()
    }

    pub fn free_transformation(&self, handle: TransformationHandle) -> Fallible<()> {
        self.transformations.lock().remove(handle).map(drop)
    }

    pub fn insert_measurement(&self, m: Measurement) -> Fallible<MeasurementHandle> {
        self.measurements.lock().insert(m)
    }

    pub fn measurement(&self, handle: MeasurementHandle) -> Fallible<Measurement> {
        self.measurements.lock().get(handle).cloned()
    }

    pub fn free_measurement(&self, handle: MeasurementHandle) -> Fallible<()> {
        self.measurements.lock().remove(handle).map(drop)
    }

    pub fn insert_slice(&self, record: Box<SliceRecord>) -> Fallible<*mut FfiSlice> {
        let mut slices = self.slices.lock();
        if slices.len() >= self.limits.max_handles {
            return fallible!(LimitExceeded, "{} live slices", slices.len());
        }
        let ptr = record.slice() as *const FfiSlice as *mut FfiSlice;
        slices.insert(ptr as usize, record);
        trace!(address = ptr as usize, "slice issued");
        Ok(ptr)
    }

    pub fn free_slice(&self, ptr: *mut FfiSlice) -> Fallible<()> {
        if ptr.is_null() {
            return fallible!(NullArgument, "slice is null");
        }
        self.slices
            .lock()
            .remove(&(ptr as usize))
            .map(drop)
            .ok_or_else(|| err!(InvalidHandle, "slice {ptr:p} is unknown or already freed"))
    }

    pub fn insert_string(&self, text: String) -> Fallible<*mut c_char> {
        let text = CString::new(text)
            .map_err(|err| err!(InvalidType, "string contains an interior NUL: {err}"))?;
        let mut strings = self.strings.lock();
        if strings.len() >= self.limits.max_handles {
            return fallible!(LimitExceeded, "{} live strings", strings.len());
        }
        let ptr = text.as_ptr() as *mut c_char;
        strings.insert(ptr as usize, text);
        Ok(ptr)
    }

    pub fn free_string(&self, ptr: *mut c_char) -> Fallible<()> {
        if ptr.is_null() {
            return fallible!(NullArgument, "string is null");
        }
        self.strings
            .lock()
            .remove(&(ptr as usize))
            .map(drop)
            .ok_or_else(|| err!(InvalidHandle, "string {ptr:p} is unknown or already freed"))
    }

    /// Once `max_handles` errors are live, every further failure is reported
    /// through one shared `LimitExceeded` record.
    pub fn insert_error(&self, error: Error) -> *mut FfiError {
        let mut errors = self.errors.lock();
        if errors.len() >= self.limits.max_handles {
            warn!(
                live = errors.len(),
                dropped = %error,
                "error table full, reporting LimitExceeded"
            );
            return &ERRORS_EXHAUSTED.0 as *const FfiError as *mut FfiError;
        }
        let record = ErrorRecord::new(error);
        let ptr = &record.error as *const FfiError as *mut FfiError;
        errors.insert(ptr as usize, record);
        ptr
    }

    /// `false` for null, unknown or already freed errors.
    pub fn free_error(&self, ptr: *mut FfiError) -> bool {
        !ptr.is_null() && self.errors.lock().remove(&(ptr as usize)).is_some()
    }

    pub fn live_objects(&self) -> usize {
        self.objects.lock().len()
    }
}
