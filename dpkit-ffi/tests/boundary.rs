use std::ffi::{c_char, c_void, CStr, CString};
use std::io;
use std::sync::Arc;

use dpkit_ffi::core::*;
use dpkit_ffi::data::*;
use dpkit_ffi::meas::{dpkit_meas__make_base_laplace, dpkit_meas__make_base_laplace_vec};
use dpkit_ffi::trans::*;
use dpkit_ffi::{FfiError, FfiResult, FfiSlice, ObjectHandle};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn ok<T>(result: FfiResult<T>) -> T {
    match result {
        FfiResult::Ok(value) => value,
        FfiResult::Err(err) => {
            let message = unsafe { CStr::from_ptr((*err).message) }
                .to_string_lossy()
                .into_owned();
            dpkit_core__error_free(err);
            panic!("boundary call failed: {message}");
        }
    }
}

fn variant_of<T>(result: FfiResult<T>) -> String {
    match result {
        FfiResult::Ok(_) => panic!("expected an error"),
        FfiResult::Err(err) => {
            let variant = unsafe { CStr::from_ptr((*err).variant) }
                .to_str()
                .unwrap()
                .to_string();
            assert!(dpkit_core__error_free(err));
            variant
        }
    }
}

fn take_string(text: *mut c_char) -> String {
    let owned = unsafe { CStr::from_ptr(text) }.to_str().unwrap().to_string();
    ok(dpkit_data__str_free(text));
    owned
}

fn f64s(items: &[f64]) -> ObjectHandle {
    let ty = CString::new("Vec<f64>").unwrap();
    let slice = FfiSlice::new(items.as_ptr().cast(), items.len());
    ok(dpkit_data__slice_as_object(&slice, ty.as_ptr()))
}

fn scalar<T: Copy>(value: T, ty: &str) -> ObjectHandle {
    let ty = CString::new(ty).unwrap();
    let slice = FfiSlice::new((&value as *const T).cast(), 1);
    ok(dpkit_data__slice_as_object(&slice, ty.as_ptr()))
}

fn read_f64(object: ObjectHandle) -> f64 {
    let slice = ok(dpkit_data__object_as_slice(object));
    let value = unsafe {
        assert_eq!((*slice).len, 1);
        *(*slice).ptr.cast::<f64>()
    };
    ok(dpkit_data__slice_free(slice));
    value
}

#[test]
fn single_element_slice_lifts_to_a_scalar() {
    let input = [1.0_f64];
    let ty = CString::new("f64").unwrap();
    let object = ok(dpkit_data__slice_as_object(
        &FfiSlice::new(input.as_ptr().cast(), 1),
        ty.as_ptr(),
    ));
    assert_eq!(take_string(ok(dpkit_data__object_type(object))), "f64");

    let slice = ok(dpkit_data__object_as_slice(object));
    let bytes = unsafe { std::slice::from_raw_parts((*slice).ptr.cast::<u8>(), 8) };
    assert_eq!(bytes, &1.0_f64.to_ne_bytes());
    ok(dpkit_data__slice_free(slice));
    ok(dpkit_data__object_free(object));
}

#[test]
fn slices_outlive_their_object() {
    let object = f64s(&[1.5, 2.5]);
    let slice = ok(dpkit_data__object_as_slice(object));
    ok(dpkit_data__object_free(object));
    let items = unsafe { std::slice::from_raw_parts((*slice).ptr.cast::<f64>(), (*slice).len) };
    assert_eq!(items, &[1.5, 2.5]);
    ok(dpkit_data__slice_free(slice));
    assert_eq!(variant_of(dpkit_data__slice_free(slice)), "InvalidHandle");
}

#[test]
fn double_free_is_reported() {
    let object = scalar(3_i32, "i32");
    ok(dpkit_data__object_free(object));
    assert_eq!(variant_of(dpkit_data__object_free(object)), "InvalidHandle");
    assert_eq!(
        variant_of(dpkit_data__object_free(ObjectHandle::NULL)),
        "NullArgument"
    );
}

#[test]
fn error_records_free_exactly_once() {
    let ty = CString::new("f64").unwrap();
    let FfiResult::Err(err) = dpkit_data__slice_as_object(std::ptr::null(), ty.as_ptr()) else {
        panic!("null slice accepted");
    };
    assert!(dpkit_core__error_free(err));
    assert!(!dpkit_core__error_free(err));
    assert!(!dpkit_core__error_free(std::ptr::null_mut::<FfiError>()));
}

#[test]
fn wrong_length_and_unknown_types_are_rejected() {
    let input = [1.0_f64, 2.0];
    let ty = CString::new("f64").unwrap();
    let slice = FfiSlice::new(input.as_ptr().cast(), 2);
    assert_eq!(
        variant_of(dpkit_data__slice_as_object(&slice, ty.as_ptr())),
        "LengthMismatch"
    );
    let ty = CString::new("Vec<f128>").unwrap();
    assert_eq!(
        variant_of(dpkit_data__slice_as_object(&slice, ty.as_ptr())),
        "InvalidType"
    );
}

#[test]
fn bounded_sum_through_the_c_abi() {
    let t = CString::new("f64").unwrap();
    let (lower, upper) = (0.0_f64, 10.0_f64);
    let sum = ok(dpkit_trans__make_bounded_sum(
        (&lower as *const f64).cast::<c_void>(),
        (&upper as *const f64).cast::<c_void>(),
        t.as_ptr(),
    ));
    assert_eq!(
        take_string(ok(dpkit_core__transformation_input_type(sum))),
        "Vec<f64>"
    );

    let data = f64s(&[1.0, 2.0, 3.0]);
    let out = ok(dpkit_core__transformation_invoke(sum, data));
    assert_eq!(read_f64(out), 6.0);
    assert_eq!(take_string(ok(dpkit_data__to_string(out))), "6.0");

    let d_in = scalar(1_u32, "u32");
    let d_out = ok(dpkit_core__transformation_map(sum, d_in));
    assert_eq!(read_f64(d_out), 10.0);
    assert!(ok(dpkit_core__transformation_check(sum, d_in, d_out)));

    for object in [data, out, d_in, d_out] {
        ok(dpkit_data__object_free(object));
    }
    ok(dpkit_core__transformation_free(sum));
    assert_eq!(
        variant_of(dpkit_core__transformation_invoke(sum, data)),
        "InvalidHandle"
    );
}

#[test]
fn mean_then_laplace_through_the_c_abi() {
    let (t, mi) = (CString::new("f64").unwrap(), CString::new("SymmetricDistance").unwrap());
    let (lower, upper) = (0.0_f64, 10.0_f64);
    let mean = ok(dpkit_trans__make_bounded_mean(
        (&lower as *const f64).cast(),
        (&upper as *const f64).cast(),
        10,
        mi.as_ptr(),
        t.as_ptr(),
    ));
    let laplace = ok(dpkit_meas__make_base_laplace(0.5, t.as_ptr()));
    let release = ok(dpkit_core__make_chain_mt(laplace, mean));

    let d_in = scalar(1_u32, "u32");
    let (enough, short) = (scalar(1.0_f64, "f64"), scalar(0.999_f64, "f64"));
    assert!(ok(dpkit_core__measurement_check(release, d_in, enough)));
    assert!(!ok(dpkit_core__measurement_check(release, d_in, short)));

    let data = f64s(&[5.0; 10]);
    let noisy = ok(dpkit_core__measurement_invoke(release, data));
    assert!(read_f64(noisy).is_finite());

    for object in [d_in, enough, short, data, noisy] {
        ok(dpkit_data__object_free(object));
    }
    for measurement in [release, laplace] {
        ok(dpkit_core__measurement_free(measurement));
    }
    ok(dpkit_core__transformation_free(mean));
}

#[test]
fn mismatched_chain_is_a_domain_mismatch() {
    let t = CString::new("f64").unwrap();
    let count = ok(dpkit_trans__make_count(t.as_ptr()));
    let (lower, upper) = (0.0_f64, 1.0_f64);
    let sum = ok(dpkit_trans__make_bounded_sum(
        (&lower as *const f64).cast(),
        (&upper as *const f64).cast(),
        t.as_ptr(),
    ));
    assert_eq!(
        variant_of(dpkit_core__make_chain_tt(sum, count)),
        "DomainMismatch"
    );
    ok(dpkit_core__transformation_free(count));
    ok(dpkit_core__transformation_free(sum));
}

/// Log sink shared with a thread-local subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_warnings(body: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, body);
    let logs = captured.0.lock().clone();
    String::from_utf8(logs).unwrap()
}

#[test]
fn rejected_checks_log_a_warning() {
    let t = CString::new("f64").unwrap();
    let logs = capture_warnings(|| {
        let laplace = ok(dpkit_meas__make_base_laplace(1.0, t.as_ptr()));
        let (lower, upper) = (0.0_f64, 1.0_f64);
        let clamp = ok(dpkit_trans__make_clamp_scalar(
            (&lower as *const f64).cast(),
            (&upper as *const f64).cast(),
            t.as_ptr(),
        ));
        let (d_in, d_out) = (scalar(1.0_f64, "f64"), scalar(0.5_f64, "f64"));
        assert!(!ok(dpkit_core__measurement_check(laplace, d_in, d_out)));
        assert!(!ok(dpkit_core__transformation_check(clamp, d_in, d_out)));
        assert!(ok(dpkit_core__measurement_check(laplace, d_in, d_in)));

        for object in [d_in, d_out] {
            ok(dpkit_data__object_free(object));
        }
        ok(dpkit_core__measurement_free(laplace));
        ok(dpkit_core__transformation_free(clamp));
    });
    assert!(logs.contains("privacy check rejected"), "{logs}");
    assert!(logs.contains("stability check rejected"), "{logs}");
    assert_eq!(logs.matches("check rejected").count(), 2);
}

#[test]
fn categories_cross_as_an_object() {
    let words = ["a", "b"].map(|w| CString::new(w).unwrap());
    let pointers = words.each_ref().map(|w| w.as_ptr());
    let ty = CString::new("Vec<String>").unwrap();
    let categories = ok(dpkit_data__slice_as_object(
        &FfiSlice::new(pointers.as_ptr().cast(), pointers.len()),
        ty.as_ptr(),
    ));
    let names = ["SymmetricDistance", "L1Distance<f64>", "String", "f64"]
        .map(|name| CString::new(name).unwrap());
    let histogram = ok(dpkit_trans__make_count_by_categories(
        categories,
        names[0].as_ptr(),
        names[1].as_ptr(),
        names[2].as_ptr(),
        names[3].as_ptr(),
    ));
    ok(dpkit_data__object_free(categories));

    let records = ["b", "z", "b"].map(|w| CString::new(w).unwrap());
    let pointers = records.each_ref().map(|w| w.as_ptr());
    let data = ok(dpkit_data__slice_as_object(
        &FfiSlice::new(pointers.as_ptr().cast(), pointers.len()),
        ty.as_ptr(),
    ));
    let counts = ok(dpkit_core__transformation_invoke(histogram, data));
    assert_eq!(
        take_string(ok(dpkit_data__to_string(counts))),
        "[0.0, 2.0, 1.0]"
    );

    for object in [data, counts] {
        ok(dpkit_data__object_free(object));
    }
    ok(dpkit_core__transformation_free(histogram));
}

#[test]
fn postprocessing_keeps_the_privacy_map() {
    let t = CString::new("f64").unwrap();
    let laplace = ok(dpkit_meas__make_base_laplace_vec(1.0, t.as_ptr()));
    let (lower, upper) = (0.0_f64, 10.0_f64);
    let clamp = ok(dpkit_trans__make_clamp(
        (&lower as *const f64).cast(),
        (&upper as *const f64).cast(),
        t.as_ptr(),
    ));
    let clamped = ok(dpkit_core__make_postprocess(clamp, laplace));
    let d_in = scalar(1.0_f64, "f64");
    assert_eq!(read_f64(ok(dpkit_core__measurement_map(clamped, d_in))), 1.0);

    let data = f64s(&[100.0, -100.0]);
    let released = ok(dpkit_core__measurement_invoke(clamped, data));
    assert_eq!(take_string(ok(dpkit_data__to_string(released))), "[10.0, 0.0]");
    assert_eq!(variant_of(dpkit_core__make_postprocess(clamp, clamped)), "DomainMismatch");

    for object in [d_in, data, released] {
        ok(dpkit_data__object_free(object));
    }
    for measurement in [laplace, clamped] {
        ok(dpkit_core__measurement_free(measurement));
    }
    ok(dpkit_core__transformation_free(clamp));
}

#[test]
fn bootstrap_describes_the_surface() {
    let manifest = take_string(ok(dpkit_core__bootstrap()));
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(json["name"], "dpkit");
    let symbols: Vec<&str> = json["modules"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|m| m["functions"].as_array().unwrap())
        .map(|f| f["symbol"].as_str().unwrap())
        .collect();
    assert!(symbols.contains(&"dpkit_data__slice_as_object"));
    assert!(symbols.contains(&"dpkit_meas__make_base_gaussian_vec"));
    for symbol in [
        "dpkit_core__make_postprocess",
        "dpkit_trans__make_clamp_scalar",
        "dpkit_trans__make_cast_vec",
        "dpkit_trans__make_count_by_categories",
        "dpkit_trans__make_count_by",
    ] {
        assert!(symbols.contains(&symbol), "{symbol}");
    }
}

/// Lift `items` as `ty`, lower it, lift the lowered slice again and copy the
/// second object's payload back out.
fn relift<T: Copy>(items: &[T], ty: &str) -> Vec<T> {
    let ty = CString::new(ty).unwrap();
    let first = ok(dpkit_data__slice_as_object(
        &FfiSlice::new(items.as_ptr().cast(), items.len()),
        ty.as_ptr(),
    ));
    let lowered = ok(dpkit_data__object_as_slice(first));
    let second = ok(dpkit_data__slice_as_object(lowered, ty.as_ptr()));
    let back = ok(dpkit_data__object_as_slice(second));
    let out = unsafe {
        if (*back).len == 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts((*back).ptr.cast::<T>(), (*back).len).to_vec()
        }
    };
    for slice in [lowered, back] {
        ok(dpkit_data__slice_free(slice));
    }
    for object in [first, second] {
        ok(dpkit_data__object_free(object));
    }
    out
}

fn any_f64() -> impl Strategy<Value = f64> {
    any::<u64>().prop_map(f64::from_bits)
}

fn bits(items: &[f64]) -> Vec<u64> {
    items.iter().map(|item| item.to_bits()).collect()
}

proptest! {
    #[test]
    fn f64_vectors_survive_the_boundary(items in proptest::collection::vec(any_f64(), 0..64)) {
        prop_assert_eq!(bits(&relift(&items, "Vec<f64>")), bits(&items));
    }

    #[test]
    fn f64_scalars_survive_the_boundary(item in any_f64()) {
        prop_assert_eq!(bits(&relift(&[item], "f64")), bits(&[item]));
    }

    #[test]
    fn integer_vectors_survive_the_boundary(
        narrow in proptest::collection::vec(any::<i32>(), 0..64),
        wide in proptest::collection::vec(any::<i64>(), 0..64),
    ) {
        prop_assert_eq!(relift(&narrow, "Vec<i32>"), narrow);
        prop_assert_eq!(relift(&wide, "Vec<i64>"), wide);
    }
}

#[test]
fn special_floats_keep_their_bits() {
    let specials = [
        -0.0,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::MIN_POSITIVE / 4.0,
        f64::from_bits(0x7ff8_0000_0000_0001),
        f64::from_bits(0xfff0_0000_dead_beef),
    ];
    assert_eq!(bits(&relift(&specials, "Vec<f64>")), bits(&specials));
}
