use dpkit_core::meas::{make_base_gaussian, make_base_laplace};
use dpkit_core::trans::{make_bounded_sum, make_clamp};
use dpkit_core::{make_chain_mt, make_chain_tt, make_composition, AnyObject, NoiseSource};
use proptest::prelude::*;

proptest! {
    #[test]
    fn laplace_check_is_monotone_in_d_out(
        scale in 0.01_f64..100.0,
        d_in in 0.0_f64..50.0,
        d_out in 0.0_f64..1_000.0,
        slack in 0.0_f64..10.0,
    ) {
        let m = make_base_laplace::<f64>(scale, NoiseSource::Seeded(0)).unwrap();
        let d_in = AnyObject::of(d_in);
        if m.check(&d_in, &AnyObject::of(d_out)).unwrap() {
            prop_assert!(m.check(&d_in, &AnyObject::of(d_out + slack)).unwrap());
        }
    }

    #[test]
    fn check_agrees_with_the_minimal_bound(
        scale in 0.1_f64..10.0,
        d_in in 0_u32..100,
    ) {
        let m = make_base_gaussian::<f64>(scale, NoiseSource::Seeded(0)).unwrap();
        let d_in = AnyObject::of(d_in as f64);
        let minimal = m.map(&d_in).unwrap();
        prop_assert!(m.check(&d_in, &minimal).unwrap());
        let below = minimal.value().as_f64().unwrap() * 0.99;
        if below > 0.0 {
            prop_assert!(!m.check(&d_in, &AnyObject::of(below)).unwrap());
        }
    }

    #[test]
    fn chained_function_equals_nested_invocation(
        data in prop::collection::vec(-100.0_f64..100.0, 0..64),
        bound in 1.0_f64..50.0,
    ) {
        let clamp = make_clamp::<f64>(-bound, bound).unwrap();
        let sum = make_bounded_sum::<f64>(-bound, bound).unwrap();
        let chained = make_chain_tt(&sum, &clamp).unwrap();
        let input = AnyObject::vec(data);
        let nested = sum.invoke(&clamp.invoke(&input).unwrap()).unwrap();
        prop_assert_eq!(chained.invoke(&input).unwrap(), nested);
    }

    #[test]
    fn composition_never_under_reports(
        s0 in 0.1_f64..10.0,
        s1 in 0.1_f64..10.0,
        d_in in 0_u32..20,
    ) {
        let sum = make_bounded_sum::<f64>(0.0, 1.0).unwrap();
        let laplace0 = make_base_laplace::<f64>(s0, NoiseSource::Seeded(0)).unwrap();
        let laplace1 = make_base_laplace::<f64>(s1, NoiseSource::Seeded(1)).unwrap();
        let m0 = make_chain_mt(&laplace0, &sum).unwrap();
        let m1 = make_chain_mt(&laplace1, &sum).unwrap();
        let both = make_composition(&m0, &m1).unwrap();
        let d_in = AnyObject::of(d_in);
        let parts = m0.map(&d_in).unwrap().value().as_f64().unwrap()
            + m1.map(&d_in).unwrap().value().as_f64().unwrap();
        prop_assert!(both.map(&d_in).unwrap().value().as_f64().unwrap() >= parts);
    }
}
