//! Noise samplers behind the measurement constructors.
//!
//! Every draw comes from a fresh [`ChaCha20Rng`]: seeded from OS entropy by
//! default, or from a fixed seed for deterministic replays.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Geometric, Normal};
use serde::{Deserialize, Serialize};

use crate::error::Fallible;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseSource {
    #[default]
    Entropy,
    Seeded(u64),
}

impl NoiseSource {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(NoiseSource::Entropy, NoiseSource::Seeded)
    }

    pub fn rng(&self) -> ChaCha20Rng {
        match self {
            NoiseSource::Entropy => ChaCha20Rng::from_entropy(),
            NoiseSource::Seeded(seed) => ChaCha20Rng::seed_from_u64(*seed),
        }
    }
}

/// One draw from Laplace(0, scale) by inverting the CDF.
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    let u: f64 = rng.gen::<f64>() - 0.5;
    let sign = if u >= 0.0 { 1.0 } else { -1.0 };
    let magnitude = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
    -scale * sign * magnitude.ln()
}

/// One draw from Normal(0, scale).
pub fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> Fallible<f64> {
    let normal = Normal::new(0.0, scale)
        .map_err(|err| err!(NumericDomainError, "gaussian scale {scale}: {err}"))?;
    Ok(normal.sample(rng))
}

/// Success probability of each one-sided draw behind [`sample_geometric`].
///
/// Fails once `scale` is so large that `1 - p` rounds to one: the one-sided
/// draws then saturate and their difference carries no noise.
pub fn geometric_probability(scale: f64) -> Fallible<f64> {
    let p = -(-1.0 / scale).exp_m1();
    if !(p > 0.0) || 1.0 - p == 1.0 {
        return fallible!(
            NumericDomainError,
            "geometric scale {scale} is too large to sample, p = {p}"
        );
    }
    Ok(p)
}

/// One draw from the two-sided geometric distribution with
/// `P(k) ∝ exp(-|k| / scale)`, as the difference of two one-sided draws.
pub fn sample_geometric<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> Fallible<i64> {
    let p = geometric_probability(scale)?;
    let geometric = Geometric::new(p)
        .map_err(|err| err!(NumericDomainError, "geometric scale {scale}: {err}"))?;
    let one_sided = |draw: u64| {
        i64::try_from(draw).map_err(|_| {
            err!(NumericDomainError, "geometric draw {draw} saturated at scale {scale}")
        })
    };
    let positive = one_sided(geometric.sample(rng))?;
    let negative = one_sided(geometric.sample(rng))?;
    Ok(positive - negative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn seeded_sources_replay() {
        let source = NoiseSource::Seeded(42);
        let a = sample_laplace(&mut source.rng(), 1.0);
        let b = sample_laplace(&mut source.rng(), 1.0);
        assert_eq!(a, b);
        assert!(a.is_finite());
    }

    #[test]
    fn laplace_draws_center_on_zero() {
        let mut rng = NoiseSource::Seeded(3).rng();
        let draws = 20_000;
        let mean = (0..draws).map(|_| sample_laplace(&mut rng, 1.0)).sum::<f64>() / draws as f64;
        assert!(mean.abs() < 0.1, "mean = {mean}");
    }

    #[test]
    fn geometric_draws_are_finite() {
        let mut rng = NoiseSource::Seeded(9).rng();
        for _ in 0..1_000 {
            let draw = sample_geometric(&mut rng, 2.0).unwrap();
            assert!(draw.abs() < 1_000);
        }
        assert!(sample_gaussian(&mut rng, -1.0).is_err());
    }

    #[test]
    fn geometric_rejects_scales_that_lose_the_noise() {
        let p = geometric_probability(1e15).unwrap();
        assert!(p > 0.0 && 1.0 - p < 1.0);
        for scale in [1e17, 1e300] {
            let err = geometric_probability(scale).unwrap_err();
            assert_eq!(err.kind, ErrorKind::NumericDomainError);
            let err = sample_geometric(&mut NoiseSource::Seeded(1).rng(), scale).unwrap_err();
            assert_eq!(err.kind, ErrorKind::NumericDomainError);
        }
    }
}
