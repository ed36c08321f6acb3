//! Measurement constructors.

pub mod gaussian;
pub mod geometric;
pub mod laplace;

pub use gaussian::{make_base_gaussian, make_base_gaussian_vec};
pub use geometric::make_base_geometric;
pub use laplace::{make_base_laplace, make_base_laplace_vec};

use crate::error::Fallible;

pub(crate) fn check_scale(scale: f64) -> Fallible<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return fallible!(NumericDomainError, "scale must be finite and positive, found {scale}");
    }
    Ok(())
}
