//! Transformation constructors.

pub mod cast;
pub mod clamp;
pub mod count;
pub mod identity;
pub mod mean;
pub mod sum;

pub use cast::make_cast_vec;
pub use clamp::{make_clamp, make_clamp_scalar};
pub use count::{make_count, make_count_by, make_count_by_categories};
pub use identity::make_identity;
pub use mean::make_bounded_mean;
pub use sum::make_bounded_sum;
