//! Image normalization for the image upload path

mod normalizer;

pub use normalizer::{dimensions_of, extension_for, fit_within, normalize, NormalizedImage};
