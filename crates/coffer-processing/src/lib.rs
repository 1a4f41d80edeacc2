//! Coffer Processing Library
//!
//! Content classification of uploaded bytes and normalization of uploaded
//! images. Nothing in this crate touches the disk except
//! [`image::dimensions_of`], which only reads an image header.

pub mod classifier;
#[cfg(feature = "image")]
pub mod image;

pub use classifier::{classify, classify_image, extension_for_mime, sniff, ImageKind, VerifiedType};
#[cfg(feature = "image")]
pub use crate::image::{dimensions_of, normalize, NormalizedImage};
