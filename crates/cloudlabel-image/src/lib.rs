#![deny(missing_docs)]
//! Image types and drawing primitives used to render point cloud projections

/// image representation for computer vision purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// Drawing primitives on RGB images.
pub mod draw;

pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
