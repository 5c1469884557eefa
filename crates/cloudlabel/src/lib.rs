#![deny(missing_docs)]
//! Semantic labeling of point clouds.
//!
//! A point cloud is rendered into an image through a calibrated camera, an external 2D
//! detector labels the image, and the labels are carried back onto the 3D points:
//!
//! 1. [`pipeline::project_cloud`] renders the cloud and records which pixel every point
//!    landed on.
//! 2. [`pipeline::classify_correspondences`] keeps the points falling inside a detection.
//! 3. [`pipeline::recolor_cloud`] paints the labeled points with one color per class.

#[doc(inline)]
pub use cloudlabel_image as image;

#[doc(inline)]
pub use cloudlabel_io as io;

#[doc(inline)]
pub use cloudlabel_3d as k3d;

/// Pipeline configuration loaded from JSON.
pub mod config;

/// File based entry points of the pipeline stages.
pub mod pipeline;
