#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model with lens distortion.
pub mod camera;

/// I/O utilities for reading and writing point clouds and interchange records.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// Rendering of point clouds into images and 3D to 2D correspondences.
pub mod projection;

/// Nearest-neighbour propagation of class labels onto point clouds.
pub mod recolor;

/// Point-in-region classification of correspondences against 2D detections.
pub mod segmentation;

/// 3D transforms algorithms.
pub mod transforms;
