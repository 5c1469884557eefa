mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

use crate::pointcloud::PointCloudError;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file.
    #[error("Failed to read or write PLY file")]
    Io(#[from] std::io::Error),

    /// The header is not a valid PLY header.
    #[error("Invalid PLY header: {0}")]
    InvalidHeader(String),

    /// The storage format is not one we can read.
    #[error("Unsupported PLY format '{0}'")]
    UnsupportedFormat(String),

    /// A property type or layout that cannot be decoded.
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// The vertex element lacks a required property.
    #[error("PLY vertex element has no '{0}' property")]
    MissingProperty(&'static str),

    /// A vertex record could not be decoded.
    #[error("Malformed PLY vertex {index}: {reason}")]
    MalformedVertex {
        /// Index of the vertex in the file.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// The decoded attributes do not form a valid point cloud.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),
}
