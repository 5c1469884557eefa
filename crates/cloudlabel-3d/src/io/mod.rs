/// PLY point cloud reader and writer.
pub mod ply;

/// JSON interchange records between the pipeline stages.
pub mod records;
