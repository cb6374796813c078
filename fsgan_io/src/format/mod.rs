//! NIfTI-1 volume format support.
//!
//! Only the single-file little-endian variant is handled: a 348-byte header,
//! a 4-byte extension flag, then voxel data. Compressed files (`.nii.gz`) are
//! plain gzip streams of the same layout.

pub mod header;
pub mod nifti;

pub use header::{Datatype, NiftiHeader, HEADER_SIZE, NIFTI_MAGIC, VOX_OFFSET};
pub use nifti::{load_volume, read_nifti, save_volume, write_nifti, Volume};
