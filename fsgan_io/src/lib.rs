//! fsgan_io - volumetric image files and labelled datasets.
//!
//! This crate is the storage layer of the field-strength translation
//! workspace: it reads and writes NIfTI-1 volumes (plain or gzip-compressed)
//! and loads manifest-described datasets into the in-memory
//! [`fsgan_core::ImageCollection`] used by the trainer.
//!
//! # Core Types
//!
//! - [`Volume`]: one scan in C order with voxel spacing
//! - [`FieldStrengthDataset`]: train / validation / test splits with labels
//! - [`Manifest`]: the JSON description of a dataset
//!
//! # Example
//!
//! ```ignore
//! use fsgan_io::{load_dataset, Split};
//!
//! let dataset = load_dataset("data/manifest.json")?;
//! let partition = dataset.split(Split::Train).partition(1.5, 3.0);
//! println!("{} source images", partition.source().len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod error;
pub mod format;

pub use dataset::{load_dataset, FieldStrengthDataset, Manifest, ManifestEntry, Split, SplitData};
pub use error::{Result, VolumeIoError};
pub use format::{load_volume, read_nifti, save_volume, write_nifti, NiftiHeader, Volume};

pub use fsgan_core::{DomainPartition, ImageCollection, VolumeShape};
