//! Field-strength labelled datasets described by a JSON manifest.
//!
//! ```text
//! {
//!   "image_size": [64, 80, 64],
//!   "n_channels": 1,
//!   "images": [
//!     { "path": "subj01_15T.nii.gz", "field_strength": 1.5, "split": "train" },
//!     { "path": "subj02_3T.nii.gz",  "field_strength": 3.0, "split": "validation" }
//!   ]
//! }
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fsgan_core::{DomainPartition, ImageCollection, VolumeShape};

use crate::error::Result;
use crate::format::nifti::{load_volume, shape_mismatch, Volume};

/// Dataset split an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Used for critic and generator updates.
    Train,
    /// Used for validation losses and best-checkpoint selection.
    Validation,
    /// Held out; used for generation.
    Test,
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path to a NIfTI volume.
    pub path: PathBuf,
    /// Scanner field strength in tesla.
    pub field_strength: f32,
    /// Split membership.
    pub split: Split,
}

/// Dataset manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Spatial size `[depth, height, width]` every volume must have.
    pub image_size: [usize; 3],
    /// Channels per voxel.
    #[serde(default = "default_channels")]
    pub n_channels: usize,
    /// Image entries.
    pub images: Vec<ManifestEntry>,
}

fn default_channels() -> usize {
    1
}

impl Manifest {
    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Shape every volume in the dataset must have.
    pub fn volume_shape(&self) -> VolumeShape {
        VolumeShape::new(
            self.image_size[0],
            self.image_size[1],
            self.image_size[2],
            self.n_channels,
        )
    }
}

/// Images and labels for one split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData {
    /// The volumes.
    pub images: ImageCollection,
    /// Field strength per volume.
    pub field_strengths: Vec<f32>,
}

impl SplitData {
    /// Create an empty split for volumes of `shape`.
    pub fn new(shape: VolumeShape) -> Self {
        Self {
            images: ImageCollection::new(shape),
            field_strengths: Vec::new(),
        }
    }

    /// Append a labelled volume.
    pub fn push(&mut self, volume: &Volume, field_strength: f32) -> Result<()> {
        if volume.shape() != self.images.shape() {
            return Err(shape_mismatch(self.images.shape(), volume.shape()));
        }
        self.images.push(volume.data());
        self.field_strengths.push(field_strength);
        Ok(())
    }

    /// Split the images into source and target domains by field strength.
    pub fn partition(&self, source: f32, target: f32) -> DomainPartition {
        DomainPartition::from_field_strengths(&self.field_strengths, source, target)
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the split is empty.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// A dataset with train, validation, and test splits.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStrengthDataset {
    /// Training split.
    pub train: SplitData,
    /// Validation split.
    pub validation: SplitData,
    /// Test split.
    pub test: SplitData,
}

impl FieldStrengthDataset {
    /// Create an empty dataset for volumes of `shape`.
    pub fn new(shape: VolumeShape) -> Self {
        Self {
            train: SplitData::new(shape),
            validation: SplitData::new(shape),
            test: SplitData::new(shape),
        }
    }

    /// Borrow one split.
    pub fn split(&self, split: Split) -> &SplitData {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    /// Mutably borrow one split.
    pub fn split_mut(&mut self, split: Split) -> &mut SplitData {
        match split {
            Split::Train => &mut self.train,
            Split::Validation => &mut self.validation,
            Split::Test => &mut self.test,
        }
    }

    /// Shape shared by every volume.
    pub fn volume_shape(&self) -> VolumeShape {
        self.train.images.shape()
    }
}

/// Load every volume listed in the manifest at `path`.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<FieldStrengthDataset> {
    let path = path.as_ref();
    let manifest = Manifest::from_json(&fs::read_to_string(path)?)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut dataset = FieldStrengthDataset::new(manifest.volume_shape());
    for entry in &manifest.images {
        let volume_path = if entry.path.is_relative() {
            base.join(&entry.path)
        } else {
            entry.path.clone()
        };
        let volume = load_volume(&volume_path)?;
        dataset
            .split_mut(entry.split)
            .push(&volume, entry.field_strength)?;
        log::debug!(
            "Loaded {:?} ({:.1} T, {:?})",
            volume_path,
            entry.field_strength,
            entry.split
        );
    }

    log::info!(
        "Loaded dataset {:?}: {} train, {} validation, {} test images",
        path,
        dataset.train.len(),
        dataset.validation.len(),
        dataset.test.len()
    );

    Ok(dataset)
}
