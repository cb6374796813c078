//! Core data types: volume shapes, image collections, and domain partitions.

use crate::error::{CoreError, Result};

/// Tolerance used when matching field-strength labels.
pub const FIELD_STRENGTH_TOLERANCE: f32 = 1e-4;

/// Shape of a single volumetric image, channels last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeShape {
    /// Number of slices along the first spatial axis.
    pub depth: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of columns.
    pub width: usize,
    /// Channels per voxel.
    pub channels: usize,
}

impl VolumeShape {
    /// Create a new volume shape.
    #[inline]
    pub const fn new(depth: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            depth,
            height,
            width,
            channels,
        }
    }

    /// Create a single-channel shape from `[depth, height, width]`.
    #[inline]
    pub const fn from_spatial(size: [usize; 3]) -> Self {
        Self::new(size[0], size[1], size[2], 1)
    }

    /// Number of scalar values in one volume.
    #[inline]
    pub const fn num_values(&self) -> usize {
        self.depth * self.height * self.width * self.channels
    }

    /// Spatial dimensions `[depth, height, width]`.
    #[inline]
    pub const fn spatial(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// Dimensions of a batch of `batch_size` volumes:
    /// `[batch, depth, height, width, channels]`.
    #[inline]
    pub const fn batch_dims(&self, batch_size: usize) -> [usize; 5] {
        [batch_size, self.depth, self.height, self.width, self.channels]
    }
}

/// A dense collection of equally shaped volumes stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection {
    shape: VolumeShape,
    data: Vec<f32>,
}

impl ImageCollection {
    /// Create an empty collection for volumes of the given shape.
    pub fn new(shape: VolumeShape) -> Self {
        Self {
            shape,
            data: Vec::new(),
        }
    }

    /// Build a collection from contiguous data.
    ///
    /// The data length must be a multiple of the volume size.
    pub fn from_data(shape: VolumeShape, data: Vec<f32>) -> Option<Self> {
        let n = shape.num_values();
        if n == 0 || data.len() % n != 0 {
            return None;
        }
        Some(Self { shape, data })
    }

    /// Append one volume. Returns `false` if its length does not match the shape.
    pub fn push(&mut self, volume: &[f32]) -> bool {
        if volume.len() != self.shape.num_values() {
            return false;
        }
        self.data.extend_from_slice(volume);
        true
    }

    /// Shape shared by all volumes.
    #[inline]
    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Number of volumes.
    #[inline]
    pub fn len(&self) -> usize {
        match self.shape.num_values() {
            0 => 0,
            n => self.data.len() / n,
        }
    }

    /// Whether the collection holds no volumes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the volume at `index`.
    pub fn image(&self, index: usize) -> Option<&[f32]> {
        let n = self.shape.num_values();
        self.data.get(index * n..(index + 1) * n)
    }

    /// Gather the given volumes into one contiguous buffer in index order.
    pub fn gather(&self, indices: &[usize]) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(indices.len() * self.shape.num_values());
        for &index in indices {
            let volume = self.image(index).ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
            out.extend_from_slice(volume);
        }
        Ok(out)
    }

    /// Raw contiguous data.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Which side of the translation an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Images fed to the generator.
    Source,
    /// Images the critic treats as real.
    Target,
}

/// Two disjoint index sets into an image collection, one per domain.
///
/// Computed once from metadata labels and never changed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainPartition {
    source: Vec<usize>,
    target: Vec<usize>,
}

impl DomainPartition {
    /// Partition images by field-strength label.
    ///
    /// Images whose label matches neither field strength belong to no domain.
    pub fn from_field_strengths(labels: &[f32], source: f32, target: f32) -> Self {
        let mut partition = Self::default();
        for (i, &label) in labels.iter().enumerate() {
            if (label - source).abs() < FIELD_STRENGTH_TOLERANCE {
                partition.source.push(i);
            } else if (label - target).abs() < FIELD_STRENGTH_TOLERANCE {
                partition.target.push(i);
            }
        }
        partition
    }

    /// Build a partition from explicit index sets.
    ///
    /// Indices present in both sets are kept only on the source side.
    pub fn from_indices(source: Vec<usize>, mut target: Vec<usize>) -> Self {
        target.retain(|i| !source.contains(i));
        Self { source, target }
    }

    /// Indices for one domain.
    pub fn indices(&self, domain: Domain) -> &[usize] {
        match domain {
            Domain::Source => &self.source,
            Domain::Target => &self.target,
        }
    }

    /// Source-domain indices.
    #[inline]
    pub fn source(&self) -> &[usize] {
        &self.source
    }

    /// Target-domain indices.
    #[inline]
    pub fn target(&self) -> &[usize] {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_shape() {
        let shape = VolumeShape::from_spatial([4, 5, 6]);
        assert_eq!(shape.channels, 1);
        assert_eq!(shape.num_values(), 120);
        assert_eq!(shape.batch_dims(2), [2, 4, 5, 6, 1]);
    }

    #[test]
    fn test_collection_push_and_gather() {
        let shape = VolumeShape::new(1, 1, 2, 1);
        let mut images = ImageCollection::new(shape);
        assert!(images.push(&[0.0, 1.0]));
        assert!(images.push(&[2.0, 3.0]));
        assert!(!images.push(&[4.0]));

        assert_eq!(images.len(), 2);
        assert_eq!(images.image(1), Some(&[2.0, 3.0][..]));
        assert_eq!(images.gather(&[1, 0]).unwrap(), vec![2.0, 3.0, 0.0, 1.0]);
        assert_eq!(
            images.gather(&[2]),
            Err(CoreError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_collection_from_data_rejects_partial_volume() {
        let shape = VolumeShape::new(1, 2, 2, 1);
        assert!(ImageCollection::from_data(shape, vec![0.0; 8]).is_some());
        assert!(ImageCollection::from_data(shape, vec![0.0; 7]).is_none());
    }

    #[test]
    fn test_partition_from_field_strengths() {
        let labels = [1.5, 3.0, 1.5, 2.0, 3.0];
        let partition = DomainPartition::from_field_strengths(&labels, 1.5, 3.0);

        assert_eq!(partition.source(), &[0, 2]);
        assert_eq!(partition.target(), &[1, 4]);
        assert_eq!(partition.indices(Domain::Target), &[1, 4]);
    }

    #[test]
    fn test_partition_is_disjoint() {
        let partition = DomainPartition::from_indices(vec![0, 1], vec![1, 2]);
        assert_eq!(partition.source(), &[0, 1]);
        assert_eq!(partition.target(), &[2]);
    }
}
