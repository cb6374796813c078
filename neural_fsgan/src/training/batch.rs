//! Minibatch sampling of volumes into tensors.

use burn::prelude::*;
use burn::tensor::{Distribution, TensorData};
use rand::rngs::StdRng;
use rand::Rng;

use fsgan_core::{DomainPartition, ImageCollection, IndexSampler, VolumeShape};

use crate::error::{FsGanError, Result};

/// A batch of source and target volumes, `[batch, depth, height, width, channels]` each.
#[derive(Debug, Clone)]
pub struct BatchPair<B: Backend> {
    /// Source-domain volumes.
    pub source: Tensor<B, 5>,
    /// Target-domain volumes.
    pub target: Tensor<B, 5>,
}

/// Endless sampler of volume batches from one domain.
#[derive(Debug, Clone)]
pub struct VolumeSampler {
    indices: IndexSampler,
}

impl VolumeSampler {
    /// Create a sampler over `selection` with its own shuffling state.
    pub fn new(selection: &[usize], batch_size: usize, seed: u64) -> Result<Self> {
        Ok(Self {
            indices: IndexSampler::new(selection, batch_size, seed)?,
        })
    }

    /// Number of volumes per batch.
    pub fn batch_size(&self) -> usize {
        self.indices.batch_size()
    }

    /// Draw the next batch from `images`.
    pub fn next_batch<B: Backend>(
        &mut self,
        images: &ImageCollection,
        device: &B::Device,
    ) -> Result<Tensor<B, 5>> {
        let batch = self.indices.next_batch();
        let values = images.gather(&batch)?;
        Ok(volumes_to_tensor(values, images.shape(), batch.len(), device))
    }
}

/// Paired source / target samplers over a domain partition.
#[derive(Debug, Clone)]
pub struct DomainSamplers {
    source: VolumeSampler,
    target: VolumeSampler,
}

impl DomainSamplers {
    /// Create fresh samplers for both domains, seeded from `rng`.
    pub fn new(partition: &DomainPartition, batch_size: usize, rng: &mut StdRng) -> Result<Self> {
        Ok(Self {
            source: VolumeSampler::new(partition.source(), batch_size, rng.gen())?,
            target: VolumeSampler::new(partition.target(), batch_size, rng.gen())?,
        })
    }

    /// Draw one source batch and one target batch.
    pub fn next_pair<B: Backend>(
        &mut self,
        images: &ImageCollection,
        device: &B::Device,
    ) -> Result<BatchPair<B>> {
        Ok(BatchPair {
            source: self.source.next_batch(images, device)?,
            target: self.target.next_batch(images, device)?,
        })
    }
}

/// Build a `[batch, depth, height, width, channels]` tensor from contiguous
/// C-order volume data.
pub fn volumes_to_tensor<B: Backend>(
    values: Vec<f32>,
    shape: VolumeShape,
    batch_size: usize,
    device: &B::Device,
) -> Tensor<B, 5> {
    Tensor::from_data(TensorData::new(values, shape.batch_dims(batch_size)), device)
}

/// Split a `[batch, depth, height, width, channels]` tensor into per-volume
/// C-order data.
pub fn tensor_to_volumes<B: Backend>(tensor: Tensor<B, 5>) -> Result<Vec<Vec<f32>>> {
    let [batch, depth, height, width, channels] = tensor.dims();
    let per_volume = depth * height * width * channels;
    let values: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|err| FsGanError::TensorData(format!("{:?}", err)))?;

    Ok(values
        .chunks(per_volume.max(1))
        .take(batch)
        .map(<[f32]>::to_vec)
        .collect())
}

/// Uniform noise in `[-1, 1)` with the given `[batch, noise_dim]` shape.
pub fn uniform_noise<B: Backend>(shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
    Tensor::random(shape, Distribution::Uniform(-1.0, 1.0), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::SeedableRng;

    type TestBackend = NdArray;

    fn collection() -> ImageCollection {
        let shape = VolumeShape::new(1, 2, 2, 1);
        let data = (0..4).flat_map(|i| vec![i as f32; 4]).collect();
        ImageCollection::from_data(shape, data).unwrap()
    }

    #[test]
    fn test_volume_sampler_stays_in_selection() {
        let device = Default::default();
        let images = collection();
        let mut sampler = VolumeSampler::new(&[1, 3], 1, 7).unwrap();

        for _ in 0..10 {
            let batch = sampler.next_batch::<TestBackend>(&images, &device).unwrap();
            assert_eq!(batch.dims(), [1, 1, 2, 2, 1]);
            let value: Vec<f32> = batch.into_data().to_vec().unwrap();
            assert!(value[0] == 1.0 || value[0] == 3.0);
            assert!(value.iter().all(|&v| v == value[0]));
        }
    }

    #[test]
    fn test_domain_samplers() {
        let device = Default::default();
        let images = collection();
        let partition = DomainPartition::from_indices(vec![0, 2], vec![1, 3]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut samplers = DomainSamplers::new(&partition, 2, &mut rng).unwrap();

        let pair = samplers.next_pair::<TestBackend>(&images, &device).unwrap();
        let source: Vec<f32> = pair.source.into_data().to_vec().unwrap();
        let target: Vec<f32> = pair.target.into_data().to_vec().unwrap();
        assert!(source.iter().all(|&v| v == 0.0 || v == 2.0));
        assert!(target.iter().all(|&v| v == 1.0 || v == 3.0));
    }

    #[test]
    fn test_sampler_rejects_oversized_batch() {
        assert!(VolumeSampler::new(&[0], 2, 0).is_err());
    }

    #[test]
    fn test_tensor_volume_conversion() {
        let device = Default::default();
        let shape = VolumeShape::new(1, 1, 2, 1);
        let tensor = volumes_to_tensor::<TestBackend>(vec![1.0, 2.0, 3.0, 4.0], shape, 2, &device);

        let volumes = tensor_to_volumes(tensor).unwrap();
        assert_eq!(volumes, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_uniform_noise_range() {
        let device = Default::default();
        let noise = uniform_noise::<TestBackend>([4, 8], &device);
        let values: Vec<f32> = noise.into_data().to_vec().unwrap();
        assert_eq!(values.len(), 32);
        assert!(values.iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }
}
