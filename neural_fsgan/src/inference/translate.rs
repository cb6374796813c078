//! Inference-only generator.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;

use fsgan_io::Volume;

use crate::config::ModelConfig;
use crate::error::{FsGanError, Result};
use crate::nn::Generator;
use crate::training::{load_generator, tensor_to_volumes, volumes_to_tensor};

/// A generated volume and its voxelwise difference from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Generator output.
    pub generated: Volume,
    /// `generated - source`.
    pub difference: Volume,
}

/// Translates single source volumes with a trained generator.
///
/// Holds no training state; `translate` is a pure function of the restored
/// parameters, the source volume, and the noise vector.
#[derive(Debug)]
pub struct ImageTranslator<B: Backend> {
    model: ModelConfig,
    generator: Generator<B>,
    device: B::Device,
}

impl<B: Backend> ImageTranslator<B> {
    /// Wrap an already-loaded generator.
    pub fn new(model: ModelConfig, generator: Generator<B>, device: &B::Device) -> Result<Self> {
        model.validate()?;
        if generator.uses_noise() != model.use_noise
            || (model.use_noise && generator.noise_dim() != model.noise_dim)
        {
            return Err(FsGanError::invalid_config(
                "generator noise input does not match the model configuration",
            ));
        }
        Ok(Self {
            model,
            generator,
            device: device.clone(),
        })
    }

    /// Restore the generator of the checkpoint in `dir`.
    pub fn from_checkpoint(model: ModelConfig, dir: &Path, device: &B::Device) -> Result<Self> {
        model.validate()?;
        let generator = load_generator(dir, &model, device)?;
        Self::new(model, generator, device)
    }

    /// Model configuration.
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Translate one volume.
    ///
    /// `noise` must be given exactly when the model takes a noise input, with
    /// `noise_dim` values.
    pub fn translate(&self, source: &Volume, noise: Option<&[f32]>) -> Result<Translation> {
        let shape = self.model.volume_shape();
        if source.shape() != shape {
            return Err(FsGanError::invalid_config(format!(
                "source volume is {:?} but the model expects {:?}",
                source.shape(),
                shape
            )));
        }
        self.model.check_noise(noise)?;

        let input = volumes_to_tensor::<B>(source.data().to_vec(), shape, 1, &self.device);
        let noise = noise.map(|values| {
            Tensor::<B, 2>::from_data(TensorData::new(values.to_vec(), [1, values.len()]), &self.device)
        });
        let output = self.generator.forward(input, noise);

        let data = tensor_to_volumes(output)?
            .into_iter()
            .next()
            .ok_or_else(|| FsGanError::TensorData("generator returned an empty batch".to_string()))?;
        let generated = Volume::new(shape, data)?.with_spacing(source.spacing());
        let difference = generated.difference(source)?;

        Ok(Translation {
            generated,
            difference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use fsgan_core::VolumeShape;

    type TestBackend = NdArray;

    fn translator(model: ModelConfig) -> ImageTranslator<TestBackend> {
        let device = Default::default();
        let generator = model.init_generator::<TestBackend>(&device);
        ImageTranslator::new(model, generator, &device).unwrap()
    }

    fn source() -> Volume {
        let data = (0..8).map(|i| i as f32 / 8.0).collect();
        Volume::new(VolumeShape::new(2, 2, 2, 1), data)
            .unwrap()
            .with_spacing([1.0, 1.5, 2.0])
    }

    #[test]
    fn test_difference_is_generated_minus_source() {
        let translator = translator(ModelConfig::new([2, 2, 2]));
        let source = source();
        let out = translator.translate(&source, None).unwrap();

        assert_eq!(out.generated.shape(), source.shape());
        assert_eq!(out.generated.spacing(), [1.0, 1.5, 2.0]);
        for ((d, g), s) in out.difference.data().iter().zip(out.generated.data()).zip(source.data()) {
            assert!((d - (g - s)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_translation_is_deterministic() {
        let model = ModelConfig::new([2, 2, 2]).with_use_noise(true).with_noise_dim(3);
        let translator = translator(model);
        let noise = [0.5, -0.5, 0.0];

        let a = translator.translate(&source(), Some(&noise)).unwrap();
        let b = translator.translate(&source(), Some(&noise)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_noise_mismatch_rejected() {
        let model = ModelConfig::new([2, 2, 2]).with_use_noise(true).with_noise_dim(3);
        let translator = translator(model);

        let err = translator.translate(&source(), Some(&[0.0; 4])).unwrap_err();
        assert!(matches!(err, FsGanError::InvalidConfig { .. }));
        assert!(translator.translate(&source(), None).is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let translator = translator(ModelConfig::new([4, 4, 4]));
        assert!(translator.translate(&source(), None).is_err());
    }

    #[test]
    fn test_generator_config_mismatch() {
        let device = Default::default();
        let generator = ModelConfig::new([2, 2, 2]).init_generator::<TestBackend>(&device);
        let model = ModelConfig::new([2, 2, 2]).with_use_noise(true);
        assert!(ImageTranslator::new(model, generator, &device).is_err());
    }
}
