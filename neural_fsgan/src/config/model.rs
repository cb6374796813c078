//! Network configuration for the reference generator and critic.

use burn::config::Config;

use fsgan_core::VolumeShape;

use crate::error::FsGanError;

/// Configuration of the generator and critic networks.
///
/// The generator is a stack of same-size 3D convolutions whose output is added
/// to its input (residual identity); the critic is a stack of strided 3D
/// convolutions followed by global average pooling and a dense output unit.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Spatial size `[depth, height, width]` of every volume.
    pub image_size: [usize; 3],

    /// Channels per voxel.
    #[config(default = 1)]
    pub n_channels: usize,

    /// Filters in every hidden generator convolution.
    #[config(default = 16)]
    pub gen_filters: usize,

    /// Hidden generator convolutions between the input and output layers.
    #[config(default = 2)]
    pub gen_hidden_layers: usize,

    /// Add the source volume to the generator output.
    #[config(default = true)]
    pub residual: bool,

    /// Filters in the first critic convolution; doubled at every layer.
    #[config(default = 8)]
    pub critic_filters: usize,

    /// Number of strided critic convolutions.
    #[config(default = 3)]
    pub critic_layers: usize,

    /// Insert batch normalization after hidden convolutions.
    #[config(default = false)]
    pub batch_normalization: bool,

    /// Feed a noise vector to the generator as an extra input channel.
    #[config(default = false)]
    pub use_noise: bool,

    /// Length of the per-sample noise vector.
    #[config(default = 10)]
    pub noise_dim: usize,

    /// Negative slope of the leaky ReLU activations.
    #[config(default = 0.2)]
    pub leaky_slope: f64,
}

impl ModelConfig {
    /// Shape of one volume.
    pub fn volume_shape(&self) -> VolumeShape {
        let [depth, height, width] = self.image_size;
        VolumeShape::new(depth, height, width, self.n_channels)
    }

    /// Shape of the noise tensor for a batch, if noise is enabled.
    pub fn noise_shape(&self, batch_size: usize) -> Option<[usize; 2]> {
        self.use_noise.then_some([batch_size, self.noise_dim])
    }

    /// Check a caller-supplied noise vector against the configuration.
    pub fn check_noise(&self, noise: Option<&[f32]>) -> crate::error::Result<()> {
        match (self.use_noise, noise) {
            (true, Some(values)) if values.len() != self.noise_dim => {
                Err(FsGanError::invalid_config(format!(
                    "noise vector has {} values but the generator expects {}",
                    values.len(),
                    self.noise_dim
                )))
            }
            (true, None) => Err(FsGanError::invalid_config(
                "generator takes a noise input but no noise was supplied",
            )),
            (false, Some(_)) => Err(FsGanError::invalid_config(
                "noise was supplied but the generator takes no noise input",
            )),
            _ => Ok(()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.image_size.iter().any(|&d| d == 0) {
            return Err(FsGanError::invalid_config(format!(
                "image_size must be positive, got {:?}",
                self.image_size
            )));
        }
        if self.n_channels == 0 {
            return Err(FsGanError::invalid_config("n_channels must be positive"));
        }
        if self.gen_filters == 0 || self.critic_filters == 0 {
            return Err(FsGanError::invalid_config(
                "gen_filters and critic_filters must be positive",
            ));
        }
        if self.critic_layers == 0 {
            return Err(FsGanError::invalid_config("critic_layers must be positive"));
        }
        if self.use_noise && self.noise_dim == 0 {
            return Err(FsGanError::invalid_config(
                "noise_dim must be positive when use_noise is set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_config() {
        let config = ModelConfig::new([8, 10, 8]);
        assert!(config.validate().is_ok());
        assert_eq!(config.volume_shape(), VolumeShape::new(8, 10, 8, 1));
        assert_eq!(config.noise_shape(2), None);
    }

    #[test]
    fn test_noise_checks() {
        let config = ModelConfig::new([4, 4, 4])
            .with_use_noise(true)
            .with_noise_dim(3);

        assert_eq!(config.noise_shape(2), Some([2, 3]));
        assert!(config.check_noise(Some(&[0.0, 0.0, 0.0])).is_ok());
        assert!(matches!(
            config.check_noise(Some(&[0.0; 10])),
            Err(FsGanError::InvalidConfig { .. })
        ));
        assert!(config.check_noise(None).is_err());

        let plain = ModelConfig::new([4, 4, 4]);
        assert!(plain.check_noise(None).is_ok());
        assert!(plain.check_noise(Some(&[0.0])).is_err());
    }

    #[test]
    fn test_invalid_model_config() {
        assert!(ModelConfig::new([0, 4, 4]).validate().is_err());
        assert!(ModelConfig::new([4, 4, 4])
            .with_use_noise(true)
            .with_noise_dim(0)
            .validate()
            .is_err());
    }
}
