//! Residual convolutional generator.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::leaky_relu;

use super::conv::ConvBlock;
use super::params::{abs_sum, half_square_sum, total, OwnedModule, Owner, ParamInventory, ParamKind};
use crate::config::ModelConfig;

impl ModelConfig {
    /// Initialize the generator.
    pub fn init_generator<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let [depth, height, width] = self.image_size;
        let noise_projection = self
            .use_noise
            .then(|| LinearConfig::new(self.noise_dim, depth * height * width).init(device));

        let channels_in = self.n_channels + usize::from(self.use_noise);
        let input = ConvBlock::new(channels_in, self.gen_filters, 1, false, device);
        let hidden = (0..self.gen_hidden_layers)
            .map(|_| {
                ConvBlock::new(
                    self.gen_filters,
                    self.gen_filters,
                    1,
                    self.batch_normalization,
                    device,
                )
            })
            .collect();
        let output = ConvBlock::new(self.gen_filters, self.n_channels, 1, false, device);

        Generator {
            noise_projection,
            input,
            hidden,
            output,
            residual: self.residual,
            noise_dim: self.noise_dim,
            leaky_slope: self.leaky_slope,
        }
    }
}

/// Translates source-domain volumes into the target domain.
///
/// With `residual` set the network predicts a correction that is added to its
/// input. An optional noise vector is projected to one extra input channel.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    noise_projection: Option<Linear<B>>,
    input: ConvBlock<B>,
    hidden: Vec<ConvBlock<B>>,
    output: ConvBlock<B>,
    residual: bool,
    noise_dim: usize,
    leaky_slope: f64,
}

impl<B: Backend> Generator<B> {
    /// Whether the generator takes a noise input.
    pub fn uses_noise(&self) -> bool {
        self.noise_projection.is_some()
    }

    /// Length of the noise vector the generator expects.
    pub fn noise_dim(&self) -> usize {
        self.noise_dim
    }

    /// Forward pass.
    ///
    /// Input shape: `[batch, depth, height, width, channels]`
    /// Noise shape: `[batch, noise_dim]`; zeros are used when the generator
    /// takes noise and none is given, and it is ignored otherwise.
    /// Output shape: same as input.
    pub fn forward(&self, x: Tensor<B, 5>, noise: Option<Tensor<B, 2>>) -> Tensor<B, 5> {
        let [batch, depth, height, width, _] = x.dims();
        let source = x.permute([0, 4, 1, 2, 3]);

        let mut h = match &self.noise_projection {
            Some(projection) => {
                let noise = noise
                    .unwrap_or_else(|| Tensor::zeros([batch, self.noise_dim], &source.device()));
                let channel = projection
                    .forward(noise)
                    .reshape([batch, 1, depth, height, width]);
                Tensor::cat(vec![source.clone(), channel], 1)
            }
            None => source.clone(),
        };

        h = leaky_relu(self.input.forward(h), self.leaky_slope);
        for block in &self.hidden {
            h = leaky_relu(block.forward(h), self.leaky_slope);
        }

        let mut out = self.output.forward(h);
        if self.residual {
            out = out + source;
        }

        out.permute([0, 2, 3, 4, 1])
    }

    fn blocks(&self) -> impl Iterator<Item = &ConvBlock<B>> {
        std::iter::once(&self.input)
            .chain(self.hidden.iter())
            .chain(std::iter::once(&self.output))
    }
}

impl<B: Backend> OwnedModule<B> for Generator<B> {
    const OWNER: Owner = Owner::Generator;

    fn kernel_l1(&self) -> Tensor<B, 1> {
        let mut terms: Vec<_> = self.blocks().map(ConvBlock::kernel_l1).collect();
        if let Some(projection) = &self.noise_projection {
            terms.push(abs_sum(&projection.weight));
        }
        total(terms)
    }

    fn kernel_l2(&self) -> Tensor<B, 1> {
        let mut terms: Vec<_> = self.blocks().map(ConvBlock::kernel_l2).collect();
        if let Some(projection) = &self.noise_projection {
            terms.push(half_square_sum(&projection.weight));
        }
        total(terms)
    }

    fn inventory(&self) -> ParamInventory {
        let mut inventory = self
            .blocks()
            .map(ConvBlock::inventory)
            .fold(ParamInventory::default(), ParamInventory::merge);
        if let Some(projection) = &self.noise_projection {
            inventory.add(ParamKind::Kernel);
            if projection.bias.is_some() {
                inventory.add(ParamKind::Bias);
            }
        }
        inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_generator_forward_shape() {
        let device = Default::default();
        let config = ModelConfig::new([4, 6, 4]).with_gen_filters(4);
        let generator = config.init_generator::<TestBackend>(&device);

        let x = Tensor::zeros([2, 4, 6, 4, 1], &device);
        let y = generator.forward(x, None);
        assert_eq!(y.dims(), [2, 4, 6, 4, 1]);
        assert!(!generator.uses_noise());
    }

    #[test]
    fn test_generator_with_noise() {
        let device = Default::default();
        let config = ModelConfig::new([2, 3, 2])
            .with_gen_filters(4)
            .with_use_noise(true)
            .with_noise_dim(5);
        let generator = config.init_generator::<TestBackend>(&device);

        let x = Tensor::zeros([3, 2, 3, 2, 1], &device);
        let noise = Tensor::ones([3, 5], &device);
        assert_eq!(generator.forward(x.clone(), Some(noise)).dims(), [3, 2, 3, 2, 1]);
        assert_eq!(generator.forward(x, None).dims(), [3, 2, 3, 2, 1]);
        assert_eq!(generator.noise_dim(), 5);
    }

    #[test]
    fn test_generator_inventory() {
        let device = Default::default();
        let config = ModelConfig::new([2, 2, 2])
            .with_gen_hidden_layers(2)
            .with_batch_normalization(true);
        let generator = config.init_generator::<TestBackend>(&device);
        let inventory = generator.inventory();

        // input, two hidden, output
        assert_eq!(inventory.kernels, 4);
        assert_eq!(inventory.biases, 4);
        // batch norm on hidden blocks only
        assert_eq!(inventory.normalization, 4);
    }

    #[test]
    fn test_generator_decay_terms() {
        let device = Default::default();
        let generator = ModelConfig::new([2, 2, 2]).init_generator::<TestBackend>(&device);

        let l1: f32 = generator.kernel_l1().into_scalar();
        let l2: f32 = generator.kernel_l2().into_scalar();
        assert!(l1 > 0.0);
        assert!(l2 > 0.0);
    }
}
