//! 3D convolution block shared by the generator and critic.

use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig3d};
use burn::prelude::*;

use super::params::{abs_sum, clamp_param, half_square_sum, ParamInventory, ParamKind};

/// A 3x3x3 convolution followed by optional batch normalization.
///
/// Operates on channels-first tensors `[batch, channels, depth, height, width]`.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub(crate) conv: Conv3d<B>,
    pub(crate) norm: Option<BatchNorm<B, 3>>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a block mapping `channels_in` to `channels_out` with the given
    /// stride. Padding keeps the spatial size for stride 1 and halves it
    /// (rounding up) for stride 2.
    pub fn new(
        channels_in: usize,
        channels_out: usize,
        stride: usize,
        batch_norm: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv3dConfig::new([channels_in, channels_out], [3, 3, 3])
            .with_stride([stride, stride, stride])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .init(device);
        let norm = batch_norm.then(|| BatchNormConfig::new(channels_out).init(device));

        Self { conv, norm }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let x = self.conv.forward(x);
        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }

    pub(crate) fn kernel_l1(&self) -> Tensor<B, 1> {
        abs_sum(&self.conv.weight)
    }

    pub(crate) fn kernel_l2(&self) -> Tensor<B, 1> {
        half_square_sum(&self.conv.weight)
    }

    pub(crate) fn clip(mut self, bound: f32) -> Self {
        self.conv.weight = clamp_param(self.conv.weight, bound);
        self.conv.bias = self.conv.bias.map(|bias| clamp_param(bias, bound));
        self
    }

    pub(crate) fn inventory(&self) -> ParamInventory {
        let mut inventory = ParamInventory::default();
        inventory.add(ParamKind::Kernel);
        if self.conv.bias.is_some() {
            inventory.add(ParamKind::Bias);
        }
        if self.norm.is_some() {
            // gamma and beta
            inventory.add(ParamKind::Normalization);
            inventory.add(ParamKind::Normalization);
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
    fn test_block_shapes() {
        let device = Default::default();
        let same = ConvBlock::<TestBackend>::new(1, 4, 1, false, &device);
        let down = ConvBlock::<TestBackend>::new(4, 8, 2, true, &device);

        let x = Tensor::zeros([2, 1, 5, 6, 4], &device);
        let y = same.forward(x);
        assert_eq!(y.dims(), [2, 4, 5, 6, 4]);

        let z = down.forward(y);
        assert_eq!(z.dims(), [2, 8, 3, 3, 2]);
    }

    #[test]
    fn test_block_inventory() {
        let device = Default::default();
        let plain = ConvBlock::<TestBackend>::new(1, 4, 1, false, &device);
        let normed = ConvBlock::<TestBackend>::new(1, 4, 1, true, &device);

        assert_eq!(plain.inventory().clipped(), 2);
        assert_eq!(plain.inventory().normalization, 0);
        assert_eq!(normed.inventory().normalization, 2);
    }
}
