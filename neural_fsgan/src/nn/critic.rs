//! Strided convolutional critic with global pooling.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::leaky_relu;

use super::conv::ConvBlock;
use super::params::{abs_sum, clamp_param, half_square_sum, total, OwnedModule, Owner, ParamInventory, ParamKind};
use crate::config::ModelConfig;

impl ModelConfig {
    /// Initialize the critic.
    pub fn init_critic<B: Backend>(&self, device: &B::Device) -> Critic<B> {
        let mut blocks = Vec::with_capacity(self.critic_layers);
        let mut channels = self.n_channels;
        for layer in 0..self.critic_layers {
            let filters = self.critic_filters << layer;
            // no normalization on the input layer
            let batch_norm = self.batch_normalization && layer > 0;
            blocks.push(ConvBlock::new(channels, filters, 2, batch_norm, device));
            channels = filters;
        }
        let output = LinearConfig::new(channels, 1).init(device);

        Critic {
            blocks,
            output,
            leaky_slope: self.leaky_slope,
        }
    }
}

/// Wasserstein critic: maps a volume to an unbounded scalar score.
#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    pub(crate) blocks: Vec<ConvBlock<B>>,
    pub(crate) output: Linear<B>,
    leaky_slope: f64,
}

impl<B: Backend> Critic<B> {
    /// Forward pass.
    ///
    /// Input shape: `[batch, depth, height, width, channels]`
    /// Output shape: `[batch, 1]`
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        let mut h = x.permute([0, 4, 1, 2, 3]);
        for block in &self.blocks {
            h = leaky_relu(block.forward(h), self.leaky_slope);
        }

        let [batch, channels, _, _, _] = h.dims();
        let pooled = h
            .mean_dim(4)
            .mean_dim(3)
            .mean_dim(2)
            .reshape([batch, channels]);

        self.output.forward(pooled)
    }

    /// Clamp every kernel and bias into `[-bound, bound]`, leaving
    /// normalization parameters untouched.
    pub fn clip_weights(mut self, bound: f32) -> Self {
        self.blocks = self
            .blocks
            .into_iter()
            .map(|block| block.clip(bound))
            .collect();
        self.output.weight = clamp_param(self.output.weight, bound);
        self.output.bias = self.output.bias.map(|bias| clamp_param(bias, bound));
        self
    }
}

impl<B: Backend> OwnedModule<B> for Critic<B> {
    const OWNER: Owner = Owner::Critic;

    fn kernel_l1(&self) -> Tensor<B, 1> {
        let mut terms: Vec<_> = self.blocks.iter().map(ConvBlock::kernel_l1).collect();
        terms.push(abs_sum(&self.output.weight));
        total(terms)
    }

    fn kernel_l2(&self) -> Tensor<B, 1> {
        let mut terms: Vec<_> = self.blocks.iter().map(ConvBlock::kernel_l2).collect();
        terms.push(half_square_sum(&self.output.weight));
        total(terms)
    }

    fn inventory(&self) -> ParamInventory {
        let mut inventory = self
            .blocks
            .iter()
            .map(ConvBlock::inventory)
            .fold(ParamInventory::default(), ParamInventory::merge);
        inventory.add(ParamKind::Kernel);
        if self.output.bias.is_some() {
            inventory.add(ParamKind::Bias);
        }
        inventory
    }
}
