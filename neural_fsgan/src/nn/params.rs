//! Structural parameter ownership.
//!
//! Every trainable tensor belongs to exactly one network and has a known
//! kind. Weight decay reads kernels only; clipping touches everything except
//! normalization parameters.

use burn::module::{Module, Param};
use burn::prelude::*;

/// Network a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The generator.
    Generator,
    /// The critic (discriminator).
    Critic,
}

impl Owner {
    /// Lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Owner::Generator => "generator",
            Owner::Critic => "critic",
        }
    }
}

/// Role of a parameter tensor inside its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Convolution or dense kernel.
    Kernel,
    /// Convolution or dense bias.
    Bias,
    /// Scale or shift of a normalization layer.
    Normalization,
}

/// Parameter tensor counts of a network, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamInventory {
    /// Kernel tensors (subject to weight decay and clipping).
    pub kernels: usize,
    /// Bias tensors (clipped, never decayed).
    pub biases: usize,
    /// Normalization tensors (never decayed or clipped).
    pub normalization: usize,
}

impl ParamInventory {
    /// Count one tensor of the given kind.
    pub fn add(&mut self, kind: ParamKind) {
        match kind {
            ParamKind::Kernel => self.kernels += 1,
            ParamKind::Bias => self.biases += 1,
            ParamKind::Normalization => self.normalization += 1,
        }
    }

    /// Tensors touched by weight clipping.
    pub fn clipped(&self) -> usize {
        self.kernels + self.biases
    }

    /// Merge two inventories.
    pub fn merge(mut self, other: ParamInventory) -> Self {
        self.kernels += other.kernels;
        self.biases += other.biases;
        self.normalization += other.normalization;
        self
    }
}

/// A network whose parameters carry structural ownership.
pub trait OwnedModule<B: Backend>: Module<B> + Sized {
    /// Network the parameters belong to.
    const OWNER: Owner;

    /// Sum of absolute kernel values, `sum |w|`.
    fn kernel_l1(&self) -> Tensor<B, 1>;

    /// Half the sum of squared kernel values, `sum w² / 2`.
    fn kernel_l2(&self) -> Tensor<B, 1>;

    /// Parameter tensor counts by kind.
    fn inventory(&self) -> ParamInventory;
}

/// `sum |w|` of one parameter.
pub(crate) fn abs_sum<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> Tensor<B, 1> {
    param.val().abs().sum()
}

/// `sum w² / 2` of one parameter.
pub(crate) fn half_square_sum<B: Backend, const D: usize>(
    param: &Param<Tensor<B, D>>,
) -> Tensor<B, 1> {
    let value = param.val();
    (value.clone() * value).sum().div_scalar(2.0)
}

/// Add up per-layer scalars.
pub(crate) fn total<B: Backend>(terms: Vec<Tensor<B, 1>>) -> Tensor<B, 1> {
    Tensor::cat(terms, 0).sum()
}

/// Clamp a parameter in place, keeping its id and leaving it a trainable leaf.
pub(crate) fn clamp_param<B: Backend, const D: usize>(
    param: Param<Tensor<B, D>>,
    bound: f32,
) -> Param<Tensor<B, D>> {
    param.map(|tensor| tensor.clamp(-bound, bound).detach().require_grad())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_inventory() {
        let mut inventory = ParamInventory::default();
        inventory.add(ParamKind::Kernel);
        inventory.add(ParamKind::Bias);
        inventory.add(ParamKind::Normalization);
        inventory.add(ParamKind::Normalization);

        let merged = inventory.merge(inventory);
        assert_eq!(merged.kernels, 2);
        assert_eq!(merged.clipped(), 4);
        assert_eq!(merged.normalization, 4);
    }

    #[test]
    fn test_norm_helpers() {
        let device = Default::default();
        let param = Param::from_tensor(Tensor::<TestBackend, 2>::from_floats(
            [[1.0, -2.0], [3.0, -4.0]],
            &device,
        ));

        let l1: f32 = abs_sum(&param).into_scalar();
        let l2: f32 = half_square_sum(&param).into_scalar();
        assert!((l1 - 10.0).abs() < 1e-6);
        assert!((l2 - 15.0).abs() < 1e-6);

        let clipped = clamp_param(param, 2.5);
        let values: Vec<f32> = clipped.val().into_data().to_vec().unwrap();
        assert_eq!(values, vec![1.0, -2.0, 2.5, -2.5]);
    }
}
