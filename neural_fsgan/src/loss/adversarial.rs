//! Wasserstein losses and their regularized totals.

use burn::prelude::*;
use burn::tensor::ElementConversion;

use crate::config::{LipschitzMode, LossConfig};
use crate::nn::OwnedModule;

use super::penalty::GradientPenalty;
use super::regularization::{add_terms, WeightDecay};

/// The four losses of one evaluation.
#[derive(Debug, Clone)]
pub struct GanLosses<B: Backend> {
    /// Critic loss including regularization (and penalty, if given).
    pub d_loss: Tensor<B, 1>,
    /// Generator loss including regularization.
    pub g_loss: Tensor<B, 1>,
    /// Critic loss without regularization.
    pub d_loss_no_reg: Tensor<B, 1>,
    /// Generator loss without regularization.
    pub g_loss_no_reg: Tensor<B, 1>,
}

impl<B: Backend> GanLosses<B> {
    /// Read the losses back as scalars.
    pub fn values(&self) -> LossValues {
        LossValues {
            d_loss: scalar(&self.d_loss),
            g_loss: scalar(&self.g_loss),
            d_loss_no_reg: scalar(&self.d_loss_no_reg),
            g_loss_no_reg: scalar(&self.g_loss_no_reg),
        }
    }
}

/// Scalar values of [`GanLosses`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossValues {
    /// Regularized critic loss.
    pub d_loss: f32,
    /// Regularized generator loss.
    pub g_loss: f32,
    /// Critic loss without regularization.
    pub d_loss_no_reg: f32,
    /// Generator loss without regularization.
    pub g_loss_no_reg: f32,
}

/// Read a single-element tensor as `f32`.
pub fn scalar<B: Backend>(tensor: &Tensor<B, 1>) -> f32 {
    tensor.clone().into_scalar().elem::<f32>()
}

/// Combines the Wasserstein estimate with weight decay, the image distance
/// term, and the gradient penalty.
#[derive(Debug, Clone)]
pub struct LossComposer {
    generator_decay: WeightDecay,
    critic_decay: WeightDecay,
    image_distance_weight: f32,
    penalty: Option<GradientPenalty>,
}

impl LossComposer {
    /// Create a composer from the loss configuration.
    pub fn new(config: &LossConfig) -> Self {
        let penalty = match config.lipschitz {
            LipschitzMode::Clipping => None,
            LipschitzMode::GradientPenalty { scale } => {
                Some(GradientPenalty::new(scale, config.penalty_step))
            }
        };

        Self {
            generator_decay: WeightDecay::new(config.w_reg_gen_l1, config.w_reg_gen_l2),
            critic_decay: WeightDecay::new(config.w_reg_disc_l1, config.w_reg_disc_l2),
            image_distance_weight: config.w_reg_img_dist_l1,
            penalty,
        }
    }

    /// The gradient penalty, when that mode is active.
    pub fn penalty(&self) -> Option<&GradientPenalty> {
        self.penalty.as_ref()
    }

    /// `mean(real) - mean(fake)`.
    ///
    /// Inputs: critic outputs `[batch, 1]`.
    pub fn critic_base<B: Backend>(real_logits: Tensor<B, 2>, fake_logits: Tensor<B, 2>) -> Tensor<B, 1> {
        real_logits.mean() - fake_logits.mean()
    }

    /// `mean(fake)`.
    pub fn generator_base<B: Backend>(fake_logits: Tensor<B, 2>) -> Tensor<B, 1> {
        fake_logits.mean()
    }

    /// Critic weight decay, if any coefficient is non-zero.
    pub fn critic_regularization<B: Backend, D: OwnedModule<B>>(
        &self,
        critic: &D,
    ) -> Option<Tensor<B, 1>> {
        self.critic_decay.loss(critic)
    }

    /// Generator weight decay plus the weighted image distance, if any
    /// coefficient is non-zero.
    pub fn generator_regularization<B: Backend, G: OwnedModule<B>>(
        &self,
        generator: &G,
        image_distance: Tensor<B, 1>,
    ) -> Option<Tensor<B, 1>> {
        let distance = (self.image_distance_weight != 0.0)
            .then(|| image_distance.mul_scalar(self.image_distance_weight));
        let decay = self.generator_decay.loss(generator);

        match (decay, distance) {
            (Some(decay), Some(distance)) => Some(decay + distance),
            (decay, distance) => decay.or(distance),
        }
    }

    /// Total critic loss: base + weight decay + penalty.
    pub fn critic_loss<B: Backend, D: OwnedModule<B>>(
        &self,
        real_logits: Tensor<B, 2>,
        fake_logits: Tensor<B, 2>,
        critic: &D,
        penalty: Option<Tensor<B, 1>>,
    ) -> Tensor<B, 1> {
        self.critic_total(Self::critic_base(real_logits, fake_logits), critic, penalty)
    }

    /// Total generator loss: base + weight decay + weighted image distance.
    pub fn generator_loss<B: Backend, G: OwnedModule<B>>(
        &self,
        fake_logits: Tensor<B, 2>,
        generator: &G,
        image_distance: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        self.generator_total(Self::generator_base(fake_logits), generator, image_distance)
    }

    fn critic_total<B: Backend, D: OwnedModule<B>>(
        &self,
        base: Tensor<B, 1>,
        critic: &D,
        penalty: Option<Tensor<B, 1>>,
    ) -> Tensor<B, 1> {
        add_terms(base, [self.critic_regularization(critic), penalty])
    }

    fn generator_total<B: Backend, G: OwnedModule<B>>(
        &self,
        base: Tensor<B, 1>,
        generator: &G,
        image_distance: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        add_terms(base, [self.generator_regularization(generator, image_distance)])
    }

    /// All four losses for one pair of critic evaluations.
    ///
    /// Inputs:
    /// - real_logits, fake_logits: critic outputs `[batch, 1]`
    /// - image_distance: mean absolute difference between generated and source volumes
    /// - penalty: precomputed gradient penalty, added to the critic total only
    pub fn compose<B, G, D>(
        &self,
        real_logits: Tensor<B, 2>,
        fake_logits: Tensor<B, 2>,
        image_distance: Tensor<B, 1>,
        generator: &G,
        critic: &D,
        penalty: Option<Tensor<B, 1>>,
    ) -> GanLosses<B>
    where
        B: Backend,
        G: OwnedModule<B>,
        D: OwnedModule<B>,
    {
        let d_loss_no_reg = Self::critic_base(real_logits, fake_logits.clone());
        let g_loss_no_reg = Self::generator_base(fake_logits);

        let d_loss = self.critic_total(d_loss_no_reg.clone(), critic, penalty);
        let g_loss = self.generator_total(g_loss_no_reg.clone(), generator, image_distance);

        GanLosses {
            d_loss,
            g_loss,
            d_loss_no_reg,
            g_loss_no_reg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_base_losses() {
        let device = Default::default();
        let real = Tensor::<TestBackend, 2>::from_floats([[1.0], [3.0]], &device);
        let fake = Tensor::<TestBackend, 2>::from_floats([[0.5], [0.5]], &device);

        let d = scalar(&LossComposer::critic_base(real, fake.clone()));
        let g = scalar(&LossComposer::generator_base(fake));
        assert!((d - 1.5).abs() < 1e-6);
        assert!((g - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_regularization_is_additive() {
        let device = Default::default();
        let model = ModelConfig::new([2, 2, 2]);
        let generator = model.init_generator::<TestBackend>(&device);
        let critic = model.init_critic::<TestBackend>(&device);

        let config = LossConfig::unregularized()
            .with_w_reg_disc_l2(1.0)
            .with_w_reg_img_dist_l1(2.0);
        let composer = LossComposer::new(&config);

        let real = Tensor::<TestBackend, 2>::from_floats([[0.2]], &device);
        let fake = Tensor::<TestBackend, 2>::from_floats([[0.1]], &device);
        let distance = Tensor::<TestBackend, 1>::from_floats([0.25], &device);
        let penalty = Tensor::<TestBackend, 1>::from_floats([3.0], &device);

        let values = composer
            .compose(real, fake, distance, &generator, &critic, Some(penalty))
            .values();
        let critic_l2 = scalar(&critic.kernel_l2());

        assert!((values.d_loss_no_reg - 0.1).abs() < 1e-6);
        assert!((values.g_loss_no_reg - 0.1).abs() < 1e-6);
        assert!((values.d_loss - (0.1 + critic_l2 + 3.0)).abs() < 1e-4);
        assert!((values.g_loss - (0.1 + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_update_losses_match_compose() {
        let device = Default::default();
        let model = ModelConfig::new([2, 2, 2]);
        let generator = model.init_generator::<TestBackend>(&device);
        let critic = model.init_critic::<TestBackend>(&device);
        let composer = LossComposer::new(
            &LossConfig::new()
                .with_w_reg_gen_l1(0.5)
                .with_w_reg_disc_l2(1.0)
                .with_w_reg_img_dist_l1(2.0),
        );

        let real = Tensor::<TestBackend, 2>::from_floats([[0.4], [0.2]], &device);
        let fake = Tensor::<TestBackend, 2>::from_floats([[0.1], [-0.3]], &device);
        let distance = Tensor::<TestBackend, 1>::from_floats([0.25], &device);
        let penalty = Tensor::<TestBackend, 1>::from_floats([1.5], &device);

        let values = composer
            .compose(
                real.clone(),
                fake.clone(),
                distance.clone(),
                &generator,
                &critic,
                Some(penalty.clone()),
            )
            .values();
        let d = scalar(&composer.critic_loss(real, fake.clone(), &critic, Some(penalty)));
        let g = scalar(&composer.generator_loss(fake, &generator, distance));

        assert!((d - values.d_loss).abs() < 1e-6);
        assert!((g - values.g_loss).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_penalty_mode() {
        let clipping = LossComposer::new(&LossConfig::new());
        assert!(clipping.penalty().is_none());

        let config = LossConfig::new().with_lipschitz(LipschitzMode::GradientPenalty { scale: 5.0 });
        let composer = LossComposer::new(&config);
        assert_eq!(composer.penalty().map(|p| p.scale), Some(5.0));
    }
}
