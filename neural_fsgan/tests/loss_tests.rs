//! Integration tests for loss composition, weight clipping, and the gradient penalty.

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;

use neural_fsgan::config::{LipschitzMode, LossConfig, ModelConfig};
use neural_fsgan::loss::{scalar, GradientPenalty, LossComposer};
use neural_fsgan::nn::{Critic, OwnedModule};
use neural_fsgan::training::{adam_config, OptimizerStep, WeightClipper};

type TestBackend = NdArray;
type TrainBackend = Autodiff<NdArray>;

#[test]
fn test_equal_logits_give_zero_critic_loss() {
    let device = Default::default();
    let logits = Tensor::<TestBackend, 2>::from_data([[0.3], [-1.2], [2.5]], &device);

    let d_loss = LossComposer::critic_base(logits.clone(), logits.clone());
    let g_loss = LossComposer::generator_base(logits.clone());

    assert!(scalar(&d_loss).abs() < 1e-6);
    let expected = (0.3 - 1.2 + 2.5) / 3.0;
    assert!((scalar(&g_loss) - expected).abs() < 1e-6);
}

#[test]
fn test_zero_weights_total_equals_base() {
    let device = Default::default();
    let model = ModelConfig::new([2, 2, 2]);
    let generator = model.init_generator::<TestBackend>(&device);
    let critic = model.init_critic::<TestBackend>(&device);
    let composer = LossComposer::new(&LossConfig::unregularized());

    let real = Tensor::<TestBackend, 2>::from_data([[1.0], [0.5]], &device);
    let fake = Tensor::<TestBackend, 2>::from_data([[-0.25], [0.75]], &device);
    let distance = Tensor::<TestBackend, 1>::from_data([0.4], &device);

    let losses = composer
        .compose(real, fake, distance, &generator, &critic, None)
        .values();
    assert_eq!(losses.d_loss, losses.d_loss_no_reg);
    assert_eq!(losses.g_loss, losses.g_loss_no_reg);
}

#[test]
fn test_regularization_is_additive() {
    let device = Default::default();
    let model = ModelConfig::new([2, 2, 2]);
    let generator = model.init_generator::<TestBackend>(&device);
    let critic = model.init_critic::<TestBackend>(&device);
    let config = LossConfig::unregularized()
        .with_w_reg_disc_l2(0.5)
        .with_w_reg_gen_l1(0.1)
        .with_w_reg_img_dist_l1(2.0);
    let composer = LossComposer::new(&config);

    let real = Tensor::<TestBackend, 2>::from_data([[1.0], [0.5]], &device);
    let fake = Tensor::<TestBackend, 2>::from_data([[-0.25], [0.75]], &device);
    let distance = Tensor::<TestBackend, 1>::from_data([0.4], &device);

    let losses = composer
        .compose(real, fake, distance, &generator, &critic, None)
        .values();

    let critic_decay = 0.5 * scalar(&critic.kernel_l2());
    let generator_decay = 0.1 * scalar(&generator.kernel_l1()) + 2.0 * 0.4;
    assert!((losses.d_loss - losses.d_loss_no_reg - critic_decay).abs() < 1e-4);
    assert!((losses.g_loss - losses.g_loss_no_reg - generator_decay).abs() < 1e-4);
}

#[test]
fn test_penalty_added_to_critic_only() {
    let device = Default::default();
    let model = ModelConfig::new([2, 2, 2]);
    let generator = model.init_generator::<TestBackend>(&device);
    let critic = model.init_critic::<TestBackend>(&device);
    let composer = LossComposer::new(&LossConfig::unregularized());

    let real = Tensor::<TestBackend, 2>::from_data([[1.0]], &device);
    let fake = Tensor::<TestBackend, 2>::from_data([[0.0]], &device);
    let distance = Tensor::<TestBackend, 1>::from_data([0.0], &device);
    let penalty = Tensor::<TestBackend, 1>::from_data([3.0], &device);

    let losses = composer
        .compose(real, fake, distance, &generator, &critic, Some(penalty))
        .values();
    assert!((losses.d_loss - 4.0).abs() < 1e-6);
    assert_eq!(losses.g_loss, losses.g_loss_no_reg);
}

#[test]
fn test_lipschitz_modes_are_exclusive() {
    let clipping = LossComposer::new(&LossConfig::new());
    assert!(clipping.penalty().is_none());
    assert!(WeightClipper::for_mode(LipschitzMode::Clipping).is_some());

    let config = LossConfig::new().with_lipschitz(LipschitzMode::GradientPenalty { scale: 5.0 });
    let penalized = LossComposer::new(&config);
    assert_eq!(penalized.penalty().map(|p| p.scale), Some(5.0));
    assert!(WeightClipper::for_mode(config.lipschitz).is_none());
}

#[test]
fn test_penalty_trains_critic() {
    let device = Default::default();
    let critic = ModelConfig::new([2, 2, 2]).init_critic::<TrainBackend>(&device);
    let penalty = GradientPenalty::new(10.0, 1e-2);

    let real = Tensor::<TrainBackend, 5>::ones([2, 2, 2, 2, 1], &device);
    let fake = Tensor::<TrainBackend, 5>::zeros([2, 2, 2, 2, 1], &device);
    let x = GradientPenalty::interpolate(real, fake, 0.3);

    let loss = penalty.loss(|x| critic.forward(x), x);
    let value = scalar(&loss);
    assert!(value.is_finite() && value >= 0.0);

    let mut step = OptimizerStep::new(adam_config().init::<TrainBackend, Critic<TrainBackend>>(), 1e-3);
    let _critic = step.step(critic, loss);
    assert_eq!(step.steps(), 1);
}
