//! Reference generator and critic networks.
//!
//! This module provides:
//! - `Generator`: residual 3D convolutional translator with optional noise input
//! - `Critic`: strided 3D convolutional Wasserstein critic
//! - `OwnedModule`: structural ownership of parameters for weight decay and clipping
//!
//! All networks take channels-last batches `[batch, depth, height, width, channels]`.

mod conv;
pub mod critic;
pub mod generator;
pub mod params;

pub use conv::ConvBlock;
pub use critic::Critic;
pub use generator::Generator;
pub use params::{OwnedModule, Owner, ParamInventory, ParamKind};
