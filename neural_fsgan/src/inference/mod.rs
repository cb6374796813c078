//! Generation with a trained generator.
//!
//! - `ImageTranslator`: restores a generator and translates single volumes
//! - `generate_images`: translates the source volumes of a dataset split and
//!   writes source, generated, and difference volumes

mod driver;
mod translate;

pub use driver::{
    field_strength_tag, generate_images, noise_list, CheckpointChoice, GenerationConfig,
    GenerationReport,
};
pub use translate::{ImageTranslator, Translation};
