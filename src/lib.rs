//! Fully connected feed-forward neural networks, trained with back propagation.

pub use faer;

mod activation;
mod error;
mod layer;
mod loss;
mod nn;
mod pretty_print;

pub mod dataset;

pub use activation::*;
pub use error::*;
pub use layer::*;
pub use loss::*;
pub use nn::*;
pub use pretty_print::*;

/// A single sample, or any other dense vector of floats.
pub type Vector = Vec<f32>;
/// Samples of a dataset, in dataset order.
pub type Samples = Vec<Vector>;
/// Class labels, parallel to [`Samples`].
pub type Labels = Vec<usize>;
