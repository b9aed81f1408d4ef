use std::{
    fmt::{self, Debug},
    iter,
};

use derive_more::Display;
use rand::{Rng, distr::uniform::SampleRange};
use tracing::{debug, debug_span, trace};

use crate::{
    ActivationFunction, DynActivationFunction, DynLossFunction, Error, Layer, LossFunction,
    PrettyPrintLayer, Result, Vector,
};

/// Widths of every layer of a network, input width first, and the activation function shared
/// by all of its layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    dimensions: Vec<usize>,
    phi: DynActivationFunction,
}

impl Topology {
    /// `dimensions` must hold at least an input and an output width, none of them zero.
    /// The activation defaults to sigmoid.
    pub fn new(dimensions: impl Into<Vec<usize>>) -> Result<Self> {
        let dimensions = dimensions.into();
        if dimensions.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "a network needs at least 2 dimensions, got {}",
                dimensions.len()
            )));
        }
        if dimensions.contains(&0) {
            return Err(Error::InvalidInput(format!(
                "dimensions must be non-zero, got {dimensions:?}"
            )));
        }
        Ok(Self {
            dimensions,
            phi: DynActivationFunction::default(),
        })
    }

    pub fn with_activation(self, phi: impl ActivationFunction) -> Self {
        self.with_dyn_activation(DynActivationFunction::new(phi))
    }

    pub fn with_dyn_activation(mut self, phi: DynActivationFunction) -> Self {
        self.phi = phi;
        self
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn phi(&self) -> DynActivationFunction {
        self.phi
    }

    pub fn n_inputs(&self) -> usize {
        self.dimensions[0]
    }

    pub fn n_outputs(&self) -> usize {
        self.dimensions[self.dimensions.len() - 1]
    }

    /// Number of layers, which is one less than the number of dimensions.
    pub fn n_layers(&self) -> usize {
        self.dimensions.len() - 1
    }

    /// `(n_inputs, n_outputs)` of every layer, in order.
    pub fn layer_shapes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.dimensions.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Outcome of [`NeuralNetwork::test`].
#[derive(Debug, Clone, Copy, PartialEq, Display)]
#[display("{correct}/{total} correct ({:.2}%)", accuracy * 100.0)]
pub struct TestResults {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f32,
}

/// Called after every epoch of [`NeuralNetwork::train`]. Returning `true` stops training.
pub type EpochCallback = Box<dyn FnMut(&mut NeuralNetwork) -> bool>;

/// A multi-layer perceptron.
///
/// Layers communicate through their own buffers: the network copies each layer's output into
/// the next layer's input on the way forward, and each input gradient into the previous
/// layer's output gradient on the way back.
pub struct NeuralNetwork {
    /// Never empty.
    layers: Vec<Layer>,
    loss: DynLossFunction,
    eta: f32,
    on_epoch: Option<EpochCallback>,
    /// Set whenever `on_epoch` is installed or cleared, so that [`NeuralNetwork::train`]
    /// does not put back a callback that removed or replaced itself.
    on_epoch_changed: bool,
}

impl Debug for NeuralNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NeuralNetwork")
            .field("layers", &self.layers)
            .field("loss", &self.loss)
            .field("eta", &self.eta)
            .field("on_epoch", &self.on_epoch.is_some())
            .finish()
    }
}

impl NeuralNetwork {
    pub const DEFAULT_ETA: f32 = 0.01;

    /// Builds one randomly initialized layer per pair of consecutive dimensions.
    pub fn new(topology: Topology, rng: &mut impl Rng) -> Result<Self> {
        let layers = topology
            .layer_shapes()
            .map(|(n_inputs, n_outputs)| Layer::new(n_inputs, n_outputs, topology.phi(), rng))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            dimensions = ?topology.dimensions(),
            activation = topology.phi().name(),
            "created network"
        );
        Self::from_layers(layers)
    }

    /// Sigmoid activation, error loss and the default learning rate.
    pub fn with_dimensions(dimensions: &[usize], rng: &mut impl Rng) -> Result<Self> {
        Self::new(Topology::new(dimensions)?, rng)
    }

    /// Assembles a network from existing layers, checking that consecutive layers fit.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidInput(
                "a network needs at least one layer".to_owned(),
            ));
        }
        for (u, pair) in layers.windows(2).enumerate() {
            if pair[0].n_outputs() != pair[1].n_inputs() {
                return Err(Error::DimensionMismatch(format!(
                    "layer {u} has {} outputs but layer {} has {} inputs",
                    pair[0].n_outputs(),
                    u + 1,
                    pair[1].n_inputs()
                )));
            }
        }
        Ok(Self {
            layers,
            loss: DynLossFunction::default(),
            eta: Self::DEFAULT_ETA,
            on_epoch: None,
            on_epoch_changed: false,
        })
    }

    pub fn with_loss(self, loss: impl LossFunction) -> Self {
        self.with_dyn_loss(DynLossFunction::new(loss))
    }

    pub fn with_dyn_loss(mut self, loss: DynLossFunction) -> Self {
        self.loss = loss;
        self
    }

    /// Sets the learning rate.
    pub fn with_eta(mut self, eta: f32) -> Self {
        self.eta = eta;
        self
    }

    pub fn loss_function(&self) -> DynLossFunction {
        self.loss
    }

    /// The learning rate.
    pub fn eta(&self) -> f32 {
        self.eta
    }

    pub fn set_eta(&mut self, eta: f32) {
        self.eta = eta;
    }

    /// Installs the callback used by [`NeuralNetwork::train`] after every epoch.
    pub fn set_on_epoch(&mut self, on_epoch: impl FnMut(&mut NeuralNetwork) -> bool + 'static) {
        self.on_epoch = Some(Box::new(on_epoch));
        self.on_epoch_changed = true;
    }

    pub fn clear_on_epoch(&mut self) {
        self.on_epoch = None;
        self.on_epoch_changed = true;
    }

    pub fn n_inputs(&self) -> usize {
        self.input_layer().n_inputs()
    }

    pub fn n_outputs(&self) -> usize {
        self.output_layer().n_outputs()
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Mutable access to one layer. Shapes of a layer cannot change, but its buffers can be
    /// replaced with ones of the wrong length, which the next forward or backward pass
    /// reports.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn input_layer(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Output of the last forward pass.
    pub fn output(&self) -> &[f32] {
        self.output_layer().output()
    }

    pub fn randomize_params(&mut self, range: impl SampleRange<f32> + Clone, rng: &mut impl Rng) {
        for layer in &mut self.layers {
            layer.randomize(range.clone(), rng);
        }
    }

    pub fn pretty_print_layer(&self, index: usize) -> Option<PrettyPrintLayer<'_>> {
        let layer = self.layer(index)?;
        Some(PrettyPrintLayer::new(index, layer))
    }

    pub fn forward(&mut self, sample: &[f32]) -> Result<&[f32]> {
        self.layers[0].set_input(sample);
        let mut layers = self.layers.iter_mut().peekable();
        while let Some(layer) = layers.next() {
            layer.forward()?;
            if let Some(next) = layers.peek_mut() {
                next.set_input(layer.output());
            }
        }
        Ok(self.output())
    }

    /// Back propagates `error`, the gradient of the loss with respect to the network output.
    pub fn backward(&mut self, error: &[f32]) -> Result<()> {
        if error.len() != self.n_outputs() {
            return Err(Error::dimension_mismatch(
                "error",
                self.n_outputs(),
                error.len(),
            ));
        }
        let last = self.layers.len() - 1;
        self.layers[last].set_output_grad(error);
        let mut layers = self.layers.iter_mut().rev().peekable();
        while let Some(layer) = layers.next() {
            layer.backward()?;
            if let Some(previous) = layers.peek_mut() {
                previous.set_output_grad(layer.input_grad());
            }
        }
        Ok(())
    }

    /// Writes the one-hot encoding of `label` into `result`, resized to the output width.
    pub fn label_to_vector(&self, label: usize, result: &mut Vec<f32>) -> Result<()> {
        let n_outputs = self.n_outputs();
        result.resize(n_outputs, 0.0);
        if label >= n_outputs {
            return Err(Error::InvalidInput(format!(
                "label {label} too high for output dimension {n_outputs}"
            )));
        }
        bytemuck::fill_zeroes(&mut result[..]);
        result[label] = 1.0;
        Ok(())
    }

    /// Gradient of the configured loss function.
    pub fn gradient(&self, predicted: &[f32], observed: &[f32], result: &mut [f32]) -> Result<()> {
        self.loss.gradient(predicted, observed, result)
    }

    /// Applies the accumulated gradients of every layer.
    pub fn update_weights(&mut self) {
        let eta = self.eta;
        for layer in &mut self.layers {
            layer.update_weights(eta);
        }
    }

    pub fn clear_deltas(&mut self) {
        for layer in &mut self.layers {
            layer.clear_deltas();
        }
    }

    /// Stochastic gradient descent over `samples` in order, one update per sample, for at
    /// most `max_epochs` epochs.
    ///
    /// Runs the callback installed with [`NeuralNetwork::set_on_epoch`], if any, after every
    /// epoch. The callback may replace or clear itself, taking effect after this call. Returns
    /// the number of epochs run.
    pub fn train(&mut self, samples: &[Vector], labels: &[usize], max_epochs: usize) -> Result<usize> {
        let mut on_epoch = self.on_epoch.take();
        self.on_epoch_changed = false;
        let result = self.train_with(samples, labels, max_epochs, |nn: &mut NeuralNetwork| {
            match on_epoch.as_mut() {
                Some(on_epoch) => on_epoch(nn),
                None => false,
            }
        });
        if !self.on_epoch_changed {
            self.on_epoch = on_epoch;
        }
        result
    }

    /// Like [`NeuralNetwork::train`], with `on_epoch` in place of the installed callback.
    pub fn train_with(
        &mut self,
        samples: &[Vector],
        labels: &[usize],
        max_epochs: usize,
        mut on_epoch: impl FnMut(&mut NeuralNetwork) -> bool,
    ) -> Result<usize> {
        check_counts(samples, labels)?;
        let _span = debug_span!("train", n_samples = samples.len(), max_epochs).entered();

        let mut error = vec![0.0; self.n_outputs()];
        let mut expected = vec![0.0; self.n_outputs()];

        for epoch in 0..max_epochs {
            for (sample, &label) in iter::zip(samples, labels) {
                self.forward(sample)?;
                self.label_to_vector(label, &mut expected)?;
                self.gradient(self.output(), &expected, &mut error)?;
                self.backward(&error)?;
                self.update_weights();
            }
            trace!(epoch, "finished epoch");
            if on_epoch(&mut *self) {
                debug!(epochs = epoch + 1, "training stopped by epoch callback");
                return Ok(epoch + 1);
            }
        }
        debug!(epochs = max_epochs, "training finished");
        Ok(max_epochs)
    }

    /// Classifies every sample as the arg-max of the network output and compares it to its
    /// label.
    pub fn test(&mut self, samples: &[Vector], labels: &[usize]) -> Result<TestResults> {
        check_counts(samples, labels)?;
        if samples.is_empty() {
            return Err(Error::InvalidInput("cannot test on an empty dataset".to_owned()));
        }
        let mut correct = 0usize;
        for (sample, &label) in iter::zip(samples, labels) {
            let output = self.forward(sample)?;
            if arg_max(output) == Some(label) {
                correct += 1;
            }
        }
        let total = samples.len();
        Ok(TestResults {
            correct,
            total,
            accuracy: correct as f32 / total as f32,
        })
    }

    /// Sum of the loss of every sample against the one-hot encoding of its label.
    pub fn loss(&mut self, samples: &[Vector], labels: &[usize]) -> Result<f32> {
        check_counts(samples, labels)?;
        let loss = self.loss;
        let mut expected = Vec::with_capacity(self.n_outputs());
        let mut sum = 0.0f32;
        for (sample, &label) in iter::zip(samples, labels) {
            self.label_to_vector(label, &mut expected)?;
            let output = self.forward(sample)?;
            sum += loss.value(output, &expected)?;
        }
        Ok(sum)
    }

    /// [`NeuralNetwork::loss`] divided by the number of samples.
    pub fn loss_mean(&mut self, samples: &[Vector], labels: &[usize]) -> Result<f32> {
        if samples.is_empty() {
            return Err(Error::InvalidInput(
                "cannot average the loss of an empty dataset".to_owned(),
            ));
        }
        Ok(self.loss(samples, labels)? / samples.len() as f32)
    }
}

fn check_counts(samples: &[Vector], labels: &[usize]) -> Result<()> {
    match samples.len() == labels.len() {
        true => Ok(()),
        false => Err(Error::DimensionMismatch(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        ))),
    }
}

/// Index of the first maximum.
fn arg_max(xs: &[f32]) -> Option<usize> {
    let mut max: Option<(usize, f32)> = None;
    for (i, &x) in xs.iter().enumerate() {
        match max {
            Some((_, m)) if x <= m => {}
            _ => max = Some((i, x)),
        }
    }
    max.map(|(i, _)| i)
}
