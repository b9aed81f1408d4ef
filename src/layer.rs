use std::iter;

use faer::{Accum, linalg::matmul::matmul, prelude::*};
use rand::{Rng, distr::uniform::SampleRange};

use crate::{DynActivationFunction, Error, Result};

/// A fully connected layer: an affine transform followed by an activation function.
///
/// Besides its parameters, a layer keeps the buffers of the last forward and backward pass,
/// and accumulators for the gradients of its parameters that are applied and cleared by
/// [`Layer::update_weights`].
#[derive(Debug)]
pub struct Layer {
    n_inputs: usize,
    n_outputs: usize,
    phi: DynActivationFunction,
    /// Row-major, `n_outputs` rows of `n_inputs`.
    weights: Vec<f32>,
    bias: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    input_grad: Vec<f32>,
    output_grad: Vec<f32>,
    /// Short for `dL/dW`, same layout as `weights`.
    grad_weights: Vec<f32>,
    /// Short for `dL/db`.
    grad_bias: Vec<f32>,
}

impl Layer {
    /// Creates a layer with weights drawn uniformly from `[-1, 1]` and zero biases.
    pub fn new(
        n_inputs: usize,
        n_outputs: usize,
        phi: DynActivationFunction,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let mut layer = Self::zeroed(n_inputs, n_outputs, phi)?;
        layer.randomize(-1.0..=1.0, rng);
        Ok(layer)
    }

    /// Creates a layer from explicit parameters. `weights` is row-major, element
    /// `weights[o * n_inputs + i]` connecting input `i` to output `o`.
    pub fn from_params(
        n_inputs: usize,
        n_outputs: usize,
        phi: DynActivationFunction,
        weights: &[f32],
        bias: &[f32],
    ) -> Result<Self> {
        let mut layer = Self::zeroed(n_inputs, n_outputs, phi)?;
        layer.set_weights(weights)?;
        layer.set_bias(bias)?;
        Ok(layer)
    }

    fn zeroed(n_inputs: usize, n_outputs: usize, phi: DynActivationFunction) -> Result<Self> {
        if n_inputs == 0 || n_outputs == 0 {
            return Err(Error::InvalidInput(format!(
                "layer of {n_inputs} inputs and {n_outputs} outputs, widths must be non-zero"
            )));
        }
        let Some(n_weights) = n_inputs.checked_mul(n_outputs) else {
            return Err(Error::InvalidInput(format!(
                "layer of {n_inputs} inputs and {n_outputs} outputs has too many weights"
            )));
        };
        Ok(Self {
            n_inputs,
            n_outputs,
            phi,
            weights: bytemuck::zeroed_vec(n_weights),
            bias: bytemuck::zeroed_vec(n_outputs),
            input: bytemuck::zeroed_vec(n_inputs),
            output: bytemuck::zeroed_vec(n_outputs),
            input_grad: bytemuck::zeroed_vec(n_inputs),
            output_grad: bytemuck::zeroed_vec(n_outputs),
            grad_weights: bytemuck::zeroed_vec(n_weights),
            grad_bias: bytemuck::zeroed_vec(n_outputs),
        })
    }

    /// Re-draws every weight from `range`. Biases are left untouched.
    pub fn randomize(&mut self, range: impl SampleRange<f32> + Clone, rng: &mut impl Rng) {
        for w in &mut self.weights {
            *w = rng.random_range(range.clone());
        }
    }

    /// Number of inputs to this layer.
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Number of neurons in this layer.
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn phi(&self) -> DynActivationFunction {
        self.phi
    }

    /// The weights as an `n_outputs × n_inputs` matrix.
    pub fn weights(&self) -> MatRef<'_, f32> {
        MatRef::from_row_major_slice(&self.weights, self.n_outputs, self.n_inputs)
    }

    pub fn weights_as_slice(&self) -> &[f32] {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: &[f32]) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(Error::dimension_mismatch(
                "weights",
                self.weights.len(),
                weights.len(),
            ));
        }
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    pub fn set_bias(&mut self, bias: &[f32]) -> Result<()> {
        if bias.len() != self.n_outputs {
            return Err(Error::dimension_mismatch("bias", self.n_outputs, bias.len()));
        }
        self.bias.copy_from_slice(bias);
        Ok(())
    }

    pub fn input(&self) -> &[f32] {
        &self.input
    }

    /// Replaces the input buffer. The length is only checked by [`Layer::forward`].
    pub fn set_input(&mut self, input: &[f32]) {
        self.input.clear();
        self.input.extend_from_slice(input);
    }

    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn input_grad(&self) -> &[f32] {
        &self.input_grad
    }

    pub fn output_grad(&self) -> &[f32] {
        &self.output_grad
    }

    /// Replaces the output gradient buffer. The length is only checked by
    /// [`Layer::backward`].
    pub fn set_output_grad(&mut self, output_grad: &[f32]) {
        self.output_grad.clear();
        self.output_grad.extend_from_slice(output_grad);
    }

    /// Accumulated `dL/dW`, same layout as the weights.
    pub fn grad_weights(&self) -> &[f32] {
        &self.grad_weights
    }

    /// Accumulated `dL/db`.
    pub fn grad_bias(&self) -> &[f32] {
        &self.grad_bias
    }

    /// `output = phi(W * input + b)`.
    pub fn forward(&mut self) -> Result<()> {
        if self.input.len() != self.n_inputs {
            return Err(Error::dimension_mismatch(
                "layer input",
                self.n_inputs,
                self.input.len(),
            ));
        }
        // output = W * input;
        matmul(
            ColMut::from_slice_mut(&mut self.output),
            Accum::Replace,
            MatRef::from_row_major_slice(&self.weights, self.n_outputs, self.n_inputs),
            ColRef::from_slice(&self.input),
            1.0,
            Par::Seq,
        );
        // output += b; output = phi(output);
        for (a, &b) in iter::zip(&mut self.output, &self.bias) {
            *a = self.phi.apply(*a + b);
        }
        Ok(())
    }

    /// Propagates `output_grad` back to `input_grad`, accumulating the parameter gradients.
    ///
    /// Relies on `input` and `output` still holding the values of the last forward pass.
    pub fn backward(&mut self) -> Result<()> {
        if self.output_grad.len() != self.n_outputs {
            return Err(Error::dimension_mismatch(
                "layer output gradient",
                self.n_outputs,
                self.output_grad.len(),
            ));
        }
        if self.input.len() != self.n_inputs {
            return Err(Error::dimension_mismatch(
                "layer input",
                self.n_inputs,
                self.input.len(),
            ));
        }
        // `input_grad` is per-sample, unlike the accumulators.
        bytemuck::fill_zeroes(&mut self.input_grad[..]);
        let n_g = self.n_inputs;
        for k in 0..self.n_outputs {
            let local = self.phi.deriv(self.output[k]) * self.output_grad[k];
            let row = k * n_g;
            for g in 0..n_g {
                self.input_grad[g] += local * self.weights[row + g];
                self.grad_weights[row + g] += self.input[g] * local;
            }
            self.grad_bias[k] += local;
        }
        Ok(())
    }

    /// One gradient descent step with learning rate `eta`, then clears the accumulators.
    pub fn update_weights(&mut self, eta: f32) {
        for (w, dw) in iter::zip(&mut self.weights, &self.grad_weights) {
            *w -= eta * dw;
        }
        for (b, db) in iter::zip(&mut self.bias, &self.grad_bias) {
            *b -= eta * db;
        }
        self.clear_deltas();
    }

    /// Zero all the `grad_weights` and `grad_bias`.
    pub fn clear_deltas(&mut self) {
        bytemuck::fill_zeroes(&mut self.grad_weights[..]);
        bytemuck::fill_zeroes(&mut self.grad_bias[..]);
    }
}
