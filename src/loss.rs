use std::{
    fmt::{self, Debug},
    iter,
};

use crate::{Error, Result};

/// Type-erased handle to a [`LossFunction`].
///
/// Unlike the trait functions, the handle checks operand lengths and reports a
/// [`Error::DimensionMismatch`] instead of relying on the caller.
#[derive(Clone, Copy)]
pub struct DynLossFunction {
    name: &'static str,
    value: fn(&[f32], &[f32]) -> f32,
    gradient: fn(&[f32], &[f32], &mut [f32]),
}

impl Debug for DynLossFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self.name, f)
    }
}

impl PartialEq for DynLossFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Default for DynLossFunction {
    fn default() -> Self {
        Self::new(loss_functions::ErrorLoss)
    }
}

impl DynLossFunction {
    pub fn new<L: LossFunction>(_: L) -> Self {
        Self {
            name: L::NAME,
            value: L::value,
            gradient: L::gradient,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self, predicted: &[f32], observed: &[f32]) -> Result<f32> {
        check_len("observed", predicted.len(), observed.len())?;
        Ok((self.value)(predicted, observed))
    }

    pub fn gradient(&self, predicted: &[f32], observed: &[f32], result: &mut [f32]) -> Result<()> {
        check_len("observed", predicted.len(), observed.len())?;
        check_len("gradient result", predicted.len(), result.len())?;
        (self.gradient)(predicted, observed, result);
        Ok(())
    }
}

fn check_len(what: &str, expected: usize, found: usize) -> Result<()> {
    match expected == found {
        true => Ok(()),
        false => Err(Error::dimension_mismatch(what, expected, found)),
    }
}

/// A scalar cost over a prediction and its gradient with respect to the prediction.
///
/// All slices passed to these functions must be of the same length.
pub trait LossFunction: Send + Sync + 'static {
    const NAME: &'static str;

    fn value(predicted: &[f32], observed: &[f32]) -> f32;

    /// Writes `∂value/∂predicted` into `result`.
    fn gradient(predicted: &[f32], observed: &[f32], result: &mut [f32]);
}

pub mod loss_functions {
    use super::*;

    fn sum_abs_diff(predicted: &[f32], observed: &[f32]) -> f32 {
        iter::zip(predicted, observed)
            .map(|(&p, &o)| (p - o).abs())
            .sum()
    }

    /// `Σ|p - o|`, with the plain difference `p - o` as its gradient.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorLoss;
    impl LossFunction for ErrorLoss {
        const NAME: &'static str = "error";

        fn value(predicted: &[f32], observed: &[f32]) -> f32 {
            sum_abs_diff(predicted, observed)
        }

        fn gradient(predicted: &[f32], observed: &[f32], result: &mut [f32]) {
            for ((r, &p), &o) in iter::zip(iter::zip(result, predicted), observed) {
                *r = p - o;
            }
        }
    }

    /// `Σ|p - o|`, with gradient `sign(p - o) / N`.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct AbsoluteLoss;
    impl LossFunction for AbsoluteLoss {
        const NAME: &'static str = "absolute";

        fn value(predicted: &[f32], observed: &[f32]) -> f32 {
            sum_abs_diff(predicted, observed)
        }

        fn gradient(predicted: &[f32], observed: &[f32], result: &mut [f32]) {
            let factor = 1.0 / predicted.len() as f32;
            for ((r, &p), &o) in iter::zip(iter::zip(result, predicted), observed) {
                let diff = p - o;
                *r = if diff < 0.0 {
                    -factor
                } else if diff > 0.0 {
                    factor
                } else {
                    0.0
                };
            }
        }
    }

    /// Mean squared error.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct MseLoss;
    impl LossFunction for MseLoss {
        const NAME: &'static str = "mse";

        fn value(predicted: &[f32], observed: &[f32]) -> f32 {
            let sum: f32 = iter::zip(predicted, observed)
                .map(|(&p, &o)| (p - o).powi(2))
                .sum();
            sum / predicted.len() as f32
        }

        fn gradient(predicted: &[f32], observed: &[f32], result: &mut [f32]) {
            let factor = 2.0 / predicted.len() as f32;
            for ((r, &p), &o) in iter::zip(iter::zip(result, predicted), observed) {
                *r = factor * (p - o);
            }
        }
    }
}
