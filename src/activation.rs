use std::fmt::{self, Debug};

/// Type-erased handle to an [`ActivationFunction`], small enough to be stored per layer.
#[derive(Clone, Copy)]
pub struct DynActivationFunction {
    name: &'static str,
    apply: fn(f32) -> f32,
    deriv: fn(f32) -> f32,
}

impl Debug for DynActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self.name, f)
    }
}

impl PartialEq for DynActivationFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Default for DynActivationFunction {
    fn default() -> Self {
        Self::new(activation_functions::Sigmoid)
    }
}

impl DynActivationFunction {
    pub fn new<Phi: ActivationFunction>(_: Phi) -> Self {
        Self {
            name: Phi::NAME,
            apply: Phi::apply,
            deriv: Phi::deriv,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, x: f32) -> f32 {
        (self.apply)(x)
    }

    /// `y` is the already activated value, see [`ActivationFunction::deriv`].
    pub fn deriv(&self, y: f32) -> f32 {
        (self.deriv)(y)
    }
}

pub trait ActivationFunction: Send + Sync + 'static {
    const NAME: &'static str;

    fn apply(x: f32) -> f32;

    /// Derivative of `apply`, expressed in terms of its output.
    ///
    /// Takes `y = apply(x)`, not `x`. Layers only keep their activated outputs around, so
    /// back propagation never has the pre-activation value at hand.
    fn deriv(y: f32) -> f32;
}

pub mod activation_functions {
    use super::ActivationFunction;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Identity;
    impl ActivationFunction for Identity {
        const NAME: &'static str = "identity";

        fn apply(x: f32) -> f32 {
            x
        }

        fn deriv(_: f32) -> f32 {
            1.0
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Sigmoid;
    impl ActivationFunction for Sigmoid {
        const NAME: &'static str = "sigmoid";

        fn apply(x: f32) -> f32 {
            1.0 / (1.0 + f32::exp(-x))
        }

        fn deriv(y: f32) -> f32 {
            (1.0 - y) * y
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Tanh;
    impl ActivationFunction for Tanh {
        const NAME: &'static str = "tanh";

        fn apply(x: f32) -> f32 {
            f32::tanh(x)
        }

        fn deriv(y: f32) -> f32 {
            1.0 - y * y
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Relu;
    impl ActivationFunction for Relu {
        const NAME: &'static str = "relu";

        fn apply(x: f32) -> f32 {
            x.max(0.0)
        }

        fn deriv(y: f32) -> f32 {
            match y > 0.0 {
                true => 1.0,
                false => 0.0,
            }
        }
    }
}
