use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use perceptron::{
    DynActivationFunction, DynLossFunction, NeuralNetwork, Result, Topology, Vector,
    activation_functions, dataset, loss_functions,
};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Train a multi-layer perceptron classifier on a CSV dataset.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Header-less CSV file, every line holding the features followed by a class label.
    data: PathBuf,

    /// Number of leading feature columns.
    #[arg(long, default_value_t = 4)]
    features: usize,

    /// Widths of the hidden layers.
    #[arg(long, value_delimiter = ',', default_values_t = [6, 6, 6])]
    hidden: Vec<usize>,

    /// Number of classes. Defaults to the highest label plus one.
    #[arg(long)]
    classes: Option<usize>,

    #[arg(long, value_enum, default_value_t = Activation::Sigmoid)]
    activation: Activation,

    #[arg(long, value_enum, default_value_t = Loss::Error)]
    loss: Loss,

    /// Learning rate.
    #[arg(long, default_value_t = 0.02)]
    eta: f32,

    /// Maximum number of epochs. Training stops early once every sample is classified
    /// correctly.
    #[arg(long, default_value_t = 25_000)]
    epochs: usize,

    /// Lower bound of the normalized feature range.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    min: f32,

    /// Upper bound of the normalized feature range.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    max: f32,

    /// Seed for weight initialization. Random if not given.
    #[arg(long)]
    seed: Option<u64>,

    /// Log per-epoch progress and the trained parameters.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Activation {
    Sigmoid,
    Tanh,
    Relu,
    Identity,
}

impl Activation {
    fn function(self) -> DynActivationFunction {
        match self {
            Self::Sigmoid => DynActivationFunction::new(activation_functions::Sigmoid),
            Self::Tanh => DynActivationFunction::new(activation_functions::Tanh),
            Self::Relu => DynActivationFunction::new(activation_functions::Relu),
            Self::Identity => DynActivationFunction::new(activation_functions::Identity),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Loss {
    Error,
    Absolute,
    Mse,
}

impl Loss {
    fn function(self) -> DynLossFunction {
        match self {
            Self::Error => DynLossFunction::new(loss_functions::ErrorLoss),
            Self::Absolute => DynLossFunction::new(loss_functions::AbsoluteLoss),
            Self::Mse => DynLossFunction::new(loss_functions::MseLoss),
        }
    }
}

fn run(args: Args) -> Result<()> {
    let (mut samples, labels) = dataset::load_csv(&args.data, args.features)?;
    dataset::normalize(&mut samples, args.min..=args.max)?;

    let n_classes = match args.classes {
        Some(n_classes) => n_classes,
        None => dataset::n_classes(&labels)?,
    };
    let mut dimensions = Vec::with_capacity(args.hidden.len() + 2);
    dimensions.push(args.features);
    dimensions.extend_from_slice(&args.hidden);
    dimensions.push(n_classes);
    let topology = Topology::new(dimensions)?.with_dyn_activation(args.activation.function());

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut nn = NeuralNetwork::new(topology, &mut rng)?
        .with_dyn_loss(args.loss.function())
        .with_eta(args.eta);

    info!(
        samples = samples.len(),
        classes = n_classes,
        loss = nn.loss_mean(&samples, &labels)?,
        "untrained"
    );

    let mut epoch = 0usize;
    let epochs = nn.train_with(&samples, &labels, args.epochs, |nn: &mut NeuralNetwork| {
        epoch += 1;
        report_epoch(nn, &samples, &labels, epoch)
    })?;

    info!(epochs, loss = nn.loss_mean(&samples, &labels)?, "trained");
    let results = nn.test(&samples, &labels)?;
    info!("final accuracy: {results}");

    for i_layer in 0..nn.n_layers() {
        if let Some(layer) = nn.pretty_print_layer(i_layer) {
            debug!("layer #{i_layer}\n{layer}");
        }
    }
    Ok(())
}

/// Logs accuracy and loss after an epoch. Returns `true` once training should stop, either
/// because every sample is classified correctly or because the network cannot be evaluated.
fn report_epoch(
    nn: &mut NeuralNetwork,
    samples: &[Vector],
    labels: &[usize],
    epoch: usize,
) -> bool {
    let results = match nn.test(samples, labels) {
        Ok(results) => results,
        Err(err) => {
            warn!("stopping, could not evaluate the network: {err}");
            return true;
        }
    };
    let loss = match nn.loss_mean(samples, labels) {
        Ok(loss) => loss,
        Err(err) => {
            warn!("stopping, could not compute the loss: {err}");
            return true;
        }
    };
    debug!(epoch, accuracy = results.accuracy, loss, "epoch");
    results.accuracy >= 1.0
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = match args.verbose {
        true => "debug",
        false => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
