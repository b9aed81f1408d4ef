use perceptron::{
    NeuralNetwork, Topology, Vector,
    activation_functions::Tanh,
    dataset,
    loss_functions::{AbsoluteLoss, MseLoss},
};
use rand::{SeedableRng, rngs::StdRng};

fn tiny_dataset() -> (Vec<Vector>, Vec<usize>) {
    (vec![vec![0.0, 0.0], vec![1.0, 1.0]], vec![0, 1])
}

#[test]
fn loss_does_not_increase_on_tiny_dataset() {
    let (samples, labels) = tiny_dataset();
    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut nn = NeuralNetwork::with_dimensions(&[2, 3, 2], &mut rng)
            .unwrap()
            .with_eta(0.1);
        let untrained = nn.loss_mean(&samples, &labels).unwrap();
        nn.train(&samples, &labels, 500).unwrap();
        let trained = nn.loss_mean(&samples, &labels).unwrap();
        assert!(
            trained <= untrained,
            "seed {seed}: loss went from {untrained} to {trained}"
        );
    }
}

#[test]
fn mse_loss_decreases_across_checkpoints() {
    let (samples, labels) = tiny_dataset();
    let mut rng = StdRng::seed_from_u64(1234);
    let mut nn = NeuralNetwork::with_dimensions(&[2, 3, 2], &mut rng)
        .unwrap()
        .with_loss(MseLoss)
        .with_eta(0.1);
    let mut checkpoints = vec![nn.loss_mean(&samples, &labels).unwrap()];
    for _ in 0..5 {
        nn.train(&samples, &labels, 200).unwrap();
        checkpoints.push(nn.loss_mean(&samples, &labels).unwrap());
    }
    assert!(
        checkpoints.last().unwrap() < checkpoints.first().unwrap(),
        "{checkpoints:?}"
    );
}

#[test]
fn trains_a_separable_csv_dataset_to_full_accuracy() {
    let csv = "\
        10,200,0\n\
        12,180,0\n\
        11,220,0\n\
        30,900,1\n\
        32,950,1\n\
        29,880,1\n\
        50,400,2\n\
        52,420,2\n\
        49,380,2\n";
    let (mut samples, labels) = dataset::read_csv(csv.as_bytes(), 2).unwrap();
    dataset::normalize(&mut samples, 0.0..=1.0).unwrap();
    assert!(samples.iter().flatten().all(|x| (0.0..=1.0).contains(x)));

    let mut rng = StdRng::seed_from_u64(5);
    let topology = Topology::new([2, 8, 3]).unwrap().with_activation(Tanh);
    let mut nn = NeuralNetwork::new(topology, &mut rng)
        .unwrap()
        .with_loss(MseLoss)
        .with_eta(0.1);

    let max_epochs = 20_000;
    let epochs = nn
        .train_with(&samples, &labels, max_epochs, |nn: &mut NeuralNetwork| {
            nn.test(&samples, &labels).unwrap().accuracy >= 1.0
        })
        .unwrap();
    assert!(epochs < max_epochs);
    let results = nn.test(&samples, &labels).unwrap();
    assert_eq!(results.correct, 9);
    assert_eq!(results.accuracy, 1.0);
}

#[test]
fn absolute_loss_trains_without_error() {
    let (samples, labels) = tiny_dataset();
    let mut rng = StdRng::seed_from_u64(9);
    let mut nn = NeuralNetwork::with_dimensions(&[2, 3, 2], &mut rng)
        .unwrap()
        .with_loss(AbsoluteLoss)
        .with_eta(0.1);
    assert_eq!(nn.train(&samples, &labels, 20).unwrap(), 20);
    assert_eq!(nn.output().len(), 2);
    assert!(nn.output().iter().all(|x| x.is_finite()));
}

#[test]
fn labels_outside_the_output_range_fail_training() {
    let (samples, _) = tiny_dataset();
    let mut rng = StdRng::seed_from_u64(0);
    let mut nn = NeuralNetwork::with_dimensions(&[2, 2], &mut rng).unwrap();
    assert!(matches!(
        nn.train(&samples, &[0, 2], 1),
        Err(perceptron::Error::InvalidInput(_))
    ));
}
