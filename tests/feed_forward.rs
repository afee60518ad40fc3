use handgrad::{FeedForwardNetwork, NetError, TrainingMethod, TrainingSession};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn linear_network_learns_sum_of_five_integers() {
    let mut network = FeedForwardNetwork::builder()
        .set_input(5)
        .set_output(1, None)
        .seed(2024)
        .build()
        .unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let mut session = TrainingSession::new(&mut network)
        .set_method(TrainingMethod::Stochastic)
        .set_learning_rate(0.001);
    for _ in 0..100_000 {
        let v_input: Vec<f64> = (0..5).map(|_| rng.random_range(-20..=20) as f64).collect();
        let d_sum: f64 = v_input.iter().sum();
        session.add_data(&v_input, &[d_sum]).unwrap();
    }
    let summary = session.end().unwrap();
    assert_eq!(summary.updates, 100_000);

    for v_input in [
        [15.0, 15.0, -15.0, 2.0, -3.0],
        [1.0, 11.0, -10.0, 1.0, -3.0],
        [7.0, 3.0, 0.0, 4.0, -2.0],
        [2.0, 2.0, 2.0, 2.0, 2.0],
        [-5.0, 1.0, 1.0, 1.0, 1.0],
    ] {
        let d_expected: f64 = v_input.iter().sum();
        let v_out = network.forward(&v_input).unwrap();
        assert!(
            (v_out[0] - d_expected).abs() < 0.5,
            "{v_input:?}: {} vs {d_expected}",
            v_out[0]
        );
    }
}

#[test]
fn wrong_input_length_is_rejected() {
    let mut network = FeedForwardNetwork::builder()
        .set_input(5)
        .set_output(1, None)
        .seed(1)
        .build()
        .unwrap();
    assert_eq!(
        network.forward(&[1.0, 2.0]),
        Err(NetError::InputSizeMismatch {
            expected: 5,
            actual: 2
        })
    );
}

#[test]
fn batch_rounds_reduce_cost() {
    let mut network = FeedForwardNetwork::builder()
        .set_input(2)
        .add_layer(3, Some(handgrad::Activation::leaky_relu()))
        .set_output(1, None)
        .seed(3)
        .build()
        .unwrap();
    let v_data = [([1.0, 0.0], 1.0), ([0.0, 1.0], -1.0), ([1.0, 1.0], 0.0)];

    let mut v_costs = Vec::new();
    for _ in 0..400 {
        let mut session = TrainingSession::new(&mut network).set_learning_rate(0.01);
        for (v_x, d_y) in &v_data {
            session.add_data(v_x, &[*d_y]).unwrap();
        }
        v_costs.push(session.end().unwrap().average_cost);
    }
    assert!(v_costs[399] < v_costs[0] * 0.5);
    assert_eq!(network.step(), 401);
}
