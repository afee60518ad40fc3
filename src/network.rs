// network.rs
// Description: Feed-forward network over a dense layer graph with Adam updates, its
//              builder, and the adapter that runs it row by row inside a sequence model.
// History:
// - 2026-10-03: Network owns the Adam moments of every weight and bias tensor and one
//               global step counter.
// - 2026-10-07: Add FeedForwardBlock with cached forward rows.
// Author: handgrad contributors

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::activation::Activation;
use crate::block::Block;
use crate::config::{AdamConfig, LayerSpec};
use crate::error::NetError;
use crate::layer::{Backprop, Gradient, Layer, LayerGraph};
use crate::math::Matrix;
use crate::optim::Adam;

#[derive(Clone, Debug)]
pub struct FeedForwardNetwork {
    graph: LayerGraph,
    v_adam_weights: Vec<Adam>,
    v_adam_biases: Vec<Adam>,
    adam: AdamConfig,
    i_step: u64,
}

impl FeedForwardNetwork {
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::default()
    }

    pub fn from_graph(graph: LayerGraph, adam: AdamConfig) -> Self {
        let shapes = Gradient::zeros_like(&graph);
        Self {
            v_adam_weights: shapes.weights.iter().map(|a| Adam::new(a.shape())).collect(),
            v_adam_biases: shapes.biases.iter().map(|a| Adam::new(a.shape())).collect(),
            graph,
            adam,
            i_step: 1,
        }
    }

    pub fn graph(&self) -> &LayerGraph {
        &self.graph
    }

    pub fn input_size(&self) -> usize {
        self.graph.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.graph.output_size()
    }

    /// Adam step used by the next update. Starts at 1.
    pub fn step(&self) -> u64 {
        self.i_step
    }

    pub fn parameters(&self) -> usize {
        self.graph.parameters()
    }

    /// Runs one sample and returns the output layer's activations.
    pub fn forward(&mut self, v_input: &[f64]) -> Result<Vec<f64>, NetError> {
        self.graph.forward(v_input)?;
        Ok(self.graph.output())
    }

    pub fn output(&self) -> Vec<f64> {
        self.graph.output()
    }

    /// Squared error `sum (desired - output)^2` of the last forward pass.
    pub fn cost(&self, v_desired: &[f64]) -> Result<f64, NetError> {
        let v_output = self.output();
        if v_desired.len() != v_output.len() {
            return Err(NetError::GradientSizeMismatch {
                expected: v_output.len(),
                actual: v_desired.len(),
            });
        }
        Ok(v_desired
            .iter()
            .zip(&v_output)
            .map(|(d, o)| (d - o).powi(2))
            .sum())
    }

    pub fn compute_gradient(&self, v_output_gradient: &[f64]) -> Result<Backprop, NetError> {
        self.graph.backward(v_output_gradient)
    }

    /// One Adam update of every weight and bias, then advances the step counter.
    pub fn apply_gradient(&mut self, gradient: &Gradient, d_lr: f64) -> Result<(), NetError> {
        let expected = Gradient::zeros_like(&self.graph);
        let b_shapes_match = expected.weights.len() == gradient.weights.len()
            && expected.biases.len() == gradient.biases.len()
            && expected
                .weights
                .iter()
                .chain(&expected.biases)
                .zip(gradient.weights.iter().chain(&gradient.biases))
                .all(|(a, b)| a.shape() == b.shape());
        if !b_shapes_match {
            return Err(NetError::InvalidConfig(
                "gradient does not match the network layout".to_string(),
            ));
        }

        let deltas = Gradient {
            weights: self
                .v_adam_weights
                .iter_mut()
                .zip(&gradient.weights)
                .map(|(opt, a_g)| opt.delta(a_g, d_lr, self.i_step, &self.adam))
                .collect::<Result<Vec<Matrix>, NetError>>()?,
            biases: self
                .v_adam_biases
                .iter_mut()
                .zip(&gradient.biases)
                .map(|(opt, a_g)| opt.delta(a_g, d_lr, self.i_step, &self.adam))
                .collect::<Result<Vec<Matrix>, NetError>>()?,
        };

        self.graph.apply_deltas(&deltas)?;
        self.i_step += 1;
        Ok(())
    }

    /// Computes and applies the gradient for the last forward pass; returns the
    /// gradient w.r.t. the network input.
    pub fn backpropagate(
        &mut self,
        v_output_gradient: &[f64],
        d_lr: f64,
    ) -> Result<Vec<f64>, NetError> {
        let Backprop {
            gradient,
            input_gradient,
        } = self.compute_gradient(v_output_gradient)?;
        self.apply_gradient(&gradient, d_lr)?;
        Ok(input_gradient)
    }
}

#[derive(Clone, Debug, Default)]
pub struct NetworkBuilder {
    opt_input: Option<usize>,
    v_hidden: Vec<LayerSpec>,
    opt_output: Option<LayerSpec>,
    opt_seed: Option<u64>,
    adam: AdamConfig,
}

impl NetworkBuilder {
    pub fn set_input(mut self, i_units: usize) -> Self {
        self.opt_input = Some(i_units);
        self
    }

    pub fn add_layer(mut self, i_units: usize, activation: Option<Activation>) -> Self {
        self.v_hidden.push(LayerSpec::new(i_units, activation));
        self
    }

    pub fn set_output(mut self, i_units: usize, activation: Option<Activation>) -> Self {
        self.opt_output = Some(LayerSpec::new(i_units, activation));
        self
    }

    pub fn seed(mut self, u64_seed: u64) -> Self {
        self.opt_seed = Some(u64_seed);
        self
    }

    pub fn adam(mut self, adam: AdamConfig) -> Self {
        self.adam = adam;
        self
    }

    /// Builds with the configured seed, or with the thread RNG when none is set.
    pub fn build(self) -> Result<FeedForwardNetwork, NetError> {
        let mut rng = match self.opt_seed {
            Some(u64_seed) => StdRng::seed_from_u64(u64_seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        self.build_with_rng(&mut rng)
    }

    /// Builds drawing initial weights from `rng`; the builder's seed is ignored.
    pub fn build_with_rng<R: Rng + ?Sized>(
        self,
        rng: &mut R,
    ) -> Result<FeedForwardNetwork, NetError> {
        let i_input = self
            .opt_input
            .ok_or_else(|| NetError::InvalidConfig("input layer not set".to_string()))?;
        let output = self
            .opt_output
            .ok_or_else(|| NetError::InvalidConfig("output layer not set".to_string()))?;
        self.adam.validate()?;

        let mut v_layers = Vec::with_capacity(self.v_hidden.len() + 2);
        v_layers.push(Layer::new(i_input, None));
        v_layers.extend(
            self.v_hidden
                .iter()
                .map(|l| Layer::new(l.units, l.activation)),
        );
        v_layers.push(Layer::new(output.units, output.activation));

        let graph = LayerGraph::new(v_layers, rng)?;
        Ok(FeedForwardNetwork::from_graph(graph, self.adam))
    }
}

/// Runs a network independently on every row of a sequence.
#[derive(Clone, Debug)]
pub struct FeedForwardBlock {
    network: FeedForwardNetwork,
    opt_cached: Option<Vec<Vec<f64>>>,
}

impl FeedForwardBlock {
    pub fn new(network: FeedForwardNetwork) -> Self {
        Self {
            network,
            opt_cached: None,
        }
    }

    pub fn network(&self) -> &FeedForwardNetwork {
        &self.network
    }
}

impl Block for FeedForwardBlock {
    fn block_type(&self) -> &str {
        "FeedForward"
    }

    fn forward(&mut self, a_input: &Matrix) -> Result<Matrix, NetError> {
        let i_in = self.network.input_size();
        if a_input.cols() != i_in {
            return Err(NetError::shape(
                "feed_forward",
                a_input.shape(),
                (a_input.rows(), i_in),
            ));
        }

        let v_rows = a_input.to_rows();
        let mut v_out = Vec::with_capacity(v_rows.len());
        for v_row in &v_rows {
            v_out.push(self.network.forward(v_row)?);
        }
        self.opt_cached = Some(v_rows);

        Matrix::new(a_input.rows(), self.network.output_size(), v_out)
    }

    fn backward(&mut self, a_grads: &Matrix, d_lr: f64) -> Result<Matrix, NetError> {
        let v_cached = self
            .opt_cached
            .as_ref()
            .ok_or(NetError::MissingForward("FeedForward"))?;
        if a_grads.rows() != v_cached.len() || a_grads.cols() != self.network.output_size() {
            return Err(NetError::shape(
                "feed_forward_backward",
                (v_cached.len(), self.network.output_size()),
                a_grads.shape(),
            ));
        }

        let mut v_input_grads = Vec::with_capacity(v_cached.len());
        for (i_row, v_row) in v_cached.iter().enumerate() {
            self.network.forward(v_row)?;
            v_input_grads.push(self.network.backpropagate(&a_grads.row(i_row), d_lr)?);
        }

        Matrix::new(v_cached.len(), self.network.input_size(), v_input_grads)
    }

    fn parameters(&self) -> usize {
        self.network.parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(i_in: usize, i_out: usize, u64_seed: u64) -> FeedForwardNetwork {
        FeedForwardNetwork::builder()
            .set_input(i_in)
            .set_output(i_out, None)
            .seed(u64_seed)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_input_and_output() {
        assert!(matches!(
            FeedForwardNetwork::builder().set_output(1, None).build(),
            Err(NetError::InvalidConfig(_))
        ));
        assert!(matches!(
            FeedForwardNetwork::builder().set_input(1).build(),
            Err(NetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn same_seed_gives_same_network() {
        let mut a = linear(3, 2, 9);
        let mut b = linear(3, 2, 9);
        assert_eq!(
            a.forward(&[1.0, 2.0, 3.0]).unwrap(),
            b.forward(&[1.0, 2.0, 3.0]).unwrap()
        );
    }

    #[test]
    fn cost_is_squared_error() {
        let mut net = linear(2, 2, 1);
        let v_out = net.forward(&[0.5, -0.5]).unwrap();
        let d_cost = net.cost(&[1.0, 0.0]).unwrap();
        let d_expected = (1.0 - v_out[0]).powi(2) + v_out[1].powi(2);
        assert!((d_cost - d_expected).abs() < 1e-12);
    }

    #[test]
    fn step_counter_advances_once_per_update() {
        let mut net = linear(2, 1, 2);
        assert_eq!(net.step(), 1);
        net.forward(&[1.0, 1.0]).unwrap();
        net.backpropagate(&[0.5], 0.01).unwrap();
        net.forward(&[1.0, 1.0]).unwrap();
        net.backpropagate(&[0.5], 0.01).unwrap();
        assert_eq!(net.step(), 3);
    }

    #[test]
    fn repeated_updates_reduce_cost() {
        let mut net = FeedForwardNetwork::builder()
            .set_input(2)
            .add_layer(4, Some(Activation::Sigmoid))
            .set_output(1, None)
            .seed(3)
            .build()
            .unwrap();

        net.forward(&[0.3, 0.7]).unwrap();
        let d_first = net.cost(&[2.0]).unwrap();
        for _ in 0..300 {
            let v_out = net.forward(&[0.3, 0.7]).unwrap();
            net.backpropagate(&[-2.0 * (2.0 - v_out[0])], 0.01).unwrap();
        }
        net.forward(&[0.3, 0.7]).unwrap();
        assert!(net.cost(&[2.0]).unwrap() < d_first * 0.1);
    }

    #[test]
    fn mismatched_gradient_layout_is_rejected() {
        let mut net = linear(2, 1, 4);
        let other = linear(3, 1, 4);
        let g = Gradient::zeros_like(other.graph());
        assert!(net.apply_gradient(&g, 0.1).is_err());
        assert_eq!(net.step(), 1);
    }

    #[test]
    fn block_maps_every_row_and_backward_needs_forward() {
        let mut block = FeedForwardBlock::new(linear(3, 3, 5));
        assert_eq!(
            block.backward(&Matrix::zeros(1, 3), 0.1),
            Err(NetError::MissingForward("FeedForward"))
        );

        let a_x = Matrix::from_rows(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap();
        let a_y = block.forward(&a_x).unwrap();
        assert_eq!(a_y.shape(), (2, 3));

        let mut net = linear(3, 3, 5);
        assert_eq!(a_y.row(1), net.forward(&[0.0, 1.0, 0.0]).unwrap());

        let a_g = block.backward(&Matrix::zeros(2, 3), 0.1).unwrap();
        assert_eq!(a_g.shape(), (2, 3));
        assert!(block.backward(&Matrix::zeros(3, 3), 0.1).is_err());
    }
}
