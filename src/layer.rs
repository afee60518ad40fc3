// layer.rs
// Description: Dense layer graph. Layers live in one arena and link to their neighbours by
//              index; each unit holds its outgoing weights to the next layer. Provides the
//              forward pass and the manual reverse pass producing weight and bias gradients.
// History:
// - 2026-10-01: Replace pointer linked layers with an index arena.
// - 2026-10-03: Cost derivatives are a per-call buffer returned by backward, not unit state.
// Author: handgrad contributors

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::activation::Activation;
use crate::error::NetError;
use crate::math::Matrix;

const WEIGHT_INIT_LOW: f64 = -0.5;
const WEIGHT_INIT_HIGH: f64 = 0.5;

/// Smallest computational element of a layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Unit {
    /// Pre-activation value from the last forward pass.
    pub value: f64,
    /// Post-activation value from the last forward pass.
    pub activated: f64,
    pub bias: f64,
    /// Outgoing weights, one per unit of the next layer. Empty in the output layer.
    pub weights: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Input,
    Hidden,
    Output,
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub units: Vec<Unit>,
    pub activation: Option<Activation>,
    /// Arena index of the previous layer.
    pub last: Option<usize>,
    /// Arena index of the next layer.
    pub next: Option<usize>,
}

impl Layer {
    pub fn new(i_units: usize, activation: Option<Activation>) -> Self {
        Self {
            units: vec![Unit::default(); i_units],
            activation,
            last: None,
            next: None,
        }
    }

    pub fn kind(&self) -> LayerKind {
        match (self.last, self.next) {
            (None, _) => LayerKind::Input,
            (Some(_), Some(_)) => LayerKind::Hidden,
            (Some(_), None) => LayerKind::Output,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.value).collect()
    }

    pub fn activated(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.activated).collect()
    }

    fn derivatives(&self) -> Vec<f64> {
        match self.activation {
            Some(act) => act.derivative(&self.values()),
            None => vec![1.0; self.units.len()],
        }
    }
}

/// Weight and bias deltas with the same layout as a [`LayerGraph`].
///
/// `weights[l]` is `units(l) x units(l + 1)`, `biases[l]` is `1 x units(l)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub weights: Vec<Matrix>,
    pub biases: Vec<Matrix>,
}

impl Gradient {
    pub fn zeros_like(graph: &LayerGraph) -> Self {
        let v_sizes: Vec<usize> = graph.layers.iter().map(Layer::len).collect();
        Self {
            weights: v_sizes
                .windows(2)
                .map(|w| Matrix::zeros(w[0], w[1]))
                .collect(),
            biases: v_sizes.iter().map(|&n| Matrix::zeros(1, n)).collect(),
        }
    }

    pub fn add(&self, other: &Gradient) -> Result<Gradient, NetError> {
        if self.weights.len() != other.weights.len() || self.biases.len() != other.biases.len() {
            return Err(NetError::shape(
                "gradient_add",
                (self.weights.len(), self.biases.len()),
                (other.weights.len(), other.biases.len()),
            ));
        }
        Ok(Gradient {
            weights: self
                .weights
                .iter()
                .zip(&other.weights)
                .map(|(a, b)| a.add(b))
                .collect::<Result<Vec<Matrix>, NetError>>()?,
            biases: self
                .biases
                .iter()
                .zip(&other.biases)
                .map(|(a, b)| a.add(b))
                .collect::<Result<Vec<Matrix>, NetError>>()?,
        })
    }

    pub fn scale(&self, d_factor: f64) -> Gradient {
        Gradient {
            weights: self.weights.iter().map(|a| a.multiply_scalar(d_factor)).collect(),
            biases: self.biases.iter().map(|a| a.multiply_scalar(d_factor)).collect(),
        }
    }
}

/// Result of one reverse pass.
#[derive(Clone, Debug)]
pub struct Backprop {
    pub gradient: Gradient,
    /// Cost derivative of every input unit, i.e. the gradient w.r.t. the network input.
    pub input_gradient: Vec<f64>,
}

/// Linear chain of layers stored in one arena.
#[derive(Clone, Debug)]
pub struct LayerGraph {
    layers: Vec<Layer>,
}

impl LayerGraph {
    /// Links `v_layers` in order and draws every outgoing weight uniformly from [-0.5, 0.5).
    pub fn new<R: Rng + ?Sized>(mut v_layers: Vec<Layer>, rng: &mut R) -> Result<Self, NetError> {
        if v_layers.len() < 2 {
            return Err(NetError::InvalidConfig(
                "a layer graph needs an input and an output layer".to_string(),
            ));
        }
        if let Some(i_idx) = v_layers.iter().position(Layer::is_empty) {
            return Err(NetError::InvalidConfig(format!("layer {i_idx} has no units")));
        }

        let dist = Uniform::new(WEIGHT_INIT_LOW, WEIGHT_INIT_HIGH)
            .map_err(|e| NetError::InvalidConfig(e.to_string()))?;

        let i_count = v_layers.len();
        for i_idx in 0..i_count {
            v_layers[i_idx].last = i_idx.checked_sub(1);
            v_layers[i_idx].next = if i_idx + 1 < i_count { Some(i_idx + 1) } else { None };

            let i_next_units = v_layers.get(i_idx + 1).map_or(0, Layer::len);
            for unit in v_layers[i_idx].units.iter_mut() {
                unit.weights = (0..i_next_units).map(|_| dist.sample(rng)).collect();
            }
        }

        Ok(Self { layers: v_layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, i_idx: usize) -> Option<&Layer> {
        self.layers.get(i_idx)
    }

    pub(crate) fn layer_mut(&mut self, i_idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(i_idx)
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::len)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, Layer::len)
    }

    pub fn parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.units.iter().map(|u| u.weights.len() + 1).sum::<usize>())
            .sum()
    }

    /// Loads `v_input` into the input layer and propagates it to the output layer.
    pub fn forward(&mut self, v_input: &[f64]) -> Result<(), NetError> {
        let i_expected = self.input_size();
        if v_input.len() != i_expected {
            return Err(NetError::InputSizeMismatch {
                expected: i_expected,
                actual: v_input.len(),
            });
        }

        for (unit, &d_x) in self.layers[0].units.iter_mut().zip(v_input) {
            unit.value = d_x;
            unit.activated = d_x;
        }

        let mut opt_idx = self.layers[0].next;
        while let Some(i_idx) = opt_idx {
            let Some(i_last) = self.layers[i_idx].last else {
                break;
            };

            let last = &self.layers[i_last];
            let v_sums: Vec<f64> = self.layers[i_idx]
                .units
                .iter()
                .enumerate()
                .map(|(k, unit)| {
                    last.units
                        .iter()
                        .map(|u| u.activated * u.weights[k])
                        .sum::<f64>()
                        + unit.bias
                })
                .collect();

            let layer = &mut self.layers[i_idx];
            let v_activated = match layer.activation {
                Some(act) => act.apply(&v_sums),
                None => v_sums.clone(),
            };
            for ((unit, d_sum), d_act) in layer.units.iter_mut().zip(v_sums).zip(v_activated) {
                unit.value = d_sum;
                unit.activated = d_act;
            }

            opt_idx = layer.next;
        }

        Ok(())
    }

    /// Post-activation values of the output layer.
    pub fn output(&self) -> Vec<f64> {
        self.layers.last().map(Layer::activated).unwrap_or_default()
    }

    /// Reverse pass seeded with the loss gradient w.r.t. the output layer's activations.
    ///
    /// Uses the unit values stored by the last [`forward`](Self::forward) call.
    pub fn backward(&self, v_output_gradient: &[f64]) -> Result<Backprop, NetError> {
        let i_expected = self.output_size();
        if v_output_gradient.len() != i_expected {
            return Err(NetError::GradientSizeMismatch {
                expected: i_expected,
                actual: v_output_gradient.len(),
            });
        }

        let i_count = self.layers.len();
        let i_out = i_count - 1;
        let mut v_costs: Vec<Vec<f64>> = vec![Vec::new(); i_count];
        v_costs[i_out] = v_output_gradient.to_vec();
        let mut gradient = Gradient::zeros_like(self);

        let mut opt_idx = self.layers[i_out].last;
        while let Some(i_idx) = opt_idx {
            let layer = &self.layers[i_idx];
            let Some(i_next) = layer.next else {
                break;
            };
            let next = &self.layers[i_next];

            let v_corrected: Vec<f64> = v_costs[i_next]
                .iter()
                .zip(next.derivatives())
                .map(|(d_cost, d_deriv)| d_cost * d_deriv)
                .collect();

            gradient.weights[i_idx] = Matrix::from_fn(layer.len(), next.len(), |j, k| {
                v_corrected[k] * layer.units[j].activated
            });

            v_costs[i_idx] = layer
                .units
                .iter()
                .map(|u| {
                    u.weights
                        .iter()
                        .zip(&v_corrected)
                        .map(|(d_w, d_c)| d_w * d_c)
                        .sum()
                })
                .collect();

            opt_idx = layer.last;
        }

        for (i_idx, v_cost) in v_costs.iter().enumerate() {
            gradient.biases[i_idx] = Matrix::new(1, v_cost.len(), vec![v_cost.clone()])?;
        }

        Ok(Backprop {
            gradient,
            input_gradient: v_costs.swap_remove(0),
        })
    }

    /// Subtracts precomputed deltas (same layout as [`Gradient`]) from weights and biases.
    pub(crate) fn apply_deltas(&mut self, deltas: &Gradient) -> Result<(), NetError> {
        let reference = Gradient::zeros_like(self);
        for (a_ref, a_delta) in reference
            .weights
            .iter()
            .chain(&reference.biases)
            .zip(deltas.weights.iter().chain(&deltas.biases))
        {
            if a_ref.shape() != a_delta.shape() {
                return Err(NetError::shape("apply_deltas", a_ref.shape(), a_delta.shape()));
            }
        }
        if reference.weights.len() != deltas.weights.len()
            || reference.biases.len() != deltas.biases.len()
        {
            return Err(NetError::shape(
                "apply_deltas",
                (reference.weights.len(), reference.biases.len()),
                (deltas.weights.len(), deltas.biases.len()),
            ));
        }

        for (i_idx, layer) in self.layers.iter_mut().enumerate() {
            for (j, unit) in layer.units.iter_mut().enumerate() {
                if let Some(a_w) = deltas.weights.get(i_idx) {
                    for (k, d_w) in unit.weights.iter_mut().enumerate() {
                        *d_w -= a_w.get(j, k);
                    }
                }
                unit.bias -= deltas.biases[i_idx].get(0, j);
            }
        }
        Ok(())
    }
}
