// activation.rs
// Description: Activation strategies for dense layers. Each variant maps a whole layer of
//              pre-activation values, so layer-wide functions (softmax, min-max) fit the
//              same interface as pointwise ones.
// History:
// - 2026-10-01: Replace per-layer function objects with a plain enum strategy.
// Author: handgrad contributors

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LEAKY_RELU_ALPHA;

const GELU_CUBIC: f64 = 0.044715;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Identity,
    Relu,
    LeakyRelu { alpha: f64 },
    Sigmoid,
    /// Tanh approximation of GELU.
    Gelu,
    /// Softmax over all units of the layer.
    Softmax,
    /// `(x - min) / (max - min)` over all units of the layer.
    MinMaxNorm,
}

impl Activation {
    pub fn leaky_relu() -> Self {
        Activation::LeakyRelu {
            alpha: DEFAULT_LEAKY_RELU_ALPHA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "Identity",
            Activation::Relu => "ReLU",
            Activation::LeakyRelu { .. } => "LeakyReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Gelu => "GELU",
            Activation::Softmax => "Softmax",
            Activation::MinMaxNorm => "MinMaxNorm",
        }
    }

    /// Post-activation values for a layer's pre-activation values.
    pub fn apply(&self, v_values: &[f64]) -> Vec<f64> {
        match *self {
            Activation::Identity => v_values.to_vec(),
            Activation::Relu => v_values.iter().map(|&x| x.max(0.0)).collect(),
            Activation::LeakyRelu { alpha } => v_values
                .iter()
                .map(|&x| if x > 0.0 { x } else { alpha * x })
                .collect(),
            Activation::Sigmoid => v_values.iter().map(|&x| sigmoid(x)).collect(),
            Activation::Gelu => v_values.iter().map(|&x| gelu(x)).collect(),
            Activation::Softmax => softmax(v_values),
            Activation::MinMaxNorm => {
                let (d_min, d_max) = min_max(v_values);
                v_values.iter().map(|&x| (x - d_min) / (d_max - d_min)).collect()
            }
        }
    }

    /// Per-unit derivative of the activation at the given pre-activation values.
    ///
    /// Layer-wide functions use their diagonal term only.
    pub fn derivative(&self, v_values: &[f64]) -> Vec<f64> {
        match *self {
            Activation::Identity => vec![1.0; v_values.len()],
            Activation::Relu => v_values
                .iter()
                .map(|&x| if x > 0.0 { 1.0 } else { 0.0 })
                .collect(),
            Activation::LeakyRelu { alpha } => v_values
                .iter()
                .map(|&x| if x > 0.0 { 1.0 } else { alpha })
                .collect(),
            Activation::Sigmoid => v_values
                .iter()
                .map(|&x| {
                    let d_s = sigmoid(x);
                    d_s * (1.0 - d_s)
                })
                .collect(),
            Activation::Gelu => v_values.iter().map(|&x| gelu_derivative(x)).collect(),
            Activation::Softmax => softmax(v_values)
                .into_iter()
                .map(|d_s| d_s * (1.0 - d_s))
                .collect(),
            Activation::MinMaxNorm => {
                let (d_min, d_max) = min_max(v_values);
                vec![1.0 / (d_max - d_min); v_values.len()]
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn gelu_inner(x: f64) -> f64 {
    (2.0 / std::f64::consts::PI).sqrt() * (x + GELU_CUBIC * x.powi(3))
}

fn gelu(x: f64) -> f64 {
    0.5 * x * (1.0 + gelu_inner(x).tanh())
}

fn gelu_derivative(x: f64) -> f64 {
    let d_c = (2.0 / std::f64::consts::PI).sqrt();
    let d_t = gelu_inner(x).tanh();
    0.5 * (1.0 + d_t) + 0.5 * x * (1.0 - d_t * d_t) * d_c * (1.0 + 3.0 * GELU_CUBIC * x * x)
}

fn softmax(v_values: &[f64]) -> Vec<f64> {
    let d_max = v_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let v_exp: Vec<f64> = v_values.iter().map(|&x| (x - d_max).exp()).collect();
    let d_sum: f64 = v_exp.iter().sum();
    v_exp.into_iter().map(|d_e| d_e / d_sum).collect()
}

fn min_max(v_values: &[f64]) -> (f64, f64) {
    v_values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(d_lo, d_hi), &x| {
            (d_lo.min(x), d_hi.max(x))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_derivative(act: Activation, v_values: &[f64], i: usize) -> f64 {
        let d_h = 1e-6;
        let mut v_hi = v_values.to_vec();
        let mut v_lo = v_values.to_vec();
        v_hi[i] += d_h;
        v_lo[i] -= d_h;
        (act.apply(&v_hi)[i] - act.apply(&v_lo)[i]) / (2.0 * d_h)
    }

    #[test]
    fn pointwise_derivatives_match_finite_differences() {
        let v_x = [-1.3, -0.2, 0.4, 2.1];
        for act in [
            Activation::Sigmoid,
            Activation::Gelu,
            Activation::leaky_relu(),
            Activation::Relu,
            Activation::Identity,
        ] {
            let v_d = act.derivative(&v_x);
            for i in 0..v_x.len() {
                let d_num = numeric_derivative(act, &v_x, i);
                assert!(
                    (v_d[i] - d_num).abs() < 1e-5,
                    "{} at {}: {} vs {}",
                    act.name(),
                    v_x[i],
                    v_d[i],
                    d_num
                );
            }
        }
    }

    #[test]
    fn softmax_layer_sums_to_one() {
        let v_out = Activation::Softmax.apply(&[1.0, 2.0, 3.0]);
        let d_sum: f64 = v_out.iter().sum();
        assert!((d_sum - 1.0).abs() < 1e-12);
        assert!(v_out[2] > v_out[1] && v_out[1] > v_out[0]);
    }

    #[test]
    fn min_max_maps_to_unit_range() {
        let v_out = Activation::MinMaxNorm.apply(&[2.0, 4.0, 3.0]);
        assert_eq!(v_out, vec![0.0, 1.0, 0.5]);
        assert_eq!(Activation::MinMaxNorm.derivative(&[2.0, 4.0]), vec![0.5, 0.5]);
    }

    #[test]
    fn leaky_relu_keeps_negative_slope() {
        let act = Activation::LeakyRelu { alpha: 0.1 };
        assert_eq!(act.apply(&[-2.0, 3.0]), vec![-0.2, 3.0]);
        assert_eq!(act.derivative(&[-2.0, 3.0]), vec![0.1, 1.0]);
    }
}
