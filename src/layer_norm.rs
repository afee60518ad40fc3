// layer_norm.rs
// Description: Per-token layer normalization with learned scale (gamma) and shift (beta).
// History:
// - 2026-10-08: Normalize each row across its features and cache the row variance.
// - 2026-10-13: Upstream gradient is the scaled pass-through G * gamma / sqrt(var + eps).
// Author: handgrad contributors

use crate::block::Block;
use crate::config::{AdamConfig, DEFAULT_LAYER_NORM_EPSILON};
use crate::error::NetError;
use crate::math::{Along, Matrix};
use crate::optim::Adam;

#[derive(Clone, Debug)]
pub struct LayerNormBlock {
    d_epsilon: f64,
    gamma: Matrix,
    beta: Matrix,
    opt_gamma: Adam,
    opt_beta: Adam,
    adam: AdamConfig,
    i_step: u64,
    /// Normalized input and per-row variance (`rows x 1`) of the last forward pass.
    opt_cache: Option<(Matrix, Matrix)>,
}

impl LayerNormBlock {
    pub fn new(i_dim: usize, adam: AdamConfig) -> Self {
        Self {
            d_epsilon: DEFAULT_LAYER_NORM_EPSILON,
            gamma: Matrix::from_fn(1, i_dim, |_, _| 1.0),
            beta: Matrix::zeros(1, i_dim),
            opt_gamma: Adam::new((1, i_dim)),
            opt_beta: Adam::new((1, i_dim)),
            adam,
            i_step: 1,
            opt_cache: None,
        }
    }

    pub fn gamma(&self) -> &Matrix {
        &self.gamma
    }

    pub fn beta(&self) -> &Matrix {
        &self.beta
    }
}

impl Block for LayerNormBlock {
    fn block_type(&self) -> &str {
        "LayerNorm"
    }

    fn forward(&mut self, a_input: &Matrix) -> Result<Matrix, NetError> {
        if a_input.cols() != self.gamma.cols() {
            return Err(NetError::shape("layer_norm", a_input.shape(), self.gamma.shape()));
        }

        let a_mean = a_input.mean_along(Along::Row);
        let a_var = a_input.variance_along(Along::Row);
        let d_eps = self.d_epsilon;
        let a_norm =
            a_input.map(|x, i, _| (x - a_mean.get(i, 0)) / (a_var.get(i, 0) + d_eps).sqrt());
        let a_out = a_norm.map(|x, _, j| x * self.gamma.get(0, j) + self.beta.get(0, j));

        self.opt_cache = Some((a_norm, a_var));
        Ok(a_out)
    }

    fn backward(&mut self, a_grads: &Matrix, d_lr: f64) -> Result<Matrix, NetError> {
        let (a_norm, a_var) = self
            .opt_cache
            .as_ref()
            .ok_or(NetError::MissingForward("LayerNorm"))?;
        if a_grads.shape() != a_norm.shape() {
            return Err(NetError::shape("layer_norm_backward", a_norm.shape(), a_grads.shape()));
        }

        let a_grad_gamma = a_grads.hadamard(a_norm)?.sum_along(Along::Col);
        let a_grad_beta = a_grads.sum_along(Along::Col);

        let d_eps = self.d_epsilon;
        let a_grad_input = a_grads.map(|g, i, j| {
            g * self.gamma.get(0, j) / (a_var.get(i, 0) + d_eps).sqrt()
        });

        let i_t = self.i_step;
        self.opt_gamma
            .step(&mut self.gamma, &a_grad_gamma, d_lr, i_t, &self.adam)?;
        self.opt_beta
            .step(&mut self.beta, &a_grad_beta, d_lr, i_t, &self.adam)?;
        self.i_step += 1;

        Ok(a_grad_input)
    }

    fn parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_row_maps_to_beta() {
        let mut ln = LayerNormBlock::new(3, AdamConfig::default());
        ln.beta = Matrix::from_rows(vec![vec![0.5, -1.0, 2.0]]).unwrap();
        let a_y = ln
            .forward(&Matrix::from_rows(vec![vec![7.0, 7.0, 7.0]]).unwrap())
            .unwrap();
        assert_eq!(a_y.row(0), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn rows_are_normalized_independently() {
        let mut ln = LayerNormBlock::new(4, AdamConfig::default());
        let a_x = Matrix::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![-10.0, 0.0, 10.0, 20.0],
        ])
        .unwrap();
        let a_y = ln.forward(&a_x).unwrap();
        let a_mean = a_y.mean_along(Along::Row);
        let a_var = a_y.variance_along(Along::Row);
        for i in 0..2 {
            assert!(a_mean.get(i, 0).abs() < 1e-12);
            assert!((a_var.get(i, 0) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn backward_moves_gamma_and_beta_and_scales_gradient() {
        let mut ln = LayerNormBlock::new(2, AdamConfig::default());
        let a_x = Matrix::from_rows(vec![vec![1.0, 3.0]]).unwrap();
        ln.forward(&a_x).unwrap();

        // Row variance is 1, so the upstream gradient is G / sqrt(1 + eps).
        let a_g = Matrix::from_rows(vec![vec![1.0, 1.0]]).unwrap();
        let a_in = ln.backward(&a_g, 0.1).unwrap();
        let d_expected = 1.0 / (1.0 + DEFAULT_LAYER_NORM_EPSILON).sqrt();
        assert!((a_in.get(0, 0) - d_expected).abs() < 1e-12);

        // x_hat = [-1, 1]: dGamma = [-1, 1], dBeta = [1, 1].
        assert!((ln.gamma().get(0, 0) - 1.1).abs() < 1e-6);
        assert!((ln.gamma().get(0, 1) - 0.9).abs() < 1e-6);
        assert!((ln.beta().get(0, 0) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut ln = LayerNormBlock::new(2, AdamConfig::default());
        assert!(matches!(
            ln.backward(&Matrix::zeros(1, 2), 0.1),
            Err(NetError::MissingForward("LayerNorm"))
        ));
    }
}
