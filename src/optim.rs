// optim.rs
// Description: Adam moment state for one parameter tensor. Hyper-parameters come from the
//              shared AdamConfig and the step counter from the component that owns the
//              parameter, so several tensors of one block advance together.
// History:
// - 2026-10-02: Split Adam out of the layer file; step counter moved to the owner.
// - 2026-10-08: Add row-wise updates for the token embedding table.
// Author: handgrad contributors

use ndarray::Zip;

use crate::config::AdamConfig;
use crate::error::NetError;
use crate::math::Matrix;

/// First and second moment estimates for one parameter tensor.
#[derive(Clone, Debug)]
pub struct Adam {
    m_m: Matrix,
    m_v: Matrix,
}

impl Adam {
    pub fn new(t_shape: (usize, usize)) -> Self {
        Self {
            m_m: Matrix::zeros(t_shape.0, t_shape.1),
            m_v: Matrix::zeros(t_shape.0, t_shape.1),
        }
    }

    pub fn first_moment(&self) -> &Matrix {
        &self.m_m
    }

    pub fn second_moment(&self) -> &Matrix {
        &self.m_v
    }

    /// Updates the moments with `a_grads` and returns `lr * m_hat / (sqrt(v_hat) + eps)`.
    ///
    /// `i_t` is the owner's step counter and starts at 1.
    pub fn delta(
        &mut self,
        a_grads: &Matrix,
        d_lr: f64,
        i_t: u64,
        adam: &AdamConfig,
    ) -> Result<Matrix, NetError> {
        if self.m_m.shape() != a_grads.shape() {
            return Err(NetError::shape("adam", self.m_m.shape(), a_grads.shape()));
        }
        let (d_c1, d_c2) = bias_corrections(adam, i_t);
        let mut a_delta = Matrix::zeros(a_grads.rows(), a_grads.cols());

        Zip::from(a_delta.as_array_mut())
            .and(self.m_m.as_array_mut())
            .and(self.m_v.as_array_mut())
            .and(a_grads.as_array())
            .for_each(|d_out, d_m, d_v, &d_g| {
                *d_out = moment_step(adam, d_m, d_v, d_g, d_lr, d_c1, d_c2);
            });

        Ok(a_delta)
    }

    /// In-place update `params -= delta(grads)`.
    pub fn step(
        &mut self,
        a_params: &mut Matrix,
        a_grads: &Matrix,
        d_lr: f64,
        i_t: u64,
        adam: &AdamConfig,
    ) -> Result<(), NetError> {
        if a_params.shape() != a_grads.shape() {
            return Err(NetError::shape("adam", a_params.shape(), a_grads.shape()));
        }
        let a_delta = self.delta(a_grads, d_lr, i_t, adam)?;
        *a_params = a_params.subtract(&a_delta)?;
        Ok(())
    }

    /// Updates only row `i_row` of `a_params` and of the moments.
    pub fn step_row(
        &mut self,
        a_params: &mut Matrix,
        i_row: usize,
        v_grad: &[f64],
        d_lr: f64,
        i_t: u64,
        adam: &AdamConfig,
    ) -> Result<(), NetError> {
        if a_params.shape() != self.m_m.shape()
            || i_row >= a_params.rows()
            || v_grad.len() != a_params.cols()
        {
            return Err(NetError::shape("adam_row", a_params.shape(), (1, v_grad.len())));
        }
        let (d_c1, d_c2) = bias_corrections(adam, i_t);

        Zip::from(a_params.as_array_mut().row_mut(i_row))
            .and(self.m_m.as_array_mut().row_mut(i_row))
            .and(self.m_v.as_array_mut().row_mut(i_row))
            .and(v_grad)
            .for_each(|d_p, d_m, d_v, &d_g| {
                *d_p -= moment_step(adam, d_m, d_v, d_g, d_lr, d_c1, d_c2);
            });

        Ok(())
    }
}

/// `(1 - beta1^t, 1 - beta2^t)`.
pub(crate) fn bias_corrections(adam: &AdamConfig, i_t: u64) -> (f64, f64) {
    let d_t = i_t.max(1) as f64;
    (1.0 - adam.beta1.powf(d_t), 1.0 - adam.beta2.powf(d_t))
}

/// Advances one scalar's moments and returns the amount to subtract from the parameter.
pub(crate) fn moment_step(
    adam: &AdamConfig,
    d_m: &mut f64,
    d_v: &mut f64,
    d_g: f64,
    d_lr: f64,
    d_c1: f64,
    d_c2: f64,
) -> f64 {
    *d_m = adam.beta1 * *d_m + (1.0 - adam.beta1) * d_g;
    *d_v = adam.beta2 * *d_v + (1.0 - adam.beta2) * d_g * d_g;
    let d_m_hat = *d_m / d_c1;
    let d_v_hat = *d_v / d_c2;
    d_lr * d_m_hat / (d_v_hat.sqrt() + adam.epsilon)
}
