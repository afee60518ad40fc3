// attention.rs
// Description: Single-head self-attention block with a residual connection. Owns the
//              query, key, value and output projections and one Adam moment pair each.
// History:
// - 2026-10-08: Add output projection Wout.
// - 2026-10-12: Backward keeps the direct score gradient (no softmax Jacobian) and
//               computes the input gradient before any weight moves.
// - 2026-10-18: Scores are multiplied by sqrt(d) before the row softmax.
// Author: handgrad contributors

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::block::Block;
use crate::config::AdamConfig;
use crate::error::NetError;
use crate::math::Matrix;
use crate::optim::Adam;

/// Values from the last forward pass.
#[derive(Clone, Debug)]
struct AttentionCache {
    a_x: Matrix,
    a_q: Matrix,
    a_k: Matrix,
    a_v: Matrix,
    a_s: Matrix,
    a_c: Matrix,
}

#[derive(Clone, Debug)]
struct AttentionGrads {
    a_w_q: Matrix,
    a_w_k: Matrix,
    a_w_v: Matrix,
    a_w_out: Matrix,
    a_input: Matrix,
}

#[derive(Clone, Debug)]
pub struct AttentionBlock {
    i_dim: usize,
    w_q: Matrix,
    w_k: Matrix,
    w_v: Matrix,
    w_out: Matrix,
    opt_w_q: Adam,
    opt_w_k: Adam,
    opt_w_v: Adam,
    opt_w_out: Adam,
    adam: AdamConfig,
    i_step: u64,
    opt_cache: Option<AttentionCache>,
}

impl AttentionBlock {
    pub fn new(i_dim: usize, adam: AdamConfig) -> Result<Self, NetError> {
        Self::with_rng(i_dim, adam, &mut rand::rng())
    }

    /// Draws all four projections uniformly from [-a/2, a/2) with `a = sqrt(1/d)`.
    pub fn with_rng<R: Rng + ?Sized>(
        i_dim: usize,
        adam: AdamConfig,
        rng: &mut R,
    ) -> Result<Self, NetError> {
        if i_dim == 0 {
            return Err(NetError::InvalidConfig(
                "attention needs a positive token size".to_string(),
            ));
        }
        let d_half = (1.0 / i_dim as f64).sqrt() / 2.0;
        let dist =
            Uniform::new(-d_half, d_half).map_err(|e| NetError::InvalidConfig(e.to_string()))?;
        let mut init = || Matrix::from_fn(i_dim, i_dim, |_, _| dist.sample(rng));
        let t_shape = (i_dim, i_dim);

        Ok(Self {
            i_dim,
            w_q: init(),
            w_k: init(),
            w_v: init(),
            w_out: init(),
            opt_w_q: Adam::new(t_shape),
            opt_w_k: Adam::new(t_shape),
            opt_w_v: Adam::new(t_shape),
            opt_w_out: Adam::new(t_shape),
            adam,
            i_step: 1,
            opt_cache: None,
        })
    }

    pub fn dimensionality(&self) -> usize {
        self.i_dim
    }

    fn gradients(&self, cache: &AttentionCache, a_g: &Matrix) -> Result<AttentionGrads, NetError> {
        let AttentionCache {
            a_x,
            a_q,
            a_k,
            a_v,
            a_s,
            a_c,
        } = cache;

        let a_w_out = a_c.transpose().multiply(a_g)?;
        let a_d_c = a_g.multiply(&self.w_out.transpose())?;
        let a_d_s = a_d_c.multiply(&a_v.transpose())?;
        let a_d_v = a_s.transpose().multiply(&a_d_c)?;
        let a_d_q = a_d_s.multiply(a_k)?;
        let a_d_k = a_d_s.transpose().multiply(a_q)?;

        let a_x_t = a_x.transpose();
        let a_input = a_d_q
            .multiply(&self.w_q.transpose())?
            .add(&a_d_k.multiply(&self.w_k.transpose())?)?
            .add(&a_d_v.multiply(&self.w_v.transpose())?)?
            .add(a_g)?;

        Ok(AttentionGrads {
            a_w_q: a_x_t.multiply(&a_d_q)?,
            a_w_k: a_x_t.multiply(&a_d_k)?,
            a_w_v: a_x_t.multiply(&a_d_v)?,
            a_w_out,
            a_input,
        })
    }
}

impl Block for AttentionBlock {
    fn block_type(&self) -> &str {
        "Attention"
    }

    fn forward(&mut self, a_input: &Matrix) -> Result<Matrix, NetError> {
        if a_input.cols() != self.i_dim {
            return Err(NetError::shape(
                "attention",
                a_input.shape(),
                (a_input.rows(), self.i_dim),
            ));
        }

        let a_q = a_input.multiply(&self.w_q)?;
        let a_k = a_input.multiply(&self.w_k)?;
        let a_v = a_input.multiply(&self.w_v)?;
        let d_scale = (self.i_dim as f64).sqrt();
        let a_s = a_q
            .multiply(&a_k.transpose())?
            .multiply_scalar(d_scale)
            .softmax();
        let a_c = a_s.multiply(&a_v)?;
        let a_out = a_input.add(&a_c.multiply(&self.w_out)?)?;

        self.opt_cache = Some(AttentionCache {
            a_x: a_input.clone(),
            a_q,
            a_k,
            a_v,
            a_s,
            a_c,
        });
        Ok(a_out)
    }

    fn backward(&mut self, a_grads: &Matrix, d_lr: f64) -> Result<Matrix, NetError> {
        let cache = self
            .opt_cache
            .as_ref()
            .ok_or(NetError::MissingForward("Attention"))?;
        if a_grads.shape() != cache.a_x.shape() {
            return Err(NetError::shape(
                "attention_backward",
                cache.a_x.shape(),
                a_grads.shape(),
            ));
        }

        let grads = self.gradients(cache, a_grads)?;

        let i_t = self.i_step;
        self.opt_w_q
            .step(&mut self.w_q, &grads.a_w_q, d_lr, i_t, &self.adam)?;
        self.opt_w_k
            .step(&mut self.w_k, &grads.a_w_k, d_lr, i_t, &self.adam)?;
        self.opt_w_v
            .step(&mut self.w_v, &grads.a_w_v, d_lr, i_t, &self.adam)?;
        self.opt_w_out
            .step(&mut self.w_out, &grads.a_w_out, d_lr, i_t, &self.adam)?;
        self.i_step += 1;

        Ok(grads.a_input)
    }

    fn parameters(&self) -> usize {
        self.w_q.len() + self.w_k.len() + self.w_v.len() + self.w_out.len()
    }
}
