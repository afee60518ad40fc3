// block.rs
// Description: Shared contract of the sequence model's blocks and their construction
//              from a BlockSpec layout entry.
// History:
// - 2026-10-07: Trait methods return Result; backward takes the upstream gradient and the
//               learning rate and updates the block's own parameters.
// Author: handgrad contributors

use rand::Rng;

use crate::attention::AttentionBlock;
use crate::config::{AdamConfig, BlockSpec};
use crate::error::NetError;
use crate::layer_norm::LayerNormBlock;
use crate::math::Matrix;
use crate::network::{FeedForwardBlock, FeedForwardNetwork};

/// One stage of the sequence model. Input and output are `tokens x dimensionality`.
pub trait Block {
    fn block_type(&self) -> &str;

    /// Runs the block and caches what backward needs.
    fn forward(&mut self, a_input: &Matrix) -> Result<Matrix, NetError>;

    /// Consumes the gradient w.r.t. the last forward output, updates the block's
    /// parameters and returns the gradient w.r.t. that forward's input.
    fn backward(&mut self, a_grads: &Matrix, d_lr: f64) -> Result<Matrix, NetError>;

    fn parameters(&self) -> usize;
}

pub fn build_block<R: Rng + ?Sized>(
    spec: &BlockSpec,
    i_dim: usize,
    adam: AdamConfig,
    rng: &mut R,
) -> Result<Box<dyn Block>, NetError> {
    match spec {
        BlockSpec::Attention => Ok(Box::new(AttentionBlock::with_rng(i_dim, adam, rng)?)),
        BlockSpec::LayerNorm => Ok(Box::new(LayerNormBlock::new(i_dim, adam))),
        BlockSpec::FeedForward {
            hidden,
            output_activation,
        } => {
            let network = hidden
                .iter()
                .fold(
                    FeedForwardNetwork::builder().set_input(i_dim).adam(adam),
                    |b, l| b.add_layer(l.units, l.activation),
                )
                .set_output(i_dim, *output_activation)
                .build_with_rng(rng)?;
            Ok(Box::new(FeedForwardBlock::new(network)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_spec_builds_a_shape_preserving_block() {
        let mut rng = StdRng::seed_from_u64(11);
        let adam = AdamConfig::default();
        let a_x = Matrix::random(3, 4, &mut rng);

        for spec in [
            BlockSpec::Attention,
            BlockSpec::LayerNorm,
            BlockSpec::default_feed_forward(4),
        ] {
            let mut block = build_block(&spec, 4, adam, &mut rng).unwrap();
            let a_y = block.forward(&a_x).unwrap();
            assert_eq!(a_y.shape(), (3, 4), "{}", block.block_type());
            let a_g = block.backward(&Matrix::zeros(3, 4), 0.01).unwrap();
            assert_eq!(a_g.shape(), (3, 4), "{}", block.block_type());
        }
    }

    #[test]
    fn block_types_are_reported() {
        let mut rng = StdRng::seed_from_u64(12);
        let adam = AdamConfig::default();
        let v_names: Vec<String> = [BlockSpec::Attention, BlockSpec::LayerNorm]
            .iter()
            .map(|s| build_block(s, 2, adam, &mut rng).unwrap().block_type().to_string())
            .collect();
        assert_eq!(v_names, vec!["Attention", "LayerNorm"]);
    }
}
