// config.rs
// Description: Typed configuration for the optimizer, the sequence model layout and
//              the training loops. Defaults live in named constants.
// History:
// - 2026-09-29: Factor Adam hyper-parameters into one shared struct.
// - 2026-10-09: Add GptConfig with block layout so models can be built from JSON.
// Author: handgrad contributors

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::NetError;

pub const DEFAULT_BETA1: f64 = 0.9;
pub const DEFAULT_BETA2: f64 = 0.999;
pub const DEFAULT_ADAM_EPSILON: f64 = 1e-8;

pub const DEFAULT_VOCABULARY_SIZE: usize = 50;
pub const DEFAULT_DIMENSIONALITY: usize = 16;
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

pub const DEFAULT_LAYER_NORM_EPSILON: f64 = 1e-5;
pub const DEFAULT_LEAKY_RELU_ALPHA: f64 = 0.01;

pub const DEFAULT_PLATEAU_PATIENCE: usize = 20;
pub const DEFAULT_MAX_EPOCHS: usize = 10_000;
pub const DEFAULT_LOG_EVERY: usize = 1;

/// Adam hyper-parameters shared by every parameter update in the crate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            epsilon: DEFAULT_ADAM_EPSILON,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<(), NetError> {
        for (s_name, d_beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&d_beta) {
                return Err(NetError::InvalidConfig(format!(
                    "{s_name} must be in [0, 1), got {d_beta}"
                )));
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(NetError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// How an MLP training session applies gradients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMethod {
    /// One Adam step per sample.
    Stochastic,
    /// Gradients are buffered and averaged into one Adam step at `end()`.
    #[default]
    Batch,
}

/// One hidden or output layer of a feed-forward block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub units: usize,
    #[serde(default)]
    pub activation: Option<Activation>,
}

impl LayerSpec {
    pub fn new(units: usize, activation: Option<Activation>) -> Self {
        Self { units, activation }
    }
}

/// Block layout entry of a sequence model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockSpec {
    Attention,
    LayerNorm,
    /// Per-token MLP from `dimensionality` through `hidden` back to `dimensionality`.
    FeedForward {
        hidden: Vec<LayerSpec>,
        #[serde(default)]
        output_activation: Option<Activation>,
    },
}

impl BlockSpec {
    /// Feed-forward block widening to 2x (GELU) and 4x (softmax) of `i_dim`.
    pub fn default_feed_forward(i_dim: usize) -> Self {
        BlockSpec::FeedForward {
            hidden: vec![
                LayerSpec::new(2 * i_dim, Some(Activation::Gelu)),
                LayerSpec::new(4 * i_dim, Some(Activation::Softmax)),
            ],
            output_activation: None,
        }
    }
}

/// Sequence model configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GptConfig {
    pub vocabulary_size: usize,
    pub dimensionality: usize,
    pub learning_rate: f64,
    /// Seed for parameter initialization; `None` draws from the thread RNG.
    pub seed: Option<u64>,
    pub adam: AdamConfig,
    pub blocks: Vec<BlockSpec>,
}

impl Default for GptConfig {
    fn default() -> Self {
        let i_dim = DEFAULT_DIMENSIONALITY;
        Self {
            vocabulary_size: DEFAULT_VOCABULARY_SIZE,
            dimensionality: i_dim,
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: None,
            adam: AdamConfig::default(),
            blocks: vec![
                BlockSpec::Attention,
                BlockSpec::LayerNorm,
                BlockSpec::default_feed_forward(i_dim),
                BlockSpec::LayerNorm,
                BlockSpec::Attention,
                BlockSpec::LayerNorm,
                BlockSpec::default_feed_forward(i_dim),
                BlockSpec::LayerNorm,
                BlockSpec::Attention,
                BlockSpec::LayerNorm,
            ],
        }
    }
}

impl GptConfig {
    /// Config without any blocks: embeddings feed the final projection directly.
    pub fn bare(i_vocabulary_size: usize, i_dimensionality: usize, d_learning_rate: f64) -> Self {
        Self {
            vocabulary_size: i_vocabulary_size,
            dimensionality: i_dimensionality,
            learning_rate: d_learning_rate,
            blocks: Vec::new(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), NetError> {
        if self.vocabulary_size == 0 {
            return Err(NetError::InvalidConfig(
                "vocabulary_size must be positive".to_string(),
            ));
        }
        if self.dimensionality == 0 {
            return Err(NetError::InvalidConfig(
                "dimensionality must be positive".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(NetError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (i_idx, block) in self.blocks.iter().enumerate() {
            if let BlockSpec::FeedForward { hidden, .. } = block {
                if hidden.iter().any(|l| l.units == 0) {
                    return Err(NetError::InvalidConfig(format!(
                        "block {i_idx}: hidden layers need at least one unit"
                    )));
                }
            }
        }
        self.adam.validate()
    }
}

/// Epoch loop policy for sequence model training.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateauPolicy {
    /// Stop once more than this many consecutive epochs increased the average cost.
    pub patience: usize,
    pub max_epochs: usize,
    /// Print progress every n epochs; 0 disables output.
    pub log_every: usize,
}

impl Default for PlateauPolicy {
    fn default() -> Self {
        Self {
            patience: DEFAULT_PLATEAU_PATIENCE,
            max_epochs: DEFAULT_MAX_EPOCHS,
            log_every: DEFAULT_LOG_EVERY,
        }
    }
}
