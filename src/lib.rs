// lib.rs
// Description: Crate root. Dense feed-forward networks, self-attention, layer normalization
//              and a small word-level GPT, all trained with hand-derived backpropagation
//              and Adam.
// History:
// - 2026-10-10: Split the binary into a library plus a menu driver.
// Author: handgrad contributors

//! Hand-derived neural networks.
//!
//! Everything is single-threaded and synchronous. Mutating operations take `&mut self`;
//! blocks cache their last forward input and Adam counters advance per call, so forward
//! and backward calls on one instance must be made in order.

pub mod activation;
pub mod attention;
pub mod block;
pub mod config;
pub mod error;
pub mod gpt;
pub mod layer;
pub mod layer_norm;
pub mod math;
pub mod network;
pub mod optim;
pub mod tokenizer;
pub mod train;
pub mod utils;

pub use activation::Activation;
pub use attention::AttentionBlock;
pub use block::{build_block, Block};
pub use config::{AdamConfig, BlockSpec, GptConfig, LayerSpec, PlateauPolicy, TrainingMethod};
pub use error::NetError;
pub use gpt::Gpt;
pub use layer::{Backprop, Gradient, LayerGraph};
pub use layer_norm::LayerNormBlock;
pub use math::{Along, Matrix};
pub use network::{FeedForwardBlock, FeedForwardNetwork, NetworkBuilder};
pub use optim::Adam;
pub use tokenizer::{Tokenizer, Vocabulary, WordTokenizer};
pub use train::{train_gpt, StopReason, TrainingReport, TrainingSession, TrainingSummary};
