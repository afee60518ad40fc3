// gpt.rs
// Description: Minimal autoregressive word model. Token embeddings run through an ordered
//              list of blocks and a softmax projection onto the vocabulary; training updates
//              every block through its own backward and the embedding rows with Adam.
// History:
// - 2026-10-09: Blocks are trait objects built from the config layout.
// - 2026-10-14: Embedding gradients are summed per distinct row before the Adam step.
// Author: handgrad contributors

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::activation::Activation;
use crate::block::{build_block, Block};
use crate::config::{AdamConfig, GptConfig};
use crate::error::NetError;
use crate::math::Matrix;
use crate::network::{FeedForwardBlock, FeedForwardNetwork};
use crate::optim::Adam;
use crate::tokenizer::{Tokenizer, Vocabulary, WordTokenizer};

pub struct Gpt {
    i_vocabulary_size: usize,
    i_dim: usize,
    d_lr: f64,
    adam: AdamConfig,
    v_blocks: Vec<Box<dyn Block>>,
    a_embeddings: Matrix,
    opt_embeddings: Adam,
    i_step: u64,
    vocabulary: Vocabulary,
    final_projection: FeedForwardBlock,
    tokenizer: Box<dyn Tokenizer>,
}

impl Gpt {
    /// Model without blocks: embeddings feed the final projection directly.
    pub fn new(
        i_vocabulary_size: usize,
        i_dimensionality: usize,
        d_learning_rate: f64,
    ) -> Result<Self, NetError> {
        Self::from_config(&GptConfig::bare(
            i_vocabulary_size,
            i_dimensionality,
            d_learning_rate,
        ))
    }

    pub fn from_config(cfg: &GptConfig) -> Result<Self, NetError> {
        cfg.validate()?;
        let mut rng = match cfg.seed {
            Some(u64_seed) => StdRng::seed_from_u64(u64_seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let normal = Normal::new(0.0, 1.0).map_err(|e| NetError::InvalidConfig(e.to_string()))?;
        let a_embeddings = Matrix::from_fn(cfg.vocabulary_size, cfg.dimensionality, |_, _| {
            normal.sample(&mut rng)
        });

        let v_blocks = cfg
            .blocks
            .iter()
            .map(|spec| build_block(spec, cfg.dimensionality, cfg.adam, &mut rng))
            .collect::<Result<Vec<Box<dyn Block>>, NetError>>()?;

        let projection = FeedForwardNetwork::builder()
            .set_input(cfg.dimensionality)
            .set_output(cfg.vocabulary_size, Some(Activation::Softmax))
            .adam(cfg.adam)
            .build_with_rng(&mut rng)?;

        Ok(Self {
            i_vocabulary_size: cfg.vocabulary_size,
            i_dim: cfg.dimensionality,
            d_lr: cfg.learning_rate,
            adam: cfg.adam,
            v_blocks,
            opt_embeddings: Adam::new(a_embeddings.shape()),
            a_embeddings,
            i_step: 1,
            vocabulary: Vocabulary::new(cfg.vocabulary_size),
            final_projection: FeedForwardBlock::new(projection),
            tokenizer: Box::new(WordTokenizer),
        })
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn add_block(&mut self, block: Box<dyn Block>) {
        self.v_blocks.push(block);
    }

    pub fn vocabulary_size(&self) -> usize {
        self.i_vocabulary_size
    }

    pub fn dimensionality(&self) -> usize {
        self.i_dim
    }

    pub fn learning_rate(&self) -> f64 {
        self.d_lr
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn embeddings(&self) -> &Matrix {
        &self.a_embeddings
    }

    /// Adam step used by the next embedding update. Starts at 1.
    pub fn step(&self) -> u64 {
        self.i_step
    }

    pub fn tokenize(&self, s_text: &str) -> Vec<String> {
        self.tokenizer.tokenize(s_text)
    }

    pub fn assign_token(&mut self, s_token: &str) -> Option<usize> {
        self.vocabulary.assign(s_token)
    }

    pub fn token_index(&self, s_token: &str) -> usize {
        self.vocabulary.index_of(s_token)
    }

    pub fn token_at(&self, i_idx: usize) -> Option<&str> {
        self.vocabulary.token_at(i_idx)
    }

    /// Probability distribution over the vocabulary for every input position.
    pub fn forward(&mut self, v_tokens: &[String]) -> Result<Matrix, NetError> {
        let v_rows: Vec<Vec<f64>> = v_tokens
            .iter()
            .map(|t| self.a_embeddings.row(self.vocabulary.index_of(t)))
            .collect();
        let mut a_act = Matrix::new(v_rows.len(), self.i_dim, v_rows)?;

        for block in self.v_blocks.iter_mut() {
            a_act = block.forward(&a_act)?;
        }
        self.final_projection.forward(&a_act)
    }

    /// Backward through the projection and the blocks in reverse order; returns the
    /// gradient w.r.t. the embedded input rows.
    pub fn backpropagate(&mut self, a_output_gradient: &Matrix) -> Result<Matrix, NetError> {
        let mut a_grads = self.final_projection.backward(a_output_gradient, self.d_lr)?;
        for block in self.v_blocks.iter_mut().rev() {
            a_grads = block.backward(&a_grads, self.d_lr)?;
        }
        Ok(a_grads)
    }

    /// One training step on next-token prediction over `s_text`; returns the cost.
    pub fn learn_from_text(&mut self, s_text: &str) -> Result<f64, NetError> {
        let v_seq = self.tokenizer.tokenize(s_text);
        if v_seq.len() < 2 {
            return Err(NetError::SequenceTooShort {
                tokens: v_seq.len(),
                required: 2,
            });
        }
        for s_token in &v_seq {
            self.vocabulary.assign(s_token);
        }

        let v_input = &v_seq[..v_seq.len() - 1];
        let v_targets: Vec<usize> = v_seq[1..]
            .iter()
            .map(|t| self.vocabulary.index_of(t))
            .collect();
        let a_probs = self.forward(v_input)?;

        let goal = |i: usize, j: usize| if v_targets[i] == j { 1.0 } else { 0.0 };
        let a_grad = a_probs.map(|p, i, j| 2.0 * (p - goal(i, j)));
        let d_cost = a_probs.reduce(0.0, |d_acc, p, i, j| d_acc + (goal(i, j) - p).powi(2))
            / v_input.len() as f64;
        if !d_cost.is_finite() {
            return Err(NetError::Divergence { cost: d_cost });
        }

        let a_input_grad = self.backpropagate(&a_grad)?;

        let mut m_rows: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for (i_row, s_token) in v_input.iter().enumerate() {
            let v_sum = m_rows
                .entry(self.vocabulary.index_of(s_token))
                .or_insert_with(|| vec![0.0; self.i_dim]);
            for (d_acc, d_g) in v_sum.iter_mut().zip(a_input_grad.row(i_row)) {
                *d_acc += d_g;
            }
        }
        for (i_idx, v_grad) in &m_rows {
            self.opt_embeddings.step_row(
                &mut self.a_embeddings,
                *i_idx,
                v_grad,
                self.d_lr,
                self.i_step,
                &self.adam,
            )?;
        }
        self.i_step += 1;

        Ok(d_cost)
    }

    /// Appends the most likely token after `s_text`'s first position to `s_text`.
    pub fn predict_next(&mut self, s_text: &str) -> Result<String, NetError> {
        let v_seq = self.tokenizer.tokenize(s_text);
        if v_seq.is_empty() {
            return Err(NetError::SequenceTooShort {
                tokens: 0,
                required: 1,
            });
        }
        for s_token in &v_seq {
            self.vocabulary.assign(s_token);
        }

        let a_probs = self.forward(&v_seq)?;
        let (i_best, _) = a_probs.row(0).into_iter().enumerate().fold(
            (0usize, 0.0f64),
            |(i_best, d_best), (i, d_p)| {
                if d_p > d_best {
                    (i, d_p)
                } else {
                    (i_best, d_best)
                }
            },
        );

        let s_token = self.vocabulary.token_at(i_best).unwrap_or("");
        Ok(format!("{s_text} {s_token}"))
    }

    /// Applies `predict_next` `i_steps` times, feeding each result back in.
    pub fn generate(&mut self, s_text: &str, i_steps: usize) -> Result<String, NetError> {
        let mut s_out = s_text.to_string();
        for _ in 0..i_steps {
            s_out = self.predict_next(&s_out)?;
        }
        Ok(s_out)
    }

    pub fn network_description(&self) -> String {
        std::iter::once("Embeddings")
            .chain(self.v_blocks.iter().map(|b| b.block_type()))
            .chain(std::iter::once("OutputProjection"))
            .collect::<Vec<&str>>()
            .join(", ")
    }

    pub fn total_parameters(&self) -> usize {
        self.a_embeddings.len()
            + self.v_blocks.iter().map(|b| b.parameters()).sum::<usize>()
            + self.final_projection.parameters()
    }
}
