// train.rs
// Description: Training loops. TrainingSession feeds samples to a feed-forward network
//              (stochastic or batch); train_gpt runs epochs over a text corpus until the
//              average cost plateaus or diverges.
// History:
// - 2026-10-05: Batch mode averages buffered gradients into one Adam step.
// - 2026-10-15: Epoch loop stops after too many consecutive cost increases.
// Author: handgrad contributors

use crate::config::{PlateauPolicy, TrainingMethod, DEFAULT_LEARNING_RATE};
use crate::error::NetError;
use crate::gpt::Gpt;
use crate::layer::Gradient;
use crate::network::FeedForwardNetwork;

/// Totals of one `add_data` .. `end` round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingSummary {
    pub samples: usize,
    /// Mean of the costs returned by `add_data`, measured before each sample's update.
    pub average_cost: f64,
    /// Adam steps applied to the network during the round.
    pub updates: usize,
}

pub struct TrainingSession<'a> {
    network: &'a mut FeedForwardNetwork,
    method: TrainingMethod,
    d_lr: f64,
    opt_sum: Option<Gradient>,
    i_samples: usize,
    i_updates: usize,
    d_cost_sum: f64,
}

impl<'a> TrainingSession<'a> {
    pub fn new(network: &'a mut FeedForwardNetwork) -> Self {
        Self {
            network,
            method: TrainingMethod::default(),
            d_lr: DEFAULT_LEARNING_RATE,
            opt_sum: None,
            i_samples: 0,
            i_updates: 0,
            d_cost_sum: 0.0,
        }
    }

    pub fn set_learning_rate(mut self, d_lr: f64) -> Self {
        self.d_lr = d_lr;
        self
    }

    pub fn set_method(mut self, method: TrainingMethod) -> Self {
        self.method = method;
        self
    }

    pub fn method(&self) -> TrainingMethod {
        self.method
    }

    /// Runs one sample, returns its squared error and either applies its gradient
    /// (stochastic) or buffers it until `end` (batch).
    pub fn add_data(&mut self, v_input: &[f64], v_desired: &[f64]) -> Result<f64, NetError> {
        let v_output = self.network.forward(v_input)?;
        let d_cost = self.network.cost(v_desired)?;
        let v_output_gradient: Vec<f64> = v_output
            .iter()
            .zip(v_desired)
            .map(|(o, d)| 2.0 * (o - d))
            .collect();
        let backprop = self.network.compute_gradient(&v_output_gradient)?;

        match self.method {
            TrainingMethod::Stochastic => {
                self.network.apply_gradient(&backprop.gradient, self.d_lr)?;
                self.i_updates += 1;
            }
            TrainingMethod::Batch => {
                self.opt_sum = Some(match self.opt_sum.take() {
                    Some(sum) => sum.add(&backprop.gradient)?,
                    None => backprop.gradient,
                });
            }
        }

        self.i_samples += 1;
        self.d_cost_sum += d_cost;
        Ok(d_cost)
    }

    /// Applies the averaged batch gradient (if any) and resets the session for the next round.
    pub fn end(&mut self) -> Result<TrainingSummary, NetError> {
        if let Some(sum) = self.opt_sum.take() {
            let average = sum.scale(1.0 / self.i_samples as f64);
            self.network.apply_gradient(&average, self.d_lr)?;
            self.i_updates += 1;
        }

        let summary = TrainingSummary {
            samples: self.i_samples,
            average_cost: if self.i_samples == 0 {
                0.0
            } else {
                self.d_cost_sum / self.i_samples as f64
            },
            updates: self.i_updates,
        };
        self.i_samples = 0;
        self.i_updates = 0;
        self.d_cost_sum = 0.0;
        Ok(summary)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// More than `patience` consecutive epochs increased the average cost.
    Plateau,
    MaxEpochs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub epochs: usize,
    /// Average cost of every epoch, in order.
    pub history: Vec<f64>,
    pub stop: StopReason,
}

impl TrainingReport {
    pub fn final_cost(&self) -> Option<f64> {
        self.history.last().copied()
    }
}

/// Trains `gpt` on every corpus line with at least two tokens, one epoch at a time.
///
/// A non-finite cost aborts with [`NetError::Divergence`].
pub fn train_gpt(
    gpt: &mut Gpt,
    v_corpus: &[&str],
    policy: &PlateauPolicy,
) -> Result<TrainingReport, NetError> {
    let v_lines: Vec<&str> = v_corpus
        .iter()
        .copied()
        .filter(|s| gpt.tokenize(s).len() >= 2)
        .collect();
    if v_lines.is_empty() {
        return Err(NetError::InvalidConfig(
            "corpus has no line with at least two tokens".to_string(),
        ));
    }
    let d_lines = v_lines.len() as f64;

    let mut v_history: Vec<f64> = Vec::new();
    let mut i_increases: usize = 0;
    let mut stop = StopReason::MaxEpochs;

    for i_epoch in 0..policy.max_epochs {
        let mut d_average = 0.0;
        for s_line in &v_lines {
            let d_cost = gpt.learn_from_text(s_line).inspect_err(|e| {
                if e.is_divergence() {
                    eprintln!("Epoch {}: diverged", i_epoch + 1);
                }
            })?;
            d_average += d_cost / d_lines;
        }

        let d_variation = v_history.last().map_or(0.0, |d_last| d_average - d_last);
        if policy.log_every > 0 && (i_epoch + 1) % policy.log_every == 0 {
            println!(
                "Epoch {}: Loss = {:.4}, Variation = {:+.4}",
                i_epoch + 1,
                d_average,
                d_variation
            );
        }

        i_increases = if d_variation > 0.0 { i_increases + 1 } else { 0 };
        v_history.push(d_average);

        if i_increases > policy.patience {
            stop = StopReason::Plateau;
            break;
        }
    }

    Ok(TrainingReport {
        epochs: v_history.len(),
        history: v_history,
        stop,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::GptConfig;
    use crate::tokenizer::Tokenizer;

    /// Pairs "t0" with the next target of a fixed schedule on every call.
    struct ScheduledTokenizer {
        v_targets: Vec<String>,
        i_call: Cell<usize>,
    }

    impl Tokenizer for ScheduledTokenizer {
        fn tokenize(&self, _s_text: &str) -> Vec<String> {
            let i_call = self.i_call.get();
            self.i_call.set(i_call + 1);
            let i_next = i_call.min(self.v_targets.len() - 1);
            vec!["t0".to_string(), self.v_targets[i_next].clone()]
        }
    }

    fn linear(u64_seed: u64) -> FeedForwardNetwork {
        FeedForwardNetwork::builder()
            .set_input(2)
            .set_output(1, None)
            .seed(u64_seed)
            .build()
            .unwrap()
    }

    #[test]
    fn stochastic_applies_every_sample() {
        let mut net = linear(1);
        let mut session = TrainingSession::new(&mut net)
            .set_method(TrainingMethod::Stochastic)
            .set_learning_rate(0.01);
        session.add_data(&[1.0, 2.0], &[3.0]).unwrap();
        session.add_data(&[2.0, 1.0], &[3.0]).unwrap();
        let summary = session.end().unwrap();
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.updates, 2);
        assert_eq!(net.step(), 3);
    }

    #[test]
    fn batch_applies_one_averaged_step() {
        let mut net = linear(2);
        let mut twin = net.clone();

        let mut session = TrainingSession::new(&mut net).set_learning_rate(0.01);
        let d_c1 = session.add_data(&[1.0, 0.0], &[1.0]).unwrap();
        let d_c2 = session.add_data(&[0.0, 1.0], &[-1.0]).unwrap();
        let summary = session.end().unwrap();
        assert_eq!(summary.updates, 1);
        assert!((summary.average_cost - (d_c1 + d_c2) / 2.0).abs() < 1e-12);
        assert_eq!(net.step(), 2);

        // Same result as applying the mean gradient by hand.
        let v_o1 = twin.forward(&[1.0, 0.0]).unwrap();
        let g1 = twin.compute_gradient(&[2.0 * (v_o1[0] - 1.0)]).unwrap().gradient;
        let v_o2 = twin.forward(&[0.0, 1.0]).unwrap();
        let g2 = twin.compute_gradient(&[2.0 * (v_o2[0] + 1.0)]).unwrap().gradient;
        twin.apply_gradient(&g1.add(&g2).unwrap().scale(0.5), 0.01).unwrap();

        assert_eq!(
            net.forward(&[0.3, 0.4]).unwrap(),
            twin.forward(&[0.3, 0.4]).unwrap()
        );
    }

    #[test]
    fn empty_batch_end_is_a_no_op() {
        let mut net = linear(3);
        let summary = TrainingSession::new(&mut net).end().unwrap();
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.updates, 0);
        assert_eq!(net.step(), 1);
    }

    #[test]
    fn gpt_loop_runs_to_max_epochs_without_plateau() {
        let mut gpt = Gpt::from_config(&GptConfig {
            seed: Some(4),
            ..GptConfig::bare(20, 8, 0.01)
        })
        .unwrap();
        let policy = PlateauPolicy {
            patience: 1000,
            max_epochs: 5,
            log_every: 0,
        };
        let report = train_gpt(&mut gpt, &["hello there", "one", "good morning to you"], &policy)
            .unwrap();
        assert_eq!(report.epochs, 5);
        assert_eq!(report.stop, StopReason::MaxEpochs);
        assert!(report.final_cost().unwrap().is_finite());
    }

    #[test]
    fn rising_cost_stops_on_plateau() {
        // A learning rate this small leaves the output distribution fixed, so the
        // cost of each epoch is set by which token it is asked to predict.
        let mut gpt = Gpt::from_config(&GptConfig {
            seed: Some(8),
            ..GptConfig::bare(6, 4, 1e-12)
        })
        .unwrap();
        let v_tokens: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
        for s_token in &v_tokens {
            gpt.assign_token(s_token);
        }
        let v_p = gpt.forward(&v_tokens[..1]).unwrap().row(0);
        let mut v_order: Vec<usize> = (0..6).collect();
        v_order.sort_by(|&a, &b| v_p[b].total_cmp(&v_p[a]));

        // Most likely target first; train_gpt tokenizes each line once before epoch 1.
        let v_targets: Vec<String> = std::iter::once(v_order[0])
            .chain(v_order.iter().copied())
            .map(|i| v_tokens[i].clone())
            .collect();
        let mut gpt = gpt.with_tokenizer(Box::new(ScheduledTokenizer {
            v_targets,
            i_call: Cell::new(0),
        }));

        let policy = PlateauPolicy {
            patience: 2,
            max_epochs: 50,
            log_every: 0,
        };
        let report = train_gpt(&mut gpt, &["any line"], &policy).unwrap();
        assert_eq!(report.stop, StopReason::Plateau);
        assert_eq!(report.epochs, policy.patience + 2);
        assert!(report.history.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn corpus_without_pairs_is_rejected() {
        let mut gpt = Gpt::new(10, 4, 0.01).unwrap();
        let r = train_gpt(&mut gpt, &["single", "!!"], &PlateauPolicy::default());
        assert!(matches!(r, Err(NetError::InvalidConfig(_))));
    }
}
