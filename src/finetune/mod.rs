//! Downstream fine-tuning of binary sequence classifiers
//!
//! The same training logic serves both entry modes of a trial: a classifier
//! initialized from a pretrained encoder snapshot, and a from-scratch
//! baseline of identical architecture. Only the initial parameters differ.

use crate::error::{Error, Result};
use crate::model::SequenceClassifier;
use ndarray::{Array1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Binary-classification fine-tuning loop.
#[derive(Debug, Clone)]
pub struct DownstreamTrainer {
    epochs: usize,
    batch_size: usize,
    random_state: u64,
}

impl DownstreamTrainer {
    pub fn new(epochs: usize, batch_size: usize, random_state: u64) -> Result<Self> {
        if epochs == 0 {
            return Err(Error::Config("downstream epochs must be > 0".to_string()));
        }
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".to_string()));
        }
        Ok(Self { epochs, batch_size, random_state })
    }

    /// Train the classifier on the labeled subset.
    ///
    /// Runs exactly the configured epoch count with a binary cross-entropy
    /// objective, shuffling the subset deterministically each epoch.
    /// Returns per-epoch mean losses.
    pub fn fit(
        &self,
        classifier: &mut dyn SequenceClassifier,
        x: ArrayView2<'_, u32>,
        y: &Array1<u8>,
    ) -> Result<Vec<f32>> {
        if x.nrows() == 0 {
            return Err(Error::Config("labeled subset is empty".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(Error::Data(format!(
                "sequences/labels length mismatch: {} vs {}",
                x.nrows(),
                y.len()
            )));
        }

        let mut history = Vec::with_capacity(self.epochs);
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut steps = 0usize;

        for epoch in 0..self.epochs {
            let mut rng = StdRng::seed_from_u64(self.random_state.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);

            let mut epoch_losses = Vec::new();
            for chunk in order.chunks(self.batch_size) {
                let rows = x.select(Axis(0), chunk);
                let logits = classifier.logits(rows.view());
                assert_eq!(logits.len(), chunk.len(), "one logit per sequence");

                let n = chunk.len() as f32;
                let mut loss = 0.0f32;
                let mut grads = Vec::with_capacity(chunk.len());
                for (&logit, &idx) in logits.iter().zip(chunk.iter()) {
                    let target = f32::from(y[idx]);
                    loss += bce_with_logits(logit, target);
                    grads.push((sigmoid(logit) - target) / n);
                }
                loss /= n;

                if !loss.is_finite() {
                    return Err(Error::NumericalInstability { step: steps, loss });
                }

                classifier.apply_step(&grads);
                steps += 1;
                epoch_losses.push(loss);
            }

            history.push(epoch_losses.iter().sum::<f32>() / epoch_losses.len() as f32);
        }

        Ok(history)
    }
}

/// Malicious-class probabilities for every row, in order.
///
/// Applies the sigmoid to the classifier's raw logits, batched so the
/// collaborator sees the same batch sizes as during training.
pub fn predict_proba(
    classifier: &mut dyn SequenceClassifier,
    x: ArrayView2<'_, u32>,
    batch_size: usize,
) -> Vec<f64> {
    let indices: Vec<usize> = (0..x.nrows()).collect();
    let mut probs = Vec::with_capacity(x.nrows());
    for chunk in indices.chunks(batch_size.max(1)) {
        let rows = x.select(Axis(0), chunk);
        for logit in classifier.logits(rows.view()) {
            probs.push(f64::from(sigmoid(logit)));
        }
    }
    probs
}

/// Numerically stable binary cross-entropy on a raw logit:
/// `max(x, 0) − x·t + ln(1 + e^−|x|)`.
pub(crate) fn bce_with_logits(logit: f32, target: f32) -> f32 {
    logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p()
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
