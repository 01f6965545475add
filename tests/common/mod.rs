//! Deterministic toy models exercising the collaborator seams

#![allow(dead_code)]

use ndarray::{Array1, Array2, ArrayView2};
use preentrenar::{
    EncoderSnapshot, MaskedBatch, ModelFactory, SequenceClassifier, SequenceEncoder,
};
use std::cell::Cell;

/// Encoder with one weight per vocabulary entry; every masked position
/// sees the same logit vector. Training nudges weights toward frequent
/// target tokens, enough to exercise the full pretraining loop.
pub struct ToyEncoder {
    weights: Vec<f32>,
    lr: f32,
    emit_nan: bool,
}

impl SequenceEncoder for ToyEncoder {
    fn masked_logits(&mut self, batch: &MaskedBatch) -> Vec<Vec<f32>> {
        let row = if self.emit_nan {
            vec![f32::NAN; self.weights.len()]
        } else {
            self.weights.clone()
        };
        (0..batch.n_masked()).map(|_| row.clone()).collect()
    }

    fn apply_step(&mut self, grads: &[Vec<f32>]) {
        for grad in grads {
            for (w, &g) in self.weights.iter_mut().zip(grad.iter()) {
                *w -= self.lr * g;
            }
        }
    }

    fn snapshot(&self) -> EncoderSnapshot {
        EncoderSnapshot {
            params: vec![Array1::from(self.weights.clone())],
        }
    }
}

/// Logistic regression on the normalized mean token id of a row.
///
/// Gradients arrive per logit from the harness; the classifier folds them
/// into its two parameters using the features of the last forward pass.
pub struct ToyClassifier {
    w: f32,
    b: f32,
    lr: f32,
    last_features: Vec<f32>,
}

impl SequenceClassifier for ToyClassifier {
    fn logits(&mut self, rows: ArrayView2<'_, u32>) -> Vec<f32> {
        self.last_features = rows
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|&t| t as f32).sum::<f32>() / r.len() as f32 / 10.0 - 1.0)
            .collect();
        self.last_features
            .iter()
            .map(|&f| self.w * f + self.b)
            .collect()
    }

    fn apply_step(&mut self, grads: &[f32]) {
        for (&g, &f) in grads.iter().zip(self.last_features.iter()) {
            self.w -= self.lr * g * f;
            self.b -= self.lr * g;
        }
    }
}

/// Factory producing toy models; counts encoder constructions so a chosen
/// trial can be made to diverge.
pub struct ToyFactory {
    vocab_size: usize,
    encoder_calls: Cell<usize>,
    fail_on_trial: Option<usize>,
}

impl ToyFactory {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            encoder_calls: Cell::new(0),
            fail_on_trial: None,
        }
    }

    /// Make the encoder built for the given trial emit NaN logits.
    pub fn failing_on_trial(mut self, trial: usize) -> Self {
        self.fail_on_trial = Some(trial);
        self
    }
}

impl ModelFactory for ToyFactory {
    fn encoder(&self) -> Box<dyn SequenceEncoder> {
        let trial = self.encoder_calls.get();
        self.encoder_calls.set(trial + 1);
        Box::new(ToyEncoder {
            weights: vec![0.0; self.vocab_size],
            lr: 0.1,
            emit_nan: self.fail_on_trial == Some(trial),
        })
    }

    fn classifier(&self, init: Option<&EncoderSnapshot>) -> Box<dyn SequenceClassifier> {
        // The pretrained condition starts its bias from the snapshot so
        // the two variants are distinguishable but both trainable.
        let b = init
            .and_then(|s| s.params.first())
            .and_then(|p| p.mean())
            .unwrap_or(0.0)
            .clamp(-0.5, 0.5);
        Box::new(ToyClassifier {
            w: 0.0,
            b,
            lr: 0.5,
            last_features: Vec::new(),
        })
    }
}

/// Separable corpus: benign rows draw low token ids, malicious rows high
/// ids, labels alternating. Token ids stay clear of pad (0) and mask (1).
pub fn separable_corpus(n: usize, maxlen: usize) -> (Array2<u32>, Array1<u8>) {
    let x = Array2::from_shape_fn((n, maxlen), |(i, j)| {
        if i % 2 == 0 {
            2 + ((i + j) % 6) as u32
        } else {
            13 + ((i + j) % 6) as u32
        }
    });
    let y = Array1::from_shape_fn(n, |i| (i % 2) as u8);
    (x, y)
}
