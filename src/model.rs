//! Collaborator seams for the encoder, classifier, and device
//!
//! The encoder architecture, its optimizer, and the accelerator backend are
//! external concerns. The harness drives them through these traits: it
//! requests forward logits, hands back loss gradients, and snapshots
//! learned parameters at the pretrain → fine-tune boundary.

use crate::pretrain::MaskedBatch;
use ndarray::{Array1, ArrayView2};

/// Immutable snapshot of an encoder's learned parameters.
///
/// Pretraining produces a snapshot; fine-tuning constructs a new trainable
/// classifier initialized from it. The snapshot itself is never trained,
/// which keeps the pretrained and baseline branches of a trial from
/// aliasing the same weights.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSnapshot {
    /// Parameter tensors in the encoder's own ordering.
    pub params: Vec<Array1<f32>>,
}

impl EncoderSnapshot {
    /// Total number of scalar parameters across all tensors.
    pub fn n_params(&self) -> usize {
        self.params.iter().map(Array1::len).sum()
    }
}

/// A sequence encoder trainable with the masked-token objective.
///
/// The optimizer and its internal state live behind this seam; the trainer
/// only counts steps against its budget.
pub trait SequenceEncoder {
    /// Vocabulary logits for every masked position in the batch, flattened
    /// in batch order (sequence by sequence, position by position). Each
    /// inner vector has `vocab_size` entries.
    fn masked_logits(&mut self, batch: &MaskedBatch) -> Vec<Vec<f32>>;

    /// Consume the loss gradients w.r.t. the logits returned by the last
    /// `masked_logits` call and apply one optimizer step.
    fn apply_step(&mut self, grads: &[Vec<f32>]);

    /// Snapshot the current learned parameters.
    fn snapshot(&self) -> EncoderSnapshot;
}

/// A binary classifier over token-sequence rows.
pub trait SequenceClassifier {
    /// One raw (pre-sigmoid) logit per row.
    fn logits(&mut self, rows: ArrayView2<'_, u32>) -> Vec<f32>;

    /// Consume the loss gradients w.r.t. the logits returned by the last
    /// `logits` call and apply one optimizer step.
    fn apply_step(&mut self, grads: &[f32]);
}

/// Factory for the models a trial constructs.
///
/// Called once per trial for the encoder, and twice for classifiers: with
/// a snapshot for the pretrained condition and with `None` for the
/// from-scratch baseline of identical architecture.
pub trait ModelFactory {
    /// A freshly initialized encoder.
    fn encoder(&self) -> Box<dyn SequenceEncoder>;

    /// A classifier, optionally initialized from pretrained parameters.
    fn classifier(&self, init: Option<&EncoderSnapshot>) -> Box<dyn SequenceClassifier>;
}

/// Release of transient accelerator memory.
///
/// The orchestrator calls `clear` after pretraining and after every trial;
/// skipping it risks unbounded device-memory growth across trials.
pub trait DeviceCache {
    fn clear(&mut self);
}

/// No-op cache for CPU-only or test runs.
#[derive(Debug, Default)]
pub struct NoopCache;

impl DeviceCache for NoopCache {
    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_snapshot_param_count() {
        let snap = EncoderSnapshot {
            params: vec![array![1.0f32, 2.0, 3.0], array![4.0f32]],
        };
        assert_eq!(snap.n_params(), 4);
    }

    #[test]
    fn test_noop_cache_is_callable() {
        let mut cache = NoopCache;
        cache.clear();
        cache.clear();
    }
}
