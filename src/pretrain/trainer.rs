//! Masked-language-model pretraining loop

use crate::data::Vocabulary;
use crate::error::{Error, Result};
use crate::model::{EncoderSnapshot, SequenceEncoder};
use crate::pretrain::{MaskedBatch, MaskedSequence, MaskingPolicy};
use ndarray::ArrayView2;

/// Per-epoch checkpoint hook: receives the epoch index and a parameter
/// snapshot taken after that epoch's updates.
pub type CheckpointHook<'a> = &'a mut dyn FnMut(usize, &EncoderSnapshot) -> Result<()>;

/// Receiver for training-progress scalars.
///
/// The trainer only produces loss values; formatting and persistence are a
/// sink concern. All methods default to no-ops.
pub trait ProgressSink {
    /// Called every `verbosity_n_batches` optimizer steps.
    fn on_batch(&mut self, _step: usize, _loss: f32) {}

    /// Called at the end of each epoch with the epoch's mean batch loss.
    fn on_epoch(&mut self, _epoch: usize, _mean_loss: f32) {}
}

/// Sink that discards every report.
#[derive(Debug, Default)]
pub struct Silent;

impl ProgressSink for Silent {}

/// Epoch/batch/step budgets for one pretraining run.
#[derive(Debug, Clone, Copy)]
pub struct PretrainSchedule {
    pub epochs: usize,
    pub batch_size: usize,
    /// Hard cap on optimizer steps across all epochs; 0 means no updates.
    pub optim_step_budget: usize,
    /// Emit a loss scalar every this many batches.
    pub verbosity_n_batches: usize,
}

/// Trains a sequence encoder to predict original tokens at masked
/// positions.
///
/// Masks are derived per batch to keep memory bounded, regenerated for the
/// whole unlabeled pool every `remask_epochs` epochs, and reused between
/// remask boundaries.
pub struct MaskedLanguageModelTrainer {
    policy: MaskingPolicy,
    vocab: Vocabulary,
    random_state: u64,
    remask_epochs: usize,
    progress: Box<dyn ProgressSink>,
}

impl MaskedLanguageModelTrainer {
    pub fn new(
        policy: MaskingPolicy,
        vocab: Vocabulary,
        random_state: u64,
        remask_epochs: usize,
    ) -> Result<Self> {
        if remask_epochs == 0 {
            return Err(Error::Config("remask_epochs must be > 0".to_string()));
        }
        Ok(Self {
            policy,
            vocab,
            random_state,
            remask_epochs,
            progress: Box::new(Silent),
        })
    }

    /// Attach a progress sink for loss reporting.
    pub fn set_progress(&mut self, sink: Box<dyn ProgressSink>) {
        self.progress = sink;
    }

    /// Run the pretraining loop over the unlabeled pool.
    ///
    /// Returns per-epoch mean losses. Stops early, even mid-epoch, once
    /// `optim_step_budget` steps have been taken.
    ///
    /// # Errors
    /// `Error::Config` if the pool is empty or the batch size is zero;
    /// `Error::NumericalInstability` on the first non-finite batch loss,
    /// before the offending update is applied.
    pub fn fit(
        &mut self,
        encoder: &mut dyn SequenceEncoder,
        unlabeled: ArrayView2<'_, u32>,
        schedule: &PretrainSchedule,
        mut checkpoint: Option<CheckpointHook<'_>>,
    ) -> Result<Vec<f32>> {
        if unlabeled.nrows() == 0 {
            return Err(Error::Config(
                "unlabeled pool is empty, nothing to pretrain on".to_string(),
            ));
        }
        if schedule.batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".to_string()));
        }
        if schedule.optim_step_budget == 0 {
            return Ok(Vec::new());
        }

        let mut history = Vec::with_capacity(schedule.epochs);
        let mut pool: Vec<MaskedSequence> = Vec::new();
        let mut steps = 0usize;

        'epochs: for epoch in 0..schedule.epochs {
            if epoch % self.remask_epochs == 0 {
                pool = self
                    .policy
                    .mask_pool(unlabeled, &self.vocab, self.random_state, epoch);
            }

            let mut epoch_losses = Vec::new();
            for (batch_idx, chunk) in pool.chunks(schedule.batch_size).enumerate() {
                let batch = MaskedBatch { sequences: chunk.to_vec() };
                if batch.n_masked() == 0 {
                    // Only all-padding sequences; no training signal.
                    continue;
                }

                let logits = encoder.masked_logits(&batch);
                let targets = batch.flat_targets();
                let (loss, grads) = masked_cross_entropy(&logits, &targets, self.vocab.size());

                if !loss.is_finite() {
                    return Err(Error::NumericalInstability { step: steps, loss });
                }

                encoder.apply_step(&grads);
                steps += 1;
                epoch_losses.push(loss);

                if schedule.verbosity_n_batches > 0
                    && (batch_idx + 1) % schedule.verbosity_n_batches == 0
                {
                    self.progress.on_batch(steps, loss);
                }

                if steps >= schedule.optim_step_budget {
                    history.push(mean(&epoch_losses));
                    if let Some(hook) = checkpoint.as_deref_mut() {
                        hook(epoch, &encoder.snapshot())?;
                    }
                    break 'epochs;
                }
            }

            let mean_loss = mean(&epoch_losses);
            self.progress.on_epoch(epoch, mean_loss);
            history.push(mean_loss);
            if let Some(hook) = checkpoint.as_deref_mut() {
                hook(epoch, &encoder.snapshot())?;
            }
        }

        Ok(history)
    }
}

/// Cross-entropy over masked positions only.
///
/// Returns the mean per-position loss and the gradients w.r.t. each logit
/// vector (softmax minus one-hot, scaled by 1/n so gradients match the
/// mean-reduced loss).
pub(crate) fn masked_cross_entropy(
    logits: &[Vec<f32>],
    targets: &[u32],
    vocab_size: usize,
) -> (f32, Vec<Vec<f32>>) {
    assert_eq!(
        logits.len(),
        targets.len(),
        "one logit vector per masked position"
    );

    let n = targets.len() as f32;
    let mut total = 0.0f32;
    let mut grads = Vec::with_capacity(logits.len());

    for (row, &target) in logits.iter().zip(targets.iter()) {
        assert_eq!(row.len(), vocab_size, "logit width must match vocab size");

        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exp: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
        let sum: f32 = exp.iter().sum();

        let mut grad: Vec<f32> = exp.iter().map(|&e| e / sum / n).collect();
        total += -(grad[target as usize] * n + 1e-10).ln();
        grad[target as usize] -= 1.0 / n;
        grads.push(grad);
    }

    (total / n, grads)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
