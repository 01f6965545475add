//! Masking policy for the masked-token pretraining objective

use crate::data::Vocabulary;
use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Replacement strategy for a position selected for masking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskingStrategy {
    /// Always substitute the reserved mask token.
    MaskToken,
    /// BERT-style mixture: with `random_token_rate` substitute a random
    /// non-padding token, with `keep_rate` leave the original token in
    /// place, otherwise substitute the mask token. The position is a
    /// prediction target in all three outcomes.
    Mixed {
        random_token_rate: f64,
        keep_rate: f64,
    },
}

/// One masked sequence: the corrupted copy plus the ground truth needed to
/// score predictions at the masked positions.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedSequence {
    /// Sequence with masking substitutions applied.
    pub masked: Vec<u32>,
    /// Positions selected for masking, ascending.
    pub positions: Vec<usize>,
    /// Original token ids at those positions.
    pub targets: Vec<u32>,
}

impl MaskedSequence {
    pub fn n_masked(&self) -> usize {
        self.positions.len()
    }
}

/// A mini-batch of masked sequences. Ephemeral: regenerated at every
/// remask boundary, never persisted beyond it.
#[derive(Debug, Clone)]
pub struct MaskedBatch {
    pub sequences: Vec<MaskedSequence>,
}

impl MaskedBatch {
    /// Total masked positions across the batch.
    pub fn n_masked(&self) -> usize {
        self.sequences.iter().map(MaskedSequence::n_masked).sum()
    }

    /// Target token ids flattened in batch order, matching the encoder's
    /// `masked_logits` output ordering.
    pub fn flat_targets(&self) -> Vec<u32> {
        self.sequences
            .iter()
            .flat_map(|s| s.targets.iter().copied())
            .collect()
    }
}

/// Per-token masking with a configurable probability and strategy.
#[derive(Debug, Clone)]
pub struct MaskingPolicy {
    mask_probability: f64,
    strategy: MaskingStrategy,
}

impl MaskingPolicy {
    /// Mask-token-only policy (the default strategy).
    pub fn new(mask_probability: f64) -> Result<Self> {
        Self::with_strategy(mask_probability, MaskingStrategy::MaskToken)
    }

    pub fn with_strategy(mask_probability: f64, strategy: MaskingStrategy) -> Result<Self> {
        if !(mask_probability > 0.0 && mask_probability < 1.0) {
            return Err(Error::Config(format!(
                "mask_probability must be in (0, 1), got {mask_probability}"
            )));
        }
        if let MaskingStrategy::Mixed { random_token_rate, keep_rate } = strategy {
            if random_token_rate < 0.0
                || keep_rate < 0.0
                || random_token_rate + keep_rate >= 1.0
            {
                return Err(Error::Config(format!(
                    "mixed strategy rates must be non-negative and sum below 1, \
                     got random={random_token_rate}, keep={keep_rate}"
                )));
            }
        }
        Ok(Self { mask_probability, strategy })
    }

    pub fn mask_probability(&self) -> f64 {
        self.mask_probability
    }

    /// Mask a single sequence.
    ///
    /// Padding positions are never selected. A zero-mask draw is retried
    /// once; if still empty, one non-padding position is forced so every
    /// sequence contributes a training signal. A sequence that is entirely
    /// padding yields an empty mask set.
    pub fn mask(
        &self,
        seq: ArrayView1<'_, u32>,
        vocab: &Vocabulary,
        rng: &mut StdRng,
    ) -> MaskedSequence {
        let maskable: Vec<usize> = seq
            .iter()
            .enumerate()
            .filter(|(_, &t)| !vocab.is_padding(t))
            .map(|(i, _)| i)
            .collect();

        let mut positions = self.sample_positions(&maskable, rng);
        if positions.is_empty() {
            positions = self.sample_positions(&maskable, rng);
        }
        if positions.is_empty() && !maskable.is_empty() {
            positions = vec![maskable[rng.gen_range(0..maskable.len())]];
        }

        let mut masked: Vec<u32> = seq.to_vec();
        let mut targets = Vec::with_capacity(positions.len());
        for &pos in &positions {
            targets.push(masked[pos]);
            masked[pos] = self.substitute(masked[pos], vocab, rng);
        }

        MaskedSequence { masked, positions, targets }
    }

    /// Mask a whole pool of sequences with a fresh epoch-keyed generator.
    ///
    /// The generator is seeded from the run's base seed plus the epoch
    /// counter, so masks are reproducible across a process restart but
    /// differ across remask boundaries.
    pub fn mask_pool(
        &self,
        rows: ArrayView2<'_, u32>,
        vocab: &Vocabulary,
        random_state: u64,
        epoch: usize,
    ) -> Vec<MaskedSequence> {
        let mut rng = StdRng::seed_from_u64(random_state.wrapping_add(epoch as u64));
        rows.rows()
            .into_iter()
            .map(|row| self.mask(row, vocab, &mut rng))
            .collect()
    }

    fn sample_positions(&self, maskable: &[usize], rng: &mut StdRng) -> Vec<usize> {
        maskable
            .iter()
            .filter(|_| rng.gen_bool(self.mask_probability))
            .copied()
            .collect()
    }

    fn substitute(&self, original: u32, vocab: &Vocabulary, rng: &mut StdRng) -> u32 {
        match self.strategy {
            MaskingStrategy::MaskToken => vocab.mask_id(),
            MaskingStrategy::Mixed { random_token_rate, keep_rate } => {
                let draw: f64 = rng.gen();
                if draw < random_token_rate {
                    // Any non-padding token; re-draw the rare pad hit.
                    loop {
                        let t = rng.gen_range(0..vocab.size() as u32);
                        if !vocab.is_padding(t) {
                            break t;
                        }
                    }
                } else if draw < random_token_rate + keep_rate {
                    original
                } else {
                    vocab.mask_id()
                }
            }
        }
    }
}
