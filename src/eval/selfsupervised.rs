//! Split orchestration for self-supervised pretraining evaluation
//!
//! Answers "does masked-sequence pretraining beat training from scratch
//! when labels are scarce?" by repeatedly partitioning the training set,
//! pretraining on the unlabeled portion, fine-tuning both a pretrained and
//! a from-scratch classifier on the labeled portion, and scoring both on
//! held-out data at fixed false-positive-rate operating points.

use crate::artifacts::{ArtifactSink, NoopSink};
use crate::data::{split_dataset, LabeledDataset, Vocabulary};
use crate::error::{Error, Result};
use crate::eval::roc::{tpr_at_fpr, OperatingPoint};
use crate::finetune::{predict_proba, DownstreamTrainer};
use crate::model::{DeviceCache, EncoderSnapshot, ModelFactory, NoopCache};
use crate::pretrain::{MaskedLanguageModelTrainer, MaskingPolicy, PretrainSchedule};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Every knob of one evaluation run. Supplied once at orchestrator
/// construction and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainingConfig {
    /// Fraction of the training set withheld from labels for pretraining.
    pub unlabeled_data_ratio: f64,
    /// Epoch budget for the pretraining stage.
    pub pretrain_epochs: usize,
    /// Epoch budget for the fine-tuning stage, independent of pretraining.
    pub downstream_epochs: usize,
    /// Per-token masking rate.
    pub mask_probability: f64,
    /// Cadence (in epochs) at which masks are regenerated.
    pub remask_epochs: usize,
    /// False-positive-rate operating points for evaluation.
    pub false_positive_rates: Vec<f64>,
    /// Mini-batch size for both training stages.
    pub batch_size: usize,
    /// Hard cap on pretraining optimizer steps.
    pub optim_step_budget: usize,
    /// Base seed for all stochastic partitioning and masking.
    pub random_state: u64,
    /// Emit a pretraining loss scalar every this many batches.
    pub verbosity_n_batches: usize,
    /// Checkpoint the encoder after every pretraining epoch.
    pub dump_model_every_epoch: bool,
    /// Persist the split indices of every trial.
    pub dump_data_splits: bool,
}

impl Default for PretrainingConfig {
    fn default() -> Self {
        Self {
            unlabeled_data_ratio: 0.8,
            pretrain_epochs: 10,
            downstream_epochs: 5,
            mask_probability: 0.15,
            remask_epochs: 2,
            false_positive_rates: vec![0.0001, 0.0003, 0.001, 0.003, 0.01, 0.03, 0.1],
            batch_size: 64,
            optim_step_budget: 5000,
            random_state: 42,
            verbosity_n_batches: 100,
            dump_model_every_epoch: false,
            dump_data_splits: false,
        }
    }
}

impl PretrainingConfig {
    /// Reject invalid knobs before any training work begins.
    pub fn validate(&self) -> Result<()> {
        if !(self.unlabeled_data_ratio > 0.0 && self.unlabeled_data_ratio < 1.0) {
            return Err(Error::Config(format!(
                "unlabeled_data_ratio must be in (0, 1), got {}",
                self.unlabeled_data_ratio
            )));
        }
        if !(self.mask_probability > 0.0 && self.mask_probability < 1.0) {
            return Err(Error::Config(format!(
                "mask_probability must be in (0, 1), got {}",
                self.mask_probability
            )));
        }
        if self.false_positive_rates.is_empty() {
            return Err(Error::Config(
                "false_positive_rates must not be empty".to_string(),
            ));
        }
        if let Some(&bad) = self
            .false_positive_rates
            .iter()
            .find(|&&f| !(f > 0.0 && f <= 1.0) && f != 0.0)
        {
            return Err(Error::Config(format!(
                "false-positive-rate targets must be in [0, 1], got {bad}"
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".to_string()));
        }
        if self.remask_epochs == 0 {
            return Err(Error::Config("remask_epochs must be > 0".to_string()));
        }
        if self.downstream_epochs == 0 {
            return Err(Error::Config("downstream_epochs must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Metrics for one trial: operating points for both model variants, or an
/// all-NaN record when the trial failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialMetrics {
    pub trial: usize,
    /// Pretrained-then-fine-tuned variant.
    pub pretrained: Vec<OperatingPoint>,
    /// From-scratch baseline of identical architecture.
    pub baseline: Vec<OperatingPoint>,
    /// Failure message when the trial was aborted.
    pub failure: Option<String>,
}

impl TrialMetrics {
    fn failed(trial: usize, fpr_targets: &[f64], message: String) -> Self {
        let nan_points = |targets: &[f64]| {
            targets
                .iter()
                .map(|&t| OperatingPoint::undetermined(t))
                .collect::<Vec<_>>()
        };
        Self {
            trial,
            pretrained: nan_points(fpr_targets),
            baseline: nan_points(fpr_targets),
            failure: Some(message),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Accumulated metrics across all trials of a run.
///
/// Serializable; undetermined values stay NaN (rendered as `null` in
/// JSON), never zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub trials: Vec<TrialMetrics>,
}

impl Metrics {
    /// Number of trials that completed without failure.
    pub fn n_succeeded(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_failed()).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Top-level driver for the pretraining evaluation protocol.
///
/// Trials run strictly sequentially; each constructs, trains, evaluates,
/// and discards its own encoder/classifier pair. Transient device memory
/// is released after pretraining and again after every trial.
pub struct SelfSupervisedPretraining {
    config: PretrainingConfig,
    vocab: Vocabulary,
    factory: Box<dyn ModelFactory>,
    cache: Box<dyn DeviceCache>,
    sink: Box<dyn ArtifactSink>,
}

impl SelfSupervisedPretraining {
    /// Create the orchestrator, validating the configuration up front.
    pub fn new(
        config: PretrainingConfig,
        vocab: Vocabulary,
        factory: Box<dyn ModelFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            vocab,
            factory,
            cache: Box::new(NoopCache),
            sink: Box::new(NoopSink),
        })
    }

    /// Replace the device-memory reclamation hook.
    pub fn with_cache(mut self, cache: Box<dyn DeviceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the artifact sink used for split/checkpoint dumps.
    pub fn with_sink(mut self, sink: Box<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PretrainingConfig {
        &self.config
    }

    /// Run `n_splits` independent trials, pausing `rest` between them.
    ///
    /// A recoverable failure inside one trial (numerical instability, a
    /// sink write error) records an all-NaN entry for that trial and the
    /// loop continues; configuration and dataset-shape errors are fatal.
    pub fn run_splits(
        &mut self,
        x_train: ArrayView2<'_, u32>,
        y_train: &Array1<u8>,
        x_test: ArrayView2<'_, u32>,
        y_test: &Array1<u8>,
        n_splits: usize,
        rest: Duration,
    ) -> Result<Metrics> {
        if n_splits == 0 {
            return Err(Error::Config("n_splits must be > 0".to_string()));
        }
        let train = LabeledDataset::new(x_train.to_owned(), y_train.clone())?;
        let test = LabeledDataset::new(x_test.to_owned(), y_test.clone())?;
        if test.is_empty() {
            return Err(Error::Config("test set is empty".to_string()));
        }

        let mut metrics = Metrics::default();
        for trial in 0..n_splits {
            let entry = match self.run_trial(trial, &train, &test) {
                Ok((pretrained, baseline)) => TrialMetrics {
                    trial,
                    pretrained,
                    baseline,
                    failure: None,
                },
                Err(e) if e.is_trial_recoverable() => {
                    TrialMetrics::failed(trial, &self.config.false_positive_rates, e.to_string())
                }
                Err(e) => return Err(e),
            };
            metrics.trials.push(entry);

            self.cache.clear();
            // Throttle between trials, failed ones included.
            if trial + 1 < n_splits && !rest.is_zero() {
                thread::sleep(rest);
            }
        }

        Ok(metrics)
    }

    /// One full trial: split, pretrain, fine-tune twice, evaluate both.
    fn run_trial(
        &mut self,
        trial: usize,
        train: &LabeledDataset,
        test: &LabeledDataset,
    ) -> Result<(Vec<OperatingPoint>, Vec<OperatingPoint>)> {
        let seed = self.config.random_state.wrapping_add(trial as u64);

        let split = split_dataset(train.len(), self.config.unlabeled_data_ratio, seed)?;
        if split.labeled.is_empty() {
            return Err(Error::Config(format!(
                "labeled subset is empty for {} samples at ratio {}",
                train.len(),
                self.config.unlabeled_data_ratio
            )));
        }
        if self.config.dump_data_splits {
            self.sink.dump_split(trial, &split)?;
        }

        let unlabeled_x = train.select_sequences(&split.unlabeled);
        let labeled_x = train.select_sequences(&split.labeled);
        let labeled_y = train.select_labels(&split.labeled);

        let snapshot = self.pretrain(trial, seed, unlabeled_x.view())?;
        self.cache.clear();

        let tuner = DownstreamTrainer::new(
            self.config.downstream_epochs,
            self.config.batch_size,
            seed,
        )?;

        let mut pretrained_clf = self.factory.classifier(Some(&snapshot));
        tuner.fit(pretrained_clf.as_mut(), labeled_x.view(), &labeled_y)?;

        let mut baseline_clf = self.factory.classifier(None);
        tuner.fit(baseline_clf.as_mut(), labeled_x.view(), &labeled_y)?;

        let pretrained_probs = predict_proba(
            pretrained_clf.as_mut(),
            test.sequences(),
            self.config.batch_size,
        );
        let baseline_probs = predict_proba(
            baseline_clf.as_mut(),
            test.sequences(),
            self.config.batch_size,
        );

        let labels: Vec<u8> = test.labels().iter().copied().collect();
        let fprs = &self.config.false_positive_rates;
        Ok((
            tpr_at_fpr(&labels, &pretrained_probs, fprs),
            tpr_at_fpr(&labels, &baseline_probs, fprs),
        ))
    }

    /// Pretrain a fresh encoder on the unlabeled pool and snapshot it.
    fn pretrain(
        &mut self,
        trial: usize,
        seed: u64,
        unlabeled: ArrayView2<'_, u32>,
    ) -> Result<EncoderSnapshot> {
        let policy = MaskingPolicy::new(self.config.mask_probability)?;
        let mut trainer = MaskedLanguageModelTrainer::new(
            policy,
            self.vocab.clone(),
            seed,
            self.config.remask_epochs,
        )?;
        let schedule = PretrainSchedule {
            epochs: self.config.pretrain_epochs,
            batch_size: self.config.batch_size,
            optim_step_budget: self.config.optim_step_budget,
            verbosity_n_batches: self.config.verbosity_n_batches,
        };

        let mut encoder = self.factory.encoder();
        if self.config.dump_model_every_epoch {
            let sink = self.sink.as_mut();
            let mut hook = |epoch: usize, snap: &EncoderSnapshot| {
                sink.dump_encoder(trial, epoch, snap)
            };
            trainer.fit(encoder.as_mut(), unlabeled, &schedule, Some(&mut hook))?;
        } else {
            trainer.fit(encoder.as_mut(), unlabeled, &schedule, None)?;
        }

        Ok(encoder.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        PretrainingConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bad_knobs() {
        let mut c = PretrainingConfig::default();
        c.unlabeled_data_ratio = 1.0;
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.false_positive_rates.clear();
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.false_positive_rates = vec![0.01, 1.5];
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.batch_size = 0;
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.remask_epochs = 0;
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.mask_probability = 0.0;
        assert!(c.validate().is_err());

        let mut c = PretrainingConfig::default();
        c.downstream_epochs = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = PretrainingConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PretrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.optim_step_budget, config.optim_step_budget);
        assert_eq!(back.false_positive_rates, config.false_positive_rates);
    }

    #[test]
    fn test_failed_trial_metrics_are_all_nan() {
        let m = TrialMetrics::failed(2, &[0.01, 0.1], "loss diverged".to_string());
        assert!(m.is_failed());
        assert_eq!(m.pretrained.len(), 2);
        assert_eq!(m.baseline.len(), 2);
        assert!(m.pretrained.iter().all(|p| p.tpr.is_nan()));
        assert!(m.baseline.iter().all(|p| p.threshold.is_nan()));
    }

    #[test]
    fn test_metrics_success_count() {
        let mut metrics = Metrics::default();
        metrics.trials.push(TrialMetrics {
            trial: 0,
            pretrained: vec![],
            baseline: vec![],
            failure: None,
        });
        metrics
            .trials
            .push(TrialMetrics::failed(1, &[0.1], "nan".to_string()));
        assert_eq!(metrics.n_succeeded(), 1);
    }
}
