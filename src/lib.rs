//! Self-supervised pretraining evaluation harness
//!
//! Evaluates whether masked-language-model pretraining on unlabeled token
//! sequences (extracted from executable behavior traces) improves
//! downstream malicious/benign classification when labels are scarce.
//!
//! The protocol, per trial: reproducibly partition the training set into
//! an unlabeled pool and a labeled subset, pretrain an encoder on the pool
//! with a masked-token objective, fine-tune both the pretrained encoder
//! and a from-scratch baseline on the labeled subset, and score both on
//! held-out data at fixed false-positive-rate operating points.
//!
//! # Example
//!
//! ```ignore
//! use preentrenar::data::Vocabulary;
//! use preentrenar::eval::{PretrainingConfig, SelfSupervisedPretraining};
//! use std::time::Duration;
//!
//! let vocab = Vocabulary::new(50_000, 0, 1)?;
//! let config = PretrainingConfig::default();
//! let mut harness = SelfSupervisedPretraining::new(config, vocab, factory)?;
//! let metrics = harness.run_splits(
//!     x_train.view(), &y_train, x_test.view(), &y_test,
//!     3, Duration::from_secs(0),
//! )?;
//! println!("{}", metrics.to_json()?);
//! ```
//!
//! The encoder architecture, its optimizer, and the accelerator backend
//! are external collaborators driven through the traits in [`model`].

pub mod artifacts;
pub mod data;
pub mod error;
pub mod eval;
pub mod finetune;
pub mod model;
pub mod pretrain;

pub use artifacts::{ArtifactSink, DirectorySink, NoopSink};
pub use data::{split_dataset, LabeledDataset, TrialSplit, Vocabulary};
pub use error::{Error, Result};
pub use eval::{
    roc_curve, tpr_at_fpr, Metrics, OperatingPoint, PretrainingConfig, RocCurve,
    SelfSupervisedPretraining, TrialMetrics,
};
pub use finetune::{predict_proba, DownstreamTrainer};
pub use model::{
    DeviceCache, EncoderSnapshot, ModelFactory, NoopCache, SequenceClassifier, SequenceEncoder,
};
pub use pretrain::{
    MaskedBatch, MaskedLanguageModelTrainer, MaskedSequence, MaskingPolicy, MaskingStrategy,
    PretrainSchedule, ProgressSink, Silent,
};
