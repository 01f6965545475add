//! Evaluation: ROC operating points and the split orchestrator
//!
//! - `roc`: ROC-curve computation and tpr-at-fpr extraction
//! - `selfsupervised`: the trial-loop driver comparing pretrained against
//!   from-scratch classifiers

pub mod roc;
pub mod selfsupervised;

pub use roc::{roc_curve, tpr_at_fpr, OperatingPoint, RocCurve};
pub use selfsupervised::{
    Metrics, PretrainingConfig, SelfSupervisedPretraining, TrialMetrics,
};
