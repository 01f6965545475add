//! Masked-language-model pretraining
//!
//! - `masking`: per-token masking policy and masked-batch structures
//! - `trainer`: the pretraining loop with remasking and a step budget

mod masking;
mod trainer;

pub use masking::{MaskedBatch, MaskedSequence, MaskingPolicy, MaskingStrategy};
pub use trainer::{
    CheckpointHook, MaskedLanguageModelTrainer, PretrainSchedule, ProgressSink, Silent,
};
