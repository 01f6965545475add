//! Datasets and vocabulary for token-sequence classification
//!
//! Sequences are fixed-length rows of integer token ids (the upstream
//! tokenizer pads and truncates; this crate treats rows as immutable).
//! Labels are binary: 0 = benign, 1 = malicious.

mod split;

pub use split::{split_dataset, TrialSplit};

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::collections::HashMap;

/// Token vocabulary with reserved padding and mask ids.
///
/// Read-only for the lifetime of a run. Construction from a full token→id
/// map is supported but the harness itself only needs the size and the two
/// reserved ids.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    size: usize,
    pad_id: u32,
    mask_id: u32,
}

impl Vocabulary {
    /// Create a vocabulary from its size and reserved ids.
    pub fn new(size: usize, pad_id: u32, mask_id: u32) -> Result<Self> {
        if size < 2 {
            return Err(Error::Config(format!(
                "vocabulary must hold at least pad and mask tokens, got size {size}"
            )));
        }
        if pad_id as usize >= size || mask_id as usize >= size {
            return Err(Error::Config(format!(
                "reserved ids (pad={pad_id}, mask={mask_id}) must be < vocab size {size}"
            )));
        }
        if pad_id == mask_id {
            return Err(Error::Config(
                "pad and mask tokens must be distinct".to_string(),
            ));
        }
        Ok(Self { size, pad_id, mask_id })
    }

    /// Create from a token→id map, resolving the reserved tokens by name.
    pub fn from_tokens(
        tokens: &HashMap<String, u32>,
        pad_token: &str,
        mask_token: &str,
    ) -> Result<Self> {
        let pad_id = *tokens
            .get(pad_token)
            .ok_or_else(|| Error::Config(format!("pad token {pad_token:?} not in vocabulary")))?;
        let mask_id = *tokens
            .get(mask_token)
            .ok_or_else(|| Error::Config(format!("mask token {mask_token:?} not in vocabulary")))?;
        Self::new(tokens.len(), pad_id, mask_id)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn mask_id(&self) -> u32 {
        self.mask_id
    }

    /// Whether a token id is the padding token.
    pub fn is_padding(&self, token: u32) -> bool {
        token == self.pad_id
    }
}

/// Parallel sequences/labels pair with enforced length agreement.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    x: Array2<u32>,
    y: Array1<u8>,
}

impl LabeledDataset {
    /// Bundle sequences and labels, checking the parallel-array invariant.
    pub fn new(x: Array2<u32>, y: Array1<u8>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::Data(format!(
                "sequences/labels length mismatch: {} vs {}",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            return Err(Error::Data(format!("labels must be binary, found {bad}")));
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn sequences(&self) -> ArrayView2<'_, u32> {
        self.x.view()
    }

    pub fn labels(&self) -> &Array1<u8> {
        &self.y
    }

    /// Materialize the rows at the given indices.
    pub fn select_sequences(&self, indices: &[usize]) -> Array2<u32> {
        self.x.select(Axis(0), indices)
    }

    /// Materialize the labels at the given indices.
    pub fn select_labels(&self, indices: &[usize]) -> Array1<u8> {
        Array1::from_iter(indices.iter().map(|&i| self.y[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_vocabulary_reserved_ids() {
        let vocab = Vocabulary::new(20, 0, 1).unwrap();
        assert_eq!(vocab.size(), 20);
        assert!(vocab.is_padding(0));
        assert!(!vocab.is_padding(1));
        assert_eq!(vocab.mask_id(), 1);
    }

    #[test]
    fn test_vocabulary_rejects_bad_ids() {
        assert!(Vocabulary::new(1, 0, 0).is_err());
        assert!(Vocabulary::new(10, 10, 1).is_err());
        assert!(Vocabulary::new(10, 0, 0).is_err());
    }

    #[test]
    fn test_vocabulary_from_tokens() {
        let mut tokens = HashMap::new();
        tokens.insert("<pad>".to_string(), 0u32);
        tokens.insert("<mask>".to_string(), 1u32);
        tokens.insert("mov".to_string(), 2u32);

        let vocab = Vocabulary::from_tokens(&tokens, "<pad>", "<mask>").unwrap();
        assert_eq!(vocab.size(), 3);
        assert_eq!(vocab.pad_id(), 0);
        assert_eq!(vocab.mask_id(), 1);

        assert!(Vocabulary::from_tokens(&tokens, "<pad>", "<cls>").is_err());
    }

    #[test]
    fn test_dataset_length_invariant() {
        let x = array![[1u32, 2, 3], [4, 5, 6]];
        let y = array![0u8, 1, 0];
        assert!(LabeledDataset::new(x, y).is_err());

        let x = array![[1u32, 2, 3], [4, 5, 6]];
        let y = array![0u8, 1];
        let ds = LabeledDataset::new(x, y).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_dataset_rejects_non_binary_labels() {
        let x = array![[1u32, 2], [3, 4]];
        let y = array![0u8, 2];
        assert!(LabeledDataset::new(x, y).is_err());
    }

    #[test]
    fn test_dataset_selection() {
        let x = array![[1u32, 2], [3, 4], [5, 6]];
        let y = array![0u8, 1, 0];
        let ds = LabeledDataset::new(x, y).unwrap();

        let rows = ds.select_sequences(&[2, 0]);
        assert_eq!(rows, array![[5u32, 6], [1, 2]]);
        assert_eq!(ds.select_labels(&[2, 0]), array![0u8, 0]);
    }
}
