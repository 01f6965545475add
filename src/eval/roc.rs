//! ROC-curve metrics at fixed false-positive-rate operating points

use serde::{Deserialize, Serialize};

/// One evaluated operating point: the achieved true-positive rate and the
/// probability threshold at a requested false-positive-rate target.
///
/// `tpr`/`threshold` are NaN when the ROC curve is undefined for the trial
/// (single-class labels). serde_json renders NaN as `null`, so the
/// undetermined marker survives serialization; consumers must filter NaN,
/// never read it as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub fpr_target: f64,
    pub tpr: f64,
    pub threshold: f64,
}

impl OperatingPoint {
    /// NaN marker for a trial whose curve could not be computed.
    pub fn undetermined(fpr_target: f64) -> Self {
        Self { fpr_target, tpr: f64::NAN, threshold: f64::NAN }
    }

    pub fn is_determined(&self) -> bool {
        self.tpr.is_finite() && self.threshold.is_finite()
    }
}

/// A computed ROC curve. `fpr` and `tpr` are non-decreasing; `thresholds`
/// is decreasing, with a leading sentinel above every score.
#[derive(Debug, Clone)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Compute the ROC curve for binary labels and scores.
///
/// Sweeps thresholds from high to low over the distinct score values,
/// prepending the `(0, 0)` point. Returns `None` when all labels belong to
/// one class, which leaves the curve undefined.
pub fn roc_curve(labels: &[u8], scores: &[f64]) -> Option<RocCurve> {
    assert_eq!(labels.len(), scores.len(), "labels/scores length mismatch");

    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];

    let mut tp = 0usize;
    let mut fp = 0usize;
    for (rank, &i) in order.iter().enumerate() {
        if labels[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        // Emit a point only at distinct-score boundaries so tied scores
        // collapse into one threshold.
        let next = rank + 1;
        if next == order.len() || scores[order[next]] < scores[i] {
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(scores[i]);
        }
    }

    Some(RocCurve { fpr, tpr, thresholds })
}

/// Extract `(tpr, threshold)` at each requested false-positive-rate target.
///
/// Policy: the tightest achievable point with `fpr <= target`, taking the
/// last such point in ascending curve order. Degenerate single-class input
/// yields NaN points for every target.
pub fn tpr_at_fpr(labels: &[u8], scores: &[f64], fpr_targets: &[f64]) -> Vec<OperatingPoint> {
    match roc_curve(labels, scores) {
        Some(curve) => fpr_targets
            .iter()
            .map(|&target| {
                // fpr is non-decreasing; the first point is always 0.0, so
                // a qualifying index exists for any non-negative target.
                let idx = curve
                    .fpr
                    .iter()
                    .rposition(|&f| f <= target)
                    .unwrap_or(0);
                OperatingPoint {
                    fpr_target: target,
                    tpr: curve.tpr[idx],
                    threshold: curve.thresholds[idx],
                }
            })
            .collect(),
        None => fpr_targets
            .iter()
            .map(|&target| OperatingPoint::undetermined(target))
            .collect(),
    }
}
