//! Held-out evaluation metrics for binary classifiers.

use std::cmp::Ordering;

/// Area under the ROC curve (Wilcoxon-Mann-Whitney statistic). Tied scores count half.
///
/// Returns 0.5 when either class is absent.
pub fn roc_auc(predictions: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if predictions.is_empty() || n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let pairs = sorted_descending(predictions, labels);

    // Walk groups of tied scores; each negative beats nothing in its group and loses to every
    // positive ranked above it, plus half of the tied positives.
    let mut auc = 0.0;
    let mut positives_above = 0usize;
    for group in tied_groups(&pairs) {
        let group_pos = group.iter().filter(|(_, l)| *l).count();
        let group_neg = group.len() - group_pos;
        auc += group_neg as f64 * (positives_above as f64 + group_pos as f64 / 2.0);
        positives_above += group_pos;
    }

    auc / (n_pos as f64 * n_neg as f64)
}

/// Average precision: precision at each recall step, weighted by the recall gained.
pub fn average_precision(predictions: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    if predictions.is_empty() || n_pos == 0 {
        return 0.0;
    }

    let pairs = sorted_descending(predictions, labels);
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut ap = 0.0;
    for group in tied_groups(&pairs) {
        let group_pos = group.iter().filter(|(_, l)| *l).count();
        tp += group_pos;
        seen += group.len();
        if group_pos > 0 {
            let precision = tp as f64 / seen as f64;
            ap += precision * group_pos as f64 / n_pos as f64;
        }
    }
    ap
}

/// Mean squared difference between predicted probability and outcome.
pub fn brier_score(predictions: &[f64], labels: &[bool]) -> f64 {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return 0.0;
    }
    predictions
        .iter()
        .zip(labels)
        .map(|(&p, &l)| {
            let y = if l { 1.0 } else { 0.0 };
            (p - y).powi(2)
        })
        .sum::<f64>()
        / n as f64
}

fn sorted_descending(predictions: &[f64], labels: &[bool]) -> Vec<(f64, bool)> {
    let mut pairs: Vec<(f64, bool)> = predictions
        .iter()
        .zip(labels.iter())
        .map(|(&p, &l)| (p, l))
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    pairs
}

fn tied_groups(pairs: &[(f64, bool)]) -> impl Iterator<Item = &[(f64, bool)]> {
    pairs.chunk_by(|a, b| a.0 == b.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = [true, true, false, false];
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels), 1.0);
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        assert_eq!(roc_auc(&[0.5, 0.5], &[true, false]), 0.5);
        assert_eq!(roc_auc(&[0.7, 0.4, 0.4], &[true, true, false]), 0.75);
    }

    #[test]
    fn test_roc_auc_single_class() {
        assert_eq!(roc_auc(&[0.2, 0.9], &[true, true]), 0.5);
        assert_eq!(roc_auc(&[], &[]), 0.5);
    }

    #[test]
    fn test_average_precision() {
        assert_eq!(average_precision(&[0.9, 0.8, 0.2], &[true, true, false]), 1.0);
        // ranks: pos (P=1), neg, pos (P=2/3)
        let ap = average_precision(&[0.9, 0.5, 0.1], &[true, false, true]);
        assert!((ap - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
        assert_eq!(average_precision(&[0.3], &[false]), 0.0);
    }

    #[test]
    fn test_brier_score() {
        assert_eq!(brier_score(&[1.0, 0.0], &[true, false]), 0.0);
        assert!((brier_score(&[0.5, 0.5], &[true, false]) - 0.25).abs() < 1e-12);
        assert_eq!(brier_score(&[], &[]), 0.0);
    }
}
