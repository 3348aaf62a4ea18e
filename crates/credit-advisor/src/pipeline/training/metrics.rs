use super::super::artifact::ModelMetrics;

pub const DECISION_THRESHOLD: f64 = 0.5;

/// Hold-out metrics at the 0.5 threshold. Ratios with a zero denominator report 0 and a
/// single-class label set reports an AUC of 0.5.
pub fn evaluate(labels: &[bool], probabilities: &[f64]) -> ModelMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;

    for (label, probability) in labels.iter().zip(probabilities) {
        match (*label, *probability >= DECISION_THRESHOLD) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    let accuracy = ratio(tp + tn, tp + tn + fp + fn_);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ModelMetrics {
        accuracy,
        precision,
        recall,
        f1,
        auc: roc_auc(labels, probabilities),
        cv_accuracy: None,
        cv_std_accuracy: None,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Mann-Whitney formulation with average ranks for ties.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> f64 {
    let positives = labels.iter().filter(|label| **label).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut ranks = vec![0.0; labels.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let average = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = average;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(label, _)| **label)
        .map(|(_, rank)| rank)
        .sum();

    let p = positives as f64;
    let n = negatives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking_scores_one() {
        let labels = [false, false, true, true];
        let scores = [0.1, 0.2, 0.8, 0.9];
        let metrics = evaluate(&labels, &scores);

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.auc, 1.0);
    }

    #[test]
    fn ties_count_half() {
        let labels = [false, true];
        assert_eq!(roc_auc(&labels, &[0.4, 0.4]), 0.5);
    }

    #[test]
    fn single_class_reports_neutral_auc_and_zero_precision() {
        let labels = [false, false, false];
        let metrics = evaluate(&labels, &[0.1, 0.2, 0.3]);

        assert_eq!(metrics.auc, 0.5);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.accuracy, 1.0);
    }
}
