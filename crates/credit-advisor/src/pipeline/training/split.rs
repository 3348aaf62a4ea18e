use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const TEST_FRACTION: f64 = 0.2;

/// Row indices assigned to each side of the hold-out split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Set when stratification was impossible and a plain shuffle was used instead.
    pub used_fallback: bool,
}

pub fn test_size(total: usize) -> usize {
    let size = (total as f64 * TEST_FRACTION).ceil() as usize;
    size.min(total.saturating_sub(1))
}

/// Holds out `ceil(0.2 * n)` rows, preserving the label ratio when both classes have at
/// least two members.
pub fn stratified_split(labels: &[bool], seed: u64) -> SplitPlan {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_test = test_size(labels.len());

    let mut positives: Vec<usize> = (0..labels.len()).filter(|&idx| labels[idx]).collect();
    let mut negatives: Vec<usize> = (0..labels.len()).filter(|&idx| !labels[idx]).collect();

    if positives.len() < 2 || negatives.len() < 2 || n_test < 2 {
        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.shuffle(&mut rng);
        let train = order.split_off(n_test);
        return finish(train, order, true);
    }

    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let share = positives.len() as f64 / labels.len() as f64;
    let mut pos_test = ((n_test as f64) * share).round() as usize;
    pos_test = pos_test.clamp(1, positives.len() - 1);
    let mut neg_test = n_test.saturating_sub(pos_test).clamp(1, negatives.len() - 1);
    while pos_test + neg_test > n_test && pos_test > 1 && pos_test >= neg_test {
        pos_test -= 1;
    }
    while pos_test + neg_test > n_test && neg_test > 1 {
        neg_test -= 1;
    }

    let mut test: Vec<usize> = positives.drain(..pos_test).collect();
    test.extend(negatives.drain(..neg_test));
    let mut train = positives;
    train.extend(negatives);

    finish(train, test, false)
}

/// Between three and five folds, one per ten rows.
pub fn fold_count(total: usize) -> usize {
    (total / 10).clamp(3, 5)
}

/// Deals shuffled rows of each class round-robin into `n_folds` folds so every fold keeps the
/// label ratio. `None` when a class has fewer members than there are folds.
pub fn stratified_folds(labels: &[bool], n_folds: usize, seed: u64) -> Option<Vec<Vec<usize>>> {
    let mut positives: Vec<usize> = (0..labels.len()).filter(|&idx| labels[idx]).collect();
    let mut negatives: Vec<usize> = (0..labels.len()).filter(|&idx| !labels[idx]).collect();
    if n_folds < 2 || positives.len() < n_folds || negatives.len() < n_folds {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); n_folds];
    for (slot, idx) in positives.into_iter().chain(negatives).enumerate() {
        folds[slot % n_folds].push(idx);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Some(folds)
}

fn finish(mut train: Vec<usize>, mut test: Vec<usize>, used_fallback: bool) -> SplitPlan {
    train.sort_unstable();
    test.sort_unstable();
    SplitPlan {
        train,
        test,
        used_fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_out_twenty_percent_rounded_up() {
        assert_eq!(test_size(10), 2);
        assert_eq!(test_size(11), 3);
        assert_eq!(test_size(100), 20);
    }

    #[test]
    fn stratified_split_keeps_both_classes_in_test() {
        let labels: Vec<bool> = (0..50).map(|idx| idx % 5 == 0).collect();
        let plan = stratified_split(&labels, 42);

        assert!(!plan.used_fallback);
        assert_eq!(plan.test.len(), 10);
        assert_eq!(plan.train.len(), 40);
        assert_eq!(plan.test.iter().filter(|&&idx| labels[idx]).count(), 2);
    }

    #[test]
    fn single_class_falls_back_to_random_split() {
        let labels = vec![true; 12];
        let plan = stratified_split(&labels, 42);

        assert!(plan.used_fallback);
        assert_eq!(plan.test.len(), 3);
        assert_eq!(plan.train.len(), 9);
    }

    #[test]
    fn fold_count_scales_with_rows() {
        assert_eq!(fold_count(12), 3);
        assert_eq!(fold_count(40), 4);
        assert_eq!(fold_count(500), 5);
    }

    #[test]
    fn folds_partition_rows_and_keep_both_classes() {
        let labels: Vec<bool> = (0..40).map(|idx| idx % 4 == 0).collect();
        let folds = stratified_folds(&labels, 4, 42).expect("folds build");

        let mut seen: Vec<usize> = folds.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.len(), 10);
            let positives = fold.iter().filter(|&&idx| labels[idx]).count();
            assert!((2..=3).contains(&positives), "fold positives {positives}");
        }
    }

    #[test]
    fn folds_need_every_class_in_every_fold() {
        let labels: Vec<bool> = (0..30).map(|idx| idx < 2).collect();
        assert!(stratified_folds(&labels, 3, 42).is_none());
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        let labels: Vec<bool> = (0..30).map(|idx| idx % 3 == 0).collect();
        assert_eq!(stratified_split(&labels, 7), stratified_split(&labels, 7));
    }
}
