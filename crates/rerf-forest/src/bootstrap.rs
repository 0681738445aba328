//! Bootstrap sampling with out-of-bag bookkeeping.

use crate::rng::TreeRng;

/// In-bag draw and out-of-bag complement for one tree.
#[derive(Debug, Clone)]
pub struct BootstrapSample {
    in_bag: Vec<usize>,
    out_of_bag: Vec<usize>,
}

impl BootstrapSample {
    /// In-bag observation indices in draw order (duplicates kept).
    #[must_use]
    pub fn in_bag(&self) -> &[usize] {
        &self.in_bag
    }

    /// Out-of-bag observation indices, ascending.
    #[must_use]
    pub fn out_of_bag(&self) -> &[usize] {
        &self.out_of_bag
    }

    /// Whether `observation` was never drawn for this tree.
    #[must_use]
    pub fn is_out_of_bag(&self, observation: usize) -> bool {
        self.out_of_bag.binary_search(&observation).is_ok()
    }

    pub(crate) fn into_parts(self) -> (Vec<usize>, Vec<usize>) {
        (self.in_bag, self.out_of_bag)
    }
}

/// Draw `n_observations` indices with replacement and derive the OOB set.
///
/// The complement is found by sorting a copy of the draw once and
/// merge-scanning it against `0..n_observations`, so each index is visited a
/// constant number of times.
pub fn draw_bootstrap(n_observations: usize, rng: &mut TreeRng) -> BootstrapSample {
    let in_bag: Vec<usize> = (0..n_observations)
        .map(|_| rng.next_bounded(n_observations))
        .collect();

    let mut sorted = in_bag.clone();
    sorted.sort_unstable();

    let mut out_of_bag = Vec::new();
    let mut drawn = sorted.iter().peekable();
    for candidate in 0..n_observations {
        while drawn.next_if(|&&d| d < candidate).is_some() {}
        if drawn.peek() != Some(&&candidate) {
            out_of_bag.push(candidate);
        }
    }

    BootstrapSample { in_bag, out_of_bag }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::draw_bootstrap;
    use crate::rng::TreeRng;

    #[test]
    fn in_bag_has_n_draws() {
        let mut rng = TreeRng::from_seed(42);
        let sample = draw_bootstrap(100, &mut rng);
        assert_eq!(sample.in_bag().len(), 100);
        assert!(sample.in_bag().iter().all(|&i| i < 100));
    }

    #[test]
    fn oob_disjoint_from_in_bag_and_covers_rest() {
        for seed in 0..20 {
            let mut rng = TreeRng::from_seed(seed);
            let n = 57;
            let sample = draw_bootstrap(n, &mut rng);
            let in_bag: HashSet<usize> = sample.in_bag().iter().copied().collect();
            let oob: HashSet<usize> = sample.out_of_bag().iter().copied().collect();

            assert!(in_bag.is_disjoint(&oob));
            assert_eq!(oob.len(), sample.out_of_bag().len(), "OOB has duplicates");
            assert_eq!(in_bag.len() + oob.len(), n);
            assert!(in_bag.union(&oob).all(|&i| i < n));
        }
    }

    #[test]
    fn oob_is_sorted_and_queryable() {
        let mut rng = TreeRng::from_seed(11);
        let sample = draw_bootstrap(40, &mut rng);
        assert!(sample.out_of_bag().windows(2).all(|w| w[0] < w[1]));
        for i in 0..40 {
            assert_eq!(sample.is_out_of_bag(i), !sample.in_bag().contains(&i));
        }
    }

    #[test]
    fn single_observation_is_always_in_bag() {
        let mut rng = TreeRng::from_seed(3);
        let sample = draw_bootstrap(1, &mut rng);
        assert_eq!(sample.in_bag(), &[0]);
        assert!(sample.out_of_bag().is_empty());
    }

    #[test]
    fn typical_oob_fraction() {
        // Expected OOB fraction is (1 - 1/n)^n ≈ 0.368.
        let mut rng = TreeRng::from_seed(8);
        let sample = draw_bootstrap(2000, &mut rng);
        let frac = sample.out_of_bag().len() as f64 / 2000.0;
        assert!((0.32..0.42).contains(&frac), "oob fraction = {frac}");
    }
}
