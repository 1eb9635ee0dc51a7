use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;
use std::time::Duration;
use traffic_signals::SignalConfig;

/// Stopwatch and randomized threshold driving the phase toggles.
///
/// The cycle loop feeds it the wall-clock time measured between two of its
/// own iterations; `advance` reports when the accumulated time has reached
/// the current phase duration.
pub(crate) struct PhaseCycle {
    rng: ChaCha8Rng,
    range_ms: Range<u64>,
    reroll: bool,
    threshold: Duration,
    stopwatch: Duration,
}

impl PhaseCycle {
    /// `config` must already be validated (non-empty cycle range).
    pub(crate) fn new(config: &SignalConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut cycle = Self {
            rng,
            range_ms: config.min_cycle_ms..config.max_cycle_ms,
            reroll: config.reroll_each_cycle,
            threshold: Duration::ZERO,
            stopwatch: Duration::ZERO,
        };
        cycle.threshold = cycle.roll();
        cycle
    }

    /// Uniform draw over `[min_cycle_ms, max_cycle_ms)`.
    fn roll(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.range_ms.clone()))
    }

    /// Accumulate `elapsed`. Returns `true` when the phase should toggle, in
    /// which case the stopwatch restarts from zero.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> bool {
        self.stopwatch += elapsed;
        if self.stopwatch < self.threshold {
            return false;
        }
        self.stopwatch = Duration::ZERO;
        if self.reroll {
            self.threshold = self.roll();
        }
        true
    }

    pub(crate) fn threshold(&self) -> Duration {
        self.threshold
    }

    #[cfg(test)]
    pub(crate) fn stopwatch(&self) -> Duration {
        self.stopwatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64, reroll: bool) -> SignalConfig {
        SignalConfig {
            seed: Some(seed),
            reroll_each_cycle: reroll,
            ..SignalConfig::default()
        }
    }

    #[test]
    fn test_threshold_within_default_range() {
        let mut cycle = PhaseCycle::new(&seeded(1, true));
        let range = Duration::from_millis(4000)..Duration::from_millis(6000);

        let mut total = Duration::ZERO;
        for _ in 0..1000 {
            let threshold = cycle.threshold();
            assert!(range.contains(&threshold), "{threshold:?} out of range");
            total += threshold;
            assert!(cycle.advance(threshold));
        }

        // Uniform over [4000, 6000): mean sits near 5000 ms
        let mean_ms = total.as_millis() / 1000;
        assert!((4900..5100).contains(&mean_ms), "mean {mean_ms} ms");
    }

    #[test]
    fn test_advance_accumulates_until_threshold() {
        let mut cycle = PhaseCycle::new(&seeded(7, false));
        let threshold = cycle.threshold();
        let step = Duration::from_millis(1);

        let mut steps = 0u64;
        while !cycle.advance(step) {
            steps += 1;
            assert_eq!(cycle.stopwatch(), step * steps as u32);
        }

        assert_eq!(steps + 1, threshold.as_millis() as u64);
        assert_eq!(cycle.stopwatch(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_threshold_without_reroll() {
        let mut cycle = PhaseCycle::new(&seeded(3, false));
        let first = cycle.threshold();
        for _ in 0..20 {
            assert!(cycle.advance(first));
            assert_eq!(cycle.threshold(), first);
        }
    }

    #[test]
    fn test_reroll_changes_threshold() {
        let mut cycle = PhaseCycle::new(&seeded(3, true));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            seen.insert(cycle.threshold());
            let threshold = cycle.threshold();
            cycle.advance(threshold);
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let mut a = PhaseCycle::new(&seeded(42, true));
        let mut b = PhaseCycle::new(&seeded(42, true));
        for _ in 0..50 {
            assert_eq!(a.threshold(), b.threshold());
            let t = a.threshold();
            a.advance(t);
            b.advance(t);
        }
    }

    #[test]
    fn test_overshoot_does_not_carry_over() {
        let mut cycle = PhaseCycle::new(&seeded(5, false));
        let threshold = cycle.threshold();
        assert!(cycle.advance(threshold + Duration::from_millis(500)));
        assert_eq!(cycle.stopwatch(), Duration::ZERO);
        assert!(!cycle.advance(threshold - Duration::from_millis(1)));
    }
}
