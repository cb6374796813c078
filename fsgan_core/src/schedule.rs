//! Step cadences for the adversarial training loop.

/// Steps at the start of a run that use the warm-up critic iteration count.
pub const DEFAULT_WARMUP_STEPS: usize = 25;
/// Critic iterations per step during warm-up and on periodic boosts.
pub const DEFAULT_WARMUP_ITERS: usize = 100;
/// Every `period`-th step gets the warm-up iteration count again.
pub const DEFAULT_BOOST_PERIOD: usize = 500;
/// Critic iterations per step outside warm-up.
pub const DEFAULT_CRITIC_ITERS: usize = 5;

/// Number of critic updates to run before each generator update.
///
/// The critic gets a strong head start for the first `warmup_steps` steps and
/// on every `period`-th step afterwards; otherwise it runs `iters` updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticSchedule {
    /// Number of initial steps using `warmup_iters`.
    pub warmup_steps: usize,
    /// Critic updates for warm-up and boosted steps.
    pub warmup_iters: usize,
    /// Boost period in steps (0 disables periodic boosts).
    pub period: usize,
    /// Critic updates for regular steps.
    pub iters: usize,
}

impl Default for CriticSchedule {
    fn default() -> Self {
        Self {
            warmup_steps: DEFAULT_WARMUP_STEPS,
            warmup_iters: DEFAULT_WARMUP_ITERS,
            period: DEFAULT_BOOST_PERIOD,
            iters: DEFAULT_CRITIC_ITERS,
        }
    }
}

impl CriticSchedule {
    /// A schedule running the same number of critic updates on every step.
    pub const fn constant(iters: usize) -> Self {
        Self {
            warmup_steps: 0,
            warmup_iters: iters,
            period: 0,
            iters,
        }
    }

    /// Critic updates for `step`.
    #[inline]
    pub fn iterations(&self, step: usize) -> usize {
        let boosted = self.period > 0 && step % self.period == 0;
        if step < self.warmup_steps || boosted {
            self.warmup_iters
        } else {
            self.iters
        }
    }
}

/// A fixed "every N steps" cadence. A period of zero never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence(pub usize);

impl Cadence {
    /// Whether the cadence fires on `step`.
    #[inline]
    pub fn is_due(&self, step: usize) -> bool {
        self.0 > 0 && step % self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let schedule = CriticSchedule::default();

        assert_eq!(schedule.iterations(0), 100);
        assert_eq!(schedule.iterations(24), 100);
        assert_eq!(schedule.iterations(25), 5);
        assert_eq!(schedule.iterations(499), 5);
        assert_eq!(schedule.iterations(500), 100);
        assert_eq!(schedule.iterations(501), 5);
        assert_eq!(schedule.iterations(1000), 100);
    }

    #[test]
    fn test_constant_schedule() {
        let schedule = CriticSchedule::constant(1);
        assert!((0..1200).all(|step| schedule.iterations(step) == 1));
    }

    #[test]
    fn test_cadence() {
        let every_five = Cadence(5);
        let due: Vec<usize> = (0..12).filter(|&s| every_five.is_due(s)).collect();
        assert_eq!(due, vec![0, 5, 10]);

        assert!(!Cadence(0).is_due(0));
    }
}
