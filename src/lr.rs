use burn::{config::Config, lr_scheduler::LrScheduler, tensor::backend::Backend, LearningRate};

/// The configuration for creating a one-cycle learning rate scheduler with
/// linear annealing.
///
/// The learning rate ramps linearly from `max_lr / div_factor` up to `max_lr`
/// over the first `pct_start` fraction of `num_iters`, then anneals linearly
/// down to `max_lr / div_factor / final_div_factor` over the remaining
/// iterations. The scheduler is stepped once per training batch, so
/// `num_iters` must cover the entire run (epochs × batches per epoch).
#[derive(Config)]
pub struct OneCycleLrConfig {
    // The peak learning rate, reached at the end of the warmup phase.
    max_lr: LearningRate,
    // The total number of iterations in the cycle.
    num_iters: usize,
    // The fraction of the cycle spent increasing the learning rate.
    #[config(default = 0.3)]
    pct_start: f64,
    // Determines the starting learning rate: `max_lr / div_factor`.
    #[config(default = 25.0)]
    div_factor: f64,
    // Determines the final learning rate: `start_lr / final_div_factor`.
    #[config(default = 1e4)]
    final_div_factor: f64,
}

impl OneCycleLrConfig {
    /// Initializes a [one-cycle learning rate scheduler](OneCycleLr).
    ///
    /// # Panics
    /// This function panics if `max_lr` is not between 0 and 1, if `num_iters`
    /// is lower than 2, if `pct_start` is not strictly between 0 and 1, or if
    /// either divisor is not greater than 1.
    pub fn init(&self) -> OneCycleLr {
        assert!(
            self.max_lr > 0. && self.max_lr <= 1.,
            "Maximum learning rate must be greater than 0 and at most 1"
        );
        assert!(
            self.num_iters >= 2,
            "Number of iterations must be at least 2"
        );
        assert!(
            self.pct_start > 0. && self.pct_start < 1.,
            "Warmup fraction must be strictly between 0 and 1"
        );
        assert!(
            self.div_factor > 1. && self.final_div_factor > 1.,
            "Divisors must be greater than 1"
        );

        let start_lr = self.max_lr / self.div_factor;
        let final_lr = start_lr / self.final_div_factor;
        // At least one warmup step and at least one annealing step.
        let warmup_iters =
            ((self.num_iters as f64 * self.pct_start).round() as usize).clamp(1, self.num_iters - 1);

        OneCycleLr {
            start_lr,
            max_lr: self.max_lr,
            final_lr,
            warmup_iters,
            num_iters: self.num_iters,
            current_iter: 0,
        }
    }
}

/// A one-cycle learning rate scheduler.
///
/// See [OneCycleLrConfig] for more information.
#[derive(Clone, Copy, Debug)]
pub struct OneCycleLr {
    start_lr: LearningRate,
    max_lr: LearningRate,
    final_lr: LearningRate,
    warmup_iters: usize,
    num_iters: usize,
    current_iter: usize,
}

impl OneCycleLr {
    /// The learning rate the next [`step`](LrScheduler::step) will return,
    /// without advancing the schedule.
    pub fn peek(&self) -> LearningRate {
        self.lr_at(self.current_iter)
    }

    fn lr_at(&self, iter: usize) -> LearningRate {
        if iter >= self.num_iters {
            return self.final_lr;
        }
        if iter <= self.warmup_iters {
            let pct = iter as f64 / self.warmup_iters as f64;
            self.start_lr + pct * (self.max_lr - self.start_lr)
        } else {
            let pct =
                (iter - self.warmup_iters) as f64 / (self.num_iters - 1 - self.warmup_iters) as f64;
            self.max_lr + pct * (self.final_lr - self.max_lr)
        }
    }
}

impl LrScheduler for OneCycleLr {
    type Record<B: Backend> = usize;

    fn step(&mut self) -> LearningRate {
        let lr = self.lr_at(self.current_iter);
        if self.current_iter < self.num_iters {
            self.current_iter += 1;
        }
        lr
    }

    fn to_record<B: Backend>(&self) -> Self::Record<B> {
        self.current_iter
    }

    fn load_record<B: Backend>(mut self, record: Self::Record<B>) -> Self {
        self.current_iter = record;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    const MAX_LR: LearningRate = 0.005;
    const NUM_ITERS: usize = 100;

    fn scheduler() -> OneCycleLr {
        OneCycleLrConfig::new(MAX_LR, NUM_ITERS).init()
    }

    fn lr_sequence(mut scheduler: OneCycleLr) -> Vec<LearningRate> {
        (0..NUM_ITERS).map(|_| scheduler.step()).collect()
    }

    #[test]
    #[should_panic = "Maximum learning rate must be greater than 0 and at most 1"]
    fn config_max_lr_too_low() {
        OneCycleLrConfig::new(0., 100).init();
    }

    #[test]
    #[should_panic = "Maximum learning rate must be greater than 0 and at most 1"]
    fn config_max_lr_too_high() {
        OneCycleLrConfig::new(1.5, 100).init();
    }

    #[test]
    #[should_panic = "Number of iterations must be at least 2"]
    fn config_num_iters_too_low() {
        OneCycleLrConfig::new(0.5, 1).init();
    }

    #[test]
    #[should_panic = "Warmup fraction must be strictly between 0 and 1"]
    fn config_pct_start_out_of_range() {
        OneCycleLrConfig::new(0.5, 100).with_pct_start(1.).init();
    }

    #[test]
    fn starts_at_the_configured_start_value() {
        let mut scheduler = scheduler();
        let lr = scheduler.step();
        assert!((lr - MAX_LR / 25.0).abs() < 1e-12);
    }

    #[test]
    fn has_a_single_peak_at_the_warmup_boundary() {
        let lrs = lr_sequence(scheduler());
        let peak = lrs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(peak, 30, "peak must sit at pct_start * num_iters");
        assert!((lrs[peak] - MAX_LR).abs() < 1e-12);

        for i in 0..peak {
            assert!(lrs[i] < lrs[i + 1], "warmup must be strictly increasing");
        }
        for i in peak..NUM_ITERS - 1 {
            assert!(lrs[i] > lrs[i + 1], "annealing must be strictly decreasing");
        }
    }

    #[test]
    fn ends_low_and_stays_there() {
        let mut scheduler = scheduler();
        let lrs = lr_sequence(scheduler.clone());
        let final_lr = MAX_LR / 25.0 / 1e4;

        assert!((lrs[NUM_ITERS - 1] - final_lr).abs() < 1e-12);

        // Stepping past the cycle keeps returning the final value.
        for _ in 0..NUM_ITERS + 5 {
            scheduler.step();
        }
        assert!((scheduler.step() - final_lr).abs() < 1e-12);
    }

    #[test]
    fn peek_matches_the_next_step_without_advancing() {
        let mut scheduler = scheduler();
        for _ in 0..NUM_ITERS + 3 {
            let peeked = scheduler.peek();
            assert_eq!(peeked, scheduler.peek());
            assert_eq!(scheduler.step(), peeked);
        }
    }

    #[test]
    fn resumes_from_a_record() {
        let mut truth = scheduler();
        let mut restored = scheduler();

        for _ in 0..42 {
            truth.step();
            restored.step();
        }
        let record = LrScheduler::to_record::<TestBackend>(&restored);
        let mut restored = LrScheduler::load_record::<TestBackend>(scheduler(), record);

        for _ in 0..42 {
            assert_eq!(truth.step(), restored.step());
        }
    }
}
