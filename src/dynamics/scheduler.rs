use crate::config::MAX_SUBSTEPS_PER_FRAME;

/// Decides how many fixed-size sub-steps a frame runs.
///
/// Leftover time carries over between frames. When a frame would need more
/// than [`MAX_SUBSTEPS_PER_FRAME`] sub-steps the leftover is discarded, trading accuracy for
/// a bounded amount of work after a stall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstepScheduler {
    rate: f32,
    accumulator: f32,
    overrun: bool,
}

impl Default for SubstepScheduler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_UPDATE_RATE)
    }
}

impl SubstepScheduler {
    /// `rate` is in sub-steps per second; `<= 0` means one sub-step per frame.
    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            accumulator: 0.0,
            overrun: false,
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
        self.accumulator = 0.0;
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Whether the last [`steps_for`](Self::steps_for) call hit the cap.
    pub fn overran(&self) -> bool {
        self.overrun
    }

    /// Fixed sub-step length, or `None` when running uncapped.
    pub fn step_duration(&self) -> Option<f32> {
        self.is_fixed_rate().then(|| 1.0 / self.rate)
    }

    pub fn is_fixed_rate(&self) -> bool {
        self.rate > 0.0 && self.rate.is_finite()
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.overrun = false;
    }

    /// Number of sub-steps due after `frame_dt` seconds.
    pub fn steps_for(&mut self, frame_dt: f32) -> u32 {
        self.overrun = false;
        if !self.is_fixed_rate() {
            return 1;
        }

        let frame_dt = if frame_dt.is_finite() { frame_dt.max(0.0) } else { 0.0 };
        let frame_time = 1.0 / self.rate;
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= frame_time {
            self.accumulator -= frame_time;
            steps += 1;
            if steps >= MAX_SUBSTEPS_PER_FRAME {
                self.accumulator = 0.0;
                self.overrun = true;
                break;
            }
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn steady_frame_rate_runs_one_step_without_drift() {
        let mut scheduler = SubstepScheduler::new(60.0);
        let dt = 1.0 / 60.0;
        for _ in 0..1000 {
            assert_eq!(scheduler.steps_for(dt), 1);
            assert_abs_diff_eq!(scheduler.accumulator(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn stall_is_capped_and_discarded() {
        let mut scheduler = SubstepScheduler::new(60.0);
        assert_eq!(scheduler.steps_for(100.0 / 60.0), 3);
        assert!(scheduler.overran());
        assert_eq!(scheduler.accumulator(), 0.0);

        assert_eq!(scheduler.steps_for(1.0 / 60.0), 1);
        assert!(!scheduler.overran());
    }

    #[test]
    fn fast_frames_accumulate_to_a_step() {
        let mut scheduler = SubstepScheduler::new(30.0);
        let dt = 1.0 / 100.0;
        let steps: Vec<u32> = (0..8).map(|_| scheduler.steps_for(dt)).collect();
        assert_eq!(steps.iter().sum::<u32>(), 2);
        assert_eq!(steps[0], 0);
    }

    #[test]
    fn non_positive_rate_always_runs_once() {
        let mut scheduler = SubstepScheduler::new(0.0);
        assert_eq!(scheduler.steps_for(0.0), 1);
        assert_eq!(scheduler.steps_for(10.0), 1);
        assert_eq!(scheduler.accumulator(), 0.0);
        assert_eq!(scheduler.step_duration(), None);
    }

    #[test]
    fn bad_frame_times_count_as_zero() {
        let mut scheduler = SubstepScheduler::new(60.0);
        assert_eq!(scheduler.steps_for(f32::NAN), 0);
        assert_eq!(scheduler.steps_for(-1.0), 0);
        assert_eq!(scheduler.accumulator(), 0.0);
    }
}
