use log::{log_enabled, trace, warn, Level};
use std::time::{Duration, Instant};

/// Pipeline stage named in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Simulate { parallel: bool },
    WriteBack,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Prepare => "jiggle::prepare",
            Stage::Simulate { parallel: true } => "jiggle::simulate::parallel",
            Stage::Simulate { parallel: false } => "jiggle::simulate::sequential",
            Stage::WriteBack => "jiggle::write_back",
        }
    }
}

/// Traces entry and exit of a stage. Inert unless trace logging is on.
pub struct StageTrace {
    stage: Stage,
    start: Option<Instant>,
}

impl StageTrace {
    pub fn begin(stage: Stage, particles: usize) -> Self {
        let start = log_enabled!(Level::Trace).then(Instant::now);
        if start.is_some() {
            trace!("{}: {particles} particles", stage.label());
        }
        Self { stage, start }
    }
}

impl Drop for StageTrace {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            trace!("{} done in {} µs", self.stage.label(), start.elapsed().as_micros());
        }
    }
}

/// Warns when a frame ran past `budget_ms` and reports whether it did.
///
/// A budget of zero or less turns the check off.
pub fn check_frame_budget(elapsed: Duration, budget_ms: f32, chains: usize) -> bool {
    let elapsed_ms = elapsed.as_secs_f32() * 1000.0;
    let exceeded = budget_ms > 0.0 && elapsed_ms > budget_ms;
    if exceeded {
        warn!("jiggle frame over budget: {elapsed_ms:.2} ms > {budget_ms:.2} ms ({chains} chains)");
    }
    exceeded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_disables_the_check() {
        assert!(!check_frame_budget(Duration::from_secs(1), 0.0, 4));
        assert!(!check_frame_budget(Duration::from_secs(1), -2.0, 4));
    }

    #[test]
    fn frames_over_budget_are_flagged() {
        assert!(check_frame_budget(Duration::from_millis(5), 2.0, 1));
        assert!(!check_frame_budget(Duration::from_millis(1), 2.0, 1));
    }

    #[test]
    fn stage_labels_name_the_execution_mode() {
        assert_eq!(Stage::Simulate { parallel: true }.label(), "jiggle::simulate::parallel");
        assert_eq!(Stage::Simulate { parallel: false }.label(), "jiggle::simulate::sequential");
        let _trace = StageTrace::begin(Stage::WriteBack, 0);
    }
}
