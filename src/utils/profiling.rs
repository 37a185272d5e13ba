use std::time::{Duration, Instant};

/// Per-frame timing and workload counters of a [`Batch`](crate::batch::Batch).
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameProfiler {
    pub prepare_time: Duration,
    pub simulate_time: Duration,
    pub write_back_time: Duration,
    pub total_frame_time: Duration,

    pub chain_count: usize,
    pub particle_count: usize,
    pub substeps: u32,
}

impl FrameProfiler {
    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::info!(
            "jiggle frame: {} chains, {} particles, {} sub-steps, {:.3} ms",
            self.chain_count,
            self.particle_count,
            self.substeps,
            self.total_frame_time.as_secs_f32() * 1000.0
        );
        log::info!(
            "  prepare:    {:.3} ms ({:.1}%)",
            self.prepare_time.as_secs_f32() * 1000.0,
            (self.prepare_time.as_micros() as f32 / total_us) * 100.0
        );
        log::info!(
            "  simulate:   {:.3} ms ({:.1}%)",
            self.simulate_time.as_secs_f32() * 1000.0,
            (self.simulate_time.as_micros() as f32 / total_us) * 100.0
        );
        log::info!(
            "  write-back: {:.3} ms ({:.1}%)",
            self.write_back_time.as_secs_f32() * 1000.0,
            (self.write_back_time.as_micros() as f32 / total_us) * 100.0
        );
    }
}

/// Adds the lifetime of the guard to the referenced duration.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
