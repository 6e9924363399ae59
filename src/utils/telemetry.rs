// file: src/utils/telemetry.rs
// description: per-stage timing of a single stack analysis
// reference: tracing based operation timers

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Times the stages of one analysis (loading, DDM matrix, fitting) and logs them.
pub struct StageTimer {
    label: String,
    start: Instant,
    last: Instant,
    stages: Vec<(String, Duration)>,
}

impl StageTimer {
    pub fn new(label: &str) -> Self {
        info!("Starting {}", label);
        let now = Instant::now();
        Self {
            label: label.to_string(),
            start: now,
            last: now,
            stages: Vec::new(),
        }
    }

    /// Closes the stage that started at the previous checkpoint and returns its duration.
    pub fn checkpoint(&mut self, stage: &str) -> Duration {
        let now = Instant::now();
        let took = now - self.last;
        self.last = now;
        debug!(
            "[{}] {} in {:.2}s ({:.2}s total)",
            self.label,
            stage,
            took.as_secs_f64(),
            (now - self.start).as_secs_f64()
        );
        self.stages.push((stage.to_string(), took));
        took
    }

    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    /// Logs the total time and lag time throughput, returning the total.
    pub fn finish(self, lag_times: usize) -> Duration {
        let total = self.start.elapsed();
        let secs = total.as_secs_f64();
        let rate = if secs > 0.0 { lag_times as f64 / secs } else { 0.0 };
        let breakdown: Vec<String> = self
            .stages
            .iter()
            .map(|(stage, took)| format!("{} {:.2}s", stage, took.as_secs_f64()))
            .collect();
        info!(
            "Finished {}: {} lag times in {:.2}s ({:.2}/sec) [{}]",
            self.label,
            lag_times,
            secs,
            rate,
            breakdown.join(", ")
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_split_the_run() {
        let mut timer = StageTimer::new("sim.tif");
        std::thread::sleep(Duration::from_millis(5));
        let loading = timer.checkpoint("stack loaded");
        let fitting = timer.checkpoint("ISF fitted");

        assert!(loading >= Duration::from_millis(5));
        assert!(fitting < loading);
        let names: Vec<&str> = timer.stages().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["stack loaded", "ISF fitted"]);

        let total = timer.finish(9);
        assert!(total >= loading + fitting);
    }

    #[test]
    fn test_finish_without_stages() {
        let timer = StageTimer::new("empty");
        assert!(timer.stages().is_empty());
        assert!(timer.finish(0) < Duration::from_secs(60));
    }
}
