// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for analysis runs
// reference: uses indicatif for progress bars and tracks processing metrics

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub stacks_processed: usize,
    pub stacks_failed: usize,
    pub lag_times_computed: usize,
    pub fits_succeeded: usize,
    pub fits_failed: usize,
    pub duration_secs: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lag_times_per_second(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.lag_times_computed as f64 / self.duration_secs as f64
    }

    pub fn fit_success_rate(&self) -> f64 {
        let total = self.fits_succeeded + self.fits_failed;
        if total == 0 {
            return 0.0;
        }
        (self.fits_succeeded as f64 / total as f64) * 100.0
    }

    pub fn merge(&mut self, other: &PipelineStats) {
        self.stacks_processed += other.stacks_processed;
        self.stacks_failed += other.stacks_failed;
        self.lag_times_computed += other.lag_times_computed;
        self.fits_succeeded += other.fits_succeeded;
        self.fits_failed += other.fits_failed;
        self.duration_secs = self.duration_secs.max(other.duration_secs);
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    lag_times: Arc<AtomicUsize>,
    fits_succeeded: Arc<AtomicUsize>,
    fits_failed: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_steps: usize) -> Self {
        Self::with_color(total_steps, true)
    }

    pub fn with_color(total_steps: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        Self::build(multi_progress, total_steps, colored)
    }

    /// Tracker that counts but draws nothing.
    pub fn hidden(total_steps: usize) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        Self::build(multi_progress, total_steps, false)
    }

    fn build(multi_progress: MultiProgress, total_steps: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_steps as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            lag_times: Arc::new(AtomicUsize::new(0)),
            fits_succeeded: Arc::new(AtomicUsize::new(0)),
            fits_failed: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn set_length(&self, total_steps: usize) {
        self.main_bar.set_length(total_steps as u64);
    }

    pub fn inc_lag_time(&self) {
        self.lag_times.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_fit_succeeded(&self) {
        self.fits_succeeded.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_fit_failed(&self) {
        self.fits_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.main_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Analysis complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            stacks_processed: 0,
            stacks_failed: 0,
            lag_times_computed: self.lag_times.load(Ordering::SeqCst),
            fits_succeeded: self.fits_succeeded.load(Ordering::SeqCst),
            fits_failed: self.fits_failed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn update_detail_bar(&self) {
        let lag_times = self.lag_times.load(Ordering::SeqCst);
        let fitted = self.fits_succeeded.load(Ordering::SeqCst);
        let failed = self.fits_failed.load(Ordering::SeqCst);

        let message = format!(
            "Lag times: {} | Fits: {} | Failed: {}",
            lag_times,
            fitted,
            if failed > 0 {
                failed.to_string().red().to_string()
            } else {
                failed.to_string()
            }
        );

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let template = if colored {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}"
    } else {
        "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}"
    };
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars(if colored { "█▓▒░" } else { "=>-" }));
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    if let Ok(style) = ProgressStyle::default_bar().template("{msg}") {
        bar.set_style(style);
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_calculations() {
        let mut stats = PipelineStats::new();
        stats.lag_times_computed = 100;
        stats.fits_succeeded = 90;
        stats.fits_failed = 10;
        stats.duration_secs = 10;

        assert_eq!(stats.lag_times_per_second(), 10.0);
        assert!((stats.fit_success_rate() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_pipeline_stats_zero_duration() {
        let stats = PipelineStats::new();
        assert_eq!(stats.lag_times_per_second(), 0.0);
        assert_eq!(stats.fit_success_rate(), 0.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = PipelineStats::new();
        let run = PipelineStats {
            stacks_processed: 1,
            fits_succeeded: 4,
            ..PipelineStats::default()
        };
        total.merge(&run);
        total.merge(&run);
        assert_eq!(total.stacks_processed, 2);
        assert_eq!(total.fits_succeeded, 8);
    }

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::hidden(10);

        tracker.inc_lag_time();
        tracker.inc_lag_time();
        tracker.inc_fit_succeeded();
        tracker.inc_fit_failed();

        let stats = tracker.get_stats();
        assert_eq!(stats.lag_times_computed, 2);
        assert_eq!(stats.fits_succeeded, 1);
        assert_eq!(stats.fits_failed, 1);
    }
}
