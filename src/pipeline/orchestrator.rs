// file: src/pipeline/orchestrator.rs
// description: coordinates loading, DDM computation, fitting and export for image stacks
// reference: orchestrates the asynchronous analysis workflow

use crate::config::Config;
use crate::data_handling::{ExportPaths, export_data, export_report, hash_file, read_file};
use crate::error::{DdmError, Result};
use crate::fitting::{CurveFitOptions, FitModel, compute_ab, compute_isf, fit_model};
use crate::models::{AnalysisReport, DdmMatrix, FitResult};
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::processing::{ddm_with_progress, resolve_lag_times};
use crate::utils::StageTimer;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of analysing one stack.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub report: AnalysisReport,
    pub report_path: PathBuf,
    pub matrix_paths: ExportPaths,
    pub stats: PipelineStats,
}

pub struct AnalysisPipeline {
    config: Config,
    show_progress: bool,
    colored: bool,
}

impl AnalysisPipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            show_progress: true,
            colored: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool, colored: bool) -> Self {
        self.show_progress = show_progress;
        self.colored = colored;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, path: &Path) -> Result<AnalysisOutput> {
        let progress = if self.show_progress && self.colored {
            ProgressTracker::new(0)
        } else if self.show_progress {
            ProgressTracker::with_color(0, false)
        } else {
            ProgressTracker::hidden(0)
        };
        let output_dir = self.config.export.output_dir.clone();
        self.run_with_tracker(path, output_dir, Arc::new(progress)).await
    }

    /// Analyses several stacks, at most `parallel_workers` at a time.
    ///
    /// Exports keep the directory layout of the inputs below their common parent,
    /// so stacks with the same file name in different directories do not collide.
    pub async fn run_many(&self, paths: Vec<PathBuf>) -> (Vec<(PathBuf, Result<AnalysisOutput>)>, PipelineStats) {
        let concurrency = self.config.processing.parallel_workers.max(1);
        info!("Analysing {} stacks with {} concurrent tasks", paths.len(), concurrency);

        let output_dirs = batch_output_dirs(&self.config.export.output_dir, &paths);
        let results: Vec<(PathBuf, Result<AnalysisOutput>)> = stream::iter(paths.into_iter().zip(output_dirs))
            .map(|(path, output_dir)| async move {
                let tracker = Arc::new(ProgressTracker::hidden(0));
                let result = self.run_with_tracker(&path, output_dir, tracker).await;
                (path, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut stats = PipelineStats::new();
        for (path, result) in &results {
            match result {
                Ok(output) => {
                    stats.merge(&output.stats);
                    stats.stacks_processed += 1;
                }
                Err(e) => {
                    stats.stacks_failed += 1;
                    warn!("Failed to analyse {}: {}", path.display(), e);
                }
            }
        }

        log_final_stats(&stats);
        (results, stats)
    }

    async fn run_with_tracker(
        &self,
        path: &Path,
        output_dir: PathBuf,
        progress: Arc<ProgressTracker>,
    ) -> Result<AnalysisOutput> {
        info!("Starting DDM analysis of {}", path.display());

        let config = self.config.clone();
        let path = path.to_path_buf();
        let tracker = progress.clone();

        let output = tokio::task::spawn_blocking(move || analyze_stack(&path, &config, &output_dir, &tracker))
            .await
            .map_err(|e| DdmError::Validation(format!("Analysis task failed: {}", e)))??;

        progress.finish();
        let stats = progress.get_stats();
        let output = AnalysisOutput { stats, ..output };
        log_final_stats(&output.stats);
        Ok(output)
    }

    /// Fits the ISF stored in `report` again with another model.
    pub fn refit(&self, report: &AnalysisReport, model: &str) -> Result<AnalysisReport> {
        let model: FitModel = model.parse()?;
        let isf = compute_isf(&report.matrix, &report.a, report.b)?;
        let progress = ProgressTracker::hidden(isf.len());

        let (fits, failed_q) = fit_all(
            &isf,
            &report.lag_times_ms,
            model,
            fit_options(&self.config),
            self.config.processing.parallel_workers,
            &progress,
        )?;

        for fit in &fits {
            if let Some(previous) = report.fit_for(fit.q) {
                debug!(
                    "q bin {}: {} {:?} -> {} {:?}",
                    fit.q, previous.model, previous.params, fit.model, fit.params
                );
            }
        }
        info!("Refitted {} q bins with {} ({} failed)", fits.len(), model, failed_q.len());

        Ok(AnalysisReport {
            fits,
            failed_q,
            ..report.clone()
        })
    }
}

fn fit_options(config: &Config) -> CurveFitOptions {
    CurveFitOptions {
        max_iterations: config.fitting.max_iterations,
        tolerance: config.fitting.tolerance,
    }
}

/// One export directory per stack: `base` joined with the stack's parent relative to
/// the deepest directory shared by all `paths`.
fn batch_output_dirs(base: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    let parents: Vec<&Path> = paths.iter().map(|p| p.parent().unwrap_or(Path::new(""))).collect();

    let mut common: Vec<Component> = parents
        .first()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    for parent in parents.iter().skip(1) {
        let shared = common
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    let common: PathBuf = common.iter().collect();

    parents
        .iter()
        .map(|parent| match parent.strip_prefix(&common) {
            Ok(relative) if !relative.as_os_str().is_empty() => base.join(relative),
            _ => base.to_path_buf(),
        })
        .collect()
}

fn analyze_stack(
    path: &Path,
    config: &Config,
    output_dir: &Path,
    progress: &ProgressTracker,
) -> Result<AnalysisOutput> {
    let mut timer = StageTimer::new(&format!("DDM analysis of {}", path.display()));
    let model: FitModel = config.fitting.model.parse()?;

    let stack = read_file(
        path,
        config.data.nframes,
        config.data.xscale,
        config.data.tscale,
        config.data.experiment,
    )?;
    let hash = hash_file(path)?;
    timer.checkpoint("stack loaded");

    let requested: Vec<usize> = config.processing.max_lag.map(|m| (1..=m).collect()).unwrap_or_default();
    let taus = resolve_lag_times(&requested, stack.frames)?;
    let (height, width) = (stack.height, stack.width);
    progress.set_length(taus.len());
    progress.set_message(format!("Computing {} lag times", taus.len()));

    let matrix = ddm_with_progress(
        &stack,
        &taus,
        config.processing.backend,
        config.processing.parallel_workers,
        |tau| {
            debug!("Lag time {} done", tau);
            progress.inc_lag_time();
        },
    )?
    .with_source(path, hash);
    timer.checkpoint("DDM matrix computed");

    let (a, b) = compute_ab(&stack, config.fitting.noise_tail_start, config.fitting.noise_tail_end)?;
    debug!("Estimated noise B = {:e} over {} q bins of a {}x{} stack", b, a.len(), height, width);

    let isf = compute_isf(&matrix, &a, b)?;
    let lag_times_ms: Vec<f64> = matrix.taus.iter().map(|&t| t as f64 * stack.tscale).collect();

    progress.set_length(taus.len() + isf.len());
    progress.set_message(format!("Fitting {} q bins with {}", isf.len(), model));
    let (fits, failed_q) = fit_all(
        &isf,
        &lag_times_ms,
        model,
        fit_options(config),
        config.processing.parallel_workers,
        progress,
    )?;
    timer.checkpoint("ISF fitted");

    let (exported, matrix_paths) =
        export_data(output_dir, matrix.clone(), path, config.export.write_csv)?;

    let report = AnalysisReport {
        matrix: DdmMatrix {
            source_file: exported.source_file,
            ..matrix
        },
        a,
        b,
        lag_times_ms,
        xscale: stack.xscale,
        tscale: stack.tscale,
        fits,
        failed_q,
    };
    let report_path = export_report(output_dir, &report, config.export.pretty)?;

    timer.finish(report.matrix.taus.len());

    Ok(AnalysisOutput {
        report,
        report_path,
        matrix_paths,
        stats: PipelineStats::new(),
    })
}

/// Fits every q bin of `isf` in parallel; bins whose fit fails are logged and returned separately.
fn fit_all(
    isf: &[Vec<f64>],
    taus: &[f64],
    model: FitModel,
    options: CurveFitOptions,
    workers: usize,
    progress: &ProgressTracker,
) -> Result<(Vec<FitResult>, Vec<usize>)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| DdmError::Validation(format!("failed to build worker pool: {}", e)))?;

    let outcomes: Vec<(usize, Result<(Vec<f64>, Vec<f64>)>)> = pool.install(|| {
        isf.par_iter()
            .enumerate()
            .map(|(q, curve)| {
                let outcome = fit_model(curve, taus, model, options);
                match outcome {
                    Ok(_) => progress.inc_fit_succeeded(),
                    Err(_) => progress.inc_fit_failed(),
                }
                (q, outcome)
            })
            .collect()
    });

    let mut fits = Vec::new();
    let mut failed_q = Vec::new();
    for (q, outcome) in outcomes {
        match outcome {
            Ok((params, errors)) => fits.push(FitResult {
                model: model.name().to_string(),
                q,
                params,
                errors,
            }),
            Err(e) => {
                debug!("Fit of q bin {} failed: {}", q, e);
                failed_q.push(q);
            }
        }
    }

    if !failed_q.is_empty() {
        warn!("{} of {} q bins could not be fitted with {}", failed_q.len(), isf.len(), model);
    }

    Ok((fits, failed_q))
}

fn log_final_stats(stats: &PipelineStats) {
    info!("=== Analysis Summary ===");
    info!("Duration: {} seconds", stats.duration_secs);
    if stats.stacks_processed + stats.stacks_failed > 0 {
        info!("Stacks processed: {}", stats.stacks_processed);
        if stats.stacks_failed > 0 {
            error!("Stacks failed: {}", stats.stacks_failed);
        }
    }
    info!(
        "Lag times computed: {} ({:.2}/sec)",
        stats.lag_times_computed,
        stats.lag_times_per_second()
    );
    info!(
        "Fits: {} succeeded, {} failed ({:.1}% success)",
        stats.fits_succeeded,
        stats.fits_failed,
        stats.fit_success_rate()
    );
}
