// file: src/utils/logging.rs
// description: Tracing subscriber initialization and colored CLI summaries

use crate::models::FitResult;
use colored::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag when set.
pub fn init_logger(colored_output: bool, verbose: bool) {
    let level = if verbose { "openddm=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .with_ansi(colored_output);

    // a second init (tests, repeated calls) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_step(step: usize, total: usize, msg: &str) -> String {
    format!("{} {}", format!("[{}/{}]", step, total).cyan().bold(), msg)
}

/// One line per fit: `q  name = value ± error, ...`.
pub fn format_fit(fit: &FitResult, param_names: &[&str]) -> String {
    let params = fit
        .params
        .iter()
        .zip(&fit.errors)
        .enumerate()
        .map(|(i, (value, error))| {
            let name = param_names.get(i).copied().unwrap_or("p");
            format!("{} = {:.4e} ± {:.2e}", name, value, error)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}", format!("q={:>3}", fit.q).cyan(), params)
}
