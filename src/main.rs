// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use openddm::utils::logging::{format_error, format_fit, format_info, format_step, format_success, format_warning};
use openddm::{
    AnalysisPipeline, Backend, Config, FitModel, Validator, read_metadata, save_stack, scan_stacks, simulate,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "openddm")]
#[command(version = "0.1.0")]
#[command(about = "Differential dynamic microscopy analysis of image stacks", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "OPENDDM_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the DDM matrix of a stack (or every stack in a directory) and fit it
    Analyze {
        path: PathBuf,

        /// Microns per pixel, overrides the file metadata
        #[arg(long)]
        xscale: Option<f64>,

        /// Milliseconds per frame, overrides the file metadata
        #[arg(long)]
        tscale: Option<f64>,

        /// Frames per loading chunk, -1 for the whole stack
        #[arg(long, allow_hyphen_values = true)]
        nframes: Option<i64>,

        #[arg(long)]
        experiment: Option<usize>,

        /// Largest lag time in frames
        #[arg(long, value_name = "FRAMES")]
        max_lag: Option<usize>,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        backend: Option<Backend>,
    },

    /// Print the metadata read from an image file
    Metadata { path: PathBuf },

    /// Generate a synthetic stack of diffusing particles
    Simulate {
        #[arg(short, long, default_value = "simulated.tif")]
        output: PathBuf,

        #[arg(long)]
        particles: Option<usize>,

        #[arg(long)]
        steps: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fit an exported analysis again with another model
    Fit {
        report: PathBuf,

        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    openddm::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("openddm differential dynamic microscopy");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Analyze {
            path,
            xscale,
            tscale,
            nframes,
            experiment,
            max_lag,
            model,
            output,
            backend,
        } => {
            let overrides = AnalyzeOverrides {
                xscale,
                tscale,
                nframes,
                experiment,
                max_lag,
                model,
                output,
                backend,
            };
            cmd_analyze(config, &path, overrides, cli.color).await?;
        }
        Commands::Metadata { path } => {
            cmd_metadata(&path).await?;
        }
        Commands::Simulate {
            output,
            particles,
            steps,
            seed,
        } => {
            cmd_simulate(config, &output, particles, steps, seed).await?;
        }
        Commands::Fit {
            report,
            model,
            output,
        } => {
            cmd_fit(config, &report, &model, output).await?;
        }
    }

    Ok(())
}

struct AnalyzeOverrides {
    xscale: Option<f64>,
    tscale: Option<f64>,
    nframes: Option<i64>,
    experiment: Option<usize>,
    max_lag: Option<usize>,
    model: Option<String>,
    output: Option<PathBuf>,
    backend: Option<Backend>,
}

impl AnalyzeOverrides {
    fn apply(self, mut config: Config) -> Result<Config> {
        if let Some(xscale) = self.xscale {
            Validator::validate_scale("xscale", xscale)?;
            config.data.xscale = Some(xscale);
        }
        if let Some(tscale) = self.tscale {
            Validator::validate_scale("tscale", tscale)?;
            config.data.tscale = Some(tscale);
        }
        if let Some(nframes) = self.nframes {
            Validator::validate_nframes(nframes)?;
            config.data.nframes = nframes;
        }
        if self.experiment.is_some() {
            config.data.experiment = self.experiment;
        }
        if let Some(max_lag) = self.max_lag {
            Validator::validate_lag_times(max_lag, None)?;
            config.processing.max_lag = Some(max_lag);
        }
        if let Some(model) = self.model {
            model.parse::<FitModel>()?;
            config.fitting.model = model;
        }
        if let Some(output) = self.output {
            config.export.output_dir = output;
        }
        if let Some(backend) = self.backend {
            config.processing.backend = backend;
        }
        config.validate()?;
        Ok(config)
    }
}

async fn cmd_analyze(config: Config, path: &Path, overrides: AnalyzeOverrides, color: bool) -> Result<()> {
    let config = overrides.apply(config).context("Invalid analysis options")?;
    let start_time = Instant::now();

    if path.is_dir() {
        Validator::validate_directory(path)?;
        let stacks = scan_stacks(path).context("Failed to scan directory")?;
        if stacks.is_empty() {
            println!("{}", format_warning(&format!("No TIFF stacks found in {}", path.display())));
            return Ok(());
        }

        let total = stacks.len();
        let pipeline = AnalysisPipeline::new(config).with_progress(false, color);
        let (results, stats) = pipeline.run_many(stacks).await;

        for (i, (stack, result)) in results.iter().enumerate() {
            let line = match result {
                Ok(output) => format_success(&format!(
                    "{}: {} q bins fitted, report at {}",
                    stack.display(),
                    output.report.fits.len(),
                    output.report_path.display()
                )),
                Err(e) => format_error(&format!("{}: {}", stack.display(), e)),
            };
            println!("{} {}", format_step(i + 1, total, ""), line);
        }

        println!(
            "{}",
            format_info(&format!(
                "{} of {} stacks analysed in {:.2}s",
                stats.stacks_processed,
                total,
                start_time.elapsed().as_secs_f64()
            ))
        );
        return Ok(());
    }

    let pipeline = AnalysisPipeline::new(config).with_progress(true, color);
    let output = pipeline
        .run(path)
        .await
        .with_context(|| format!("Analysis of {} failed", path.display()))?;

    let model: FitModel = pipeline.config().fitting.model.parse()?;
    for fit in &output.report.fits {
        println!("{}", format_fit(fit, model.param_names()));
    }
    if !output.report.failed_q.is_empty() {
        println!(
            "{}",
            format_warning(&format!("No fit for q bins {:?}", output.report.failed_q))
        );
    }

    println!(
        "{}",
        format_success(&format!(
            "Analysis complete in {:.2}s: {}",
            start_time.elapsed().as_secs_f64(),
            output.report_path.display()
        ))
    );
    Ok(())
}

async fn cmd_metadata(path: &Path) -> Result<()> {
    Validator::validate_file_path(path)?;
    Validator::validate_image_extension(path)?;

    let file = path.to_path_buf();
    let metadata = tokio::task::spawn_blocking(move || read_metadata(&file))
        .await
        .context("Metadata task failed")?
        .with_context(|| format!("Failed to read metadata of {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn cmd_simulate(
    config: Config,
    output: &Path,
    particles: Option<usize>,
    steps: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut params = config.simulation.clone();
    if let Some(particles) = particles {
        params.n_particles = particles;
    }
    if let Some(steps) = steps {
        params.steps = steps;
    }
    if seed.is_some() {
        params.seed = seed;
    }

    let start_time = Instant::now();
    let target = output.to_path_buf();
    let stack = tokio::task::spawn_blocking(move || -> openddm::Result<_> {
        let (_, stack) = simulate(&params)?;
        save_stack(&target, &stack)?;
        Ok(stack)
    })
    .await
    .context("Simulation task failed")?
    .context("Simulation failed")?;

    println!(
        "{}",
        format_success(&format!(
            "Wrote {} frames of {}x{} to {} in {:.2}s",
            stack.frames,
            stack.width,
            stack.height,
            output.display(),
            start_time.elapsed().as_secs_f64()
        ))
    );
    Ok(())
}

async fn cmd_fit(config: Config, report_path: &Path, model: &str, output: Option<PathBuf>) -> Result<()> {
    Validator::validate_file_path(report_path)?;
    let fit_model: FitModel = model.parse()?;

    let report = openddm::data_handling::load_report(report_path)
        .with_context(|| format!("Failed to load {}", report_path.display()))?;

    let output_dir = output.unwrap_or_else(|| {
        report_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.export.output_dir.clone())
    });
    let pretty = config.export.pretty;
    let pipeline = AnalysisPipeline::new(config);

    let refit = tokio::task::spawn_blocking(move || -> openddm::Result<_> {
        let refit = pipeline.refit(&report, fit_model.name())?;
        let path = openddm::data_handling::export_report(&output_dir, &refit, pretty)?;
        Ok((refit, path))
    })
    .await
    .context("Fit task failed")?
    .context("Refit failed")?;

    let (refit, path) = refit;
    for fit in &refit.fits {
        println!("{}", format_fit(fit, fit_model.param_names()));
    }
    println!(
        "{}",
        format_success(&format!(
            "{} of {} q bins fitted with {}, written to {}",
            refit.fits.len(),
            refit.a.len(),
            fit_model,
            path.display()
        ))
    );
    Ok(())
}
