use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csv::WriterBuilder;
use ekg_lib::{
    assist::build_prompt,
    config::{read_config, AnalysisConfig},
    io::apple_watch::{parse_apple_watch_csv_with, read_apple_watch_csv, ParserOptions},
    metrics::{analyze, summarize, AnalysisSummary},
    plot::{figure_from_signal, Figure, PlotBackend, Series},
    signal::{EkgExport, Metadata},
};
use env_logger::Env;
use log::{debug, info};
use plotters::prelude::*;
use serde::Serialize;
use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ekg",
    version,
    about = "Inspect and summarize Apple Watch EKG exports"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// TOML file with analysis settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header metadata, sampling rate and sample count as JSON
    Inspect {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Compute min/max/mean and flag abrupt jumps, printed as JSON
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write per-sample CSV (index, time, value, flagged)
    Export {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render the signal with flagged samples to a PNG via plotters
    Plot {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4096)]
        max_points: usize,
    },
    /// Print the prompt that would be sent to a text model
    Prompt {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Template file overriding the configured prompt
        #[arg(long)]
        template: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => AnalysisConfig::default(),
    };
    debug!("analysis config: {:?}", config);

    match cli.command {
        Commands::Inspect { input } => cmd_inspect(input.as_deref(), &config)?,
        Commands::Analyze { input } => cmd_analyze(input.as_deref(), &config)?,
        Commands::Export { input, out } => cmd_export(input.as_deref(), &out, &config)?,
        Commands::Plot {
            input,
            out,
            max_points,
        } => cmd_plot(input.as_deref(), &out, max_points, &config)?,
        Commands::Prompt { input, template } => {
            cmd_prompt(input.as_deref(), template.as_deref(), &config)?
        }
    }
    Ok(())
}

fn read_export(input: Option<&Path>, config: &AnalysisConfig) -> Result<EkgExport> {
    let options = ParserOptions {
        rate_label: config.rate_label.clone(),
    };
    let export = match input {
        Some(path) => read_apple_watch_csv(path, &options)?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading export from stdin")?;
            parse_apple_watch_csv_with(&buf, &options)
        }
    };
    info!(
        "parsed {} samples, {} metadata entries, rate {:?}",
        export.len(),
        export.metadata.len(),
        export.sampling_rate
    );
    Ok(export)
}

fn analyze_export(export: &EkgExport, config: &AnalysisConfig) -> Result<AnalysisSummary> {
    let samples = export.require_signal()?;
    let result = analyze(samples, export.sampling_rate, config)?;
    info!(
        "flagged {} of {} samples (threshold {:.2})",
        result.arrhythmias.count,
        samples.len(),
        result.arrhythmias.threshold
    );
    Ok(result)
}

#[derive(Serialize)]
struct InspectReport<'a> {
    metadata: &'a Metadata,
    sampling_rate: Option<f64>,
    sample_count: usize,
    duration_s: Option<f64>,
}

fn cmd_inspect(input: Option<&Path>, config: &AnalysisConfig) -> Result<()> {
    let export = read_export(input, config)?;
    let report = InspectReport {
        metadata: &export.metadata,
        sampling_rate: export.sampling_rate,
        sample_count: export.len(),
        duration_s: export.duration(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_analyze(input: Option<&Path>, config: &AnalysisConfig) -> Result<()> {
    let export = read_export(input, config)?;
    let result = analyze_export(&export, config)?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_export(input: Option<&Path>, out: &Path, config: &AnalysisConfig) -> Result<()> {
    let export = read_export(input, config)?;
    let result = analyze_export(&export, config)?;
    let flagged: BTreeSet<usize> = result.arrhythmias.indices.iter().copied().collect();
    let file = fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(["index", "time_s", "value", "flagged"])?;
    for (i, value) in export.signal.iter().enumerate() {
        let time = export
            .sampling_rate
            .map(|fs| (i as f64 / fs).to_string())
            .unwrap_or_default();
        writer.write_record(&[
            i.to_string(),
            time,
            value.to_string(),
            flagged.contains(&i).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_plot(
    input: Option<&Path>,
    out: &Path,
    max_points: usize,
    config: &AnalysisConfig,
) -> Result<()> {
    let export = read_export(input, config)?;
    let result = analyze_export(&export, config)?;
    let fig = figure_from_signal(
        &export.signal,
        export.sampling_rate,
        Some(&result.arrhythmias),
        max_points,
    );
    PngBackend::new(out).draw(&fig)
}

fn cmd_prompt(
    input: Option<&Path>,
    template: Option<&Path>,
    config: &AnalysisConfig,
) -> Result<()> {
    let export = read_export(input, config)?;
    let samples = export.require_signal()?;
    let summary = summarize(samples)?;
    let mut prompt_config = config.prompt.clone();
    if let Some(path) = template {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?;
        prompt_config.template = Some(text);
    }
    println!(
        "{}",
        build_prompt(samples, &summary, export.sampling_rate, &prompt_config)
    );
    Ok(())
}

struct PngBackend {
    path: PathBuf,
    size: (u32, u32),
}

impl PngBackend {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            size: (1200, 480),
        }
    }
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
        let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };
        let y_max = if y_max > y_min { y_max } else { y_min + 1.0 };
        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        let mut mesh = chart.configure_mesh();
        if let Some(label) = fig.x.label.as_deref() {
            mesh.x_desc(label);
        }
        if let Some(label) = fig.y.label.as_deref() {
            mesh.y_desc(label);
        }
        mesh.draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                    ))?;
                }
                Series::Markers(markers) => {
                    let (r, g, b) = markers.color.rgb();
                    chart.draw_series(markers.points.iter().map(|p| {
                        Circle::new((p[0], p[1]), markers.radius, RGBColor(r, g, b).filled())
                    }))?;
                }
            }
        }
        root.present()?;
        info!("wrote plot to {}", self.path.display());
        Ok(())
    }
}
