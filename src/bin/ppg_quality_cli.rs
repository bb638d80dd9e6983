use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use ppg_quality::analysis::FeatureExtractor;
use ppg_quality::config::AppConfig;
use ppg_quality::engine::QualitySession;
use ppg_quality::fixtures::{
    write_samples, AssessedWindow, FixtureCatalog, FixtureProcessor, SyntheticPpg,
};
use ppg_quality::ingest::sample_queue;
use ppg_quality::model::{ModelProvider, ModelSource};
use ppg_quality::records::InMemoryRecordStore;
use ppg_quality::{http, init_logging, telemetry};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "ppg_quality_cli",
    about = "Offline and live harness for the PPG signal-quality core"
)]
struct Cli {
    /// Override directory containing fixture traces (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the feature vector of a trace (or of its last N samples)
    Features {
        #[arg(long)]
        input: String,
        /// Only use the most recent N samples
        #[arg(long)]
        window: Option<usize>,
    },
    /// Replay a trace offline and report every evaluation
    Assess {
        #[command(flatten)]
        pipeline: PipelineArgs,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Stream a trace through a live session, printing each published result
    Stream {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Playback rate in samples per second (0 = as fast as possible)
        #[arg(long, default_value_t = 0.0)]
        rate_hz: f64,
    },
    /// Write a synthetic PPG trace
    Synth {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 300)]
        samples: usize,
        #[arg(long, default_value_t = 72.0)]
        heart_rate: f64,
        #[arg(long, default_value_t = 30.0)]
        sample_rate: f64,
        #[arg(long, default_value_t = 0.05)]
        noise: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// List fixture traces on disk
    DumpFixtures,
}

#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Fixture name or path to a trace file
    #[arg(long)]
    input: String,
    /// Model artifact (defaults to the configured path)
    #[arg(long)]
    model: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl PipelineArgs {
    fn load_config(&self) -> AppConfig {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from_file(path),
            None => AppConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model.path = model.clone();
        }
        config
    }
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_else(|| FixtureCatalog::new("fixtures"));

    match cli.command {
        Commands::Features { input, window } => run_features(&catalog, &input, window),
        Commands::Assess {
            pipeline,
            expect,
            output,
        } => run_assess(&catalog, &pipeline, expect, output),
        Commands::Stream { pipeline, rate_hz } => run_stream(&catalog, &pipeline, rate_hz),
        Commands::Synth {
            output,
            samples,
            heart_rate,
            sample_rate,
            noise,
            seed,
        } => run_synth(&output, samples, heart_rate, sample_rate, noise, seed),
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn run_features(catalog: &FixtureCatalog, input: &str, window: Option<usize>) -> Result<ExitCode> {
    let data = catalog.load(input, None)?;
    let samples = match window {
        Some(len) => &data.samples[data.samples.len().saturating_sub(len)..],
        None => &data.samples[..],
    };

    let report = FeatureExtractor::new().extract_report(samples);
    let payload = serde_json::json!({
        "fixture": data.metadata.name,
        "window_len": samples.len(),
        "features": report
            .features
            .named()
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect::<serde_json::Map<_, _>>(),
        "spectral_peak_bin": report.spectral_peak_bin,
        "retained_bins": report.retained_bins,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_assess(
    catalog: &FixtureCatalog,
    pipeline: &PipelineArgs,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = pipeline.load_config();
    let data = catalog.load(&pipeline.input, override_expect)?;

    let provider = ModelProvider::new(ModelSource::File(config.model.path.clone()));
    build_runtime()?
        .block_on(provider.load())
        .map_err(|err| anyhow!("{err}"))
        .with_context(|| format!("loading model {}", config.model.path.display()))?;
    let model = provider.model().map_err(|err| anyhow!("{err}"))?;

    let processor = FixtureProcessor::new(config);
    let windows = processor
        .run(&data.samples, model.as_ref())
        .with_context(|| format!("processing fixture {}", data.metadata.name))?;

    emit_report(&data.metadata.name, data.samples.len(), &windows, output_path)?;

    match data.expectations {
        Some(expectations) => match expectations.verify(&windows) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(failures) => {
                eprintln!("{}", serde_json::to_string_pretty(&failures)?);
                Ok(ExitCode::from(2))
            }
        },
        None => Ok(ExitCode::from(0)),
    }
}

fn run_stream(catalog: &FixtureCatalog, pipeline: &PipelineArgs, rate_hz: f64) -> Result<ExitCode> {
    let config = pipeline.load_config();
    let data = catalog.load(&pipeline.input, None)?;
    let runtime = build_runtime()?;

    runtime.block_on(async move {
        let session = QualitySession::from_config(config.clone());
        if let Err(err) = session.load_model().await {
            eprintln!("Model unavailable, no results will be published: {err}");
        }
        http::spawn_if_enabled(session.clone(), Arc::new(InMemoryRecordStore::new()));

        let mut results = session.result_stream();
        let printer = tokio::spawn(async move {
            while let Some(result) = results.next().await {
                match serde_json::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(err) => eprintln!("Failed to encode result: {err}"),
                }
            }
        });

        let (mut producer, consumer) = sample_queue(config.ingest.queue_capacity);
        let ingest = session.spawn_ingest(consumer);
        let samples = data.samples;
        let pace = (rate_hz > 0.0).then(|| Duration::from_secs_f64(1.0 / rate_hz));
        let capture = tokio::task::spawn_blocking(move || {
            for sample in samples {
                while producer.push(sample).is_err() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                if let Some(pace) = pace {
                    std::thread::sleep(pace);
                }
            }
        });

        capture.await.context("capture task")?;
        ingest.await.context("ingest task")?;
        session.wait_idle().await;
        // Let the printer flush what the last cycle published
        tokio::time::sleep(Duration::from_millis(50)).await;
        printer.abort();

        let summary = StreamSummary {
            evaluations: session.evaluations(),
            latest: session.latest(),
            telemetry_events: telemetry::hub().snapshot().total_events,
        };
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        Ok::<_, anyhow::Error>(ExitCode::from(0))
    })
}

fn run_synth(
    output: &Path,
    samples: usize,
    heart_rate: f64,
    sample_rate: f64,
    noise: f64,
    seed: u64,
) -> Result<ExitCode> {
    let synth = SyntheticPpg {
        sample_rate_hz: sample_rate,
        heart_rate_bpm: heart_rate,
        noise,
        seed,
        ..SyntheticPpg::default()
    };
    write_samples(output, &synth.generate(samples))?;
    println!("Wrote {} samples to {}", samples, output.display());
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(
    fixture: &str,
    sample_count: usize,
    windows: &[AssessedWindow],
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = AssessReport {
        fixture,
        sample_count,
        evaluation_count: windows.len(),
        final_result: windows.last().map(|window| window.result),
        windows,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

#[derive(Serialize)]
struct AssessReport<'a> {
    fixture: &'a str,
    sample_count: usize,
    evaluation_count: usize,
    final_result: Option<ppg_quality::QualityResult>,
    #[serde(skip_serializing_if = "slice_empty")]
    windows: &'a [AssessedWindow],
}

fn slice_empty(windows: &&[AssessedWindow]) -> bool {
    windows.is_empty()
}

#[derive(Serialize)]
struct StreamSummary {
    evaluations: u64,
    latest: ppg_quality::QualitySnapshot,
    telemetry_events: u64,
}
