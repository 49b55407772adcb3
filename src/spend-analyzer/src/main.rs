//! Spend Analyzer: channel efficiency, attribution comparison, and budget
//! reallocation for multi-channel ad campaigns.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use spend_core::{AnalysisConfig, JourneyTable, ValueColumn};
use spend_datagen::{GeneratorConfig, JourneyGenerator};
use spend_reporting::{two_sample_test, ChannelAnalyzer};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "spend-analyzer")]
#[command(about = "Channel attribution and budget optimization for ad campaigns")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a journey file and write the full report as JSON
    Analyze {
        /// Journey table (JSON array of touchpoints)
        #[arg(short, long)]
        input: PathBuf,

        /// TOML config file (environment overrides use SPEND_ANALYZER__*)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Total budget to reallocate (overrides config)
        #[arg(long, env = "SPEND_ANALYZER__TOTAL_BUDGET")]
        budget: Option<f64>,

        /// Minimum budget per channel as a fraction of the total (overrides config)
        #[arg(long)]
        min_budget_pct: Option<f64>,

        /// Attribution time-decay constant in days (overrides config)
        #[arg(long)]
        half_life_days: Option<f64>,

        /// Journey column to attribute: conversion_value or cost (overrides config)
        #[arg(long)]
        value_column: Option<ValueColumn>,

        /// Output file for the report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic journey file
    Generate {
        /// Number of impressions
        #[arg(long, default_value_t = 10_000)]
        impressions: usize,

        /// Number of distinct users
        #[arg(long, default_value_t = 5_000)]
        users: u32,

        /// Seed for the random generator
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two samples of a metric (JSON arrays of numbers)
    Significance {
        #[arg(long)]
        control: PathBuf,

        #[arg(long)]
        treatment: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Analyze {
            input,
            config,
            budget,
            min_budget_pct,
            half_life_days,
            value_column,
            output,
        } => {
            let mut cfg =
                AnalysisConfig::load(config.as_deref()).context("loading analysis config")?;

            // Apply CLI overrides
            if let Some(budget) = budget {
                cfg.total_budget = Some(budget);
            }
            if let Some(pct) = min_budget_pct {
                cfg.min_budget_pct = pct;
            }
            if let Some(days) = half_life_days {
                cfg.decay_half_life_days = days;
            }
            if let Some(column) = value_column {
                cfg.value_column = column;
            }

            info!(
                input = %input.display(),
                total_budget = ?cfg.total_budget,
                min_budget_pct = cfg.min_budget_pct,
                value_column = %cfg.value_column,
                "Configuration loaded"
            );

            let journey = read_journey(&input)?;
            let analyzer = ChannelAnalyzer::new(cfg)?;
            let report = analyzer.analyze(&journey)?;

            write_output(output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        }

        Commands::Generate {
            impressions,
            users,
            seed,
            output,
        } => {
            let generator = JourneyGenerator::new(GeneratorConfig {
                impressions,
                users,
                ..Default::default()
            })?;
            let mut rng = StdRng::seed_from_u64(seed);
            let journey = generator.generate(&mut rng);
            write_output(output.as_deref(), &journey.to_json()?)?;
        }

        Commands::Significance { control, treatment } => {
            let control = read_sample(&control)?;
            let treatment = read_sample(&treatment)?;
            let result = two_sample_test(&control, &treatment)?;
            write_output(None, &serde_json::to_string_pretty(&result)?)?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "spend_analyzer=info,spend_reporting=info,spend_datagen=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_journey(path: &Path) -> anyhow::Result<JourneyTable> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading journey file {}", path.display()))?;
    let journey = JourneyTable::from_json(&raw)
        .with_context(|| format!("parsing journey file {}", path.display()))?;
    if journey.is_empty() {
        bail!("journey file {} has no rows", path.display());
    }
    journey.validate()?;
    info!(rows = journey.len(), "Journey loaded");
    Ok(journey)
}

fn read_sample(path: &Path) -> anyhow::Result<Vec<f64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading sample file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing sample file {}", path.display()))
}

fn write_output(path: Option<&Path>, body: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{body}"),
    }
    Ok(())
}
