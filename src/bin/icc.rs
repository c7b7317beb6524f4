#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use icc_harness::{
    AnalysisConfig, IccAnalysis, IccModel, RatingTable, Reliability, REPORTING_NULL_VALUES,
};

#[derive(Parser)]
#[command(name = "icc", version, about = "Intraclass correlation for unbalanced rating tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate an ICC with its interval and p-values, written as JSON
    Estimate {
        /// CSV file: subject id, then one column per rater
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        model: Option<CliModel>,
        /// TOML analysis config; flags override its fields
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        confidence: Option<f64>,
        /// Null values to test, comma separated
        #[arg(long, value_delimiter = ',')]
        null: Option<Vec<f64>>,
        /// Test the reporting grid 0, 0.1, 0.3, 0.5, 0.7, 0.9
        #[arg(long, conflicts_with = "null")]
        null_grid: bool,
        #[arg(long, value_enum)]
        reliability: Option<CliReliability>,
        /// First line holds data, not rater names
        #[arg(long)]
        no_header: bool,
        /// Write the report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List supported models
    Models,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliModel {
    OneWaySubject,
    OneWayRater,
    TwoWayRandom,
    TwoWayRandomInteraction,
    TwoWayMixed,
    TwoWayMixedInteraction,
}

impl From<CliModel> for IccModel {
    fn from(model: CliModel) -> Self {
        match model {
            CliModel::OneWaySubject => IccModel::OneWaySubject,
            CliModel::OneWayRater => IccModel::OneWayRater,
            CliModel::TwoWayRandom => IccModel::TwoWayRandom,
            CliModel::TwoWayRandomInteraction => IccModel::TwoWayRandomInteraction,
            CliModel::TwoWayMixed => IccModel::TwoWayMixed,
            CliModel::TwoWayMixedInteraction => IccModel::TwoWayMixedInteraction,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliReliability {
    Inter,
    Intra,
}

impl From<CliReliability> for Reliability {
    fn from(value: CliReliability) -> Self {
        match value {
            CliReliability::Inter => Reliability::InterRater,
            CliReliability::Intra => Reliability::IntraRater,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Estimate {
            input,
            model,
            config,
            confidence,
            null,
            null_grid,
            reliability,
            no_header,
            out,
        } => {
            let mut analysis_config = match (config, model) {
                (Some(path), _) => AnalysisConfig::load(path)?,
                (None, Some(model)) => AnalysisConfig::new(model.into()),
                (None, None) => return Err("either --model or --config is required".into()),
            };
            if let Some(model) = model {
                analysis_config.model = model.into();
            }
            if let Some(level) = confidence {
                analysis_config.confidence_level = level;
            }
            if let Some(values) = null {
                analysis_config.null_values = values;
            }
            if null_grid {
                analysis_config.null_values = REPORTING_NULL_VALUES.to_vec();
            }
            if let Some(reliability) = reliability {
                analysis_config.reliability = Some(reliability.into());
            }
            analysis_config.validate()?;

            let table = RatingTable::from_csv_path(&input, !no_header)?;
            info!(
                input = %input.display(),
                subjects = table.n_subjects(),
                raters = table.n_raters(),
                model = %analysis_config.model,
                "loaded ratings"
            );

            let analysis = IccAnalysis::new(&table, analysis_config.model)?;
            let report = analysis.report(&analysis_config)?;
            let json = serde_json::to_string_pretty(&report)?;

            match out {
                Some(path) => {
                    let mut file = File::create(&path)?;
                    writeln!(file, "{json}")?;
                    eprintln!("[icc] report written to {}", path.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    writeln!(stdout, "{json}")?;
                }
            }
        }
        Commands::Models => {
            let mut stdout = io::stdout().lock();
            for model in IccModel::ALL {
                writeln!(stdout, "{:<28} {}", model.as_str(), model.describe())?;
            }
        }
    }

    Ok(())
}
