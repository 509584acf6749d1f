#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the hotspot analytics tool.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hotspot_analytics::anomaly::detect_anomalies;
use hotspot_analytics::cluster;
use hotspot_analytics::forecast::forecast;
use hotspot_analytics_models::{AnomalyParams, ClusteringAlgorithm, ForecastParams};
use hotspot_ingest::load_crime_data;
use hotspot_records_models::{CanonicalField, RecordFilter};

#[derive(Parser)]
#[command(name = "hotspot", about = "Crime hotspot analytics over monthly CSV exports")]
struct Cli {
    /// Directory containing the monthly CSV exports
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the canonical fields present in the loaded dataset
    Fields,
    /// Cluster incident coordinates and summarize each hotspot
    Cluster {
        #[command(flatten)]
        filter: FilterArgs,
        /// Clustering algorithm to run
        #[arg(long, value_enum, default_value_t = Algorithm::Density)]
        algorithm: Algorithm,
        /// Neighborhood distance in coordinate units (density, spatiotemporal)
        #[arg(long, default_value_t = 0.01)]
        radius: f64,
        /// Minimum number of other points within the radius (density, spatiotemporal)
        #[arg(long, default_value_t = 10)]
        min_neighbors: usize,
        /// Smallest group treated as a cluster (hierarchical, spatiotemporal)
        #[arg(long, default_value_t = 10)]
        min_cluster_size: usize,
        /// Neighbor count used for core distances (hierarchical)
        #[arg(long, default_value_t = 1)]
        min_samples: usize,
        /// Number of partitions to produce (partition)
        #[arg(long, default_value_t = 5)]
        n_clusters: usize,
        /// Use the variable-density algorithm for spatiotemporal clustering
        #[arg(long)]
        variable_density: bool,
    },
    /// Fit a daily incident-count model and project it forward
    Forecast {
        #[command(flatten)]
        filter: FilterArgs,
        /// Restrict the modeled series to one crime type
        #[arg(long)]
        crime_type: Option<String>,
        /// Number of future days to project
        #[arg(long, default_value_t = 30)]
        periods: u32,
    },
    /// Flag the records that look least like the rest of the dataset
    Anomalies {
        #[command(flatten)]
        filter: FilterArgs,
        /// Feature column to score on, e.g. `longitude` (repeatable;
        /// defaults to the two coordinate axes)
        #[arg(long = "feature")]
        features: Vec<CanonicalField>,
        /// Fraction of records to flag, strictly between 0 and 0.5
        #[arg(long, default_value_t = 0.05)]
        contamination: f64,
    },
}

/// Clustering algorithm selector for the `cluster` subcommand.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Density,
    Hierarchical,
    Partition,
    Spatiotemporal,
}

/// Record filters shared by every analytics subcommand.
#[derive(Args)]
struct FilterArgs {
    /// Only include records with this crime type (repeatable)
    #[arg(long = "crime-type")]
    crime_types: Vec<String>,
    /// Earliest date to include, inclusive (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<NaiveDate>,
    /// Latest date to include, inclusive (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<NaiveDate>,
    /// Only include records from this region (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            crime_types: self.crime_types.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            street_names: Vec::new(),
            outcome_categories: Vec::new(),
            regions: self.regions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_flags_parse_into_canonical_fields() {
        let cli = Cli::try_parse_from([
            "hotspot",
            "anomalies",
            "--feature",
            "longitude",
            "--feature",
            "crime_type",
        ])
        .unwrap();
        let Commands::Anomalies { features, .. } = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(
            features,
            vec![CanonicalField::Longitude, CanonicalField::CrimeType]
        );
    }

    #[test]
    fn unknown_feature_is_rejected() {
        assert!(Cli::try_parse_from(["hotspot", "anomalies", "--feature", "altitude"]).is_err());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let (records, fields) = load_crime_data(&cli.data_dir)?;
    log::info!("Loaded {} records from {}", records.len(), cli.data_dir.display());

    match cli.command {
        Commands::Fields => {
            let output = serde_json::json!({
                "fields": fields,
                "recordCount": records.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Cluster {
            filter,
            algorithm,
            radius,
            min_neighbors,
            min_cluster_size,
            min_samples,
            n_clusters,
            variable_density,
        } => {
            let algorithm = match algorithm {
                Algorithm::Density => ClusteringAlgorithm::Density {
                    radius,
                    min_neighbors,
                },
                Algorithm::Hierarchical => ClusteringAlgorithm::Hierarchical {
                    min_cluster_size,
                    min_samples,
                },
                Algorithm::Partition => ClusteringAlgorithm::Partition { n_clusters },
                Algorithm::Spatiotemporal => ClusteringAlgorithm::Spatiotemporal {
                    radius,
                    min_neighbors,
                    variable_density,
                    min_cluster_size,
                },
            };
            let output = cluster(&records.filter(&filter.to_filter()), &algorithm)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Forecast {
            filter,
            crime_type,
            periods,
        } => {
            let params = ForecastParams {
                crime_type,
                periods,
            };
            let output = forecast(&records.filter(&filter.to_filter()), &params)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Anomalies {
            filter,
            features,
            contamination,
        } => {
            let params = AnomalyParams {
                features,
                contamination,
            };
            let output = detect_anomalies(&records.filter(&filter.to_filter()), &params)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
