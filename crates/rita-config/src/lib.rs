//! Configuration loading and validation.
//!
//! A [`Config`] is deserialized once from a TOML file, validated, and then treated as immutable
//! read-only state for the remainder of the run.

#![deny(unused_import_braces, unused_qualifications)]

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use ipnetwork::IpNetwork;
use rita_types::{BeaconConfig, Error, IndicatorThresholds, Modifiers, Result};
use serde::Deserialize;

mod cli;

pub use cli::CliArgs;

/// `[network]`: how the aggregation source should classify addresses and domains, and the
/// agent identity used to mint [`rita_types::NetworkId`]s for private hosts.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    /// Number of distinct internal hosts; denominator for `prevalence`.
    pub network_size: u32,
    pub agent_id: Option<uuid::Uuid>,
    pub filter_external_to_internal: bool,
    #[serde(default)]
    pub internal_subnets: Vec<IpNetwork>,
    #[serde(default)]
    pub never_included_subnets: Vec<IpNetwork>,
    #[serde(default)]
    pub always_included_subnets: Vec<IpNetwork>,
    #[serde(default)]
    pub internal_domains: Vec<String>,
    #[serde(default)]
    pub never_included_domains: Vec<String>,
    #[serde(default)]
    pub always_included_domains: Vec<String>,
}

impl NetworkConfig {
    pub fn is_internal(&self, ip: &IpAddr) -> bool {
        self.internal_subnets.iter().any(|net| net.contains(*ip))
    }
}

/// `[aggregation]`: parameters passed to the aggregation source's three views.
#[derive(Clone, Debug, Deserialize)]
pub struct AggregationParams {
    pub unique_connection_threshold: u64,
    pub long_connection_base_threshold: f64,
    pub subdomain_threshold: u64,
    pub use_historical: bool,
}

/// Top-level configuration, assembled from `[beacon]`, `[thresholds.*]`, `[modifiers]`,
/// `[network]`, and `[aggregation]` TOML tables.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub beacon: BeaconConfig,
    pub thresholds: IndicatorThresholds,
    pub modifiers: Modifiers,
    pub network: NetworkConfig,
    pub aggregation: AggregationParams,
    #[serde(default)]
    pub threat_intel_feeds: Vec<String>,
    pub http_extensions_csv_path: PathBuf,
    /// Upper bound on in-flight analyzer tasks and the dispatcher channel's capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_worker_count")]
    pub analyzer_workers: usize,
}

fn default_channel_capacity() -> usize {
    256
}

fn default_worker_count() -> usize {
    8
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfig(format!("cannot parse config file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.beacon.validate()?;
        self.thresholds.validate()?;
        if self.network.network_size == 0 {
            return Err(Error::InvalidConfig(
                "network.network_size must be >= 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel_capacity must be >= 1".to_string(),
            ));
        }
        if self.analyzer_workers == 0 {
            return Err(Error::InvalidConfig(
                "analyzer_workers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
database_url = "postgres:///rita"
http_extensions_csv_path = "extensions.csv"

[beacon]
unique_conn_threshold = 5
hist_mode_sensitivity = 0.3
hist_bimodal_outlier_removal = 0
hist_bimodal_min_hours = 11
dur_min_hours = 6
dur_ideal_consistent_hours = 12

[beacon.weights]
ts = 0.25
ds = 0.25
dur = 0.25
hist = 0.25

[beacon.score_thresholds]
base = 0.0
low = 0.3
med = 0.6
high = 0.9

[thresholds.long_connection]
base = 0.0
low = 3600.0
med = 14400.0
high = 86400.0

[thresholds.c2_over_dns]
base = 0.0
low = 5.0
med = 20.0
high = 50.0

[thresholds.strobe]
base = 86400.0
low = 100000.0
med = 500000.0
high = 1000000.0

[thresholds.threat_intel_data_size]
base = 0.0
low = 1000.0
med = 10000.0
high = 100000.0

[modifiers]
rare_signature_score_increase = 0.1
mime_type_mismatch_score_increase = 0.1
c2_over_dns_direct_conn_score_increase = 0.15
prevalence_score_decrease = 0.2
first_seen_score_increase = 0.1
missing_host_count_score_increase = 0.1
threat_intel_score = 0.8

[network]
network_size = 500
filter_external_to_internal = true

[aggregation]
unique_connection_threshold = 5
long_connection_base_threshold = 3600.0
subdomain_threshold = 5
use_historical = true
"#;

    #[test]
    fn parses_and_validates_a_complete_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.network.network_size, 500);
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.analyzer_workers, 8);
    }

    #[test]
    fn rejects_zero_network_size() {
        let bad = SAMPLE.replace("network_size = 500", "network_size = 0");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }
}
