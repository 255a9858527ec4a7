//! Configuration plumbing: config paths, environment interpolation and
//! multi-file merging.

mod loader;
mod path;
mod vars;

pub use loader::{Mergeable, load_from_paths};
pub use path::{ConfigArgs, ConfigPath, is_yaml_file};
pub use vars::interpolate;

use serde::{Deserialize, Serialize};

/// Metrics configuration for the Prometheus endpoint.
///
/// The endpoint is only served when an address is configured; a one-shot
/// ingest run usually leaves it unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server, e.g. "0.0.0.0:9090".
    #[serde(default)]
    pub address: Option<String>,
}

impl MetricsConfig {
    /// Merge values from another MetricsConfig (last-write-wins).
    pub fn merge_from(&mut self, other: Self) {
        if other.address.is_some() {
            self.address = other.address;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_merge_keeps_address_when_other_unset() {
        let mut base = MetricsConfig {
            address: Some("127.0.0.1:9000".into()),
        };
        base.merge_from(MetricsConfig::default());
        assert_eq!(base.address.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn test_metrics_merge_last_write_wins() {
        let mut base = MetricsConfig {
            address: Some("127.0.0.1:9000".into()),
        };
        base.merge_from(MetricsConfig {
            address: Some("0.0.0.0:9100".into()),
        });
        assert_eq!(base.address.as_deref(), Some("0.0.0.0:9100"));
    }
}
