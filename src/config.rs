//! Kitchen staffing and stage timing configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KitchenError, Result};
use crate::types::WorkerKind;

/// Staffing and hold time of one station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    /// Number of workers of this kind; each handles one stage at a time.
    pub workers: usize,
    /// Hold time of a single stage execution.
    pub duration_ms: u64,
}

impl StationConfig {
    pub const fn new(workers: usize, duration_ms: u64) -> Self {
        Self {
            workers,
            duration_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Stations {
    pub dough: StationConfig,
    pub topping: StationConfig,
    pub oven: StationConfig,
    pub waiter: StationConfig,
}

impl Default for Stations {
    fn default() -> Self {
        Self {
            dough: StationConfig::new(2, 7_000),
            topping: StationConfig::new(3, 4_000),
            oven: StationConfig::new(1, 10_000),
            waiter: StationConfig::new(2, 5_000),
        }
    }
}

/// Complete kitchen configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KitchenConfig {
    pub stations: Stations,
    /// Wait between logged acquisition attempts when no worker is free.
    pub retry_backoff_ms: u64,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            stations: Stations::default(),
            retry_backoff_ms: 1_000,
        }
    }
}

impl KitchenConfig {
    pub fn station(&self, kind: WorkerKind) -> &StationConfig {
        match kind {
            WorkerKind::Dough => &self.stations.dough,
            WorkerKind::Topping => &self.stations.topping,
            WorkerKind::Oven => &self.stations.oven,
            WorkerKind::Waiter => &self.stations.waiter,
        }
    }

    fn station_mut(&mut self, kind: WorkerKind) -> &mut StationConfig {
        match kind {
            WorkerKind::Dough => &mut self.stations.dough,
            WorkerKind::Topping => &mut self.stations.topping,
            WorkerKind::Oven => &mut self.stations.oven,
            WorkerKind::Waiter => &mut self.stations.waiter,
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Load a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| KitchenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: KitchenConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Copy with every stage duration and the backoff multiplied by `factor`.
    ///
    /// Scaled durations are rounded to whole milliseconds and never drop
    /// below one millisecond, so a tiny factor cannot turn a hold into a no-op.
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(KitchenError::InvalidConfig(format!(
                "time scale must be a positive number, got {factor}"
            )));
        }
        let scale = |ms: u64| ((ms as f64 * factor).round() as u64).max(1);
        let mut scaled = *self;
        for kind in WorkerKind::ALL {
            let station = scaled.station_mut(kind);
            station.duration_ms = scale(station.duration_ms);
        }
        scaled.retry_backoff_ms = scale(self.retry_backoff_ms);
        Ok(scaled)
    }

    /// Reject configs that would starve a stage forever.
    pub fn validate(&self) -> Result<()> {
        for kind in WorkerKind::ALL {
            if self.station(kind).workers == 0 {
                return Err(KitchenError::InvalidConfig(format!(
                    "station {kind} has no workers"
                )));
            }
        }
        if self.retry_backoff_ms == 0 {
            return Err(KitchenError::InvalidConfig(
                "retry_backoff_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_stations() {
        let config = KitchenConfig::default();
        assert_eq!(config.station(WorkerKind::Dough).workers, 2);
        assert_eq!(config.station(WorkerKind::Topping).workers, 3);
        assert_eq!(config.station(WorkerKind::Oven).workers, 1);
        assert_eq!(config.station(WorkerKind::Waiter).workers, 2);
        assert_eq!(config.station(WorkerKind::Oven).duration(), Duration::from_secs(10));
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scaling_shrinks_durations_and_backoff() {
        let scaled = KitchenConfig::default().scaled(0.01).expect("valid scale");
        assert_eq!(scaled.station(WorkerKind::Dough).duration_ms, 70);
        assert_eq!(scaled.station(WorkerKind::Oven).duration_ms, 100);
        assert_eq!(scaled.retry_backoff_ms, 10);
        // Worker counts are untouched.
        assert_eq!(scaled.station(WorkerKind::Topping).workers, 3);
    }

    #[test]
    fn scaling_rejects_non_positive_factor() {
        let config = KitchenConfig::default();
        assert!(config.scaled(0.0).is_err());
        assert!(config.scaled(-1.0).is_err());
        assert!(config.scaled(f64::NAN).is_err());
    }

    #[test]
    fn validate_rejects_empty_station() {
        let mut config = KitchenConfig::default();
        config.stations.oven.workers = 0;
        let err = config.validate().expect_err("oven without workers");
        assert!(err.to_string().contains("oven"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: KitchenConfig =
            serde_json::from_str(r#"{"retry_backoff_ms": 250}"#).expect("parse config");
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.stations, Stations::default());
    }
}
