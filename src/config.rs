//! Configuration types for the statistics engine
//!
//! This module provides configuration structures for the window, the statistic
//! calculations, and snapshot persistence. Configuration is consumed once at
//! component construction and is not re-validated at runtime.

use crate::error::{Result, StatisticsError};
use serde::{Deserialize, Serialize};

/// Main statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Window configuration
    pub window: WindowConfig,

    /// How averages and variances are weighted and corrected
    #[serde(default)]
    pub calculation: StatisticsCalculationConfig,

    /// Derived statistics to publish on every send cycle
    #[serde(default = "default_statistics")]
    pub statistics: Vec<StatisticType>,

    /// Snapshot persistence configuration
    #[serde(default)]
    pub restore: RestoreConfig,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            calculation: StatisticsCalculationConfig::default(),
            statistics: default_statistics(),
            restore: RestoreConfig::default(),
        }
    }
}

impl StatisticsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.restore.validate()?;

        if self.statistics.is_empty() {
            return Err(StatisticsError::Configuration {
                source: "at least one statistic must be enabled".into(),
            });
        }

        Ok(())
    }
}

/// Type of window the queue maintains
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// True sliding window of the most recent chunks (DABA Lite queue)
    Sliding,
    /// Unbounded running total in a single aggregate; O(1) but accumulates
    /// floating-point error over very long runs
    Continuous,
    /// Unbounded running total over O(log n) aggregates merged by equal mass;
    /// better long-term numerical stability at O(log n) cost
    ContinuousLongTerm,
}

/// Window configuration
///
/// `None` for any of the optional fields means "never": an unset `chunk_size`
/// never closes a chunk by count, an unset `window_size` never evicts, and an
/// unset `send_every` never publishes on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Type of window
    pub window_type: WindowType,

    /// Number of chunks retained in the window
    pub window_size: Option<usize>,

    /// Measurements aggregated into a chunk before queue insertion
    pub chunk_size: Option<usize>,

    /// Timespan of measurements aggregated into a chunk before queue
    /// insertion (milliseconds); drives the external chunk timer
    pub chunk_duration_ms: Option<u32>,

    /// Publish statistics after this many chunk insertions
    pub send_every: Option<usize>,

    /// Offset for the first publish, counted in chunks already inserted;
    /// 0 waits a full `send_every` cycle before the first publish
    #[serde(default)]
    pub send_first_at: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_type: WindowType::Sliding,
            window_size: Some(default_window_size()),
            chunk_size: Some(default_chunk_size()),
            chunk_duration_ms: None,
            send_every: Some(default_send_every()),
            send_first_at: 0,
        }
    }
}

impl WindowConfig {
    /// Create a sliding window configuration
    pub fn sliding(window_size: usize, chunk_size: usize) -> Self {
        Self {
            window_type: WindowType::Sliding,
            window_size: Some(window_size),
            chunk_size: Some(chunk_size),
            ..Default::default()
        }
    }

    /// Create a continuous (unbounded running total) window configuration
    pub fn continuous(chunk_size: usize) -> Self {
        Self {
            window_type: WindowType::Continuous,
            window_size: None,
            chunk_size: Some(chunk_size),
            ..Default::default()
        }
    }

    /// Create a continuous long-term window configuration
    pub fn continuous_long_term(chunk_size: usize) -> Self {
        Self {
            window_type: WindowType::ContinuousLongTerm,
            window_size: None,
            chunk_size: Some(chunk_size),
            ..Default::default()
        }
    }

    /// Set the publish cadence in chunks
    pub fn with_send_every(mut self, send_every: usize) -> Self {
        self.send_every = Some(send_every);
        self
    }

    /// Set the offset of the first publish
    pub fn with_send_first_at(mut self, send_first_at: usize) -> Self {
        self.send_first_at = send_first_at;
        self
    }

    /// Close chunks by duration instead of (or in addition to) count
    pub fn with_chunk_duration_ms(mut self, duration_ms: u32) -> Self {
        self.chunk_duration_ms = Some(duration_ms);
        self
    }

    /// Validate window configuration
    pub fn validate(&self) -> Result<()> {
        if self.window_type == WindowType::Sliding && self.window_size.is_none() {
            return Err(StatisticsError::Configuration {
                source: "sliding window requires window_size".into(),
            });
        }

        if let Some(size) = self.window_size {
            if size == 0 {
                return Err(StatisticsError::Configuration {
                    source: "window_size must be greater than 0".into(),
                });
            }
        }

        if self.chunk_size.is_none() && self.chunk_duration_ms.is_none() {
            return Err(StatisticsError::Configuration {
                source: "either chunk_size or chunk_duration_ms is required".into(),
            });
        }

        if let Some(size) = self.chunk_size {
            if size == 0 {
                return Err(StatisticsError::Configuration {
                    source: "chunk_size must be greater than 0".into(),
                });
            }
        }

        if let Some(duration) = self.chunk_duration_ms {
            if duration == 0 {
                return Err(StatisticsError::Configuration {
                    source: "chunk_duration_ms must be greater than 0".into(),
                });
            }
        }

        if let Some(send_every) = self.send_every {
            if send_every == 0 {
                return Err(StatisticsError::Configuration {
                    source: "send_every must be greater than 0".into(),
                });
            }
            if self.send_first_at > send_every {
                return Err(StatisticsError::Configuration {
                    source: "send_first_at cannot be greater than send_every".into(),
                });
            }
        }

        Ok(())
    }
}

/// Weighting scheme for averages and variances
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightType {
    /// Every measurement has equal weight
    #[default]
    Simple,
    /// Each measurement is weighted by the elapsed time until the next one
    Duration,
}

/// Whether the measurements are a sample or the whole population
///
/// Sample grouping applies Bessel's correction (or reliability weights when
/// time-weighted) to variance and covariance denominators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    #[default]
    Sample,
    Population,
}

/// How statistics are weighted and corrected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatisticsCalculationConfig {
    /// Weighting scheme for averages
    #[serde(default)]
    pub weight_type: WeightType,

    /// Sample vs. population grouping
    #[serde(default)]
    pub group_type: GroupType,
}

/// Derived statistics the component can publish
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatisticType {
    /// Number of valid measurements in the window
    Count,
    /// Milliseconds between the first and last measurement in the window
    Duration,
    /// Minimum measurement
    Min,
    /// Maximum measurement
    Max,
    /// Average measurement
    Mean,
    /// Mean times duration; a numerical integral of the signal over time
    Quadrature,
    /// Seconds since the most recent maximum
    SinceArgmax,
    /// Seconds since the most recent minimum
    SinceArgmin,
    /// Standard deviation of the measurements
    StdDev,
    /// Slope of the line of best fit for measurements versus time
    Trend,
}

impl StatisticType {
    /// Stable lowercase name used when publishing to sinks
    pub fn name(&self) -> &'static str {
        match self {
            StatisticType::Count => "count",
            StatisticType::Duration => "duration",
            StatisticType::Min => "min",
            StatisticType::Max => "max",
            StatisticType::Mean => "mean",
            StatisticType::Quadrature => "quadrature",
            StatisticType::SinceArgmax => "since_argmax",
            StatisticType::SinceArgmin => "since_argmin",
            StatisticType::StdDev => "std_dev",
            StatisticType::Trend => "trend",
        }
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestoreConfig {
    /// Save the combined aggregate on every publish and load it at startup
    #[serde(default)]
    pub enabled: bool,

    /// Identity of this statistic configuration; hashed into the storage key
    #[serde(default)]
    pub config_id: String,
}

impl RestoreConfig {
    /// Validate restore configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.config_id.is_empty() {
            return Err(StatisticsError::Configuration {
                source: "restore requires a non-empty config_id".into(),
            });
        }
        Ok(())
    }
}

// Default value functions

fn default_window_size() -> usize {
    60
}

fn default_chunk_size() -> usize {
    1
}

fn default_send_every() -> usize {
    1
}

fn default_statistics() -> Vec<StatisticType> {
    vec![
        StatisticType::Count,
        StatisticType::Min,
        StatisticType::Max,
        StatisticType::Mean,
        StatisticType::StdDev,
    ]
}
