use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One of the seven canonical metrics tracked by the bridge.
///
/// Fields that cannot be mapped to a category are represented as `None`
/// by the classifier and never reach the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorCategory {
    CpuUsage,
    GpuUsage,
    CpuTemp,
    GpuTemp,
    RamUsage,
    NetworkUp,
    NetworkDown,
}

impl SensorCategory {
    /// All categories, in role-tag resolution order.
    pub const ALL: [SensorCategory; 7] = [
        SensorCategory::CpuUsage,
        SensorCategory::GpuUsage,
        SensorCategory::CpuTemp,
        SensorCategory::GpuTemp,
        SensorCategory::RamUsage,
        SensorCategory::NetworkUp,
        SensorCategory::NetworkDown,
    ];

    /// Get the canonical role string (also the metrics payload field name).
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorCategory::CpuUsage => "cpu_usage",
            SensorCategory::GpuUsage => "gpu_usage",
            SensorCategory::CpuTemp => "cpu_temp",
            SensorCategory::GpuTemp => "gpu_temp",
            SensorCategory::RamUsage => "ram_usage",
            SensorCategory::NetworkUp => "network_up",
            SensorCategory::NetworkDown => "network_down",
        }
    }

    /// Match a role tag exactly against the canonical role strings.
    pub fn from_role(role: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == role)
    }

    /// Whether values of this category go through temperature normalization.
    pub fn is_temperature(&self) -> bool {
        matches!(self, SensorCategory::CpuTemp | SensorCategory::GpuTemp)
    }
}

impl std::fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The published per-category sensor record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub cpu_usage: f64,
    pub gpu_usage: f64,
    pub cpu_temp: f64,
    pub gpu_temp: f64,
    pub ram_usage: f64,
    pub network_up: f64,
    pub network_down: f64,

    /// Uptime tick (ms) of the last frame that classified at least one field.
    /// Zero until the first accepted frame.
    pub last_update_ms: u64,
}

impl SensorSnapshot {
    /// Get the stored value for a category.
    pub fn get(&self, category: SensorCategory) -> f64 {
        match category {
            SensorCategory::CpuUsage => self.cpu_usage,
            SensorCategory::GpuUsage => self.gpu_usage,
            SensorCategory::CpuTemp => self.cpu_temp,
            SensorCategory::GpuTemp => self.gpu_temp,
            SensorCategory::RamUsage => self.ram_usage,
            SensorCategory::NetworkUp => self.network_up,
            SensorCategory::NetworkDown => self.network_down,
        }
    }

    /// Overwrite the stored value for a category.
    pub fn set(&mut self, category: SensorCategory, value: f64) {
        let slot = match category {
            SensorCategory::CpuUsage => &mut self.cpu_usage,
            SensorCategory::GpuUsage => &mut self.gpu_usage,
            SensorCategory::CpuTemp => &mut self.cpu_temp,
            SensorCategory::GpuTemp => &mut self.gpu_temp,
            SensorCategory::RamUsage => &mut self.ram_usage,
            SensorCategory::NetworkUp => &mut self.network_up,
            SensorCategory::NetworkDown => &mut self.network_down,
        };
        *slot = value;
    }
}

/// Ingestion counters. Monotonic until an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Frames admitted by the rate limiter.
    pub frames_seen: u64,
    /// Frames that classified at least one field.
    pub frames_accepted: u64,
    /// Frames rejected as oversized, malformed, empty or unclassifiable.
    pub frames_rejected: u64,
    /// Frames discarded by the rate limiter.
    pub frames_dropped: u64,
}

impl Counters {
    /// Number of frames that went through the parser.
    pub fn parse_attempts(&self) -> u64 {
        self.frames_accepted + self.frames_rejected
    }
}

/// Monotonic millisecond tick counter measured from process start.
///
/// Backed by `tokio::time::Instant` so paused-clock tests can advance it.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    start: Instant,
}

impl Uptime {
    /// Start counting from now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since [`Uptime::start`].
    pub fn millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::start()
    }
}
