//! Sample data model shared by the sampler, the sinks and the live broker.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Memory figures of one sample, in kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss: i64,
    #[serde(rename = "rssSwap")]
    pub rss_swap: i64,
}

/// CPU usage of one sample, as a percentage of one core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub percentage: f32,
}

/// One timestamped measurement of the target process.
///
/// The serialized form is the payload streamed to live viewers:
/// `{"memoryUsage":{"rss":..,"rssSwap":..},"cpuUsage":{"percentage":..},"timestamp":"<RFC3339>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "memoryUsage")]
    pub memory: MemoryUsage,
    #[serde(rename = "cpuUsage")]
    pub cpu: CpuUsage,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Local>,
}

impl Sample {
    pub fn new(rss_kb: i64, rss_swap_kb: i64, cpu_percent: f32, captured_at: DateTime<Local>) -> Self {
        Self {
            memory: MemoryUsage {
                rss: rss_kb,
                rss_swap: rss_swap_kb,
            },
            cpu: CpuUsage {
                percentage: cpu_percent,
            },
            captured_at,
        }
    }

    pub fn rss_kb(&self) -> i64 {
        self.memory.rss
    }

    pub fn rss_swap_kb(&self) -> i64 {
        self.memory.rss_swap
    }

    pub fn cpu_percent(&self) -> f32 {
        self.cpu.percentage
    }

    /// Serializes the sample into the live-update wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
