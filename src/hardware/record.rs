//! Inventory record types
//!
//! The JSON shape of these types is the report users paste into the survey,
//! so field names are part of the output contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel substituted for a section or entry whose provider failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPlaceholder {
    pub error: String,
}

impl ErrorPlaceholder {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            error: message.to_string(),
        }
    }

    /// Build a placeholder carrying the full context chain of an error
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// A section that is either the provider's value or an error placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Probed<T> {
    Value(T),
    Failed(ErrorPlaceholder),
}

/// Complete system inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub system: Probed<SystemSection>,
    pub cpu: Probed<CpuSection>,
    pub memory: Probed<MemorySection>,
    pub displays: Vec<DisplayEntry>,
    pub gpu: Vec<GpuEntry>,
}

/// Operating system description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSection {
    /// OS family (e.g. "Windows", "Linux")
    pub os: String,
    /// Marketing name or version string (e.g. "Microsoft Windows 11 Pro")
    pub os_version: String,
    /// Machine architecture
    pub machine: String,
    /// Processor description
    pub processor: String,
}

/// CPU topology and frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSection {
    pub physical_cores: Option<usize>,
    pub total_cores: usize,
    /// Max frequency in MHz
    pub max_frequency: Option<f64>,
}

/// Virtual memory totals in GB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySection {
    pub total: f64,
    pub available: f64,
}

impl MemorySection {
    pub fn from_bytes(total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            total: bytes_to_gb(total_bytes),
            available: bytes_to_gb(available_bytes),
        }
    }
}

/// Convert bytes to GB, rounded to two decimals
pub fn bytes_to_gb(bytes: u64) -> f64 {
    let gb = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    (gb * 100.0).round() / 100.0
}

/// One row of the `displays` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayEntry {
    Monitor(MonitorEntry),
    Controller(ControllerEntry),
    Error(ErrorPlaceholder),
}

/// Per-monitor geometry, optionally enriched with refresh rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEntry {
    pub name: String,
    pub resolution: String,
    pub position: String,
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// Video controller level display data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerEntry {
    pub name: String,
    pub current_refresh_rate: String,
    pub max_refresh_rate: Option<String>,
    pub current_resolution: Option<String>,
}

/// One row of the `gpu` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpuEntry {
    Adapter(GpuAdapter),
    Error(ErrorPlaceholder),
}

/// A graphics adapter as reported by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuAdapter {
    /// Adapter name, also the reconciliation key
    pub name: String,
    pub driver_version: String,
    pub memory_total: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_free: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    /// Provenance note for entries from a secondary source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Value used for fields a source cannot supply
pub const UNKNOWN: &str = "Unknown";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sixteen_gib_rounds_to_sixteen() {
        let memory = MemorySection::from_bytes(17_179_869_184, 8_589_934_592);
        assert_eq!(memory.total, 16.0);
        assert_eq!(memory.available, 8.0);
    }

    #[test]
    fn memory_rounds_to_two_decimals() {
        // 15.9 GiB plus a few bytes
        assert_eq!(bytes_to_gb(17_072_495_001), 15.9);
        assert_eq!(bytes_to_gb(0), 0.0);
    }

    #[test]
    fn failed_section_serializes_as_error_object() {
        let section: Probed<CpuSection> = Probed::Failed(ErrorPlaceholder::new("no cpu"));
        assert_eq!(
            serde_json::to_value(&section).unwrap(),
            json!({ "error": "no cpu" })
        );
    }

    #[test]
    fn error_placeholder_keeps_context_chain() {
        let err = anyhow::anyhow!("nvidia-smi failed").context("Failed to query GPUs");
        let placeholder = ErrorPlaceholder::from_error(&err);
        assert_eq!(placeholder.error, "Failed to query GPUs: nvidia-smi failed");
    }

    #[test]
    fn monitor_without_refresh_rate_omits_the_key() {
        let entry = DisplayEntry::Monitor(MonitorEntry {
            name: "DP-1".to_string(),
            resolution: "1920x1080".to_string(),
            position: "(0, 0)".to_string(),
            is_primary: true,
            refresh_rate: None,
            device_name: None,
        });
        let value = serde_json::to_value(&entry).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("refresh_rate"));
        assert!(!object.contains_key("device_name"));
        assert_eq!(object["is_primary"], json!(true));
    }

    #[test]
    fn controller_keeps_null_optional_fields() {
        let entry = DisplayEntry::Controller(ControllerEntry {
            name: "Intel(R) UHD Graphics".to_string(),
            current_refresh_rate: "60Hz".to_string(),
            max_refresh_rate: None,
            current_resolution: Some("1920x1080".to_string()),
        });
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "name": "Intel(R) UHD Graphics",
                "current_refresh_rate": "60Hz",
                "max_refresh_rate": null,
                "current_resolution": "1920x1080"
            })
        );
    }
}
