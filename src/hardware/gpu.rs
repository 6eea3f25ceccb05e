//! GPU enumeration sources
//!
//! - Primary (cross-platform): `nvidia-smi` telemetry, one row per NVIDIA GPU
//!   with memory usage and temperature.
//! - Secondary inventory:
//!   - Windows: CIM `Win32_VideoController`, which also sees integrated and
//!     non-NVIDIA adapters
//!   - Linux: `lspci` VGA / 3D / display controllers, opt-in only since its
//!     names never match the nvidia-smi ones

use anyhow::{Context, Result};
use std::time::Duration;

use super::providers::{GpuInventory, GpuTelemetry};
use super::record::{GpuAdapter, UNKNOWN};
use crate::command::{self, CommandError};

const NVIDIA_SMI_QUERY: &str =
    "--query-gpu=name,driver_version,memory.total,memory.used,memory.free,temperature.gpu";

/// An adapter as seen by an OS inventory source, before reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryAdapter {
    pub name: String,
    pub driver_version: Option<String>,
    pub adapter_ram_bytes: Option<u64>,
}

impl InventoryAdapter {
    /// Convert to a report entry tagged with where it came from.
    ///
    /// Driver and memory fall back to "Unknown"; usage and temperature are
    /// not reported by inventory sources and stay absent.
    pub fn into_gpu_adapter(self, note: &str) -> GpuAdapter {
        GpuAdapter {
            name: self.name,
            driver_version: self.driver_version.unwrap_or_else(|| UNKNOWN.to_string()),
            memory_total: self
                .adapter_ram_bytes
                .map(|bytes| format!("{}MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            memory_used: None,
            memory_free: None,
            temperature: None,
            note: Some(note.to_string()),
        }
    }
}

/// NVIDIA telemetry through `nvidia-smi`
pub struct NvidiaSmi {
    pub path: String,
    pub timeout: Duration,
}

impl GpuTelemetry for NvidiaSmi {
    fn gpus(&self) -> Result<Vec<GpuAdapter>> {
        let stdout = match command::capture_stdout(
            &self.path,
            &[NVIDIA_SMI_QUERY, "--format=csv,noheader,nounits"],
            self.timeout,
        ) {
            Ok(stdout) => stdout,
            Err(CommandError::NotFound(_)) => {
                tracing::debug!("{} not found, no NVIDIA GPUs reported", self.path);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err).context("Failed to query nvidia-smi"),
        };

        parse_nvidia_smi_csv(&stdout)
    }
}

/// Parse `nvidia-smi --format=csv,noheader,nounits` rows
pub fn parse_nvidia_smi_csv(stdout: &str) -> Result<Vec<GpuAdapter>> {
    let mut gpus = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 6 {
            anyhow::bail!("Invalid nvidia-smi output: {line}");
        }

        gpus.push(GpuAdapter {
            name: parts[0].to_string(),
            driver_version: reported_or_unknown(parts[1]).to_string(),
            memory_total: with_unit(parts[2], "MB"),
            memory_used: Some(with_unit(parts[3], "MB")),
            memory_free: Some(with_unit(parts[4], "MB")),
            temperature: Some(with_unit(parts[5], "°C")),
            note: None,
        });
    }

    Ok(gpus)
}

/// `nvidia-smi` prints "[N/A]" or "[Not Supported]" for unavailable values
fn reported_or_unknown(value: &str) -> &str {
    if value.is_empty() || value.starts_with('[') {
        UNKNOWN
    } else {
        value
    }
}

fn with_unit(value: &str, unit: &str) -> String {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => format!("{}{}", number, unit),
        _ => UNKNOWN.to_string(),
    }
}

/// Windows video controllers through CIM
#[cfg(target_os = "windows")]
pub struct CimVideoControllers {
    pub timeout: Duration,
}

#[cfg(target_os = "windows")]
impl GpuInventory for CimVideoControllers {
    fn provenance(&self) -> &str {
        "Detected via WMI"
    }

    fn adapters(&self) -> Result<Vec<InventoryAdapter>> {
        let rows = super::cim::query(
            "Win32_VideoController",
            &["Name", "DriverVersion", "AdapterRAM"],
            self.timeout,
        )?;
        Ok(parse_cim_adapters(&rows))
    }
}

#[cfg(any(test, target_os = "windows"))]
fn parse_cim_adapters(rows: &[serde_json::Value]) -> Vec<InventoryAdapter> {
    use super::cim::{string_field, u64_field};

    rows.iter()
        .filter_map(|row| {
            Some(InventoryAdapter {
                name: string_field(row, "Name")?,
                driver_version: string_field(row, "DriverVersion"),
                adapter_ram_bytes: u64_field(row, "AdapterRAM"),
            })
        })
        .collect()
}

/// Linux PCI display controllers through `lspci`
#[cfg(target_os = "linux")]
pub struct Lspci {
    pub timeout: Duration,
}

#[cfg(target_os = "linux")]
impl GpuInventory for Lspci {
    fn provenance(&self) -> &str {
        "Detected via lspci"
    }

    fn adapters(&self) -> Result<Vec<InventoryAdapter>> {
        let stdout = command::capture_stdout("lspci", &[], self.timeout)
            .context("Failed to list PCI devices")?;
        Ok(parse_lspci_output(&stdout))
    }
}

/// Pick display controllers out of plain `lspci` output
#[cfg(any(test, target_os = "linux"))]
pub(super) fn parse_lspci_output(stdout: &str) -> Vec<InventoryAdapter> {
    stdout
        .lines()
        .filter(|line| {
            line.contains("VGA compatible controller")
                || line.contains("3D controller")
                || line.contains("Display controller")
        })
        .filter_map(parse_lspci_line)
        .map(|name| InventoryAdapter {
            name,
            driver_version: None,
            adapter_ram_bytes: None,
        })
        .collect()
}

/// Extract the device name from a single lspci line
///
/// Format: "01:00.0 VGA compatible controller: NVIDIA Corporation GA104 [GeForce RTX 3070] (rev a1)"
#[cfg(any(test, target_os = "linux"))]
fn parse_lspci_line(line: &str) -> Option<String> {
    let idx = line.find(": ")?;
    let after_colon = &line[idx + 2..];
    let name = match after_colon.rfind(" (rev") {
        Some(rev_idx) => &after_colon[..rev_idx],
        None => after_colon,
    };

    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
