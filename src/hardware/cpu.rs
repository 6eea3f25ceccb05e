//! CPU detection module
//!
//! Detects CPU topology and frequency using:
//! - Cross-platform: sysinfo crate
//! - Linux: cpufreq sysfs
//! - Windows: CIM Win32_Processor

use anyhow::Result;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;
use sysinfo::System;

use super::record::CpuSection;

impl CpuSection {
    /// Detect CPU information (platform-specific)
    pub fn detect(timeout: Duration) -> Result<Self> {
        let mut sys = System::new();
        sys.refresh_cpu_all();

        let cpus = sys.cpus();
        if cpus.is_empty() {
            anyhow::bail!("No CPU detected");
        }

        let total_cores = cpus.len();
        let physical_cores = sys.physical_core_count();

        // The current clock is not a max; report none rather than mislabel it
        Ok(CpuSection {
            physical_cores,
            total_cores,
            max_frequency: Self::max_frequency_mhz(timeout).map(|mhz| mhz as f64),
        })
    }

    /// Max frequency from cpufreq (reported in kHz)
    #[cfg(target_os = "linux")]
    fn max_frequency_mhz(_timeout: Duration) -> Option<u64> {
        const FREQ_PATHS: [&str; 2] = [
            "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq",
            "/sys/devices/system/cpu/cpu0/cpufreq/scaling_max_freq",
        ];

        FREQ_PATHS.iter().find_map(|path| {
            fs::read_to_string(path)
                .ok()
                .and_then(|content| parse_khz_as_mhz(&content))
        })
    }

    /// Max frequency from Win32_Processor.MaxClockSpeed (reported in MHz)
    #[cfg(target_os = "windows")]
    fn max_frequency_mhz(timeout: Duration) -> Option<u64> {
        match super::cim::query("Win32_Processor", &["MaxClockSpeed"], timeout) {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| super::cim::u64_field(row, "MaxClockSpeed"))
                .find(|mhz| *mhz > 0),
            Err(err) => {
                tracing::debug!("Win32_Processor query failed: {err:#}");
                None
            }
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    fn max_frequency_mhz(_timeout: Duration) -> Option<u64> {
        None
    }
}

/// Parse a sysfs kHz value into MHz
#[cfg(any(test, target_os = "linux"))]
fn parse_khz_as_mhz(content: &str) -> Option<u64> {
    content
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|khz| *khz > 0)
        .map(|khz| khz / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpufreq_values() {
        assert_eq!(parse_khz_as_mhz("4950000\n"), Some(4950));
        assert_eq!(parse_khz_as_mhz("0"), None);
        assert_eq!(parse_khz_as_mhz("<unknown>"), None);
    }

    #[test]
    fn detect_reports_logical_cores() {
        let cpu = CpuSection::detect(Duration::from_secs(20)).unwrap();
        assert!(cpu.total_cores > 0);
        if let Some(physical) = cpu.physical_cores {
            assert!(physical <= cpu.total_cores);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn max_frequency_is_absent_without_cpufreq() {
        let cpu = CpuSection::detect(Duration::from_secs(20)).unwrap();
        match CpuSection::max_frequency_mhz(Duration::from_secs(20)) {
            Some(mhz) => assert_eq!(cpu.max_frequency, Some(mhz as f64)),
            None => assert_eq!(cpu.max_frequency, None),
        }
    }
}
