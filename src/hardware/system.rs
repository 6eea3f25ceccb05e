//! Operating system and memory descriptors

use anyhow::Result;
use std::time::Duration;
use sysinfo::System;

use super::record::{MemorySection, SystemSection, UNKNOWN};

impl SystemSection {
    /// Describe the running OS
    pub fn detect(timeout: Duration) -> Result<Self> {
        let mut sys = System::new();
        sys.refresh_cpu_all();

        let processor = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        Ok(SystemSection {
            os: os_family(std::env::consts::OS),
            os_version: Self::os_version(timeout),
            machine: std::env::consts::ARCH.to_string(),
            processor,
        })
    }

    /// Windows reports the marketing caption (e.g. "Microsoft Windows 11 Pro")
    #[cfg(target_os = "windows")]
    fn os_version(timeout: Duration) -> String {
        match super::cim::query("Win32_OperatingSystem", &["Caption"], timeout) {
            Ok(rows) => {
                if let Some(caption) = rows
                    .first()
                    .and_then(|row| super::cim::string_field(row, "Caption"))
                {
                    return caption;
                }
            }
            Err(err) => tracing::debug!("OS caption query failed: {err:#}"),
        }

        fallback_os_version()
    }

    #[cfg(not(target_os = "windows"))]
    fn os_version(_timeout: Duration) -> String {
        fallback_os_version()
    }
}

fn fallback_os_version() -> String {
    System::long_os_version()
        .or_else(System::os_version)
        .or_else(System::kernel_version)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Map a target OS identifier to its conventional family name
fn os_family(target_os: &str) -> String {
    match target_os {
        "windows" => "Windows".to_string(),
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => UNKNOWN.to_string(),
            }
        }
    }
}

impl MemorySection {
    /// Read total and available physical memory
    pub fn detect() -> Result<Self> {
        let mut sys = System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            anyhow::bail!("Memory information unavailable");
        }

        Ok(MemorySection::from_bytes(total, sys.available_memory()))
    }
}
