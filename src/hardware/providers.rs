//! Provider seams and the capability-gated provider set
//!
//! Each trait is one single-purpose host query. [`Providers::detect`] decides
//! once, from the platform and the configuration, which implementations are
//! active; the assembler then runs over whatever set resulted without any
//! platform conditionals of its own.

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;

use super::display::{Monitor, RefreshRate, VideoController};
use super::gpu::{InventoryAdapter, NvidiaSmi};
use super::record::{CpuSection, GpuAdapter, MemorySection, SystemSection};
use crate::config::ProbeConfig;

/// OS, CPU and memory descriptors
pub trait HostProbe {
    fn system(&self) -> Result<SystemSection>;
    fn cpu(&self) -> Result<CpuSection>;
    fn memory(&self) -> Result<MemorySection>;
}

/// Primary GPU source: direct hardware telemetry
pub trait GpuTelemetry {
    fn gpus(&self) -> Result<Vec<GpuAdapter>>;
}

/// Secondary GPU source: OS management inventory
pub trait GpuInventory {
    /// Note attached to entries this source contributes
    fn provenance(&self) -> &str;
    fn adapters(&self) -> Result<Vec<InventoryAdapter>>;
}

/// Cross-platform monitor geometry
pub trait MonitorGeometry {
    fn monitors(&self) -> Result<Vec<Monitor>>;
}

/// Current refresh rate per display device name
pub trait RefreshRates {
    fn refresh_rates(&self) -> Result<HashMap<String, RefreshRate>>;
}

/// Controller-level display data
pub trait VideoControllers {
    fn controllers(&self) -> Result<Vec<VideoController>>;
}

/// The active providers for one collection run
pub struct Providers {
    pub host: Box<dyn HostProbe>,
    pub gpu_telemetry: Box<dyn GpuTelemetry>,
    pub gpu_inventory: Option<Box<dyn GpuInventory>>,
    pub monitors: Box<dyn MonitorGeometry>,
    pub refresh_rates: Option<Box<dyn RefreshRates>>,
    pub video_controllers: Option<Box<dyn VideoControllers>>,
}

impl Providers {
    /// Build the provider set for the current platform
    pub fn detect(config: &ProbeConfig) -> Self {
        let timeout = config.command_timeout();

        let providers = Providers {
            host: Box::new(LiveHost { timeout }),
            gpu_telemetry: Box::new(NvidiaSmi {
                path: config.nvidia_smi_path.clone(),
                timeout,
            }),
            gpu_inventory: if config.gpu_inventory {
                platform_gpu_inventory(config, timeout)
            } else {
                None
            },
            monitors: platform_monitor_geometry(timeout),
            refresh_rates: platform_refresh_rates(),
            video_controllers: if config.video_controllers {
                platform_video_controllers(timeout)
            } else {
                None
            },
        };

        tracing::debug!(
            gpu_inventory = providers.gpu_inventory.is_some(),
            refresh_rates = providers.refresh_rates.is_some(),
            video_controllers = providers.video_controllers.is_some(),
            "Provider set ready"
        );

        providers
    }
}

/// Live host queries through sysinfo and platform tools
pub struct LiveHost {
    pub timeout: Duration,
}

impl HostProbe for LiveHost {
    fn system(&self) -> Result<SystemSection> {
        SystemSection::detect(self.timeout)
    }

    fn cpu(&self) -> Result<CpuSection> {
        CpuSection::detect(self.timeout)
    }

    fn memory(&self) -> Result<MemorySection> {
        MemorySection::detect()
    }
}

#[cfg(target_os = "windows")]
fn platform_gpu_inventory(
    _config: &ProbeConfig,
    timeout: Duration,
) -> Option<Box<dyn GpuInventory>> {
    Some(Box::new(super::gpu::CimVideoControllers { timeout }))
}

/// lspci names never equal nvidia-smi names, so it is opt-in
#[cfg(target_os = "linux")]
fn platform_gpu_inventory(
    config: &ProbeConfig,
    timeout: Duration,
) -> Option<Box<dyn GpuInventory>> {
    if config.lspci_inventory {
        Some(Box::new(super::gpu::Lspci { timeout }))
    } else {
        None
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn platform_gpu_inventory(
    _config: &ProbeConfig,
    _timeout: Duration,
) -> Option<Box<dyn GpuInventory>> {
    None
}

#[cfg(target_os = "windows")]
fn platform_monitor_geometry(_timeout: Duration) -> Box<dyn MonitorGeometry> {
    Box::new(super::display::GdiMonitors)
}

#[cfg(target_os = "linux")]
fn platform_monitor_geometry(timeout: Duration) -> Box<dyn MonitorGeometry> {
    Box::new(super::display::Xrandr { timeout })
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn platform_monitor_geometry(_timeout: Duration) -> Box<dyn MonitorGeometry> {
    Box::new(super::display::NoMonitorSource)
}

#[cfg(target_os = "windows")]
fn platform_refresh_rates() -> Option<Box<dyn RefreshRates>> {
    Some(Box::new(super::display::GdiDisplaySettings))
}

#[cfg(not(target_os = "windows"))]
fn platform_refresh_rates() -> Option<Box<dyn RefreshRates>> {
    None
}

#[cfg(target_os = "windows")]
fn platform_video_controllers(timeout: Duration) -> Option<Box<dyn VideoControllers>> {
    Some(Box::new(super::gpu::CimVideoControllers { timeout }))
}

#[cfg(not(target_os = "windows"))]
fn platform_video_controllers(_timeout: Duration) -> Option<Box<dyn VideoControllers>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_optional_sources_are_not_built() {
        let config = ProbeConfig {
            gpu_inventory: false,
            video_controllers: false,
            ..ProbeConfig::default()
        };
        let providers = Providers::detect(&config);
        assert!(providers.gpu_inventory.is_none());
        assert!(providers.video_controllers.is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_has_no_secondary_sources_by_default() {
        let providers = Providers::detect(&ProbeConfig::default());
        assert!(providers.gpu_inventory.is_none());
        assert!(providers.refresh_rates.is_none());
        assert!(providers.video_controllers.is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_lspci_inventory_is_opt_in() {
        let config = ProbeConfig {
            lspci_inventory: true,
            ..ProbeConfig::default()
        };
        let providers = Providers::detect(&config);
        assert_eq!(
            providers.gpu_inventory.as_ref().map(|s| s.provenance()),
            Some("Detected via lspci")
        );
    }
}
