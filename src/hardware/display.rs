//! Display enumeration sources
//!
//! Monitor geometry comes from `xrandr` on Linux and `EnumDisplayMonitors`
//! on Windows. Windows additionally provides per-device refresh rates
//! (`EnumDisplaySettings`) and controller-level data from CIM
//! `Win32_VideoController`.

use anyhow::Result;
#[cfg(target_os = "linux")]
use anyhow::Context;
#[cfg(target_os = "linux")]
use std::time::Duration;

use super::providers::MonitorGeometry;
#[cfg(target_os = "windows")]
use super::providers::{RefreshRates, VideoControllers};
use super::record::{ControllerEntry, MonitorEntry};

/// Geometry of one monitor
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub is_primary: bool,
}

impl From<Monitor> for MonitorEntry {
    fn from(monitor: Monitor) -> Self {
        MonitorEntry {
            name: monitor.name,
            resolution: format!("{}x{}", monitor.width, monitor.height),
            position: format!("({}, {})", monitor.x, monitor.y),
            is_primary: monitor.is_primary,
            refresh_rate: None,
            device_name: None,
        }
    }
}

/// Current refresh rate of a display device, keyed by device name
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRate {
    pub hz: u32,
    /// Adapter description (e.g. "NVIDIA GeForce RTX 3070")
    pub device_string: String,
}

/// Controller-level display data from the OS inventory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoController {
    pub name: String,
    pub current_refresh_rate: Option<u64>,
    pub max_refresh_rate: Option<u64>,
    pub current_horizontal_resolution: Option<u64>,
    pub current_vertical_resolution: Option<u64>,
}

impl VideoController {
    /// Report entry for a controller that is driving a display.
    ///
    /// Controllers without a nonzero current refresh rate yield `None`.
    pub fn into_entry(self) -> Option<ControllerEntry> {
        let current = self.current_refresh_rate.filter(|hz| *hz > 0)?;

        let current_resolution = match (
            self.current_horizontal_resolution.filter(|w| *w > 0),
            self.current_vertical_resolution,
        ) {
            (Some(width), Some(height)) => Some(format!("{}x{}", width, height)),
            _ => None,
        };

        Some(ControllerEntry {
            name: self.name,
            current_refresh_rate: format!("{}Hz", current),
            max_refresh_rate: self
                .max_refresh_rate
                .filter(|hz| *hz > 0)
                .map(|hz| format!("{}Hz", hz)),
            current_resolution,
        })
    }
}

/// Monitor geometry through `xrandr --query`
#[cfg(target_os = "linux")]
pub struct Xrandr {
    pub timeout: Duration,
}

#[cfg(target_os = "linux")]
impl MonitorGeometry for Xrandr {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        let stdout = crate::command::capture_stdout("xrandr", &["--query"], self.timeout)
            .context("Failed to enumerate monitors")?;
        Ok(parse_xrandr(&stdout))
    }
}

/// Parse connected, active outputs from `xrandr --query`
///
/// Example line: "DP-1 connected primary 2560x1440+1920+0 (normal left inverted right x axis y axis) 597mm x 336mm"
#[cfg(any(test, target_os = "linux"))]
fn parse_xrandr(stdout: &str) -> Vec<Monitor> {
    let mut monitors = Vec::new();

    for line in stdout.lines() {
        if line.starts_with(char::is_whitespace) {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let (Some(name), Some("connected")) = (tokens.next(), tokens.next()) else {
            continue;
        };

        let mut is_primary = false;
        let mut geometry = None;
        for token in tokens {
            if token == "primary" {
                is_primary = true;
                continue;
            }
            // Disabled outputs list their rotation options right after "connected"
            if token.starts_with('(') {
                break;
            }
            geometry = parse_xrandr_geometry(token);
            if geometry.is_some() {
                break;
            }
        }

        if let Some((width, height, x, y)) = geometry {
            monitors.push(Monitor {
                name: name.to_string(),
                width,
                height,
                x,
                y,
                is_primary,
            });
        }
    }

    monitors
}

/// Parse "WIDTHxHEIGHT+X+Y"
#[cfg(any(test, target_os = "linux"))]
fn parse_xrandr_geometry(token: &str) -> Option<(u32, u32, i32, i32)> {
    let (size, offset) = token.split_once('+')?;
    let (width, height) = size.split_once('x')?;
    let (x, y) = offset.split_once('+')?;
    Some((
        width.parse().ok()?,
        height.parse().ok()?,
        x.parse().ok()?,
        y.parse().ok()?,
    ))
}

/// Monitor geometry through `EnumDisplayMonitors`
#[cfg(target_os = "windows")]
pub struct GdiMonitors;

#[cfg(target_os = "windows")]
impl MonitorGeometry for GdiMonitors {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        win32::enum_monitors()
    }
}

/// Current display settings through `EnumDisplayDevices`
#[cfg(target_os = "windows")]
pub struct GdiDisplaySettings;

#[cfg(target_os = "windows")]
impl RefreshRates for GdiDisplaySettings {
    fn refresh_rates(&self) -> Result<std::collections::HashMap<String, RefreshRate>> {
        Ok(win32::enum_refresh_rates())
    }
}

#[cfg(target_os = "windows")]
impl VideoControllers for super::gpu::CimVideoControllers {
    fn controllers(&self) -> Result<Vec<VideoController>> {
        let rows = super::cim::query(
            "Win32_VideoController",
            &[
                "Name",
                "CurrentRefreshRate",
                "MaxRefreshRate",
                "CurrentHorizontalResolution",
                "CurrentVerticalResolution",
            ],
            self.timeout,
        )?;
        Ok(parse_cim_controllers(&rows))
    }
}

#[cfg(any(test, target_os = "windows"))]
fn parse_cim_controllers(rows: &[serde_json::Value]) -> Vec<VideoController> {
    use super::cim::{string_field, u64_field};

    rows.iter()
        .map(|row| VideoController {
            name: string_field(row, "Name").unwrap_or_else(|| super::record::UNKNOWN.to_string()),
            current_refresh_rate: u64_field(row, "CurrentRefreshRate"),
            max_refresh_rate: u64_field(row, "MaxRefreshRate"),
            current_horizontal_resolution: u64_field(row, "CurrentHorizontalResolution"),
            current_vertical_resolution: u64_field(row, "CurrentVerticalResolution"),
        })
        .collect()
}

/// Decode a fixed-size, NUL-terminated UTF-16 buffer
#[cfg(any(test, target_os = "windows"))]
fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Unsupported platforms report a failure that becomes a placeholder
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub struct NoMonitorSource;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
impl MonitorGeometry for NoMonitorSource {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        anyhow::bail!(
            "No monitor enumeration source available on {}",
            std::env::consts::OS
        )
    }
}

#[cfg(target_os = "windows")]
mod win32 {
    use super::{wide_to_string, Monitor, RefreshRate};
    use anyhow::Result;
    use std::collections::HashMap;
    use std::mem;
    use windows_sys::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows_sys::Win32::Graphics::Gdi::{
        EnumDisplayDevicesW, EnumDisplayMonitors, EnumDisplaySettingsW, GetMonitorInfoW, DEVMODEW,
        DISPLAY_DEVICEW, ENUM_CURRENT_SETTINGS, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
        MONITORINFOF_PRIMARY,
    };

    pub(super) fn enum_monitors() -> Result<Vec<Monitor>> {
        let mut monitors: Vec<Monitor> = Vec::new();
        let ok = unsafe {
            EnumDisplayMonitors(
                std::ptr::null_mut(),
                std::ptr::null(),
                Some(collect_monitor),
                &mut monitors as *mut Vec<Monitor> as LPARAM,
            )
        };
        if ok == 0 {
            anyhow::bail!("EnumDisplayMonitors failed");
        }
        Ok(monitors)
    }

    unsafe extern "system" fn collect_monitor(
        monitor: HMONITOR,
        _hdc: HDC,
        _clip: *mut RECT,
        data: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(data as *mut Vec<Monitor>);

        let mut info: MONITORINFOEXW = mem::zeroed();
        info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
        if GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO) != 0 {
            let rect = info.monitorInfo.rcMonitor;
            monitors.push(Monitor {
                name: wide_to_string(&info.szDevice),
                width: (rect.right - rect.left).max(0) as u32,
                height: (rect.bottom - rect.top).max(0) as u32,
                x: rect.left,
                y: rect.top,
                is_primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
            });
        }

        // Keep enumerating
        1
    }

    pub(super) fn enum_refresh_rates() -> HashMap<String, RefreshRate> {
        let mut rates = HashMap::new();
        let mut index = 0u32;

        loop {
            let mut device: DISPLAY_DEVICEW = unsafe { mem::zeroed() };
            device.cb = mem::size_of::<DISPLAY_DEVICEW>() as u32;
            if unsafe { EnumDisplayDevicesW(std::ptr::null(), index, &mut device, 0) } == 0 {
                break;
            }

            let mut mode: DEVMODEW = unsafe { mem::zeroed() };
            mode.dmSize = mem::size_of::<DEVMODEW>() as u16;
            let has_mode = unsafe {
                EnumDisplaySettingsW(device.DeviceName.as_ptr(), ENUM_CURRENT_SETTINGS, &mut mode)
            } != 0;

            if has_mode {
                rates.insert(
                    wide_to_string(&device.DeviceName),
                    RefreshRate {
                        hz: mode.dmDisplayFrequency,
                        device_string: wide_to_string(&device.DeviceString),
                    },
                );
            }

            index += 1;
        }

        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const XRANDR: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
HDMI-1 connected 1920x1080+0+180 (normal left inverted right x axis y axis) 527mm x 296mm
   1920x1080     60.00*+  50.00    59.94
DP-1 connected primary 2560x1440+1920+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440    143.97*+  59.95
eDP-1 connected (normal left inverted right x axis y axis)
   1920x1080     60.01 +
DP-2 disconnected (normal left inverted right x axis y axis)
";

    #[test]
    fn xrandr_reports_active_outputs_in_order() {
        let monitors = parse_xrandr(XRANDR);
        assert_eq!(
            monitors,
            vec![
                Monitor {
                    name: "HDMI-1".to_string(),
                    width: 1920,
                    height: 1080,
                    x: 0,
                    y: 180,
                    is_primary: false,
                },
                Monitor {
                    name: "DP-1".to_string(),
                    width: 2560,
                    height: 1440,
                    x: 1920,
                    y: 0,
                    is_primary: true,
                },
            ]
        );
    }

    #[test]
    fn xrandr_without_outputs_is_empty() {
        assert!(parse_xrandr("Screen 0: minimum 8 x 8, current 1024 x 768\n").is_empty());
    }

    #[test]
    fn xrandr_geometry_token() {
        assert_eq!(parse_xrandr_geometry("3840x2160+0+0"), Some((3840, 2160, 0, 0)));
        assert_eq!(parse_xrandr_geometry("primary"), None);
        assert_eq!(parse_xrandr_geometry("1920x1080"), None);
    }

    #[test]
    fn monitor_entry_formats_geometry() {
        let entry = MonitorEntry::from(Monitor {
            name: r"\\.\DISPLAY2".to_string(),
            width: 1920,
            height: 1080,
            x: -1920,
            y: 0,
            is_primary: false,
        });
        assert_eq!(entry.resolution, "1920x1080");
        assert_eq!(entry.position, "(-1920, 0)");
        assert_eq!(entry.refresh_rate, None);
    }

    #[test]
    fn idle_controller_yields_no_entry() {
        let controller = VideoController {
            name: "Microsoft Basic Display Adapter".to_string(),
            current_refresh_rate: Some(0),
            ..Default::default()
        };
        assert_eq!(controller.into_entry(), None);
        assert_eq!(VideoController::default().into_entry(), None);
    }

    #[test]
    fn active_controller_entry_formats_rates() {
        let entry = VideoController {
            name: "NVIDIA GeForce RTX 3070".to_string(),
            current_refresh_rate: Some(144),
            max_refresh_rate: Some(165),
            current_horizontal_resolution: Some(2560),
            current_vertical_resolution: Some(1440),
        }
        .into_entry()
        .unwrap();
        assert_eq!(entry.current_refresh_rate, "144Hz");
        assert_eq!(entry.max_refresh_rate.as_deref(), Some("165Hz"));
        assert_eq!(entry.current_resolution.as_deref(), Some("2560x1440"));
    }

    #[test]
    fn cim_controller_rows() {
        let rows = vec![json!({
            "Name": "AMD Radeon RX 6800",
            "CurrentRefreshRate": 120,
            "MaxRefreshRate": null,
            "CurrentHorizontalResolution": 3840,
            "CurrentVerticalResolution": 2160
        })];
        let controllers = parse_cim_controllers(&rows);
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].current_refresh_rate, Some(120));
        assert_eq!(controllers[0].max_refresh_rate, None);

        let entry = controllers[0].clone().into_entry().unwrap();
        assert_eq!(entry.max_refresh_rate, None);
        assert_eq!(entry.current_resolution.as_deref(), Some("3840x2160"));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn current_display_modes_are_keyed_by_device_name() {
        use crate::hardware::providers::RefreshRates;

        let rates = GdiDisplaySettings.refresh_rates().unwrap();
        assert!(rates.keys().all(|name| name.starts_with(r"\\.\DISPLAY")));
    }

    #[test]
    fn wide_strings_stop_at_nul() {
        let mut buf = [0u16; 32];
        for (slot, unit) in buf.iter_mut().zip(r"\\.\DISPLAY1".encode_utf16()) {
            *slot = unit;
        }
        assert_eq!(wide_to_string(&buf), r"\\.\DISPLAY1");
    }
}
