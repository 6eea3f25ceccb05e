//! Inventory assembly
//!
//! Runs every provider once, in a fixed order, and folds the results into one
//! [`InventoryRecord`]. A failing provider never aborts the run: its section
//! becomes an [`ErrorPlaceholder`], or is skipped when the provider is an
//! optional secondary source.

use anyhow::Result;
use std::collections::HashMap;

use super::display::RefreshRate;
use super::merge::merge_by_key;
use super::providers::Providers;
use super::record::{
    DisplayEntry, ErrorPlaceholder, GpuAdapter, GpuEntry, InventoryRecord, MonitorEntry, Probed,
};

/// Collect the full inventory. Always returns a record.
pub fn assemble(providers: &Providers) -> InventoryRecord {
    InventoryRecord {
        system: probe("system", || providers.host.system()),
        cpu: probe("cpu", || providers.host.cpu()),
        memory: probe("memory", || providers.host.memory()),
        displays: assemble_displays(providers),
        gpu: assemble_gpus(providers),
    }
}

fn probe<T>(section: &str, query: impl FnOnce() -> Result<T>) -> Probed<T> {
    match query() {
        Ok(value) => Probed::Value(value),
        Err(err) => {
            tracing::warn!("{section} query failed: {err:#}");
            Probed::Failed(ErrorPlaceholder::from_error(&err))
        }
    }
}

/// Primary telemetry first, then inventory adapters whose name is unseen.
fn assemble_gpus(providers: &Providers) -> Vec<GpuEntry> {
    let primary = match providers.gpu_telemetry.gpus() {
        Ok(gpus) => gpus,
        Err(err) => {
            tracing::warn!("GPU query failed: {err:#}");
            return vec![GpuEntry::Error(ErrorPlaceholder::from_error(&err))];
        }
    };

    let secondary: Vec<GpuAdapter> = match &providers.gpu_inventory {
        Some(inventory) => match inventory.adapters() {
            Ok(adapters) => {
                let note = inventory.provenance();
                adapters
                    .into_iter()
                    .map(|adapter| adapter.into_gpu_adapter(note))
                    .collect()
            }
            Err(err) => {
                tracing::debug!("Skipping GPU inventory: {err:#}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    merge_by_key(primary, secondary, |gpu: &GpuAdapter| gpu.name.clone())
        .into_iter()
        .map(GpuEntry::Adapter)
        .collect()
}

/// Monitor geometry (enriched with refresh rates where available), then
/// controller-level entries. Display entries are never deduplicated.
fn assemble_displays(providers: &Providers) -> Vec<DisplayEntry> {
    let refresh_rates = match &providers.refresh_rates {
        Some(source) => source.refresh_rates().unwrap_or_else(|err| {
            tracing::debug!("Skipping refresh rates: {err:#}");
            HashMap::new()
        }),
        None => HashMap::new(),
    };

    let mut displays: Vec<DisplayEntry> = match providers.monitors.monitors() {
        Ok(monitors) => monitors
            .into_iter()
            .map(|monitor| {
                let mut entry = MonitorEntry::from(monitor);
                enrich_with_refresh_rate(&mut entry, &refresh_rates);
                DisplayEntry::Monitor(entry)
            })
            .collect(),
        Err(err) => {
            tracing::warn!("Monitor query failed: {err:#}");
            vec![DisplayEntry::Error(ErrorPlaceholder::from_error(&err))]
        }
    };

    if let Some(source) = &providers.video_controllers {
        match source.controllers() {
            Ok(controllers) => displays.extend(
                controllers
                    .into_iter()
                    .filter_map(|controller| controller.into_entry())
                    .map(DisplayEntry::Controller),
            ),
            Err(err) => tracing::debug!("Skipping video controllers: {err:#}"),
        }
    }

    displays
}

fn enrich_with_refresh_rate(entry: &mut MonitorEntry, rates: &HashMap<String, RefreshRate>) {
    if let Some(rate) = rates.get(&entry.name) {
        entry.refresh_rate = Some(format!("{}Hz", rate.hz));
        entry.device_name = Some(rate.device_string.clone());
    }
}
