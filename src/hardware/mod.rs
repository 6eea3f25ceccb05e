//! Hardware inventory module
//!
//! Collects OS, CPU, memory, display and GPU information from sysinfo and
//! platform tools (nvidia-smi, lspci, xrandr, Win32 GDI, CIM/WMI) and merges
//! them into one [`InventoryRecord`].

mod assembler;
#[cfg(any(test, target_os = "windows"))]
mod cim;
pub mod cpu;
pub mod display;
pub mod gpu;
mod merge;
pub mod providers;
pub mod record;
mod system;

pub use assembler::assemble;
pub use providers::Providers;
pub use record::InventoryRecord;
