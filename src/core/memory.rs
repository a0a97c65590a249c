//! Host memory totals (RAM + VRAM) for workload fit checks

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{info, warn};

use crate::platform::{self, ProbeResult};

/// An amount of memory, split by where it lives. Both values in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredMemory {
    pub ram: u64,
    pub vram: u64,
}

impl RequiredMemory {
    pub fn new(ram: u64, vram: u64) -> Self {
        Self { ram, vram }
    }
}

/// Total RAM and VRAM available on this machine.
///
/// Either value falls back to `1` byte when it cannot be read, so a
/// non-trivial requirement never fits on a machine whose memory is unknown.
#[derive(Debug, Clone)]
pub struct SystemMemoryInfo {
    total: RequiredMemory,
}

impl SystemMemoryInfo {
    /// Read host RAM via sysinfo and VRAM via the platform probe.
    pub fn detect() -> Self {
        Self::detect_with_vram(platform::try_vram_size)
    }

    /// Read host RAM via sysinfo and VRAM from `vram`.
    pub fn detect_with_vram<V>(vram: V) -> Self
    where
        V: FnOnce() -> ProbeResult<u64>,
    {
        Self::detect_with(vram, host_ram_bytes)
    }

    /// Same as [`detect`](Self::detect), with the probe and RAM readers
    /// injected.
    pub fn detect_with<V, R>(vram: V, ram: R) -> Self
    where
        V: FnOnce() -> ProbeResult<u64>,
        R: FnOnce() -> u64,
    {
        let vram = match vram() {
            Ok(bytes) => {
                info!("Running on system with {} MB VRAM", bytes / 1024 / 1024);
                bytes
            }
            Err(e) => {
                warn!("Could not read VRAM size: {}", e);
                1
            }
        };

        let ram = match ram() {
            0 => {
                warn!("Could not read host RAM size");
                1
            }
            bytes => {
                info!("Running on system with {} MB RAM", bytes / 1024 / 1024);
                bytes
            }
        };

        Self {
            total: RequiredMemory { ram, vram },
        }
    }

    /// Build from known totals.
    pub fn from_totals(total: RequiredMemory) -> Self {
        Self { total }
    }

    /// Whether `req` fits in both RAM and VRAM.
    pub fn have_sufficient_memory(&self, req: &RequiredMemory) -> bool {
        req.ram <= self.total.ram && req.vram <= self.total.vram
    }

    pub fn total_memory(&self) -> RequiredMemory {
        self.total
    }
}

fn host_ram_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}
