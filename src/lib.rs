//! VRAM Probe
//!
//! Best-effort GPU memory size detection through vendor driver libraries
//! loaded at runtime, plus a system log forwarder.
//!
//! ## Features
//!
//! - **Runtime probing**: the NVIDIA driver library is opened with the
//!   platform loader at query time; there is no link-time dependency
//! - **Fallback chain**: primary library name, then a generic name
//! - **Never fails loudly**: [`get_vram_size`] returns `0` when the size
//!   cannot be determined
//! - **Guaranteed teardown**: driver session and library handle are
//!   released on every exit path
//! - **System log forwarding**: long messages split into syslog-sized
//!   segments
//!
//! ## Platforms
//!
//! - Linux: NVML (`libnvidia-ml.so.1`), total memory in bytes
//! - Windows: NVAPI (`nvapi64.dll`), dedicated memory
//! - elsewhere: `0`

pub mod core;
pub mod logging;
pub mod platform;

// Re-exports
pub use core::config::ProbeConfig;
pub use core::memory::{RequiredMemory, SystemMemoryInfo};
pub use logging::{log, Severity, SyslogLayer};
pub use platform::{
    get_vram_size, try_vram_size, DynamicLibrary, LibraryLoader, ProbeError, ProbeResult,
    VendorBackend, VramProber,
};
