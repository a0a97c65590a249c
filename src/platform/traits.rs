//! Platform Abstraction Traits for Runtime Driver Probing
//!
//! This module defines the seams between the generic probe skeleton and the
//! things it talks to: the operating system's dynamic loader and the vendor
//! driver library that the loader hands back.
//!
//! # Architecture
//!
//! ```text
//! +------------------+      +-------------------+
//! |  LibraryLoader   | ---> |  DynamicLibrary   |  <- open by name, look up symbols
//! +------------------+      +-------------------+
//!          |                          |
//!          +------------+-------------+
//!                       |
//!              +--------v--------+
//!              |  VendorBackend  |  <- typed function table + vendor calls
//!              +-----------------+
//! ```
//!
//! Dropping a [`DynamicLibrary`] unloads it. The probe owns the library for
//! the duration of one query, so every exit path releases it. A resolved
//! function table borrows the library it came from and cannot outlive it.

use std::ffi::c_void;
use std::fmt;

// ============================================================================
// Error Types
// ============================================================================

/// Reasons a VRAM probe could not produce a size.
///
/// None of these leave the public [`get_vram_size`](super::get_vram_size)
/// entry point; it collapses all of them to `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// None of the candidate library names could be opened
    LibraryUnavailable { candidates: Vec<String> },
    /// A required entry point is not exported by the loaded library
    MissingSymbol(&'static str),
    /// A vendor API call returned a non-success status
    VendorStatus { call: &'static str, code: i32 },
    /// Enumeration succeeded but reported no usable device
    NoDevice,
    /// The driver answered but reported zero bytes of memory
    EmptyReading,
    /// No probe variant exists for this platform
    Unsupported(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::LibraryUnavailable { candidates } => {
                write!(f, "Driver library unavailable (tried {})", candidates.join(", "))
            }
            ProbeError::MissingSymbol(name) => write!(f, "Missing symbol: {}", name),
            ProbeError::VendorStatus { call, code } => {
                write!(f, "{} failed with status {}", call, code)
            }
            ProbeError::NoDevice => write!(f, "No GPU device present"),
            ProbeError::EmptyReading => write!(f, "Driver reported zero VRAM"),
            ProbeError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

// ============================================================================
// Loader Traits
// ============================================================================

/// A shared library that has been loaded into the process.
///
/// Implementations unload the library when dropped.
///
/// # Safety
///
/// Every address returned by [`symbol`](Self::symbol) must be the library's
/// export of that name and must stay valid for as long as `self` is alive.
/// Vendor backends call through these addresses without further checks.
///
/// Implementing the trait therefore takes `unsafe`:
///
/// ```compile_fail
/// use std::ffi::c_void;
/// use vram_probe::platform::DynamicLibrary;
///
/// struct Anything;
///
/// impl DynamicLibrary for Anything {
///     fn symbol(&self, _name: &str) -> Option<*const c_void> {
///         None
///     }
/// }
/// ```
pub unsafe trait DynamicLibrary {
    /// Address of an exported symbol, or `None` if the library does not
    /// export it.
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// Opens shared libraries by file name.
pub trait LibraryLoader {
    /// The handle type produced by this loader.
    type Library: DynamicLibrary;

    /// Open a library by name or path, returning `None` if it cannot be
    /// loaded.
    fn open(&self, name: &str) -> Option<Self::Library>;
}

impl<L: LibraryLoader + ?Sized> LibraryLoader for &L {
    type Library = L::Library;

    fn open(&self, name: &str) -> Option<Self::Library> {
        (**self).open(name)
    }
}

// ============================================================================
// Vendor Backend Trait
// ============================================================================

/// Per-variant constants that the shared skeleton needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantConfig {
    /// Library names, most specific first
    pub library_names: &'static [&'static str],
    /// Multiplier that turns the vendor's memory unit into bytes
    pub unit_factor: u64,
    /// Version/size tag written into the memory record before the query
    pub struct_version: Option<u32>,
}

/// A vendor driver API that can report the memory size of its first device.
///
/// Implementors only describe *how* to talk to the driver. Ordering, guard
/// placement and unit conversion live in [`VramProber`](super::probe::VramProber).
///
/// A table borrows the library it was resolved from, so it cannot be used
/// after the library is unloaded:
///
/// ```compile_fail
/// use vram_probe::platform::{DynamicLibrary, ProbeResult, VendorBackend};
///
/// fn outlive<'a, B: VendorBackend, D: DynamicLibrary>(library: D) -> ProbeResult<B::Table<'a>> {
///     B::resolve(&library)
/// }
/// ```
pub trait VendorBackend {
    /// Fully resolved function pointer table, borrowing its library.
    type Table<'lib>;
    /// Opaque device handle, valid between init and shutdown.
    type Device: Copy;

    /// Short name used in logs and reports.
    const NAME: &'static str;
    /// Library names, unit and version tag for this variant.
    const CONFIG: VariantConfig;

    /// Resolve every required entry point, failing on the first missing one.
    fn resolve<'lib, D: DynamicLibrary>(library: &'lib D) -> ProbeResult<Self::Table<'lib>>;

    /// Initialize the vendor API.
    fn init(table: &Self::Table<'_>) -> ProbeResult<()>;

    /// Tear the vendor API down. Only called after a successful `init`.
    fn shutdown(table: &Self::Table<'_>);

    /// Fetch the first available device.
    fn first_device(table: &Self::Table<'_>) -> ProbeResult<Self::Device>;

    /// Query the device's memory record and return the counter this variant
    /// reports, in the vendor's native unit.
    fn memory_units(
        table: &Self::Table<'_>,
        device: Self::Device,
        struct_version: Option<u32>,
    ) -> ProbeResult<u64>;
}
