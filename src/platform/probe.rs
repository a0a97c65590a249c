//! Shared VRAM probe skeleton
//!
//! Every vendor variant runs the same sequence:
//!
//! ```text
//! open library (primary -> secondary) -> resolve table -> init
//!     -> first device -> memory record -> shutdown -> unload
//! ```
//!
//! The library handle is owned by the probe frame and the vendor session is
//! held by a [`Session`] guard created only after `init` succeeds, so an
//! early return at any step still runs shutdown (if a session exists) and
//! then unloads the library, each exactly once.

use std::marker::PhantomData;

use tracing::debug;

use super::loader::{open_first, SystemLoader};
use super::traits::{LibraryLoader, ProbeError, ProbeResult, VendorBackend};

/// Shuts the vendor API down when dropped.
struct Session<'t, 'lib, B: VendorBackend> {
    table: &'t B::Table<'lib>,
}

impl<'t, 'lib, B: VendorBackend> Session<'t, 'lib, B> {
    fn start(table: &'t B::Table<'lib>) -> ProbeResult<Self> {
        B::init(table)?;
        Ok(Self { table })
    }
}

impl<B: VendorBackend> Drop for Session<'_, '_, B> {
    fn drop(&mut self) {
        B::shutdown(self.table);
    }
}

/// Best-effort VRAM query against one vendor backend.
///
/// The prober holds no state between calls: each query loads the library,
/// talks to the driver and unloads it again. Hosts that want caching should
/// keep the returned value themselves.
pub struct VramProber<B: VendorBackend, L: LibraryLoader = SystemLoader> {
    loader: L,
    candidates: Vec<String>,
    _backend: PhantomData<B>,
}

impl<B: VendorBackend> VramProber<B, SystemLoader> {
    /// Probe using the operating system loader and the backend's built-in
    /// library names.
    pub fn new() -> Self {
        Self::with_loader(SystemLoader)
    }
}

impl<B: VendorBackend> Default for VramProber<B, SystemLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: VendorBackend, L: LibraryLoader> VramProber<B, L> {
    /// Probe through a custom loader.
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            candidates: B::CONFIG
                .library_names
                .iter()
                .map(|name| name.to_string())
                .collect(),
            _backend: PhantomData,
        }
    }

    /// Append library names or paths to try after the built-in ones.
    pub fn with_extra_candidates<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates.extend(extra.into_iter().map(Into::into));
        self
    }

    /// Library names in the order they will be tried.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Backend name, e.g. `"nvml"`.
    pub fn backend_name(&self) -> &'static str {
        B::NAME
    }

    /// Run the probe and report why it failed, if it did.
    ///
    /// A successful run returns the raw converted value, which may be `0` if
    /// the driver reports no memory.
    pub fn try_probe(&self) -> ProbeResult<u64> {
        let (name, library) = open_first(&self.loader, &self.candidates)?;
        let table = B::resolve(&library)?;

        let session = Session::<B>::start(&table)?;
        let device = B::first_device(session.table)?;
        let units = B::memory_units(session.table, device, B::CONFIG.struct_version)?;
        drop(session);

        let bytes = units.saturating_mul(B::CONFIG.unit_factor);
        debug!("{} via {}: {} bytes", B::NAME, name, bytes);
        Ok(bytes)
    }

    /// Run the probe, returning `0` on any failure.
    pub fn vram_size(&self) -> u64 {
        match self.try_probe() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("{} probe failed: {}", B::NAME, e);
                0
            }
        }
    }

    /// Like [`try_probe`](Self::try_probe), but a zero reading is an error.
    pub fn try_vram_size(&self) -> ProbeResult<u64> {
        match self.try_probe()? {
            0 => Err(ProbeError::EmptyReading),
            bytes => Ok(bytes),
        }
    }
}
