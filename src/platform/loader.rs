//! Dynamic library loading
//!
//! Thin wrapper over `libloading` that implements [`LibraryLoader`] for the
//! host operating system (`dlopen`/`dlsym` on Unix, `LoadLibrary` /
//! `GetProcAddress` on Windows), plus the helpers the vendor backends use to
//! open a library from an ordered list of names and to turn symbol addresses
//! into typed function pointers.

use std::ffi::c_void;
use std::mem;

use libloading::Library;
use tracing::{debug, trace};

use super::traits::{DynamicLibrary, LibraryLoader, ProbeError, ProbeResult};

/// Loader backed by the operating system's dynamic loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLoader;

impl LibraryLoader for SystemLoader {
    type Library = SystemLibrary;

    fn open(&self, name: &str) -> Option<SystemLibrary> {
        // SAFETY: loading a vendor driver runs its initializers. These are
        // the same libraries the vendor's own tooling loads.
        match unsafe { Library::new(name) } {
            Ok(inner) => Some(SystemLibrary {
                name: name.to_string(),
                inner,
            }),
            Err(e) => {
                trace!("dlopen {} failed: {}", name, e);
                None
            }
        }
    }
}

/// A library opened by [`SystemLoader`]. Unloaded on drop.
#[derive(Debug)]
pub struct SystemLibrary {
    name: String,
    inner: Library,
}

impl SystemLibrary {
    /// The name the library was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

// SAFETY: addresses come from dlsym/GetProcAddress on `inner`, which stays
// loaded until this value is dropped.
unsafe impl DynamicLibrary for SystemLibrary {
    fn symbol(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is only read as an address here; the caller
        // decides which signature it has.
        let address = unsafe { self.inner.get::<*const c_void>(name.as_bytes()) }
            .ok()
            .map(|sym| *sym)?;
        (!address.is_null()).then_some(address)
    }
}

impl Drop for SystemLibrary {
    fn drop(&mut self) {
        trace!("unloading {}", self.name);
    }
}

/// Open the first library in `candidates` that loads.
///
/// Returns the name that succeeded together with the handle.
pub fn open_first<L, S>(loader: &L, candidates: &[S]) -> ProbeResult<(String, L::Library)>
where
    L: LibraryLoader,
    S: AsRef<str>,
{
    for candidate in candidates {
        let name = candidate.as_ref();
        if let Some(library) = loader.open(name) {
            debug!("loaded driver library {}", name);
            return Ok((name.to_string(), library));
        }
        debug!("driver library {} not available", name);
    }

    Err(ProbeError::LibraryUnavailable {
        candidates: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
    })
}

/// Reinterpret a symbol address as a function pointer of type `F`.
///
/// # Safety
///
/// `F` must be a function pointer type whose signature matches the exported
/// symbol, and `address` must stay valid for as long as the result is used.
pub unsafe fn cast_symbol<F: Copy>(address: *const c_void) -> F {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*const c_void>());
    mem::transmute_copy::<*const c_void, F>(&address)
}

/// Resolve `name` from `library` as a function pointer of type `F`.
///
/// # Safety
///
/// Same contract as [`cast_symbol`].
pub unsafe fn resolve_fn<F: Copy, D: DynamicLibrary>(
    library: &D,
    name: &'static str,
) -> ProbeResult<F> {
    match library.symbol(name) {
        Some(address) if !address.is_null() => Ok(cast_symbol(address)),
        _ => {
            debug!("symbol {} not exported", name);
            Err(ProbeError::MissingSymbol(name))
        }
    }
}
