//! In-process loader fakes used by the probe tests.
//!
//! A [`MockLoader`] holds library templates keyed by name. Opening a name
//! hands out a live copy that shares the loader's [`LoaderStats`], and
//! dropping that copy counts as an unload.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

use super::traits::{DynamicLibrary, LibraryLoader};

/// Load/unload bookkeeping shared by a loader and every library it opened.
#[derive(Debug, Default)]
pub struct LoaderStats {
    attempts: RefCell<Vec<String>>,
    loads: Cell<usize>,
    unloads: Cell<usize>,
}

impl LoaderStats {
    /// Every name passed to `open`, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.borrow().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.get()
    }

    pub fn unloads(&self) -> usize {
        self.unloads.get()
    }
}

/// A fake shared library exporting a fixed symbol map.
#[derive(Debug)]
pub struct MockLibrary {
    name: String,
    symbols: HashMap<String, usize>,
    stats: Option<Rc<LoaderStats>>,
}

impl MockLibrary {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbols: HashMap::new(),
            stats: None,
        }
    }

    pub fn with_symbol(mut self, name: &str, address: *const c_void) -> Self {
        self.symbols.insert(name.to_string(), address as usize);
        self
    }

    pub fn without_symbol(mut self, name: &str) -> Self {
        self.symbols.remove(name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self, stats: Rc<LoaderStats>) -> Self {
        Self {
            name: self.name.clone(),
            symbols: self.symbols.clone(),
            stats: Some(stats),
        }
    }
}

// SAFETY: tests only register addresses of `extern "C"` functions with the
// signature of the export they stand in for.
unsafe impl DynamicLibrary for MockLibrary {
    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.symbols.get(name).map(|&addr| addr as *const c_void)
    }
}

impl Drop for MockLibrary {
    fn drop(&mut self) {
        if let Some(stats) = &self.stats {
            stats.unloads.set(stats.unloads.get() + 1);
        }
    }
}

/// Loader that serves [`MockLibrary`] templates by name.
#[derive(Debug, Default)]
pub struct MockLoader {
    libraries: HashMap<String, MockLibrary>,
    stats: Rc<LoaderStats>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, library: MockLibrary) -> Self {
        self.libraries.insert(library.name.clone(), library);
        self
    }

    pub fn stats(&self) -> Rc<LoaderStats> {
        Rc::clone(&self.stats)
    }
}

impl LibraryLoader for MockLoader {
    type Library = MockLibrary;

    fn open(&self, name: &str) -> Option<MockLibrary> {
        self.stats.attempts.borrow_mut().push(name.to_string());
        let template = self.libraries.get(name)?;
        self.stats.loads.set(self.stats.loads.get() + 1);
        Some(template.instantiate(Rc::clone(&self.stats)))
    }
}
