//! Linux GPU memory via NVML
//!
//! Loads the NVIDIA Management Library at runtime (`libnvidia-ml.so.1`,
//! falling back to the unversioned `libnvidia-ml.so` development symlink)
//! and reads the total framebuffer memory of device 0.
//!
//! NVML reports memory in bytes, so no unit conversion is applied.
//!
//! # Example
//!
//! ```ignore
//! use vram_probe::platform::linux::gpu::Nvml;
//! use vram_probe::platform::VramProber;
//!
//! let bytes = VramProber::<Nvml>::new().vram_size();
//! println!("VRAM: {} MB", bytes / (1024 * 1024));
//! ```

use std::ffi::{c_int, c_uint, c_ulonglong, c_void};
use std::marker::PhantomData;
use std::ptr;

use crate::platform::loader::resolve_fn;
use crate::platform::traits::{
    DynamicLibrary, ProbeError, ProbeResult, VariantConfig, VendorBackend,
};

/// NVML return code (`nvmlReturn_t`).
pub type NvmlReturn = c_int;

/// Opaque NVML device handle (`nvmlDevice_t`).
///
/// Only the driver hands these out.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmlDevice(*mut c_void);

pub const NVML_SUCCESS: NvmlReturn = 0;

/// `nvmlMemory_t`, all values in bytes.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvmlMemory {
    pub total: c_ulonglong,
    pub free: c_ulonglong,
    pub used: c_ulonglong,
}

type FnNvmlInit = unsafe extern "C" fn() -> NvmlReturn;
type FnNvmlShutdown = unsafe extern "C" fn() -> NvmlReturn;
type FnNvmlDeviceGetHandleByIndex =
    unsafe extern "C" fn(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn;
type FnNvmlDeviceGetMemoryInfo =
    unsafe extern "C" fn(device: NvmlDevice, memory: *mut NvmlMemory) -> NvmlReturn;

/// Resolved NVML entry points, valid while the library is loaded.
#[derive(Debug, Clone, Copy)]
pub struct NvmlTable<'lib> {
    init: FnNvmlInit,
    shutdown: FnNvmlShutdown,
    device_get_handle_by_index: FnNvmlDeviceGetHandleByIndex,
    device_get_memory_info: FnNvmlDeviceGetMemoryInfo,
    _library: PhantomData<&'lib ()>,
}

fn check(call: &'static str, code: NvmlReturn) -> ProbeResult<()> {
    if code == NVML_SUCCESS {
        Ok(())
    } else {
        Err(ProbeError::VendorStatus { call, code })
    }
}

/// NVML backend. Reports `nvmlMemory_t::total` of device 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvml;

impl VendorBackend for Nvml {
    type Table<'lib> = NvmlTable<'lib>;
    type Device = NvmlDevice;

    const NAME: &'static str = "nvml";
    const CONFIG: VariantConfig = VariantConfig {
        library_names: &["libnvidia-ml.so.1", "libnvidia-ml.so"],
        unit_factor: 1,
        struct_version: None,
    };

    fn resolve<'lib, D: DynamicLibrary>(library: &'lib D) -> ProbeResult<NvmlTable<'lib>> {
        // SAFETY: the signatures match nvml.h for these legacy entry points.
        unsafe {
            Ok(NvmlTable {
                init: resolve_fn(library, "nvmlInit")?,
                shutdown: resolve_fn(library, "nvmlShutdown")?,
                device_get_handle_by_index: resolve_fn(library, "nvmlDeviceGetHandleByIndex")?,
                device_get_memory_info: resolve_fn(library, "nvmlDeviceGetMemoryInfo")?,
                _library: PhantomData,
            })
        }
    }

    fn init(table: &NvmlTable<'_>) -> ProbeResult<()> {
        check("nvmlInit", unsafe { (table.init)() })
    }

    fn shutdown(table: &NvmlTable<'_>) {
        let _ = unsafe { (table.shutdown)() };
    }

    fn first_device(table: &NvmlTable<'_>) -> ProbeResult<NvmlDevice> {
        let mut device = NvmlDevice(ptr::null_mut());
        check("nvmlDeviceGetHandleByIndex", unsafe {
            (table.device_get_handle_by_index)(0, &mut device)
        })?;
        Ok(device)
    }

    fn memory_units(
        table: &NvmlTable<'_>,
        device: NvmlDevice,
        _struct_version: Option<u32>,
    ) -> ProbeResult<u64> {
        let mut memory = NvmlMemory::default();
        check("nvmlDeviceGetMemoryInfo", unsafe {
            (table.device_get_memory_info)(device, &mut memory)
        })?;
        Ok(memory.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockLibrary, MockLoader};
    use crate::platform::probe::VramProber;
    use crate::platform::traits::LibraryLoader;
    use std::cell::RefCell;

    const EIGHT_GB: u64 = 8 * 1024 * 1024 * 1024;

    struct FakeDriver {
        init_status: NvmlReturn,
        handle_status: NvmlReturn,
        memory_status: NvmlReturn,
        total: u64,
        init_calls: usize,
        shutdown_calls: usize,
        requested_index: Option<c_uint>,
    }

    impl Default for FakeDriver {
        fn default() -> Self {
            Self {
                init_status: NVML_SUCCESS,
                handle_status: NVML_SUCCESS,
                memory_status: NVML_SUCCESS,
                total: EIGHT_GB,
                init_calls: 0,
                shutdown_calls: 0,
                requested_index: None,
            }
        }
    }

    thread_local! {
        static DRIVER: RefCell<FakeDriver> = RefCell::new(FakeDriver::default());
    }

    fn configure(f: impl FnOnce(&mut FakeDriver)) {
        DRIVER.with(|d| f(&mut d.borrow_mut()));
    }

    fn driver<T>(f: impl FnOnce(&FakeDriver) -> T) -> T {
        DRIVER.with(|d| f(&d.borrow()))
    }

    unsafe extern "C" fn fake_init() -> NvmlReturn {
        DRIVER.with(|d| {
            let mut d = d.borrow_mut();
            d.init_calls += 1;
            d.init_status
        })
    }

    unsafe extern "C" fn fake_shutdown() -> NvmlReturn {
        configure(|d| d.shutdown_calls += 1);
        NVML_SUCCESS
    }

    unsafe extern "C" fn fake_get_handle(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
        configure(|d| d.requested_index = Some(index));
        let status = driver(|d| d.handle_status);
        if status == NVML_SUCCESS {
            *device = NvmlDevice(0x1000 as *mut c_void);
        }
        status
    }

    unsafe extern "C" fn fake_memory_info(device: NvmlDevice, memory: *mut NvmlMemory) -> NvmlReturn {
        if device.0 as usize != 0x1000 {
            return 2;
        }
        let (status, total) = driver(|d| (d.memory_status, d.total));
        if status == NVML_SUCCESS {
            *memory = NvmlMemory {
                total,
                free: total / 2,
                used: total / 2,
            };
        }
        status
    }

    fn nvml_library(name: &str) -> MockLibrary {
        MockLibrary::new(name)
            .with_symbol("nvmlInit", fake_init as FnNvmlInit as *const c_void)
            .with_symbol("nvmlShutdown", fake_shutdown as FnNvmlShutdown as *const c_void)
            .with_symbol(
                "nvmlDeviceGetHandleByIndex",
                fake_get_handle as FnNvmlDeviceGetHandleByIndex as *const c_void,
            )
            .with_symbol(
                "nvmlDeviceGetMemoryInfo",
                fake_memory_info as FnNvmlDeviceGetMemoryInfo as *const c_void,
            )
    }

    fn assert_balanced(loader: &MockLoader) {
        let stats = loader.stats();
        assert_eq!(stats.loads(), stats.unloads());
    }

    #[test]
    fn test_reports_total_bytes() {
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(prober.vram_size(), 8_589_934_592);
        assert_eq!(driver(|d| d.requested_index), Some(0));
        assert_eq!(driver(|d| d.shutdown_calls), 1);
        assert_eq!(loader.stats().unloads(), 1);
    }

    #[test]
    fn test_falls_back_to_unversioned_name() {
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(prober.vram_size(), EIGHT_GB);
        assert_eq!(
            loader.stats().attempts(),
            vec!["libnvidia-ml.so.1", "libnvidia-ml.so"]
        );
        assert_eq!(loader.stats().loads(), 1);
        assert_balanced(&loader);
    }

    #[test]
    fn test_no_library_means_no_unloads() {
        let loader = MockLoader::new();
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(prober.vram_size(), 0);
        assert_eq!(loader.stats().loads(), 0);
        assert_eq!(loader.stats().unloads(), 0);
        assert_eq!(driver(|d| d.init_calls), 0);
    }

    #[test]
    fn test_each_missing_symbol_returns_zero() {
        for symbol in [
            "nvmlInit",
            "nvmlShutdown",
            "nvmlDeviceGetHandleByIndex",
            "nvmlDeviceGetMemoryInfo",
        ] {
            let loader = MockLoader::new()
                .with_library(nvml_library("libnvidia-ml.so.1").without_symbol(symbol));
            let prober = VramProber::<Nvml, _>::with_loader(&loader);

            assert_eq!(prober.try_probe(), Err(ProbeError::MissingSymbol(symbol)));
            assert_eq!(prober.vram_size(), 0);
            assert_eq!(loader.stats().loads(), 2);
            assert_balanced(&loader);
        }
        assert_eq!(driver(|d| d.init_calls), 0);
    }

    #[test]
    fn test_init_failure_does_not_shut_down() {
        configure(|d| d.init_status = 9); // NVML_ERROR_DRIVER_NOT_LOADED
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(prober.vram_size(), 0);
        assert_eq!(driver(|d| d.init_calls), 1);
        assert_eq!(driver(|d| d.shutdown_calls), 0);
        assert_eq!(loader.stats().unloads(), 1);
    }

    #[test]
    fn test_handle_failure_shuts_down() {
        configure(|d| d.handle_status = 2); // NVML_ERROR_INVALID_ARGUMENT
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(
            prober.try_probe(),
            Err(ProbeError::VendorStatus {
                call: "nvmlDeviceGetHandleByIndex",
                code: 2
            })
        );
        assert_eq!(driver(|d| d.shutdown_calls), 1);
        assert_balanced(&loader);
    }

    #[test]
    fn test_memory_failure_shuts_down() {
        configure(|d| d.memory_status = 999); // NVML_ERROR_UNKNOWN
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        assert_eq!(prober.vram_size(), 0);
        assert_eq!(driver(|d| d.shutdown_calls), 1);
        assert_eq!(loader.stats().unloads(), 1);
    }

    #[test]
    fn test_table_calls_through_while_library_loaded() {
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let library = loader.open("libnvidia-ml.so.1").unwrap();

        let table = Nvml::resolve(&library).unwrap();
        assert_eq!(Nvml::init(&table), Ok(()));
        let device = Nvml::first_device(&table).unwrap();
        assert_eq!(Nvml::memory_units(&table, device, None), Ok(EIGHT_GB));
        Nvml::shutdown(&table);
        assert_eq!(loader.stats().unloads(), 0);

        drop(library);
        assert_eq!(loader.stats().unloads(), 1);
        assert_eq!(driver(|d| d.shutdown_calls), 1);
    }

    #[test]
    fn test_repeated_probes_are_independent() {
        let loader = MockLoader::new().with_library(nvml_library("libnvidia-ml.so.1"));
        let prober = VramProber::<Nvml, _>::with_loader(&loader);

        let first = prober.vram_size();
        let second = prober.vram_size();

        assert_eq!(first, second);
        assert_eq!(loader.stats().loads(), 2);
        assert_eq!(loader.stats().unloads(), 2);
        assert_eq!(driver(|d| d.init_calls), 2);
        assert_eq!(driver(|d| d.shutdown_calls), 2);
    }
}
