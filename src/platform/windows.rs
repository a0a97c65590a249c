//! Windows GPU memory via NVAPI
//!
//! Loads NVIDIA's NVAPI runtime (`nvapi64.dll`, falling back to the 32-bit
//! `nvapi.dll` name) and reads the dedicated video memory of the first
//! physical GPU.
//!
//! Entry points are looked up by export name first. Driver builds that only
//! export `nvapi_QueryInterface` are handled by asking it for each function
//! by interface id.
//!
//! NVAPI reports memory in kilobytes; the probe multiplies by 1024.

use std::ffi::{c_int, c_uint, c_void};
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use crate::platform::loader::{cast_symbol, resolve_fn};
use crate::platform::traits::{
    DynamicLibrary, ProbeError, ProbeResult, VariantConfig, VendorBackend,
};

/// NVAPI status code (`NvAPI_Status`).
pub type NvApiStatus = c_int;

/// Opaque physical GPU handle (`NvPhysicalGpuHandle`).
///
/// Only the driver hands these out.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvPhysicalGpuHandle(*mut c_void);

pub const NVAPI_OK: NvApiStatus = 0;

/// Size of the handle array `NvAPI_EnumPhysicalGPUs` fills.
pub const NVAPI_MAX_PHYSICAL_GPUS: usize = 64;

/// `NV_DISPLAY_DRIVER_MEMORY_INFO`, counters in kilobytes.
///
/// Padded to the 0x28 bytes announced by [`NV_DISPLAY_DRIVER_MEMORY_INFO_VER`]
/// so the driver never writes past the buffer it is handed.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NvDisplayDriverMemoryInfo {
    pub version: u32,
    pub dedicated_video_memory: u32,
    pub available_dedicated_video_memory: u32,
    pub system_video_memory: u32,
    pub shared_system_memory: u32,
    reserved: [u32; 5],
}

/// Struct size in the low 16 bits, revision 1 in the high bits.
pub const NV_DISPLAY_DRIVER_MEMORY_INFO_VER: u32 =
    mem::size_of::<NvDisplayDriverMemoryInfo>() as u32 | (1 << 16);

const _: () = assert!(NV_DISPLAY_DRIVER_MEMORY_INFO_VER == 0x10028);

type FnNvApiInitialize = unsafe extern "C" fn() -> NvApiStatus;
type FnNvApiUnload = unsafe extern "C" fn() -> NvApiStatus;
type FnNvApiEnumPhysicalGpus =
    unsafe extern "C" fn(handles: *mut NvPhysicalGpuHandle, count: *mut u32) -> NvApiStatus;
type FnNvApiGpuGetMemoryInfo = unsafe extern "C" fn(
    handle: NvPhysicalGpuHandle,
    info: *mut NvDisplayDriverMemoryInfo,
) -> NvApiStatus;
type FnNvApiQueryInterface = unsafe extern "C" fn(id: c_uint) -> *mut c_void;

/// Interface ids understood by `nvapi_QueryInterface`.
mod interface_id {
    pub const INITIALIZE: u32 = 0x0150_E828;
    pub const UNLOAD: u32 = 0xD22B_DD7E;
    pub const ENUM_PHYSICAL_GPUS: u32 = 0xE5AC_921F;
    pub const GPU_GET_MEMORY_INFO: u32 = 0x07F9_B368;
}

/// Resolved NVAPI entry points, valid while the library is loaded.
#[derive(Debug, Clone, Copy)]
pub struct NvApiTable<'lib> {
    initialize: FnNvApiInitialize,
    unload: FnNvApiUnload,
    enum_physical_gpus: FnNvApiEnumPhysicalGpus,
    gpu_get_memory_info: FnNvApiGpuGetMemoryInfo,
    _library: PhantomData<&'lib ()>,
}

/// Look up `name` by export, then through `nvapi_QueryInterface`.
///
/// # Safety
///
/// `F` must match the signature of `name`, and `query` must come from
/// `library`.
unsafe fn lookup<F: Copy, D: DynamicLibrary>(
    library: &D,
    query: Option<FnNvApiQueryInterface>,
    name: &'static str,
    id: u32,
) -> ProbeResult<F> {
    if let Ok(f) = resolve_fn(library, name) {
        return Ok(f);
    }
    let address = query.map(|q| q(id)).unwrap_or(ptr::null_mut());
    if address.is_null() {
        return Err(ProbeError::MissingSymbol(name));
    }
    Ok(cast_symbol(address as *const c_void))
}

fn check(call: &'static str, code: NvApiStatus) -> ProbeResult<()> {
    if code == NVAPI_OK {
        Ok(())
    } else {
        Err(ProbeError::VendorStatus { call, code })
    }
}

/// NVAPI backend. Reports dedicated video memory of the first physical GPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvApi;

impl VendorBackend for NvApi {
    type Table<'lib> = NvApiTable<'lib>;
    type Device = NvPhysicalGpuHandle;

    const NAME: &'static str = "nvapi";
    const CONFIG: VariantConfig = VariantConfig {
        library_names: &["nvapi64.dll", "nvapi.dll"],
        unit_factor: 1024,
        struct_version: Some(NV_DISPLAY_DRIVER_MEMORY_INFO_VER),
    };

    fn resolve<'lib, D: DynamicLibrary>(library: &'lib D) -> ProbeResult<NvApiTable<'lib>> {
        // SAFETY: signatures follow nvapi.h; query interface ids map to the
        // same functions.
        unsafe {
            let query: Option<FnNvApiQueryInterface> =
                resolve_fn(library, "nvapi_QueryInterface").ok();
            Ok(NvApiTable {
                initialize: lookup(library, query, "NvAPI_Initialize", interface_id::INITIALIZE)?,
                enum_physical_gpus: lookup(
                    library,
                    query,
                    "NvAPI_EnumPhysicalGPUs",
                    interface_id::ENUM_PHYSICAL_GPUS,
                )?,
                gpu_get_memory_info: lookup(
                    library,
                    query,
                    "NvAPI_GPU_GetMemoryInfo",
                    interface_id::GPU_GET_MEMORY_INFO,
                )?,
                unload: lookup(library, query, "NvAPI_Unload", interface_id::UNLOAD)?,
                _library: PhantomData,
            })
        }
    }

    fn init(table: &NvApiTable<'_>) -> ProbeResult<()> {
        check("NvAPI_Initialize", unsafe { (table.initialize)() })
    }

    fn shutdown(table: &NvApiTable<'_>) {
        let _ = unsafe { (table.unload)() };
    }

    fn first_device(table: &NvApiTable<'_>) -> ProbeResult<NvPhysicalGpuHandle> {
        let mut handles = [NvPhysicalGpuHandle(ptr::null_mut()); NVAPI_MAX_PHYSICAL_GPUS];
        let mut count: u32 = 0;
        check("NvAPI_EnumPhysicalGPUs", unsafe {
            (table.enum_physical_gpus)(handles.as_mut_ptr(), &mut count)
        })?;
        if count == 0 {
            return Err(ProbeError::NoDevice);
        }
        Ok(handles[0])
    }

    fn memory_units(
        table: &NvApiTable<'_>,
        device: NvPhysicalGpuHandle,
        struct_version: Option<u32>,
    ) -> ProbeResult<u64> {
        let mut info = NvDisplayDriverMemoryInfo {
            version: struct_version.unwrap_or(NV_DISPLAY_DRIVER_MEMORY_INFO_VER),
            ..Default::default()
        };
        check("NvAPI_GPU_GetMemoryInfo", unsafe {
            (table.gpu_get_memory_info)(device, &mut info)
        })?;
        Ok(u64::from(info.dedicated_video_memory))
    }
}
