//! Linux Platform Support
//!
//! GPU memory is read through NVML, the NVIDIA Management Library shipped
//! with the proprietary driver. The library is loaded with `dlopen` at
//! query time, so the binary has no link-time dependency on the driver.
//!
//! ## Modules
//!
//! - **gpu**: NVML backend for the VRAM probe

pub mod gpu;

pub use gpu::{Nvml, NvmlMemory, NvmlTable};
