// Names and parameter order match the libevdi C API exactly — the loader
// resolves these symbols by name and casts to the aliases defined here.

//! Raw FFI surface for libevdi.
//!
//! Only the symbols the crate actually resolves are declared: the version
//! query, the two generations of the connect entry point, the optional
//! native compat entry point, and the device status probe used by
//! diagnostics. Everything else libevdi offers (device lifecycle, event
//! handling, framebuffer grabs) stays with the caller's own binding.

use std::os::raw::{c_int, c_uchar, c_uint};

/// Opaque device context allocated and owned by libevdi.
///
/// Never constructed or dereferenced on the Rust side.
#[repr(C)]
pub struct EvdiDeviceContext {
    _private: [u8; 0],
}

/// Raw connection handle (`evdi_handle`).
///
/// Caller-owned for its entire lifetime: this crate neither opens nor
/// closes it, it only forwards it to the native connect entry point.
pub type RawEvdiHandle = *mut EvdiDeviceContext;

/// Layout of `struct evdi_lib_version`. Stable across all libevdi releases.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EvdiLibVersion {
    /// Major version component.
    pub version_major: c_int,
    /// Minor version component.
    pub version_minor: c_int,
    /// Patchlevel version component.
    pub version_patchlevel: c_int,
}

/// Result of `evdi_check_device` (`enum evdi_device_status`).
pub type EvdiDeviceStatus = c_int;

/// The DRM node is an EVDI device.
pub const DEVICE_STATUS_AVAILABLE: EvdiDeviceStatus = 0;
/// The DRM node exists but is not an EVDI device.
pub const DEVICE_STATUS_UNRECOGNIZED: EvdiDeviceStatus = 1;
/// No DRM node with that index.
pub const DEVICE_STATUS_NOT_PRESENT: EvdiDeviceStatus = 2;

/// `evdi_get_lib_version` — fills the caller-provided struct.
pub type GetLibVersionFn = unsafe extern "C" fn(version: *mut EvdiLibVersion);

/// `evdi_connect`, libevdi 1.12+: five-argument form with the pixel-area
/// limit.
pub type ConnectModernFn = unsafe extern "C" fn(
    handle: RawEvdiHandle,
    edid: *const c_uchar,
    edid_length: c_uint,
    pixel_area_limit: u32,
    pixel_per_second_limit: u32,
) -> c_int;

/// `evdi_connect`, pre-1.12: four-argument form. No pixel-area limit.
pub type ConnectLegacyFn = unsafe extern "C" fn(
    handle: RawEvdiHandle,
    edid: *const c_uchar,
    edid_length: c_uint,
    pixel_per_second_limit: u32,
) -> c_int;

/// `evdi_connect_compat` — the unified five-argument entry point a library
/// build may export natively. Same shape as the modern connect.
pub type ConnectCompatFn = ConnectModernFn;

/// `evdi_check_device` — probes whether DRM card `device` is an EVDI node.
pub type CheckDeviceFn = unsafe extern "C" fn(device: c_int) -> EvdiDeviceStatus;
