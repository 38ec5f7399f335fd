//! # lamco-evdi
//!
//! Version-adaptive connection layer for EVDI virtual displays.
//!
//! libevdi broke its `evdi_connect` signature in 1.12 (a pixel-area limit
//! parameter was added). This crate hides the break behind one stable
//! five-argument surface: the installed library is loaded dynamically, its
//! version is detected once at initialization, and one of two connect
//! strategies is selected — no preprocessor conditionals, no rebuild per
//! library version.
//!
//! # Architecture
//!
//! ```text
//! lamco-evdi
//!   ├─> Loader (locate libevdi.so, query version, resolve symbols)
//!   ├─> Connect Dispatch (LegacyConnect / ModernConnect / NativeCompat,
//!   │                     chosen once at load)
//!   ├─> Connector (safe wrapper, area-limit downgrade policy)
//!   └─> Diagnostics (kernel module, device nodes, capability report)
//! ```
//!
//! The caller owns the device handle and the EDID buffer for their entire
//! lifetime; this crate only forwards them, unaltered and uninspected, to
//! the native connect entry point and passes the result back untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Layered configuration (TOML file, environment, CLI overrides)
pub mod config;

/// EVDI stack diagnostics: kernel module, device nodes, library report
pub mod diagnostics;

/// Version-aware libevdi FFI abstraction layer
pub mod evdi;

pub use config::{AreaLimitPolicy, Config};
pub use diagnostics::SystemReport;
pub use evdi::{
    load_libevdi, ConnectError, ConnectGeneration, ConnectParams, EvdiApi, EvdiCapabilities,
    EvdiConnector, LibVersion, LoadError, MODERN_CONNECT_MIN,
};
