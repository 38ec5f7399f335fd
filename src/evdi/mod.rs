//! Version-aware EVDI FFI abstraction layer.
//!
//! libevdi 1.12 changed the signature of `evdi_connect`, adding a
//! pixel-area limit parameter. A binary built against one set of headers
//! misbehaves against the other. This module loads the library
//! dynamically, detects the installed version via `evdi_get_lib_version()`,
//! and selects one of two connect strategies at load time — callers always
//! use the five-argument surface.
//!
//! When the installed library natively exports `evdi_connect_compat`, that
//! entry point takes precedence and no adaptation happens here.

pub mod connect;
pub mod ffi;
pub mod loader;
pub mod version;

pub use connect::{ConnectDispatch, ConnectError, ConnectParams, EvdiConnector};
pub use loader::{load_libevdi, EvdiApi, EvdiCapabilities, LoadError};
pub use version::{ConnectGeneration, LibVersion, MODERN_CONNECT_MIN};
