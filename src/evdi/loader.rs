#![expect(
    unsafe_code,
    reason = "dlopen, dlsym, and raw FFI function pointer calls"
)]

//! libevdi loading with version detection.
//!
//! Loads the EVDI userspace library dynamically, queries its version via
//! `evdi_get_lib_version()`, and resolves the connect entry point with the
//! signature matching that version. When the library natively exports
//! `evdi_connect_compat`, that entry point is used directly and no
//! adaptation happens on this side.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::connect::{ConnectDispatch, ConnectSymbols};
use super::ffi::{
    CheckDeviceFn, ConnectCompatFn, ConnectLegacyFn, ConnectModernFn, EvdiDeviceStatus,
    EvdiLibVersion, GetLibVersionFn,
};
use super::version::{ConnectGeneration, LibVersion};
use crate::config::LibraryConfig;

/// Detected libevdi capabilities.
#[derive(Debug, Clone, Serialize)]
pub struct EvdiCapabilities {
    /// Version reported by `evdi_get_lib_version`.
    pub version: LibVersion,
    /// Which connect signature the library speaks.
    pub generation: ConnectGeneration,
    /// Whether the library exports its own compat entry point.
    pub native_compat: bool,
    /// Whether the pixel-area limit reaches the library.
    pub supports_area_limit: bool,
    /// Path the library was loaded from.
    pub library_path: String,
}

impl std::fmt::Display for EvdiCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "libevdi {} ({} connect{}) from {}",
            self.version,
            self.generation,
            if self.native_compat {
                ", native compat"
            } else {
                ""
            },
            self.library_path,
        )
    }
}

/// Failures while locating, loading, or resolving the library.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No usable `libevdi.so` anywhere in the search path.
    #[error("libevdi not found. {hint}")]
    NotFound {
        /// Actionable install hint for the detected environment.
        hint: String,
    },

    /// `dlopen` failed for a candidate path.
    #[error("failed to load {path}: {source}")]
    Open {
        /// The candidate library path.
        path: String,
        /// Underlying dlopen error.
        #[source]
        source: libloading::Error,
    },

    /// A required symbol is missing from the loaded library.
    #[error("symbol {name} missing from {path}: {source}")]
    Symbol {
        /// The symbol that failed to resolve.
        name: &'static str,
        /// The library it was expected in.
        path: String,
        /// Underlying dlsym error.
        #[source]
        source: libloading::Error,
    },
}

/// Resolved entry points from the loaded library.
pub struct EvdiApi {
    capabilities: EvdiCapabilities,
    dispatch: ConnectDispatch,
    check_device: Option<CheckDeviceFn>,
    // Keeps the dlopen handle alive as long as the resolved pointers.
    // None only in unit tests, where dispatch points at Rust stubs.
    _library: Option<libloading::Library>,
}

// The library handle and function pointers are safe to send between
// threads. The library remains loaded for the lifetime of the EvdiApi.
unsafe impl Send for EvdiApi {}
unsafe impl Sync for EvdiApi {}

impl EvdiApi {
    /// The capability report produced at load time.
    pub fn capabilities(&self) -> &EvdiCapabilities {
        &self.capabilities
    }

    /// The connect strategy selected at load time.
    pub fn dispatch(&self) -> &ConnectDispatch {
        &self.dispatch
    }

    /// Probe whether DRM card `device` is an EVDI node.
    ///
    /// Returns `None` when the loaded library predates
    /// `evdi_check_device`.
    pub fn check_device(&self, device: i32) -> Option<EvdiDeviceStatus> {
        self.check_device.map(|f| unsafe { f(device) })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(dispatch: ConnectDispatch, version: LibVersion) -> Self {
        Self {
            capabilities: EvdiCapabilities {
                version,
                generation: ConnectGeneration::classify(version),
                native_compat: false,
                supports_area_limit: dispatch.supports_area_limit(),
                library_path: "<test>".to_string(),
            },
            dispatch,
            check_device: None,
            _library: None,
        }
    }
}

/// Directories to scan for `libevdi.so*` at runtime.
const SEARCH_DIRS: &[&str] = &[
    // DisplayLink driver bundle
    "/opt/displaylink",
    // Debian/Ubuntu multiarch
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    // Fedora/RHEL
    "/usr/lib64",
    // Arch/generic
    "/usr/lib",
    "/usr/local/lib",
    "/usr/local/lib64",
];

/// Load libevdi, detect its version, and resolve the connect entry point.
///
/// Search order:
/// 1. `library.path` from configuration
/// 2. `EVDI_LIBRARY_PATH` environment variable
/// 3. `library.extra_search_dirs` from configuration
/// 4. Well-known directories (DisplayLink bundle, distro-specific)
/// 5. `LD_LIBRARY_PATH` directories
pub fn load_libevdi(config: &LibraryConfig) -> Result<EvdiApi, LoadError> {
    // Explicit paths fail hard on symbol errors but fall through the rest
    // of the search when the file cannot be opened at all.
    if let Some(configured) = &config.path {
        let path = configured.display().to_string();
        match try_load(&path) {
            Ok(api) => return Ok(api),
            Err(e) => {
                tracing::warn!("configured library.path {path} failed: {e}");
            }
        }
    }

    if let Ok(explicit_path) = std::env::var("EVDI_LIBRARY_PATH") {
        match try_load(&explicit_path) {
            Ok(api) => return Ok(api),
            Err(e) => {
                tracing::warn!("EVDI_LIBRARY_PATH={explicit_path} set but failed: {e}");
            }
        }
    }

    let extra = config
        .extra_search_dirs
        .iter()
        .map(|d| d.display().to_string());
    for dir in extra.chain(SEARCH_DIRS.iter().map(ToString::to_string)) {
        if let Some(lib_path) = find_libevdi_in_dir(&dir) {
            let path_str = lib_path.display().to_string();
            match try_load(&path_str) {
                Ok(api) => return Ok(api),
                Err(e) => {
                    debug!("found {path_str} but failed: {e}");
                }
            }
        }
    }

    if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
        for dir in ld_path.split(':') {
            if dir.is_empty() {
                continue;
            }
            if let Some(lib_path) = find_libevdi_in_dir(dir) {
                let path_str = lib_path.display().to_string();
                match try_load(&path_str) {
                    Ok(api) => return Ok(api),
                    Err(e) => {
                        debug!("found {path_str} in LD_LIBRARY_PATH but failed: {e}");
                    }
                }
            }
        }
    }

    Err(LoadError::NotFound {
        hint: "Install the DisplayLink driver or the evdi userspace library: \
               libevdi0 (Debian/Ubuntu), libevdi (Fedora), or evdi (Arch/AUR)."
            .to_string(),
    })
}

/// Scan a directory for `libevdi.so*` files.
fn find_libevdi_in_dir(dir: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("libevdi.so"))
        })
        .collect();

    pick_preferred(candidates)
}

/// Prefer the unversioned soname, then higher versions.
fn pick_preferred(mut candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.sort_by(|a, b| {
        let a_ver = soname_suffix(a);
        let b_ver = soname_suffix(b);
        match (a_ver.is_empty(), b_ver.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => b_ver.cmp(&a_ver),
        }
    });
    candidates.into_iter().next()
}

fn soname_suffix(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("libevdi.so."))
        .unwrap_or("")
        .to_string()
}

/// Load a specific library path, detect version, resolve symbols.
fn try_load(path: &str) -> Result<EvdiApi, LoadError> {
    // Safety: loading a system-managed driver library (distro package or
    // DisplayLink bundle), not an arbitrary blob.
    let lib = unsafe { libloading::Library::new(path) }.map_err(|e| LoadError::Open {
        path: path.to_string(),
        source: e,
    })?;

    // Resolve the version function first; everything else depends on it.
    let get_version: libloading::Symbol<'_, GetLibVersionFn> =
        unsafe { lib.get(b"evdi_get_lib_version\0") }.map_err(|e| LoadError::Symbol {
            name: "evdi_get_lib_version",
            path: path.to_string(),
            source: e,
        })?;

    let mut raw = EvdiLibVersion::default();
    unsafe { get_version(&mut raw) };
    let version = LibVersion::from(raw);
    let generation = ConnectGeneration::classify(version);

    // A library that ships its own compat entry point is used as-is.
    let native_compat: Option<ConnectCompatFn> =
        unsafe { lib.get::<ConnectCompatFn>(b"evdi_connect_compat\0") }
            .ok()
            .map(|s| *s);

    let mut symbols = ConnectSymbols {
        native_compat,
        ..Default::default()
    };
    match generation {
        ConnectGeneration::Modern => {
            let connect: libloading::Symbol<'_, ConnectModernFn> =
                unsafe { lib.get(b"evdi_connect\0") }.map_err(|e| LoadError::Symbol {
                    name: "evdi_connect",
                    path: path.to_string(),
                    source: e,
                })?;
            symbols.modern = Some(*connect);
        }
        ConnectGeneration::Legacy => {
            let connect: libloading::Symbol<'_, ConnectLegacyFn> =
                unsafe { lib.get(b"evdi_connect\0") }.map_err(|e| LoadError::Symbol {
                    name: "evdi_connect",
                    path: path.to_string(),
                    source: e,
                })?;
            symbols.legacy = Some(*connect);
        }
    }

    let dispatch = match ConnectDispatch::select(symbols) {
        Some(d) => d,
        // One of the match arms above resolved a connect symbol.
        None => unreachable!("connect symbol resolved above"),
    };

    // Optional, diagnostics only.
    let check_device: Option<CheckDeviceFn> = unsafe { lib.get::<CheckDeviceFn>(b"evdi_check_device\0") }
        .ok()
        .map(|s| *s);

    let capabilities = EvdiCapabilities {
        version,
        generation,
        native_compat: native_compat.is_some(),
        supports_area_limit: dispatch.supports_area_limit(),
        library_path: path.to_string(),
    };

    info!("Loaded {capabilities}");
    if !capabilities.supports_area_limit {
        debug!(
            "libevdi {version} predates the pixel-area limit; callers get the four-argument connect"
        );
    }

    Ok(EvdiApi {
        capabilities,
        dispatch,
        check_device,
        _library: Some(lib),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/usr/lib/{n}"))).collect()
    }

    #[test]
    fn unversioned_soname_is_preferred() {
        let picked = pick_preferred(paths(&["libevdi.so.1", "libevdi.so", "libevdi.so.2"]));
        assert_eq!(picked, Some(PathBuf::from("/usr/lib/libevdi.so")));
    }

    #[test]
    fn higher_soname_version_wins_when_no_unversioned() {
        let picked = pick_preferred(paths(&["libevdi.so.1", "libevdi.so.2"]));
        assert_eq!(picked, Some(PathBuf::from("/usr/lib/libevdi.so.2")));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        assert_eq!(pick_preferred(Vec::new()), None);
    }

    #[test]
    fn capabilities_display_names_the_generation() {
        let caps = EvdiCapabilities {
            version: LibVersion {
                major: 1,
                minor: 9,
                patch: 1,
            },
            generation: ConnectGeneration::Legacy,
            native_compat: false,
            supports_area_limit: false,
            library_path: "/usr/lib/libevdi.so.1".to_string(),
        };
        assert_eq!(
            caps.to_string(),
            "libevdi 1.9.1 (legacy connect) from /usr/lib/libevdi.so.1"
        );
    }
}
