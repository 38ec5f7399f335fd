#![expect(
    unsafe_code,
    reason = "calls through function pointers resolved from libevdi"
)]

//! Version-dispatched connect entry point.
//!
//! All signature-specific logic is contained here; callers use the unified
//! five-argument surface regardless of which libevdi is installed. The
//! strategy is chosen exactly once, from the symbols the loader resolved,
//! and never changes afterwards — there is no per-call probing and no
//! fallback chain.

use std::os::raw::{c_int, c_uint};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use super::ffi::{ConnectCompatFn, ConnectLegacyFn, ConnectModernFn, RawEvdiHandle};
use super::loader::EvdiApi;
use super::version::LibVersion;
use crate::config::{AreaLimitPolicy, ConnectConfig};

/// Arguments for establishing a virtual display connection.
///
/// The EDID buffer is borrowed from the caller and forwarded as pointer
/// plus length; it is never inspected, validated, or retained here.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    /// EDID bytes describing the virtual display.
    pub edid: &'a [u8],
    /// Maximum permitted pixel area (width × height). Forwarded verbatim;
    /// interpretation is the driver's. Dropped on the legacy path.
    pub pixel_area_limit: u32,
    /// Maximum permitted pixel rate (area × refresh).
    pub pixel_per_second_limit: u32,
}

impl<'a> ConnectParams<'a> {
    /// Build params with explicit limits.
    pub fn new(edid: &'a [u8], pixel_area_limit: u32, pixel_per_second_limit: u32) -> Self {
        Self {
            edid,
            pixel_area_limit,
            pixel_per_second_limit,
        }
    }

    /// Build params with the limits configured in `[connect]`.
    pub fn from_config(config: &ConnectConfig, edid: &'a [u8]) -> Self {
        Self::new(
            edid,
            config.pixel_area_limit,
            config.pixel_per_second_limit,
        )
    }
}

/// Connect symbols the loader resolved from the library.
///
/// At most one of `modern` / `legacy` is populated — the loader resolves
/// `evdi_connect` with the signature matching the detected version.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConnectSymbols {
    /// The library's own unified compat entry point, when exported.
    pub native_compat: Option<ConnectCompatFn>,
    /// Five-argument `evdi_connect` (1.12+).
    pub modern: Option<ConnectModernFn>,
    /// Four-argument `evdi_connect` (pre-1.12).
    pub legacy: Option<ConnectLegacyFn>,
}

/// The selected connect strategy.
///
/// Polymorphic over the two library generations plus the native compat
/// form; carries the resolved entry point so dispatch is a single
/// indirect call.
#[derive(Debug, Clone, Copy)]
pub enum ConnectDispatch {
    /// The library exports its own unified compat entry point. Used as-is;
    /// no adaptation on this side.
    NativeCompat(ConnectCompatFn),
    /// 1.12+ five-argument connect; all arguments forwarded.
    Modern(ConnectModernFn),
    /// Pre-1.12 four-argument connect; the pixel-area limit is dropped.
    Legacy(ConnectLegacyFn),
}

impl ConnectDispatch {
    /// Pick the strategy from the resolved symbols.
    ///
    /// A native compat entry point always wins — when the library already
    /// ships the unified form, this crate's own adaptation must not engage.
    pub(crate) fn select(symbols: ConnectSymbols) -> Option<Self> {
        if let Some(f) = symbols.native_compat {
            return Some(Self::NativeCompat(f));
        }
        if let Some(f) = symbols.modern {
            return Some(Self::Modern(f));
        }
        symbols.legacy.map(Self::Legacy)
    }

    /// Whether the pixel-area limit reaches the library on this path.
    pub fn supports_area_limit(&self) -> bool {
        matches!(self, Self::NativeCompat(_) | Self::Modern(_))
    }

    /// Forward a connect call to the native entry point.
    ///
    /// Argument values are passed through unaltered, in the native
    /// parameter order; the return value comes back uninterpreted. On the
    /// legacy path the pixel-area limit is not forwarded.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle obtained from the same library the
    /// dispatch was resolved from, and `params.edid` must stay valid for
    /// the duration of the call.
    pub unsafe fn connect(&self, handle: RawEvdiHandle, params: &ConnectParams<'_>) -> c_int {
        let edid = params.edid.as_ptr();
        let edid_length = params.edid.len() as c_uint;
        match *self {
            Self::NativeCompat(f) | Self::Modern(f) => unsafe {
                f(
                    handle,
                    edid,
                    edid_length,
                    params.pixel_area_limit,
                    params.pixel_per_second_limit,
                )
            },
            Self::Legacy(f) => unsafe {
                f(handle, edid, edid_length, params.pixel_per_second_limit)
            },
        }
    }
}

/// Connect-time policy failures.
///
/// Native connect status values are not errors of this crate — they pass
/// through as the successful return value.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The installed library predates the pixel-area limit parameter and
    /// the configured policy rejects the downgrade.
    #[error(
        "libevdi {installed} does not accept a pixel-area limit (requested {requested}); \
         requires libevdi 1.12 or a native compat entry point"
    )]
    AreaLimitUnsupported {
        /// Version of the installed library.
        installed: LibVersion,
        /// The limit the caller asked for.
        requested: u32,
    },
}

/// Safe connect wrapper applying the configured downgrade policy.
pub struct EvdiConnector {
    api: Arc<EvdiApi>,
    policy: AreaLimitPolicy,
}

impl EvdiConnector {
    /// Wrap a loaded library with an explicit policy.
    pub fn new(api: Arc<EvdiApi>, policy: AreaLimitPolicy) -> Self {
        Self { api, policy }
    }

    /// Wrap a loaded library with the policy from `[connect]`.
    pub fn from_config(api: Arc<EvdiApi>, config: &ConnectConfig) -> Self {
        Self::new(api, config.on_unsupported_area_limit)
    }

    /// The capability report of the wrapped library.
    pub fn capabilities(&self) -> &super::loader::EvdiCapabilities {
        self.api.capabilities()
    }

    /// Establish a virtual display connection.
    ///
    /// When the installed library cannot honor a non-zero pixel-area limit,
    /// the downgrade is surfaced before the native call: logged under the
    /// default `warn` policy, or returned as
    /// [`ConnectError::AreaLimitUnsupported`] under `reject`.
    ///
    /// # Safety
    ///
    /// Same contract as [`ConnectDispatch::connect`]: `handle` must be a
    /// live handle from the wrapped library, `params.edid` valid for read.
    pub unsafe fn connect(
        &self,
        handle: RawEvdiHandle,
        params: &ConnectParams<'_>,
    ) -> Result<c_int, ConnectError> {
        let dispatch = self.api.dispatch();
        if params.pixel_area_limit != 0 && !dispatch.supports_area_limit() {
            let installed = self.api.capabilities().version;
            match self.policy {
                AreaLimitPolicy::Reject => {
                    return Err(ConnectError::AreaLimitUnsupported {
                        installed,
                        requested: params.pixel_area_limit,
                    });
                }
                AreaLimitPolicy::Warn => {
                    warn!(
                        requested = params.pixel_area_limit,
                        %installed,
                        "installed libevdi does not accept a pixel-area limit; connecting without it"
                    );
                }
            }
        }
        Ok(unsafe { dispatch.connect(handle, params) })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::os::raw::c_uchar;

    use super::*;

    const EDID: &[u8] = &[0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x4c, 0x2d];

    thread_local! {
        static FIVE_ARG_CALLS: RefCell<Vec<(usize, Vec<u8>, u32, u32, u32)>> =
            RefCell::new(Vec::new());
        static FOUR_ARG_CALLS: RefCell<Vec<(usize, Vec<u8>, u32, u32)>> =
            RefCell::new(Vec::new());
    }

    extern "C" fn five_arg_stub(
        handle: RawEvdiHandle,
        edid: *const c_uchar,
        edid_length: c_uint,
        pixel_area_limit: u32,
        pixel_per_second_limit: u32,
    ) -> c_int {
        let bytes = unsafe { std::slice::from_raw_parts(edid, edid_length as usize) }.to_vec();
        FIVE_ARG_CALLS.with(|calls| {
            calls.borrow_mut().push((
                handle as usize,
                bytes,
                edid_length,
                pixel_area_limit,
                pixel_per_second_limit,
            ));
        });
        42
    }

    extern "C" fn four_arg_stub(
        handle: RawEvdiHandle,
        edid: *const c_uchar,
        edid_length: c_uint,
        pixel_per_second_limit: u32,
    ) -> c_int {
        let bytes = unsafe { std::slice::from_raw_parts(edid, edid_length as usize) }.to_vec();
        FOUR_ARG_CALLS.with(|calls| {
            calls.borrow_mut().push((
                handle as usize,
                bytes,
                edid_length,
                pixel_per_second_limit,
            ));
        });
        -7
    }

    fn handle() -> RawEvdiHandle {
        0xE0D1 as RawEvdiHandle
    }

    fn modern_symbols() -> ConnectSymbols {
        ConnectSymbols {
            modern: Some(five_arg_stub as ConnectModernFn),
            ..Default::default()
        }
    }

    fn legacy_symbols() -> ConnectSymbols {
        ConnectSymbols {
            legacy: Some(four_arg_stub as ConnectLegacyFn),
            ..Default::default()
        }
    }

    #[test]
    fn modern_path_forwards_all_five_arguments_in_order() {
        let dispatch = ConnectDispatch::select(modern_symbols()).unwrap();
        let params = ConnectParams::new(EDID, 1000, 60);

        let ret = unsafe { dispatch.connect(handle(), &params) };

        assert_eq!(ret, 42);
        FIVE_ARG_CALLS.with(|calls| {
            let calls = calls.borrow();
            assert_eq!(calls.len(), 1);
            let (h, edid, len, area, pps) = &calls[0];
            assert_eq!(*h, 0xE0D1);
            assert_eq!(edid, EDID);
            assert_eq!(*len, EDID.len() as u32);
            assert_eq!(*area, 1000);
            assert_eq!(*pps, 60);
        });
    }

    #[test]
    fn legacy_path_drops_the_area_limit() {
        let dispatch = ConnectDispatch::select(legacy_symbols()).unwrap();
        assert!(!dispatch.supports_area_limit());
        let params = ConnectParams::new(EDID, 1000, 60);

        let ret = unsafe { dispatch.connect(handle(), &params) };

        assert_eq!(ret, -7);
        FOUR_ARG_CALLS.with(|calls| {
            let calls = calls.borrow();
            assert_eq!(calls.len(), 1);
            let (h, edid, len, pps) = &calls[0];
            assert_eq!(*h, 0xE0D1);
            assert_eq!(edid, EDID);
            assert_eq!(*len, EDID.len() as u32);
            // The area limit (1000) must not appear anywhere in the call.
            assert_eq!(*pps, 60);
        });
    }

    #[test]
    fn native_compat_wins_over_both_generations() {
        let symbols = ConnectSymbols {
            native_compat: Some(five_arg_stub as ConnectCompatFn),
            modern: Some(five_arg_stub as ConnectModernFn),
            legacy: Some(four_arg_stub as ConnectLegacyFn),
        };
        let dispatch = ConnectDispatch::select(symbols).unwrap();
        assert!(matches!(dispatch, ConnectDispatch::NativeCompat(_)));
        assert!(dispatch.supports_area_limit());
    }

    #[test]
    fn no_symbols_selects_nothing() {
        assert!(ConnectDispatch::select(ConnectSymbols::default()).is_none());
    }

    #[test]
    fn return_value_passes_through_unchanged_on_both_paths() {
        let modern = ConnectDispatch::select(modern_symbols()).unwrap();
        let legacy = ConnectDispatch::select(legacy_symbols()).unwrap();
        let params = ConnectParams::new(EDID, 0, 0);

        assert_eq!(unsafe { modern.connect(handle(), &params) }, 42);
        assert_eq!(unsafe { legacy.connect(handle(), &params) }, -7);
    }

    #[test]
    fn reject_policy_fails_before_the_native_call() {
        let dispatch = ConnectDispatch::select(legacy_symbols()).unwrap();
        let api = Arc::new(EvdiApi::for_tests(
            dispatch,
            LibVersion {
                major: 1,
                minor: 11,
                patch: 0,
            },
        ));
        let connector = EvdiConnector::new(api, AreaLimitPolicy::Reject);
        let params = ConnectParams::new(EDID, 8_294_400, 497_664_000);

        let err = unsafe { connector.connect(handle(), &params) }.unwrap_err();

        assert!(matches!(
            err,
            ConnectError::AreaLimitUnsupported {
                requested: 8_294_400,
                ..
            }
        ));
        FOUR_ARG_CALLS.with(|calls| assert!(calls.borrow().is_empty()));
    }

    #[test]
    fn warn_policy_still_connects_on_the_legacy_path() {
        let dispatch = ConnectDispatch::select(legacy_symbols()).unwrap();
        let api = Arc::new(EvdiApi::for_tests(
            dispatch,
            LibVersion {
                major: 1,
                minor: 10,
                patch: 2,
            },
        ));
        let connector = EvdiConnector::new(api, AreaLimitPolicy::Warn);
        let params = ConnectParams::new(EDID, 1000, 60);

        let ret = unsafe { connector.connect(handle(), &params) }.unwrap();

        assert_eq!(ret, -7);
        FOUR_ARG_CALLS.with(|calls| assert_eq!(calls.borrow().len(), 1));
    }

    #[test]
    fn zero_area_limit_never_triggers_the_policy() {
        let dispatch = ConnectDispatch::select(legacy_symbols()).unwrap();
        let api = Arc::new(EvdiApi::for_tests(
            dispatch,
            LibVersion {
                major: 1,
                minor: 9,
                patch: 0,
            },
        ));
        let connector = EvdiConnector::new(api, AreaLimitPolicy::Reject);
        let params = ConnectParams::new(EDID, 0, 60);

        assert!(unsafe { connector.connect(handle(), &params) }.is_ok());
    }
}
