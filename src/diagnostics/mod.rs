//! System diagnostics for the EVDI stack.
//!
//! Gathers a point-in-time report of everything a connection depends on:
//! the `evdi` kernel module, the DRM device nodes, and the userspace
//! library with its detected connect capabilities. Rendered as human
//! text or serialized to JSON for machine consumption.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::evdi::ffi::DEVICE_STATUS_AVAILABLE;
use crate::evdi::loader::{load_libevdi, EvdiApi, EvdiCapabilities};

/// State of the `evdi` kernel module.
#[derive(Debug, Clone, Serialize)]
pub struct KernelModuleStatus {
    /// Whether `/sys/module/evdi` exists.
    pub loaded: bool,
    /// Module version as reported by sysfs, when available.
    pub version: Option<String>,
}

/// Point-in-time report of the EVDI stack.
#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    /// When the report was gathered.
    pub probed_at: DateTime<Utc>,
    /// Kernel module state.
    pub kernel_module: KernelModuleStatus,
    /// All DRM card nodes under `/dev/dri`.
    pub device_nodes: Vec<String>,
    /// Card indices the library recognizes as EVDI devices.
    pub evdi_devices: Vec<i32>,
    /// Library capabilities when the load succeeded.
    pub library: Option<EvdiCapabilities>,
    /// Load failure when it did not.
    pub library_error: Option<String>,
    /// Non-fatal capability reductions, in probe order.
    pub degradations: Vec<String>,
}

impl SystemReport {
    /// Probe the kernel module, device nodes, and library.
    pub fn gather(config: &Config) -> Self {
        let kernel_module = probe_kernel_module();
        let device_nodes = probe_device_nodes();

        let (library, library_error) = match load_libevdi(&config.library) {
            Ok(api) => {
                let evdi_devices = recognized_devices(&api, &device_nodes);
                let caps = api.capabilities().clone();
                return Self::assemble(
                    kernel_module,
                    device_nodes,
                    evdi_devices,
                    Some(caps),
                    None,
                );
            }
            Err(e) => (None, Some(e.to_string())),
        };

        Self::assemble(kernel_module, device_nodes, Vec::new(), library, library_error)
    }

    fn assemble(
        kernel_module: KernelModuleStatus,
        device_nodes: Vec<String>,
        evdi_devices: Vec<i32>,
        library: Option<EvdiCapabilities>,
        library_error: Option<String>,
    ) -> Self {
        let degradations =
            compute_degradations(&kernel_module, library.as_ref(), library_error.as_deref());
        Self {
            probed_at: Utc::now(),
            kernel_module,
            device_nodes,
            evdi_devices,
            library,
            library_error,
            degradations,
        }
    }

    /// Whether a connection could be established right now.
    pub fn usable(&self) -> bool {
        self.kernel_module.loaded && self.library.is_some()
    }
}

impl std::fmt::Display for SystemReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "EVDI stack report ({})", self.probed_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        match (&self.kernel_module.loaded, &self.kernel_module.version) {
            (true, Some(v)) => writeln!(f, "  kernel module: loaded (v{v})")?,
            (true, None) => writeln!(f, "  kernel module: loaded")?,
            (false, _) => writeln!(f, "  kernel module: not loaded")?,
        }
        if self.device_nodes.is_empty() {
            writeln!(f, "  device nodes:  none")?;
        } else {
            writeln!(f, "  device nodes:  {}", self.device_nodes.join(", "))?;
        }
        if !self.evdi_devices.is_empty() {
            let cards: Vec<String> = self.evdi_devices.iter().map(|i| format!("card{i}")).collect();
            writeln!(f, "  evdi devices:  {}", cards.join(", "))?;
        }
        match (&self.library, &self.library_error) {
            (Some(caps), _) => writeln!(f, "  library:       {caps}")?,
            (None, Some(e)) => writeln!(f, "  library:       unavailable ({e})")?,
            (None, None) => writeln!(f, "  library:       not probed")?,
        }
        if self.degradations.is_empty() {
            writeln!(f, "  degradations:  none")?;
        } else {
            writeln!(f, "  degradations:")?;
            for d in &self.degradations {
                writeln!(f, "    - {d}")?;
            }
        }
        Ok(())
    }
}

fn probe_kernel_module() -> KernelModuleStatus {
    let loaded = std::path::Path::new("/sys/module/evdi").exists();
    let version = std::fs::read_to_string("/sys/module/evdi/version")
        .ok()
        .map(|v| v.trim().to_string());
    KernelModuleStatus { loaded, version }
}

fn probe_device_nodes() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev/dri") else {
        return Vec::new();
    };
    let mut nodes: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|n| n.starts_with("card"))
        .collect();
    nodes.sort();
    nodes
}

/// Ask the library which card nodes are EVDI devices.
fn recognized_devices(api: &EvdiApi, nodes: &[String]) -> Vec<i32> {
    let mut recognized = Vec::new();
    for node in nodes {
        let Some(index) = node.strip_prefix("card").and_then(|n| n.parse::<i32>().ok()) else {
            continue;
        };
        match api.check_device(index) {
            Some(DEVICE_STATUS_AVAILABLE) => recognized.push(index),
            Some(status) => debug!("card{index}: not an EVDI node (status {status})"),
            None => break, // library predates evdi_check_device
        }
    }
    recognized
}

fn compute_degradations(
    module: &KernelModuleStatus,
    library: Option<&EvdiCapabilities>,
    library_error: Option<&str>,
) -> Vec<String> {
    let mut degradations = Vec::new();
    if !module.loaded {
        degradations
            .push("evdi kernel module not loaded — run `modprobe evdi` or install the DKMS package".to_string());
    }
    if let Some(e) = library_error {
        degradations.push(format!("libevdi unavailable: {e}"));
    }
    if let Some(caps) = library {
        if !caps.supports_area_limit {
            degradations.push(format!(
                "pixel-area limit unsupported by libevdi {} — connections are capped by pixel rate only",
                caps.version
            ));
        }
    }
    degradations
}
