//! Structured libevdi version and connect-generation classification.
//!
//! The connect signature changed in libevdi 1.12 (a pixel-area limit
//! parameter was added). The threshold lives here as an explicit constant
//! compared with ordinary `>=` — not hidden in build-system conditionals.

use serde::{Deserialize, Serialize};

use super::ffi::EvdiLibVersion;

/// First libevdi release with the five-argument connect.
pub const MODERN_CONNECT_MIN: LibVersion = LibVersion {
    major: 1,
    minor: 12,
    patch: 0,
};

/// A libevdi version triple with total ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibVersion {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
    /// Patchlevel version component.
    pub patch: u32,
}

impl std::fmt::Display for LibVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<EvdiLibVersion> for LibVersion {
    fn from(raw: EvdiLibVersion) -> Self {
        // The C struct uses plain ints; clamp nonsense negatives to zero.
        Self {
            major: raw.version_major.max(0) as u32,
            minor: raw.version_minor.max(0) as u32,
            patch: raw.version_patchlevel.max(0) as u32,
        }
    }
}

/// Which connect signature the installed library speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectGeneration {
    /// Pre-1.12 four-argument connect. The pixel-area limit is not
    /// accepted by the library.
    Legacy,
    /// 1.12+ five-argument connect.
    Modern,
}

impl ConnectGeneration {
    /// Classify a detected library version against [`MODERN_CONNECT_MIN`].
    pub fn classify(version: LibVersion) -> Self {
        if version >= MODERN_CONNECT_MIN {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

impl std::fmt::Display for ConnectGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Modern => write!(f, "modern"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u32, minor: u32, patch: u32) -> LibVersion {
        LibVersion {
            major,
            minor,
            patch,
        }
    }

    #[test]
    fn classify_threshold_edges() {
        assert_eq!(ConnectGeneration::classify(v(1, 11, 0)), ConnectGeneration::Legacy);
        assert_eq!(ConnectGeneration::classify(v(1, 11, 9)), ConnectGeneration::Legacy);
        assert_eq!(ConnectGeneration::classify(v(1, 12, 0)), ConnectGeneration::Modern);
        assert_eq!(ConnectGeneration::classify(v(1, 14, 1)), ConnectGeneration::Modern);
        assert_eq!(ConnectGeneration::classify(v(2, 0, 0)), ConnectGeneration::Modern);
        assert_eq!(ConnectGeneration::classify(v(0, 9, 0)), ConnectGeneration::Legacy);
    }

    #[test]
    fn version_ordering_is_lexicographic() {
        assert!(v(1, 11, 9) < v(1, 12, 0));
        assert!(v(2, 0, 0) > v(1, 14, 5));
        assert!(v(1, 12, 0) >= MODERN_CONNECT_MIN);
    }

    #[test]
    fn from_raw_clamps_negative_components() {
        let raw = EvdiLibVersion {
            version_major: 1,
            version_minor: -3,
            version_patchlevel: 2,
        };
        assert_eq!(LibVersion::from(raw), v(1, 0, 2));
    }

    #[test]
    fn display_formats_as_triple() {
        assert_eq!(v(1, 12, 0).to_string(), "1.12.0");
    }
}
