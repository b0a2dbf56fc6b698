//! Versioned JSON capture files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::capture::Capture;
use crate::metadata::Metadata;
use crate::settings::Settings;
use crate::trigger::TriggerSet;

/// Current capture file schema version.
pub const FORMAT_VERSION: u32 = 1;
/// Timestamp used when the clock cannot be formatted.
pub const DEFAULT_CAPTURED_AT: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid capture file JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported capture file version {found} (expected {})", FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
}

/// Tool metadata embedded in capture files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "sump".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A capture together with the configuration that produced it.
///
/// # Examples
/// ```
/// use sump_core::{Capture, CaptureFile, CaptureOrder, Settings, TriggerSet};
///
/// let capture = Capture::new(vec![1, 2, 3, 4], 1, CaptureOrder::Arrival);
/// let file = CaptureFile::new(Settings::default(), TriggerSet::default(), None, capture);
/// let json = file.to_json(false).unwrap();
/// let back = sump_core::CaptureFile::from_json(&json).unwrap();
/// assert_eq!(back.capture.arrival(), &[1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFile {
    /// Schema version (not the binary version).
    pub format_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 time the file was created.
    pub captured_at: String,
    pub settings: Settings,
    pub triggers: TriggerSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub capture: Capture,
}

impl CaptureFile {
    pub fn new(
        settings: Settings,
        triggers: TriggerSet,
        metadata: Option<Metadata>,
        capture: Capture,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            tool: ToolInfo::default(),
            captured_at: now_rfc3339(),
            settings,
            triggers,
            metadata,
            capture,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, StoreError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: CaptureFile = serde_json::from_str(json)?;
        if file.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: file.format_version,
            });
        }
        Ok(file)
    }

    /// Write the file, creating missing parent directories.
    pub fn save(&self, path: &Path, pretty: bool) -> Result<(), StoreError> {
        let json = self.to_json(pretty)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("capture saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| DEFAULT_CAPTURED_AT.to_string())
}
