// Evhub Configuration
// Hub settings, loadable from a TOML file with sensible defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration parse errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),
}

/// Settings the hub is constructed with.
///
/// `keylayout_root` mirrors the platform's `ANDROID_ROOT`: layouts are
/// resolved at `<root>/usr/keylayout/<name>.kl`. When the variable is
/// unset the root is the empty string, so lookups resolve relative to the
/// current directory instead of dereferencing an absent environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Directory scanned and watched for device nodes
    pub device_dir: PathBuf,

    /// Root under which `usr/keylayout/*.kl` files live
    pub keylayout_root: PathBuf,

    /// Device names ignored during discovery
    pub excluded_devices: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            device_dir: PathBuf::from("/dev/input"),
            keylayout_root: std::env::var_os("ANDROID_ROOT")
                .map(PathBuf::from)
                .unwrap_or_default(),
            excluded_devices: Vec::new(),
        }
    }
}

impl HubConfig {
    /// Load from a TOML file. Missing keys fall back to the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlParse(e.to_string()))
    }

    /// Path of the layout file for a device name, with ASCII spaces
    /// replaced by underscores.
    pub fn keylayout_path(&self, device_name: &str) -> PathBuf {
        let mangled = device_name.replace(' ', "_");
        self.keylayout_root
            .join("usr")
            .join("keylayout")
            .join(format!("{}.kl", mangled))
    }

    /// Path of the fallback layout used when a device has no file of its
    /// own.
    pub fn default_keylayout_path(&self) -> PathBuf {
        self.keylayout_root
            .join("usr")
            .join("keylayout")
            .join("qwerty.kl")
    }
}
