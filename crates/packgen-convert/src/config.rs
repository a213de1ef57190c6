//! Converter configuration
//!
//! Read from an optional `packgen.yaml` next to the manifests:
//!
//! ```yaml
//! pack:
//!   name: shop
//!   version: 0.3.0
//! classifier:
//!   sizeThreshold: 2048
//!   lineThreshold: 40
//! store:
//!   directory: files
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use packgen_core::PackMetadata;

use crate::error::{ConvertError, Result};
use crate::naming::sanitize_segment;

/// File name looked up by [`ConvertConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "packgen.yaml";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertConfig {
    #[serde(default)]
    pub pack: PackConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Dispatch resources on a worker pool
    #[serde(default = "default_true")]
    pub parallel: bool,
}

/// Identity of the generated pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_pack_version")]
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            name: None,
            version: default_pack_version(),
            description: None,
            app_version: None,
        }
    }
}

/// Thresholds for inline-vs-external placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Payloads longer than this many bytes are externalized
    #[serde(default = "default_size_threshold")]
    pub size_threshold: usize,

    /// Payloads with more lines than this are externalized
    #[serde(default = "default_line_threshold")]
    pub line_threshold: usize,

    /// Share of non-printable bytes above which a payload is binary
    #[serde(default = "default_binary_ratio")]
    pub binary_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            size_threshold: default_size_threshold(),
            line_threshold: default_line_threshold(),
            binary_ratio: default_binary_ratio(),
        }
    }
}

/// External file store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Relative directory inside the pack holding externalized content
    #[serde(default = "default_store_directory")]
    pub directory: String,

    /// Extra attempts after a failed write
    #[serde(default = "default_persist_retries")]
    pub persist_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
            persist_retries: default_persist_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pack_version() -> String {
    "0.1.0".to_string()
}

fn default_size_threshold() -> usize {
    1024
}

fn default_line_threshold() -> usize {
    20
}

fn default_binary_ratio() -> f64 {
    0.3
}

fn default_store_directory() -> String {
    "files".to_string()
}

fn default_persist_retries() -> u32 {
    2
}

impl ConvertConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `packgen.yaml` from `dir` if present, defaults otherwise
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = Self::default_path(dir);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading configuration");
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Pack identity from the `pack` section
    ///
    /// Without a configured name, `fallback` (usually the input directory
    /// name) is turned into a valid pack name.
    pub fn pack_metadata(&self, fallback: &str) -> Result<PackMetadata> {
        let name = match &self.pack.name {
            Some(name) => name.clone(),
            None => sanitize_segment(fallback)
                .replace(['.', '_'], "-")
                .trim_matches('-')
                .to_string(),
        };
        let mut metadata = PackMetadata::with_version_str(name, &self.pack.version)?;
        metadata.description = self.pack.description.clone();
        metadata.app_version = self.pack.app_version.clone();
        metadata.validate()?;
        Ok(metadata)
    }

    /// Location of the config file for a manifest directory
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    /// Reject settings the classifier and store cannot work with
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = semver::Version::parse(&self.pack.version) {
            return Err(ConvertError::InvalidConfig(format!(
                "pack.version '{}' is not SemVer: {}",
                self.pack.version, e
            )));
        }
        if !(0.0..=1.0).contains(&self.classifier.binary_ratio) {
            return Err(ConvertError::InvalidConfig(format!(
                "classifier.binaryRatio must be within 0..1, got {}",
                self.classifier.binary_ratio
            )));
        }
        if self.classifier.line_threshold == 0 {
            return Err(ConvertError::InvalidConfig(
                "classifier.lineThreshold must be at least 1".to_string(),
            ));
        }
        let dir = &self.store.directory;
        if dir.is_empty() || dir.starts_with('/') || dir.split('/').any(|s| s == "..") {
            return Err(ConvertError::InvalidConfig(format!(
                "store.directory must be a relative path inside the pack, got '{}'",
                dir
            )));
        }
        Ok(())
    }
}
