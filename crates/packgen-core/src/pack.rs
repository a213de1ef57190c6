//! Pack definition emitted by the converter

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// API version written to every generated Pack.yaml
pub const PACK_API_VERSION: &str = "sherpack/v1";

/// A Sherpack Pack.yaml document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    /// API version (sherpack/v1)
    pub api_version: String,

    /// Pack type
    #[serde(default)]
    pub kind: PackKind,

    /// Pack metadata
    pub metadata: PackMetadata,
}

impl Pack {
    /// Wrap metadata into an application pack
    pub fn application(metadata: PackMetadata) -> Self {
        Self {
            api_version: PACK_API_VERSION.to_string(),
            kind: PackKind::Application,
            metadata,
        }
    }

    /// Parse a Pack.yaml document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let pack: Pack = serde_yaml::from_str(content)?;
        if pack.api_version != PACK_API_VERSION {
            return Err(CoreError::InvalidPack {
                message: format!(
                    "Unsupported API version: {}. Expected: {}",
                    pack.api_version, PACK_API_VERSION
                ),
            });
        }
        pack.metadata.validate()?;
        Ok(pack)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Pack type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PackKind {
    #[default]
    Application,
    Library,
}

/// Pack metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMetadata {
    /// Pack name (required)
    pub name: String,

    /// Pack version (required, SemVer)
    #[serde(with = "version_serde")]
    pub version: Version,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Application version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl PackMetadata {
    /// Metadata with only the required fields
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: None,
            app_version: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Parse the version from a string
    pub fn with_version_str(name: impl Into<String>, version: &str) -> Result<Self> {
        Ok(Self::new(name, Version::parse(version)?))
    }

    /// Reject names Sherpack cannot use as a pack name
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::MissingField {
                field: "metadata.name".to_string(),
            });
        }
        let valid = self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid || self.name.starts_with('-') || self.name.ends_with('-') {
            return Err(CoreError::InvalidPack {
                message: format!(
                    "pack name '{}' must be lowercase alphanumeric with dashes",
                    self.name
                ),
            });
        }
        Ok(())
    }
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_roundtrip_yaml() {
        let mut meta = PackMetadata::with_version_str("my-app", "0.1.0").unwrap();
        meta.app_version = Some("2.3.4".to_string());

        let yaml = Pack::application(meta.clone()).to_yaml().unwrap();
        assert!(yaml.contains("apiVersion: sherpack/v1"));
        assert!(yaml.contains("kind: application"));
        assert!(yaml.contains("appVersion: 2.3.4"));

        let parsed = Pack::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.metadata, meta);
    }

    #[test]
    fn test_pack_rejects_foreign_api_version() {
        let yaml = "apiVersion: v2\nkind: application\nmetadata:\n  name: x\n  version: 1.0.0\n";
        let err = Pack::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported API version"));
    }

    #[test]
    fn test_metadata_validate() {
        assert!(PackMetadata::with_version_str("web-app", "1.0.0").unwrap().validate().is_ok());
        assert!(PackMetadata::with_version_str("Web_App", "1.0.0").unwrap().validate().is_err());
        assert!(PackMetadata::with_version_str("", "1.0.0").unwrap().validate().is_err());
    }

    #[test]
    fn test_invalid_version() {
        assert!(matches!(
            PackMetadata::with_version_str("x", "one"),
            Err(CoreError::InvalidVersion(_))
        ));
    }
}
