//! Per-resource processing output

use std::collections::BTreeMap;

use packgen_core::{Field, ResourceKey, SourceObject, Values};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{ConversionWarning, ConvertError, Result, warnings};
use crate::naming::{camel_case, sanitize_segment, service_name};
use crate::store::ExternalFileRef;
use crate::template::Template;

/// Metadata flag: the resource can scale to zero
pub const META_SCALE_TO_ZERO: &str = "scaleToZero";
/// Metadata flag: the resource carries data that must not be inlined
pub const META_SENSITIVE: &str = "sensitive";
/// Metadata: keys of the sensitive payloads
pub const META_SENSITIVE_KEYS: &str = "sensitiveKeys";
/// Metadata: number of payloads moved to external files
pub const META_EXTERNALIZED: &str = "externalized";

/// Output of one processor run on one source object
///
/// Built once by a processor and not modified after dispatch returns.
/// An unprocessed result carries nothing but `processed = false`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub processed: bool,

    /// Name of the processor that claimed the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,

    pub service_name: String,
    pub template_path: String,
    pub values_path: String,

    /// Subtree merged under `values_path`
    pub values: Values,

    #[serde(skip)]
    pub template: Option<Template>,

    pub dependencies: Vec<ResourceKey>,
    pub external_files: Vec<ExternalFileRef>,
    pub metadata: BTreeMap<String, JsonValue>,

    #[serde(skip)]
    pub warnings: Vec<ConversionWarning>,
}

impl ProcessingResult {
    /// Result for a kind nobody handles
    pub fn unprocessed() -> Self {
        Self::default()
    }

    /// Processed result with locators derived from the object
    ///
    /// `templates/<service>/<name>-<kind>.yaml` and `<service>.<nameKind>`.
    /// An object without kind or name is rejected.
    pub fn for_object(obj: &SourceObject) -> Result<Self> {
        if obj.is_empty() {
            return Err(ConvertError::InvalidInput(format!(
                "resource '{}' has no kind or no name",
                obj.id()
            )));
        }
        let service = service_name(obj);
        let kind = obj.kind().to_lowercase();

        Ok(Self {
            processed: true,
            template_path: format!(
                "templates/{}/{}-{}.yaml",
                sanitize_segment(&service),
                sanitize_segment(obj.name()),
                sanitize_segment(&kind)
            ),
            values_path: format!(
                "{}.{}",
                camel_case(&service),
                camel_case(&format!("{}-{}", obj.name(), kind))
            ),
            service_name: service,
            values: Values::new(),
            ..Self::default()
        })
    }

    pub fn with_processor(mut self, name: &str) -> Self {
        self.processor = Some(name.to_string());
        self
    }

    /// Absolute values path of `relative`, for template references
    pub fn value_path(&self, relative: &str) -> String {
        format!("{}.{}", self.values_path, relative)
    }

    /// Set `relative` (dotted) inside this result's values
    pub fn set_value(&mut self, relative: &str, value: JsonValue) -> Result<()> {
        self.values.set(relative, value)?;
        Ok(())
    }

    pub fn add_dependencies(&mut self, keys: impl IntoIterator<Item = ResourceKey>) {
        self.dependencies.extend(keys);
    }

    pub fn add_external_file(&mut self, file: ExternalFileRef) {
        self.external_files.push(file);
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<JsonValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn warn(&mut self, warning: ConversionWarning) {
        self.warnings.push(warning);
    }

    /// Unwrap an optional field, recording a warning on type mismatch
    pub fn optional<T>(&mut self, resource: &str, field: Field<T>) -> Option<T> {
        match field {
            Field::Present(v) => Some(v),
            Field::Absent => None,
            Field::Mismatch {
                path,
                expected,
                found,
            } => {
                self.warn(warnings::malformed_field(
                    resource,
                    &path,
                    expected.as_str(),
                    found.as_str(),
                ));
                None
            }
        }
    }

    pub fn scale_to_zero(&self) -> bool {
        self.flag(META_SCALE_TO_ZERO)
    }

    pub fn is_sensitive(&self) -> bool {
        self.flag(META_SENSITIVE)
    }

    fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}
