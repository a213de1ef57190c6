use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use packgen_core::{SourceObject, fields};
use serde_json::Value;

use super::{base_template, unique_key};
use crate::classify::ContentType;
use crate::context::{Placement, ProcessingContext};
use crate::error::{Result, warnings};
use crate::registry::{Processor, SupportedKind};
use crate::result::{META_EXTERNALIZED, ProcessingResult};
use crate::template::{FileEncoding, TemplateNode};

const KINDS: &[SupportedKind] = &[SupportedKind::new("", "v1", "ConfigMap")];

/// ConfigMap `data` and `binaryData`, each entry inline or in `files/`
pub struct ConfigMapProcessor;

impl Processor for ConfigMapProcessor {
    fn name(&self) -> &str {
        "configmap"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;
        let mut taken = HashSet::new();
        let mut externalized = 0usize;

        if let Some(immutable) = result.optional(&id, fields::boolean(obj.data(), &["immutable"])) {
            template.set(&["immutable"], TemplateNode::Literal(Value::Bool(immutable)))?;
        }

        let data = result.optional(&id, fields::mapping(obj.data(), &["data"]));
        for (key, value) in data.into_iter().flatten() {
            let Some(text) = value.as_str() else {
                result.warn(warnings::malformed_field(
                    &id,
                    &format!("data.{}", key),
                    "string",
                    packgen_core::ValueKind::of(value).as_str(),
                ));
                continue;
            };

            match ctx.place(&id, key, text.as_bytes()) {
                Placement::External(file) => {
                    template.set(&["data", key.as_str()], TemplateNode::file(&file.path, FileEncoding::Text))?;
                    result.add_external_file(file);
                    externalized += 1;
                }
                Placement::Inline {
                    value,
                    fallback_reason,
                    ..
                } => {
                    let relative = format!("data.{}", unique_key(&mut taken, key));
                    result.set_value(&relative, Value::String(value))?;
                    template.set(&["data", key.as_str()], TemplateNode::json(result.value_path(&relative)))?;
                    if let Some(reason) = fallback_reason {
                        result.warn(warnings::inlined_after_persist_failure(&id, key, &reason));
                    }
                }
            }
        }

        let binary = result.optional(&id, fields::mapping(obj.data(), &["binaryData"]));
        for (key, value) in binary.into_iter().flatten() {
            let decoded = value.as_str().and_then(|s| BASE64.decode(s.trim()).ok());
            let Some(raw) = decoded else {
                result.warn(warnings::malformed_field(
                    &id,
                    &format!("binaryData.{}", key),
                    "base64 string",
                    packgen_core::ValueKind::of(value).as_str(),
                ));
                continue;
            };

            match ctx.place(&id, key, &raw) {
                Placement::External(file) => {
                    template.set(&["binaryData", key.as_str()], TemplateNode::file(&file.path, FileEncoding::Base64))?;
                    result.add_external_file(file);
                    externalized += 1;
                }
                Placement::Inline {
                    detected_type,
                    value,
                    fallback_reason,
                } => {
                    // binaryData must stay base64 whatever the payload turned out to be
                    let encoded = if detected_type == ContentType::Binary {
                        value
                    } else {
                        BASE64.encode(&raw)
                    };
                    let relative = format!("binaryData.{}", unique_key(&mut taken, key));
                    result.set_value(&relative, Value::String(encoded))?;
                    template.set(&["binaryData", key.as_str()], TemplateNode::quoted(result.value_path(&relative)))?;
                    if let Some(reason) = fallback_reason {
                        result.warn(warnings::inlined_after_persist_failure(&id, key, &reason));
                    }
                }
            }
        }

        result.set_metadata(META_EXTERNALIZED, externalized);
        result.template = Some(template);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::{context, object};

    const CONFIGMAP: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: web-config
  namespace: shop
  labels:
    app: web
data:
  LOG_LEVEL: info
  nginx.conf: |
    events {}
    http {
      server { listen 80; }
    }
binaryData:
  logo.png: iVBORw0KGgo=
"#;

    #[test]
    fn test_small_entries_inline() {
        let ctx = context();
        let result = ConfigMapProcessor.process(&ctx, &object(CONFIGMAP)).unwrap();

        assert_eq!(result.values_path, "web.webConfigConfigmap");
        assert_eq!(result.values.get("data.logLevel"), Some(&Value::String("info".into())));

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("LOG_LEVEL: {{ values.web.webConfigConfigmap.data.logLevel | tojson }}"));
        assert!(rendered.contains("nginx.conf: {{ values.web.webConfigConfigmap.data.nginxConf | tojson }}"));
    }

    #[test]
    fn test_binary_data_externalized() {
        let ctx = context();
        let result = ConfigMapProcessor.process(&ctx, &object(CONFIGMAP)).unwrap();

        assert_eq!(result.external_files.len(), 1);
        let file = &result.external_files[0];
        assert_eq!(file.path, "files/configmap/shop/web-config/logo.png");
        assert_eq!(file.detected_type, ContentType::Binary);
        assert_eq!(result.metadata[META_EXTERNALIZED], 1);

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("logo.png: {{ files.get(\"files/configmap/shop/web-config/logo.png\") | b64encode }}"));
    }

    #[test]
    fn test_large_entry_externalized() {
        let ctx = context();
        let body: String = (0..40).map(|i| format!("line {}\n", i)).collect();
        let yaml = format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: scripts\ndata:\n  run.sh: {}\n",
            serde_json::to_string(&body).unwrap()
        );
        let result = ConfigMapProcessor.process(&ctx, &object(&yaml)).unwrap();

        assert_eq!(result.external_files.len(), 1);
        assert_eq!(result.external_files[0].path, "files/configmap/scripts/run.sh");
        assert!(result.values.get("data.runSh").is_none());
    }

    #[test]
    fn test_non_string_data_is_warned_and_skipped() {
        let ctx = context();
        let result = ConfigMapProcessor
            .process(&ctx, &object("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\ndata:\n  port: 8080\n"))
            .unwrap();
        assert!(result.values.get("data.port").is_none());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_missing_data_is_fine() {
        let ctx = context();
        let result = ConfigMapProcessor
            .process(&ctx, &object("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: empty\n"))
            .unwrap();
        assert!(result.processed);
        assert!(result.warnings.is_empty());
        assert!(result.values.is_empty());
    }
}
