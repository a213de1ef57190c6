use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use packgen_core::{SourceObject, ValueKind, fields};
use serde_json::Value;

use super::{base_template, unique_key};
use crate::context::{Placement, ProcessingContext};
use crate::error::{Result, warnings};
use crate::registry::{Processor, SupportedKind};
use crate::result::{META_EXTERNALIZED, META_SENSITIVE, META_SENSITIVE_KEYS, ProcessingResult};
use crate::template::{FileEncoding, TemplateNode};

const KINDS: &[SupportedKind] = &[SupportedKind::new("", "v1", "Secret")];

/// Secret payloads
///
/// Every payload goes to an external file, whatever its size, and is
/// re-encoded at render time with `b64encode`. Only a failed write keeps a
/// payload in values, still base64 encoded under `data`. The result is
/// flagged sensitive with the list of keys.
pub struct SecretProcessor;

impl Processor for SecretProcessor {
    fn name(&self) -> &str {
        "secret"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;
        let mut taken = HashSet::new();
        let mut sensitive_keys = Vec::new();
        let mut externalized = 0usize;

        if let Some(secret_type) = result.optional(&id, fields::string(obj.data(), &["type"])) {
            result.set_value("type", Value::String(secret_type.to_string()))?;
            template.set(&["type"], TemplateNode::quoted(result.value_path("type")))?;
        }

        let mut payloads: Vec<(String, Vec<u8>)> = Vec::new();

        let data = result.optional(&id, fields::mapping(obj.data(), &["data"]));
        for (key, value) in data.into_iter().flatten() {
            match value.as_str().and_then(|s| BASE64.decode(s.trim()).ok()) {
                Some(raw) => payloads.push((key.clone(), raw)),
                None => result.warn(warnings::malformed_field(
                    &id,
                    &format!("data.{}", key),
                    "base64 string",
                    ValueKind::of(value).as_str(),
                )),
            }
        }

        // stringData wins over data for the same key, as the API server does
        let string_data = result.optional(&id, fields::mapping(obj.data(), &["stringData"]));
        for (key, value) in string_data.into_iter().flatten() {
            match value.as_str() {
                Some(text) => {
                    payloads.retain(|(k, _)| k != key);
                    payloads.push((key.clone(), text.as_bytes().to_vec()));
                }
                None => result.warn(warnings::malformed_field(
                    &id,
                    &format!("stringData.{}", key),
                    "string",
                    ValueKind::of(value).as_str(),
                )),
            }
        }

        for (key, raw) in payloads {
            sensitive_keys.push(Value::String(key.clone()));
            match ctx.externalize(&id, &key, &raw) {
                Placement::External(file) => {
                    template.set(&["data", key.as_str()], TemplateNode::file(&file.path, FileEncoding::Base64))?;
                    result.add_external_file(file);
                    externalized += 1;
                }
                Placement::Inline { fallback_reason, .. } => {
                    let relative = format!("data.{}", unique_key(&mut taken, &key));
                    result.set_value(&relative, Value::String(BASE64.encode(&raw)))?;
                    template.set(&["data", key.as_str()], TemplateNode::quoted(result.value_path(&relative)))?;
                    let reason = fallback_reason.unwrap_or_else(|| "not stored".to_string());
                    result.warn(warnings::inlined_after_persist_failure(&id, &key, &reason));
                }
            }
        }

        result.set_metadata(META_SENSITIVE, true);
        result.set_metadata(META_SENSITIVE_KEYS, Value::Array(sensitive_keys));
        result.set_metadata(META_EXTERNALIZED, externalized);
        result.template = Some(template);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ContentType, checksum};
    use crate::processors::test_support::{context, object};

    fn encoded(text: &str) -> String {
        BASE64.encode(text)
    }

    #[test]
    fn test_short_password_never_reaches_values() {
        let ctx = context();
        let yaml = format!(
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\n  namespace: shop\ntype: Opaque\ndata:\n  password: {}\n",
            encoded("hunter2")
        );
        let result = SecretProcessor.process(&ctx, &object(&yaml)).unwrap();

        assert!(result.is_sensitive());
        assert_eq!(result.metadata[META_SENSITIVE_KEYS], serde_json::json!(["password"]));
        assert!(result.values.get("data").is_none());
        assert_eq!(result.values.get("type"), Some(&Value::String("Opaque".into())));

        assert_eq!(result.external_files.len(), 1);
        let file = &result.external_files[0];
        assert_eq!(file.path, "files/secret/shop/db/password");
        assert_eq!(file.checksum, checksum(b"hunter2"));

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("stringData"));
        assert!(rendered.contains("password: {{ files.get(\"files/secret/shop/db/password\") | b64encode }}"));
        assert!(rendered.contains("type: {{ values.db.dbSecret.type | quote }}"));
    }

    #[test]
    fn test_tls_material_externalized() {
        let ctx = context();
        let cert = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIU\n-----END CERTIFICATE-----\n";
        let yaml = format!(
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: tls\n  namespace: shop\ntype: kubernetes.io/tls\ndata:\n  tls.crt: {}\n",
            encoded(cert)
        );
        let result = SecretProcessor.process(&ctx, &object(&yaml)).unwrap();

        assert_eq!(result.external_files.len(), 1);
        assert_eq!(result.external_files[0].path, "files/secret/shop/tls/tls.crt");
        assert_eq!(result.external_files[0].detected_type, ContentType::Credential);

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("tls.crt: {{ files.get(\"files/secret/shop/tls/tls.crt\") | b64encode }}"));
    }

    #[test]
    fn test_string_data_overrides_data() {
        let ctx = context();
        let yaml = format!(
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\ndata:\n  token: {}\nstringData:\n  token: new\n",
            encoded("old")
        );
        let result = SecretProcessor.process(&ctx, &object(&yaml)).unwrap();
        assert_eq!(result.external_files.len(), 1);
        assert_eq!(result.external_files[0].checksum, checksum(b"new"));
        assert_eq!(result.metadata[META_SENSITIVE_KEYS], serde_json::json!(["token"]));
    }

    struct ReadOnly;

    impl crate::store::FileSink for ReadOnly {
        fn persist(&self, _path: &str, _content: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::other("read-only filesystem"))
        }
    }

    #[test]
    fn test_failed_write_keeps_base64() {
        let ctx = crate::context::ProcessingContext::from_config(
            packgen_core::PackMetadata::with_version_str("test", "0.1.0").unwrap(),
            &crate::config::ConvertConfig::default(),
            std::sync::Arc::new(ReadOnly),
        );
        let yaml = format!(
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\ndata:\n  password: {}\n",
            encoded("hunter2")
        );
        let result = SecretProcessor.process(&ctx, &object(&yaml)).unwrap();

        assert!(result.external_files.is_empty());
        assert_eq!(result.values.get("data.password"), Some(&Value::String(encoded("hunter2"))));
        assert_eq!(result.warnings.len(), 1);
        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("data:\n  password: {{ values.db.dbSecret.data.password | quote }}"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_invalid_base64_is_warned() {
        let ctx = context();
        let result = SecretProcessor
            .process(&ctx, &object("apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\ndata:\n  bad: '!!!'\n"))
            .unwrap();
        assert!(result.values.get("data.bad").is_none());
        assert_eq!(result.warnings.len(), 1);
    }
}
