use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::base_template;
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::Result;
use crate::registry::{Processor, SupportedKind};
use crate::result::ProcessingResult;
use crate::template::TemplateNode;

const KINDS: &[SupportedKind] = &[SupportedKind::new("", "v1", "ServiceAccount")];

/// Service accounts; annotations are exposed since they usually carry
/// cloud identity bindings
pub struct ServiceAccountProcessor;

impl Processor for ServiceAccountProcessor {
    fn name(&self) -> &str {
        "service-account"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, _ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;

        for field in ["automountServiceAccountToken", "imagePullSecrets", "secrets"] {
            if let Some(value) = result.optional(&id, fields::value(obj.data(), &[field])) {
                template.set(&[field], TemplateNode::from_value(value))?;
            }
        }

        let annotations = obj.annotations();
        if !annotations.is_empty() {
            result.set_value("annotations", serde_json::to_value(&annotations)?)?;
            template.set(
                &["metadata", "annotations"],
                TemplateNode::block(result.value_path("annotations")),
            )?;
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let mut keys = extractor.from_owner_references(obj);
        for list in ["secrets", "imagePullSecrets"] {
            for entry in fields::sequence(obj.data(), &[list]).ok().into_iter().flatten() {
                if let Some(name) = entry.get("name").and_then(Value::as_str) {
                    keys.push(extractor.named(obj, None, "Secret", name, None));
                }
            }
        }
        keys
    }
}
