use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::base_template;
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::Result;
use crate::registry::{ANY_VERSION, Processor, SupportedKind};
use crate::result::{META_SCALE_TO_ZERO, ProcessingResult};
use crate::template::TemplateNode;

const KINDS: &[SupportedKind] = &[SupportedKind::new("autoscaling", ANY_VERSION, "HorizontalPodAutoscaler")];

/// HorizontalPodAutoscaler in any `autoscaling` version
pub struct AutoscalerProcessor;

impl Processor for AutoscalerProcessor {
    fn name(&self) -> &str {
        "autoscaler"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, _ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;

        if let Some(spec) = result.optional(&id, fields::value(obj.data(), &["spec"])) {
            template.set(&["spec"], TemplateNode::from_value(spec))?;
        }

        for field in ["minReplicas", "maxReplicas"] {
            let Some(count) = result.optional(&id, fields::integer(obj.data(), &["spec", field])) else {
                continue;
            };
            result.set_value(field, Value::from(count))?;
            template.set(&["spec", field], TemplateNode::value(result.value_path(field)))?;
            if field == "minReplicas" && count == 0 {
                result.set_metadata(META_SCALE_TO_ZERO, true);
            }
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let mut keys = extractor.from_owner_references(obj);
        if let Some(target) = fields::value(obj.data(), &["spec", "scaleTargetRef"]).ok() {
            keys.extend(extractor.reference(obj, target, Some("Deployment")));
        }
        keys
    }
}
