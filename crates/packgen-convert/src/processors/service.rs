use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::base_template;
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::{Result, warnings};
use crate::registry::{Processor, SupportedKind};
use crate::result::ProcessingResult;
use crate::template::TemplateNode;

const KINDS: &[SupportedKind] = &[SupportedKind::new("", "v1", "Service")];

/// Assigned by the cluster, never part of a package
const RUNTIME_FIELDS: &[&str] = &["clusterIP", "clusterIPs", "healthCheckNodePort"];

/// Services: type and ports; the selector is read as a guess at the backing
/// Deployment
pub struct ServiceProcessor;

impl Processor for ServiceProcessor {
    fn name(&self) -> &str {
        "service"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, _ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;

        if let Some(spec) = result.optional(&id, fields::mapping(obj.data(), &["spec"])) {
            let mut spec = spec.clone();
            for field in RUNTIME_FIELDS {
                spec.remove(*field);
            }
            template.set(&["spec"], TemplateNode::from_value(&Value::Object(spec)))?;
        }

        if let Some(service_type) = result.optional(&id, fields::string(obj.data(), &["spec", "type"])) {
            result.set_value("type", Value::String(service_type.to_string()))?;
            template.set(&["spec", "type"], TemplateNode::quoted(result.value_path("type")))?;
        }

        if let Some(ports) = result.optional(&id, fields::sequence(obj.data(), &["spec", "ports"])) {
            result.set_value("ports", Value::Array(ports.clone()))?;
            template.set(&["spec", "ports"], TemplateNode::block(result.value_path("ports")))?;
        }

        if let Some(target) = selector_target(obj, &DependencyExtractor::new()) {
            result.warn(warnings::inferred_dependency(&id, &target.short()));
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let mut keys = extractor.from_owner_references(obj);
        keys.extend(selector_target(obj, extractor));
        keys
    }
}

fn selector_target(obj: &SourceObject, extractor: &DependencyExtractor) -> Option<ResourceKey> {
    let selector = fields::mapping(obj.data(), &["spec", "selector"]).ok()?;
    extractor.from_selector(obj, selector, "Deployment")
}
