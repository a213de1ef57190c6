use std::collections::HashSet;

use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::{base_template, unique_key};
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::Result;
use crate::registry::{Processor, SupportedKind};
use crate::result::{META_SCALE_TO_ZERO, ProcessingResult};
use crate::template::{Piece, TemplateNode};

const KINDS: &[SupportedKind] = &[
    SupportedKind::new("apps", "v1", "Deployment"),
    SupportedKind::new("apps", "v1", "StatefulSet"),
    SupportedKind::new("apps", "v1", "DaemonSet"),
    SupportedKind::new("batch", "v1", "Job"),
    SupportedKind::new("batch", "v1", "CronJob"),
];

const POD_SPEC: &[&str] = &["spec", "template", "spec"];
const CRONJOB_POD_SPEC: &[&str] = &["spec", "jobTemplate", "spec", "template", "spec"];

/// Pod controllers: replicas, container images, pull policy and resources
pub struct WorkloadProcessor;

impl Processor for WorkloadProcessor {
    fn name(&self) -> &str {
        "workload"
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

        if matches!(obj.kind(), "Deployment" | "StatefulSet") {
            if let Some(replicas) = result.optional(&id, fields::integer(obj.data(), &["spec", "replicas"])) {
                result.set_value("replicas", Value::from(replicas))?;
                template.set(&["spec", "replicas"], TemplateNode::value(result.value_path("replicas")))?;
                if replicas == 0 {
                    result.set_metadata(META_SCALE_TO_ZERO, true);
                }
            }
        }

        let pod_path = pod_spec_path(obj);
        let mut taken = HashSet::new();
        for list in ["initContainers", "containers"] {
            let path: Vec<&str> = pod_path.iter().copied().chain([list]).collect();
            let Some(containers) = result.optional(&id, fields::sequence(obj.data(), &path)) else {
                continue;
            };

            let mut nodes = Vec::with_capacity(containers.len());
            for (index, container) in containers.iter().enumerate() {
                let name = fields::string(container, &["name"])
                    .ok()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-{}", list, index));
                let relative = format!("{}.{}", list, unique_key(&mut taken, &name));
                nodes.push(container_node(&mut result, &id, container, &relative)?);
            }
            template.set(&path, TemplateNode::Sequence(nodes))?;
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let mut keys = extractor.from_owner_references(obj);

        if let Some(pod_spec) = fields::value(obj.data(), pod_spec_path(obj)).ok() {
            keys.extend(extractor.from_pod_spec(obj, pod_spec));
        }

        if obj.kind() == "StatefulSet" {
            if let Some(service) = fields::string(obj.data(), &["spec", "serviceName"]).ok() {
                keys.push(extractor.named(obj, None, "Service", service, None));
            }
        }

        keys
    }
}

fn pod_spec_path(obj: &SourceObject) -> &'static [&'static str] {
    if obj.kind() == "CronJob" {
        CRONJOB_POD_SPEC
    } else {
        POD_SPEC
    }
}

/// Lift one container, routing image, pull policy and resources through values
fn container_node(
    result: &mut ProcessingResult,
    id: &str,
    container: &Value,
    relative: &str,
) -> Result<TemplateNode> {
    let mut node = TemplateNode::from_value(container);

    if let Some(image) = result.optional(id, fields::string(container, &["image"])) {
        let (repository, tag) = split_image(image);
        let repo_path = format!("{}.image.repository", relative);
        result.set_value(&repo_path, Value::String(repository.to_string()))?;

        let mut pieces = vec![Piece::Value(result.value_path(&repo_path))];
        if let Some(tag) = tag {
            let tag_path = format!("{}.image.tag", relative);
            result.set_value(&tag_path, Value::String(tag.to_string()))?;
            pieces.push(Piece::Text(":".to_string()));
            pieces.push(Piece::Value(result.value_path(&tag_path)));
        }
        node.set(&["image"], TemplateNode::Interpolated(pieces))?;
    }

    if let Some(policy) = result.optional(id, fields::string(container, &["imagePullPolicy"])) {
        let path = format!("{}.imagePullPolicy", relative);
        result.set_value(&path, Value::String(policy.to_string()))?;
        node.set(&["imagePullPolicy"], TemplateNode::quoted(result.value_path(&path)))?;
    }

    if let Some(resources) = result.optional(id, fields::mapping(container, &["resources"])) {
        let path = format!("{}.resources", relative);
        result.set_value(&path, Value::Object(resources.clone()))?;
        node.set(&["resources"], TemplateNode::block(result.value_path(&path)))?;
    }

    Ok(node)
}

/// `registry:5000/app:1.2` -> (`registry:5000/app`, `1.2`); digests keep no tag
fn split_image(image: &str) -> (&str, Option<&str>) {
    if image.contains('@') {
        return (image, None);
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let colon = name_start + i;
            (&image[..colon], Some(&image[colon + 1..]))
        }
        None => (image, None),
    }
}
