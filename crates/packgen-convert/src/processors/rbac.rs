use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::base_template;
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::Result;
use crate::registry::{Processor, SupportedKind};
use crate::result::ProcessingResult;
use crate::template::TemplateNode;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

const KINDS: &[SupportedKind] = &[
    SupportedKind::new(RBAC_GROUP, "v1", "Role"),
    SupportedKind::new(RBAC_GROUP, "v1", "ClusterRole"),
    SupportedKind::new(RBAC_GROUP, "v1", "RoleBinding"),
    SupportedKind::new(RBAC_GROUP, "v1", "ClusterRoleBinding"),
];

/// Roles expose their rules as values; bindings are copied as is and point at
/// their role and service account subjects
pub struct RbacProcessor;

impl Processor for RbacProcessor {
    fn name(&self) -> &str {
        "rbac"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        KINDS
    }

    fn process(&self, _ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult> {
        let id = obj.id();
        let mut result = ProcessingResult::for_object(obj)?;
        let mut template = base_template(obj)?;

        for field in ["aggregationRule", "roleRef", "subjects"] {
            if let Some(value) = result.optional(&id, fields::value(obj.data(), &[field])) {
                template.set(&[field], TemplateNode::from_value(value))?;
            }
        }

        if let Some(rules) = result.optional(&id, fields::sequence(obj.data(), &["rules"])) {
            result.set_value("rules", Value::Array(rules.clone()))?;
            template.set(&["rules"], TemplateNode::block(result.value_path("rules")))?;
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let mut keys = extractor.from_owner_references(obj);

        if let Some(role_ref) = fields::value(obj.data(), &["roleRef"]).ok() {
            keys.extend(extractor.reference(obj, role_ref, None));
        }

        for subject in fields::sequence(obj.data(), &["subjects"]).ok().into_iter().flatten() {
            if fields::string(subject, &["kind"]).ok() == Some("ServiceAccount") {
                keys.extend(extractor.reference(obj, subject, None));
            }
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::{context, object};

    const BINDING: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: read-pods
  namespace: default
subjects:
  - kind: ServiceAccount
    name: reader
  - kind: ServiceAccount
    name: auditor
    namespace: audit
  - kind: User
    name: jane
    apiGroup: rbac.authorization.k8s.io
roleRef:
  kind: Role
  name: pod-reader
  apiGroup: rbac.authorization.k8s.io
"#;

    #[test]
    fn test_binding_dependencies() {
        let keys = RbacProcessor.dependencies(&object(BINDING), &DependencyExtractor::new());
        assert_eq!(
            keys,
            vec![
                ResourceKey::new(RBAC_GROUP, "Role", "default", "pod-reader"),
                ResourceKey::new("", "ServiceAccount", "default", "reader"),
                ResourceKey::new("", "ServiceAccount", "audit", "auditor"),
            ]
        );
    }

    #[test]
    fn test_cluster_role_ref_has_no_namespace() {
        let yaml = BINDING.replace("kind: Role\n", "kind: ClusterRole\n");
        let keys = RbacProcessor.dependencies(&object(&yaml), &DependencyExtractor::new());
        assert_eq!(keys[0], ResourceKey::new(RBAC_GROUP, "ClusterRole", "", "pod-reader"));
    }

    #[test]
    fn test_role_ref_without_name_is_omitted() {
        let yaml = BINDING.replace("  name: pod-reader\n", "");
        let keys = RbacProcessor.dependencies(&object(&yaml), &DependencyExtractor::new());
        assert!(keys.iter().all(|k| k.kind == "ServiceAccount"));
    }

    #[test]
    fn test_role_rules_in_values() {
        let ctx = context();
        let role = object(
            "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: pod-reader\n  namespace: default\nrules:\n  - apiGroups: [\"\"]\n    resources: [pods]\n    verbs: [get, list]\n",
        );
        let result = RbacProcessor.process(&ctx, &role).unwrap();
        assert_eq!(result.values.get("rules").and_then(Value::as_array).map(Vec::len), Some(1));

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("rules: {{ values.podReader.podReaderRole.rules | toyaml | nindent(2) }}"));
    }
}
