//! Dependency extraction primitives
//!
//! Processors know which of their fields point at other resources; the
//! helpers here turn those fields into [`ResourceKey`] edges with consistent
//! group defaulting and namespace inheritance. Edges are lookups only and are
//! not de-duplicated here.
//!
//! Group resolution order: explicit group on the reference, the caller's
//! default, the group of a well-known kind, then the core group.
//!
//! Selector-based edges ([`DependencyExtractor::from_selector`]) are guesses:
//! the selected label value is assumed to be the workload name. Nothing checks
//! that such an object exists, and the resulting key is indistinguishable from
//! a confirmed reference.

use packgen_core::fields;
use packgen_core::{ResourceKey, SourceObject, is_cluster_scoped, known_group, split_api_version};
use serde_json::{Map, Value};

/// Labels read, in order, as the name hint of a selector
const SELECTOR_NAME_LABELS: &[&str] = &[
    "app.kubernetes.io/name",
    "app.kubernetes.io/instance",
    "app",
    "name",
    "k8s-app",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyExtractor;

impl DependencyExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Key for `kind/name` referenced from `referrer`
    ///
    /// A namespaced target without an explicit namespace inherits the
    /// referrer's; a cluster-scoped target never carries one.
    pub fn named(
        &self,
        referrer: &SourceObject,
        group: Option<&str>,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> ResourceKey {
        let group = group
            .filter(|g| !g.is_empty())
            .or_else(|| known_group(kind))
            .unwrap_or("");

        let namespace = if is_cluster_scoped(kind) {
            ""
        } else {
            namespace
                .filter(|ns| !ns.is_empty())
                .or_else(|| referrer.namespace())
                .unwrap_or("")
        };

        ResourceKey::new(group, kind, namespace, name)
    }

    /// Resolve a `{kind, name, apiGroup | group | apiVersion, namespace}` record
    ///
    /// `default_kind` applies when the record has no kind (a scale target
    /// without kind is a Deployment). A record without a name yields nothing.
    pub fn reference(
        &self,
        referrer: &SourceObject,
        record: &Value,
        default_kind: Option<&str>,
    ) -> Option<ResourceKey> {
        let name = fields::string(record, &["name"]).ok().filter(|n| !n.is_empty())?;
        let kind = fields::string(record, &["kind"])
            .ok()
            .filter(|k| !k.is_empty())
            .or(default_kind)?;

        let api_version_group = fields::string(record, &["apiVersion"])
            .ok()
            .map(|av| split_api_version(av).0);
        let group = fields::string(record, &["apiGroup"])
            .ok()
            .or_else(|| fields::string(record, &["group"]).ok())
            .map(str::to_string)
            .or(api_version_group);
        let namespace = fields::string(record, &["namespace"]).ok();

        Some(self.named(referrer, group.as_deref(), kind, name, namespace))
    }

    /// Best-effort owner guess from a label selector
    ///
    /// Accepts either a plain label map (Service) or a `LabelSelector` with
    /// `matchLabels`.
    pub fn from_selector(
        &self,
        referrer: &SourceObject,
        selector: &Map<String, Value>,
        target_kind: &str,
    ) -> Option<ResourceKey> {
        let labels = match selector.get("matchLabels") {
            Some(Value::Object(labels)) => labels,
            _ => selector,
        };

        let hint = SELECTOR_NAME_LABELS
            .iter()
            .find_map(|label| labels.get(*label).and_then(Value::as_str))
            .filter(|v| !v.is_empty())?;

        tracing::debug!(
            referrer = %referrer.id(),
            target = target_kind,
            hint,
            "guessing dependency from selector"
        );
        Some(self.named(referrer, None, target_kind, hint, None))
    }

    /// References held by a pod spec: config/secret env sources and mounts,
    /// claims, pull secrets and the service account
    pub fn from_pod_spec(&self, referrer: &SourceObject, pod_spec: &Value) -> Vec<ResourceKey> {
        let mut keys = Vec::new();

        for list in ["initContainers", "containers"] {
            for container in fields::sequence(pod_spec, &[list]).ok().into_iter().flatten() {
                self.container_refs(referrer, container, &mut keys);
            }
        }

        for volume in fields::sequence(pod_spec, &["volumes"]).ok().into_iter().flatten() {
            self.volume_refs(referrer, volume, &mut keys);
        }

        for secret in fields::sequence(pod_spec, &["imagePullSecrets"]).ok().into_iter().flatten() {
            if let Some(name) = fields::string(secret, &["name"]).ok() {
                keys.push(self.named(referrer, None, "Secret", name, None));
            }
        }

        let service_account = fields::string(pod_spec, &["serviceAccountName"])
            .ok()
            .or_else(|| fields::string(pod_spec, &["serviceAccount"]).ok())
            .filter(|sa| !sa.is_empty() && *sa != "default");
        if let Some(sa) = service_account {
            keys.push(self.named(referrer, None, "ServiceAccount", sa, None));
        }

        keys
    }

    /// `metadata.ownerReferences`, in declaration order
    pub fn from_owner_references(&self, referrer: &SourceObject) -> Vec<ResourceKey> {
        referrer
            .owner_references()
            .iter()
            .filter(|owner| !owner.name.is_empty() && !owner.kind.is_empty())
            .map(|owner| {
                let (group, _) = split_api_version(&owner.api_version);
                self.named(referrer, Some(&group), &owner.kind, &owner.name, None)
            })
            .collect()
    }

    fn container_refs(&self, referrer: &SourceObject, container: &Value, keys: &mut Vec<ResourceKey>) {
        for env in fields::sequence(container, &["env"]).ok().into_iter().flatten() {
            if let Some(name) = fields::string(env, &["valueFrom", "configMapKeyRef", "name"]).ok() {
                keys.push(self.named(referrer, None, "ConfigMap", name, None));
            }
            if let Some(name) = fields::string(env, &["valueFrom", "secretKeyRef", "name"]).ok() {
                keys.push(self.named(referrer, None, "Secret", name, None));
            }
        }

        for source in fields::sequence(container, &["envFrom"]).ok().into_iter().flatten() {
            if let Some(name) = fields::string(source, &["configMapRef", "name"]).ok() {
                keys.push(self.named(referrer, None, "ConfigMap", name, None));
            }
            if let Some(name) = fields::string(source, &["secretRef", "name"]).ok() {
                keys.push(self.named(referrer, None, "Secret", name, None));
            }
        }
    }

    fn volume_refs(&self, referrer: &SourceObject, volume: &Value, keys: &mut Vec<ResourceKey>) {
        if let Some(name) = fields::string(volume, &["configMap", "name"]).ok() {
            keys.push(self.named(referrer, None, "ConfigMap", name, None));
        }
        if let Some(name) = fields::string(volume, &["secret", "secretName"]).ok() {
            keys.push(self.named(referrer, None, "Secret", name, None));
        }
        if let Some(claim) = fields::string(volume, &["persistentVolumeClaim", "claimName"]).ok() {
            keys.push(self.named(referrer, None, "PersistentVolumeClaim", claim, None));
        }

        let projected = fields::sequence(volume, &["projected", "sources"]).ok();
        for source in projected.into_iter().flatten() {
            if let Some(name) = fields::string(source, &["configMap", "name"]).ok() {
                keys.push(self.named(referrer, None, "ConfigMap", name, None));
            }
            if let Some(name) = fields::string(source, &["secret", "name"]).ok() {
                keys.push(self.named(referrer, None, "Secret", name, None));
            }
        }
    }
}
