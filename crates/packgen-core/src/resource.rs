//! Source resource objects and reference identities
//!
//! A [`SourceObject`] is one manifest document: a `DynamicObject` plus its
//! parsed Group/Version/Kind. A [`ResourceKey`] names a reference target by
//! group, kind, namespace and name; it is a lookup descriptor and owns nothing.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Kinds that live outside any namespace
static CLUSTER_SCOPED_KINDS: phf::Set<&'static str> = phf::phf_set! {
    "Namespace",
    "Node",
    "PersistentVolume",
    "StorageClass",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "PriorityClass",
    "IngressClass",
    "RuntimeClass",
    "CSIDriver",
    "APIService",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
    "ClusterIssuer",
};

/// API group of well-known kinds, used when a reference omits its group
static KNOWN_GROUPS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Deployment" => "apps",
    "StatefulSet" => "apps",
    "DaemonSet" => "apps",
    "ReplicaSet" => "apps",
    "Job" => "batch",
    "CronJob" => "batch",
    "Role" => "rbac.authorization.k8s.io",
    "ClusterRole" => "rbac.authorization.k8s.io",
    "RoleBinding" => "rbac.authorization.k8s.io",
    "ClusterRoleBinding" => "rbac.authorization.k8s.io",
    "Ingress" => "networking.k8s.io",
    "IngressClass" => "networking.k8s.io",
    "NetworkPolicy" => "networking.k8s.io",
    "HorizontalPodAutoscaler" => "autoscaling",
    "PodDisruptionBudget" => "policy",
    "StorageClass" => "storage.k8s.io",
    "CustomResourceDefinition" => "apiextensions.k8s.io",
    "PriorityClass" => "scheduling.k8s.io",
};

/// Whether `kind` is cluster scoped
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(kind)
}

/// Group of a well-known kind (`None` for core kinds and unknown kinds)
pub fn known_group(kind: &str) -> Option<&'static str> {
    KNOWN_GROUPS.get(kind).copied()
}

/// Split an `apiVersion` into (group, version)
pub fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = split_api_version(&tm.api_version);
    GroupVersionKind::gvk(&group, &version, &tm.kind)
}

/// Identity of a reference target
///
/// `namespace` is empty for cluster-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }

    /// `Kind/name`, the form used by `sherpack.io/wait-for`
    pub fn short(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}.{}", self.kind, self.group)?;
        }
        if !self.namespace.is_empty() {
            write!(f, "/{}", self.namespace)?;
        }
        write!(f, "/{}", self.name)
    }
}

/// One source manifest document
#[derive(Debug, Clone)]
pub struct SourceObject {
    object: DynamicObject,
    gvk: GroupVersionKind,
}

impl SourceObject {
    /// Wrap a dynamic object; a missing apiVersion/kind yields an empty GVK
    pub fn from_dynamic(object: DynamicObject) -> Self {
        let gvk = object
            .types
            .as_ref()
            .map(gvk_from_type_meta)
            .unwrap_or_else(|| GroupVersionKind::gvk("", "", ""));
        Self { object, gvk }
    }

    /// Parse a single YAML document
    pub fn from_yaml(doc: &str) -> Result<Self> {
        let object: DynamicObject = serde_yaml::from_str(doc)?;
        Ok(Self::from_dynamic(object))
    }

    /// Build from an already-parsed property tree
    pub fn from_value(value: JsonValue) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidResource {
                message: "resource document is not a mapping".to_string(),
            });
        }
        let object: DynamicObject = serde_json::from_value(value)?;
        Ok(Self::from_dynamic(object))
    }

    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    pub fn group(&self) -> &str {
        &self.gvk.group
    }

    pub fn version(&self) -> &str {
        &self.gvk.version
    }

    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.object.metadata
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.object
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.object.metadata.labels.clone().unwrap_or_default()
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.object.metadata.annotations.clone().unwrap_or_default()
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        self.object
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or(&[])
    }

    /// Everything except apiVersion, kind and metadata
    pub fn data(&self) -> &JsonValue {
        &self.object.data
    }

    /// No kind or no name: nothing a processor could work with
    pub fn is_empty(&self) -> bool {
        self.gvk.kind.is_empty() || self.name().is_empty()
    }

    /// Provenance string: `Kind/namespace/name` or `Kind/name`
    pub fn id(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", self.kind(), ns, self.name()),
            None => format!("{}/{}", self.kind(), self.name()),
        }
    }

    /// This object as a reference target
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(
            self.group(),
            self.kind(),
            self.namespace().unwrap_or(""),
            self.name(),
        )
    }

    /// Full document as a property tree (apiVersion, kind, metadata, rest)
    pub fn to_value(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(&self.object)?)
    }
}
