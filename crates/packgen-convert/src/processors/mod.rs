//! Built-in processors
//!
//! | processor | kinds |
//! |-----------|-------|
//! | `configmap` | ConfigMap |
//! | `secret` | Secret |
//! | `workload` | Deployment, StatefulSet, DaemonSet, Job, CronJob |
//! | `service` | Service |
//! | `ingress` | Ingress |
//! | `rbac` | Role, ClusterRole, RoleBinding, ClusterRoleBinding |
//! | `autoscaler` | HorizontalPodAutoscaler |
//! | `service-account` | ServiceAccount |

mod autoscaler;
mod configmap;
mod ingress;
mod rbac;
mod secret;
mod service;
mod service_account;
mod workload;

pub use autoscaler::AutoscalerProcessor;
pub use configmap::ConfigMapProcessor;
pub use ingress::IngressProcessor;
pub use rbac::RbacProcessor;
pub use secret::SecretProcessor;
pub use service::ServiceProcessor;
pub use service_account::ServiceAccountProcessor;
pub use workload::WorkloadProcessor;

use std::collections::HashSet;

use packgen_core::SourceObject;

use crate::error::Result;
use crate::naming::camel_case;
use crate::registry::Processor;
use crate::template::Template;

/// Every built-in processor, in registration order
pub fn builtin() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(ConfigMapProcessor),
        Box::new(SecretProcessor),
        Box::new(WorkloadProcessor),
        Box::new(ServiceProcessor),
        Box::new(IngressProcessor),
        Box::new(RbacProcessor),
        Box::new(AutoscalerProcessor),
        Box::new(ServiceAccountProcessor),
    ]
}

/// `group/version`, or just `version` for the core group
pub(crate) fn api_version(obj: &SourceObject) -> String {
    if obj.group().is_empty() {
        obj.version().to_string()
    } else {
        format!("{}/{}", obj.group(), obj.version())
    }
}

/// Template with the object's apiVersion, kind and metadata
pub(crate) fn base_template(obj: &SourceObject) -> Result<Template> {
    let metadata = serde_json::to_value(obj.metadata())?;
    Ok(Template::resource(&api_version(obj), obj.kind(), &metadata))
}

/// camelCase `key`, suffixed until it is not in `taken`
pub(crate) fn unique_key(taken: &mut HashSet<String>, key: &str) -> String {
    let base = camel_case(key);
    let mut candidate = base.clone();
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}{}", base, n);
        n += 1;
    }
    candidate
}
