use packgen_core::{ResourceKey, SourceObject, fields};
use serde_json::Value;

use super::base_template;
use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::Result;
use crate::registry::{Processor, SupportedKind};
use crate::result::ProcessingResult;
use crate::template::TemplateNode;

const KINDS: &[SupportedKind] = &[SupportedKind::new("networking.k8s.io", "v1", "Ingress")];

/// Ingresses: class name and rule hosts
pub struct IngressProcessor;

impl Processor for IngressProcessor {
    fn name(&self) -> &str {
        "ingress"
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

        if let Some(class) = result.optional(&id, fields::string(obj.data(), &["spec", "ingressClassName"])) {
            result.set_value("className", Value::String(class.to_string()))?;
            template.set(&["spec", "ingressClassName"], TemplateNode::quoted(result.value_path("className")))?;
        }

        if let Some(rules) = result.optional(&id, fields::sequence(obj.data(), &["spec", "rules"])) {
            let mut hosts = Vec::new();
            let mut nodes = Vec::with_capacity(rules.len());
            for rule in rules {
                let mut node = TemplateNode::from_value(rule);
                if let Some(host) = result.optional(&id, fields::string(rule, &["host"])) {
                    let path = result.value_path(&format!("hosts[{}]", hosts.len()));
                    hosts.push(Value::String(host.to_string()));
                    node.set(&["host"], TemplateNode::quoted(path))?;
                }
                nodes.push(node);
            }
            if !hosts.is_empty() {
                result.set_value("hosts", Value::Array(hosts))?;
            }
            template.set(&["spec", "rules"], TemplateNode::Sequence(nodes))?;
        }

        result.template = Some(template);
        Ok(result)
    }

    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        let data = obj.data();
        let mut keys = extractor.from_owner_references(obj);

        if let Some(class) = fields::string(data, &["spec", "ingressClassName"]).ok() {
            keys.push(extractor.named(obj, None, "IngressClass", class, None));
        }

        if let Some(backend) = fields::value(data, &["spec", "defaultBackend"]).ok() {
            keys.extend(backend_target(obj, extractor, backend));
        }

        for rule in fields::sequence(data, &["spec", "rules"]).ok().into_iter().flatten() {
            let paths = fields::sequence(rule, &["http", "paths"]).ok();
            for path in paths.into_iter().flatten() {
                if let Some(backend) = fields::value(path, &["backend"]).ok() {
                    keys.extend(backend_target(obj, extractor, backend));
                }
            }
        }

        for tls in fields::sequence(data, &["spec", "tls"]).ok().into_iter().flatten() {
            if let Some(secret) = fields::string(tls, &["secretName"]).ok() {
                keys.push(extractor.named(obj, None, "Secret", secret, None));
            }
        }

        keys
    }
}

/// `backend.service.name`, or a typed `backend.resource` reference
fn backend_target(obj: &SourceObject, extractor: &DependencyExtractor, backend: &Value) -> Option<ResourceKey> {
    if let Some(service) = fields::string(backend, &["service", "name"]).ok() {
        return Some(extractor.named(obj, None, "Service", service, None));
    }
    let resource = fields::value(backend, &["resource"]).ok()?;
    extractor.reference(obj, resource, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::{context, object};

    const INGRESS: &str = r#"
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: web
  namespace: shop
spec:
  ingressClassName: nginx
  tls:
    - hosts: [shop.example.com]
      secretName: shop-tls
  rules:
    - host: shop.example.com
      http:
        paths:
          - path: /
            pathType: Prefix
            backend:
              service:
                name: web
                port:
                  number: 80
          - path: /static
            pathType: Prefix
            backend:
              resource:
                apiGroup: storage.example.com
                kind: Bucket
                name: assets
"#;

    #[test]
    fn test_class_and_hosts() {
        let ctx = context();
        let result = IngressProcessor.process(&ctx, &object(INGRESS)).unwrap();
        assert_eq!(result.values.get("className"), Some(&Value::String("nginx".into())));
        assert_eq!(result.values.get("hosts"), Some(&serde_json::json!(["shop.example.com"])));

        let rendered = result.template.as_ref().unwrap().render().unwrap();
        assert!(rendered.contains("ingressClassName: {{ values.web.webIngress.className | quote }}"));
        assert!(rendered.contains("- host: {{ values.web.webIngress.hosts[0] | quote }}"));
    }

    #[test]
    fn test_backend_dependencies() {
        let keys = IngressProcessor.dependencies(&object(INGRESS), &DependencyExtractor::new());
        assert_eq!(
            keys,
            vec![
                ResourceKey::new("networking.k8s.io", "IngressClass", "", "nginx"),
                ResourceKey::new("", "Service", "shop", "web"),
                ResourceKey::new("storage.example.com", "Bucket", "shop", "assets"),
                ResourceKey::new("", "Secret", "shop", "shop-tls"),
            ]
        );
    }
}
