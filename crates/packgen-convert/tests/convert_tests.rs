//! End-to-end conversion of the shop fixture

use std::path::{Path, PathBuf};
use std::sync::Arc;

use packgen_convert::{
    ContentType, ConvertConfig, DirectorySink, MemorySink, PackageAssembler, Pipeline,
    ProcessingContext, ProcessingResult, Processor, ProcessorRegistry, SupportedKind,
    WAIT_FOR_ANNOTATION, checksum, loader,
};
use packgen_core::{ResourceKey, SourceObject};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop")
}

fn context(config: &ConvertConfig, sink: Arc<dyn packgen_convert::FileSink>) -> ProcessingContext {
    let pack = config.pack_metadata("shop").unwrap();
    ProcessingContext::from_config(pack, config, sink)
}

fn load() -> (ConvertConfig, Vec<SourceObject>) {
    let config = ConvertConfig::discover(&fixture()).unwrap();
    let report = loader::load_path(&fixture()).unwrap();
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    let (objects, _) = report.into_objects();
    (config, objects)
}

#[test]
fn test_fixture_loads_every_document() {
    let (config, objects) = load();
    assert_eq!(config.pack.name.as_deref(), Some("shop"));
    assert_eq!(objects.len(), 12);
}

#[test]
fn test_identical_pem_is_stored_once() {
    let (config, objects) = load();
    let ctx = context(&config, Arc::new(MemorySink::new()));
    let registry = ProcessorRegistry::with_builtin().unwrap();
    let report = Pipeline::from_config(&config).run(&registry, &ctx, &objects);

    let refs_of = |id: &str| -> Vec<packgen_convert::ExternalFileRef> {
        report
            .processed()
            .filter(|(o, _)| o.id == id)
            .flat_map(|(_, r)| r.external_files.iter().cloned())
            .collect()
    };

    // The bundle carries one file, ca.crt, with the same certificate as tls.crt
    let bundle = refs_of("ConfigMap/shop/trust-bundle");
    assert_eq!(bundle.len(), 1);
    assert_eq!(bundle[0].detected_type, ContentType::Credential);

    let tls = refs_of("Secret/shop/shop-tls");
    let shared: Vec<_> = tls.iter().filter(|r| r.checksum == bundle[0].checksum).collect();
    assert_eq!(shared.len(), 1, "{:?}", tls);
    assert_eq!(shared[0].path, bundle[0].path);
    assert_eq!(shared[0].source_resource, "Secret/shop/shop-tls");
    assert_eq!(bundle[0].source_resource, "ConfigMap/shop/trust-bundle");

    let stored = ctx.store().provenance(&bundle[0].checksum);
    assert_eq!(stored.len(), 2);
}

#[test]
fn test_distinct_payloads_never_share_a_path() {
    let (config, objects) = load();
    let ctx = context(&config, Arc::new(MemorySink::new()));
    let registry = ProcessorRegistry::with_builtin().unwrap();
    Pipeline::new(true).run(&registry, &ctx, &objects);

    let files = ctx.store().files();
    // nginx.conf, the shared certificate, tls.key and both database credentials
    assert_eq!(files.len(), 5, "{:?}", files);
    for (i, a) in files.iter().enumerate() {
        for b in &files[i + 1..] {
            assert_ne!(a.path, b.path);
            assert_ne!(a.checksum, b.checksum);
        }
    }
}

#[test]
fn test_unsupported_kind_is_reported_not_failed() {
    let (config, objects) = load();
    let ctx = context(&config, Arc::new(MemorySink::new()));
    let registry = ProcessorRegistry::with_builtin().unwrap();
    let report = Pipeline::new(false).run(&registry, &ctx, &objects);

    let skipped: Vec<&str> = report.skipped().map(|o| o.id.as_str()).collect();
    assert_eq!(skipped, vec!["Certificate/shop/shop-cert"]);
    assert!(!report.has_failures());
    assert_eq!(report.processed().count(), 11);
}

#[test]
fn test_role_binding_inherits_namespace() {
    let (config, objects) = load();
    let ctx = context(&config, Arc::new(MemorySink::new()));
    let registry = ProcessorRegistry::with_builtin().unwrap();
    let report = Pipeline::new(false).run(&registry, &ctx, &objects);

    let (_, binding) = report
        .processed()
        .find(|(o, _)| o.id == "RoleBinding/shop/web-pod-reader")
        .unwrap();
    assert!(binding.dependencies.contains(&ResourceKey::new(
        "rbac.authorization.k8s.io",
        "Role",
        "shop",
        "pod-reader"
    )));
}

struct LoudConfigMaps;

const CONFIGMAP: &[SupportedKind] = &[SupportedKind::new("", "v1", "ConfigMap")];

impl Processor for LoudConfigMaps {
    fn name(&self) -> &str {
        "loud-configmaps"
    }

    fn supported_kinds(&self) -> &[SupportedKind] {
        CONFIGMAP
    }

    fn priority(&self) -> i32 {
        80
    }

    fn process(
        &self,
        _ctx: &ProcessingContext,
        obj: &SourceObject,
    ) -> packgen_convert::Result<ProcessingResult> {
        ProcessingResult::for_object(obj)
    }
}

#[test]
fn test_higher_priority_processor_overrides_builtin() {
    let (config, objects) = load();
    let ctx = context(&config, Arc::new(MemorySink::new()));
    let mut registry = ProcessorRegistry::with_builtin().unwrap();
    registry.register(Box::new(LoudConfigMaps)).unwrap();

    let report = Pipeline::new(true).run(&registry, &ctx, &objects);
    let processors: Vec<&str> = report
        .processed()
        .filter(|(o, _)| o.key.kind == "ConfigMap")
        .filter_map(|(_, r)| r.processor.as_deref())
        .collect();
    assert_eq!(processors, vec!["loud-configmaps", "loud-configmaps"]);
}

#[test]
fn test_package_written_to_disk() {
    let (config, objects) = load();
    let out = TempDir::new().unwrap();
    packgen_convert::prepare_output(out.path(), false).unwrap();

    let ctx = context(&config, Arc::new(DirectorySink::new(out.path())));
    let registry = ProcessorRegistry::with_builtin().unwrap();
    let report = Pipeline::from_config(&config).run(&registry, &ctx, &objects);
    let package = PackageAssembler::new().assemble(&ctx, &report).unwrap();
    package.write_to(out.path()).unwrap();

    let pack = std::fs::read_to_string(out.path().join("Pack.yaml")).unwrap();
    assert!(pack.contains("name: shop"));
    assert!(pack.contains("version: 1.2.0"));

    for file in &package.files {
        let bytes = std::fs::read(out.path().join(&file.path)).unwrap();
        assert_eq!(checksum(&bytes), file.checksum);
    }

    let deployment =
        std::fs::read_to_string(out.path().join("templates/web/web-deployment.yaml")).unwrap();
    assert!(deployment.contains(WAIT_FOR_ANNOTATION));
    assert!(deployment.contains("ConfigMap/web-config"));
    assert!(deployment.contains("replicas: {{ values.web.webDeployment.replicas }}"));

    let values_text = std::fs::read_to_string(out.path().join("values.yaml")).unwrap();
    assert!(!values_text.contains("s3cr3t-passw0rd"));
    let values = packgen_core::Values::from_file(out.path().join("values.yaml")).unwrap();
    assert_eq!(values.get("web.webDeployment.replicas"), Some(&serde_json::json!(3)));
    assert_eq!(values.get("web.webHorizontalpodautoscaler.maxReplicas"), Some(&serde_json::json!(6)));
    assert_eq!(values.get("web.webConfigConfigmap.data.logLevel"), Some(&serde_json::json!("info")));
}
