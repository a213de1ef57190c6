//! Batch dispatch over a set of source objects
//!
//! Each object is dispatched on its own; the only state shared between
//! workers is the file store behind the context. The report keeps input
//! order whatever the execution mode.

use rayon::prelude::*;

use packgen_core::{ResourceKey, SourceObject};

use crate::config::ConvertConfig;
use crate::context::ProcessingContext;
use crate::error::{ConversionWarning, ConvertError, Result, warnings};
use crate::processors::api_version;
use crate::registry::ProcessorRegistry;
use crate::result::ProcessingResult;

/// What happened to one source object
#[derive(Debug)]
pub struct ResourceOutcome {
    /// Provenance id (`Kind/namespace/name`)
    pub id: String,
    pub key: ResourceKey,
    pub result: Result<ProcessingResult>,
}

impl ResourceOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(&self.result, Ok(r) if !r.processed)
    }

    pub fn error(&self) -> Option<&ConvertError> {
        self.result.as_ref().err()
    }
}

/// Per-resource outcomes of one run, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ResourceOutcome>,
    pub warnings: Vec<ConversionWarning>,
}

impl BatchReport {
    /// Results of the objects a processor claimed
    pub fn processed(&self) -> impl Iterator<Item = (&ResourceOutcome, &ProcessingResult)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(r) if r.processed => Some((o, r)),
            _ => None,
        })
    }

    /// Objects of a kind no processor handles
    pub fn skipped(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| o.is_skipped())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ResourceOutcome, &ConvertError)> {
        self.outcomes.iter().filter_map(|o| o.error().map(|e| (o, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.error().is_some())
    }

    /// Keys of every processed object, for resolving edges inside the batch
    pub fn keys(&self) -> Vec<&ResourceKey> {
        self.processed().map(|(o, _)| &o.key).collect()
    }

    /// Prepend warnings produced before dispatch (loading)
    pub fn prepend_warnings(&mut self, earlier: Vec<ConversionWarning>) {
        let mut all = earlier;
        all.append(&mut self.warnings);
        self.warnings = all;
    }
}

/// Dispatches a batch through a registry
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    parallel: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Pipeline {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(config.parallel)
    }

    pub fn run(&self, registry: &ProcessorRegistry, ctx: &ProcessingContext, objects: &[SourceObject]) -> BatchReport {
        tracing::info!(
            objects = objects.len(),
            parallel = self.parallel,
            processors = registry.len(),
            "dispatching batch"
        );

        let outcomes: Vec<ResourceOutcome> = if self.parallel {
            objects.par_iter().map(|obj| run_one(registry, ctx, obj)).collect()
        } else {
            objects.iter().map(|obj| run_one(registry, ctx, obj)).collect()
        };

        let mut collected = Vec::new();
        for (outcome, obj) in outcomes.iter().zip(objects) {
            match &outcome.result {
                Ok(result) if result.processed => collected.extend(result.warnings.iter().cloned()),
                Ok(_) => {
                    let type_name = format!("{} {}", api_version(obj), obj.kind());
                    collected.push(warnings::unsupported_kind(&outcome.id, &type_name));
                }
                Err(_) => {}
            }
        }

        BatchReport {
            outcomes,
            warnings: collected,
        }
    }
}

fn run_one(registry: &ProcessorRegistry, ctx: &ProcessingContext, obj: &SourceObject) -> ResourceOutcome {
    let id = obj.id();
    let result = registry.dispatch(obj, ctx);
    if let Err(e) = &result {
        tracing::warn!(resource = %id, error = %e, "resource failed");
    }
    ResourceOutcome {
        id,
        key: obj.key(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::{context, object};
    use crate::registry::{Processor, SupportedKind};

    const MANIFESTS: &[&str] = &[
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: shop\ndata:\n  mode: fast\n",
        "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n",
        "apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n",
        "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n  namespace: shop\nspec:\n  selector:\n    app: web\n",
    ];

    fn objects() -> Vec<SourceObject> {
        MANIFESTS.iter().map(|m| object(m)).collect()
    }

    #[test]
    fn test_outcomes_keep_input_order() {
        let registry = ProcessorRegistry::with_builtin().unwrap();
        let ctx = context();
        let objects = objects();

        for parallel in [true, false] {
            let report = Pipeline::new(parallel).run(&registry, &ctx, &objects);
            let ids: Vec<&str> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
            assert_eq!(ids, vec!["ConfigMap/shop/a", "Widget/w", "ConfigMap/", "Service/shop/web"]);
            assert_eq!(report.processed().count(), 2);
            assert_eq!(report.skipped().count(), 1);
            assert_eq!(report.failed().count(), 1);
        }
    }

    #[test]
    fn test_unsupported_kind_warning() {
        let registry = ProcessorRegistry::with_builtin().unwrap();
        let report = Pipeline::default().run(&registry, &context(), &objects());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.resource == "Widget/w" && w.message.contains("example.com/v1 Widget")));
    }

    struct Exploding;

    const WIDGET: &[SupportedKind] = &[SupportedKind::new("example.com", "v1", "Widget")];

    impl Processor for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn supported_kinds(&self) -> &[SupportedKind] {
            WIDGET
        }

        fn process(&self, _ctx: &ProcessingContext, _obj: &SourceObject) -> Result<ProcessingResult> {
            Err(ConvertError::InvalidTemplate("broken".to_string()))
        }
    }

    #[test]
    fn test_one_failure_does_not_halt_batch() {
        let mut registry = ProcessorRegistry::with_builtin().unwrap();
        registry.register(Box::new(Exploding)).unwrap();

        let report = Pipeline::new(true).run(&registry, &context(), &objects());
        let failures: Vec<String> = report.failed().map(|(o, _)| o.id.clone()).collect();
        assert_eq!(failures, vec!["Widget/w", "ConfigMap/"]);
        assert!(matches!(
            report.outcomes[1].error(),
            Some(ConvertError::ProcessorFailed { processor, .. }) if processor == "exploding"
        ));
        assert_eq!(report.processed().count(), 2);
    }
}
