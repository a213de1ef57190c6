//! Processor registry
//!
//! Maps an object's Group/Version/Kind to exactly one [`Processor`]. Among
//! the processors supporting a kind, the highest priority wins and equal
//! priorities fall back to registration order, so resolution is identical on
//! every run.
//!
//! Registration takes `&mut self` and dispatch takes `&self`: once a registry
//! is shared across workers it can no longer change.

use packgen_core::{ResourceKey, SourceObject};

use crate::context::ProcessingContext;
use crate::deps::DependencyExtractor;
use crate::error::{ConvertError, Result};
use crate::processors;
use crate::result::ProcessingResult;

/// Version wildcard in [`SupportedKind`]
pub const ANY_VERSION: &str = "*";

/// A `(group, version, kind)` a processor accepts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SupportedKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

impl SupportedKind {
    pub const fn new(group: &'static str, version: &'static str, kind: &'static str) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }

    pub fn matches(&self, obj: &SourceObject) -> bool {
        self.kind == obj.kind()
            && self.group == obj.group()
            && (self.version == ANY_VERSION || self.version == obj.version())
    }
}

/// Transformation unit for one or more kinds
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// Must not be empty
    fn supported_kinds(&self) -> &[SupportedKind];

    fn priority(&self) -> i32 {
        0
    }

    /// Build the result for `obj`; dependencies are added by the registry
    fn process(&self, ctx: &ProcessingContext, obj: &SourceObject) -> Result<ProcessingResult>;

    /// Reference edges held by `obj`
    fn dependencies(&self, obj: &SourceObject, extractor: &DependencyExtractor) -> Vec<ResourceKey> {
        extractor.from_owner_references(obj)
    }
}

struct Registration {
    processor: Box<dyn Processor>,
    index: usize,
}

/// Registry of processors, built before dispatch
#[derive(Default)]
pub struct ProcessorRegistry {
    registrations: Vec<Registration>,
    extractor: DependencyExtractor,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in processor
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        for processor in processors::builtin() {
            registry.register(processor)?;
        }
        Ok(registry)
    }

    /// Add a processor; one without supported kinds is rejected
    pub fn register(&mut self, processor: Box<dyn Processor>) -> Result<()> {
        if processor.supported_kinds().is_empty() {
            return Err(ConvertError::InvalidProcessor(processor.name().to_string()));
        }
        tracing::debug!(
            processor = processor.name(),
            priority = processor.priority(),
            kinds = processor.supported_kinds().len(),
            "registered processor"
        );
        let index = self.registrations.len();
        self.registrations.push(Registration { processor, index });
        Ok(())
    }

    /// Processor for `obj`: highest priority, then earliest registration
    pub fn resolve(&self, obj: &SourceObject) -> Option<&dyn Processor> {
        self.registrations
            .iter()
            .filter(|r| r.processor.supported_kinds().iter().any(|k| k.matches(obj)))
            .max_by(|a, b| {
                a.processor
                    .priority()
                    .cmp(&b.processor.priority())
                    .then_with(|| b.index.cmp(&a.index))
            })
            .map(|r| r.processor.as_ref())
    }

    /// Process `obj` with the resolved processor
    ///
    /// An empty object is rejected; a kind nobody handles yields an
    /// unprocessed result, not an error.
    pub fn dispatch(&self, obj: &SourceObject, ctx: &ProcessingContext) -> Result<ProcessingResult> {
        if obj.is_empty() {
            return Err(ConvertError::InvalidInput(format!(
                "resource '{}' has no kind or no name",
                obj.id()
            )));
        }

        let Some(processor) = self.resolve(obj) else {
            tracing::debug!(resource = %obj.id(), "no processor, skipping");
            return Ok(ProcessingResult::unprocessed());
        };

        tracing::debug!(resource = %obj.id(), processor = processor.name(), "dispatching");
        let mut result = processor
            .process(ctx, obj)
            .map_err(|e| match e {
                ConvertError::InvalidInput(_) => e,
                other => ConvertError::ProcessorFailed {
                    processor: processor.name().to_string(),
                    resource: obj.id(),
                    message: other.to_string(),
                },
            })?
            .with_processor(processor.name());
        result.processed = true;
        result.add_dependencies(processor.dependencies(obj, &self.extractor));
        Ok(result)
    }

    pub fn names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.processor.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
