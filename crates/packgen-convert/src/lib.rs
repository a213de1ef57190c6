//! packgen Convert - Kubernetes manifests to Sherpack pack conversion
//!
//! This crate turns a set of independently written manifests into a pack:
//! Jinja2 templates, one merged `values.yaml`, and content-addressed side
//! files for payloads too large or too sensitive to inline.
//!
//! # Pipeline
//!
//! | stage | module |
//! |-------|--------|
//! | read manifests | [`loader`] |
//! | pick a processor per kind | [`registry`], [`processors`] |
//! | inline or externalize payloads | [`classify`], [`store`], [`context`] |
//! | recover references | [`deps`] |
//! | dispatch the batch | [`pipeline`] |
//! | merge, annotate, render | [`assemble`], [`template`] |
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use packgen_convert::{
//!     ConvertConfig, DirectorySink, PackageAssembler, Pipeline, ProcessingContext,
//!     ProcessorRegistry, loader,
//! };
//!
//! let config = ConvertConfig::discover(Path::new("./manifests")).unwrap();
//! let pack = config.pack_metadata("shop").unwrap();
//! let ctx = ProcessingContext::from_config(pack, &config, Arc::new(DirectorySink::new("./shop-pack")));
//!
//! let registry = ProcessorRegistry::with_builtin().unwrap();
//! let (objects, load_warnings) = loader::load_path(Path::new("./manifests")).unwrap().into_objects();
//!
//! let mut report = Pipeline::from_config(&config).run(&registry, &ctx, &objects);
//! report.prepend_warnings(load_warnings);
//!
//! let package = PackageAssembler::new().assemble(&ctx, &report).unwrap();
//! package.write_to(Path::new("./shop-pack")).unwrap();
//! ```
//!
//! # Dependencies
//!
//! Edges inferred from label selectors (a Service pointing at a Deployment
//! with the same `app` label) are guesses, not verified matches. They are
//! reported with an info-level warning so they can be reviewed.

pub mod assemble;
pub mod classify;
pub mod config;
pub mod context;
pub mod deps;
pub mod error;
pub mod loader;
pub mod naming;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod result;
pub mod store;
pub mod template;

// Re-exports
pub use assemble::{Edge, Package, PackageAssembler, WAIT_FOR_ANNOTATION, prepare_output};
pub use classify::{ClassifiedValue, ContentType, StructuredFormat, ValueClassifier, checksum};
pub use config::{ClassifierConfig, ConvertConfig, PackConfig, StoreConfig};
pub use context::{Placement, ProcessingContext};
pub use deps::DependencyExtractor;
pub use error::{ConversionWarning, ConvertError, Result, WarningCategory, WarningSeverity};
pub use loader::{LoadReport, LoadedManifest, load_path};
pub use pipeline::{BatchReport, Pipeline, ResourceOutcome};
pub use registry::{ANY_VERSION, Processor, ProcessorRegistry, SupportedKind};
pub use result::ProcessingResult;
pub use store::{DirectorySink, ExternalFileRef, FileSink, FileStore, MemorySink};
pub use template::{FileEncoding, Piece, ScalarStyle, Template, TemplateNode};
