//! Package assembly
//!
//! Folds a [`BatchReport`] into the artifacts of a Sherpack pack:
//!
//! ```text
//! <out>/
//! ├── Pack.yaml
//! ├── values.yaml          merged values of every processed resource
//! ├── templates/<service>/<name>-<kind>.yaml
//! └── files/...            already persisted by the store's sink
//! ```
//!
//! Dependency edges are de-duplicated here. Edges that land on another
//! resource of the same batch become a `sherpack.io/wait-for` annotation on
//! the referring template; edges to resources outside the batch are kept in
//! [`Package::external_edges`] for reporting only.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use packgen_core::{Pack, ResourceKey, Values};

use crate::context::ProcessingContext;
use crate::error::{ConversionWarning, ConvertError, Result, warnings};
use crate::pipeline::BatchReport;
use crate::store::ExternalFileRef;
use crate::template::{Template, TemplateNode};

/// Sherpack's explicit ordering annotation
pub const WAIT_FOR_ANNOTATION: &str = "sherpack.io/wait-for";

/// A directed reference between two resources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: ResourceKey,
    pub to: ResourceKey,
}

/// Rendered pack, ready to be written
#[derive(Debug)]
pub struct Package {
    pub pack: Pack,
    pub values: Values,
    /// Template path -> rendered content
    pub templates: IndexMap<String, String>,
    pub files: Vec<ExternalFileRef>,
    /// Edges between resources of the batch
    pub edges: Vec<Edge>,
    /// Edges to resources the batch does not contain
    pub external_edges: Vec<Edge>,
    pub warnings: Vec<ConversionWarning>,
}

impl Package {
    pub fn pack_yaml(&self) -> Result<String> {
        Ok(self.pack.to_yaml()?)
    }

    pub fn values_yaml(&self) -> Result<String> {
        Ok(self.values.to_yaml()?)
    }

    /// Write Pack.yaml, values.yaml and the templates under `dir`
    ///
    /// External files are not written here; the store persisted them while
    /// the batch ran.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.templates.len() + 2);

        let pack_path = dir.join("Pack.yaml");
        fs::write(&pack_path, self.pack_yaml()?)?;
        written.push(pack_path);

        let values_path = dir.join("values.yaml");
        fs::write(&values_path, self.values_yaml()?)?;
        written.push(values_path);

        for (relative, content) in &self.templates {
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            written.push(path);
        }

        tracing::info!(dir = %dir.display(), files = written.len(), "package written");
        Ok(written)
    }
}

/// Refuse a non-empty output directory unless `force` is set
///
/// Called before the batch runs, since the store writes into the same
/// directory while processing.
pub fn prepare_output(dir: &Path, force: bool) -> Result<()> {
    if dir.exists() {
        let occupied = fs::read_dir(dir)?.next().is_some();
        if occupied && !force {
            return Err(ConvertError::OutputExists(dir.to_path_buf()));
        }
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Builds a [`Package`] from the results of one run
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageAssembler;

impl PackageAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, ctx: &ProcessingContext, report: &BatchReport) -> Result<Package> {
        let in_batch: HashSet<&ResourceKey> = report.keys().into_iter().collect();
        let mut values = Values::new();
        let mut templates: IndexMap<String, String> = IndexMap::new();
        let mut owners: IndexMap<String, String> = IndexMap::new();
        let mut value_owners: HashMap<String, String> = HashMap::new();
        let mut edges: IndexSet<Edge> = IndexSet::new();
        let mut external_edges: IndexSet<Edge> = IndexSet::new();
        let mut diagnostics = report.warnings.clone();

        for (outcome, result) in report.processed() {
            if let Some(kept) = owners.get(&result.template_path) {
                diagnostics.push(warnings::duplicate_template(&outcome.id, &result.template_path, kept));
                continue;
            }
            owners.insert(result.template_path.clone(), outcome.id.clone());

            let values_path = claim_values_path(&mut value_owners, &result.values_path, &outcome.id);
            if let Some(kept) = value_owners.get(&result.values_path).filter(|_| values_path != result.values_path) {
                diagnostics.push(warnings::values_path_renamed(&outcome.id, &result.values_path, &values_path, kept));
            }
            if !result.values.is_empty() {
                values.merge_at(&values_path, &result.values)?;
            }

            let mut waits: IndexSet<String> = IndexSet::new();
            for target in &result.dependencies {
                if *target == outcome.key {
                    continue;
                }
                let edge = Edge {
                    from: outcome.key.clone(),
                    to: target.clone(),
                };
                if in_batch.contains(target) {
                    waits.insert(target.short());
                    edges.insert(edge);
                } else {
                    external_edges.insert(edge);
                }
            }

            let Some(template) = &result.template else {
                continue;
            };
            let mut template = template.clone();
            if values_path != result.values_path {
                template.rebase_values(&result.values_path, &values_path);
            }
            if !waits.is_empty() {
                let joined = waits.into_iter().collect::<Vec<_>>().join(",");
                if let Err(e) = annotate(&mut template, &mut values, &joined) {
                    diagnostics.push(warnings::unannotated_dependency(&outcome.id, &e.to_string()));
                }
            }
            templates.insert(result.template_path.clone(), template.render()?);
        }

        tracing::debug!(
            templates = templates.len(),
            edges = edges.len(),
            external_edges = external_edges.len(),
            "package assembled"
        );

        Ok(Package {
            pack: Pack::application(ctx.pack().clone()),
            values,
            templates,
            files: ctx.store().files(),
            edges: edges.into_iter().collect(),
            external_edges: external_edges.into_iter().collect(),
            warnings: diagnostics,
        })
    }
}

/// First resource keeps `wanted`; later ones get the first free numbered path
fn claim_values_path(owners: &mut HashMap<String, String>, wanted: &str, resource: &str) -> String {
    let mut path = wanted.to_string();
    let mut n = 2;
    while owners.contains_key(&path) {
        path = format!("{}{}", wanted, n);
        n += 1;
    }
    owners.insert(path.clone(), resource.to_string());
    path
}

/// Add the wait-for annotation, into values when annotations come from values
fn annotate(template: &mut Template, values: &mut Values, targets: &str) -> Result<()> {
    if let Some(TemplateNode::Block { path }) = template.get(&["metadata", "annotations"]) {
        return match values.get_mut(path) {
            Some(Value::Object(map)) => {
                map.insert(WAIT_FOR_ANNOTATION.to_string(), Value::String(targets.to_string()));
                Ok(())
            }
            _ => Err(ConvertError::InvalidTemplate(format!(
                "annotations at values.{} are not a mapping",
                path
            ))),
        };
    }
    template.set(
        &["metadata", "annotations", WAIT_FOR_ANNOTATION],
        TemplateNode::Literal(Value::String(targets.to_string())),
    )
}
