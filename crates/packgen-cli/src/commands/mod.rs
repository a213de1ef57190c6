//! CLI command implementations

pub mod convert;
pub mod inspect;

use std::path::{Path, PathBuf};

use packgen_convert::{ConvertConfig, LoadReport, loader};
use packgen_core::PackMetadata;

use crate::InputArgs;
use crate::error::Result;

/// Configuration, pack identity and manifests for one run
pub struct Prepared {
    pub config: ConvertConfig,
    pub pack: PackMetadata,
    pub load: LoadReport,
}

/// Resolve configuration (file, then flags) and load the manifests
pub fn prepare(args: &InputArgs) -> Result<Prepared> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::load_from(path)?,
        None => ConvertConfig::discover(&config_dir(&args.input))?,
    };

    if let Some(name) = &args.name {
        config.pack.name = Some(name.clone());
    }
    if let Some(version) = &args.pack_version {
        config.pack.version = version.clone();
    }
    if let Some(size) = args.size_threshold {
        config.classifier.size_threshold = size;
    }
    if let Some(lines) = args.line_threshold {
        config.classifier.line_threshold = lines;
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate()?;

    let pack = config.pack_metadata(&input_name(&args.input))?;
    let load = loader::load_path(&args.input)?;
    tracing::debug!(
        files = load.files.len(),
        objects = load.manifests.len(),
        pack = %pack.name,
        "input loaded"
    );

    Ok(Prepared { config, pack, load })
}

fn config_dir(input: &Path) -> PathBuf {
    if input.is_file() {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        input.to_path_buf()
    }
}

/// Directory name, or file stem, used when no pack name is configured
pub fn input_name(input: &Path) -> String {
    let resolved = std::fs::canonicalize(input).unwrap_or_else(|_| input.to_path_buf());
    let name = if resolved.is_file() {
        resolved.file_stem()
    } else {
        resolved.file_name()
    };
    name.and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("pack")
        .to_string()
}
