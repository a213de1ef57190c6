//! Manifest discovery and parsing
//!
//! Accepts a single file or a directory tree. YAML files may hold several
//! documents; `kind: List` documents are flattened into their items. A
//! document that cannot be parsed is reported as a warning and the rest of
//! the file still loads.

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use packgen_core::SourceObject;

use crate::config::CONFIG_FILE_NAME;
use crate::error::{ConversionWarning, ConvertError, Result, warnings};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// One object read from disk
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub source: PathBuf,
    /// Position of the document in its file (0-based)
    pub document: usize,
    pub object: SourceObject,
}

/// Everything read from an input path
#[derive(Debug, Default)]
pub struct LoadReport {
    pub manifests: Vec<LoadedManifest>,
    pub warnings: Vec<ConversionWarning>,
    pub files: Vec<PathBuf>,
}

impl LoadReport {
    pub fn objects(&self) -> Vec<SourceObject> {
        self.manifests.iter().map(|m| m.object.clone()).collect()
    }

    pub fn into_objects(self) -> (Vec<SourceObject>, Vec<ConversionWarning>) {
        let objects = self.manifests.into_iter().map(|m| m.object).collect();
        (objects, self.warnings)
    }
}

/// Load every manifest under `path`
pub fn load_path(path: &Path) -> Result<LoadReport> {
    let files = discover(path)?;
    let mut report = LoadReport::default();

    for file in files {
        let content = fs::read_to_string(&file)?;
        let is_json = file.extension().and_then(|e| e.to_str()) == Some("json");
        let (manifests, file_warnings) = parse_documents(&file, &content, is_json);
        tracing::debug!(
            file = %file.display(),
            objects = manifests.len(),
            "loaded manifest file"
        );
        report.manifests.extend(manifests);
        report.warnings.extend(file_warnings);
        report.files.push(file);
    }

    Ok(report)
}

/// Manifest files under `path`, sorted; a file path is returned as is
pub fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_manifest(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_manifest(path: &Path) -> bool {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if file_name == CONFIG_FILE_NAME || file_name.starts_with('.') {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e))
}

/// Parse the documents of one file
///
/// Never fails: unparseable documents become warnings.
pub fn parse_documents(
    source: &Path,
    content: &str,
    is_json: bool,
) -> (Vec<LoadedManifest>, Vec<ConversionWarning>) {
    let file = source.display().to_string();
    let mut manifests = Vec::new();
    let mut warnings = Vec::new();

    let documents: Vec<std::result::Result<Value, String>> = if is_json {
        vec![serde_json::from_str(content).map_err(|e| e.to_string())]
    } else {
        serde_yaml::Deserializer::from_str(content)
            .map(|doc| Value::deserialize(doc).map_err(|e| e.to_string()))
            .collect()
    };

    for (index, document) in documents.into_iter().enumerate() {
        let value = match document {
            Ok(value) => value,
            Err(reason) => {
                warnings.push(warnings::unparseable_document(&file, index, &reason));
                continue;
            }
        };

        for item in flatten(value) {
            match SourceObject::from_value(item) {
                Ok(object) => manifests.push(LoadedManifest {
                    source: source.to_path_buf(),
                    document: index,
                    object,
                }),
                Err(e) => warnings.push(warnings::unparseable_document(&file, index, &e.to_string())),
            }
        }
    }

    (manifests, warnings)
}

/// Drop empty documents and expand `kind: List`
fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Object(map) if map.is_empty() => Vec::new(),
        Value::Object(mut map) if map.get("kind").and_then(Value::as_str) == Some("List") => {
            match map.remove("items") {
                Some(Value::Array(items)) => items.into_iter().flat_map(flatten).collect(),
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> (Vec<LoadedManifest>, Vec<ConversionWarning>) {
        parse_documents(Path::new("app.yaml"), content, false)
    }

    #[test]
    fn test_multi_document() {
        let (manifests, warnings) = parse(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: b\n",
        );
        assert!(warnings.is_empty());
        let kinds: Vec<&str> = manifests.iter().map(|m| m.object.kind()).collect();
        assert_eq!(kinds, vec!["ConfigMap", "Secret"]);
        assert_eq!(manifests[1].document, 2);
    }

    #[test]
    fn test_pem_block_is_not_a_separator() {
        let (manifests, warnings) = parse(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ca\ndata:\n  ca.crt: |\n    -----BEGIN CERTIFICATE-----\n    MIIB\n    -----END CERTIFICATE-----\n",
        );
        assert!(warnings.is_empty());
        assert_eq!(manifests.len(), 1);
        let ca = manifests[0].object.data()["data"]["ca.crt"].as_str().unwrap();
        assert!(ca.starts_with("-----BEGIN CERTIFICATE-----\n"));
    }

    #[test]
    fn test_list_is_flattened() {
        let (manifests, _) = parse(
            "apiVersion: v1\nkind: List\nitems:\n  - apiVersion: v1\n    kind: Service\n    metadata:\n      name: a\n  - apiVersion: v1\n    kind: Service\n    metadata:\n      name: b\n",
        );
        let names: Vec<&str> = manifests.iter().map(|m| m.object.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_scalar_document_is_warned() {
        let (manifests, warnings) = parse("just a string\n");
        assert!(manifests.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("document 0"));
    }

    #[test]
    fn test_load_directory_sorted_and_skips_config() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/b.yml"),
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: b\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"apiVersion":"v1","kind":"Service","metadata":{"name":"a"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "pack:\n  name: x\n").unwrap();
        fs::write(dir.path().join("README.md"), "# nothing").unwrap();

        let report = load_path(dir.path()).unwrap();
        assert_eq!(report.files.len(), 2);
        let names: Vec<&str> = report.manifests.iter().map(|m| m.object.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = load_path(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound(_)));
    }
}
