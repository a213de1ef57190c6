//! Structured template tree
//!
//! Processors describe the manifest they want as a tree of nodes instead of
//! concatenating strings. Well-formedness is checked on the tree
//! ([`Template::validate`]) before anything is rendered; [`Template::render`]
//! then emits a Sherpack Jinja2 template:
//!
//! | node | rendered |
//! |------|----------|
//! | `ValueRef { style: Plain }` | `{{ values.web.replicas }}` |
//! | `ValueRef { style: Quoted }` | `{{ values.web.image \| quote }}` |
//! | `ValueRef { style: Json }` | `{{ values.web.script \| tojson }}` |
//! | `Block { path: "web.resources" }` | `{{ values.web.resources \| toyaml \| nindent(n) }}` |
//! | `FileRef { encoding: Text }` | `\|` block filled by `{{ files.get("…") \| nindent(n) }}` |
//! | `FileRef { encoding: Base64 }` | `{{ files.get("…") \| b64encode }}` |

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{ConvertError, Result};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\[[0-9]+\])?$").expect("identifier pattern is valid"));

static PLAIN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_./-]*$").expect("key pattern is valid"));

static PLAIN_SCALAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_/.][A-Za-z0-9_ ./=+@-]*$").expect("scalar pattern is valid")
});

/// YAML words that would not read back as strings
const RESERVED_WORDS: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "null", "y", "n", "~",
];

/// How a scalar from values is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    /// Double quoted, single-line strings only
    Quoted,
    /// JSON literal, safe for any string including newlines
    Json,
}

/// How a referenced pack file is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEncoding {
    /// Literal block scalar
    Text,
    /// Base64, for Secret `data` and ConfigMap `binaryData`
    Base64,
}

/// One node of a template document
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Mapping(Vec<(String, TemplateNode)>),
    Sequence(Vec<TemplateNode>),
    /// Fixed value copied from the source manifest
    Literal(Value),
    /// Scalar taken from values
    ValueRef { path: String, style: ScalarStyle },
    /// Subtree taken from values, rendered as YAML
    Block { path: String },
    /// Content of a file shipped in the pack
    FileRef { path: String, encoding: FileEncoding },
    /// Double-quoted string mixing text and values, e.g. `repo:tag`
    Interpolated(Vec<Piece>),
}

/// Part of an [`TemplateNode::Interpolated`] string
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Text(String),
    Value(String),
}

impl TemplateNode {
    pub fn value(path: impl Into<String>) -> Self {
        Self::ValueRef {
            path: path.into(),
            style: ScalarStyle::Plain,
        }
    }

    pub fn quoted(path: impl Into<String>) -> Self {
        Self::ValueRef {
            path: path.into(),
            style: ScalarStyle::Quoted,
        }
    }

    pub fn json(path: impl Into<String>) -> Self {
        Self::ValueRef {
            path: path.into(),
            style: ScalarStyle::Json,
        }
    }

    pub fn block(path: impl Into<String>) -> Self {
        Self::Block { path: path.into() }
    }

    pub fn file(path: impl Into<String>, encoding: FileEncoding) -> Self {
        Self::FileRef {
            path: path.into(),
            encoding,
        }
    }

    /// Lift a literal tree, turning objects and arrays into nodes
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::Sequence(items.iter().map(Self::from_value).collect()),
            scalar => Self::Literal(scalar.clone()),
        }
    }

    /// Node at `path`, following mapping keys
    pub fn get(&self, path: &[&str]) -> Option<&TemplateNode> {
        let mut current = self;
        for segment in path {
            match current {
                TemplateNode::Mapping(entries) => {
                    current = entries.iter().find(|(k, _)| k == segment).map(|(_, v)| v)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    /// Replace (or append) the node at `path`, creating missing mappings
    pub fn set(&mut self, path: &[&str], node: TemplateNode) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            *self = node;
            return Ok(());
        };

        let mut current = self;
        let mut parent = "<root>";
        for segment in parents {
            let entries = match current {
                TemplateNode::Mapping(entries) => entries,
                _ => return Err(not_a_mapping(path, parent)),
            };
            let index = match entries.iter().position(|(k, _)| k == segment) {
                Some(index) => index,
                None => {
                    entries.push((segment.to_string(), TemplateNode::Mapping(Vec::new())));
                    entries.len() - 1
                }
            };
            current = &mut entries[index].1;
            parent = *segment;
        }

        match current {
            TemplateNode::Mapping(entries) => {
                match entries.iter_mut().find(|(k, _)| k == last) {
                    Some(entry) => entry.1 = node,
                    None => entries.push((last.to_string(), node)),
                }
                Ok(())
            }
            _ => Err(not_a_mapping(path, parent)),
        }
    }

    /// Point every values path under `from` at `to` instead
    pub fn rebase_values(&mut self, from: &str, to: &str) {
        match self {
            Self::Mapping(entries) => {
                for (_, child) in entries {
                    child.rebase_values(from, to);
                }
            }
            Self::Sequence(items) => {
                for item in items {
                    item.rebase_values(from, to);
                }
            }
            Self::ValueRef { path, .. } | Self::Block { path } => rebase_path(path, from, to),
            Self::Interpolated(pieces) => {
                for piece in pieces {
                    if let Piece::Value(path) = piece {
                        rebase_path(path, from, to);
                    }
                }
            }
            Self::Literal(_) | Self::FileRef { .. } => {}
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Self::Mapping(entries) => entries.is_empty(),
            Self::Sequence(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// A template document
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    document: TemplateNode,
}

impl Template {
    pub fn new(document: TemplateNode) -> Self {
        Self { document }
    }

    /// Lift a literal manifest
    pub fn from_object(object: &Value) -> Self {
        Self::new(TemplateNode::from_value(object))
    }

    /// `apiVersion`, `kind` and a trimmed `metadata` (name, labels,
    /// annotations) in conventional order
    pub fn resource(api_version: &str, kind: &str, metadata: &Value) -> Self {
        let mut meta = Vec::new();
        for field in ["name", "labels", "annotations"] {
            if let Some(v) = metadata.get(field).filter(|v| !v.is_null()) {
                meta.push((field.to_string(), TemplateNode::from_value(v)));
            }
        }

        Self::new(TemplateNode::Mapping(vec![
            ("apiVersion".to_string(), TemplateNode::Literal(Value::from(api_version))),
            ("kind".to_string(), TemplateNode::Literal(Value::from(kind))),
            ("metadata".to_string(), TemplateNode::Mapping(meta)),
        ]))
    }

    pub fn document(&self) -> &TemplateNode {
        &self.document
    }

    /// Node at `path`, following mapping keys
    pub fn get(&self, path: &[&str]) -> Option<&TemplateNode> {
        self.document.get(path)
    }

    /// Replace (or append) the node at `path`, creating missing mappings
    pub fn set(&mut self, path: &[&str], node: TemplateNode) -> Result<()> {
        self.document.set(path, node)
    }

    /// Move every values reference under `from` to `to`
    pub fn rebase_values(&mut self, from: &str, to: &str) {
        self.document.rebase_values(from, to);
    }

    /// Check the tree without rendering it
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.document, TemplateNode::Mapping(_)) {
            return Err(ConvertError::InvalidTemplate(
                "document root must be a mapping".to_string(),
            ));
        }
        validate_node(&self.document, "")
    }

    /// Render to Jinja2 YAML
    pub fn render(&self) -> Result<String> {
        self.validate()?;
        let mut out = String::new();
        if let TemplateNode::Mapping(entries) = &self.document {
            render_mapping(entries, 0, &mut out);
        }
        Ok(out)
    }
}

fn rebase_path(path: &mut String, from: &str, to: &str) {
    if let Some(rest) = path.strip_prefix(from) {
        if rest.is_empty() || rest.starts_with('.') {
            *path = format!("{}{}", to, rest);
        }
    }
}

fn not_a_mapping(path: &[&str], segment: &str) -> ConvertError {
    ConvertError::InvalidTemplate(format!(
        "cannot set '{}': '{}' is not a mapping",
        path.join("."),
        segment
    ))
}

fn validate_node(node: &TemplateNode, location: &str) -> Result<()> {
    match node {
        TemplateNode::Mapping(entries) => {
            let mut seen = std::collections::HashSet::new();
            for (key, child) in entries {
                if key.is_empty() {
                    return Err(ConvertError::InvalidTemplate(format!(
                        "empty key under '{}'",
                        location
                    )));
                }
                if !seen.insert(key.as_str()) {
                    return Err(ConvertError::InvalidTemplate(format!(
                        "duplicate key '{}' under '{}'",
                        key, location
                    )));
                }
                validate_node(child, &join_location(location, key))?;
            }
            Ok(())
        }
        TemplateNode::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_node(item, &format!("{}[{}]", location, i))?;
            }
            Ok(())
        }
        TemplateNode::ValueRef { path, .. } | TemplateNode::Block { path } => {
            validate_values_path(path, location)
        }
        TemplateNode::Interpolated(pieces) => {
            for piece in pieces {
                match piece {
                    Piece::Value(path) => validate_values_path(path, location)?,
                    Piece::Text(text) if text.contains("{{") || text.contains("{%") => {
                        return Err(ConvertError::InvalidTemplate(format!(
                            "template syntax in text at '{}'",
                            location
                        )));
                    }
                    Piece::Text(_) => {}
                }
            }
            Ok(())
        }
        TemplateNode::FileRef { path, .. } => {
            let escapes = path.split('/').any(|s| s == ".." || s.is_empty());
            if path.starts_with('/') || escapes || path.contains('"') || path.contains('\\') {
                return Err(ConvertError::InvalidTemplate(format!(
                    "file path '{}' at '{}' must be relative inside the pack",
                    path, location
                )));
            }
            Ok(())
        }
        TemplateNode::Literal(_) => Ok(()),
    }
}

fn validate_values_path(path: &str, location: &str) -> Result<()> {
    if path.is_empty() || !path.split('.').all(|s| IDENTIFIER.is_match(s)) {
        return Err(ConvertError::InvalidTemplate(format!(
            "'{}' at '{}' is not a values path",
            path, location
        )));
    }
    Ok(())
}

fn join_location(location: &str, key: &str) -> String {
    if location.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", location, key)
    }
}

fn render_mapping(entries: &[(String, TemplateNode)], indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    for (key, node) in entries {
        out.push_str(&pad);
        out.push_str(&render_key(key));
        out.push(':');
        render_value(node, indent, out);
    }
}

fn render_sequence(items: &[TemplateNode], indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    for item in items {
        match item {
            TemplateNode::Mapping(entries) if !entries.is_empty() => {
                // First entry shares the line with the dash
                let mut nested = String::new();
                render_mapping(entries, indent + 2, &mut nested);
                out.push_str(&pad);
                out.push_str("- ");
                out.push_str(&nested[indent + 2..]);
            }
            TemplateNode::Sequence(inner) if !inner.is_empty() => {
                out.push_str(&pad);
                out.push_str("-\n");
                render_sequence(inner, indent + 2, out);
            }
            other => {
                out.push_str(&pad);
                out.push('-');
                render_value(other, indent, out);
            }
        }
    }
}

/// Everything after `key:` (or `-`), including the trailing newline
fn render_value(node: &TemplateNode, indent: usize, out: &mut String) {
    let child = indent + 2;
    match node {
        n if n.is_empty_collection() => {
            out.push_str(if matches!(n, TemplateNode::Mapping(_)) { " {}\n" } else { " []\n" });
        }
        TemplateNode::Mapping(entries) => {
            out.push('\n');
            render_mapping(entries, child, out);
        }
        TemplateNode::Sequence(items) => {
            out.push('\n');
            render_sequence(items, indent, out);
        }
        TemplateNode::Literal(value) => {
            out.push(' ');
            out.push_str(&render_scalar(value));
            out.push('\n');
        }
        TemplateNode::ValueRef { path, style } => match style {
            ScalarStyle::Plain => out.push_str(&format!(" {{{{ values.{} }}}}\n", path)),
            ScalarStyle::Quoted => out.push_str(&format!(" {{{{ values.{} | quote }}}}\n", path)),
            ScalarStyle::Json => out.push_str(&format!(" {{{{ values.{} | tojson }}}}\n", path)),
        },
        TemplateNode::Block { path } => {
            out.push_str(&format!(" {{{{ values.{} | toyaml | nindent({}) }}}}\n", path, child));
        }
        TemplateNode::FileRef { path, encoding } => match encoding {
            FileEncoding::Text => {
                out.push_str(&format!(" |{{{{ files.get(\"{}\") | nindent({}) }}}}\n", path, child));
            }
            FileEncoding::Base64 => {
                out.push_str(&format!(" {{{{ files.get(\"{}\") | b64encode }}}}\n", path));
            }
        },
        TemplateNode::Interpolated(pieces) => {
            out.push_str(" \"");
            for piece in pieces {
                match piece {
                    Piece::Text(text) => {
                        let quoted = json_string(text);
                        out.push_str(&quoted[1..quoted.len() - 1]);
                    }
                    Piece::Value(path) => out.push_str(&format!("{{{{ values.{} }}}}", path)),
                }
            }
            out.push_str("\"\n");
        }
    }
}

fn render_key(key: &str) -> String {
    if PLAIN_KEY.is_match(key) && !RESERVED_WORDS.contains(&key.to_lowercase().as_str()) {
        key.to_string()
    } else {
        json_string(key)
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => render_string(s),
        Value::Null => "null".to_string(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        // Flow style is valid YAML
        compound => compound.to_string(),
    }
}

fn render_string(s: &str) -> String {
    if s.contains("{{") || s.contains("{%") || s.contains("{#") {
        // Keep template syntax from the source out of the engine's reach
        return format!("{{{{ {} | quote }}}}", json_string(s));
    }
    let looks_plain = PLAIN_SCALAR.is_match(s)
        && !s.ends_with(' ')
        && !RESERVED_WORDS.contains(&s.to_lowercase().as_str())
        && matches!(serde_yaml::from_str(s), Ok(serde_yaml::Value::String(_)));
    if looks_plain {
        s.to_string()
    } else {
        json_string(s)
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> Template {
        let mut t = Template::resource(
            "apps/v1",
            "Deployment",
            &json!({ "name": "web", "namespace": "shop", "labels": { "app": "web" } }),
        );
        t.set(&["spec", "replicas"], TemplateNode::value("web.webDeployment.replicas")).unwrap();
        t
    }

    #[test]
    fn test_resource_header() {
        let rendered = deployment().render().unwrap();
        assert!(rendered.starts_with("apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  labels:\n    app: web\n"));
        assert!(!rendered.contains("namespace"));
        assert!(rendered.ends_with("spec:\n  replicas: {{ values.web.webDeployment.replicas }}\n"));
    }

    #[test]
    fn test_set_replaces_existing() {
        let mut t = deployment();
        t.set(&["spec", "replicas"], TemplateNode::Literal(json!(3))).unwrap();
        assert_eq!(t.get(&["spec", "replicas"]), Some(&TemplateNode::Literal(json!(3))));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut t = deployment();
        let err = t.set(&["kind", "nested"], TemplateNode::Literal(json!(1))).unwrap_err();
        assert!(err.to_string().contains("'kind' is not a mapping"));
    }

    #[test]
    fn test_sequence_of_mappings() {
        let t = Template::from_object(&json!({
            "ports": [{ "name": "http", "port": 80 }, { "name": "https", "port": 443 }]
        }));
        assert_eq!(
            t.render().unwrap(),
            "ports:\n- name: http\n  port: 80\n- name: https\n  port: 443\n"
        );
    }

    #[test]
    fn test_blocks_and_files() {
        let mut t = Template::from_object(&json!({ "kind": "ConfigMap" }));
        t.set(&["data", "nginx.conf"], TemplateNode::file("files/cm/nginx.conf", FileEncoding::Text)).unwrap();
        t.set(&["binaryData", "logo.png"], TemplateNode::file("files/cm/logo.png", FileEncoding::Base64)).unwrap();
        t.set(&["spec", "resources"], TemplateNode::block("web.resources")).unwrap();
        t.set(&["spec", "image"], TemplateNode::quoted("web.image")).unwrap();
        t.set(&["spec", "script"], TemplateNode::json("web.script")).unwrap();

        let rendered = t.render().unwrap();
        assert!(rendered.contains("  nginx.conf: |{{ files.get(\"files/cm/nginx.conf\") | nindent(4) }}\n"));
        assert!(rendered.contains("  logo.png: {{ files.get(\"files/cm/logo.png\") | b64encode }}\n"));
        assert!(rendered.contains("  resources: {{ values.web.resources | toyaml | nindent(4) }}\n"));
        assert!(rendered.contains("  image: {{ values.web.image | quote }}\n"));
        assert!(rendered.contains("  script: {{ values.web.script | tojson }}\n"));
    }

    #[test]
    fn test_scalar_quoting() {
        let t = Template::from_object(&json!({
            "a": "plain-value",
            "b": "true",
            "c": "8080",
            "d": "has: colon",
            "e": "",
            "f": "{{ .Values.x }}",
            "g": null,
            "h": false,
            "80": "numeric key"
        }));
        let rendered = t.render().unwrap();
        assert!(rendered.contains("a: plain-value\n"));
        assert!(rendered.contains("b: \"true\"\n"));
        assert!(rendered.contains("c: \"8080\"\n"));
        assert!(rendered.contains("d: \"has: colon\"\n"));
        assert!(rendered.contains("e: \"\"\n"));
        assert!(rendered.contains("f: {{ \"{{ .Values.x }}\" | quote }}\n"));
        assert!(rendered.contains("g: null\n"));
        assert!(rendered.contains("h: false\n"));
        assert!(rendered.contains("\"80\": numeric key\n"));
    }

    #[test]
    fn test_interpolated_string() {
        let mut t = Template::from_object(&json!({ "name": "app" }));
        t.set(
            &["image"],
            TemplateNode::Interpolated(vec![
                Piece::Value("web.app.image.repository".into()),
                Piece::Text(":".into()),
                Piece::Value("web.app.image.tag".into()),
            ]),
        )
        .unwrap();
        assert!(t.render().unwrap().contains(
            "image: \"{{ values.web.app.image.repository }}:{{ values.web.app.image.tag }}\"\n"
        ));

        t.set(&["bad"], TemplateNode::Interpolated(vec![Piece::Text("{{ x }}".into())])).unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_rebase_values_moves_only_the_prefix() {
        let mut t = deployment();
        t.set(&["spec", "resources"], TemplateNode::block("web.webDeployment")).unwrap();
        t.set(&["spec", "other"], TemplateNode::value("web.webDeploymentExtra.x")).unwrap();
        t.set(
            &["spec", "image"],
            TemplateNode::Interpolated(vec![Piece::Value("web.webDeployment.image".into())]),
        )
        .unwrap();

        t.rebase_values("web.webDeployment", "web.webDeployment2");

        let rendered = t.render().unwrap();
        assert!(rendered.contains("replicas: {{ values.web.webDeployment2.replicas }}"));
        assert!(rendered.contains("resources: {{ values.web.webDeployment2 | toyaml"));
        assert!(rendered.contains("other: {{ values.web.webDeploymentExtra.x }}"));
        assert!(rendered.contains("image: \"{{ values.web.webDeployment2.image }}\""));
    }

    #[test]
    fn test_empty_collections() {
        let t = Template::from_object(&json!({ "labels": {}, "items": [] }));
        assert_eq!(t.render().unwrap(), "items: []\nlabels: {}\n");
    }

    #[test]
    fn test_validate_rejects_bad_nodes() {
        let dup = Template::new(TemplateNode::Mapping(vec![
            ("a".into(), TemplateNode::Literal(json!(1))),
            ("a".into(), TemplateNode::Literal(json!(2))),
        ]));
        assert!(dup.validate().is_err());

        let bad_path = Template::new(TemplateNode::Mapping(vec![(
            "a".into(),
            TemplateNode::value("web.my-key"),
        )]));
        assert!(bad_path.validate().is_err());

        let indexed = Template::new(TemplateNode::Mapping(vec![(
            "host".into(),
            TemplateNode::quoted("web.hosts[0]"),
        )]));
        assert!(indexed.validate().is_ok());

        let escaping = Template::new(TemplateNode::Mapping(vec![(
            "a".into(),
            TemplateNode::file("../secret", FileEncoding::Text),
        )]));
        assert!(escaping.validate().is_err());

        let scalar_root = Template::new(TemplateNode::Literal(json!("x")));
        assert!(scalar_root.render().is_err());
    }
}
