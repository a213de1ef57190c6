//! Value classification
//!
//! Decides what a configuration payload is (plain text, JSON/YAML, PEM
//! material, binary) and whether it belongs inline in `values.yaml` or in an
//! external file. Classification is a pure function of the payload and the
//! configured thresholds; the resource kind and the key never influence the
//! decision.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::ClassifierConfig;

static PEM_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-----BEGIN [A-Z0-9 ]+-----").expect("PEM begin pattern is valid"));

static PEM_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-----END [A-Z0-9 ]+-----").expect("PEM end pattern is valid"));

/// Structured text flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuredFormat {
    Json,
    Yaml,
}

/// Detected payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Plain,
    Structured(StructuredFormat),
    /// PEM-encoded keys and certificates
    Credential,
    Binary,
    /// Empty payload
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Structured(StructuredFormat::Json) => "json",
            Self::Structured(StructuredFormat::Yaml) => "yaml",
            Self::Credential => "credential",
            Self::Binary => "binary",
            Self::Unknown => "unknown",
        }
    }

    /// Extension for synthesized file names whose key has none
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Structured(StructuredFormat::Json) => Some("json"),
            Self::Structured(StructuredFormat::Yaml) => Some("yaml"),
            Self::Credential => Some("pem"),
            Self::Binary => Some("bin"),
            Self::Plain | Self::Unknown => None,
        }
    }

    /// Always external, whatever the size
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Credential | Self::Binary)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classification outcome for one payload
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedValue {
    /// Canonical rendering, used when the value stays inline
    pub formatted_value: String,
    pub detected_type: ContentType,
    /// Lowercase hex SHA-256 of `raw`
    pub checksum: String,
    pub should_externalize: bool,
    /// Original bytes, what the file store persists
    pub raw: Vec<u8>,
}

impl ClassifiedValue {
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

/// Stateless classifier; share it freely across threads
#[derive(Debug, Clone, Default)]
pub struct ValueClassifier {
    config: ClassifierConfig,
}

impl ValueClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `raw`; `key` only feeds diagnostics
    pub fn classify(&self, key: &str, raw: &[u8]) -> ClassifiedValue {
        let detected_type = self.detect(raw);
        let checksum = checksum(raw);
        let formatted_value = format_value(raw, detected_type);
        let should_externalize = self.should_externalize(raw, detected_type);

        tracing::debug!(
            key,
            detected = %detected_type,
            size = raw.len(),
            external = should_externalize,
            "classified value"
        );

        ClassifiedValue {
            formatted_value,
            detected_type,
            checksum,
            should_externalize,
            raw: raw.to_vec(),
        }
    }

    /// Structured (JSON, then YAML), then PEM, then binary, then plain
    pub fn detect(&self, raw: &[u8]) -> ContentType {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return ContentType::Unknown;
        }

        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(_) if byte_control_ratio(raw) > self.config.binary_ratio => {
                return ContentType::Binary;
            }
            // Legacy 8-bit text
            Err(_) => return ContentType::Plain,
        };

        if let Some(format) = detect_structured(text) {
            return ContentType::Structured(format);
        }
        if is_pem(text) {
            return ContentType::Credential;
        }
        if control_ratio(text) > self.config.binary_ratio {
            return ContentType::Binary;
        }
        ContentType::Plain
    }

    fn should_externalize(&self, raw: &[u8], detected: ContentType) -> bool {
        match detected {
            ContentType::Unknown => false,
            t if t.is_opaque() => true,
            // Not representable inline without loss
            _ if std::str::from_utf8(raw).is_err() => true,
            _ => {
                raw.len() > self.config.size_threshold
                    || line_count(raw) > self.config.line_threshold
            }
        }
    }
}

/// Lowercase hex SHA-256
pub fn checksum(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

fn detect_structured(text: &str) -> Option<StructuredFormat> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
            if v.is_object() || v.is_array() {
                return Some(StructuredFormat::Json);
            }
        }
    }

    // A single `key: value` line is configuration text, not a document
    if text.trim().lines().count() < 2 {
        return None;
    }
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(serde_yaml::Value::Mapping(_)) | Ok(serde_yaml::Value::Sequence(_)) => {
            Some(StructuredFormat::Yaml)
        }
        _ => None,
    }
}

fn is_pem(text: &str) -> bool {
    PEM_BEGIN.is_match(text) && PEM_END.is_match(text)
}

/// Share of control characters, ignoring tab, CR and LF
fn control_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut control = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
            control += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        control as f64 / total as f64
    }
}

/// Same measure over bytes that are not UTF-8. C0, DEL and the C1 range
/// count as control; the rest of the high half is Latin-1 text.
fn byte_control_ratio(raw: &[u8]) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    let control = raw
        .iter()
        .filter(|b| match **b {
            b'\t' | b'\n' | b'\r' => false,
            0x00..=0x1f | 0x7f..=0x9f => true,
            _ => false,
        })
        .count();
    control as f64 / raw.len() as f64
}

fn line_count(raw: &[u8]) -> usize {
    let newlines = raw.iter().filter(|b| **b == b'\n').count();
    if raw.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

fn format_value(raw: &[u8], detected: ContentType) -> String {
    match detected {
        ContentType::Binary => BASE64.encode(raw),
        ContentType::Unknown => String::new(),
        _ => {
            let text = String::from_utf8_lossy(raw);
            match detected {
                ContentType::Structured(StructuredFormat::Json) => {
                    serde_json::from_str::<serde_json::Value>(&text)
                        .and_then(|v| serde_json::to_string_pretty(&v))
                        .unwrap_or_else(|_| text.to_string())
                }
                ContentType::Structured(StructuredFormat::Yaml) => {
                    serde_yaml::from_str::<serde_yaml::Value>(&text)
                        .and_then(|v| serde_yaml::to_string(&v))
                        .unwrap_or_else(|_| text.to_string())
                }
                ContentType::Credential => {
                    let mut pem = text.trim().replace("\r\n", "\n");
                    pem.push('\n');
                    pem
                }
                _ => text.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIUQ\n-----END CERTIFICATE-----\n";

    fn classifier() -> ValueClassifier {
        ValueClassifier::default()
    }

    #[test]
    fn test_short_plain_stays_inline() {
        let raw = b"the quick brown fox jumps over the lazy dog, twice";
        assert_eq!(raw.len(), 50);
        let v = classifier().classify("motto", raw);
        assert_eq!(v.detected_type, ContentType::Plain);
        assert!(!v.should_externalize);
        assert_eq!(v.formatted_value, String::from_utf8_lossy(raw));
    }

    #[test]
    fn test_pem_always_external() {
        let v = classifier().classify("tls.crt", PEM.as_bytes());
        assert_eq!(v.detected_type, ContentType::Credential);
        assert!(v.should_externalize);
    }

    #[test]
    fn test_json_detection_and_pretty_format() {
        let v = classifier().classify("settings.json", br#"{"a":1,"b":[true]}"#);
        assert_eq!(v.detected_type, ContentType::Structured(StructuredFormat::Json));
        assert!(v.formatted_value.contains("\n  \"a\": 1"));
        assert!(!v.should_externalize);
    }

    #[test]
    fn test_json_scalar_is_not_structured() {
        let v = classifier().classify("port", b"8080");
        assert_eq!(v.detected_type, ContentType::Plain);
    }

    #[test]
    fn test_yaml_needs_multiple_lines() {
        let one_line = classifier().classify("k", b"level: debug");
        assert_eq!(one_line.detected_type, ContentType::Plain);

        let doc = classifier().classify("app.yaml", b"server:\n  port: 8080\n  host: 0.0.0.0\n");
        assert_eq!(doc.detected_type, ContentType::Structured(StructuredFormat::Yaml));
    }

    #[test]
    fn test_binary_detection() {
        let png: &[u8] = &[
            0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01,
        ];
        let logo = classifier().classify("logo.png", png);
        assert_eq!(logo.detected_type, ContentType::Binary);
        assert!(logo.should_externalize);
        assert_eq!(logo.formatted_value, BASE64.encode(png));

        let control = classifier().classify("blob", &[1, 2, 3, 4, b'a']);
        assert_eq!(control.detected_type, ContentType::Binary);
    }

    #[test]
    fn test_latin1_text_is_not_binary() {
        let raw = b"caf\xe9 cr\xe8me br\xfbl\xe9e, na\xefve fa\xe7ade\n";
        assert!(std::str::from_utf8(raw).is_err());

        let v = classifier().classify("menu.txt", raw);
        assert_eq!(v.detected_type, ContentType::Plain);
        // Kept byte-exact in a file
        assert!(v.should_externalize);
        assert_eq!(v.raw, raw.to_vec());
    }

    #[test]
    fn test_empty_is_unknown() {
        let v = classifier().classify("empty", b"");
        assert_eq!(v.detected_type, ContentType::Unknown);
        assert!(!v.should_externalize);
    }

    #[test]
    fn test_thresholds() {
        let c = ValueClassifier::new(ClassifierConfig {
            size_threshold: 16,
            line_threshold: 3,
            ..ClassifierConfig::default()
        });
        assert!(c.classify("long", &[b'x'; 17]).should_externalize);
        assert!(!c.classify("short", &[b'x'; 16]).should_externalize);
        assert!(c.classify("lines", b"a\nb\nc\nd").should_externalize);
        assert!(!c.classify("lines", b"a\nb\nc\n").should_externalize);
    }

    #[test]
    fn test_checksum_ignores_key() {
        let a = classifier().classify("a", b"same bytes");
        let b = classifier().classify("b", b"same bytes");
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.checksum.len(), 64);
        assert!(a.checksum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a.checksum, classifier().classify("a", b"other bytes").checksum);
    }
}
