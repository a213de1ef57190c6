//! packgen Core - shared types for turning Kubernetes manifests into packs
//!
//! This crate provides the foundational types used throughout packgen:
//! - `SourceObject`: one manifest document with its Group/Version/Kind
//! - `ResourceKey`: identity of a reference target (group, kind, namespace, name)
//! - `fields`: typed, non-coercing accessors over the property tree
//! - `Values`: configuration values with deep merge support
//! - `Pack`: the Pack.yaml document emitted for the generated package

pub mod error;
pub mod fields;
pub mod pack;
pub mod resource;
pub mod values;

pub use error::{CoreError, Result};
pub use fields::{Field, ValueKind};
pub use pack::{Pack, PackKind, PackMetadata, PACK_API_VERSION};
pub use resource::{ResourceKey, SourceObject, is_cluster_scoped, known_group, split_api_version};
pub use values::Values;
