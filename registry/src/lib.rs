//! OCI Distribution client for caravan artifacts
//!
//! This crate provides:
//! - Content digests (`sha256:<hex>`) for blob addressing
//! - OCI image manifest types with deterministic serialization
//! - A registry client speaking the OCI Distribution HTTP API
//! - Single-file artifact push/pull (workflow YAML, agent cards)

pub mod client;
pub mod digest;
pub mod manifest;

pub use client::{ArtifactFile, RegistryClient, RegistryError};
pub use digest::sha256_digest;
pub use manifest::{
    OciDescriptor, OciManifest, JSON_MEDIA_TYPE, MANIFEST_MEDIA_TYPE, TITLE_ANNOTATION,
    YAML_MEDIA_TYPE,
};
