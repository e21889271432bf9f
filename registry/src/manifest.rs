//! OCI image manifest types
//!
//! A caravan artifact is a manifest whose config descriptor and single layer
//! descriptor both point at the same blob. Manifests are content-addressed,
//! so serialization must be deterministic: fields are typed structs with a
//! fixed order and annotations are kept in a sorted map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Media type for OCI image manifests
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media type for workflow YAML payloads
pub const YAML_MEDIA_TYPE: &str = "application/yaml";

/// Media type for agent card JSON payloads
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Annotation key carrying the original filename of a layer
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// A content descriptor: media type, digest, and size of one blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl OciDescriptor {
    /// Describe a blob with the given media type and filename annotation
    pub fn for_file(media_type: &str, digest: &str, size: u64, filename: &str) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(TITLE_ANNOTATION.to_string(), filename.to_string());
        Self {
            media_type: media_type.to_string(),
            digest: digest.to_string(),
            size,
            annotations,
        }
    }

    /// The filename recorded in the title annotation, if any
    pub fn title(&self) -> Option<&str> {
        self.annotations.get(TITLE_ANNOTATION).map(String::as_str)
    }
}

/// An OCI image manifest (schemaVersion 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciManifest {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    pub config: OciDescriptor,
    pub layers: Vec<OciDescriptor>,
}

impl OciManifest {
    /// Build a single-file artifact manifest.
    ///
    /// Config and layer reuse the same descriptor, so the artifact is exactly
    /// one blob plus this manifest.
    pub fn single_file(descriptor: OciDescriptor, artifact_type: Option<String>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(MANIFEST_MEDIA_TYPE.to_string()),
            artifact_type,
            config: descriptor.clone(),
            layers: vec![descriptor],
        }
    }

    /// Serialize to the canonical byte form used for digesting.
    ///
    /// Struct field order is fixed and annotations are sorted, so the same
    /// manifest always produces the same bytes in any process.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256_digest;

    fn sample_manifest() -> OciManifest {
        let content = b"metadata: {}";
        let descriptor = OciDescriptor::for_file(
            YAML_MEDIA_TYPE,
            &sha256_digest(content),
            content.len() as u64,
            "pipeline.yaml",
        );
        OciManifest::single_file(descriptor, Some(YAML_MEDIA_TYPE.to_string()))
    }

    #[test]
    fn test_canonical_serialization_is_stable() {
        let manifest = sample_manifest();
        let first = manifest.to_canonical_json().unwrap();
        let second = manifest.to_canonical_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(sha256_digest(&first), sha256_digest(&second));
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = sample_manifest();
        let bytes = manifest.to_canonical_json().unwrap();
        let parsed: OciManifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.schema_version, 2);
        assert_eq!(parsed.layers.len(), 1);
        assert_eq!(parsed.config, parsed.layers[0]);
    }

    #[test]
    fn test_camel_case_field_names() {
        let manifest = sample_manifest();
        let json: serde_json::Value =
            serde_json::from_slice(&manifest.to_canonical_json().unwrap()).unwrap();
        assert_eq!(json["schemaVersion"], 2);
        assert_eq!(json["mediaType"], MANIFEST_MEDIA_TYPE);
        assert!(json["layers"][0]["mediaType"].is_string());
    }

    #[test]
    fn test_descriptor_title() {
        let manifest = sample_manifest();
        assert_eq!(manifest.layers[0].title(), Some("pipeline.yaml"));
    }
}
