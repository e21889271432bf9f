//! OCI Distribution HTTP client
//!
//! Speaks the subset of the Distribution API needed to store and retrieve
//! single-file artifacts: catalog listing, tag listing, monolithic blob
//! upload, manifest upload under a tag, and digest-verified pulls.
//!
//! Nothing is retried at this layer; callers decide their own policy.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::digest;
use crate::manifest::{OciDescriptor, OciManifest, MANIFEST_MEDIA_TYPE};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Errors surfaced by registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("registry returned {status}: {body}")]
    Registry { status: u16, body: String },

    #[error("manifest serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One file recovered from an artifact pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    tags: Option<Vec<String>>,
}

/// Client for one OCI registry
///
/// Holds a pooled HTTP client and the registry base URL; safe to share and
/// use concurrently.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: Client,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url` (e.g. `http://localhost:5000`)
    pub fn new(base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// The registry base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all repositories in the registry catalog.
    ///
    /// A non-2xx response is treated as an empty catalog; connection failures
    /// surface as `Network`.
    pub async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/_catalog", self.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "catalog request not successful");
            return Ok(Vec::new());
        }

        let catalog: CatalogResponse = response.json().await?;
        Ok(catalog.repositories)
    }

    /// List tags for a repository
    pub async fn list_tags(&self, repo: &str) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/{}/tags/list", self.base_url, repo);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(repo.to_string()));
        }
        let response = Self::check_status(response).await?;

        let tag_list: TagListResponse = response.json().await?;
        Ok(tag_list.tags.unwrap_or_default())
    }

    /// Check whether a blob exists
    pub async fn blob_exists(&self, repo: &str, digest: &str) -> Result<bool, RegistryError> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url, repo, digest);
        let response = self.http.head(&url).send().await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Upload a blob with a monolithic POST, returning its digest.
    ///
    /// Uploads are idempotent under digest: if the registry already has the
    /// content the upload is skipped.
    pub async fn upload_blob(&self, repo: &str, content: &[u8]) -> Result<String, RegistryError> {
        let blob_digest = digest::sha256_digest(content);

        if self.blob_exists(repo, &blob_digest).await? {
            tracing::debug!(%repo, digest = %blob_digest, "blob already present, skipping upload");
            return Ok(blob_digest);
        }

        let url = format!(
            "{}/v2/{}/blobs/uploads/?digest={}",
            self.base_url, repo, blob_digest
        );
        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .body(content.to_vec())
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(Self::registry_error(response).await);
        }

        tracing::debug!(%repo, digest = %blob_digest, size = content.len(), "blob uploaded");
        Ok(blob_digest)
    }

    /// Upload a manifest under a tag, returning the manifest digest.
    ///
    /// The digest comes from the `Docker-Content-Digest` response header when
    /// present, otherwise it is recomputed from the uploaded bytes.
    pub async fn upload_manifest(
        &self,
        repo: &str,
        tag: &str,
        manifest_bytes: &[u8],
        media_type: &str,
    ) -> Result<String, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, tag);
        let response = self
            .http
            .put(&url)
            .header("Content-Type", media_type)
            .body(manifest_bytes.to_vec())
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(Self::registry_error(response).await);
        }

        let manifest_digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| digest::sha256_digest(manifest_bytes));

        tracing::debug!(%repo, %tag, digest = %manifest_digest, "manifest uploaded");
        Ok(manifest_digest)
    }

    /// Fetch and parse the manifest for a tag or digest reference
    pub async fn pull_manifest(
        &self,
        repo: &str,
        reference: &str,
    ) -> Result<OciManifest, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repo, reference);
        let response = self
            .http
            .get(&url)
            .header("Accept", MANIFEST_MEDIA_TYPE)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(format!("{}:{}", repo, reference)));
        }
        let response = Self::check_status(response).await?;

        let manifest: OciManifest = response.json().await?;
        Ok(manifest)
    }

    /// Download a blob and verify its digest
    pub async fn pull_blob(&self, repo: &str, digest: &str) -> Result<Vec<u8>, RegistryError> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url, repo, digest);
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(format!("{}@{}", repo, digest)));
        }
        let response = Self::check_status(response).await?;

        let content = response.bytes().await?.to_vec();
        let actual = digest::sha256_digest(&content);
        if actual != digest {
            return Err(RegistryError::Integrity {
                expected: digest.to_string(),
                actual,
            });
        }

        Ok(content)
    }

    /// Pull every layer of a tagged artifact.
    ///
    /// Filenames come from the layer title annotation when present, otherwise
    /// they are synthesized from the digest.
    pub async fn pull_artifact(
        &self,
        repo: &str,
        tag: &str,
    ) -> Result<Vec<ArtifactFile>, RegistryError> {
        let manifest = self.pull_manifest(repo, tag).await?;

        let mut files = Vec::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            let content = self.pull_blob(repo, &layer.digest).await?;
            files.push(ArtifactFile {
                name: layer
                    .title()
                    .map(str::to_string)
                    .unwrap_or_else(|| synthesize_filename(&layer.digest)),
                content,
            });
        }

        tracing::debug!(%repo, %tag, files = files.len(), "artifact pulled");
        Ok(files)
    }

    /// Push a single file as a tagged artifact, returning the manifest digest.
    ///
    /// The file is uploaded as one blob; the manifest's config and single
    /// layer reuse the same descriptor.
    pub async fn push_artifact(
        &self,
        repo: &str,
        tag: &str,
        content: &[u8],
        filename: &str,
        media_type: &str,
        artifact_type: Option<&str>,
    ) -> Result<String, RegistryError> {
        let blob_digest = self.upload_blob(repo, content).await?;

        let descriptor =
            OciDescriptor::for_file(media_type, &blob_digest, content.len() as u64, filename);
        let manifest = OciManifest::single_file(descriptor, artifact_type.map(str::to_string));
        let manifest_bytes = manifest.to_canonical_json()?;

        let manifest_digest = self
            .upload_manifest(repo, tag, &manifest_bytes, MANIFEST_MEDIA_TYPE)
            .await?;

        tracing::info!(%repo, %tag, digest = %manifest_digest, "artifact pushed");
        Ok(manifest_digest)
    }

    /// Map a non-2xx response to `Registry`, passing 2xx through
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::registry_error(response).await)
        }
    }

    async fn registry_error(response: reqwest::Response) -> RegistryError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RegistryError::Registry { status, body }
    }
}

fn synthesize_filename(layer_digest: &str) -> String {
    let hex_part = layer_digest
        .strip_prefix(digest::SHA256_PREFIX)
        .unwrap_or(layer_digest);
    format!("{}.blob", &hex_part[..hex_part.len().min(12)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = RegistryClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_synthesize_filename() {
        let name = synthesize_filename(
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        );
        assert_eq!(name, "2cf24dba5fb0.blob");
    }
}
