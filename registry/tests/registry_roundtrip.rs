//! Registry client tests against a mock OCI registry

use caravan_registry::{
    sha256_digest, OciDescriptor, OciManifest, RegistryClient, RegistryError, MANIFEST_MEDIA_TYPE,
    YAML_MEDIA_TYPE,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WORKFLOW_YAML: &[u8] = b"metadata:\n  id: demo\nsteps: []\n";

fn sample_manifest(content: &[u8], filename: &str) -> OciManifest {
    let descriptor = OciDescriptor::for_file(
        YAML_MEDIA_TYPE,
        &sha256_digest(content),
        content.len() as u64,
        filename,
    );
    OciManifest::single_file(descriptor, Some(YAML_MEDIA_TYPE.to_string()))
}

#[tokio::test]
async fn push_artifact_uploads_blob_and_manifest() {
    let server = MockServer::start().await;
    let blob_digest = sha256_digest(WORKFLOW_YAML);

    Mock::given(method("HEAD"))
        .and(path(format!("/v2/workflows/demo/blobs/{}", blob_digest)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/workflows/demo/blobs/uploads/"))
        .and(query_param("digest", blob_digest.clone()))
        .and(header("Content-Type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let manifest_bytes = sample_manifest(WORKFLOW_YAML, "demo.yaml")
        .to_canonical_json()
        .unwrap();
    let manifest_digest = sha256_digest(&manifest_bytes);

    Mock::given(method("PUT"))
        .and(path("/v2/workflows/demo/manifests/v1"))
        .and(header("Content-Type", MANIFEST_MEDIA_TYPE))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Docker-Content-Digest", &*manifest_digest),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let pushed = client
        .push_artifact(
            "workflows/demo",
            "v1",
            WORKFLOW_YAML,
            "demo.yaml",
            YAML_MEDIA_TYPE,
            Some(YAML_MEDIA_TYPE),
        )
        .await
        .unwrap();

    assert_eq!(pushed, manifest_digest);
}

#[tokio::test]
async fn upload_blob_is_skipped_when_blob_exists() {
    let server = MockServer::start().await;
    let blob_digest = sha256_digest(WORKFLOW_YAML);

    Mock::given(method("HEAD"))
        .and(path(format!("/v2/workflows/demo/blobs/{}", blob_digest)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Upload must not be attempted when the registry already has the blob
    Mock::given(method("POST"))
        .and(path("/v2/workflows/demo/blobs/uploads/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let uploaded = client
        .upload_blob("workflows/demo", WORKFLOW_YAML)
        .await
        .unwrap();

    assert_eq!(uploaded, blob_digest);
}

#[tokio::test]
async fn pull_artifact_returns_named_file_with_verified_content() {
    let server = MockServer::start().await;
    let manifest = sample_manifest(WORKFLOW_YAML, "demo.yaml");
    let blob_digest = sha256_digest(WORKFLOW_YAML);

    Mock::given(method("GET"))
        .and(path("/v2/workflows/demo/manifests/v1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(manifest.to_canonical_json().unwrap()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/workflows/demo/blobs/{}", blob_digest)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(WORKFLOW_YAML))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let files = client.pull_artifact("workflows/demo", "v1").await.unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "demo.yaml");
    assert_eq!(files[0].content, WORKFLOW_YAML);
    // Round-trip preserves the digest
    assert_eq!(sha256_digest(&files[0].content), blob_digest);
}

#[tokio::test]
async fn pull_blob_rejects_tampered_content() {
    let server = MockServer::start().await;
    let blob_digest = sha256_digest(WORKFLOW_YAML);

    Mock::given(method("GET"))
        .and(path(format!("/v2/workflows/demo/blobs/{}", blob_digest)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"tampered bytes"[..]))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let err = client
        .pull_blob("workflows/demo", &blob_digest)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Integrity { .. }));
}

#[tokio::test]
async fn missing_manifest_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/workflows/absent/manifests/v1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let err = client
        .pull_manifest("workflows/absent", "v1")
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn catalog_lists_repositories() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "repositories": ["agents/echo", "workflows/a", "workflows/b", "workflows/c"]
        })))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let repos = client.list_repositories().await.unwrap();

    let workflows: Vec<_> = repos
        .iter()
        .filter(|r| r.starts_with("workflows/"))
        .collect();
    assert_eq!(workflows.len(), 3);
}

#[tokio::test]
async fn catalog_failure_is_treated_as_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let repos = client.list_repositories().await.unwrap();
    assert!(repos.is_empty());
}

#[tokio::test]
async fn pushed_workflows_catalog_and_round_trip() {
    let server = MockServer::start().await;
    let client = RegistryClient::new(&server.uri());

    let documents: Vec<(String, Vec<u8>)> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|id| {
            (
                format!("workflows/{}", id),
                format!("metadata:\n  id: {}\n", id).into_bytes(),
            )
        })
        .collect();

    for (repo, content) in &documents {
        let blob_digest = sha256_digest(content);
        let manifest = sample_manifest(content, "workflow.yaml");

        Mock::given(method("HEAD"))
            .and(path(format!("/v2/{}/blobs/{}", repo, blob_digest)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v2/{}/blobs/uploads/", repo)))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/v2/{}/manifests/v1", repo)))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}/manifests/v1", repo)))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(manifest.to_canonical_json().unwrap()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}/blobs/{}", repo, blob_digest)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "repositories": ["workflows/alpha", "workflows/beta", "workflows/gamma"]
        })))
        .mount(&server)
        .await;

    for (repo, content) in &documents {
        client
            .push_artifact(repo, "v1", content, "workflow.yaml", YAML_MEDIA_TYPE, None)
            .await
            .unwrap();
    }

    let repos = client.list_repositories().await.unwrap();
    assert_eq!(repos.len(), 3);
    assert!(repos.iter().all(|r| r.starts_with("workflows/")));

    for (repo, content) in &documents {
        let files = client.pull_artifact(repo, "v1").await.unwrap();
        assert_eq!(files[0].content, *content);
        assert_eq!(sha256_digest(&files[0].content), sha256_digest(content));
    }
}

#[tokio::test]
async fn list_tags_returns_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/workflows/demo/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "workflows/demo",
            "tags": ["v1", "v2"]
        })))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri());
    let tags = client.list_tags("workflows/demo").await.unwrap();
    assert_eq!(tags, vec!["v1".to_string(), "v2".to_string()]);
}
