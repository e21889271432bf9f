//! Shared helpers for serving registry artifacts and agent skills from mock
//! HTTP servers

use caravan_registry::{
    sha256_digest, OciDescriptor, OciManifest, JSON_MEDIA_TYPE, YAML_MEDIA_TYPE,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Serve a registry catalog listing
pub async fn mount_catalog(server: &MockServer, repos: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/v2/_catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "repositories": repos })))
        .mount(server)
        .await;
}

/// Serve a single-file artifact: its manifest under the tag plus its blob
pub async fn mount_artifact(
    server: &MockServer,
    repo: &str,
    tag: &str,
    filename: &str,
    content: &[u8],
    media_type: &str,
) {
    let descriptor = OciDescriptor::for_file(
        media_type,
        &sha256_digest(content),
        content.len() as u64,
        filename,
    );
    let manifest = OciManifest::single_file(descriptor.clone(), None);

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/manifests/{}", repo, tag)))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(manifest.to_canonical_json().unwrap()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/{}/blobs/{}", repo, descriptor.digest)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// Serve an agent card declaring the given skills, pointing at `agent_url`
pub async fn mount_agent_card(server: &MockServer, name: &str, agent_url: &str, skills: &[&str]) {
    let card = json!({
        "name": name,
        "url": agent_url,
        "version": "0.1.0",
        "skills": skills
            .iter()
            .map(|s| json!({"id": s, "description": ""}))
            .collect::<Vec<_>>(),
    });
    mount_artifact(
        server,
        &format!("agents/{}", name),
        "v1",
        &format!("{}.json", name),
        &serde_json::to_vec(&card).unwrap(),
        JSON_MEDIA_TYPE,
    )
    .await;
}

/// Serve a workflow YAML artifact under `workflows/<id>:v1`
pub async fn mount_workflow(server: &MockServer, id: &str, yaml: &str) {
    mount_artifact(
        server,
        &format!("workflows/{}", id),
        "v1",
        &format!("{}.yaml", id),
        yaml.as_bytes(),
        YAML_MEDIA_TYPE,
    )
    .await;
}

/// Matches a JSON-RPC request by method and exact params equality.
///
/// Exact equality asserts the params object carries precisely the expected
/// keys, which partial matching cannot.
pub struct ExactCall {
    pub skill: &'static str,
    pub params: serde_json::Value,
}

impl Match for ExactCall {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            return false;
        };
        body["method"] == json!(self.skill) && body["params"] == self.params
    }
}

/// Serve one skill on the agent's /execute endpoint for an exact params match
pub async fn mount_skill(
    agent: &MockServer,
    skill: &'static str,
    params: serde_json::Value,
    result: serde_json::Value,
) {
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(ExactCall { skill, params })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": "1",
        })))
        .mount(agent)
        .await;
}
