//! Capability-based discovery
//!
//! Maps a skill id to an agent endpoint, and a workflow id to a validated
//! definition, by scanning the registry catalog. Both directions are cached
//! for the life of the `Discovery` instance; invalidation is manual via
//! `clear_cache`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use caravan_registry::{RegistryClient, RegistryError, JSON_MEDIA_TYPE, YAML_MEDIA_TYPE};

use crate::workflow::{WorkflowDefinition, WorkflowError};

/// Repository prefix for agent card artifacts
pub const AGENT_REPO_PREFIX: &str = "agents/";

/// Repository prefix for workflow artifacts
pub const WORKFLOW_REPO_PREFIX: &str = "workflows/";

/// Tag used when the caller does not name a version
pub const DEFAULT_TAG: &str = "v1";

/// Errors raised by discovery lookups and publishing
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no agent provides skill '{0}'")]
    SkillNotFound(String),

    #[error("workflow '{0}' not found in registry")]
    WorkflowNotFound(String),

    #[error("invalid agent card: {0}")]
    InvalidAgentCard(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// One skill declared by an agent card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

/// An agent descriptor stored under `agents/<name>` in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub url: String,
    pub version: String,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Whether this agent declares the given skill
    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skills.iter().any(|s| s.id == skill_id)
    }
}

/// Cache-backed registry lookups for agents and workflows
///
/// Caches are process-local and unbounded; safe for concurrent use by many
/// engine tasks.
pub struct Discovery {
    registry: RegistryClient,
    default_tag: String,
    skill_cache: RwLock<HashMap<String, String>>,
    workflow_cache: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl Discovery {
    /// Create a discovery service over the given registry
    pub fn new(registry: RegistryClient) -> Self {
        Self {
            registry,
            default_tag: DEFAULT_TAG.to_string(),
            skill_cache: RwLock::new(HashMap::new()),
            workflow_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Override the tag used for agent card pulls and unversioned workflows
    pub fn with_default_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_tag = tag.into();
        self
    }

    /// The registry this discovery reads from
    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Find the endpoint URL of an agent providing `skill_id`.
    ///
    /// Scans every `agents/` repository in the catalog until one declares the
    /// skill. When several agents declare the same skill, whichever the
    /// catalog yields first wins; callers needing a specific agent should use
    /// distinct skill names. The hit is cached, so at most one scan happens
    /// per skill until `clear_cache`.
    pub async fn find_agent_for_skill(&self, skill_id: &str) -> Result<String, DiscoveryError> {
        if let Some(url) = self.skill_cache.read().await.get(skill_id) {
            tracing::debug!(%skill_id, %url, "skill cache hit");
            return Ok(url.clone());
        }

        tracing::debug!(%skill_id, "scanning registry catalog for skill");
        let repos = self.registry.list_repositories().await?;

        for repo in repos.iter().filter(|r| r.starts_with(AGENT_REPO_PREFIX)) {
            let card = match self.pull_agent_card(repo).await {
                Ok(card) => card,
                Err(e) => {
                    tracing::warn!(%repo, error = %e, "skipping unreadable agent card");
                    continue;
                }
            };

            if card.has_skill(skill_id) {
                tracing::info!(%skill_id, agent = %card.name, url = %card.url, "skill resolved");
                self.skill_cache
                    .write()
                    .await
                    .insert(skill_id.to_string(), card.url.clone());
                return Ok(card.url);
            }
        }

        Err(DiscoveryError::SkillNotFound(skill_id.to_string()))
    }

    /// Load and validate the workflow stored under `workflows/<id>:<version>`
    pub async fn find_workflow(
        &self,
        workflow_id: &str,
        version: Option<&str>,
    ) -> Result<Arc<WorkflowDefinition>, DiscoveryError> {
        let tag = version.unwrap_or(&self.default_tag);
        let cache_key = format!("{}:{}", workflow_id, tag);

        if let Some(workflow) = self.workflow_cache.read().await.get(&cache_key) {
            tracing::debug!(%cache_key, "workflow cache hit");
            return Ok(Arc::clone(workflow));
        }

        let repo = format!("{}{}", WORKFLOW_REPO_PREFIX, workflow_id);
        let files = match self.registry.pull_artifact(&repo, tag).await {
            Ok(files) => files,
            Err(RegistryError::NotFound(_)) => {
                return Err(DiscoveryError::WorkflowNotFound(cache_key));
            }
            Err(e) => return Err(e.into()),
        };

        let yaml = files
            .iter()
            .find(|f| f.name.ends_with(".yaml") || f.name.ends_with(".yml"))
            .ok_or_else(|| {
                DiscoveryError::Workflow(WorkflowError::Validation(format!(
                    "artifact '{}' contains no YAML file",
                    cache_key
                )))
            })?;

        let workflow = Arc::new(WorkflowDefinition::from_yaml_slice(&yaml.content)?);
        tracing::info!(%cache_key, name = %workflow.metadata.name, "workflow loaded");

        self.workflow_cache
            .write()
            .await
            .insert(cache_key, Arc::clone(&workflow));
        Ok(workflow)
    }

    /// Push an agent card to `agents/<name>` under a tag
    pub async fn publish_agent(
        &self,
        card: &AgentCard,
        tag: Option<&str>,
    ) -> Result<String, DiscoveryError> {
        if card.name.is_empty() {
            return Err(DiscoveryError::InvalidAgentCard("name is required".into()));
        }
        url::Url::parse(&card.url)
            .map_err(|e| DiscoveryError::InvalidAgentCard(format!("url '{}': {}", card.url, e)))?;

        let payload = serde_json::to_vec_pretty(card)
            .map_err(|e| DiscoveryError::InvalidAgentCard(e.to_string()))?;
        let repo = format!("{}{}", AGENT_REPO_PREFIX, card.name);
        let filename = format!("{}.json", card.name);

        let digest = self
            .registry
            .push_artifact(
                &repo,
                tag.unwrap_or(&self.default_tag),
                &payload,
                &filename,
                JSON_MEDIA_TYPE,
                Some(JSON_MEDIA_TYPE),
            )
            .await?;
        Ok(digest)
    }

    /// Validate workflow YAML and push it to `workflows/<id>` under a tag.
    ///
    /// Returns the workflow id and the manifest digest.
    pub async fn publish_workflow(
        &self,
        yaml: &[u8],
        tag: Option<&str>,
    ) -> Result<(String, String), DiscoveryError> {
        let workflow = WorkflowDefinition::from_yaml_slice(yaml)?;
        let workflow_id = workflow.metadata.id.clone();

        let repo = format!("{}{}", WORKFLOW_REPO_PREFIX, workflow_id);
        let filename = format!("{}.yaml", workflow_id);

        let digest = self
            .registry
            .push_artifact(
                &repo,
                tag.unwrap_or(&self.default_tag),
                yaml,
                &filename,
                YAML_MEDIA_TYPE,
                Some(YAML_MEDIA_TYPE),
            )
            .await?;
        Ok((workflow_id, digest))
    }

    /// Names of all agents present in the catalog
    pub async fn list_agents(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.list_with_prefix(AGENT_REPO_PREFIX).await?)
    }

    /// Ids of all workflows present in the catalog
    pub async fn list_workflows(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.list_with_prefix(WORKFLOW_REPO_PREFIX).await?)
    }

    /// Drop both caches; the next lookup rescans the registry
    pub async fn clear_cache(&self) {
        self.skill_cache.write().await.clear();
        self.workflow_cache.write().await.clear();
        tracing::debug!("discovery caches cleared");
    }

    async fn pull_agent_card(&self, repo: &str) -> Result<AgentCard, DiscoveryError> {
        let files = self.registry.pull_artifact(repo, &self.default_tag).await?;
        let file = files.first().ok_or_else(|| {
            DiscoveryError::InvalidAgentCard(format!("artifact '{}' is empty", repo))
        })?;
        serde_json::from_slice(&file.content)
            .map_err(|e| DiscoveryError::InvalidAgentCard(e.to_string()))
    }

    async fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RegistryError> {
        let repos = self.registry.list_repositories().await?;
        Ok(repos
            .into_iter()
            .filter_map(|r| r.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}
