//! Caravan CLI
//!
//! Runs and publishes workflows against an OCI registry of agents.
//!
//! Usage:
//!   caravan workflow run review-pipeline --input '{"document": "..."}'
//!   caravan workflow push pipelines/review.yaml
//!   caravan workflow list
//!   caravan agent push echo-card.json
//!   caravan agent find text-analysis
//!   caravan agent list

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use caravan::config::CaravanFileConfig;
use caravan::discovery::{AgentCard, Discovery};
use caravan::engine::Engine;
use caravan_registry::RegistryClient;

#[derive(Parser)]
#[command(name = "caravan")]
#[command(about = "Declarative multi-agent workflow orchestration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OCI registry URL
    #[arg(long, env = "CARAVAN_REGISTRY_URL", global = true)]
    registry: Option<String>,

    /// Increase log verbosity for the caravan crates (-v info, -vv debug,
    /// -vvv traces dependencies too). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow management and execution
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Agent management
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Run a workflow from the registry
    Run {
        /// Workflow id (e.g. "review-pipeline")
        workflow_id: String,

        /// Initial input as a JSON object
        #[arg(long, short, default_value = "{}")]
        input: String,

        /// Workflow version tag
        #[arg(long)]
        version: Option<String>,

        /// Write the run result to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a workflow file and push it to the registry
    Push {
        /// Path to the workflow YAML file
        file: PathBuf,

        /// Tag to publish under
        #[arg(long, default_value = "v1")]
        tag: String,
    },
    /// List workflows available in the registry
    List,
    /// List published tags of a workflow
    Tags {
        /// Workflow id
        workflow_id: String,
    },
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Push an agent card to the registry
    Push {
        /// Path to the agent card JSON file
        file: PathBuf,

        /// Tag to publish under
        #[arg(long, default_value = "v1")]
        tag: String,
    },
    /// Find the agent providing a skill
    Find {
        /// Skill id
        skill: String,
    },
    /// List agents available in the registry
    List,
}

/// Initialize tracing
///
/// `-v` raises the level of the caravan crates only (step dispatch, catalog
/// scans, artifact pushes); reqwest/hyper noise stays at warn until `-vvv`
/// opens the full firehose. A set `RUST_LOG` replaces the whole filter.
fn init_tracing(verbosity: u8) {
    let filter = if let Ok(spec) = std::env::var("RUST_LOG") {
        tracing_subscriber::EnvFilter::new(spec)
    } else if verbosity >= 3 {
        tracing_subscriber::EnvFilter::new("trace")
    } else {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        tracing_subscriber::EnvFilter::new(format!(
            "warn,caravan={level},caravan_registry={level}"
        ))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = CaravanFileConfig::load()?;
    let registry_url = cli
        .registry
        .unwrap_or_else(|| file_config.registry.url.clone());

    let registry = RegistryClient::new(&registry_url);
    let discovery = Arc::new(
        Discovery::new(registry).with_default_tag(file_config.engine.default_tag.clone()),
    );

    match cli.command {
        Commands::Workflow { command } => run_workflow_command(command, discovery).await,
        Commands::Agent { command } => run_agent_command(command, discovery).await,
    }
}

async fn run_workflow_command(command: WorkflowCommands, discovery: Arc<Discovery>) -> Result<()> {
    match command {
        WorkflowCommands::Run {
            workflow_id,
            input,
            version,
            output,
        } => {
            let input: serde_json::Value =
                serde_json::from_str(&input).context("--input must be valid JSON")?;
            let serde_json::Value::Object(input) = input else {
                return Err(anyhow!("--input must be a JSON object"));
            };

            let engine = Engine::new(discovery);
            match engine.run(&workflow_id, input, version.as_deref()).await {
                Ok(result) => {
                    let rendered = serde_json::to_string_pretty(&result)?;
                    match output {
                        Some(path) => {
                            std::fs::write(&path, rendered)?;
                            println!("Run result written to {}", path.display());
                        }
                        None => println!("{}", rendered),
                    }
                }
                Err(failure) => {
                    eprintln!("Workflow failed: {}", failure.error);
                    if !failure.step_outputs.is_empty() {
                        eprintln!(
                            "Completed step outputs:\n{}",
                            serde_json::to_string_pretty(&failure.step_outputs)?
                        );
                    }
                    std::process::exit(1);
                }
            }
        }

        WorkflowCommands::Push { file, tag } => {
            let yaml = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let (workflow_id, digest) = discovery.publish_workflow(&yaml, Some(&tag)).await?;
            println!("Pushed workflow '{}' at tag '{}' ({})", workflow_id, tag, digest);
        }

        WorkflowCommands::List => {
            let workflows = discovery.list_workflows().await?;
            if workflows.is_empty() {
                println!("No workflows in registry.");
            } else {
                println!("Available workflows:");
                for id in workflows {
                    println!("  {}", id);
                }
            }
        }

        WorkflowCommands::Tags { workflow_id } => {
            let repo = format!("workflows/{}", workflow_id);
            let tags = discovery.registry().list_tags(&repo).await?;
            for tag in tags {
                println!("{}", tag);
            }
        }
    }

    Ok(())
}

async fn run_agent_command(command: AgentCommands, discovery: Arc<Discovery>) -> Result<()> {
    match command {
        AgentCommands::Push { file, tag } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let card: AgentCard =
                serde_json::from_slice(&content).context("invalid agent card JSON")?;
            let digest = discovery.publish_agent(&card, Some(&tag)).await?;
            println!("Pushed agent '{}' at tag '{}' ({})", card.name, tag, digest);
        }

        AgentCommands::Find { skill } => match discovery.find_agent_for_skill(&skill).await {
            Ok(url) => println!("{}", url),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },

        AgentCommands::List => {
            let agents = discovery.list_agents().await?;
            if agents.is_empty() {
                println!("No agents in registry.");
            } else {
                println!("Available agents:");
                for name in agents {
                    println!("  {}", name);
                }
            }
        }
    }

    Ok(())
}
