use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use drift_engine::{AgentIdentity, AgentSettings, ArtifactSettings, RetrySettings, TriggerTargets};

use crate::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "drift", version, about = "Self-draining IaC drift scan queue")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mark every active repository PENDING and scan the backlog.
    Reset,
    /// Scan whatever is still PENDING.
    Drain,
    /// Run one report job from a JSON payload.
    Job {
        #[arg(long)]
        payload: String,
    },
    /// Analyze drift from a CI/CD log.
    Cicd {
        #[arg(long, required_unless_present = "from_file", conflicts_with = "from_file")]
        log: Option<String>,
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Add repositories to the backlog, or replace existing rows.
    Add {
        #[arg(required = true)]
        repos: Vec<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Print the backlog.
    List,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    #[arg(long, env = "AGENT_ENDPOINT", default_value = "http://127.0.0.1:8080")]
    pub agent_endpoint: String,
    #[arg(long, env = "AGENT_ID", default_value = "drift-report-agent")]
    pub agent_id: String,
    #[arg(long, env = "AGENT_ALIAS_ID", default_value = "live")]
    pub agent_alias_id: String,
    #[arg(long, env = "AGENT_MAX_RETRIES", default_value_t = 5)]
    pub agent_max_retries: u32,
    #[arg(long, env = "ORCHESTRATOR_NAME", default_value = "iacScanOrchestrator")]
    pub orchestrator_name: String,
    #[arg(long, env = "WORKFLOW_NAME", default_value = "DriftReportWorkflow")]
    pub workflow_name: String,
    #[arg(long, env = "ARTIFACT_DIR", default_value = "artifacts")]
    pub artifact_dir: PathBuf,
    #[arg(long, env = "ARTIFACT_BUCKET", default_value = "html-ai-gen")]
    pub artifact_bucket: String,
    /// Defaults to the bucket's static website endpoint.
    #[arg(long, env = "ARTIFACT_WEBSITE_BASE")]
    pub artifact_website_base: Option<String>,
    #[arg(long, env = "BACKLOG_FILE", default_value = "backlog.ron")]
    pub backlog_file: PathBuf,
    #[arg(long, env = "LOG_DESTINATION", value_enum, default_value_t = LogDestination::Terminal)]
    pub log_destination: LogDestination,
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "LOG_FILE", default_value = "drift.log")]
    pub log_file: PathBuf,
}

impl Settings {
    pub fn agent(&self) -> AgentSettings {
        AgentSettings {
            endpoint: self.agent_endpoint.clone(),
            ..AgentSettings::default()
        }
    }

    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            agent_id: self.agent_id.clone(),
            alias_id: self.agent_alias_id.clone(),
        }
    }

    pub fn retry(&self) -> RetrySettings {
        RetrySettings {
            max_retries: self.agent_max_retries,
            ..RetrySettings::default()
        }
    }

    pub fn targets(&self) -> TriggerTargets {
        TriggerTargets {
            orchestrator: self.orchestrator_name.clone(),
            workflow: self.workflow_name.clone(),
        }
    }

    pub fn artifacts(&self) -> ArtifactSettings {
        let mut settings = ArtifactSettings::for_bucket(&self.artifact_bucket);
        if let Some(base) = &self.artifact_website_base {
            settings.website_base = base.clone();
        }
        settings
    }
}
