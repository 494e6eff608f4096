use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://github\.com/[a-zA-Z0-9_\-]+/[a-zA-Z0-9_\-]+").expect("valid regex")
});

/// Artifact prefix for jobs that are not tied to a repository.
pub const CICD_PREFIX: &str = "cicd_log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    CicdLog,
    FullScan,
}

impl JobType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "cicd_log" => Some(JobType::CicdLog),
            "full_scan" => Some(JobType::FullScan),
            _ => None,
        }
    }
}

/// Payload handed to the downstream workflow when a job is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub query: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

impl JobPayload {
    pub fn full_scan(repo_url: &str) -> Self {
        Self {
            query: format!("Compare drift for every resource in repository {repo_url}"),
            job_type: JobType::FullScan,
        }
    }

    pub fn cicd_log(log_text: &str) -> Self {
        Self {
            query: format!("Analyze drift from CI/CD log: {log_text}"),
            job_type: JobType::CicdLog,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "query": self.query,
            "type": self.job_type,
        })
    }
}

/// Fields pulled out of an arbitrarily nested inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobInputs {
    pub update_remediation: Option<String>,
    pub remove_remediation: Option<String>,
    pub query: Option<String>,
    pub job_type: Option<JobType>,
}

impl JobInputs {
    /// Repository this job scans, when it is a full scan whose query names one.
    pub fn repo_url(&self) -> Option<String> {
        if self.job_type != Some(JobType::FullScan) {
            return None;
        }
        self.query.as_deref().and_then(extract_repo_url)
    }

    /// Prefix used when naming this job's artifact.
    pub fn artifact_prefix(&self) -> String {
        self.repo_url()
            .as_deref()
            .and_then(repo_name)
            .unwrap_or_else(|| CICD_PREFIX.to_string())
    }
}

/// Walks the event and collects the known keys. Matched keys are not
/// descended into; every other value is. Later matches overwrite earlier ones.
pub fn extract_job_inputs(event: &Value) -> JobInputs {
    let mut inputs = JobInputs::default();
    visit(event, &mut inputs);
    inputs
}

fn visit(value: &Value, inputs: &mut JobInputs) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match key.as_str() {
                    "update_remediation" => inputs.update_remediation = Some(text_of(child)),
                    "remove_remediation" => inputs.remove_remediation = Some(text_of(child)),
                    "query" => inputs.query = Some(text_of(child)),
                    "type" => inputs.job_type = child.as_str().and_then(JobType::parse),
                    _ => visit(child, inputs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit(item, inputs);
            }
        }
        _ => {}
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn extract_repo_url(text: &str) -> Option<String> {
    REPO_URL.find(text).map(|m| m.as_str().to_string())
}

/// Last path segment of a repository URL.
pub fn repo_name(repo_url: &str) -> Option<String> {
    let parsed = url::Url::parse(repo_url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repo_url_is_found_inside_free_text() {
        let text = "please compare https://github.com/acme/net-infra now";
        assert_eq!(
            extract_repo_url(text).as_deref(),
            Some("https://github.com/acme/net-infra")
        );
        assert_eq!(extract_repo_url("no link here"), None);
    }

    #[test]
    fn repo_name_is_last_segment() {
        assert_eq!(
            repo_name("https://github.com/acme/net-infra").as_deref(),
            Some("net-infra")
        );
        assert_eq!(repo_name("not a url"), None);
    }

    #[test]
    fn job_payload_serializes_type_tag() {
        let payload = JobPayload::full_scan("https://github.com/acme/a");
        let value = payload.to_value();
        assert_eq!(value["type"], "full_scan");
        assert!(value["query"]
            .as_str()
            .unwrap()
            .ends_with("https://github.com/acme/a"));
    }

    #[test]
    fn non_string_values_are_kept_as_json_text() {
        let inputs = extract_job_inputs(&json!({"update_remediation": {"a": 1}}));
        assert_eq!(inputs.update_remediation.as_deref(), Some(r#"{"a":1}"#));
    }
}
