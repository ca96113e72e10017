use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A SARIF log: one or more runs plus whatever other top-level properties the
/// producer wrote. Unknown properties round-trip untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultDocument {
    /// SARIF format version, e.g. "2.1.0". `None` only for an empty merge.
    pub version: Option<String>,
    pub runs: Vec<Run>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One analysis invocation for one target/language.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
    /// Findings, opaque to this crate.
    pub results: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_details: Option<AutomationDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AutomationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Run {
    /// Name of the tool that produced this run, if declared.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool
            .as_ref()
            .and_then(|t| t.driver.as_ref())
            .and_then(|d| d.name.as_deref())
    }

    pub fn automation_id(&self) -> Option<&str> {
        self.automation_details
            .as_ref()
            .and_then(|a| a.id.as_deref())
    }
}

impl ResultDocument {
    /// Total number of findings across all runs.
    pub fn result_count(&self) -> usize {
        self.runs.iter().map(|r| r.results.len()).sum()
    }

    /// Distinct tool names, in first-seen order.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.runs.iter().filter_map(Run::tool_name) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// `owner/repo` coordinates of the destination repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryNwo {
    pub owner: String,
    pub repo: String,
}

impl RepositoryNwo {
    pub fn parse(input: &str) -> Result<Self, crate::UploadError> {
        match input.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(crate::UploadError::Configuration(format!(
                "\"{input}\" is not a valid repository name, expected owner/repo"
            ))),
        }
    }
}

impl std::fmt::Display for RepositoryNwo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Opaque handle returned by the service for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
