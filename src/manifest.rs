//! Wire manifest types
//!
//! The envelope uses camelCase keys; task configuration payloads keep the
//! snake_case keys produced by the converter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TaskGraphError};
use crate::expr::extract_runtime_refs;
use crate::task::config::ResourceScope;
use crate::task::TaskKind;

pub const API_VERSION: &str = "agentic.stigmer.ai/v1";
pub const KIND: &str = "Workflow";
pub const SDK_LANGUAGE: &str = "rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LANGUAGE_ANNOTATION: &str = "sdk.stigmer.ai/language";
pub const VERSION_ANNOTATION: &str = "sdk.stigmer.ai/version";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: WorkflowSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    pub owner_scope: ResourceScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub document: DocumentSpec,
    pub tasks: Vec<WireTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_spec: Option<EnvSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub dsl: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One task on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    pub name: String,
    pub kind: TaskKind,
    pub task_config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowControl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    #[serde(rename = "as")]
    pub directive: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowControl {
    pub then: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    pub data: BTreeMap<String, EnvValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub is_secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowManifest {
    pub fn to_json_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(TaskGraphError::serialization)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(TaskGraphError::serialization)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(TaskGraphError::serialization)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(TaskGraphError::serialization)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(TaskGraphError::serialization)
    }

    pub fn task(&self, name: &str) -> Option<&WireTask> {
        self.spec.tasks.iter().find(|t| t.name == name)
    }

    /// Every runtime placeholder used in any task config, first-seen order.
    ///
    /// Only whole `${.secrets.KEY}` / `${.env_vars.NAME}` placeholders are
    /// listed. A secret folded into a larger expression by
    /// [`interpolate`](crate::expr::interpolate) renders as a bare
    /// `.secrets.KEY` operand and is not reported.
    pub fn runtime_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for task in &self.spec.tasks {
            collect_runtime_refs(&task.task_config, &mut refs);
        }
        refs
    }
}

fn collect_runtime_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for r in extract_runtime_refs(s) {
                if !out.contains(&r) {
                    out.push(r);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_runtime_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_runtime_refs(v, out)),
        _ => {}
    }
}

// ============================================================================
// BUNDLE
// ============================================================================

/// Several manifests plus the SDK that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestBundle {
    pub sdk_metadata: SdkMetadata,
    pub workflows: Vec<WorkflowManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkMetadata {
    pub language: String,
    pub version: String,
    /// RFC 3339 UTC timestamp
    pub generated_at: String,
}

impl SdkMetadata {
    pub fn current() -> Self {
        Self {
            language: SDK_LANGUAGE.to_string(),
            version: SDK_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

impl ManifestBundle {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(TaskGraphError::serialization)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(TaskGraphError::serialization)
    }
}
