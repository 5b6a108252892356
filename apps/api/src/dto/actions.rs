use std::collections::BTreeMap;

use cloudgate_application::{ActionOutcome, ActionRequest, TargetResult, TargetStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

fn default_dry_run() -> bool {
    true
}

/// Incoming payload for one mutating action.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/perform-action-request.ts"
)]
pub struct PerformActionRequest {
    pub target_resource_ids: Vec<String>,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub override_code: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub params: Value,
}

impl From<PerformActionRequest> for ActionRequest {
    fn from(request: PerformActionRequest) -> Self {
        Self {
            target_resource_ids: request.target_resource_ids,
            dry_run: request.dry_run,
            override_code: request.override_code,
            params: request.params,
        }
    }
}

/// Result for one target of an action.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/target-result-response.ts"
)]
pub struct TargetResultResponse {
    pub status: String,
    #[ts(type = "unknown")]
    pub response: Option<Value>,
    pub error: Option<String>,
}

impl From<TargetResult> for TargetResultResponse {
    fn from(result: TargetResult) -> Self {
        let status = match result.status {
            TargetStatus::Success => "success",
            TargetStatus::DryRun => "dry_run",
            TargetStatus::Failed => "failed",
            TargetStatus::Denied => "denied",
        };

        Self {
            status: status.to_owned(),
            response: result.response,
            error: result.error,
        }
    }
}

/// API representation of an action outcome.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/action-outcome-response.ts"
)]
pub struct ActionOutcomeResponse {
    pub status: String,
    pub action: String,
    pub resource_ids: Vec<String>,
    pub dry_run: bool,
    pub message: String,
    #[ts(type = "unknown")]
    pub details: Value,
    pub targets: BTreeMap<String, TargetResultResponse>,
}

impl From<ActionOutcome> for ActionOutcomeResponse {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            status: outcome.status.as_str().to_owned(),
            action: outcome.action,
            resource_ids: outcome.resource_ids,
            dry_run: outcome.dry_run,
            message: outcome.message,
            details: outcome.details,
            targets: outcome
                .targets
                .into_iter()
                .map(|(resource_id, result)| (resource_id, TargetResultResponse::from(result)))
                .collect(),
        }
    }
}
