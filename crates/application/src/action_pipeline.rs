use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use cloudgate_core::{AppError, AppResult, UserIdentity};
use cloudgate_domain::{ActionKind, ActionStatus, ProtectionDecision};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::audit_service::{AuditRecordInput, AuditService, RequestContext};
use crate::provider_ports::{
    AdapterScope, MutationRequest, MutationResult, ProviderAdapter, ProviderError,
};
use crate::protection_service::ProtectionService;
use crate::provider_registry::ProviderRegistry;
use crate::resource_query_service::ResourceQueryService;

/// What to do when only some targets of a batch are protected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialBatchMode {
    /// Deny the whole request on the first protected target.
    #[default]
    Abort,
    /// Drop protected targets and act on the rest.
    SkipProtected,
}

impl PartialBatchMode {
    /// Returns a stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::SkipProtected => "skip_protected",
        }
    }
}

impl Display for PartialBatchMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PartialBatchMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip_protected" => Ok(Self::SkipProtected),
            _ => Err(AppError::Validation(format!(
                "unknown partial batch mode '{value}'"
            ))),
        }
    }
}

/// Process-wide pipeline options, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPipelineOptions {
    /// Partial batch handling.
    pub partial_batch_mode: PartialBatchMode,
    /// Whether protection denials produce audit entries.
    pub audit_protection_denials: bool,
    /// Deadline for one provider mutation.
    pub call_timeout: Duration,
}

impl Default for ActionPipelineOptions {
    fn default() -> Self {
        Self {
            partial_batch_mode: PartialBatchMode::Abort,
            audit_protection_denials: false,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// One caller request to mutate resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    /// Targets in caller order.
    pub target_resource_ids: Vec<String>,
    /// Simulate without changing provider state.
    pub dry_run: bool,
    /// Admin override code for protected resources.
    pub override_code: Option<String>,
    /// Verb specific parameters.
    pub params: Value,
}

impl Default for ActionRequest {
    fn default() -> Self {
        Self {
            target_resource_ids: Vec::new(),
            dry_run: true,
            override_code: None,
            params: Value::Null,
        }
    }
}

/// Per-target status inside an action outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Mutation applied.
    Success,
    /// Mutation simulated.
    DryRun,
    /// Provider call failed.
    Failed,
    /// Skipped by the protection gate.
    Denied,
}

/// Result for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Target status.
    pub status: TargetStatus,
    /// Provider response for this target, when any.
    pub response: Option<Value>,
    /// Caller-safe error description, when any.
    pub error: Option<String>,
}

/// Normalized result of one action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Canonical action name.
    pub action: String,
    /// Overall status.
    pub status: ActionStatus,
    /// Whether the request was a dry run.
    pub dry_run: bool,
    /// Targets that reached the provider.
    pub resource_ids: Vec<String>,
    /// Caller-facing summary.
    pub message: String,
    /// Provider payload, or the error kind on failure.
    pub details: Value,
    /// Per-target results, including denied targets.
    pub targets: BTreeMap<String, TargetResult>,
}

/// Orchestrates gate, execute, audit and invalidate for one mutating action.
#[derive(Clone)]
pub struct ActionPipeline {
    registry: ProviderRegistry,
    protection: ProtectionService,
    audit: AuditService,
    resources: ResourceQueryService,
    options: ActionPipelineOptions,
}

struct GateResult {
    allowed: Vec<String>,
    denied: Vec<(String, String)>,
}

impl ActionPipeline {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        protection: ProtectionService,
        audit: AuditService,
        resources: ResourceQueryService,
        options: ActionPipelineOptions,
    ) -> Self {
        Self {
            registry,
            protection,
            audit,
            resources,
            options,
        }
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> ActionPipelineOptions {
        self.options
    }

    /// Runs one action end to end.
    ///
    /// Every request that reaches the provider is audited once per target before
    /// this returns, whether the provider call succeeded or not. A `Failed`
    /// outcome is returned as `Ok`; errors are reserved for requests that never
    /// reached the provider and for audit persistence failures.
    pub async fn perform_action(
        &self,
        actor: &UserIdentity,
        action_name: &str,
        request: ActionRequest,
        context: &RequestContext,
    ) -> AppResult<ActionOutcome> {
        let kind = ActionKind::parse(action_name)?;
        let targets = normalized_targets(&kind, &request.target_resource_ids)?;
        kind.validate_params(&request.params)?;
        actor.require_role(kind.required_role())?;

        let adapter = self.registry.require(kind.resource_type())?;
        let scope = adapter.scope();
        let override_code = request.override_code.as_deref().filter(|code| !code.is_empty());

        let gate = self.gate(&kind, &targets, override_code).await;
        if !gate.denied.is_empty()
            && (self.options.partial_batch_mode == PartialBatchMode::Abort
                || gate.allowed.is_empty())
        {
            return Err(self
                .deny(actor, &kind, &scope, &request, &gate.denied, context)
                .await);
        }

        if !gate.denied.is_empty() && self.options.audit_protection_denials {
            self.audit_denials(actor, &kind, &scope, &request, &gate.denied, context)
                .await?;
        }

        let mutation = MutationRequest {
            verb: kind.verb(),
            resource_ids: gate.allowed.clone(),
            dry_run: request.dry_run,
            params: request.params.clone(),
        };
        let result = self.execute(adapter.as_ref(), &mutation).await;
        let outcome = build_outcome(&kind, &mutation, &result, &gate.denied);

        let audited = self
            .audit
            .record(AuditRecordInput {
                actor: Some(actor.clone()),
                action: kind.name(),
                resource_type: kind.resource_type().into(),
                resource_ids: gate.allowed.clone(),
                account_id: scope.account_id.clone(),
                region: scope.region.clone(),
                status: outcome.status,
                request_snapshot: request_snapshot(&request, &gate.allowed),
                response_snapshot: response_snapshot(&result),
                context: context.clone(),
            })
            .await;

        // Provider state has changed even when the audit write failed.
        if outcome.status == ActionStatus::Success && !request.dry_run {
            self.resources.invalidate_type(kind.resource_type()).await;
        }
        audited?;

        info!(
            subject = actor.subject(),
            action = outcome.action.as_str(),
            status = outcome.status.as_str(),
            targets = outcome.resource_ids.len(),
            denied = gate.denied.len(),
            "action completed"
        );

        Ok(outcome)
    }

    // Sequential so an early deny short-circuits before later lookups in abort mode.
    async fn gate(
        &self,
        kind: &ActionKind,
        targets: &[String],
        override_code: Option<&str>,
    ) -> GateResult {
        let mut gate = GateResult {
            allowed: Vec::with_capacity(targets.len()),
            denied: Vec::new(),
        };

        for resource_id in targets {
            match self
                .protection
                .check(kind.resource_type(), resource_id, override_code)
                .await
            {
                ProtectionDecision::Allow => gate.allowed.push(resource_id.clone()),
                ProtectionDecision::Deny { reason } => {
                    warn!(
                        action = %kind,
                        resource_id = resource_id.as_str(),
                        override_supplied = override_code.is_some(),
                        "protection gate denied target"
                    );
                    gate.denied.push((resource_id.clone(), reason));
                    if self.options.partial_batch_mode == PartialBatchMode::Abort {
                        break;
                    }
                }
            }
        }

        gate
    }

    async fn deny(
        &self,
        actor: &UserIdentity,
        kind: &ActionKind,
        scope: &AdapterScope,
        request: &ActionRequest,
        denied: &[(String, String)],
        context: &RequestContext,
    ) -> AppError {
        if self.options.audit_protection_denials
            && let Err(error) = self
                .audit_denials(actor, kind, scope, request, denied, context)
                .await
        {
            return error;
        }

        let message = denied
            .iter()
            .map(|(resource_id, reason)| format!("{resource_id}: {reason}"))
            .collect::<Vec<_>>()
            .join("; ");
        AppError::ProtectionDenied(message)
    }

    async fn audit_denials(
        &self,
        actor: &UserIdentity,
        kind: &ActionKind,
        scope: &AdapterScope,
        request: &ActionRequest,
        denied: &[(String, String)],
        context: &RequestContext,
    ) -> AppResult<()> {
        for (resource_id, reason) in denied {
            self.audit
                .record(AuditRecordInput {
                    actor: Some(actor.clone()),
                    action: kind.name(),
                    resource_type: kind.resource_type().into(),
                    resource_ids: vec![resource_id.clone()],
                    account_id: scope.account_id.clone(),
                    region: scope.region.clone(),
                    status: ActionStatus::Failed,
                    request_snapshot: request_snapshot(request, std::slice::from_ref(resource_id)),
                    response_snapshot: json!({
                        "error_kind": "protection_denied",
                        "message": reason,
                    }),
                    context: context.clone(),
                })
                .await?;
        }

        Ok(())
    }

    async fn execute(
        &self,
        adapter: &dyn ProviderAdapter,
        mutation: &MutationRequest,
    ) -> Result<MutationResult, ProviderError> {
        let result = match timeout(self.options.call_timeout, adapter.mutate(mutation)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout("mutate", adapter.resource_type())),
        };

        if let Ok(reported) = &result
            && reported.is_dry_run() != mutation.dry_run
        {
            warn!(
                resource_type = adapter.resource_type().as_str(),
                requested_dry_run = mutation.dry_run,
                reported_dry_run = reported.is_dry_run(),
                "provider adapter reported a different dry-run branch than requested"
            );
        }

        result
    }
}

fn normalized_targets(kind: &ActionKind, target_resource_ids: &[String]) -> AppResult<Vec<String>> {
    if target_resource_ids.is_empty() {
        return Err(AppError::Validation(
            "target_resource_ids must contain at least one id".to_owned(),
        ));
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(target_resource_ids.len());
    for resource_id in target_resource_ids {
        kind.validate_target(resource_id)?;
        let resource_id = resource_id.trim().to_owned();
        if seen.insert(resource_id.clone()) {
            targets.push(resource_id);
        }
    }

    Ok(targets)
}

fn request_snapshot(request: &ActionRequest, resource_ids: &[String]) -> Value {
    let mut snapshot = Map::new();
    snapshot.insert("resource_ids".to_owned(), json!(resource_ids));
    snapshot.insert("dry_run".to_owned(), Value::Bool(request.dry_run));
    snapshot.insert("params".to_owned(), request.params.clone());
    if request
        .override_code
        .as_deref()
        .is_some_and(|code| !code.is_empty())
    {
        snapshot.insert("override_used".to_owned(), Value::Bool(true));
    }

    Value::Object(snapshot)
}

fn response_snapshot(result: &Result<MutationResult, ProviderError>) -> Value {
    match result {
        Ok(reported) => reported.details().clone(),
        Err(error) => json!({
            "error_kind": error.kind.as_str(),
            "message": error.message,
        }),
    }
}

fn build_outcome(
    kind: &ActionKind,
    mutation: &MutationRequest,
    result: &Result<MutationResult, ProviderError>,
    denied: &[(String, String)],
) -> ActionOutcome {
    let count = mutation.resource_ids.len();
    let (status, target_status, mut message, details) = match result {
        Ok(reported) if mutation.dry_run => (
            ActionStatus::DryRun,
            TargetStatus::DryRun,
            format!(
                "dry run: {} would apply to {count} resource(s)",
                kind.verb().as_str()
            ),
            reported.details().clone(),
        ),
        Ok(reported) => (
            ActionStatus::Success,
            TargetStatus::Success,
            format!("{} applied to {count} resource(s)", kind.verb().as_str()),
            reported.details().clone(),
        ),
        Err(error) => (
            ActionStatus::Failed,
            TargetStatus::Failed,
            format!("action '{}' failed at the provider", kind.name()),
            json!({ "error_kind": error.kind.as_str() }),
        ),
    };

    if !denied.is_empty() {
        message.push_str(&format!(
            "; {} protected resource(s) skipped",
            denied.len()
        ));
    }

    let mut targets = BTreeMap::new();
    for resource_id in &mutation.resource_ids {
        let response = match result {
            Ok(reported) => Some(
                reported
                    .details()
                    .get("targets")
                    .and_then(|targets| targets.get(resource_id.as_str()))
                    .cloned()
                    .unwrap_or_else(|| reported.details().clone()),
            ),
            Err(_) => None,
        };
        let error = result
            .as_ref()
            .err()
            .map(|error| format!("provider call failed ({})", error.kind.as_str()));

        targets.insert(
            resource_id.clone(),
            TargetResult {
                status: target_status,
                response,
                error,
            },
        );
    }

    for (resource_id, reason) in denied {
        targets.insert(
            resource_id.clone(),
            TargetResult {
                status: TargetStatus::Denied,
                response: None,
                error: Some(reason.clone()),
            },
        );
    }

    ActionOutcome {
        action: kind.name(),
        status,
        dry_run: mutation.dry_run,
        resource_ids: mutation.resource_ids.clone(),
        message,
        details,
        targets,
    }
}
