use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::{Resource, ResourceType};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::account_ports::{
    AccountAccessVerifier, AccountRepository, ProviderAccount, sort_accounts,
};
use crate::audit_ports::{AuditEntry, AuditEntryFilter, AuditRepository};
use crate::cache_ports::ResourceCache;
use crate::provider_ports::{
    AdapterScope, MutationRequest, MutationResult, ProviderAdapter, ProviderError,
};
use crate::resource_aggregator::ResourceFilters;

pub(crate) fn resource(
    resource_type: ResourceType,
    resource_id: &str,
    name: Option<&str>,
    tags: &[(&str, &str)],
) -> Resource {
    Resource {
        resource_id: resource_id.to_owned(),
        resource_type,
        name: name.map(ToOwned::to_owned),
        region: "us-east-1".to_owned(),
        account_id: "123456789012".to_owned(),
        state: Some("running".to_owned()),
        tags: tags
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect(),
        attributes: BTreeMap::new(),
        monthly_cost: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeProviderCalls {
    pub(crate) lists: usize,
    pub(crate) gets: Vec<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) mutations: Vec<MutationRequest>,
}

pub(crate) struct FakeProviderAdapter {
    resource_type: ResourceType,
    resources: Mutex<Vec<Resource>>,
    read_error: Option<ProviderError>,
    mutate_error: Option<ProviderError>,
    delay: Option<Duration>,
    pub(crate) calls: Mutex<FakeProviderCalls>,
}

impl FakeProviderAdapter {
    pub(crate) fn new(resource_type: ResourceType, resources: Vec<Resource>) -> Self {
        Self {
            resource_type,
            resources: Mutex::new(resources),
            read_error: None,
            mutate_error: None,
            delay: None,
            calls: Mutex::new(FakeProviderCalls::default()),
        }
    }

    pub(crate) fn failing_reads(mut self, error: ProviderError) -> Self {
        self.read_error = Some(error);
        self
    }

    pub(crate) fn failing_mutate(mut self, error: ProviderError) -> Self {
        self.mutate_error = Some(error);
        self
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeProviderAdapter {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn scope(&self) -> AdapterScope {
        AdapterScope {
            account_id: "123456789012".to_owned(),
            region: "us-east-1".to_owned(),
        }
    }

    async fn list(&self, _filters: &ResourceFilters) -> Result<Vec<Resource>, ProviderError> {
        self.calls.lock().await.lists += 1;
        self.pause().await;
        if let Some(error) = &self.read_error {
            return Err(error.clone());
        }

        Ok(self.resources.lock().await.clone())
    }

    async fn get(&self, resource_id: &str) -> Result<Option<Resource>, ProviderError> {
        self.calls.lock().await.gets.push(resource_id.to_owned());
        self.pause().await;
        if let Some(error) = &self.read_error {
            return Err(error.clone());
        }

        Ok(self
            .resources
            .lock()
            .await
            .iter()
            .find(|resource| resource.resource_id == resource_id)
            .cloned())
    }

    async fn tags(&self, resource_id: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        self.calls.lock().await.tags.push(resource_id.to_owned());
        if let Some(error) = &self.read_error {
            return Err(error.clone());
        }

        Ok(self
            .resources
            .lock()
            .await
            .iter()
            .find(|resource| resource.resource_id == resource_id)
            .map(|resource| resource.tags.clone())
            .unwrap_or_default())
    }

    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResult, ProviderError> {
        self.calls.lock().await.mutations.push(request.clone());
        self.pause().await;
        if let Some(error) = &self.mutate_error {
            return Err(error.clone());
        }

        let details = json!({
            "verb": request.verb.as_str(),
            "targets": request
                .resource_ids
                .iter()
                .map(|resource_id| (resource_id.clone(), json!({"accepted": true})))
                .collect::<serde_json::Map<String, Value>>(),
        });

        if request.dry_run {
            return Ok(MutationResult::DryRun { details });
        }

        Ok(MutationResult::Applied { details })
    }
}

#[derive(Default)]
pub(crate) struct FakeResourceCache {
    pub(crate) values: Mutex<HashMap<String, String>>,
    pub(crate) deleted_patterns: Mutex<Vec<String>>,
    pub(crate) fail_reads: bool,
}

#[async_trait]
impl ResourceCache for FakeResourceCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if self.fail_reads {
            return Err(AppError::Internal("cache offline".to_owned()));
        }

        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_seconds: u32) -> AppResult<()> {
        self.values
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        self.deleted_patterns.lock().await.push(pattern.to_owned());
        let prefix = pattern.trim_end_matches('*');
        let mut values = self.values.lock().await;
        let before = values.len();
        values.retain(|key, _| !key.starts_with(prefix));
        Ok((before - values.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) entries: Mutex<Vec<AuditEntry>>,
    pub(crate) fail_writes: bool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_entries(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        if self.fail_writes {
            return Err(AppError::Internal("audit store offline".to_owned()));
        }

        self.entries.lock().await.extend(entries);
        Ok(())
    }

    async fn list_entries(
        &self,
        filter: &AuditEntryFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_entries(&self, filter: &AuditEntryFilter) -> AppResult<u64> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .count() as u64)
    }

    async fn find_entry(&self, id: Uuid) -> AppResult<Option<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct FakeAccountRepository {
    pub(crate) accounts: Mutex<Vec<ProviderAccount>>,
}

#[async_trait]
impl AccountRepository for FakeAccountRepository {
    async fn list_accounts(&self) -> AppResult<Vec<ProviderAccount>> {
        let mut accounts = self.accounts.lock().await.clone();
        sort_accounts(&mut accounts);
        Ok(accounts)
    }

    async fn find_account(&self, id: Uuid) -> AppResult<Option<ProviderAccount>> {
        Ok(self
            .accounts
            .lock()
            .await
            .iter()
            .find(|account| account.id == id)
            .cloned())
    }

    async fn insert_account(&self, account: &ProviderAccount) -> AppResult<()> {
        let mut accounts = self.accounts.lock().await;
        if accounts
            .iter()
            .any(|existing| existing.account_id == account.account_id)
        {
            return Err(AppError::Conflict(format!(
                "account {} already exists",
                account.account_id
            )));
        }

        accounts.push(account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &ProviderAccount) -> AppResult<bool> {
        let mut accounts = self.accounts.lock().await;
        if accounts
            .iter()
            .any(|existing| existing.id != account.id && existing.account_id == account.account_id)
        {
            return Err(AppError::Conflict(format!(
                "account {} already exists",
                account.account_id
            )));
        }

        match accounts.iter_mut().find(|existing| existing.id == account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_account(&self, id: Uuid) -> AppResult<bool> {
        let mut accounts = self.accounts.lock().await;
        let before = accounts.len();
        accounts.retain(|account| account.id != id);
        Ok(accounts.len() != before)
    }
}

#[derive(Default)]
pub(crate) struct FakeAccountVerifier {
    pub(crate) error: Option<ProviderError>,
    pub(crate) verified: Mutex<Vec<String>>,
}

#[async_trait]
impl AccountAccessVerifier for FakeAccountVerifier {
    async fn verify_access(&self, account: &ProviderAccount) -> Result<(), ProviderError> {
        self.verified.lock().await.push(account.role_arn.clone());
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
