use async_trait::async_trait;
use cloudgate_application::{AccountRepository, ProviderAccount, sort_accounts};
use cloudgate_core::{AppError, AppResult};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local provider account registry for development and tests.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<Vec<ProviderAccount>>,
}

impl InMemoryAccountRepository {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(account_id: &str) -> AppError {
    AppError::Conflict(format!(
        "provider account '{account_id}' is already registered"
    ))
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn list_accounts(&self) -> AppResult<Vec<ProviderAccount>> {
        let mut accounts = self.accounts.read().await.clone();
        sort_accounts(&mut accounts);
        Ok(accounts)
    }

    async fn find_account(&self, id: Uuid) -> AppResult<Option<ProviderAccount>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|account| account.id == id)
            .cloned())
    }

    async fn insert_account(&self, account: &ProviderAccount) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .iter()
            .any(|existing| existing.account_id == account.account_id)
        {
            return Err(duplicate(account.account_id.as_str()));
        }

        accounts.push(account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &ProviderAccount) -> AppResult<bool> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .iter()
            .any(|existing| existing.id != account.id && existing.account_id == account.account_id)
        {
            return Err(duplicate(account.account_id.as_str()));
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
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|account| account.id != id);
        Ok(accounts.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use cloudgate_application::{AccountRepository, ProviderAccount};
    use cloudgate_core::AppError;
    use uuid::Uuid;

    use super::InMemoryAccountRepository;

    fn account(account_id: &str, name: Option<&str>) -> ProviderAccount {
        ProviderAccount {
            id: Uuid::new_v4(),
            account_id: account_id.to_owned(),
            account_name: name.map(ToOwned::to_owned),
            role_arn: format!("arn:aws:iam::{account_id}:role/Cloudgate"),
            external_id: None,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn listing_orders_by_name_with_unnamed_last() {
        let repository = InMemoryAccountRepository::new();
        for item in [
            account("300000000000", None),
            account("200000000000", Some("staging")),
            account("100000000000", Some("prod")),
        ] {
            assert!(repository.insert_account(&item).await.is_ok());
        }

        let Ok(listed) = repository.list_accounts().await else {
            panic!("listing should succeed");
        };
        let ids: Vec<&str> = listed.iter().map(|item| item.account_id.as_str()).collect();
        assert_eq!(ids, vec!["100000000000", "200000000000", "300000000000"]);
    }

    #[tokio::test]
    async fn updates_cannot_take_another_accounts_id() {
        let repository = InMemoryAccountRepository::new();
        let first = account("100000000000", Some("first"));
        let second = account("200000000000", Some("second"));
        assert!(repository.insert_account(&first).await.is_ok());
        assert!(repository.insert_account(&second).await.is_ok());

        let moved = ProviderAccount {
            account_id: "100000000000".to_owned(),
            ..second.clone()
        };
        let renamed = ProviderAccount {
            account_name: Some("renamed".to_owned()),
            ..second.clone()
        };

        assert!(matches!(
            repository.update_account(&moved).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(repository.update_account(&renamed).await, Ok(true)));
        assert!(matches!(
            repository
                .update_account(&account("300000000000", None))
                .await,
            Ok(false)
        ));
    }

    #[tokio::test]
    async fn delete_reports_whether_the_account_existed() {
        let repository = InMemoryAccountRepository::new();
        let item = account("100000000000", None);
        assert!(repository.insert_account(&item).await.is_ok());

        assert!(matches!(repository.delete_account(item.id).await, Ok(true)));
        assert!(matches!(repository.delete_account(item.id).await, Ok(false)));
        assert!(matches!(repository.find_account(item.id).await, Ok(None)));
    }
}
