use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::cache::{
    CacheStore, CacheStoreExt, CURRENT_USER_KEY, LOGGED_IN_USER_KEY, REFERRAL_BONUSES_KEY,
    USERS_KEY, WALLETS_KEY,
};
use super::wallet_api::WalletGateway;
use crate::models::{
    dashboard::DashboardStats,
    transactions::{TransactionStatus, TransactionSummary, TransactionType},
    users::{ReferralBonus, User},
    wallet::Wallet,
};

/// User and account capabilities the wallet page consumes but does not own.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>, anyhow::Error>;

    async fn all_users(&self) -> Result<Vec<User>, anyhow::Error>;

    async fn wallet_with_updated_bonuses(&self, user_id: &str) -> Result<Wallet, anyhow::Error>;

    async fn dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, anyhow::Error>;

    async fn user_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<TransactionSummary>, anyhow::Error>;
}

pub struct StoredAccountDirectory {
    cache: Arc<dyn CacheStore>,
    gateway: Arc<dyn WalletGateway>,
}

impl StoredAccountDirectory {
    pub fn new(cache: Arc<dyn CacheStore>, gateway: Arc<dyn WalletGateway>) -> Self {
        Self { cache, gateway }
    }
}

/// Folds referral bonuses the snapshot has not seen yet into it. Returns
/// whether anything changed.
fn apply_referral_bonuses(wallet: &mut Wallet, bonuses: &[ReferralBonus]) -> bool {
    let transactions = wallet.transactions.get_or_insert_with(Vec::new);
    let known: HashSet<String> = transactions.iter().map(|t| t.id.clone()).collect();

    let mut changed = false;
    for bonus in bonuses.iter().filter(|b| !known.contains(&b.id)) {
        transactions.push(TransactionSummary {
            id: bonus.id.clone(),
            transaction_type: TransactionType::Credit,
            amount: bonus.amount,
            date: bonus.date.clone(),
            description: bonus.description.clone(),
            status: Some(TransactionStatus::Completed),
        });
        wallet.balance += bonus.amount;
        changed = true;
    }

    changed
}

#[async_trait]
impl AccountDirectory for StoredAccountDirectory {
    async fn current_user(&self) -> Result<Option<User>, anyhow::Error> {
        if let Some(user) = self.cache.get_from_storage::<User>(CURRENT_USER_KEY)? {
            return Ok(Some(user));
        }

        let logged_in: Option<String> = self.cache.get_from_storage(LOGGED_IN_USER_KEY)?;
        match logged_in {
            Some(user_id) => {
                let users = self.all_users().await?;
                Ok(users.into_iter().find(|u| u.id == user_id))
            }
            None => Ok(None),
        }
    }

    async fn all_users(&self) -> Result<Vec<User>, anyhow::Error> {
        match self.gateway.get_users().await {
            Ok(users) => {
                self.cache.set_to_storage(USERS_KEY, &users)?;
                Ok(users)
            }
            Err(e) => {
                log::warn!("Could not fetch users, using cached list: {}", e);
                let cached: Option<Vec<User>> = self.cache.get_from_storage(USERS_KEY)?;
                cached.ok_or(e)
            }
        }
    }

    async fn wallet_with_updated_bonuses(&self, user_id: &str) -> Result<Wallet, anyhow::Error> {
        let mut wallets: HashMap<String, Wallet> = self
            .cache
            .get_from_storage(WALLETS_KEY)?
            .unwrap_or_default();
        let mut wallet = wallets.get(user_id).cloned().unwrap_or_default();

        let bonuses: Vec<ReferralBonus> = self
            .cache
            .get_from_storage::<Vec<ReferralBonus>>(REFERRAL_BONUSES_KEY)?
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.user_id == user_id)
            .collect();

        if apply_referral_bonuses(&mut wallet, &bonuses) {
            log::debug!("Reconciled {} referral bonuses into wallet of {}", bonuses.len(), user_id);
            wallets.insert(user_id.to_string(), wallet.clone());
            self.cache.set_to_storage(WALLETS_KEY, &wallets)?;
        }

        Ok(wallet)
    }

    async fn dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, anyhow::Error> {
        self.gateway.get_dashboard_stats(user_id).await
    }

    async fn user_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<TransactionSummary>, anyhow::Error> {
        self.gateway.get_transactions(user_id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::cache::MemoryCache;
    use crate::repositories::testing::FakeGateway;
    use crate::models::users::KycStatus;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("User {}", id),
            email: None,
            kyc_status: KycStatus::Approved,
        }
    }

    fn bonus(id: &str, user_id: &str, amount: f64) -> ReferralBonus {
        ReferralBonus {
            id: id.to_string(),
            user_id: user_id.to_string(),
            amount,
            date: "2024-05-01T00:00:00Z".to_string(),
            description: "Referral bonus".to_string(),
        }
    }

    #[tokio::test]
    async fn current_user_falls_back_to_logged_in_id() {
        let cache = Arc::new(MemoryCache::new());
        let gateway = Arc::new(FakeGateway::new());
        gateway.set_users(vec![user("u1"), user("u2")]);
        cache.set_to_storage(LOGGED_IN_USER_KEY, "u2").unwrap();

        let directory = StoredAccountDirectory::new(cache.clone(), gateway);
        let current = directory.current_user().await.unwrap().unwrap();

        assert_eq!(current.id, "u2");
        let cached_users: Vec<User> = cache.get_from_storage(USERS_KEY).unwrap().unwrap();
        assert_eq!(cached_users.len(), 2);
    }

    #[tokio::test]
    async fn all_users_uses_cache_when_remote_fails() {
        let cache = Arc::new(MemoryCache::new());
        let gateway = Arc::new(FakeGateway::new());
        gateway.fail_all(true);
        cache.set_to_storage(USERS_KEY, &vec![user("u1")]).unwrap();

        let directory = StoredAccountDirectory::new(cache, gateway);
        let users = directory.all_users().await.unwrap();

        assert_eq!(users, vec![user("u1")]);
    }

    #[tokio::test]
    async fn bonuses_are_reconciled_once() {
        let cache = Arc::new(MemoryCache::new());
        let gateway = Arc::new(FakeGateway::new());
        let mut wallets = HashMap::new();
        wallets.insert(
            "u1".to_string(),
            Wallet {
                balance: 100.0,
                pending_withdrawals: None,
                transactions: None,
            },
        );
        cache.set_to_storage(WALLETS_KEY, &wallets).unwrap();
        cache
            .set_to_storage(
                REFERRAL_BONUSES_KEY,
                &vec![bonus("b1", "u1", 50.0), bonus("b2", "u2", 70.0)],
            )
            .unwrap();

        let directory = StoredAccountDirectory::new(cache, gateway);
        let first = directory.wallet_with_updated_bonuses("u1").await.unwrap();
        let second = directory.wallet_with_updated_bonuses("u1").await.unwrap();

        assert_eq!(first.balance, 150.0);
        assert_eq!(second, first);
        assert_eq!(second.transactions.unwrap().len(), 1);
    }
}
