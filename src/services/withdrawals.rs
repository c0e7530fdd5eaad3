use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use super::ServiceError;
use crate::models::withdrawals::{
    AccountDetails, WithdrawalRequest, WithdrawalStatus, WithdrawalStatusUpdate,
};
use crate::repositories::{
    accounts::AccountDirectory,
    cache::{CacheStore, CacheStoreExt, WITHDRAWAL_REQUESTS_KEY},
    wallet_api::WalletGateway,
};

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Owns the withdrawal request lifecycle. The remote service is always
/// written first; the local cache only mirrors what the server accepted.
#[derive(Clone)]
pub struct WithdrawalRequestManager {
    gateway: Arc<dyn WalletGateway>,
    cache: Arc<dyn CacheStore>,
    accounts: Arc<dyn AccountDirectory>,
}

impl WithdrawalRequestManager {
    pub fn new(
        gateway: Arc<dyn WalletGateway>,
        cache: Arc<dyn CacheStore>,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self {
            gateway,
            cache,
            accounts,
        }
    }

    pub async fn create_withdrawal_request(
        &self,
        user_id: &str,
        amount: f64,
        account_details: AccountDetails,
    ) -> Option<WithdrawalRequest> {
        match self
            .try_create_withdrawal_request(user_id, amount, account_details)
            .await
        {
            Ok(request) => Some(request),
            Err(e) => {
                log::error!("Error creating withdrawal request: {}", e);
                None
            }
        }
    }

    pub async fn get_withdrawal_requests(&self, user_id: Option<&str>) -> Vec<WithdrawalRequest> {
        match self.try_get_withdrawal_requests(user_id).await {
            Ok(requests) => requests,
            Err(e) => {
                log::error!("Error fetching withdrawal requests: {}", e);
                Vec::new()
            }
        }
    }

    /// Always fetches the unfiltered list and narrows it locally.
    pub async fn get_user_withdrawal_requests(&self, user_id: &str) -> Vec<WithdrawalRequest> {
        self.get_withdrawal_requests(None)
            .await
            .into_iter()
            .filter(|request| request.user_id == user_id)
            .collect()
    }

    pub async fn update_withdrawal_status(
        &self,
        request_id: &str,
        status: WithdrawalStatus,
        remarks: Option<String>,
        transaction_id: Option<String>,
    ) -> bool {
        match self
            .try_update_withdrawal_status(request_id, status, remarks, transaction_id)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to update withdrawal request {}: {}", request_id, e);
                false
            }
        }
    }

    pub fn cached_withdrawal_requests(&self) -> Vec<WithdrawalRequest> {
        match self.read_cache() {
            Ok(requests) => requests,
            Err(e) => {
                log::warn!("Could not read cached withdrawal requests: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_create_withdrawal_request(
        &self,
        user_id: &str,
        amount: f64,
        account_details: AccountDetails,
    ) -> Result<WithdrawalRequest, ServiceError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ServiceError::Validation(format!(
                "Invalid withdrawal amount: {}",
                amount
            )));
        }

        let users = self
            .accounts
            .all_users()
            .await
            .map_err(|e| ServiceError::Repository("Accounts".to_string(), e.to_string()))?;
        let user = users
            .into_iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("User {}", user_id)))?;

        let request = WithdrawalRequest {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: user.id,
            user_name: user.name,
            amount,
            status: WithdrawalStatus::Pending,
            account_details,
            request_date: now_iso8601(),
            processed_date: None,
            transaction_id: None,
            remarks: None,
        };

        log::info!(
            "Creating withdrawal request {} for user {}, amount: {}",
            request.id,
            request.user_id,
            request.amount
        );

        self.gateway
            .create_withdrawal_request(&request)
            .await
            .map_err(|e| ServiceError::Repository("WalletGateway".to_string(), e.to_string()))?;

        // The server has the request now; a cache failure must not hide that.
        if let Err(e) = self.append_cached(&request) {
            log::warn!("Could not mirror withdrawal request {}: {}", request.id, e);
        }

        Ok(request)
    }

    async fn try_get_withdrawal_requests(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        let requests = self
            .gateway
            .get_withdrawal_requests(user_id)
            .await
            .map_err(|e| ServiceError::Repository("WalletGateway".to_string(), e.to_string()))?;

        if let Err(e) = self.write_cache(&requests) {
            log::warn!("Could not mirror withdrawal requests: {}", e);
        }
        Ok(requests)
    }

    async fn try_update_withdrawal_status(
        &self,
        request_id: &str,
        status: WithdrawalStatus,
        remarks: Option<String>,
        transaction_id: Option<String>,
    ) -> Result<(), ServiceError> {
        if status == WithdrawalStatus::Pending {
            return Err(ServiceError::Validation(
                "Pending is not a valid target status".to_string(),
            ));
        }

        // The server owns the status; a stale cached copy only earns a warning.
        let cached_status = self
            .cached_withdrawal_requests()
            .into_iter()
            .find(|r| r.id == request_id)
            .map(|r| r.status);
        if let Some(from) = cached_status {
            if !from.can_transition_to(status) {
                log::warn!(
                    "Cached copy of {} is {}, leaving the move to {} to the server",
                    request_id,
                    from,
                    status
                );
            }
        }

        let update = WithdrawalStatusUpdate {
            status,
            remarks,
            transaction_id,
            processed_date: now_iso8601(),
        };

        let updated = self
            .gateway
            .update_withdrawal_request(request_id, &update)
            .await
            .map_err(|e| ServiceError::Repository("WalletGateway".to_string(), e.to_string()))?;

        if let Err(e) = self.replace_cached(updated) {
            log::warn!("Could not mirror withdrawal request {}: {}", request_id, e);
        }

        log::info!("Withdrawal request {} moved to {}", request_id, status);
        Ok(())
    }

    fn append_cached(&self, request: &WithdrawalRequest) -> Result<(), ServiceError> {
        let mut cached = self.read_cache()?;
        cached.push(request.clone());
        self.write_cache(&cached)
    }

    /// Overwrites the entry with the same id. No-op when it is not cached.
    fn replace_cached(&self, updated: WithdrawalRequest) -> Result<(), ServiceError> {
        let mut cached = self.read_cache()?;
        match cached.iter_mut().find(|r| r.id == updated.id) {
            Some(entry) => {
                *entry = updated;
                self.write_cache(&cached)
            }
            None => Ok(()),
        }
    }

    fn read_cache(&self) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        self.cache
            .get_from_storage::<Vec<WithdrawalRequest>>(WITHDRAWAL_REQUESTS_KEY)
            .map(|requests| requests.unwrap_or_default())
            .map_err(|e| ServiceError::Cache(e.to_string()))
    }

    fn write_cache(&self, requests: &[WithdrawalRequest]) -> Result<(), ServiceError> {
        self.cache
            .set_to_storage(WITHDRAWAL_REQUESTS_KEY, requests)
            .map_err(|e| ServiceError::Cache(e.to_string()))
    }
}
