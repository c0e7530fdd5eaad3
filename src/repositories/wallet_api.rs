use std::time::Duration;

use async_trait::async_trait;
use reqwest;

use crate::models::{
    dashboard::DashboardStats,
    transactions::{TransactionStatus, TransactionSummary},
    users::User,
    wallet::{ApiEnvelope, WalletBalance},
    withdrawals::{WithdrawalRequest, WithdrawalStatusUpdate},
};

/// Remote service holding the canonical wallet records. Calls are plain
/// request/response: no retry, no backoff.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    async fn get_wallet_balance(&self, user_id: &str) -> Result<WalletBalance, anyhow::Error>;

    async fn get_transactions(
        &self,
        user_id: &str,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TransactionSummary>, anyhow::Error>;

    async fn get_withdrawal_requests(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WithdrawalRequest>, anyhow::Error>;

    async fn create_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRequest, anyhow::Error>;

    async fn update_withdrawal_request(
        &self,
        request_id: &str,
        update: &WithdrawalStatusUpdate,
    ) -> Result<WithdrawalRequest, anyhow::Error>;

    async fn get_users(&self) -> Result<Vec<User>, anyhow::Error>;

    async fn get_dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, anyhow::Error>;
}

pub struct HttpWalletGateway {
    url: String,
    client: reqwest::Client,
}

impl HttpWalletGateway {
    pub fn new(url: String, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/db{}", self.url, path)
    }
}

#[async_trait]
impl WalletGateway for HttpWalletGateway {
    async fn get_wallet_balance(&self, user_id: &str) -> Result<WalletBalance, anyhow::Error> {
        let envelope: ApiEnvelope<WalletBalance> = self
            .client
            .get(self.endpoint(&format!("/wallet/{}", user_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelope.into_result()
    }

    async fn get_transactions(
        &self,
        user_id: &str,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TransactionSummary>, anyhow::Error> {
        let mut query = vec![("userId", user_id)];
        if let Some(status) = status {
            query.push(("status", status.as_str()));
        }

        let transactions = self
            .client
            .get(self.endpoint("/transactions"))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        log::debug!("Fetched transactions for user {} (status={:?})", user_id, status);
        Ok(transactions)
    }

    async fn get_withdrawal_requests(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WithdrawalRequest>, anyhow::Error> {
        let mut request = self.client.get(self.endpoint("/withdrawalRequests"));
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }

        let requests = request.send().await?.error_for_status()?.json().await?;

        Ok(requests)
    }

    async fn create_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRequest, anyhow::Error> {
        let created = self
            .client
            .post(self.endpoint("/withdrawalRequests"))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(created)
    }

    async fn update_withdrawal_request(
        &self,
        request_id: &str,
        update: &WithdrawalStatusUpdate,
    ) -> Result<WithdrawalRequest, anyhow::Error> {
        let updated = self
            .client
            .put(self.endpoint(&format!("/withdrawalRequests/{}", request_id)))
            .json(update)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(updated)
    }

    async fn get_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let users = self
            .client
            .get(self.endpoint("/users"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(users)
    }

    async fn get_dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, anyhow::Error> {
        let stats = self
            .client
            .get(self.endpoint(&format!("/dashboardStats/{}", user_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(stats)
    }
}
