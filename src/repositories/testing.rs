use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use super::wallet_api::WalletGateway;
use crate::models::{
    dashboard::DashboardStats,
    transactions::{TransactionStatus, TransactionSummary},
    users::User,
    wallet::WalletBalance,
    withdrawals::{WithdrawalRequest, WithdrawalStatusUpdate},
};

/// In-memory stand-in for the remote service.
#[derive(Default)]
pub struct FakeGateway {
    users: Mutex<Vec<User>>,
    balances: Mutex<HashMap<String, f64>>,
    balance_script: Mutex<VecDeque<(Duration, f64)>>,
    stats: Mutex<HashMap<String, DashboardStats>>,
    transactions: Mutex<HashMap<String, Vec<TransactionSummary>>>,
    transaction_delays: Mutex<HashMap<Option<TransactionStatus>, Duration>>,
    requests: Mutex<Vec<WithdrawalRequest>>,
    update_echo: Mutex<Option<WithdrawalRequest>>,
    updates: Mutex<Vec<(String, WithdrawalStatusUpdate)>>,
    fail_all: AtomicBool,
    fail_writes: AtomicBool,
    fail_balance: AtomicBool,
    calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_users(&self, users: Vec<User>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn set_balance(&self, user_id: &str, balance: f64) {
        self.balances.lock().unwrap().insert(user_id.to_string(), balance);
    }

    /// Each balance call takes the next entry: wait `delay`, answer `balance`.
    pub fn script_balance(&self, delay: Duration, balance: f64) {
        self.balance_script.lock().unwrap().push_back((delay, balance));
    }

    pub fn set_stats(&self, user_id: &str, stats: DashboardStats) {
        self.stats.lock().unwrap().insert(user_id.to_string(), stats);
    }

    pub fn set_transactions(&self, user_id: &str, transactions: Vec<TransactionSummary>) {
        self.transactions
            .lock()
            .unwrap()
            .insert(user_id.to_string(), transactions);
    }

    pub fn delay_transactions(&self, status: Option<TransactionStatus>, delay: Duration) {
        self.transaction_delays.lock().unwrap().insert(status, delay);
    }

    pub fn set_requests(&self, requests: Vec<WithdrawalRequest>) {
        *self.requests.lock().unwrap() = requests;
    }

    pub fn set_update_echo(&self, echo: WithdrawalRequest) {
        *self.update_echo.lock().unwrap() = Some(echo);
    }

    pub fn updates(&self) -> Vec<(String, WithdrawalStatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(())
    }

    fn enter_write(&self) -> Result<(), anyhow::Error> {
        self.enter()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("503 Service Unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl WalletGateway for FakeGateway {
    async fn get_wallet_balance(&self, user_id: &str) -> Result<WalletBalance, anyhow::Error> {
        self.enter()?;
        if self.fail_balance.load(Ordering::SeqCst) {
            bail!("Failed to fetch wallet balance");
        }

        let scripted = self.balance_script.lock().unwrap().pop_front();
        if let Some((delay, balance)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(WalletBalance {
                user_id: user_id.to_string(),
                balance,
            });
        }

        let balance = self
            .balances
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .ok_or_else(|| anyhow!("Wallet not found"))?;

        Ok(WalletBalance {
            user_id: user_id.to_string(),
            balance,
        })
    }

    async fn get_transactions(
        &self,
        user_id: &str,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TransactionSummary>, anyhow::Error> {
        self.enter()?;
        let delay = self.transaction_delays.lock().unwrap().get(&status).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let transactions = self
            .transactions
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default();

        Ok(transactions
            .into_iter()
            .filter(|t| status.is_none() || t.status == status)
            .collect())
    }

    async fn get_withdrawal_requests(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WithdrawalRequest>, anyhow::Error> {
        self.enter()?;
        let requests = self.requests.lock().unwrap().clone();

        Ok(requests
            .into_iter()
            .filter(|r| user_id.map_or(true, |id| r.user_id == id))
            .collect())
    }

    async fn create_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRequest, anyhow::Error> {
        self.enter_write()?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(request.clone())
    }

    async fn update_withdrawal_request(
        &self,
        request_id: &str,
        update: &WithdrawalStatusUpdate,
    ) -> Result<WithdrawalRequest, anyhow::Error> {
        self.enter_write()?;

        let mut requests = self.requests.lock().unwrap();
        let stored = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| anyhow!("404 Not Found"))?;
        if !stored.status.can_transition_to(update.status) {
            bail!("409 Conflict: {} -> {}", stored.status, update.status);
        }

        self.updates
            .lock()
            .unwrap()
            .push((request_id.to_string(), update.clone()));

        stored.status = update.status;
        stored.processed_date = Some(update.processed_date.clone());
        stored.remarks = update.remarks.clone();
        stored.transaction_id = update.transaction_id.clone();

        match self.update_echo.lock().unwrap().clone() {
            Some(echo) => Ok(echo),
            None => Ok(stored.clone()),
        }
    }

    async fn get_users(&self) -> Result<Vec<User>, anyhow::Error> {
        self.enter()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn get_dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, anyhow::Error> {
        self.enter()?;
        self.stats
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow!("Stats not found"))
    }
}
