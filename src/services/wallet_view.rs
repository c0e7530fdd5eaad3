use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::oneshot;

use super::withdrawal_form::{FormError, WithdrawalForm};
use super::withdrawals::WithdrawalRequestManager;
use super::{RequestHandler, Service};
use crate::models::{
    dashboard::{DashboardStats, EarningsPoint},
    transactions::{TransactionFilter, TransactionSummary},
    users::User,
    wallet::Wallet,
    withdrawals::WithdrawalRequest,
};
use crate::repositories::{accounts::AccountDirectory, wallet_api::WalletGateway};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletViewState {
    pub current_user: Option<User>,
    pub wallet: Option<Wallet>,
    pub stats: Option<DashboardStats>,
    pub transactions: Vec<TransactionSummary>,
    pub withdrawal_requests: Vec<WithdrawalRequest>,
    /// Authoritative balance from the wallet endpoint. The only balance shown.
    pub balance: Option<f64>,
    pub filter: TransactionFilter,
    pub error: Option<String>,
    pub is_loading: bool,
    pub transactions_loading: bool,
}

impl Default for WalletViewState {
    fn default() -> Self {
        Self {
            current_user: None,
            wallet: None,
            stats: None,
            transactions: Vec::new(),
            withdrawal_requests: Vec::new(),
            balance: None,
            filter: TransactionFilter::All,
            error: None,
            is_loading: true,
            transactions_loading: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPage {
    pub balance: f64,
    pub pending_withdrawals: f64,
    pub total_earnings: f64,
    pub completed_withdrawals: f64,
    pub earnings_timeline: Vec<EarningsPoint>,
    pub filter: TransactionFilter,
    pub transactions: Vec<TransactionSummary>,
    pub transactions_loading: bool,
    pub withdrawal_requests: Vec<WithdrawalRequest>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum WalletView {
    Loading,
    KycRequired,
    Unavailable,
    Ready(WalletPage),
}

impl WalletViewState {
    pub fn render(&self) -> WalletView {
        if let Some(user) = &self.current_user {
            if !user.is_kyc_approved() {
                return WalletView::KycRequired;
            }
        }

        if self.is_loading {
            return WalletView::Loading;
        }

        let (Some(_wallet), Some(stats)) = (&self.wallet, &self.stats) else {
            return WalletView::Unavailable;
        };

        WalletView::Ready(WalletPage {
            balance: self.balance.unwrap_or(0.0),
            pending_withdrawals: stats.pending_withdrawals,
            total_earnings: stats.total_earnings,
            completed_withdrawals: stats.completed_withdrawals,
            earnings_timeline: stats.earnings_timeline.clone(),
            filter: self.filter,
            transactions: self
                .transactions
                .iter()
                .filter(|t| self.filter.matches(t))
                .cloned()
                .collect(),
            transactions_loading: self.transactions_loading,
            withdrawal_requests: self.withdrawal_requests.clone(),
            error: self.error.clone(),
        })
    }
}

struct Inner {
    manager: WithdrawalRequestManager,
    accounts: Arc<dyn AccountDirectory>,
    gateway: Arc<dyn WalletGateway>,
    state: RwLock<WalletViewState>,
    load_generation: AtomicU64,
    filter_generation: AtomicU64,
}

/// Page-level orchestrator. Every load and filter fetch takes a generation
/// token; only the newest token of each kind may commit.
#[derive(Clone)]
pub struct WalletViewController {
    inner: Arc<Inner>,
}

impl WalletViewController {
    pub fn new(
        manager: WithdrawalRequestManager,
        accounts: Arc<dyn AccountDirectory>,
        gateway: Arc<dyn WalletGateway>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                accounts,
                gateway,
                state: RwLock::new(WalletViewState::default()),
                load_generation: AtomicU64::new(0),
                filter_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> WalletViewState {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn render(&self) -> WalletView {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .render()
    }

    fn update<F: FnOnce(&mut WalletViewState)>(&self, f: F) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    async fn resolve_user(&self) -> Option<User> {
        match self.inner.accounts.current_user().await {
            Ok(user) => user,
            Err(e) => {
                log::error!("Could not resolve current user: {}", e);
                None
            }
        }
    }

    /// Mount, refresh and post-withdrawal reload.
    pub async fn load(&self) {
        let generation = self.inner.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let filter_generation = self.inner.filter_generation.load(Ordering::SeqCst);
        self.update(|s| s.is_loading = true);

        let user = self.resolve_user().await;
        if self.inner.load_generation.load(Ordering::SeqCst) != generation {
            log::debug!("Discarding superseded wallet load #{}", generation);
            return;
        }
        self.update(|s| {
            s.current_user = user.clone();
            if user.is_none() {
                s.wallet = None;
                s.stats = None;
                s.transactions.clear();
                s.withdrawal_requests.clear();
                s.balance = None;
                s.error = None;
            }
        });

        if let Some(user) = user {
            log::info!("Loading wallet data for user {}", user.id);

            let accounts = &self.inner.accounts;
            let (wallet, stats, transactions, requests, balance) = tokio::join!(
                accounts.wallet_with_updated_bonuses(&user.id),
                accounts.dashboard_stats(&user.id),
                accounts.user_transactions(&user.id),
                self.inner.manager.get_user_withdrawal_requests(&user.id),
                self.inner.gateway.get_wallet_balance(&user.id),
            );

            if self.inner.load_generation.load(Ordering::SeqCst) != generation {
                log::debug!("Discarding superseded wallet load #{}", generation);
                return;
            }
            // A filter fetch started after this load owns the transaction list.
            let filter_changed =
                self.inner.filter_generation.load(Ordering::SeqCst) != filter_generation;

            self.update(|s| {
                match wallet {
                    Ok(wallet) => s.wallet = Some(wallet),
                    Err(e) => log::error!("Error loading wallet snapshot: {}", e),
                }
                match stats {
                    Ok(stats) => s.stats = Some(stats),
                    Err(e) => log::error!("Error loading dashboard stats: {}", e),
                }
                match transactions {
                    Ok(transactions) if !filter_changed => {
                        log::info!("Loaded {} transactions", transactions.len());
                        s.transactions = transactions;
                    }
                    Ok(_) => log::debug!("Keeping transactions from the newer filter fetch"),
                    Err(e) => log::error!("Error loading transactions: {}", e),
                }
                log::info!("Loaded {} withdrawal requests", requests.len());
                s.withdrawal_requests = requests;
                match balance {
                    Ok(balance) => {
                        s.balance = Some(balance.balance);
                        s.error = None;
                    }
                    Err(e) => {
                        log::error!("Wallet fetch error: {}", e);
                        s.error = Some(format!("Failed to fetch wallet balance: {}", e));
                    }
                }
            });
        }

        if self.inner.load_generation.load(Ordering::SeqCst) == generation {
            self.update(|s| s.is_loading = false);
        }
    }

    /// Replaces the transaction list with the server's view for `filter`.
    pub async fn change_filter(&self, filter: TransactionFilter) {
        let generation = self.inner.filter_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|s| {
            s.filter = filter;
            s.transactions_loading = true;
        });

        let fetched = match self.resolve_user().await {
            Some(user) => Some(
                self.inner
                    .gateway
                    .get_transactions(&user.id, filter.status())
                    .await,
            ),
            None => None,
        };

        if self.inner.filter_generation.load(Ordering::SeqCst) != generation {
            log::debug!(
                "Discarding stale transactions for filter {:?} (#{})",
                filter,
                generation
            );
            return;
        }

        self.update(|s| {
            match fetched {
                Some(Ok(transactions)) => {
                    log::debug!("Fetched {} transactions", transactions.len());
                    s.transactions = transactions;
                }
                Some(Err(e)) => log::error!("Transaction fetch error: {}", e),
                None => (),
            }
            s.transactions_loading = false;
        });
    }

    /// Submits the form for the current user and reloads on success.
    pub async fn submit_withdrawal(
        &self,
        form: &WithdrawalForm,
    ) -> Result<Option<WithdrawalRequest>, Vec<FormError>> {
        let Some(user) = self.state().current_user else {
            log::warn!("Withdrawal submitted without a signed-in user");
            return Ok(None);
        };

        let created = form.submit(&self.inner.manager, &user.id).await?;
        if created.is_some() {
            self.load().await;
        }

        Ok(created)
    }
}

pub enum WalletViewRequest {
    Load {
        response: oneshot::Sender<()>,
    },
    ChangeFilter {
        filter: TransactionFilter,
        response: oneshot::Sender<()>,
    },
    SubmitWithdrawal {
        form: WithdrawalForm,
        response: oneshot::Sender<Result<Option<WithdrawalRequest>, Vec<FormError>>>,
    },
    Render {
        response: oneshot::Sender<WalletView>,
    },
}

#[async_trait]
impl RequestHandler<WalletViewRequest> for WalletViewController {
    async fn handle_request(&self, request: WalletViewRequest) {
        match request {
            WalletViewRequest::Load { response } => {
                self.load().await;
                let _ = response.send(());
            }
            WalletViewRequest::ChangeFilter { filter, response } => {
                self.change_filter(filter).await;
                let _ = response.send(());
            }
            WalletViewRequest::SubmitWithdrawal { form, response } => {
                let result = self.submit_withdrawal(&form).await;
                let _ = response.send(result);
            }
            WalletViewRequest::Render { response } => {
                let _ = response.send(self.render());
            }
        }
    }
}

pub struct WalletViewService;

impl WalletViewService {
    pub fn new() -> Self {
        WalletViewService {}
    }
}

#[async_trait]
impl Service<WalletViewRequest, WalletViewController> for WalletViewService {}
