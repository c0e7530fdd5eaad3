use serde::{Deserialize, Serialize};

use super::transactions::TransactionSummary;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_withdrawals: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionSummary>>,
}

/// Authoritative balance as reported by the remote service.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub user_id: String,
    pub balance: f64,
}

/// `{ success, data?, message? }` wrapper used by the wallet endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T, anyhow::Error> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(anyhow::anyhow!("Response marked successful but has no data")),
            (false, _) => Err(anyhow::anyhow!(self
                .message
                .unwrap_or_else(|| "Request was not successful".to_string()))),
        }
    }
}
