use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Withdrawal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub date: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
}

/// Status filter offered by the wallet page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl TransactionFilter {
    /// Status to send to the server, `None` meaning no status parameter.
    pub fn status(&self) -> Option<TransactionStatus> {
        match self {
            TransactionFilter::All => None,
            TransactionFilter::Completed => Some(TransactionStatus::Completed),
            TransactionFilter::Pending => Some(TransactionStatus::Pending),
        }
    }

    pub fn matches(&self, transaction: &TransactionSummary) -> bool {
        match self.status() {
            None => true,
            Some(status) => transaction.status == Some(status),
        }
    }
}

impl std::str::FromStr for TransactionFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TransactionFilter::All),
            "completed" => Ok(TransactionFilter::Completed),
            "pending" => Ok(TransactionFilter::Pending),
            other => Err(anyhow::anyhow!("Unknown transaction filter: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(status: Option<TransactionStatus>) -> TransactionSummary {
        TransactionSummary {
            id: "t1".to_string(),
            transaction_type: TransactionType::Credit,
            amount: 10.0,
            date: "2024-05-01T00:00:00Z".to_string(),
            description: "Referral bonus".to_string(),
            status,
        }
    }

    #[test]
    fn filter_matches_only_its_status() {
        let pending = transaction(Some(TransactionStatus::Pending));
        let untagged = transaction(None);

        assert!(TransactionFilter::All.matches(&pending));
        assert!(TransactionFilter::All.matches(&untagged));
        assert!(TransactionFilter::Pending.matches(&pending));
        assert!(!TransactionFilter::Completed.matches(&pending));
        assert!(!TransactionFilter::Pending.matches(&untagged));
    }

    #[test]
    fn summary_uses_type_key_on_the_wire() {
        let json = serde_json::to_value(transaction(None)).unwrap();

        assert_eq!(json["type"], "credit");
        assert!(json.get("status").is_none());
    }
}
