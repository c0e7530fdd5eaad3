use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EarningsPoint {
    pub date: String,
    pub amount: f64,
}

/// Server-computed aggregates, display only.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_earnings: f64,
    pub completed_withdrawals: f64,
    pub pending_withdrawals: f64,
    #[serde(default)]
    pub earnings_timeline: Vec<EarningsPoint>,
}
