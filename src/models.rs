pub mod dashboard;
pub mod transactions;
pub mod users;
pub mod wallet;
pub mod withdrawals;
