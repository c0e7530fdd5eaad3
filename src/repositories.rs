pub mod accounts;
pub mod cache;
pub mod wallet_api;

#[cfg(test)]
pub mod testing;
