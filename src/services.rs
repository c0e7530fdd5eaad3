use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod wallet_view;
pub mod withdrawal_form;
pub mod withdrawals;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Cache error: {0}")]
    Cache(String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

/// Drains a request channel, handing every request to its own task. Requests
/// therefore overlap; handlers are responsible for ordering their commits.
#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}
