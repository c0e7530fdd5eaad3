use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log4rs;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use wallet_sync::models::{
    transactions::TransactionFilter,
    withdrawals::{AccountDetails, WithdrawalStatus},
};
use wallet_sync::repositories::{
    accounts::{AccountDirectory, StoredAccountDirectory},
    cache::{CacheStore, CacheStoreExt, FileCache, CURRENT_USER_KEY, LOGGED_IN_USER_KEY},
    wallet_api::{HttpWalletGateway, WalletGateway},
};
use wallet_sync::services::{
    wallet_view::{WalletViewController, WalletViewRequest, WalletViewService},
    withdrawal_form::WithdrawalForm,
    withdrawals::WithdrawalRequestManager,
    Service,
};
use wallet_sync::settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "wallet.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remember which user this client acts for.
    Login { user_id: String },
    /// Load the wallet page and print it.
    Show {
        #[arg(short, long, default_value = "all")]
        filter: TransactionFilter,
    },
    /// Request a withdrawal to a bank account.
    Withdraw {
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        ifsc: String,
        #[arg(long)]
        holder: String,
        #[arg(long)]
        bank: String,
    },
    /// List withdrawal requests.
    Requests {
        /// Ask the server to filter by this user.
        #[arg(long)]
        user: Option<String>,
        /// Only the signed-in user's requests.
        #[arg(long, conflicts_with = "user")]
        mine: bool,
    },
    /// Move a withdrawal request to a new status.
    SetStatus {
        id: String,
        status: WithdrawalStatus,
        #[arg(long)]
        remarks: Option<String>,
        #[arg(long)]
        transaction_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let settings = settings::Settings::new(&args.config)?;

    init_logging(&args.log4rs)?;
    log::info!("Using wallet server at {}", settings.server.url);

    let cache_path = match &settings.cache.path {
        Some(path) => path.into(),
        None => FileCache::default_path()?,
    };
    let cache: Arc<dyn CacheStore> = Arc::new(FileCache::open(cache_path)?);
    let gateway: Arc<dyn WalletGateway> = Arc::new(HttpWalletGateway::new(
        settings.server.url.clone(),
        Duration::from_secs(settings.server.timeout_secs),
    )?);
    let accounts: Arc<dyn AccountDirectory> =
        Arc::new(StoredAccountDirectory::new(cache.clone(), gateway.clone()));
    let manager = WithdrawalRequestManager::new(gateway.clone(), cache.clone(), accounts.clone());

    match args.command {
        Command::Login { user_id } => {
            cache.remove(CURRENT_USER_KEY)?;
            cache.set_to_storage(LOGGED_IN_USER_KEY, &user_id)?;
            match accounts.current_user().await? {
                Some(user) => print_json(&user)?,
                None => log::warn!("User {} is not known to the server", user_id),
            }
        }
        Command::Show { filter } => {
            let view = start_view(manager, accounts, gateway);
            request(&view, |response| WalletViewRequest::Load { response }).await?;
            if filter != TransactionFilter::All {
                request(&view, |response| WalletViewRequest::ChangeFilter {
                    filter,
                    response,
                })
                .await?;
            }
            let page = request(&view, |response| WalletViewRequest::Render { response }).await?;
            print_json(&page)?;
        }
        Command::Withdraw {
            amount,
            account_number,
            ifsc,
            holder,
            bank,
        } => {
            let form = WithdrawalForm {
                amount,
                account_details: AccountDetails {
                    account_number,
                    ifsc_code: ifsc,
                    account_holder_name: holder,
                    bank_name: bank,
                },
            };

            let view = start_view(manager, accounts, gateway);
            request(&view, |response| WalletViewRequest::Load { response }).await?;
            let result = request(&view, |response| WalletViewRequest::SubmitWithdrawal {
                form,
                response,
            })
            .await?;

            match result {
                Ok(Some(created)) => print_json(&created)?,
                Ok(None) => return Err(anyhow!("Withdrawal request could not be created.")),
                Err(errors) => {
                    for error in &errors {
                        eprintln!("{}", error);
                    }
                    return Err(anyhow!("Withdrawal form is invalid."));
                }
            }
        }
        Command::Requests { user, mine } => {
            let requests = if mine {
                let user = accounts
                    .current_user()
                    .await?
                    .ok_or_else(|| anyhow!("No signed-in user. Run `login` first."))?;
                manager.get_user_withdrawal_requests(&user.id).await
            } else {
                manager.get_withdrawal_requests(user.as_deref()).await
            };
            print_json(&requests)?;
        }
        Command::SetStatus {
            id,
            status,
            remarks,
            transaction_id,
        } => {
            if !manager
                .update_withdrawal_status(&id, status, remarks, transaction_id)
                .await
            {
                return Err(anyhow!("Could not move withdrawal request {} to {}.", id, status));
            }
            log::info!("Withdrawal request {} is now {}", id, status);
        }
    }

    Ok(())
}

fn start_view(
    manager: WithdrawalRequestManager,
    accounts: Arc<dyn AccountDirectory>,
    gateway: Arc<dyn WalletGateway>,
) -> mpsc::Sender<WalletViewRequest> {
    let (view_tx, mut view_rx) = mpsc::channel(32);
    let controller = WalletViewController::new(manager, accounts, gateway);

    tokio::spawn(async move {
        WalletViewService::new().run(controller, &mut view_rx).await;
    });

    view_tx
}

async fn request<R, F>(view: &mpsc::Sender<WalletViewRequest>, build: F) -> Result<R>
where
    F: FnOnce(oneshot::Sender<R>) -> WalletViewRequest,
{
    let (response_tx, response_rx) = oneshot::channel();
    view.send(build(response_tx))
        .await
        .map_err(|e| anyhow!("Wallet view stopped: {}", e))?;

    Ok(response_rx.await?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow!("Could not initialize logging: {}", e))
        }
    }
}
