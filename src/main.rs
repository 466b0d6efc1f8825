use clap::{Parser, Subcommand};
use punk_ledger::config::Config;
use punk_ledger::input::{parse_reference_price, parse_wallet_list};
use punk_ledger::ledger::{JsonRpcLedger, Ledger};
use punk_ledger::{export, AppError, PnlReport, PnlRequest, RangedFetcher, WalletEventCollector};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "CryptoPunks wallet trade exporter and PnL calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every trade of the given wallets and write the export file.
    Fetch {
        /// 1 to 10 comma-separated wallet addresses.
        #[arg(long)]
        wallets: String,
        /// Current lowest price, e.g. "35.99 ETH ($112,683.97 USD)".
        #[arg(long)]
        price: Option<String>,
    },
    /// Compute holding-period PnL for one wallet and asset from the export file.
    Pnl {
        /// Main wallet address.
        #[arg(long)]
        wallet: String,
        /// Comma-separated linked wallet addresses.
        #[arg(long)]
        linked: Option<String>,
        #[arg(long)]
        asset_id: String,
        /// Current lowest price, e.g. "35.99 ETH ($112,683.97 USD)".
        #[arg(long)]
        price: String,
        /// Menu choices: 1 = 3 days, 2 = weekly, 3 = monthly, 4 = yearly.
        #[arg(long, default_value = "1,2,3,4")]
        windows: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Fetch { wallets, price } => run_fetch(&config, &wallets, price.as_deref()).await,
        Command::Pnl {
            wallet,
            linked,
            asset_id,
            price,
            windows,
        } => run_pnl(
            &config,
            &wallet,
            linked.as_deref(),
            &asset_id,
            &price,
            &windows,
        ),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run_fetch(config: &Config, wallets: &str, price: Option<&str>) -> Result<(), AppError> {
    let wallets = parse_wallet_list(wallets, config.address_policy)?;
    if let Some(price) = price {
        let reference = parse_reference_price(price)?;
        info!(
            "Before the data fetching, the current lowest price is: {}",
            reference
        );
    }

    let url = config.require_rpc_url()?;
    let ledger: Arc<dyn Ledger> = Arc::new(JsonRpcLedger::new(
        url.to_string(),
        config.contract_address.clone(),
    ));
    if !ledger.is_connected().await {
        return Err(AppError::NotConnected(url.to_string()));
    }
    info!("Connected to Ethereum node at {}", url);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone(), config.fetch_deadline));

    let collector = WalletEventCollector::new(ledger, RangedFetcher::new(config.fetch))
        .with_start_block(config.start_block)
        .with_wallet_concurrency(config.wallet_concurrency);
    let collected = collector.collect(&wallets, &cancel).await;
    watcher.abort();

    let collected = collected?;
    let rows = export::write_trades(&config.export_path, &collected.trades)?;
    println!(
        "Exported {} trade(s) up to block {} to {}",
        rows,
        collected.latest_block,
        config.export_path.display()
    );
    Ok(())
}

/// Cancel `token` on Ctrl-C or once `deadline` elapses.
async fn cancel_on_interrupt(token: CancellationToken, deadline: Option<Duration>) {
    let expired = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling fetch"),
        _ = expired => warn!("Fetch deadline elapsed, cancelling fetch"),
    }
    token.cancel();
}

fn run_pnl(
    config: &Config,
    wallet: &str,
    linked: Option<&str>,
    asset_id: &str,
    price: &str,
    windows: &str,
) -> Result<(), AppError> {
    let request = PnlRequest::parse(wallet, linked, asset_id, price, windows)?;

    let report = PnlReport::load(request, &config.export_path)?;
    println!("{}", report);
    Ok(())
}
