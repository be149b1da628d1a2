use df_exchanges_zb::{ZbClient, ZbConfig, ZbStream};
use df_subscriber::Subscriber;
use df_types::CurrencyPair;
use std::io;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn, Level};

const DEFAULT_PAIRS: &str = "ETH_QC,BTC_USDT";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let level = std::env::var("DF_LOG_LEVEL")
        .ok()
        .and_then(|l| Level::from_str(&l).ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(io::stdout)
        .with_max_level(level)
        .init();

    info!("Service started");

    abort_on_panic();

    let config = match ZbConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let pairs = match parse_pairs(&std::env::var("DF_PAIRS").unwrap_or(DEFAULT_PAIRS.to_string()))
    {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("Invalid DF_PAIRS: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rest = ZbClient::new(&config);
    for pair in &pairs {
        match rest.get_ticker(pair).await {
            Ok(ticker) => info!("{pair} last: {}, 24h vol: {}", ticker.last, ticker.vol),
            Err(e) => warn!("Failed to fetch ticker for {pair}: {e}"),
        }
    }

    let stream = ZbStream::new(config);
    let manager = match Subscriber::new(pairs).run(&stream).await {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to subscribe: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut updates = manager.subscribe_orderbook_state();
    let mut states = stream.watch_connection_state();

    loop {
        select! {
            next = updates.recv() => match next {
                Ok(snapshot) => info!(
                    "{}: bid {:?} ask {:?}",
                    snapshot.pair,
                    snapshot.best_bid(),
                    snapshot.best_ask()
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {skipped} snapshots"),
                Err(RecvError::Closed) => break,
            },
            changed = states.changed() => match changed {
                Ok(()) => {
                    let state = *states.borrow_and_update();
                    info!("Connection {state:?}");
                }
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Service stopping");
    stream.shutdown();
    info!("Service stopped");
    ExitCode::SUCCESS
}

fn parse_pairs(value: &str) -> Result<Vec<CurrencyPair>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(CurrencyPair::from_str)
        .collect()
}

pub fn abort_on_panic() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        std::process::abort();
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ETH_QC,BTC_USDT", 2)]
    #[test_case(" eth_qc , ", 1)]
    #[test_case("", 0)]
    fn pairs(value: &str, expected: usize) {
        assert_eq!(parse_pairs(value).unwrap().len(), expected);
    }

    #[test]
    fn invalid_pair() {
        assert!(parse_pairs("ETH_QC,BTCUSDT").is_err());
    }
}
