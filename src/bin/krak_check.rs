//! Binary to connect to the Kraken v2 public WebSocket and subscribe to
//! BTC/USD trades and order-book updates for inspecting live data.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin krak_check --features cli
//! ```

use std::time::Duration;

use wirekrak::constants::WS_PUBLIC_URL;
use wirekrak::protocol::channel::Depth;
use wirekrak::protocol::requests::{BookSubscribe, TradeSubscribe};
use wirekrak::session::{KrakenSession, SessionConfig, SessionSignal};

#[tokio::main]
async fn main() -> wirekrak::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut session = KrakenSession::new(SessionConfig::default());

    println!("Connecting to {WS_PUBLIC_URL}…");
    session.connect(WS_PUBLIC_URL).await?;

    println!("Subscribing to BTC/USD trades…");
    session
        .subscribe_trade(
            TradeSubscribe::new(vec!["BTC/USD".into()]).with_snapshot(true),
            |event| {
                println!(
                    "[trade {:?}] {} {:?} {} @ {}",
                    event.kind, event.trade.symbol, event.trade.side, event.trade.qty,
                    event.trade.price
                );
            },
        )
        .await?;

    println!("Subscribing to BTC/USD book (depth 10)…");
    session
        .subscribe_book(
            BookSubscribe::new(vec!["BTC/USD".into()]).with_depth(Depth::D10),
            |event| {
                println!(
                    "[book {:?}] {} bids={} asks={} checksum={}",
                    event.kind,
                    event.book.symbol,
                    event.book.bids.len(),
                    event.book.asks.len(),
                    event.book.checksum
                );
            },
        )
        .await?;

    println!("Polling for 30 seconds…\n");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);

    while tokio::time::Instant::now() < deadline {
        session.poll().await;

        while let Some(signal) = session.poll_signal() {
            match signal {
                SessionSignal::StatusChanged => {
                    if let Some(status) = session.status() {
                        println!("[status] {:?} ({})", status.system, status.version);
                    }
                }
                SessionSignal::PongObserved => {
                    println!("[pong] {:?}", session.pong());
                }
                SessionSignal::RejectionObserved => {
                    if let Some(notice) = session.rejection() {
                        eprintln!("[rejection] {}", notice.error);
                    }
                }
                SessionSignal::LivenessWarning { idle } => {
                    eprintln!("[liveness] silent for {idle:?}");
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("\n30 seconds elapsed, disconnecting...");
    session.close().await;
    println!("telemetry: {:?}", session.telemetry());
    println!("Done.");

    Ok(())
}
