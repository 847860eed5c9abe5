//! Height watcher - connects to a node and prints height changes.
//!
//! This example demonstrates:
//! - Building a connector with `ConnectorBuilder` and a JSON config
//! - Receiving events through `ChannelObserver`
//! - Requesting an account balance with `request_balance`
//!
//! # Running
//!
//! ```text
//! RUST_LOG=ledger_connector=debug cargo run --example height_watch -- 127.0.0.1 [public-key-hex]
//! ```
//!
//! Set `CONNECTOR_CONFIG` to a JSON document to override defaults, e.g.
//! `{"port": 21841, "poll_interval_ms": 1000}`.

use std::sync::Arc;

use ledger_connector::codec::PublicKey;
use ledger_connector::{ChannelObserver, ConnectorBuilder, ConnectorConfig, ConnectorEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let account = args.next().map(|key| key.parse::<PublicKey>()).transpose()?;

    let config = match std::env::var("CONNECTOR_CONFIG") {
        Ok(json) => ConnectorConfig::from_json(&json)?,
        Err(_) => ConnectorConfig::default(),
    };

    let (observer, mut events) = ChannelObserver::new();
    let connector = ConnectorBuilder::new()
        .config(config)
        .observer(Arc::new(observer))
        .build_tcp();

    if let Err(e) = connector.start(address.as_str()).await {
        tracing::warn!("Initial connect failed: {}", e);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(ConnectorEvent::Ready) => println!("ready"),
                Some(ConnectorEvent::PeerConnected) => {
                    println!("connected to {}", address);
                    if let Some(account) = account {
                        println!("requesting balance of {}", account);
                        connector.request_balance(account).await?;
                    }
                }
                Some(ConnectorEvent::PeerDisconnected) => println!("disconnected"),
                Some(ConnectorEvent::HeightChanged(height)) => println!("height {}", height),
                Some(ConnectorEvent::Balance(info)) => {
                    println!("balance {} at height {}", info.balance(), info.height)
                }
                Some(ConnectorEvent::TransportError(e)) => println!("transport error: {}", e),
                Some(_) => {}
                None => break,
            },
        }
    }

    connector.destroy().await?;
    Ok(())
}
