//! rusty-wc: headless WalletConnect session broker.
//!
//! Protocol events and wallet commands arrive as JSON lines on stdin;
//! protocol commands and notifications leave as JSON lines on stdout.
//! Logs go to stderr.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use rusty_wc_adapters::BrokerAdapterConfig;

mod bridge;
mod runtime;

use bridge::{read_inbound, Inbound, Outbound};
use runtime::Runtime;

/// `RUST_LOG` when it parses, `info` otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    tracing::info!("Starting rusty-wc");

    let config = BrokerAdapterConfig::from_env();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    let runtime = Runtime::new(&config, in_rx, out_tx.clone())?;
    let broker_task = tokio::spawn(runtime.run());

    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            let mut encoded = serde_json::to_vec(&line)?;
            encoded.push(b'\n');
            stdout.write_all(&encoded).await?;
            stdout.flush().await?;
        }
        eyre::Ok(())
    });

    read_inbound(BufReader::new(tokio::io::stdin()), &in_tx, &out_tx).await?;

    drop(in_tx);
    drop(out_tx);
    broker_task.await?;
    writer_task.await??;
    tracing::info!("rusty-wc stopped");
    Ok(())
}
