mod config;
mod telemetry;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use config::CliArgs;
use sqspipe_core::impls::{LineSink, LineSource};
use sqspipe_core::{Lifetime, PumpBuilder, PumpConfig};
use sqspipe_sqs::SqsQueueClient;
use tokio::signal;
use tracing::{debug, info};

/// Upper bound on waiting for a blocked stdin read after the pump returned.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let queue_name = args.queue_name.clone();
    let config = PumpConfig::try_from(args)?;

    telemetry::init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(run(queue_name, config));
    // tokio's stdin reads on a blocking thread that cannot be interrupted.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(queue_name: String, config: PumpConfig) -> anyhow::Result<()> {
    let lifetime = Lifetime::new();
    tokio::spawn(shutdown_signal(lifetime.clone()));
    let _deadline = config.timeout.map(|after| lifetime.cancel_after(after));

    let client = match SqsQueueClient::connect(&lifetime, &queue_name).await {
        Ok(client) => client,
        Err(e) if e.is_cancelled() => {
            debug!(error = %e, "stopped before the queue was resolved");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let pump = PumpBuilder::from_config(Arc::new(client), &config).build()?;

    if std::io::stdin().is_terminal() {
        info!(queue = %queue_name, "receive mode");
        let sink = Arc::new(LineSink::new(tokio::io::stdout()));
        pump.receive(sink, &lifetime)
            .await
            .with_context(|| format!("receiving from {queue_name}"))?;
    } else {
        info!(queue = %queue_name, "send mode");
        let source = Arc::new(LineSource::new(tokio::io::stdin()));
        pump.send(source, &lifetime)
            .await
            .with_context(|| format!("sending to {queue_name}"))?;
    }

    Ok(())
}

async fn shutdown_signal(lifetime: Lifetime) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
        () = lifetime.cancelled() => return,
    }

    lifetime.cancel();
}
