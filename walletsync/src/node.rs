// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wiring for the long-running services: builds the database pool, chain
//! client and metrics, assembles the workers for each subcommand and ties
//! them to a shared cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use url::Url;

use walletsync_pg_db::{Db, DbArgs};

use crate::chain::{ChainAccountClient, ChainAdapter};
use crate::config::Config;
use crate::metrics::WalletMetrics;
use crate::notifier::Notifier;
use crate::services::server::run_server;
use crate::services::BusinessService;
use crate::store::Store;
use crate::sync::{FlowProcessor, Synchronizer, SynchronizerConfig};
use crate::worker::{BroadcastKind, Broadcaster};

async fn build_store(config: &Config) -> anyhow::Result<Store> {
    let url = Url::parse(&config.database.url)?;
    let db = Db::new(url, DbArgs::default()).await?;
    Ok(Store::new(db))
}

fn build_chain_client(config: &Config) -> Arc<dyn ChainAdapter> {
    Arc::new(ChainAccountClient::new(
        &config.chain.account_rpc_url,
        &config.chain.chain_name,
        &config.chain.network,
    ))
}

/// Cancellation token that fires on SIGINT or SIGTERM.
pub fn shutdown_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt"),
            _ = sigterm.recv() => info!("received terminate"),
        }
        token.cancel();
    });
    cancel
}

pub async fn run_migrations(config: &Config) -> anyhow::Result<()> {
    let url = Url::parse(&config.database.url)?;
    let db = Db::new(url, DbArgs::default()).await?;
    let versions = db.run_migrations().await?;
    info!(applied = versions.len(), "migrations finished");
    Ok(())
}

/// Run the synchronizer, flow processor and both broadcasters until the
/// cancellation token fires.
pub async fn run_sync(config: Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let registry = prometheus::Registry::new();
    let metrics = Arc::new(WalletMetrics::new(&registry));
    let store = build_store(&config).await?;
    let client = build_chain_client(&config);

    let from =
        Synchronizer::resolve_start_header(&store, &client, config.chain.starting_height).await?;
    info!(from = from.number, "wallet sync starting");

    // Single-slot channel: the synchronizer blocks on emit until the flow
    // processor has consumed the previous batch.
    let (batch_tx, batch_rx) = mpsc::channel(1);

    let synchronizer = Synchronizer::new(
        SynchronizerConfig {
            interval: config.chain.synchronizer_interval(),
            blocks_step: config.chain.blocks_step,
        },
        client.clone(),
        store.clone(),
        from,
        batch_tx,
        metrics.clone(),
    );
    let processor = FlowProcessor::new(
        store.clone(),
        client.clone(),
        config.chain.confirmations,
        batch_rx,
        metrics.clone(),
    );

    let handles = vec![
        synchronizer.spawn(cancel.clone()),
        processor.spawn(cancel.clone()),
        Broadcaster::new(
            BroadcastKind::Withdraw,
            store.clone(),
            client.clone(),
            config.chain.worker_interval(),
            metrics.clone(),
        )
        .spawn(cancel.clone()),
        Broadcaster::new(
            BroadcastKind::Internal,
            store.clone(),
            client.clone(),
            config.chain.worker_interval(),
            metrics.clone(),
        )
        .spawn(cancel.clone()),
    ];

    // The first worker to exit (cancellation, critical error or panic)
    // brings the rest down through the shared token.
    let (result, _, remaining) = futures::future::select_all(handles).await;
    if let Err(err) = result {
        error!(error = %err, "worker terminated abnormally");
    }
    cancel.cancel();
    for handle in remaining {
        let _ = handle.await;
    }
    info!("wallet sync stopped");
    Ok(())
}

/// Run the webhook notifier until the cancellation token fires.
pub async fn run_notify(config: Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let registry = prometheus::Registry::new();
    let metrics = Arc::new(WalletMetrics::new(&registry));
    let store = build_store(&config).await?;

    let notifier = Notifier::new(store, metrics);
    let handle = notifier.spawn(cancel);
    let _ = handle.await;
    info!("notifier stopped");
    Ok(())
}

/// Serve the business operations API until the cancellation token fires.
pub async fn run_rpc(config: Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let store = build_store(&config).await?;
    let client = build_chain_client(&config);
    let service = BusinessService::new(store, client);

    let addr: SocketAddr = format!("{}:{}", config.rpc_server.host, config.rpc_server.port)
        .parse()?;
    let server = run_server(addr, service);

    cancel.cancelled().await;
    server.abort();
    info!("business rpc server stopped");
    Ok(())
}
