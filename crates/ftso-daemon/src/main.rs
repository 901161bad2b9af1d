//! ftso-daemon: the FTSO data provider daemon.
//!
//! `memory` mode runs a local devnet of several voters; `sqlite` mode
//! follows an externally populated index as a single dry-run voter.

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::Context;
use ftso_crypto::calldata::ProtocolCodec;
use ftso_crypto::ecdsa::LocalSigner;
use ftso_daemon::clock::Clock;
use ftso_daemon::config::{DaemonConfig, IndexerMode};
use ftso_daemon::data::RoundDataSource;
use ftso_daemon::devnet::Devnet;
use ftso_daemon::events::EventBus;
use ftso_daemon::prices::PriceProvider;
use ftso_daemon::provider::{DataProvider, VoterIdentity};
use ftso_daemon::scheduler::{Scheduler, SchedulerSettings};
use ftso_daemon::submit::DryRunSubmitter;
use ftso_index::{RangeWaiter, SqliteIndex};
use ftso_registry::EpochResolver;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(mode = ?config.indexer.mode, "FTSO data provider starting");

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut tasks = JoinSet::new();

    match config.indexer.mode {
        IndexerMode::Memory => {
            let devnet = Arc::new(Devnet::new(&config, Clock::system())?);
            devnet.spawn(&mut tasks, &shutdown_tx);
        }
        IndexerMode::Sqlite => {
            let scheduler = sqlite_scheduler(&config)?;
            tasks.spawn(scheduler.run(shutdown_tx.subscribe()));
        }
    }

    let outcome = tokio::select! {
        joined = tasks.join_next() => match joined {
            Some(Ok(Ok(()))) | None => Ok(()),
            Some(Ok(Err(e))) => Err(anyhow::Error::new(e).context("voter stopped")),
            Some(Err(e)) => Err(anyhow::Error::new(e).context("voter task panicked")),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(());
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Err(e)) = joined {
            warn!(error = %e, "task ended with error during shutdown");
        }
    }

    if let Err(e) = &outcome {
        error!(error = %e, "daemon stopped");
    } else {
        info!("daemon stopped");
    }
    outcome
}

/// Single voter reading an existing SQLite index, submitting nothing.
fn sqlite_scheduler(config: &DaemonConfig) -> anyhow::Result<Arc<Scheduler>> {
    if config.epoch.first_voting_round_start_ts == 0 {
        anyhow::bail!("sqlite mode needs epoch.first_voting_round_start_ts");
    }
    let settings = config.epoch.settings();
    let index = Arc::new(
        SqliteIndex::open(Path::new(&config.indexer.sqlite_path))
            .with_context(|| format!("opening index {}", config.indexer.sqlite_path))?,
    );
    let waiter = RangeWaiter::with_poll_interval(index, config.indexer.poll_interval());
    let resolver = Arc::new(EpochResolver::new(waiter.clone(), settings));
    let data = Arc::new(RoundDataSource::new(
        waiter,
        resolver,
        ProtocolCodec::new(),
        config.protocol.benching_window,
        config.indexer.read_timeout(),
        config.protocol.cache_retention,
    ));

    let signer = if config.voter.private_key.is_empty() {
        warn!("no voter key configured, using a throwaway key");
        LocalSigner::random()
    } else {
        LocalSigner::from_hex(&config.voter.private_key)?
    };
    let submit_address = if config.voter.submit_address.is_empty() {
        signer.address()
    } else {
        config
            .voter
            .submit_address
            .parse::<Address>()
            .context("invalid voter.submit_address")?
    };
    info!(signing_address = %signer.address(), %submit_address, "voter identity loaded");

    let identity = VoterIdentity {
        signer,
        submit_address,
        submit_signatures_address: submit_address,
    };
    let provider = DataProvider::new(
        identity,
        PriceProvider::from_config(&config.feeds, rand::random()),
        data,
        config.protocol.cache_retention,
    );
    Ok(Arc::new(Scheduler::new(
        Arc::new(provider),
        Arc::new(DryRunSubmitter::new(submit_address)),
        Clock::system(),
        SchedulerSettings::from_config(&config.protocol),
        EventBus::default(),
    )))
}
