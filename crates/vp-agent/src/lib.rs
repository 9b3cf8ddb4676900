//! Device agent: the continuous alarm, push handling, the board watcher and
//! the offline report queue, wired around one [`ApiClient`].

pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod notify;
pub mod offline;
pub mod push;
pub mod receiver;
pub mod sound;
pub mod worker;

pub use api::ApiClient;
pub use config::AgentConfig;
pub use error::AgentError;

use crate::board::BoardWatcher;
use crate::notify::SirenAlarm;
use crate::notify::poller::DispatchPoller;
use crate::notify::scheduler::ContinuousNotifier;
use crate::offline::{
    FileBackend, OfflineQueue, RetryMonitor, Submission, spawn_connectivity_probe,
};
use crate::push::PushSubscriptionManager;
use crate::sound::{DEFAULT_VOLUME, DeviceSink, SoundEngine};
use crate::worker::{BackgroundWorker, DeviceNotifier, spawn_sound_client};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use vp_core::types::ReportKind;

fn open_queue(config: &AgentConfig) -> Result<Arc<OfflineQueue<FileBackend>>, AgentError> {
    let backend = FileBackend::open(&config.data_dir)?;
    Ok(Arc::new(OfflineQueue::new(backend)))
}

/// Sends a report now, or queues it for the running agent to resend.
pub async fn submit_report(
    config: &AgentConfig,
    kind: ReportKind,
    payload: Value,
) -> Result<Submission, AgentError> {
    let client = ApiClient::new(&config.server_url)?;
    let monitor = RetryMonitor::new(open_queue(config)?, Arc::new(client));
    monitor.submit_or_queue(kind, payload).await
}

/// Runs until ctrl-c.
pub async fn run(config: AgentConfig) -> Result<(), AgentError> {
    let client = ApiClient::new(&config.server_url)?;
    let queue = open_queue(&config)?;
    queue.clear_expired_reports(Utc::now())?;

    let sink = DeviceSink::from_command(config.sound_command.as_deref());
    let notifier = ContinuousNotifier::new(SirenAlarm::new(
        SoundEngine::new(sink.clone()),
        DEFAULT_VOLUME,
    ));
    let worker = Arc::new(BackgroundWorker::new(DeviceNotifier::from_command(
        config.notify_command.as_deref(),
    )));

    let mut tasks = vec![
        DispatchPoller::new(client.clone(), notifier.clone()).spawn(),
        spawn_sound_client(worker.subscribe_clients(), SoundEngine::new(sink)),
        BoardWatcher::new(
            client.clone(),
            config.location.clone(),
            Arc::clone(&worker),
            notifier.clone(),
        )
        .spawn(),
    ];

    let (online_tx, online_rx) = watch::channel(false);
    tasks.push(spawn_connectivity_probe(client.clone(), online_tx));
    tasks.push(RetryMonitor::new(queue, Arc::new(client.clone())).spawn(online_rx));

    if let Some(addr) = config.push_listen {
        let worker = Arc::clone(&worker);
        tasks.push(tokio::spawn(async move {
            if let Err(err) = receiver::serve(addr, worker).await {
                tracing::warn!(%addr, error = %err, "push receiver stopped");
            }
        }));
    }

    let subscription = config
        .resolved_push_endpoint()
        .map(|endpoint| {
            PushSubscriptionManager::new(client.clone(), endpoint, Some(config.location.clone()))
        });
    if let Some(manager) = &subscription {
        if let Err(err) = manager.subscribe().await {
            tracing::warn!(endpoint = manager.endpoint(), error = %err, "push registration failed, relying on the board watcher");
        }
    }

    tracing::info!(
        location = %config.location,
        server = %config.server_url,
        "agent running"
    );
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for ctrl-c");
    }

    tracing::info!("agent shutting down");
    notifier.stop_all().await;
    if let Some(manager) = &subscription {
        if manager.is_subscribed().await {
            if let Err(err) = manager.unsubscribe().await {
                tracing::warn!(error = %err, "push unregistration failed");
            }
        }
    }
    for task in tasks {
        task.abort();
    }
    Ok(())
}
