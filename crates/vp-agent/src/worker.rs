use crate::error::AgentError;
use crate::sound::{AudioSink, DEFAULT_VOLUME, SoundEngine, siren_length};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use vp_core::push::DEFAULT_NOTIFICATION_URL;
use vp_core::types::{HelpRequestId, PushPayload};

const CLIENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    View,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Notifications for the same request replace each other.
    pub tag: HelpRequestId,
    pub url: String,
    pub actions: [NotificationAction; 2],
}

impl OsNotification {
    pub fn from_payload(payload: PushPayload) -> Self {
        Self {
            title: payload.title,
            body: payload.body,
            icon: payload.image,
            tag: payload.request_id,
            url: payload
                .url
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_URL.to_string()),
            actions: [NotificationAction::View, NotificationAction::Close],
        }
    }

    /// Where a click should take the operator, if anywhere.
    pub fn click_target(&self, action: NotificationAction) -> Option<&str> {
        match action {
            NotificationAction::View => Some(&self.url),
            NotificationAction::Close => None,
        }
    }
}

/// Messages relayed to every open client on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    PlayNotificationSound {
        volume: f32,
        /// Milliseconds.
        duration: u64,
    },
}

pub trait Notifier: Send + Sync + 'static {
    fn show(&self, notification: &OsNotification) -> Result<(), AgentError>;
}

/// Hands notifications to a desktop helper such as `notify-send`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn show(&self, notification: &OsNotification) -> Result<(), AgentError> {
        Command::new(&self.program)
            .arg("--app-name=valet")
            .arg("--urgency=critical")
            .arg(&notification.title)
            .arg(&notification.body)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|err| AgentError::Command {
                message: format!("{}: {err}", self.program),
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: &OsNotification) -> Result<(), AgentError> {
        tracing::info!(
            id = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum DeviceNotifier {
    Command(CommandNotifier),
    Log(LogNotifier),
}

impl DeviceNotifier {
    pub fn from_command(command: Option<&str>) -> Self {
        match command.map(str::trim).filter(|command| !command.is_empty()) {
            Some(program) => Self::Command(CommandNotifier::new(program)),
            None => Self::Log(LogNotifier),
        }
    }
}

impl Notifier for DeviceNotifier {
    fn show(&self, notification: &OsNotification) -> Result<(), AgentError> {
        match self {
            Self::Command(notifier) => notifier.show(notification),
            Self::Log(notifier) => notifier.show(notification),
        }
    }
}

/// Receives push payloads, raises an OS notification and tells every open
/// client to sound the alert. Delivery to clients is fire-and-forget.
pub struct BackgroundWorker<N: Notifier> {
    notifier: N,
    clients: broadcast::Sender<ClientMessage>,
    volume: f32,
    shown: Mutex<HashSet<HelpRequestId>>,
}

impl<N: Notifier> BackgroundWorker<N> {
    pub fn new(notifier: N) -> Self {
        let (clients, _) = broadcast::channel(CLIENT_CHANNEL_CAPACITY);
        Self {
            notifier,
            clients,
            volume: DEFAULT_VOLUME,
            shown: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn subscribe_clients(&self) -> broadcast::Receiver<ClientMessage> {
        self.clients.subscribe()
    }

    /// Returns `false` when this request was already announced, e.g. once by
    /// push and once by the board watcher.
    pub fn handle_push(&self, payload: PushPayload) -> bool {
        let first = match self.shown.lock() {
            Ok(mut shown) => shown.insert(payload.request_id.clone()),
            Err(poisoned) => poisoned.into_inner().insert(payload.request_id.clone()),
        };
        if !first {
            return false;
        }
        let notification = OsNotification::from_payload(payload);
        if let Err(err) = self.notifier.show(&notification) {
            tracing::warn!(id = %notification.tag, error = %err, "could not show notification");
        }
        let duration = u64::try_from(siren_length().as_millis()).unwrap_or(u64::MAX);
        let delivered = self
            .clients
            .send(ClientMessage::PlayNotificationSound {
                volume: self.volume,
                duration,
            })
            .unwrap_or(0);
        tracing::debug!(id = %notification.tag, clients = delivered, "sound request relayed");
        true
    }

    /// Drops bookkeeping for requests no longer on the board.
    pub fn retain_shown(&self, keep: &HashSet<HelpRequestId>) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.retain(|id| keep.contains(id));
        }
    }
}

/// A local client that plays every relayed sound request.
pub fn spawn_sound_client<A: AudioSink>(
    mut receiver: broadcast::Receiver<ClientMessage>,
    engine: SoundEngine<A>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(ClientMessage::PlayNotificationSound { volume, duration }) => {
                    engine
                        .play_alert(volume, Duration::from_millis(duration))
                        .await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "sound client dropped messages");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
