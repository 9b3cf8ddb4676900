pub mod poller;
pub mod scheduler;

use crate::error::AgentError;
use crate::sound::{AudioSink, SoundEngine, siren_length};
use std::future::Future;
use vp_core::types::HelpRequestId;

/// One firing of the local alarm for an unanswered request.
pub trait Alarm: Send + Sync + 'static {
    fn fire(
        &self,
        request_id: &HelpRequestId,
        title: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), AgentError>> + Send;
}

/// Sounds the siren at a fixed volume.
pub struct SirenAlarm<A: AudioSink> {
    engine: SoundEngine<A>,
    volume: f32,
}

impl<A: AudioSink> SirenAlarm<A> {
    pub fn new(engine: SoundEngine<A>, volume: f32) -> Self {
        Self { engine, volume }
    }
}

impl<A: AudioSink> Alarm for SirenAlarm<A> {
    async fn fire(
        &self,
        request_id: &HelpRequestId,
        title: &str,
        message: &str,
    ) -> Result<(), AgentError> {
        tracing::info!(id = %request_id, %title, %message, "help request still unanswered");
        self.engine.play_alert(self.volume, siren_length()).await;
        Ok(())
    }
}
