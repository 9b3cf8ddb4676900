use crate::{AppState, build_valet};
use chrono::{DateTime, Utc};
use std::time::Duration;
use vp_core::{RequestContext, ValetError};
use vp_events::types::EventSource;

const SWEEP_INTERVAL_SECS: u64 = 5;

/// Removes completed help requests whose countdown has elapsed by `now`.
pub fn sweep_at(state: &AppState, now: DateTime<Utc>) -> Result<usize, ValetError> {
    let valet = build_valet(state)?;
    let ctx = RequestContext::new(EventSource::System, None);
    valet.help().sweep_removals(&ctx, now)
}

pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        match sweep_at(&state, Utc::now()) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "removed completed help requests"),
            Err(err) => tracing::warn!(error = %err, "removal sweep failed"),
        }
    }
}
