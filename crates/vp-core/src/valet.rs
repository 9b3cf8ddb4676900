use crate::error::{HelpError, ReportError, ValetError};
use crate::events::EventRepository;
use crate::help::HelpRepository;
use crate::push::PushSubscriptionRepository;
use crate::reconciliation::reconcile;
use crate::repair::{RepairOutcome, RepairSummary, repair_row};
use crate::reports::ReportRepository;
use crate::store::Store;
use crate::types::event::EventBody;
use crate::types::io::{
    CreateHelpRequestInput, HelpResponseInput, NewReport, ReconcileInput, SubscribeInput,
};
use crate::types::{
    DeadLetter, HelpRequest, HelpRequestId, HelpRequestStatus, HelpRequestWithResponses,
    HelpResponse, PushSubscription, ReconciliationResult, ReportId, ReportKind,
    SquareDailySummary, SubmittedReport,
};
use crate::validation::{
    parse_shift_report, validate_help_request, validate_help_response, validate_help_transition,
    validate_report_payload, validate_subscription,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use vp_events::bus::EventBus;
use vp_events::types::{EventRecord, EventSource};

/// Seconds a completed help request stays on the board before the sweeper
/// removes it.
pub const REMOVAL_COUNTDOWN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            source,
            correlation_id,
        }
    }
}

pub struct Valet<S: Store> {
    store: S,
    event_bus: EventBus,
}

impl<S: Store> Valet<S> {
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    pub fn help(&self) -> HelpApi<'_, S> {
        HelpApi { core: self }
    }

    pub fn reports(&self) -> ReportsApi<'_, S> {
        ReportsApi { core: self }
    }

    pub fn push(&self) -> PushApi<'_, S> {
        PushApi { core: self }
    }

    pub fn events(&self) -> EventsApi<'_, S> {
        EventsApi { core: self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs `f` in a transaction, appends the events it produced, and
    /// publishes them on the bus only after commit.
    fn with_events<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T, ValetError>
    where
        F: FnOnce(&S) -> Result<(T, Vec<EventBody>), ValetError>,
    {
        let (value, records) = self.store.with_tx(|store| {
            let (value, bodies) = f(store)?;
            let mut records = Vec::new();
            for body in bodies {
                let record = build_event_record(ctx, body)?;
                let record = store.events().append(record)?;
                records.push(record);
            }
            Ok((value, records))
        })?;
        for record in records {
            self.event_bus.publish(record);
        }
        Ok(value)
    }
}

pub struct HelpApi<'a, S: Store> {
    core: &'a Valet<S>,
}

impl<S: Store> HelpApi<'_, S> {
    pub fn request(
        &self,
        ctx: &RequestContext,
        input: CreateHelpRequestInput,
    ) -> Result<HelpRequest, ValetError> {
        validate_help_request(&input)?;
        self.core.with_events(ctx, |store| {
            let help_request = store.help().create(input)?;
            tracing::info!(
                id = %help_request.id,
                location = %help_request.requesting_location,
                "help requested"
            );
            Ok((
                help_request.clone(),
                vec![EventBody::HelpRequested { help_request }],
            ))
        })
    }

    pub fn respond(
        &self,
        ctx: &RequestContext,
        id: &HelpRequestId,
        input: HelpResponseInput,
    ) -> Result<HelpResponse, ValetError> {
        self.core.with_events(ctx, |store| {
            let request = store.help().get(id)?.ok_or(HelpError::RequestNotFound)?;
            validate_help_response(&request, &input)?;
            let (help_request, response) = store.help().respond(id, input)?;
            tracing::info!(
                id = %help_request.id,
                from = %response.responding_location_name,
                attendants = response.attendants_offered,
                "help dispatched"
            );
            Ok((
                response.clone(),
                vec![EventBody::HelpResponded {
                    help_request,
                    response,
                }],
            ))
        })
    }

    pub fn complete(
        &self,
        ctx: &RequestContext,
        id: &HelpRequestId,
    ) -> Result<HelpRequest, ValetError> {
        self.core.with_events(ctx, |store| {
            let request = store.help().get(id)?.ok_or(HelpError::RequestNotFound)?;
            validate_help_transition(request.status, HelpRequestStatus::Completed)?;
            let auto_remove_at = Utc::now() + Duration::seconds(REMOVAL_COUNTDOWN_SECS);
            let help_request = store.help().complete(id, auto_remove_at)?;
            Ok((
                help_request.clone(),
                vec![EventBody::HelpCompleted { help_request }],
            ))
        })
    }

    /// Deletes completed requests whose countdown has elapsed. Returns how
    /// many were removed.
    pub fn sweep_removals(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<usize, ValetError> {
        self.core.with_events(ctx, |store| {
            let due = store.help().due_for_removal(now)?;
            let mut events = Vec::with_capacity(due.len());
            for id in due {
                store.help().remove(&id)?;
                events.push(EventBody::HelpRemoved {
                    help_request_id: id,
                });
            }
            Ok((events.len(), events))
        })
    }

    pub fn get(&self, id: &HelpRequestId) -> Result<Option<HelpRequestWithResponses>, ValetError> {
        let help = self.core.store.help();
        let Some(request) = help.get(id)? else {
            return Ok(None);
        };
        let responses = help.responses_for(id)?;
        Ok(Some(HelpRequestWithResponses { request, responses }))
    }

    pub fn list_active(&self) -> Result<Vec<HelpRequest>, ValetError> {
        self.core
            .store
            .help()
            .list_active()
            .map_err(ValetError::from)
    }

    pub fn recent_responses(&self, since: DateTime<Utc>) -> Result<Vec<HelpResponse>, ValetError> {
        self.core
            .store
            .help()
            .recent_responses(since)
            .map_err(ValetError::from)
    }
}

pub struct ReportsApi<'a, S: Store> {
    core: &'a Valet<S>,
}

impl<S: Store> ReportsApi<'_, S> {
    pub fn submit(
        &self,
        ctx: &RequestContext,
        kind: ReportKind,
        payload: Value,
    ) -> Result<SubmittedReport, ValetError> {
        validate_report_payload(kind, &payload)?;
        let location = payload
            .get("location")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.core.with_events(ctx, |store| {
            let report = store.reports().insert(NewReport {
                kind,
                location,
                payload,
            })?;
            tracing::info!(id = %report.id, kind = %report.kind, "report submitted");
            Ok((report.clone(), vec![EventBody::ReportSubmitted { report }]))
        })
    }

    pub fn get(&self, id: &ReportId) -> Result<Option<SubmittedReport>, ValetError> {
        self.core
            .store
            .reports()
            .get(id)
            .map_err(ValetError::from)
    }

    pub fn reconcile(
        &self,
        id: &ReportId,
        square: &SquareDailySummary,
    ) -> Result<ReconciliationResult, ValetError> {
        let report = self.get(id)?.ok_or(ReportError::ReportNotFound)?;
        if report.kind != ReportKind::ShiftReport {
            return Err(ReportError::InvalidInput {
                message: format!("{} cannot be reconciled against Square", report.kind),
            }
            .into());
        }
        let shift = parse_shift_report(&report.payload)?;
        Ok(reconcile(square, &shift))
    }

    /// Rewrites double-encoded payloads in place and dead-letters anything
    /// that does not validate.
    pub fn repair(&self) -> Result<RepairSummary, ValetError> {
        self.core.store.with_tx(|store| {
            let reports = store.reports();
            let mut summary = RepairSummary::default();
            for row in reports.raw_rows()? {
                let outcome = repair_row(&row);
                match &outcome {
                    RepairOutcome::Unchanged => {}
                    RepairOutcome::Repaired { payload } => {
                        reports.rewrite_payload(&row.id, payload)?;
                    }
                    RepairOutcome::DeadLetter { reason } => {
                        tracing::warn!(id = %row.id, %reason, "dead-lettering report");
                        reports.dead_letter(&row, reason)?;
                    }
                }
                summary.record(&outcome);
            }
            Ok(summary)
        })
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, ValetError> {
        self.core
            .store
            .reports()
            .dead_letters()
            .map_err(ValetError::from)
    }
}

/// Stateless comparison of caller-supplied totals.
pub fn reconcile_input(input: &ReconcileInput) -> ReconciliationResult {
    reconcile(&input.square, &input.shift_report)
}

pub struct PushApi<'a, S: Store> {
    core: &'a Valet<S>,
}

impl<S: Store> PushApi<'_, S> {
    pub fn subscribe(
        &self,
        ctx: &RequestContext,
        input: SubscribeInput,
    ) -> Result<PushSubscription, ValetError> {
        validate_subscription(&input)?;
        self.core.with_events(ctx, |store| {
            let subscription = store.push().upsert(input)?;
            Ok((
                subscription.clone(),
                vec![EventBody::PushSubscribed {
                    endpoint: subscription.endpoint,
                    location: subscription.location,
                }],
            ))
        })
    }

    /// Unknown endpoints are not an error; the call reports whether anything
    /// was removed.
    pub fn unsubscribe(&self, ctx: &RequestContext, endpoint: &str) -> Result<bool, ValetError> {
        self.core.with_events(ctx, |store| {
            let removed = store.push().remove(endpoint)?;
            let events = if removed {
                vec![EventBody::PushUnsubscribed {
                    endpoint: endpoint.to_string(),
                }]
            } else {
                Vec::new()
            };
            Ok((removed, events))
        })
    }

    pub fn list(&self) -> Result<Vec<PushSubscription>, ValetError> {
        self.core.store.push().list().map_err(ValetError::from)
    }
}

pub struct EventsApi<'a, S: Store> {
    core: &'a Valet<S>,
}

impl<S: Store> EventsApi<'_, S> {
    pub fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, ValetError> {
        self.core.store.events().list(after, limit)
    }
}

fn build_event_record(ctx: &RequestContext, body: EventBody) -> Result<EventRecord, ValetError> {
    let value = serde_json::to_value(body).map_err(ValetError::internal)?;
    Ok(EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        body: value,
    })
}
