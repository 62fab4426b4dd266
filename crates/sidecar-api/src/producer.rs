//! The Producer API (§4.1): the single ingress both in-process callers and
//! `POST /events` funnel through. Validates the envelope, runs the Sampler,
//! then attempts a non-blocking enqueue — never suspending the caller.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sidecar_core::config::SamplingRates;
use sidecar_core::event::EventEnvelope;
use sidecar_core::sampler::{SampleCategory, Sampler};
use tracing::instrument;

use crate::errors::EventHandlerError;
use crate::responses::EventAcceptedResponse;
use crate::state::AppState;

/// Outcome of a `put()` call, mirroring the four results spec.md §4.1 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted,
    DroppedQueueFull,
    DroppedInvalid,
    DroppedSampled,
}

/// Validate, sample, and (try to) enqueue one event envelope.
///
/// This is the in-process producer entry point: it never blocks beyond the
/// enqueue's own lock acquisition, and it never returns an `Err` a caller
/// could mistake for something to retry — every outcome, including
/// rejection, is a normal `PutOutcome` variant.
pub async fn put(state: &AppState, envelope: EventEnvelope) -> PutOutcome {
    let validated = match envelope.validate() {
        Ok(validated) => validated,
        Err(_) => {
            state.metrics.record_event_dropped("invalid");
            return PutOutcome::DroppedInvalid;
        }
    };

    let rates: SamplingRates = state.config_snapshot().sampling.rates.clone();
    let sampler = Sampler::new(rates);
    if !sampler.should_sample(SampleCategory::Events) {
        state.metrics.record_event_sampled();
        return PutOutcome::DroppedSampled;
    }

    match state.queue.try_put(validated).await {
        Ok(()) => {
            state.metrics.record_event_queued();
            let utilization = state.queue.utilization().await;
            state
                .metrics
                .record_queue_depth(state.queue.len().await, utilization);
            PutOutcome::Accepted
        }
        Err(_) => {
            state.metrics.record_event_dropped("queue_full");
            PutOutcome::DroppedQueueFull
        }
    }
}

/// `POST /events` (§4.1, §6): body is one event envelope; `202` on enqueue,
/// `400` on invalid, `429` on queue-full.
#[instrument(skip(state, envelope), fields(event_type))]
pub async fn handle_events(
    State(state): State<AppState>,
    Json(envelope): Json<EventEnvelope>,
) -> Result<(StatusCode, Json<EventAcceptedResponse>), EventHandlerError> {
    tracing::Span::current().record("event_type", envelope.event_type.as_str());

    let validated = envelope
        .validate()
        .map_err(EventHandlerError::Invalid)?;

    let rates = state.config_snapshot().sampling.rates.clone();
    let sampler = Sampler::new(rates);
    if !sampler.should_sample(SampleCategory::Events) {
        state.metrics.record_event_sampled();
        // A sampled-out event is still `202`: the producer asked us to
        // observe it and we chose not to, which is not a client error.
        return Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse::default())));
    }

    state
        .queue
        .try_put(validated)
        .await
        .map_err(EventHandlerError::QueueFull)?;

    state.metrics.record_event_queued();
    let utilization = state.queue.utilization().await;
    state
        .metrics
        .record_queue_depth(state.queue.len().await, utilization);

    Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse::default())))
}

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;
