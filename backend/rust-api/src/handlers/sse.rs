use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    errors::ApiError,
    metrics::SSE_CONNECTIONS_ACTIVE,
    middlewares::auth::JwtClaims,
    models::interruption::{
        GatePhase, InterruptionEvent, InterruptionExpired, InterruptionGate, InterruptionTick,
    },
    services::{session_service::SessionService, AppState},
};

/// SSE endpoint for the interruption countdown.
/// GET /api/sessions/{id}/interruption/stream
///
/// Each connection runs a fresh gate: reconnecting mid-countdown restarts
/// it at the configured duration, by design (see `InterruptionGate`).
pub async fn interruption_stream(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Client connected to interruption stream: session={}",
        session_id
    );

    let session_service = SessionService::new(state.mongo.clone());
    let session = session_service.get_session(&session_id).await?;
    session_service.guard_session_access(&claims, &session)?;

    let total_seconds = session.interruption_time_seconds;
    let tick_interval = tick_interval_ms();
    tracing::info!(
        "Starting interruption countdown: session={}, duration={}s, tick_interval={}ms",
        session_id,
        total_seconds,
        tick_interval
    );

    SSE_CONNECTIONS_ACTIVE.inc();
    let stream = create_countdown_stream(session_id, total_seconds, tick_interval);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

/// One tick event per second while the gate counts, then a single expired
/// event enabling "continue".
fn create_countdown_stream(
    session_id: String,
    total_seconds: u32,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut gate = InterruptionGate::new(total_seconds);
    gate.start();

    stream::unfold(
        (session_id, gate, false),
        move |(sid, mut gate, final_sent)| async move {
            if final_sent {
                return None;
            }

            if gate.phase() == GatePhase::Expired {
                let expired_event = InterruptionEvent::InterruptionExpired(InterruptionExpired {
                    session_id: sid.clone(),
                    timestamp: Utc::now(),
                    continue_enabled: gate.can_continue(),
                });

                let event = Event::default()
                    .event(expired_event.event_name())
                    .data(expired_event.to_sse_data());

                tracing::info!("Interruption countdown expired: session={}", sid);
                SSE_CONNECTIONS_ACTIVE.dec();
                return Some((Ok(event), (sid, gate, true)));
            }

            let remaining = gate.remaining_seconds();
            let tick_event = InterruptionEvent::InterruptionTick(InterruptionTick {
                session_id: sid.clone(),
                remaining_seconds: remaining,
                elapsed_seconds: total_seconds.saturating_sub(remaining),
                total_seconds,
                timestamp: Utc::now(),
            });

            let event = Event::default()
                .event(tick_event.event_name())
                .data(tick_event.to_sse_data());

            // Wait one interval before the next decrement
            sleep(Duration::from_millis(tick_interval_ms)).await;
            gate.tick();

            Some((Ok(event), (sid, gate, false)))
        },
    )
}
