use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{ActivityEntry, ActivityLog};
use crate::models::{AppState, PipelineRun, TripRequest};
use crate::pipeline::{
    ChannelObserver, ItineraryAssembler, PipelineEvent, PipelineOrchestrator, ProgressEvent,
    RecordingObserver,
};
use crate::routes::{aggregator_credential, session_runner};
use crate::session::SessionContext;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/sessions/{id}/itinerary",
            post(create_itinerary).get(get_itinerary),
        )
        .route("/api/sessions/{id}/itinerary/stream", post(stream_itinerary))
        .route("/api/sessions/{id}/itinerary/download", get(download_itinerary))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub filename: String,
    pub data_url: String,
}

#[derive(Debug, Serialize)]
pub struct ItineraryResponse {
    pub run: PipelineRun,
    pub progress: Vec<ProgressEvent>,
    pub activity: Vec<ActivityEntry>,
    pub document: Option<DocumentView>,
}

impl ItineraryResponse {
    fn new(run: PipelineRun, progress: Vec<ProgressEvent>, activity: Vec<ActivityEntry>) -> Self {
        let document = ItineraryAssembler::document(&run).map(|doc| DocumentView {
            data_url: doc.data_url(),
            filename: doc.filename,
        });
        Self {
            run,
            progress,
            activity,
            document,
        }
    }
}

fn build_orchestrator(state: &AppState, session: &SessionContext, log: ActivityLog) -> PipelineOrchestrator {
    PipelineOrchestrator::new(session_runner(state, session, log), state.aggregator.clone())
        .with_default_aggregator_key(aggregator_credential(state, session))
}

/// Store the finished run on the session. The session may have been
/// deleted meanwhile; that only loses the result.
async fn save_run(state: &AppState, id: Uuid, run: &PipelineRun, activity: &[ActivityEntry]) {
    let saved = state
        .sessions
        .update(id, |session| {
            session.last_run = Some(run.clone());
            session.activity = activity.to_vec();
            Ok(())
        })
        .await;
    if let Err(e) = saved {
        warn!(session_id = %id, error = %e, "Could not store pipeline run");
    }
}

/// POST /api/sessions/{id}/itinerary - Run the pipeline and wait for it
async fn create_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TripRequest>,
) -> AppResult<Json<ItineraryResponse>> {
    let request = request.normalized()?;
    let session = state.sessions.get(id).await?;
    info!(session_id = %id, destination = %request.destination, "Itinerary requested");

    let log = ActivityLog::new();
    let orchestrator = build_orchestrator(&state, &session, log.clone());
    let observer = RecordingObserver::new();

    let run = orchestrator.run(&session, &request, &observer).await;
    let activity = log.entries();
    save_run(&state, id, &run, &activity).await;

    Ok(Json(ItineraryResponse::new(run, observer.events(), activity)))
}

/// POST /api/sessions/{id}/itinerary/stream - Same run, as server-sent events
async fn stream_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TripRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = request.normalized()?;
    let session = state.sessions.get(id).await?;
    info!(session_id = %id, destination = %request.destination, "Streaming itinerary requested");

    let (tx, rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let log = ActivityLog::new();
        let orchestrator = build_orchestrator(&state, &session, log.clone());
        let observer = ChannelObserver::new(tx).with_activity(log.clone());

        let run = orchestrator.run(&session, &request, &observer).await;
        observer.flush_activity();
        let activity = log.entries();
        save_run(&state, id, &run, &activity).await;

        let _ = done_tx.send(ItineraryResponse::new(run, Vec::new(), activity));
    });

    let events = stream::unfold((rx, Some(done_rx)), |(mut rx, done)| async move {
        match rx.recv().await {
            Some(PipelineEvent::Progress(event)) => Some((sse_event("progress", &event), (rx, done))),
            Some(PipelineEvent::Activity(entry)) => Some((sse_event("activity", &entry), (rx, done))),
            None => {
                let response = done?.await.ok()?;
                Some((sse_event("complete", &response), (rx, None)))
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn sse_event<T: Serialize>(name: &str, data: &T) -> Result<Event, Infallible> {
    Ok(Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
}

/// GET /api/sessions/{id}/itinerary - Last run of the session
async fn get_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ItineraryResponse>> {
    let session = state.sessions.get(id).await?;
    let run = session
        .last_run
        .ok_or_else(|| AppError::NotFound("no itinerary has been generated yet".to_string()))?;
    Ok(Json(ItineraryResponse::new(run, Vec::new(), session.activity)))
}

/// GET /api/sessions/{id}/itinerary/download - Plain-text attachment
async fn download_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.get(id).await?;
    let document = session
        .last_run
        .as_ref()
        .and_then(ItineraryAssembler::document)
        .ok_or_else(|| AppError::NotFound("no itinerary available for download".to_string()))?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.content,
    ))
}
