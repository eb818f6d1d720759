/**
 * READ MODEL API - HTTP surface of the hub
 *
 * - /health, /system/health : liveness and counters
 * - /environments/...        : authoritative object state, plus a query-string
 *                              command endpoint for scripts
 * - /businessprocesses/...   : BP and KPI timelines, unannotated events,
 *                              frame annotation. Timelines and events take
 *                              `?start=&end=` in unix seconds, default the
 *                              last month
 * - /ws                      : state-sync channel (see ws.rs)
 *
 * No authentication: the dashboard runs on a trusted network.
 */

use crate::health::HubHealth;
use crate::models::EnvironmentView;
use crate::ports::{EventRecord, TimelineError};
use crate::state::AppState;
use crate::store::ApplyError;
use crate::ws::ws_handler;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bpdash_core::protocol::{FIELD_ACKNOWLEDGEMENT, FIELD_DOWNTIME, FIELD_STATE};
use bpdash_core::{Command, Delta, FrameModel, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{error, warn};

/// A frame as served to viewers, addressable by its event id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FrameView {
    pub id: String,
    #[serde(flatten)]
    pub frame: FrameModel,
}

impl From<FrameModel> for FrameView {
    fn from(frame: FrameModel) -> Self {
        Self {
            id: frame.event_id(),
            frame,
        }
    }
}

/// A `nok` frame waiting for an annotation; `id` is what the annotation
/// endpoint expects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventView {
    pub id: String,
    pub bp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi: Option<String>,
    #[serde(flatten)]
    pub frame: FrameModel,
}

impl From<EventRecord> for EventView {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.frame.event_id(),
            bp: record.bp,
            kpi: record.kpi,
            frame: record.frame,
        }
    }
}

/// Unparsable bounds are ignored, like missing ones.
#[derive(Debug, Deserialize, Default)]
pub struct WindowQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl WindowQuery {
    pub fn window(&self, now: OffsetDateTime) -> TimeWindow {
        let bound = |raw: &Option<String>| raw.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        TimeWindow::from_unix(bound(&self.start), bound(&self.end), now)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ServiceUpdate {
    pub state: Option<i64>,
    pub downtime: Option<bool>,
    pub acknowledgement: Option<bool>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/environments", get(list_environments))
        .route("/environments/", get(list_environments))
        .route("/environments/{name}", get(get_environment))
        .route(
            "/environments/{env}/hosts/{host}/services/{service}",
            post(update_service),
        )
        .route("/businessprocesses", get(list_business_processes))
        .route("/businessprocesses/", get(list_business_processes))
        .route("/businessprocesses/{bp}", get(get_bp_timeline))
        .route("/businessprocesses/{bp}/kpis", get(list_kpis))
        .route("/businessprocesses/{bp}/kpis/{kpi}", get(get_kpi_timeline))
        .route("/businessprocesses/{bp}/events", get(list_unannotated_events))
        .route("/businessprocesses/{bp}/events/{event}", post(annotate_event))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

async fn get_system_health(State(app): State<AppState>) -> Json<HubHealth> {
    Json(app.hub.health())
}

async fn list_environments(State(app): State<AppState>) -> Json<Vec<String>> {
    Json(app.hub.environment_names())
}

async fn get_environment(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EnvironmentView>, StatusCode> {
    app.hub
        .environment_view(&name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_service(
    State(app): State<AppState>,
    Path((env, host, service)): Path<(String, String, String)>,
    Query(update): Query<ServiceUpdate>,
) -> Result<Json<Delta>, StatusCode> {
    let mut cmd = Command::new(env, host, service);
    if let Some(state) = update.state {
        cmd = cmd.with_attr(FIELD_STATE, state);
    }
    if let Some(downtime) = update.downtime {
        cmd = cmd.with_attr(FIELD_DOWNTIME, downtime);
    }
    if let Some(ack) = update.acknowledgement {
        cmd = cmd.with_attr(FIELD_ACKNOWLEDGEMENT, ack);
    }
    app.hub.submit(&cmd).map(Json).map_err(|e| match e {
        ApplyError::UnknownEnvironment(_)
        | ApplyError::UnknownHost { .. }
        | ApplyError::UnknownService { .. } => StatusCode::NOT_FOUND,
        ApplyError::InvalidValue { .. } | ApplyError::Empty => StatusCode::BAD_REQUEST,
    })
}

async fn list_business_processes(State(app): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(app.timelines.business_processes())
}

fn windowed(frames: Vec<FrameModel>, query: &WindowQuery) -> Json<Vec<FrameView>> {
    let window = query.window(OffsetDateTime::now_utc());
    Json(window.select(&frames).into_iter().map(FrameView::from).collect())
}

async fn get_bp_timeline(
    State(app): State<AppState>,
    Path(bp): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<FrameView>>, StatusCode> {
    let frames = app.timelines.bp_timeline(&bp).map_err(timeline_status)?;
    Ok(windowed(frames, &query))
}

async fn list_kpis(
    State(app): State<AppState>,
    Path(bp): Path<String>,
) -> Result<Json<BTreeMap<String, String>>, StatusCode> {
    app.timelines.kpis(&bp).map(Json).map_err(timeline_status)
}

async fn get_kpi_timeline(
    State(app): State<AppState>,
    Path((bp, kpi)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<FrameView>>, StatusCode> {
    let frames = app.timelines.kpi_timeline(&bp, &kpi).map_err(timeline_status)?;
    Ok(windowed(frames, &query))
}

async fn list_unannotated_events(
    State(app): State<AppState>,
    Path(bp): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<EventView>>, StatusCode> {
    let window = query.window(OffsetDateTime::now_utc());
    let events = app.timelines.unannotated_events(&bp).map_err(timeline_status)?;
    Ok(Json(
        events
            .into_iter()
            .filter(|event| window.overlaps(&event.frame))
            .map(EventView::from)
            .collect(),
    ))
}

async fn annotate_event(
    State(app): State<AppState>,
    Path((bp, event)): Path<(String, String)>,
    body: String,
) -> Result<Json<FrameView>, StatusCode> {
    app.timelines
        .annotate(&bp, &event, &body)
        .map(|frame| Json(frame.into()))
        .map_err(|e| {
            warn!(target: "hub", "annotation of {bp}/{event} refused: {e}");
            timeline_status(e)
        })
}

fn timeline_status(e: TimelineError) -> StatusCode {
    match e {
        TimelineError::UnknownBusinessProcess(_)
        | TimelineError::UnknownKpi { .. }
        | TimelineError::UnknownEvent { .. } => StatusCode::NOT_FOUND,
        TimelineError::EmptyAnnotation => StatusCode::BAD_REQUEST,
        TimelineError::Serialization(_) | TimelineError::Io(_) => {
            error!(target: "hub", "timeline store failure: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestServer;
    use bpdash_core::CheckState;

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = TestServer::start().await;
        let body = reqwest::get(server.url("/health")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");

        let health: HubHealth = reqwest::get(server.url("/system/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.environments_loaded, 1);
        assert_eq!(health.objects_tracked, 3);
    }

    #[tokio::test]
    async fn test_environment_read_model() {
        let server = TestServer::start().await;
        let names: Vec<String> = reqwest::get(server.url("/environments/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(names, vec!["prod".to_string()]);

        let view: EnvironmentView = reqwest::get(server.url("/environments/prod"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["web01"]["http"].check_state, CheckState::Critical);
        assert!(view["db01"]["pgsql"].downtime);

        let missing = reqwest::get(server.url("/environments/qa")).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_query_string_command() {
        let server = TestServer::start().await;
        let mut rx = server.app.hub.subscribe();
        let client = reqwest::Client::new();

        let res = client
            .post(server.url("/environments/prod/hosts/web01/services/http?state=0&acknowledgement=true"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let delta = rx.recv().await.unwrap();
        assert_eq!(delta.attrs[FIELD_STATE], 0);
        assert_eq!(delta.attrs[FIELD_ACKNOWLEDGEMENT], true);

        let unknown = client
            .post(server.url("/environments/prod/hosts/web09/services/http?state=1"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

        let out_of_range = client
            .post(server.url("/environments/prod/hosts/web01/services/http?state=7"))
            .send()
            .await
            .unwrap();
        assert_eq!(out_of_range.status(), reqwest::StatusCode::BAD_REQUEST);

        let empty = client
            .post(server.url("/environments/prod/hosts/web01/services/http"))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_timeline_read_model() {
        let server = TestServer::start().await;
        let bps: BTreeMap<String, String> = reqwest::get(server.url("/businessprocesses/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(bps["shop"], "Web shop");

        let frames: Vec<FrameView> = reqwest::get(server.url("/businessprocesses/shop"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, frames[0].frame.event_id());

        let kpis: BTreeMap<String, String> = reqwest::get(server.url("/businessprocesses/shop/kpis"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(kpis["db"], "Database");

        let kpi = reqwest::get(server.url("/businessprocesses/shop/kpis/cache")).await.unwrap();
        assert_eq!(kpi.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_annotate_event() {
        let server = TestServer::start().await;
        let client = reqwest::Client::new();
        let frames: Vec<FrameView> = reqwest::get(server.url("/businessprocesses/shop"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = &frames[1].id;

        let res = client
            .post(server.url(&format!("/businessprocesses/shop/events/{id}")))
            .body("payment provider outage")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let updated: FrameView = res.json().await.unwrap();
        assert_eq!(updated.frame.annotation.as_deref(), Some("payment provider outage"));

        let blank = client
            .post(server.url(&format!("/businessprocesses/shop/events/{id}")))
            .body("  ")
            .send()
            .await
            .unwrap();
        assert_eq!(blank.status(), reqwest::StatusCode::BAD_REQUEST);

        let unknown = client
            .post(server.url("/businessprocesses/shop/events/42"))
            .body("note")
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_timeline_window() {
        let server = TestServer::start().await;
        let origin = server.timeline_origin.unix_timestamp();

        // 30 minutes in: the last 15 of the 45 ok minutes and the 15 nok ones
        let cut: Vec<FrameView> = reqwest::get(server.url(&format!("/businessprocesses/shop?start={}", origin + 1800)))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cut.len(), 2);
        assert_eq!(cut[0].frame.duration_percent, 50.0);
        assert_eq!(cut[1].frame.duration_percent, 50.0);
        assert_eq!(cut[0].frame.start, server.timeline_origin);

        let before: Vec<FrameView> = reqwest::get(server.url(&format!(
            "/businessprocesses/shop/kpis/db?start={}&end={}",
            origin - 7200,
            origin - 3600
        )))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert!(before.is_empty());

        // garbage bounds fall back to the default window
        let fallback: Vec<FrameView> = reqwest::get(server.url("/businessprocesses/shop?start=yesterday"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback[0].frame.duration_percent, 75.0);
    }

    #[tokio::test]
    async fn test_unannotated_events() {
        let server = TestServer::start().await;
        let events: Vec<EventView> = reqwest::get(server.url("/businessprocesses/shop/events"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kpi, None);
        assert_eq!(events[1].kpi.as_deref(), Some("db"));
        assert_eq!(events[0].id, events[0].frame.event_id());

        let res = reqwest::Client::new()
            .post(server.url(&format!("/businessprocesses/shop/events/{}", events[0].id)))
            .body("payment provider outage")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let left: Vec<EventView> = reqwest::get(server.url("/businessprocesses/shop/events"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kpi.as_deref(), Some("db"));

        let origin = server.timeline_origin.unix_timestamp();
        let outside: Vec<EventView> = reqwest::get(server.url(&format!(
            "/businessprocesses/shop/events?start={}&end={}",
            origin - 7200,
            origin
        )))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert!(outside.is_empty());

        let missing = reqwest::get(server.url("/businessprocesses/other/events")).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
