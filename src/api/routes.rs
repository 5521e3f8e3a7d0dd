//! API route handlers for lifechanger-sync.
//!
//! All handlers receive `SharedState` via Axum state extraction. Errors that
//! end the Garmin session render as 401 so the app shell falls back to its
//! connect prompt.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::changes::{ChangeKind, NewLifeChange};
use crate::error::AuthError;
use crate::insights;
use crate::session::Persistence;
use crate::wellness::{self, DateRange};
use crate::SharedState;

/// How long a signed OAuth state stays valid.
const STATE_MAX_AGE_SECS: i64 = 600;

/// Dashboard window when the caller does not name one.
const DEFAULT_WINDOW_DAYS: u32 = 30;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── OAuth ────────────────────────────────────────────────────────
        .route("/oauth/authorize", get(oauth_authorize))
        .route("/oauth/callback", get(oauth_callback))
        // ── Session ──────────────────────────────────────────────────────
        .route("/session", get(session_status).delete(session_clear))
        // ── Body battery ─────────────────────────────────────────────────
        .route("/body-battery", get(body_battery))
        // ── Life changes ─────────────────────────────────────────────────
        .route("/changes", get(changes_list).post(changes_add))
        .route("/changes/latest", get(changes_latest))
        .route("/changes/suggestions", get(changes_suggestions))
        // ── Insights ─────────────────────────────────────────────────────
        .route("/insights", get(insights_latest))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "lifechanger-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.session.provider().display_name(),
    }))
}

// =============================================================================
// OAuth
// =============================================================================

/// GET /v1/oauth/authorize — Redirect the user to Garmin's consent page.
async fn oauth_authorize(State(state): State<SharedState>) -> Response {
    let signed_state = state.crypto.issue_state(Utc::now().timestamp());
    let auth_url = state.session.provider().auth_url(
        &state.config.garmin_scopes,
        &signed_state,
        &state.config.redirect_url,
    );

    Redirect::temporary(&auth_url).into_response()
}

#[derive(Deserialize)]
struct OAuthCallbackQuery {
    code: Option<String>,
    /// Absent when the app shell captured the code itself (native deep link).
    state: Option<String>,
    error: Option<String>,
}

/// GET /v1/oauth/callback — Exchange the one-time code for a session.
///
/// The `state` check is advisory: a state issued by `/oauth/authorize` must
/// be intact and at most ten minutes old, but a callback without one is
/// accepted so the app shell can forward a code captured from a deep link.
async fn oauth_callback(
    State(state): State<SharedState>,
    Query(q): Query<OAuthCallbackQuery>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if let Some(err) = q.error {
        return Err(AuthError::BadRequest(format!("authorization denied: {err}")));
    }

    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::BadRequest("No authorization code received".into()))?;

    if let Some(signed) = q.state.as_deref() {
        state
            .crypto
            .verify_state(signed, Utc::now().timestamp(), STATE_MAX_AGE_SECS)?;
    }

    let persistence = state.session.exchange_code_for_token(&code).await?;
    if persistence == Persistence::MemoryOnly {
        warn!("Garmin connected for this session only; tokens were not persisted");
    }

    Ok(Json(json!({
        "data": {
            "authenticated": true,
            "persisted": persistence == Persistence::Persisted,
        }
    })))
}

// =============================================================================
// Session
// =============================================================================

/// GET /v1/session — Whether a Garmin session is held.
async fn session_status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "data": { "authenticated": state.session.is_authenticated().await }
    }))
}

/// DELETE /v1/session — Log out of Garmin.
async fn session_clear(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.body_battery.write().await.clear();
    state.session.clear_session().await?;
    info!("Garmin session cleared");

    Ok(Json(json!({ "data": { "authenticated": false } })))
}

// =============================================================================
// Body battery
// =============================================================================

#[derive(Deserialize)]
struct BodyBatteryQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

/// GET /v1/body-battery — Daily high/low aggregates for a date window.
async fn body_battery(
    State(state): State<SharedState>,
    Query(q): Query<BodyBatteryQuery>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let end = q.end.unwrap_or_else(|| Utc::now().date_naive());
    let range = match q.start {
        Some(start) => DateRange::new(start, end)?,
        None => DateRange::trailing_days(DEFAULT_WINDOW_DAYS, end)?,
    };

    match wellness::fetch_body_battery(&state.session, &range).await {
        Ok(days) => {
            *state.body_battery.write().await = days.clone();
            Ok(Json(json!({ "data": days, "range": range })))
        }
        Err(e) => {
            if e.invalidates_session() {
                state.body_battery.write().await.clear();
            }
            Err(e)
        }
    }
}

// =============================================================================
// Life changes
// =============================================================================

/// GET /v1/changes — All logged changes, newest first.
async fn changes_list(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({ "data": state.changes.list().await }))
}

/// POST /v1/changes — Log a new change.
async fn changes_add(
    State(state): State<SharedState>,
    Json(body): Json<NewLifeChange>,
) -> Result<(StatusCode, Json<serde_json::Value>), AuthError> {
    let change = state.changes.add_change(body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": change }))))
}

/// GET /v1/changes/latest — The most recent change.
async fn changes_latest(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let change = state
        .changes
        .latest()
        .await
        .ok_or_else(|| AuthError::NotFound("life change".into()))?;
    Ok(Json(json!({ "data": change })))
}

#[derive(Deserialize)]
struct SuggestionsQuery {
    kind: ChangeKind,
}

/// GET /v1/changes/suggestions?kind=start|stop — Predefined labels.
async fn changes_suggestions(Query(q): Query<SuggestionsQuery>) -> Json<serde_json::Value> {
    Json(json!({ "data": q.kind.suggestions() }))
}

// =============================================================================
// Insights
// =============================================================================

/// GET /v1/insights — Latest change against the last fetched body battery.
async fn insights_latest(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let Some(change) = state.changes.latest().await else {
        return Json(json!({ "data": null }));
    };

    let data = state.body_battery.read().await;
    Json(json!({ "data": insights::summarize(&change, &data) }))
}
