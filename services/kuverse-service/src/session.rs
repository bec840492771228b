use axum::{Json, extract::State};
use kv_api_types::SessionResponse;
use kv_session::{SessionError, SessionSnapshot, format_address};

use crate::{ApiResult, AppState, bad_request, internal_error};

fn to_response(snapshot: SessionSnapshot) -> SessionResponse {
    SessionResponse {
        formatted_address: format_address(&snapshot.address),
        address: snapshot.address,
        connected: snapshot.connected,
        mock_mode: snapshot.mock_mode,
    }
}

pub(crate) async fn session_get(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(to_response(state.sessions.snapshot().await))
}

pub(crate) async fn session_connect(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let before = state.sessions.snapshot().await;

    let snapshot = match state.sessions.connect_real().await {
        Ok(snapshot) => snapshot,
        Err(err @ SessionError::ProviderNotFound)
        | Err(err @ SessionError::NoCompatibleConnector) => {
            return Err(bad_request(&err.to_string()));
        }
        Err(err) => return Err(internal_error(err)),
    };

    if before != snapshot {
        state.epoch.advance();
    }
    state.select_backend(snapshot.mock_mode).await;
    Ok(Json(to_response(snapshot)))
}

pub(crate) async fn session_connect_mock(
    State(state): State<AppState>,
) -> ApiResult<SessionResponse> {
    let before = state.sessions.snapshot().await;
    let snapshot = state.sessions.connect_mock().await.map_err(internal_error)?;

    // Re-asserting an already-connected mock session is a no-op and must not
    // invalidate an in-flight mint.
    if before != snapshot {
        state.epoch.advance();
    }
    state.select_backend(true).await;
    Ok(Json(to_response(snapshot)))
}

pub(crate) async fn session_disconnect(
    State(state): State<AppState>,
) -> ApiResult<SessionResponse> {
    let before = state.sessions.snapshot().await;
    state.sessions.disconnect().await.map_err(internal_error)?;

    let after = state.sessions.snapshot().await;
    if before != after {
        state.epoch.advance();
        state.mint_status.clear().await;
    }
    state.select_backend(after.mock_mode).await;
    Ok(Json(to_response(after)))
}
