use crate::core::error::Error;
use crate::core::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub(crate) struct DepositData {
    pub(crate) token: String,
    pub(crate) credential: String,
}

#[derive(Deserialize)]
pub(crate) struct ExchangeData {
    pub(crate) token: String,
}

#[derive(Serialize)]
pub(crate) struct ExchangeResponse {
    pub(crate) credential: String,
}

/// Called by the web login flow once authentication completes.
pub(crate) async fn deposit(
    State(state): State<AppState>,
    Json(data): Json<DepositData>,
) -> Result<StatusCode, Error> {
    state.store.set_token(&data.token, &data.credential).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Polled by the desktop client. 404 means "not ready yet" (or already
/// consumed, or expired; the states are indistinguishable on purpose), so
/// the client keeps polling until its own deadline. Backend failures map
/// to 503 instead, letting the client tell an outage apart from a pending
/// login.
pub(crate) async fn exchange(
    State(state): State<AppState>,
    Json(data): Json<ExchangeData>,
) -> Result<Json<ExchangeResponse>, Error> {
    match state.store.take_token(&data.token).await? {
        Some(credential) => Ok(Json(ExchangeResponse { credential })),
        None => Err(Error::TokenNotReady),
    }
}
