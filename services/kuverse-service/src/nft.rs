use axum::{
    Json,
    extract::{Path, State},
};
use kv_api_types::{
    BalanceResponse, CollectionResponse, MintRequest, MintResponse, MintStatusResponse, Rarity,
    TokenId, TokenMetadataResponse, WalletAddress,
};
use kv_nft_client::MintError;
use kv_session::SessionSnapshot;
use tracing::warn;

use crate::{ApiResult, AppState, bad_request, internal_error, not_found};

async fn require_connected(
    state: &AppState,
) -> Result<SessionSnapshot, (axum::http::StatusCode, Json<crate::ErrorResponse>)> {
    let session = state.sessions.snapshot().await;
    if !session.connected || session.address.is_empty() {
        return Err(bad_request("wallet not connected"));
    }
    Ok(session)
}

pub(crate) async fn nft_mint(
    State(state): State<AppState>,
    Json(request): Json<MintRequest>,
) -> ApiResult<MintResponse> {
    let session = require_connected(&state).await?;

    let violations = kv_metadata::validate(&request);
    if !violations.is_empty() {
        let messages: Vec<String> = violations
            .iter()
            .map(|violation| violation.message.clone())
            .collect();
        return Err(bad_request(&messages.join(", ")));
    }

    // validate() already vetted the rarity string.
    let rarity = Rarity::parse(&request.rarity)
        .ok_or_else(|| bad_request("Rarity must be one of Common, Rare, Epic, Legendary"))?;

    let document = kv_metadata::build_metadata(&request);
    let token_uri = kv_metadata::encode_token_uri(&document).map_err(internal_error)?;

    let backend = state.active_backend().await;
    let receipt = backend
        .mint(
            &WalletAddress(session.address.clone()),
            request.name.trim(),
            request.description.trim(),
            rarity,
            &token_uri,
        )
        .await
        .map_err(|err| match err {
            MintError::MissingMetadata | MintError::NotConnected => bad_request(&err.to_string()),
            MintError::Submission(_) => {
                warn!("mint submission failed for {}: {err}", session.address);
                internal_error(err)
            }
        })?;

    Ok(Json(MintResponse {
        token_id: receipt.token_id.map(|token_id| token_id.0),
        tx_hash: receipt.tx_hash,
    }))
}

pub(crate) async fn nft_mint_status(State(state): State<AppState>) -> Json<MintStatusResponse> {
    let (phase, message) = state.mint_status.get().await;
    Json(MintStatusResponse {
        phase: phase.as_str().to_owned(),
        message,
    })
}

pub(crate) async fn nft_balance(State(state): State<AppState>) -> ApiResult<BalanceResponse> {
    let session = require_connected(&state).await?;

    let backend = state.active_backend().await;
    let balance = backend
        .balance_of(&WalletAddress(session.address.clone()))
        .await
        .map_err(internal_error)?;

    Ok(Json(BalanceResponse {
        wallet_address: session.address,
        balance,
    }))
}

pub(crate) async fn nft_collection(State(state): State<AppState>) -> ApiResult<CollectionResponse> {
    let session = require_connected(&state).await?;

    let backend = state.active_backend().await;
    let tokens = backend
        .list_owned(&WalletAddress(session.address.clone()))
        .await
        .map_err(internal_error)?;

    Ok(Json(CollectionResponse {
        wallet_address: session.address,
        tokens,
    }))
}

pub(crate) async fn nft_token_metadata(
    State(state): State<AppState>,
    Path(token_id): Path<u64>,
) -> ApiResult<TokenMetadataResponse> {
    let backend = state.active_backend().await;
    let metadata = backend
        .token_metadata(TokenId(token_id))
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("token not found"))?;

    Ok(Json(TokenMetadataResponse { token_id, metadata }))
}
