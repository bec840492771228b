use axum::{Json, extract::State};
use kv_api_types::{ChainConfigResponse, ChainInfo};
use kv_nft_evm::{SEPOLIA, supported_chains};

use crate::AppState;

/// Read-only chain identity for clients: the contract address the gateway
/// talks to and the chain-ID profiles minting is allowed on.
pub(crate) async fn chain_config(State(state): State<AppState>) -> Json<ChainConfigResponse> {
    Json(ChainConfigResponse {
        contract_address: state.gateway.contract_address().to_owned(),
        default_chain: SEPOLIA.slug.to_owned(),
        chains: supported_chains()
            .into_iter()
            .map(|profile| ChainInfo {
                slug: profile.slug.to_owned(),
                chain_id: profile.chain_id,
                name: profile.name.to_owned(),
            })
            .collect(),
    })
}
