use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use kv_nft_client::{MintStatus, MockNftRegistry, NftBackend, SessionEpoch};
use kv_nft_evm::ContractGateway;
use kv_session::{
    RocksDbSessionStore, SessionManager, StaticProvider, UnavailableProvider, WalletProvider,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

mod chain_config;
mod nft;
mod session;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionManager>,
    mock: Arc<MockNftRegistry>,
    gateway: Arc<ContractGateway>,
    active: Arc<RwLock<Arc<dyn NftBackend>>>,
    mint_status: MintStatus,
    epoch: SessionEpoch,
}

impl AppState {
    async fn active_backend(&self) -> Arc<dyn NftBackend> {
        self.active.read().await.clone()
    }

    /// Swaps the serving backend on a session transition. Every NFT call
    /// after this goes through the chosen backend without re-branching.
    async fn select_backend(&self, mock_mode: bool) {
        let backend: Arc<dyn NftBackend> = if mock_mode {
            self.mock.clone()
        } else {
            self.gateway.clone()
        };
        *self.active.write().await = backend;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_path =
        std::env::var("KUVERSE_DB_PATH").unwrap_or_else(|_| "./data/kuverse-session".to_owned());
    let store = Arc::new(RocksDbSessionStore::open_default(&db_path)?);

    // Without an injected-wallet bridge, real-mode connect surfaces the
    // provider-not-found error and demo mode is the working path.
    let provider: Arc<dyn WalletProvider> = match std::env::var("KUVERSE_INJECTED_ADDRESS") {
        Ok(address) if !address.trim().is_empty() => {
            Arc::new(StaticProvider::injected(address.trim()))
        }
        _ => Arc::new(UnavailableProvider),
    };

    let sessions = Arc::new(SessionManager::new(store, provider)?);
    let mint_status = MintStatus::default();
    let epoch = SessionEpoch::default();
    let mock = Arc::new(MockNftRegistry::new(mint_status.clone(), epoch.clone()));
    let gateway = Arc::new(ContractGateway::new(
        None,
        std::env::var("KUVERSE_CONTRACT_ADDRESS").ok(),
        mint_status.clone(),
        epoch.clone(),
    ));

    let restored = sessions.snapshot().await;
    let active: Arc<dyn NftBackend> = if restored.mock_mode {
        mock.clone()
    } else {
        gateway.clone()
    };

    let state = AppState {
        sessions,
        mock,
        gateway,
        active: Arc::new(RwLock::new(active)),
        mint_status,
        epoch,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    info!("kuverse-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/chain/config", get(chain_config::chain_config))
        .route("/session", get(session::session_get))
        .route("/session/connect", post(session::session_connect))
        .route("/session/connect-mock", post(session::session_connect_mock))
        .route("/session/disconnect", post(session::session_disconnect))
        .route("/nft/mint", post(nft::nft_mint))
        .route("/nft/mint/status", get(nft::nft_mint_status))
        .route("/nft/balance", get(nft::nft_balance))
        .route("/nft/collection", get(nft::nft_collection))
        .route("/nft/{token_id}/metadata", get(nft::nft_token_metadata))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "kuverse-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "kuverse-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn not_found(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}
