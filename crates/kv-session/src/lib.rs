//! Wallet session state: durable mock-session storage, wallet-provider
//! connector selection, and the connect/disconnect lifecycle.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use kv_api_types::WalletAddress;
use rocksdb::{DB, Options};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Fixed demo identity used by the simulated wallet.
pub const DEMO_ADDRESS: &str = "0x742d35Cc6634C0532925a3b8D0c6b85c60b56ca4";

pub const CONNECTOR_METAMASK: &str = "metaMask";
pub const CONNECTOR_METAMASK_EXTENSION: &str = "io.metamask";
pub const CONNECTOR_INJECTED: &str = "injected";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("wallet provider not found; install MetaMask")]
    ProviderNotFound,
    #[error("no compatible wallet connector found")]
    NoCompatibleConnector,
    #[error("wallet connection failed: {0}")]
    Provider(#[source] anyhow::Error),
    #[error("session store failure: {0}")]
    Store(#[source] anyhow::Error),
}

// ── Session store ──

/// Persisted mock-session flags. Real-wallet sessions live in the provider
/// and are never written here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub mock_mode: bool,
    pub mock_address: String,
    pub mock_connected: bool,
}

/// Synchronous key-value persistence for the three session flags. Writes are
/// last-write-wins; no stronger transactional guarantee is offered.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<StoredSession>;
    fn save(&self, session: &StoredSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    session: std::sync::RwLock<Option<StoredSession>>,
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<StoredSession> {
        let guard = self
            .session
            .read()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let mut guard = self
            .session
            .write()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .session
            .write()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

pub struct RocksDbSessionStore {
    db: Arc<DB>,
}

const KEY_MOCK_MODE: &str = "mock_mode";
const KEY_MOCK_ADDRESS: &str = "mock_address";
const KEY_MOCK_CONNECTED: &str = "mock_connected";

impl RocksDbSessionStore {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path).context("open session store")?;
        Ok(Self { db: Arc::new(db) })
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let value = self.db.get(key.as_bytes())?;
        match value {
            Some(raw) => Ok(Some(
                String::from_utf8(raw.to_vec()).context("session value is not UTF-8")?,
            )),
            None => Ok(None),
        }
    }
}

impl SessionStore for RocksDbSessionStore {
    fn load(&self) -> Result<StoredSession> {
        Ok(StoredSession {
            mock_mode: self.get_string(KEY_MOCK_MODE)?.as_deref() == Some("true"),
            mock_address: self.get_string(KEY_MOCK_ADDRESS)?.unwrap_or_default(),
            mock_connected: self.get_string(KEY_MOCK_CONNECTED)?.as_deref() == Some("true"),
        })
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        self.db
            .put(KEY_MOCK_MODE.as_bytes(), session.mock_mode.to_string())?;
        self.db
            .put(KEY_MOCK_ADDRESS.as_bytes(), session.mock_address.as_bytes())?;
        self.db.put(
            KEY_MOCK_CONNECTED.as_bytes(),
            session.mock_connected.to_string(),
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.db.delete(KEY_MOCK_MODE.as_bytes())?;
        self.db.delete(KEY_MOCK_ADDRESS.as_bytes())?;
        self.db.delete(KEY_MOCK_CONNECTED.as_bytes())?;
        Ok(())
    }
}

// ── Wallet provider ──

/// Surface of the injected browser wallet the session manager consumes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn is_installed(&self) -> bool;
    fn connector_ids(&self) -> Vec<String>;
    async fn connect(&self, connector_id: &str) -> Result<WalletAddress>;
    async fn disconnect(&self) -> Result<()>;
}

/// Picks a connector by preferred identifier ordering: the MetaMask ids
/// first, then the generic injected fallback.
pub fn select_connector(connector_ids: &[String]) -> Option<String> {
    connector_ids
        .iter()
        .find(|id| id.as_str() == CONNECTOR_METAMASK || id.as_str() == CONNECTOR_METAMASK_EXTENSION)
        .or_else(|| {
            connector_ids
                .iter()
                .find(|id| id.as_str() == CONNECTOR_INJECTED)
        })
        .cloned()
}

/// Stand-in for an environment with no wallet extension at all.
#[derive(Default)]
pub struct UnavailableProvider;

#[async_trait]
impl WalletProvider for UnavailableProvider {
    fn is_installed(&self) -> bool {
        false
    }

    fn connector_ids(&self) -> Vec<String> {
        Vec::new()
    }

    async fn connect(&self, _connector_id: &str) -> Result<WalletAddress> {
        Err(anyhow!("no wallet provider installed"))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Provider backed by a fixed address, for development hosts and tests where
/// no browser extension exists.
pub struct StaticProvider {
    address: String,
    connectors: Vec<String>,
}

impl StaticProvider {
    pub fn new(address: &str, connectors: Vec<String>) -> Self {
        Self {
            address: address.to_owned(),
            connectors,
        }
    }

    pub fn injected(address: &str) -> Self {
        Self::new(address, vec![CONNECTOR_INJECTED.to_owned()])
    }
}

#[async_trait]
impl WalletProvider for StaticProvider {
    fn is_installed(&self) -> bool {
        true
    }

    fn connector_ids(&self) -> Vec<String> {
        self.connectors.clone()
    }

    async fn connect(&self, connector_id: &str) -> Result<WalletAddress> {
        if !self.connectors.iter().any(|id| id == connector_id) {
            return Err(anyhow!("unknown connector: {connector_id}"));
        }
        Ok(WalletAddress(self.address.clone()))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

// ── Session manager ──

/// Effective wallet view the rest of the system consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub address: String,
    pub connected: bool,
    pub mock_mode: bool,
}

struct ManagerState {
    mock: StoredSession,
    real_address: String,
    real_connected: bool,
}

/// Owns the session flags. Connect/disconnect are the only mutation paths;
/// the mock half is persisted after every mutation.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn WalletProvider>,
    state: RwLock<ManagerState>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Self, SessionError> {
        let mut mock = store.load().map_err(SessionError::Store)?;

        // Repair any persisted state that violates the session invariants:
        // no address without a connection, no connection outside mock mode.
        let loaded = mock.clone();
        if !mock.mock_mode {
            mock = StoredSession::default();
        } else if !mock.mock_connected {
            mock.mock_address.clear();
        }
        if mock != loaded {
            warn!("repaired inconsistent persisted session state");
            store.save(&mock).map_err(SessionError::Store)?;
        }

        Ok(Self {
            store,
            provider,
            state: RwLock::new(ManagerState {
                mock,
                real_address: String::new(),
                real_connected: false,
            }),
        })
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        if state.mock.mock_mode {
            SessionSnapshot {
                address: state.mock.mock_address.clone(),
                connected: state.mock.mock_connected,
                mock_mode: true,
            }
        } else {
            SessionSnapshot {
                address: state.real_address.clone(),
                connected: state.real_connected,
                mock_mode: false,
            }
        }
    }

    /// Connects the simulated wallet under the fixed demo address. Calling
    /// again while already mock-connected re-asserts the same state.
    pub async fn connect_mock(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        state.mock = StoredSession {
            mock_mode: true,
            mock_address: DEMO_ADDRESS.to_owned(),
            mock_connected: true,
        };
        self.store.save(&state.mock).map_err(SessionError::Store)?;
        info!("mock wallet connected as {DEMO_ADDRESS}");
        Ok(SessionSnapshot {
            address: state.mock.mock_address.clone(),
            connected: true,
            mock_mode: true,
        })
    }

    /// Connects through the real wallet provider. Failures leave both the
    /// in-memory and persisted session untouched.
    pub async fn connect_real(&self) -> Result<SessionSnapshot, SessionError> {
        if !self.provider.is_installed() {
            return Err(SessionError::ProviderNotFound);
        }

        let connector = select_connector(&self.provider.connector_ids())
            .ok_or(SessionError::NoCompatibleConnector)?;

        let address = self
            .provider
            .connect(&connector)
            .await
            .map_err(SessionError::Provider)?;

        let mut state = self.state.write().await;
        state.real_address = address.0;
        state.real_connected = true;
        info!("wallet connected via {connector} connector");
        Ok(SessionSnapshot {
            address: state.real_address.clone(),
            connected: true,
            mock_mode: state.mock.mock_mode,
        })
    }

    /// Disconnects the active session. Leaving mock mode erases every
    /// persisted session field.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        if state.mock.mock_mode {
            state.mock = StoredSession::default();
            self.store.clear().map_err(SessionError::Store)?;
            info!("mock wallet disconnected; persisted session erased");
        } else {
            self.provider
                .disconnect()
                .await
                .map_err(SessionError::Provider)?;
            state.real_address.clear();
            state.real_connected = false;
            info!("wallet disconnected");
        }
        Ok(())
    }
}

/// Shortened presentation form of an address: first six characters, an
/// ellipsis, then the last four. Empty input stays empty.
pub fn format_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = address.chars().collect();
    let head: String = chars.iter().take(6).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(provider: Arc<dyn WalletProvider>) -> (SessionManager, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::default());
        let manager = SessionManager::new(store.clone(), provider).expect("manager");
        (manager, store)
    }

    #[test]
    fn format_address_empty_input() {
        assert_eq!(format_address(""), "");
    }

    #[test]
    fn format_address_truncates_middle() {
        assert_eq!(format_address("0xABCDEF1234567890"), "0xABCD...7890");
        assert_eq!(format_address(DEMO_ADDRESS), "0x742d...6ca4");
    }

    #[test]
    fn connector_selection_prefers_metamask() {
        let ids = vec!["injected".to_owned(), "metaMask".to_owned()];
        assert_eq!(select_connector(&ids).as_deref(), Some("metaMask"));

        let ids = vec!["injected".to_owned(), "io.metamask".to_owned()];
        assert_eq!(select_connector(&ids).as_deref(), Some("io.metamask"));

        let ids = vec!["injected".to_owned()];
        assert_eq!(select_connector(&ids).as_deref(), Some("injected"));

        let ids = vec!["walletConnect".to_owned()];
        assert_eq!(select_connector(&ids), None);
    }

    #[tokio::test]
    async fn connect_mock_is_idempotent() -> anyhow::Result<()> {
        let (manager, store) = manager_with(Arc::new(UnavailableProvider));

        manager.connect_mock().await?;
        let snapshot = manager.connect_mock().await?;

        assert_eq!(
            snapshot,
            SessionSnapshot {
                address: DEMO_ADDRESS.to_owned(),
                connected: true,
                mock_mode: true,
            }
        );
        let persisted = store.load()?;
        assert!(persisted.mock_mode);
        assert!(persisted.mock_connected);
        assert_eq!(persisted.mock_address, DEMO_ADDRESS);
        Ok(())
    }

    #[tokio::test]
    async fn disconnect_mock_clears_state_and_store() -> anyhow::Result<()> {
        let (manager, store) = manager_with(Arc::new(UnavailableProvider));

        manager.connect_mock().await?;
        manager.disconnect().await?;

        assert_eq!(manager.snapshot().await, SessionSnapshot::default());
        assert_eq!(store.load()?, StoredSession::default());
        Ok(())
    }

    #[tokio::test]
    async fn connect_real_requires_installed_provider() {
        let (manager, _store) = manager_with(Arc::new(UnavailableProvider));
        let error = manager.connect_real().await.unwrap_err();
        assert!(matches!(error, SessionError::ProviderNotFound));
        assert_eq!(manager.snapshot().await, SessionSnapshot::default());
    }

    #[tokio::test]
    async fn connect_real_requires_known_connector() {
        let provider = StaticProvider::new("0xfeed", vec!["walletConnect".to_owned()]);
        let (manager, _store) = manager_with(Arc::new(provider));
        let error = manager.connect_real().await.unwrap_err();
        assert!(matches!(error, SessionError::NoCompatibleConnector));
    }

    #[tokio::test]
    async fn connect_real_sets_effective_session() -> anyhow::Result<()> {
        let provider = StaticProvider::injected("0xfeedface00000000");
        let (manager, store) = manager_with(Arc::new(provider));

        let snapshot = manager.connect_real().await?;
        assert!(snapshot.connected);
        assert!(!snapshot.mock_mode);
        assert_eq!(snapshot.address, "0xfeedface00000000");

        // Real sessions are never persisted.
        assert_eq!(store.load()?, StoredSession::default());

        manager.disconnect().await?;
        assert_eq!(manager.snapshot().await, SessionSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn loader_repairs_inconsistent_persisted_state() -> anyhow::Result<()> {
        let store = Arc::new(InMemorySessionStore::default());
        store.save(&StoredSession {
            mock_mode: true,
            mock_address: DEMO_ADDRESS.to_owned(),
            mock_connected: false,
        })?;

        let manager = SessionManager::new(store.clone(), Arc::new(UnavailableProvider))?;
        let snapshot = manager.snapshot().await;
        assert!(snapshot.mock_mode);
        assert!(!snapshot.connected);
        assert!(snapshot.address.is_empty());
        assert!(store.load()?.mock_address.is_empty());
        Ok(())
    }

    #[test]
    fn rocksdb_store_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = RocksDbSessionStore::open_default(dir.path().to_str().unwrap())?;

        assert_eq!(store.load()?, StoredSession::default());

        let session = StoredSession {
            mock_mode: true,
            mock_address: DEMO_ADDRESS.to_owned(),
            mock_connected: true,
        };
        store.save(&session)?;
        assert_eq!(store.load()?, session);

        store.clear()?;
        assert_eq!(store.load()?, StoredSession::default());
        Ok(())
    }
}
