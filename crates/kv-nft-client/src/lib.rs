//! Backend seam for minting and browsing NFTs, plus the in-memory mock
//! registry that serves demo sessions without a chain.

use anyhow::Result;
use async_trait::async_trait;
use kv_api_types::{NftMetadata, Rarity, TokenId, TokenRecord, WalletAddress};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MintError {
    #[error("missing required NFT metadata")]
    MissingMetadata,
    #[error("wallet not connected")]
    NotConnected,
    #[error("mint submission failed: {0}")]
    Submission(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct MintReceipt {
    /// Known immediately in mock mode; the real backend only learns the id
    /// once the chain view refreshes.
    pub token_id: Option<TokenId>,
    pub tx_hash: String,
}

/// Common surface of the mock registry and the real contract gateway. The
/// backend is selected once per session transition, not per call.
#[async_trait]
pub trait NftBackend: Send + Sync {
    async fn mint(
        &self,
        to: &WalletAddress,
        name: &str,
        description: &str,
        rarity: Rarity,
        token_uri: &str,
    ) -> Result<MintReceipt, MintError>;

    async fn balance_of(&self, owner: &WalletAddress) -> Result<u64>;

    async fn list_owned(&self, owner: &WalletAddress) -> Result<Vec<TokenRecord>>;

    async fn token_metadata(&self, token_id: TokenId) -> Result<Option<NftMetadata>>;
}

// ── Mint observability ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintPhase {
    Idle,
    Preparing,
    Submitted,
    Success,
    Failed,
}

impl Default for MintPhase {
    fn default() -> Self {
        MintPhase::Idle
    }
}

impl MintPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MintPhase::Idle => "idle",
            MintPhase::Preparing => "preparing",
            MintPhase::Submitted => "submitted",
            MintPhase::Success => "success",
            MintPhase::Failed => "failed",
        }
    }
}

/// Shared status line updated at each mint phase boundary so the UI layer
/// can observe progress. Cheap to clone; all clones view the same line.
#[derive(Clone, Default)]
pub struct MintStatus {
    inner: Arc<RwLock<(MintPhase, Option<String>)>>,
}

impl MintStatus {
    pub async fn set(&self, phase: MintPhase, message: &str) {
        let mut guard = self.inner.write().await;
        *guard = (phase, Some(message.to_owned()));
    }

    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        *guard = (MintPhase::Idle, None);
    }

    pub async fn get(&self) -> (MintPhase, Option<String>) {
        self.inner.read().await.clone()
    }
}

/// Session generation counter. Delayed mint completions are applied only if
/// the generation that started the mint is still current, so a disconnect
/// or reconnect mid-flight cannot produce a stale write.
#[derive(Clone, Default)]
pub struct SessionEpoch(Arc<AtomicU64>);

impl SessionEpoch {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

// ── Mock registry ──

const SUBMIT_DELAY: Duration = Duration::from_millis(1500);
const PROCESS_DELAY: Duration = Duration::from_millis(2000);

/// Memory-only token registry for demo sessions. Re-seeded with three
/// fixture tokens on every fresh construction; never persisted.
pub struct MockNftRegistry {
    tokens: RwLock<Vec<TokenRecord>>,
    mint_gate: Mutex<()>,
    status: MintStatus,
    epoch: SessionEpoch,
    submit_delay: Duration,
    process_delay: Duration,
}

impl MockNftRegistry {
    pub fn new(status: MintStatus, epoch: SessionEpoch) -> Self {
        Self {
            tokens: RwLock::new(seed_tokens()),
            mint_gate: Mutex::new(()),
            status,
            epoch,
            submit_delay: SUBMIT_DELAY,
            process_delay: PROCESS_DELAY,
        }
    }

    pub fn with_delays(mut self, submit_delay: Duration, process_delay: Duration) -> Self {
        self.submit_delay = submit_delay;
        self.process_delay = process_delay;
        self
    }
}

#[async_trait]
impl NftBackend for MockNftRegistry {
    async fn mint(
        &self,
        to: &WalletAddress,
        name: &str,
        description: &str,
        rarity: Rarity,
        token_uri: &str,
    ) -> Result<MintReceipt, MintError> {
        // One mint at a time per registry; a second caller queues here
        // instead of interleaving phase updates.
        let _gate = self.mint_gate.lock().await;

        self.status
            .set(MintPhase::Preparing, "Preparing mock transaction...")
            .await;

        if name.trim().is_empty() || description.trim().is_empty() {
            self.status
                .set(MintPhase::Failed, "Minting failed. Please try again.")
                .await;
            return Err(MintError::MissingMetadata);
        }

        let started_epoch = self.epoch.current();

        sleep(self.submit_delay).await;
        self.status
            .set(
                MintPhase::Submitted,
                "Mock transaction submitted. Processing...",
            )
            .await;
        sleep(self.process_delay).await;

        if self.epoch.current() != started_epoch {
            self.status
                .set(MintPhase::Failed, "Minting failed. Please try again.")
                .await;
            return Err(MintError::Submission(anyhow::anyhow!(
                "session changed while mint was in flight"
            )));
        }

        let mut tokens = self.tokens.write().await;
        let token_id = TokenId(tokens.len() as u64 + 1);
        let token_uri = if token_uri.trim().is_empty() {
            kv_metadata::rarity_placeholder_url(name.trim(), rarity)
        } else {
            token_uri.to_owned()
        };

        tokens.push(TokenRecord {
            token_id,
            metadata: NftMetadata {
                name: name.trim().to_owned(),
                description: description.trim().to_owned(),
                rarity,
                minted_at_epoch_ms: epoch_ms(),
            },
            token_uri,
        });
        drop(tokens);

        self.status
            .set(MintPhase::Success, "NFT minted successfully")
            .await;
        info!("mock mint for {} produced token #{token_id}", to.0);

        Ok(MintReceipt {
            token_id: Some(token_id),
            tx_hash: synthetic_tx_hash(),
        })
    }

    async fn balance_of(&self, _owner: &WalletAddress) -> Result<u64> {
        Ok(self.tokens.read().await.len() as u64)
    }

    // The mock collection is global to the connected session: any mock
    // wallet sees the full list, with no per-owner partitioning.
    async fn list_owned(&self, _owner: &WalletAddress) -> Result<Vec<TokenRecord>> {
        Ok(self.tokens.read().await.clone())
    }

    async fn token_metadata(&self, token_id: TokenId) -> Result<Option<NftMetadata>> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .iter()
            .find(|token| token.token_id == token_id)
            .map(|token| token.metadata.clone()))
    }
}

fn seed_tokens() -> Vec<TokenRecord> {
    let now = epoch_ms();
    let fixture = |id: u64, name: &str, description: &str, rarity: Rarity, age_ms: u128| {
        TokenRecord {
            token_id: TokenId(id),
            metadata: NftMetadata {
                name: name.to_owned(),
                description: description.to_owned(),
                rarity,
                minted_at_epoch_ms: now.saturating_sub(age_ms),
            },
            token_uri: kv_metadata::rarity_placeholder_url(name, rarity),
        }
    };

    vec![
        fixture(
            1,
            "Genesis Kuverse NFT",
            "The first NFT in the Kuverse collection - a rare digital collectible \
             with unique properties and significance.",
            Rarity::Legendary,
            86_400_000,
        ),
        fixture(
            2,
            "Kuverse Explorer",
            "A digital badge for early explorers of the Kuverse ecosystem. Shows \
             your pioneering spirit in the metaverse.",
            Rarity::Epic,
            3_600_000,
        ),
        fixture(
            3,
            "My Awesome NFT",
            "This is a unique digital collectible created through the Kuverse \
             platform with special Epic rarity.",
            Rarity::Epic,
            600_000,
        ),
    ]
}

fn synthetic_tx_hash() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_address() -> WalletAddress {
        WalletAddress("0x742d35Cc6634C0532925a3b8D0c6b85c60b56ca4".to_owned())
    }

    fn fast_registry() -> MockNftRegistry {
        MockNftRegistry::new(MintStatus::default(), SessionEpoch::default())
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn fresh_registry_holds_three_seeded_tokens() -> anyhow::Result<()> {
        let registry = fast_registry();
        let owner = demo_address();

        assert_eq!(registry.balance_of(&owner).await?, 3);
        let tokens = registry.list_owned(&owner).await?;
        assert_eq!(tokens[0].metadata.name, "Genesis Kuverse NFT");
        assert_eq!(tokens[0].metadata.rarity, Rarity::Legendary);
        assert_eq!(tokens[2].token_id, TokenId(3));
        Ok(())
    }

    #[tokio::test]
    async fn mint_assigns_next_token_id_and_rarity_placeholder() -> anyhow::Result<()> {
        let registry = fast_registry();
        let owner = demo_address();

        let receipt = registry
            .mint(&owner, "Ace", "Test card", Rarity::Rare, "")
            .await?;

        assert_eq!(receipt.token_id, Some(TokenId(4)));
        assert!(receipt.tx_hash.starts_with("0x"));
        assert_eq!(receipt.tx_hash.len(), 34);

        assert_eq!(registry.balance_of(&owner).await?, 4);
        let tokens = registry.list_owned(&owner).await?;
        let minted = tokens.last().expect("minted token");
        assert!(minted.token_uri.contains("1E90FF"));
        assert!(minted.token_uri.contains("text=Ace"));

        let (phase, message) = registry.status.get().await;
        assert_eq!(phase, MintPhase::Success);
        assert_eq!(message.as_deref(), Some("NFT minted successfully"));
        Ok(())
    }

    #[tokio::test]
    async fn mint_keeps_caller_supplied_token_uri() -> anyhow::Result<()> {
        let registry = fast_registry();
        let owner = demo_address();

        registry
            .mint(
                &owner,
                "Ace",
                "Test card",
                Rarity::Rare,
                "data:application/json;base64,e30=",
            )
            .await?;

        let tokens = registry.list_owned(&owner).await?;
        assert_eq!(
            tokens.last().expect("minted token").token_uri,
            "data:application/json;base64,e30="
        );
        Ok(())
    }

    #[tokio::test]
    async fn mint_rejects_missing_metadata_without_mutation() -> anyhow::Result<()> {
        let registry = fast_registry();
        let owner = demo_address();

        let error = registry
            .mint(&owner, "", "Test card", Rarity::Rare, "")
            .await
            .unwrap_err();
        assert!(matches!(error, MintError::MissingMetadata));
        assert_eq!(registry.balance_of(&owner).await?, 3);

        let (phase, _) = registry.status.get().await;
        assert_eq!(phase, MintPhase::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn mint_discards_completion_from_stale_session() -> anyhow::Result<()> {
        let epoch = SessionEpoch::default();
        let registry = MockNftRegistry::new(MintStatus::default(), epoch.clone())
            .with_delays(Duration::ZERO, Duration::from_millis(200));
        let owner = demo_address();

        let disconnect = async {
            sleep(Duration::from_millis(50)).await;
            epoch.advance();
        };
        let (outcome, ()) = tokio::join!(
            registry.mint(&owner, "Ace", "Test card", Rarity::Rare, ""),
            disconnect
        );

        assert!(outcome.is_err());
        assert_eq!(registry.balance_of(&owner).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn collection_is_shared_across_mock_owners() -> anyhow::Result<()> {
        let registry = fast_registry();
        let other = WalletAddress("0x0000000000000000000000000000000000000001".to_owned());

        registry
            .mint(&demo_address(), "Ace", "Test card", Rarity::Rare, "")
            .await?;

        assert_eq!(registry.list_owned(&demo_address()).await?.len(), 4);
        assert_eq!(registry.list_owned(&other).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn token_metadata_is_a_point_lookup() -> anyhow::Result<()> {
        let registry = fast_registry();

        let metadata = registry.token_metadata(TokenId(2)).await?.expect("token 2");
        assert_eq!(metadata.name, "Kuverse Explorer");
        assert!(registry.token_metadata(TokenId(99)).await?.is_none());
        Ok(())
    }
}
