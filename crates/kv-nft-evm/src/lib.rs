use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use kv_api_types::{NftMetadata, Rarity, TokenId, TokenRecord, WalletAddress};
use kv_nft_client::{MintError, MintPhase, MintReceipt, MintStatus, NftBackend, SessionEpoch};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Real HTTP adapter for the Kuverse NFT contract facade.
///
/// Reads `CONTRACT_RPC_URL` from environment at construction time
/// (default: `http://localhost:8545`).
pub struct ContractGateway {
    endpoint: String,
    contract_address: String,
    http: reqwest::Client,
    status: MintStatus,
    epoch: SessionEpoch,
    mint_gate: tokio::sync::Mutex<()>,
    refresh_delay: Duration,
}

/// First address hardhat deploys to on a fresh local node; the demo contract
/// lands there unless overridden.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

const REFRESH_DELAY: Duration = Duration::from_millis(3000);

// ── Chain profiles ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProfile {
    pub slug: &'static str,
    pub chain_id: u64,
    pub name: &'static str,
}

pub const MAINNET: ChainProfile = ChainProfile {
    slug: "mainnet",
    chain_id: 1,
    name: "Ethereum Mainnet",
};

pub const SEPOLIA: ChainProfile = ChainProfile {
    slug: "sepolia",
    chain_id: 11_155_111,
    name: "Sepolia Testnet",
};

pub fn supported_chains() -> [ChainProfile; 2] {
    [MAINNET, SEPOLIA]
}

pub fn chain_by_slug(slug: &str) -> Option<ChainProfile> {
    supported_chains()
        .into_iter()
        .find(|profile| profile.slug == slug)
}

// ── Contract facade wire types ──

#[derive(Debug, Serialize)]
struct MintTxRequest {
    to: String,
    name: String,
    description: String,
    rarity: String,
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct MintTxResponse {
    tx_hash: String,
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[allow(dead_code)]
    owner: String,
    balance: u64,
}

#[derive(Debug, Deserialize)]
struct FacadeErrorResponse {
    error: String,
}

impl ContractGateway {
    pub fn new(
        endpoint: Option<String>,
        contract_address: Option<String>,
        status: MintStatus,
        epoch: SessionEpoch,
    ) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("CONTRACT_RPC_URL").ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            contract_address: contract_address
                .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_owned()),
            http: reqwest::Client::new(),
            status,
            epoch,
            mint_gate: tokio::sync::Mutex::new(()),
            refresh_delay: REFRESH_DELAY,
        }
    }

    pub fn with_refresh_delay(mut self, refresh_delay: Duration) -> Self {
        self.refresh_delay = refresh_delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    async fn submit_mint(
        &self,
        to: &WalletAddress,
        name: &str,
        description: &str,
        rarity: Rarity,
        token_uri: &str,
    ) -> Result<MintTxResponse> {
        let url = format!("{}/contract/{}/mint", self.endpoint, self.contract_address);
        let body = MintTxRequest {
            to: to.0.clone(),
            name: name.to_owned(),
            description: description.to_owned(),
            rarity: rarity.as_str().to_owned(),
            token_uri: token_uri.to_owned(),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("contract mint transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<FacadeErrorResponse>(&text) {
                return Err(anyhow!("contract mint rejected: {}", err.error));
            }
            return Err(anyhow!("contract mint HTTP {status}: {text}"));
        }

        let submitted: MintTxResponse = response.json().await.context("contract mint parse")?;
        if !submitted.accepted {
            return Err(anyhow!("contract mint not accepted: {}", submitted.tx_hash));
        }

        Ok(submitted)
    }

    /// Best-effort view refresh after a fixed delay window. Not a
    /// confirmation wait: the task just re-queries the chain once, and only
    /// applies its outcome if the session generation is still current.
    fn schedule_refresh(&self, owner: WalletAddress, started_epoch: u64) {
        let http = self.http.clone();
        let url = balance_url(&self.endpoint, &self.contract_address, &owner.0);
        let status = self.status.clone();
        let epoch = self.epoch.clone();
        let refresh_delay = self.refresh_delay;

        tokio::spawn(async move {
            sleep(refresh_delay).await;
            if epoch.current() != started_epoch {
                return;
            }
            match fetch_balance(&http, &url).await {
                Ok(balance) => {
                    info!("post-mint refresh: {} now holds {balance} tokens", owner.0);
                    status
                        .set(MintPhase::Success, "NFT minted successfully")
                        .await;
                }
                Err(err) => {
                    warn!("post-mint balance refresh failed: {err:#}");
                }
            }
        });
    }
}

#[async_trait]
impl NftBackend for ContractGateway {
    async fn mint(
        &self,
        to: &WalletAddress,
        name: &str,
        description: &str,
        rarity: Rarity,
        token_uri: &str,
    ) -> Result<MintReceipt, MintError> {
        let _gate = self.mint_gate.lock().await;

        if name.trim().is_empty() || description.trim().is_empty() {
            self.status
                .set(MintPhase::Failed, "Minting failed. Please try again.")
                .await;
            return Err(MintError::MissingMetadata);
        }

        self.status
            .set(MintPhase::Preparing, "Preparing transaction...")
            .await;
        let started_epoch = self.epoch.current();

        match self
            .submit_mint(to, name, description, rarity, token_uri)
            .await
        {
            Ok(submitted) => {
                self.status
                    .set(
                        MintPhase::Submitted,
                        "Transaction submitted. Waiting for confirmation...",
                    )
                    .await;
                self.schedule_refresh(to.clone(), started_epoch);
                Ok(MintReceipt {
                    token_id: None,
                    tx_hash: submitted.tx_hash,
                })
            }
            Err(err) => {
                self.status
                    .set(MintPhase::Failed, "Minting failed. Please try again.")
                    .await;
                Err(MintError::Submission(err))
            }
        }
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<u64> {
        let url = balance_url(&self.endpoint, &self.contract_address, &owner.0);
        fetch_balance(&self.http, &url).await
    }

    // Metadata is not fetched per owned token yet; the collection view is
    // served by the mock registry only.
    async fn list_owned(&self, _owner: &WalletAddress) -> Result<Vec<TokenRecord>> {
        Ok(Vec::new())
    }

    async fn token_metadata(&self, token_id: TokenId) -> Result<Option<NftMetadata>> {
        let url = format!(
            "{}/contract/{}/token/{}/metadata",
            self.endpoint, self.contract_address, token_id
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("contract metadata transport")?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("contract metadata HTTP {status}: {text}");
        }

        let metadata: NftMetadata = response.json().await.context("contract metadata parse")?;
        Ok(Some(metadata))
    }
}

fn balance_url(endpoint: &str, contract_address: &str, owner: &str) -> String {
    format!("{endpoint}/contract/{contract_address}/balance/{owner}")
}

async fn fetch_balance(http: &reqwest::Client, url: &str) -> Result<u64> {
    let response = http
        .get(url)
        .send()
        .await
        .context("contract balance transport")?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        // Owner unknown to the contract — zero balance
        return Ok(0);
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("contract balance HTTP {status}: {text}");
    }

    let body: BalanceResponse = response.json().await.context("contract balance parse")?;
    Ok(body.balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_profiles_cover_mainnet_and_sepolia() {
        assert_eq!(chain_by_slug("mainnet").map(|chain| chain.chain_id), Some(1));
        assert_eq!(
            chain_by_slug("sepolia").map(|chain| chain.chain_id),
            Some(11_155_111)
        );
        assert_eq!(chain_by_slug("goerli"), None);
    }

    #[test]
    fn gateway_normalizes_endpoint_and_contract_defaults() {
        let gateway = ContractGateway::new(
            Some("http://chain.local:9000/".to_owned()),
            None,
            MintStatus::default(),
            SessionEpoch::default(),
        );
        assert_eq!(gateway.endpoint(), "http://chain.local:9000");
        assert_eq!(gateway.contract_address(), DEFAULT_CONTRACT_ADDRESS);
    }

    #[test]
    fn balance_url_shape() {
        assert_eq!(
            balance_url("http://chain.local", "0xc0ffee", "0x742d"),
            "http://chain.local/contract/0xc0ffee/balance/0x742d"
        );
    }
}
