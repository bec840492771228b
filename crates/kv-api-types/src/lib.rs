use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAddress(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenId(pub u64);

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed rarity tag attached to every token. Drives only display and the
/// placeholder-image color choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    pub fn parse(value: &str) -> Option<Rarity> {
        match value.trim().to_lowercase().as_str() {
            "common" => Some(Rarity::Common),
            "rare" => Some(Rarity::Rare),
            "epic" => Some(Rarity::Epic),
            "legendary" => Some(Rarity::Legendary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }

    /// Placeholder-image color fragment, `<background>/<text>` hex pair.
    pub fn placeholder_color(&self) -> &'static str {
        match self {
            Rarity::Legendary => "FFD700/000",
            Rarity::Epic => "9932CC/FFF",
            Rarity::Rare => "1E90FF/FFF",
            Rarity::Common => "808080/FFF",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    pub minted_at_epoch_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRecord {
    pub token_id: TokenId,
    pub metadata: NftMetadata,
    pub token_uri: String,
}

/// Transient mint-form value. Validated by `kv-metadata`, consumed by the
/// mint operation, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub name: String,
    pub description: String,
    pub rarity: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

// ── Session API ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub address: String,
    pub formatted_address: String,
    pub connected: bool,
    pub mock_mode: bool,
}

// ── NFT API ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintResponse {
    pub token_id: Option<u64>,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintStatusResponse {
    pub phase: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub wallet_address: String,
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub wallet_address: String,
    pub tokens: Vec<TokenRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadataResponse {
    pub token_id: u64,
    pub metadata: NftMetadata,
}

// ── Chain config API ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub slug: String,
    pub chain_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfigResponse {
    pub contract_address: String,
    pub default_chain: String,
    pub chains: Vec<ChainInfo>,
}
