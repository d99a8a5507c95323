/// Network family a chain belongs to. Selects the provider tiers used for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFamily {
    Evm,
    Solana,
}

/// Static description of a supported network, shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    /// Canonical slug; the stable key used across providers and in every aggregate map.
    pub slug: &'static str,
    pub chain_id: u64,
    pub display_name: &'static str,
    pub native_symbol: &'static str,
    /// Base-unit scale of the native token (18 for wei, 9 for lamports).
    pub native_decimals: u32,
    /// Network name as it appears in the Covalent URL path.
    pub covalent_slug: &'static str,
    /// CoinGecko coin id used for the native-token USD price.
    pub coingecko_id: &'static str,
}

/// Out-of-band id for Solana; distinct from every EVM chain id.
pub const SOLANA_CHAIN_ID: u64 = 900;

/// Placeholder contract for native-asset transfers on EVM chains.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

pub const ETH_MAINNET: ChainSpec = ChainSpec {
    slug: "eth-mainnet",
    chain_id: 1,
    display_name: "Ethereum",
    native_symbol: "ETH",
    native_decimals: 18,
    covalent_slug: "eth-mainnet",
    coingecko_id: "ethereum",
};

pub const BASE_MAINNET: ChainSpec = ChainSpec {
    slug: "base-mainnet",
    chain_id: 8453,
    display_name: "Base",
    native_symbol: "ETH",
    native_decimals: 18,
    covalent_slug: "base-mainnet",
    coingecko_id: "ethereum",
};

pub const POLYGON_MAINNET: ChainSpec = ChainSpec {
    slug: "polygon-mainnet",
    chain_id: 137,
    display_name: "Polygon",
    native_symbol: "POL",
    native_decimals: 18,
    covalent_slug: "matic-mainnet",
    coingecko_id: "polygon-ecosystem-token",
};

pub const BNB_MAINNET: ChainSpec = ChainSpec {
    slug: "bnb-mainnet",
    chain_id: 56,
    display_name: "BNB Chain",
    native_symbol: "BNB",
    native_decimals: 18,
    covalent_slug: "bsc-mainnet",
    coingecko_id: "binancecoin",
};

pub const ARBITRUM_MAINNET: ChainSpec = ChainSpec {
    slug: "arbitrum-mainnet",
    chain_id: 42161,
    display_name: "Arbitrum",
    native_symbol: "ETH",
    native_decimals: 18,
    covalent_slug: "arbitrum-mainnet",
    coingecko_id: "ethereum",
};

pub const SOLANA_MAINNET: ChainSpec = ChainSpec {
    slug: "solana-mainnet",
    chain_id: SOLANA_CHAIN_ID,
    display_name: "Solana",
    native_symbol: "SOL",
    native_decimals: 9,
    covalent_slug: "solana-mainnet",
    coingecko_id: "solana",
};

pub static EVM_CHAINS: [ChainSpec; 5] = [
    ETH_MAINNET,
    BASE_MAINNET,
    POLYGON_MAINNET,
    BNB_MAINNET,
    ARBITRUM_MAINNET,
];

pub static ALL_CHAINS: [ChainSpec; 6] = [
    ETH_MAINNET,
    BASE_MAINNET,
    POLYGON_MAINNET,
    BNB_MAINNET,
    ARBITRUM_MAINNET,
    SOLANA_MAINNET,
];

pub fn by_slug(slug: &str) -> Option<&'static ChainSpec> {
    ALL_CHAINS.iter().find(|c| c.slug == slug)
}

/// Human-readable chain name; unknown slugs are returned unchanged.
pub fn display_name(slug: &str) -> &str {
    by_slug(slug).map_or(slug, |c| c.display_name)
}

impl ChainSpec {
    /// Convert an integer amount in base units (wei, lamports) to whole native units.
    pub fn to_native_units(&self, base_units: u128) -> f64 {
        base_units as f64 / 10f64.powi(self.native_decimals as i32)
    }
}
