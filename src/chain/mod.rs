//! On-chain access: Sentinel safety gate, AMM executor, wallet balances

pub mod amm;
pub mod sentinel;


pub use amm::{AmmExecutor, SwapExecutor, SwapRequest};
pub use sentinel::{check_or_reject, recommend_safe_amounts, SafetyGate, SentinelGate};

use crate::config::ChainConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Every token in play uses 18 decimals
pub const TOKEN_DECIMALS: u32 = 18;

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Read-only JSON-RPC provider
pub fn read_provider(config: &ChainConfig) -> Result<Arc<Provider<Http>>> {
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .map_err(|e| BotError::Config(format!("invalid rpc_url {}: {}", config.rpc_url, e)))?
        .interval(Duration::from_millis(500));
    Ok(Arc::new(provider))
}

/// Provider plus the signing wallet
pub fn signer_client(config: &ChainConfig) -> Result<Arc<SignerClient>> {
    let key = config
        .private_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| BotError::Config("chain.private_key is not set".to_string()))?;

    let wallet = LocalWallet::from_str(key)
        .map_err(|e| BotError::Config(format!("invalid private key: {}", e)))?
        .with_chain_id(config.chain_id);

    let provider = read_provider(config)?;
    Ok(Arc::new(SignerMiddleware::new((*provider).clone(), wallet)))
}

/// Parse a configured address, naming the setting on failure
pub fn parse_address(setting: &str, value: Option<&str>) -> Result<Address> {
    let raw = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BotError::Config(format!("{} is not set", setting)))?;
    Address::from_str(raw).map_err(|e| BotError::Config(format!("{} is invalid: {}", setting, e)))
}

/// Decimal token amount to 18-decimal base units
pub fn to_wei(amount: Decimal) -> Result<U256> {
    if amount.is_sign_negative() {
        return Err(BotError::Parse(format!("negative amount {}", amount)));
    }
    let amount = amount.round_dp(TOKEN_DECIMALS).normalize();
    let units = parse_units(amount.to_string(), TOKEN_DECIMALS)
        .map_err(|e| BotError::Parse(format!("amount {}: {}", amount, e)))?;
    Ok(units.into())
}

/// 18-decimal base units to a Decimal token amount
pub fn from_wei(value: U256) -> Result<Decimal> {
    let formatted = format_units(value, TOKEN_DECIMALS)
        .map_err(|e| BotError::Parse(format!("wei {}: {}", value, e)))?;
    Decimal::from_str(&formatted)
        .map(|d| d.normalize())
        .map_err(|e| BotError::Parse(format!("wei {} out of range: {}", value, e)))
}

/// Wallet balance lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Wallet address the balances belong to
    fn owner(&self) -> Address;

    /// Native gas token balance
    async fn native_balance(&self) -> Result<Decimal>;

    /// ERC-20 balance
    async fn token_balance(&self, token: Address) -> Result<Decimal>;
}

#[async_trait]
impl BalanceReader for SignerClient {
    fn owner(&self) -> Address {
        self.address()
    }

    async fn native_balance(&self) -> Result<Decimal> {
        let wei = self
            .get_balance(self.address(), None)
            .await
            .map_err(|e| BotError::Chain(e.to_string()))?;
        from_wei(wei)
    }

    async fn token_balance(&self, token: Address) -> Result<Decimal> {
        let erc20 = amm::Erc20::new(token, Arc::new(self.clone()));
        let wei = erc20
            .balance_of(self.address())
            .call()
            .await
            .map_err(|e| BotError::Chain(e.to_string()))?;
        from_wei(wei)
    }
}
