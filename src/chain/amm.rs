//! SimpleAMM swap execution

use super::{from_wei, parse_address, to_wei, SignerClient};
use crate::config::ChainConfig;
use crate::error::{BotError, Result};
use crate::types::{PoolInfo, TradeAction, TradeReceipt};
use async_trait::async_trait;
use ethers::contract::{abigen, ContractError};
use ethers::middleware::Middleware;
use ethers::types::{Address, TransactionReceipt, U256, U64};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

abigen!(
    SimpleAmm,
    r#"[
        function swap(address tokenIn, uint256 amountIn, uint256 minAmountOut, address to) external returns (uint256 amountOut)
        function getAmountOut(address tokenIn, uint256 amountIn) external view returns (uint256 amountOut)
        function getReserves() external view returns (uint256, uint256)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function approve(address spender, uint256 amount) external returns (bool)
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
const BPS: u64 = 10_000;

/// One swap to execute
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    /// Buy spends the quote token for base; sell spends base for quote
    pub side: TradeAction,
    pub amount_in: Decimal,
    /// Fraction, 0.05 = 5%
    pub slippage: Decimal,
    /// Caller floor; the slippage-derived minimum wins if higher
    pub min_amount_out: Decimal,
}

impl SwapRequest {
    pub fn new(side: TradeAction, amount_in: Decimal, slippage: Decimal) -> Self {
        Self {
            side,
            amount_in,
            slippage,
            min_amount_out: Decimal::ZERO,
        }
    }
}

/// Swap venue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// Expected output for spending `amount_in` on `side`
    async fn quote(&self, side: TradeAction, amount_in: Decimal) -> Result<Decimal>;

    async fn swap(&self, request: SwapRequest) -> Result<TradeReceipt>;

    async fn reserves(&self) -> Result<PoolInfo>;
}

/// `quote × (1 − slippage)`, in base units
pub fn min_out_with_slippage(quote: U256, slippage: Decimal) -> Result<U256> {
    if slippage.is_sign_negative() || slippage >= Decimal::ONE {
        return Err(BotError::Execution(format!("slippage {} out of range", slippage)));
    }
    let bps = (slippage * Decimal::from(BPS))
        .round()
        .to_u64()
        .ok_or_else(|| BotError::Execution(format!("slippage {} out of range", slippage)))?;
    Ok(quote * U256::from(BPS - bps) / U256::from(BPS))
}

/// Pool spot price, quote per base; zero for an empty pool
pub fn spot_price(reserve_base: Decimal, reserve_quote: Decimal) -> Decimal {
    if reserve_base.is_zero() {
        Decimal::ZERO
    } else {
        reserve_quote / reserve_base
    }
}

/// Revert reason if the node returned one, the raw error otherwise
fn describe_error<M: Middleware>(action: &str, err: ContractError<M>) -> BotError {
    match err.decode_revert::<String>() {
        Some(reason) => BotError::Execution(format!("{} reverted: {}", action, reason)),
        None => BotError::Execution(format!("{} failed: {}", action, err)),
    }
}

/// A mined receipt with status 1; dropped or reverted transactions are errors
pub(crate) fn ensure_success(
    action: &str,
    receipt: Option<TransactionReceipt>,
) -> Result<TransactionReceipt> {
    let receipt = receipt
        .ok_or_else(|| BotError::Execution(format!("{} transaction dropped", action)))?;
    if receipt.status != Some(U64::from(1)) {
        return Err(BotError::Execution(format!(
            "{} transaction {:?} reverted",
            action, receipt.transaction_hash
        )));
    }
    Ok(receipt)
}

pub struct AmmExecutor {
    client: Arc<SignerClient>,
    amm: SimpleAmm<SignerClient>,
    base_token: Address,
    quote_token: Address,
}

impl AmmExecutor {
    pub fn new(
        client: Arc<SignerClient>,
        amm_address: Address,
        base_token: Address,
        quote_token: Address,
    ) -> Self {
        Self {
            amm: SimpleAmm::new(amm_address, client.clone()),
            client,
            base_token,
            quote_token,
        }
    }

    pub fn from_config(config: &ChainConfig, client: Arc<SignerClient>) -> Result<Self> {
        Ok(Self::new(
            client,
            parse_address("chain.amm_address", config.amm_address.as_deref())?,
            parse_address("chain.base_token", config.base_token.as_deref())?,
            parse_address("chain.quote_token", config.quote_token.as_deref())?,
        ))
    }

    fn token_in(&self, side: TradeAction) -> Result<Address> {
        match side {
            TradeAction::Buy => Ok(self.quote_token),
            TradeAction::Sell => Ok(self.base_token),
            TradeAction::Hold => Err(BotError::Execution("cannot swap on HOLD".to_string())),
        }
    }

    async fn quote_wei(&self, token_in: Address, amount_in: U256) -> Result<U256> {
        self.amm
            .get_amount_out(token_in, amount_in)
            .call()
            .await
            .map_err(|e| describe_error("getAmountOut", e))
    }
}

#[async_trait]
impl SwapExecutor for AmmExecutor {
    async fn quote(&self, side: TradeAction, amount_in: Decimal) -> Result<Decimal> {
        let token_in = self.token_in(side)?;
        let out = self.quote_wei(token_in, to_wei(amount_in)?).await?;
        from_wei(out)
    }

    async fn swap(&self, request: SwapRequest) -> Result<TradeReceipt> {
        let token_in = self.token_in(request.side)?;
        let amount_in = to_wei(request.amount_in)?;
        let owner = self.client.address();
        let token = Erc20::new(token_in, self.client.clone());

        let balance = token
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| describe_error("balanceOf", e))?;
        if balance < amount_in {
            return Err(BotError::InsufficientBalance {
                required: request.amount_in,
                available: from_wei(balance)?,
            });
        }

        let quoted = self.quote_wei(token_in, amount_in).await?;
        let min_out =
            min_out_with_slippage(quoted, request.slippage)?.max(to_wei(request.min_amount_out)?);

        info!("Approving {} of {:?} for the AMM", request.amount_in, token_in);
        let approve = token.approve(self.amm.address(), amount_in).legacy();
        let pending = approve.send().await.map_err(|e| describe_error("approve", e))?;
        let approve_receipt = timeout(RECEIPT_TIMEOUT, pending)
            .await
            .map_err(|_| BotError::Execution("approve receipt timed out".to_string()))?
            .map_err(|e| BotError::Chain(e.to_string()))?;
        ensure_success("approve", approve_receipt)?;

        info!(
            "Swapping {} {} (min out {})",
            request.amount_in,
            request.side,
            from_wei(min_out)?
        );
        let swap = self.amm.swap(token_in, amount_in, min_out, owner).legacy();
        let pending = swap.send().await.map_err(|e| describe_error("swap", e))?;
        let tx_hash = pending.tx_hash();
        let receipt = timeout(RECEIPT_TIMEOUT, pending)
            .await
            .map_err(|_| BotError::Execution(format!("swap {:?} receipt timed out", tx_hash)))?
            .map_err(|e| BotError::Chain(e.to_string()))?;
        let receipt = ensure_success("swap", receipt)?;

        let gas_used = receipt.gas_used.map(|g| g.low_u64()).unwrap_or_default();
        info!("Swap confirmed: {:?} (gas {})", receipt.transaction_hash, gas_used);

        Ok(TradeReceipt {
            tx_hash: format!("{:?}", receipt.transaction_hash),
            amount_in: request.amount_in,
            amount_out: from_wei(quoted)?,
            min_amount_out: from_wei(min_out)?,
            gas_used,
        })
    }

    async fn reserves(&self) -> Result<PoolInfo> {
        let (base, quote) = self
            .amm
            .get_reserves()
            .call()
            .await
            .map_err(|e| describe_error("getReserves", e))?;

        let reserve_base = from_wei(base)?;
        let reserve_quote = from_wei(quote)?;
        if reserve_base.is_zero() {
            warn!("AMM pool has no base liquidity");
        }

        Ok(PoolInfo {
            reserve_base,
            reserve_quote,
            price: spot_price(reserve_base, reserve_quote),
        })
    }
}
