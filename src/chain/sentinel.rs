//! SentinelClamp safety gate
//!
//! The Sentinel contract enforces a daily spending limit. `simulateCheck` is a
//! read-only call that tells us whether a spend would be allowed right now;
//! every autonomous trade asks it first and a refusal is final for the cycle.

use super::{from_wei, parse_address, read_provider, to_wei};
use crate::config::ChainConfig;
use crate::error::{BotError, Result};
use crate::types::{ApprovalResult, SafeAmounts, SentinelStatus};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

abigen!(
    SentinelClamp,
    r#"[
        function simulateCheck(address dapp, uint256 amount) external view returns (bool approved, string reason, uint256 remainingAfter)
        function getStatus() external view returns (uint256 currentSpent, uint256 remaining, uint256 timeUntilReset, bool isPaused, uint256 txCount, uint256 x402TxCount)
    ]"#
);

/// Pre-trade spending check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SafetyGate: Send + Sync {
    /// Would spending `amount` at `dapp` be approved? `None` checks the default dapp
    async fn simulate_check(&self, dapp: Option<Address>, amount: Decimal) -> Result<ApprovalResult>;

    async fn status(&self) -> Result<SentinelStatus>;
}

pub struct SentinelGate {
    contract: SentinelClamp<Provider<Http>>,
    default_dapp: Address,
    call_timeout: Duration,
}

impl SentinelGate {
    pub fn new(
        contract_address: Address,
        default_dapp: Address,
        provider: Arc<Provider<Http>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            contract: SentinelClamp::new(contract_address, provider),
            default_dapp,
            call_timeout,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        let sentinel = parse_address("chain.sentinel_address", config.sentinel_address.as_deref())?;
        let dapp = parse_address("chain.amm_address", config.amm_address.as_deref())?;
        Ok(Self::new(
            sentinel,
            dapp,
            read_provider(config)?,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

#[async_trait]
impl SafetyGate for SentinelGate {
    async fn simulate_check(&self, dapp: Option<Address>, amount: Decimal) -> Result<ApprovalResult> {
        let dapp = dapp.unwrap_or(self.default_dapp);
        let amount_wei = to_wei(amount)?;

        let call = self.contract.simulate_check(dapp, amount_wei);
        let (approved, reason, remaining_after) = timeout(self.call_timeout, call.call())
            .await
            .map_err(|_| BotError::Chain("simulateCheck timed out".to_string()))?
            .map_err(|e| BotError::Chain(format!("simulateCheck failed: {}", e)))?;

        debug!("Sentinel check for {} at {:?}: {} ({})", amount, dapp, approved, reason);
        Ok(ApprovalResult {
            approved,
            reason,
            remaining_limit: from_wei(remaining_after)?,
        })
    }

    async fn status(&self) -> Result<SentinelStatus> {
        let call = self.contract.get_status();
        let (spent, remaining, until_reset, is_paused, tx_count, x402_count) =
            timeout(self.call_timeout, call.call())
                .await
                .map_err(|_| BotError::Chain("getStatus timed out".to_string()))?
                .map_err(|e| BotError::Chain(format!("getStatus failed: {}", e)))?;

        let spent = from_wei(spent)?;
        let remaining = from_wei(remaining)?;

        Ok(SentinelStatus {
            spent,
            remaining,
            daily_limit: spent + remaining,
            seconds_until_reset: saturating_u64(until_reset),
            is_paused,
            tx_count: saturating_u64(tx_count),
            x402_tx_count: saturating_u64(x402_count),
        })
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Ask the gate, folding transport errors into a rejection
pub async fn check_or_reject(gate: &dyn SafetyGate, amount: Decimal) -> ApprovalResult {
    match gate.simulate_check(None, amount).await {
        Ok(approval) => approval,
        Err(e) => {
            warn!("Sentinel check failed: {}", e);
            ApprovalResult {
                approved: false,
                reason: format!("Error checking Sentinel: {}", e),
                remaining_limit: Decimal::ZERO,
            }
        }
    }
}

/// Conservative / moderate / maximum sizing from the remaining daily limit
pub fn recommend_safe_amounts(status: &SentinelStatus) -> SafeAmounts {
    let remaining = status.remaining.max(Decimal::ZERO);
    SafeAmounts {
        remaining_limit: remaining,
        conservative: (remaining * dec!(0.25)).normalize(),
        moderate: (remaining * dec!(0.50)).normalize(),
        maximum: (remaining * dec!(0.95)).normalize(),
    }
}
