//! Closed set of operator tools
//!
//! Each request variant maps to one capability of the collectors, the Sentinel
//! gate, the executor or the balance tracker. Swaps requested here pass through
//! the same gate as the autonomous loop.

use crate::chain::{check_or_reject, recommend_safe_amounts, SafetyGate, SwapExecutor, SwapRequest};
use crate::error::{BotError, Result};
use crate::sentiment::SentimentPipeline;
use crate::storage::{BalanceSnapshot, BalanceTracker};
use crate::types::{
    AggregateSignal, ApprovalResult, PoolInfo, SafeAmounts, SentinelStatus, TradeAction,
    TradeReceipt,
};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    MarketIntelligence,
    CheckSentinelApproval {
        amount: Decimal,
    },
    SentinelStatus,
    RecommendSafeAmount,
    PoolInfo,
    WalletBalances,
    ExecuteSwap {
        side: TradeAction,
        amount: Decimal,
        #[serde(default)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToolResponse {
    MarketIntelligence(AggregateSignal),
    Approval(ApprovalResult),
    SentinelStatus(SentinelStatus),
    SafeAmounts(SafeAmounts),
    Pool(PoolInfo),
    Balances { balances: Vec<BalanceSnapshot> },
    SwapRejected { approval: ApprovalResult },
    SwapSimulated { approval: ApprovalResult, expected_out: Decimal },
    SwapExecuted { approval: ApprovalResult, receipt: TradeReceipt },
}

pub struct Toolbox {
    pipeline: SentimentPipeline,
    gate: Arc<dyn SafetyGate>,
    executor: Option<Arc<dyn SwapExecutor>>,
    balances: Option<BalanceTracker>,
    tokens: Vec<(String, Address)>,
    slippage: Decimal,
}

impl Toolbox {
    pub fn new(pipeline: SentimentPipeline, gate: Arc<dyn SafetyGate>, slippage: Decimal) -> Self {
        Self {
            pipeline,
            gate,
            executor: None,
            balances: None,
            tokens: Vec::new(),
            slippage,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn SwapExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Balance tracker plus the ERC-20 tokens to report
    pub fn with_balances(mut self, tracker: BalanceTracker, tokens: Vec<(String, Address)>) -> Self {
        self.balances = Some(tracker);
        self.tokens = tokens;
        self
    }

    pub async fn dispatch(&self, request: ToolRequest) -> Result<ToolResponse> {
        match request {
            ToolRequest::MarketIntelligence => {
                Ok(ToolResponse::MarketIntelligence(self.pipeline.run().await))
            }
            ToolRequest::CheckSentinelApproval { amount } => {
                Ok(ToolResponse::Approval(check_or_reject(self.gate.as_ref(), amount).await))
            }
            ToolRequest::SentinelStatus => Ok(ToolResponse::SentinelStatus(self.gate.status().await?)),
            ToolRequest::RecommendSafeAmount => {
                let status = self.gate.status().await?;
                Ok(ToolResponse::SafeAmounts(recommend_safe_amounts(&status)))
            }
            ToolRequest::PoolInfo => Ok(ToolResponse::Pool(self.executor()?.reserves().await?)),
            ToolRequest::WalletBalances => {
                let tracker = self.balances.as_ref().ok_or_else(|| {
                    BotError::Config("wallet balances need chain.private_key".to_string())
                })?;
                let balances = tracker.all_balances(&self.tokens).await?;
                Ok(ToolResponse::Balances { balances })
            }
            ToolRequest::ExecuteSwap {
                side,
                amount,
                dry_run,
            } => self.execute_swap(side, amount, dry_run).await,
        }
    }

    fn executor(&self) -> Result<&Arc<dyn SwapExecutor>> {
        self.executor
            .as_ref()
            .ok_or_else(|| BotError::Config("swap executor needs chain.private_key".to_string()))
    }

    async fn execute_swap(&self, side: TradeAction, amount: Decimal, dry_run: bool) -> Result<ToolResponse> {
        if side == TradeAction::Hold {
            return Err(BotError::Execution("cannot swap on HOLD".to_string()));
        }
        if amount <= Decimal::ZERO {
            return Err(BotError::Execution(format!("swap amount must be positive, got {}", amount)));
        }

        let approval = check_or_reject(self.gate.as_ref(), amount).await;
        if !approval.approved {
            warn!("Sentinel rejected manual {} of {}: {}", side, amount, approval.reason);
            return Ok(ToolResponse::SwapRejected { approval });
        }

        let executor = self.executor()?;
        if dry_run {
            let expected_out = executor.quote(side, amount).await?;
            info!("Dry run {} of {}: expect {}", side, amount, expected_out);
            return Ok(ToolResponse::SwapSimulated {
                approval,
                expected_out,
            });
        }

        let receipt = executor.swap(SwapRequest::new(side, amount, self.slippage)).await?;
        Ok(ToolResponse::SwapExecuted { approval, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::amm::MockSwapExecutor;
    use crate::chain::sentinel::MockSafetyGate;
    use rust_decimal_macros::dec;

    fn gate(approved: bool) -> MockSafetyGate {
        let mut gate = MockSafetyGate::new();
        gate.expect_simulate_check().returning(move |_, _| {
            Ok(ApprovalResult {
                approved,
                reason: if approved { "OK" } else { "Paused by owner" }.to_string(),
                remaining_limit: dec!(0.5),
            })
        });
        gate.expect_status().returning(|| {
            Ok(SentinelStatus {
                spent: dec!(0.6),
                remaining: dec!(0.4),
                daily_limit: dec!(1),
                seconds_until_reset: 600,
                is_paused: false,
                tx_count: 6,
                x402_tx_count: 0,
            })
        });
        gate
    }

    fn toolbox(gate: MockSafetyGate, executor: Option<MockSwapExecutor>) -> Toolbox {
        let toolbox = Toolbox::new(SentimentPipeline::new(vec![]), Arc::new(gate), dec!(0.05));
        match executor {
            Some(executor) => toolbox.with_executor(Arc::new(executor)),
            None => toolbox,
        }
    }

    #[test]
    fn test_request_parses_from_json() {
        let request: ToolRequest =
            serde_json::from_str(r#"{"tool": "execute_swap", "side": "buy", "amount": "0.2"}"#)
                .unwrap();
        assert_eq!(
            request,
            ToolRequest::ExecuteSwap {
                side: TradeAction::Buy,
                amount: dec!(0.2),
                dry_run: false,
            }
        );

        let status: ToolRequest = serde_json::from_str(r#"{"tool": "sentinel_status"}"#).unwrap();
        assert_eq!(status, ToolRequest::SentinelStatus);
        assert!(serde_json::from_str::<ToolRequest>(r#"{"tool": "rm_rf"}"#).is_err());
    }

    #[tokio::test]
    async fn test_rejected_swap_never_reaches_executor() {
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(0);
        executor.expect_quote().times(0);

        let response = toolbox(gate(false), Some(executor))
            .dispatch(ToolRequest::ExecuteSwap {
                side: TradeAction::Buy,
                amount: dec!(0.1),
                dry_run: false,
            })
            .await
            .unwrap();

        match response {
            ToolResponse::SwapRejected { approval } => assert_eq!(approval.reason, "Paused by owner"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dry_run_swap_quotes_only() {
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(0);
        executor
            .expect_quote()
            .times(1)
            .returning(|_, amount| Ok(amount * dec!(9.5)));

        let response = toolbox(gate(true), Some(executor))
            .dispatch(ToolRequest::ExecuteSwap {
                side: TradeAction::Sell,
                amount: dec!(0.2),
                dry_run: true,
            })
            .await
            .unwrap();

        assert!(matches!(
            response,
            ToolResponse::SwapSimulated { expected_out, .. } if expected_out == dec!(1.9)
        ));
    }

    #[tokio::test]
    async fn test_swap_executes_after_approval() {
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(1).returning(|request| {
            Ok(TradeReceipt {
                tx_hash: "0x01".to_string(),
                amount_in: request.amount_in,
                amount_out: dec!(1),
                min_amount_out: dec!(0.95),
                gas_used: 100_000,
            })
        });

        let response = toolbox(gate(true), Some(executor))
            .dispatch(ToolRequest::ExecuteSwap {
                side: TradeAction::Buy,
                amount: dec!(0.1),
                dry_run: false,
            })
            .await
            .unwrap();
        assert!(matches!(response, ToolResponse::SwapExecuted { .. }));
    }

    #[tokio::test]
    async fn test_invalid_swaps_are_refused() {
        let tools = toolbox(gate(true), None);
        let hold = tools
            .dispatch(ToolRequest::ExecuteSwap {
                side: TradeAction::Hold,
                amount: dec!(0.1),
                dry_run: true,
            })
            .await;
        assert!(matches!(hold, Err(BotError::Execution(_))));

        let zero = tools
            .dispatch(ToolRequest::ExecuteSwap {
                side: TradeAction::Buy,
                amount: Decimal::ZERO,
                dry_run: true,
            })
            .await;
        assert!(zero.is_err());
    }

    #[tokio::test]
    async fn test_safe_amounts_from_status() {
        let response = toolbox(gate(true), None)
            .dispatch(ToolRequest::RecommendSafeAmount)
            .await
            .unwrap();
        match response {
            ToolResponse::SafeAmounts(safe) => {
                assert_eq!(safe.conservative, dec!(0.1));
                assert_eq!(safe.moderate, dec!(0.2));
                assert_eq!(safe.maximum, dec!(0.38));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pool_and_balances_need_signer() {
        let tools = toolbox(gate(true), None);
        assert!(matches!(
            tools.dispatch(ToolRequest::PoolInfo).await,
            Err(BotError::Config(_))
        ));
        assert!(matches!(
            tools.dispatch(ToolRequest::WalletBalances).await,
            Err(BotError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_market_intelligence_without_sources_is_hold() {
        let response = toolbox(gate(true), None)
            .dispatch(ToolRequest::MarketIntelligence)
            .await
            .unwrap();
        match response {
            ToolResponse::MarketIntelligence(signal) => {
                assert_eq!(signal.reason, "No data available")
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
