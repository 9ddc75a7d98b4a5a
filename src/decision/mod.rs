//! Trade decision layer
//!
//! Turns an [`AggregateSignal`] into a [`TradeDecision`]. Two strategies are
//! available: a deterministic rule table and an LLM council of three personas.

pub mod council;
pub mod rules;


pub use council::{Council, CouncilResult, Persona};
pub use rules::RuleTable;

use crate::config::{StrategyKind, TradingConfig};
use crate::error::{BotError, Result};
use crate::llm::LlmClient;
use crate::types::{AggregateSignal, TradeDecision};
use async_trait::async_trait;
use std::sync::Arc;

/// Maps a sentiment signal to a trade decision
#[async_trait]
pub trait DecisionStrategy: Send + Sync {
    async fn decide(&self, signal: &AggregateSignal) -> TradeDecision;

    fn name(&self) -> &str;
}

/// Build the configured strategy; the council needs an LLM
pub fn strategy_from_config(
    config: &TradingConfig,
    llm: Option<Arc<dyn LlmClient>>,
) -> Result<Box<dyn DecisionStrategy>> {
    match config.strategy {
        StrategyKind::Rules => Ok(Box::new(RuleTable)),
        StrategyKind::Council => {
            let llm = llm.ok_or_else(|| {
                BotError::Config("council strategy requires an [llm] section".to_string())
            })?;
            Ok(Box::new(Council::new(llm)))
        }
    }
}
