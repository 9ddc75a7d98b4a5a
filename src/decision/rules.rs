//! Deterministic signal → action table

use super::DecisionStrategy;
use crate::types::{AggregateSignal, Signal, TradeAction, TradeDecision};
use async_trait::async_trait;

/// Strength at which the rule table is fully confident
const FULL_CONFIDENCE_STRENGTH: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTable;

impl RuleTable {
    pub fn evaluate(&self, signal: &AggregateSignal) -> TradeDecision {
        let action = match signal.signal {
            Signal::StrongBuy | Signal::WeakBuy => TradeAction::Buy,
            Signal::StrongSell | Signal::WeakSell => TradeAction::Sell,
            Signal::Hold => TradeAction::Hold,
        };

        let confidence = (signal.strength.abs() as f64 / FULL_CONFIDENCE_STRENGTH).min(1.0);

        TradeDecision {
            action,
            confidence,
            reasoning: format!(
                "{} (strength {}, sentiment {:.3}): {}",
                signal.signal, signal.strength, signal.avg_sentiment, signal.reason
            ),
            votes: Vec::new(),
        }
    }
}

#[async_trait]
impl DecisionStrategy for RuleTable {
    async fn decide(&self, signal: &AggregateSignal) -> TradeDecision {
        self.evaluate(signal)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
