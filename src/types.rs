//! Core domain types shared across the decision pipeline

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a sentiment reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentSource {
    Coingecko,
    Reddit,
    News,
}

impl fmt::Display for SentimentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SentimentSource::Coingecko => "coingecko",
            SentimentSource::Reddit => "reddit",
            SentimentSource::News => "news",
        };
        f.write_str(name)
    }
}

/// Confidence label the news model attaches to its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsConfidence {
    #[default]
    Low,
    Medium,
    High,
}

impl NewsConfidence {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => NewsConfidence::High,
            "medium" => NewsConfidence::Medium,
            _ => NewsConfidence::Low,
        }
    }
}

/// Source-specific metadata carried alongside a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadingDetail {
    Coingecko {
        votes_up_pct: f64,
        votes_down_pct: f64,
    },
    Reddit {
        posts_analyzed: usize,
        subreddits: Vec<String>,
    },
    News {
        confidence: NewsConfidence,
        reasoning: String,
        headlines: Vec<String>,
        /// No headlines, or the LLM call failed; the score is a placeholder
        #[serde(default)]
        failed: bool,
    },
}

/// One normalized reading produced by a collector per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub source: SentimentSource,
    /// Sentiment in [-1.0, 1.0]
    pub score: f64,
    pub sample_size: usize,
    pub captured_at: DateTime<Utc>,
    pub detail: ReadingDetail,
}

impl SentimentReading {
    pub fn new(source: SentimentSource, score: f64, sample_size: usize, detail: ReadingDetail) -> Self {
        Self {
            source,
            score: clamp_score(score),
            sample_size,
            captured_at: Utc::now(),
            detail,
        }
    }

    /// Error record kept for the report but left out of the mean
    pub fn is_failure(&self) -> bool {
        matches!(self.detail, ReadingDetail::News { failed: true, .. })
    }
}

/// Clamp to [-1, 1], mapping NaN to neutral
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}

/// Discrete directional recommendation derived from aggregate sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    StrongBuy,
    WeakBuy,
    Hold,
    WeakSell,
    StrongSell,
}

impl Signal {
    /// Strength before any trending boost
    pub fn base_strength(self) -> i32 {
        match self {
            Signal::StrongBuy => 3,
            Signal::WeakBuy => 2,
            Signal::Hold => 0,
            Signal::WeakSell => -2,
            Signal::StrongSell => -3,
        }
    }

    /// -1, 0 or 1
    pub fn direction(self) -> i32 {
        self.base_strength().signum()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::StrongBuy => "strong_buy",
            Signal::WeakBuy => "weak_buy",
            Signal::Hold => "hold",
            Signal::WeakSell => "weak_sell",
            Signal::StrongSell => "strong_sell",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregator output for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSignal {
    pub signal: Signal,
    /// Sign always matches `signal.direction()`
    pub strength: i32,
    pub avg_sentiment: f64,
    pub is_trending: bool,
    pub reason: String,
    pub sources: Vec<SentimentReading>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

/// Five-point council vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Vote {
    /// Likert score, 1 (strong_sell) ..= 5 (strong_buy)
    pub fn score(self) -> u8 {
        match self {
            Vote::StrongSell => 1,
            Vote::Sell => 2,
            Vote::Hold => 3,
            Vote::Buy => 4,
            Vote::StrongBuy => 5,
        }
    }

    /// Unknown words count as hold
    pub fn parse(word: &str) -> Self {
        match word.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "strong_buy" => Vote::StrongBuy,
            "buy" => Vote::Buy,
            "sell" => Vote::Sell,
            "strong_sell" => Vote::StrongSell,
            _ => Vote::Hold,
        }
    }

    pub fn action(self) -> TradeAction {
        match self {
            Vote::StrongBuy | Vote::Buy => TradeAction::Buy,
            Vote::Hold => TradeAction::Hold,
            Vote::Sell | Vote::StrongSell => TradeAction::Sell,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Vote::StrongSell => "strong_sell",
            Vote::Sell => "sell",
            Vote::Hold => "hold",
            Vote::Buy => "buy",
            Vote::StrongBuy => "strong_buy",
        }
    }
}

/// One persona's ballot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilVote {
    pub agent: String,
    pub vote: Vote,
    /// [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

/// Decision layer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub action: TradeAction,
    /// [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    /// Empty for the rule table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub votes: Vec<CouncilVote>,
}

impl TradeDecision {
    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
            votes: Vec::new(),
        }
    }

    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.action != TradeAction::Hold && self.confidence >= min_confidence
    }
}

/// Sentinel `simulateCheck` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub approved: bool,
    pub reason: String,
    pub remaining_limit: Decimal,
}

/// Sentinel `getStatus` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelStatus {
    pub spent: Decimal,
    pub remaining: Decimal,
    pub daily_limit: Decimal,
    pub seconds_until_reset: u64,
    pub is_paused: bool,
    pub tx_count: u64,
    pub x402_tx_count: u64,
}

impl SentinelStatus {
    pub fn percentage_used(&self) -> Decimal {
        if self.daily_limit.is_zero() {
            Decimal::ZERO
        } else {
            self.spent / self.daily_limit * Decimal::ONE_HUNDRED
        }
    }
}

/// Manual sizing hints derived from the remaining daily limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeAmounts {
    pub remaining_limit: Decimal,
    pub conservative: Decimal,
    pub moderate: Decimal,
    pub maximum: Decimal,
}

/// Result of a confirmed swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub tx_hash: String,
    pub amount_in: Decimal,
    /// Quoted output at submission time
    pub amount_out: Decimal,
    pub min_amount_out: Decimal,
    pub gas_used: u64,
}

/// AMM pool snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub reserve_base: Decimal,
    pub reserve_quote: Decimal,
    /// Quote per base
    pub price: Decimal,
}

/// Terminal state of one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CycleOutcome {
    Paused {
        reason: String,
    },
    NoAction {
        decision: TradeDecision,
    },
    Rejected {
        decision: TradeDecision,
        approval: ApprovalResult,
    },
    DryRun {
        decision: TradeDecision,
        approval: ApprovalResult,
    },
    Executed {
        decision: TradeDecision,
        receipt: TradeReceipt,
    },
    ExecutionFailed {
        decision: TradeDecision,
        error: String,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Paused { .. } => "paused",
            CycleOutcome::NoAction { .. } => "no_action",
            CycleOutcome::Rejected { .. } => "rejected",
            CycleOutcome::DryRun { .. } => "dry_run",
            CycleOutcome::Executed { .. } => "executed",
            CycleOutcome::ExecutionFailed { .. } => "execution_failed",
        }
    }

    pub fn decision(&self) -> Option<&TradeDecision> {
        match self {
            CycleOutcome::Paused { .. } => None,
            CycleOutcome::NoAction { decision }
            | CycleOutcome::Rejected { decision, .. }
            | CycleOutcome::DryRun { decision, .. }
            | CycleOutcome::Executed { decision, .. }
            | CycleOutcome::ExecutionFailed { decision, .. } => Some(decision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reading_score_is_clamped() {
        let reading = SentimentReading::new(
            SentimentSource::News,
            1.7,
            3,
            ReadingDetail::News {
                confidence: NewsConfidence::High,
                reasoning: "x".into(),
                headlines: vec![],
                failed: false,
            },
        );
        assert_eq!(reading.score, 1.0);
        assert!(!reading.is_failure());
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(-4.0), -1.0);
    }

    #[test]
    fn test_signal_strength_sign_matches_direction() {
        for signal in [
            Signal::StrongBuy,
            Signal::WeakBuy,
            Signal::Hold,
            Signal::WeakSell,
            Signal::StrongSell,
        ] {
            assert_eq!(signal.base_strength().signum(), signal.direction());
        }
    }

    #[test]
    fn test_signal_serialization() {
        assert_eq!(serde_json::to_string(&Signal::StrongBuy).unwrap(), "\"strong_buy\"");
        assert_eq!(serde_json::to_string(&Signal::WeakSell).unwrap(), "\"weak_sell\"");
    }

    #[test]
    fn test_vote_parse_and_score() {
        assert_eq!(Vote::parse("STRONG_BUY"), Vote::StrongBuy);
        assert_eq!(Vote::parse(" strong sell "), Vote::StrongSell);
        assert_eq!(Vote::parse("buy"), Vote::Buy);
        assert_eq!(Vote::parse("maybe"), Vote::Hold);
        assert_eq!(Vote::StrongSell.score(), 1);
        assert_eq!(Vote::StrongBuy.score(), 5);
        assert_eq!(Vote::Sell.action(), TradeAction::Sell);
    }

    #[test]
    fn test_news_confidence_parse() {
        assert_eq!(NewsConfidence::parse("HIGH"), NewsConfidence::High);
        assert_eq!(NewsConfidence::parse("medium"), NewsConfidence::Medium);
        assert_eq!(NewsConfidence::parse("???"), NewsConfidence::Low);
    }

    #[test]
    fn test_decision_actionable() {
        let mut decision = TradeDecision::hold("nothing");
        assert!(!decision.is_actionable(0.0));

        decision.action = TradeAction::Buy;
        decision.confidence = 0.64;
        assert!(!decision.is_actionable(0.65));
        decision.confidence = 0.65;
        assert!(decision.is_actionable(0.65));
    }

    #[test]
    fn test_paused_outcome_serializes_with_action_tag() {
        let outcome = CycleOutcome::Paused {
            reason: "Risk management".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["action"], "paused");
        assert_eq!(json["reason"], "Risk management");
        assert!(outcome.decision().is_none());
    }

    #[test]
    fn test_sentinel_status_percentage() {
        let status = SentinelStatus {
            spent: dec!(0.25),
            remaining: dec!(0.75),
            daily_limit: dec!(1),
            seconds_until_reset: 100,
            is_paused: false,
            tx_count: 2,
            x402_tx_count: 0,
        };
        assert_eq!(status.percentage_used(), dec!(25));
    }
}
