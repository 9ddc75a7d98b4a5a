//! Append-only decision journal

use crate::types::{AggregateSignal, CycleOutcome, TradeDecision};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const RULE: &str = "============================================================";

/// Plain text log with one block per decision cycle
#[derive(Debug, Clone)]
pub struct DecisionJournal {
    path: PathBuf,
}

impl DecisionJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        Self {
            path: PathBuf::from(expanded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a block. Write failures are logged and swallowed.
    pub async fn record(
        &self,
        signal: &AggregateSignal,
        decision: &TradeDecision,
        outcome: &CycleOutcome,
    ) {
        let entry = format_entry(signal, decision, outcome);
        if let Err(e) = self.append(&entry).await {
            warn!("Failed to write decision journal {}: {}", self.path.display(), e);
        } else {
            debug!("Journaled {} decision", outcome.label());
        }
    }

    async fn append(&self, entry: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await
    }
}

pub fn format_entry(
    signal: &AggregateSignal,
    decision: &TradeDecision,
    outcome: &CycleOutcome,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", RULE);
    let _ = writeln!(out, "Time: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Signal: {} ({})", signal.signal, signal.strength);
    let _ = writeln!(out, "Sentiment: {:.3}", signal.avg_sentiment);
    let _ = writeln!(out, "Trending: {}", signal.is_trending);
    let _ = writeln!(
        out,
        "Decision: {} (confidence: {:.2})",
        decision.action, decision.confidence
    );
    for vote in &decision.votes {
        let _ = writeln!(
            out,
            "  {}: {} ({:.2}) - {}",
            vote.agent,
            vote.vote.as_str(),
            vote.confidence,
            crate::llm::truncate(&vote.reasoning, 100)
        );
    }
    let _ = writeln!(out, "Reasoning: {}", decision.reasoning);
    let _ = writeln!(out, "Outcome: {}", describe_outcome(outcome));
    out
}

fn describe_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Paused { reason } => format!("paused ({})", reason),
        CycleOutcome::NoAction { .. } => "no action".to_string(),
        CycleOutcome::Rejected { approval, .. } => {
            format!("rejected by Sentinel: {}", approval.reason)
        }
        CycleOutcome::DryRun { approval, .. } => {
            format!("dry run, Sentinel approved ({})", approval.reason)
        }
        CycleOutcome::Executed { receipt, .. } => format!(
            "executed {} -> {} (tx {})",
            receipt.amount_in, receipt.amount_out, receipt.tx_hash
        ),
        CycleOutcome::ExecutionFailed { error, .. } => format!("execution failed: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApprovalResult, CouncilVote, Signal, TradeAction, Vote};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn signal() -> AggregateSignal {
        AggregateSignal {
            signal: Signal::WeakBuy,
            strength: 3,
            avg_sentiment: 0.412,
            is_trending: true,
            reason: "CoinGecko: 70% bullish".to_string(),
            sources: vec![],
            timestamp: Utc::now(),
        }
    }

    fn decision() -> TradeDecision {
        TradeDecision {
            action: TradeAction::Buy,
            confidence: 0.8,
            reasoning: "Council consensus: BUY".to_string(),
            votes: vec![CouncilVote {
                agent: "Risk Manager".to_string(),
                vote: Vote::Buy,
                confidence: 0.7,
                reasoning: "Limit has room".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_rejection_reason_is_journaled_verbatim() {
        let dir = TempDir::new().unwrap();
        let journal = DecisionJournal::new(dir.path().join("trade_log.txt"));
        let outcome = CycleOutcome::Rejected {
            decision: decision(),
            approval: ApprovalResult {
                approved: false,
                reason: "Daily limit exceeded".to_string(),
                remaining_limit: dec!(0),
            },
        };

        journal.record(&signal(), &decision(), &outcome).await;

        let text = std::fs::read_to_string(journal.path()).unwrap();
        assert!(text.contains("Signal: weak_buy (3)"));
        assert!(text.contains("Sentiment: 0.412"));
        assert!(text.contains("Trending: true"));
        assert!(text.contains("Decision: BUY (confidence: 0.80)"));
        assert!(text.contains("  Risk Manager: buy (0.70) - Limit has room"));
        assert!(text.contains("rejected by Sentinel: Daily limit exceeded"));
    }

    #[tokio::test]
    async fn test_entries_are_appended() {
        let dir = TempDir::new().unwrap();
        let journal = DecisionJournal::new(dir.path().join("trade_log.txt"));
        let outcome = CycleOutcome::NoAction {
            decision: TradeDecision::hold("Neutral"),
        };

        journal.record(&signal(), &TradeDecision::hold("Neutral"), &outcome).await;
        journal.record(&signal(), &TradeDecision::hold("Neutral"), &outcome).await;

        let text = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(text.matches(RULE).count(), 2);
        assert_eq!(text.matches("Outcome: no action").count(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let journal = DecisionJournal::new(dir.path().join("missing").join("log.txt"));
        let outcome = CycleOutcome::NoAction {
            decision: TradeDecision::hold("x"),
        };
        journal.record(&signal(), &TradeDecision::hold("x"), &outcome).await;
        assert!(!journal.path().exists());
    }
}
