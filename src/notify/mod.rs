//! Dashboard notification module
//!
//! Pushes sentiment, council votes, decisions and executed trades to the
//! dashboard backend. Every call is fire-and-forget: failures are logged and
//! never interrupt a decision cycle.


use crate::config::DashboardConfig;
use crate::decision::CouncilResult;
use crate::error::Result;
use crate::types::{AggregateSignal, TradeAction, TradeDecision, TradeReceipt};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Dashboard backend notifier
#[derive(Clone)]
pub struct DashboardNotifier {
    http: Client,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct SourceSummary<'a> {
    source: String,
    score: f64,
    sample_size: usize,
    detail: &'a crate::types::ReadingDetail,
}

impl DashboardNotifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled: true,
        })
    }

    pub fn from_config(config: Option<&DashboardConfig>) -> Result<Self> {
        match config {
            Some(c) => Self::new(c.base_url.clone(), Duration::from_secs(c.timeout_secs)),
            None => Ok(Self::disabled()),
        }
    }

    /// Create a disabled notifier (for when no dashboard is configured)
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            base_url: String::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// POST a JSON body, logging any failure
    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> bool {
        if !self.enabled {
            return false;
        }

        let url = format!("{}{}", self.base_url, path);
        match self.http.post(&url).json(body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Dashboard {} returned {}", path, response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Dashboard {} unreachable: {}", path, e);
                false
            }
        }
    }

    /// Latest aggregate sentiment
    pub async fn sentiment_update(&self, signal: &AggregateSignal) -> bool {
        let sources: Vec<SourceSummary<'_>> = signal
            .sources
            .iter()
            .map(|r| SourceSummary {
                source: r.source.to_string(),
                score: r.score,
                sample_size: r.sample_size,
                detail: &r.detail,
            })
            .collect();

        let body = json!({
            "signal": signal.signal,
            "score": signal.avg_sentiment,
            "strength": signal.strength,
            "sources": sources,
            "is_trending": signal.is_trending,
            "reason": signal.reason,
            "timestamp": signal.timestamp.to_rfc3339(),
        });
        self.post("/market/sentiment/update", &body).await
    }

    /// Council ballots; skipped when the decision carries no votes
    pub async fn council_votes(&self, decision: &TradeDecision) -> bool {
        if decision.votes.is_empty() {
            return false;
        }
        let result = CouncilResult::from_votes(decision.votes.clone());

        let body = json!({
            "votes": result.votes,
            "consensus": result.consensus,
            "confidence": result.confidence,
            "agreement": result.agreement,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.post("/council/votes", &body).await
    }

    pub async fn agent_decision(&self, signal: &AggregateSignal, decision: &TradeDecision) -> bool {
        let body = json!({
            "market_data": format!(
                "Signal: {}, Decision: {}, Confidence: {:.2}",
                signal.signal, decision.action, decision.confidence
            ),
            "sentinel_status": "Active monitoring",
            "decision": decision.action.to_string(),
            "reason": decision.reasoning,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.post("/agent/decision", &body).await
    }

    /// Broadcast a confirmed autonomous trade
    pub async fn trade_executed(
        &self,
        side: TradeAction,
        symbol: &str,
        receipt: &TradeReceipt,
        reason: &str,
    ) -> bool {
        let now = Utc::now();
        let body = json!({
            "id": format!("ai_trade_{}", now.timestamp()),
            "type": "autonomous",
            "symbol": symbol,
            "amount": receipt.amount_in,
            "side": side,
            "status": "executed",
            "txHash": receipt.tx_hash,
            "executedAmount": receipt.amount_out,
            "agent": "ai_autonomous",
            "realTransaction": true,
            "reason": reason,
            "timestamp": now.to_rfc3339(),
        });
        self.post("/trades/manual", &body).await
    }
}
