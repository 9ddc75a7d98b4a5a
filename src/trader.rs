//! Autonomous decision cycle and scheduler
//!
//! One cycle: collect sentiment, decide, publish, then (if the decision is
//! actionable) ask the Sentinel gate and swap. A run of failed executions
//! pauses the trader until it is resumed.

use crate::chain::{check_or_reject, SafetyGate, SwapExecutor, SwapRequest};
use crate::config::TradingConfig;
use crate::decision::DecisionStrategy;
use crate::journal::DecisionJournal;
use crate::notify::DashboardNotifier;
use crate::sentiment::SentimentPipeline;
use crate::types::{AggregateSignal, CycleOutcome, Signal, TradeAction, TradeDecision};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

const PAUSE_REASON: &str = "Risk management";

/// Everything a cycle talks to
pub struct TraderContext {
    pub pipeline: SentimentPipeline,
    pub strategy: Box<dyn DecisionStrategy>,
    pub gate: Arc<dyn SafetyGate>,
    /// `None` when no signing key is configured; only dry runs work then
    pub executor: Option<Arc<dyn SwapExecutor>>,
    pub journal: DecisionJournal,
    pub dashboard: DashboardNotifier,
}

#[derive(Debug, Clone)]
pub struct TraderSettings {
    pub trade_amount: Decimal,
    pub slippage: Decimal,
    pub min_confidence: f64,
    pub max_consecutive_failures: u32,
    pub history_limit: usize,
    pub cycle_interval: Duration,
    pub poll_interval: Duration,
    pub dry_run: bool,
    pub base_symbol: String,
    pub quote_symbol: String,
}

impl TraderSettings {
    pub fn from_config(
        config: &TradingConfig,
        base_symbol: &str,
        quote_symbol: &str,
        dry_run: bool,
    ) -> Self {
        Self {
            trade_amount: config.trade_amount,
            slippage: config.slippage_tolerance,
            min_confidence: config.min_confidence,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            history_limit: config.history_limit.max(1),
            cycle_interval: Duration::from_secs(config.cycle_interval_mins * 60),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            dry_run,
            base_symbol: base_symbol.to_string(),
            quote_symbol: quote_symbol.to_string(),
        }
    }

    /// Token received for a side
    fn symbol_out(&self, side: TradeAction) -> &str {
        match side {
            TradeAction::Sell => &self.quote_symbol,
            _ => &self.base_symbol,
        }
    }
}

/// One remembered cycle
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub strength: i32,
    pub avg_sentiment: f64,
    pub is_trending: bool,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraderStats {
    pub decisions: usize,
    pub trades_executed: usize,
    pub rejections: usize,
    pub failures: usize,
    pub consecutive_failures: u32,
    pub paused: bool,
}

pub struct AutonomousTrader {
    ctx: TraderContext,
    settings: TraderSettings,
    is_active: bool,
    consecutive_failures: u32,
    history: Vec<DecisionRecord>,
    stats: TraderStats,
    /// Dashboard updates still in flight
    notifications: Vec<JoinHandle<()>>,
}

impl AutonomousTrader {
    pub fn new(ctx: TraderContext, settings: TraderSettings) -> Self {
        Self {
            ctx,
            settings,
            is_active: true,
            consecutive_failures: 0,
            history: Vec::new(),
            stats: TraderStats::default(),
            notifications: Vec::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.is_active
    }

    /// Manual resume after a risk pause
    pub fn resume(&mut self) {
        if !self.is_active {
            info!("Trading resumed");
        }
        self.is_active = true;
        self.consecutive_failures = 0;
    }

    pub fn history(&self) -> &[DecisionRecord] {
        &self.history
    }

    pub fn stats(&self) -> TraderStats {
        TraderStats {
            consecutive_failures: self.consecutive_failures,
            paused: !self.is_active,
            ..self.stats.clone()
        }
    }

    /// Run one full decision cycle
    pub async fn make_trading_decision(&mut self) -> CycleOutcome {
        info!("🤖 Decision cycle at {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));

        if !self.is_active {
            warn!("⏸️  Trading paused ({} consecutive failures)", self.consecutive_failures);
            return CycleOutcome::Paused {
                reason: PAUSE_REASON.to_string(),
            };
        }

        let signal = self.ctx.pipeline.run().await;
        let decision = self.ctx.strategy.decide(&signal).await;
        info!(
            "Decision ({}): {} with confidence {:.2}",
            self.ctx.strategy.name(),
            decision.action,
            decision.confidence
        );
        self.publish(&signal, &decision);

        let outcome = self.act(decision.clone()).await;
        self.ctx.journal.record(&signal, &decision, &outcome).await;
        self.remember(&signal, outcome.clone());
        outcome
    }

    async fn act(&mut self, decision: TradeDecision) -> CycleOutcome {
        if !decision.is_actionable(self.settings.min_confidence) {
            info!(
                "⏸️  No trade: {} (confidence {:.2}, threshold {:.2}) - {}",
                decision.action, decision.confidence, self.settings.min_confidence, decision.reasoning
            );
            return CycleOutcome::NoAction { decision };
        }

        let amount = self.settings.trade_amount;
        let approval = check_or_reject(self.ctx.gate.as_ref(), amount).await;
        if !approval.approved {
            warn!(
                "🛡️  Sentinel rejected {} of {}: {}",
                decision.action, amount, approval.reason
            );
            self.stats.rejections += 1;
            return CycleOutcome::Rejected { decision, approval };
        }
        info!(
            "🛡️  Sentinel approved {} (remaining limit {})",
            amount, approval.remaining_limit
        );

        if self.settings.dry_run {
            info!("🧪 Dry run: skipping {} of {}", decision.action, amount);
            return CycleOutcome::DryRun { decision, approval };
        }

        let Some(executor) = self.ctx.executor.clone() else {
            let error = "no swap executor configured".to_string();
            error!("❌ Trade failed: {}", error);
            self.record_failure();
            return CycleOutcome::ExecutionFailed { decision, error };
        };

        info!("💰 Executing {} of {}", decision.action, amount);
        let request = SwapRequest::new(decision.action, amount, self.settings.slippage);
        match executor.swap(request).await {
            Ok(receipt) => {
                info!("✅ Trade executed: {}", receipt.tx_hash);
                self.consecutive_failures = 0;
                self.stats.trades_executed += 1;

                if self.ctx.dashboard.is_enabled() {
                    let dashboard = self.ctx.dashboard.clone();
                    let symbol = self.settings.symbol_out(decision.action).to_string();
                    let (side, reason, sent) =
                        (decision.action, decision.reasoning.clone(), receipt.clone());
                    self.track(tokio::spawn(async move {
                        dashboard.trade_executed(side, &symbol, &sent, &reason).await;
                    }));
                }

                CycleOutcome::Executed { decision, receipt }
            }
            Err(e) => {
                error!("❌ Trade failed: {}", e);
                self.record_failure();
                CycleOutcome::ExecutionFailed {
                    decision,
                    error: e.to_string(),
                }
            }
        }
    }

    fn record_failure(&mut self) {
        self.stats.failures += 1;
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.settings.max_consecutive_failures {
            self.is_active = false;
            error!(
                "🚨 Pausing trading after {} consecutive failures",
                self.consecutive_failures
            );
        }
    }

    /// Dashboard updates run detached so a slow backend never delays a cycle
    fn publish(&mut self, signal: &AggregateSignal, decision: &TradeDecision) {
        if !self.ctx.dashboard.is_enabled() {
            return;
        }
        let dashboard = self.ctx.dashboard.clone();
        let (signal, decision) = (signal.clone(), decision.clone());
        self.track(tokio::spawn(async move {
            dashboard.sentiment_update(&signal).await;
            dashboard.council_votes(&decision).await;
            dashboard.agent_decision(&signal, &decision).await;
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.notifications.retain(|h| !h.is_finished());
        self.notifications.push(handle);
    }

    /// Wait for every dashboard update spawned so far
    pub async fn flush_notifications(&mut self) {
        for handle in self.notifications.drain(..) {
            if let Err(e) = handle.await {
                warn!("Dashboard update task failed: {}", e);
            }
        }
    }

    fn remember(&mut self, signal: &AggregateSignal, outcome: CycleOutcome) {
        self.stats.decisions += 1;
        self.history.push(DecisionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            signal: signal.signal,
            strength: signal.strength,
            avg_sentiment: signal.avg_sentiment,
            is_trending: signal.is_trending,
            outcome,
        });
        if self.history.len() > self.settings.history_limit {
            let excess = self.history.len() - self.settings.history_limit;
            self.history.drain(..excess);
        }
    }

    /// Run a cycle now, then whenever the cycle interval has elapsed, until Ctrl+C
    pub async fn run_forever(self) -> TraderStats {
        let (stop, shutdown) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("⏹️  Ctrl+C received, stopping after the current cycle");
                    let _ = stop.send(true);
                }
                Err(e) => error!("Cannot listen for Ctrl+C: {}", e),
            }
        });
        self.run_until(shutdown).await
    }

    /// Scheduler loop; returns once `shutdown` turns true. A request that
    /// arrives mid-cycle is honored as soon as that cycle finishes.
    pub async fn run_until(mut self, mut shutdown: watch::Receiver<bool>) -> TraderStats {
        info!(
            "🚀 Autonomous trader started: cycle every {:?}, polling every {:?}{}",
            self.settings.cycle_interval,
            self.settings.poll_interval,
            if self.settings.dry_run { " (dry run)" } else { "" }
        );

        self.make_trading_decision().await;
        let mut last_cycle = Instant::now();

        let mut poll = tokio::time::interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        let mut listening = true;
        while !*shutdown.borrow_and_update() {
            tokio::select! {
                _ = poll.tick() => {
                    if last_cycle.elapsed() >= self.settings.cycle_interval {
                        last_cycle = Instant::now();
                        self.make_trading_decision().await;
                    }
                }
                changed = shutdown.changed(), if listening => {
                    // Listener gone; keep polling
                    if changed.is_err() {
                        listening = false;
                    }
                }
            }
        }

        info!("⏹️  Stopping autonomous trader");
        self.flush_notifications().await;
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::amm::MockSwapExecutor;
    use crate::chain::sentinel::MockSafetyGate;
    use crate::decision::RuleTable;
    use crate::error::BotError;
    use crate::sentiment::MockSentimentCollector;
    use crate::types::{
        ApprovalResult, ReadingDetail, SentimentReading, SentimentSource, TradeReceipt,
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn collector(score: f64) -> MockSentimentCollector {
        let mut mock = MockSentimentCollector::new();
        mock.expect_source().return_const(SentimentSource::Coingecko);
        mock.expect_fetch().returning(move || {
            Some(SentimentReading::new(
                SentimentSource::Coingecko,
                score,
                100,
                ReadingDetail::Coingecko {
                    votes_up_pct: 50.0 + score * 50.0,
                    votes_down_pct: 50.0 - score * 50.0,
                },
            ))
        });
        mock.expect_is_trending().returning(|| Some(false));
        mock
    }

    fn approving_gate() -> MockSafetyGate {
        let mut gate = MockSafetyGate::new();
        gate.expect_simulate_check().returning(|_, _| {
            Ok(ApprovalResult {
                approved: true,
                reason: "Within daily limit".to_string(),
                remaining_limit: dec!(0.9),
            })
        });
        gate
    }

    fn settings(dry_run: bool) -> TraderSettings {
        TraderSettings::from_config(&TradingConfig::default(), "WCRO", "tUSD", dry_run)
    }

    fn trader(
        dir: &TempDir,
        collector: MockSentimentCollector,
        gate: MockSafetyGate,
        executor: Option<MockSwapExecutor>,
        dry_run: bool,
    ) -> AutonomousTrader {
        let ctx = TraderContext {
            pipeline: SentimentPipeline::new(vec![Box::new(collector)]),
            strategy: Box::new(RuleTable),
            gate: Arc::new(gate),
            executor: executor.map(|e| Arc::new(e) as Arc<dyn SwapExecutor>),
            journal: DecisionJournal::new(dir.path().join("trade_log.txt")),
            dashboard: DashboardNotifier::disabled(),
        };
        AutonomousTrader::new(ctx, settings(dry_run))
    }

    #[tokio::test]
    async fn test_hold_never_consults_gate() {
        let dir = TempDir::new().unwrap();
        let mut gate = MockSafetyGate::new();
        gate.expect_simulate_check().times(0);

        let mut trader = trader(&dir, collector(0.1), gate, None, false);
        let outcome = trader.make_trading_decision().await;

        assert!(matches!(outcome, CycleOutcome::NoAction { .. }));
        assert_eq!(trader.history().len(), 1);
        assert_eq!(trader.history()[0].signal, Signal::Hold);
    }

    #[tokio::test]
    async fn test_rejection_skips_executor() {
        let dir = TempDir::new().unwrap();
        let mut gate = MockSafetyGate::new();
        gate.expect_simulate_check().times(1).returning(|_, amount| {
            assert_eq!(amount, dec!(0.1));
            Ok(ApprovalResult {
                approved: false,
                reason: "Exceeds daily limit".to_string(),
                remaining_limit: dec!(0.05),
            })
        });
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(0);

        let mut trader = trader(&dir, collector(0.8), gate, Some(executor), false);
        let outcome = trader.make_trading_decision().await;

        match outcome {
            CycleOutcome::Rejected { decision, approval } => {
                assert_eq!(decision.action, TradeAction::Buy);
                assert_eq!(approval.reason, "Exceeds daily limit");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(trader.stats().rejections, 1);
        assert_eq!(trader.stats().consecutive_failures, 0);

        let journal = std::fs::read_to_string(dir.path().join("trade_log.txt")).unwrap();
        assert!(journal.contains("Exceeds daily limit"));
    }

    #[tokio::test]
    async fn test_gate_error_is_treated_as_rejection() {
        let dir = TempDir::new().unwrap();
        let mut gate = MockSafetyGate::new();
        gate.expect_simulate_check()
            .returning(|_, _| Err(BotError::Chain("rpc timeout".to_string())));
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(0);

        let mut trader = trader(&dir, collector(-0.8), gate, Some(executor), false);
        let outcome = trader.make_trading_decision().await;
        assert_eq!(outcome.label(), "rejected");
    }

    #[tokio::test]
    async fn test_dry_run_stops_after_approval() {
        let dir = TempDir::new().unwrap();
        let mut executor = MockSwapExecutor::new();
        executor.expect_swap().times(0);

        let mut trader = trader(&dir, collector(0.8), approving_gate(), Some(executor), true);
        let outcome = trader.make_trading_decision().await;
        assert!(matches!(outcome, CycleOutcome::DryRun { .. }));
    }

    #[tokio::test]
    async fn test_successful_swap_resets_failures() {
        let dir = TempDir::new().unwrap();
        let mut executor = MockSwapExecutor::new();
        let mut seq = mockall::Sequence::new();
        executor
            .expect_swap()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(BotError::Execution("swap reverted: K".to_string())));
        executor
            .expect_swap()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert_eq!(request.side, TradeAction::Sell);
                assert_eq!(request.slippage, dec!(0.05));
                Ok(TradeReceipt {
                    tx_hash: "0xfeed".to_string(),
                    amount_in: request.amount_in,
                    amount_out: dec!(0.01),
                    min_amount_out: dec!(0.0095),
                    gas_used: 90_000,
                })
            });

        let mut trader = trader(&dir, collector(-0.8), approving_gate(), Some(executor), false);

        let first = trader.make_trading_decision().await;
        assert_eq!(first.label(), "execution_failed");
        assert_eq!(trader.stats().consecutive_failures, 1);

        let second = trader.make_trading_decision().await;
        assert_eq!(second.label(), "executed");
        assert_eq!(trader.stats().consecutive_failures, 0);
        assert_eq!(trader.stats().trades_executed, 1);
    }

    #[tokio::test]
    async fn test_three_failures_pause_trading() {
        let dir = TempDir::new().unwrap();
        let mut source = MockSentimentCollector::new();
        source.expect_source().return_const(SentimentSource::Coingecko);
        source.expect_fetch().times(3).returning(|| {
            Some(SentimentReading::new(
                SentimentSource::Coingecko,
                0.9,
                10,
                ReadingDetail::Coingecko {
                    votes_up_pct: 95.0,
                    votes_down_pct: 5.0,
                },
            ))
        });
        source.expect_is_trending().times(3).returning(|| None);

        let mut executor = MockSwapExecutor::new();
        executor
            .expect_swap()
            .times(3)
            .returning(|_| Err(BotError::Execution("swap failed: nonce too low".to_string())));

        let mut trader = trader(&dir, source, approving_gate(), Some(executor), false);
        for _ in 0..3 {
            let outcome = trader.make_trading_decision().await;
            assert_eq!(outcome.label(), "execution_failed");
        }
        assert!(trader.is_paused());

        let paused = trader.make_trading_decision().await;
        assert_eq!(
            paused,
            CycleOutcome::Paused {
                reason: "Risk management".to_string()
            }
        );
        assert_eq!(trader.history().len(), 3);

        trader.resume();
        assert!(!trader.is_paused());
        assert_eq!(trader.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_missing_executor_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let mut trader = trader(&dir, collector(0.8), approving_gate(), None, false);

        let outcome = trader.make_trading_decision().await;
        match outcome {
            CycleOutcome::ExecutionFailed { error, .. } => {
                assert_eq!(error, "no swap executor configured")
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(trader.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let mut trader = trader(&dir, collector(0.0), MockSafetyGate::new(), None, false);
        trader.settings.history_limit = 2;

        for _ in 0..5 {
            trader.make_trading_decision().await;
        }
        assert_eq!(trader.history().len(), 2);
        assert_eq!(trader.stats().decisions, 5);
    }

    #[tokio::test]
    async fn test_stop_request_ends_scheduler_after_current_cycle() {
        let dir = TempDir::new().unwrap();
        let mut source = MockSentimentCollector::new();
        source.expect_source().return_const(SentimentSource::Coingecko);
        source.expect_fetch().times(1).returning(|| None);
        source.expect_is_trending().times(1).returning(|| None);

        let trader = trader(&dir, source, MockSafetyGate::new(), None, true);
        let (stop, shutdown) = watch::channel(false);
        stop.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), trader.run_until(shutdown))
            .await
            .expect("scheduler should stop");
        assert_eq!(stats.decisions, 1);
    }

    #[tokio::test]
    async fn test_flush_delivers_dashboard_updates() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/market/sentiment/update"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/agent/decision"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut trader = trader(&dir, collector(0.1), MockSafetyGate::new(), None, false);
        trader.ctx.dashboard =
            DashboardNotifier::new(format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();

        trader.make_trading_decision().await;
        trader.flush_notifications().await;

        server.verify().await;
        assert!(trader.notifications.is_empty());
    }
}
