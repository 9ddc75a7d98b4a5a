//! Cronos Sentinel Trader
//!
//! Sentiment-driven autonomous trading agent gated by the SentinelClamp contract.

use clap::{Parser, Subcommand};
use cronos_sentinel_trader::{
    chain::{self, recommend_safe_amounts, AmmExecutor, SafetyGate, SentinelGate, SwapExecutor},
    config::Config,
    decision::strategy_from_config,
    journal::DecisionJournal,
    llm::{LlmClient, LlmModel},
    notify::DashboardNotifier,
    sentiment::SentimentPipeline,
    storage::{BalanceMemory, BalanceTracker},
    tools::{ToolRequest, Toolbox},
    trader::{AutonomousTrader, TraderContext, TraderSettings},
};
use ethers::types::Address;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cronos-sentinel-trader")]
#[command(about = "Sentiment-driven trading agent with an on-chain spending limit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the autonomous trader
    Run {
        /// Stop after the Sentinel check (no swaps are sent)
        #[arg(long)]
        dry_run: bool,
        /// Run a single decision cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Collect sentiment and print the aggregate signal
    Sentiment,
    /// Show Sentinel spending status and safe trade sizes
    Status,
    /// Show AMM pool reserves
    Pool,
    /// Dispatch one tool request given as JSON
    Tool {
        /// e.g. '{"tool": "check_sentinel_approval", "amount": "0.1"}'
        request: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run, once } => run_trader(config, dry_run, once).await,
        Commands::Sentiment => show_sentiment(config).await,
        Commands::Status => show_status(config).await,
        Commands::Pool => show_pool(config).await,
        Commands::Tool { request } => run_tool(config, &request).await,
    }
}

fn llm_client(config: &Config) -> anyhow::Result<Option<Arc<dyn LlmClient>>> {
    match &config.llm {
        Some(llm) => {
            let model = LlmModel::from_config(llm)?;
            tracing::info!("LLM provider: {}", model.name());
            Ok(Some(Arc::new(model)))
        }
        None => Ok(None),
    }
}

fn has_signer(config: &Config) -> bool {
    config
        .chain
        .private_key
        .as_deref()
        .is_some_and(|k| !k.is_empty())
}

fn swap_executor(config: &Config) -> anyhow::Result<Option<Arc<dyn SwapExecutor>>> {
    if !has_signer(config) {
        return Ok(None);
    }
    let client = chain::signer_client(&config.chain)?;
    Ok(Some(Arc::new(AmmExecutor::from_config(&config.chain, client)?)))
}

async fn run_trader(config: Config, dry_run: bool, once: bool) -> anyhow::Result<()> {
    tracing::info!("Starting Cronos Sentinel trader");

    if dry_run {
        tracing::warn!("Running in DRY RUN mode - no swaps will be sent");
    }

    let executor = swap_executor(&config)?;
    if executor.is_none() && !dry_run {
        anyhow::bail!("live trading requires chain.private_key (or pass --dry-run)");
    }

    let llm = llm_client(&config)?;
    let ctx = TraderContext {
        pipeline: SentimentPipeline::from_config(&config.sentiment, llm.clone())?,
        strategy: strategy_from_config(&config.trading, llm)?,
        gate: Arc::new(SentinelGate::from_config(&config.chain)?),
        executor,
        journal: DecisionJournal::new(&config.journal.path),
        dashboard: DashboardNotifier::from_config(config.dashboard.as_ref())?,
    };
    let settings = TraderSettings::from_config(
        &config.trading,
        &config.chain.base_symbol,
        &config.chain.quote_symbol,
        dry_run,
    );
    let mut trader = AutonomousTrader::new(ctx, settings);

    if once {
        let outcome = trader.make_trading_decision().await;
        trader.flush_notifications().await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let stats = trader.run_forever().await;

    println!("\n📊 Session Summary\n");
    println!("Decisions made:  {}", stats.decisions);
    println!("Trades executed: {}", stats.trades_executed);
    println!("Rejections:      {}", stats.rejections);
    println!("Failures:        {}", stats.failures);
    println!("Paused:          {}", if stats.paused { "yes" } else { "no" });
    println!("✅ Shutdown complete");

    Ok(())
}

async fn show_sentiment(config: Config) -> anyhow::Result<()> {
    let pipeline = SentimentPipeline::from_config(&config.sentiment, llm_client(&config)?)?;
    let signal = pipeline.run().await;

    println!("\n📈 Market Sentiment: {}\n", config.sentiment.coin_id);
    println!("{:<12} {:>8} {:>8}", "Source", "Score", "Samples");
    println!("{}", "-".repeat(30));
    for reading in &signal.sources {
        println!(
            "{:<12} {:>8.3} {:>8}",
            reading.source.to_string(),
            reading.score,
            reading.sample_size
        );
    }

    println!("\nSignal:    {} (strength {})", signal.signal, signal.strength);
    println!("Average:   {:.3}", signal.avg_sentiment);
    println!("Trending:  {}", if signal.is_trending { "🔥 yes" } else { "no" });
    println!("Reason:    {}", signal.reason);

    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let gate = SentinelGate::from_config(&config.chain)?;
    let status = gate.status().await?;
    let safe = recommend_safe_amounts(&status);

    println!("\n🛡️  Sentinel Status ({:?})\n", gate.address());
    println!("Daily limit:   {}", status.daily_limit);
    println!("Spent today:   {} ({:.1}%)", status.spent, status.percentage_used());
    println!("Remaining:     {}", status.remaining);
    println!("Resets in:     {} min", status.seconds_until_reset / 60);
    println!("Paused:        {}", if status.is_paused { "⏸️  yes" } else { "no" });
    println!("Transactions:  {} ({} x402)", status.tx_count, status.x402_tx_count);

    println!("\nSafe trade sizes:");
    println!("  Conservative (25%): {}", safe.conservative);
    println!("  Moderate (50%):     {}", safe.moderate);
    println!("  Maximum (95%):      {}", safe.maximum);

    Ok(())
}

async fn show_pool(config: Config) -> anyhow::Result<()> {
    let executor = swap_executor(&config)?
        .ok_or_else(|| anyhow::anyhow!("pool queries need chain.private_key"))?;
    let pool = executor.reserves().await?;

    println!("\n💧 AMM Pool\n");
    println!("{} reserve: {}", config.chain.base_symbol, pool.reserve_base);
    println!("{} reserve: {}", config.chain.quote_symbol, pool.reserve_quote);
    println!(
        "Price:       {} {} per {}",
        pool.price, config.chain.quote_symbol, config.chain.base_symbol
    );

    Ok(())
}

async fn run_tool(config: Config, raw: &str) -> anyhow::Result<()> {
    let request: ToolRequest = serde_json::from_str(raw)?;

    let pipeline = SentimentPipeline::from_config(&config.sentiment, llm_client(&config)?)?;
    let gate = Arc::new(SentinelGate::from_config(&config.chain)?);
    let mut toolbox = Toolbox::new(pipeline, gate, config.trading.slippage_tolerance);

    if has_signer(&config) {
        let client = chain::signer_client(&config.chain)?;
        let db_path = shellexpand::tilde(&config.database.path).into_owned();
        let memory = BalanceMemory::connect(&db_path).await?;
        let tracker = BalanceTracker::new(client.clone(), memory, &config.chain.native_symbol);
        toolbox = toolbox
            .with_executor(Arc::new(AmmExecutor::from_config(&config.chain, client)?))
            .with_balances(tracker, token_list(&config)?);
    }

    let response = toolbox.dispatch(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

fn token_list(config: &Config) -> anyhow::Result<Vec<(String, Address)>> {
    let mut tokens = Vec::new();
    if let Some(base) = config.chain.base_token.as_deref() {
        let address = chain::parse_address("chain.base_token", Some(base))?;
        tokens.push((config.chain.base_symbol.clone(), address));
    }
    if let Some(quote) = config.chain.quote_token.as_deref() {
        let address = chain::parse_address("chain.quote_token", Some(quote))?;
        tokens.push((config.chain.quote_symbol.clone(), address));
    }
    Ok(tokens)
}
