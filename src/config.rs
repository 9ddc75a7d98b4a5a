//! Configuration management

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub sentiment: SentimentConfig,
    pub trading: TradingConfig,
    pub journal: JournalConfig,
    pub database: DatabaseConfig,
    pub llm: Option<LlmConfig>,
    pub dashboard: Option<DashboardConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Chain ID (338 for Cronos testnet)
    pub chain_id: u64,
    /// Private key for signing (hex, with or without 0x prefix)
    pub private_key: Option<String>,
    /// SentinelClamp contract address
    pub sentinel_address: Option<String>,
    /// AMM / router contract, also the `dapp` argument of the Sentinel check
    pub amm_address: Option<String>,
    /// Token bought on a BUY decision
    pub base_token: Option<String>,
    /// Token spent on a BUY decision
    pub quote_token: Option<String>,
    /// Gas token symbol used in balance reports
    pub native_symbol: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    /// RPC call timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// CoinGecko coin id
    pub coin_id: String,
    pub coingecko_url: String,
    pub reddit_url: String,
    pub reddit_query: String,
    pub subreddits: Vec<String>,
    pub cryptopanic_rss: String,
    pub google_news_url: String,
    pub news_query: String,
    /// Titles from CryptoPanic are kept only if they mention one of these
    pub news_keywords: Vec<String>,
    /// HTTP timeout per collector request, seconds
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Rules,
    Council,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub strategy: StrategyKind,
    /// Minutes between decision cycles
    pub cycle_interval_mins: u64,
    /// Scheduler polling interval in seconds
    pub poll_interval_secs: u64,
    /// Amount of the input token per trade
    pub trade_amount: Decimal,
    /// Slippage tolerance (0.05 = 5%)
    pub slippage_tolerance: Decimal,
    /// Minimum decision confidence to attempt a trade
    pub min_confidence: f64,
    /// Consecutive execution failures before trading pauses
    pub max_consecutive_failures: u32,
    /// Decisions kept in memory
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (gemini, deepseek, anthropic, openai, ollama, compatible)
    pub provider: String,
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Model name
    pub model: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Backend API base, e.g. http://localhost:3001/api
    pub base_url: String,
    #[serde(default = "default_dashboard_timeout")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.4
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_dashboard_timeout() -> u64 {
    5
}

impl Config {
    /// Load configuration from file, with `SENTINEL__SECTION__KEY` overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8"))?;
        let expanded = shellexpand::tilde(path_str);

        let settings = config::Config::builder()
            .add_source(config::File::with_name(expanded.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sentiment.subreddits")
                    .with_list_parse_key("sentiment.news_keywords")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "~/.config/cronos-sentinel-trader/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        anyhow::bail!("No configuration file found")
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://evm-t3.cronos.org".to_string(),
            chain_id: 338,
            private_key: None,
            sentinel_address: None,
            amm_address: None,
            base_token: None,
            quote_token: None,
            native_symbol: "TCRO".to_string(),
            base_symbol: "WCRO".to_string(),
            quote_symbol: "tUSD".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            coin_id: "crypto-com-chain".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            reddit_url: "https://www.reddit.com".to_string(),
            reddit_query: "Cronos CRO".to_string(),
            subreddits: vec![
                "CryptoCurrency".to_string(),
                "CronosOfficial".to_string(),
                "Crypto_com".to_string(),
            ],
            cryptopanic_rss: "https://cryptopanic.com/news/rss/".to_string(),
            google_news_url: "https://news.google.com/rss/search".to_string(),
            news_query: "CRO Cronos crypto".to_string(),
            news_keywords: vec![
                "CRO".to_string(),
                "Cronos".to_string(),
                "Crypto.com".to_string(),
            ],
            http_timeout_secs: 10,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Rules,
            cycle_interval_mins: 15,
            poll_interval_secs: 30,
            trade_amount: Decimal::new(1, 1),        // 0.1
            slippage_tolerance: Decimal::new(5, 2),  // 5%
            min_confidence: 0.65,
            max_consecutive_failures: 3,
            history_limit: 500,
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: "autonomous_trade_log.txt".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "balance_memory.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_match_testnet_bot() {
        let config = Config::default();
        assert_eq!(config.chain.chain_id, 338);
        assert_eq!(config.sentiment.coin_id, "crypto-com-chain");
        assert_eq!(config.sentiment.subreddits.len(), 3);
        assert_eq!(config.trading.strategy, StrategyKind::Rules);
        assert_eq!(config.trading.trade_amount, dec!(0.1));
        assert_eq!(config.trading.max_consecutive_failures, 3);
        assert!((config.trading.min_confidence - 0.65).abs() < f64::EPSILON);
        assert!(config.llm.is_none());
        assert!(config.dashboard.is_none());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let raw = r#"
            [chain]
            sentinel_address = "0x1111111111111111111111111111111111111111"

            [trading]
            strategy = "council"
            trade_amount = "0.25"

            [llm]
            provider = "gemini"
            api_key = "key"
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.trading.strategy, StrategyKind::Council);
        assert_eq!(config.trading.trade_amount, dec!(0.25));
        assert_eq!(config.trading.cycle_interval_mins, 15);
        assert_eq!(config.chain.rpc_url, "https://evm-t3.cronos.org");

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, "gemini");
        assert_eq!(llm.timeout_secs, 30);
        assert!((llm.temperature - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/sentinel-config.toml").unwrap();
        assert_eq!(config.journal.path, "autonomous_trade_log.txt");
    }
}
