//! CoinGecko community votes and trending list

use super::SentimentCollector;
use crate::config::SentimentConfig;
use crate::error::{BotError, Result};
use crate::types::{ReadingDetail, SentimentReading, SentimentSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CoinResponse {
    sentiment_votes_up_percentage: Option<f64>,
    sentiment_votes_down_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
}

/// Community sentiment votes for one coin
pub struct CoinGeckoCollector {
    http: Client,
    base_url: String,
    coin_id: String,
}

impl CoinGeckoCollector {
    pub fn new(base_url: impl Into<String>, coin_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            coin_id: coin_id.into(),
        })
    }

    pub fn from_config(config: &SentimentConfig) -> Result<Self> {
        Self::new(
            config.coingecko_url.clone(),
            config.coin_id.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    pub fn coin_id(&self) -> &str {
        &self.coin_id
    }

    async fn fetch_votes(&self) -> Result<SentimentReading> {
        let url = format!("{}/coins/{}", self.base_url, self.coin_id);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("localization", "false"),
                ("tickers", "false"),
                ("community_data", "true"),
                ("developer_data", "false"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!("CoinGecko returned {}", resp.status())));
        }

        let coin: CoinResponse = resp.json().await?;
        let up = coin.sentiment_votes_up_percentage.unwrap_or(50.0);
        let down = coin.sentiment_votes_down_percentage.unwrap_or(50.0);

        Ok(SentimentReading::new(
            SentimentSource::Coingecko,
            vote_score(up),
            1,
            ReadingDetail::Coingecko {
                votes_up_pct: up,
                votes_down_pct: down,
            },
        ))
    }

    async fn fetch_trending(&self) -> Result<bool> {
        let url = format!("{}/search/trending", self.base_url);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!("CoinGecko trending returned {}", resp.status())));
        }

        let trending: TrendingResponse = resp.json().await?;
        debug!("{} coins trending on CoinGecko", trending.coins.len());
        Ok(trending.coins.iter().any(|c| c.item.id == self.coin_id))
    }

    /// Whether the coin is on the trending list; `None` when the check failed
    pub async fn trending(&self) -> Option<bool> {
        match self.fetch_trending().await {
            Ok(flag) => Some(flag),
            Err(e) => {
                warn!("Trending check error: {}", e);
                None
            }
        }
    }
}

/// Map the up-vote percentage onto [-1, 1]
pub fn vote_score(up_pct: f64) -> f64 {
    (up_pct - 50.0) / 50.0
}

#[async_trait]
impl SentimentCollector for CoinGeckoCollector {
    fn source(&self) -> SentimentSource {
        SentimentSource::Coingecko
    }

    async fn fetch(&self) -> Option<SentimentReading> {
        match self.fetch_votes().await {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("CoinGecko error: {}", e);
                None
            }
        }
    }

    async fn is_trending(&self) -> Option<bool> {
        self.trending().await
    }
}
