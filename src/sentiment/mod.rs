//! Market sentiment collection
//!
//! Each collector turns one external source into a normalized
//! [`SentimentReading`] in [-1, 1]. Collectors swallow their own failures
//! (logging a warning) and return `None` or a reading flagged as failed.
//! Either way a dead source only shrinks the sample the aggregator sees.

pub mod aggregator;
pub mod coingecko;
pub mod lexicon;
pub mod news;
pub mod reddit;

pub use aggregator::SentimentAggregator;
pub use coingecko::CoinGeckoCollector;
pub use lexicon::{LexiconScorer, Polarity};
pub use news::NewsCollector;
pub use reddit::RedditCollector;

use crate::config::SentimentConfig;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::types::{AggregateSignal, SentimentReading, SentimentSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A single external sentiment source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentCollector: Send + Sync {
    fn source(&self) -> SentimentSource;

    /// One reading, or `None` if the source was unavailable this cycle
    async fn fetch(&self) -> Option<SentimentReading>;

    /// Trending check; only sources that track a trending list override this
    async fn is_trending(&self) -> Option<bool> {
        None
    }
}

/// Runs every collector in turn and folds the results into one signal
pub struct SentimentPipeline {
    collectors: Vec<Box<dyn SentimentCollector>>,
    aggregator: SentimentAggregator,
}

impl SentimentPipeline {
    pub fn new(collectors: Vec<Box<dyn SentimentCollector>>) -> Self {
        Self {
            collectors,
            aggregator: SentimentAggregator,
        }
    }

    /// CoinGecko + Reddit, plus news when an LLM is configured
    pub fn from_config(config: &SentimentConfig, llm: Option<Arc<dyn LlmClient>>) -> Result<Self> {
        let mut collectors: Vec<Box<dyn SentimentCollector>> = vec![
            Box::new(CoinGeckoCollector::from_config(config)?),
            Box::new(RedditCollector::from_config(config)?),
        ];

        if let Some(llm) = llm {
            collectors.push(Box::new(NewsCollector::from_config(config, llm)?));
        } else {
            info!("No LLM configured, news sentiment disabled");
        }

        Ok(Self::new(collectors))
    }

    pub fn sources(&self) -> Vec<SentimentSource> {
        self.collectors.iter().map(|c| c.source()).collect()
    }

    /// Fetch every source sequentially, dropping unavailable and failed ones
    pub async fn collect(&self) -> Vec<SentimentReading> {
        let mut readings = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            match collector.fetch().await {
                Some(reading) if reading.is_failure() => {
                    warn!("{} failed this cycle, omitted from aggregation", reading.source);
                }
                Some(reading) => {
                    debug!("{} sentiment: {:.3}", reading.source, reading.score);
                    readings.push(reading);
                }
                None => debug!("{} unavailable this cycle", collector.source()),
            }
        }
        readings
    }

    /// True if any collector reports the asset as trending
    pub async fn trending(&self) -> bool {
        for collector in &self.collectors {
            if collector.is_trending().await == Some(true) {
                return true;
            }
        }
        false
    }

    /// Collect, check trending, aggregate
    pub async fn run(&self) -> AggregateSignal {
        let readings = self.collect().await;
        let is_trending = self.trending().await;
        let signal = self.aggregator.aggregate(readings, is_trending);
        info!(
            "Aggregate signal: {} (strength {}, avg {:.3}, {} sources)",
            signal.signal,
            signal.strength,
            signal.avg_sentiment,
            signal.sources.len()
        );
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReadingDetail, Signal};

    fn reading(score: f64) -> SentimentReading {
        SentimentReading::new(
            SentimentSource::Reddit,
            score,
            5,
            ReadingDetail::Reddit {
                posts_analyzed: 5,
                subreddits: vec!["CryptoCurrency".into()],
            },
        )
    }

    fn collector(score: Option<f64>, trending: Option<bool>) -> MockSentimentCollector {
        let mut mock = MockSentimentCollector::new();
        mock.expect_source().return_const(SentimentSource::Reddit);
        mock.expect_fetch().returning(move || score.map(reading));
        mock.expect_is_trending().returning(move || trending);
        mock
    }

    #[tokio::test]
    async fn test_unavailable_sources_are_omitted() {
        let pipeline = SentimentPipeline::new(vec![
            Box::new(collector(Some(0.8), None)),
            Box::new(collector(None, None)),
            Box::new(collector(Some(0.6), None)),
        ]);

        let readings = pipeline.collect().await;
        assert_eq!(readings.len(), 2);
    }

    #[tokio::test]
    async fn test_dead_news_source_is_omitted() {
        use crate::error::BotError;
        use crate::llm::MockLlmClient;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let config = SentimentConfig {
            cryptopanic_rss: format!("{}/news/rss/", server.uri()),
            google_news_url: format!("{}/rss/search", server.uri()),
            ..SentimentConfig::default()
        };

        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_, _| Err(BotError::Llm("quota exceeded".into())));
        llm.expect_name().return_const("mock".to_string());
        let news = NewsCollector::from_config(&config, Arc::new(llm)).unwrap();

        let pipeline = SentimentPipeline::new(vec![
            Box::new(collector(Some(0.8), None)),
            Box::new(collector(Some(0.7), None)),
            Box::new(news),
        ]);

        let signal = pipeline.run().await;
        assert_eq!(signal.sources.len(), 2);
        assert!((signal.avg_sentiment - 0.75).abs() < 1e-9);
        assert_eq!(signal.signal, Signal::StrongBuy);
        assert_eq!(signal.strength, 3);
    }

    #[tokio::test]
    async fn test_run_applies_trending_boost() {
        let pipeline = SentimentPipeline::new(vec![
            Box::new(collector(Some(0.8), Some(true))),
            Box::new(collector(Some(0.7), None)),
            Box::new(collector(Some(0.9), None)),
        ]);

        let signal = pipeline.run().await;
        assert_eq!(signal.signal, Signal::StrongBuy);
        assert_eq!(signal.strength, 4);
        assert!(signal.is_trending);
    }

    #[tokio::test]
    async fn test_all_sources_down_is_hold() {
        let pipeline = SentimentPipeline::new(vec![
            Box::new(collector(None, None)),
            Box::new(collector(None, Some(false))),
        ]);

        let signal = pipeline.run().await;
        assert_eq!(signal.signal, Signal::Hold);
        assert_eq!(signal.reason, "No data available");
        assert!(!signal.is_trending);
    }
}
