//! News headline sentiment
//!
//! Pulls headlines from the CryptoPanic and Google News RSS feeds and asks an
//! LLM to rate them. The model answers in a fixed line format which is parsed
//! leniently: anything missing falls back to a neutral, low-confidence default.

use super::SentimentCollector;
use crate::config::SentimentConfig;
use crate::error::{BotError, Result};
use crate::llm::{truncate, LlmClient};
use crate::types::{clamp_score, NewsConfidence, ReadingDetail, SentimentReading, SentimentSource};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CRYPTOPANIC_ITEMS: usize = 20;
const GOOGLE_NEWS_ITEMS: usize = 15;
const MAX_HEADLINES: usize = 10;

/// Parsed model answer
#[derive(Debug, Clone, PartialEq)]
pub struct NewsAnalysis {
    pub score: f64,
    pub confidence: NewsConfidence,
    pub reasoning: String,
    /// The model never answered
    pub failed: bool,
}

impl Default for NewsAnalysis {
    fn default() -> Self {
        Self {
            score: 0.0,
            confidence: NewsConfidence::Low,
            reasoning: "Unable to parse response".to_string(),
            failed: false,
        }
    }
}

/// Parse the `SENTIMENT_SCORE:` / `CONFIDENCE:` / `REASONING:` lines
pub fn parse_analysis(text: &str) -> NewsAnalysis {
    let mut analysis = NewsAnalysis::default();

    for line in text.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("SENTIMENT_SCORE:") {
            match value.trim().parse::<f64>() {
                Ok(score) => analysis.score = clamp_score(score),
                Err(_) => warn!("Unparseable sentiment score: {}", value.trim()),
            }
        } else if let Some(value) = line.strip_prefix("CONFIDENCE:") {
            analysis.confidence = NewsConfidence::parse(value);
        } else if let Some(value) = line.strip_prefix("REASONING:") {
            analysis.reasoning = value.trim().to_string();
        }
    }

    analysis
}

/// Item titles from an RSS document, in feed order
pub fn rss_titles(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut titles = Vec::new();
    let mut in_item = false;
    let mut in_title = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"title" if in_item => {
                    in_title = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_title => {
                let text = t
                    .unescape()
                    .map_err(|e| BotError::Parse(format!("RSS text: {}", e)))?;
                current.push_str(&text);
            }
            Ok(Event::CData(c)) if in_title => {
                current.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => in_item = false,
                b"title" if in_title => {
                    in_title = false;
                    let title = current.trim();
                    if !title.is_empty() {
                        titles.push(title.to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BotError::Parse(format!(
                    "RSS at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    Ok(titles)
}

fn build_prompt(headlines: &[String]) -> String {
    let list = headlines
        .iter()
        .map(|h| format!("- {}", h))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze the market sentiment for CRO/Cronos based on these recent news headlines:

{list}

Rate the overall sentiment on a scale from -1.0 to 1.0:
- -1.0 = Very Bearish (major negative news, hacks, crashes)
- -0.5 = Bearish (negative sentiment, concerns)
- 0.0 = Neutral (mixed or no clear direction)
- 0.5 = Bullish (positive sentiment, growth)
- 1.0 = Very Bullish (major partnerships, adoption, breakthroughs)

Consider:
- Project announcements (partnerships, upgrades)
- Market trends (price movements, volume)
- Regulatory news
- Technical developments
- Community sentiment

Respond in this exact format:
SENTIMENT_SCORE: [number between -1.0 and 1.0]
CONFIDENCE: [low/medium/high]
REASONING: [one sentence explanation]"#
    )
}

pub struct NewsCollector {
    http: Client,
    llm: Arc<dyn LlmClient>,
    cryptopanic_rss: String,
    google_news_url: String,
    query: String,
    keywords: Vec<String>,
}

impl NewsCollector {
    pub fn new(config: &SentimentConfig, llm: Arc<dyn LlmClient>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            llm,
            cryptopanic_rss: config.cryptopanic_rss.clone(),
            google_news_url: config.google_news_url.clone(),
            query: config.news_query.clone(),
            keywords: config.news_keywords.iter().map(|k| k.to_lowercase()).collect(),
        })
    }

    pub fn from_config(config: &SentimentConfig, llm: Arc<dyn LlmClient>) -> Result<Self> {
        Self::new(config, llm, Duration::from_secs(config.http_timeout_secs))
    }

    async fn fetch_feed(&self, request: reqwest::RequestBuilder) -> Result<Vec<String>> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(BotError::Api(format!("feed returned {}", resp.status())));
        }
        let body = resp.text().await?;
        rss_titles(&body)
    }

    /// CryptoPanic titles mentioning one of the topic keywords
    pub async fn cryptopanic_headlines(&self) -> Vec<String> {
        match self.fetch_feed(self.http.get(&self.cryptopanic_rss)).await {
            Ok(titles) => {
                let relevant: Vec<String> = titles
                    .into_iter()
                    .take(CRYPTOPANIC_ITEMS)
                    .filter(|t| {
                        let lower = t.to_lowercase();
                        self.keywords.iter().any(|k| lower.contains(k.as_str()))
                    })
                    .collect();
                debug!("CryptoPanic: {} relevant headlines", relevant.len());
                relevant
            }
            Err(e) => {
                warn!("CryptoPanic error: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn google_news_headlines(&self) -> Vec<String> {
        let request = self.http.get(&self.google_news_url).query(&[
            ("q", self.query.as_str()),
            ("hl", "en-US"),
            ("gl", "US"),
            ("ceid", "US:en"),
        ]);

        match self.fetch_feed(request).await {
            Ok(titles) => {
                let titles: Vec<String> = titles.into_iter().take(GOOGLE_NEWS_ITEMS).collect();
                debug!("Google News: {} headlines", titles.len());
                titles
            }
            Err(e) => {
                warn!("Google News error: {}", e);
                Vec::new()
            }
        }
    }

    /// Rate headlines with the LLM; call failures become a neutral analysis
    pub async fn analyze(&self, headlines: &[String]) -> NewsAnalysis {
        let batch = &headlines[..headlines.len().min(MAX_HEADLINES)];
        let prompt = build_prompt(batch);

        match self.llm.complete(None, prompt).await {
            Ok(text) => {
                let analysis = parse_analysis(text.trim());
                info!(
                    "News sentiment via {}: {:.2} ({:?} confidence)",
                    self.llm.name(),
                    analysis.score,
                    analysis.confidence
                );
                analysis
            }
            Err(e) => {
                warn!("News analysis error: {}", e);
                NewsAnalysis {
                    score: 0.0,
                    confidence: NewsConfidence::Low,
                    reasoning: format!("Analysis failed: {}", truncate(&e.to_string(), 50)),
                    failed: true,
                }
            }
        }
    }
}

#[async_trait]
impl SentimentCollector for NewsCollector {
    fn source(&self) -> SentimentSource {
        SentimentSource::News
    }

    async fn fetch(&self) -> Option<SentimentReading> {
        let mut headlines = self.cryptopanic_headlines().await;
        headlines.extend(self.google_news_headlines().await);

        if headlines.is_empty() {
            info!("No news articles found, reporting neutral sentiment");
            return Some(SentimentReading::new(
                SentimentSource::News,
                0.0,
                0,
                ReadingDetail::News {
                    confidence: NewsConfidence::Low,
                    reasoning: "No news articles available".to_string(),
                    headlines: Vec::new(),
                    failed: true,
                },
            ));
        }

        let analysis = self.analyze(&headlines).await;
        let total = headlines.len();
        headlines.truncate(MAX_HEADLINES);

        Some(SentimentReading::new(
            SentimentSource::News,
            analysis.score,
            total,
            ReadingDetail::News {
                confidence: analysis.confidence,
                reasoning: analysis.reasoning,
                headlines,
                failed: analysis.failed,
            },
        ))
    }
}
