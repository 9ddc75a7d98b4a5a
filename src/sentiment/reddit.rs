//! Reddit search sentiment

use super::lexicon::LexiconScorer;
use super::SentimentCollector;
use crate::config::SentimentConfig;
use crate::error::{BotError, Result};
use crate::types::{ReadingDetail, SentimentReading, SentimentSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "CronosSentinel/1.0 (Autonomous Trading Bot)";
const POSTS_PER_SUBREDDIT: &str = "10";
const MAX_POSTS_SCORED: usize = 10;
const SLANG_ADJUSTMENT: f64 = 0.3;

const BULLISH_SLANG: &[&str] = &[
    "bullish", "moon", "pump", "buy", "lfg", "hodl", "gem", "rocket", "🚀", "📈",
];
const BEARISH_SLANG: &[&str] = &["bearish", "dump", "sell", "fud", "scam", "rugpull", "📉", "💩"];

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvote_ratio: f64,
}

impl Post {
    /// Lexicon compound nudged by crypto slang
    pub fn sentiment(&self, scorer: &LexiconScorer) -> f64 {
        let text = format!("{} {}", self.title, self.selftext).to_lowercase();
        let mut score = scorer.compound(&text);

        if BULLISH_SLANG.iter().any(|w| text.contains(w)) {
            score = (score + SLANG_ADJUSTMENT).min(1.0);
        }
        if BEARISH_SLANG.iter().any(|w| text.contains(w)) {
            score = (score - SLANG_ADJUSTMENT).max(-1.0);
        }
        score
    }

    /// Upvote ratio scaled by karma, capped at 3x
    pub fn weight(&self) -> f64 {
        self.upvote_ratio * (1.0 + (self.score as f64 / 100.0).min(2.0))
    }
}

/// Weighted mean of post sentiment; 0 when the weights cancel out
pub fn weighted_sentiment(posts: &[Post], scorer: &LexiconScorer) -> f64 {
    let (total, weight) = posts
        .iter()
        .take(MAX_POSTS_SCORED)
        .fold((0.0, 0.0), |(total, weight), post| {
            let w = post.weight();
            (total + post.sentiment(scorer) * w, weight + w)
        });

    if weight > 0.0 {
        total / weight
    } else {
        0.0
    }
}

pub struct RedditCollector {
    http: Client,
    base_url: String,
    query: String,
    subreddits: Vec<String>,
    scorer: LexiconScorer,
}

impl RedditCollector {
    pub fn new(
        base_url: impl Into<String>,
        query: impl Into<String>,
        subreddits: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            query: query.into(),
            subreddits,
            scorer: LexiconScorer::new(),
        })
    }

    pub fn from_config(config: &SentimentConfig) -> Result<Self> {
        Self::new(
            config.reddit_url.clone(),
            config.reddit_query.clone(),
            config.subreddits.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    async fn search(&self, subreddit: &str) -> Result<Vec<Post>> {
        let url = format!("{}/r/{}/search.json", self.base_url, subreddit);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", self.query.as_str()),
                ("limit", POSTS_PER_SUBREDDIT),
                ("sort", "new"),
                ("restrict_sr", "true"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!("r/{} returned {}", subreddit, resp.status())));
        }

        let listing: Listing = resp.json().await?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    /// Posts across every subreddit; a failing subreddit is skipped
    pub async fn posts(&self) -> Vec<Post> {
        let mut posts = Vec::new();
        for subreddit in &self.subreddits {
            match self.search(subreddit).await {
                Ok(found) => {
                    debug!("r/{}: {} posts", subreddit, found.len());
                    posts.extend(found);
                }
                Err(e) => warn!("Reddit r/{} skipped: {}", subreddit, e),
            }
        }
        posts
    }
}

#[async_trait]
impl SentimentCollector for RedditCollector {
    fn source(&self) -> SentimentSource {
        SentimentSource::Reddit
    }

    async fn fetch(&self) -> Option<SentimentReading> {
        let posts = self.posts().await;
        if posts.is_empty() {
            warn!("Reddit returned no posts");
            return None;
        }

        let score = weighted_sentiment(&posts, &self.scorer);
        Some(SentimentReading::new(
            SentimentSource::Reddit,
            score,
            posts.len(),
            ReadingDetail::Reddit {
                posts_analyzed: posts.len(),
                subreddits: self.subreddits.clone(),
            },
        ))
    }
}
