//! Multi-source sentiment aggregation

use crate::types::{AggregateSignal, SentimentReading, Signal};
use chrono::Utc;

const STRONG_THRESHOLD: f64 = 0.6;
const WEAK_THRESHOLD: f64 = 0.3;
const TRENDING_MULTIPLIER: f64 = 1.5;

/// Folds readings into a directional signal
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAggregator;

impl SentimentAggregator {
    /// Mean of the scores, banded with strict thresholds. Trending only
    /// scales strength; it never moves the average or the signal.
    pub fn aggregate(&self, readings: Vec<SentimentReading>, is_trending: bool) -> AggregateSignal {
        if readings.is_empty() {
            return AggregateSignal {
                signal: Signal::Hold,
                strength: 0,
                avg_sentiment: 0.0,
                is_trending,
                reason: "No data available".to_string(),
                sources: readings,
                timestamp: Utc::now(),
            };
        }

        let avg = readings.iter().map(|r| r.score).sum::<f64>() / readings.len() as f64;
        let signal = classify(avg);

        let multiplier = if is_trending { TRENDING_MULTIPLIER } else { 1.0 };
        let strength = (signal.base_strength() as f64 * multiplier).trunc() as i32;

        let mut reasons = Vec::new();
        if is_trending {
            reasons.push("TRENDING on CoinGecko");
        }
        reasons.push(band_text(avg));

        AggregateSignal {
            signal,
            strength,
            avg_sentiment: avg,
            is_trending,
            reason: join_reasons(&reasons),
            sources: readings,
            timestamp: Utc::now(),
        }
    }
}

fn classify(avg: f64) -> Signal {
    if avg > STRONG_THRESHOLD {
        Signal::StrongBuy
    } else if avg > WEAK_THRESHOLD {
        Signal::WeakBuy
    } else if avg < -STRONG_THRESHOLD {
        Signal::StrongSell
    } else if avg < -WEAK_THRESHOLD {
        Signal::WeakSell
    } else {
        Signal::Hold
    }
}

fn band_text(avg: f64) -> &'static str {
    match classify(avg) {
        Signal::StrongBuy => "Strong bullish sentiment",
        Signal::WeakBuy => "Moderate bullish sentiment",
        Signal::Hold => "Neutral sentiment",
        Signal::WeakSell => "Moderate bearish sentiment",
        Signal::StrongSell => "Strong bearish sentiment",
    }
}

fn join_reasons(reasons: &[&str]) -> String {
    if reasons.is_empty() {
        "No clear signal".to_string()
    } else {
        reasons.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReadingDetail, SentimentSource};

    fn reading(source: SentimentSource, score: f64) -> SentimentReading {
        let detail = match source {
            SentimentSource::Coingecko => ReadingDetail::Coingecko {
                votes_up_pct: 50.0 + score * 50.0,
                votes_down_pct: 50.0 - score * 50.0,
            },
            SentimentSource::Reddit => ReadingDetail::Reddit {
                posts_analyzed: 10,
                subreddits: vec![],
            },
            SentimentSource::News => ReadingDetail::News {
                confidence: Default::default(),
                reasoning: String::new(),
                headlines: vec![],
                failed: false,
            },
        };
        SentimentReading::new(source, score, 1, detail)
    }

    fn readings(scores: &[f64]) -> Vec<SentimentReading> {
        let sources = [
            SentimentSource::Coingecko,
            SentimentSource::Reddit,
            SentimentSource::News,
        ];
        scores
            .iter()
            .zip(sources.iter().cycle())
            .map(|(s, src)| reading(*src, *s))
            .collect()
    }

    #[test]
    fn test_bullish_trending_consensus() {
        let signal = SentimentAggregator.aggregate(readings(&[0.8, 0.7, 0.9]), true);
        assert_eq!(signal.signal, Signal::StrongBuy);
        assert_eq!(signal.strength, 4);
        assert!((signal.avg_sentiment - 0.8).abs() < 1e-9);
        assert!(signal.is_trending);
        assert_eq!(
            signal.reason,
            "TRENDING on CoinGecko | Strong bullish sentiment"
        );
        assert_eq!(signal.sources.len(), 3);
    }

    #[test]
    fn test_single_bearish_source() {
        let signal = SentimentAggregator.aggregate(readings(&[-0.7]), false);
        assert_eq!(signal.signal, Signal::StrongSell);
        assert_eq!(signal.strength, -3);
        assert_eq!(signal.reason, "Strong bearish sentiment");
    }

    #[test]
    fn test_empty_input_is_hold() {
        let signal = SentimentAggregator.aggregate(vec![], true);
        assert_eq!(signal.signal, Signal::Hold);
        assert_eq!(signal.strength, 0);
        assert_eq!(signal.avg_sentiment, 0.0);
        assert_eq!(signal.reason, "No data available");
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(SentimentAggregator.aggregate(readings(&[0.6]), false).signal, Signal::WeakBuy);
        assert_eq!(SentimentAggregator.aggregate(readings(&[0.3]), false).signal, Signal::Hold);
        assert_eq!(SentimentAggregator.aggregate(readings(&[-0.3]), false).signal, Signal::Hold);
        assert_eq!(SentimentAggregator.aggregate(readings(&[-0.6]), false).signal, Signal::WeakSell);
        assert_eq!(SentimentAggregator.aggregate(readings(&[0.31]), false).signal, Signal::WeakBuy);
    }

    #[test]
    fn test_trending_does_not_move_average() {
        let plain = SentimentAggregator.aggregate(readings(&[0.4, 0.5]), false);
        let trending = SentimentAggregator.aggregate(readings(&[0.4, 0.5]), true);
        assert_eq!(plain.avg_sentiment, trending.avg_sentiment);
        assert_eq!(plain.signal, trending.signal);
        assert_eq!(plain.strength, 2);
        assert_eq!(trending.strength, 3);
    }

    #[test]
    fn test_strength_sign_matches_direction() {
        for scores in [[0.9, 0.8], [0.4, 0.4], [0.0, 0.1], [-0.4, -0.5], [-0.9, -1.0]] {
            for trending in [false, true] {
                let signal = SentimentAggregator.aggregate(readings(&scores), trending);
                assert_eq!(signal.strength.signum(), signal.signal.direction());
            }
        }
    }

    #[test]
    fn test_neutral_readings_count_toward_mean() {
        let signal = SentimentAggregator.aggregate(readings(&[0.6, 0.0, 0.0]), false);
        assert!((signal.avg_sentiment - 0.2).abs() < 1e-9);
        assert_eq!(signal.signal, Signal::Hold);
        assert_eq!(signal.reason, "Neutral sentiment");
    }
}
