//! Lexicon polarity scorer
//!
//! VADER-style valence scoring for short social posts: a word lexicon on a
//! -4..4 scale, intensity boosters, a three-token negation window, and the
//! usual `x / sqrt(x² + 15)` squash into a compound score in [-1, 1].

use std::collections::HashMap;

const NORMALIZATION_ALPHA: f64 = 15.0;
const BOOSTER_INCREMENT: f64 = 0.293;
const NEGATION_SCALAR: f64 = -0.74;
const NEGATION_WINDOW: usize = 3;

/// Scores for one piece of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polarity {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    /// Normalized sum of valences, [-1, 1]
    pub compound: f64,
}

impl Polarity {
    fn neutral() -> Self {
        Self {
            positive: 0.0,
            negative: 0.0,
            neutral: 1.0,
            compound: 0.0,
        }
    }
}

/// General-purpose polarity scorer
pub struct LexiconScorer {
    valences: HashMap<&'static str, f64>,
    boosters: HashMap<&'static str, f64>,
    negations: &'static [&'static str],
}

const VALENCES: &[(&str, f64)] = &[
    // positive
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 2.7),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("best", 3.2),
    ("better", 1.9),
    ("love", 3.2),
    ("like", 1.5),
    ("happy", 2.7),
    ("nice", 1.8),
    ("strong", 2.3),
    ("win", 2.8),
    ("winning", 2.4),
    ("success", 2.7),
    ("successful", 2.8),
    ("profit", 1.9),
    ("profits", 1.9),
    ("gain", 2.0),
    ("gains", 1.8),
    ("growth", 1.6),
    ("rally", 1.8),
    ("surge", 1.6),
    ("soar", 2.0),
    ("soaring", 2.1),
    ("positive", 2.6),
    ("optimistic", 2.4),
    ("opportunity", 1.8),
    ("partnership", 1.3),
    ("upgrade", 1.4),
    ("adoption", 1.2),
    ("launch", 0.8),
    ("support", 1.7),
    ("exciting", 2.2),
    ("excited", 2.2),
    ("bullish", 2.0),
    ("recovery", 1.4),
    ("secure", 1.4),
    ("safe", 1.9),
    // negative
    ("bad", -2.5),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("horrible", -2.5),
    ("poor", -2.1),
    ("worst", -3.1),
    ("hate", -2.7),
    ("sad", -2.1),
    ("weak", -1.9),
    ("lose", -1.6),
    ("losing", -1.6),
    ("loss", -1.3),
    ("losses", -1.7),
    ("fail", -2.5),
    ("failed", -2.3),
    ("failure", -2.3),
    ("decline", -1.3),
    ("drop", -1.1),
    ("plunge", -2.0),
    ("crash", -1.7),
    ("crashed", -1.8),
    ("collapse", -2.2),
    ("negative", -2.7),
    ("risk", -1.1),
    ("risky", -1.4),
    ("danger", -2.4),
    ("dangerous", -2.1),
    ("warning", -1.4),
    ("fear", -2.2),
    ("panic", -2.3),
    ("hack", -2.0),
    ("hacked", -2.3),
    ("exploit", -1.8),
    ("scam", -2.6),
    ("fraud", -2.8),
    ("lawsuit", -1.4),
    ("ban", -2.6),
    ("banned", -2.0),
    ("bearish", -2.0),
    ("worried", -1.2),
    ("concern", -1.0),
    ("concerns", -1.0),
    ("delisted", -2.0),
];

const BOOSTERS: &[(&str, f64)] = &[
    ("very", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT),
    ("extremely", BOOSTER_INCREMENT),
    ("absolutely", BOOSTER_INCREMENT),
    ("incredibly", BOOSTER_INCREMENT),
    ("hugely", BOOSTER_INCREMENT),
    ("highly", BOOSTER_INCREMENT),
    ("super", BOOSTER_INCREMENT),
    ("so", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT),
    ("barely", -BOOSTER_INCREMENT),
    ("hardly", -BOOSTER_INCREMENT),
    ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "isn't", "aren't",
    "wasn't", "weren't", "doesn't", "don't", "didn't", "won't", "wouldn't", "can't", "cannot",
    "couldn't", "shouldn't", "without",
];

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            valences: VALENCES.iter().copied().collect(),
            boosters: BOOSTERS.iter().copied().collect(),
            negations: NEGATIONS,
        }
    }

    /// Score a piece of text
    pub fn polarity(&self, text: &str) -> Polarity {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(clean_token)
            .filter(|t| !t.is_empty())
            .collect();

        let mut valences = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.valences.get(token.as_str()) else {
                continue;
            };
            valences.push(self.apply_context(&tokens, i, base));
        }

        if valences.is_empty() {
            return Polarity::neutral();
        }

        let sum: f64 = valences.iter().sum();
        let compound = normalize(sum);

        // +1 per scored token mirrors VADER's neutral-token padding
        let pos: f64 = valences.iter().filter(|v| **v > 0.0).map(|v| v + 1.0).sum();
        let neg: f64 = valences.iter().filter(|v| **v < 0.0).map(|v| v.abs() + 1.0).sum();
        let neu = (tokens.len() - valences.len()) as f64;
        let total = pos + neg + neu;

        Polarity {
            positive: pos / total,
            negative: neg / total,
            neutral: neu / total,
            compound,
        }
    }

    /// Compound score only
    pub fn compound(&self, text: &str) -> f64 {
        self.polarity(text).compound
    }

    fn apply_context(&self, tokens: &[String], index: usize, mut valence: f64) -> f64 {
        let start = index.saturating_sub(NEGATION_WINDOW);
        for prev in &tokens[start..index] {
            if let Some(&boost) = self.boosters.get(prev.as_str()) {
                valence += if valence > 0.0 { boost } else { -boost };
            }
        }
        if tokens[start..index]
            .iter()
            .any(|t| self.negations.contains(&t.as_str()))
        {
            valence *= NEGATION_SCALAR;
        }
        valence
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .collect::<String>()
        .to_lowercase()
}

fn normalize(sum: f64) -> f64 {
    let score = sum / (sum * sum + NORMALIZATION_ALPHA).sqrt();
    score.clamp(-1.0, 1.0)
}
