//! Three-persona LLM voting council

use super::DecisionStrategy;
use crate::llm::LlmClient;
use crate::types::{AggregateSignal, CouncilVote, TradeDecision, Vote};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_REASONING: &str = "No reasoning provided";

/// One council member: a name and its standing instructions
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: &'static str,
    pub instructions: &'static str,
}

pub const RISK_MANAGER: Persona = Persona {
    name: "Risk Manager",
    instructions: r#"You are the RISK MANAGER agent in a multi-agent trading council.

YOUR ROLE: Protect capital and minimize losses
YOUR PERSONALITY: Conservative, safety-first, skeptical of hype

DECISION FRAMEWORK:
- Focus on downside protection and Sentinel limits
- Require strong evidence before approving trades
- Prefer smaller position sizes
- Vote HOLD or SELL when uncertainty is high
- Only vote STRONG_BUY with overwhelming evidence

VOTING RULES:
- strong_buy (5): Perfect conditions, minimal risk, high reward
- buy (4): Good opportunity, acceptable risk
- hold (3): Unclear or neutral conditions
- sell (2): Warning signs present
- strong_sell (1): High risk, exit immediately

Provide: vote, confidence (0-1), reasoning (1 sentence)"#,
};

pub const MARKET_ANALYST: Persona = Persona {
    name: "Market Analyst",
    instructions: r#"You are the MARKET ANALYST agent in a multi-agent trading council.

YOUR ROLE: Analyze data and identify trends
YOUR PERSONALITY: Objective, mathematical, evidence-based

DECISION FRAMEWORK:
- Focus on price action, volume, and sentiment data
- Use technical analysis and statistics
- Ignore emotions, focus on numbers
- Vote based on probability and data patterns
- Provide quantitative reasoning

VOTING RULES:
- strong_buy (5): Multiple bullish indicators aligned
- buy (4): More bullish signals than bearish
- hold (3): Mixed signals or insufficient data
- sell (2): More bearish signals than bullish
- strong_sell (1): Multiple bearish indicators aligned

Provide: vote, confidence (0-1), reasoning (1 sentence with data)"#,
};

pub const EXECUTION_SPECIALIST: Persona = Persona {
    name: "Execution Specialist",
    instructions: r#"You are the EXECUTION SPECIALIST agent in a multi-agent trading council.

YOUR ROLE: Seize opportunities and maximize profits
YOUR PERSONALITY: Aggressive, bold, action-oriented

DECISION FRAMEWORK:
- Focus on opportunity cost and momentum
- Prefer action over waiting
- Comfortable with higher risk for higher reward
- Vote BUY/SELL more often than HOLD
- Quick to capitalize on trends

VOTING RULES:
- strong_buy (5): Strong momentum, must act now
- buy (4): Good entry point, likely upside
- hold (3): No clear edge (but consider buying anyway)
- sell (2): Momentum fading, time to exit
- strong_sell (1): Trend reversing, exit immediately

Provide: vote, confidence (0-1), reasoning (1 sentence, action-focused)"#,
};

/// Outcome of one voting session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilResult {
    pub votes: Vec<CouncilVote>,
    /// Confidence-weighted Likert score, [1, 5]
    pub weighted_score: f64,
    pub consensus: Vote,
    /// Unweighted mean of vote confidences
    pub confidence: f64,
    /// e.g. "2/3 agents agree"
    pub agreement: String,
}

impl CouncilResult {
    pub fn from_votes(votes: Vec<CouncilVote>) -> Self {
        let weighted_score = weighted_score(&votes);
        let confidence = if votes.is_empty() {
            0.0
        } else {
            votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len() as f64
        };

        let mut counts: HashMap<Vote, usize> = HashMap::new();
        for v in &votes {
            *counts.entry(v.vote).or_default() += 1;
        }
        let max_agreement = counts.values().copied().max().unwrap_or(0);

        Self {
            agreement: format!("{}/{} agents agree", max_agreement, votes.len()),
            consensus: consensus_vote(weighted_score),
            weighted_score,
            confidence,
            votes,
        }
    }

    pub fn to_decision(&self) -> TradeDecision {
        TradeDecision {
            action: self.consensus.action(),
            confidence: self.confidence,
            reasoning: format!(
                "Council consensus {} ({}, weighted score {:.2})",
                self.consensus.as_str(),
                self.agreement,
                self.weighted_score
            ),
            votes: self.votes.clone(),
        }
    }
}

/// Σ(score × confidence) / Σ confidence, falling back to the plain mean when
/// every confidence is zero. Hold (3) for an empty council.
pub fn weighted_score(votes: &[CouncilVote]) -> f64 {
    if votes.is_empty() {
        return Vote::Hold.score() as f64;
    }

    let total_confidence: f64 = votes.iter().map(|v| v.confidence).sum();
    if total_confidence > 0.0 {
        votes
            .iter()
            .map(|v| v.vote.score() as f64 * v.confidence)
            .sum::<f64>()
            / total_confidence
    } else {
        votes.iter().map(|v| v.vote.score() as f64).sum::<f64>() / votes.len() as f64
    }
}

pub fn consensus_vote(score: f64) -> Vote {
    if score >= 4.5 {
        Vote::StrongBuy
    } else if score >= 3.5 {
        Vote::Buy
    } else if score >= 2.5 {
        Vote::Hold
    } else if score >= 1.5 {
        Vote::Sell
    } else {
        Vote::StrongSell
    }
}

/// Parse `VOTE:` / `CONFIDENCE:` / `REASONING:` lines from a persona's answer
pub fn parse_vote(agent: &str, response: &str) -> CouncilVote {
    let mut vote = Vote::Hold;
    let mut confidence = DEFAULT_CONFIDENCE;
    let mut reasoning = DEFAULT_REASONING.to_string();

    for line in response.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("VOTE:") {
            vote = Vote::parse(value);
        } else if let Some(value) = line.strip_prefix("CONFIDENCE:") {
            confidence = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|c| !c.is_nan())
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_CONFIDENCE);
        } else if let Some(value) = line.strip_prefix("REASONING:") {
            reasoning = value.trim().to_string();
        }
    }

    CouncilVote {
        agent: agent.to_string(),
        vote,
        confidence,
        reasoning,
    }
}

fn build_prompt(signal: &AggregateSignal, role: &str) -> String {
    format!(
        r#"MARKET DATA:
- Signal: {signal}
- Sentiment Score: {avg:.3}
- Strength: {strength}
- Trending: {trending}

CURRENT TIME: {now}

As the {role} agent, analyze this data and vote on trading action.

Your response MUST be in this exact format:
VOTE: [strong_buy/buy/hold/sell/strong_sell]
CONFIDENCE: [0.0-1.0]
REASONING: [One clear sentence explaining your vote]"#,
        signal = signal.signal,
        avg = signal.avg_sentiment,
        strength = signal.strength,
        trending = signal.is_trending,
        now = Utc::now().format("%Y-%m-%d %H:%M:%S"),
        role = role,
    )
}

pub struct Council {
    llm: Arc<dyn LlmClient>,
    personas: Vec<Persona>,
}

impl Council {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_personas(llm, vec![RISK_MANAGER, MARKET_ANALYST, EXECUTION_SPECIALIST])
    }

    pub fn with_personas(llm: Arc<dyn LlmClient>, personas: Vec<Persona>) -> Self {
        Self { llm, personas }
    }

    async fn ask(&self, persona: &Persona, signal: &AggregateSignal) -> CouncilVote {
        let prompt = build_prompt(signal, persona.name);
        match self
            .llm
            .complete(Some(persona.instructions.to_string()), prompt)
            .await
        {
            Ok(response) => parse_vote(persona.name, &response),
            Err(e) => {
                warn!("{} failed to vote: {}", persona.name, e);
                CouncilVote {
                    agent: persona.name.to_string(),
                    vote: Vote::Hold,
                    confidence: 0.0,
                    reasoning: format!("Error getting vote: {}", e),
                }
            }
        }
    }

    /// Poll every persona in turn and tally the votes
    pub async fn convene(&self, signal: &AggregateSignal) -> CouncilResult {
        let mut votes = Vec::with_capacity(self.personas.len());
        for persona in &self.personas {
            let vote = self.ask(persona, signal).await;
            info!(
                "{} votes {} ({:.2}): {}",
                vote.agent,
                vote.vote.as_str(),
                vote.confidence,
                vote.reasoning
            );
            votes.push(vote);
        }

        let result = CouncilResult::from_votes(votes);
        info!(
            "Council consensus: {} (confidence {:.2}, {})",
            result.consensus.as_str(),
            result.confidence,
            result.agreement
        );
        result
    }
}

#[async_trait]
impl DecisionStrategy for Council {
    async fn decide(&self, signal: &AggregateSignal) -> TradeDecision {
        self.convene(signal).await.to_decision()
    }

    fn name(&self) -> &str {
        "council"
    }
}
