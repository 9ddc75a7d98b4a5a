//! Cronos Sentinel Trader
//!
//! A sentiment-driven autonomous trading agent for a Cronos testnet AMM.
//! Every trade is checked against the on-chain SentinelClamp spending limit
//! before it is sent.

pub mod chain;
pub mod config;
pub mod decision;
pub mod error;
pub mod journal;
pub mod llm;
pub mod notify;
pub mod sentiment;
pub mod storage;
pub mod tools;
pub mod trader;
pub mod types;
