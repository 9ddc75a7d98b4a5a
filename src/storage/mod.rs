//! Balance memory
//!
//! On-chain balance reads go through [`BalanceTracker`], which records every
//! successful read in SQLite and answers from the last recorded value when the
//! RPC is unavailable.


use crate::chain::BalanceReader;
use crate::error::Result;
use chrono::{DateTime, Utc};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Where a balance figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceSource {
    OnChain,
    Cache,
    NoData,
}

impl BalanceSource {
    fn as_str(self) -> &'static str {
        match self {
            BalanceSource::OnChain => "on-chain",
            BalanceSource::Cache => "cache",
            BalanceSource::NoData => "no-data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub symbol: String,
    pub address: Option<String>,
    pub balance: Decimal,
    pub source: BalanceSource,
    /// False whenever the figure did not come from the chain just now
    pub fresh: bool,
    pub recorded_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn age_minutes(&self) -> f64 {
        (Utc::now() - self.recorded_at).num_seconds() as f64 / 60.0
    }
}

/// SQLite table of past balance reads
pub struct BalanceMemory {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    timestamp: String,
    token_symbol: String,
    token_address: Option<String>,
    balance: String,
}

impl BalanceMemory {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let memory = Self { pool };
        memory.run_migrations().await?;

        Ok(memory)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balance_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                token_symbol TEXT NOT NULL,
                token_address TEXT,
                balance TEXT NOT NULL,
                source TEXT NOT NULL,
                UNIQUE(timestamp, token_symbol)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO balance_history
                (timestamp, token_symbol, token_address, balance, source)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.recorded_at.to_rfc3339())
        .bind(&snapshot.symbol)
        .bind(&snapshot.address)
        .bind(snapshot.balance.to_string())
        .bind(snapshot.source.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent recorded balance for a symbol
    pub async fn last(&self, symbol: &str) -> Result<Option<BalanceSnapshot>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT timestamp, token_symbol, token_address, balance
            FROM balance_history
            WHERE token_symbol = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| match r.try_into() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding unreadable balance row: {}", e);
                None
            }
        }))
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM balance_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl TryFrom<BalanceRow> for BalanceSnapshot {
    type Error = anyhow::Error;

    fn try_from(row: BalanceRow) -> std::result::Result<Self, Self::Error> {
        Ok(BalanceSnapshot {
            symbol: row.token_symbol,
            address: row.token_address,
            balance: Decimal::from_str(&row.balance)?,
            source: BalanceSource::Cache,
            fresh: false,
            recorded_at: DateTime::parse_from_rfc3339(&row.timestamp)?.with_timezone(&Utc),
        })
    }
}

/// Balance reads with a SQLite fallback
pub struct BalanceTracker {
    reader: Arc<dyn BalanceReader>,
    memory: BalanceMemory,
    native_symbol: String,
}

impl BalanceTracker {
    pub fn new(
        reader: Arc<dyn BalanceReader>,
        memory: BalanceMemory,
        native_symbol: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            memory,
            native_symbol: native_symbol.into(),
        }
    }

    pub fn owner(&self) -> Address {
        self.reader.owner()
    }

    pub async fn native_balance(&self) -> Result<BalanceSnapshot> {
        let symbol = self.native_symbol.clone();
        match self.reader.native_balance().await {
            Ok(balance) => self.remember(symbol, None, balance).await,
            Err(e) => {
                warn!("RPC failed for {} balance: {}", symbol, e);
                self.recall(&symbol, None).await
            }
        }
    }

    pub async fn token_balance(&self, symbol: &str, token: Address) -> Result<BalanceSnapshot> {
        let address = format!("{:?}", token);
        match self.reader.token_balance(token).await {
            Ok(balance) => self.remember(symbol.to_string(), Some(address), balance).await,
            Err(e) => {
                warn!("RPC failed for {} balance: {}", symbol, e);
                self.recall(symbol, Some(address)).await
            }
        }
    }

    /// Native balance followed by each listed token
    pub async fn all_balances(&self, tokens: &[(String, Address)]) -> Result<Vec<BalanceSnapshot>> {
        let mut balances = vec![self.native_balance().await?];
        for (symbol, address) in tokens {
            balances.push(self.token_balance(symbol, *address).await?);
        }
        Ok(balances)
    }

    async fn remember(
        &self,
        symbol: String,
        address: Option<String>,
        balance: Decimal,
    ) -> Result<BalanceSnapshot> {
        let snapshot = BalanceSnapshot {
            symbol,
            address,
            balance,
            source: BalanceSource::OnChain,
            fresh: true,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.memory.record(&snapshot).await {
            warn!("Failed to store {} balance: {}", snapshot.symbol, e);
        }
        Ok(snapshot)
    }

    async fn recall(&self, symbol: &str, address: Option<String>) -> Result<BalanceSnapshot> {
        match self.memory.last(symbol).await? {
            Some(snapshot) => Ok(snapshot),
            None => Ok(BalanceSnapshot {
                symbol: symbol.to_string(),
                address,
                balance: Decimal::ZERO,
                source: BalanceSource::NoData,
                fresh: false,
                recorded_at: Utc::now(),
            }),
        }
    }
}
