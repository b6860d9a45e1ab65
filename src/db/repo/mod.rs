//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Transaction log operations
//! - `alerts.rs` - Alert rule and trigger operations

mod alerts;

use crate::domain::{
    Coin, NewTransaction, Strategy, TimeMs, Transaction, TransactionDraft, TxKind,
    ValidationError,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Failure of a repository operation.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Repository for database operations.
///
/// Cloning is cheap and clones share the pool and the mutation generation.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    generation: Arc<AtomicU64>,
}

const TX_COLUMNS: &str =
    "id, coin, type, quantity, price, ts_ms, strategy, source, notes, version";

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Counter bumped by every mutation of the transaction log.
    ///
    /// Caches derived from the log compare against it to detect staleness.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    // =========================================================================
    // Transaction operations
    // =========================================================================

    /// Validate and append a transaction, returning its new id.
    ///
    /// # Errors
    /// Returns `RepoError::Validation` on invariant violation (nothing is written)
    /// and `RepoError::Db` if the insert fails.
    pub async fn append_transaction(&self, input: &NewTransaction) -> Result<i64, RepoError> {
        let draft = input.validate(TimeMs::now())?;
        let id = self.insert_draft(&draft).await?;
        Ok(id)
    }

    /// Insert an already validated transaction.
    pub async fn insert_draft(&self, draft: &TransactionDraft) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                coin, type, quantity, price, ts_ms, strategy, source, notes, version, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(draft.coin.as_str())
        .bind(draft.kind.as_str())
        .bind(draft.quantity)
        .bind(draft.price)
        .bind(draft.ts_utc.as_ms())
        .bind(draft.strategy.as_str())
        .bind(draft.source.as_deref())
        .bind(draft.notes.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.bump_generation();
        Ok(result.last_insert_rowid())
    }

    /// Insert several validated transactions in a single database transaction.
    ///
    /// Returns the new ids in input order.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written in that case.
    pub async fn insert_drafts_batch(
        &self,
        drafts: &[TransactionDraft],
    ) -> Result<Vec<i64>, sqlx::Error> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut ids = Vec::with_capacity(drafts.len());
        let mut tx = self.pool.begin().await?;

        for draft in drafts {
            let result = sqlx::query(
                r#"
                INSERT INTO transactions (
                    coin, type, quantity, price, ts_ms, strategy, source, notes, version, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
                "#,
            )
            .bind(draft.coin.as_str())
            .bind(draft.kind.as_str())
            .bind(draft.quantity)
            .bind(draft.price)
            .bind(draft.ts_utc.as_ms())
            .bind(draft.strategy.as_str())
            .bind(draft.source.as_deref())
            .bind(draft.notes.as_deref())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        self.bump_generation();
        Ok(ids)
    }

    /// Fetch one transaction. `None` when the id is absent.
    pub async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(transaction_from_row))
    }

    /// Overwrite the mutable fields of a transaction.
    ///
    /// The id and timestamp are preserved and the version is bumped.
    /// Returns `None` when the id is absent.
    ///
    /// # Errors
    /// Returns `RepoError::Validation` if the input violates an invariant.
    pub async fn update_transaction(
        &self,
        id: i64,
        input: &NewTransaction,
    ) -> Result<Option<Transaction>, RepoError> {
        let Some(existing) = self.get_transaction(id).await? else {
            return Ok(None);
        };
        let draft = input.validate(existing.ts_utc)?;

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET coin = ?, type = ?, quantity = ?, price = ?, strategy = ?,
                source = ?, notes = ?, version = version + 1
            WHERE id = ?
            "#,
        )
        .bind(draft.coin.as_str())
        .bind(draft.kind.as_str())
        .bind(draft.quantity)
        .bind(draft.price)
        .bind(draft.strategy.as_str())
        .bind(draft.source.as_deref())
        .bind(draft.notes.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.bump_generation();
        Ok(self.get_transaction(id).await?)
    }

    /// Delete a transaction. Returns `false` when the id is absent.
    pub async fn delete_transaction(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.bump_generation();
        }
        Ok(deleted)
    }

    /// All transactions, newest first (display order).
    pub async fn list_transactions_desc(&self) -> Result<Vec<Transaction>, sqlx::Error> {
        self.query_transactions(&format!(
            "SELECT {TX_COLUMNS} FROM transactions ORDER BY ts_ms DESC, id DESC"
        ))
        .await
    }

    /// All transactions ordered by `(ts_utc, id)` ascending (replay order).
    pub async fn list_transactions_asc(&self) -> Result<Vec<Transaction>, sqlx::Error> {
        self.query_transactions(&format!(
            "SELECT {TX_COLUMNS} FROM transactions ORDER BY ts_ms ASC, id ASC"
        ))
        .await
    }

    /// Transactions for one coin in replay order.
    pub async fn list_transactions_for_coin(
        &self,
        coin: &Coin,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE coin = ? ORDER BY ts_ms ASC, id ASC"
        ))
        .bind(coin.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(transaction_from_row).collect())
    }

    pub async fn count_transactions(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn query_transactions(&self, sql: &str) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(transaction_from_row).collect())
    }
}

/// Decode a transaction row. Rows with labels outside the taxonomy are skipped.
fn transaction_from_row(row: &SqliteRow) -> Option<Transaction> {
    let id: i64 = row.get("id");
    let coin_str: String = row.get("coin");
    let kind_str: String = row.get("type");
    let strategy_str: String = row.get("strategy");

    let coin = match Coin::new(&coin_str) {
        Ok(coin) => coin,
        Err(e) => {
            warn!(tx_id = id, coin = %coin_str, error = %e, "Skipping transaction with invalid coin");
            return None;
        }
    };
    let kind = match TxKind::from_str(&kind_str) {
        Ok(kind) => kind,
        Err(e) => {
            warn!(tx_id = id, kind = %kind_str, error = %e, "Skipping transaction with unknown type");
            return None;
        }
    };
    let strategy = Strategy::from_str(&strategy_str).unwrap_or_else(|e| {
        warn!(tx_id = id, strategy = %strategy_str, error = %e, "Unknown strategy, using default");
        Strategy::default()
    });

    Some(Transaction {
        id,
        coin,
        kind,
        quantity: row.get("quantity"),
        price: row.get("price"),
        ts_utc: TimeMs::new(row.get("ts_ms")),
        strategy,
        source: row.get("source"),
        notes: row.get("notes"),
        version: row.get("version"),
    })
}
