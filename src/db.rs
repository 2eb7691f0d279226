use crate::api::*;
use crate::vote::{CounterDelta, VoteKey};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Executor, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use thiserror::Error;

/// Failures of the vote ledger and counter store, classified so callers
/// never have to inspect error messages.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint {constraint_key} violated")]
    ConstraintViolation { constraint_key: String },
    #[error("store temporarily unavailable: {0}")]
    Transient(String),
    #[error("transaction already closed")]
    Closed,
    #[error(transparent)]
    Database(sqlx::Error),
}
impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::ConstraintViolation {
                    constraint_key: db
                        .constraint()
                        .map(str::to_string)
                        .unwrap_or_else(|| db.message().to_string()),
                };
            }
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            if matches!(db.code().as_deref(), Some("5" | "6" | "262" | "517")) {
                return Self::Transient(db.message().to_string());
            }
        }
        if let sqlx::Error::PoolTimedOut = e {
            return Self::Transient(e.to_string());
        }
        Self::Database(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: RowId,
    pub key: VoteKey,
    pub direction: VoteDirection,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live ledger entries. At most one live entry exists per [`VoteKey`];
/// creating a second one fails with [`StoreError::ConstraintViolation`].
#[async_trait]
pub trait LedgerStore {
    async fn get_entry(&mut self, key: &VoteKey) -> Result<Option<LedgerEntry>, StoreError>;
    async fn create_entry(
        &mut self,
        key: &VoteKey,
        direction: VoteDirection,
    ) -> Result<LedgerEntry, StoreError>;
    async fn update_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;
    async fn remove_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;
}
#[async_trait]
pub trait CounterStore {
    /// `None` when the target doesn't exist or was deleted.
    async fn get_counters(
        &mut self,
        target_type: TargetType,
        target: RowId,
    ) -> Result<Option<VoteCounters>, StoreError>;
    async fn apply_delta(
        &mut self,
        target_type: TargetType,
        target: RowId,
        delta: CounterDelta,
    ) -> Result<VoteCounters, StoreError>;
}
/// One transaction over the ledger and the counters. Dropping it without
/// calling [`VoteTx::commit`] discards every write.
#[async_trait]
pub trait VoteTx: LedgerStore + CounterStore + Send {
    async fn commit(&mut self) -> Result<(), StoreError>;
    async fn rollback(&mut self) -> Result<(), StoreError>;
}
#[async_trait]
pub trait VoteStore {
    async fn begin(&self) -> Result<Box<dyn VoteTx>, StoreError>;
}

#[async_trait]
pub trait DB {
    /// Inserts the position together with its all-zero vote statistics.
    async fn add_position(&self, position: &NewPositionRequest) -> Result<RowId>;
    async fn get_position(&self, position: RowId) -> Result<Option<Position>>;
    async fn get_positions(&self) -> Result<Vec<Position>>;
    async fn get_pending_positions(&self, event: &EventId) -> Result<Vec<Position>>;
    async fn delete_position(&self, position: RowId) -> Result<bool>;
    /// Moves a pending position to its final status. Returns false if the
    /// position was already settled, so no position is ever settled twice.
    async fn set_settlement(
        &self,
        position: RowId,
        status: SettlementStatus,
        settled_at: DateTime<Utc>,
    ) -> Result<bool>;
    async fn add_comment(&self, comment: &NewCommentRequest) -> Result<RowId>;
    async fn get_comments(&self, position: RowId) -> Result<Vec<Comment>>;
    async fn delete_comment(&self, comment: RowId) -> Result<bool>;
    /// Results are immutable: returns false if one was already recorded.
    async fn add_event_result(&self, event: &EventId, result: &EventResult) -> Result<bool>;
    async fn get_event_result(&self, event: &EventId) -> Result<Option<EventResult>>;
    async fn get_vote(&self, key: &VoteKey) -> Result<Option<VoteDirection>>;
}

#[derive(Clone)]
pub struct SQLite {
    connection: SqlitePool,
}
impl SQLite {
    pub async fn new(db_conn: Option<String>) -> Result<Self> {
        let url = db_conn.unwrap_or_else(|| "sqlite::memory:".to_string());
        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database url {}", url))?
            .create_if_missing(true);
        // A single connection serialises writers and keeps `sqlite::memory:`
        // alive for the lifetime of the pool.
        let connection = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("couldn't open database {}", url))?;
        for statement in SCHEMA {
            connection.execute(*statement).await?;
        }
        Ok(Self { connection })
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS positions (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        author TEXT NOT NULL,\
        event TEXT NOT NULL,\
        market TEXT NOT NULL,\
        selection TEXT NOT NULL,\
        odds TEXT NOT NULL,\
        status TEXT NOT NULL DEFAULT 'Pending',\
        settled_at INTEGER,\
        created_at INTEGER NOT NULL,\
        deleted INTEGER NOT NULL DEFAULT 0\
        )",
    "CREATE TABLE IF NOT EXISTS comments (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        position INTEGER NOT NULL,\
        author TEXT NOT NULL,\
        body TEXT NOT NULL,\
        created_at INTEGER NOT NULL,\
        deleted INTEGER NOT NULL DEFAULT 0\
        )",
    "CREATE TABLE IF NOT EXISTS vote_stats (\
        target_type TEXT NOT NULL,\
        target INTEGER NOT NULL,\
        upvotes INTEGER NOT NULL DEFAULT 0,\
        downvotes INTEGER NOT NULL DEFAULT 0,\
        voters INTEGER NOT NULL DEFAULT 0,\
        prediction_percentage TEXT NOT NULL DEFAULT '0',\
        PRIMARY KEY (target_type, target)\
        )",
    "CREATE TABLE IF NOT EXISTS votes (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        voter TEXT NOT NULL,\
        target_type TEXT NOT NULL,\
        target INTEGER NOT NULL,\
        direction TEXT NOT NULL,\
        deleted INTEGER NOT NULL DEFAULT 0,\
        created_at INTEGER NOT NULL,\
        updated_at INTEGER NOT NULL\
        )",
    "CREATE UNIQUE INDEX IF NOT EXISTS votes_live_key \
        ON votes (voter, target_type, target) WHERE deleted = 0",
    "CREATE TABLE IF NOT EXISTS event_results (\
        event TEXT PRIMARY KEY,\
        winner TEXT,\
        score TEXT,\
        market_results TEXT,\
        settled_at INTEGER,\
        recorded_at INTEGER NOT NULL\
        )",
];

const POSITION_COLUMNS: &str = "positions.id, author, event, market, selection, odds, status, \
    settled_at, created_at, upvotes, downvotes, voters, prediction_percentage \
    FROM positions \
    JOIN vote_stats ON vote_stats.target_type = 'Position' AND vote_stats.target = positions.id";

fn target_table(target_type: TargetType) -> &'static str {
    match target_type {
        TargetType::Position => "positions",
        TargetType::Comment => "comments",
    }
}
fn timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
fn counters_from_row(row: &SqliteRow) -> Result<VoteCounters, sqlx::Error> {
    let percentage: String = row.try_get("prediction_percentage")?;
    Ok(VoteCounters {
        upvotes: row.try_get("upvotes")?,
        downvotes: row.try_get("downvotes")?,
        voters: row.try_get("voters")?,
        prediction_percentage: Decimal::from_str(&percentage).unwrap_or_default(),
    })
}
fn position_from_row(row: &SqliteRow) -> Result<Position> {
    let odds: String = row.get("odds");
    Ok(Position {
        id: row.get("id"),
        author: row.get("author"),
        event: row.get("event"),
        market: Market::from_str(row.get("market"))?,
        selection: row.get("selection"),
        odds: Decimal::from_str(&odds).with_context(|| format!("stored odds {} are invalid", odds))?,
        counters: counters_from_row(row)?,
        status: SettlementStatus::from_str(row.get("status"))?,
        settled_at: row.get::<Option<i64>, _>("settled_at").map(timestamp),
        created_at: timestamp(row.get("created_at")),
    })
}

#[async_trait]
impl VoteStore for SQLite {
    async fn begin(&self) -> Result<Box<dyn VoteTx>, StoreError> {
        let tx = self.connection.begin().await?;
        Ok(Box::new(SQLiteTx { tx: Some(tx) }))
    }
}

pub struct SQLiteTx {
    tx: Option<Transaction<'static, Sqlite>>,
}
impl SQLiteTx {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::Closed)
    }
}
#[async_trait]
impl LedgerStore for SQLiteTx {
    async fn get_entry(&mut self, key: &VoteKey) -> Result<Option<LedgerEntry>, StoreError> {
        let stmt = query(
            "SELECT id, direction, created_at, updated_at FROM votes \
            WHERE voter = ? AND target_type = ? AND target = ? AND deleted = 0",
        );
        let row = stmt
            .bind(&key.voter)
            .bind(key.target_type.to_string())
            .bind(key.target)
            .fetch_optional(&mut **self.tx()?)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let direction: String = row.try_get("direction")?;
        Ok(Some(LedgerEntry {
            id: row.try_get("id")?,
            key: key.clone(),
            direction: VoteDirection::from_str(&direction)
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?,
            deleted: false,
            created_at: timestamp(row.try_get("created_at")?),
            updated_at: timestamp(row.try_get("updated_at")?),
        }))
    }
    async fn create_entry(
        &mut self,
        key: &VoteKey,
        direction: VoteDirection,
    ) -> Result<LedgerEntry, StoreError> {
        let now = Utc::now();
        let id = query(
            "INSERT INTO votes \
            (voter, target_type, target, direction, created_at, updated_at) \
            VALUES (?,?,?,?,?,?)",
        )
        .bind(&key.voter)
        .bind(key.target_type.to_string())
        .bind(key.target)
        .bind(direction.to_string())
        .bind(now.timestamp())
        .bind(now.timestamp())
        .execute(&mut **self.tx()?)
        .await?
        .last_insert_rowid();
        Ok(LedgerEntry {
            id,
            key: key.clone(),
            direction,
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }
    async fn update_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        query("UPDATE votes SET direction = ?, updated_at = ? WHERE id = ? AND deleted = 0")
            .bind(entry.direction.to_string())
            .bind(Utc::now().timestamp())
            .bind(entry.id)
            .execute(&mut **self.tx()?)
            .await?;
        Ok(())
    }
    async fn remove_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        query("UPDATE votes SET deleted = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(entry.id)
            .execute(&mut **self.tx()?)
            .await?;
        Ok(())
    }
}
#[async_trait]
impl CounterStore for SQLiteTx {
    async fn get_counters(
        &mut self,
        target_type: TargetType,
        target: RowId,
    ) -> Result<Option<VoteCounters>, StoreError> {
        let stmt = format!(
            "SELECT upvotes, downvotes, voters, prediction_percentage \
            FROM vote_stats \
            JOIN {table} ON {table}.id = vote_stats.target AND {table}.deleted = 0 \
            WHERE vote_stats.target_type = ? AND vote_stats.target = ?",
            table = target_table(target_type)
        );
        let row = query(&stmt)
            .bind(target_type.to_string())
            .bind(target)
            .fetch_optional(&mut **self.tx()?)
            .await?;
        match row {
            Some(row) => Ok(Some(counters_from_row(&row)?)),
            None => Ok(None),
        }
    }
    async fn apply_delta(
        &mut self,
        target_type: TargetType,
        target: RowId,
        delta: CounterDelta,
    ) -> Result<VoteCounters, StoreError> {
        let row = query(
            "SELECT upvotes, downvotes, voters, prediction_percentage \
            FROM vote_stats WHERE target_type = ? AND target = ?",
        )
        .bind(target_type.to_string())
        .bind(target)
        .fetch_one(&mut **self.tx()?)
        .await?;
        let counters = counters_from_row(&row)?.apply(delta);
        query(
            "UPDATE vote_stats SET \
            upvotes = ?, downvotes = ?, voters = ?, prediction_percentage = ? \
            WHERE target_type = ? AND target = ?",
        )
        .bind(counters.upvotes)
        .bind(counters.downvotes)
        .bind(counters.voters)
        .bind(counters.prediction_percentage.to_string())
        .bind(target_type.to_string())
        .bind(target)
        .execute(&mut **self.tx()?)
        .await?;
        Ok(counters)
    }
}
#[async_trait]
impl VoteTx for SQLiteTx {
    async fn commit(&mut self) -> Result<(), StoreError> {
        self.tx.take().ok_or(StoreError::Closed)?.commit().await?;
        Ok(())
    }
    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.tx.take().ok_or(StoreError::Closed)?.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl DB for SQLite {
    async fn add_position(&self, position: &NewPositionRequest) -> Result<RowId> {
        let mut tx = self.connection.begin().await?;
        let id = query(
            "INSERT INTO positions (\
            author,\
            event,\
            market,\
            selection,\
            odds,\
            created_at) \
            VALUES (?,?,?,?,?,?)",
        )
        .bind(&position.author)
        .bind(&position.event)
        .bind(position.market.to_string())
        .bind(&position.selection)
        .bind(position.odds.to_string())
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        query("INSERT INTO vote_stats (target_type, target) VALUES (?,?)")
            .bind(TargetType::Position.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(id)
    }
    async fn get_position(&self, position: RowId) -> Result<Option<Position>> {
        let stmt = format!(
            "SELECT {} WHERE positions.id = ? AND positions.deleted = 0",
            POSITION_COLUMNS
        );
        let row = self
            .connection
            .fetch_optional(query(&stmt).bind(position))
            .await
            .with_context(|| format!("couldn't get position {}", position))?;
        row.as_ref().map(position_from_row).transpose()
    }
    async fn get_positions(&self) -> Result<Vec<Position>> {
        let stmt = format!(
            "SELECT {} WHERE positions.deleted = 0 ORDER BY positions.id",
            POSITION_COLUMNS
        );
        let rows = self.connection.fetch_all(query(&stmt)).await?;
        rows.iter().map(position_from_row).collect()
    }
    async fn get_pending_positions(&self, event: &EventId) -> Result<Vec<Position>> {
        let stmt = format!(
            "SELECT {} WHERE positions.event = ? AND positions.status = 'Pending' \
            AND positions.deleted = 0 ORDER BY positions.id",
            POSITION_COLUMNS
        );
        let rows = self.connection.fetch_all(query(&stmt).bind(event)).await?;
        rows.iter().map(position_from_row).collect()
    }
    async fn delete_position(&self, position: RowId) -> Result<bool> {
        let deleted = self
            .connection
            .execute(
                query("UPDATE positions SET deleted = 1 WHERE id = ? AND deleted = 0")
                    .bind(position),
            )
            .await?
            .rows_affected();
        Ok(deleted == 1)
    }
    async fn set_settlement(
        &self,
        position: RowId,
        status: SettlementStatus,
        settled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self
            .connection
            .execute(
                query(
                    "UPDATE positions \
                SET status = ?, settled_at = ? \
                WHERE id = ? AND status = 'Pending' AND deleted = 0",
                )
                .bind(status.to_string())
                .bind(settled_at.timestamp())
                .bind(position),
            )
            .await
            .with_context(|| format!("couldn't settle position {}", position))?
            .rows_affected();
        Ok(updated == 1)
    }
    async fn add_comment(&self, comment: &NewCommentRequest) -> Result<RowId> {
        let mut tx = self.connection.begin().await?;
        let id = query(
            "INSERT INTO comments (position, author, body, created_at) VALUES (?,?,?,?)",
        )
        .bind(comment.position)
        .bind(&comment.author)
        .bind(&comment.body)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        query("INSERT INTO vote_stats (target_type, target) VALUES (?,?)")
            .bind(TargetType::Comment.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(id)
    }
    async fn get_comments(&self, position: RowId) -> Result<Vec<Comment>> {
        let stmt = query(
            "SELECT comments.id, position, author, body, created_at, \
            upvotes, downvotes, voters, prediction_percentage \
            FROM comments \
            JOIN vote_stats ON vote_stats.target_type = 'Comment' AND vote_stats.target = comments.id \
            WHERE position = ? AND deleted = 0 ORDER BY comments.id",
        );
        let rows = self.connection.fetch_all(stmt.bind(position)).await?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(Comment {
                id: row.get("id"),
                position: row.get("position"),
                author: row.get("author"),
                body: row.get("body"),
                counters: counters_from_row(&row)?,
                created_at: timestamp(row.get("created_at")),
            });
        }
        Ok(comments)
    }
    async fn delete_comment(&self, comment: RowId) -> Result<bool> {
        let deleted = self
            .connection
            .execute(
                query("UPDATE comments SET deleted = 1 WHERE id = ? AND deleted = 0").bind(comment),
            )
            .await?
            .rows_affected();
        Ok(deleted == 1)
    }
    async fn add_event_result(&self, event: &EventId, result: &EventResult) -> Result<bool> {
        let market_results = result
            .market_results
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let inserted = self
            .connection
            .execute(
                query(
                    "INSERT OR IGNORE INTO event_results \
                (event, winner, score, market_results, settled_at, recorded_at) \
                VALUES (?,?,?,?,?,?)",
                )
                .bind(event)
                .bind(&result.winner)
                .bind(&result.score)
                .bind(market_results)
                .bind(result.settled_at.map(|t| t.timestamp()))
                .bind(Utc::now().timestamp()),
            )
            .await
            .with_context(|| format!("couldn't record result for event {}", event))?
            .rows_affected();
        Ok(inserted == 1)
    }
    async fn get_event_result(&self, event: &EventId) -> Result<Option<EventResult>> {
        let stmt = query(
            "SELECT winner, score, market_results, settled_at \
            FROM event_results WHERE event = ?",
        );
        let row = self.connection.fetch_optional(stmt.bind(event)).await?;
        Ok(row.map(|row| EventResult {
            winner: row.get("winner"),
            score: row.get("score"),
            market_results: row
                .get::<Option<String>, _>("market_results")
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            settled_at: row.get::<Option<i64>, _>("settled_at").map(timestamp),
        }))
    }
    async fn get_vote(&self, key: &VoteKey) -> Result<Option<VoteDirection>> {
        let stmt = query(
            "SELECT direction FROM votes \
            WHERE voter = ? AND target_type = ? AND target = ? AND deleted = 0",
        );
        let row = self
            .connection
            .fetch_optional(
                stmt.bind(&key.voter)
                    .bind(key.target_type.to_string())
                    .bind(key.target),
            )
            .await?;
        row.map(|row| VoteDirection::from_str(row.get("direction")))
            .transpose()
    }
}
