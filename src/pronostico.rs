use crate::api::*;
use crate::db::{VoteStore, DB};
use crate::guard::{RetryPolicy, VoteGuard};
use crate::selection::{parse_selection, SelectionError};
use crate::settlement::resolve;
use crate::vote::{parse_direction, VoteError, VoteKey};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("odds of {0} are below 1.00")]
    OddsTooLow(Decimal),
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("position {0} does not exist")]
    UnknownPosition(RowId),
    #[error("comment {0} does not exist")]
    UnknownComment(RowId),
    #[error("a result for event {0} was already recorded")]
    ResultAlreadyRecorded(EventId),
    #[error("no result recorded for event {0}")]
    NoResult(EventId),
}

pub struct Pronostico {
    db: Arc<dyn DB + Send + Sync>,
    guard: VoteGuard,
}

impl Pronostico {
    pub fn new<S>(store: S, policy: RetryPolicy) -> Self
    where
        S: DB + VoteStore + Send + Sync + 'static,
    {
        let store = Arc::new(store);
        Self {
            db: store.clone(),
            guard: VoteGuard::new(store, policy),
        }
    }

    pub async fn new_position(&self, request: NewPositionRequest) -> Result<RowId> {
        for (field, value) in [
            ("author", &request.author),
            ("event", &request.event),
            ("selection", &request.selection),
        ] {
            if value.trim().is_empty() {
                return Err(PositionError::MissingField(field).into());
            }
        }
        if request.odds < Decimal::ONE {
            return Err(PositionError::OddsTooLow(request.odds).into());
        }
        // Rejected here rather than voided at settlement
        parse_selection(request.market, &request.selection).map_err(PositionError::from)?;
        let position = NewPositionRequest {
            odds: request.odds.round_dp(2),
            ..request
        };
        let id = self.db.add_position(&position).await?;
        debug!(
            "Created position {} by {}: {} \"{}\" @ {}",
            id, position.author, position.market, position.selection, position.odds
        );
        Ok(id)
    }
    pub async fn get_position(&self, position: RowId) -> Result<Position> {
        self.db
            .get_position(position)
            .await?
            .ok_or(PositionError::UnknownPosition(position).into())
    }
    pub async fn get_positions(&self) -> Result<Vec<Position>> {
        self.db.get_positions().await
    }
    pub async fn delete_position(&self, position: RowId) -> Result<()> {
        if !self.db.delete_position(position).await? {
            return Err(PositionError::UnknownPosition(position).into());
        }
        Ok(())
    }
    pub async fn new_comment(&self, comment: NewCommentRequest) -> Result<RowId> {
        if comment.author.trim().is_empty() {
            return Err(PositionError::MissingField("author").into());
        }
        if comment.body.trim().is_empty() {
            return Err(PositionError::MissingField("body").into());
        }
        self.get_position(comment.position).await?;
        self.db.add_comment(&comment).await
    }
    pub async fn get_comments(&self, position: RowId) -> Result<Vec<Comment>> {
        self.get_position(position).await?;
        self.db.get_comments(position).await
    }
    pub async fn delete_comment(&self, comment: RowId) -> Result<()> {
        if !self.db.delete_comment(comment).await? {
            return Err(PositionError::UnknownComment(comment).into());
        }
        Ok(())
    }

    pub async fn vote(&self, request: VoteRequest) -> Result<VoteOutcome, VoteError> {
        let direction = parse_direction(&request.direction)?;
        let key = VoteKey {
            voter: request.voter,
            target_type: request.target_type,
            target: request.target,
        };
        let outcome = self.guard.apply_vote(&key, direction).await?;
        debug!(
            "{} voted {} on {} {}, now {:?}",
            key.voter, direction, key.target_type, key.target, outcome.direction
        );
        Ok(outcome)
    }
    pub async fn get_vote(&self, request: VoteLookupRequest) -> Result<Option<VoteDirection>> {
        self.db
            .get_vote(&VoteKey {
                voter: request.voter,
                target_type: request.target_type,
                target: request.target,
            })
            .await
    }

    pub async fn record_event_result(&self, event: EventId, result: EventResult) -> Result<()> {
        if event.trim().is_empty() {
            return Err(PositionError::MissingField("event").into());
        }
        if !self.db.add_event_result(&event, &result).await? {
            return Err(PositionError::ResultAlreadyRecorded(event).into());
        }
        info!("Recorded result for event {}", event);
        Ok(())
    }
    pub async fn get_event_result(&self, event: EventId) -> Result<EventResult> {
        self.db
            .get_event_result(&event)
            .await?
            .ok_or(PositionError::NoResult(event).into())
    }
    /// Settles every pending position on `event` against its recorded result.
    /// Positions settled concurrently by another pass are skipped.
    pub async fn settle_event(&self, event: EventId) -> Result<Vec<SettlementResponse>> {
        let result = self.get_event_result(event.clone()).await?;
        let pending = self
            .db
            .get_pending_positions(&event)
            .await
            .with_context(|| format!("couldn't load pending positions of {}", event))?;
        let mut settled = Vec::new();
        for position in pending {
            let outcome = resolve(position.market, &position.selection, &result);
            if self
                .db
                .set_settlement(position.id, outcome.into(), result.settled_at.unwrap_or_else(Utc::now))
                .await?
            {
                settled.push(SettlementResponse {
                    position: position.id,
                    outcome,
                });
            } else {
                debug!("Position {} was settled by someone else", position.id);
            }
        }
        info!("Settled {} positions of event {}", settled.len(), event);
        Ok(settled)
    }
}
