use crate::api::{RowId, TargetType, UserId, VoteCounters, VoteDirection};
use crate::db::StoreError;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Identifies one ledger entry: a voter's vote on one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub voter: UserId,
    pub target_type: TargetType,
    pub target: RowId,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    NoVote,
    Upvoted,
    Downvoted,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterDelta {
    pub upvotes: i64,
    pub downvotes: i64,
    pub voters: i64,
}
/// Ledger mutation chosen for a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create(VoteDirection),
    Remove(VoteDirection),
    Change {
        from: VoteDirection,
        to: VoteDirection,
    },
    /// Ledger already reflects the request, nothing is written.
    Unchanged(VoteState),
}
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("\"{0}\" is not a vote direction")]
    InvalidVoteDirection(String),
    #[error("{target_type} {target} does not exist")]
    TargetNotFound {
        target_type: TargetType,
        target: RowId,
    },
    #[error("concurrent votes could not be reconciled on {0}")]
    ConcurrencyConflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn parse_direction(raw: &str) -> Result<VoteDirection, VoteError> {
    VoteDirection::from_str(raw).map_err(|_| VoteError::InvalidVoteDirection(raw.to_string()))
}

impl VoteState {
    pub fn direction(&self) -> Option<VoteDirection> {
        match self {
            Self::NoVote => None,
            Self::Upvoted => Some(VoteDirection::Upvote),
            Self::Downvoted => Some(VoteDirection::Downvote),
        }
    }
}
impl From<Option<VoteDirection>> for VoteState {
    fn from(direction: Option<VoteDirection>) -> Self {
        match direction {
            None => Self::NoVote,
            Some(VoteDirection::Upvote) => Self::Upvoted,
            Some(VoteDirection::Downvote) => Self::Downvoted,
        }
    }
}

impl CounterDelta {
    fn vote(direction: VoteDirection, amount: i64) -> Self {
        match direction {
            VoteDirection::Upvote => Self {
                upvotes: amount,
                ..Default::default()
            },
            VoteDirection::Downvote => Self {
                downvotes: amount,
                ..Default::default()
            },
        }
    }
}

impl Transition {
    pub fn decide(current: VoteState, requested: VoteDirection) -> Self {
        match current.direction() {
            None => Self::Create(requested),
            Some(direction) if direction == requested => Self::Remove(direction),
            Some(direction) => Self::Change {
                from: direction,
                to: requested,
            },
        }
    }
    /// Decides again after a create lost a race against another writer.
    ///
    /// An existing entry with the requested direction was written by a
    /// duplicate of this very request, so it is left alone instead of being
    /// toggled off.
    pub fn reconcile(existing: VoteState, requested: VoteDirection) -> Self {
        match existing.direction() {
            Some(direction) if direction == requested => Self::Unchanged(existing),
            _ => Self::decide(existing, requested),
        }
    }
    pub fn resulting_state(&self) -> VoteState {
        match self {
            Self::Create(direction) => Some(*direction).into(),
            Self::Remove(_) => VoteState::NoVote,
            Self::Change { to, .. } => Some(*to).into(),
            Self::Unchanged(state) => *state,
        }
    }
    pub fn delta(&self) -> CounterDelta {
        match self {
            Self::Create(direction) => CounterDelta {
                voters: 1,
                ..CounterDelta::vote(*direction, 1)
            },
            Self::Remove(direction) => CounterDelta {
                voters: -1,
                ..CounterDelta::vote(*direction, -1)
            },
            Self::Change { from, to } => {
                let (removed, added) = (CounterDelta::vote(*from, -1), CounterDelta::vote(*to, 1));
                CounterDelta {
                    upvotes: removed.upvotes + added.upvotes,
                    downvotes: removed.downvotes + added.downvotes,
                    voters: 0,
                }
            }
            Self::Unchanged(_) => CounterDelta::default(),
        }
    }
}

impl VoteCounters {
    /// Applies a delta, flooring every counter at zero, and recomputes the
    /// prediction percentage.
    pub fn apply(&self, delta: CounterDelta) -> Self {
        let floor = |count: u32, delta: i64| {
            (i64::from(count) + delta).clamp(0, i64::from(u32::MAX)) as u32
        };
        let upvotes = floor(self.upvotes, delta.upvotes);
        let downvotes = floor(self.downvotes, delta.downvotes);
        Self {
            upvotes,
            downvotes,
            voters: floor(self.voters, delta.voters),
            prediction_percentage: prediction_percentage(upvotes, downvotes),
        }
    }
}

pub fn prediction_percentage(upvotes: u32, downvotes: u32) -> Decimal {
    let total = (u64::from(upvotes) + u64::from(downvotes)).max(1);
    (Decimal::from(upvotes) / Decimal::from(total) * Decimal::ONE_HUNDRED)
        .round_dp(2)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}
