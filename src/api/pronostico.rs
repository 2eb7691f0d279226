use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type RowId = i64;
pub type UserId = String;
pub type EventId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Market {
    MatchResult,
    OverUnder,
    BothTeamsScore,
    AsianHandicap,
    DoubleChance,
    CorrectScore,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettlementStatus {
    Pending,
    Won,
    Lost,
    Void,
}
/// Result of settling one position. Handed back to the caller, which decides
/// whether and where to persist it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettlementOutcome {
    Won,
    Lost,
    Void,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TargetType {
    Position,
    Comment,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    Upvote,
    Downvote,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteCounters {
    pub upvotes: u32,
    pub downvotes: u32,
    pub voters: u32,
    /// Share of upvotes among all directional votes, 0 to 100 with two decimals.
    pub prediction_percentage: Decimal,
}
impl Default for VoteCounters {
    fn default() -> Self {
        Self {
            upvotes: 0,
            downvotes: 0,
            voters: 0,
            prediction_percentage: Decimal::ZERO,
        }
    }
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: RowId,
    pub author: UserId,
    pub event: EventId,
    pub market: Market,
    pub selection: String,
    pub odds: Decimal,
    pub counters: VoteCounters,
    pub status: SettlementStatus,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: RowId,
    pub position: RowId,
    pub author: UserId,
    pub body: String,
    pub counters: VoteCounters,
    pub created_at: DateTime<Utc>,
}
/// Outcome of a sporting event as reported by the results feed.
///
/// `market_results` is whatever structured payload the feed attached
/// (`totalGoals`, `bothTeamsScored`, `homeScore`, `awayScore`, `cancelled`,
/// `abandoned`, ...). It is never trusted blindly; see `event_result::ResultFacts`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventResult {
    pub winner: Option<String>,
    pub score: Option<String>,
    pub market_results: Option<serde_json::Value>,
    pub settled_at: Option<DateTime<Utc>>,
}
